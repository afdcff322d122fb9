// src/models.rs

use serde::Deserialize;
use thiserror::Error;

use crate::core::args::{self, ValueParser};
use crate::core::builder::{NodeSpec, argument, literal};
use crate::core::context::CommandAction;
use crate::core::dispatcher::Dispatcher;
use crate::core::tree::{CommandTree, NodeId, TreeError};
use std::sync::Arc;

/// Errors raised while loading or applying a tree manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to parse manifest TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Unknown parser kind '{kind}' for node '{name}'.")]
    UnknownKind { name: String, kind: String },
    #[error("Redirect path '{path}' does not resolve to a registered node.")]
    RedirectNotFound { path: String },
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// A declarative command tree, loaded from TOML.
///
/// Manifests describe structure only; actions are code and get attached by
/// the embedder through an action factory keyed by node path.
#[derive(Deserialize, Debug, Clone)]
pub struct TreeManifest {
    #[serde(default)]
    pub commands: Vec<NodeDef>,
}

/// One node of a declarative command tree.
#[derive(Deserialize, Debug, Clone)]
pub struct NodeDef {
    pub name: String,
    /// `"literal"` or a parser kind: `"word"`, `"remaining"`, `"integer"`,
    /// `"boolean"`, `"optional"`.
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Whether this node is a valid command endpoint.
    #[serde(default)]
    pub executes: bool,
    /// Whether this node carries a group default action.
    #[serde(default)]
    pub default: bool,
    /// Root-level discoverability flag.
    #[serde(default)]
    pub advertise: bool,
    /// Slash-separated path of another node this one redirects to.
    #[serde(default)]
    pub redirect: Option<String>,
    #[serde(default)]
    pub children: Vec<NodeDef>,
}

fn default_kind() -> String {
    "literal".to_string()
}

impl TreeManifest {
    pub fn from_toml_str(raw: &str) -> Result<Self, ManifestError> {
        Ok(toml::from_str(raw)?)
    }

    /// Registers every command in the manifest, attaching an action from
    /// `make_action` (keyed by slash-separated node path) wherever a node
    /// executes or carries a group default. Redirects are wired once the
    /// whole forest exists, so forward references work.
    pub fn apply(
        &self,
        dispatcher: &mut Dispatcher,
        make_action: &dyn Fn(&str) -> CommandAction,
    ) -> Result<Vec<NodeId>, ManifestError> {
        let mut redirects: Vec<(String, String)> = Vec::new();
        let mut roots = Vec::new();

        for def in &self.commands {
            let spec = build_spec(def, &def.name, make_action, &mut redirects)?;
            roots.push(dispatcher.register(spec)?);
        }

        for (node_path, target_path) in redirects {
            let node = resolve_path(dispatcher.tree(), &node_path).ok_or_else(|| {
                ManifestError::RedirectNotFound {
                    path: node_path.clone(),
                }
            })?;
            let target = resolve_path(dispatcher.tree(), &target_path).ok_or_else(|| {
                ManifestError::RedirectNotFound {
                    path: target_path.clone(),
                }
            })?;
            dispatcher.tree_mut().redirect_to(node, target)?;
        }

        Ok(roots)
    }
}

fn build_spec(
    def: &NodeDef,
    path: &str,
    make_action: &dyn Fn(&str) -> CommandAction,
    redirects: &mut Vec<(String, String)>,
) -> Result<NodeSpec, ManifestError> {
    let mut spec = if def.kind == "literal" {
        literal(&def.name)
    } else {
        let parser = parser_for(&def.kind).ok_or_else(|| ManifestError::UnknownKind {
            name: def.name.clone(),
            kind: def.kind.clone(),
        })?;
        argument(&def.name, parser)
    };

    if def.executes {
        let action = make_action(path);
        spec = spec.executes(move |inv| action(inv));
    }
    if def.default {
        let action = make_action(path);
        spec = spec.default_executes(move |inv| action(inv));
    }
    if def.advertise {
        spec = spec.advertised();
    }
    if let Some(target) = &def.redirect {
        redirects.push((path.to_string(), target.clone()));
    }

    for child in &def.children {
        let child_path = format!("{path}/{}", child.name);
        spec = spec.then(build_spec(child, &child_path, make_action, redirects)?);
    }
    Ok(spec)
}

fn parser_for(kind: &str) -> Option<Arc<dyn ValueParser>> {
    match kind {
        "word" => Some(args::word()),
        "remaining" => Some(args::remaining()),
        "integer" => Some(args::integer()),
        "boolean" => Some(args::boolean()),
        "optional" => Some(args::optional_word()),
        _ => None,
    }
}

fn resolve_path(tree: &CommandTree, path: &str) -> Option<NodeId> {
    let mut current = tree.root();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current = tree.get_child(current, segment)?;
    }
    if current == tree.root() {
        None
    } else {
        Some(current)
    }
}

// MARK: --- UNIT TESTS ---
