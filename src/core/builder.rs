// src/core/builder.rs

use std::sync::Arc;

use crate::core::args::ValueParser;
use crate::core::context::{CommandAction, ExecError, Invocation};
use crate::core::tree::{CommandTree, NodeId, TreeError};

enum SpecKind {
    Literal(String),
    Argument(String, Arc<dyn ValueParser>),
}

/// A declarative node specification, applied to a tree in one registration
/// call. Specs chain the way the resulting command reads:
///
/// ```
/// use bramble::core::args::word;
/// use bramble::core::builder::{argument, literal};
///
/// let spec = literal("greet")
///     .then(argument("name", word()).executes(|inv| {
///         println!("hello, {}", inv.str_arg("name").unwrap_or("?"));
///         Ok(0)
///     }));
/// # let _ = spec;
/// ```
pub struct NodeSpec {
    kind: SpecKind,
    children: Vec<NodeSpec>,
    action: Option<CommandAction>,
    default_action: Option<CommandAction>,
    advertise: bool,
}

/// A literal node matching exactly `name`.
pub fn literal(name: impl Into<String>) -> NodeSpec {
    NodeSpec {
        kind: SpecKind::Literal(name.into()),
        children: Vec::new(),
        action: None,
        default_action: None,
        advertise: false,
    }
}

/// An argument node consuming input through `parser`.
pub fn argument(name: impl Into<String>, parser: Arc<dyn ValueParser>) -> NodeSpec {
    NodeSpec {
        kind: SpecKind::Argument(name.into(), parser),
        children: Vec::new(),
        action: None,
        default_action: None,
        advertise: false,
    }
}

impl NodeSpec {
    /// Adds a child spec.
    pub fn then(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    /// Makes this node a valid endpoint running `action`.
    pub fn executes<F>(mut self, action: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<i32, ExecError> + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(action));
        self
    }

    /// Installs a group default on this node: it runs when the node matches
    /// but none of its children bind the remaining input.
    pub fn default_executes<F>(mut self, action: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<i32, ExecError> + Send + Sync + 'static,
    {
        self.default_action = Some(Arc::new(action));
        self
    }

    /// Flags the command for discoverability registration. Meaningful on
    /// root-level literals.
    pub fn advertised(mut self) -> Self {
        self.advertise = true;
        self
    }

    /// Builds this spec (and its children) under `parent`. Embedders normally
    /// go through `Dispatcher::register`, which also handles discoverability.
    pub fn apply(self, tree: &mut CommandTree, parent: NodeId) -> Result<NodeId, TreeError> {
        let id = match self.kind {
            SpecKind::Literal(name) => tree.add_literal(parent, name)?,
            SpecKind::Argument(name, parser) => tree.add_argument(parent, name, parser)?,
        };
        if self.advertise {
            tree.set_advertise(id, true);
        }
        if let Some(action) = self.action {
            tree.set_action(id, action);
        }
        if let Some(default) = self.default_action {
            tree.set_default_action(id, default)?;
        }
        for child in self.children {
            child.apply(tree, id)?;
        }
        Ok(id)
    }
}

// MARK: --- UNIT TESTS ---
