// src/core/permission.rs

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;
use regex::Regex;

use crate::constants::{
    ADVERTISE_PRIORITY, EMPTY_SEGMENT_PLACEHOLDER, PERMISSION_INFIX, PERMISSION_SUFFIX,
    UNKNOWN_OWNER,
};
use crate::core::context::CommandSource;
use crate::core::tree::{CommandTree, NodeId, NodeKind};

lazy_static! {
    static ref NON_ALNUM_RE: Regex = Regex::new(r"[^A-Za-z0-9]").unwrap();
}

/// The external permission-store collaborator.
pub trait Authorizer: Send + Sync {
    /// Whether `source` holds `permission`.
    fn is_authorized(&self, permission: &str, source: &dyn CommandSource) -> bool;

    /// Pre-registers a permission id so it appears in registries before its
    /// first use. Invoked at registration time for advertised root commands.
    fn register_known_permission(&self, _permission: &str, _default_priority: u8) {}
}

/// Attributes the owning principal of a root command segment.
pub trait OwnerLookup: Send + Sync {
    /// The owner id for a root segment name, or `None` when the segment is
    /// not attributable (degrades to the `"unknown"` sentinel).
    fn owner_of(&self, root_segment: &str) -> Option<String>;
}

/// Lazily derives and memoizes the dotted permission string for each node.
///
/// The cache is keyed by node identity, never by name, and lives exactly as
/// long as the tree it describes (the dispatcher owns both). Derivation is
/// deterministic, so two invocations racing to populate the same slot write
/// the same value; the lock only protects the map's structure.
pub struct PermissionResolver {
    owners: Arc<dyn OwnerLookup>,
    cache: RwLock<HashMap<NodeId, Arc<str>>>,
}

impl PermissionResolver {
    pub fn new(owners: Arc<dyn OwnerLookup>) -> Self {
        Self {
            owners,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The memoized permission string for `node`.
    ///
    /// A node that redirects elsewhere and carries no terminal action adopts
    /// its target's string; every identity walked along the redirect chain is
    /// cached, so repeated lookups of the alias never re-walk the chain.
    pub fn permission_string(&self, tree: &CommandTree, node: NodeId) -> Arc<str> {
        if let Some(hit) = self.cache_get(node) {
            return hit;
        }

        // Follow redirects from action-less aliases to the node that actually
        // names the permission.
        let mut aliases: Vec<NodeId> = Vec::new();
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut current = node;
        loop {
            let n = tree.node(current);
            let Some(target) = n.redirect() else { break };
            if n.action().is_some() || !seen.insert(current) {
                break;
            }
            aliases.push(current);
            current = target;
        }

        let resolved = match self.cache_get(current) {
            Some(hit) => hit,
            None => Arc::from(self.derive(tree, current)),
        };

        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.insert(current, Arc::clone(&resolved));
        for alias in aliases {
            cache.insert(alias, Arc::clone(&resolved));
        }
        resolved
    }

    /// Whether `source` may use (or even see) `node`. Denials at the root
    /// level simply hide the command; they never produce an error.
    pub fn can_use(
        &self,
        is_root: bool,
        tree: &CommandTree,
        node: NodeId,
        authorizer: &dyn Authorizer,
        source: &dyn CommandSource,
    ) -> bool {
        if matches!(tree.node(node).kind(), NodeKind::Root) {
            return true;
        }
        let permission = self.permission_string(tree, node);
        let allowed = authorizer.is_authorized(&permission, source);
        if !allowed && is_root {
            log::debug!(
                "Source '{}' lacks '{}'; command hidden.",
                source.name(),
                permission
            );
        }
        allowed
    }

    /// Registers `node`'s permission with the authorization backend so it is
    /// discoverable before first use.
    pub fn advertise(&self, tree: &CommandTree, node: NodeId, authorizer: &dyn Authorizer) {
        let permission = self.permission_string(tree, node);
        log::debug!("Advertising permission '{permission}'.");
        authorizer.register_known_permission(&permission, ADVERTISE_PRIORITY);
    }

    /// Drops every memoized entry. Called whenever the tree's structure
    /// changes, since paths and redirect targets may have moved.
    pub fn clear(&self) {
        self.cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn cache_get(&self, node: NodeId) -> Option<Arc<str>> {
        self.cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&node)
            .cloned()
    }

    fn derive(&self, tree: &CommandTree, node: NodeId) -> String {
        let path = tree.path_to_root(node);

        let owner = if path.is_empty() {
            log::warn!(
                "Deriving a permission for a node with no path from the root; \
                 falling back to owner '{UNKNOWN_OWNER}'."
            );
            UNKNOWN_OWNER.to_string()
        } else {
            self.owners.owner_of(path[0]).unwrap_or_else(|| {
                log::warn!(
                    "No owner registered for root command '{}'; \
                     falling back to '{UNKNOWN_OWNER}'.",
                    path[0]
                );
                UNKNOWN_OWNER.to_string()
            })
        };

        let owner_key = sanitize(&owner);
        let mut parts: Vec<String> = Vec::with_capacity(path.len() + 3);
        parts.push(owner_key.clone());
        parts.push(PERMISSION_INFIX.to_string());
        for segment in path {
            parts.push(sanitize_segment(segment, &owner_key));
        }
        parts.push(PERMISSION_SUFFIX.to_string());
        parts.join(".")
    }
}

fn sanitize(raw: &str) -> String {
    NON_ALNUM_RE.replace_all(raw, "").to_lowercase()
}

/// Strips a segment down to lowercase alphanumerics, removes a stuttering
/// owner prefix (`foo.foo_bar` becomes `foo.bar`), and substitutes a
/// placeholder when nothing survives.
fn sanitize_segment(segment: &str, owner_key: &str) -> String {
    let cleaned = sanitize(segment);
    let trimmed = if !owner_key.is_empty() && cleaned.starts_with(owner_key) {
        cleaned[owner_key.len()..].to_string()
    } else {
        cleaned
    };
    if trimmed.is_empty() {
        EMPTY_SEGMENT_PLACEHOLDER.to_string()
    } else {
        trimmed
    }
}

// MARK: --- UNIT TESTS ---
