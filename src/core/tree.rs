// src/core/tree.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::constants::DEFAULT_CHILD_NAME;
use crate::core::args::{EmptyParser, ValueParser};
use crate::core::context::CommandAction;

/// Stable identity of a node within one tree: its arena index.
///
/// Identities are what the permission cache is keyed by, so two distinct
/// nodes that share a name never collide, and an id can never dangle while
/// the tree that issued it is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Errors raised while registering nodes.
#[derive(Error, Debug)]
pub enum TreeError {
    /// A sibling with the same name already exists under this parent.
    #[error("Node name '{name}' is already in use by another child of the same parent.")]
    DuplicateChild {
        /// The conflicting name.
        name: String,
    },
    /// Node names must be non-empty.
    #[error("Node names must not be empty.")]
    EmptyName,
    /// A node cannot redirect to itself.
    #[error("A node cannot redirect to itself.")]
    SelfRedirect,
    /// The root node cannot redirect anywhere.
    #[error("The root node cannot be redirected.")]
    RootRedirect,
    /// `set_default_action` was called twice on the same group node.
    #[error("Node already has a default action.")]
    DefaultAlreadySet,
}

type TreeResult<T> = Result<T, TreeError>;

/// What a node matches: nothing (the root), one fixed token, or a variable
/// span consumed by an injected value parser.
#[derive(Clone)]
pub enum NodeKind {
    Root,
    Literal { name: String },
    Argument { name: String, parser: Arc<dyn ValueParser> },
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "Root"),
            Self::Literal { name } => write!(f, "Literal({name})"),
            Self::Argument { name, .. } => write!(f, "Argument({name})"),
        }
    }
}

/// One node of the command tree.
pub struct CommandNode {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// O(1) lookup of literal children by token.
    literal_index: HashMap<String, NodeId>,
    action: Option<CommandAction>,
    redirect: Option<NodeId>,
    advertise: bool,
    is_default: bool,
}

impl CommandNode {
    fn new(kind: NodeKind, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            parent,
            children: Vec::new(),
            literal_index: HashMap::new(),
            action: None,
            redirect: None,
            advertise: false,
            is_default: false,
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// The node's name; the root has none.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Root => None,
            NodeKind::Literal { name } | NodeKind::Argument { name, .. } => Some(name),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn literal_child(&self, token: &str) -> Option<NodeId> {
        self.literal_index.get(token).copied()
    }

    pub fn action(&self) -> Option<&CommandAction> {
        self.action.as_ref()
    }

    pub fn redirect(&self) -> Option<NodeId> {
        self.redirect
    }

    pub fn advertise(&self) -> bool {
        self.advertise
    }

    /// Whether this is the hidden child carrying a group's default action.
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    pub fn parser(&self) -> Option<&Arc<dyn ValueParser>> {
        match &self.kind {
            NodeKind::Argument { parser, .. } => Some(parser),
            _ => None,
        }
    }
}

impl fmt::Debug for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandNode")
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("redirect", &self.redirect)
            .field("has_action", &self.action.is_some())
            .field("is_default", &self.is_default)
            .finish()
    }
}

/// The space of valid command strings: an arena of nodes under a single root.
///
/// The tree only stores structure. All parsing intelligence lives in the
/// dispatcher, and permission derivation in the resolver.
#[derive(Debug)]
pub struct CommandTree {
    nodes: Vec<CommandNode>,
}

impl Default for CommandTree {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![CommandNode::new(NodeKind::Root, None)],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &CommandNode {
        &self.nodes[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Registers a literal child under `parent`.
    pub fn add_literal(&mut self, parent: NodeId, name: impl Into<String>) -> TreeResult<NodeId> {
        let name = name.into();
        self.check_child_name(parent, &name)?;
        let id = self.push_node(CommandNode::new(
            NodeKind::Literal { name: name.clone() },
            Some(parent),
        ));
        let parent_node = &mut self.nodes[parent.index()];
        parent_node.children.push(id);
        parent_node.literal_index.insert(name, id);
        Ok(id)
    }

    /// Registers an argument child under `parent`.
    pub fn add_argument(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        parser: Arc<dyn ValueParser>,
    ) -> TreeResult<NodeId> {
        let name = name.into();
        self.check_child_name(parent, &name)?;
        let id = self.push_node(CommandNode::new(
            NodeKind::Argument { name, parser },
            Some(parent),
        ));
        self.nodes[parent.index()].children.push(id);
        Ok(id)
    }

    /// Looks up a visible child of `parent` by name. Literals resolve through
    /// the index; arguments by scan. The hidden default child never resolves.
    pub fn get_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let parent_node = self.node(parent);
        if let Some(id) = parent_node.literal_child(name) {
            return Some(id);
        }
        parent_node
            .children
            .iter()
            .copied()
            .find(|&c| !self.node(c).is_default && self.node(c).name() == Some(name))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Attaches (or replaces) the action making `id` a valid endpoint.
    pub fn set_action(&mut self, id: NodeId, action: CommandAction) {
        self.nodes[id.index()].action = Some(action);
    }

    /// Makes `node` continue as if it were `target`: after `node` matches,
    /// parsing resumes against `target`'s children.
    pub fn redirect_to(&mut self, node: NodeId, target: NodeId) -> TreeResult<()> {
        if node == self.root() {
            return Err(TreeError::RootRedirect);
        }
        if node == target {
            return Err(TreeError::SelfRedirect);
        }
        log::debug!(
            "Redirecting node {:?} to {:?}",
            self.node(node).name(),
            self.node(target).name()
        );
        self.nodes[node.index()].redirect = Some(target);
        Ok(())
    }

    /// Installs a group default: `node` gains a hidden zero-width child that
    /// binds when none of its visible children match the remaining input.
    pub fn set_default_action(&mut self, node: NodeId, action: CommandAction) -> TreeResult<NodeId> {
        let has_default = self
            .node(node)
            .children
            .iter()
            .any(|&c| self.node(c).is_default);
        if has_default {
            return Err(TreeError::DefaultAlreadySet);
        }
        let id = self.push_node(CommandNode::new(
            NodeKind::Argument {
                name: DEFAULT_CHILD_NAME.to_string(),
                parser: Arc::new(EmptyParser),
            },
            Some(node),
        ));
        self.nodes[id.index()].is_default = true;
        self.nodes[id.index()].action = Some(action);
        self.nodes[node.index()].children.push(id);
        Ok(id)
    }

    /// Flags a root-level command for discoverability registration.
    pub fn set_advertise(&mut self, id: NodeId, advertise: bool) {
        self.nodes[id.index()].advertise = advertise;
    }

    /// Unlinks `id` from its parent. The node (and anything redirecting to
    /// it) stays allocated but is no longer reachable from the root.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id.index()].parent.take() else {
            return;
        };
        let parent_node = &mut self.nodes[parent.index()];
        parent_node.children.retain(|&c| c != id);
        if let Some(name) = self.nodes[id.index()].name().map(str::to_string) {
            let parent_node = &mut self.nodes[parent.index()];
            if parent_node.literal_index.get(&name) == Some(&id) {
                parent_node.literal_index.remove(&name);
            }
        }
    }

    /// Segment names from the root down to `id`. Empty when the node is the
    /// root itself or its parent chain no longer reaches the root.
    pub fn path_to_root(&self, id: NodeId) -> Vec<&str> {
        let mut segments = Vec::new();
        let mut current = id;
        loop {
            let node = self.node(current);
            match node.name() {
                Some(name) => segments.push(name),
                None => {
                    // Reached the root: the path is complete.
                    segments.reverse();
                    return segments;
                }
            }
            match node.parent() {
                Some(parent) => current = parent,
                None => return Vec::new(),
            }
        }
    }

    /// Distance from the root, used to rank recorded errors by how deep the
    /// attempt got. A dangling node ranks as depth zero.
    pub fn depth(&self, id: NodeId) -> usize {
        self.path_to_root(id).len()
    }

    fn check_child_name(&self, parent: NodeId, name: &str) -> TreeResult<()> {
        if name.is_empty() {
            return Err(TreeError::EmptyName);
        }
        let taken = self
            .node(parent)
            .children
            .iter()
            .any(|&c| !self.node(c).is_default && self.node(c).name() == Some(name));
        if taken {
            return Err(TreeError::DuplicateChild {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn push_node(&mut self, node: CommandNode) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(node);
        id
    }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::args::word;

    fn noop() -> CommandAction {
        Arc::new(|_| Ok(0))
    }

    #[test]
    fn test_literal_lookup_is_indexed() {
        let mut tree = CommandTree::new();
        let root = tree.root();
        let greet = tree.add_literal(root, "greet").unwrap();

        assert_eq!(tree.get_child(root, "greet"), Some(greet));
        assert_eq!(tree.node(root).literal_child("greet"), Some(greet));
        assert_eq!(tree.get_child(root, "missing"), None);
    }

    #[test]
    fn test_duplicate_sibling_name_rejected() {
        let mut tree = CommandTree::new();
        let root = tree.root();
        tree.add_literal(root, "greet").unwrap();

        let err = tree.add_literal(root, "greet").unwrap_err();
        assert!(matches!(err, TreeError::DuplicateChild { name } if name == "greet"));

        let err = tree.add_argument(root, "greet", word()).unwrap_err();
        assert!(matches!(err, TreeError::DuplicateChild { .. }));
    }

    #[test]
    fn test_path_to_root_orders_segments() {
        let mut tree = CommandTree::new();
        let root = tree.root();
        let greet = tree.add_literal(root, "greet").unwrap();
        let name = tree.add_argument(greet, "name", word()).unwrap();

        assert_eq!(tree.path_to_root(name), vec!["greet", "name"]);
        assert_eq!(tree.depth(name), 2);
        assert!(tree.path_to_root(root).is_empty());
    }

    #[test]
    fn test_detached_node_has_empty_path() {
        let mut tree = CommandTree::new();
        let root = tree.root();
        let greet = tree.add_literal(root, "greet").unwrap();
        let name = tree.add_argument(greet, "name", word()).unwrap();

        tree.detach(greet);
        assert!(tree.path_to_root(greet).is_empty());
        assert!(tree.path_to_root(name).is_empty());
        assert_eq!(tree.get_child(root, "greet"), None);
    }

    #[test]
    fn test_default_child_is_hidden_and_unique() {
        let mut tree = CommandTree::new();
        let root = tree.root();
        let group = tree.add_literal(root, "group").unwrap();

        let default = tree.set_default_action(group, noop()).unwrap();
        assert!(tree.node(default).is_default());
        assert_eq!(tree.get_child(group, DEFAULT_CHILD_NAME), None);

        let err = tree.set_default_action(group, noop()).unwrap_err();
        assert!(matches!(err, TreeError::DefaultAlreadySet));
    }

    #[test]
    fn test_redirect_validation() {
        let mut tree = CommandTree::new();
        let root = tree.root();
        let a = tree.add_literal(root, "a").unwrap();
        let b = tree.add_literal(root, "b").unwrap();

        assert!(matches!(
            tree.redirect_to(a, a),
            Err(TreeError::SelfRedirect)
        ));
        assert!(matches!(
            tree.redirect_to(root, b),
            Err(TreeError::RootRedirect)
        ));

        tree.redirect_to(a, b).unwrap();
        assert_eq!(tree.node(a).redirect(), Some(b));
    }
}
