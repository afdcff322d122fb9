// src/core/context.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::core::args::ArgValue;
use crate::core::tree::NodeId;

/// The invoking principal behind a command.
///
/// The parser never inspects a source beyond handing it to the authorization
/// collaborator; it exists so authorizers and actions know who asked.
pub trait CommandSource {
    /// Stable display name, used in logs and by authorization backends.
    fn name(&self) -> &str;

    /// Whether the source is a live interactive player. Only discoverability
    /// decisions care about this.
    fn is_live_player(&self) -> bool {
        false
    }
}

/// A minimal source for embedders, tests, and the REPL.
#[derive(Debug, Clone)]
pub struct NamedSource {
    name: String,
    live: bool,
}

impl NamedSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            live: false,
        }
    }

    pub fn live_player(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            live: true,
        }
    }
}

impl CommandSource for NamedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_live_player(&self) -> bool {
        self.live
    }
}

/// A failure raised by a command action while it runs, after parsing already
/// succeeded. Friendly errors are meant to be shown verbatim to the invoking
/// source; the rest belong in logs.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ExecError {
    message: String,
    friendly: bool,
}

impl ExecError {
    /// An internal failure whose message targets operators, not the source.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            friendly: false,
        }
    }

    /// A failure whose message should be relayed directly to the source.
    pub fn friendly(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            friendly: true,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_friendly(&self) -> bool {
        self.friendly
    }
}

impl From<anyhow::Error> for ExecError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

/// An opaque executable attached to a command endpoint at registration time.
pub type CommandAction =
    Arc<dyn Fn(&Invocation<'_>) -> Result<i32, ExecError> + Send + Sync>;

/// Accumulated state of one parse attempt: the node path matched so far, the
/// argument values parsed along it, and the action inherited from the deepest
/// matched node.
///
/// Branch attempts clone the context before consuming a child; the clone is a
/// structural copy of the path vector and argument map (actions are shared
/// `Arc`s), so most failed branches cost little.
#[derive(Clone, Default)]
pub struct ParseContext {
    nodes: Vec<NodeId>,
    args: HashMap<String, ArgValue>,
    action: Option<CommandAction>,
    child: Option<Box<ParseContext>>,
}

impl ParseContext {
    /// A fresh context rooted at `root` (the tree root for a top-level parse,
    /// or a redirect target for a spliced sub-parse).
    pub fn new(root: NodeId) -> Self {
        Self {
            nodes: vec![root],
            ..Self::default()
        }
    }

    pub fn push_node(&mut self, node: NodeId) {
        self.nodes.push(node);
    }

    pub fn insert_arg(&mut self, name: String, value: ArgValue) {
        self.args.insert(name, value);
    }

    pub fn set_action(&mut self, action: CommandAction) {
        self.action = Some(action);
    }

    /// Splices a redirected sub-parse under this context.
    pub fn set_child(&mut self, child: ParseContext) {
        self.child = Some(Box::new(child));
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn args(&self) -> &HashMap<String, ArgValue> {
        &self.args
    }

    pub fn action(&self) -> Option<&CommandAction> {
        self.action.as_ref()
    }

    pub fn child(&self) -> Option<&ParseContext> {
        self.child.as_deref()
    }

    pub fn last_node(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }
}

impl fmt::Debug for ParseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseContext")
            .field("nodes", &self.nodes)
            .field("args", &self.args)
            .field("has_action", &self.action.is_some())
            .field("child", &self.child)
            .finish()
    }
}

/// The read-only view handed to an action when it runs: the original source
/// plus the argument map and node path merged across the redirect chain.
pub struct Invocation<'a> {
    source: &'a dyn CommandSource,
    args: HashMap<String, ArgValue>,
    path: Vec<NodeId>,
}

impl<'a> Invocation<'a> {
    /// Flattens a context chain into an invocation view. Argument values from
    /// deeper (redirected) contexts override shallower ones; the deepest
    /// attached action is the one that runs.
    pub(crate) fn from_context(
        context: &ParseContext,
        source: &'a dyn CommandSource,
    ) -> (Self, Option<CommandAction>) {
        let mut args = HashMap::new();
        let mut path = Vec::new();
        let mut action = None;

        let mut current = Some(context);
        while let Some(ctx) = current {
            for (name, value) in ctx.args() {
                args.insert(name.clone(), value.clone());
            }
            path.extend_from_slice(ctx.nodes());
            if let Some(a) = ctx.action() {
                action = Some(a.clone());
            }
            current = ctx.child();
        }

        (Self { source, args, path }, action)
    }

    pub fn source(&self) -> &dyn CommandSource {
        self.source
    }

    pub fn path(&self) -> &[NodeId] {
        &self.path
    }

    pub fn arg(&self, name: &str) -> Option<&ArgValue> {
        self.args.get(name)
    }

    pub fn str_arg(&self, name: &str) -> Option<&str> {
        self.args.get(name).and_then(ArgValue::as_str)
    }

    pub fn int_arg(&self, name: &str) -> Option<i64> {
        self.args.get(name).and_then(ArgValue::as_int)
    }

    pub fn bool_arg(&self, name: &str) -> Option<bool> {
        self.args.get(name).and_then(ArgValue::as_bool)
    }

    pub fn args(&self) -> &HashMap<String, ArgValue> {
        &self.args
    }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tree::CommandTree;

    fn noop_action(code: i32) -> CommandAction {
        Arc::new(move |_inv| Ok(code))
    }

    #[test]
    fn test_branch_clone_is_independent() {
        let tree = CommandTree::new();
        let mut base = ParseContext::new(tree.root());
        base.insert_arg("name".to_string(), ArgValue::Str("bob".to_string()));

        let mut branch = base.clone();
        branch.insert_arg("age".to_string(), ArgValue::Int(7));

        assert!(base.args().get("age").is_none());
        assert_eq!(branch.args().len(), 2);
    }

    #[test]
    fn test_deepest_action_wins_across_chain() {
        let tree = CommandTree::new();
        let mut outer = ParseContext::new(tree.root());
        outer.set_action(noop_action(1));

        let mut inner = ParseContext::new(tree.root());
        inner.set_action(noop_action(2));
        inner.insert_arg("inner".to_string(), ArgValue::Bool(true));
        outer.set_child(inner);

        let source = NamedSource::new("tester");
        let (invocation, action) = Invocation::from_context(&outer, &source);
        assert_eq!(action.unwrap()(&invocation).unwrap(), 2);
        assert_eq!(invocation.bool_arg("inner"), Some(true));
    }

    #[test]
    fn test_child_without_action_inherits_parent_action() {
        let tree = CommandTree::new();
        let mut outer = ParseContext::new(tree.root());
        outer.set_action(noop_action(9));
        outer.set_child(ParseContext::new(tree.root()));

        let source = NamedSource::new("tester");
        let (invocation, action) = Invocation::from_context(&outer, &source);
        assert_eq!(action.unwrap()(&invocation).unwrap(), 9);
    }

    #[test]
    fn test_friendly_flag_round_trip() {
        let friendly = ExecError::friendly("You cannot do that here.");
        assert!(friendly.is_friendly());

        let internal: ExecError = anyhow::anyhow!("backend unavailable").into();
        assert!(!internal.is_friendly());
        assert!(internal.message().contains("backend unavailable"));
    }
}
