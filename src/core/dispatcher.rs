// src/core/dispatcher.rs

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::constants::{ARGUMENT_SEPARATOR, MAX_PARSE_DEPTH};
use crate::core::builder::NodeSpec;
use crate::core::context::{CommandSource, ExecError, Invocation, ParseContext};
use crate::core::cursor::{InputCursor, SyntaxError};
use crate::core::permission::{Authorizer, OwnerLookup, PermissionResolver};
use crate::core::tree::{CommandTree, NodeId, NodeKind, TreeError};

/// Errors surfaced by [`Dispatcher::execute`].
#[derive(Error, Debug)]
pub enum DispatchError {
    /// No branch of the parse accounted for the input; carries the most
    /// informative recorded branch error.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    /// The first token matched nothing at all.
    #[error("Unknown command: '{input}'")]
    UnknownCommand { input: String },
    /// Parsing succeeded but the winning action failed while running.
    #[error("Command execution failed: {0}")]
    Execution(#[from] ExecError),
}

/// Tunable dispatcher limits.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Parse recursion bound. Tree depth is registration-controlled, so the
    /// parser enforces its own ceiling instead of trusting it.
    pub max_depth: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_depth: MAX_PARSE_DEPTH,
        }
    }
}

/// The outcome of a parse, exposed separately from execution so tooling
/// (completion, inspection) can consume the winning context without running
/// anything.
#[derive(Debug)]
pub struct ParseResult {
    /// The winning (or deepest partial) context.
    pub context: ParseContext,
    /// Position the winning candidate's cursor reached.
    pub consumed: usize,
    /// Branch-local errors recorded per attempted node.
    pub errors: HashMap<NodeId, SyntaxError>,
}

/// A diagnostic report of two sibling children able to match the same input.
#[derive(Debug)]
pub struct Ambiguity {
    pub parent: NodeId,
    pub first: NodeId,
    pub second: NodeId,
    /// Sample inputs both children accept.
    pub examples: Vec<String>,
}

/// Internal result of parsing one tree level.
struct NodeParse {
    context: ParseContext,
    cursor: usize,
    errors: HashMap<NodeId, SyntaxError>,
}

/// The command engine: owns the tree, walks it against input lines with full
/// backtracking, and authorizes every step through the permission resolver.
///
/// Dispatch entry points take `&self`, registration takes `&mut self`, so a
/// shared dispatcher can serve concurrent invocations while structural
/// mutation is forced to happen-before any of them. Any mutable tree access
/// also drops the permission cache, since paths and redirect targets may have
/// moved.
pub struct Dispatcher {
    id: Uuid,
    tree: CommandTree,
    resolver: PermissionResolver,
    authorizer: Arc<dyn Authorizer>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(authorizer: Arc<dyn Authorizer>, owners: Arc<dyn OwnerLookup>) -> Self {
        Self::with_config(authorizer, owners, DispatcherConfig::default())
    }

    pub fn with_config(
        authorizer: Arc<dyn Authorizer>,
        owners: Arc<dyn OwnerLookup>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tree: CommandTree::new(),
            resolver: PermissionResolver::new(owners),
            authorizer,
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    /// Mutable tree access for registration plumbing. Invalidates the
    /// permission cache.
    pub fn tree_mut(&mut self) -> &mut CommandTree {
        self.resolver.clear();
        &mut self.tree
    }

    /// Registers a command subtree under the root. Advertised root commands
    /// have their permission pre-registered with the authorization backend
    /// here, at registration time, keeping the dispatch hot path side-effect
    /// free.
    pub fn register(&mut self, spec: NodeSpec) -> Result<NodeId, TreeError> {
        self.resolver.clear();
        let root = self.tree.root();
        let id = spec.apply(&mut self.tree, root)?;
        if self.tree.node(id).advertise() {
            self.resolver
                .advertise(&self.tree, id, self.authorizer.as_ref());
        }
        Ok(id)
    }

    /// Registers a root literal that behaves exactly like `target`'s
    /// children.
    pub fn alias(&mut self, name: impl Into<String>, target: NodeId) -> Result<NodeId, TreeError> {
        self.resolver.clear();
        let root = self.tree.root();
        let id = self.tree.add_literal(root, name)?;
        self.tree.redirect_to(id, target)?;
        Ok(id)
    }

    /// The memoized permission string for `node`.
    pub fn permission_string(&self, node: NodeId) -> Arc<str> {
        self.resolver.permission_string(&self.tree, node)
    }

    /// Parses `input` against the tree and returns the winning candidate
    /// without executing it.
    pub fn parse(&self, input: &str, source: &dyn CommandSource) -> ParseResult {
        log::debug!(
            "Dispatcher {}: parsing {:?} for source '{}'",
            self.id,
            input,
            source.name()
        );
        let cursor = InputCursor::new(input);
        let root = self.tree.root();
        let context = ParseContext::new(root);
        let parse = self.parse_node(true, root, &cursor, &context, source, 0);
        ParseResult {
            context: parse.context,
            consumed: parse.cursor,
            errors: parse.errors,
        }
    }

    /// Parses `input` and runs the winning action, returning its result code
    /// or the aggregated failure.
    pub fn execute(&self, input: &str, source: &dyn CommandSource) -> Result<i32, DispatchError> {
        let result = self.parse(input, source);
        if result.consumed < input.len() {
            return Err(self.aggregate_error(input, &result));
        }
        let (invocation, action) = Invocation::from_context(&result.context, source);
        match action {
            Some(action) => action(&invocation).map_err(DispatchError::Execution),
            None => Err(self.aggregate_error(input, &result)),
        }
    }

    /// Walks the whole tree reporting sibling pairs that can match the same
    /// input prefix. Purely diagnostic; dispatch never consults this.
    pub fn find_ambiguities<F>(&self, mut consumer: F)
    where
        F: FnMut(&Ambiguity),
    {
        self.find_ambiguities_at(self.tree.root(), &mut consumer);
    }

    // --- PARSING INTERNALS ---

    fn parse_node(
        &self,
        is_root: bool,
        node: NodeId,
        cursor: &InputCursor<'_>,
        context: &ParseContext,
        source: &dyn CommandSource,
        depth: usize,
    ) -> NodeParse {
        let start = cursor.cursor();
        let input_len = cursor.input().len();
        let mut errors: HashMap<NodeId, SyntaxError> = HashMap::new();
        let mut potentials: Vec<NodeParse> = Vec::new();

        if depth >= self.config.max_depth {
            errors.insert(
                node,
                SyntaxError::new(
                    format!(
                        "Maximum command nesting depth ({}) exceeded.",
                        self.config.max_depth
                    ),
                    start,
                ),
            );
            return NodeParse {
                context: context.clone(),
                cursor: start,
                errors,
            };
        }

        for child in self.relevant_children(node, cursor) {
            // An empty match never competes with a concrete one.
            if self.is_zero_width(child) && !potentials.is_empty() {
                continue;
            }
            // Denied children are invisible: skipped without recording an
            // error, so they cannot leak into failure messages.
            if !self.resolver.can_use(
                is_root,
                &self.tree,
                child,
                self.authorizer.as_ref(),
                source,
            ) {
                continue;
            }

            let mut branch_context = context.clone();
            let mut branch_cursor = cursor.clone();
            if let Err(err) = self.consume_child(child, &mut branch_cursor, &mut branch_context) {
                // Backtrack: one failed child never aborts the sibling scan.
                errors.insert(child, err);
                continue;
            }
            branch_context.push_node(child);
            if let Some(action) = self.tree.node(child).action() {
                branch_context.set_action(action.clone());
            }

            let redirect = self.tree.node(child).redirect();
            let lookahead = if redirect.is_some() { 1 } else { 2 };
            if branch_cursor.can_read_n(lookahead) {
                branch_cursor.skip(); // the argument separator
                if let Some(target) = redirect {
                    // A redirect means "this path and no other": the spliced
                    // sub-parse replaces any remaining sibling scan.
                    let sub_context = ParseContext::new(target);
                    let sub = self.parse_node(
                        false,
                        target,
                        &branch_cursor,
                        &sub_context,
                        source,
                        depth + 1,
                    );
                    branch_context.set_child(sub.context);
                    return NodeParse {
                        context: branch_context,
                        cursor: sub.cursor,
                        errors: sub.errors,
                    };
                }
                let sub = self.parse_node(
                    false,
                    child,
                    &branch_cursor,
                    &branch_context,
                    source,
                    depth + 1,
                );
                potentials.push(sub);
            } else if !branch_cursor.can_read() && self.has_empty_matching_children(child) {
                // Out of input, but a child can still bind an empty span;
                // this is how a bare group name reaches its default action.
                let sub = self.parse_node(
                    false,
                    child,
                    &branch_cursor,
                    &branch_context,
                    source,
                    depth + 1,
                );
                potentials.push(sub);
            } else {
                potentials.push(NodeParse {
                    context: branch_context,
                    cursor: branch_cursor.cursor(),
                    errors: HashMap::new(),
                });
            }
        }

        if potentials.len() > 1 {
            // Deterministic tie-break: full consumption beats partial, a
            // clean parse beats one with recorded errors, and discovery
            // order settles the rest (the sort is stable).
            potentials.sort_by_key(|p| (p.cursor < input_len, !p.errors.is_empty()));
        }

        match potentials.into_iter().next() {
            Some(best) => best,
            None => NodeParse {
                context: context.clone(),
                cursor: start,
                errors,
            },
        }
    }

    fn consume_child(
        &self,
        child: NodeId,
        cursor: &mut InputCursor<'_>,
        context: &mut ParseContext,
    ) -> Result<(), SyntaxError> {
        let start = cursor.cursor();
        let node = self.tree.node(child);
        match node.kind() {
            NodeKind::Root => {
                return Err(SyntaxError::new("The root node cannot be matched.", start));
            }
            NodeKind::Literal { name } => {
                let word = cursor.read_word();
                if word != name.as_str() {
                    return Err(SyntaxError::new(
                        format!("Expected literal '{name}'."),
                        start,
                    ));
                }
            }
            NodeKind::Argument { name, parser } => {
                // A failing injected parser eliminates this branch only; its
                // message survives, tagged with the failure position.
                let value = parser.parse(cursor)?;
                if let Some(value) = value {
                    context.insert_arg(name.clone(), value);
                }
            }
        }

        if cursor.cursor() == start {
            // Zero-width match: give back the separator skipped on the way
            // in so the next level still sees a token boundary.
            if start > 0 && cursor.char_at(start - 1) == Some(ARGUMENT_SEPARATOR) {
                cursor.set_cursor(start - 1);
            }
        } else if cursor.can_read() && cursor.peek() != Some(ARGUMENT_SEPARATOR) {
            return Err(SyntaxError::new(
                "Expected whitespace to end one argument, but found trailing data.",
                cursor.cursor(),
            ));
        }
        Ok(())
    }

    /// Children worth attempting against the unread input: the exact literal
    /// for the next token (if any), then concrete argument children in
    /// insertion order, then zero-width parsers, with the distinguished
    /// default child strictly last.
    fn relevant_children(&self, node: NodeId, cursor: &InputCursor<'_>) -> Vec<NodeId> {
        let n = self.tree.node(node);
        let mut out = Vec::new();

        let token = cursor.peek_word();
        if !token.is_empty()
            && let Some(literal) = n.literal_child(token)
        {
            out.push(literal);
        }

        let mut zero_width: Vec<NodeId> = Vec::new();
        for &child in n.children() {
            if matches!(self.tree.node(child).kind(), NodeKind::Argument { .. }) {
                if self.is_zero_width(child) {
                    zero_width.push(child);
                } else {
                    out.push(child);
                }
            }
        }
        zero_width.sort_by_key(|&c| self.tree.node(c).is_default());
        out.extend(zero_width);
        out
    }

    fn is_zero_width(&self, node: NodeId) -> bool {
        self.tree
            .node(node)
            .parser()
            .is_some_and(|p| p.can_match_empty())
    }

    fn has_empty_matching_children(&self, node: NodeId) -> bool {
        self.tree
            .children(node)
            .iter()
            .any(|&c| self.is_zero_width(c))
    }

    // --- FAILURE AGGREGATION ---

    fn aggregate_error(&self, input: &str, result: &ParseResult) -> DispatchError {
        if let Some(error) = self.deepest_error(&result.errors) {
            return DispatchError::Syntax(error.clone());
        }
        if result.context.nodes().len() > 1 || result.context.child().is_some() {
            // Matched part of the tree but could not account for the whole
            // line.
            let message = if result.consumed < input.len() {
                "Incorrect argument for command."
            } else {
                "Incomplete command; expected more input."
            };
            return DispatchError::Syntax(SyntaxError::new(message, result.consumed));
        }
        DispatchError::UnknownCommand {
            input: input.to_string(),
        }
    }

    /// The error attached to the deepest attempted node: the longest partial
    /// match is the most informative thing to show.
    fn deepest_error<'e>(
        &self,
        errors: &'e HashMap<NodeId, SyntaxError>,
    ) -> Option<&'e SyntaxError> {
        errors
            .iter()
            .max_by_key(|(id, err)| (self.tree.depth(**id), err.cursor, id.index()))
            .map(|(_, err)| err)
    }

    // --- AMBIGUITY DETECTION ---

    fn find_ambiguities_at<F>(&self, node: NodeId, consumer: &mut F)
    where
        F: FnMut(&Ambiguity),
    {
        let children = self.tree.children(node);
        for (i, &first) in children.iter().enumerate() {
            for &second in &children[i + 1..] {
                let mut examples: Vec<String> = Vec::new();
                for example in self.node_examples(first) {
                    if self.is_valid_input(second, &example) {
                        examples.push(example);
                    }
                }
                for example in self.node_examples(second) {
                    if self.is_valid_input(first, &example) && !examples.contains(&example) {
                        examples.push(example);
                    }
                }
                if !examples.is_empty() {
                    consumer(&Ambiguity {
                        parent: node,
                        first,
                        second,
                        examples,
                    });
                }
            }
        }
        for &child in children {
            // Redirect targets are reached through their own parent.
            self.find_ambiguities_at(child, consumer);
        }
    }

    fn node_examples(&self, node: NodeId) -> Vec<String> {
        match self.tree.node(node).kind() {
            NodeKind::Root => Vec::new(),
            NodeKind::Literal { name } => vec![name.clone()],
            NodeKind::Argument { parser, .. } => parser.examples(),
        }
    }

    fn is_valid_input(&self, node: NodeId, sample: &str) -> bool {
        match self.tree.node(node).kind() {
            NodeKind::Root => false,
            NodeKind::Literal { name } => name == sample,
            NodeKind::Argument { parser, .. } => {
                let mut cursor = InputCursor::new(sample);
                parser.parse(&mut cursor).is_ok() && !cursor.can_read()
            }
        }
    }
}

// MARK: --- UNIT TESTS ---
