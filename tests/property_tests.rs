//! Property-based tests for the dispatcher and permission resolver.
//!
//! These use proptest to verify invariants hold across randomly generated
//! inputs: parsing is total and deterministic, and derived permission
//! strings always stay inside their restricted alphabet.

use std::sync::Arc;

use proptest::prelude::*;

use bramble::core::args::{integer, optional_word, remaining, word};
use bramble::core::builder::{argument, literal};
use bramble::core::context::{CommandSource, NamedSource};
use bramble::core::dispatcher::{DispatchError, Dispatcher};
use bramble::core::permission::{Authorizer, OwnerLookup};

struct AllowAll;

impl Authorizer for AllowAll {
    fn is_authorized(&self, _permission: &str, _source: &dyn CommandSource) -> bool {
        true
    }
}

struct StaticOwners;

impl OwnerLookup for StaticOwners {
    fn owner_of(&self, _root_segment: &str) -> Option<String> {
        Some("core".to_string())
    }
}

/// A small but representative tree: literals, typed arguments, a greedy
/// tail, optional zero-width arguments, a group default, and an alias.
fn build_dispatcher() -> Dispatcher {
    let mut d = Dispatcher::new(Arc::new(AllowAll), Arc::new(StaticOwners));
    d.register(literal("greet").then(argument("name", word()).executes(|_| Ok(1))))
        .unwrap();
    d.register(
        literal("say").then(argument("message", remaining()).executes(|_| Ok(2))),
    )
    .unwrap();
    d.register(
        literal("set")
            .then(argument("count", integer()).executes(|_| Ok(3)))
            .then(argument("label", word()).executes(|_| Ok(4))),
    )
    .unwrap();
    d.register(
        literal("group")
            .then(literal("a").executes(|_| Ok(5)))
            .then(argument("rest", optional_word()).executes(|_| Ok(6)))
            .default_executes(|_| Ok(7)),
    )
    .unwrap();
    let greet = d.tree().get_child(d.tree().root(), "greet").unwrap();
    d.alias("hi", greet).unwrap();
    d
}

/// Collapses an execute outcome to a comparable shape.
fn outcome(result: Result<i32, DispatchError>) -> String {
    match result {
        Ok(code) => format!("ok:{code}"),
        Err(DispatchError::Syntax(err)) => format!("syntax:{}:{}", err.cursor, err.message),
        Err(DispatchError::UnknownCommand { input }) => format!("unknown:{input}"),
        Err(DispatchError::Execution(err)) => format!("exec:{}", err.message()),
    }
}

proptest! {
    /// Dispatch is total: no input line panics the parser.
    #[test]
    fn arbitrary_input_never_panics(input in "[a-z0-9 !#]{0,32}") {
        let d = build_dispatcher();
        let source = NamedSource::new("fuzz");
        let _ = d.execute(&input, &source);
    }

    /// Dispatching the same line twice yields the same outcome, winning node
    /// path, and argument values.
    #[test]
    fn dispatch_is_deterministic(input in "(greet|say|set|group|hi|zzz)( [a-z0-9]{0,8}){0,3}") {
        let d = build_dispatcher();
        let source = NamedSource::new("fuzz");

        let first_parse = d.parse(&input, &source);
        let second_parse = d.parse(&input, &source);
        prop_assert_eq!(first_parse.context.nodes(), second_parse.context.nodes());
        prop_assert_eq!(first_parse.context.args(), second_parse.context.args());
        prop_assert_eq!(first_parse.consumed, second_parse.consumed);

        let first = outcome(d.execute(&input, &source));
        let second = outcome(d.execute(&input, &source));
        prop_assert_eq!(first, second);
    }

    /// Permission strings stay inside `[a-z0-9]` segments joined by dots, no
    /// matter what the registered command was named.
    #[test]
    fn permission_strings_are_always_sanitized(name in "[a-zA-Z0-9_!\\-]{1,12}") {
        let mut d = Dispatcher::new(Arc::new(AllowAll), Arc::new(StaticOwners));
        let node = d.register(literal(name).executes(|_| Ok(0))).unwrap();
        let permission = d.permission_string(node);
        prop_assert!(
            permission
                .split('.')
                .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())),
            "unsanitized permission: {}",
            permission
        );
    }

    /// A memoized lookup never drifts from its first derivation.
    #[test]
    fn memoized_permission_is_stable(name in "[a-z]{1,10}") {
        let mut d = Dispatcher::new(Arc::new(AllowAll), Arc::new(StaticOwners));
        let node = d.register(literal(name).executes(|_| Ok(0))).unwrap();
        let first = d.permission_string(node);
        for _ in 0..4 {
            prop_assert_eq!(&first, &d.permission_string(node));
        }
    }
}
