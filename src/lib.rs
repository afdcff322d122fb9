//! bramble: a backtracking command-tree dispatcher with hierarchical
//! permission resolution.
//!
//! A single line of input is parsed against a registered tree of command
//! nodes (literals and typed arguments). The dispatcher walks the tree with
//! full backtracking, disambiguates between competing candidate parses,
//! resolves aliases through node redirects, and authorizes every step by
//! deriving (and memoizing) a dotted permission string per node.
//!
//! # Architecture
//!
//! - [`core::tree`] - the command node arena: structure only, no intelligence
//! - [`core::cursor`] - forward-only input reader with mark/rewind
//! - [`core::args`] - value-parser collaborator and the built-in parser set
//! - [`core::builder`] - chainable registration specs
//! - [`core::context`] - per-invocation parse state and the action view
//! - [`core::dispatcher`] - backtracking parser, tie-break, execution
//! - [`core::permission`] - permission derivation and the shared memo cache
//! - [`models`] - declarative TOML tree manifests
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bramble::core::args::word;
//! use bramble::core::builder::{argument, literal};
//! use bramble::core::context::{CommandSource, NamedSource};
//! use bramble::core::dispatcher::Dispatcher;
//! use bramble::core::permission::{Authorizer, OwnerLookup};
//!
//! struct AllowAll;
//! impl Authorizer for AllowAll {
//!     fn is_authorized(&self, _: &str, _: &dyn CommandSource) -> bool { true }
//! }
//! struct CoreOwner;
//! impl OwnerLookup for CoreOwner {
//!     fn owner_of(&self, _: &str) -> Option<String> { Some("core".into()) }
//! }
//!
//! let mut dispatcher = Dispatcher::new(Arc::new(AllowAll), Arc::new(CoreOwner));
//! dispatcher
//!     .register(literal("greet").then(argument("name", word()).executes(|inv| {
//!         println!("hello, {}", inv.str_arg("name").unwrap_or("?"));
//!         Ok(0)
//!     })))
//!     .unwrap();
//!
//! let source = NamedSource::new("console");
//! assert_eq!(dispatcher.execute("greet bob", &source).unwrap(), 0);
//! ```

pub mod constants;
pub mod core;
pub mod models;

pub use crate::core::context::{CommandSource, ExecError, NamedSource};
pub use crate::core::cursor::SyntaxError;
pub use crate::core::dispatcher::{DispatchError, Dispatcher, ParseResult};
pub use crate::core::permission::{Authorizer, OwnerLookup};
