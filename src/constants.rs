// src/constants.rs

/// The character separating tokens on a command line.
pub const ARGUMENT_SEPARATOR: char = ' ';

/// Hard bound on parse recursion depth. Tree depth is caller-controlled, so
/// the parser refuses to descend past this point instead of trusting it.
pub const MAX_PARSE_DEPTH: usize = 64;

/// Sentinel owner id used when a node's root segment cannot be attributed.
pub const UNKNOWN_OWNER: &str = "unknown";

/// Middle segment of every derived permission string.
pub const PERMISSION_INFIX: &str = "command";

/// Terminal segment of every derived permission string.
pub const PERMISSION_SUFFIX: &str = "root";

/// Replacement for a path segment that sanitizes down to nothing.
pub const EMPTY_SEGMENT_PLACEHOLDER: &str = "node";

/// Name given to the hidden child that carries a group's default action.
pub const DEFAULT_CHILD_NAME: &str = "default";

/// Priority at which advertised root commands are pre-registered with the
/// authorization backend.
pub const ADVERTISE_PRIORITY: u8 = 0;
