// src/core/cursor.rs

use thiserror::Error;

use crate::constants::ARGUMENT_SEPARATOR;

/// A positioned failure raised while reading or matching command input.
///
/// Argument parsers raise these with their own messages; the dispatcher
/// records them per attempted node and only surfaces one once every branch of
/// a parse has failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (at position {cursor})")]
pub struct SyntaxError {
    /// Human-readable description of what went wrong.
    pub message: String,
    /// Offset into the input line where the failure was detected.
    pub cursor: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, cursor: usize) -> Self {
        Self {
            message: message.into(),
            cursor,
        }
    }
}

/// A forward-only reader over a single command line.
///
/// The cursor supports mark/rewind through [`cursor`](Self::cursor) and
/// [`set_cursor`](Self::set_cursor): the backtracking parser snapshots a
/// position before attempting a branch and rewinds to it when the branch
/// fails. Positions are byte offsets into the original input; callers only
/// ever rewind to positions previously observed on the same input.
#[derive(Debug, Clone)]
pub struct InputCursor<'a> {
    input: &'a str,
    cursor: usize,
}

impl<'a> InputCursor<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, cursor: 0 }
    }

    /// The full input line this cursor reads.
    pub fn input(&self) -> &'a str {
        self.input
    }

    /// Current read position.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Rewinds (or advances) to a previously observed position.
    pub fn set_cursor(&mut self, position: usize) {
        self.cursor = position.min(self.input.len());
    }

    /// Whether at least one character remains.
    pub fn can_read(&self) -> bool {
        self.cursor < self.input.len()
    }

    /// Whether at least `n` characters remain.
    pub fn can_read_n(&self, n: usize) -> bool {
        self.input[self.cursor..].chars().take(n).count() == n
    }

    /// The next character, without consuming it.
    pub fn peek(&self) -> Option<char> {
        self.input[self.cursor..].chars().next()
    }

    /// The character at an arbitrary previously observed position.
    pub fn char_at(&self, position: usize) -> Option<char> {
        self.input.get(position..).and_then(|s| s.chars().next())
    }

    /// Consumes a single character.
    pub fn skip(&mut self) {
        if let Some(c) = self.peek() {
            self.cursor += c.len_utf8();
        }
    }

    /// The unread remainder of the input, without consuming it.
    pub fn remaining_str(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    /// The next token (span up to the argument separator), without consuming.
    pub fn peek_word(&self) -> &'a str {
        let rest = self.remaining_str();
        match rest.find(ARGUMENT_SEPARATOR) {
            Some(end) => &rest[..end],
            None => rest,
        }
    }

    /// Consumes and returns the next token. The token may be empty when the
    /// cursor sits on a separator or at the end of input.
    pub fn read_word(&mut self) -> &'a str {
        let word = self.peek_word();
        self.cursor += word.len();
        word
    }

    /// Consumes and returns everything left on the line.
    pub fn read_remaining(&mut self) -> &'a str {
        let rest = self.remaining_str();
        self.cursor = self.input.len();
        rest
    }

    /// Consumes the next token, raising a positioned error when it is empty.
    pub fn read_nonempty_word(&mut self, expected: &str) -> Result<&'a str, SyntaxError> {
        let start = self.cursor;
        let word = self.read_word();
        if word.is_empty() {
            return Err(SyntaxError::new(format!("Expected {expected}."), start));
        }
        Ok(word)
    }
}

// MARK: --- UNIT TESTS ---
