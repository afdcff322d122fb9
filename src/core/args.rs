// src/core/args.rs

use std::sync::Arc;

use crate::core::cursor::{InputCursor, SyntaxError};

/// A parsed argument value, as stored in an invocation's argument map.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// The value-parser collaborator injected into argument nodes.
///
/// A parser consumes a span of input from the cursor and yields the value to
/// record under the node's name. `Ok(None)` means the parser matched but has
/// nothing to record; this is how empty matches (group defaults, optional
/// arguments without a fallback) participate in parsing without polluting the
/// argument map.
pub trait ValueParser: Send + Sync {
    fn parse(&self, cursor: &mut InputCursor<'_>) -> Result<Option<ArgValue>, SyntaxError>;

    /// Whether this parser can succeed on an empty span. Zero-width parsers
    /// are scanned after all concrete siblings and are skipped entirely once
    /// a concrete candidate exists.
    fn can_match_empty(&self) -> bool {
        false
    }

    /// Sample inputs this parser accepts, used only by the offline ambiguity
    /// detector.
    fn examples(&self) -> Vec<String> {
        Vec::new()
    }
}

// --- BUILT-IN PARSERS ---

/// Matches a single non-empty token.
struct WordParser;

impl ValueParser for WordParser {
    fn parse(&self, cursor: &mut InputCursor<'_>) -> Result<Option<ArgValue>, SyntaxError> {
        let word = cursor.read_nonempty_word("a word")?;
        Ok(Some(ArgValue::Str(word.to_string())))
    }

    fn examples(&self) -> Vec<String> {
        vec!["word".to_string(), "value_1".to_string()]
    }
}

/// Greedily matches the non-empty remainder of the line.
struct RemainingParser;

impl ValueParser for RemainingParser {
    fn parse(&self, cursor: &mut InputCursor<'_>) -> Result<Option<ArgValue>, SyntaxError> {
        let start = cursor.cursor();
        let rest = cursor.read_remaining();
        if rest.is_empty() {
            return Err(SyntaxError::new("Expected remaining input.", start));
        }
        Ok(Some(ArgValue::Str(rest.to_string())))
    }

    fn examples(&self) -> Vec<String> {
        vec!["word".to_string(), "several words here".to_string()]
    }
}

/// Matches a signed integer token, optionally bounds-checked.
struct IntegerParser {
    min: Option<i64>,
    max: Option<i64>,
}

impl ValueParser for IntegerParser {
    fn parse(&self, cursor: &mut InputCursor<'_>) -> Result<Option<ArgValue>, SyntaxError> {
        let start = cursor.cursor();
        let word = cursor.read_nonempty_word("an integer")?;
        let value: i64 = word
            .parse()
            .map_err(|_| SyntaxError::new(format!("Invalid integer '{word}'."), start))?;
        if let Some(min) = self.min
            && value < min
        {
            return Err(SyntaxError::new(
                format!("Integer {value} is below the minimum of {min}."),
                start,
            ));
        }
        if let Some(max) = self.max
            && value > max
        {
            return Err(SyntaxError::new(
                format!("Integer {value} is above the maximum of {max}."),
                start,
            ));
        }
        Ok(Some(ArgValue::Int(value)))
    }

    fn examples(&self) -> Vec<String> {
        vec!["0".to_string(), "123".to_string(), "-42".to_string()]
    }
}

/// Matches the tokens `true` or `false`.
struct BooleanParser;

impl ValueParser for BooleanParser {
    fn parse(&self, cursor: &mut InputCursor<'_>) -> Result<Option<ArgValue>, SyntaxError> {
        let start = cursor.cursor();
        let word = cursor.read_nonempty_word("'true' or 'false'")?;
        match word {
            "true" => Ok(Some(ArgValue::Bool(true))),
            "false" => Ok(Some(ArgValue::Bool(false))),
            other => Err(SyntaxError::new(
                format!("Expected 'true' or 'false', found '{other}'."),
                start,
            )),
        }
    }

    fn examples(&self) -> Vec<String> {
        vec!["true".to_string(), "false".to_string()]
    }
}

/// Matches a token when one is present, or an empty span otherwise.
///
/// On an empty match the optional fallback value (if any) is recorded, so a
/// command can read the argument uniformly whether or not it was supplied.
struct OptionalWordParser {
    fallback: Option<ArgValue>,
}

impl ValueParser for OptionalWordParser {
    fn parse(&self, cursor: &mut InputCursor<'_>) -> Result<Option<ArgValue>, SyntaxError> {
        let word = cursor.peek_word();
        if word.is_empty() {
            return Ok(self.fallback.clone());
        }
        let word = cursor.read_word();
        Ok(Some(ArgValue::Str(word.to_string())))
    }

    fn can_match_empty(&self) -> bool {
        true
    }

    fn examples(&self) -> Vec<String> {
        vec!["word".to_string(), String::new()]
    }
}

/// Always matches an empty span and records nothing. Backs the hidden child
/// that carries a group's default action.
pub(crate) struct EmptyParser;

impl ValueParser for EmptyParser {
    fn parse(&self, _cursor: &mut InputCursor<'_>) -> Result<Option<ArgValue>, SyntaxError> {
        Ok(None)
    }

    fn can_match_empty(&self) -> bool {
        true
    }
}

// --- CONSTRUCTORS ---

/// A single non-empty token.
pub fn word() -> Arc<dyn ValueParser> {
    Arc::new(WordParser)
}

/// The non-empty remainder of the line.
pub fn remaining() -> Arc<dyn ValueParser> {
    Arc::new(RemainingParser)
}

/// An unbounded signed integer.
pub fn integer() -> Arc<dyn ValueParser> {
    Arc::new(IntegerParser {
        min: None,
        max: None,
    })
}

/// A signed integer within inclusive bounds.
pub fn integer_between(min: i64, max: i64) -> Arc<dyn ValueParser> {
    Arc::new(IntegerParser {
        min: Some(min),
        max: Some(max),
    })
}

/// A `true`/`false` token.
pub fn boolean() -> Arc<dyn ValueParser> {
    Arc::new(BooleanParser)
}

/// An optional token; records nothing when absent.
pub fn optional_word() -> Arc<dyn ValueParser> {
    Arc::new(OptionalWordParser { fallback: None })
}

/// An optional token; records `fallback` when absent.
pub fn optional_word_or(fallback: &str) -> Arc<dyn ValueParser> {
    Arc::new(OptionalWordParser {
        fallback: Some(ArgValue::Str(fallback.to_string())),
    })
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_parser_reads_one_token() {
        let mut cursor = InputCursor::new("alpha beta");
        let value = word().parse(&mut cursor).unwrap();
        assert_eq!(value, Some(ArgValue::Str("alpha".to_string())));
        assert_eq!(cursor.cursor(), 5);
    }

    #[test]
    fn test_word_parser_rejects_empty() {
        let mut cursor = InputCursor::new("");
        let err = word().parse(&mut cursor).unwrap_err();
        assert_eq!(err.cursor, 0);
    }

    #[test]
    fn test_remaining_parser_is_greedy() {
        let mut cursor = InputCursor::new("hello there world");
        let value = remaining().parse(&mut cursor).unwrap();
        assert_eq!(
            value,
            Some(ArgValue::Str("hello there world".to_string()))
        );
        assert!(!cursor.can_read());
    }

    #[test]
    fn test_integer_parser_bounds() {
        let parser = integer_between(1, 10);

        let mut ok = InputCursor::new("7");
        assert_eq!(parser.parse(&mut ok).unwrap(), Some(ArgValue::Int(7)));

        let mut low = InputCursor::new("0");
        assert!(parser.parse(&mut low).is_err());

        let mut garbage = InputCursor::new("seven");
        let err = parser.parse(&mut garbage).unwrap_err();
        assert!(err.message.contains("seven"));
    }

    #[test]
    fn test_boolean_parser() {
        let mut cursor = InputCursor::new("true");
        assert_eq!(
            boolean().parse(&mut cursor).unwrap(),
            Some(ArgValue::Bool(true))
        );

        let mut bad = InputCursor::new("yes");
        assert!(boolean().parse(&mut bad).is_err());
    }

    #[test]
    fn test_optional_word_matches_empty_without_moving() {
        let parser = optional_word();
        assert!(parser.can_match_empty());

        let mut cursor = InputCursor::new("");
        assert_eq!(parser.parse(&mut cursor).unwrap(), None);
        assert_eq!(cursor.cursor(), 0);
    }

    #[test]
    fn test_optional_word_fallback_recorded_on_empty() {
        let parser = optional_word_or("latest");
        let mut cursor = InputCursor::new("");
        assert_eq!(
            parser.parse(&mut cursor).unwrap(),
            Some(ArgValue::Str("latest".to_string()))
        );
    }

    #[test]
    fn test_optional_word_consumes_when_present() {
        let parser = optional_word_or("latest");
        let mut cursor = InputCursor::new("v2");
        assert_eq!(
            parser.parse(&mut cursor).unwrap(),
            Some(ArgValue::Str("v2".to_string()))
        );
        assert!(!cursor.can_read());
    }
}
