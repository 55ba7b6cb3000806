use crate::span::Range;
use thiserror::Error;

/// A syntax error with the range it was detected at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message}", range.start)]
pub struct ParseError {
    pub message: String,
    pub range: Range,
}

impl ParseError {
    pub fn new(message: impl Into<String>, range: Range) -> Self {
        Self {
            message: message.into(),
            range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Position;

    #[test]
    fn display_includes_start_position() {
        let error = ParseError::new(
            "expected ';' after statement",
            Range::new(Position::new(3, 7), Position::new(3, 9)),
        );
        assert_eq!(error.to_string(), "3:7: expected ';' after statement");
    }
}
