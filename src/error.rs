use std::fmt;
use thiserror::Error;

/// 1-based position in the program text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed token: unterminated string or regex, stray character
    #[error("lexical error at {location}: {message}")]
    Lexer {
        message: String,
        location: SourceLocation,
    },

    /// Grammar or static check failure, raised before anything runs
    #[error("syntax error at {location}: {message}")]
    Syntax {
        message: String,
        location: SourceLocation,
    },

    #[error("runtime error: {message}")]
    Runtime { message: String },

    #[error("runtime error at {location}: {message}")]
    RuntimeAt {
        message: String,
        location: SourceLocation,
    },

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    /// A dynamic regex (string used as a pattern, FS, RS) failed to compile
    #[error("bad regex: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    pub fn lexer(message: impl Into<String>, line: usize, column: usize) -> Self {
        let location = SourceLocation::new(line, column);
        Self::Lexer { message: message.into(), location }
    }

    pub fn syntax(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::Syntax { message: message.into(), location }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime { message: message.into() }
    }

    pub fn runtime_at(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::RuntimeAt { message: message.into(), location }
    }

    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Error::Lexer { location, .. }
            | Error::Syntax { location, .. }
            | Error::RuntimeAt { location, .. } => Some(*location),
            Error::Runtime { .. } | Error::Io(_) | Error::Regex(_) => None,
        }
    }

    pub fn line(&self) -> Option<usize> {
        self.location().map(|location| location.line)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        assert_eq!(SourceLocation::new(10, 5).to_string(), "10:5");
    }

    #[test]
    fn test_messages() {
        let err = Error::lexer("unterminated string", 1, 5);
        assert_eq!(err.to_string(), "lexical error at 1:5: unterminated string");

        let err = Error::syntax("expected expression", SourceLocation::new(2, 10));
        assert_eq!(err.to_string(), "syntax error at 2:10: expected expression");

        let err = Error::runtime("division by zero");
        assert_eq!(err.to_string(), "runtime error: division by zero");
    }

    #[test]
    fn test_location_only_for_source_errors() {
        let at = Error::runtime_at("can't use scalar as array", SourceLocation::new(5, 3));
        assert_eq!(at.location(), Some(SourceLocation::new(5, 3)));
        assert_eq!(at.line(), Some(5));
        assert_eq!(Error::runtime("x").line(), None);

        let io: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(io, Error::Io(_)));
        assert_eq!(io.location(), None);
    }

    #[test]
    fn test_regex_conversion() {
        let err: Error = regex::Regex::new("[invalid").unwrap_err().into();
        assert!(err.to_string().starts_with("bad regex"));
    }
}
