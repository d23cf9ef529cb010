//! Error types for shieldrule.

use thiserror::Error;

/// Error type for shieldrule operations.
///
/// Every variant is recoverable by the caller: a failed parse of one source
/// never touches rule sets loaded from other sources.
#[derive(Error, Debug)]
pub enum Error {
    /// Zero-length input
    #[error("empty rule data")]
    EmptyData,

    /// Input is not valid UTF-8 text
    #[error("rule data is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// Dialect-specific structural failure
    #[error("syntax error{}: {message}", line_suffix(.line))]
    Syntax {
        line: Option<usize>,
        message: String,
    },

    /// Top-level document shape not recognized
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// No parser registered for the requested format
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Invalid domain in strict mode
    #[error("invalid domain {domain:?}{}: {reason}", line_suffix(.line))]
    InvalidDomain {
        line: Option<usize>,
        domain: String,
        reason: DomainError,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(n) => format!(" at line {}", n),
        None => String::new(),
    }
}

impl Error {
    /// Build a syntax error for an optional line number.
    pub(crate) fn syntax(line: Option<usize>, message: impl Into<String>) -> Self {
        Error::Syntax {
            line,
            message: message.into(),
        }
    }

    /// Whether this error means no parser exists for the requested format.
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, Error::UnsupportedFormat(_))
    }
}

/// Result type alias for shieldrule operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for domain pattern validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Empty pattern
    #[error("empty domain pattern")]
    Empty,

    /// Leading, trailing or consecutive dots
    #[error("misplaced dot in domain pattern")]
    MisplacedDot,

    /// Longer than 253 characters
    #[error("domain pattern too long ({0} characters)")]
    TooLong(usize),

    /// A label longer than 63 characters
    #[error("domain label too long: {0}")]
    LabelTooLong(String),

    /// Characters outside the hostname alphabet, or a misplaced wildcard
    #[error("invalid characters in domain pattern")]
    InvalidCharacters,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_display_with_line() {
        let err = Error::syntax(Some(3), "unexpected token");
        assert_eq!(err.to_string(), "syntax error at line 3: unexpected token");

        let err = Error::syntax(None, "bad");
        assert_eq!(err.to_string(), "syntax error: bad");
    }

    #[test]
    fn test_invalid_domain_display() {
        let err = Error::InvalidDomain {
            line: Some(7),
            domain: "bad..com".to_string(),
            reason: DomainError::MisplacedDot,
        };
        let text = err.to_string();
        assert!(text.contains("bad..com"));
        assert!(text.contains("line 7"));
    }

    #[test]
    fn test_unsupported_format_flag() {
        assert!(Error::UnsupportedFormat("toml".into()).is_unsupported_format());
        assert!(!Error::EmptyData.is_unsupported_format());
    }
}
