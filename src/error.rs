use std::fmt;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Byte range into a voting source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Shape, type or value violations at the public boundary.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Missing word, id, topic or registered voting.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed voting expression.
    #[error("parse error at {span}: {message}")]
    Parse { message: String, span: Span },

    /// Unbound identifier, type error or arity mismatch during voting evaluation.
    #[error("eval error{}: {message}", .span.map(|s| format!(" at {s}")).unwrap_or_default())]
    Eval { message: String, span: Option<Span> },

    /// Persistence or streaming failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant broken; this is a bug, not a usage error.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl Error {
    pub fn invalid_input(msg: impl fmt::Display) -> Self {
        Self::InvalidInput(msg.to_string())
    }

    pub fn not_found(msg: impl fmt::Display) -> Self {
        Self::NotFound(msg.to_string())
    }

    pub fn eval(msg: impl fmt::Display, span: Option<Span>) -> Self {
        Self::Eval {
            message: msg.to_string(),
            span,
        }
    }

    pub fn parse(msg: impl fmt::Display, span: Span) -> Self {
        Self::Parse {
            message: msg.to_string(),
            span,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidInput(format!("json: {e}"))
    }
}
