use thiserror::Error;

/// Malformed or disallowed markup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("markup is empty")]
    Empty,
    #[error("markup has {0} root nodes, expected exactly one")]
    MultipleRoots(usize),
    #[error("unterminated {what} starting at byte {offset}")]
    Unterminated { what: &'static str, offset: usize },
    #[error("unexpected character {found:?} at byte {offset}")]
    UnexpectedChar { found: char, offset: usize },
    #[error("end tag </{found}> does not close <{expected}>")]
    MismatchedEndTag { expected: String, found: String },
    #[error("end tag </{0}> has no matching start tag")]
    StrayEndTag(String),
    #[error("element <{0}> is never closed")]
    Unclosed(String),
    #[error("<{0}> is not an allowed node")]
    NotAllowed(String),
}
