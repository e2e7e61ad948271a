/// Errors produced while resolving a dotted path string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The path contains an empty segment (empty input, `..`, or a
    /// leading/trailing dot).
    #[error("malformed path {path:?}: segment {index} is empty")]
    EmptySegment { path: String, index: usize },

    /// A pre-split segment contains a literal `.`, which cannot be addressed.
    #[error("malformed path segment {segment:?}: segments cannot contain '.'")]
    DotInSegment { segment: String },
}

/// Result alias for path operations.
pub type PathResult<T> = Result<T, PathError>;
