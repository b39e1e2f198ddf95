use chain_sol::SolError;
use thiserror::Error;

/// Resolution errors.
///
/// Every variant is terminal for the operation that raised it; nothing in
/// this crate retries.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The pattern matches no recognizer for the requested context.
    #[error("invalid syntax `{pattern}`: {reason}")]
    SyntaxInvalid { pattern: String, reason: String },

    /// A numeric value lies outside the declared width's bounds.
    #[error("{value} is out of range for {data_type}")]
    RangeViolation { value: String, data_type: String },

    /// `$name` is absent from the symbol table.
    #[error("unresolved reference: ${0}")]
    UnresolvedReference(String),

    /// A value is present but carries the wrong tag for the context.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("seed {index} is {len} bytes, the limit is 32")]
    InvalidSeedLength { index: usize, len: usize },

    #[error("field `{label}` ({width} bytes at offset {offset}) exceeds the {len}-byte buffer")]
    OffsetOutOfBounds {
        label: String,
        offset: usize,
        width: usize,
        len: usize,
    },

    /// Classification of an untagged value found no matching shape.
    #[error("unsupported value: {0}")]
    UnsupportedValue(String),

    #[error(transparent)]
    Chain(#[from] SolError),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Fieldless view of [`ResolveError`] for branching on the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SyntaxInvalid,
    RangeViolation,
    UnresolvedReference,
    TypeMismatch,
    InvalidSeedLength,
    OffsetOutOfBounds,
    UnsupportedValue,
    Chain,
    Config,
}

impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::SyntaxInvalid { .. } => ErrorKind::SyntaxInvalid,
            ResolveError::RangeViolation { .. } => ErrorKind::RangeViolation,
            ResolveError::UnresolvedReference(_) => ErrorKind::UnresolvedReference,
            ResolveError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            ResolveError::InvalidSeedLength { .. } => ErrorKind::InvalidSeedLength,
            ResolveError::OffsetOutOfBounds { .. } => ErrorKind::OffsetOutOfBounds,
            ResolveError::UnsupportedValue(_) => ErrorKind::UnsupportedValue,
            ResolveError::Chain(_) => ErrorKind::Chain,
            ResolveError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn syntax(pattern: &str, reason: impl Into<String>) -> Self {
        ResolveError::SyntaxInvalid {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn range(value: impl ToString, data_type: impl ToString) -> Self {
        ResolveError::RangeViolation {
            value: value.to_string(),
            data_type: data_type.to_string(),
        }
    }

    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        ResolveError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

pub type Result<T, E = ResolveError> = std::result::Result<T, E>;
