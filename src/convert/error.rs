use thiserror::Error;

/// Failure to expand a `${...}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PlaceholderError {
    #[error("could not resolve placeholder '${{{0}}}'")]
    Unresolvable(String),

    #[error("circular placeholder reference: {0}")]
    Cycle(String),

    #[error("unclosed placeholder (missing '}}') in '{0}'")]
    Unclosed(String),

    #[error("invalid placeholder name '{0}'")]
    InvalidName(String),

    #[error("cannot reference non-scalar value: {0}")]
    NonScalar(String),
}

/// Failure to coerce a raw value into the requested shape.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ConversionError {
    #[error("no converter found for {target}")]
    NoConverter { target: String },

    #[error("cannot convert '{value}' to {target}: {reason}")]
    Malformed {
        value: String,
        target: String,
        reason: String,
    },

    #[error("expected {expected} but found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("value '{value}' overflows {target}")]
    Overflow { value: String, target: String },

    #[error("unknown unit '{unit}' in '{value}'")]
    InvalidUnit { value: String, unit: String },

    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),
}

impl ConversionError {
    pub(crate) fn malformed(value: impl Into<String>, target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            value: value.into(),
            target: target.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn overflow(value: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Overflow {
            value: value.into(),
            target: target.into(),
        }
    }

    pub(crate) fn mismatch(expected: impl Into<String>, found: &toml::Value) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.type_str().to_string(),
        }
    }
}
