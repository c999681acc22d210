use thiserror::Error;

use crate::convert::ConversionError;
use crate::source::{PropertyName, PropertyNameError};
use crate::validation::Violations;

/// A failure raised while binding one node of a target.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BindError {
    #[error("failed to convert property '{name}' from {origin}: {source}")]
    Conversion {
        name: PropertyName,
        origin: String,
        source: ConversionError,
    },

    #[error("unbound properties: {}", .names.join(", "))]
    UnboundElements { names: Vec<String> },

    #[error("validation failed: {0}")]
    Validation(Violations),

    #[error("invalid namespace: {0}")]
    InvalidName(#[from] PropertyNameError),

    #[error("failed to materialize bound value: {0}")]
    Materialize(#[source] toml::de::Error),

    #[error("failed to read existing value: {0}")]
    Existing(#[source] toml::ser::Error),

    #[error("{0}")]
    Custom(String),
}

/// Coarse classification of a [`BindError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Conversion,
    Placeholder,
    UnboundElements,
    Validation,
    InvalidName,
    Materialize,
    Custom,
}

impl BindError {
    pub fn kind(&self) -> FailureKind {
        match self {
            BindError::Conversion {
                source: ConversionError::Placeholder(_),
                ..
            } => FailureKind::Placeholder,
            BindError::Conversion { .. } => FailureKind::Conversion,
            BindError::UnboundElements { .. } => FailureKind::UnboundElements,
            BindError::Validation(_) => FailureKind::Validation,
            BindError::InvalidName(_) => FailureKind::InvalidName,
            BindError::Materialize(_) | BindError::Existing(_) => FailureKind::Materialize,
            BindError::Custom(_) => FailureKind::Custom,
        }
    }

    /// True for a conversion of `name` itself that found no converter.
    pub fn is_converter_not_found_for(&self, name: &PropertyName) -> bool {
        matches!(
            self,
            BindError::Conversion {
                name: failed,
                source: ConversionError::NoConverter { .. },
                ..
            } if failed == name
        )
    }
}

/// The outer failure of a bind call, with the context needed to report it.
#[derive(Debug, Error)]
#[error("failed to bind properties under '{namespace}' to {target}: {cause}")]
pub struct BindFailure {
    namespace: String,
    target: String,
    bean: Option<String>,
    #[source]
    cause: BindError,
}

impl BindFailure {
    pub(crate) fn new(namespace: &str, target: String, bean: Option<String>, cause: BindError) -> Self {
        Self {
            namespace: namespace.to_string(),
            target,
            bean,
            cause,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Type name of the target shape.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Identity of the bound object, when the caller supplied one.
    pub fn bean(&self) -> Option<&str> {
        self.bean.as_deref()
    }

    pub fn cause(&self) -> &BindError {
        &self.cause
    }

    pub fn into_cause(self) -> BindError {
        self.cause
    }

    pub fn kind(&self) -> FailureKind {
        self.cause.kind()
    }
}
