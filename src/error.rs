use thiserror::Error;

use crate::bind::BindFailure;

/// Top-level error type for the dragon-bind library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("binding error: {0}")]
    Bind(#[from] BindFailure),

    #[error("{0} has no configuration properties metadata")]
    MissingAnnotation(String),
}
