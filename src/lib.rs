//! Binds layered, namespaced property sources into typed configuration.
//!
//! Property sources are ordered key/value layers; earlier layers win. A
//! target describes itself with a [`Shape`], and the [`Binder`] walks that
//! shape, expanding `${...}` placeholders and converting values as it goes.
//! Policies such as ignoring invalid fields, rejecting unknown keys and
//! validation are layers of a [`HandlerChain`] wrapped around every bind.
//!
//! Most applications only need [`ConfigurationPropertiesBinder`].

pub mod bind;
pub mod convert;
mod error;
pub mod handler;
pub mod properties;
pub mod resolve;
pub mod source;
pub mod validation;

pub use bind::{BindError, BindFailure, Bindable, Binder, Configurable, FailureKind, Shape};
pub use convert::{ConversionService, DataSize};
pub use error::Error;
pub use handler::{BindHandler, BindHandlerAdvisor, HandlerChain};
pub use properties::{ConfigurationProperties, ConfigurationPropertiesBinder};
pub use source::{EnvSource, PropertyName, PropertySource, PropertySources};
pub use validation::{PropertiesValidator, Validator, Violation, Violations};
