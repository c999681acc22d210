use std::fmt;
use std::sync::Arc;

use validator::Validate;

use super::{Configurable, Shape};
use crate::properties::ConfigurationProperties;
use crate::validation::{ConstraintValidator, Validator};

/// Describes one bind target: its shape, an optional existing value to bind
/// over, its binding metadata and the validators it must pass.
#[must_use]
pub struct Bindable<T> {
    shape: Shape,
    existing: Option<T>,
    properties: Option<ConfigurationProperties>,
    constraint: Option<Arc<dyn Validator<T>>>,
    validators: Vec<Arc<dyn Validator<T>>>,
    bean: Option<String>,
}

impl<T: Configurable> Bindable<T> {
    pub fn of() -> Self {
        Self::with_shape(T::shape())
    }
}

impl<T> Bindable<T> {
    /// A target with an explicitly supplied shape.
    pub fn with_shape(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            existing: None,
            properties: None,
            constraint: None,
            validators: Vec::new(),
            bean: None,
        }
    }

    pub fn with_properties(mut self, properties: ConfigurationProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Binds over `value`. Properties that are not present leave its fields as they are.
    pub fn with_existing_value(mut self, value: T) -> Self {
        self.existing = Some(value);
        self
    }

    /// Adds a validator. Validators run in the order they were added.
    pub fn with_validator(mut self, validator: impl Validator<T> + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Identity of the bound object, reported in failures.
    pub fn named(mut self, bean: impl Into<String>) -> Self {
        self.bean = Some(bean.into());
        self
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn existing(&self) -> Option<&T> {
        self.existing.as_ref()
    }

    pub fn properties(&self) -> Option<&ConfigurationProperties> {
        self.properties.as_ref()
    }

    pub fn bean(&self) -> Option<&str> {
        self.bean.as_deref()
    }

    /// The constraint validator, if any, followed by explicit validators.
    pub fn validators(&self) -> Vec<Arc<dyn Validator<T>>> {
        self.constraint.iter().chain(&self.validators).cloned().collect()
    }

    pub(crate) fn take_existing(&mut self) -> Option<T> {
        self.existing.take()
    }
}

impl<T: Validate> Bindable<T> {
    /// Checks the target's `#[validate(..)]` constraints before any explicit validator.
    pub fn validated(mut self) -> Self {
        self.constraint = Some(Arc::new(ConstraintValidator));
        self
    }
}

impl<T: fmt::Debug> fmt::Debug for Bindable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindable")
            .field("shape", &self.shape.type_name())
            .field("existing", &self.existing)
            .field("properties", &self.properties)
            .field("validated", &self.constraint.is_some())
            .field("validators", &self.validators.len())
            .field("bean", &self.bean)
            .finish()
    }
}
