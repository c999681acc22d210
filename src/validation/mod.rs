//! Validation of fully bound candidates.
//!
//! Validators run once per top-level bind, on the materialized target, in
//! registration order. Validators shared by every target run first. The
//! first validator that reports violations aborts the bind; later
//! validators never see the candidate.

mod constraint;

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use toml::{Table, Value};

use crate::bind::{merge_values, BindContext, BindError, Shape};
use crate::handler::BindHandler;
use crate::source::PropertyName;

pub use constraint::ConstraintValidator;

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub rejected: Option<String>,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rejected: None,
            message: message.into(),
        }
    }

    pub fn with_rejected(mut self, value: impl Into<String>) -> Self {
        self.rejected = Some(value.into());
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)?;
        if let Some(rejected) = &self.rejected {
            write!(f, " (rejected value {rejected})")?;
        }
        Ok(())
    }
}

/// A non-empty set of violations reported by one validator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.0.push(violation);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), Violations> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<Violation> for Violations {
    fn from(violation: Violation) -> Self {
        Self(vec![violation])
    }
}

impl FromIterator<Violation> for Violations {
    fn from_iter<I: IntoIterator<Item = Violation>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Violations {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

/// Checks a bound candidate.
///
/// Closures of the form `Fn(&T) -> Result<(), Violations>` implement this trait.
pub trait Validator<T>: Send + Sync {
    fn validate(&self, target: &T) -> Result<(), Violations>;
}

impl<T, F> Validator<T> for F
where
    F: Fn(&T) -> Result<(), Violations> + Send + Sync,
{
    fn validate(&self, target: &T) -> Result<(), Violations> {
        self(target)
    }
}

/// Validator registered once on the binder and run for every target it
/// supports, ahead of the target's own validators.
///
/// It sees the candidate as a value tree. Closures of the form
/// `Fn(&Shape, &Value) -> Result<(), Violations>` implement this trait and
/// support every target.
pub trait PropertiesValidator: Send + Sync {
    fn supports(&self, _shape: &Shape) -> bool {
        true
    }

    fn validate(&self, shape: &Shape, candidate: &Value) -> Result<(), Violations>;
}

impl<F> PropertiesValidator for F
where
    F: Fn(&Shape, &Value) -> Result<(), Violations> + Send + Sync,
{
    fn validate(&self, shape: &Shape, candidate: &Value) -> Result<(), Violations> {
        self(shape, candidate)
    }
}

/// Chain layer that validates the whole candidate when the top-level bind finishes.
///
/// The candidate is the existing value (if any) with the bound properties
/// merged over it. When neither exists the candidate is the target built
/// from an empty tree, the same value the facade hands back.
pub struct ValidationHandler<T> {
    shared: Vec<Arc<dyn PropertiesValidator>>,
    validators: Vec<Arc<dyn Validator<T>>>,
    _target: PhantomData<fn() -> T>,
}

impl<T> ValidationHandler<T> {
    pub fn new(validators: Vec<Arc<dyn Validator<T>>>) -> Self {
        Self {
            shared: Vec::new(),
            validators,
            _target: PhantomData,
        }
    }

    /// Runs `shared` before the typed validators.
    pub fn with_shared(mut self, shared: Vec<Arc<dyn PropertiesValidator>>) -> Self {
        self.shared = shared;
        self
    }
}

impl<T: DeserializeOwned> BindHandler for ValidationHandler<T> {
    fn on_finish(
        &self,
        _name: &PropertyName,
        shape: &Shape,
        ctx: &BindContext<'_>,
        result: Option<&Value>,
    ) -> Result<(), BindError> {
        if ctx.depth() != 0 {
            return Ok(());
        }
        let candidate =
            merge_values(ctx.prior().cloned(), result.cloned()).unwrap_or_else(|| Value::Table(Table::new()));
        for validator in self.shared.iter().filter(|v| v.supports(shape)) {
            validator.validate(shape, &candidate).map_err(BindError::Validation)?;
        }
        if self.validators.is_empty() {
            return Ok(());
        }
        let target: T = candidate.try_into().map_err(BindError::Materialize)?;
        for validator in &self.validators {
            validator.validate(&target).map_err(BindError::Validation)?;
        }
        Ok(())
    }
}
