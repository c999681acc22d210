//! Policies wrapped around the core bind.
//!
//! A [`HandlerChain`] is an ordered list of [`BindHandler`] layers, innermost
//! first. Each hook folds through the layers from the inside out, so the
//! layer closest to field resolution sees an event first. A failure travels
//! outward until some layer suppresses it.

mod ignore_errors;
mod ignore_top_level;
mod no_unbound;

use std::fmt;
use std::sync::Arc;

use toml::Value;

use crate::bind::{BindContext, BindError, Shape};
use crate::source::PropertyName;

pub use ignore_errors::IgnoreErrors;
pub use ignore_top_level::IgnoreTopLevelConverterNotFound;
pub use no_unbound::NoUnboundElements;

/// Hooks invoked around the bind of every node.
///
/// All hooks default to passing the event through unchanged.
///
/// Hooks only see failures raised while nodes are bound. Once the chain
/// has finished the root node, the bound tree is merged over the existing
/// value and deserialized into the target; a [`BindError::Materialize`]
/// raised there goes straight to the caller and no `on_failure` hook runs.
pub trait BindHandler: Send + Sync {
    /// Called before a node is bound.
    fn on_start(&self, _name: &PropertyName, _shape: &Shape, _ctx: &BindContext<'_>) -> Result<(), BindError> {
        Ok(())
    }

    /// Called with a successfully bound value. May replace it.
    fn on_success(
        &self,
        _name: &PropertyName,
        _shape: &Shape,
        _ctx: &BindContext<'_>,
        value: Value,
    ) -> Result<Value, BindError> {
        Ok(value)
    }

    /// Called when binding the node failed.
    ///
    /// Returning `Ok` suppresses the failure and yields the given value
    /// (`None` leaves the node unbound). Returning `Err` passes a failure on.
    fn on_failure(
        &self,
        _name: &PropertyName,
        _shape: &Shape,
        _ctx: &BindContext<'_>,
        error: BindError,
    ) -> Result<Option<Value>, BindError> {
        Err(error)
    }

    /// Called once the node is bound, whether or not it produced a value.
    fn on_finish(
        &self,
        _name: &PropertyName,
        _shape: &Shape,
        _ctx: &BindContext<'_>,
        _result: Option<&Value>,
    ) -> Result<(), BindError> {
        Ok(())
    }
}

/// An immutable, ordered stack of handler layers.
#[derive(Clone, Default)]
pub struct HandlerChain {
    layers: Vec<Arc<dyn BindHandler>>,
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain").field("layers", &self.layers.len()).finish()
    }
}

impl HandlerChain {
    /// A chain that passes everything through.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a chain with `handler` as the new outermost layer.
    #[must_use]
    pub fn wrap(self, handler: impl BindHandler + 'static) -> Self {
        self.wrap_arc(Arc::new(handler))
    }

    #[must_use]
    pub fn wrap_arc(mut self, handler: Arc<dyn BindHandler>) -> Self {
        self.layers.push(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub(crate) fn start(&self, name: &PropertyName, shape: &Shape, ctx: &BindContext<'_>) -> Result<(), BindError> {
        self.layers.iter().try_for_each(|layer| layer.on_start(name, shape, ctx))
    }

    pub(crate) fn success(
        &self,
        name: &PropertyName,
        shape: &Shape,
        ctx: &BindContext<'_>,
        value: Value,
    ) -> Result<Value, BindError> {
        self.layers
            .iter()
            .try_fold(value, |value, layer| layer.on_success(name, shape, ctx, value))
    }

    pub(crate) fn failure(
        &self,
        name: &PropertyName,
        shape: &Shape,
        ctx: &BindContext<'_>,
        error: BindError,
    ) -> Result<Option<Value>, BindError> {
        let mut error = error;
        for layer in &self.layers {
            match layer.on_failure(name, shape, ctx, error) {
                Ok(value) => return Ok(value),
                Err(passed_on) => error = passed_on,
            }
        }
        Err(error)
    }

    pub(crate) fn finish(
        &self,
        name: &PropertyName,
        shape: &Shape,
        ctx: &BindContext<'_>,
        result: Option<&Value>,
    ) -> Result<(), BindError> {
        self.layers
            .iter()
            .try_for_each(|layer| layer.on_finish(name, shape, ctx, result))
    }
}

/// Extends a fully composed chain, typically by wrapping extra layers around it.
///
/// Closures of the form `Fn(HandlerChain) -> HandlerChain` implement this trait.
pub trait BindHandlerAdvisor: Send + Sync {
    fn apply(&self, chain: HandlerChain) -> HandlerChain;
}

impl<F> BindHandlerAdvisor for F
where
    F: Fn(HandlerChain) -> HandlerChain + Send + Sync,
{
    fn apply(&self, chain: HandlerChain) -> HandlerChain {
        self(chain)
    }
}
