use toml::Value;
use tracing::debug;

use super::BindHandler;
use crate::bind::{BindContext, BindError, Shape};
use crate::source::PropertyName;

/// Base layer: a top-level target that no converter can produce from a
/// value at the namespace itself is left unbound instead of failing.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreTopLevelConverterNotFound;

impl BindHandler for IgnoreTopLevelConverterNotFound {
    fn on_failure(
        &self,
        name: &PropertyName,
        shape: &Shape,
        ctx: &BindContext<'_>,
        error: BindError,
    ) -> Result<Option<Value>, BindError> {
        if ctx.depth() == 0 && error.is_converter_not_found_for(name) {
            debug!(property = %name, target = %shape.type_name(), "no converter for top-level value, leaving unbound");
            return Ok(None);
        }
        Err(error)
    }
}
