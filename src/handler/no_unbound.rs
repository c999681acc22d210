use toml::Value;

use super::BindHandler;
use crate::bind::{BindContext, BindError, Shape};
use crate::source::PropertyName;

/// Fails the top-level bind when properties under the namespace were never
/// consumed. All leftovers are reported together.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUnboundElements {
    include_system: bool,
}

impl NoUnboundElements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also reports leftovers from system sources such as the environment.
    pub fn including_system_sources(mut self) -> Self {
        self.include_system = true;
        self
    }
}

impl BindHandler for NoUnboundElements {
    fn on_finish(
        &self,
        name: &PropertyName,
        _shape: &Shape,
        ctx: &BindContext<'_>,
        _result: Option<&Value>,
    ) -> Result<(), BindError> {
        if ctx.depth() != 0 {
            return Ok(());
        }
        let names = ctx.unbound_under(name, self.include_system);
        if names.is_empty() {
            Ok(())
        } else {
            Err(BindError::UnboundElements { names })
        }
    }
}
