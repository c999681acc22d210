use toml::Value;
use tracing::debug;

use super::BindHandler;
use crate::bind::{BindContext, BindError, FailureKind, Shape};
use crate::source::PropertyName;

/// Leaves a field unbound when its value cannot be converted, including
/// placeholder failures. Structural failures still propagate.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreErrors;

impl BindHandler for IgnoreErrors {
    fn on_failure(
        &self,
        name: &PropertyName,
        _shape: &Shape,
        _ctx: &BindContext<'_>,
        error: BindError,
    ) -> Result<Option<Value>, BindError> {
        match error.kind() {
            FailureKind::Conversion | FailureKind::Placeholder => {
                debug!(property = %name, error = %error, "ignoring invalid property");
                Ok(None)
            }
            _ => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{ConversionError, PlaceholderError};
    use crate::handler::HandlerChain;
    use crate::source::PropertySources;

    fn conversion(source: ConversionError) -> BindError {
        BindError::Conversion {
            name: PropertyName::parse("app.x").unwrap(),
            origin: "test".into(),
            source,
        }
    }

    #[test]
    fn test_conversion_and_placeholder_failures_are_suppressed() {
        let sources = PropertySources::new();
        let chain = HandlerChain::new();
        let ctx = BindContext::new(&sources, &chain, None);
        let name = PropertyName::parse("app.x").unwrap();

        let malformed = conversion(ConversionError::Malformed {
            value: "notanumber".into(),
            target: "i32".into(),
            reason: "not an integer".into(),
        });
        assert!(matches!(IgnoreErrors.on_failure(&name, &Shape::Any, &ctx, malformed), Ok(None)));

        let placeholder = conversion(PlaceholderError::Unresolvable("missing".into()).into());
        assert!(matches!(IgnoreErrors.on_failure(&name, &Shape::Any, &ctx, placeholder), Ok(None)));
    }

    #[test]
    fn test_unbound_elements_are_not_suppressed() {
        let sources = PropertySources::new();
        let chain = HandlerChain::new();
        let ctx = BindContext::new(&sources, &chain, None);
        let error = BindError::UnboundElements {
            names: vec!["app.y".into()],
        };
        assert!(IgnoreErrors
            .on_failure(&PropertyName::root(), &Shape::Any, &ctx, error)
            .is_err());
    }
}
