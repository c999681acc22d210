//! Binding of annotated configuration targets.
//!
//! [`ConfigurationPropertiesBinder`] is the entry point for a host
//! application: it owns the property sources and converters, builds the
//! handler chain each target's [`ConfigurationProperties`] asks for, and
//! binds the target under its prefix.
//!
//! ## Example
//!
//! ```
//! use dragon_bind::{
//!     Bindable, Configurable, ConfigurationProperties, ConfigurationPropertiesBinder, PropertySource, Shape,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Server {
//!     host: String,
//!     #[serde(default)]
//!     port: u16,
//! }
//!
//! impl Configurable for Server {
//!     fn shape() -> Shape {
//!         Shape::object("Server")
//!             .field_of::<String>("host")
//!             .field_of::<u16>("port")
//!             .into()
//!     }
//! }
//!
//! let binder = ConfigurationPropertiesBinder::builder()
//!     .with_source(PropertySource::from_pairs(
//!         "application",
//!         [("server.host", "localhost"), ("server.port", "8080")],
//!     )?)
//!     .build();
//!
//! let server: Server = binder.bind(
//!     Bindable::of().with_properties(ConfigurationProperties::prefix("server")),
//! )?;
//! assert_eq!(server.port, 8080);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::bind::{Bindable, Binder};
use crate::convert::ConversionService;
use crate::error::Error;
use crate::handler::{
    BindHandlerAdvisor, HandlerChain, IgnoreErrors, IgnoreTopLevelConverterNotFound, NoUnboundElements,
};
use crate::source::{PropertySource, PropertySources};
use crate::validation::{PropertiesValidator, ValidationHandler, Validator};

/// Binding metadata for one target: where its properties live and how
/// strictly they are bound.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct ConfigurationProperties {
    prefix: String,
    ignore_invalid_fields: bool,
    ignore_unknown_fields: bool,
}

impl ConfigurationProperties {
    /// Properties under `prefix`. Unknown fields are ignored and invalid
    /// fields fail the bind.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ignore_invalid_fields: false,
            ignore_unknown_fields: true,
        }
    }

    /// Leave fields whose value cannot be converted unbound instead of failing.
    pub fn ignore_invalid_fields(mut self, ignore: bool) -> Self {
        self.ignore_invalid_fields = ignore;
        self
    }

    /// When `false`, properties under the prefix that no field consumes fail the bind.
    pub fn ignore_unknown_fields(mut self, ignore: bool) -> Self {
        self.ignore_unknown_fields = ignore;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.prefix
    }

    pub fn ignores_invalid_fields(&self) -> bool {
        self.ignore_invalid_fields
    }

    pub fn ignores_unknown_fields(&self) -> bool {
        self.ignore_unknown_fields
    }
}

/// Binds targets that carry [`ConfigurationProperties`].
///
/// Built once and shared; every call builds its own handler chain and
/// context.
#[derive(Clone)]
pub struct ConfigurationPropertiesBinder {
    binder: Binder,
    validators: Vec<Arc<dyn PropertiesValidator>>,
    advisors: Vec<Arc<dyn BindHandlerAdvisor>>,
}

impl fmt::Debug for ConfigurationPropertiesBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationPropertiesBinder")
            .field("binder", &self.binder)
            .field("validators", &self.validators.len())
            .field("advisors", &self.advisors.len())
            .finish()
    }
}

impl ConfigurationPropertiesBinder {
    pub fn builder() -> ConfigurationPropertiesBinderBuilder {
        ConfigurationPropertiesBinderBuilder::default()
    }

    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    /// Binds `target` under its prefix.
    ///
    /// Fails with [`Error::MissingAnnotation`] before any lookup when the
    /// target carries no [`ConfigurationProperties`]. With nothing to bind
    /// the target keeps its existing value, or is created from defaults;
    /// validators still run on that value.
    pub fn bind<T>(&self, target: Bindable<T>) -> Result<T, Error>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let Some(properties) = target.properties().cloned() else {
            return Err(Error::MissingAnnotation(target.shape().type_name()));
        };
        let chain = self.handler_chain(&properties, target.validators());
        Ok(self.binder.bind_or_create(properties.namespace(), target, &chain)?)
    }

    /// Binds over `instance` and replaces it with the result. On failure
    /// `instance` is left exactly as it was.
    pub fn rebind<T>(&self, instance: &mut T, target: Bindable<T>) -> Result<(), Error>
    where
        T: Clone + Serialize + DeserializeOwned + 'static,
    {
        *instance = self.bind(target.with_existing_value(instance.clone()))?;
        Ok(())
    }

    /// Layers in order, innermost first: top-level converter lookup,
    /// ignore-invalid-fields, unknown-field rejection, validation, advisors.
    fn handler_chain<T>(&self, properties: &ConfigurationProperties, validators: Vec<Arc<dyn Validator<T>>>) -> HandlerChain
    where
        T: DeserializeOwned + 'static,
    {
        let mut chain = HandlerChain::new().wrap(IgnoreTopLevelConverterNotFound);
        if properties.ignores_invalid_fields() {
            chain = chain.wrap(IgnoreErrors);
        }
        if !properties.ignores_unknown_fields() {
            chain = chain.wrap(NoUnboundElements::new());
        }
        if !self.validators.is_empty() || !validators.is_empty() {
            chain = chain.wrap(ValidationHandler::new(validators).with_shared(self.validators.clone()));
        }
        self.advisors.iter().fold(chain, |chain, advisor| advisor.apply(chain))
    }
}

/// Builder for a [`ConfigurationPropertiesBinder`].
#[derive(Default)]
#[must_use = "builders do nothing until .build() is called"]
pub struct ConfigurationPropertiesBinderBuilder {
    sources: PropertySources,
    conversion: ConversionService,
    validators: Vec<Arc<dyn PropertiesValidator>>,
    advisors: Vec<Arc<dyn BindHandlerAdvisor>>,
}

impl ConfigurationPropertiesBinderBuilder {
    /// Replaces the property sources.
    pub fn with_sources(mut self, sources: PropertySources) -> Self {
        self.sources = sources;
        self
    }

    /// Adds a source with lower precedence than the ones already added.
    pub fn with_source(mut self, source: PropertySource) -> Self {
        self.sources = self.sources.with_last(source);
        self
    }

    pub fn with_conversion_service(mut self, conversion: ConversionService) -> Self {
        self.conversion = conversion;
        self
    }

    /// Adds a validator applied to every target it supports, before the
    /// target's constraint and explicit validators.
    pub fn with_validator(mut self, validator: impl PropertiesValidator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Adds an advisor. Advisors apply after the built-in layers, in the
    /// order they were added.
    pub fn with_advisor(mut self, advisor: impl BindHandlerAdvisor + 'static) -> Self {
        self.advisors.push(Arc::new(advisor));
        self
    }

    pub fn build(self) -> ConfigurationPropertiesBinder {
        ConfigurationPropertiesBinder {
            binder: Binder::with_conversion_service(self.sources, self.conversion),
            validators: self.validators,
            advisors: self.advisors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::{BindContext, BindError, Configurable, FailureKind, Shape};
    use crate::handler::BindHandler;
    use crate::source::PropertyName;
    use crate::validation::{Violation, Violations};
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use toml::Value;
    use tracing_test::traced_test;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Limits {
        #[serde(default)]
        read: u32,
        #[serde(default)]
        write: u32,
    }

    impl Configurable for Limits {
        fn shape() -> Shape {
            Shape::object("Limits")
                .field_of::<u32>("read")
                .field_of::<u32>("write")
                .into()
        }
    }

    fn binder(pairs: &[(&str, &str)]) -> ConfigurationPropertiesBinder {
        ConfigurationPropertiesBinder::builder()
            .with_source(PropertySource::from_pairs("test", pairs.iter().copied()).unwrap())
            .build()
    }

    #[test]
    fn test_missing_annotation_fails_first() {
        let binder = binder(&[("limits.read", "oops")]);
        let err = binder.bind(Bindable::<Limits>::of()).unwrap_err();
        assert!(matches!(err, Error::MissingAnnotation(ref target) if target == "Limits"));
    }

    #[test]
    fn test_defaults_chain_ignores_unknown_fields() {
        let binder = binder(&[("limits.read", "5"), ("limits.delete", "1")]);
        let limits = binder
            .bind(Bindable::<Limits>::of().with_properties(ConfigurationProperties::prefix("limits")))
            .unwrap();
        assert_eq!(limits, Limits { read: 5, write: 0 });
    }

    #[test]
    fn test_rebind_keeps_instance_on_failure() {
        let binder = binder(&[("limits.read", "5"), ("limits.write", "many")]);
        let mut limits = Limits { read: 1, write: 2 };
        let err = binder
            .rebind(
                &mut limits,
                Bindable::of().with_properties(ConfigurationProperties::prefix("limits")),
            )
            .unwrap_err();
        let Error::Bind(failure) = err else {
            panic!("expected a bind failure");
        };
        assert_eq!(failure.kind(), FailureKind::Conversion);
        assert_eq!(failure.namespace(), "limits");
        assert_eq!(failure.target(), "Limits");
        assert_eq!(limits, Limits { read: 1, write: 2 });
    }

    #[test]
    fn test_advisor_wraps_outermost() {
        struct Doubling;
        impl BindHandler for Doubling {
            fn on_success(
                &self,
                name: &PropertyName,
                _shape: &Shape,
                _ctx: &BindContext<'_>,
                value: Value,
            ) -> Result<Value, BindError> {
                match value {
                    Value::Integer(i) if name.to_string() == "limits.read" => Ok(Value::Integer(i * 2)),
                    other => Ok(other),
                }
            }
        }

        let binder = ConfigurationPropertiesBinder::builder()
            .with_source(PropertySource::from_pairs("test", [("limits.read", "5")]).unwrap())
            .with_advisor(|chain: HandlerChain| chain.wrap(Doubling))
            .build();
        let limits: Limits = binder
            .bind(Bindable::of().with_properties(ConfigurationProperties::prefix("limits")))
            .unwrap();
        assert_eq!(limits.read, 10);
    }

    #[test]
    fn test_chain_order() {
        let binder = binder(&[]);
        let strict = ConfigurationProperties::prefix("limits")
            .ignore_invalid_fields(true)
            .ignore_unknown_fields(false);
        let validators: Vec<Arc<dyn Validator<Limits>>> =
            vec![Arc::new(|_: &Limits| -> Result<(), crate::validation::Violations> { Ok(()) })];
        assert_eq!(binder.handler_chain(&strict, validators).len(), 4);
        assert_eq!(
            binder
                .handler_chain::<Limits>(&ConfigurationProperties::prefix("limits"), Vec::new())
                .len(),
            1
        );
    }

    #[test]
    #[traced_test]
    fn test_ignored_invalid_field_is_logged() {
        let binder = binder(&[("limits.read", "notanumber"), ("limits.write", "2")]);
        let lenient = ConfigurationProperties::prefix("limits").ignore_invalid_fields(true);
        let limits = binder.bind(Bindable::<Limits>::of().with_properties(lenient)).unwrap();
        assert_eq!(limits, Limits { read: 0, write: 2 });
        assert!(logs_contain("ignoring invalid property"));
        assert!(logs_contain("limits.read"));
    }

    #[test]
    fn test_shared_validator_runs_before_target_validators() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let binder = ConfigurationPropertiesBinder::builder()
            .with_source(PropertySource::from_pairs("test", [("limits.read", "50")]).unwrap())
            .with_validator(|_: &Shape, candidate: &Value| -> Result<(), Violations> {
                match candidate.get("read").and_then(Value::as_integer) {
                    Some(read) if read > 10 => Err(Violation::new("read", "above the shared ceiling").into()),
                    _ => Ok(()),
                }
            })
            .build();

        let err = binder
            .bind(
                Bindable::<Limits>::of()
                    .with_properties(ConfigurationProperties::prefix("limits"))
                    .with_validator(move |_: &Limits| -> Result<(), Violations> {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
            )
            .unwrap_err();
        let Error::Bind(failure) = err else {
            panic!("expected a bind failure");
        };
        assert_eq!(failure.kind(), FailureKind::Validation);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_shared_validator_skips_unsupported_targets() {
        struct OnlyFor(&'static str);
        impl PropertiesValidator for OnlyFor {
            fn supports(&self, shape: &Shape) -> bool {
                shape.type_name() == self.0
            }

            fn validate(&self, _shape: &Shape, _candidate: &Value) -> Result<(), Violations> {
                Err(Violation::new("*", "rejected").into())
            }
        }

        let binder = ConfigurationPropertiesBinder::builder()
            .with_source(PropertySource::from_pairs("test", [("limits.read", "5")]).unwrap())
            .with_validator(OnlyFor("Quota"))
            .build();
        let limits: Limits = binder
            .bind(Bindable::of().with_properties(ConfigurationProperties::prefix("limits")))
            .unwrap();
        assert_eq!(limits.read, 5);
    }

    #[test]
    fn test_materialize_failure_skips_handler_hooks() {
        #[derive(Debug, Serialize, Deserialize)]
        struct Endpoint {
            host: String,
            #[serde(default)]
            port: u16,
        }

        impl Configurable for Endpoint {
            fn shape() -> Shape {
                Shape::object("Endpoint")
                    .field_of::<String>("host")
                    .field_of::<u16>("port")
                    .into()
            }
        }

        struct CountFailures(Arc<AtomicUsize>);
        impl BindHandler for CountFailures {
            fn on_failure(
                &self,
                _name: &PropertyName,
                _shape: &Shape,
                _ctx: &BindContext<'_>,
                error: BindError,
            ) -> Result<Option<Value>, BindError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(error)
            }
        }

        let failures = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&failures);
        let binder = ConfigurationPropertiesBinder::builder()
            .with_source(PropertySource::from_pairs("test", [("endpoint.port", "80")]).unwrap())
            .with_advisor(move |chain: HandlerChain| chain.wrap(CountFailures(Arc::clone(&seen))))
            .build();

        let err = binder
            .bind(Bindable::<Endpoint>::of().with_properties(ConfigurationProperties::prefix("endpoint")))
            .unwrap_err();
        let Error::Bind(failure) = err else {
            panic!("expected a bind failure");
        };
        assert_eq!(failure.kind(), FailureKind::Materialize);
        assert_eq!(failures.load(Ordering::SeqCst), 0);
    }
}
