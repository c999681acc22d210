//! The binder: walks a target [`Shape`] and populates it from property sources.
//!
//! Binding produces a [`toml::Value`] tree keyed by field name. The tree is
//! merged over the target's existing value (when there is one) and then
//! deserialized into the target type, so a failed bind never leaves a
//! half-updated target behind.

mod bindable;
mod context;
mod error;
mod shape;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use toml::{Table, Value};
use tracing::{debug, trace};

use crate::convert::{ConversionError, ConversionService};
use crate::handler::HandlerChain;
use crate::resolve::PlaceholderResolver;
use crate::source::{PropertyName, PropertySource, PropertySources};

pub use bindable::Bindable;
pub use context::BindContext;
pub use error::{BindError, BindFailure, FailureKind};
pub use shape::{Configurable, EnumShape, Field, FloatKind, IntKind, ObjectShape, Shape};

/// Binds namespaced properties into typed targets.
///
/// A binder holds no per-call state and can be shared freely between threads.
#[derive(Debug, Clone, Default)]
pub struct Binder {
    sources: Arc<PropertySources>,
    conversion: Arc<ConversionService>,
}

impl Binder {
    pub fn new(sources: PropertySources) -> Self {
        Self::with_conversion_service(sources, ConversionService::new())
    }

    pub fn with_conversion_service(sources: PropertySources, conversion: ConversionService) -> Self {
        Self {
            sources: Arc::new(sources),
            conversion: Arc::new(conversion),
        }
    }

    pub fn sources(&self) -> &PropertySources {
        &self.sources
    }

    pub fn conversion_service(&self) -> &ConversionService {
        &self.conversion
    }

    /// Binds `namespace` into `target`.
    ///
    /// Returns `Ok(None)` when nothing was bound and there is no existing
    /// value. With an existing value and nothing bound, the existing value
    /// is returned as it was.
    ///
    /// Deserializing the merged tree into `T` happens after `handler` has
    /// finished, so [`BindError::Materialize`] failures bypass its hooks.
    pub fn bind<T>(&self, namespace: &str, target: Bindable<T>, handler: &HandlerChain) -> Result<Option<T>, BindFailure>
    where
        T: Serialize + DeserializeOwned,
    {
        let target_name = target.shape().type_name();
        let bean = target.bean().map(str::to_string);
        self.bind_target(namespace, target, handler)
            .map_err(|cause| BindFailure::new(namespace, target_name, bean, cause))
    }

    /// Like [`bind`](Self::bind), but materializes the target from an empty
    /// tree when nothing was bound. Targets with required fields fail then.
    pub fn bind_or_create<T>(&self, namespace: &str, target: Bindable<T>, handler: &HandlerChain) -> Result<T, BindFailure>
    where
        T: Serialize + DeserializeOwned,
    {
        let target_name = target.shape().type_name();
        let bean = target.bean().map(str::to_string);
        self.bind_target(namespace, target, handler)
            .and_then(|bound| match bound {
                Some(value) => Ok(value),
                None => Value::Table(Table::new()).try_into().map_err(BindError::Materialize),
            })
            .map_err(|cause| BindFailure::new(namespace, target_name, bean, cause))
    }

    fn bind_target<T>(&self, namespace: &str, mut target: Bindable<T>, handler: &HandlerChain) -> Result<Option<T>, BindError>
    where
        T: Serialize + DeserializeOwned,
    {
        let existing = target.take_existing();
        let prior = existing
            .as_ref()
            .map(Value::try_from)
            .transpose()
            .map_err(BindError::Existing)?;

        let Some(patch) = self.bind_value(namespace, target.shape(), prior.as_ref(), handler)? else {
            return Ok(existing);
        };
        match merge_values(prior, Some(patch)) {
            Some(merged) => merged.try_into().map(Some).map_err(BindError::Materialize),
            None => Ok(existing),
        }
    }

    /// Binds `namespace` into a value tree for `shape`.
    ///
    /// `prior` is only made visible to handlers; the returned tree holds the
    /// bound properties alone.
    pub fn bind_value(
        &self,
        namespace: &str,
        shape: &Shape,
        prior: Option<&Value>,
        handler: &HandlerChain,
    ) -> Result<Option<Value>, BindError> {
        let name = PropertyName::parse(namespace)?;
        debug!(namespace = %name, target = %shape.type_name(), "binding properties");
        let mut ctx = BindContext::new(&self.sources, handler, prior);
        self.bind_node(&name, shape, &mut ctx)
    }

    fn bind_node(&self, name: &PropertyName, shape: &Shape, ctx: &mut BindContext<'_>) -> Result<Option<Value>, BindError> {
        let handler = ctx.handler();
        match self.attempt(name, shape, handler, ctx) {
            Ok(bound) => Ok(bound),
            Err(error) => handler.failure(name, shape, ctx, error),
        }
    }

    fn attempt(
        &self,
        name: &PropertyName,
        shape: &Shape,
        handler: &HandlerChain,
        ctx: &mut BindContext<'_>,
    ) -> Result<Option<Value>, BindError> {
        handler.start(name, shape, ctx)?;
        ctx.enter(name);
        let bound = self.bind_shape(name, shape, ctx);
        ctx.leave();

        let bound = match bound? {
            Some(value) => Some(handler.success(name, shape, ctx, value)?),
            None => None,
        };
        handler.finish(name, shape, ctx, bound.as_ref())?;
        Ok(bound)
    }

    fn bind_shape(&self, name: &PropertyName, shape: &Shape, ctx: &mut BindContext<'_>) -> Result<Option<Value>, BindError> {
        match shape {
            Shape::Object(object) => self.bind_object(name, shape, object, ctx),
            Shape::Map(value_shape) => self.bind_map(name, shape, value_shape, ctx),
            Shape::Sequence(element) => self.bind_indexed(name, shape, element, false, ctx),
            Shape::Set(element) => self.bind_indexed(name, shape, element, true, ctx),
            _ => self.bind_leaf(name, shape, ctx),
        }
    }

    fn bind_leaf(&self, name: &PropertyName, shape: &Shape, ctx: &mut BindContext<'_>) -> Result<Option<Value>, BindError> {
        let Some((origin, value)) = ctx.lookup(name) else {
            return Ok(None);
        };
        ctx.consume(name);
        trace!(property = %name, origin = origin.name(), "binding value");
        self.convert_property(name, origin, value, shape, ctx.sources()).map(Some)
    }

    /// Expands placeholders in `value`, then converts it to `shape`.
    fn convert_property(
        &self,
        name: &PropertyName,
        origin: &PropertySource,
        value: &Value,
        shape: &Shape,
        sources: &PropertySources,
    ) -> Result<Value, BindError> {
        let failed = |source: ConversionError| BindError::Conversion {
            name: name.clone(),
            origin: origin.name().to_string(),
            source,
        };
        let resolved = PlaceholderResolver::new(sources)
            .resolve_value(value)
            .map_err(|e| failed(e.into()))?;
        self.conversion.convert(&resolved, shape).map_err(failed)
    }

    fn bind_object(
        &self,
        name: &PropertyName,
        shape: &Shape,
        object: &ObjectShape,
        ctx: &mut BindContext<'_>,
    ) -> Result<Option<Value>, BindError> {
        if !ctx.has_descendants(name) {
            if let Some((origin, value)) = ctx.lookup(name) {
                ctx.consume(name);
                return self.convert_property(name, origin, value, shape, ctx.sources()).map(Some);
            }
        }

        let mut table = Table::new();
        for field in object.fields() {
            let child = name.child(field.name());
            if !ctx.defines(&child) {
                continue;
            }
            if let Some(value) = self.bind_node(&child, field.shape(), ctx)? {
                table.insert(field.name().to_string(), value);
            }
        }
        Ok((!table.is_empty()).then_some(Value::Table(table)))
    }

    fn bind_map(
        &self,
        name: &PropertyName,
        shape: &Shape,
        value_shape: &Shape,
        ctx: &mut BindContext<'_>,
    ) -> Result<Option<Value>, BindError> {
        if !ctx.has_descendants(name) {
            let Some((origin, value)) = ctx.lookup(name) else {
                return Ok(None);
            };
            ctx.consume(name);
            return self.convert_property(name, origin, value, shape, ctx.sources()).map(Some);
        }

        let mut table = Table::new();
        for (key, entry) in ctx.map_keys(name, value_shape.is_leaf()) {
            if let Some(value) = self.bind_node(&entry, value_shape, ctx)? {
                table.insert(key, value);
            }
        }
        Ok((!table.is_empty()).then_some(Value::Table(table)))
    }

    /// Sequences and sets come whole from the highest-precedence source
    /// that defines them.
    fn bind_indexed(
        &self,
        name: &PropertyName,
        shape: &Shape,
        element: &Shape,
        unique: bool,
        ctx: &mut BindContext<'_>,
    ) -> Result<Option<Value>, BindError> {
        let Some(winner) = ctx.first_source_defining(name) else {
            return Ok(None);
        };
        let previous = ctx.narrow(winner);
        let bound = self.bind_elements(name, shape, element, unique, ctx);
        ctx.restore(previous);
        ctx.consume_overridden(name, winner);
        bound
    }

    fn bind_elements(
        &self,
        name: &PropertyName,
        shape: &Shape,
        element: &Shape,
        unique: bool,
        ctx: &mut BindContext<'_>,
    ) -> Result<Option<Value>, BindError> {
        if let Some((origin, value)) = ctx.lookup(name) {
            ctx.consume(name);
            return self.convert_property(name, origin, value, shape, ctx.sources()).map(Some);
        }

        let mut items: Vec<Value> = Vec::new();
        for index in 0.. {
            let child = name.index(index);
            if !ctx.defines(&child) {
                break;
            }
            if let Some(value) = self.bind_node(&child, element, ctx)? {
                if !unique || !items.contains(&value) {
                    items.push(value);
                }
            }
        }
        Ok(Some(Value::Array(items)))
    }
}

/// Deep-merges `patch` over `prior`. Tables merge key by key; anything
/// else in the patch replaces what was there.
pub(crate) fn merge_values(prior: Option<Value>, patch: Option<Value>) -> Option<Value> {
    match (prior, patch) {
        (Some(Value::Table(mut base)), Some(Value::Table(overlay))) => {
            deep_merge(&mut base, overlay);
            Some(Value::Table(base))
        }
        (prior, None) => prior,
        (_, patch) => patch,
    }
}

fn deep_merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(base_table)), Value::Table(overlay_table)) => deep_merge(base_table, overlay_table),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{IgnoreErrors, NoUnboundElements};

    fn binder(pairs: &[(&str, &str)]) -> Binder {
        Binder::new(
            PropertySources::new().with_last(PropertySource::from_pairs("test", pairs.iter().copied()).unwrap()),
        )
    }

    fn server_shape() -> Shape {
        Shape::object("Server")
            .field("host", Shape::String)
            .field("port", Shape::Integer(IntKind::U16))
            .into()
    }

    fn table(toml_str: &str) -> Value {
        Value::Table(toml::from_str(toml_str).unwrap())
    }

    #[test]
    fn test_object_binding() {
        let binder = binder(&[("app.server.host", "localhost"), ("app.server.port", "8080")]);
        let shape: Shape = Shape::object("App").field("server", server_shape()).into();
        let value = binder.bind_value("app", &shape, None, &HandlerChain::new()).unwrap();
        assert_eq!(value, Some(table("[server]\nhost = 'localhost'\nport = 8080")));
    }

    #[test]
    fn test_nothing_to_bind() {
        let binder = binder(&[("other.port", "1")]);
        let value = binder
            .bind_value("app", &server_shape(), None, &HandlerChain::new())
            .unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_relaxed_field_names() {
        let binder = binder(&[("app.max-connections", "10")]);
        let shape: Shape = Shape::object("Pool")
            .field("max_connections", Shape::Integer(IntKind::U32))
            .into();
        let value = binder.bind_value("app", &shape, None, &HandlerChain::new()).unwrap();
        assert_eq!(value, Some(table("max_connections = 10")));
    }

    #[test]
    fn test_conversion_failure_names_the_property() {
        let binder = binder(&[("app.port", "http")]);
        let err = binder
            .bind_value("app", &server_shape(), None, &HandlerChain::new())
            .unwrap_err();
        match err {
            BindError::Conversion { name, origin, source } => {
                assert_eq!(name.to_string(), "app.port");
                assert_eq!(origin, "test");
                assert!(matches!(source, ConversionError::Malformed { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ignore_errors_leaves_field_unbound() {
        let binder = binder(&[("app.host", "h"), ("app.port", "http")]);
        let chain = HandlerChain::new().wrap(IgnoreErrors);
        let value = binder.bind_value("app", &server_shape(), None, &chain).unwrap();
        assert_eq!(value, Some(table("host = 'h'")));
    }

    #[test]
    fn test_indexed_sequence_stops_at_first_gap() {
        let binder = binder(&[("app.hosts[0]", "a"), ("app.hosts[1]", "b"), ("app.hosts[3]", "d")]);
        let shape = Shape::sequence_of(Shape::String);
        let value = binder.bind_value("app.hosts", &shape, None, &HandlerChain::new()).unwrap();
        assert_eq!(value, Some(Value::Array(vec!["a".into(), "b".into()])));

        let chain = HandlerChain::new().wrap(NoUnboundElements::new());
        let err = binder.bind_value("app.hosts", &shape, None, &chain).unwrap_err();
        assert!(matches!(err, BindError::UnboundElements { ref names } if names == &["app.hosts[3]"]));
    }

    #[test]
    fn test_sequence_comes_from_one_source() {
        let sources = PropertySources::new()
            .with_last(PropertySource::from_pairs("high", [("app.hosts[0]", "a")]).unwrap())
            .with_last(PropertySource::from_pairs("low", [("app.hosts[0]", "x"), ("app.hosts[1]", "y")]).unwrap());
        let binder = Binder::new(sources);
        let chain = HandlerChain::new().wrap(NoUnboundElements::new());
        let value = binder
            .bind_value("app.hosts", &Shape::sequence_of(Shape::String), None, &chain)
            .unwrap();
        assert_eq!(value, Some(Value::Array(vec!["a".into()])));
    }

    #[test]
    fn test_comma_delimited_set() {
        let binder = binder(&[("app.tags", "a, b, a")]);
        let value = binder
            .bind_value("app.tags", &Shape::set_of(Shape::String), None, &HandlerChain::new())
            .unwrap();
        assert_eq!(value, Some(Value::Array(vec!["a".into(), "b".into()])));
    }

    #[test]
    fn test_indexed_objects() {
        let binder = binder(&[
            ("app.servers[0].host", "a"),
            ("app.servers[0].port", "1"),
            ("app.servers[1].host", "b"),
        ]);
        let shape = Shape::sequence_of(server_shape());
        let value = binder.bind_value("app.servers", &shape, None, &HandlerChain::new()).unwrap();
        assert_eq!(
            value,
            Some(table("servers = [{ host = 'a', port = 1 }, { host = 'b' }]")["servers"].clone())
        );
    }

    #[test]
    fn test_map_merges_sources() {
        let sources = PropertySources::new()
            .with_last(PropertySource::from_pairs("high", [("app.limits.read", "10")]).unwrap())
            .with_last(
                PropertySource::from_pairs("low", [("app.limits.read", "1"), ("app.limits.write", "2")]).unwrap(),
            );
        let binder = Binder::new(sources);
        let value = binder
            .bind_value("app.limits", &Shape::map_of(Shape::Integer(IntKind::U32)), None, &HandlerChain::new())
            .unwrap();
        assert_eq!(value, Some(table("read = 10\nwrite = 2")));
    }

    #[test]
    fn test_map_of_leaves_keeps_dotted_keys() {
        let binder = binder(&[("app.labels.team.name", "core"), ("app.labels[x.y]", "z")]);
        let value = binder
            .bind_value("app.labels", &Shape::map_of(Shape::String), None, &HandlerChain::new())
            .unwrap();
        assert_eq!(value, Some(table("'team.name' = 'core'\n'x.y' = 'z'")));
    }

    #[test]
    fn test_map_of_objects() {
        let binder = binder(&[("app.backends.primary.host", "a"), ("app.backends.replica.port", "2")]);
        let value = binder
            .bind_value("app.backends", &Shape::map_of(server_shape()), None, &HandlerChain::new())
            .unwrap();
        assert_eq!(value, Some(table("primary = { host = 'a' }\nreplica = { port = 2 }")));
    }

    #[test]
    fn test_scalar_for_object_needs_a_converter() {
        let binder = binder(&[("app.server", "localhost:80")]);
        let shape: Shape = Shape::object("App").field("server", server_shape()).into();
        let err = binder.bind_value("app", &shape, None, &HandlerChain::new()).unwrap_err();
        assert!(err.is_converter_not_found_for(&PropertyName::parse("app.server").unwrap()));
    }

    #[test]
    fn test_placeholders_resolve_at_bind_time() {
        let binder = binder(&[("app.host", "${base.host}"), ("base.host", "example.com"), ("app.port", "${missing:81}")]);
        let value = binder
            .bind_value("app", &server_shape(), None, &HandlerChain::new())
            .unwrap();
        assert_eq!(value, Some(table("host = 'example.com'\nport = 81")));
    }

    #[test]
    fn test_merge_values() {
        let prior = table("a = 1\n[nested]\nx = 1\ny = 2");
        let patch = table("b = 2\n[nested]\ny = 3");
        assert_eq!(
            merge_values(Some(prior.clone()), Some(patch)),
            Some(table("a = 1\nb = 2\n[nested]\nx = 1\ny = 3"))
        );
        assert_eq!(merge_values(Some(prior.clone()), None), Some(prior));
        assert_eq!(merge_values(None, None), None);
    }
}
