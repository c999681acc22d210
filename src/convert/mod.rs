//! Conversion of raw property values into the shape a target asks for.
//!
//! A [`ConversionService`] is assembled once with its builder and then
//! shared read-only. Lookups go from most to least specific:
//!
//! 1. a converter registered for the shape's exact type name,
//! 2. generic converters, in registration order, that support the shape,
//! 3. the built-in scalar and container conversions.

mod error;
mod scalar;
mod unit;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use toml::{Table, Value};

use crate::bind::Shape;

pub use error::{ConversionError, PlaceholderError};
pub use unit::DataSize;

/// A pluggable conversion from a raw value to a shape.
///
/// Closures of the form `Fn(&Value, &Shape) -> Result<Value, ConversionError>`
/// implement this trait.
pub trait Converter: Send + Sync {
    /// Only consulted for generic registrations.
    fn supports(&self, _shape: &Shape) -> bool {
        true
    }

    fn convert(&self, value: &Value, shape: &Shape) -> Result<Value, ConversionError>;
}

impl<F> Converter for F
where
    F: Fn(&Value, &Shape) -> Result<Value, ConversionError> + Send + Sync,
{
    fn convert(&self, value: &Value, shape: &Shape) -> Result<Value, ConversionError> {
        self(value, shape)
    }
}

/// Registry of converters, frozen once built.
#[derive(Clone, Default)]
pub struct ConversionService {
    exact: HashMap<String, Arc<dyn Converter>>,
    generic: Vec<Arc<dyn Converter>>,
}

impl fmt::Debug for ConversionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut exact: Vec<_> = self.exact.keys().collect();
        exact.sort();
        f.debug_struct("ConversionService")
            .field("exact", &exact)
            .field("generic", &self.generic.len())
            .finish()
    }
}

impl ConversionService {
    /// A service with only the built-in conversions.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ConversionServiceBuilder {
        ConversionServiceBuilder::default()
    }

    /// Converts `value` into `shape`.
    pub fn convert(&self, value: &Value, shape: &Shape) -> Result<Value, ConversionError> {
        if let Some(converter) = self.find(shape) {
            return converter.convert(value, shape);
        }
        match shape {
            Shape::Sequence(element) => self.convert_elements(value, element, shape, false),
            Shape::Set(element) => self.convert_elements(value, element, shape, true),
            Shape::Map(value_shape) => self.convert_map(value, value_shape, shape),
            _ => scalar::convert(value, shape),
        }
    }

    /// True when a registered converter or a built-in conversion applies.
    /// Objects and custom shapes need a registered converter.
    pub fn can_convert(&self, shape: &Shape) -> bool {
        self.find(shape).is_some() || !matches!(shape, Shape::Object(_) | Shape::Custom(_))
    }

    fn find(&self, shape: &Shape) -> Option<&Arc<dyn Converter>> {
        self.exact
            .get(&shape.type_name())
            .or_else(|| self.generic.iter().find(|c| c.supports(shape)))
    }

    /// Sequences come from arrays, comma-delimited strings or a single scalar.
    fn convert_elements(
        &self,
        value: &Value,
        element: &Shape,
        shape: &Shape,
        unique: bool,
    ) -> Result<Value, ConversionError> {
        let raw: Vec<Value> = match value {
            Value::Array(items) => items.clone(),
            Value::String(s) if s.trim().is_empty() => Vec::new(),
            Value::String(s) => s.split(',').map(|item| Value::String(item.trim().to_string())).collect(),
            Value::Table(_) => return Err(ConversionError::mismatch(shape.type_name(), value)),
            scalar => vec![scalar.clone()],
        };

        let mut items = Vec::with_capacity(raw.len());
        for item in &raw {
            let converted = self.convert(item, element)?;
            if !unique || !items.contains(&converted) {
                items.push(converted);
            }
        }
        Ok(Value::Array(items))
    }

    fn convert_map(&self, value: &Value, value_shape: &Shape, shape: &Shape) -> Result<Value, ConversionError> {
        let Value::Table(entries) = value else {
            return Err(ConversionError::mismatch(shape.type_name(), value));
        };
        let mut table = Table::new();
        for (key, entry) in entries {
            table.insert(key.clone(), self.convert(entry, value_shape)?);
        }
        Ok(Value::Table(table))
    }
}

/// Builder for a [`ConversionService`].
#[derive(Default)]
#[must_use = "builders do nothing until .build() is called"]
pub struct ConversionServiceBuilder {
    service: ConversionService,
}

impl ConversionServiceBuilder {
    /// Registers a converter for shapes whose [`type_name`](Shape::type_name)
    /// equals `type_name`. A later registration for the same name replaces
    /// the earlier one.
    pub fn with_converter(mut self, type_name: impl Into<String>, converter: impl Converter + 'static) -> Self {
        self.service.exact.insert(type_name.into(), Arc::new(converter));
        self
    }

    /// Registers a converter consulted for every shape it [`supports`](Converter::supports).
    pub fn with_generic(mut self, converter: impl Converter + 'static) -> Self {
        self.service.generic.push(Arc::new(converter));
        self
    }

    pub fn build(self) -> ConversionService {
        self.service
    }
}
