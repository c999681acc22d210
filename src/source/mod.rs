//! Layered, read-only property sources.
//!
//! A [`PropertySource`] is one named layer of flattened key/value pairs.
//! [`PropertySources`] orders layers by precedence: the first source that
//! defines a key wins.

mod env;
mod name;

use std::collections::HashMap;
use std::sync::Arc;

use toml::{Table, Value};

pub use env::EnvSource;
pub use name::{PropertyName, PropertyNameError};

/// A single property as stored in a source.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: PropertyName,
    pub value: Value,
}

/// A named layer of properties.
///
/// Properties keep their insertion order. Inserting a name that is already
/// present replaces the value in place.
#[derive(Debug, Clone, Default)]
pub struct PropertySource {
    name: String,
    system: bool,
    properties: Vec<Property>,
    index: HashMap<PropertyName, usize>,
}

impl PropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Flattens a structured table into properties.
    ///
    /// Nested tables become dotted keys and arrays become indexed keys, so
    /// `[server] hosts = ["a", "b"]` yields `server.hosts[0]` and
    /// `server.hosts[1]`. Empty arrays are kept as a single structured value.
    pub fn from_table(name: impl Into<String>, table: Table) -> Self {
        let mut source = Self::new(name);
        flatten_into(&mut source, &PropertyName::root(), Value::Table(table));
        source
    }

    /// Builds a source from `(key, value)` pairs written in dot/bracket notation.
    pub fn from_pairs<I, K, V>(name: impl Into<String>, pairs: I) -> Result<Self, PropertyNameError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        pairs
            .into_iter()
            .try_fold(Self::new(name), |source, (key, value)| source.with(key.as_ref(), value))
    }

    /// Adds one property written in dot/bracket notation.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Result<Self, PropertyNameError> {
        let name = PropertyName::parse(key)?;
        self.insert(name, value.into());
        Ok(self)
    }

    pub fn insert(&mut self, name: PropertyName, value: Value) {
        match self.index.get(&name) {
            Some(&position) => self.properties[position].value = value,
            None => {
                self.index.insert(name.clone(), self.properties.len());
                self.properties.push(Property { name, value });
            }
        }
    }

    /// Marks this source as a system layer (process environment and the
    /// like). System layers never contribute unknown-key reports.
    pub fn into_system(mut self) -> Self {
        self.system = true;
        self
    }

    pub fn is_system(&self) -> bool {
        self.system
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, name: &PropertyName) -> Option<&Property> {
        self.index.get(name).map(|&position| &self.properties[position])
    }

    /// Properties strictly below `name`, in insertion order.
    pub fn descendants_of<'a>(&'a self, name: &'a PropertyName) -> impl Iterator<Item = &'a Property> + 'a {
        self.properties.iter().filter(move |p| name.is_ancestor_of(&p.name))
    }

    pub fn has_descendants_of(&self, name: &PropertyName) -> bool {
        self.descendants_of(name).next().is_some()
    }

    /// True when the source has `name` itself or anything below it.
    pub fn defines(&self, name: &PropertyName) -> bool {
        self.get(name).is_some() || self.has_descendants_of(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

fn flatten_into(source: &mut PropertySource, prefix: &PropertyName, value: Value) {
    match value {
        Value::Table(table) => {
            for (key, value) in table {
                flatten_into(source, &prefix.child(&key), value);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, item) in items.into_iter().enumerate() {
                flatten_into(source, &prefix.index(index), item);
            }
        }
        value => source.insert(prefix.clone(), value),
    }
}

/// An ordered snapshot of property sources. Earlier sources take precedence.
#[derive(Debug, Clone, Default)]
pub struct PropertySources {
    sources: Vec<Arc<PropertySource>>,
}

impl PropertySources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source with lower precedence than every source already present.
    pub fn with_last(mut self, source: PropertySource) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Adds a source with higher precedence than every source already present.
    pub fn with_first(mut self, source: PropertySource) -> Self {
        self.sources.insert(0, Arc::new(source));
        self
    }

    /// Looks `name` up in precedence order and returns the winning layer and property.
    pub fn resolve(&self, name: &PropertyName) -> Option<(&PropertySource, &Property)> {
        self.sources
            .iter()
            .find_map(|source| source.get(name).map(|property| (source.as_ref(), property)))
    }

    pub fn get(&self, name: &PropertyName) -> Option<&Value> {
        self.resolve(name).map(|(_, property)| &property.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertySource> {
        self.sources.iter().map(Arc::as_ref)
    }

    pub(crate) fn source(&self, index: usize) -> Option<&PropertySource> {
        self.sources.get(index).map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl FromIterator<PropertySource> for PropertySources {
    fn from_iter<I: IntoIterator<Item = PropertySource>>(iter: I) -> Self {
        Self {
            sources: iter.into_iter().map(Arc::new).collect(),
        }
    }
}
