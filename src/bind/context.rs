use std::collections::HashSet;

use toml::Value;

use crate::handler::HandlerChain;
use crate::source::{PropertyName, PropertySource, PropertySources};

/// Mutable state of one top-level bind call.
///
/// Handlers receive it read-only. A context is never shared between calls.
pub struct BindContext<'a> {
    sources: &'a PropertySources,
    handler: &'a HandlerChain,
    prior: Option<&'a Value>,
    names: Vec<PropertyName>,
    consumed: HashSet<PropertyName>,
    scope: Option<usize>,
}

impl<'a> BindContext<'a> {
    pub(crate) fn new(sources: &'a PropertySources, handler: &'a HandlerChain, prior: Option<&'a Value>) -> Self {
        Self {
            sources,
            handler,
            prior,
            names: Vec::new(),
            consumed: HashSet::new(),
            scope: None,
        }
    }

    /// Nesting depth of the node being bound. Hooks of the top-level node see 0.
    pub fn depth(&self) -> usize {
        self.names.len()
    }

    /// The innermost node currently being bound, if any.
    pub fn current(&self) -> Option<&PropertyName> {
        self.names.last()
    }

    pub fn sources(&self) -> &'a PropertySources {
        self.sources
    }

    /// The existing value being bound over, as a tree.
    pub fn prior(&self) -> Option<&'a Value> {
        self.prior
    }

    pub fn handler(&self) -> &'a HandlerChain {
        self.handler
    }

    pub fn is_consumed(&self, name: &PropertyName) -> bool {
        self.consumed.contains(name)
    }

    /// Properties strictly below `namespace` that nothing consumed, in source
    /// order and spelled as in their source. System sources are skipped
    /// unless `include_system` is set.
    pub fn unbound_under(&self, namespace: &PropertyName, include_system: bool) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut unbound = Vec::new();
        for source in self.sources.iter() {
            if source.is_system() && !include_system {
                continue;
            }
            for property in source.descendants_of(namespace) {
                if !self.consumed.contains(&property.name) && seen.insert(property.name.clone()) {
                    unbound.push(property.name.to_string());
                }
            }
        }
        unbound
    }

    /// Looks `name` up in the sources visible from the current scope.
    pub(crate) fn lookup(&self, name: &PropertyName) -> Option<(&'a PropertySource, &'a Value)> {
        let sources = self.sources;
        match self.scope {
            Some(index) => sources
                .source(index)
                .and_then(|source| source.get(name).map(|property| (source, &property.value))),
            None => sources
                .resolve(name)
                .map(|(source, property)| (source, &property.value)),
        }
    }

    pub(crate) fn defines(&self, name: &PropertyName) -> bool {
        self.visible().any(|(_, source)| source.defines(name))
    }

    pub(crate) fn has_descendants(&self, name: &PropertyName) -> bool {
        self.visible().any(|(_, source)| source.has_descendants_of(name))
    }

    pub(crate) fn consume(&mut self, name: &PropertyName) {
        self.consumed.insert(name.clone());
    }

    pub(crate) fn enter(&mut self, name: &PropertyName) {
        self.names.push(name.clone());
    }

    pub(crate) fn leave(&mut self) {
        self.names.pop();
    }

    /// Index of the highest-precedence visible source that defines `name`.
    pub(crate) fn first_source_defining(&self, name: &PropertyName) -> Option<usize> {
        self.visible()
            .find(|(_, source)| source.defines(name))
            .map(|(index, _)| index)
    }

    /// Restricts lookups to one source. Returns the previous scope.
    pub(crate) fn narrow(&mut self, index: usize) -> Option<usize> {
        self.scope.replace(index)
    }

    pub(crate) fn restore(&mut self, scope: Option<usize>) {
        self.scope = scope;
    }

    /// Marks `name` and everything below it as consumed in every source
    /// except `winner`. Used when one source supplies a whole collection.
    pub(crate) fn consume_overridden(&mut self, name: &PropertyName, winner: usize) {
        let sources = self.sources;
        for (index, source) in sources.iter().enumerate() {
            if index == winner {
                continue;
            }
            if source.get(name).is_some() {
                self.consumed.insert(name.clone());
            }
            for property in source.descendants_of(name) {
                self.consumed.insert(property.name.clone());
            }
        }
    }

    /// Distinct entry keys below a map node, in order of first appearance.
    ///
    /// For leaf values the key is the whole remaining path (`a.b` for
    /// `map.a.b`), otherwise it is the next element only.
    pub(crate) fn map_keys(&self, name: &PropertyName, leaf_values: bool) -> Vec<(String, PropertyName)> {
        let depth = name.len();
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for (_, source) in self.visible() {
            for property in source.descendants_of(name) {
                let entry = if leaf_values {
                    property.name.clone()
                } else {
                    property.name.truncate(depth + 1)
                };
                if seen.insert(entry.clone()) {
                    keys.push((name.relative_key(&entry), entry));
                }
            }
        }
        keys
    }

    fn visible(&self) -> impl Iterator<Item = (usize, &'a PropertySource)> + 'a {
        let scope = self.scope;
        self.sources
            .iter()
            .enumerate()
            .filter(move |(index, _)| scope.map_or(true, |only| only == *index))
    }
}
