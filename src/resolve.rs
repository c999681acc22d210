//! Placeholder expansion for property values.
//!
//! Supports `${name}` and `${name:default}` references to other properties.
//! Names and defaults may themselves contain placeholders, and resolved
//! values are expanded recursively. Use `$$` to escape and produce a literal `$`.
//!
//! Expansion is lazy: the binder expands a value only when it is about to
//! convert it, so placeholders in properties nobody binds are never looked at.

use toml::Value;

use crate::convert::PlaceholderError;
use crate::source::{PropertyName, PropertySources};

/// Expands placeholders against a snapshot of property sources.
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderResolver<'a> {
    sources: &'a PropertySources,
}

impl<'a> PlaceholderResolver<'a> {
    pub fn new(sources: &'a PropertySources) -> Self {
        Self { sources }
    }

    /// Expands strings, and strings inside arrays. Other values pass through.
    pub fn resolve_value(&self, value: &Value) -> Result<Value, PlaceholderError> {
        match value {
            Value::String(s) => self.resolve(s).map(Value::String),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_value(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    pub fn resolve(&self, text: &str) -> Result<String, PlaceholderError> {
        self.expand(text, &mut Vec::new())
    }

    fn expand(&self, text: &str, visiting: &mut Vec<String>) -> Result<String, PlaceholderError> {
        if !text.contains('$') {
            return Ok(text.to_string());
        }

        let mut result = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch != '$' {
                result.push(ch);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    result.push('$');
                }
                Some('{') => {
                    chars.next();
                    let body = consume_placeholder(&mut chars)
                        .ok_or_else(|| PlaceholderError::Unclosed(text.to_string()))?;
                    result.push_str(&self.substitute(&body, visiting)?);
                }
                _ => result.push('$'),
            }
        }

        Ok(result)
    }

    fn substitute(&self, body: &str, visiting: &mut Vec<String>) -> Result<String, PlaceholderError> {
        let (key, default) = split_default(body);
        let key = self.expand(key, visiting)?;

        if visiting.contains(&key) {
            let mut chain = visiting.clone();
            chain.push(key);
            return Err(PlaceholderError::Cycle(chain.join(" -> ")));
        }

        match self.lookup(&key)? {
            Some(raw) => {
                visiting.push(key);
                let expanded = self.expand(&raw, visiting);
                visiting.pop();
                expanded
            }
            None => match default {
                Some(default) => self.expand(default, visiting),
                None => Err(PlaceholderError::Unresolvable(key)),
            },
        }
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, PlaceholderError> {
        let name = PropertyName::parse(key.trim())
            .map_err(|_| PlaceholderError::InvalidName(key.to_string()))?;
        if name.is_root() {
            return Err(PlaceholderError::InvalidName(key.to_string()));
        }
        self.sources
            .get(&name)
            .map(|value| value_to_string(value, key))
            .transpose()
    }
}

/// Consumes the body of a `${...}` up to its matching `}`.
fn consume_placeholder(chars: &mut std::iter::Peekable<std::str::Chars>) -> Option<String> {
    let mut body = String::new();
    let mut depth = 0usize;
    for ch in chars.by_ref() {
        match ch {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(body),
            '}' => depth -= 1,
            _ => {}
        }
        body.push(ch);
    }
    None
}

/// Splits `name:default` at the first `:` outside nested braces.
fn split_default(body: &str) -> (&str, Option<&str>) {
    let mut depth = 0usize;
    for (i, ch) in body.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => return (&body[..i], Some(&body[i + 1..])),
            _ => {}
        }
    }
    (body, None)
}

fn value_to_string(value: &Value, key: &str) -> Result<String, PlaceholderError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::Datetime(dt) => Ok(dt.to_string()),
        Value::Array(_) | Value::Table(_) => Err(PlaceholderError::NonScalar(key.to_string())),
    }
}
