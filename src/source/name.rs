//! Normalized property names.
//!
//! A name is a sequence of elements. Dotted elements compare in a relaxed
//! form (lowercase, alphanumerics only), so `server.max-size`,
//! `server.maxSize` and `SERVER.MAX_SIZE` all name the same property.
//! Bracketed elements (`list[0]`, `map[key.with.dots]`) compare verbatim.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PropertyNameError {
    #[error("empty element in property name '{0}'")]
    EmptyElement(String),

    #[error("unclosed '[' in property name '{0}'")]
    UnclosedBracket(String),

    #[error("unexpected character after ']' in property name '{0}'")]
    TrailingCharacters(String),
}

#[derive(Debug, Clone)]
struct Element {
    raw: String,
    canonical: String,
    indexed: bool,
}

impl Element {
    fn dotted(raw: &str) -> Self {
        let canonical = raw
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        Self {
            raw: raw.to_string(),
            canonical,
            indexed: false,
        }
    }

    fn indexed(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            canonical: raw.to_string(),
            indexed: true,
        }
    }
}

/// A parsed, syntax-agnostic property name such as `app.servers[0].port`.
#[derive(Debug, Clone, Default)]
pub struct PropertyName {
    elements: Vec<Element>,
}

impl PropertyName {
    /// The empty name. Every other name is a descendant of it.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses dot/bracket notation. The empty string parses to [`root`](Self::root).
    pub fn parse(name: &str) -> Result<Self, PropertyNameError> {
        let mut elements = Vec::new();
        let mut current = String::new();
        let mut after_bracket = false;
        let mut chars = name.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '.' => {
                    if !current.is_empty() {
                        elements.push(Element::dotted(&current));
                        current.clear();
                    } else if !after_bracket {
                        return Err(PropertyNameError::EmptyElement(name.to_string()));
                    }
                    if chars.peek().is_none() {
                        return Err(PropertyNameError::EmptyElement(name.to_string()));
                    }
                    after_bracket = false;
                }
                '[' => {
                    if !current.is_empty() {
                        elements.push(Element::dotted(&current));
                        current.clear();
                    }
                    let raw = consume_until(&mut chars, ']')
                        .ok_or_else(|| PropertyNameError::UnclosedBracket(name.to_string()))?;
                    if raw.is_empty() {
                        return Err(PropertyNameError::EmptyElement(name.to_string()));
                    }
                    elements.push(Element::indexed(&raw));
                    if !matches!(chars.peek(), None | Some('.') | Some('[')) {
                        return Err(PropertyNameError::TrailingCharacters(name.to_string()));
                    }
                    after_bracket = true;
                }
                ']' => return Err(PropertyNameError::TrailingCharacters(name.to_string())),
                _ => current.push(ch),
            }
        }

        if !current.is_empty() {
            elements.push(Element::dotted(&current));
        }
        Ok(Self { elements })
    }

    /// Appends one element. Keys that cannot be written in dotted form
    /// (they contain `.`, `[` or `]`) become bracketed elements.
    pub fn child(&self, key: &str) -> Self {
        let element = if key.contains(['.', '[', ']']) {
            Element::indexed(key)
        } else {
            Element::dotted(key)
        };
        self.with_element(element)
    }

    /// Appends a `[index]` element.
    pub fn index(&self, index: usize) -> Self {
        self.with_element(Element::indexed(&index.to_string()))
    }

    fn with_element(&self, element: Element) -> Self {
        let mut elements = self.elements.clone();
        elements.push(element);
        Self { elements }
    }

    /// Returns the name made of the first `len` elements.
    pub fn truncate(&self, len: usize) -> Self {
        Self {
            elements: self.elements.iter().take(len).cloned().collect(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Original spelling of the element at `index`.
    pub fn element(&self, index: usize) -> Option<&str> {
        self.elements.get(index).map(|e| e.raw.as_str())
    }

    /// True when `other` is a strict descendant of this name.
    pub fn is_ancestor_of(&self, other: &PropertyName) -> bool {
        other.elements.len() > self.elements.len() && self.is_prefix_of(other)
    }

    /// True when `other` equals this name or descends from it.
    pub fn is_prefix_of(&self, other: &PropertyName) -> bool {
        other.elements.len() >= self.elements.len()
            && self
                .elements
                .iter()
                .zip(&other.elements)
                .all(|(a, b)| a.canonical == b.canonical)
    }

    /// Joins the original spelling of the elements `descendant` has beyond
    /// this name with `.`, dropping brackets: `a` and `a.b[c.d]` give `b.c.d`.
    pub(crate) fn relative_key(&self, descendant: &PropertyName) -> String {
        descendant
            .elements
            .iter()
            .skip(self.elements.len())
            .map(|e| e.raw.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }
}

fn consume_until(chars: &mut std::iter::Peekable<std::str::Chars>, delim: char) -> Option<String> {
    let mut result = String::new();
    for ch in chars.by_ref() {
        if ch == delim {
            return Some(result);
        }
        result.push(ch);
    }
    None
}

fn render(elements: &[Element]) -> String {
    let mut out = String::new();
    for element in elements {
        if element.indexed {
            out.push('[');
            out.push_str(&element.raw);
            out.push(']');
        } else {
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(&element.raw);
        }
    }
    out
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.elements))
    }
}

impl PartialEq for PropertyName {
    fn eq(&self, other: &Self) -> bool {
        self.elements.len() == other.elements.len() && self.is_prefix_of(other)
    }
}

impl Eq for PropertyName {}

impl Hash for PropertyName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.elements.len().hash(state);
        for element in &self.elements {
            element.canonical.hash(state);
        }
    }
}

impl PartialOrd for PropertyName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PropertyName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.elements
            .iter()
            .map(|e| e.canonical.as_str())
            .cmp(other.elements.iter().map(|e| e.canonical.as_str()))
    }
}
