//! Explicit descriptions of what a bind populates.
//!
//! Targets describe themselves once through [`Configurable`]; the binder
//! walks the resulting [`Shape`] instead of inspecting types at runtime.
//!
//! ```
//! use dragon_bind::{Configurable, Shape};
//!
//! struct Server {
//!     host: String,
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
//! assert_eq!(Server::shape().type_name(), "Server");
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::time::Duration;

use crate::convert::DataSize;

/// Target description for one node of a bind.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// The raw value, unconverted.
    Any,
    Bool,
    Char,
    String,
    Integer(IntKind),
    Float(FloatKind),
    Duration,
    DataSize,
    Enum(EnumShape),
    /// A leaf only a registered converter can produce.
    Custom(String),
    Sequence(Box<Shape>),
    Set(Box<Shape>),
    /// String keys to values of the inner shape.
    Map(Box<Shape>),
    Object(ObjectShape),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
}

impl IntKind {
    pub fn name(self) -> &'static str {
        match self {
            IntKind::I8 => "i8",
            IntKind::I16 => "i16",
            IntKind::I32 => "i32",
            IntKind::I64 => "i64",
            IntKind::Isize => "isize",
            IntKind::U8 => "u8",
            IntKind::U16 => "u16",
            IntKind::U32 => "u32",
            IntKind::U64 => "u64",
            IntKind::Usize => "usize",
        }
    }

    /// Inclusive bounds. Everything is capped to `i64` because bound values
    /// travel through a TOML tree.
    pub(crate) fn bounds(self) -> (i128, i128) {
        let (min, max) = match self {
            IntKind::I8 => (i8::MIN as i128, i8::MAX as i128),
            IntKind::I16 => (i16::MIN as i128, i16::MAX as i128),
            IntKind::I32 => (i32::MIN as i128, i32::MAX as i128),
            IntKind::I64 => (i64::MIN as i128, i64::MAX as i128),
            IntKind::Isize => (isize::MIN as i128, isize::MAX as i128),
            IntKind::U8 => (0, u8::MAX as i128),
            IntKind::U16 => (0, u16::MAX as i128),
            IntKind::U32 => (0, u32::MAX as i128),
            IntKind::U64 => (0, u64::MAX as i128),
            IntKind::Usize => (0, usize::MAX as i128),
        };
        (min.max(i64::MIN as i128), max.min(i64::MAX as i128))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatKind {
    F32,
    F64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumShape {
    name: String,
    variants: Vec<String>,
}

impl EnumShape {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }
}

/// A structured target: named fields, each with its own shape.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct ObjectShape {
    name: String,
    fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    shape: Shape,
}

impl Field {
    /// The key used in the bound tree; matches the target's serde field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

impl ObjectShape {
    pub fn field(mut self, name: impl Into<String>, shape: impl Into<Shape>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            shape: shape.into(),
        });
        self
    }

    pub fn field_of<T: Configurable>(self, name: impl Into<String>) -> Self {
        self.field(name, T::shape())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

impl From<ObjectShape> for Shape {
    fn from(object: ObjectShape) -> Self {
        Shape::Object(object)
    }
}

impl Shape {
    pub fn object(name: impl Into<String>) -> ObjectShape {
        ObjectShape {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// An enum bound from its variant names. Matching is relaxed, so
    /// `read-only` selects a variant named `ReadOnly`.
    pub fn enumeration<I, S>(name: impl Into<String>, variants: I) -> Shape
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Shape::Enum(EnumShape {
            name: name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
        })
    }

    pub fn custom(name: impl Into<String>) -> Shape {
        Shape::Custom(name.into())
    }

    pub fn sequence_of(element: impl Into<Shape>) -> Shape {
        Shape::Sequence(Box::new(element.into()))
    }

    pub fn set_of(element: impl Into<Shape>) -> Shape {
        Shape::Set(Box::new(element.into()))
    }

    pub fn map_of(value: impl Into<Shape>) -> Shape {
        Shape::Map(Box::new(value.into()))
    }

    /// Name used in messages and as the key for exact converter lookups.
    pub fn type_name(&self) -> String {
        match self {
            Shape::Any => "any".into(),
            Shape::Bool => "bool".into(),
            Shape::Char => "char".into(),
            Shape::String => "string".into(),
            Shape::Integer(kind) => kind.name().into(),
            Shape::Float(FloatKind::F32) => "f32".into(),
            Shape::Float(FloatKind::F64) => "f64".into(),
            Shape::Duration => "duration".into(),
            Shape::DataSize => "data size".into(),
            Shape::Enum(shape) => shape.name.clone(),
            Shape::Custom(name) => name.clone(),
            Shape::Sequence(element) => format!("list<{}>", element.type_name()),
            Shape::Set(element) => format!("set<{}>", element.type_name()),
            Shape::Map(value) => format!("map<string, {}>", value.type_name()),
            Shape::Object(object) => object.name.clone(),
        }
    }

    /// Leaves are bound from a single property.
    pub fn is_leaf(&self) -> bool {
        !matches!(
            self,
            Shape::Sequence(_) | Shape::Set(_) | Shape::Map(_) | Shape::Object(_)
        )
    }
}

/// Types that can describe their own bind shape.
pub trait Configurable {
    fn shape() -> Shape;
}

macro_rules! leaf_shape {
    ($($ty:ty => $shape:expr),* $(,)?) => {
        $(
            impl Configurable for $ty {
                fn shape() -> Shape {
                    $shape
                }
            }
        )*
    };
}

leaf_shape! {
    bool => Shape::Bool,
    char => Shape::Char,
    String => Shape::String,
    i8 => Shape::Integer(IntKind::I8),
    i16 => Shape::Integer(IntKind::I16),
    i32 => Shape::Integer(IntKind::I32),
    i64 => Shape::Integer(IntKind::I64),
    isize => Shape::Integer(IntKind::Isize),
    u8 => Shape::Integer(IntKind::U8),
    u16 => Shape::Integer(IntKind::U16),
    u32 => Shape::Integer(IntKind::U32),
    u64 => Shape::Integer(IntKind::U64),
    usize => Shape::Integer(IntKind::Usize),
    f32 => Shape::Float(FloatKind::F32),
    f64 => Shape::Float(FloatKind::F64),
    Duration => Shape::Duration,
    DataSize => Shape::DataSize,
    toml::Value => Shape::Any,
}

impl<T: Configurable> Configurable for Option<T> {
    fn shape() -> Shape {
        T::shape()
    }
}

impl<T: Configurable> Configurable for Box<T> {
    fn shape() -> Shape {
        T::shape()
    }
}

impl<T: Configurable> Configurable for Vec<T> {
    fn shape() -> Shape {
        Shape::sequence_of(T::shape())
    }
}

impl<T: Configurable> Configurable for VecDeque<T> {
    fn shape() -> Shape {
        Shape::sequence_of(T::shape())
    }
}

impl<T: Configurable, S> Configurable for HashSet<T, S> {
    fn shape() -> Shape {
        Shape::set_of(T::shape())
    }
}

impl<T: Configurable> Configurable for BTreeSet<T> {
    fn shape() -> Shape {
        Shape::set_of(T::shape())
    }
}

impl<V: Configurable, S> Configurable for HashMap<String, V, S> {
    fn shape() -> Shape {
        Shape::map_of(V::shape())
    }
}

impl<V: Configurable> Configurable for BTreeMap<String, V> {
    fn shape() -> Shape {
        Shape::map_of(V::shape())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_type_names() {
        assert_eq!(Vec::<u16>::shape().type_name(), "list<u16>");
        assert_eq!(HashSet::<String>::shape().type_name(), "set<string>");
        assert_eq!(
            BTreeMap::<String, Duration>::shape().type_name(),
            "map<string, duration>"
        );
        assert_eq!(Option::<bool>::shape(), Shape::Bool);
    }

    #[test]
    fn test_unsigned_bounds_are_capped() {
        assert_eq!(IntKind::U8.bounds(), (0, 255));
        assert_eq!(IntKind::U64.bounds(), (0, i64::MAX as i128));
        assert_eq!(IntKind::I64.bounds(), (i64::MIN as i128, i64::MAX as i128));
    }

    #[test]
    fn test_object_fields_keep_declaration_order() {
        let shape = Shape::object("Server")
            .field_of::<String>("host")
            .field("ports", Shape::sequence_of(Shape::Integer(IntKind::U16)));
        let names: Vec<_> = shape.fields().iter().map(Field::name).collect();
        assert_eq!(names, vec!["host", "ports"]);
        assert!(!Shape::from(shape).is_leaf());
    }
}
