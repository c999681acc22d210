use std::num::IntErrorKind;

use toml::Value;

use super::{unit, ConversionError};
use crate::bind::{EnumShape, FloatKind, IntKind, Shape};

/// Built-in conversions for leaf shapes.
pub(super) fn convert(value: &Value, shape: &Shape) -> Result<Value, ConversionError> {
    match shape {
        Shape::Any => Ok(value.clone()),
        Shape::String => to_text(value, "string").map(Value::String),
        Shape::Bool => to_bool(value),
        Shape::Char => to_char(value),
        Shape::Integer(kind) => to_integer(value, *kind),
        Shape::Float(kind) => to_float(value, *kind),
        Shape::Enum(shape) => to_variant(value, shape),
        Shape::Duration => unit::to_duration(value),
        Shape::DataSize => unit::to_data_size(value),
        other => Err(ConversionError::NoConverter {
            target: other.type_name(),
        }),
    }
}

/// Renders a scalar as text. Arrays and tables have no text form.
pub(super) fn to_text(value: &Value, target: &str) -> Result<String, ConversionError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::Datetime(dt) => Ok(dt.to_string()),
        other => Err(ConversionError::mismatch(target, other)),
    }
}

fn to_bool(value: &Value) -> Result<Value, ConversionError> {
    let text = match value {
        Value::Boolean(b) => return Ok(Value::Boolean(*b)),
        Value::Integer(i) => i.to_string(),
        Value::String(s) => s.trim().to_ascii_lowercase(),
        other => return Err(ConversionError::mismatch("bool", other)),
    };
    match text.as_str() {
        "true" | "on" | "yes" | "1" => Ok(Value::Boolean(true)),
        "false" | "off" | "no" | "0" => Ok(Value::Boolean(false)),
        _ => Err(ConversionError::malformed(text, "bool", "expected true/false, on/off, yes/no or 1/0")),
    }
}

fn to_char(value: &Value) -> Result<Value, ConversionError> {
    let text = to_text(value, "char")?;
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(_), None) => Ok(Value::String(text)),
        _ => Err(ConversionError::malformed(text, "char", "expected a single character")),
    }
}

fn to_integer(value: &Value, kind: IntKind) -> Result<Value, ConversionError> {
    let target = kind.name();
    let parsed: i128 = match value {
        Value::Integer(i) => i128::from(*i),
        Value::String(s) => parse_integer(s.trim(), target)?,
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 => {
            if f.abs() > i64::MAX as f64 {
                return Err(ConversionError::overflow(f.to_string(), target));
            }
            *f as i128
        }
        Value::Float(f) => {
            return Err(ConversionError::malformed(f.to_string(), target, "not a whole number"))
        }
        other => return Err(ConversionError::mismatch(target, other)),
    };

    let (min, max) = kind.bounds();
    if parsed < min || parsed > max {
        return Err(ConversionError::overflow(parsed.to_string(), target));
    }
    i64::try_from(parsed)
        .map(Value::Integer)
        .map_err(|_| ConversionError::overflow(parsed.to_string(), target))
}

fn parse_integer(s: &str, target: &str) -> Result<i128, ConversionError> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (radix, digits) = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => (16, hex),
        None => (10, digits),
    };
    if digits.starts_with(['+', '-']) {
        return Err(ConversionError::malformed(s, target, "not an integer"));
    }

    match i128::from_str_radix(digits, radix) {
        Ok(n) => Ok(if negative { -n } else { n }),
        Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
            Err(ConversionError::overflow(s, target))
        }
        Err(_) => Err(ConversionError::malformed(s, target, "not an integer")),
    }
}

fn to_float(value: &Value, kind: FloatKind) -> Result<Value, ConversionError> {
    let target = match kind {
        FloatKind::F32 => "f32",
        FloatKind::F64 => "f64",
    };
    let parsed = match value {
        Value::Float(f) => *f,
        Value::Integer(i) => *i as f64,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ConversionError::malformed(s.as_str(), target, "not a number"))?,
        other => return Err(ConversionError::mismatch(target, other)),
    };
    if kind == FloatKind::F32 && parsed.is_finite() && (parsed as f32).is_infinite() {
        return Err(ConversionError::overflow(parsed.to_string(), target));
    }
    Ok(Value::Float(parsed))
}

/// Matches variant names in relaxed form: case, `-` and `_` are ignored.
fn to_variant(value: &Value, shape: &EnumShape) -> Result<Value, ConversionError> {
    let text = to_text(value, shape.name())?;
    let wanted = relaxed(&text);
    shape
        .variants()
        .iter()
        .find(|variant| relaxed(variant) == wanted)
        .map(|variant| Value::String(variant.clone()))
        .ok_or_else(|| {
            ConversionError::malformed(
                text.as_str(),
                shape.name(),
                format!("expected one of [{}]", shape.variants().join(", ")),
            )
        })
}

fn relaxed(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
