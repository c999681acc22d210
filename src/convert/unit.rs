//! Durations and data sizes with unit suffixes.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use toml::{Table, Value};

use super::ConversionError;

/// A size in bytes, bound from values such as `512`, `64KB` or `1GB`.
///
/// Units are binary multiples: `1KB` is 1024 bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataSize(u64);

impl DataSize {
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// `None` when the byte count does not fit in a `u64`.
    pub const fn from_kilobytes(kilobytes: u64) -> Option<Self> {
        match kilobytes.checked_mul(1024) {
            Some(bytes) => Some(Self(bytes)),
            None => None,
        }
    }

    /// `None` when the byte count does not fit in a `u64`.
    pub const fn from_megabytes(megabytes: u64) -> Option<Self> {
        match megabytes.checked_mul(1024 * 1024) {
            Some(bytes) => Some(Self(bytes)),
            None => None,
        }
    }

    pub const fn as_bytes(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DataSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}B", self.0)
    }
}

const DURATION: &str = "duration";
const DATA_SIZE: &str = "data size";

/// Converts to the `{ secs, nanos }` table serde expects for [`Duration`].
///
/// Strings use `<n><unit>` with `ns`, `us`, `ms`, `s`, `m`, `h` or `d`
/// (no unit means milliseconds), or ISO-8601 such as `PT1H30M`.
/// Bare integers are milliseconds.
pub(crate) fn to_duration(value: &Value) -> Result<Value, ConversionError> {
    let duration = match value {
        Value::Integer(millis) => {
            let millis = u64::try_from(*millis)
                .map_err(|_| ConversionError::malformed(millis.to_string(), DURATION, "negative durations are not supported"))?;
            Duration::from_millis(millis)
        }
        Value::String(s) => parse_duration(s.trim())?,
        other => return Err(ConversionError::mismatch(DURATION, other)),
    };

    let secs = i64::try_from(duration.as_secs())
        .map_err(|_| ConversionError::overflow(value.to_string(), DURATION))?;
    let mut table = Table::new();
    table.insert("secs".into(), Value::Integer(secs));
    table.insert("nanos".into(), Value::Integer(i64::from(duration.subsec_nanos())));
    Ok(Value::Table(table))
}

fn parse_duration(s: &str) -> Result<Duration, ConversionError> {
    if s.starts_with(['P', 'p']) {
        return parse_iso_duration(s);
    }
    if s.starts_with('-') {
        return Err(ConversionError::malformed(s, DURATION, "negative durations are not supported"));
    }

    let (amount, unit) = split_amount(s.strip_prefix('+').unwrap_or(s), DURATION)?;
    let overflow = || ConversionError::overflow(s, DURATION);
    let seconds = |factor: u64| amount.checked_mul(factor).map(Duration::from_secs).ok_or_else(overflow);

    match unit.to_ascii_lowercase().as_str() {
        "ns" => Ok(Duration::from_nanos(amount)),
        "us" => Ok(Duration::from_micros(amount)),
        "" | "ms" => Ok(Duration::from_millis(amount)),
        "s" => seconds(1),
        "m" => seconds(60),
        "h" => seconds(60 * 60),
        "d" => seconds(24 * 60 * 60),
        _ => Err(ConversionError::InvalidUnit {
            value: s.to_string(),
            unit: unit.to_string(),
        }),
    }
}

/// `PnDTnHnMn.nS`; weeks, months and years are not accepted.
fn parse_iso_duration(s: &str) -> Result<Duration, ConversionError> {
    let malformed = || ConversionError::malformed(s, DURATION, "not an ISO-8601 duration");
    let overflow = || ConversionError::overflow(s, DURATION);

    let upper = s.to_ascii_uppercase();
    let body = &upper[1..];
    let (date, time) = match body.split_once('T') {
        Some((date, time)) if !time.is_empty() => (date, Some(time)),
        Some(_) => return Err(malformed()),
        None => (body, None),
    };
    if date.is_empty() && time.is_none() {
        return Err(malformed());
    }

    let mut secs: u64 = 0;
    let mut nanos: u32 = 0;
    let mut add = |amount: u64, factor: u64| -> Result<(), ConversionError> {
        secs = amount
            .checked_mul(factor)
            .and_then(|s| secs.checked_add(s))
            .ok_or_else(overflow)?;
        Ok(())
    };

    if !date.is_empty() {
        let days = date.strip_suffix('D').ok_or_else(malformed)?;
        add(days.parse().map_err(|_| malformed())?, 24 * 60 * 60)?;
    }

    let mut rest = time.unwrap_or_default();
    while !rest.is_empty() {
        let end = rest.find(['H', 'M', 'S']).ok_or_else(malformed)?;
        let (number, unit) = (&rest[..end], &rest[end..=end]);
        rest = &rest[end + 1..];
        match unit {
            "H" => add(number.parse().map_err(|_| malformed())?, 60 * 60)?,
            "M" => add(number.parse().map_err(|_| malformed())?, 60)?,
            _ => {
                let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
                add(whole.parse().map_err(|_| malformed())?, 1)?;
                if !fraction.is_empty() {
                    if fraction.len() > 9 || !fraction.chars().all(|c| c.is_ascii_digit()) {
                        return Err(malformed());
                    }
                    let padded = format!("{fraction:0<9}");
                    nanos = padded.parse().map_err(|_| malformed())?;
                }
            }
        }
    }

    Ok(Duration::new(secs, nanos))
}

/// Converts to a byte count. Strings use `<n><unit>` with `B`, `KB`, `MB`,
/// `GB` or `TB` (no unit means bytes).
pub(crate) fn to_data_size(value: &Value) -> Result<Value, ConversionError> {
    let bytes = match value {
        Value::Integer(bytes) if *bytes >= 0 => return Ok(Value::Integer(*bytes)),
        Value::Integer(bytes) => {
            return Err(ConversionError::malformed(bytes.to_string(), DATA_SIZE, "negative sizes are not supported"))
        }
        Value::String(s) => parse_data_size(s.trim())?,
        other => return Err(ConversionError::mismatch(DATA_SIZE, other)),
    };
    i64::try_from(bytes)
        .map(Value::Integer)
        .map_err(|_| ConversionError::overflow(value.to_string(), DATA_SIZE))
}

fn parse_data_size(s: &str) -> Result<u64, ConversionError> {
    let (amount, unit) = split_amount(s, DATA_SIZE)?;
    let factor: u64 = match unit.to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "KB" => 1 << 10,
        "MB" => 1 << 20,
        "GB" => 1 << 30,
        "TB" => 1 << 40,
        _ => {
            return Err(ConversionError::InvalidUnit {
                value: s.to_string(),
                unit: unit.to_string(),
            })
        }
    };
    amount
        .checked_mul(factor)
        .ok_or_else(|| ConversionError::overflow(s, DATA_SIZE))
}

/// Splits `"10ms"` into `(10, "ms")`.
fn split_amount<'a>(s: &'a str, target: &str) -> Result<(u64, &'a str), ConversionError> {
    let digits = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if digits == 0 {
        return Err(ConversionError::malformed(s, target, "expected a number"));
    }
    let (number, unit) = s.split_at(digits);
    let amount = number
        .parse::<u64>()
        .map_err(|_| ConversionError::overflow(s, target))?;
    Ok((amount, unit.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duration(s: &str) -> Result<Duration, ConversionError> {
        let table = to_duration(&Value::String(s.into()))?;
        Ok(table.try_into().unwrap())
    }

    #[test]
    fn test_simple_durations() {
        assert_eq!(duration("10").unwrap(), Duration::from_millis(10));
        assert_eq!(duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(duration("1d").unwrap(), Duration::from_secs(86400));
        assert_eq!(duration("7 us").unwrap(), Duration::from_micros(7));
        assert_eq!(duration("3NS").unwrap(), Duration::from_nanos(3));
    }

    #[test]
    fn test_integer_duration_is_millis() {
        let value = to_duration(&Value::Integer(1500)).unwrap();
        let parsed: Duration = value.try_into().unwrap();
        assert_eq!(parsed, Duration::from_millis(1500));
    }

    #[test]
    fn test_iso_durations() {
        assert_eq!(duration("PT1H30M").unwrap(), Duration::from_secs(5400));
        assert_eq!(duration("P2D").unwrap(), Duration::from_secs(172_800));
        assert_eq!(duration("pt0.5s").unwrap(), Duration::from_millis(500));
        assert_eq!(duration("P1DT1S").unwrap(), Duration::from_secs(86_401));
        assert!(duration("PT").is_err());
        assert!(duration("P1W").is_err());
    }

    #[test]
    fn test_invalid_durations() {
        assert!(matches!(duration("10y"), Err(ConversionError::InvalidUnit { .. })));
        assert!(matches!(duration("-5s"), Err(ConversionError::Malformed { .. })));
        assert!(matches!(duration("s"), Err(ConversionError::Malformed { .. })));
        assert!(matches!(
            duration("99999999999999999999d"),
            Err(ConversionError::Overflow { .. })
        ));
        assert!(matches!(
            duration("999999999999999999d"),
            Err(ConversionError::Overflow { .. })
        ));
        assert!(matches!(
            to_duration(&Value::Boolean(true)),
            Err(ConversionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_data_sizes() {
        let size = |s: &str| to_data_size(&Value::String(s.into()));
        assert_eq!(size("512").unwrap(), Value::Integer(512));
        assert_eq!(size("10KB").unwrap(), Value::Integer(10 * 1024));
        assert_eq!(size("1gb").unwrap(), Value::Integer(1 << 30));
        assert_eq!(size("2 TB").unwrap(), Value::Integer(2 << 40));
        assert!(matches!(size("1PB"), Err(ConversionError::InvalidUnit { .. })));
        assert!(matches!(size("20000000TB"), Err(ConversionError::Overflow { .. })));
        assert!(matches!(size("KB"), Err(ConversionError::Malformed { .. })));
    }

    #[test]
    fn test_data_size_newtype() {
        assert_eq!(DataSize::from_kilobytes(2).map(DataSize::as_bytes), Some(2048));
        assert_eq!(DataSize::from_megabytes(1).map(|size| size.to_string()).as_deref(), Some("1048576B"));
    }

    #[test]
    fn test_data_size_constructors_reject_overflow() {
        assert_eq!(DataSize::from_kilobytes(u64::MAX / 1024).map(DataSize::as_bytes), Some(u64::MAX / 1024 * 1024));
        assert_eq!(DataSize::from_kilobytes(u64::MAX / 1024 + 1), None);
        assert_eq!(DataSize::from_megabytes(u64::MAX), None);
    }
}
