use std::fmt;

use anyhow::{Result, anyhow, bail};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value as SqlValue;
use serde::{Deserialize, Serialize};

use crate::{error::CoerceError, schema::ColumnType};

pub const DATE_STORAGE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format(DATE_STORAGE_FORMAT).to_string(),
            Value::DateTime(dt) => dt.format(DATETIME_STORAGE_FORMAT).to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    let trimmed = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    let trimmed = value.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

pub fn parse_boolean(value: &str) -> Result<bool> {
    let lowered = value.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => bail!("Failed to parse '{value}' as boolean"),
    }
}

/// Narrower than [`parse_boolean`]: single letters and digits are too common
/// in ordinary text columns to decide a column type from one value.
pub fn is_boolean_like(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "false" | "yes" | "no"
    )
}

/// Converts a cell into the SQLite value stored for a column of type `ty`.
pub fn coerce_value(value: Option<&Value>, ty: &ColumnType) -> Result<SqlValue, CoerceError> {
    let Some(value) = value else {
        return Ok(SqlValue::Null);
    };
    let mismatch = || CoerceError::Mismatch {
        value: value.as_display(),
        target: ty.clone(),
    };
    let coerced = match (ty, value) {
        (ColumnType::Text(max), other) => {
            let text = other.as_display();
            let len = text.chars().count();
            if len > *max {
                return Err(CoerceError::TooLong { len, max: *max });
            }
            SqlValue::Text(text)
        }
        (ColumnType::Integer, Value::Integer(i)) => SqlValue::Integer(*i),
        (ColumnType::Integer, Value::Boolean(b)) => SqlValue::Integer(i64::from(*b)),
        (ColumnType::Integer, Value::Float(f))
            // i64::MAX as f64 rounds up to 2^63, which does not fit.
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
        {
            SqlValue::Integer(*f as i64)
        }
        (ColumnType::Integer, Value::String(s)) => {
            SqlValue::Integer(s.trim().parse::<i64>().map_err(|_| mismatch())?)
        }
        (ColumnType::Float, Value::Float(f)) => SqlValue::Real(*f),
        (ColumnType::Float, Value::Integer(i)) => SqlValue::Real(*i as f64),
        (ColumnType::Float, Value::String(s)) => {
            SqlValue::Real(s.trim().parse::<f64>().map_err(|_| mismatch())?)
        }
        (ColumnType::Boolean, Value::Boolean(b)) => SqlValue::Integer(i64::from(*b)),
        (ColumnType::Boolean, Value::Integer(i @ (0 | 1))) => SqlValue::Integer(*i),
        (ColumnType::Boolean, Value::String(s)) => {
            SqlValue::Integer(i64::from(parse_boolean(s).map_err(|_| mismatch())?))
        }
        (ColumnType::Date, Value::Date(d)) => date_text(d),
        (ColumnType::Date, Value::DateTime(dt)) => date_text(&dt.date()),
        (ColumnType::Date, Value::String(s)) => {
            let parsed = parse_naive_date(s)
                .or_else(|_| parse_naive_datetime(s).map(|dt| dt.date()))
                .map_err(|_| mismatch())?;
            date_text(&parsed)
        }
        (ColumnType::DateTime, Value::DateTime(dt)) => datetime_text(dt),
        (ColumnType::DateTime, Value::Date(d)) => datetime_text(&d.and_time(Default::default())),
        (ColumnType::DateTime, Value::String(s)) => {
            let parsed = parse_naive_datetime(s)
                .or_else(|_| parse_naive_date(s).map(|d| d.and_time(Default::default())))
                .map_err(|_| mismatch())?;
            datetime_text(&parsed)
        }
        _ => return Err(mismatch()),
    };
    Ok(coerced)
}

fn date_text(date: &NaiveDate) -> SqlValue {
    SqlValue::Text(date.format(DATE_STORAGE_FORMAT).to_string())
}

fn datetime_text(datetime: &NaiveDateTime) -> SqlValue {
    SqlValue::Text(datetime.format(DATETIME_STORAGE_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    #[test]
    fn parse_naive_date_supports_multiple_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_naive_date("2024-05-06").unwrap(), expected);
        assert_eq!(parse_naive_date("06/05/2024").unwrap(), expected);
        assert_eq!(parse_naive_date("2024/05/06").unwrap(), expected);
        assert!(parse_naive_date("2024-05-06 10:00:00").is_err());
    }

    #[test]
    fn parse_naive_datetime_supports_multiple_formats() {
        let expected =
            NaiveDateTime::parse_from_str("2024-05-06 14:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(
            parse_naive_datetime("2024-05-06T14:30:00").unwrap(),
            expected
        );
        assert_eq!(
            parse_naive_datetime("06/05/2024 14:30:00").unwrap(),
            expected
        );
        assert_eq!(parse_naive_datetime("2024-05-06 14:30").unwrap(), expected);
        assert!(parse_naive_datetime("2024-05-06").is_err());
    }

    #[test]
    fn boolean_detection_is_narrower_than_parsing() {
        assert!(parse_boolean("Y").unwrap());
        assert!(!parse_boolean("0").unwrap());
        assert!(parse_boolean("maybe").is_err());
        assert!(is_boolean_like("TRUE"));
        assert!(is_boolean_like("no"));
        assert!(!is_boolean_like("y"));
        assert!(!is_boolean_like("1"));
    }

    #[test]
    fn coerce_value_parses_numeric_text() {
        assert_eq!(
            coerce_value(Some(&Value::from("3.14")), &ColumnType::Float).unwrap(),
            SqlValue::Real(3.14)
        );
        assert_eq!(
            coerce_value(Some(&Value::from(" 42 ")), &ColumnType::Integer).unwrap(),
            SqlValue::Integer(42)
        );
        assert_eq!(
            coerce_value(Some(&Value::Float(7.0)), &ColumnType::Integer).unwrap(),
            SqlValue::Integer(7)
        );
        assert_eq!(
            coerce_value(None, &ColumnType::Integer).unwrap(),
            SqlValue::Null
        );
    }

    #[test]
    fn coerce_value_rejects_mismatched_values() {
        let err = coerce_value(Some(&Value::from("abc")), &ColumnType::Integer).unwrap_err();
        assert_eq!(
            err,
            CoerceError::Mismatch {
                value: "abc".to_string(),
                target: ColumnType::Integer
            }
        );
        assert!(coerce_value(Some(&Value::Float(1.5)), &ColumnType::Integer).is_err());
        assert!(coerce_value(Some(&Value::Integer(2)), &ColumnType::Boolean).is_err());
        assert!(coerce_value(Some(&Value::Boolean(true)), &ColumnType::Date).is_err());
    }

    #[test]
    fn coerce_value_rejects_floats_outside_i64() {
        let two_pow_63 = 9_223_372_036_854_775_808_f64;
        assert!(matches!(
            coerce_value(Some(&Value::Float(two_pow_63)), &ColumnType::Integer),
            Err(CoerceError::Mismatch {
                target: ColumnType::Integer,
                ..
            })
        ));
        assert_eq!(
            coerce_value(Some(&Value::Float(-two_pow_63)), &ColumnType::Integer).unwrap(),
            SqlValue::Integer(i64::MIN)
        );
        let too_big = Value::from("9223372036854775808");
        assert!(coerce_value(Some(&too_big), &ColumnType::Integer).is_err());
    }

    #[test]
    fn coerce_value_formats_temporal_values() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 27).unwrap();
        assert_eq!(
            coerce_value(Some(&Value::Date(date)), &ColumnType::DateTime).unwrap(),
            SqlValue::Text("2025-02-27 00:00:00".to_string())
        );
        assert_eq!(
            coerce_value(Some(&Value::from("2025-02-27T09:15:00")), &ColumnType::Date).unwrap(),
            SqlValue::Text("2025-02-27".to_string())
        );
    }

    #[test]
    fn coerce_value_enforces_text_length() {
        let long = "x".repeat(6);
        assert_eq!(
            coerce_value(Some(&Value::from(long.as_str())), &ColumnType::Text(5)).unwrap_err(),
            CoerceError::TooLong { len: 6, max: 5 }
        );
        assert_eq!(
            coerce_value(Some(&Value::Integer(12)), &ColumnType::Text(5)).unwrap(),
            SqlValue::Text("12".to_string())
        );
    }
}
