//! Destination schema model and the sample-driven type inferencer.
//!
//! Inference looks at the declared element type of each sample column. Typed
//! columns map directly; `object` columns are decided by their first non-null
//! value, checking date, then datetime, then boolean, before settling on
//! bounded text.

use std::{fmt, fs::File, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    data::{Value, is_boolean_like, parse_naive_date, parse_naive_datetime},
    frame::{DType, Frame},
    transform::{Transform, apply_optional},
};

/// Length of every inferred text column.
pub const DEFAULT_TEXT_LENGTH: usize = 255;
/// Text length recorded for declarations without a bound, such as `TEXT`.
pub const UNBOUNDED_TEXT: usize = usize::MAX;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text(usize),
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
}

impl ColumnType {
    pub fn text() -> Self {
        ColumnType::Text(DEFAULT_TEXT_LENGTH)
    }

    /// Maps a declared SQL column type onto the closest loader type.
    ///
    /// Returns `None` for declarations with no strict counterpart (`NUMERIC`,
    /// `BLOB`, an empty declaration), which callers treat as "use the
    /// inferred type".
    pub fn from_declared(declared: &str) -> Option<Self> {
        let upper = declared.trim().to_ascii_uppercase();
        let has = |needle: &str| upper.contains(needle);
        let ty = if has("DATETIME") || has("TIMESTAMP") {
            ColumnType::DateTime
        } else if has("DATE") {
            ColumnType::Date
        } else if has("BOOL") {
            ColumnType::Boolean
        } else if has("INT") {
            ColumnType::Integer
        } else if has("CHAR") || has("CLOB") || has("TEXT") {
            ColumnType::Text(declared_length(&upper).unwrap_or(UNBOUNDED_TEXT))
        } else if has("REAL") || has("FLOA") || has("DOUB") {
            ColumnType::Float
        } else {
            return None;
        };
        Some(ty)
    }

    pub fn sql_type(&self) -> String {
        match self {
            ColumnType::Text(UNBOUNDED_TEXT) => "TEXT".to_string(),
            ColumnType::Text(len) => format!("VARCHAR({len})"),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Float => "FLOAT".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime => "DATETIME".to_string(),
        }
    }
}

// `VARCHAR(40)` -> 40
fn declared_length(declared: &str) -> Option<usize> {
    let (_, rest) = declared.split_once('(')?;
    let (len, _) = rest.split_once(')')?;
    len.trim().parse().ok()
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_type())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub data_type: ColumnType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnMeta>,
}

impl Schema {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_type(&self, name: &str) -> Option<&ColumnType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.data_type)
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Keeps the columns named in `keep`, preserving schema order.
    pub fn restrict_to(&self, keep: &[String]) -> Schema {
        Schema {
            columns: self
                .columns
                .iter()
                .filter(|c| keep.contains(&c.name))
                .cloned()
                .collect(),
        }
    }

    /// Replaces inferred types with the destination's declared ones.
    ///
    /// `declared` holds `(column, declared type)` pairs as reported by the
    /// database. Columns whose declaration does not map keep their inferred
    /// type.
    pub fn with_declared_types(mut self, declared: &[(String, String)]) -> Schema {
        for column in &mut self.columns {
            let mapped = declared
                .iter()
                .find(|(name, _)| *name == column.name)
                .and_then(|(_, decl)| ColumnType::from_declared(decl));
            if let Some(ty) = mapped {
                column.data_type = ty;
            }
        }
        self
    }

    /// Names of the columns stored as text.
    pub fn text_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| matches!(c.data_type, ColumnType::Text(_)))
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating meta file {path:?}"))?;
        serde_json::to_writer_pretty(file, self).context("Writing schema JSON")
    }
}

/// Transforms `sample` and infers a schema from the result.
pub fn infer_schema_with(sample: Frame, transform: Option<&dyn Transform>) -> Result<Schema> {
    let sample = apply_optional(transform, sample).context("Transforming inference sample")?;
    Ok(infer_schema(&sample))
}

pub fn infer_schema(sample: &Frame) -> Schema {
    let columns = sample
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let dtype = sample.dtype(idx);
            let first = sample.column_values(idx).flatten().next();
            ColumnMeta {
                name: name.clone(),
                data_type: infer_column_type(dtype, first),
            }
        })
        .collect();
    Schema { columns }
}

pub fn infer_column_type(dtype: DType, first: Option<&Value>) -> ColumnType {
    match dtype {
        DType::Object => first.map_or_else(ColumnType::text, inspect_object_value),
        DType::Int64 => ColumnType::Integer,
        DType::Float64 => ColumnType::Float,
        DType::Bool => ColumnType::Boolean,
        DType::DateTime => ColumnType::DateTime,
    }
}

fn inspect_object_value(value: &Value) -> ColumnType {
    match value {
        Value::Date(_) => ColumnType::Date,
        Value::DateTime(_) => ColumnType::DateTime,
        Value::Boolean(_) => ColumnType::Boolean,
        Value::String(s) if parse_naive_date(s).is_ok() => ColumnType::Date,
        Value::String(s) if parse_naive_datetime(s).is_ok() => ColumnType::DateTime,
        Value::String(s) if is_boolean_like(s) => ColumnType::Boolean,
        _ => ColumnType::text(),
    }
}
