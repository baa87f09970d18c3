//! In-memory row batches.
//!
//! A [`Frame`] is the unit every stage of a load works on: the inference
//! sample, each chunk read from a CSV file, and caller-built tables. Cells are
//! `Option<Value>` with `None` standing for SQL `NULL`.

use std::fmt;

use anyhow::{Result, bail, ensure};
use serde::Serialize;

use crate::data::Value;

/// Declared element type of a frame column, derived from its non-null cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DType {
    Int64,
    Float64,
    Bool,
    DateTime,
    Object,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DType::Int64 => "int64",
            DType::Float64 => "float64",
            DType::Bool => "bool",
            DType::DateTime => "datetime64",
            DType::Object => "object",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Option<Value>>>,
}

impl Frame {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<Value>>>) -> Result<Self> {
        for (idx, row) in rows.iter().enumerate() {
            ensure!(
                row.len() == columns.len(),
                "Row {} has {} value(s) but the frame has {} column(s)",
                idx,
                row.len(),
                columns.len()
            );
        }
        Ok(Self { columns, rows })
    }

    /// Builds a frame from raw text records, typing each column the way a
    /// CSV reader does: integers, then floats, then booleans, else strings.
    pub fn from_text_records(columns: Vec<String>, records: &[Vec<String>]) -> Result<Self> {
        Self::from_text_records_keeping(columns, records, |_| false)
    }

    /// Like [`Frame::from_text_records`], but columns accepted by
    /// `keep_text` hold their fields verbatim as strings.
    pub fn from_text_records_keeping<F>(
        columns: Vec<String>,
        records: &[Vec<String>],
        keep_text: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> bool,
    {
        let mut rows: Vec<Vec<Option<Value>>> =
            (0..records.len()).map(|_| Vec::with_capacity(columns.len())).collect();
        for col_idx in 0..columns.len() {
            let mut fields = Vec::with_capacity(records.len());
            for (row_idx, record) in records.iter().enumerate() {
                let Some(field) = record.get(col_idx) else {
                    bail!(
                        "Record {} has {} field(s) but the header has {}",
                        row_idx + 1,
                        record.len(),
                        columns.len()
                    );
                };
                fields.push(field.as_str());
            }
            let values = if keep_text(columns[col_idx].as_str()) {
                fields
                    .iter()
                    .map(|f| (!f.is_empty()).then(|| Value::String(f.to_string())))
                    .collect()
            } else {
                type_text_column(&fields)
            };
            for (row, value) in rows.iter_mut().zip(values) {
                row.push(value);
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<Value>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = Option<&Value>> + '_ {
        self.rows.iter().map(move |row| row[idx].as_ref())
    }

    pub fn dtype(&self, idx: usize) -> DType {
        let mut dtype: Option<DType> = None;
        for value in self.column_values(idx).flatten() {
            let current = match value {
                Value::Integer(_) => DType::Int64,
                Value::Float(_) => DType::Float64,
                Value::Boolean(_) => DType::Bool,
                Value::DateTime(_) => DType::DateTime,
                Value::String(_) | Value::Date(_) => return DType::Object,
            };
            dtype = Some(match (dtype, current) {
                (None, next) => next,
                (Some(seen), next) if seen == next => seen,
                (Some(DType::Int64), DType::Float64) | (Some(DType::Float64), DType::Int64) => {
                    DType::Float64
                }
                _ => return DType::Object,
            });
        }
        dtype.unwrap_or(DType::Object)
    }

    pub fn head(&self, n: usize) -> Frame {
        Frame {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Keeps only the columns accepted by `keep`, in their current order.
    pub fn retain_columns<F>(self, mut keep: F) -> Frame
    where
        F: FnMut(&str) -> bool,
    {
        let kept = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, name)| keep(name))
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();
        let columns = kept.iter().map(|&idx| self.columns[idx].clone()).collect();
        let rows = self
            .rows
            .into_iter()
            .map(|mut row| kept.iter().map(|&idx| row[idx].take()).collect())
            .collect();
        Frame { columns, rows }
    }

    /// Appends a column computed from each row.
    pub fn with_column<F>(mut self, name: &str, mut compute: F) -> Result<Frame>
    where
        F: FnMut(&[Option<Value>]) -> Result<Option<Value>>,
    {
        ensure!(
            self.column_index(name).is_none(),
            "Column '{name}' already exists"
        );
        for row in &mut self.rows {
            let value = compute(row)?;
            row.push(value);
        }
        self.columns.push(name.to_string());
        Ok(self)
    }

    /// Replaces every cell of an existing column.
    pub fn map_column<F>(mut self, name: &str, mut map: F) -> Result<Frame>
    where
        F: FnMut(Option<Value>) -> Result<Option<Value>>,
    {
        let Some(idx) = self.column_index(name) else {
            bail!("Unknown column '{name}'");
        };
        for row in &mut self.rows {
            row[idx] = map(row[idx].take())?;
        }
        Ok(self)
    }
}

fn type_text_column(fields: &[&str]) -> Vec<Option<Value>> {
    let present = || fields.iter().filter(|f| !f.is_empty());
    let typed = |parse: &dyn Fn(&str) -> Option<Value>| -> Vec<Option<Value>> {
        fields
            .iter()
            .map(|f| if f.is_empty() { None } else { parse(f) })
            .collect()
    };
    if present().all(|f| f.parse::<i64>().is_ok()) {
        typed(&|f: &str| f.parse::<i64>().ok().map(Value::Integer))
    } else if present().all(|f| is_numeric_text(f)) {
        typed(&|f: &str| f.parse::<f64>().ok().map(Value::Float))
    } else if present().all(|f| f.eq_ignore_ascii_case("true") || f.eq_ignore_ascii_case("false"))
    {
        typed(&|f: &str| Some(Value::Boolean(f.eq_ignore_ascii_case("true"))))
    } else {
        typed(&|f: &str| Some(Value::String(f.to_string())))
    }
}

// `f64::from_str` also accepts "nan" and "inf", which are names, not numbers.
fn is_numeric_text(field: &str) -> bool {
    field.bytes().any(|b| b.is_ascii_digit()) && field.parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn text_frame(rows: &[&[&str]]) -> Frame {
        let records = rows
            .iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect::<Vec<Vec<String>>>();
        Frame::from_text_records(vec!["a".into(), "b".into(), "c".into()], &records).unwrap()
    }

    #[test]
    fn text_records_are_typed_per_column() {
        let frame = text_frame(&[&["1", "1.5", "True"], &["2", "2", "false"]]);
        assert_eq!(frame.dtype(0), DType::Int64);
        assert_eq!(frame.dtype(1), DType::Float64);
        assert_eq!(frame.dtype(2), DType::Bool);
        assert_eq!(frame.rows()[1][1], Some(Value::Float(2.0)));
    }

    #[test]
    fn empty_fields_become_nulls_without_changing_type() {
        let frame = text_frame(&[&["", "x", ""], &["7", "", "2024-01-01"]]);
        assert_eq!(frame.rows()[0][0], None);
        assert_eq!(frame.dtype(0), DType::Int64);
        assert_eq!(frame.dtype(1), DType::Object);
        assert_eq!(frame.dtype(2), DType::Object);
    }

    #[test]
    fn one_bad_field_demotes_the_column_to_strings() {
        let frame = text_frame(&[&["1", "a", "b"], &["abc", "a", "b"]]);
        assert_eq!(frame.dtype(0), DType::Object);
        assert_eq!(frame.rows()[0][0], Some(Value::from("1")));
    }

    #[test]
    fn nan_and_inf_words_stay_strings() {
        let frame = text_frame(&[&["Nan", "inf", "1e3"], &["Ann", "2.5", "2"]]);
        assert_eq!(frame.dtype(0), DType::Object);
        assert_eq!(frame.dtype(1), DType::Object);
        assert_eq!(frame.dtype(2), DType::Float64);
    }

    #[test]
    fn kept_text_columns_are_not_retyped() {
        let records = vec![
            vec!["007".to_string(), "1.50".to_string(), "3".to_string()],
            vec!["".to_string(), "2".to_string(), "4".to_string()],
        ];
        let frame = Frame::from_text_records_keeping(
            vec!["code".into(), "price".into(), "n".into()],
            &records,
            |name| name != "n",
        )
        .unwrap();
        assert_eq!(frame.rows()[0][0], Some(Value::from("007")));
        assert_eq!(frame.rows()[0][1], Some(Value::from("1.50")));
        assert_eq!(frame.rows()[1][0], None);
        assert_eq!(frame.rows()[1][2], Some(Value::Integer(4)));
    }

    #[test]
    fn short_records_are_rejected() {
        let records = vec![vec!["1".to_string()]];
        assert!(Frame::from_text_records(vec!["a".into(), "b".into()], &records).is_err());
    }

    #[test]
    fn dtype_of_mixed_and_empty_columns() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let frame = Frame::new(
            vec!["n".into(), "d".into(), "mixed".into()],
            vec![
                vec![Some(Value::Integer(1)), Some(Value::Date(date)), Some(Value::Integer(1))],
                vec![Some(Value::Float(0.5)), None, Some(Value::Boolean(true))],
            ],
        )
        .unwrap();
        assert_eq!(frame.dtype(0), DType::Float64);
        assert_eq!(frame.dtype(1), DType::Object);
        assert_eq!(frame.dtype(2), DType::Object);
        assert_eq!(frame.head(0).dtype(0), DType::Object);
    }

    #[test]
    fn retain_columns_projects_in_place() {
        let frame = text_frame(&[&["1", "x", "true"]]);
        let projected = frame.retain_columns(|name| name != "b");
        assert_eq!(projected.columns(), ["a", "c"]);
        assert_eq!(
            projected.rows()[0],
            vec![Some(Value::Integer(1)), Some(Value::Boolean(true))]
        );
    }

    #[test]
    fn with_column_and_map_column_rewrite_rows() {
        let frame = text_frame(&[&["1000", "x", "true"], &["2000", "y", "false"]]);
        let frame = frame
            .map_column("a", |v| match v {
                Some(Value::Integer(ms)) => Ok(Some(Value::Integer(ms / 1000))),
                other => Ok(other),
            })
            .unwrap()
            .with_column("flag", |row| Ok(row[2].clone()))
            .unwrap();
        assert_eq!(frame.columns().len(), 4);
        assert_eq!(frame.rows()[1][0], Some(Value::Integer(2)));
        assert!(frame.clone().with_column("a", |_| Ok(None)).is_err());
        assert!(frame.map_column("zzz", Ok).is_err());
    }
}
