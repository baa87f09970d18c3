//! Plain-text rendering of an inferred schema for `--dry-run`.

use std::fmt::Write as _;

use crate::{frame::Frame, schema::Schema};

const HEADERS: [&str; 4] = ["column", "sample type", "destination type", "first value"];

/// One line per column: name, declared sample type, destination type and the
/// first non-null sample value.
pub fn render_schema(sample: &Frame, schema: &Schema) -> String {
    let rows = schema
        .columns
        .iter()
        .map(|column| {
            let idx = sample.column_index(&column.name);
            let dtype = idx.map(|i| sample.dtype(i).to_string()).unwrap_or_default();
            let first = idx
                .and_then(|i| sample.column_values(i).flatten().next())
                .map(|v| v.as_display())
                .unwrap_or_default();
            [column.name.clone(), dtype, column.data_type.to_string(), first]
        })
        .collect::<Vec<_>>();
    render_rows(&rows)
}

fn render_rows(rows: &[[String; 4]]) -> String {
    let mut widths = HEADERS.map(str::len);
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let header = HEADERS.map(str::to_string);
    let separator = widths.map(|w| "-".repeat(w));
    for line in [&header, &separator].into_iter().chain(rows) {
        let _ = writeln!(output, "{}", format_line(line, &widths));
    }
    output
}

fn format_line(cells: &[String; 4], widths: &[usize; 4]) -> String {
    let mut line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let clean = cell.replace(['\n', '\r', '\t'], " ");
            let pad = width.saturating_sub(clean.chars().count());
            format!("{clean}{}", " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.truncate(line.trim_end().len());
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::Value, schema::infer_schema};

    #[test]
    fn renders_one_aligned_line_per_column() {
        let sample = Frame::new(
            vec!["id".into(), "name".into()],
            vec![
                vec![Some(Value::Integer(1)), None],
                vec![Some(Value::Integer(2)), Some(Value::from("DF_lisa"))],
            ],
        )
        .unwrap();
        let rendered = render_schema(&sample, &infer_schema(&sample));
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("column  sample type  destination type"));
        assert!(lines[1].starts_with("------"));
        assert_eq!(lines[2], "id      int64        INTEGER           1");
        assert_eq!(lines[3], "name    object       VARCHAR(255)      DF_lisa");
    }
}
