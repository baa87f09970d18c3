//! Destination table creation from an inferred schema.

use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    connection::{Database, quote_ident},
    schema::Schema,
};

pub fn create_table_sql(table: &str, schema: &Schema) -> String {
    let columns = schema
        .columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.data_type.sql_type()))
        .join(",\n    ");
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_ident(table),
        columns
    )
}

/// Creates `table` from `schema` unless it already exists.
///
/// Returns whether the table exists afterwards; failures are logged, not raised.
pub fn create_table(db: &Database, table: &str, schema: &Schema) -> bool {
    if schema.columns.is_empty() {
        warn!("Cannot create table '{table}': the sample has no columns");
        return false;
    }
    for column in &schema.columns {
        debug!("New table column: {} => {}", column.name, column.data_type);
    }
    let sql = create_table_sql(table, schema);
    if let Err(err) = db.exec(&sql) {
        warn!("Creating table '{table}' failed: {err}");
        return false;
    }
    match db.table_exists(table) {
        Ok(true) => {
            info!("Table '{table}' created with {} column(s)", schema.columns.len());
            true
        }
        Ok(false) => false,
        Err(err) => {
            warn!("Checking table '{table}' after creation failed: {err}");
            false
        }
    }
}
