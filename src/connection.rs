//! The single database connection owned by a loader.

use itertools::Itertools;
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension, params_from_iter, types::Value as SqlValue};

use crate::{
    config::ConnectionProfile,
    error::{Error, Result},
};

/// Double-quotes an identifier for SQLite.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub struct Database {
    conn: Option<Connection>,
    name: String,
}

impl Database {
    pub fn connect(profile: &ConnectionProfile) -> Result<Self> {
        let conn = if profile.is_in_memory() {
            Connection::open_in_memory()
        } else {
            Connection::open(&profile.path)
        }
        .map_err(|source| Error::Connect {
            database: profile.database.clone(),
            source,
        })?;
        info!("Connected to {profile}");
        Ok(Self {
            conn: Some(conn),
            name: profile.database.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &Connection {
        self.conn
            .as_ref()
            .unwrap_or_else(|| unreachable!("connection is only taken by close()"))
    }

    fn connection_mut(&mut self) -> &mut Connection {
        self.conn
            .as_mut()
            .unwrap_or_else(|| unreachable!("connection is only taken by close()"))
    }

    /// Executes one or more raw statements and commits them.
    pub fn exec(&self, sql: &str) -> rusqlite::Result<()> {
        debug!("exec: {sql}");
        self.connection().execute_batch(sql)
    }

    pub fn table_exists(&self, table: &str) -> rusqlite::Result<bool> {
        self.connection()
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
                [table],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
    }

    /// Column names of `table` in declaration order.
    pub fn table_columns(&self, table: &str) -> rusqlite::Result<Vec<String>> {
        Ok(self
            .column_declarations(table)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    /// `(name, declared type)` for every column of `table`, in order. The
    /// declared type is empty when the column was created without one.
    pub fn column_declarations(
        &self,
        table: &str,
    ) -> rusqlite::Result<Vec<(String, String)>> {
        let sql = format!("PRAGMA table_info({})", quote_ident(table));
        let mut stmt = self.connection().prepare(&sql)?;
        let columns = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>("name")?, row.get::<_, String>("type")?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    pub fn row_count(&self, table: &str) -> rusqlite::Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        self.connection()
            .query_row(&sql, [], |row| row.get::<_, i64>(0))
            .map(|count| count as u64)
    }

    /// Inserts `rows` into `columns` of `table` inside one transaction.
    ///
    /// Rows are produced lazily so a conversion failure part-way through
    /// drops the transaction, rolling back everything already inserted.
    pub fn insert_rows<I, E>(
        &mut self,
        table: &str,
        columns: &[String],
        rows: I,
    ) -> std::result::Result<usize, E>
    where
        I: IntoIterator<Item = std::result::Result<Vec<SqlValue>, E>>,
        E: From<rusqlite::Error>,
    {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns.iter().map(|c| quote_ident(c)).join(", "),
            vec!["?"; columns.len()].join(", ")
        );
        let tx = self.connection_mut().transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                stmt.execute(params_from_iter(row?))?;
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Creates `staging` as an empty copy of `table` and clears leftovers.
    pub fn prepare_staging(&self, staging: &str, table: &str) -> rusqlite::Result<()> {
        let staging = quote_ident(staging);
        self.exec(&format!(
            "CREATE TABLE IF NOT EXISTS {staging} AS SELECT * FROM {} LIMIT 0",
            quote_ident(table)
        ))?;
        self.exec(&format!("DELETE FROM {staging}"))
    }

    /// Copies every row of `staging` into `table`, skipping rows that would
    /// violate a uniqueness constraint. Returns the number of rows merged.
    pub fn merge_ignoring_duplicates(
        &self,
        staging: &str,
        table: &str,
    ) -> rusqlite::Result<usize> {
        let sql = format!(
            "INSERT OR IGNORE INTO {} SELECT * FROM {}",
            quote_ident(table),
            quote_ident(staging)
        );
        debug!("exec: {sql}");
        self.connection().execute(&sql, [])
    }

    /// Closes the connection, reporting any error SQLite raises on close.
    pub fn close(mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => {
                conn.close().map_err(|(_, err)| Error::Close(err))?;
                debug!("Database connection to '{}' closed", self.name);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if self.conn.take().is_some() {
            debug!("Database connection to '{}' released on drop", self.name);
        }
    }
}
