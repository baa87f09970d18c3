//! Error types for the loader surface.
//!
//! Construction failures ([`Error`]) are fatal and returned to the caller.
//! Load-time failures ([`LoadError`]) end a single load after a warning has
//! been logged; per-chunk failures never end the load and are carried in the
//! [`LoadReport`](crate::loader::LoadReport) as [`ChunkError`]s.

use std::path::PathBuf;

use thiserror::Error;

use crate::schema::ColumnType;

/// Result alias for construction-time operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors raised while building a loader.
#[derive(Debug, Error)]
pub enum Error {
    #[error("loading '{section}' config from {path:?}: {message}")]
    Config {
        path: PathBuf,
        section: String,
        message: String,
    },
    #[error("connecting to database '{database}': {source}")]
    Connect {
        database: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("closing database connection: {0}")]
    Close(#[source] rusqlite::Error),
}

/// Failures that abort one load operation.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("table '{0}' does not exist and table creation was not requested")]
    TableMissing(String),
    #[error("failed to create table '{0}'")]
    TableNotCreated(String),
    #[error("CSV file not found at {0:?}")]
    SourceNotFound(PathBuf),
    #[error("staging table must differ from the destination '{0}'")]
    StagingConflict(String),
    #[error("source data shares no columns with table '{0}'")]
    NoCommonColumns(String),
    #[error("{0:?} is not a readable data source")]
    InvalidSource(PathBuf),
    #[error("reading source data: {0:#}")]
    Source(#[source] anyhow::Error),
    #[error("transforming sample: {0:#}")]
    Transform(#[source] anyhow::Error),
    #[error("database error on table '{table}': {source}")]
    Database {
        table: String,
        #[source]
        source: rusqlite::Error,
    },
}

/// Why a single chunk was rolled back.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("reading chunk: {0:#}")]
    Read(#[source] anyhow::Error),
    #[error("transforming chunk: {0:#}")]
    Transform(#[source] anyhow::Error),
    #[error("row {row} column '{column}': {source}")]
    Coerce {
        row: usize,
        column: String,
        #[source]
        source: CoerceError,
    },
    #[error("no destination columns left after projection")]
    NoColumns,
    #[error("inserting chunk: {0}")]
    Insert(#[from] rusqlite::Error),
}

/// A value could not be converted into its destination column type.
#[derive(Debug, Error, PartialEq)]
pub enum CoerceError {
    #[error("cannot store '{value}' as {target}")]
    Mismatch { value: String, target: ColumnType },
    #[error("text of {len} characters exceeds VARCHAR({max})")]
    TooLong { len: usize, max: usize },
}
