//! Bulk loading of CSV files and in-memory frames into a database table.
//!
//! A load runs these steps in order, each one committed before the next:
//!
//! 1. check that the destination exists, creating it from the inferred schema
//!    when asked to;
//! 2. prepare the staging table when one is named, so inserts land there;
//! 3. reconcile the source columns against the destination's real columns;
//! 4. infer column types once from the sample, then take the destination's
//!    declared type wherever it maps onto one;
//! 5. insert chunk by chunk, each chunk in its own transaction. A chunk that
//!    fails is rolled back and the load moves on to the next one;
//! 6. merge the staging table into the destination, skipping duplicates.
//!
//! Failures that stop a load come back as [`LoadError`] after one warning has
//! been logged. Chunk failures are recorded in the [`LoadReport`].

use std::{
    fmt,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

use crate::{
    config::ConnectionProfile,
    connection::Database,
    data::coerce_value,
    ddl,
    error::{ChunkError, LoadError, Result},
    frame::Frame,
    io_utils::{self, CsvChunks, CsvFormat},
    schema::{ColumnType, Schema, infer_schema},
    transform::{Transform, apply_optional},
};

pub const DEFAULT_CHUNK_SIZE: usize = 10_000;
/// Rows read from a file source to infer column types.
pub const SAMPLE_ROWS: usize = 10;

#[derive(Debug, Clone)]
pub enum DataSource {
    File(PathBuf),
    Frame(Frame),
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::File(path) => write!(f, "'{}'", path.display()),
            DataSource::Frame(frame) => write!(f, "in-memory frame ({} rows)", frame.len()),
        }
    }
}

impl From<Frame> for DataSource {
    fn from(frame: Frame) -> Self {
        DataSource::Frame(frame)
    }
}

impl From<PathBuf> for DataSource {
    fn from(path: PathBuf) -> Self {
        DataSource::File(path)
    }
}

impl From<&Path> for DataSource {
    fn from(path: &Path) -> Self {
        DataSource::File(path.to_path_buf())
    }
}

#[derive(Clone, Copy)]
pub struct LoadOptions<'a> {
    pub temp_table: Option<&'a str>,
    pub create_table: bool,
    pub chunk_size: usize,
    pub transform: Option<&'a dyn Transform>,
    pub format: CsvFormat,
}

impl Default for LoadOptions<'_> {
    fn default() -> Self {
        Self {
            temp_table: None,
            create_table: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            transform: None,
            format: CsvFormat::default(),
        }
    }
}

impl<'a> LoadOptions<'a> {
    pub fn temp_table(mut self, name: &'a str) -> Self {
        self.temp_table = Some(name);
        self
    }

    pub fn create_table(mut self, create: bool) -> Self {
        self.create_table = create;
        self
    }

    pub fn chunk_size(mut self, rows: usize) -> Self {
        self.chunk_size = rows.max(1);
        self
    }

    pub fn transform(mut self, transform: &'a dyn Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn format(mut self, format: CsvFormat) -> Self {
        self.format = format;
        self
    }
}

impl fmt::Debug for LoadOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("temp_table", &self.temp_table)
            .field("create_table", &self.create_table)
            .field("chunk_size", &self.chunk_size)
            .field("transform", &self.transform.is_some())
            .field("format", &self.format)
            .finish()
    }
}

#[derive(Debug)]
pub enum ChunkOutcome {
    Committed {
        index: usize,
        rows: usize,
    },
    Failed {
        index: usize,
        rows: usize,
        error: ChunkError,
    },
}

impl ChunkOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, ChunkOutcome::Committed { .. })
    }
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub table: String,
    /// Table the chunks were inserted into: the staging table when one is used.
    pub insert_table: String,
    pub created: bool,
    /// Source columns the destination does not have.
    pub ignored_columns: Vec<String>,
    /// Destination columns the source does not provide.
    pub missing_columns: Vec<String>,
    pub schema: Schema,
    pub chunks: Vec<ChunkOutcome>,
    /// Rows merged from the staging table, when one was used.
    pub merged_rows: Option<usize>,
}

impl LoadReport {
    pub fn rows_loaded(&self) -> usize {
        self.chunks
            .iter()
            .map(|chunk| match chunk {
                ChunkOutcome::Committed { rows, .. } => *rows,
                ChunkOutcome::Failed { .. } => 0,
            })
            .sum()
    }

    pub fn failed_chunks(&self) -> impl Iterator<Item = &ChunkOutcome> {
        self.chunks.iter().filter(|chunk| !chunk.is_committed())
    }

    pub fn is_complete(&self) -> bool {
        self.chunks.iter().all(ChunkOutcome::is_committed)
    }
}

enum Prepared {
    File { path: PathBuf, sample: Frame },
    Frame(Frame),
}

impl Prepared {
    fn sample(&self) -> &Frame {
        match self {
            Prepared::File { sample, .. } => sample,
            Prepared::Frame(frame) => frame,
        }
    }
}

/// Owns the database connection for a sequence of loads.
pub struct Loader {
    db: Database,
    profile: ConnectionProfile,
}

impl Loader {
    pub fn new(profile: ConnectionProfile) -> Result<Self> {
        let db = Database::connect(&profile)?;
        Ok(Self { db, profile })
    }

    /// Reads `section` from `config_path` (or the default config file) and connects.
    pub fn from_config(config_path: Option<&Path>, section: &str) -> Result<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(ConnectionProfile::default_config_path);
        let profile = ConnectionProfile::load(&path, section)?;
        Self::new(profile)
    }

    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Executes raw SQL against the loader's connection.
    pub fn exec(&self, sql: &str) -> rusqlite::Result<()> {
        self.db.exec(sql)
    }

    /// Creates `table` from the first rows of a CSV file.
    ///
    /// Returns `false` after logging a warning when the sample cannot be read
    /// or the DDL fails.
    pub fn create_table_from_csv(
        &self,
        path: &Path,
        table: &str,
        transform: Option<&dyn Transform>,
        format: CsvFormat,
    ) -> bool {
        let sample = match io_utils::read_sample(path, SAMPLE_ROWS, format)
            .and_then(|sample| apply_optional(transform, sample))
        {
            Ok(sample) => sample,
            Err(err) => {
                warn!("Cannot create table '{table}' from {path:?}: {err:#}");
                return false;
            }
        };
        ddl::create_table(&self.db, table, &infer_schema(&sample))
    }

    pub fn load(
        &mut self,
        source: impl Into<DataSource>,
        table: &str,
        options: &LoadOptions<'_>,
    ) -> std::result::Result<LoadReport, LoadError> {
        let source = source.into();
        info!("Loading data from {source} into table '{table}'");
        let result = self.run_load(source, table, options);
        match &result {
            Ok(report) => info!(
                "Loaded {} row(s) into '{}' in {} chunk(s), {} failed",
                report.rows_loaded(),
                report.insert_table,
                report.chunks.len(),
                report.failed_chunks().count()
            ),
            Err(err) => warn!("{err}"),
        }
        result
    }

    pub fn close(self) -> Result<()> {
        self.db.close()
    }

    fn run_load(
        &mut self,
        source: DataSource,
        table: &str,
        options: &LoadOptions<'_>,
    ) -> std::result::Result<LoadReport, LoadError> {
        let db_error = |table: &str| {
            let table = table.to_string();
            move |source| LoadError::Database { table, source }
        };

        if let DataSource::File(path) = &source {
            if !path.exists() {
                return Err(LoadError::SourceNotFound(path.clone()));
            }
            if !path.is_file() {
                return Err(LoadError::InvalidSource(path.clone()));
            }
        }
        if options.temp_table == Some(table) {
            return Err(LoadError::StagingConflict(table.to_string()));
        }

        let exists = self.db.table_exists(table).map_err(db_error(table))?;
        if !exists && !options.create_table {
            return Err(LoadError::TableMissing(table.to_string()));
        }

        // Declared text columns are read verbatim so "007" is not sampled as 7.
        let declared_text: Vec<String> = if exists {
            self.db
                .column_declarations(table)
                .map_err(db_error(table))?
                .into_iter()
                .filter(|(_, decl)| {
                    matches!(ColumnType::from_declared(decl), Some(ColumnType::Text(_)))
                })
                .map(|(name, _)| name)
                .collect()
        } else {
            Vec::new()
        };

        let prepared = match source {
            DataSource::File(path) => {
                let sample = io_utils::read_sample_keeping_text(
                    &path,
                    SAMPLE_ROWS,
                    options.format,
                    &declared_text,
                )
                .map_err(LoadError::Source)?;
                let sample =
                    apply_optional(options.transform, sample).map_err(LoadError::Transform)?;
                Prepared::File { path, sample }
            }
            DataSource::Frame(frame) => Prepared::Frame(
                apply_optional(options.transform, frame).map_err(LoadError::Transform)?,
            ),
        };
        let inferred = infer_schema(prepared.sample());

        let mut report = LoadReport {
            table: table.to_string(),
            insert_table: table.to_string(),
            ..LoadReport::default()
        };

        if !exists {
            info!("Table '{table}' does not exist; creating it from the source structure");
            if !ddl::create_table(&self.db, table, &inferred) {
                return Err(LoadError::TableNotCreated(table.to_string()));
            }
            report.created = true;
        }

        if let Some(staging) = options.temp_table {
            self.db
                .prepare_staging(staging, table)
                .map_err(db_error(staging))?;
            report.insert_table = staging.to_string();
        }

        let declarations = self
            .db
            .column_declarations(table)
            .map_err(db_error(table))?;
        let destination = declarations
            .iter()
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>();
        let sample_columns = prepared.sample().columns();
        report.ignored_columns = sample_columns
            .iter()
            .filter(|c| !destination.contains(c))
            .cloned()
            .collect();
        report.missing_columns = destination
            .iter()
            .filter(|c| !sample_columns.contains(c))
            .cloned()
            .collect();
        for column in &report.ignored_columns {
            debug!("Column '{column}' is not in table '{table}' and will be ignored");
        }
        for column in &report.missing_columns {
            warn!("Column '{column}' found in table '{table}' but not in the source data");
        }

        report.schema = inferred
            .restrict_to(&destination)
            .with_declared_types(&declarations);
        if report.schema.columns.is_empty() {
            return Err(LoadError::NoCommonColumns(table.to_string()));
        }
        debug!(
            "Insert types: {}",
            report
                .schema
                .columns
                .iter()
                .map(|c| format!("{} {}", c.name, c.data_type))
                .collect::<Vec<_>>()
                .join(", ")
        );

        match prepared {
            Prepared::File { path, .. } => {
                let chunks = CsvChunks::open(&path, options.chunk_size, options.format)
                    .map_err(LoadError::Source)?
                    .keep_text(&report.schema.text_columns());
                for (index, chunk) in chunks.enumerate() {
                    let first_row = index * options.chunk_size + 1;
                    let outcome = match chunk {
                        Ok(frame) => {
                            self.insert_chunk(&report, index, first_row, frame, options.transform)
                        }
                        Err(err) => {
                            warn!("Skipping chunk {index}: {err:#}");
                            ChunkOutcome::Failed {
                                index,
                                rows: 0,
                                error: ChunkError::Read(err),
                            }
                        }
                    };
                    report.chunks.push(outcome);
                }
            }
            Prepared::Frame(frame) => {
                let outcome = self.insert_chunk(&report, 0, 1, frame, None);
                report.chunks.push(outcome);
            }
        }

        if let Some(staging) = options.temp_table {
            let merged = self
                .db
                .merge_ignoring_duplicates(staging, table)
                .map_err(db_error(table))?;
            info!("Merged {merged} row(s) from '{staging}' into '{table}'");
            report.merged_rows = Some(merged);
        }

        Ok(report)
    }

    fn insert_chunk(
        &mut self,
        report: &LoadReport,
        index: usize,
        first_row: usize,
        frame: Frame,
        transform: Option<&dyn Transform>,
    ) -> ChunkOutcome {
        let failed = |rows, error: ChunkError| {
            warn!(
                "Error inserting chunk {index} into '{}': {error}; chunk rolled back",
                report.insert_table
            );
            ChunkOutcome::Failed { index, rows, error }
        };

        let frame = match apply_optional(transform, frame) {
            Ok(frame) => frame,
            Err(err) => return failed(0, ChunkError::Transform(err)),
        };
        let rows = frame.len();
        let schema = &report.schema;
        let frame = frame.retain_columns(|name| schema.column_index(name).is_some());
        if frame.columns().is_empty() {
            return failed(rows, ChunkError::NoColumns);
        }
        let columns = frame.columns().to_vec();
        let types = columns
            .iter()
            .filter_map(|name| schema.column_type(name))
            .collect::<Vec<_>>();

        let values = frame.rows().iter().enumerate().map(|(offset, row)| {
            row.iter()
                .zip(&types)
                .zip(&columns)
                .map(|((value, ty), column)| {
                    coerce_value(value.as_ref(), ty).map_err(|source| ChunkError::Coerce {
                        row: first_row + offset,
                        column: column.clone(),
                        source,
                    })
                })
                .collect::<std::result::Result<Vec<_>, ChunkError>>()
        });

        match self.db.insert_rows(&report.insert_table, &columns, values) {
            Ok(inserted) => {
                debug!(
                    "Loaded {inserted} row(s) into table '{}' (chunk {index})",
                    report.insert_table
                );
                ChunkOutcome::Committed {
                    index,
                    rows: inserted,
                }
            }
            Err(error) => failed(rows, error),
        }
    }
}
