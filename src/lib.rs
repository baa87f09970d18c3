pub mod cli;
pub mod config;
pub mod connection;
pub mod data;
pub mod ddl;
pub mod error;
pub mod frame;
pub mod io_utils;
pub mod loader;
pub mod schema;
pub mod table;
pub mod transform;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info, warn};

use crate::{
    cli::Cli,
    io_utils::CsvFormat,
    loader::{ChunkOutcome, LoadOptions, Loader, SAMPLE_ROWS},
};

pub use crate::{
    config::ConnectionProfile,
    data::Value,
    error::{Error, LoadError},
    frame::Frame,
    loader::{DataSource, LoadReport},
    schema::{ColumnType, Schema},
    transform::Transform,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging(verbose: bool) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            let level = if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            };
            builder.filter_module("csv2table", level);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let format = CsvFormat {
        delimiter: cli.delimiter,
        encoding: io_utils::resolve_encoding(cli.input_encoding.as_deref())?,
    };

    if cli.dry_run || cli.meta.is_some() {
        handle_describe(&cli, format)?;
        if cli.dry_run {
            return Ok(());
        }
    }

    let mut loader = Loader::from_config(cli.dbconfig.as_deref(), &cli.dbname)
        .with_context(|| format!("Opening database '{}'", cli.dbname))?;
    let mut options = LoadOptions::default()
        .create_table(cli.create)
        .chunk_size(cli.chunk_size)
        .format(format);
    if let Some(staging) = cli.temp_table.as_deref() {
        options = options.temp_table(staging);
    }

    let outcome = loader.load(cli.infile.as_path(), &cli.table, &options);
    loader.close().context("Closing database connection")?;
    let report =
        outcome.with_context(|| format!("Loading {:?} into '{}'", cli.infile, cli.table))?;

    for chunk in report.failed_chunks() {
        if let ChunkOutcome::Failed { index, rows, .. } = chunk {
            warn!("Chunk {index} ({rows} row(s)) was not loaded");
        }
    }
    info!(
        "Successfully loaded {} row(s) from '{}' into table '{}'",
        report.rows_loaded(),
        cli.infile.display(),
        report.insert_table
    );
    if let Some(merged) = report.merged_rows {
        info!("{merged} new row(s) merged into '{}'", report.table);
    }
    Ok(())
}

fn handle_describe(cli: &Cli, format: CsvFormat) -> Result<()> {
    let sample = io_utils::read_sample(&cli.infile, SAMPLE_ROWS, format)
        .with_context(|| format!("Sampling {:?}", cli.infile))?;
    let schema = schema::infer_schema(&sample);
    if let Some(path) = &cli.meta {
        schema
            .save(path)
            .with_context(|| format!("Writing schema to {path:?}"))?;
        info!(
            "Inferred schema for {} column(s) written to {:?}",
            schema.columns.len(),
            path
        );
    }
    if cli.dry_run {
        print!("{}", table::render_schema(&sample, &schema));
        println!();
        println!("{};", ddl::create_table_sql(&cli.table, &schema));
    }
    Ok(())
}
