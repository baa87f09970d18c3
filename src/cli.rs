use std::path::PathBuf;

use clap::Parser;

use crate::loader::DEFAULT_CHUNK_SIZE;

#[derive(Debug, Parser)]
#[command(
    name = "csv2table",
    author,
    version,
    about = "Load a CSV file into a database table",
    long_about = None
)]
pub struct Cli {
    /// CSV file to load
    #[arg(short = 'i', long = "infile")]
    pub infile: PathBuf,
    /// Destination table
    #[arg(short = 't', long = "table")]
    pub table: String,
    /// Staging table that buffers inserts before a duplicate-skipping merge
    #[arg(long = "temp-table", visible_alias = "temptable")]
    pub temp_table: Option<String>,
    /// Database configuration file (defaults to ~/.config/database.ini)
    #[arg(long = "dbconfig")]
    pub dbconfig: Option<PathBuf>,
    /// Section of the configuration file to connect with
    #[arg(short = 'n', long = "dbname", default_value = "default")]
    pub dbname: String,
    /// Create the table from the CSV structure if it does not exist
    #[arg(short = 'c', long = "create")]
    pub create: bool,
    /// Rows inserted per transaction
    #[arg(long = "chunk-size", default_value_t = DEFAULT_CHUNK_SIZE, value_parser = parse_chunk_size)]
    pub chunk_size: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Print the inferred schema and CREATE TABLE statement without connecting
    #[arg(long = "dry-run")]
    pub dry_run: bool,
    /// Write the inferred schema as JSON to this path
    #[arg(long = "meta")]
    pub meta: Option<PathBuf>,
    /// Be verbose
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

pub fn parse_chunk_size(value: &str) -> Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err("Chunk size must be at least 1".to_string()),
        Ok(rows) => Ok(rows),
        Err(err) => Err(format!("Invalid chunk size '{value}': {err}")),
    }
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
