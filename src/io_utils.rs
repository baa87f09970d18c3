//! CSV reading for loads: delimiter and encoding resolution, header decoding,
//! the inference sample and the chunked frame reader.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

use crate::frame::Frame;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

/// How a CSV source is decoded.
#[derive(Debug, Clone, Copy)]
pub struct CsvFormat {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
        }
    }
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = Box::new(BufReader::new(
        File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
    ));
    Ok(open_csv_reader(reader, delimiter))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    decode_record(&headers, encoding)
}

/// Reads the first `rows` data rows of `path` into a frame.
pub fn read_sample(path: &Path, rows: usize, format: CsvFormat) -> Result<Frame> {
    read_sample_keeping_text(path, rows, format, &[])
}

/// [`read_sample`] with the named columns held as verbatim strings.
pub fn read_sample_keeping_text(
    path: &Path,
    rows: usize,
    format: CsvFormat,
    text_columns: &[String],
) -> Result<Frame> {
    let mut chunks = CsvChunks::open(path, rows.max(1), format)?.keep_text(text_columns);
    if rows == 0 {
        return Frame::from_text_records(chunks.headers.clone(), &[]);
    }
    match chunks.next() {
        Some(chunk) => chunk.with_context(|| format!("Reading sample rows from {path:?}")),
        None => Frame::from_text_records(chunks.headers.clone(), &[]),
    }
}

/// Sequential reader yielding one frame per `chunk_size` records.
///
/// A chunk with an unreadable record is yielded as an error after the rest of
/// its records are consumed, so later chunks keep their boundaries.
pub struct CsvChunks {
    reader: csv::Reader<Box<dyn Read>>,
    headers: Vec<String>,
    encoding: &'static Encoding,
    chunk_size: usize,
    record: csv::ByteRecord,
    text_columns: Vec<String>,
    line: u64,
    done: bool,
}

impl CsvChunks {
    pub fn open(path: &Path, chunk_size: usize, format: CsvFormat) -> Result<Self> {
        let delimiter = resolve_input_delimiter(path, format.delimiter);
        let mut reader = open_csv_reader_from_path(path, delimiter)?;
        let headers = reader_headers(&mut reader, format.encoding)
            .with_context(|| format!("Reading headers from {path:?}"))?;
        Ok(Self {
            reader,
            headers,
            encoding: format.encoding,
            chunk_size: chunk_size.max(1),
            record: csv::ByteRecord::new(),
            text_columns: Vec::new(),
            line: 1,
            done: false,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Holds the named columns as strings instead of typing them per chunk.
    pub fn keep_text(mut self, columns: &[String]) -> Self {
        self.text_columns = columns.to_vec();
        self
    }

    fn read_chunk(&mut self) -> Option<Result<Frame>> {
        let mut records = Vec::with_capacity(self.chunk_size);
        let mut failure: Option<anyhow::Error> = None;
        while records.len() < self.chunk_size {
            match self.reader.read_byte_record(&mut self.record) {
                Ok(true) => {
                    self.line += 1;
                    match decode_record(&self.record, self.encoding) {
                        Ok(decoded) => records.push(decoded),
                        Err(err) => {
                            failure
                                .get_or_insert(err.context(format!("Decoding line {}", self.line)));
                            records.push(Vec::new());
                        }
                    }
                }
                Ok(false) => {
                    self.done = true;
                    break;
                }
                Err(err) => {
                    self.line += 1;
                    if err.is_io_error() {
                        self.done = true;
                    }
                    failure.get_or_insert(
                        anyhow!(err).context(format!("Reading line {}", self.line)),
                    );
                    if self.done {
                        break;
                    }
                    records.push(Vec::new());
                }
            }
        }
        if let Some(err) = failure {
            return Some(Err(err));
        }
        if records.is_empty() {
            return None;
        }
        let text_columns = &self.text_columns;
        Some(Frame::from_text_records_keeping(
            self.headers.clone(),
            &records,
            |name| text_columns.iter().any(|c| c == name),
        ))
    }
}

impl Iterator for CsvChunks {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.read_chunk()
    }
}
