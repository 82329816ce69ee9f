use std::fs::File;
use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::*;

use super::coerce::NULL_MARKER;
use super::{Result, TableError};

/// Delimited text flavours the pipeline reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// IMDb exports: tab separated, no quoting (titles contain bare `"`).
    Tsv,
    /// Zone files: comma separated, RFC 4180 quoting.
    Csv,
}

impl Format {
    pub fn delimiter(self) -> u8 {
        match self {
            Self::Tsv => b'\t',
            Self::Csv => b',',
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Tsv => "tsv",
            Self::Csv => "csv",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext {
            "tsv" => Some(Self::Tsv),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    fn quote_char(self) -> Option<u8> {
        match self {
            Self::Tsv => None,
            Self::Csv => Some(b'"'),
        }
    }

    fn quote_style(self) -> QuoteStyle {
        match self {
            Self::Tsv => QuoteStyle::Never,
            Self::Csv => QuoteStyle::Necessary,
        }
    }
}

/// Which cells read back as null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nulls {
    /// Only empty cells. `\N` stays as text, so it round-trips untouched.
    Empty,
    /// Empty cells and the IMDb marker `\N`.
    Imdb,
}

/// Lazily scan a delimited file with a header row. Every column is text.
pub fn scan(path: &Path, format: Format, nulls: Nulls) -> Result<LazyFrame> {
    let mut reader = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_separator(format.delimiter())
        .with_quote_char(format.quote_char())
        .with_infer_schema_length(Some(0))
        .with_missing_is_null(true);

    if nulls == Nulls::Imdb {
        reader = reader.with_null_values(Some(NullValues::AllColumnsSingle(NULL_MARKER.into())));
    }

    reader.finish().map_err(|e| read_err(path, e))
}

/// Read a delimited file into memory.
pub fn read(path: &Path, format: Format, nulls: Nulls) -> Result<DataFrame> {
    let df = scan(path, format, nulls)?
        .collect()
        .map_err(|e| read_err(path, e))?;
    log::debug!("Read {} rows from {}", df.height(), path.display());
    Ok(df)
}

/// Like [`read`], showing a spinner while large exports load.
pub fn read_with_progress(path: &Path, format: Format, nulls: Nulls) -> Result<DataFrame> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!(
        "Reading {}",
        path.file_name().and_then(|f| f.to_str()).unwrap_or("?")
    ));
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = read(path, format, nulls);
    pb.finish_and_clear();
    result
}

/// Write header and rows, creating or truncating `path`. Nulls are empty cells.
pub fn write(df: &mut DataFrame, path: &Path, format: Format) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let mut file = File::create(path).map_err(|e| io_err(path, e))?;

    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(format.delimiter())
        .with_quote_style(format.quote_style())
        .finish(df)
        .map_err(|e| TableError::Write {
            path: path.display().to_string(),
            source: e,
        })
}

pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    write(df, path, Format::Csv)
}

fn read_err(path: &Path, source: PolarsError) -> TableError {
    TableError::Read {
        path: path.display().to_string(),
        source,
    }
}

fn io_err(path: &Path, source: std::io::Error) -> TableError {
    TableError::Io {
        path: path.display().to_string(),
        source,
    }
}
