//! Delimited file I/O and frame helpers shared by both backends.
//!
//! Every zone file is read with all columns as text; typing happens only
//! where a stage needs it, through the null-tolerant casts in [`coerce`].

pub mod coerce;
pub mod io;

use polars::prelude::*;
use thiserror::Error;

pub use io::{Format, Nulls};

#[derive(Error, Debug)]
pub enum TableError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: PolarsError,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: PolarsError,
    },
    #[error(transparent)]
    Frame(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, TableError>;

/// Column names in frame order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names_owned()
        .into_iter()
        .map(|c| c.to_string())
        .collect()
}

/// Lowercase every column name in place. Cell text is untouched.
pub fn lowercase_columns(df: &mut DataFrame) -> PolarsResult<()> {
    let lowered: Vec<String> = column_names(df).iter().map(|c| c.to_lowercase()).collect();
    df.set_column_names(lowered)
}

/// Remove the named columns. Names that are not present are ignored.
pub fn drop_columns(mut df: DataFrame, names: &[&str]) -> PolarsResult<DataFrame> {
    for name in names {
        if df.column(name).is_ok() {
            df = df.drop(name)?;
        }
    }
    Ok(df)
}

/// Stack frames vertically, in order. All inputs must share one schema.
pub fn concat_frames(frames: Vec<DataFrame>) -> PolarsResult<DataFrame> {
    let mut iter = frames.into_iter();
    let Some(mut out) = iter.next() else {
        return Ok(DataFrame::empty());
    };
    for df in iter {
        out.vstack_mut(&df)?;
    }
    Ok(out)
}
