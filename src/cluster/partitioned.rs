//! On-disk partitioned tables.
//!
//! A table is a directory:
//!
//! ```text
//! basics_raw/
//!   part-00000.csv      header + rows of partition 0
//!   part-00001.csv
//!   _manifest.json      columns, format, partition key, per-partition row counts
//!   _SUCCESS            written last; a table without it is incomplete
//! ```

use std::path::{Path, PathBuf};

use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::{ClusterError, Result, Session};
use crate::table::io::{read, write};
use crate::table::{Format, Nulls, TableError, column_names};

pub const SUCCESS_MARKER: &str = "_SUCCESS";
pub const MANIFEST_FILE: &str = "_manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub columns: Vec<String>,
    /// File extension of the part files (`csv` or `tsv`).
    pub format: String,
    /// Column the rows were hash-partitioned on, if any.
    pub partition_key: Option<String>,
    /// Row count of each part file, in part order.
    pub partitions: Vec<usize>,
}

impl Manifest {
    pub fn rows(&self) -> usize {
        self.partitions.iter().sum()
    }
}

/// FNV-1a, 64-bit. Stable across builds and platforms.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Partition that rows with `key` belong to.
pub fn partition_of(key: &str, partitions: usize) -> usize {
    (fnv1a(key.as_bytes()) % partitions as u64) as usize
}

/// Hash-partition rows on the text column `key`. Row order within a
/// partition is preserved; a null key hashes like the empty string.
pub fn split_by_key(df: &DataFrame, key: &str, partitions: usize) -> PolarsResult<Vec<DataFrame>> {
    let assigned: Vec<usize> = df
        .column(key)?
        .str()?
        .into_iter()
        .map(|k| partition_of(k.unwrap_or(""), partitions))
        .collect();

    (0..partitions)
        .map(|p| {
            let mask: BooleanChunked = assigned.iter().map(|&a| a == p).collect();
            df.filter(&mask)
        })
        .collect()
}

/// Split into contiguous, near-equal chunks. Concatenating the parts gives
/// back the input order.
pub fn split_even(df: &DataFrame, partitions: usize) -> Vec<DataFrame> {
    let per_part = df.height().div_ceil(partitions).max(1);
    (0..partitions)
        .map(|p| df.slice((p * per_part) as i64, per_part))
        .collect()
}

/// True when `dir` holds a completely written table.
pub fn exists(dir: &Path) -> bool {
    dir.join(SUCCESS_MARKER).is_file()
}

fn part_path(dir: &Path, index: usize, format: Format) -> PathBuf {
    dir.join(format!("part-{index:05}.{}", format.extension()))
}

fn io_err(path: &Path, source: std::io::Error) -> ClusterError {
    ClusterError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Write `parts` as a table at `dir`, replacing whatever was there.
pub fn write_parts(
    session: &Session,
    dir: &Path,
    parts: &[DataFrame],
    format: Format,
    partition_key: Option<&str>,
) -> Result<Manifest> {
    let columns = match parts.first() {
        Some(p) => column_names(p),
        None => {
            return Err(ClusterError::Corrupt {
                path: dir.display().to_string(),
                message: "no partitions to write".to_string(),
            });
        }
    };
    if let Some(p) = parts.iter().find(|p| column_names(p) != columns) {
        return Err(ClusterError::Corrupt {
            path: dir.display().to_string(),
            message: format!(
                "partitions disagree on columns: [{}] vs [{}]",
                columns.join(", "),
                column_names(p).join(", ")
            ),
        });
    }

    if dir.exists() {
        std::fs::remove_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    session.install(|| {
        parts
            .par_iter()
            .enumerate()
            .try_for_each(|(i, part)| write(&mut part.clone(), &part_path(dir, i, format), format))
    })?;

    let manifest = Manifest {
        columns,
        format: format.extension().to_string(),
        partition_key: partition_key.map(str::to_string),
        partitions: parts.iter().map(DataFrame::height).collect(),
    };

    let manifest_path = dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(&manifest).map_err(|e| ClusterError::Manifest {
        path: manifest_path.display().to_string(),
        source: e,
    })?;
    std::fs::write(&manifest_path, json).map_err(|e| io_err(&manifest_path, e))?;

    let marker = dir.join(SUCCESS_MARKER);
    std::fs::write(&marker, b"").map_err(|e| io_err(&marker, e))?;

    log::debug!(
        "Wrote {} rows in {} partitions to {}",
        manifest.rows(),
        manifest.partitions.len(),
        dir.display()
    );
    Ok(manifest)
}

/// Hash-partition `df` on `key` (or split evenly when `key` is `None`)
/// into the session's partition count and write it.
pub fn write_table(
    session: &Session,
    dir: &Path,
    df: &DataFrame,
    format: Format,
    key: Option<&str>,
) -> Result<Manifest> {
    let parts = match key {
        Some(k) => split_by_key(df, k, session.partitions())?,
        None => split_even(df, session.partitions()),
    };
    write_parts(session, dir, &parts, format, key)
}

pub fn read_manifest(dir: &Path) -> Result<Manifest> {
    let path = dir.join(MANIFEST_FILE);
    let text = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_json::from_str(&text).map_err(|e| ClusterError::Manifest {
        path: path.display().to_string(),
        source: e,
    })
}

/// Read every partition of the table at `dir`, in part order. All columns
/// come back as text.
pub fn read_partitions(session: &Session, dir: &Path, nulls: Nulls) -> Result<Vec<DataFrame>> {
    let corrupt = |message: String| ClusterError::Corrupt {
        path: dir.display().to_string(),
        message,
    };

    if !exists(dir) {
        return Err(corrupt(format!("{SUCCESS_MARKER} marker missing")));
    }

    let manifest = read_manifest(dir)?;
    let format = Format::from_extension(&manifest.format)
        .ok_or_else(|| corrupt(format!("unknown part format '{}'", manifest.format)))?;

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_str().is_some_and(|n| n.starts_with("part-")))
        .map(|e| e.into_path())
        .collect();
    files.sort();

    if files.len() != manifest.partitions.len() {
        return Err(corrupt(format!(
            "manifest lists {} partitions, found {} part files",
            manifest.partitions.len(),
            files.len()
        )));
    }

    let parts: Vec<DataFrame> = session.install(|| {
        files
            .par_iter()
            .map(|path| read(path, format, nulls))
            .collect::<std::result::Result<Vec<_>, TableError>>()
    })?;

    for (i, part) in parts.iter().enumerate() {
        if column_names(part) != manifest.columns || part.height() != manifest.partitions[i] {
            return Err(corrupt(format!("part {i} does not match the manifest")));
        }
    }

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::tests::session;
    use crate::table::concat_frames;
    use crate::table::testutil::strings;
    use tempfile::TempDir;

    fn ids(n: usize) -> DataFrame {
        df!(
            "tconst" => (0..n).map(|i| format!("tt{i:07}")).collect::<Vec<_>>(),
            "n" => (0..n).map(|i| i.to_string()).collect::<Vec<_>>(),
        )
        .unwrap()
    }

    #[test]
    fn test_partition_of_is_stable() {
        // Fixed values: the assignment must not change between releases.
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(partition_of("tt001", 4), partition_of("tt001", 4));
        assert!(partition_of("tt001", 4) < 4);
        assert_eq!(partition_of("anything", 1), 0);
    }

    #[test]
    fn test_split_by_key_colocates() {
        let parts = split_by_key(&ids(100), "tconst", 4).unwrap();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts.iter().map(DataFrame::height).sum::<usize>(), 100);
        for (p, part) in parts.iter().enumerate() {
            for id in strings(part, "tconst") {
                assert_eq!(partition_of(&id, 4), p);
            }
        }
    }

    #[test]
    fn test_split_even_preserves_order() {
        let parts = split_even(&ids(10), 3);
        assert_eq!(parts.iter().map(DataFrame::height).collect::<Vec<_>>(), vec![4, 4, 2]);
        let back = concat_frames(parts).unwrap();
        assert!(back.equals(&ids(10)));

        let empty = split_even(&ids(0), 3);
        assert_eq!(empty.len(), 3);
        assert!(empty.iter().all(|p| p.height() == 0 && p.width() == 2));
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let s = session(dir.path(), 3);
        let table_dir = dir.path().join("t");

        let manifest = write_table(&s, &table_dir, &ids(20), Format::Csv, Some("tconst")).unwrap();
        assert_eq!(manifest.rows(), 20);
        assert_eq!(manifest.partition_key.as_deref(), Some("tconst"));
        assert!(exists(&table_dir));
        assert!(table_dir.join("part-00002.csv").is_file());

        let parts = read_partitions(&s, &table_dir, Nulls::Empty).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(concat_frames(parts).unwrap().height(), 20);
        assert_eq!(read_manifest(&table_dir).unwrap(), manifest);
    }

    #[test]
    fn test_empty_partition_keeps_header() {
        let dir = TempDir::new().unwrap();
        let s = session(dir.path(), 4);
        let table_dir = dir.path().join("t");

        write_table(&s, &table_dir, &ids(1), Format::Csv, None).unwrap();
        let parts = read_partitions(&s, &table_dir, Nulls::Empty).unwrap();
        assert_eq!(parts.iter().map(DataFrame::height).collect::<Vec<_>>(), vec![1, 0, 0, 0]);
        assert!(parts.iter().all(|p| column_names(p) == vec!["tconst", "n"]));
    }

    #[test]
    fn test_overwrite_removes_stale_parts() {
        let dir = TempDir::new().unwrap();
        let table_dir = dir.path().join("t");

        write_table(&session(dir.path(), 4), &table_dir, &ids(8), Format::Tsv, None).unwrap();
        let s = session(dir.path(), 2);
        write_table(&s, &table_dir, &ids(8), Format::Tsv, None).unwrap();

        assert!(!table_dir.join("part-00003.tsv").exists());
        assert_eq!(read_partitions(&s, &table_dir, Nulls::Empty).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_success_marker_rejected() {
        let dir = TempDir::new().unwrap();
        let s = session(dir.path(), 2);
        let table_dir = dir.path().join("t");
        write_table(&s, &table_dir, &ids(5), Format::Csv, None).unwrap();
        std::fs::remove_file(table_dir.join(SUCCESS_MARKER)).unwrap();

        assert!(!exists(&table_dir));
        assert!(matches!(
            read_partitions(&s, &table_dir, Nulls::Empty),
            Err(ClusterError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_lost_part_file_detected() {
        let dir = TempDir::new().unwrap();
        let s = session(dir.path(), 2);
        let table_dir = dir.path().join("t");
        write_table(&s, &table_dir, &ids(5), Format::Csv, None).unwrap();
        std::fs::remove_file(table_dir.join("part-00001.csv")).unwrap();

        assert!(matches!(
            read_partitions(&s, &table_dir, Nulls::Empty),
            Err(ClusterError::Corrupt { .. })
        ));
    }
}
