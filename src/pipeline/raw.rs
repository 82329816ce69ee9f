use polars::prelude::*;

use super::{Layout, Result, Stage, require};
use crate::table::io::{read_with_progress, write_csv};
use crate::table::{Format, Nulls, lowercase_columns};
use crate::{BASICS_FILE, RATINGS_FILE};

#[derive(Debug, Default)]
pub struct RawResult {
    pub basics_rows: usize,
    pub ratings_rows: usize,
}

/// Container-level normalization: lowercase the header. Rows pass through as-is.
pub fn normalize_table(mut df: DataFrame) -> PolarsResult<DataFrame> {
    lowercase_columns(&mut df)?;
    Ok(df)
}

/// Parse both landing TSV files and write them to raw as CSV.
///
/// Both inputs are read before anything is written, so a missing or
/// unreadable landing file leaves the raw zone untouched.
pub fn normalize(layout: &Layout) -> Result<RawResult> {
    let basics_path = layout.landing.join(BASICS_FILE);
    let ratings_path = layout.landing.join(RATINGS_FILE);
    require(Stage::Raw, &[&basics_path, &ratings_path], |p| p.is_file())?;

    println!("[INFO] Loading {}...", BASICS_FILE);
    let mut basics = normalize_table(read_with_progress(&basics_path, Format::Tsv, Nulls::Empty)?)?;

    println!("[INFO] Loading {}...", RATINGS_FILE);
    let mut ratings = normalize_table(read_with_progress(&ratings_path, Format::Tsv, Nulls::Empty)?)?;

    write_csv(&mut basics, &layout.basics_raw())?;
    write_csv(&mut ratings, &layout.ratings_raw())?;

    log::info!(
        "Raw zone: {} basics rows, {} ratings rows",
        basics.height(),
        ratings.height()
    );
    println!("[OK] Landing files normalized to raw.");

    Ok(RawResult {
        basics_rows: basics.height(),
        ratings_rows: ratings.height(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{StageError, ingest, testdata};
    use crate::table::column_names;
    use crate::table::io::read;
    use crate::table::testutil::text;
    use tempfile::TempDir;

    #[test]
    fn test_lowercases_header_only() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        testdata::write_sources(&layout.source_dir);
        ingest::copy_to_landing(&layout).unwrap();

        let result = normalize(&layout).unwrap();
        assert_eq!(result.basics_rows, 7);

        let basics = read(&layout.basics_raw(), Format::Csv, Nulls::Empty).unwrap();
        assert_eq!(
            column_names(&basics),
            vec![
                "tconst", "titletype", "primarytitle", "originaltitle", "isadult",
                "startyear", "endyear", "runtimeminutes", "genres"
            ]
        );
        // No filtering or coercion at this stage.
        assert_eq!(text(&basics, "titletype")[1].as_deref(), Some("short"));
        assert_eq!(text(&basics, "primarytitle")[2].as_deref(), Some("\"Quoted\" Title"));
        assert_eq!(text(&basics, "startyear")[2].as_deref(), Some("\\N"));
        assert_eq!(text(&basics, "runtimeminutes")[0].as_deref(), Some("90"));

        let ratings = read(&layout.ratings_raw(), Format::Csv, Nulls::Empty).unwrap();
        assert_eq!(column_names(&ratings), vec!["tconst", "averagerating", "numvotes"]);
        assert_eq!(ratings.height(), 7);
        assert_eq!(text(&ratings, "averagerating")[4].as_deref(), Some("10.0"));
    }

    #[test]
    fn test_missing_landing_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        std::fs::create_dir_all(&layout.landing).unwrap();
        // Only one of the two inputs is present.
        std::fs::write(layout.landing.join(BASICS_FILE), testdata::BASICS_TSV).unwrap();

        let err = normalize(&layout).unwrap_err();
        match err {
            StageError::MissingInput { stage, paths } => {
                assert_eq!(stage, Stage::Raw);
                assert_eq!(paths.len(), 1);
                assert!(paths[0].ends_with(RATINGS_FILE));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!layout.basics_raw().exists());
        assert!(!layout.ratings_raw().exists());
    }
}
