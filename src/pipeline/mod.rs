//! The local four-stage pipeline: landing → raw → curated → analytics.
//!
//! Each stage reads the previous zone, checks its inputs before touching
//! anything, and fully overwrites its own output files.

pub mod analytics;
pub mod curate;
pub mod ingest;
pub mod raw;

use std::fmt;
use std::path::{Path, PathBuf};

use polars::prelude::PolarsError;
use thiserror::Error;

use crate::table::TableError;

/// Raw zone table names.
pub const BASICS_RAW: &str = "basics_raw";
pub const RATINGS_RAW: &str = "ratings_raw";

/// Curated zone table names.
pub const MOVIES_CURATED: &str = "movies_curated";
pub const GENRES_TABLE: &str = "generos";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Raw,
    Curate,
    Analytics,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Raw => "raw",
            Self::Curate => "curate",
            Self::Analytics => "analytics",
        }
    }

    /// The stage whose output this stage consumes.
    pub fn previous(self) -> Option<Stage> {
        match self {
            Self::Ingest => None,
            Self::Raw => Some(Self::Ingest),
            Self::Curate => Some(Self::Raw),
            Self::Analytics => Some(Self::Curate),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error(
        "{stage} stage: missing input {}. Run the {} stage first.",
        .paths.join(", "),
        .stage.previous().map(Stage::name).unwrap_or("source")
    )]
    MissingInput { stage: Stage, paths: Vec<String> },
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Frame(#[from] PolarsError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StageError {
    /// User-facing status line for a failed stage.
    pub fn status_line(&self) -> String {
        format!("[ERROR] {self}")
    }
}

pub type Result<T> = std::result::Result<T, StageError>;

/// Fail with [`StageError::MissingInput`] unless every input is `present`.
/// The failure is reported as an `[ERROR]` status line before returning.
pub fn require<P: AsRef<Path>>(
    stage: Stage,
    inputs: &[P],
    present: impl Fn(&Path) -> bool,
) -> Result<()> {
    let mut missing = Vec::new();
    for input in inputs {
        let path: &Path = input.as_ref();
        if !present(path) {
            missing.push(path.display().to_string());
        }
    }

    if missing.is_empty() {
        return Ok(());
    }

    let err = StageError::MissingInput {
        stage,
        paths: missing,
    };
    log::error!("{err}");
    println!("{}", err.status_line());
    Err(err)
}

/// Directory layout of the local lake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub source_dir: PathBuf,
    pub landing: PathBuf,
    pub raw: PathBuf,
    pub curated: PathBuf,
    pub analytics: PathBuf,
}

impl Layout {
    pub fn new(source_dir: PathBuf, datalake_dir: PathBuf, analytics: PathBuf) -> Self {
        Self {
            source_dir,
            landing: datalake_dir.join("landing"),
            raw: datalake_dir.join("raw"),
            curated: datalake_dir.join("curated"),
            analytics,
        }
    }

    /// Standard layout: `data_original/`, `datalake/{landing,raw,curated}/`, `analytics/`.
    pub fn from_root(root: &Path) -> Self {
        Self::new(
            root.join("data_original"),
            root.join("datalake"),
            root.join("analytics"),
        )
    }

    /// Zone directories the pipeline writes into.
    pub fn zones(&self) -> [&Path; 4] {
        [&self.landing, &self.raw, &self.curated, &self.analytics]
    }

    pub fn basics_raw(&self) -> PathBuf {
        self.raw.join(format!("{BASICS_RAW}.csv"))
    }

    pub fn ratings_raw(&self) -> PathBuf {
        self.raw.join(format!("{RATINGS_RAW}.csv"))
    }

    pub fn movies_curated(&self) -> PathBuf {
        self.curated.join(format!("{MOVIES_CURATED}.csv"))
    }
}

/// Create every zone directory. Existing directories are left alone.
pub fn create_layout(layout: &Layout) -> Result<()> {
    for dir in layout.zones() {
        std::fs::create_dir_all(dir)?;
        log::debug!("Zone ready: {}", dir.display());
    }
    println!("[OK] Lake directories created/verified.");
    Ok(())
}

/// Outcome of a full pipeline run.
pub struct RunSummary {
    pub ingest: ingest::IngestResult,
    pub raw: raw::RawResult,
    pub curate: curate::CurateResult,
    pub analytics: analytics::Aggregates,
}

/// Run all four stages in order, stopping at the first stage that fails.
pub fn run(layout: &Layout) -> Result<RunSummary> {
    create_layout(layout)?;

    let ingest = ingest::copy_to_landing(layout)?;
    let raw = raw::normalize(layout)?;
    let curate = curate::build_curated(layout)?;
    let analytics = analytics::generate(layout)?;

    println!("[DONE] Pipeline complete.");

    Ok(RunSummary {
        ingest,
        raw,
        curate,
        analytics,
    })
}

#[cfg(test)]
pub(crate) mod testdata {
    //! Small IMDb-shaped fixtures shared by the stage tests.

    use std::path::Path;

    pub const BASICS_TSV: &str = "\
tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres
tt001\tmovie\tFoo\tFoo\t0\t2000\t\\N\t90\tDrama,War
tt002\tshort\tShorty\tShorty\t0\t2001\t\\N\t10\tComedy
tt003\tmovie\t\"Quoted\" Title\tQuoted\t0\t\\N\t\\N\t100\tDrama
tt004\tmovie\tBar\tBar\t0\t2000\t\\N\t120\tComedy
tt005\tmovie\tNo Genre\tNo Genre\t0\t1999\t\\N\t0\t\\N
tt006\tmovie\tUnrated\tUnrated\t0\t2010\t\\N\t95\tAction
tt007\tMovie\tWrong Case\tWrong Case\t0\t2010\t\\N\t95\tAction
";

    pub const RATINGS_TSV: &str = "\
tconst\taverageRating\tnumVotes
tt001\t7.5\t100
tt002\t9.0\t50
tt003\t8.0\t10
tt004\t6.5\t300
tt005\t10.0\t0
tt007\t5.0\t5
tt999\t3.0\t7
";

    pub fn write_sources(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(crate::BASICS_FILE), BASICS_TSV).unwrap();
        std::fs::write(dir.join(crate::RATINGS_FILE), RATINGS_TSV).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::io::read;
    use crate::table::testutil::strings;
    use crate::table::{Format, Nulls};
    use tempfile::TempDir;

    #[test]
    fn test_missing_input_message_names_previous_stage() {
        let err = require(Stage::Raw, &[Path::new("/nope/title.basics.tsv")], |p| p.exists())
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("raw stage"));
        assert!(msg.contains("/nope/title.basics.tsv"));
        assert!(msg.contains("Run the ingest stage first"));
    }

    #[test]
    fn test_missing_input_status_line() {
        let err = require(
            Stage::Analytics,
            &[Path::new("/nope/movies_curated.csv")],
            |p| p.exists(),
        )
        .unwrap_err();
        let line = err.status_line();
        assert!(line.starts_with("[ERROR] analytics stage: missing input /nope/movies_curated.csv"));
        assert!(line.ends_with("Run the curate stage first."));
    }

    #[test]
    fn test_present_inputs_pass() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("basics_raw.csv");
        std::fs::write(&file, "tconst\n").unwrap();
        assert!(require(Stage::Curate, &[&file], |p| p.is_file()).is_ok());
    }

    #[test]
    fn test_full_run() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        testdata::write_sources(&layout.source_dir);

        let summary = run(&layout).unwrap();
        assert_eq!(summary.ingest.copied.len(), 2);
        assert_eq!(summary.raw.basics_rows, 7);
        assert_eq!(summary.raw.ratings_rows, 7);
        // tt001, tt004, tt005 survive; tt003 lacks a year, tt006 lacks a rating.
        assert_eq!(summary.curate.curated, 3);

        for name in ["ratings_por_genero.csv", "popularidad_por_anio.csv", "distribucion_duracion.csv"] {
            assert!(layout.analytics.join(name).is_file(), "{name} missing");
        }
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        testdata::write_sources(&layout.source_dir);

        run(&layout).unwrap();
        let first_curated = std::fs::read(layout.movies_curated()).unwrap();
        let first_genre = std::fs::read(layout.analytics.join("ratings_por_genero.csv")).unwrap();

        run(&layout).unwrap();
        assert_eq!(std::fs::read(layout.movies_curated()).unwrap(), first_curated);
        assert_eq!(
            std::fs::read(layout.analytics.join("ratings_por_genero.csv")).unwrap(),
            first_genre
        );
    }

    #[test]
    fn test_join_soundness() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        testdata::write_sources(&layout.source_dir);
        run(&layout).unwrap();

        let basics = read(&layout.basics_raw(), Format::Csv, Nulls::Imdb).unwrap();
        let ratings = read(&layout.ratings_raw(), Format::Csv, Nulls::Imdb).unwrap();
        let curated = read(&layout.movies_curated(), Format::Csv, Nulls::Imdb).unwrap();

        let basic_ids = strings(&basics, "tconst");
        let rating_ids = strings(&ratings, "tconst");
        let curated_ids = strings(&curated, "tconst");
        for id in &curated_ids {
            assert!(basic_ids.contains(id));
            assert!(rating_ids.contains(id));
        }
        assert!(!curated_ids.iter().any(|id| id == "tt999"));
    }

    #[test]
    fn test_run_stops_when_sources_missing() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());

        let err = run(&layout).err().unwrap();
        assert!(matches!(err, StageError::MissingInput { stage: Stage::Raw, .. }));
        assert!(!layout.basics_raw().exists());
        assert!(!layout.movies_curated().exists());
    }
}
