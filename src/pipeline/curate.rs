//! Curation: movie filter, numeric coercion, inner join, null cleanup and
//! principal genre derivation.

use std::ops::Add;

use polars::prelude::*;

use super::{Layout, Result, Stage, require};
use crate::table::coerce::{null_if_empty, to_float, to_int};
use crate::table::io::{read_with_progress, write_csv};
use crate::table::{Format, Nulls};

/// Title type kept by curation (exact, case-sensitive).
pub const MOVIE: &str = "movie";

/// Derived column holding the first listed genre.
pub const GENRE_PRINCIPAL: &str = "genre_principal";

/// Genre column of the exploded mapping table.
pub const GENRE: &str = "genero";

/// Scratch column carrying basics row order through the join.
const ROW: &str = "__basics_row";

/// Names the curated table gives the joined rating columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingColumns {
    pub rating: &'static str,
    pub votes: &'static str,
}

/// Flat-file lake: the export's own spelling.
pub const LOCAL_COLUMNS: RatingColumns = RatingColumns {
    rating: "averageRating",
    votes: "numVotes",
};

/// Partitioned lake: lowercase, like every other column.
pub const PARTITIONED_COLUMNS: RatingColumns = RatingColumns {
    rating: "averagerating",
    votes: "numvotes",
};

impl RatingColumns {
    /// Columns that must be non-null in every curated row.
    pub fn critical(&self) -> [&'static str; 4] {
        ["startyear", "runtimeminutes", self.rating, self.votes]
    }
}

/// Row counts from one curation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CurateCounts {
    /// Basics rows whose title type is `movie`.
    pub movies: usize,
    /// Movie rows that found a rating.
    pub joined: usize,
    /// Joined rows with every critical column populated.
    pub curated: usize,
}

impl Add for CurateCounts {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            movies: self.movies + other.movies,
            joined: self.joined + other.joined,
            curated: self.curated + other.curated,
        }
    }
}

#[derive(Debug, Default)]
pub struct CurateResult {
    pub movies: usize,
    pub joined: usize,
    pub curated: usize,
    /// Rows in the genre mapping table, when one is produced.
    pub genre_pairs: Option<usize>,
}

impl From<CurateCounts> for CurateResult {
    fn from(c: CurateCounts) -> Self {
        Self {
            movies: c.movies,
            joined: c.joined,
            curated: c.curated,
            genre_pairs: None,
        }
    }
}

/// First comma-delimited entry of a genre list; null for a null or empty list.
pub fn principal_genre(genres: Expr) -> Expr {
    null_if_empty(genres.str().split(lit(",")).list().first())
}

/// Build the curated table from normalized basics and ratings.
///
/// Output columns are every basics column, then the rating columns named by
/// `columns`, then [`GENRE_PRINCIPAL`]. `startyear` and `runtimeminutes` are
/// cast to integers in place. Basics row order is preserved; a rating id
/// that appears twice yields two rows.
pub fn curate(
    basics: LazyFrame,
    ratings: LazyFrame,
    columns: &RatingColumns,
) -> PolarsResult<(DataFrame, CurateCounts)> {
    let movies = basics
        .filter(col("titletype").eq(lit(MOVIE)))
        .with_row_index(ROW, None)
        .with_columns([to_int("startyear"), to_int("runtimeminutes")])
        .collect()?;

    let ratings = ratings.select([
        col("tconst"),
        to_float("averagerating").alias(columns.rating),
        to_int("numvotes").alias(columns.votes),
    ]);

    let joined = movies
        .clone()
        .lazy()
        .join(
            ratings,
            [col("tconst")],
            [col("tconst")],
            JoinArgs::new(JoinType::Inner),
        )
        .sort_by_exprs(
            [col(ROW)],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()?;

    let complete = columns
        .critical()
        .into_iter()
        .map(|c| col(c).is_not_null())
        .reduce(|a, b| a.and(b))
        .unwrap_or_else(|| lit(true));

    let curated = joined
        .clone()
        .lazy()
        .filter(complete)
        .with_column(principal_genre(col("genres")).alias(GENRE_PRINCIPAL))
        .collect()?
        .drop(ROW)?;

    let counts = CurateCounts {
        movies: movies.height(),
        joined: joined.height(),
        curated: curated.height(),
    };
    Ok((curated, counts))
}

/// Explode each title's genre list into `(tconst, genero)` rows.
/// Duplicate pairs are dropped; titles with a null genre list contribute nothing.
pub fn explode_genres(curated: &DataFrame) -> PolarsResult<DataFrame> {
    curated
        .clone()
        .lazy()
        .select([col("tconst"), col("genres").str().split(lit(",")).alias(GENRE)])
        .explode([col(GENRE)])
        .filter(col(GENRE).is_not_null().and(col(GENRE).neq(lit(""))))
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()
}

/// Read the raw zone, curate, and write `movies_curated.csv`.
pub fn build_curated(layout: &Layout) -> Result<CurateResult> {
    let basics_path = layout.basics_raw();
    let ratings_path = layout.ratings_raw();
    require(Stage::Curate, &[&basics_path, &ratings_path], |p| p.is_file())?;

    let basics = read_with_progress(&basics_path, Format::Csv, Nulls::Imdb)?;
    let ratings = read_with_progress(&ratings_path, Format::Csv, Nulls::Imdb)?;

    let (mut curated, counts) = curate(basics.lazy(), ratings.lazy(), &LOCAL_COLUMNS)?;
    log::info!(
        "Curation: {} movies, {} joined, {} kept",
        counts.movies,
        counts.joined,
        counts.curated
    );

    let curated_path = layout.movies_curated();
    write_csv(&mut curated, &curated_path)?;

    println!("[OK] Curated dataset written: {}", curated_path.display());
    println!("[INFO] Rows in curated: {}", curated.height());

    Ok(counts.into())
}
