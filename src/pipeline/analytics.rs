//! Descriptive aggregates over the curated table.

use std::path::Path;

use polars::prelude::*;

use super::curate::{GENRE_PRINCIPAL, LOCAL_COLUMNS, RatingColumns};
use super::{Layout, Result, Stage, require};
use crate::table::coerce::{to_float, to_int};
use crate::table::io::{read_with_progress, write_csv};
use crate::table::{Format, Nulls, TableError};

/// Artifact names.
pub const RATINGS_BY_GENRE: &str = "ratings_por_genero.csv";
pub const VOTES_BY_YEAR: &str = "popularidad_por_anio.csv";
pub const RUNTIME_SUMMARY: &str = "distribucion_duracion.csv";

const RUNTIME: &str = "runtimeminutes";
const YEAR: &str = "startyear";

/// Mean of `value` per `key`, highest first. Equal means are ordered by key;
/// a null key forms its own group.
pub fn mean_by_key(frame: LazyFrame, key: &str, value: &str) -> LazyFrame {
    frame
        .group_by([col(key)])
        .agg([col(value).mean()])
        .sort_by_exprs(
            [col(value), col(key)],
            SortMultipleOptions::default()
                .with_order_descending_multi([true, false])
                .with_maintain_order(true),
        )
}

/// `describe()`-style summary of a numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSummary {
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (n − 1). Undefined below two values.
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub q50: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl RuntimeSummary {
    /// Summarize the non-null values of `column`. Quartiles interpolate
    /// linearly between closest ranks.
    pub fn from_frame(frame: LazyFrame, column: &str) -> PolarsResult<Self> {
        let v = col(column).cast(DataType::Float64);
        let quartile = |q: f64, name: &str| {
            v.clone()
                .quantile(lit(q), QuantileMethod::Linear)
                .alias(name)
        };

        let stats = frame
            .select([
                v.clone().count().cast(DataType::Float64).alias("count"),
                v.clone().mean().alias("mean"),
                v.clone().std(1).alias("std"),
                v.clone().min().alias("min"),
                quartile(0.25, "q25"),
                quartile(0.50, "q50"),
                quartile(0.75, "q75"),
                v.clone().max().alias("max"),
            ])
            .collect()?;

        let get = |name: &str| -> PolarsResult<Option<f64>> { Ok(stats.column(name)?.f64()?.get(0)) };
        let count = get("count")?.unwrap_or(0.0) as usize;

        Ok(Self {
            count,
            mean: get("mean")?,
            std: if count > 1 { get("std")? } else { None },
            min: get("min")?,
            q25: get("q25")?,
            q50: get("q50")?,
            q75: get("q75")?,
            max: get("max")?,
        })
    }

    /// Long form: one `(statistic, value)` row per statistic.
    pub fn to_frame(&self, column: &str) -> PolarsResult<DataFrame> {
        df!(
            "statistic" => ["count", "mean", "std", "min", "25%", "50%", "75%", "max"],
            column => [
                Some(self.count as f64),
                self.mean,
                self.std,
                self.min,
                self.q25,
                self.q50,
                self.q75,
                self.max,
            ],
        )
    }
}

/// The three analytics artifacts.
#[derive(Debug)]
pub struct Aggregates {
    columns: RatingColumns,
    /// Mean rating per principal genre, descending.
    pub rating_by_genre: DataFrame,
    /// Mean vote count per start year, descending.
    pub votes_by_year: DataFrame,
    pub runtime: RuntimeSummary,
}

impl Aggregates {
    /// Reduce a curated table whose rating columns are named by `columns`.
    pub fn from_frame(curated: LazyFrame, columns: &RatingColumns) -> PolarsResult<Self> {
        let typed = curated.with_columns([
            to_float(columns.rating),
            to_float(columns.votes),
            to_int(YEAR),
            to_float(RUNTIME),
        ]);

        Ok(Self {
            columns: *columns,
            rating_by_genre: mean_by_key(typed.clone(), GENRE_PRINCIPAL, columns.rating).collect()?,
            votes_by_year: mean_by_key(typed.clone(), YEAR, columns.votes).collect()?,
            runtime: RuntimeSummary::from_frame(typed, RUNTIME)?,
        })
    }

    /// `(genre, mean rating)` pairs in artifact order. `None` is the null-genre group.
    pub fn genre_means(&self) -> PolarsResult<Vec<(Option<String>, f64)>> {
        let keys = self.rating_by_genre.column(GENRE_PRINCIPAL)?.str()?;
        let means = self.rating_by_genre.column(self.columns.rating)?.f64()?;
        Ok(keys
            .into_iter()
            .zip(means)
            .filter_map(|(k, m)| Some((k.map(str::to_string), m?)))
            .collect())
    }

    /// `(year, mean votes)` pairs in artifact order.
    pub fn year_means(&self) -> PolarsResult<Vec<(i64, f64)>> {
        let years = self.votes_by_year.column(YEAR)?.i64()?;
        let means = self.votes_by_year.column(self.columns.votes)?.f64()?;
        Ok(years
            .into_iter()
            .zip(means)
            .filter_map(|(y, m)| Some((y?, m?)))
            .collect())
    }

    /// Write each aggregate as its own CSV under `dir`.
    pub fn write(&self, dir: &Path) -> std::result::Result<(), TableError> {
        write_csv(&mut self.rating_by_genre.clone(), &dir.join(RATINGS_BY_GENRE))?;
        println!("[OK] KPI mean rating by genre generated.");

        write_csv(&mut self.votes_by_year.clone(), &dir.join(VOTES_BY_YEAR))?;
        println!("[OK] KPI mean votes by release year generated.");

        write_csv(&mut self.runtime.to_frame(RUNTIME)?, &dir.join(RUNTIME_SUMMARY))?;
        println!("[OK] Runtime distribution metrics generated.");

        Ok(())
    }
}

/// Read `movies_curated.csv` and write the analytics artifacts.
pub fn generate(layout: &Layout) -> Result<Aggregates> {
    let curated_path = layout.movies_curated();
    require(Stage::Analytics, &[&curated_path], |p| p.is_file())?;

    let curated = read_with_progress(&curated_path, Format::Csv, Nulls::Imdb)?;
    let aggregates = Aggregates::from_frame(curated.lazy(), &LOCAL_COLUMNS)?;

    log::info!(
        "Analytics: {} genres, {} years, {} runtimes",
        aggregates.rating_by_genre.height(),
        aggregates.votes_by_year.height(),
        aggregates.runtime.count
    );

    aggregates.write(&layout.analytics)?;
    Ok(aggregates)
}
