//! The four pipeline stages over partitioned tables.
//!
//! Contracts match the local stages, with two differences in the curated
//! zone: the movie table drops `titletype`, `genres` and `endyear`, and a
//! separate `generos` table maps every title to each of its genres.

use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::*;
use rayon::prelude::*;

use super::partitioned::{self, split_by_key};
use super::{Result, Session};
use crate::pipeline::analytics::Aggregates;
use crate::pipeline::curate::{self as curation, CurateCounts, CurateResult, PARTITIONED_COLUMNS};
use crate::pipeline::ingest::IngestResult;
use crate::pipeline::raw::{RawResult, normalize_table};
use crate::pipeline::{BASICS_RAW, GENRES_TABLE, MOVIES_CURATED, RATINGS_RAW, Stage, require};
use crate::table::io::read_with_progress;
use crate::table::{Format, Nulls, concat_frames, drop_columns};
use crate::{BASICS_FILE, RATINGS_FILE, SOURCE_FILES};

/// Columns the partitioned curated table leaves out.
pub const DROPPED_COLUMNS: [&str; 3] = ["titletype", "genres", "endyear"];

/// Column every zone after landing is partitioned on.
const KEY: &str = "tconst";

fn partition_bar(len: usize, what: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} partitions {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(what.to_string());
    pb
}

/// Load each source TSV and write it to landing as a partitioned TSV table.
pub fn ingest(session: &Session) -> Result<IngestResult> {
    let mut result = IngestResult::default();

    for name in SOURCE_FILES {
        let src = session.source_dir().join(name);
        if !src.is_file() {
            log::warn!("Source file {} not found", src.display());
            println!("[WARN] {} not found. Skipping.", src.display());
            result.skipped.push(name.to_string());
            continue;
        }

        let df = read_with_progress(&src, Format::Tsv, Nulls::Empty)?;
        let manifest =
            partitioned::write_table(session, &session.landing().join(name), &df, Format::Tsv, None)?;

        log::info!("Landed {} ({} rows)", name, manifest.rows());
        println!("[OK] Copied TSV to landing: {}", name);
        result.copied.push(name.to_string());
    }

    Ok(result)
}

/// Landing TSV tables → raw CSV tables, lowercased and partitioned on `tconst`.
pub fn normalize(session: &Session) -> Result<RawResult> {
    let basics_dir = session.landing().join(BASICS_FILE);
    let ratings_dir = session.landing().join(RATINGS_FILE);
    require(Stage::Raw, &[&basics_dir, &ratings_dir], partitioned::exists)?;

    println!("[INFO] Reading TSV from landing...");
    let basics = normalize_table(concat_frames(partitioned::read_partitions(
        session,
        &basics_dir,
        Nulls::Empty,
    )?)?)?;
    let ratings = normalize_table(concat_frames(partitioned::read_partitions(
        session,
        &ratings_dir,
        Nulls::Empty,
    )?)?)?;

    let result = RawResult {
        basics_rows: basics.height(),
        ratings_rows: ratings.height(),
    };

    partitioned::write_table(session, &session.raw().join(BASICS_RAW), &basics, Format::Csv, Some(KEY))?;
    partitioned::write_table(session, &session.raw().join(RATINGS_RAW), &ratings, Format::Csv, Some(KEY))?;

    println!("[OK] Raw zone written (TSV → CSV).");
    Ok(result)
}

/// Bring a partitioned input to the session's partition count, keyed on
/// `tconst`, so partition `i` of one table only ever joins partition `i` of another.
fn copartition(session: &Session, parts: Vec<DataFrame>) -> Result<Vec<DataFrame>> {
    if parts.len() == session.partitions() {
        return Ok(parts);
    }
    log::debug!(
        "Repartitioning {} → {} partitions",
        parts.len(),
        session.partitions()
    );
    Ok(split_by_key(&concat_frames(parts)?, KEY, session.partitions())?)
}

/// Join basics and ratings partition-wise, then write the curated movie
/// table and the genre mapping table.
pub fn curate(session: &Session) -> Result<CurateResult> {
    let basics_dir = session.raw().join(BASICS_RAW);
    let ratings_dir = session.raw().join(RATINGS_RAW);
    require(Stage::Curate, &[&basics_dir, &ratings_dir], partitioned::exists)?;

    let basics = copartition(session, partitioned::read_partitions(session, &basics_dir, Nulls::Imdb)?)?;
    let ratings = copartition(session, partitioned::read_partitions(session, &ratings_dir, Nulls::Imdb)?)?;

    let pb = partition_bar(basics.len(), "curating");
    let outputs: Vec<(DataFrame, DataFrame, CurateCounts)> = session.install(|| {
        basics
            .par_iter()
            .zip(ratings.par_iter())
            .map(|(b, r)| -> PolarsResult<_> {
                let (curated, counts) =
                    curation::curate(b.clone().lazy(), r.clone().lazy(), &PARTITIONED_COLUMNS)?;
                let genres = curation::explode_genres(&curated)?;
                pb.inc(1);
                Ok((drop_columns(curated, &DROPPED_COLUMNS)?, genres, counts))
            })
            .collect::<PolarsResult<Vec<_>>>()
    })?;
    pb.finish_and_clear();

    let mut movies = Vec::with_capacity(outputs.len());
    let mut genres = Vec::with_capacity(outputs.len());
    let mut counts = CurateCounts::default();
    for (m, g, c) in outputs {
        movies.push(m);
        genres.push(g);
        counts = counts + c;
    }

    let genre_manifest = partitioned::write_parts(
        session,
        &session.curated().join(GENRES_TABLE),
        &genres,
        Format::Csv,
        Some(KEY),
    )?;
    partitioned::write_parts(
        session,
        &session.curated().join(MOVIES_CURATED),
        &movies,
        Format::Csv,
        Some(KEY),
    )?;

    log::info!(
        "Curation: {} movies, {} joined, {} kept, {} genre pairs",
        counts.movies,
        counts.joined,
        counts.curated,
        genre_manifest.rows()
    );
    println!("[OK] Curated zone written to {}", session.curated().display());
    println!("[INFO] Rows in curated: {}", counts.curated);

    Ok(CurateResult {
        genre_pairs: Some(genre_manifest.rows()),
        ..CurateResult::from(counts)
    })
}

/// Read every curated partition and write the artifacts under the lake's
/// analytics directory.
pub fn analytics(session: &Session) -> Result<Aggregates> {
    let curated_dir = session.curated().join(MOVIES_CURATED);
    require(Stage::Analytics, &[&curated_dir], partitioned::exists)?;

    let parts = partitioned::read_partitions(session, &curated_dir, Nulls::Imdb)?;
    let aggregates = Aggregates::from_frame(concat_frames(parts)?.lazy(), &PARTITIONED_COLUMNS)?;

    aggregates.write(&session.analytics())?;
    Ok(aggregates)
}
