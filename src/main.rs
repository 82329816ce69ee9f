use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use imdblake::pipeline::analytics::Aggregates;
use imdblake::pipeline::{self, Layout, RunSummary};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "imdblake", version, about = "Batch ETL for IMDb exports")]
struct Cli {
    /// Directory the lake lives under (defaults to config `root`, then the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// With no subcommand the full local pipeline runs.
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Variant {
    /// Flat files, one per table
    Local,
    /// Hash-partitioned tables processed on a worker pool
    Cluster,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all four stages in order
    Run {
        /// Execution backend
        #[arg(long, value_enum, default_value = "local")]
        variant: Variant,
    },

    /// Create the lake directories
    Layout,

    /// Copy the IMDb exports into the landing zone
    Ingest,

    /// Normalize landing TSV files into the raw zone
    Raw,

    /// Build the curated movie table from the raw zone
    Curate,

    /// Compute the analytics artifacts from the curated table
    Analytics,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = imdblake::config::AppConfig::load();
    let root = config.resolve_root(cli.root);
    let layout = config.layout(&root);
    log::info!("Root: {}", root.display());

    match cli.command.unwrap_or(Commands::Run { variant: Variant::Local }) {
        Commands::Run { variant: Variant::Local } => {
            let summary = pipeline::run(&layout).context("Local pipeline failed")?;
            print_summary(&summary)?;
        }

        Commands::Run { variant: Variant::Cluster } => {
            let session = config
                .session_builder(&root)
                .build()
                .context("Failed to start session")?;
            let result = imdblake::cluster::run(&session);
            session.stop();

            let summary = result.context("Partitioned pipeline failed")?;
            print_summary(&summary)?;
        }

        Commands::Layout => {
            pipeline::create_layout(&layout).context("Failed to create lake directories")?;
        }

        Commands::Ingest => {
            let result = pipeline::ingest::copy_to_landing(&layout).context("Ingestion failed")?;
            println!(
                "Ingestion complete: {} copied, {} skipped",
                result.copied.len(),
                result.skipped.len()
            );
        }

        Commands::Raw => {
            let result = pipeline::raw::normalize(&layout).context("Raw normalization failed")?;
            println!(
                "Raw complete: {} basics rows, {} ratings rows",
                result.basics_rows, result.ratings_rows
            );
        }

        Commands::Curate => {
            let result = pipeline::curate::build_curated(&layout).context("Curation failed")?;
            println!(
                "Curation complete: {} movies, {} with ratings, {} curated",
                result.movies, result.joined, result.curated
            );
        }

        Commands::Analytics => {
            let aggregates = pipeline::analytics::generate(&layout).context("Analytics failed")?;
            print_top_genres(&aggregates)?;
        }
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) -> Result<()> {
    println!();
    println!("Run Summary");
    println!("===========");
    println!(
        "Sources:        {} copied, {} skipped",
        summary.ingest.copied.len(),
        summary.ingest.skipped.len()
    );
    println!(
        "Raw rows:       {} basics, {} ratings",
        summary.raw.basics_rows, summary.raw.ratings_rows
    );
    println!(
        "Curated:        {} of {} movies ({} with ratings)",
        summary.curate.curated, summary.curate.movies, summary.curate.joined
    );
    if let Some(pairs) = summary.curate.genre_pairs {
        println!("Genre pairs:    {}", pairs);
    }
    println!(
        "Groups:         {} genres, {} years",
        summary.analytics.rating_by_genre.height(),
        summary.analytics.votes_by_year.height()
    );
    println!();
    print_top_genres(&summary.analytics)
}

/// Print the best-rated principal genres.
fn print_top_genres(aggregates: &Aggregates) -> Result<()> {
    let by_genre = aggregates.genre_means().context("Failed to read genre means")?;
    if by_genre.is_empty() {
        println!("No curated movies.");
        return Ok(());
    }

    println!("{:<20} {:>6}", "Genre", "Rating");
    println!("{}", "-".repeat(27));
    for (genre, mean) in by_genre.iter().take(10) {
        println!("{:<20} {:>6.2}", genre.as_deref().unwrap_or("(none)"), mean);
    }
    Ok(())
}
