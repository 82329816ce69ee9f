pub mod cluster;
pub mod config;
pub mod pipeline;
pub mod table;

/// IMDb exports the pipeline ingests, in processing order.
pub const SOURCE_FILES: &[&str] = &[BASICS_FILE, RATINGS_FILE];

/// Title basics export (one row per title).
pub const BASICS_FILE: &str = "title.basics.tsv";

/// Title ratings export (one row per rated title).
pub const RATINGS_FILE: &str = "title.ratings.tsv";

/// Application name for XDG paths
pub const APP_NAME: &str = "imdblake";
