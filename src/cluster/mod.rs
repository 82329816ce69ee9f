//! Partitioned backend: the same four stages over hash-partitioned tables,
//! executed partition-wise on a worker pool owned by an explicit [`Session`].

pub mod partitioned;
pub mod stages;

use std::path::{Path, PathBuf};

use polars::prelude::PolarsError;
use thiserror::Error;

use crate::pipeline::{RunSummary, StageError};
use crate::table::TableError;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Frame(#[from] PolarsError),
    #[error("Manifest error in {path}: {source}")]
    Manifest {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupt partitioned table {path}: {message}")]
    Corrupt { path: String, message: String },
    #[error("Thread pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("Invalid session config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ClusterError>;

/// Execution context for the partitioned backend.
///
/// Built once at program start and passed to every stage; dropping it (or
/// calling [`Session::stop`]) shuts the worker pool down.
pub struct Session {
    app_name: String,
    source_dir: PathBuf,
    base_path: PathBuf,
    partitions: usize,
    pool: rayon::ThreadPool,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Where the original exports are read from.
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn landing(&self) -> PathBuf {
        self.base_path.join("landing")
    }

    pub fn raw(&self) -> PathBuf {
        self.base_path.join("raw")
    }

    pub fn curated(&self) -> PathBuf {
        self.base_path.join("curated")
    }

    pub fn analytics(&self) -> PathBuf {
        self.base_path.join("analytics")
    }

    /// Run `op` inside the session's worker pool.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// End the session, releasing its worker threads.
    pub fn stop(self) {
        log::info!("Stopping session '{}'", self.app_name);
    }
}

/// Builder for [`Session`]. Unset fields take the standard defaults.
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    app_name: String,
    source_dir: PathBuf,
    base_path: PathBuf,
    partitions: usize,
    workers: usize,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            app_name: "imdblake".to_string(),
            source_dir: PathBuf::from("data_original"),
            base_path: PathBuf::from("datalake_cluster"),
            partitions: 8,
            workers: 0,
        }
    }

    pub fn app_name(mut self, name: &str) -> Self {
        self.app_name = name.to_string();
        self
    }

    pub fn source_dir(mut self, dir: PathBuf) -> Self {
        self.source_dir = dir;
        self
    }

    pub fn base_path(mut self, path: PathBuf) -> Self {
        self.base_path = path;
        self
    }

    pub fn partitions(mut self, n: usize) -> Self {
        self.partitions = n;
        self
    }

    /// Worker threads. 0 = one per available core.
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    pub fn build(self) -> Result<Session> {
        if self.partitions == 0 {
            return Err(ClusterError::Config("partitions must be at least 1".to_string()));
        }

        let workers = if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2)
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("imdblake-worker-{i}"))
            .build()?;

        log::info!(
            "Started session '{}' ({} workers, {} partitions) at {}",
            self.app_name,
            workers,
            self.partitions,
            self.base_path.display()
        );

        Ok(Session {
            app_name: self.app_name,
            source_dir: self.source_dir,
            base_path: self.base_path,
            partitions: self.partitions,
            pool,
        })
    }
}

/// Run all four stages against the partitioned lake.
pub fn run(session: &Session) -> Result<RunSummary> {
    for dir in [session.landing(), session.raw(), session.curated(), session.analytics()] {
        std::fs::create_dir_all(&dir).map_err(|e| ClusterError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
    }
    println!(
        "[OK] Session '{}': partitioned lake ready at {}",
        session.app_name(),
        session.base_path().display()
    );

    let ingest = stages::ingest(session)?;
    let raw = stages::normalize(session)?;
    let curate = stages::curate(session)?;
    let analytics = stages::analytics(session)?;

    println!("[DONE] Partitioned pipeline complete.");

    Ok(RunSummary {
        ingest,
        raw,
        curate,
        analytics,
    })
}
