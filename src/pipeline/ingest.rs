use std::path::Path;

use super::{Layout, Result};
use crate::SOURCE_FILES;

#[derive(Debug, Default)]
pub struct IngestResult {
    pub copied: Vec<String>,
    pub skipped: Vec<String>,
}

/// Copy the IMDb exports from the source directory into landing.
pub fn copy_to_landing(layout: &Layout) -> Result<IngestResult> {
    copy_sources(&layout.source_dir, &layout.landing, SOURCE_FILES)
}

/// Byte-copy each named file from `source_dir` into `landing`, overwriting.
/// A missing source is skipped with a warning and does not fail the stage.
pub fn copy_sources(source_dir: &Path, landing: &Path, names: &[&str]) -> Result<IngestResult> {
    std::fs::create_dir_all(landing)?;
    let mut result = IngestResult::default();

    for name in names {
        let src = source_dir.join(name);
        let dst = landing.join(name);

        if !src.is_file() {
            log::warn!("Source file {} not found", src.display());
            println!("[WARN] {} not found. Skipping.", src.display());
            result.skipped.push(name.to_string());
            continue;
        }

        let bytes = std::fs::copy(&src, &dst)?;
        log::info!("Copied {} -> {} ({} bytes)", src.display(), dst.display(), bytes);
        println!("[OK] Copied to landing: {}", name);
        result.copied.push(name.to_string());
    }

    Ok(result)
}
