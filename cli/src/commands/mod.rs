//! CLI Commands

pub mod flow;
pub mod generate;
pub mod package;
pub mod resource;

use anyhow::{Context, Result};
use cig_core::flow::FlowContent;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tracing::warn;

/// `<id>.zip` in the working directory unless a path was given
pub fn archive_path(output: Option<PathBuf>, id: &str) -> PathBuf {
    output.unwrap_or_else(|| PathBuf::from(format!("{}.zip", id)))
}

/// Create a new output file; an existing file is never overwritten
pub async fn create_output(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .with_context(|| format!("cannot create {}", path.display()))
}

/// Remove an output file left behind by a failed download
pub async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "cannot remove incomplete output file");
    }
}

/// Open an optional input archive for upload
pub async fn open_input(path: Option<&Path>) -> Result<Option<File>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .await
                .with_context(|| format!("cannot open {}", path.display()))?;
            Ok(Some(file))
        }
        None => Ok(None),
    }
}

/// Borrow an opened input as engine content
pub fn content(file: &mut Option<File>) -> Option<FlowContent<'_>> {
    file.as_mut().map(|f| f as FlowContent<'_>)
}
