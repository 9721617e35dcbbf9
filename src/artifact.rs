//! Local release-note artifact.
//!
//! A convenience copy of the composed document on disk, written in
//! overwrite or append mode. The remote release stays the system of record.

use std::io::Write;
use std::path::Path;

use crate::config::OutputMode;
use crate::error::HeraldError;
use crate::models::ReleaseDocument;

pub fn write_artifact(
    path: &Path,
    mode: OutputMode,
    tag: &str,
    document: &ReleaseDocument,
) -> Result<(), HeraldError> {
    let wrap = |source| HeraldError::Artifact {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(wrap)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(mode == OutputMode::Append)
        .truncate(mode == OutputMode::Overwrite)
        .open(path)
        .map_err(wrap)?;

    let mut content = format!("## {}\n\n{}", tag, document.body);
    if !content.ends_with('\n') {
        content.push('\n');
    }
    if mode == OutputMode::Append {
        content.push('\n');
    }
    file.write_all(content.as_bytes()).map_err(wrap)?;
    Ok(())
}
