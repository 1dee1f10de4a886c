//! Build result: the files left in the output directory.

use crate::config::constants::BUILDER_ID;
use isoforge_shared::errors::{BuildError, BuildResult};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    dir: PathBuf,
    files: Vec<PathBuf>,
}

impl Artifact {
    /// Every regular file below `dir`, recursively, in a stable order.
    pub fn collect(dir: &Path) -> BuildResult<Self> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                BuildError::Io(std::io::Error::other(format!(
                    "Error collecting result files: {}",
                    e
                )))
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            files,
        })
    }

    pub fn builder_id(&self) -> &'static str {
        BUILDER_ID
    }

    /// Identifier of the produced VM image (the output directory).
    pub fn id(&self) -> String {
        self.dir.display().to_string()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn describe(&self) -> String {
        format!("VM files in directory: {}", self.dir.display())
    }

    /// Delete the output directory and everything in it.
    pub fn destroy(self) -> BuildResult<()> {
        std::fs::remove_dir_all(&self.dir)?;
        Ok(())
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
