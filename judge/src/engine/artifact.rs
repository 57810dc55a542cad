//! This module manages execution artifacts: the per-execution directories holding a materialized
//! harness program and its compiler output.
//!

use std::path::Path;

use tempfile::TempDir;

use crate::{ResultExt, Result};
use crate::harness::Harness;

/// Prefix of execution directory names.
const DIR_PREFIX: &str = "exec-";

/// A uniquely named directory inside the scratch directory that holds the files of exactly one
/// execution. The directory and everything in it are removed when the artifact is dropped, on
/// every exit path including unwinding.
pub struct ExecutionArtifact {
    /// The execution directory.
    dir: TempDir,

    /// Name of the harness source file inside the directory.
    source_file: &'static str,
}

impl ExecutionArtifact {
    /// Create a new execution directory under `scratch_dir` and write the harness program into
    /// it. `scratch_dir` is created if it does not exist.
    pub fn create(scratch_dir: &Path, harness: &Harness) -> Result<Self> {
        std::fs::create_dir_all(scratch_dir)
            .chain_err(|| format!("cannot create scratch directory {}", scratch_dir.display()))?;
        let dir = tempfile::Builder::new()
            .prefix(DIR_PREFIX)
            .tempdir_in(scratch_dir)
            .chain_err(|| format!("cannot create execution directory in {}",
                scratch_dir.display()))?;

        let source_path = dir.path().join(harness.file_name);
        std::fs::write(&source_path, harness.text.as_bytes())
            .chain_err(|| format!("cannot write harness program {}", source_path.display()))?;
        trace!("Execution artifact created at {}", dir.path().display());

        Ok(ExecutionArtifact {
            dir,
            source_file: harness.file_name,
        })
    }

    /// Get the path to the execution directory.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Get the name of the harness source file, relative to the execution directory.
    pub fn source_file(&self) -> &'static str {
        self.source_file
    }

    /// Remove the execution directory, logging failures instead of returning them.
    pub fn close(self) {
        let path = self.dir.path().to_owned();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove execution directory {}: {}", path.display(), e);
        } else {
            trace!("Execution artifact removed from {}", path.display());
        }
    }
}
