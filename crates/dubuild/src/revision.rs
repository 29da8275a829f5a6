//! Source-control revisions of individual files

use std::{fmt, path::Path, process::Command};

use log::{debug, warn};

/// Supplies the short revision a file was last changed in
pub trait RevisionProvider: fmt::Debug {
    /// Short revision identifier, or an empty string when none is known
    fn revision(&self, path: &Path) -> String;
}

/// Used when builds run without source-control context
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRevisions;

impl RevisionProvider for NoRevisions {
    fn revision(&self, _path: &Path) -> String {
        String::new()
    }
}

/// Asks the `git` CLI for the last commit touching each file
#[derive(Debug, Clone)]
pub struct GitRevisions {
    program: String,
}

impl Default for GitRevisions {
    fn default() -> Self {
        Self::new()
    }
}

impl GitRevisions {
    pub fn new() -> Self {
        Self::with_program("git")
    }

    /// Use a specific git executable
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl RevisionProvider for GitRevisions {
    fn revision(&self, path: &Path) -> String {
        let (Some(dir), Some(file)) = (path.parent(), path.file_name()) else {
            return String::new();
        };
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };

        let output = Command::new(&self.program)
            .args(["log", "-n", "1", "--pretty=format:%h", "--"])
            .arg(file)
            .current_dir(dir)
            .output();

        match output {
            Ok(output) if output.status.success() => {
                let revision = String::from_utf8_lossy(&output.stdout).trim().to_owned();
                debug!("{} is at revision '{revision}'", path.display());
                revision
            }
            Ok(output) => {
                warn!(
                    "Could not read the revision of {}: {}",
                    path.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                String::new()
            }
            Err(e) => {
                warn!("Could not run '{}' for {}: {e}", self.program, path.display());
                String::new()
            }
        }
    }
}
