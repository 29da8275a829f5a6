//! Error taxonomy for a build invocation
//!
//! Every variant is fatal to the current build. Parse and duplicate-name errors are the only
//! ones collected during discovery before the build gives up; the rest abort immediately.

use std::path::PathBuf;

/// Domain errors raised while discovering, resolving and compiling sources
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("source directory {} does not exist", .0.display())]
    SourceDirectoryNotFound(PathBuf),

    #[error("duplicate source file name '{name}' ({})", .path.display())]
    DuplicateSource { name: String, path: PathBuf },

    #[error("{}:{line}: {message}", .path.display())]
    SourceParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{count} source file(s) could not be processed")]
    DiscoveryFailed { count: usize },

    #[error("main file '{0}' was not found among the discovered sources")]
    RootNotFound(String),

    #[error("'{file}' requires '{dependency}', which does not match any discovered source")]
    UnresolvedDependency { file: String, dependency: String },

    #[error("cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("minification failed: {0}")]
    Minify(String),
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
