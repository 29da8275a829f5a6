//! Index of every discovered source file
//!
//! The repository is append-only: it is filled completely during discovery and only read
//! afterwards, by dependency resolution and compilation.

use log::debug;

use crate::{
    error::{BuildError, BuildResult},
    source_file::SourceFile,
    types::FxIndexMap,
};

/// Source files keyed by file name
#[derive(Debug, Clone)]
pub struct SourceRepository {
    files: FxIndexMap<String, SourceFile>,
    /// Extension tried when a dependency reference omits it
    extension: String,
}

impl Default for SourceRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceRepository {
    pub fn new() -> Self {
        Self::with_extension("lua")
    }

    /// Create a repository whose references may omit the given extension
    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            files: FxIndexMap::default(),
            extension: extension.into(),
        }
    }

    /// Add a file, failing if another file with the same name is already registered
    pub fn add(&mut self, file: SourceFile) -> BuildResult<()> {
        if self.files.contains_key(file.name()) {
            return Err(BuildError::DuplicateSource {
                name: file.name().to_owned(),
                path: file.path().to_path_buf(),
            });
        }
        debug!("Registered source {}", file.name());
        self.files.insert(file.name().to_owned(), file);
        Ok(())
    }

    pub fn get_by_filename(&self, name: &str) -> Option<&SourceFile> {
        self.files.get(name)
    }

    /// Resolve a dependency reference: exact file name first, then with the extension added
    pub fn resolve(&self, reference: &str) -> Option<&SourceFile> {
        self.get_by_filename(reference).or_else(|| {
            self.files
                .get(format!("{reference}.{}", self.extension).as_str())
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files in the order they were added
    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }
}
