//! Parsed Lua source files
//!
//! A source file declares its build metadata through comment directives at the start of a
//! line:
//!
//! ```lua
//! --@require Utils Screen
//! --@timer Refresh
//! --@outFilename controller.json
//! ```
//!
//! Anything else in the file is opaque text that ends up verbatim in the bundle.

use std::{
    ffi::OsStr,
    path::{Component, Path, PathBuf},
};

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    error::{BuildError, BuildResult},
    types::FxIndexSet,
};

static DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*--@(\w+)(.*)$").expect("directive pattern is valid"));

static TIMER_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("timer pattern is valid"));

/// Exactly one normal path component, so the artifact stays inside the output directory
fn is_bare_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// A single Lua file together with the directives it declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    name: String,
    path: PathBuf,
    contents: String,
    dependencies: FxIndexSet<String>,
    timers: Vec<String>,
    out_filename: Option<String>,
    revision: String,
}

impl SourceFile {
    /// Read and parse a file from disk
    pub fn load(path: &Path, revision: impl Into<String>) -> BuildResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| BuildError::SourceParse {
            path: path.to_path_buf(),
            line: 0,
            message: format!("could not read file: {e}"),
        })?;
        let contents = String::from_utf8(bytes).map_err(|_| BuildError::SourceParse {
            path: path.to_path_buf(),
            line: 0,
            message: "file is not valid UTF-8".into(),
        })?;
        Self::parse(path, contents, revision)
    }

    /// Parse already-loaded contents; `path` supplies the file name used as the graph key
    pub fn parse(
        path: impl Into<PathBuf>,
        contents: impl Into<String>,
        revision: impl Into<String>,
    ) -> BuildResult<Self> {
        let path = path.into();
        let contents = contents.into();
        let name = path
            .file_name()
            .and_then(OsStr::to_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| BuildError::SourceParse {
                path: path.clone(),
                line: 0,
                message: "path has no usable file name".into(),
            })?;

        let mut dependencies = FxIndexSet::default();
        let mut timers = Vec::new();
        let mut out_filename = None;

        for (index, line) in contents.lines().enumerate() {
            let Some(captures) = DIRECTIVE.captures(line) else {
                continue;
            };
            let fail = |message: String| BuildError::SourceParse {
                path: path.clone(),
                line: index + 1,
                message,
            };
            let args: Vec<&str> = captures[2].split_whitespace().collect();

            match &captures[1] {
                "require" => {
                    if args.is_empty() {
                        return Err(fail("`--@require` needs at least one file name".into()));
                    }
                    dependencies.extend(args.into_iter().map(ToOwned::to_owned));
                }
                "timer" => {
                    let [timer] = args.as_slice() else {
                        return Err(fail("`--@timer` takes exactly one identifier".into()));
                    };
                    if !TIMER_ID.is_match(timer) {
                        return Err(fail(format!("invalid timer identifier '{timer}'")));
                    }
                    if timers.iter().any(|t| t == timer) {
                        return Err(fail(format!("timer '{timer}' is declared twice")));
                    }
                    timers.push((*timer).to_owned());
                }
                "outFilename" => {
                    let [filename] = args.as_slice() else {
                        return Err(fail("`--@outFilename` takes exactly one file name".into()));
                    };
                    if out_filename.is_some() {
                        return Err(fail("`--@outFilename` is declared more than once".into()));
                    }
                    if !is_bare_file_name(filename) {
                        return Err(fail(format!(
                            "output file name '{filename}' must not contain a directory"
                        )));
                    }
                    out_filename = Some((*filename).to_owned());
                }
                other => return Err(fail(format!("unknown directive '@{other}'"))),
            }
        }

        debug!(
            "Parsed {name}: {} dependencies, {} timers",
            dependencies.len(),
            timers.len()
        );

        Ok(Self {
            name,
            path,
            contents,
            dependencies,
            timers,
            out_filename,
            revision: revision.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Dependency references in declaration order
    pub fn dependencies(&self) -> impl ExactSizeIterator<Item = &str> {
        self.dependencies.iter().map(String::as_str)
    }

    pub fn timers(&self) -> &[String] {
        &self.timers
    }

    pub fn out_filename(&self) -> Option<&str> {
        self.out_filename.as_deref()
    }

    /// Short source-control revision, empty when none was available
    pub fn revision(&self) -> &str {
        &self.revision
    }
}
