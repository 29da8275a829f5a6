//! Build pipeline
//!
//! `discover -> resolve main -> order dependencies -> compile -> write`. Discovery walks the
//! source directory once; every compile mode requested by a [`BuildMode`] reuses the same
//! resolved tree.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use petgraph::dot::{Config as DotConfig, Dot};
use walkdir::{DirEntry, WalkDir};

use crate::{
    compiler::{CompileMode, ModuleCompiler},
    config::Config,
    dependency_tree::DependencyTree,
    environment::Environment,
    error::{BuildError, BuildResult},
    minifier::{CommandMinifier, Minifier, StripMinifier},
    output_module::OutputModule,
    revision::{GitRevisions, NoRevisions, RevisionProvider},
    source_file::SourceFile,
    source_repository::SourceRepository,
};

/// Which artifacts a build writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BuildMode {
    /// One handler per source file
    #[default]
    Plain,
    /// A single merged and minified handler
    Minified,
    /// Both artifacts from one resolution
    Both,
}

impl BuildMode {
    pub const fn compile_modes(self) -> &'static [CompileMode] {
        match self {
            Self::Plain => &[CompileMode::PerFile],
            Self::Minified => &[CompileMode::Minified],
            Self::Both => &[CompileMode::PerFile, CompileMode::Minified],
        }
    }
}

/// A compiled module and the file name it is saved under
#[derive(Debug)]
pub struct BuildArtifact {
    pub module: OutputModule,
    pub filename: PathBuf,
}

/// Name of the artifact for `mode`; minified builds get `.min` before the extension
pub fn output_filename(base: &str, mode: CompileMode) -> PathBuf {
    let path = Path::new(base);
    match mode {
        CompileMode::PerFile => path.to_path_buf(),
        CompileMode::Minified => match path.extension() {
            Some(extension) => path.with_extension(format!("min.{}", extension.to_string_lossy())),
            None => path.with_extension("min"),
        },
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy() == extension)
}

fn is_excluded(entry: &DirEntry, excluded: &[PathBuf]) -> bool {
    if excluded.is_empty() || !entry.file_type().is_dir() {
        return false;
    }
    let canonical = entry
        .path()
        .canonicalize()
        .unwrap_or_else(|_| entry.path().to_path_buf());
    let skip = excluded.iter().any(|dir| canonical.starts_with(dir));
    if skip {
        debug!("Excluding {}", entry.path().display());
    }
    skip
}

/// Runs builds for one configuration
#[derive(Debug)]
pub struct Builder {
    config: Config,
    environment: Environment,
    revisions: Box<dyn RevisionProvider>,
    minifier: Box<dyn Minifier>,
    graph_output: Option<PathBuf>,
}

impl Builder {
    /// Pick collaborators from the configuration: git revisions unless disabled, and the
    /// configured minifier command or the built-in stripper
    pub fn new(config: Config, environment: Environment) -> Self {
        let revisions: Box<dyn RevisionProvider> = if config.git {
            Box::new(GitRevisions::new())
        } else {
            Box::new(NoRevisions)
        };
        let minifier: Box<dyn Minifier> = match config
            .minify_command
            .as_deref()
            .and_then(CommandMinifier::from_command_line)
        {
            Some(command) => Box::new(command),
            None => Box::new(StripMinifier),
        };

        Self {
            config,
            environment,
            revisions,
            minifier,
            graph_output: None,
        }
    }

    #[must_use]
    pub fn with_revisions(mut self, revisions: Box<dyn RevisionProvider>) -> Self {
        self.revisions = revisions;
        self
    }

    #[must_use]
    pub fn with_minifier(mut self, minifier: Box<dyn Minifier>) -> Self {
        self.minifier = minifier;
        self
    }

    /// Also write the resolved dependency graph as Graphviz DOT to `path`
    #[must_use]
    pub fn with_graph_output(mut self, path: Option<PathBuf>) -> Self {
        self.graph_output = path;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// File name of the main source, looked up in the repository
    pub fn main_name(&self) -> String {
        self.config
            .main_file
            .as_deref()
            .and_then(Path::file_name)
            .map_or_else(
                || format!("main.{}", self.config.extension),
                |name| name.to_string_lossy().into_owned(),
            )
    }

    /// Scan the source directory into a repository
    ///
    /// Parse and duplicate-name errors are logged per file. In strict mode the scan still
    /// finishes before failing with [`BuildError::DiscoveryFailed`]; otherwise broken files are
    /// left out.
    pub fn discover(&self) -> BuildResult<SourceRepository> {
        let source_dir = &self.config.source_dir;
        if !source_dir.is_dir() {
            return Err(BuildError::SourceDirectoryNotFound(source_dir.clone()));
        }

        let excluded: Vec<PathBuf> = self
            .config
            .exclude
            .iter()
            .map(|dir| dir.canonicalize().unwrap_or_else(|_| dir.clone()))
            .collect();

        let mut repository = SourceRepository::with_extension(self.config.extension.as_str());
        let mut failures = 0;

        let walker = WalkDir::new(source_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_excluded(entry, &excluded));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {e}");
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || !has_extension(path, &self.config.extension) {
                continue;
            }

            let revision = self.revisions.revision(path);
            match SourceFile::load(path, revision).and_then(|file| repository.add(file)) {
                Ok(()) => debug!("Discovered {}", path.display()),
                Err(e) => {
                    error!("{e}");
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            if self.config.strict {
                return Err(BuildError::DiscoveryFailed { count: failures });
            }
            warn!("Skipped {failures} source file(s) that could not be processed");
        }

        info!(
            "Discovered {} source file(s) in {}",
            repository.len(),
            source_dir.display()
        );
        Ok(repository)
    }

    /// Discover, then resolve the main file's dependency tree and hand it to `f`
    fn with_resolved<T>(
        &self,
        f: impl FnOnce(&DependencyTree<'_>, &SourceFile) -> Result<T>,
    ) -> Result<T> {
        let repository = self.discover()?;
        let main_name = self.main_name();
        let main = repository
            .get_by_filename(&main_name)
            .ok_or(BuildError::RootNotFound(main_name))?;

        let mut tree = DependencyTree::new(&repository);
        tree.add(main)?;
        info!(
            "Resolved {} source file(s) required by {}",
            tree.len(),
            main.name()
        );

        f(&tree, main)
    }

    fn compile(
        &self,
        tree: &DependencyTree<'_>,
        main: &SourceFile,
        mode: CompileMode,
    ) -> Result<BuildArtifact> {
        let module = ModuleCompiler::new(&self.environment, self.minifier.as_ref())
            .compile(tree, main, mode)?;
        let base = main.out_filename().unwrap_or(&self.config.default_output);
        Ok(BuildArtifact {
            module,
            filename: output_filename(base, mode),
        })
    }

    /// Compile one artifact without writing it
    pub fn build(&self, mode: CompileMode) -> Result<BuildArtifact> {
        self.with_resolved(|tree, main| self.compile(tree, main, mode))
    }

    /// Compile and write every artifact `mode` asks for, returning the written paths
    pub fn build_and_save(&self, mode: BuildMode) -> Result<Vec<PathBuf>> {
        self.with_resolved(|tree, main| {
            if let Some(path) = &self.graph_output {
                self.write_graph(tree, path)?;
            }

            let mut written = Vec::with_capacity(mode.compile_modes().len());
            for &compile_mode in mode.compile_modes() {
                let artifact = self.compile(tree, main, compile_mode)?;
                written.push(self.save(&artifact.module, &artifact.filename)?);
            }
            Ok(written)
        })
    }

    /// Serialize `module` into the output directory, creating it when missing
    pub fn save(&self, module: &OutputModule, filename: &Path) -> Result<PathBuf> {
        let output_dir = &self.config.output_dir;
        fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create output directory {}", output_dir.display())
        })?;

        let json = module
            .to_json()
            .context("Failed to serialize output module")?;
        let path = output_dir.join(filename);
        fs::write(&path, &json)
            .with_context(|| format!("Failed to write output file {}", path.display()))?;

        info!(
            "Wrote {} handlers ({} characters) to {}",
            module.len(),
            json.len(),
            path.display()
        );
        Ok(path)
    }

    fn write_graph(&self, tree: &DependencyTree<'_>, path: &Path) -> Result<()> {
        let graph = tree.to_graph().map(|_, name| *name, |_, _| "");
        let dot = format!("{}", Dot::with_config(&graph, &[DotConfig::EdgeNoLabel]));
        fs::write(path, dot)
            .with_context(|| format!("Failed to write dependency graph {}", path.display()))?;
        info!("Wrote dependency graph to {}", path.display());
        Ok(())
    }
}
