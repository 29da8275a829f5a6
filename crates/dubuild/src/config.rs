//! Build configuration
//!
//! Configuration is read from the first of:
//!
//! 1. the file passed with `--config`,
//! 2. `dubuild.toml` in the working directory,
//! 3. `dubuild.toml` in the user configuration directory,
//!
//! falling back to defaults when none exists. Command-line flags are applied on top by the
//! binary. Relative paths inside a file are resolved against that file's directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;

use crate::dirs;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory scanned recursively for sources
    pub source_dir: PathBuf,
    /// Entry file; only its file name is used for the lookup
    pub main_file: Option<PathBuf>,
    /// Directory the artifacts are written to
    pub output_dir: PathBuf,
    /// Directories skipped during discovery
    pub exclude: Vec<PathBuf>,
    /// Abort when any source fails to parse
    pub strict: bool,
    /// Look up per-file revisions with git
    pub git: bool,
    /// Extension of source files, without the dot
    pub extension: String,
    /// Artifact name when the main file declares none
    pub default_output: String,
    /// External minifier command line; the built-in one is used when unset
    pub minify_command: Option<Vec<String>>,
    /// Extra placeholder values, layered over the process environment
    pub env: IndexMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            main_file: None,
            output_dir: PathBuf::from("out"),
            exclude: Vec::new(),
            strict: true,
            git: true,
            extension: "lua".to_owned(),
            default_output: "out.json".to_owned(),
            minify_command: None,
            env: IndexMap::new(),
        }
    }
}

impl Config {
    /// Load configuration following the lookup order described in the module docs
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let local = Path::new(dirs::CONFIG_FILE_NAME);
        if local.is_file() {
            return Self::from_file(local);
        }

        if let Some(user) = dirs::user_config_file()
            && user.is_file()
        {
            return Self::from_file(&user);
        }

        debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Parse a TOML file, resolving relative paths against its directory
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        debug!("Loaded configuration from {}", path.display());

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.rebased(base))
    }

    fn rebased(mut self, base: &Path) -> Self {
        let rebase = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        rebase(&mut self.source_dir);
        rebase(&mut self.output_dir);
        if let Some(main_file) = self.main_file.as_mut() {
            rebase(main_file);
        }
        for excluded in &mut self.exclude {
            rebase(excluded);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.strict);
        assert!(config.git);
        assert_eq!(config.extension, "lua");
        assert_eq!(config.default_output, "out.json");
        assert_eq!(config.minify_command, None);
    }

    #[test]
    fn test_file_values_and_rebasing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dubuild.toml");
        std::fs::write(
            &path,
            r#"
source_dir = "src"
main_file = "src/main.lua"
output_dir = "/tmp/dubuild-out"
exclude = ["src/vendor"]
strict = false
minify_command = ["luamin", "--stdin"]

[env]
BUILD_NAME = "radar"
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.source_dir, dir.path().join("src"));
        assert_eq!(config.main_file, Some(dir.path().join("src/main.lua")));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/dubuild-out"));
        assert_eq!(config.exclude, vec![dir.path().join("src/vendor")]);
        assert!(!config.strict);
        assert!(config.git);
        assert_eq!(
            config.minify_command,
            Some(vec!["luamin".to_owned(), "--stdin".to_owned()])
        );
        assert_eq!(config.env.get("BUILD_NAME").map(String::as_str), Some("radar"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dubuild.toml");
        std::fs::write(&path, "sorce_dir = \"src\"\n").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }

    #[test]
    #[serial]
    fn test_user_config_is_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dubuild.toml"), "git = false\n").unwrap();

        // SAFETY: serialized with every other test that touches the process environment
        unsafe {
            std::env::set_var(dirs::CONFIG_DIR_ENV, dir.path());
        }
        let config = Config::load(None);
        unsafe {
            std::env::remove_var(dirs::CONFIG_DIR_ENV);
        }

        let config = config.unwrap();
        assert!(!config.git);
        assert_eq!(config.source_dir, dir.path().join("."));
    }
}
