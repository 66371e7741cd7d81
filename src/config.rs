//! Analyzer configuration file.
//!
//! A YAML file that presets discovery and enrichment options for a
//! project. Command-line flags are merged on top of it.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::AnalyzerError;

/// Config file names searched for in the input root.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["codeanalyzer.yaml", ".codeanalyzer.yaml"];

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AnalyzerConfig {
    /// Whether to include `_test.go` files (default: false)
    #[serde(default)]
    pub include_test_files: Option<bool>,
    /// Directory basenames skipped during discovery (e.g., "gen", "mocks")
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
    /// Glob patterns for root-relative paths to skip (e.g., "**/zz_generated*.go")
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    /// Keep only packages whose import path contains one of these substrings
    #[serde(default)]
    pub only_packages: Vec<String>,
    /// Upper bound on call examples recorded per callable
    #[serde(default)]
    pub max_call_examples: Option<usize>,
}

impl AnalyzerConfig {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, AnalyzerError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| AnalyzerError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: AnalyzerConfig =
            serde_yaml::from_str(&content).map_err(|e| AnalyzerError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.exclusion_set().map_err(|message| AnalyzerError::Config {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(config)
    }

    /// Find a config file for `root`: the root itself first, then the
    /// user config directory.
    pub fn discover(root: &Path) -> Option<PathBuf> {
        let in_root = DEFAULT_CONFIG_NAMES
            .iter()
            .map(|name| root.join(name))
            .find(|p| p.is_file());
        in_root.or_else(|| {
            directories::ProjectDirs::from("", "", "codeanalyzer-go")
                .map(|d| d.config_dir().join(DEFAULT_CONFIG_NAMES[0]))
                .filter(|p| p.is_file())
        })
    }

    /// Load the explicit config, or a discovered one, or defaults.
    pub fn load(explicit: Option<&Path>, root: &Path) -> Result<Self, AnalyzerError> {
        match explicit {
            Some(path) => Self::parse_file(path),
            None => match Self::discover(root) {
                Some(path) => {
                    tracing::debug!(config = %path.display(), "using discovered config");
                    Self::parse_file(path)
                }
                None => Ok(Self::default()),
            },
        }
    }

    /// Returns whether to include test files (defaults to false).
    pub fn should_include_test_files(&self) -> bool {
        self.include_test_files.unwrap_or(false)
    }

    /// Merge command-line values on top of the file values.
    pub fn merge_flags(
        mut self,
        include_test: bool,
        exclude_dirs: &[String],
        only_packages: &[String],
    ) -> Self {
        if include_test {
            self.include_test_files = Some(true);
        }
        for dir in exclude_dirs {
            if !self.exclude_dirs.contains(dir) {
                self.exclude_dirs.push(dir.clone());
            }
        }
        for pkg in only_packages {
            if !self.only_packages.contains(pkg) {
                self.only_packages.push(pkg.clone());
            }
        }
        self
    }

    /// Compile `excluded_paths` into a single matcher.
    pub fn exclusion_set(&self) -> Result<GlobSet, String> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.excluded_paths {
            let glob = Glob::new(pattern).map_err(|e| format!("bad glob {:?}: {}", pattern, e))?;
            builder.add(glob);
        }
        builder.build().map_err(|e| e.to_string())
    }

    /// Whether an import path passes the `only_packages` filter.
    pub fn package_selected(&self, import_path: &str) -> bool {
        self.only_packages.is_empty()
            || self
                .only_packages
                .iter()
                .any(|s| !s.is_empty() && import_path.contains(s.as_str()))
    }
}
