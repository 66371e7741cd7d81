//! Source ingestion: discover files, group them into packages, parse.
//!
//! Discovery is a single walk of the input root. Parsing runs one rayon
//! task per package directory; each task returns its own packages and
//! issues, and the results are merged on the calling thread in import-path
//! order.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use globset::GlobSet;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::analysis::{FileFacts, LanguageAnalyzer};
use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;
use crate::model::Severity;

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &["vendor", "testdata", "node_modules"];

/// A module rooted at a `go.mod` file.
#[derive(Debug, Clone)]
pub struct Module {
    /// Directory relative to the input root (empty for the root).
    pub dir: String,
    pub path: String,
    pub go_version: Option<String>,
}

/// A parsed package ready for symbol extraction.
#[derive(Debug, Clone)]
pub struct SourcePackage {
    pub path: String,
    pub name: String,
    /// Directory relative to the input root (empty for the root).
    pub dir: String,
    /// Successfully parsed files, sorted by path.
    pub files: Vec<FileFacts>,
}

/// A non-fatal problem found while loading.
#[derive(Debug, Clone)]
pub struct LoadIssue {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub file: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

/// Everything ingestion produced for one run.
#[derive(Debug, Clone)]
pub struct Program {
    pub root: PathBuf,
    pub modules: Vec<Module>,
    /// Sorted by import path.
    pub packages: Vec<SourcePackage>,
    pub issues: Vec<LoadIssue>,
}

impl Program {
    /// Toolchain version declared by the root-most module.
    pub fn go_version(&self) -> &str {
        self.modules
            .iter()
            .min_by_key(|m| (m.dir.matches('/').count(), m.dir.len()))
            .and_then(|m| m.go_version.as_deref())
            .unwrap_or("unknown")
    }

    pub fn package(&self, path: &str) -> Option<&SourcePackage> {
        self.packages.iter().find(|p| p.path == path)
    }
}

/// Files of one directory awaiting parsing.
struct PackageJob {
    dir: String,
    base_path: String,
    files: Vec<PathBuf>,
}

/// Load every package under `root`.
pub fn load(
    root: &Path,
    config: &AnalyzerConfig,
    analyzer: &dyn LanguageAnalyzer,
) -> Result<Program, AnalyzerError> {
    let excluded = config.exclusion_set().map_err(|message| AnalyzerError::Config {
        path: root.to_path_buf(),
        message,
    })?;
    let (dirs, mod_files) = discover(root, config, &excluded, analyzer)?;
    let modules: Vec<Module> = mod_files
        .iter()
        .filter_map(|p| parse_go_mod(root, p))
        .collect();

    let jobs: Vec<PackageJob> = dirs
        .into_iter()
        .map(|(dir, files)| PackageJob {
            base_path: base_import_path(&dir, &modules),
            dir,
            files,
        })
        .collect();

    info!(packages = jobs.len(), modules = modules.len(), "discovered source directories");

    let loaded: Vec<(Vec<SourcePackage>, Vec<LoadIssue>)> = jobs
        .par_iter()
        .map(|job| load_package(root, job, analyzer))
        .collect();

    let mut packages = Vec::new();
    let mut issues = Vec::new();
    for (pkgs, pkg_issues) in loaded {
        packages.extend(pkgs.into_iter().filter(|p| config.package_selected(&p.path)));
        issues.extend(pkg_issues);
    }
    separate_colliding_paths(&mut packages, &mut issues);
    packages.sort_by(|a, b| a.path.cmp(&b.path));
    issues.sort_by(|a, b| (&a.file, a.line, a.column).cmp(&(&b.file, b.line, b.column)));

    for issue in &issues {
        warn!(code = issue.code, file = %issue.file, "{}", issue.message);
    }

    Ok(Program {
        root: root.to_path_buf(),
        modules,
        packages,
        issues,
    })
}

/// Walk the tree, returning source files grouped by directory and the
/// `go.mod` files found along the way.
fn discover(
    root: &Path,
    config: &AnalyzerConfig,
    excluded: &GlobSet,
    analyzer: &dyn LanguageAnalyzer,
) -> Result<(BTreeMap<String, Vec<PathBuf>>, Vec<PathBuf>), AnalyzerError> {
    let include_tests = config.should_include_test_files();
    let mut dirs: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    let mut mod_files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            // Hidden and underscore directories are ignored by the Go tool
            if name.starts_with('.') || name.starts_with('_') {
                return false;
            }
            !SKIPPED_DIRS.contains(&name.as_ref()) && !config.exclude_dirs.iter().any(|d| *d == name)
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let name = entry.file_name().to_string_lossy();
        if name == "go.mod" {
            mod_files.push(path.to_path_buf());
            continue;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !analyzer.handles_extension(ext) {
            continue;
        }
        if !include_tests && analyzer.is_test_file(&name) {
            continue;
        }
        let rel = relative_path(root, path);
        if excluded.is_match(&rel) {
            debug!(file = %rel, "excluded by config");
            continue;
        }

        let dir = path
            .parent()
            .map(|p| relative_path(root, p))
            .unwrap_or_default();
        dirs.entry(dir).or_default().push(path.to_path_buf());
    }

    Ok((dirs, mod_files))
}

/// Read the module path and `go` directive from a `go.mod` file.
fn parse_go_mod(root: &Path, path: &Path) -> Option<Module> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(file = %path.display(), "cannot read go.mod: {}", e);
            return None;
        }
    };

    let mut module_path = None;
    let mut go_version = None;
    for line in content.lines() {
        let line = line.split("//").next().unwrap_or("").trim();
        if let Some(rest) = line.strip_prefix("module ") {
            module_path = Some(rest.trim().trim_matches('"').to_string());
        } else if let Some(rest) = line.strip_prefix("go ") {
            go_version = Some(rest.trim().to_string());
        }
    }

    Some(Module {
        dir: path
            .parent()
            .map(|p| relative_path(root, p))
            .unwrap_or_default(),
        path: module_path?,
        go_version,
    })
}

/// Import path for a directory from its nearest enclosing module. Empty
/// when no module encloses the root directory.
fn base_import_path(dir: &str, modules: &[Module]) -> String {
    let enclosing = modules
        .iter()
        .filter(|m| m.dir.is_empty() || dir == m.dir || dir.starts_with(&format!("{}/", m.dir)))
        .max_by_key(|m| m.dir.len());

    match enclosing {
        Some(m) => {
            let rest = dir[m.dir.len()..].trim_start_matches('/');
            if rest.is_empty() {
                m.path.clone()
            } else {
                format!("{}/{}", m.path, rest)
            }
        }
        None => dir.to_string(),
    }
}

/// Parse one directory. A directory yields its package and, when test
/// files are included, its external `_test` package.
fn load_package(
    root: &Path,
    job: &PackageJob,
    analyzer: &dyn LanguageAnalyzer,
) -> (Vec<SourcePackage>, Vec<LoadIssue>) {
    let mut issues = Vec::new();
    let mut parsed: Vec<FileFacts> = Vec::new();

    for path in &job.files {
        let rel = relative_path(root, path);
        let source = match fs::read(path) {
            Ok(s) => s,
            Err(e) => {
                issues.push(LoadIssue {
                    severity: Severity::Error,
                    code: "READ_ERROR",
                    message: format!("cannot read {}: {}", rel, e),
                    file: rel,
                    line: None,
                    column: None,
                });
                continue;
            }
        };

        let facts = analyzer
            .parse(path, &source)
            .and_then(|tree| analyzer.extract_facts(&tree));
        let mut facts = match facts {
            Ok(f) => f,
            Err(e) => {
                issues.push(LoadIssue {
                    severity: Severity::Error,
                    code: "PARSE_ERROR",
                    message: format!("{}: {}", rel, e),
                    file: rel,
                    line: None,
                    column: None,
                });
                continue;
            }
        };
        facts.path = rel.clone();

        if let Some(err) = &facts.parse_error {
            issues.push(LoadIssue {
                severity: Severity::Error,
                code: "PARSE_ERROR",
                message: format!("{}:{}:{}: {}", rel, err.line, err.col, err.message),
                file: rel,
                line: Some(err.line),
                column: Some(err.col),
            });
            continue;
        }
        if facts.build_ignored {
            debug!(file = %rel, "skipping file excluded by build constraint");
            continue;
        }
        if facts.package.is_none() {
            issues.push(LoadIssue {
                severity: Severity::Error,
                code: "PARSE_ERROR",
                message: format!("{}: missing package clause", rel),
                file: rel,
                line: Some(1),
                column: Some(1),
            });
            continue;
        }
        parsed.push(facts);
    }

    parsed.sort_by(|a, b| a.path.cmp(&b.path));

    // The directory's package is named by its first non-external-test file.
    let primary = parsed
        .iter()
        .filter_map(|f| f.package.as_deref())
        .find(|name| !name.ends_with("_test"))
        .or_else(|| parsed.first().and_then(|f| f.package.as_deref()))
        .map(str::to_string);
    let Some(primary) = primary else {
        return (Vec::new(), issues);
    };
    let external_test = format!("{}_test", primary);

    let mut main_files = Vec::new();
    let mut test_files = Vec::new();
    for facts in parsed {
        let name = facts.package.as_deref().unwrap_or("");
        if name == primary {
            main_files.push(facts);
        } else if name == external_test && analyzer.is_test_file(&file_name(&facts.path)) {
            test_files.push(facts);
        } else {
            issues.push(LoadIssue {
                severity: Severity::Warning,
                code: "PACKAGE_MISMATCH",
                message: format!(
                    "{} declares package {} but directory {} holds package {}",
                    facts.path,
                    name,
                    display_dir(&job.dir),
                    primary
                ),
                file: facts.path.clone(),
                line: Some(1),
                column: Some(1),
            });
        }
    }

    let path = if job.base_path.is_empty() {
        primary.clone()
    } else {
        job.base_path.clone()
    };

    let mut packages = Vec::new();
    if !main_files.is_empty() {
        debug!(package = %path, files = main_files.len(), "parsed package");
        packages.push(SourcePackage {
            path: path.clone(),
            name: primary.clone(),
            dir: job.dir.clone(),
            files: main_files,
        });
    }
    if !test_files.is_empty() {
        packages.push(SourcePackage {
            path: format!("{}_test", path),
            name: external_test,
            dir: job.dir.clone(),
            files: test_files,
        });
    }

    (packages, issues)
}

/// Give every package a distinct import path.
///
/// Without a module the root package is named by its package clause, which
/// can clash with a subdirectory of the same name. The package from the
/// deepest directory keeps the path; the others move to `_/<dir>` (`_`
/// for the root), as the Go tool does for packages outside any module.
fn separate_colliding_paths(packages: &mut [SourcePackage], issues: &mut Vec<LoadIssue>) {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, pkg) in packages.iter().enumerate() {
        groups.entry(pkg.path.clone()).or_default().push(i);
    }

    for (path, mut members) in groups.into_iter().filter(|(_, m)| m.len() > 1) {
        members.sort_by(|&a, &b| {
            (packages[b].dir.len(), &packages[a].dir).cmp(&(packages[a].dir.len(), &packages[b].dir))
        });
        let kept_dir = packages[members[0]].dir.clone();

        for &i in &members[1..] {
            let pkg = &mut packages[i];
            let mut local = if pkg.dir.is_empty() {
                "_".to_string()
            } else {
                format!("_/{}", pkg.dir)
            };
            if pkg.name.ends_with("_test") {
                local.push_str("_test");
            }
            issues.push(LoadIssue {
                severity: Severity::Warning,
                code: "PATH_COLLISION",
                message: format!(
                    "package {} in {} shares import path {} with {}; using {}",
                    pkg.name,
                    display_dir(&pkg.dir),
                    path,
                    display_dir(&kept_dir),
                    local
                ),
                file: pkg.files.first().map(|f| f.path.clone()).unwrap_or_default(),
                line: Some(1),
                column: Some(1),
            });
            pkg.path = local;
        }
    }
}

/// Root-relative path with forward slashes.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn file_name(rel: &str) -> String {
    rel.rsplit('/').next().unwrap_or(rel).to_string()
}

fn display_dir(dir: &str) -> &str {
    if dir.is_empty() {
        "."
    } else {
        dir
    }
}
