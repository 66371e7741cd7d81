//! Analysis runner that orchestrates one run end to end.
//!
//! ```text
//! root ─▶ loader::load ─▶ ProgramIndex ─┬─▶ build_symbol_table
//!                                        └─▶ build_call_graph
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info};

use crate::analysis::get_analyzer_by_id;
use crate::callgraph::build_call_graph;
use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;
use crate::loader::{self, LoadIssue};
use crate::model::{
    AnalysisLevel, AnalysisOutput, CallGraphAlgorithm, Issue, Metadata, Position, PositionMode,
    ANALYZER_NAME, ANALYZER_VERSION,
};
use crate::symbols::{build_symbol_table, ProgramIndex, SymbolOptions};

const LANGUAGE: &str = "go";

/// Executes one analysis over a source tree.
#[derive(Debug, Clone)]
pub struct Runner {
    level: AnalysisLevel,
    algorithm: CallGraphAlgorithm,
    include_body: bool,
    positions: PositionMode,
    config: AnalyzerConfig,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Symbol table only, RTA when a call graph is requested, detailed
    /// positions, no body scanning.
    pub fn new() -> Self {
        Self {
            level: AnalysisLevel::SymbolTable,
            algorithm: CallGraphAlgorithm::Rta,
            include_body: false,
            positions: PositionMode::Detailed,
            config: AnalyzerConfig::default(),
        }
    }

    pub fn level(mut self, level: AnalysisLevel) -> Self {
        self.level = level;
        self
    }

    pub fn algorithm(mut self, algorithm: CallGraphAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Scan function bodies and attach call examples to callables.
    pub fn include_body(mut self, include: bool) -> Self {
        self.include_body = include;
        self
    }

    pub fn positions(mut self, positions: PositionMode) -> Self {
        self.positions = positions;
        self
    }

    pub fn config(mut self, config: AnalyzerConfig) -> Self {
        self.config = config;
        self
    }

    /// Analyze the tree at `root`.
    pub fn run(&self, root: &Path) -> Result<AnalysisOutput, AnalyzerError> {
        let started = Instant::now();
        let root = resolve_root(root)?;
        let analyzer = get_analyzer_by_id(LANGUAGE)
            .ok_or_else(|| AnalyzerError::invalid_option("language", LANGUAGE, "go"))?;

        info!(
            root = %root.display(),
            level = self.level.as_str(),
            algorithm = self.algorithm.as_str(),
            "starting analysis"
        );

        let program = loader::load(&root, &self.config, analyzer)?;
        let index = ProgramIndex::build(&program);
        debug!(
            packages = index.packages.len(),
            callables = index.callables.len(),
            types = index.types.len(),
            "indexed program"
        );

        let symbol_table = self.level.wants_symbol_table().then(|| {
            let options = SymbolOptions {
                positions: self.positions,
                include_body: self.include_body,
                max_call_examples: self.config.max_call_examples,
            };
            build_symbol_table(&index, analyzer, &options)
        });

        let call_graph = if self.level.wants_call_graph() {
            build_call_graph(&index, self.algorithm, self.positions)
        } else {
            None
        };

        let issues = program
            .issues
            .iter()
            .map(|issue| to_issue(issue, self.positions))
            .collect();

        let elapsed = started.elapsed();
        info!(elapsed_ms = elapsed.as_millis() as u64, "analysis complete");

        Ok(AnalysisOutput {
            metadata: Metadata {
                analyzer: ANALYZER_NAME.to_string(),
                version: ANALYZER_VERSION.to_string(),
                language: LANGUAGE.to_string(),
                analysis_level: self.level.as_str().to_string(),
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                project_path: root.display().to_string(),
                go_version: program.go_version().to_string(),
                analysis_duration_ms: elapsed.as_millis() as u64,
            },
            symbol_table,
            call_graph,
            pdg: None,
            sdg: None,
            issues,
        })
    }
}

/// Canonical absolute path of an existing directory.
fn resolve_root(root: &Path) -> Result<PathBuf, AnalyzerError> {
    let canonical = fs::canonicalize(root).map_err(|source| AnalyzerError::Input {
        path: root.to_path_buf(),
        source,
    })?;
    if !canonical.is_dir() {
        return Err(AnalyzerError::NotADirectory(root.to_path_buf()));
    }
    Ok(canonical)
}

/// File-level issues without a line point at the start of the file.
fn to_issue(issue: &LoadIssue, positions: PositionMode) -> Issue {
    Issue {
        severity: issue.severity,
        code: issue.code.to_string(),
        message: issue.message.clone(),
        position: positions.slot(Position {
            file: issue.file.clone(),
            start_line: issue.line.unwrap_or(1),
            start_column: issue.column.unwrap_or(1),
            end_line: None,
            end_column: None,
        }),
    }
}
