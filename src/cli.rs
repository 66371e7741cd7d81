//! Command-line interface for codeanalyzer-go.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;
use crate::model::{AnalysisLevel, CallGraphAlgorithm, PositionMode};
use crate::report::{self, Destination};
use crate::runner::Runner;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ERROR: i32 = 2;

/// Static analyzer for Go projects.
///
/// Emits a JSON document with the symbol table (packages, types,
/// functions, methods, variables, constants) and, on request, a call graph
/// built with class hierarchy analysis or rapid type analysis.
#[derive(Parser, Debug)]
#[command(name = "codeanalyzer-go")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Root directory of the Go project [default: .]
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Deprecated: use --input
    #[arg(long, hide = true)]
    pub root: Option<PathBuf>,

    /// Analysis level: symbol_table, call_graph, or full [default: symbol_table]
    #[arg(short = 'a', long)]
    pub analysis_level: Option<String>,

    /// Deprecated: use --analysis-level (symbol-table, call-graph, full)
    #[arg(long, hide = true)]
    pub mode: Option<String>,

    /// Call graph algorithm: cha or rta
    #[arg(long = "cg", default_value = "rta")]
    pub call_graph: String,

    /// Scan function bodies and attach call examples to callables
    #[arg(long)]
    pub include_body: bool,

    /// Include _test.go files
    #[arg(long)]
    pub include_test: bool,

    /// Directory names to skip, comma separated
    #[arg(long, value_delimiter = ',')]
    pub exclude_dirs: Vec<String>,

    /// Keep only packages whose import path contains one of these, comma separated
    #[arg(long = "only-pkg", value_delimiter = ',')]
    pub only_pkg: Vec<String>,

    /// Position detail: none, minimal, or detailed
    #[arg(long, default_value = "detailed")]
    pub emit_positions: String,

    /// Emit the compact schema
    #[arg(long)]
    pub compact: bool,

    /// Write <DIR>/analysis.json instead of printing to stdout
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

/// Fully validated options for one run.
#[derive(Debug)]
pub struct Invocation {
    pub root: PathBuf,
    pub level: AnalysisLevel,
    pub algorithm: CallGraphAlgorithm,
    pub positions: PositionMode,
    pub compact: bool,
    pub destination: Destination,
}

impl Cli {
    /// Deprecation notices for the legacy flags that were used.
    pub fn deprecations(&self) -> Vec<&'static str> {
        let mut notices = Vec::new();
        if self.root.is_some() {
            notices.push("--root is deprecated, use --input (-i)");
        }
        if self.mode.is_some() {
            notices.push("--mode is deprecated, use --analysis-level (-a)");
        }
        notices
    }

    /// Validate every option. Primary flags win over their deprecated forms.
    pub fn invocation(&self) -> Result<Invocation, AnalyzerError> {
        let root = self
            .input
            .clone()
            .or_else(|| self.root.clone())
            .unwrap_or_else(|| PathBuf::from("."));

        let level = match (&self.analysis_level, &self.mode) {
            (Some(level), _) => level.parse::<AnalysisLevel>()?,
            (None, Some(mode)) => AnalysisLevel::from_legacy_mode(mode)?,
            (None, None) => AnalysisLevel::SymbolTable,
        };

        Ok(Invocation {
            root,
            level,
            algorithm: self.call_graph.parse()?,
            positions: self.emit_positions.parse()?,
            compact: self.compact,
            destination: Destination::from_output_dir(self.output.as_deref()),
        })
    }

    /// Config file values with the command-line flags merged on top.
    pub fn load_config(&self, root: &Path) -> Result<AnalyzerConfig, AnalyzerError> {
        let config = AnalyzerConfig::load(self.config.as_deref(), root)?;
        Ok(config.merge_flags(self.include_test, &self.exclude_dirs, &self.only_pkg))
    }
}

/// Run the analyzer. Nothing is written unless the whole run succeeds.
pub fn run(cli: &Cli) -> Result<i32, AnalyzerError> {
    for notice in cli.deprecations() {
        eprintln!("Warning: {}", notice);
    }

    let invocation = cli.invocation()?;
    let config = cli.load_config(&invocation.root)?;

    let output = Runner::new()
        .level(invocation.level)
        .algorithm(invocation.algorithm)
        .include_body(cli.include_body)
        .positions(invocation.positions)
        .config(config)
        .run(&invocation.root)?;

    let json = report::render(&output, invocation.compact)?;
    report::write(&json, &invocation.destination)?;

    Ok(EXIT_SUCCESS)
}
