//! Configuration for the repolens command-line tool
//!
//! This module provides the command-line surface, including the working-copy
//! directory, backend selection, per-command options and logging flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use repolens_git::{BackendKind, RepositoryReference};
use repolens_tree::{DEFAULT_MAX_DEPTH, ScanOptions};

use crate::context::{DEFAULT_MAX_DIFF_LINES, DigestLimits};
use crate::pipeline::{AnalysisRequest, Cancellation, DEFAULT_MAX_COMMITS, DEFAULT_MAX_FILE_SIZE_KB};

/// repolens - repository context extraction for summarization
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "repolens")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Directory that holds cloned working copies
    ///
    /// Defaults to the platform cache directory, e.g. ~/.cache/repolens/repos.
    #[arg(long, env = "REPOLENS_WORK_DIR", global = true)]
    pub work_dir: Option<PathBuf>,

    /// Version-control backend: git2 (in-process) or cli (git executable)
    #[arg(long, env = "REPOLENS_BACKEND", default_value = "git2", global = true)]
    pub backend: BackendKind,

    /// Enable verbose logging (debug level)
    ///
    /// Logs are written to stderr so they never mix with the digest.
    #[arg(short, long, default_value = "false", global = true)]
    pub verbose: bool,

    /// Quiet mode - suppress info-level logs
    ///
    /// Only errors and warnings will be logged.
    #[arg(short, long, default_value = "false", global = true)]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Analyze a repository and print its digest
    ///
    /// Example:
    ///   repolens analyze https://github.com/Rbfinch/repolens.git --max-commits 5
    Analyze(AnalyzeArgs),

    /// Scan a directory and print its project structure
    Scan(ScanArgs),
}

/// Output format for the analyze command
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// The Markdown digest
    #[default]
    Markdown,
    /// The full analysis as JSON
    Json,
}

/// Options for `repolens analyze`
#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Repository URL or local path
    pub repository: String,

    /// Number of recent commits to read
    #[arg(long, default_value_t = DEFAULT_MAX_COMMITS)]
    pub max_commits: usize,

    /// Files larger than this many kilobytes are listed without content
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE_KB)]
    pub max_file_size_kb: u64,

    /// Ignore paths containing PATTERN (repeatable; replaces the defaults)
    #[arg(long = "ignore", value_name = "PATTERN")]
    pub ignore: Vec<String>,

    /// Analyze this commit instead of HEAD
    #[arg(long)]
    pub commit: Option<String>,

    /// Use or create the working copy at this path
    #[arg(long)]
    pub local_path: Option<PathBuf>,

    /// Capture file content in the tree (JSON output only)
    #[arg(long, default_value = "false")]
    pub include_content: bool,

    /// Keep a cloned working copy after the analysis
    #[arg(long, default_value = "false")]
    pub keep: bool,

    /// Give up after this many seconds (checked between stages)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Diff lines kept per changed file in the digest
    #[arg(long, default_value_t = DEFAULT_MAX_DIFF_LINES)]
    pub max_diff_lines: usize,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    pub format: OutputFormat,

    /// Write output to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Options for `repolens scan`
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Directory to scan
    pub path: PathBuf,

    /// Ignore paths containing PATTERN (repeatable; replaces the defaults)
    #[arg(long = "ignore", value_name = "PATTERN")]
    pub ignore: Vec<String>,

    /// Deepest directory level listed
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,

    /// Print the full tree as JSON instead of the structure summary
    #[arg(long, default_value = "false")]
    pub json: bool,
}

impl Config {
    /// Get the working-copy directory, using a default if not specified
    ///
    /// Default location is platform-specific:
    /// - macOS: ~/Library/Caches/repolens/repos
    /// - Linux: ~/.cache/repolens/repos
    /// - Windows: %LOCALAPPDATA%\repolens\repos
    #[must_use]
    pub fn work_dir_path(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("repolens")
                .join("repos")
        })
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The working-copy directory exists but is not a directory
    /// - `analyze` is given a zero timeout
    /// - `scan` is given a path that does not exist or is not a directory
    pub fn validate(&self) -> Result<(), ConfigError> {
        let work_dir = self.work_dir_path();
        if work_dir.exists() && !work_dir.is_dir() {
            return Err(ConfigError::WorkDirNotDirectory(work_dir));
        }

        match &self.command {
            Some(Command::Analyze(args)) => {
                if args.timeout == Some(0) {
                    return Err(ConfigError::InvalidTimeout);
                }
            }
            Some(Command::Scan(args)) => validate_scan_path(&args.path)?,
            None => {}
        }
        Ok(())
    }

    /// Get the log level based on verbose/quiet flags
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }
}

fn validate_scan_path(path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ScanPathNotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(ConfigError::ScanPathNotDirectory(path.to_path_buf()));
    }
    Ok(())
}

impl AnalyzeArgs {
    /// Build the pipeline request for these options
    #[must_use]
    pub fn to_request(&self) -> AnalysisRequest {
        let mut reference = RepositoryReference::new(&self.repository);
        if let Some(commit) = &self.commit {
            reference = reference.with_commit(commit);
        }
        if let Some(path) = &self.local_path {
            reference = reference.with_local_path(path);
        }

        let mut request = AnalysisRequest::new(reference)
            .with_max_commits(self.max_commits)
            .with_max_file_size_kb(Some(self.max_file_size_kb))
            .with_digest_limits(DigestLimits {
                max_commits: self.max_commits,
                max_diff_lines: self.max_diff_lines,
            });
        if !self.ignore.is_empty() {
            request = request.with_ignore_patterns(self.ignore.iter().cloned());
        }
        if self.include_content {
            request = request.with_content();
        }
        if self.keep {
            request = request.keep_working_copy();
        }
        request
    }

    /// Cancellation token honoring `--timeout`
    #[must_use]
    pub fn cancellation(&self) -> Cancellation {
        match self.timeout {
            Some(secs) => Cancellation::new().with_timeout(Duration::from_secs(secs)),
            None => Cancellation::new(),
        }
    }
}

impl ScanArgs {
    /// Scanner options for these arguments
    #[must_use]
    pub fn scan_options(&self) -> ScanOptions {
        let options = ScanOptions::default().with_max_depth(self.max_depth);
        if self.ignore.is_empty() {
            options
        } else {
            options.with_ignore_patterns(self.ignore.iter().cloned())
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Working-copy directory path is a file
    #[error("Working-copy directory is not a directory: {0}")]
    WorkDirNotDirectory(PathBuf),

    /// Timeout of zero seconds
    #[error("Timeout must be at least one second")]
    InvalidTimeout,

    /// Scan path not found
    #[error("Scan path not found: {0}")]
    ScanPathNotFound(PathBuf),

    /// Scan path is not a directory
    #[error("Scan path is not a directory: {0}")]
    ScanPathNotDirectory(PathBuf),
}
