//! Configuration types for filedrop
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use crate::generator::GeneratorConfig;
use crate::pipeline::transform::TransformKind;
use clap::{Args, Parser, Subcommand, ValueEnum};
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 256;

/// Minimum queue size
const MIN_QUEUE_SIZE: usize = 1;

/// Default worker count
pub const DEFAULT_WORKERS: usize = 5;

/// Default input extension
pub const DEFAULT_EXTENSION: &str = "txt";

/// Watch a drop directory and process each new file exactly once
#[derive(Parser, Debug, Clone)]
#[command(
    name = "filedrop",
    version,
    about = "Watch a drop directory and process each new file exactly once",
    long_about = "Watches an input directory for new files, transforms each one, and moves the \
                  original and its processed output to a destination directory.\n\n\
                  Progress of every file is tracked in a <stem>.meta sidecar. Failed files keep \
                  their sidecar (status=failed) in the input directory for inspection.",
    after_help = "EXAMPLES:\n    \
        filedrop -i input -o processed\n    \
        filedrop -w 8 --watch-mode poll --poll-interval-ms 500\n    \
        filedrop --transform lowercase --exclude '^draft_'\n    \
        filedrop status -i input\n    \
        filedrop generate -n 5 --interval 0",
    args_conflicts_with_subcommands = true
)]
pub struct CliArgs {
    /// Subcommand (run is the default)
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run: RunArgs,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Watch and process files (default)
    Run(RunArgs),

    /// List sidecar records left in the input directory
    Status {
        /// Input directory
        #[arg(short, long, default_value = "input", value_name = "DIR")]
        input: PathBuf,

        /// Input file extension
        #[arg(long, default_value = DEFAULT_EXTENSION, value_name = "EXT")]
        extension: String,
    },

    /// Create test files in the input directory
    Generate(GenerateArgs),
}

/// Options for watching and processing
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Directory to watch for new files
    #[arg(short, long, default_value = "input", value_name = "DIR")]
    pub input: PathBuf,

    /// Directory that receives processed files
    #[arg(short, long, default_value = "processed", value_name = "DIR")]
    pub output: PathBuf,

    /// Number of worker threads
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKERS, value_name = "NUM")]
    pub workers: usize,

    /// Work queue size (controls memory usage)
    #[arg(long, default_value = "1024", value_name = "NUM")]
    pub queue_size: usize,

    /// Extension of files to process
    #[arg(short = 'e', long, default_value = DEFAULT_EXTENSION, value_name = "EXT")]
    pub extension: String,

    /// How files are detected
    #[arg(long, value_enum, default_value_t = WatchMode::Native)]
    pub watch_mode: WatchMode,

    /// Directory scan interval in poll mode, in milliseconds
    #[arg(long, default_value = "1000", value_name = "MS")]
    pub poll_interval_ms: u64,

    /// Quiet period before a new file is queued, in milliseconds
    #[arg(long, default_value = "250", value_name = "MS")]
    pub debounce_ms: u64,

    /// Content transform to apply
    #[arg(short = 't', long, value_enum, default_value_t = TransformKind::Uppercase)]
    pub transform: TransformKind,

    /// Random delay before each transform, up to this many milliseconds
    #[arg(long, default_value = "0", value_name = "MS")]
    pub max_jitter_ms: u64,

    /// How long to wait for in-flight files on shutdown, in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    pub shutdown_timeout_secs: u64,

    /// Skip filenames matching pattern (can be repeated)
    #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Options for the test file generator
#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Directory to create files in
    #[arg(short, long, default_value = "input", value_name = "DIR")]
    pub input: PathBuf,

    /// Number of files to create
    #[arg(short = 'n', long, default_value = "1", value_name = "NUM",
          value_parser = clap::value_parser!(u32).range(1..))]
    pub count: u32,

    /// Seconds between files; 0 creates them all at once
    #[arg(long, default_value = "2.0", value_name = "SECS")]
    pub interval: f64,

    /// Filename prefix
    #[arg(long, default_value = "test", value_name = "PREFIX")]
    pub prefix: String,

    /// Content prefix; the file counter is appended
    #[arg(long, default_value = "test-content", value_name = "TEXT")]
    pub content: String,

    /// Extension of created files
    #[arg(short = 'e', long, default_value = DEFAULT_EXTENSION, value_name = "EXT")]
    pub extension: String,
}

impl GenerateArgs {
    /// Convert into generator settings
    pub fn into_config(self) -> Result<GeneratorConfig, ConfigError> {
        let extension = normalize_extension(&self.extension)?;
        let interval = if self.interval <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(self.interval).map_err(|e| {
                ConfigError::InvalidInterval {
                    value: self.interval,
                    reason: e.to_string(),
                }
            })?
        };

        Ok(GeneratorConfig {
            dir: self.input,
            count: self.count,
            interval,
            prefix: self.prefix,
            content: self.content,
            extension,
        })
    }
}

/// Where file events come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WatchMode {
    /// OS notifications (inotify, FSEvents, ReadDirectoryChangesW)
    Native,
    /// Periodic directory listing
    Poll,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory watched for new files
    pub input_dir: PathBuf,

    /// Destination for processed pairs
    pub output_dir: PathBuf,

    /// Number of worker threads
    pub worker_count: usize,

    /// Work queue capacity
    pub queue_size: usize,

    /// Input extension without leading dot
    pub extension: String,

    /// Event source
    pub watch_mode: WatchMode,

    /// Directory scan interval in poll mode
    pub poll_interval: Duration,

    /// Quiet period before a path is queued
    pub debounce: Duration,

    /// Built-in transform
    pub transform: TransformKind,

    /// Upper bound of the random pre-transform delay
    pub max_jitter: Duration,

    /// Bounded wait for workers on shutdown
    pub shutdown_timeout: Duration,

    /// Compiled exclude patterns
    pub exclude_patterns: Vec<Regex>,

    /// Show progress indicator
    pub show_progress: bool,
}

impl PipelineConfig {
    /// Configuration with defaults for the given directories
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            worker_count: DEFAULT_WORKERS,
            queue_size: 1024,
            extension: DEFAULT_EXTENSION.to_string(),
            watch_mode: WatchMode::Native,
            poll_interval: Duration::from_millis(1000),
            debounce: Duration::from_millis(250),
            transform: TransformKind::Uppercase,
            max_jitter: Duration::ZERO,
            shutdown_timeout: Duration::from_secs(30),
            exclude_patterns: Vec::new(),
            show_progress: false,
        }
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: RunArgs) -> Result<Self, ConfigError> {
        // Validate worker count
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        // Validate queue size
        if args.queue_size < MIN_QUEUE_SIZE {
            return Err(ConfigError::InvalidQueueSize {
                size: args.queue_size,
                min: MIN_QUEUE_SIZE,
            });
        }

        let extension = normalize_extension(&args.extension)?;

        // Compile exclude patterns
        let exclude_patterns = args
            .exclude_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidExcludePattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if args.input == args.output {
            return Err(ConfigError::SameDirectory { path: args.input });
        }

        Ok(Self {
            input_dir: args.input,
            output_dir: args.output,
            worker_count: args.workers,
            queue_size: args.queue_size,
            extension,
            watch_mode: args.watch_mode,
            // A zero interval would rescan the directory continuously
            poll_interval: Duration::from_millis(args.poll_interval_ms.max(10)),
            debounce: Duration::from_millis(args.debounce_ms),
            transform: args.transform,
            max_jitter: Duration::from_millis(args.max_jitter_ms),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
            exclude_patterns,
            show_progress: !args.quiet,
        })
    }

    /// Check if a filename should be excluded
    pub fn is_excluded(&self, filename: &str) -> bool {
        self.exclude_patterns.iter().any(|re| re.is_match(filename))
    }
}

/// Strip a leading dot and reject extensions that cannot name a file suffix
pub fn normalize_extension(raw: &str) -> Result<String, ConfigError> {
    let ext = raw.trim().trim_start_matches('.');

    let reason = if ext.is_empty() {
        Some("must not be empty")
    } else if ext.contains('/') || ext.contains('\\') {
        Some("must not contain a path separator")
    } else if ext.contains('.') {
        Some("must be a single suffix without inner dots")
    } else if ext == crate::artifact::naming::META_EXTENSION
        || ext == crate::artifact::naming::PROCESSED_EXTENSION
    {
        Some("collides with an artifact suffix")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigError::InvalidExtension {
            extension: raw.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(ext.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        let mut argv = vec!["filedrop"];
        argv.extend_from_slice(args);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert!(args.command.is_none());

        let config = PipelineConfig::from_args(args.run).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("input"));
        assert_eq!(config.output_dir, PathBuf::from("processed"));
        assert_eq!(config.worker_count, DEFAULT_WORKERS);
        assert_eq!(config.extension, "txt");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.transform, TransformKind::Uppercase);
        assert_eq!(config.watch_mode, WatchMode::Native);
        assert!(config.show_progress);
    }

    #[test]
    fn test_overrides() {
        let args = parse(&[
            "-i", "in", "-o", "out", "-w", "3", "-e", ".log", "--watch-mode", "poll",
            "--transform", "lowercase", "-q",
        ]);
        let config = PipelineConfig::from_args(args.run).unwrap();
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.extension, "log");
        assert_eq!(config.watch_mode, WatchMode::Poll);
        assert_eq!(config.transform, TransformKind::Lowercase);
        assert!(!config.show_progress);
    }

    #[test]
    fn test_invalid_worker_count() {
        let args = parse(&["-w", "0"]);
        assert!(matches!(
            PipelineConfig::from_args(args.run),
            Err(ConfigError::InvalidWorkerCount { count: 0, .. })
        ));
    }

    #[test]
    fn test_invalid_extension() {
        assert!(normalize_extension("").is_err());
        assert!(normalize_extension("a/b").is_err());
        assert!(normalize_extension(".meta").is_err());
        assert!(matches!(
            normalize_extension("tar.gz"),
            Err(ConfigError::InvalidExtension { .. })
        ));
        assert!(normalize_extension(".tar.gz").is_err());
        assert_eq!(normalize_extension(".TXT").unwrap(), "TXT");
    }

    #[test]
    fn test_same_directory_rejected() {
        let args = parse(&["-i", "drop", "-o", "drop"]);
        assert!(matches!(
            PipelineConfig::from_args(args.run),
            Err(ConfigError::SameDirectory { .. })
        ));
    }

    #[test]
    fn test_exclude_pattern() {
        let args = parse(&["--exclude", r"^draft_", "--exclude", r"~$"]);
        let config = PipelineConfig::from_args(args.run).unwrap();

        assert!(config.is_excluded("draft_1.txt"));
        assert!(config.is_excluded("notes.txt~"));
        assert!(!config.is_excluded("test_20250101_120000_001.txt"));
    }

    #[test]
    fn test_bad_exclude_pattern() {
        let args = parse(&["--exclude", "("]);
        assert!(matches!(
            PipelineConfig::from_args(args.run),
            Err(ConfigError::InvalidExcludePattern { .. })
        ));
    }

    #[test]
    fn test_subcommands() {
        let args = parse(&["status", "-i", "drop"]);
        assert!(matches!(args.command, Some(Command::Status { .. })));

        let args = parse(&["generate", "-n", "5", "--interval", "0"]);
        let Some(Command::Generate(gen)) = args.command else {
            panic!("expected generate");
        };
        let config = gen.into_config().unwrap();
        assert_eq!(config.count, 5);
        assert_eq!(config.interval, Duration::ZERO);
    }

    #[test]
    fn test_generate_interval_bounds() {
        let interval = |raw: &str| {
            let args = parse(&["generate", "--interval", raw]);
            let Some(Command::Generate(gen)) = args.command else {
                panic!("expected generate");
            };
            gen.into_config().map(|c| c.interval)
        };

        assert_eq!(interval("0.5").unwrap(), Duration::from_millis(500));
        assert!(matches!(
            interval("1e20"),
            Err(ConfigError::InvalidInterval { .. })
        ));
        assert!(interval("inf").is_err());
        assert!(interval("NaN").is_err());
    }

    #[test]
    fn test_generate_rejects_zero_count() {
        let argv = ["filedrop", "generate", "-n", "0"];
        assert!(CliArgs::try_parse_from(argv).is_err());
    }
}
