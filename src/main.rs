//! filedrop - Drop-Directory File Processing Pipeline
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use filedrop::artifact::{MetadataStore, Naming};
use filedrop::config::{normalize_extension, CliArgs, Command, GenerateArgs, PipelineConfig, RunArgs};
use filedrop::generator;
use filedrop::pipeline::PipelineCoordinator;
use filedrop::progress::{print_header, print_status, print_summary, ProgressReporter};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code when workers were still busy at the shutdown deadline
const EXIT_SHUTDOWN_TIMEOUT: u8 = 2;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    match args.command {
        Some(Command::Run(run_args)) => run_pipeline(run_args),
        Some(Command::Status { input, extension }) => {
            setup_logging(false)?;
            show_status(input, &extension)
        }
        Some(Command::Generate(generate_args)) => {
            setup_logging(false)?;
            run_generator(generate_args)
        }
        None => run_pipeline(args.run),
    }
}

/// Watch and process until interrupted
fn run_pipeline(args: RunArgs) -> Result<ExitCode> {
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = PipelineConfig::from_args(args).context("Invalid configuration")?;

    for dir in [&config.input_dir, &config.output_dir] {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    if config.show_progress {
        print_header(&config);
    }

    let show_progress = config.show_progress;
    let coordinator =
        PipelineCoordinator::new(config).context("Failed to initialize pipeline")?;

    // Setup signal handler for graceful shutdown
    let shutdown_flag = coordinator.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    // Create progress reporter
    let progress = show_progress.then(ProgressReporter::new);

    if let Some(ref p) = progress {
        p.set_status("Watching for files...");
    }

    let result = coordinator
        .run_with_progress(|snapshot| {
            if let Some(ref p) = progress {
                p.update(snapshot);
            }
        })
        .context("Pipeline failed")?;

    if let Some(ref p) = progress {
        p.finish_and_clear();
    }

    if show_progress {
        print_summary(&result);
    }

    if result.files_failed > 0 {
        info!(failed = result.files_failed, "Some files failed; sidecars left in input directory");
    }

    if !result.clean_shutdown() {
        warn!(pending = result.pending_workers, "Exiting with work still in flight");
        return Ok(ExitCode::from(EXIT_SHUTDOWN_TIMEOUT));
    }

    Ok(ExitCode::SUCCESS)
}

/// List sidecars left in the input directory
fn show_status(input: PathBuf, extension: &str) -> Result<ExitCode> {
    let extension = normalize_extension(extension).context("Invalid configuration")?;
    let store = MetadataStore::new(input, Naming::new(&extension));

    let records = store
        .list()
        .with_context(|| format!("Failed to list {}", store.dir().display()))?;
    print_status(&records);

    Ok(ExitCode::SUCCESS)
}

/// Create test files for the pipeline to pick up
fn run_generator(args: GenerateArgs) -> Result<ExitCode> {
    let config = args.into_config().context("Invalid configuration")?;

    let paths = generator::generate(&config)
        .with_context(|| format!("Failed to create files in {}", config.dir.display()))?;

    info!(count = paths.len(), dir = %config.dir.display(), "Generated test files");
    Ok(ExitCode::SUCCESS)
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("filedrop=debug,warn")
    } else {
        EnvFilter::new("filedrop=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
