//! Progress reporting for the pipeline
//!
//! Provides a live status line using indicatif and the start/stop banners.

use crate::artifact::{MetadataRecord, MetadataStatus};
use crate::error::MetadataResult;
use crate::config::PipelineConfig;
use crate::pipeline::{PipelineProgress, RunResult};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter that displays pipeline status
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(style);

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &PipelineProgress) {
        self.bar.set_message(status_line(progress));
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn status_line(progress: &PipelineProgress) -> String {
    let mut msg = format!(
        "Done: {} | Size: {} | Rate: {:.1}/s | Queue: {} | Workers: {}/{}",
        format_number(progress.done),
        format_size(progress.bytes, BINARY),
        progress.files_per_second(),
        progress.queue_size,
        progress.active_workers,
        progress.total_workers,
    );
    if progress.failed > 0 {
        msg.push_str(&format!(" | Failed: {}", format_number(progress.failed)));
    }
    if progress.backpressure > 0 {
        msg.push_str(&format!(" | Queue full: {}x", format_number(progress.backpressure)));
    }
    msg
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a header when the pipeline starts
pub fn print_header(config: &PipelineConfig) {
    println!();
    println!(
        "{} {}",
        style("filedrop").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Input:").bold(), config.input_dir.display());
    println!("  {} {}", style("Output:").bold(), config.output_dir.display());
    println!("  {} *.{}", style("Pattern:").bold(), config.extension);
    println!("  {} {}", style("Workers:").bold(), config.worker_count);
    println!();
}

/// Print a summary after shutdown
pub fn print_summary(result: &RunResult) {
    let duration_secs = result.duration.as_secs_f64();

    println!();
    if result.clean_shutdown() {
        println!("{}", style("Pipeline Stopped").green().bold());
    } else {
        println!("{}", style("Pipeline Stopped (timed out)").yellow().bold());
    }
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Processed:").bold(), format_number(result.files_done));
    println!(
        "  {} {}",
        style("Total Size:").bold(),
        format_size(result.bytes_processed, BINARY)
    );
    println!("  {} {:.1}s", style("Duration:").bold(), duration_secs);
    println!("  {} {}", style("Queued:").dim(), format_number(result.files_queued));
    if result.backpressure_events > 0 {
        println!(
            "  {} {} (consider a larger --queue-size or more --workers)",
            style("Queue full:").yellow(),
            format_number(result.backpressure_events)
        );
    }
    if result.files_skipped > 0 {
        println!(
            "  {} {}",
            style("Duplicates:").dim(),
            format_number(result.files_skipped)
        );
    }
    if result.files_failed > 0 {
        println!(
            "  {} {} (see .meta files in the input directory)",
            style("Failed:").yellow().bold(),
            format_number(result.files_failed)
        );
    }
    if !result.clean_shutdown() {
        println!(
            "  {} {}",
            style("Still running:").red().bold(),
            result.pending_workers
        );
    }
    println!();
}

/// Print one line per sidecar record
pub fn print_status(records: &[(String, MetadataResult<MetadataRecord>)]) {
    if records.is_empty() {
        println!("{}", style("No sidecar records").green());
        return;
    }

    for (name, record) in records {
        match record {
            Ok(r) => {
                let status = match r.status {
                    MetadataStatus::Failed => style(r.status.as_str()).red().bold(),
                    MetadataStatus::Completed => style(r.status.as_str()).green(),
                    MetadataStatus::Processing => style(r.status.as_str()).yellow(),
                };
                println!(
                    "{:<40} {:<10} {}",
                    r.original_filename,
                    status,
                    r.last_updated.format("%Y-%m-%d %H:%M:%S")
                );
                if let Some(msg) = &r.error_message {
                    println!("  {}", style(msg).dim());
                }
            }
            Err(e) => println!("{:<40} {} {}", name, style("unreadable").red(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_status_line_shows_problems_only_when_present() {
        let mut progress = PipelineProgress {
            done: 1200,
            failed: 0,
            skipped: 0,
            bytes: 2048,
            queue_size: 3,
            backpressure: 0,
            active_workers: 2,
            total_workers: 5,
            elapsed: Duration::from_secs(4),
        };

        let line = status_line(&progress);
        assert!(line.contains("Done: 1,200"));
        assert!(line.contains("Workers: 2/5"));
        assert!(!line.contains("Failed"));

        assert!(!line.contains("Queue full"));

        progress.failed = 2;
        progress.backpressure = 7;
        let line = status_line(&progress);
        assert!(line.contains("Failed: 2"));
        assert!(line.contains("Queue full: 7x"));
    }
}
