//! Test file generator
//!
//! Drops files into the input directory the way an upstream producer would:
//! each file is written to a temporary name and then moved into place, so
//! the watcher never sees partial content.

use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::info;

/// Threads used when files are created all at once
const CONCURRENT_PRODUCERS: u32 = 5;

/// Generator settings
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Directory to create files in
    pub dir: PathBuf,

    /// Number of files
    pub count: u32,

    /// Pause between files; zero creates them concurrently
    pub interval: Duration,

    /// Filename prefix
    pub prefix: String,

    /// Content prefix; `-<counter>` is appended
    pub content: String,

    /// Extension without leading dot
    pub extension: String,
}

impl GeneratorConfig {
    /// Settings matching the pipeline defaults
    pub fn new(dir: impl Into<PathBuf>, count: u32) -> Self {
        Self {
            dir: dir.into(),
            count,
            interval: Duration::ZERO,
            prefix: "test".into(),
            content: "test-content".into(),
            extension: crate::config::DEFAULT_EXTENSION.into(),
        }
    }

    /// Content of file number `counter`
    pub fn content_for(&self, counter: u32) -> String {
        format!("{}-{}", self.content, counter)
    }
}

/// Create one file named `<prefix>_<timestamp>.<ext>`
///
/// The timestamp has millisecond resolution; on a name collision the next
/// millisecond is tried.
pub fn create_test_file(config: &GeneratorConfig, counter: u32) -> io::Result<PathBuf> {
    let mut tmp = NamedTempFile::new_in(&config.dir)?;
    tmp.write_all(config.content_for(counter).as_bytes())?;
    tmp.as_file().sync_all()?;

    loop {
        let path = config.dir.join(timestamped_name(config));
        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                info!(file = %path.display(), counter = counter, "Created test file");
                return Ok(path);
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                tmp = e.file;
                thread::sleep(Duration::from_millis(1));
            }
            Err(e) => return Err(e.error),
        }
    }
}

/// Create `config.count` files and return their paths in creation order
pub fn generate(config: &GeneratorConfig) -> io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(&config.dir)?;

    if config.interval.is_zero() {
        return generate_concurrently(config);
    }

    let mut paths = Vec::with_capacity(config.count as usize);
    for counter in 1..=config.count {
        paths.push(create_test_file(config, counter)?);
        if counter < config.count {
            thread::sleep(config.interval);
        }
    }
    Ok(paths)
}

/// Spread file creation over a few producer threads
fn generate_concurrently(config: &GeneratorConfig) -> io::Result<Vec<PathBuf>> {
    let producers = config.count.min(CONCURRENT_PRODUCERS);

    let results: Vec<io::Result<Vec<PathBuf>>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..producers)
            .map(|offset| {
                scope.spawn(move || {
                    (1 + offset..=config.count)
                        .step_by(producers as usize)
                        .map(|counter| create_test_file(config, counter))
                        .collect::<io::Result<Vec<_>>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(io::Error::other("producer thread panicked")))
            })
            .collect()
    });

    let mut paths = Vec::with_capacity(config.count as usize);
    for result in results {
        paths.extend(result?);
    }
    paths.sort();
    Ok(paths)
}

fn timestamped_name(config: &GeneratorConfig) -> String {
    format!(
        "{}_{}.{}",
        config.prefix,
        chrono::Local::now().format("%Y%m%d_%H%M%S_%3f"),
        config.extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;

    #[test]
    fn test_sequential_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GeneratorConfig::new(dir.path(), 2);
        config.interval = Duration::from_millis(5);

        let paths = generate(&config).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(fs::read_to_string(&paths[0]).unwrap(), "test-content-1");
        assert_eq!(fs::read_to_string(&paths[1]).unwrap(), "test-content-2");
        let stamped = regex::Regex::new(r"^test_\d{8}_\d{6}_\d{3}\.txt$").unwrap();
        for path in &paths {
            let name = path.file_name().unwrap().to_str().unwrap();
            assert!(stamped.is_match(name), "{name}");
        }
    }

    #[test]
    fn test_concurrent_names_unique() {
        let dir = tempfile::tempdir().unwrap();
        let config = GeneratorConfig::new(dir.path(), 12);

        let paths = generate(&config).unwrap();
        let unique: HashSet<_> = paths.iter().collect();
        assert_eq!(unique.len(), 12);

        let contents: HashSet<String> = paths
            .iter()
            .map(|p| fs::read_to_string(p).unwrap())
            .collect();
        for counter in 1..=12 {
            assert!(contents.contains(&config.content_for(counter)));
        }

        // No temp files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 12);
    }

    #[test]
    fn test_creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let config = GeneratorConfig::new(root.path().join("new"), 1);

        let paths = generate(&config).unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].starts_with(root.path().join("new")));
    }
}
