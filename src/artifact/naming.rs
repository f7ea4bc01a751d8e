//! Artifact naming
//!
//! Every input file owns up to three artifacts that share a stem:
//! the original (`<stem>.<ext>`), the processed output (`<stem>.processed`)
//! and the sidecar (`<stem>.meta`).

/// Suffix of the sidecar metadata file
pub const META_EXTENSION: &str = "meta";

/// Suffix of the processed output file
pub const PROCESSED_EXTENSION: &str = "processed";

/// Names derived from one original filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    /// The original filename, unchanged
    pub original: String,

    /// `<stem>.meta`
    pub meta: String,

    /// `<stem>.processed`
    pub processed: String,
}

/// Maps filenames to their artifact names for one input extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    /// Input extension without the leading dot
    extension: String,
}

impl Naming {
    /// Create a naming scheme for `extension` (leading dot optional)
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// The configured input extension, without dot
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Check whether `filename` carries the input extension
    ///
    /// A bare `.txt` (empty stem) does not match.
    pub fn matches(&self, filename: &str) -> bool {
        match filename.rsplit_once('.') {
            Some((stem, ext)) => !stem.is_empty() && ext == self.extension,
            None => false,
        }
    }

    /// Strip the input extension; names without it are their own stem
    pub fn stem<'a>(&self, filename: &'a str) -> &'a str {
        match filename.rsplit_once('.') {
            Some((stem, ext)) if ext == self.extension && !stem.is_empty() => stem,
            _ => filename,
        }
    }

    /// Sidecar filename for `filename`
    pub fn meta_name(&self, filename: &str) -> String {
        format!("{}.{}", self.stem(filename), META_EXTENSION)
    }

    /// Processed output filename for `filename`
    pub fn processed_name(&self, filename: &str) -> String {
        format!("{}.{}", self.stem(filename), PROCESSED_EXTENSION)
    }

    /// All artifact names for `filename`
    pub fn artifacts(&self, filename: &str) -> ArtifactNames {
        ArtifactNames {
            original: filename.to_string(),
            meta: self.meta_name(filename),
            processed: self.processed_name(filename),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_names() {
        let naming = Naming::new(".txt");
        let names = naming.artifacts("test_20250101_120000_042.txt");
        assert_eq!(names.original, "test_20250101_120000_042.txt");
        assert_eq!(names.meta, "test_20250101_120000_042.meta");
        assert_eq!(names.processed, "test_20250101_120000_042.processed");
    }

    #[test]
    fn test_only_last_extension_stripped() {
        let naming = Naming::new("txt");
        assert_eq!(naming.stem("report.v2.txt"), "report.v2");
        assert_eq!(naming.meta_name("archive.txt.txt"), "archive.txt.meta");
    }

    #[test]
    fn test_matches() {
        let naming = Naming::new("txt");
        assert!(naming.matches("a.txt"));
        assert!(!naming.matches("a.meta"));
        assert!(!naming.matches("a.processed"));
        assert!(!naming.matches("a.TXT"));
        assert!(!naming.matches(".txt"));
        assert!(!naming.matches("txt"));
    }

    #[test]
    fn test_foreign_extension_keeps_full_name() {
        let naming = Naming::new("log");
        assert_eq!(naming.stem("notes.txt"), "notes.txt");
        assert_eq!(naming.processed_name("notes.txt"), "notes.txt.processed");
    }
}
