//! Content transforms applied to each input file

use clap::ValueEnum;

/// Maps the content of an input file to its processed output
pub trait ContentTransform: Send + Sync {
    /// Produce the processed content
    fn apply(&self, input: &str) -> String;

    /// Name used in logs
    fn name(&self) -> &str;
}

/// Built-in transforms selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransformKind {
    /// Convert to uppercase
    #[default]
    Uppercase,
    /// Convert to lowercase
    Lowercase,
    /// Copy content unchanged
    Passthrough,
}

impl ContentTransform for TransformKind {
    fn apply(&self, input: &str) -> String {
        match self {
            TransformKind::Uppercase => input.to_uppercase(),
            TransformKind::Lowercase => input.to_lowercase(),
            TransformKind::Passthrough => input.to_string(),
        }
    }

    fn name(&self) -> &str {
        match self {
            TransformKind::Uppercase => "uppercase",
            TransformKind::Lowercase => "lowercase",
            TransformKind::Passthrough => "passthrough",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_transforms() {
        assert_eq!(TransformKind::Uppercase.apply("test-content-7"), "TEST-CONTENT-7");
        assert_eq!(TransformKind::Lowercase.apply("MiXeD"), "mixed");
        assert_eq!(TransformKind::Passthrough.apply("as is\n"), "as is\n");
    }

    #[test]
    fn test_uppercase_unicode() {
        assert_eq!(TransformKind::Uppercase.apply("straße"), "STRASSE");
    }
}
