//! File set models: source files as stored in sheets, plus the
//! language tags that drive command synthesis.

use serde::{Deserialize, Serialize};

/// Reference to a file set in the collaborator store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileSetRef {
    /// Sheet (collection) identifier.
    pub sheet_id: String,
    /// Version (sub-collection) identifier within the sheet.
    pub version_id: String,
}

impl std::fmt::Display for FileSetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.sheet_id, self.version_id)
    }
}

/// A single source file in a file set.
///
/// Content is opaque text, written byte-for-byte to the remote
/// workspace. Paths are relative and may contain `/` separators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Relative path within the workspace.
    pub path: String,
    /// File content.
    pub content: String,
    /// Language tag assigned by the editor (e.g. "javascript").
    pub language_tag: String,
}

impl FileEntry {
    /// Create a new file entry.
    pub fn new(
        path: impl Into<String>,
        content: impl Into<String>,
        language_tag: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            language_tag: language_tag.into(),
        }
    }
}

/// Languages the runner knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Script family: run with node, `npm install` when a manifest exists.
    Javascript,
    /// Interpreted family: run with a configurable interpreter binary.
    Python,
}

impl Language {
    /// Parse an editor language tag. Unknown tags are unsupported.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "javascript" | "js" => Some(Self::Javascript),
            "python" | "py" => Some(Self::Python),
            _ => None,
        }
    }

    /// File extension for this language.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Javascript => "js",
            Self::Python => "py",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Javascript => write!(f, "javascript"),
            Self::Python => write!(f, "python"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_tag() {
        assert_eq!(Language::from_tag("javascript"), Some(Language::Javascript));
        assert_eq!(Language::from_tag("JS"), Some(Language::Javascript));
        assert_eq!(Language::from_tag("python"), Some(Language::Python));
        assert_eq!(Language::from_tag("ruby"), None);
        assert_eq!(Language::from_tag(""), None);
    }

    #[test]
    fn test_file_entry_wire_shape() {
        let entry: FileEntry =
            serde_json::from_str(r#"{"path":"index.js","content":"","languageTag":"javascript"}"#)
                .unwrap();
        assert_eq!(entry.path, "index.js");
        assert_eq!(entry.language_tag, "javascript");
    }
}
