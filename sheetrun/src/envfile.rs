//! Environment resolver for `.env` files in a file set.
//!
//! Parsing rules, per line: trim whitespace; skip empty lines and lines
//! starting with `#`; split on the first `=` only, so values may
//! themselves contain `=`; the value is kept verbatim, not trimmed or
//! unescaped. Lines with no `=` are silently skipped. When several
//! `.env` files define the same key, later files in file-set order win.

use std::collections::HashMap;

use crate::models::FileEntry;

/// Suffix identifying environment files in a file set.
pub const ENV_FILE_SUFFIX: &str = ".env";

/// Resolve all `.env` files in the set into one variable mapping.
pub fn resolve(files: &[FileEntry]) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for file in files.iter().filter(|f| f.path.ends_with(ENV_FILE_SUFFIX)) {
        parse_into(&file.content, &mut vars);
    }
    vars
}

fn parse_into(content: &str, vars: &mut HashMap<String, String>) {
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        vars.insert(key.to_string(), value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_env_files_yields_empty_mapping() {
        let files = vec![
            FileEntry::new("index.js", "A=1", "javascript"),
            FileEntry::new("notes.txt", "B=2", "plaintext"),
        ];
        assert!(resolve(&files).is_empty());
    }

    #[test]
    fn test_split_on_first_equals_only() {
        let files = vec![FileEntry::new(".env", "A=b=c", "plaintext")];
        let vars = resolve(&files);
        assert_eq!(vars.get("A").map(String::as_str), Some("b=c"));
    }

    #[test]
    fn test_skips_comments_blanks_and_malformed_lines() {
        let content = "# comment\n\n   \nNOEQUALS\nKEY=value\n";
        let files = vec![FileEntry::new("app.env", content, "plaintext")];
        let vars = resolve(&files);
        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("KEY").map(String::as_str), Some("value"));
    }

    #[test]
    fn test_value_kept_verbatim() {
        let files = vec![FileEntry::new(".env", "  KEY= spaced value ", "plaintext")];
        let vars = resolve(&files);
        // Only the full line is trimmed; the value keeps its own spacing.
        assert_eq!(vars.get("KEY").map(String::as_str), Some(" spaced value"));
    }

    #[test]
    fn test_later_files_win() {
        let files = vec![
            FileEntry::new("base.env", "A=1\nB=2", "plaintext"),
            FileEntry::new("override.env", "A=3", "plaintext"),
        ];
        let vars = resolve(&files);
        assert_eq!(vars.get("A").map(String::as_str), Some("3"));
        assert_eq!(vars.get("B").map(String::as_str), Some("2"));
    }
}
