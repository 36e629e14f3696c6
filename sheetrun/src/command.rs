//! Command synthesizer: picks the entry file and builds the exact
//! shell command line to run a file set remotely.
//!
//! The command is always scoped with a `cd` into the session's remote
//! root, joined with `&&` so a failed install step short-circuits the
//! run step.

use crate::error::SessionError;
use crate::models::{FileEntry, Language};

/// Dependency manifest that triggers an install step for javascript.
const JS_MANIFEST: &str = "package.json";
/// Install step prefixed before a javascript run when a manifest exists.
const JS_INSTALL_COMMAND: &str = "npm install";
/// Runtime for the javascript family.
const JS_RUNTIME: &str = "node";

/// A synthesized run: which file starts the program, and the command
/// line that launches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    /// Language derived from the first file's tag.
    pub language: Language,
    /// Entry file, per the language-specific selection rule.
    pub entry_path: String,
    /// Full shell command line for the remote host.
    pub command: String,
}

/// Synthesize the run plan for a file set.
///
/// The language is derived from the first file's tag; an unknown tag
/// fails here, before any remote resource is touched.
///
/// Entry selection, first match wins: javascript prefers `index.js`,
/// python prefers `main.py`, otherwise the first file in the set.
pub fn synthesize(
    files: &[FileEntry],
    remote_root: &str,
    python_bin: &str,
) -> Result<RunPlan, SessionError> {
    let first = files
        .first()
        .ok_or_else(|| SessionError::UnsupportedLanguage(String::new()))?;
    let language = Language::from_tag(&first.language_tag)
        .ok_or_else(|| SessionError::UnsupportedLanguage(first.language_tag.clone()))?;

    let entry_path = select_entry(language, files).to_string();
    let command = match language {
        Language::Javascript => {
            if files.iter().any(|f| f.path == JS_MANIFEST) {
                format!("cd {remote_root} && {JS_INSTALL_COMMAND} && {JS_RUNTIME} {entry_path}")
            } else {
                format!("cd {remote_root} && {JS_RUNTIME} {entry_path}")
            }
        }
        Language::Python => format!("cd {remote_root} && {python_bin} {entry_path}"),
    };

    Ok(RunPlan {
        language,
        entry_path,
        command,
    })
}

fn select_entry(language: Language, files: &[FileEntry]) -> &str {
    let preferred = match language {
        Language::Javascript => "index",
        Language::Python => "main",
    };
    let preferred = format!("{preferred}.{}", language.extension());
    files
        .iter()
        .find(|f| f.path == preferred)
        .or_else(|| files.first())
        .map_or("", |f| f.path.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorKind;

    fn js(path: &str) -> FileEntry {
        FileEntry::new(path, "", "javascript")
    }

    fn py(path: &str) -> FileEntry {
        FileEntry::new(path, "", "python")
    }

    #[test]
    fn test_python_prefers_main() {
        let files = vec![py("main.py"), py("utils.py")];
        let plan = synthesize(&files, "/tmp/run-1-2", "python3").unwrap();
        assert_eq!(plan.entry_path, "main.py");
        assert_eq!(plan.command, "cd /tmp/run-1-2 && python3 main.py");
    }

    #[test]
    fn test_javascript_prefers_index() {
        let files = vec![js("a.js"), js("index.js")];
        let plan = synthesize(&files, "/tmp/run-1-2", "python3").unwrap();
        assert_eq!(plan.entry_path, "index.js");
        assert_eq!(plan.command, "cd /tmp/run-1-2 && node index.js");
    }

    #[test]
    fn test_falls_back_to_first_file() {
        let files = vec![py("script.py"), py("other.py")];
        let plan = synthesize(&files, "/tmp/run-1-2", "python3").unwrap();
        assert_eq!(plan.entry_path, "script.py");
    }

    #[test]
    fn test_manifest_adds_install_step() {
        let files = vec![js("index.js"), js("package.json")];
        let plan = synthesize(&files, "/tmp/run-1-2", "python3").unwrap();
        assert_eq!(
            plan.command,
            "cd /tmp/run-1-2 && npm install && node index.js"
        );
    }

    #[test]
    fn test_interpreter_override() {
        let files = vec![py("main.py")];
        let plan = synthesize(&files, "/tmp/run-1-2", "/usr/bin/python3.12").unwrap();
        assert_eq!(plan.command, "cd /tmp/run-1-2 && /usr/bin/python3.12 main.py");
    }

    #[test]
    fn test_unsupported_language_fails() {
        let files = vec![FileEntry::new("only.rb", "", "ruby")];
        let err = synthesize(&files, "/tmp/run-1-2", "python3").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedLanguage);
        assert!(err.to_string().contains("ruby"));
    }
}
