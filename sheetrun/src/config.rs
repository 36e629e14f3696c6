//! Deployment configuration, read from `SHEETRUN_*` environment
//! variables with conservative defaults.

use std::time::Duration;

use crate::transport::RemoteConfig;

/// Runtime configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote runner host parameters.
    pub remote: RemoteConfig,
    /// Interpreter binary for the python family.
    pub python_bin: String,
    /// Base URL of the sheet store service.
    pub store_url: String,
    /// Origin allowed to open client channels. `None` allows any.
    pub allowed_origin: Option<String>,
    /// Shared scratch root for session workspaces on the remote host.
    pub scratch_root: String,
    /// Budget for the connection handshake.
    pub connect_timeout: Duration,
    /// Budget for the full workspace upload.
    pub upload_timeout: Duration,
    /// Remove the session workspace on teardown.
    pub cleanup_workspace: bool,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Self {
        Self {
            remote: RemoteConfig {
                host: env_or("SHEETRUN_SSH_HOST", "localhost"),
                port: env_parse("SHEETRUN_SSH_PORT", 22),
                user: env_or("SHEETRUN_SSH_USER", "runner"),
                identity_file: std::env::var("SHEETRUN_SSH_IDENTITY").ok(),
            },
            python_bin: env_or("SHEETRUN_PYTHON_BIN", "python3"),
            store_url: env_or("SHEETRUN_STORE_URL", "http://localhost:8081"),
            allowed_origin: std::env::var("SHEETRUN_ALLOWED_ORIGIN").ok(),
            scratch_root: env_or("SHEETRUN_SCRATCH_ROOT", "/tmp/sheetrun"),
            connect_timeout: Duration::from_secs(env_parse("SHEETRUN_CONNECT_TIMEOUT_SECS", 15)),
            upload_timeout: Duration::from_secs(env_parse("SHEETRUN_UPLOAD_TIMEOUT_SECS", 60)),
            cleanup_workspace: env_parse("SHEETRUN_CLEANUP_WORKSPACE", true),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        // Unset or unparseable values use the default.
        assert_eq!(env_parse("SHEETRUN_TEST_UNSET_PORT", 22u16), 22);
        assert_eq!(env_or("SHEETRUN_TEST_UNSET_HOST", "localhost"), "localhost");
    }
}
