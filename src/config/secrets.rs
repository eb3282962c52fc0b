//! Layered credential resolution.
//!
//! Each variable is resolved from the first source that yields a usable
//! value, in priority order:
//!
//! 1. A file under the container secrets mount (`/run/secrets/<var_lowercase>`)
//! 2. A file under the alternate secrets path (`/secrets/<var_lowercase>`)
//! 3. The process environment variable (`<VAR_UPPER>`)
//!
//! Empty strings and placeholder sentinels (`your_*_here`) are treated as
//! absent so that a templated `.env` file never masquerades as a credential.

use std::path::PathBuf;

/// Default secrets-mount directories, in priority order.
const DEFAULT_SECRET_DIRS: [&str; 2] = ["/run/secrets", "/secrets"];

/// Resolves configuration variables from secret files and the environment.
///
/// The directory list is injectable so tests can point at a tempdir instead
/// of the container mount paths.
#[derive(Debug, Clone)]
pub struct SecretSources {
    dirs: Vec<PathBuf>,
}

impl Default for SecretSources {
    fn default() -> Self {
        Self {
            dirs: DEFAULT_SECRET_DIRS.iter().map(PathBuf::from).collect(),
        }
    }
}

impl SecretSources {
    /// Creates a resolver that reads secret files from the given directories
    /// (highest priority first) before falling back to the environment.
    #[must_use]
    pub fn with_dirs(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// Resolves `var` (an upper-case variable name such as
    /// `ARUBA_CLIENT_SECRET`) from the layered sources.
    ///
    /// Returns `None` when no source yields a usable value.
    #[must_use]
    pub fn resolve(&self, var: &str) -> Option<String> {
        let file_name = var.to_lowercase();

        for dir in &self.dirs {
            let path = dir.join(&file_name);
            if let Ok(contents) = std::fs::read_to_string(&path) {
                let trimmed = contents.trim();
                if is_usable(trimmed) {
                    tracing::debug!(var, path = %path.display(), "credential resolved from file");
                    return Some(trimmed.to_string());
                }
            }
        }

        match std::env::var(var) {
            Ok(value) if is_usable(value.trim()) => {
                tracing::debug!(var, "credential resolved from environment");
                Some(value.trim().to_string())
            }
            _ => None,
        }
    }
}

/// Returns `true` unless the value is empty or a placeholder sentinel
/// left behind by an `.env` template (`your_client_id_here` and friends).
fn is_usable(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    !(value.starts_with("your_") && value.ends_with("_here"))
}
