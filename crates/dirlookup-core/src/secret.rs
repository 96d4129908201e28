//! Best-effort secret file reading.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reads a secret from `path`, returning its trimmed contents.
///
/// Any failure (missing file, permission denied, invalid UTF-8) yields an empty string; absence
/// of a secret is never an error. A warning is logged when the file is accessible to group or
/// other users.
#[must_use]
pub fn read_secret_file(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) => {
            debug!(path = %path.display(), "secret file unavailable: {err}");
            return String::new();
        }
    };

    warn_if_permissive(path, &metadata);

    match fs::read_to_string(path) {
        Ok(content) => content.trim().to_string(),
        Err(err) => {
            debug!(path = %path.display(), "failed to read secret file: {err}");
            String::new()
        }
    }
}

/// Expands a leading `~` to `home`.
///
/// Only `~` on its own and `~/...` are expanded. Without a home directory the path is returned
/// unchanged.
#[must_use]
pub fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home.to_path_buf(),
        (Some(rest), Some(home)) if rest.starts_with('/') => {
            home.join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(path),
    }
}

#[cfg(unix)]
fn warn_if_permissive(path: &Path, metadata: &fs::Metadata) {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode() & 0o777;
    if is_permissive(mode) {
        warn!(
            path = %path.display(),
            "secret file has permissive permissions {mode:o}, should be 600"
        );
    }
}

/// Any mode above owner read/write counts, including owner execute.
#[cfg(unix)]
const fn is_permissive(mode: u32) -> bool {
    mode > 0o600
}

#[cfg(not(unix))]
fn warn_if_permissive(_path: &Path, _metadata: &fs::Metadata) {}
