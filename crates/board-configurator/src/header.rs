use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::state::lines_with_endings;

/// True when the option name on a `#define NAME value` line ends in `_<tag>`.
/// Lines with fewer than two tokens never match.
pub fn is_function_line(line: &str, tag: &str) -> bool {
    line.split_whitespace()
        .nth(1)
        .and_then(|name| name.rsplit('_').next())
        .map(|last| last == tag)
        .unwrap_or(false)
}

/// The generator quotes every string-typed value, including the ones that are
/// really macro invocations. Strip the quotes from those; copy the rest as is.
pub fn correct_text(raw: &str, tag: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for line in lines_with_endings(raw) {
        if is_function_line(line, tag) {
            out.extend(line.chars().filter(|c| *c != '"'));
        } else {
            out.push_str(line);
        }
    }
    out
}

/// Correct `raw_path` into `final_path` and remove the raw file.
///
/// The final header is written through a temporary file in its own directory
/// (which must already exist) and renamed into place; the raw header is only
/// deleted after that succeeded.
pub fn correct(raw_path: &Path, final_path: &Path, tag: &str) -> Result<()> {
    let raw = fs::read_to_string(raw_path)
        .map_err(|e| Error::msg(format!("failed to read {}: {e}", raw_path.display())))?;
    let corrected = correct_text(&raw, tag);

    let dir = match final_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| {
        Error::msg(format!(
            "failed to create temp file in {}: {e}",
            dir.display()
        ))
    })?;
    tmp.write_all(corrected.as_bytes())
        .map_err(|e| Error::msg(format!("failed to write {}: {e}", tmp.path().display())))?;
    if let Some(perms) = header_permissions(final_path) {
        tmp.as_file().set_permissions(perms).map_err(|e| {
            Error::msg(format!(
                "failed to set permissions on {}: {e}",
                tmp.path().display()
            ))
        })?;
    }
    tmp.persist(final_path)?;

    if let Err(e) = fs::remove_file(raw_path) {
        warn!(path = %raw_path.display(), "failed to remove raw header: {e}");
    }
    info!(header = %final_path.display(), "wrote corrected header");
    Ok(())
}

// Temp files are created owner-only. Keep the mode of a header being
// replaced, otherwise make a new one world-readable.
#[cfg(unix)]
fn header_permissions(final_path: &Path) -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(
        fs::metadata(final_path)
            .map(|m| m.permissions())
            .unwrap_or_else(|_| fs::Permissions::from_mode(0o644)),
    )
}

#[cfg(not(unix))]
fn header_permissions(final_path: &Path) -> Option<fs::Permissions> {
    fs::metadata(final_path).ok().map(|m| m.permissions())
}
