use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::config::DiscoveryConfig;
use crate::error::{Error, Result};
use crate::workspace::WorkspacePaths;

/// Definition files for one board, board-properties matches first, then the
/// nested config-files matches. A board with no files (or no directory at
/// all) yields an empty list.
pub fn discover(
    ws: &WorkspacePaths,
    cfg: &DiscoveryConfig,
    vendor: &str,
    board: &str,
) -> Result<Vec<PathBuf>> {
    for (what, v) in [("vendor", vendor), ("board", board)] {
        if v.trim().is_empty() {
            return Err(Error::msg(format!("{what} must not be empty")));
        }
    }

    let board_dir = ws.board_dir(vendor, board);
    let mut out = matching_files(&board_dir, &cfg.suffix, cfg.sort)?;
    out.extend(matching_files(
        &board_dir.join(&cfg.nested_dir),
        &cfg.suffix,
        cfg.sort,
    )?);
    debug!(vendor, board, count = out.len(), "discovered definition files");
    Ok(out)
}

// Direct children only; nested directories are their own pattern group.
// Symlinked definition files count; broken links do not.
fn matching_files(dir: &Path, suffix: &str, sort: bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.path().is_file() {
            continue;
        }
        let matches = entry
            .file_name()
            .to_str()
            .map(|n| n.ends_with(suffix))
            .unwrap_or(false);
        if matches {
            out.push(entry.into_path());
        }
    }
    if sort {
        out.sort();
    }
    Ok(out)
}
