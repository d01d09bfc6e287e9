use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub root_dir: String,
    pub sdk_root: String,
    pub vendors_dir: String,
    pub base_definition: String,
    pub state_file: String,
    pub raw_header: String,
    pub final_header: String,
    pub board_record: String,
    pub thing_record: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root_dir: ".".into(),
            sdk_root: "../..".into(),
            vendors_dir: "vendors".into(),
            base_definition: "KConfig".into(),
            state_file: ".config".into(),
            raw_header: "temp.h".into(),
            final_header: "build/kconfig/kconfig.h".into(),
            board_record: "boardChoice.csv".into(),
            thing_record: "thingName.csv".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub sdk_root: PathBuf,
    pub vendors_dir: PathBuf,
    pub base_definition: PathBuf,
    pub state_file: PathBuf,
    pub raw_header: PathBuf,
    pub final_header: PathBuf,
    pub board_record: PathBuf,
    pub thing_record: PathBuf,
}

impl WorkspacePaths {
    pub fn board_dir(&self, vendor: &str, board: &str) -> PathBuf {
        self.vendors_dir.join(vendor).join("boards").join(board)
    }

    // Resolve a configured path against the workspace root; absolute paths pass through.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf> {
        resolve_user_path(&self.root, "path", raw)
    }
}

pub fn load_paths(cfg: &WorkspaceConfig) -> Result<WorkspacePaths> {
    let cwd = std::env::current_dir().map_err(|e| Error::msg(format!("cwd error: {e}")))?;
    resolve_paths(&cwd, cfg)
}

// Tool-local files live under root; SDK tree files live under sdk_root.
pub fn resolve_paths(cwd: &Path, cfg: &WorkspaceConfig) -> Result<WorkspacePaths> {
    let root = resolve_user_path(cwd, "root_dir", &cfg.root_dir)?;
    let sdk_root = resolve_user_path(&root, "sdk_root", &cfg.sdk_root)?;
    Ok(WorkspacePaths {
        vendors_dir: resolve_user_path(&sdk_root, "vendors_dir", &cfg.vendors_dir)?,
        base_definition: resolve_user_path(&root, "base_definition", &cfg.base_definition)?,
        state_file: resolve_user_path(&root, "state_file", &cfg.state_file)?,
        raw_header: resolve_user_path(&root, "raw_header", &cfg.raw_header)?,
        final_header: resolve_user_path(&sdk_root, "final_header", &cfg.final_header)?,
        board_record: resolve_user_path(&root, "board_record", &cfg.board_record)?,
        thing_record: resolve_user_path(&root, "thing_record", &cfg.thing_record)?,
        root,
        sdk_root,
    })
}

fn resolve_user_path(base: &Path, field: &str, p: &str) -> Result<PathBuf> {
    let p = p.trim();
    if p.is_empty() {
        return Err(Error::msg(format!("workspace.{field} is empty")));
    }
    let pb = PathBuf::from(p);
    Ok(if pb.is_absolute() { pb } else { base.join(pb) })
}
