use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::process::{CommandSpec, ProcessRunner, ensure_success};

/// Resolve `base` plus `overrides` into the state file at `output`.
///
/// The evaluator is invoked as `<merge...> <base> <output> <override>...`; later
/// files win for any option defined more than once. On failure the state file
/// is in an unknown condition and the board must be selected again.
pub fn merge(
    runner: &dyn ProcessRunner,
    merge_cmd: &[String],
    base: &Path,
    output: &Path,
    overrides: &[PathBuf],
) -> Result<()> {
    if !base.is_file() {
        return Err(Error::msg(format!(
            "base definition file {} does not exist",
            base.display()
        )));
    }

    let mut args = vec![
        base.display().to_string(),
        output.display().to_string(),
    ];
    args.extend(overrides.iter().map(|p| p.display().to_string()));
    let cwd = base.parent().unwrap_or_else(|| Path::new("."));
    let spec = CommandSpec::from_argv(merge_cmd, args)?.in_dir(cwd);

    info!(
        base = %base.display(),
        output = %output.display(),
        overrides = overrides.len(),
        "merging configuration defaults"
    );
    ensure_success("merge", runner.run(&spec)?)?;

    if !output.is_file() {
        return Err(Error::msg(format!(
            "merge evaluator reported success but {} was not written",
            output.display()
        )));
    }
    Ok(())
}
