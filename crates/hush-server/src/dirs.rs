use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;

/// Platform data directory for hush, created if missing
/// (e.g. `~/.local/share/hush` on Linux).
pub fn data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("dev", "hush", "hush")
        .context("could not determine a home directory; set HUSH_DATA_DIR")?;
    let dir = dirs.data_dir().to_path_buf();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("create data dir {}", dir.display()))?;
    Ok(dir)
}
