use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub const STATE_DIR_NAME: &str = "opsai";

/// `--state-dir`, then `$XDG_STATE_HOME/opsai`, then `~/.local/state/opsai`.
pub fn resolve_state_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    if let Some(xdg) = env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(xdg).join(STATE_DIR_NAME));
    }
    let home = env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .context("no state directory: pass --state-dir or set OPSAI_STATE_DIR")?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("state")
        .join(STATE_DIR_NAME))
}
