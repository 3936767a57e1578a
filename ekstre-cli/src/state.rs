//! On-disk state under `~/.ekstre`.

use anyhow::{Context, Result};
use ekstre_core::Obligation;
use std::fs;
use std::path::{Path, PathBuf};

pub fn ekstre_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".ekstre"))
}

pub fn ensure_ekstre_home() -> Result<PathBuf> {
    let dir = ekstre_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn obligations_path() -> Result<PathBuf> {
    Ok(ensure_ekstre_home()?.join("obligations.json"))
}

/// A missing file is an empty list.
pub fn read_obligations(path: &Path) -> Result<Vec<Obligation>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

pub fn write_obligations(path: &Path, items: &[Obligation]) -> Result<()> {
    let json = serde_json::to_string_pretty(items)?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
