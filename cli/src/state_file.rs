use std::path::Path;

use anyhow::{Context, Result};
use vigil_core::api::SafetyState;

/// Read a persisted safety state. A missing file means a fresh state.
pub fn load(path: &Path) -> Result<Option<SafetyState>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read safety state {}", path.display()))?;
    let state = serde_json::from_str(&raw)
        .with_context(|| format!("parse safety state {}", path.display()))?;
    Ok(Some(state))
}

pub fn save(path: &Path, state: &SafetyState) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create state dir {}", parent.display()))?;
    }
    let raw = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, raw).with_context(|| format!("write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
