//! Run result export.

use crate::model::RunResponse;
use anyhow::{Context, Result};
use std::path::Path;

/// Write `response` as pretty JSON, creating parent directories as needed.
pub fn export_json(path: &Path, response: &RunResponse) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let data = serde_json::to_vec_pretty(response).context("serialize run result")?;
    std::fs::write(path, data).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
