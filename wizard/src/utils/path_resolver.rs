use anyhow::Result;
use std::path::{Path, PathBuf};

const APP_FOLDER: &str = "fitplan-wizard";

/// Resolve deployment folder (absolute path)
pub fn resolve_deployment_folder() -> PathBuf {
    // Prefer the folder where the binary is running from
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(dir) = exe_path.parent() {
            return dir.to_path_buf();
        }
    }

    // Fallback: current working directory
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Resolve the data folder holding the persisted draft (absolute path).
///
/// Order: configured folder, then the per-user data directory, then next to the binary.
pub fn resolve_data_folder(configured: Option<&Path>) -> Result<PathBuf> {
    let dir = match configured {
        Some(p) if p.is_absolute() => p.to_path_buf(),
        Some(p) => resolve_deployment_folder().join(p),
        None => dirs::data_local_dir()
            .map(|d| d.join(APP_FOLDER))
            .unwrap_or_else(|| resolve_deployment_folder().join("data")),
    };
    std::fs::create_dir_all(&dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data folder {:?}: {}", dir, e))?;
    Ok(dir)
}

/// Resolve log folder (absolute path): `<data folder>/logs`.
pub fn resolve_log_folder(configured_data: Option<&Path>) -> Result<PathBuf> {
    let log_dir = resolve_data_folder(configured_data)?.join("logs");
    std::fs::create_dir_all(&log_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create log folder: {}", e))?;
    Ok(log_dir)
}
