//! Filesystem helpers shared by the writers in this crate.

use std::path::Path;

use sha2::{Digest, Sha256};

use buildconf_shared::{BuildConfError, Result};

/// Write `content` next to `target` under a temporary name, then rename it
/// into place. Parent directories are created as needed.
pub(crate) fn write_atomic(target: &Path, content: &str) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BuildConfError::io(parent, e))?;
    }
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = target.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::now_v7()));

    std::fs::write(&temp, content).map_err(|e| BuildConfError::io(&temp, e))?;
    std::fs::rename(&temp, target).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        BuildConfError::io(target, e)
    })
}

/// Lowercase hex SHA-256 of `content`.
pub(crate) fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
