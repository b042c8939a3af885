use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::error::{Result, ShaderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// the target already held identical content and was left alone
    Unchanged,
}

/// Removes the temp file however the write ends.
struct TempFile(PathBuf);

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = std::fs::remove_file(&self.0) {
                warn!("failed to remove temp file {}: {e}", self.0.display());
            }
        }
    }
}

fn temp_path(target: &Path) -> PathBuf {
    let file_name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let thread_id: String = format!("{:?}", std::thread::current().id())
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();

    target.with_file_name(format!(
        ".{file_name}.{}-{thread_id}.tmp",
        std::process::id()
    ))
}

fn content_hash(path: &Path) -> Result<Option<blake3::Hash>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(blake3::hash(&bytes))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ShaderError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `content` to `target` only when it differs from what is already there,
/// so unchanged generated headers don't trigger downstream rebuilds.
pub fn write_if_changed(target: &Path, content: &str) -> Result<WriteOutcome> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(ShaderError::io(parent))?;
    }

    let temp = TempFile(temp_path(target));
    std::fs::write(&temp.0, content).map_err(ShaderError::io(&temp.0))?;

    let new_hash = content_hash(&temp.0)?;
    let old_hash = content_hash(target)?;

    if new_hash == old_hash {
        debug!("unchanged: {}", target.display());
        return Ok(WriteOutcome::Unchanged);
    }

    if std::fs::rename(&temp.0, target).is_err() {
        // the target may be held open by a build tool
        std::fs::copy(&temp.0, target).map_err(ShaderError::io(target))?;
    }

    info!("wrote {}", target.display());
    Ok(WriteOutcome::Written)
}
