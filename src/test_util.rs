//! Helpers for tests working with files.

use std::path::{Path, PathBuf};

use anyhow::{Result, Context, anyhow};

use crate::random_util::randomidstring;

/// A fresh directory below the system temp dir, removed on drop.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new() -> Result<Self> {
        let path = std::env::temp_dir().join(
            format!("filerouter-test-{}", randomidstring()?));
        std::fs::create_dir_all(&path).with_context(
            || anyhow!("creating {path:?}"))?;
        Ok(TempDir { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Write `contents` to `path`, creating missing parent directories.
pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(
            || anyhow!("creating {parent:?}"))?;
    }
    std::fs::write(path, contents).with_context(
        || anyhow!("writing {path:?}"))
}
