// tmpdir.rs

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;

/// A uniquely-named scratch directory removed (with its contents) when
/// the value goes out of scope, on success and error paths alike.
#[derive(Debug)]
pub struct TmpDir {
    dir: TempDir,
}

impl TmpDir {
    /// Create a scratch directory under the system temp location.
    pub fn new(prefix: &str) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        tracing::debug!("created scratch directory {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Create a scratch directory under `parent`.
    pub fn new_in(parent: &Path, prefix: &str) -> Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new().prefix(prefix).tempdir_in(parent)?;
        tracing::debug!("created scratch directory {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the scratch directory.
    pub fn child(&self, name: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_cleanup() {
        let path = {
            let tmp = TmpDir::new("hicdex-test-").unwrap();
            std::fs::write(tmp.child("chunk.bin"), b"data").unwrap();
            assert!(tmp.child("chunk.bin").exists());
            tmp.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_new_in() {
        let outer = TmpDir::new("hicdex-test-").unwrap();
        let inner = TmpDir::new_in(outer.path(), "spill-").unwrap();
        assert!(inner.path().starts_with(outer.path()));
    }
}
