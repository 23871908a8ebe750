//! Filesystem-backed vault store.

use super::FileStore;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// [`FileStore`] implementation rooted at a vault directory.
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Creates a store rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the vault root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        // Reject traversal so a hostile plan title cannot escape the vault.
        if path.split('/').any(|part| part == "..") {
            return Err(Error::InvalidInput(format!(
                "path escapes vault root: {path}"
            )));
        }
        Ok(self.root.join(path))
    }

    fn io_error(operation: &str, path: &str, err: &std::io::Error) -> Error {
        Error::OperationFailed {
            operation: operation.to_string(),
            cause: format!("{path}: {err}"),
        }
    }

    fn walk(dir: &Path, rel: &str, out: &mut Vec<String>) -> Result<()> {
        let entries = std::fs::read_dir(dir).map_err(|e| Self::io_error("list_all", rel, &e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Self::io_error("list_all", rel, &e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            let child_rel = if rel.is_empty() {
                name.clone()
            } else {
                format!("{rel}/{name}")
            };
            let path = entry.path();
            if path.is_dir() {
                Self::walk(&path, &child_rel, out)?;
            } else if path.is_file() && name.ends_with(".md") {
                out.push(child_rel);
            }
        }
        Ok(())
    }
}

impl FileStore for DirStore {
    fn read(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        std::fs::read_to_string(&full).map_err(|e| Self::io_error("read", path, &e))
    }

    fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        std::fs::read(&full).map_err(|e| Self::io_error("read_bytes", path, &e))
    }

    fn write(&self, path: &str, content: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Self::io_error("write", path, &e))?;
        }
        std::fs::write(&full, content).map_err(|e| Self::io_error("write", path, &e))
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        Ok(full.exists())
    }

    fn list(&self, folder: &str) -> Result<Vec<String>> {
        let full = self.resolve(folder)?;
        if !full.is_dir() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&full).map_err(|e| Self::io_error("list", folder, &e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Self::io_error("list", folder, &e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_file() && name.ends_with(".md") {
                if folder.is_empty() {
                    paths.push(name);
                } else {
                    paths.push(format!("{folder}/{name}"));
                }
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn list_all(&self, folder: &str) -> Result<Vec<String>> {
        let full = self.resolve(folder)?;
        if !full.is_dir() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        Self::walk(&full, folder, &mut paths)?;
        paths.sort();
        Ok(paths)
    }
}
