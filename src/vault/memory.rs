//! In-memory vault store for deterministic tests.

use super::{FileStore, NoteIndex, index::parse_frontmatter};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// In-memory [`FileStore`] and [`NoteIndex`] fake.
///
/// Backed by a `BTreeMap` so listings are deterministic. Frontmatter tag
/// lookup parses the stored markdown the same way [`super::VaultIndex`] does.
#[derive(Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a file, returning `self` for chaining.
    #[must_use]
    pub fn with_file(self, path: impl Into<String>, content: impl Into<String>) -> Self {
        {
            let mut files = self.lock();
            files.insert(path.into(), content.into().into_bytes());
        }
        self
    }

    /// Returns the number of stored files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no files are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.files
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl FileStore for MemoryStore {
    fn read(&self, path: &str) -> Result<String> {
        let files = self.lock();
        let bytes = files.get(path).ok_or_else(|| Error::OperationFailed {
            operation: "read".to_string(),
            cause: format!("{path}: no such file"),
        })?;
        String::from_utf8(bytes.clone()).map_err(|e| Error::OperationFailed {
            operation: "read".to_string(),
            cause: format!("{path}: {e}"),
        })
    }

    fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let files = self.lock();
        files.get(path).cloned().ok_or_else(|| Error::OperationFailed {
            operation: "read_bytes".to_string(),
            cause: format!("{path}: no such file"),
        })
    }

    fn write(&self, path: &str, content: &str) -> Result<()> {
        self.lock()
            .insert(path.to_string(), content.as_bytes().to_vec());
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.lock().contains_key(path))
    }

    fn list(&self, folder: &str) -> Result<Vec<String>> {
        let prefix = if folder.is_empty() {
            String::new()
        } else {
            format!("{folder}/")
        };
        Ok(self
            .lock()
            .keys()
            .filter(|path| {
                path.starts_with(&prefix)
                    && path.ends_with(".md")
                    && !path[prefix.len()..].contains('/')
            })
            .cloned()
            .collect())
    }

    fn list_all(&self, folder: &str) -> Result<Vec<String>> {
        let prefix = if folder.is_empty() {
            String::new()
        } else {
            format!("{folder}/")
        };
        Ok(self
            .lock()
            .keys()
            .filter(|path| path.starts_with(&prefix) && path.ends_with(".md"))
            .cloned()
            .collect())
    }
}

impl NoteIndex for MemoryStore {
    fn notes_with_tag(&self, tag: &str) -> Result<Vec<String>> {
        let files = self.lock();
        let mut matches = Vec::new();
        for (path, bytes) in files.iter() {
            if !path.ends_with(".md") {
                continue;
            }
            let Ok(text) = std::str::from_utf8(bytes) else {
                continue;
            };
            if let Some(fm) = parse_frontmatter(text) {
                let tagged = fm
                    .get("tags")
                    .and_then(|t| t.as_array())
                    .is_some_and(|tags| tags.iter().any(|t| t.as_str() == Some(tag)));
                if tagged {
                    matches.push(path.clone());
                }
            }
        }
        Ok(matches)
    }

    fn frontmatter(&self, path: &str) -> Result<Option<serde_json::Value>> {
        let text = self.read(path)?;
        Ok(parse_frontmatter(&text))
    }
}
