//! Frontmatter-scanning note index.

use super::{FileStore, NoteIndex};
use crate::Result;
use std::sync::Arc;

/// [`NoteIndex`] implementation that scans markdown frontmatter through any
/// [`FileStore`].
///
/// Walks the entire vault tree on every lookup, so a rebuild sees every
/// note regardless of folder depth. The vault sizes this crate targets make
/// a cache unnecessary; rebuilds are explicit and user-triggered.
pub struct VaultIndex {
    store: Arc<dyn FileStore>,
}

impl VaultIndex {
    /// Creates an index over the whole vault.
    #[must_use]
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self { store }
    }
}

impl NoteIndex for VaultIndex {
    fn notes_with_tag(&self, tag: &str) -> Result<Vec<String>> {
        let mut matches = Vec::new();
        for path in self.store.list_all("")? {
            let Ok(text) = self.store.read(&path) else {
                continue;
            };
            let tagged = parse_frontmatter(&text)
                .and_then(|fm| fm.get("tags").cloned())
                .and_then(|t| t.as_array().cloned())
                .is_some_and(|tags| tags.iter().any(|t| t.as_str() == Some(tag)));
            if tagged {
                matches.push(path);
            }
        }
        matches.sort();
        matches.dedup();
        Ok(matches)
    }

    fn frontmatter(&self, path: &str) -> Result<Option<serde_json::Value>> {
        let text = self.store.read(path)?;
        Ok(parse_frontmatter(&text))
    }
}

/// Parses the YAML frontmatter block of a markdown document, if present.
///
/// The block must start on the first line with `---` and end with a matching
/// `---` line. Returns `None` for absent or malformed frontmatter rather
/// than erroring; metadata lookup is always best-effort.
#[must_use]
pub fn parse_frontmatter(text: &str) -> Option<serde_json::Value> {
    let rest = text.strip_prefix("---\n")?;
    let end = rest.find("\n---")?;
    let yaml = &rest[..end];
    serde_yaml_ng::from_str::<serde_json::Value>(yaml).ok()
}
