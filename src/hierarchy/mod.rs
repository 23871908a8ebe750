//! Hierarchy index maintenance.
//!
//! Structural notes (fundamentals, major cores, MOCs) are tracked in a
//! single markdown index so planning and generation prompts can carry the
//! vault's existing conceptual skeleton as context. The format is a header
//! line plus a flat list of `[[path|basename]]` links, regenerated
//! wholesale on rebuild or appended to incrementally after a batch.

use crate::vault::{FileStore, NoteIndex, wikilink};
use crate::Result;
use std::sync::Arc;

/// Header line of the hierarchy index document.
pub const INDEX_HEADER: &str = "# Hierarchy";

/// Frontmatter tags that mark a note as structural.
pub const STRUCTURAL_TAGS: [&str; 3] = ["fundamental", "major_core", "moc"];

/// Maps a note kind to the structural tag it carries, if any.
///
/// Ordinary kinds (Standard, Comparison, Cheatsheet, ...) are not
/// structural and do not enter the index.
#[must_use]
pub fn structural_tag_for_kind(kind: &str) -> Option<&'static str> {
    match kind.trim().to_lowercase().as_str() {
        "fundamental" => Some("fundamental"),
        "core" | "major core" => Some("major_core"),
        "moc" => Some("moc"),
        _ => None,
    }
}

/// Maintains the hierarchy index document over a [`FileStore`].
pub struct HierarchyIndex {
    store: Arc<dyn FileStore>,
    path: String,
}

impl HierarchyIndex {
    /// Creates an index bound to a vault-relative document path.
    #[must_use]
    pub fn new(store: Arc<dyn FileStore>, path: impl Into<String>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    /// Reads the current index text, if the document exists.
    pub fn context(&self) -> Result<Option<String>> {
        if !self.store.exists(&self.path)? {
            return Ok(None);
        }
        let text = self.store.read(&self.path)?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(text))
    }

    /// Rebuilds the index from scratch by scanning the note index for
    /// every structural tag.
    pub fn rebuild(&self, index: &dyn NoteIndex) -> Result<usize> {
        let mut paths = Vec::new();
        for tag in STRUCTURAL_TAGS {
            paths.extend(index.notes_with_tag(tag)?);
        }
        paths.sort();
        paths.dedup();

        let mut text = format!("{INDEX_HEADER}\n\n");
        for path in &paths {
            text.push_str("- ");
            text.push_str(&wikilink(path));
            text.push('\n');
        }
        self.store.write(&self.path, &text)?;
        tracing::info!(notes = paths.len(), "Rebuilt hierarchy index");
        Ok(paths.len())
    }

    /// Appends links for newly generated structural notes, skipping paths
    /// already present. Creates the document on first use.
    pub fn append(&self, paths: &[String]) -> Result<usize> {
        if paths.is_empty() {
            return Ok(0);
        }

        let mut text = if self.store.exists(&self.path)? {
            self.store.read(&self.path)?
        } else {
            format!("{INDEX_HEADER}\n\n")
        };
        if !text.ends_with('\n') {
            text.push('\n');
        }

        let mut added = 0;
        for path in paths {
            let link = wikilink(path);
            if text.contains(link.as_str()) {
                continue;
            }
            text.push_str("- ");
            text.push_str(&link);
            text.push('\n');
            added += 1;
        }

        if added > 0 {
            self.store.write(&self.path, &text)?;
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::{MemoryStore, VaultIndex};

    #[test]
    fn test_structural_tag_for_kind() {
        assert_eq!(structural_tag_for_kind("Fundamental"), Some("fundamental"));
        assert_eq!(structural_tag_for_kind("Core"), Some("major_core"));
        assert_eq!(structural_tag_for_kind("Major Core"), Some("major_core"));
        assert_eq!(structural_tag_for_kind("MOC"), Some("moc"));
        assert_eq!(structural_tag_for_kind("Standard"), None);
        assert_eq!(structural_tag_for_kind("Cheatsheet"), None);
    }

    #[test]
    fn test_rebuild_scans_all_structural_tags() {
        let store = Arc::new(
            MemoryStore::new()
                .with_file(
                    "Notes/ML Basics.md",
                    "---\ntags: [fundamental]\n---\nbody",
                )
                .with_file("Notes/ML MOC.md", "---\ntags: [moc]\n---\nbody")
                .with_file("Notes/Scratch.md", "---\ntags: [scratch]\n---\nbody"),
        );
        let index = HierarchyIndex::new(Arc::clone(&store) as Arc<dyn FileStore>, "Hierarchy.md");
        let count = index.rebuild(store.as_ref()).unwrap();
        assert_eq!(count, 2);

        let text = store.read("Hierarchy.md").unwrap();
        assert!(text.starts_with("# Hierarchy\n"));
        assert!(text.contains("- [[Notes/ML Basics|ML Basics]]"));
        assert!(text.contains("- [[Notes/ML MOC|ML MOC]]"));
        assert!(!text.contains("Scratch"));
    }

    #[test]
    fn test_rebuild_sees_notes_in_nested_folders() {
        let store = Arc::new(
            MemoryStore::new()
                .with_file("Notes/Deep/ML MOC.md", "---\ntags: [moc]\n---\nbody")
                .with_file("Drafts/Core Note.md", "---\ntags: [major_core]\n---\nbody"),
        );
        let vault_index = VaultIndex::new(Arc::clone(&store) as Arc<dyn FileStore>);
        let index = HierarchyIndex::new(Arc::clone(&store) as Arc<dyn FileStore>, "Hierarchy.md");
        assert_eq!(index.rebuild(&vault_index).unwrap(), 2);

        let text = store.read("Hierarchy.md").unwrap();
        assert!(text.contains("- [[Notes/Deep/ML MOC|ML MOC]]"));
        assert!(text.contains("- [[Drafts/Core Note|Core Note]]"));
    }

    #[test]
    fn test_rebuild_replaces_previous_content() {
        let store = Arc::new(
            MemoryStore::new()
                .with_file("Hierarchy.md", "# Hierarchy\n\n- [[Gone|Gone]]\n")
                .with_file("Notes/Kept.md", "---\ntags: [moc]\n---\nbody"),
        );
        let index = HierarchyIndex::new(Arc::clone(&store) as Arc<dyn FileStore>, "Hierarchy.md");
        index.rebuild(store.as_ref()).unwrap();

        let text = store.read("Hierarchy.md").unwrap();
        assert!(text.contains("Kept"));
        assert!(!text.contains("Gone"));
    }

    #[test]
    fn test_append_creates_and_dedups() {
        let store = Arc::new(MemoryStore::new());
        let index = HierarchyIndex::new(Arc::clone(&store) as Arc<dyn FileStore>, "Hierarchy.md");

        let entries = vec!["Drafts/ML - Bagging.md".to_string()];
        assert_eq!(index.append(&entries).unwrap(), 1);
        // Second append of the same path is a no-op.
        assert_eq!(index.append(&entries).unwrap(), 0);

        let text = store.read("Hierarchy.md").unwrap();
        assert!(text.starts_with("# Hierarchy\n"));
        assert_eq!(
            text.matches("- [[Drafts/ML - Bagging|ML - Bagging]]").count(),
            1
        );
    }

    #[test]
    fn test_append_preserves_existing_links() {
        let store = Arc::new(MemoryStore::new());
        store
            .write("Hierarchy.md", "# Hierarchy\n\n- [[A|A]]\n")
            .unwrap();
        let index = HierarchyIndex::new(Arc::clone(&store) as Arc<dyn FileStore>, "Hierarchy.md");
        index.append(&["Drafts/B.md".to_string()]).unwrap();

        let text = store.read("Hierarchy.md").unwrap();
        assert!(text.contains("- [[A|A]]"));
        assert!(text.contains("- [[Drafts/B|B]]"));
    }

    #[test]
    fn test_context_none_when_absent_or_empty() {
        let store = Arc::new(MemoryStore::new());
        let index = HierarchyIndex::new(Arc::clone(&store) as Arc<dyn FileStore>, "Hierarchy.md");
        assert!(index.context().unwrap().is_none());

        store.write("Hierarchy.md", "  \n").unwrap();
        assert!(index.context().unwrap().is_none());
    }
}
