//! Vault capability interfaces.
//!
//! The host application's file storage and metadata index are consumed
//! through narrow traits so the pipelines can be driven against a real
//! vault directory or an in-memory fake in tests.

mod fs;
mod index;
mod memory;

pub use fs::DirStore;
pub use index::{VaultIndex, parse_frontmatter};
pub use memory::MemoryStore;

use crate::Result;

/// Trait for vault file access.
///
/// Paths are vault-relative, forward-slash separated, and include the file
/// extension (e.g. `Plans/ML - Ensembles.md`).
pub trait FileStore: Send + Sync {
    /// Reads a file as UTF-8 text.
    fn read(&self, path: &str) -> Result<String>;

    /// Reads a file as raw bytes (image attachments).
    fn read_bytes(&self, path: &str) -> Result<Vec<u8>>;

    /// Writes a file, creating parent folders as needed.
    fn write(&self, path: &str, content: &str) -> Result<()>;

    /// Checks whether a file exists.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Lists markdown files directly inside a folder (vault-relative paths).
    fn list(&self, folder: &str) -> Result<Vec<String>>;

    /// Lists markdown files under a folder recursively, including every
    /// subfolder. An empty folder name walks the whole vault.
    fn list_all(&self, folder: &str) -> Result<Vec<String>>;
}

/// Trait for vault metadata lookup.
pub trait NoteIndex: Send + Sync {
    /// Returns the vault-relative paths of all notes carrying the given
    /// frontmatter tag.
    fn notes_with_tag(&self, tag: &str) -> Result<Vec<String>>;

    /// Returns the parsed YAML frontmatter of a note, if present.
    fn frontmatter(&self, path: &str) -> Result<Option<serde_json::Value>>;
}

/// Strips characters that are illegal in file names or hostile to wikilinks.
///
/// The sanitized form of a proposal title becomes the generated file's
/// basename, so this must be stable across plan and generation runs.
#[must_use]
pub fn sanitize_file_name(title: &str) -> String {
    title
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '#' | '^' | '[' | ']'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Returns the basename (file stem) of a vault-relative path.
#[must_use]
pub fn basename(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.strip_suffix(".md").unwrap_or(name)
}

/// Formats a `[[path|basename]]` wikilink for a vault-relative path.
#[must_use]
pub fn wikilink(path: &str) -> String {
    let target = path.strip_suffix(".md").unwrap_or(path);
    format!("[[{target}|{}]]", basename(path))
}
