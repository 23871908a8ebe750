//! Embedded-image extraction for multimodal completion calls.

use crate::llm::ImageData;
use crate::vault::FileStore;
use regex::Regex;
use std::sync::LazyLock;

/// Embed pattern: `![[diagram.png]]`.
static IMAGE_EMBED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[\[([^\]\|]+\.(?i:png|jpe?g|gif|webp))(?:\|[^\]]*)?\]\]")
        .unwrap_or_else(|_| unreachable!())
});

/// Extracts embedded image references from markdown, in order.
#[must_use]
pub fn extract_image_refs(text: &str) -> Vec<String> {
    IMAGE_EMBED
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .collect()
}

/// Loads and encodes the referenced images that actually exist in the
/// vault. Unresolvable references are skipped with a warning; missing
/// pictures should not block planning.
#[must_use]
pub fn load_images(store: &dyn FileStore, refs: &[String]) -> Vec<ImageData> {
    let mut images = Vec::new();
    for reference in refs {
        match store.read_bytes(reference) {
            Ok(bytes) => images.push(ImageData::from_bytes(reference, &bytes)),
            Err(err) => {
                tracing::warn!(reference, error = %err, "Skipping unresolvable image embed");
            },
        }
    }
    images
}
