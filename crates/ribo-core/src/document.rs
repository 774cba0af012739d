//! The retrievable unit of text and its stable entity identifier.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata keys recognised as the stable entity identifier, in
/// precedence order. The pathway corpus uses `stId` (Reactome stable
/// identifiers), the protein corpus uses `stable_id` (UniProt
/// accessions). Both subsystems and the graph must agree on the value.
pub const STABLE_ID_ALIASES: &[&str] = &["stId", "stable_id"];

/// Metadata keys recognised as the human-readable title, in
/// precedence order.
pub const NAME_ALIASES: &[&str] = &["displayName", "name"];

/// A retrievable unit of text with free-form metadata.
///
/// Documents are immutable once loaded; identity is the stable
/// identifier carried in the metadata, not the object itself. Two
/// documents with the same stable identifier represent the same
/// entity even if their text differs between subsystems.
///
/// # Example
///
/// ```rust
/// use ribo_core::Document;
///
/// let doc = Document::new("p53 tumor suppressor pathway")
///     .with_metadata("stId", "R-HSA-69488")
///     .with_metadata("name", "TP53 Regulates Transcription");
///
/// assert_eq!(doc.stable_id(), Some("R-HSA-69488"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// The free text content of the document.
    pub page_content: String,
    /// Key/value metadata. Must contain a stable identifier under one
    /// of [`STABLE_ID_ALIASES`] for the document to participate in
    /// fusion or seed graph traversal.
    pub metadata: BTreeMap<String, Value>,
}

impl Document {
    /// Create a document with empty metadata.
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Add a metadata entry (builder style).
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The stable entity identifier, if present under any recognised
    /// alias. Non-string values are not coerced.
    pub fn stable_id(&self) -> Option<&str> {
        STABLE_ID_ALIASES
            .iter()
            .find_map(|alias| self.metadata.get(*alias).and_then(Value::as_str))
    }

    /// The display title, if present under any recognised alias.
    pub fn display_name(&self) -> Option<&str> {
        NAME_ALIASES
            .iter()
            .find_map(|alias| self.metadata.get(*alias).and_then(Value::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_id_respects_alias_precedence() {
        let doc = Document::new("x")
            .with_metadata("stable_id", "P04637")
            .with_metadata("stId", "R-HSA-1");
        assert_eq!(doc.stable_id(), Some("R-HSA-1"));
    }

    #[test]
    fn stable_id_absent_when_no_alias_present() {
        let doc = Document::new("x").with_metadata("id", "not-a-stable-id");
        assert_eq!(doc.stable_id(), None);
    }

    #[test]
    fn non_string_identifier_is_not_coerced() {
        let doc = Document::new("x").with_metadata("stId", 42);
        assert_eq!(doc.stable_id(), None);
    }

    #[test]
    fn display_name_prefers_display_name_key() {
        let doc = Document::new("x")
            .with_metadata("name", "short")
            .with_metadata("displayName", "Long Name");
        assert_eq!(doc.display_name(), Some("Long Name"));
    }
}
