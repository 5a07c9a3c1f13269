use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Bibliographic item body for `POST /{library}/items`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub item_type: &'static str,
    pub title: String,
    pub creators: Vec<Creator>,
    pub abstract_note: String,
    pub date: String,
    pub url: String,
    #[serde(rename = "DOI", skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(rename = "archiveID", skip_serializing_if = "Option::is_none")]
    pub archive_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_title: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<String>,
}

/// Single-field creator form, used when names are not split into first/last.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    pub creator_type: &'static str,
    pub name: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Tag {
    pub tag: String,
}

/// Linked-URL attachment: Zotero stores the link, not the file.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub item_type: &'static str,
    pub parent_item: String,
    pub link_mode: &'static str,
    pub title: String,
    pub url: String,
    pub content_type: &'static str,
}

/// Response to any multi-object write. Maps are keyed by the index of the submitted object.
#[derive(Deserialize, Debug, Default)]
pub struct WriteResponse {
    #[serde(default)]
    pub successful: HashMap<String, WrittenObject>,
    #[serde(default)]
    pub failed: HashMap<String, WriteFailure>,
}

#[derive(Deserialize, Debug)]
pub struct WrittenObject {
    pub key: String,
}

#[derive(Deserialize, Debug)]
pub struct WriteFailure {
    pub code: Option<u16>,
    pub message: Option<String>,
}

/// Entry from `GET /{library}/collections`.
#[derive(Deserialize, Debug)]
pub struct CollectionEntry {
    pub key: String,
    pub data: CollectionData,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CollectionData {
    pub name: String,
    /// Either a parent key or `false` for top-level collections.
    #[serde(default)]
    pub parent_collection: serde_json::Value,
}

#[derive(Serialize, Debug)]
pub struct NewCollection<'a> {
    pub name: &'a str,
}

/// Entry from `GET /{library}/items?q=...`. Only the title matters for duplicate checks.
#[derive(Deserialize, Debug)]
pub struct LibraryItem {
    pub data: LibraryItemData,
}

#[derive(Deserialize, Debug)]
pub struct LibraryItemData {
    #[serde(default)]
    pub title: String,
}

/// A collection as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub key: String,
    pub name: String,
    pub parent: Option<String>,
}

impl From<CollectionEntry> for Collection {
    fn from(entry: CollectionEntry) -> Self {
        Self {
            key: entry.key,
            name: entry.data.name,
            parent: entry.data.parent_collection.as_str().map(String::from),
        }
    }
}

/// Aggregate outcome of an export. Per-paper detail is logged, not returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub added: usize,
    pub failed: usize,
    pub attachments: usize,
}
