//! Item document schema
//!
//! One shape for every leaf kind (photos, videos, audios, documents,
//! messages and their 3D-room counterparts). Blob-backed kinds carry a
//! storage `key`; messages carry inline text and the `sender`, who is an
//! implicit editor of the message.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::access::Grants;
use crate::db::{IntoIndexes, MutMetadata, Record};
use crate::db::schemas::Metadata;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemDoc {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub metadata: Metadata,

    pub star_id: String,

    /// Album or room holding the item, absent for star-level items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,

    /// Object store key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Document format ("pdf", "docx", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    #[serde(default)]
    pub can_view: Vec<String>,

    #[serde(default)]
    pub can_edit: Vec<String>,
}

impl Grants for ItemDoc {
    fn viewers(&self) -> &[String] {
        &self.can_view
    }

    fn editors(&self) -> &[String] {
        &self.can_edit
    }

    fn implicit_editor(&self) -> Option<&str> {
        self.sender.as_deref()
    }
}

impl IntoIndexes for ItemDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "starId": 1 },
                Some(IndexOptions::builder().name("star_id_index".to_string()).build()),
            ),
            (
                doc! { "collectionId": 1 },
                Some(IndexOptions::builder().name("collection_id_index".to_string()).build()),
            ),
            // Reference counting before blob deletion
            (
                doc! { "key": 1 },
                Some(IndexOptions::builder().name("key_index".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for ItemDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for ItemDoc {
    fn id(&self) -> &str {
        &self.id
    }
}
