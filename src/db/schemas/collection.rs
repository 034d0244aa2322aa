//! Collection document schema
//!
//! Shared by photo albums, video albums and 3D rooms; each kind is stored
//! in its own collection. A collection's lists are independent of its star's.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::access::Grants;
use crate::db::{IntoIndexes, MutMetadata, Record};
use crate::db::schemas::Metadata;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDoc {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub metadata: Metadata,

    /// Owning star, immutable
    pub star_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Scene preset of a 3D room ("basic", "space", "forest", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_type: Option<String>,

    #[serde(default)]
    pub can_view: Vec<String>,

    #[serde(default)]
    pub can_edit: Vec<String>,
}

impl Grants for CollectionDoc {
    fn viewers(&self) -> &[String] {
        &self.can_view
    }

    fn editors(&self) -> &[String] {
        &self.can_edit
    }
}

impl IntoIndexes for CollectionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "starId": 1 },
            Some(IndexOptions::builder().name("star_id_index".to_string()).build()),
        )]
    }
}

impl MutMetadata for CollectionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for CollectionDoc {
    fn id(&self) -> &str {
        &self.id
    }
}
