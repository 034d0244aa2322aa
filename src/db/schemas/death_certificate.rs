//! Death certificate document schema
//!
//! Evidence uploaded during memorial activation. Records are append-only;
//! verification happens out of band.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::{IntoIndexes, MutMetadata, Record};
use crate::db::schemas::Metadata;

/// Collection name for death certificates
pub const DEATH_CERTIFICATE_COLLECTION: &str = "death_certificates";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeathCertificateDoc {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: String,

    pub file_key: String,

    #[serde(default)]
    pub verified: bool,
}

impl IntoIndexes for DeathCertificateDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "userId": 1 },
            Some(IndexOptions::builder().name("user_id_index".to_string()).build()),
        )]
    }
}

impl MutMetadata for DeathCertificateDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for DeathCertificateDoc {
    fn id(&self) -> &str {
        &self.id
    }
}
