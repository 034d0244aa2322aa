//! Star document schema
//!
//! The root ownership unit. Coordinates are assigned once at creation and
//! the rights lists change only through the rights mutator, so neither
//! appears in `StarPatch`.

use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::access::Grants;
use crate::db::{IntoIndexes, MutMetadata, Record};
use crate::db::schemas::Metadata;

/// Collection name for stars
pub const STAR_COLLECTION: &str = "stars";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StarDoc {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub metadata: Metadata,

    /// Owner, immutable after creation
    pub user_id: String,

    #[serde(default)]
    pub is_private: bool,

    /// Who the star is for ("myself", "dedicate", "lovedOne", ...)
    #[serde(default = "default_star_for")]
    pub star_for: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub long_term_maintenance: bool,

    pub x: f64,
    pub y: f64,
    pub z: f64,

    #[serde(default)]
    pub can_view: Vec<String>,

    #[serde(default)]
    pub can_edit: Vec<String>,
}

fn default_star_for() -> String {
    "myself".to_string()
}

/// Fields a star update may touch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StarPatch {
    pub is_private: Option<bool>,
    pub star_for: Option<String>,
    pub color: Option<String>,
    pub word: Option<String>,
    pub activation_date: Option<DateTime<Utc>>,
    pub long_term_maintenance: Option<bool>,
}

impl StarPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch; returns whether anything was set
    pub fn apply(self, star: &mut StarDoc) -> bool {
        let changed = !self.is_empty();
        if let Some(v) = self.is_private {
            star.is_private = v;
        }
        if let Some(v) = self.star_for {
            star.star_for = v;
        }
        if let Some(v) = self.color {
            star.color = Some(v);
        }
        if let Some(v) = self.word {
            star.word = Some(v);
        }
        if let Some(v) = self.activation_date {
            star.activation_date = Some(v);
        }
        if let Some(v) = self.long_term_maintenance {
            star.long_term_maintenance = v;
        }
        changed
    }
}

impl Grants for StarDoc {
    fn viewers(&self) -> &[String] {
        &self.can_view
    }

    fn editors(&self) -> &[String] {
        &self.can_edit
    }

    fn implicit_editor(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

impl IntoIndexes for StarDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "userId": 1 },
                Some(IndexOptions::builder().name("user_id_index".to_string()).build()),
            ),
            (
                doc! { "canView": 1 },
                Some(IndexOptions::builder().name("can_view_index".to_string()).build()),
            ),
            (
                doc! { "canEdit": 1 },
                Some(IndexOptions::builder().name("can_edit_index".to_string()).build()),
            ),
            // Spawn collision lookups
            (
                doc! { "x": 1, "y": 1, "z": 1 },
                Some(IndexOptions::builder().name("position_index".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for StarDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for StarDoc {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_leaves_position_and_rights() {
        let mut star = StarDoc {
            id: "s1".into(),
            user_id: "u1".into(),
            x: 1.5,
            y: -2.0,
            z: 300.1,
            can_view: vec!["u2".into()],
            ..Default::default()
        };

        let changed = StarPatch {
            word: Some("forever".into()),
            is_private: Some(true),
            ..Default::default()
        }
        .apply(&mut star);

        assert!(changed);
        assert_eq!(star.word.as_deref(), Some("forever"));
        assert!(star.is_private);
        assert_eq!((star.x, star.y, star.z), (1.5, -2.0, 300.1));
        assert_eq!(star.can_view, vec!["u2".to_string()]);
    }

    #[test]
    fn test_bson_field_names() {
        let star = StarDoc {
            id: "abc".into(),
            user_id: "u1".into(),
            ..Default::default()
        };
        let doc = bson::to_document(&star).unwrap();
        assert_eq!(doc.get_str("_id").unwrap(), "abc");
        assert_eq!(doc.get_str("userId").unwrap(), "u1");
        assert!(doc.contains_key("canView"));
        assert!(!doc.contains_key("color"));
    }
}
