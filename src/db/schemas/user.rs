//! User document schema
//!
//! Stores credentials, profile fields, memorial status and contacts.

use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::db::{IntoIndexes, MutMetadata, Record};
use crate::db::schemas::Metadata;
use crate::types::FirmamentError;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// Subscription tier
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    #[default]
    Explorer,
    Premium,
    Legacy,
}

impl FromStr for Plan {
    type Err = FirmamentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EXPLORER" => Ok(Self::Explorer),
            "PREMIUM" => Ok(Self::Premium),
            "LEGACY" => Ok(Self::Legacy),
            other => Err(FirmamentError::BadRequest(format!("Invalid plan '{}'", other))),
        }
    }
}

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub metadata: Metadata,

    /// Unique, stored lowercase
    pub username: String,

    /// Unique, stored lowercase
    pub email: String,

    /// Argon2 password hash
    pub password_hash: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<DateTime<Utc>>,

    /// Date of death, set by memorial activation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dod: Option<DateTime<Utc>>,

    #[serde(default = "default_true")]
    pub is_alive: bool,

    #[serde(default)]
    pub plan: Plan,

    /// Contacts kept by this user (one-directional)
    #[serde(default)]
    pub contacts: Vec<String>,

    /// Code handed to relatives for memorial activation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_code: Option<String>,
}

fn default_true() -> bool {
    true
}

impl UserDoc {
    /// Create a new user document
    pub fn new(id: String, username: &str, email: &str, password_hash: String) -> Self {
        Self {
            id,
            metadata: Metadata::new(),
            username: username.trim().to_lowercase(),
            email: email.trim().to_lowercase(),
            password_hash,
            first_name: None,
            last_name: None,
            phone_number: None,
            country: None,
            dob: None,
            dod: None,
            is_alive: true,
            plan: Plan::Explorer,
            contacts: Vec::new(),
            activation_code: None,
        }
    }
}

/// Profile fields a user may change on their own record
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub country: Option<String>,
    pub dob: Option<DateTime<Utc>>,
    pub dod: Option<DateTime<Utc>>,
    pub is_alive: Option<bool>,
    pub plan: Option<Plan>,
}

impl UserPatch {
    pub fn apply(self, user: &mut UserDoc) {
        if let Some(v) = self.first_name {
            user.first_name = Some(v);
        }
        if let Some(v) = self.last_name {
            user.last_name = Some(v);
        }
        if let Some(v) = self.phone_number {
            user.phone_number = Some(v);
        }
        if let Some(v) = self.country {
            user.country = Some(v);
        }
        if let Some(v) = self.dob {
            user.dob = Some(v);
        }
        if let Some(v) = self.dod {
            user.dod = Some(v);
        }
        if let Some(v) = self.is_alive {
            user.is_alive = v;
        }
        if let Some(v) = self.plan {
            user.plan = v;
        }
    }
}

/// User as returned to clients, without credentials
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dod: Option<DateTime<Utc>>,
    pub is_alive: bool,
    pub plan: Plan,
    pub contacts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&UserDoc> for UserView {
    fn from(user: &UserDoc) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            phone_number: user.phone_number.clone(),
            country: user.country.clone(),
            dob: user.dob,
            dod: user.dod,
            is_alive: user.is_alive,
            plan: user.plan,
            contacts: user.contacts.clone(),
            created_at: user.metadata.created_at,
        }
    }
}

/// Minimal user card for search results and contact lists
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl From<&UserDoc> for UserSummary {
    fn from(user: &UserDoc) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "username": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("username_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "activationCode": 1 },
                Some(
                    IndexOptions::builder()
                        .sparse(true)
                        .name("activation_code_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for UserDoc {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_normalizes_identity() {
        let user = UserDoc::new("id1".into(), " Ada ", "ADA@Example.com", "hash".into());
        assert_eq!(user.username, "ada");
        assert_eq!(user.email, "ada@example.com");
        assert!(user.is_alive);
        assert_eq!(user.plan, Plan::Explorer);
    }

    #[test]
    fn test_view_hides_credentials() {
        let user = UserDoc::new("id1".into(), "ada", "ada@example.com", "secret-hash".into());
        let json = serde_json::to_string(&UserView::from(&user)).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"plan\":\"EXPLORER\""));
    }

    #[test]
    fn test_plan_parse() {
        assert_eq!("LEGACY".parse::<Plan>().unwrap(), Plan::Legacy);
        assert!("GOLD".parse::<Plan>().is_err());
    }
}
