//! Accounts, contacts and memorial activation

use bson::doc;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::auth::{hash_password, verify_password, Principal};
use crate::blob::death_certificate_key;
use crate::db::Page;
use crate::db::schemas::{
    new_id, DeathCertificateDoc, Metadata, Plan, UserDoc, UserPatch, UserSummary, UserView,
};
use crate::services::{FormInput, Services};
use crate::types::{FirmamentError, Result};

/// Search results per query
const SEARCH_LIMIT: usize = 10;

const ACTIVATION_CODE_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ACTIVATION_CODE_LEN: usize = 7;
const ACTIVATION_CODE_ATTEMPTS: usize = 20;

/// A user as seen by someone else, or in full by the user themselves
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UserProfile {
    Full(UserView),
    Public(UserSummary),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationOutcome {
    pub user_id: String,
    pub dod: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
}

fn user_not_found() -> FirmamentError {
    FirmamentError::NotFound("User not found".into())
}

impl Services {
    async fn load_user(&self, user_id: &str) -> Result<UserDoc> {
        self.users.get(user_id).await?.ok_or_else(user_not_found)
    }

    /// Create an account; username and email must be unused
    pub async fn register(&self, input: &FormInput) -> Result<UserDoc> {
        let username = input.required_text("username")?.to_lowercase();
        let email = input.required_text("email")?.to_lowercase();
        let password = input
            .text("password")
            .filter(|p| !p.is_empty())
            .ok_or_else(|| FirmamentError::BadRequest("password is required".into()))?;

        if !email.contains('@') {
            return Err(FirmamentError::BadRequest("email is not valid".into()));
        }
        if self.users.count(doc! { "email": &email }).await? > 0 {
            return Err(FirmamentError::Conflict("Email already exists".into()));
        }
        if self.users.count(doc! { "username": &username }).await? > 0 {
            return Err(FirmamentError::Conflict("Username already exists".into()));
        }

        let mut user = UserDoc::new(new_id(), &username, &email, hash_password(&password)?);
        user.first_name = input.text("firstName");
        user.last_name = input.text("lastName");
        user.phone_number = input.text("phoneNumber");
        user.country = input.text("country");
        user.dob = input.date("dob")?;

        let user = self.users.insert(user).await?;
        info!(user = %user.id, "Registered {}", user.username);
        Ok(user)
    }

    /// Check credentials; unknown email and wrong password look the same
    pub async fn login(&self, email: &str, password: &str) -> Result<UserDoc> {
        let email = email.trim().to_lowercase();
        let invalid = || FirmamentError::Unauthorized("Invalid credentials".into());

        let user = self
            .users
            .find_one(doc! { "email": &email })
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(invalid());
        }
        Ok(user)
    }

    pub async fn me(&self, principal: &Principal) -> Result<UserView> {
        Ok(UserView::from(&self.load_user(principal.id()).await?))
    }

    /// Case-insensitive username prefix search
    pub async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>> {
        let prefix = query.trim().to_lowercase();
        if prefix.is_empty() {
            return Err(FirmamentError::BadRequest("username query missing".into()));
        }

        let upper = format!("{}\u{10FFFF}", prefix);
        let users = self
            .users
            .find_page(
                doc! { "username": { "$gte": &prefix, "$lt": upper } },
                Page::sorted_by("username").limit(SEARCH_LIMIT),
            )
            .await?;

        Ok(users.iter().map(UserSummary::from).collect())
    }

    pub async fn list_contacts(&self, principal: &Principal) -> Result<Vec<UserSummary>> {
        let me = self.load_user(principal.id()).await?;
        if me.contacts.is_empty() {
            return Ok(Vec::new());
        }
        let contacts = self
            .users
            .find(doc! { "_id": { "$in": &me.contacts } })
            .await?;
        Ok(contacts.iter().map(UserSummary::from).collect())
    }

    pub async fn add_contact(&self, principal: &Principal, contact_id: &str) -> Result<UserSummary> {
        if contact_id == principal.id() {
            return Err(FirmamentError::BadRequest("Cannot add yourself".into()));
        }
        let mut me = self.load_user(principal.id()).await?;
        let contact = self.load_user(contact_id).await?;

        if me.contacts.iter().any(|c| c == contact_id) {
            return Err(FirmamentError::Conflict("Already in contacts".into()));
        }
        me.contacts.push(contact.id.clone());
        self.users.save(&mut me).await?;
        Ok(UserSummary::from(&contact))
    }

    pub async fn remove_contact(&self, principal: &Principal, contact_id: &str) -> Result<()> {
        if contact_id == principal.id() {
            return Err(FirmamentError::BadRequest("Cannot remove yourself".into()));
        }
        let mut me = self.load_user(principal.id()).await?;
        let before = me.contacts.len();
        me.contacts.retain(|c| c != contact_id);
        if me.contacts.len() == before {
            return Err(FirmamentError::NotFound("Contact not found".into()));
        }
        self.users.save(&mut me).await
    }

    /// Full profile for the caller, a public card for anyone else
    pub async fn get_user(&self, principal: &Principal, user_id: &str) -> Result<UserProfile> {
        let user = self.load_user(user_id).await?;
        if user.id == principal.id() {
            Ok(UserProfile::Full(UserView::from(&user)))
        } else {
            Ok(UserProfile::Public(UserSummary::from(&user)))
        }
    }

    /// Update the caller's own profile fields
    pub async fn update_user(
        &self,
        principal: &Principal,
        user_id: &str,
        input: &FormInput,
    ) -> Result<UserView> {
        if user_id != principal.id() {
            return Err(FirmamentError::Forbidden("Cannot update another user".into()));
        }
        let mut user = self.load_user(user_id).await?;

        let patch = UserPatch {
            first_name: input.text("firstName"),
            last_name: input.text("lastName"),
            phone_number: input.text("phoneNumber"),
            country: input.text("country"),
            dob: input.date("dob")?,
            dod: input.date("dod")?,
            is_alive: input.bool("isAlive")?,
            plan: input
                .text("plan")
                .map(|p| p.trim().to_uppercase().parse::<Plan>())
                .transpose()?,
        };
        patch.apply(&mut user);

        self.users.save(&mut user).await?;
        Ok(UserView::from(&user))
    }

    /// Code the caller hands to relatives for memorial activation
    pub async fn issue_activation_code(&self, principal: &Principal) -> Result<String> {
        let mut user = self.load_user(principal.id()).await?;
        if let Some(code) = &user.activation_code {
            return Ok(code.clone());
        }

        let mut rng = self.fork_rng();
        for _ in 0..ACTIVATION_CODE_ATTEMPTS {
            let code: String = (0..ACTIVATION_CODE_LEN)
                .map(|_| {
                    let i = rng.gen_range(0..ACTIVATION_CODE_CHARS.len());
                    char::from(ACTIVATION_CODE_CHARS[i])
                })
                .collect();
            if self.users.count(doc! { "activationCode": &code }).await? == 0 {
                user.activation_code = Some(code.clone());
                self.users.save(&mut user).await?;
                info!(user = %user.id, "Activation code issued");
                return Ok(code);
            }
        }

        Err(FirmamentError::Internal(
            "Could not generate a unique activation code".into(),
        ))
    }

    /// Mark the user behind an activation code as deceased.
    ///
    /// An attached file is stored as death certificate evidence awaiting
    /// verification.
    pub async fn activate(&self, mut input: FormInput) -> Result<ActivationOutcome> {
        let code = input
            .text("activationCode")
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| FirmamentError::BadRequest("Activation code is required".into()))?;
        let dod = input.date("dod")?;

        let mut user = self
            .users
            .find_one(doc! { "activationCode": &code })
            .await?
            .ok_or_else(|| FirmamentError::NotFound("Invalid activation code".into()))?;

        if !user.is_alive {
            return Err(FirmamentError::BadRequest("User is already deactivated".into()));
        }

        let mut certificate_id = None;
        if let Some(file) = input.take_file() {
            let key = death_certificate_key(&user.id, &file.file_name);
            self.blobs.put(&key, file.bytes, &file.content_type).await?;
            let certificate = self
                .certificates
                .insert(DeathCertificateDoc {
                    id: new_id(),
                    metadata: Metadata::new(),
                    user_id: user.id.clone(),
                    file_key: key,
                    verified: false,
                })
                .await?;
            certificate_id = Some(certificate.id);
        }

        user.is_alive = false;
        if dod.is_some() {
            user.dod = dod;
        }
        self.users.save(&mut user).await?;

        info!(user = %user.id, "Memorial activated");
        Ok(ActivationOutcome {
            user_id: user.id,
            dod: user.dod,
            certificate_id,
        })
    }
}
