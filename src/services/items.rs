//! Item lifecycle (photos, videos, audios, documents, messages)
//!
//! Blob-backed items store only the object key; clients receive signed URLs.
//! Several records may share one key (copied album items), so every path
//! that drops or replaces a key goes through
//! [`Services::release_blob_if_unreferenced`] after the database write.

use bson::doc;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::access::{self, AccessPolicy, Capability, Grants};
use crate::auth::Principal;
use crate::blob::blob_key;
use crate::db::schemas::{new_id, CollectionDoc, ItemDoc, Metadata, StarDoc};
use crate::resources::ItemKind;
use crate::services::{FormInput, ListingScope, Services};
use crate::types::{FirmamentError, Result};

/// Address of an item kind under its star and, for collection items, its
/// collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemPath<'a> {
    pub kind: ItemKind,
    pub star_id: &'a str,
    pub collection_id: Option<&'a str>,
}

impl<'a> ItemPath<'a> {
    pub fn star_level(kind: ItemKind, star_id: &'a str) -> Self {
        Self {
            kind,
            star_id,
            collection_id: None,
        }
    }

    pub fn in_collection(kind: ItemKind, star_id: &'a str, collection_id: &'a str) -> Self {
        Self {
            kind,
            star_id,
            collection_id: Some(collection_id),
        }
    }
}

/// Item as returned to clients, with a signed retrieval URL for blobs
#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: ItemDoc,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Result of a copy or move between collections
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransferOutcome {
    /// Ids of the created (copy) or relocated (move) records
    pub ids: Vec<String>,
    /// Requested ids that were not transferred
    pub skipped: Vec<String>,
}

fn parent_chain(collection: Option<&CollectionDoc>) -> Vec<&dyn Grants> {
    collection.into_iter().map(|c| c as &dyn Grants).collect()
}

fn item_chain<'a>(
    kind: ItemKind,
    collection: Option<&'a CollectionDoc>,
    item: &'a ItemDoc,
) -> Vec<&'a dyn Grants> {
    let mut chain = parent_chain(collection);
    if kind.has_own_grants() {
        chain.push(item);
    }
    chain
}

fn is_document(kind: ItemKind) -> bool {
    matches!(kind, ItemKind::Document | ItemKind::RoomDocument)
}

/// Document format from the file extension
fn doc_type_from_name(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_lowercase())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "pdf".to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Services {
    async fn resolve_parent(&self, path: &ItemPath<'_>) -> Result<(StarDoc, Option<CollectionDoc>)> {
        let star = self.load_star(path.star_id).await?;
        let collection = match (path.kind.parent(), path.collection_id) {
            (Some(kind), Some(id)) => Some(self.load_collection(kind, &star, id).await?),
            (None, None) => None,
            _ => return Err(FirmamentError::NotFound("Resource not found".into())),
        };
        Ok((star, collection))
    }

    async fn view(&self, item: ItemDoc, ttl: u64) -> ItemView {
        let url = match &item.key {
            Some(key) => self.sign_url(key, ttl).await,
            None => None,
        };
        ItemView { item, url }
    }

    /// Create an item; blob kinds require an uploaded file, messages a text
    pub async fn create_item(
        &self,
        principal: &Principal,
        path: ItemPath<'_>,
        mut input: FormInput,
    ) -> Result<ItemView> {
        let kind = path.kind;
        let (star, collection) = self.resolve_parent(&path).await?;
        access::authorize(
            &star,
            &parent_chain(collection.as_ref()),
            principal.id(),
            Capability::Edit,
            AccessPolicy::Delegated,
        )?;

        let mut item = ItemDoc {
            id: new_id(),
            metadata: Metadata::new(),
            star_id: star.id.clone(),
            collection_id: collection.as_ref().map(|c| c.id.clone()),
            title: non_empty(input.text("title")),
            description: non_empty(input.text("description")),
            ..Default::default()
        };

        if kind.has_own_grants() {
            item.can_view = input.acl("canView").unwrap_or_default();
            item.can_edit = input.acl("canEdit").unwrap_or_default();
        }

        if kind.is_message() {
            item.message = Some(input.required_text("message")?);
            item.sender = Some(principal.user_id.clone());
        } else {
            let file = input.take_file().ok_or_else(|| {
                FirmamentError::BadRequest(format!("No {} file uploaded", kind.upload_field()))
            })?;
            if is_document(kind) {
                item.doc_type = Some(
                    non_empty(input.text("docType"))
                        .unwrap_or_else(|| doc_type_from_name(&file.file_name)),
                );
            }
            let key = blob_key(kind, &star.id, item.collection_id.as_deref(), &file.file_name);
            self.blobs.put(&key, file.bytes, &file.content_type).await?;
            item.key = Some(key);
            item.original_name = Some(file.file_name);
            item.content_type = Some(file.content_type);
        }

        let uploaded = item.key.clone();
        let item = match self.item_repo(kind).insert(item).await {
            Ok(item) => item,
            Err(e) => {
                if let Some(key) = uploaded {
                    self.release_blob_if_unreferenced(&key).await;
                }
                return Err(e);
            }
        };

        info!(star = %star.id, item = %item.id, "{} created", kind.label());
        Ok(self.view(item, self.ttl.detail).await)
    }

    /// Items under the parent visible to the caller, with list-TTL URLs
    pub async fn list_items(
        &self,
        principal: Option<&Principal>,
        path: ItemPath<'_>,
    ) -> Result<Vec<ItemView>> {
        let kind = path.kind;
        let (star, collection) = self.resolve_parent(&path).await?;
        let scope = self.listing_scope(kind.into(), &star, collection.as_ref(), principal)?;

        let mut filter = doc! { "starId": &star.id };
        if let Some(collection) = &collection {
            filter.insert("collectionId", &collection.id);
        }
        let mut items = self.item_repo(kind).find(filter).await?;

        if let ListingScope::Only(viewer) = scope {
            items.retain(|item| kind.has_own_grants() && item.grants_view(&viewer));
            if items.is_empty() {
                return Err(FirmamentError::NotFound("Not found".into()));
            }
        }

        let mut views = Vec::with_capacity(items.len());
        for item in items {
            views.push(self.view(item, self.ttl.list).await);
        }
        Ok(views)
    }

    pub async fn get_item(
        &self,
        principal: &Principal,
        path: ItemPath<'_>,
        item_id: &str,
    ) -> Result<ItemView> {
        let kind = path.kind;
        let (star, collection) = self.resolve_parent(&path).await?;
        let item = self
            .load_item(kind, &star, collection.as_ref(), item_id)
            .await?;
        access::authorize(
            &star,
            &item_chain(kind, collection.as_ref(), &item),
            principal.id(),
            Capability::View,
            AccessPolicy::Delegated,
        )?;
        Ok(self.view(item, self.ttl.detail).await)
    }

    /// Update metadata, access lists and optionally replace the blob
    pub async fn update_item(
        &self,
        principal: &Principal,
        path: ItemPath<'_>,
        item_id: &str,
        mut input: FormInput,
    ) -> Result<ItemView> {
        let kind = path.kind;
        let (star, collection) = self.resolve_parent(&path).await?;
        let mut item = self
            .load_item(kind, &star, collection.as_ref(), item_id)
            .await?;
        access::authorize(
            &star,
            &item_chain(kind, collection.as_ref(), &item),
            principal.id(),
            Capability::Edit,
            AccessPolicy::Delegated,
        )?;

        if let Some(title) = non_empty(input.text("title")) {
            item.title = Some(title);
        }
        if let Some(description) = input.text("description") {
            item.description = non_empty(Some(description));
        }
        if is_document(kind) {
            if let Some(doc_type) = non_empty(input.text("docType")) {
                item.doc_type = Some(doc_type);
            }
        }
        if kind.is_message() && input.has("message") {
            item.message = Some(input.required_text("message")?);
        }
        if kind.has_own_grants() {
            if let Some(viewers) = input.acl("canView") {
                item.can_view = viewers;
            }
            if let Some(editors) = input.acl("canEdit") {
                item.can_edit = editors;
            }
        }

        let mut replaced = None;
        let mut uploaded = None;
        if kind.is_blob() {
            if let Some(file) = input.take_file() {
                let key = blob_key(kind, &star.id, item.collection_id.as_deref(), &file.file_name);
                self.blobs.put(&key, file.bytes, &file.content_type).await?;
                replaced = item.key.replace(key.clone());
                uploaded = Some(key);
                item.original_name = Some(file.file_name);
                item.content_type = Some(file.content_type);
            }
        }

        if let Err(e) = self.item_repo(kind).save(&mut item).await {
            if let Some(key) = uploaded {
                self.release_blob_if_unreferenced(&key).await;
            }
            return Err(e);
        }

        if let Some(old) = replaced {
            self.release_blob_if_unreferenced(&old).await;
        }

        Ok(self.view(item, self.ttl.detail).await)
    }

    pub async fn delete_item(
        &self,
        principal: &Principal,
        path: ItemPath<'_>,
        item_id: &str,
    ) -> Result<()> {
        let kind = path.kind;
        let (star, collection) = self.resolve_parent(&path).await?;
        let item = self
            .load_item(kind, &star, collection.as_ref(), item_id)
            .await?;
        let policy = self.policies.get(kind);
        access::authorize(
            &star,
            &item_chain(kind, collection.as_ref(), &item),
            principal.id(),
            Capability::Edit,
            policy.delete,
        )?;

        self.purge_item(kind, &item).await?;
        info!(star = %star.id, item = %item.id, "{} deleted", kind.label());
        Ok(())
    }

    /// Delete the record, then its blob if nothing else references it
    pub(crate) async fn purge_item(&self, kind: ItemKind, item: &ItemDoc) -> Result<()> {
        self.item_repo(kind).delete(&item.id).await?;
        if let Some(key) = &item.key {
            self.release_blob_if_unreferenced(key).await;
        }
        Ok(())
    }

    /// The collection an existing item sits in, if it still exists
    async fn source_collection(
        &self,
        kind: ItemKind,
        star: &StarDoc,
        item: &ItemDoc,
    ) -> Result<Option<CollectionDoc>> {
        match (kind.parent(), item.collection_id.as_deref()) {
            (Some(parent), Some(id)) => {
                self.collection_repo(parent)
                    .find_one(doc! { "_id": id, "starId": &star.id })
                    .await
            }
            _ => Ok(None),
        }
    }

    /// Resolve the target collection of a transfer and require edit on it
    async fn transfer_target(
        &self,
        principal: &Principal,
        path: &ItemPath<'_>,
        ids: &[String],
    ) -> Result<(StarDoc, CollectionDoc)> {
        if path.kind.parent().is_none() {
            return Err(FirmamentError::BadRequest(
                "Only collection items can be transferred".into(),
            ));
        }
        if ids.is_empty() {
            return Err(FirmamentError::BadRequest("No item ids given".into()));
        }

        let (star, collection) = self.resolve_parent(path).await?;
        let target = collection
            .ok_or_else(|| FirmamentError::NotFound("Resource not found".into()))?;
        access::authorize(
            &star,
            &[&target],
            principal.id(),
            Capability::Edit,
            AccessPolicy::Delegated,
        )?;
        Ok((star, target))
    }

    /// Copy items of the same star into the collection at `path`.
    ///
    /// Copies share the source blob key. Items the caller cannot view, and
    /// items whose blob the target already holds, are skipped.
    pub async fn copy_items(
        &self,
        principal: &Principal,
        path: ItemPath<'_>,
        ids: &[String],
    ) -> Result<TransferOutcome> {
        let kind = path.kind;
        let (star, target) = self.transfer_target(principal, &path, ids).await?;
        let repo = self.item_repo(kind);

        let mut held: HashSet<String> = repo
            .find(doc! { "collectionId": &target.id })
            .await?
            .into_iter()
            .filter_map(|item| item.key)
            .collect();

        let mut outcome = TransferOutcome::default();
        for id in ids {
            let Some(source) = repo.find_one(doc! { "_id": id, "starId": &star.id }).await? else {
                outcome.skipped.push(id.clone());
                continue;
            };
            let source_collection = self.source_collection(kind, &star, &source).await?;
            let visible = access::can_access_resource(
                &star,
                &item_chain(kind, source_collection.as_ref(), &source),
                principal.id(),
                Capability::View,
            );
            let duplicate = source.key.as_ref().is_some_and(|key| held.contains(key));
            if !visible || duplicate {
                outcome.skipped.push(id.clone());
                continue;
            }

            let copy = repo
                .insert(ItemDoc {
                    id: new_id(),
                    metadata: Metadata::new(),
                    collection_id: Some(target.id.clone()),
                    ..source
                })
                .await?;
            if let Some(key) = &copy.key {
                held.insert(key.clone());
            }
            outcome.ids.push(copy.id);
        }

        debug!(
            collection = %target.id,
            "Copied {} {} item(s), skipped {}",
            outcome.ids.len(),
            kind.label(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    /// Move items of the same star into the collection at `path`; requires
    /// edit on each source as well as on the target
    pub async fn move_items(
        &self,
        principal: &Principal,
        path: ItemPath<'_>,
        ids: &[String],
    ) -> Result<TransferOutcome> {
        let kind = path.kind;
        let (star, target) = self.transfer_target(principal, &path, ids).await?;
        let repo = self.item_repo(kind);

        let mut outcome = TransferOutcome::default();
        for id in ids {
            let Some(mut item) = repo.find_one(doc! { "_id": id, "starId": &star.id }).await? else {
                outcome.skipped.push(id.clone());
                continue;
            };
            if item.collection_id.as_deref() == Some(target.id.as_str()) {
                outcome.skipped.push(id.clone());
                continue;
            }
            let source_collection = self.source_collection(kind, &star, &item).await?;
            let editable = access::can_access_resource(
                &star,
                &item_chain(kind, source_collection.as_ref(), &item),
                principal.id(),
                Capability::Edit,
            );
            if !editable {
                outcome.skipped.push(id.clone());
                continue;
            }

            item.collection_id = Some(target.id.clone());
            repo.save(&mut item).await?;
            outcome.ids.push(item.id);
        }

        debug!(
            collection = %target.id,
            "Moved {} {} item(s), skipped {}",
            outcome.ids.len(),
            kind.label(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    /// Signed URL for a stored key the caller may view.
    ///
    /// The key must belong to an item record; access follows that item's
    /// chain. `expires` is capped at the detail TTL.
    pub async fn sign_key(
        &self,
        principal: &Principal,
        key: &str,
        expires: Option<u64>,
    ) -> Result<String> {
        if key.trim().is_empty() {
            return Err(FirmamentError::BadRequest("key is required".into()));
        }

        for kind in ItemKind::blob_kinds() {
            for item in self.item_repo(kind).find(doc! { "key": key }).await? {
                let Some(star) = self.stars.get(&item.star_id).await? else {
                    continue;
                };
                let collection = self.source_collection(kind, &star, &item).await?;
                if kind.parent().is_some() && collection.is_none() {
                    continue;
                }
                let visible = access::can_access_resource(
                    &star,
                    &item_chain(kind, collection.as_ref(), &item),
                    principal.id(),
                    Capability::View,
                );
                if visible {
                    let ttl = expires.unwrap_or(self.ttl.list).clamp(1, self.ttl.detail);
                    return self.blobs.sign(key, ttl).await;
                }
            }
        }

        Err(FirmamentError::NotFound("Not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::CollectionKind;
    use crate::services::testing::*;
    use crate::services::UploadedFile;
    use bytes::Bytes;
    use serde_json::json;

    fn form(value: serde_json::Value) -> FormInput {
        FormInput::from_json(value).unwrap()
    }

    fn upload(value: serde_json::Value, name: &str) -> FormInput {
        form(value).with_file(UploadedFile {
            field: "file".into(),
            file_name: name.into(),
            content_type: "application/octet-stream".into(),
            bytes: Bytes::from_static(b"blob"),
        })
    }

    async fn star_with_owner(h: &Harness) -> StarDoc {
        h.services
            .create_star(&principal("u1"), &FormInput::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_blob_items_require_file() {
        let h = harness();
        let star = star_with_owner(&h).await;
        let err = h
            .services
            .create_item(
                &principal("u1"),
                ItemPath::star_level(ItemKind::Audio, &star.id),
                FormInput::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FirmamentError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_document_upload_and_detail_url() {
        let h = harness();
        let owner = principal("u1");
        let star = star_with_owner(&h).await;
        let path = ItemPath::star_level(ItemKind::Document, &star.id);

        let created = h
            .services
            .create_item(&owner, path, upload(json!({ "canEdit": "u2" }), "will.DOCX"))
            .await
            .unwrap();
        let key = created.item.key.clone().unwrap();
        assert!(key.starts_with(&format!("stars/{}/documents/", star.id)));
        assert!(h.blobs.contains(&key));
        assert_eq!(created.item.doc_type.as_deref(), Some("docx"));
        assert_eq!(created.item.can_edit, vec!["u2"]);

        let fetched = h.services.get_item(&owner, path, &created.item.id).await.unwrap();
        assert!(fetched.url.unwrap().ends_with("expires=36000"));

        let listed = h.services.list_items(Some(&owner), path).await.unwrap();
        assert!(listed[0].url.as_ref().unwrap().ends_with("expires=3600"));
    }

    #[tokio::test]
    async fn test_item_grant_allows_update_not_sibling_delete() {
        let h = harness();
        let owner = principal("u1");
        let star = star_with_owner(&h).await;
        let path = ItemPath::star_level(ItemKind::Document, &star.id);

        let d1 = h
            .services
            .create_item(&owner, path, upload(json!({ "canEdit": ["u2"] }), "a.pdf"))
            .await
            .unwrap();
        let d2 = h
            .services
            .create_item(&owner, path, upload(json!({}), "b.pdf"))
            .await
            .unwrap();

        let u2 = principal("u2");
        let updated = h
            .services
            .update_item(&u2, path, &d1.item.id, form(json!({ "title": "Testament" })))
            .await
            .unwrap();
        assert_eq!(updated.item.title.as_deref(), Some("Testament"));

        let err = h.services.delete_item(&u2, path, &d2.item.id).await.unwrap_err();
        assert!(matches!(err, FirmamentError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_replacing_blob_releases_old_key() {
        let h = harness();
        let owner = principal("u1");
        let star = star_with_owner(&h).await;
        let path = ItemPath::star_level(ItemKind::Audio, &star.id);

        let created = h
            .services
            .create_item(&owner, path, upload(json!({}), "old.mp3"))
            .await
            .unwrap();
        let old_key = created.item.key.clone().unwrap();

        let updated = h
            .services
            .update_item(&owner, path, &created.item.id, upload(json!({}), "new.mp3"))
            .await
            .unwrap();
        let new_key = updated.item.key.clone().unwrap();

        assert_ne!(old_key, new_key);
        assert!(!h.blobs.contains(&old_key));
        assert!(h.blobs.contains(&new_key));
        assert_eq!(updated.item.original_name.as_deref(), Some("new.mp3"));
    }

    #[tokio::test]
    async fn test_message_sender_is_editor() {
        let h = harness();
        let owner = principal("u1");
        let star = star_with_owner(&h).await;
        h.services
            .change_rights(&owner, &star.id, "u2", "view", "add")
            .await
            .unwrap();

        let path = ItemPath::star_level(ItemKind::Message, &star.id);
        let u2 = principal("u2");

        let err = h
            .services
            .create_item(&u2, path, form(json!({ "message": "hi" })))
            .await
            .unwrap_err();
        assert!(matches!(err, FirmamentError::Forbidden(_)));

        h.services
            .change_rights(&owner, &star.id, "u2", "edit", "add")
            .await
            .unwrap();
        let msg = h
            .services
            .create_item(&u2, path, form(json!({ "message": "hi" })))
            .await
            .unwrap();
        assert_eq!(msg.item.sender.as_deref(), Some("u2"));
        assert!(msg.url.is_none());

        h.services
            .change_rights(&owner, &star.id, "u2", "edit", "remove")
            .await
            .unwrap();
        h.services
            .change_rights(&owner, &star.id, "u2", "view", "remove")
            .await
            .unwrap();

        let edited = h
            .services
            .update_item(&u2, path, &msg.item.id, form(json!({ "message": "hello" })))
            .await
            .unwrap();
        assert_eq!(edited.item.message.as_deref(), Some("hello"));
        h.services.delete_item(&u2, path, &msg.item.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_room_messages_stay_private_on_public_star() {
        let h = harness();
        let owner = principal("u1");
        let star = star_with_owner(&h).await;
        assert!(!star.is_private);
        let room = h
            .services
            .create_collection(&owner, CollectionKind::Room, &star.id, &form(json!({ "name": "Hall" })))
            .await
            .unwrap();
        let path = ItemPath::in_collection(ItemKind::RoomMessage, &star.id, &room.id);
        h.services
            .create_item(&owner, path, form(json!({ "message": "private words" })))
            .await
            .unwrap();

        let err = h.services.list_items(None, path).await.unwrap_err();
        assert!(matches!(err, FirmamentError::Unauthorized(_)));

        let err = h
            .services
            .list_items(Some(&principal("u9")), path)
            .await
            .unwrap_err();
        assert!(matches!(err, FirmamentError::NotFound(_)));

        let listed = h.services.list_items(Some(&owner), path).await.unwrap();
        assert_eq!(listed[0].item.message.as_deref(), Some("private words"));
    }

    #[tokio::test]
    async fn test_copy_shares_key_and_skips_duplicates() {
        let h = harness();
        let owner = principal("u1");
        let star = star_with_owner(&h).await;
        let mut albums = Vec::new();
        for name in ["A", "B"] {
            albums.push(
                h.services
                    .create_collection(
                        &owner,
                        CollectionKind::PhotoAlbum,
                        &star.id,
                        &form(json!({ "name": name })),
                    )
                    .await
                    .unwrap(),
            );
        }

        let in_a = ItemPath::in_collection(ItemKind::Photo, &star.id, &albums[0].id);
        let in_b = ItemPath::in_collection(ItemKind::Photo, &star.id, &albums[1].id);
        let photo = h
            .services
            .create_item(&owner, in_a, upload(json!({}), "p.jpg"))
            .await
            .unwrap();
        let key = photo.item.key.clone().unwrap();

        let ids = vec![photo.item.id.clone(), "missing".to_string()];
        let first = h.services.copy_items(&owner, in_b, &ids).await.unwrap();
        assert_eq!(first.ids.len(), 1);
        assert_eq!(first.skipped, vec!["missing"]);

        let again = h.services.copy_items(&owner, in_b, &ids).await.unwrap();
        assert!(again.ids.is_empty());

        h.services.delete_item(&owner, in_a, &photo.item.id).await.unwrap();
        assert!(h.blobs.contains(&key));

        h.services.delete_item(&owner, in_b, &first.ids[0]).await.unwrap();
        assert!(!h.blobs.contains(&key));
    }

    #[tokio::test]
    async fn test_move_requires_source_edit() {
        let h = harness();
        let owner = principal("u1");
        let star = star_with_owner(&h).await;
        let source = h
            .services
            .create_collection(&owner, CollectionKind::VideoAlbum, &star.id, &form(json!({ "name": "S" })))
            .await
            .unwrap();
        let target = h
            .services
            .create_collection(
                &owner,
                CollectionKind::VideoAlbum,
                &star.id,
                &form(json!({ "name": "T", "canEdit": ["u2"] })),
            )
            .await
            .unwrap();

        let in_source = ItemPath::in_collection(ItemKind::Video, &star.id, &source.id);
        let in_target = ItemPath::in_collection(ItemKind::Video, &star.id, &target.id);
        let video = h
            .services
            .create_item(&owner, in_source, upload(json!({}), "v.mp4"))
            .await
            .unwrap();
        let ids = vec![video.item.id.clone()];

        let denied = h
            .services
            .move_items(&principal("u2"), in_target, &ids)
            .await
            .unwrap();
        assert_eq!(denied.skipped, ids);

        let moved = h.services.move_items(&owner, in_target, &ids).await.unwrap();
        assert_eq!(moved.ids, ids);
        let relocated = h.services.get_item(&owner, in_target, &ids[0]).await.unwrap();
        assert_eq!(relocated.item.collection_id.as_deref(), Some(target.id.as_str()));
    }

    #[tokio::test]
    async fn test_sign_key_follows_item_access() {
        let h = harness();
        let owner = principal("u1");
        let star = star_with_owner(&h).await;
        let path = ItemPath::star_level(ItemKind::Audio, &star.id);
        let audio = h
            .services
            .create_item(&owner, path, upload(json!({ "canView": ["u2"] }), "song.mp3"))
            .await
            .unwrap();
        let key = audio.item.key.unwrap();

        let url = h
            .services
            .sign_key(&principal("u2"), &key, Some(999_999))
            .await
            .unwrap();
        assert!(url.ends_with("expires=36000"));

        let err = h.services.sign_key(&principal("u3"), &key, None).await.unwrap_err();
        assert!(matches!(err, FirmamentError::NotFound(_)));
    }
}
