//! Collection lifecycle (photo albums, video albums, 3D rooms)

use bson::doc;
use tracing::info;

use crate::access::{self, AccessPolicy, Capability, Grants};
use crate::auth::Principal;
use crate::db::schemas::{new_id, CollectionDoc, Metadata};
use crate::resources::CollectionKind;
use crate::services::{FormInput, ListingScope, Services};
use crate::types::{FirmamentError, Result};

const DEFAULT_ROOM_TYPE: &str = "basic";

impl Services {
    /// Create a collection under a star; requires edit on the star
    pub async fn create_collection(
        &self,
        principal: &Principal,
        kind: CollectionKind,
        star_id: &str,
        input: &FormInput,
    ) -> Result<CollectionDoc> {
        let star = self.load_star(star_id).await?;
        access::authorize(&star, &[], principal.id(), Capability::Edit, AccessPolicy::Delegated)?;

        let name = input.required_text("name")?;
        let room_type = match kind {
            CollectionKind::Room => Some(
                input
                    .text("roomType")
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_ROOM_TYPE.to_string()),
            ),
            _ => None,
        };

        let collection = self
            .collection_repo(kind)
            .insert(CollectionDoc {
                id: new_id(),
                metadata: Metadata::new(),
                star_id: star.id.clone(),
                name: Some(name),
                room_type,
                can_view: input.acl("canView").unwrap_or_default(),
                can_edit: input.acl("canEdit").unwrap_or_default(),
            })
            .await?;

        info!(star = %star.id, collection = %collection.id, "{} created", kind.label());
        Ok(collection)
    }

    /// Collections of a star visible to the caller
    pub async fn list_collections(
        &self,
        principal: Option<&Principal>,
        kind: CollectionKind,
        star_id: &str,
    ) -> Result<Vec<CollectionDoc>> {
        let star = self.load_star(star_id).await?;
        let scope = self.listing_scope(kind.into(), &star, None, principal)?;

        let collections = self
            .collection_repo(kind)
            .find(doc! { "starId": &star.id })
            .await?;

        match scope {
            ListingScope::All => Ok(collections),
            ListingScope::Only(viewer) => {
                let visible: Vec<CollectionDoc> = collections
                    .into_iter()
                    .filter(|c| c.grants_view(&viewer))
                    .collect();
                if visible.is_empty() {
                    return Err(FirmamentError::NotFound("Not found".into()));
                }
                Ok(visible)
            }
        }
    }

    pub async fn get_collection(
        &self,
        principal: &Principal,
        kind: CollectionKind,
        star_id: &str,
        collection_id: &str,
    ) -> Result<CollectionDoc> {
        let star = self.load_star(star_id).await?;
        let collection = self.load_collection(kind, &star, collection_id).await?;
        access::authorize(
            &star,
            &[&collection],
            principal.id(),
            Capability::View,
            AccessPolicy::Delegated,
        )?;
        Ok(collection)
    }

    /// Rename, change room type or replace the access lists
    pub async fn update_collection(
        &self,
        principal: &Principal,
        kind: CollectionKind,
        star_id: &str,
        collection_id: &str,
        input: &FormInput,
    ) -> Result<CollectionDoc> {
        let star = self.load_star(star_id).await?;
        let mut collection = self.load_collection(kind, &star, collection_id).await?;
        access::authorize(
            &star,
            &[&collection],
            principal.id(),
            Capability::Edit,
            AccessPolicy::Delegated,
        )?;

        if let Some(name) = input.text("name").filter(|n| !n.trim().is_empty()) {
            collection.name = Some(name.trim().to_string());
        }
        if kind == CollectionKind::Room {
            if let Some(room_type) = input.text("roomType").filter(|t| !t.trim().is_empty()) {
                collection.room_type = Some(room_type);
            }
        }
        if let Some(viewers) = input.acl("canView") {
            collection.can_view = viewers;
        }
        if let Some(editors) = input.acl("canEdit") {
            collection.can_edit = editors;
        }

        self.collection_repo(kind).save(&mut collection).await?;
        Ok(collection)
    }

    /// Delete a collection and every item in it
    pub async fn delete_collection(
        &self,
        principal: &Principal,
        kind: CollectionKind,
        star_id: &str,
        collection_id: &str,
    ) -> Result<()> {
        let star = self.load_star(star_id).await?;
        let collection = self.load_collection(kind, &star, collection_id).await?;
        let policy = self.policies.get(kind);
        access::authorize(
            &star,
            &[&collection],
            principal.id(),
            Capability::Edit,
            policy.delete,
        )?;

        self.purge_collection(kind, &collection).await?;
        info!(star = %star.id, collection = %collection.id, "{} deleted", kind.label());
        Ok(())
    }

    /// Remove a collection's items (releasing their blobs) and the collection
    pub(crate) async fn purge_collection(
        &self,
        kind: CollectionKind,
        collection: &CollectionDoc,
    ) -> Result<()> {
        for &item_kind in kind.item_kinds() {
            let items = self
                .item_repo(item_kind)
                .find(doc! { "collectionId": &collection.id })
                .await?;
            for item in items {
                self.purge_item(item_kind, &item).await?;
            }
        }
        self.collection_repo(kind).delete(&collection.id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{ListingPolicy, PolicyTable};
    use crate::services::testing::*;
    use serde_json::json;

    fn form(value: serde_json::Value) -> FormInput {
        FormInput::from_json(value).unwrap()
    }

    #[tokio::test]
    async fn test_create_requires_star_edit() {
        let h = harness();
        let owner = principal("u1");
        let star = h.services.create_star(&owner, &FormInput::new()).await.unwrap();

        let err = h
            .services
            .create_collection(
                &principal("u2"),
                CollectionKind::PhotoAlbum,
                &star.id,
                &form(json!({ "name": "Summer" })),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FirmamentError::Forbidden(_)));

        let album = h
            .services
            .create_collection(
                &owner,
                CollectionKind::PhotoAlbum,
                &star.id,
                &form(json!({ "name": "Summer", "canView": "u2, u3" })),
            )
            .await
            .unwrap();
        assert_eq!(album.can_view, vec!["u2", "u3"]);
        assert!(album.room_type.is_none());
    }

    #[tokio::test]
    async fn test_room_defaults_and_missing_name() {
        let h = harness();
        let owner = principal("u1");
        let star = h.services.create_star(&owner, &FormInput::new()).await.unwrap();

        let room = h
            .services
            .create_collection(&owner, CollectionKind::Room, &star.id, &form(json!({ "name": "Hall" })))
            .await
            .unwrap();
        assert_eq!(room.room_type.as_deref(), Some("basic"));

        let err = h
            .services
            .create_collection(&owner, CollectionKind::Room, &star.id, &FormInput::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FirmamentError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_filtered_listing_shows_granted_albums_only() {
        let h = harness();
        let owner = principal("u1");
        let star = h.services.create_star(&owner, &FormInput::new()).await.unwrap();
        for (name, viewers) in [("A", json!(["u2"])), ("B", json!([]))] {
            h.services
                .create_collection(
                    &owner,
                    CollectionKind::PhotoAlbum,
                    &star.id,
                    &form(json!({ "name": name, "canView": viewers })),
                )
                .await
                .unwrap();
        }

        let visible = h
            .services
            .list_collections(Some(&principal("u2")), CollectionKind::PhotoAlbum, &star.id)
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name.as_deref(), Some("A"));

        let all = h
            .services
            .list_collections(Some(&owner), CollectionKind::PhotoAlbum, &star.id)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let err = h
            .services
            .list_collections(Some(&principal("u9")), CollectionKind::PhotoAlbum, &star.id)
            .await
            .unwrap_err();
        assert!(matches!(err, FirmamentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unfiltered_listing_denies_outright() {
        let mut policies = PolicyTable::default();
        let mut policy = policies.get(CollectionKind::VideoAlbum);
        policy.listing = ListingPolicy::Unfiltered;
        policies.set(CollectionKind::VideoAlbum, policy);
        let h = harness_with(policies);

        let owner = principal("u1");
        let star = h.services.create_star(&owner, &FormInput::new()).await.unwrap();
        h.services
            .create_collection(
                &owner,
                CollectionKind::VideoAlbum,
                &star.id,
                &form(json!({ "name": "Clips", "canView": ["u2"] })),
            )
            .await
            .unwrap();

        let err = h
            .services
            .list_collections(Some(&principal("u2")), CollectionKind::VideoAlbum, &star.id)
            .await
            .unwrap_err();
        assert!(matches!(err, FirmamentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_public_room_listing() {
        let h = harness();
        let owner = principal("u1");
        let star = h.services.create_star(&owner, &FormInput::new()).await.unwrap();
        h.services
            .create_collection(&owner, CollectionKind::Room, &star.id, &form(json!({ "name": "Hall" })))
            .await
            .unwrap();

        let rooms = h
            .services
            .list_collections(None, CollectionKind::Room, &star.id)
            .await
            .unwrap();
        assert_eq!(rooms.len(), 1);

        h.services
            .update_star(&owner, &star.id, &form(json!({ "isPrivate": true })))
            .await
            .unwrap();
        let err = h
            .services
            .list_collections(None, CollectionKind::Room, &star.id)
            .await
            .unwrap_err();
        assert!(matches!(err, FirmamentError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_collection_editor_can_update_but_not_see_sibling() {
        let h = harness();
        let owner = principal("u1");
        let star = h.services.create_star(&owner, &FormInput::new()).await.unwrap();
        let a1 = h
            .services
            .create_collection(
                &owner,
                CollectionKind::PhotoAlbum,
                &star.id,
                &form(json!({ "name": "A1", "canEdit": ["u2"] })),
            )
            .await
            .unwrap();
        let a2 = h
            .services
            .create_collection(&owner, CollectionKind::PhotoAlbum, &star.id, &form(json!({ "name": "A2" })))
            .await
            .unwrap();

        let editor = principal("u2");
        let renamed = h
            .services
            .update_collection(
                &editor,
                CollectionKind::PhotoAlbum,
                &star.id,
                &a1.id,
                &form(json!({ "name": "Renamed" })),
            )
            .await
            .unwrap();
        assert_eq!(renamed.name.as_deref(), Some("Renamed"));
        assert_eq!(renamed.can_edit, vec!["u2"]);

        let err = h
            .services
            .get_collection(&editor, CollectionKind::PhotoAlbum, &star.id, &a2.id)
            .await
            .unwrap_err();
        assert!(matches!(err, FirmamentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_collection_must_belong_to_star() {
        let h = harness();
        let owner = principal("u1");
        let s1 = h.services.create_star(&owner, &FormInput::new()).await.unwrap();
        let s2 = h.services.create_star(&owner, &FormInput::new()).await.unwrap();
        let album = h
            .services
            .create_collection(&owner, CollectionKind::PhotoAlbum, &s1.id, &form(json!({ "name": "A" })))
            .await
            .unwrap();

        let err = h
            .services
            .get_collection(&owner, CollectionKind::PhotoAlbum, &s2.id, &album.id)
            .await
            .unwrap_err();
        assert!(matches!(err, FirmamentError::NotFound(_)));
    }
}
