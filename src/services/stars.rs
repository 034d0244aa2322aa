//! Star lifecycle
//!
//! Creation assigns a spawn coordinate that never changes afterwards.
//! Updates go through [`StarPatch`], which has no coordinate or rights
//! fields; rights change only through [`Services::change_rights`].

use async_trait::async_trait;
use bson::doc;
use tracing::info;

use crate::access::{self, AccessPolicy, Capability, RightsAction, RightsMode};
use crate::auth::Principal;
use crate::db::schemas::{new_id, Metadata, StarDoc, StarPatch};
use crate::db::Records;
use crate::placement::{allocate_spawn_point, Occupancy, SpawnPoint};
use crate::resources::{CollectionKind, ItemKind};
use crate::services::{FormInput, Services};
use crate::types::Result;

/// Coordinates already taken by stored stars
struct StarOccupancy<'a> {
    stars: &'a Records<StarDoc>,
}

#[async_trait]
impl Occupancy for StarOccupancy<'_> {
    async fn is_occupied(&self, point: SpawnPoint) -> Result<bool> {
        let taken = self
            .stars
            .count(doc! { "x": point.x, "y": point.y, "z": point.z })
            .await?;
        Ok(taken > 0)
    }
}

/// Editable star fields from request input; anything else is ignored
fn star_patch(input: &FormInput) -> Result<StarPatch> {
    Ok(StarPatch {
        is_private: input.bool("isPrivate")?,
        star_for: input.text("starFor").filter(|s| !s.trim().is_empty()),
        color: input.text("color").filter(|s| !s.trim().is_empty()),
        word: input.text("word").filter(|s| !s.trim().is_empty()),
        activation_date: input.date("activationDate")?,
        long_term_maintenance: input.bool("longTermMaintenance")?,
    })
}

impl Services {
    /// Create a star owned by the caller at a fresh spawn coordinate
    pub async fn create_star(&self, principal: &Principal, input: &FormInput) -> Result<StarDoc> {
        let patch = star_patch(input)?;

        let count = self.stars.estimated_count().await?;
        let mut rng = self.fork_rng();
        let occupancy = StarOccupancy { stars: &self.stars };
        let point = allocate_spawn_point(count, &mut rng, &occupancy).await?;

        let mut star = StarDoc {
            id: new_id(),
            metadata: Metadata::new(),
            user_id: principal.user_id.clone(),
            star_for: "myself".to_string(),
            x: point.x,
            y: point.y,
            z: point.z,
            ..Default::default()
        };
        patch.apply(&mut star);

        let star = self.stars.insert(star).await?;
        info!(
            star = %star.id,
            owner = %star.user_id,
            "Star created at ({}, {}, {})",
            star.x, star.y, star.z
        );
        Ok(star)
    }

    /// Stars owned by the caller
    pub async fn list_own_stars(&self, principal: &Principal) -> Result<Vec<StarDoc>> {
        self.stars.find(doc! { "userId": principal.id() }).await
    }

    /// Stars of other users that list the caller as viewer or editor
    pub async fn list_shared_stars(&self, principal: &Principal) -> Result<Vec<StarDoc>> {
        self.stars
            .find(doc! {
                "userId": { "$ne": principal.id() },
                "$or": [
                    { "canView": principal.id() },
                    { "canEdit": principal.id() },
                ],
            })
            .await
    }

    pub async fn get_star(&self, principal: &Principal, star_id: &str) -> Result<StarDoc> {
        let star = self.load_star(star_id).await?;
        access::authorize(&star, &[], principal.id(), Capability::View, AccessPolicy::Delegated)?;
        Ok(star)
    }

    /// Update non-spatial fields; requires edit on the star
    pub async fn update_star(
        &self,
        principal: &Principal,
        star_id: &str,
        input: &FormInput,
    ) -> Result<StarDoc> {
        let mut star = self.load_star(star_id).await?;
        access::authorize(&star, &[], principal.id(), Capability::Edit, AccessPolicy::Delegated)?;

        if star_patch(input)?.apply(&mut star) {
            self.stars.save(&mut star).await?;
        }
        Ok(star)
    }

    /// Delete a star with every collection and item under it; owner only
    pub async fn delete_star(&self, principal: &Principal, star_id: &str) -> Result<()> {
        let star = self.load_star(star_id).await?;
        access::authorize(&star, &[], principal.id(), Capability::Edit, AccessPolicy::OwnerOnly)?;

        for kind in CollectionKind::ALL {
            for collection in self
                .collection_repo(kind)
                .find(doc! { "starId": &star.id })
                .await?
            {
                self.purge_collection(kind, &collection).await?;
            }
        }
        for kind in ItemKind::STAR_LEVEL {
            for item in self.item_repo(kind).find(doc! { "starId": &star.id }).await? {
                self.purge_item(kind, &item).await?;
            }
        }

        self.stars.delete(&star.id).await?;
        info!(star = %star.id, "Star deleted");
        Ok(())
    }

    /// Grant or revoke view/edit on a star
    pub async fn change_rights(
        &self,
        principal: &Principal,
        star_id: &str,
        target_user_id: &str,
        mode: &str,
        action: &str,
    ) -> Result<StarDoc> {
        let mode: RightsMode = mode.parse()?;
        let action: RightsAction = action.parse()?;

        let star = self.load_star(star_id).await?;
        let before = (star.can_view.clone(), star.can_edit.clone());
        let mut star = access::update_rights(star, principal.id(), target_user_id, mode, action)?;

        if before != (star.can_view.clone(), star.can_edit.clone()) {
            self.stars.save(&mut star).await?;
        }
        Ok(star)
    }
}
