//! Application services
//!
//! [`Services`] owns the typed repositories, the blob store and the policy
//! table. Each operation loads the live documents it needs, establishes
//! existence (`NotFound`) and then asks the access engine for a decision
//! before touching anything. HTTP handlers are thin adapters over these
//! methods.

pub mod collections;
pub mod input;
pub mod items;
pub mod stars;
pub mod users;

pub use input::{FormInput, UploadedFile};
pub use items::{ItemPath, ItemView, TransferOutcome};
pub use users::{ActivationOutcome, UserProfile};

use bson::doc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::access::{self, Capability, Grants, ListingPolicy, PolicyTable};
use crate::auth::Principal;
use crate::blob::BlobStore;
use crate::db::schemas::{
    CollectionDoc, DeathCertificateDoc, ItemDoc, StarDoc, UserDoc, DEATH_CERTIFICATE_COLLECTION,
    STAR_COLLECTION, USER_COLLECTION,
};
use crate::db::{Backend, Records};
use crate::resources::{CollectionKind, ItemKind, ResourceKind};
use crate::types::{FirmamentError, Result};

/// Lifetimes of signed retrieval URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignTtl {
    /// Seconds, for URLs embedded in listings
    pub list: u64,
    /// Seconds, for single-item fetches
    pub detail: u64,
}

impl Default for SignTtl {
    fn default() -> Self {
        Self {
            list: 3600,
            detail: 36000,
        }
    }
}

/// Outcome of the listing access check
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ListingScope {
    /// Caller sees every record
    All,
    /// Caller sees only records it holds a direct grant on
    Only(String),
}

pub struct Services {
    pub(crate) users: Records<UserDoc>,
    pub(crate) stars: Records<StarDoc>,
    pub(crate) certificates: Records<DeathCertificateDoc>,
    collections: Vec<Records<CollectionDoc>>,
    items: Vec<Records<ItemDoc>>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) policies: PolicyTable,
    pub(crate) ttl: SignTtl,
    backend_name: &'static str,
    /// Seed source for per-request placement generators
    rng: Mutex<StdRng>,
}

impl Services {
    pub fn new(
        backend: Arc<dyn Backend>,
        blobs: Arc<dyn BlobStore>,
        policies: PolicyTable,
        ttl: SignTtl,
    ) -> Self {
        let collections = CollectionKind::ALL
            .iter()
            .map(|kind| Records::new(Arc::clone(&backend), kind.collection_name()))
            .collect();
        let items = ItemKind::ALL
            .iter()
            .map(|kind| Records::new(Arc::clone(&backend), kind.collection_name()))
            .collect();

        Self {
            users: Records::new(Arc::clone(&backend), USER_COLLECTION),
            stars: Records::new(Arc::clone(&backend), STAR_COLLECTION),
            certificates: Records::new(Arc::clone(&backend), DEATH_CERTIFICATE_COLLECTION),
            collections,
            items,
            blobs,
            policies,
            ttl,
            backend_name: backend.name(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Fix the placement generator, for reproducible coordinates
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    pub fn blob_store(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Name of the document backend in use
    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    /// Create indexes on every collection
    pub async fn ensure_indexes(&self) -> Result<()> {
        self.users.ensure_indexes().await?;
        self.stars.ensure_indexes().await?;
        self.certificates.ensure_indexes().await?;
        for repo in &self.collections {
            repo.ensure_indexes().await?;
        }
        for repo in &self.items {
            repo.ensure_indexes().await?;
        }
        info!("Indexes ensured");
        Ok(())
    }

    pub(crate) fn collection_repo(&self, kind: CollectionKind) -> &Records<CollectionDoc> {
        &self.collections[kind as usize]
    }

    pub(crate) fn item_repo(&self, kind: ItemKind) -> &Records<ItemDoc> {
        &self.items[kind as usize]
    }

    /// Independent generator so no lock is held across placement queries
    pub(crate) fn fork_rng(&self) -> StdRng {
        let mut seeds = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        StdRng::seed_from_u64(seeds.gen())
    }

    pub(crate) async fn load_star(&self, star_id: &str) -> Result<StarDoc> {
        self.stars
            .get(star_id)
            .await?
            .ok_or_else(|| FirmamentError::NotFound("Star not found".into()))
    }

    /// Collection of `kind` that belongs to `star`
    pub(crate) async fn load_collection(
        &self,
        kind: CollectionKind,
        star: &StarDoc,
        collection_id: &str,
    ) -> Result<CollectionDoc> {
        self.collection_repo(kind)
            .find_one(doc! { "_id": collection_id, "starId": &star.id })
            .await?
            .ok_or_else(|| FirmamentError::NotFound(format!("{} not found", kind.label())))
    }

    /// Item of `kind` under `star` and, when given, under `collection`
    pub(crate) async fn load_item(
        &self,
        kind: ItemKind,
        star: &StarDoc,
        collection: Option<&CollectionDoc>,
        item_id: &str,
    ) -> Result<ItemDoc> {
        let mut filter = doc! { "_id": item_id, "starId": &star.id };
        if let Some(collection) = collection {
            filter.insert("collectionId", &collection.id);
        }
        self.item_repo(kind)
            .find_one(filter)
            .await?
            .ok_or_else(|| FirmamentError::NotFound(format!("{} not found", kind.label())))
    }

    /// Decide whether a listing shows everything or only directly granted
    /// records.
    ///
    /// Kinds with public listing enabled are readable by anyone when the star
    /// is not private. Otherwise the listing policy is checked against the
    /// parent chain; filtered kinds fall back to per-record grants.
    pub(crate) fn listing_scope(
        &self,
        kind: ResourceKind,
        star: &StarDoc,
        parent: Option<&CollectionDoc>,
        principal: Option<&Principal>,
    ) -> Result<ListingScope> {
        let policy = self.policies.get(kind);
        if policy.public_listing && !star.is_private {
            return Ok(ListingScope::All);
        }

        let principal =
            principal.ok_or_else(|| FirmamentError::Unauthorized("Authentication required".into()))?;

        let chain: Vec<&dyn Grants> = parent.into_iter().map(|c| c as &dyn Grants).collect();
        match access::authorize(star, &chain, principal.id(), Capability::View, policy.list) {
            Ok(()) => Ok(ListingScope::All),
            Err(denied) => match policy.listing {
                ListingPolicy::Filtered => Ok(ListingScope::Only(principal.user_id.clone())),
                ListingPolicy::Unfiltered => Err(denied),
            },
        }
    }

    /// Delete `key` from the blob store unless a record still references it.
    ///
    /// Must run after the referencing record was removed or rewritten.
    /// Failures are logged and swallowed; returns whether a delete was
    /// attempted.
    pub(crate) async fn release_blob_if_unreferenced(&self, key: &str) -> bool {
        let mut references = 0;
        for kind in ItemKind::blob_kinds() {
            match self.item_repo(kind).count(doc! { "key": key }).await {
                Ok(n) => references += n,
                Err(e) => {
                    warn!("Could not count references to {}, keeping blob: {}", key, e);
                    return false;
                }
            }
        }

        if references > 0 {
            debug!("Blob {} still referenced {} time(s)", key, references);
            return false;
        }

        if let Err(e) = self.blobs.delete(key).await {
            warn!("Failed to delete blob {}: {}", key, e);
        }
        true
    }

    /// Signed retrieval URL, or `None` when signing fails
    pub(crate) async fn sign_url(&self, key: &str, ttl: u64) -> Option<String> {
        match self.blobs.sign(key, ttl).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Failed to sign {}: {}", key, e);
                None
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_release_keeps_referenced_blobs() {
        let h = harness();
        let svc = &h.services;
        h.blobs
            .put("stars/s1/documents/1-a.pdf", bytes::Bytes::from_static(b"x"), "application/pdf")
            .await
            .unwrap();

        svc.item_repo(ItemKind::Document)
            .insert(ItemDoc {
                id: "d1".into(),
                star_id: "s1".into(),
                key: Some("stars/s1/documents/1-a.pdf".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(!svc.release_blob_if_unreferenced("stars/s1/documents/1-a.pdf").await);
        assert!(h.blobs.contains("stars/s1/documents/1-a.pdf"));

        svc.item_repo(ItemKind::Document).delete("d1").await.unwrap();
        assert!(svc.release_blob_if_unreferenced("stars/s1/documents/1-a.pdf").await);
        assert!(!h.blobs.contains("stars/s1/documents/1-a.pdf"));
    }

    #[test]
    fn test_forked_generators_differ() {
        let h = harness();
        let a: u64 = h.services.fork_rng().gen();
        let b: u64 = h.services.fork_rng().gen();
        assert_ne!(a, b);
    }
}
