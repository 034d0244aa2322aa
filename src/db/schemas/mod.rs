//! Database schemas for Firmament
//!
//! Document structures for users, stars, collections, items and death
//! certificates. Ids are ObjectId hex strings stored as `_id`; access lists
//! hold user ids.

mod collection;
mod death_certificate;
mod item;
mod metadata;
mod star;
mod user;

pub use collection::CollectionDoc;
pub use death_certificate::{DeathCertificateDoc, DEATH_CERTIFICATE_COLLECTION};
pub use item::ItemDoc;
pub use metadata::Metadata;
pub use star::{StarDoc, StarPatch, STAR_COLLECTION};
pub use user::{Plan, UserDoc, UserPatch, UserSummary, UserView, USER_COLLECTION};

use bson::oid::ObjectId;

/// Fresh document id
pub fn new_id() -> String {
    ObjectId::new().to_hex()
}
