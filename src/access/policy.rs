//! Per-resource access policies
//!
//! Listing and deletion do not follow one universal rule across resource
//! kinds: some kinds restrict them to the star owner, some listings are
//! filtered down to the records the caller can see, and some are served
//! without authentication for public stars. The table below holds the
//! choice for every kind; deployments can override it via configuration.

use std::collections::HashMap;

use crate::resources::{CollectionKind, ItemKind, ResourceKind};

/// Who may perform a destructive or enumerating operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Owner, star-level grants and resource-level grants all apply
    Delegated,
    /// Only the owner of the star, ignoring every list
    OwnerOnly,
}

/// What a listing returns once the caller is allowed to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingPolicy {
    /// Everything under the parent once parent access is proven
    Unfiltered,
    /// Everything for callers with star-level access, otherwise only the
    /// records the caller holds a direct grant on
    Filtered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourcePolicy {
    pub list: AccessPolicy,
    pub delete: AccessPolicy,
    pub listing: ListingPolicy,
    /// Listing needs no credential when the star is not private
    pub public_listing: bool,
}

impl Default for ResourcePolicy {
    fn default() -> Self {
        Self {
            list: AccessPolicy::Delegated,
            delete: AccessPolicy::Delegated,
            listing: ListingPolicy::Unfiltered,
            public_listing: false,
        }
    }
}

/// Policy lookup for every resource kind
#[derive(Debug, Clone)]
pub struct PolicyTable {
    entries: HashMap<ResourceKind, ResourcePolicy>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        let mut entries: HashMap<ResourceKind, ResourcePolicy> = ResourceKind::all()
            .map(|kind| (kind, ResourcePolicy::default()))
            .collect();

        let mut set = |kind: ResourceKind, f: &dyn Fn(&mut ResourcePolicy)| {
            if let Some(policy) = entries.get_mut(&kind) {
                f(policy);
            }
        };

        for album in [CollectionKind::PhotoAlbum, CollectionKind::VideoAlbum] {
            set(album.into(), &|p| p.listing = ListingPolicy::Filtered);
        }

        set(ItemKind::Document.into(), &|p| {
            p.list = AccessPolicy::OwnerOnly;
            p.delete = AccessPolicy::OwnerOnly;
        });
        set(ItemKind::Audio.into(), &|p| p.delete = AccessPolicy::OwnerOnly);

        // Rooms and their media are browsable for public stars and otherwise
        // owner territory. Room messages are never public.
        set(CollectionKind::Room.into(), &|p| {
            p.list = AccessPolicy::OwnerOnly;
            p.delete = AccessPolicy::OwnerOnly;
            p.public_listing = true;
        });
        for media in [
            ItemKind::RoomPhoto,
            ItemKind::RoomVideo,
            ItemKind::RoomAudio,
            ItemKind::RoomDocument,
        ] {
            set(media.into(), &|p| {
                p.list = AccessPolicy::OwnerOnly;
                p.delete = AccessPolicy::OwnerOnly;
                p.public_listing = true;
            });
        }
        set(ItemKind::RoomMessage.into(), &|p| p.list = AccessPolicy::OwnerOnly);

        Self { entries }
    }
}

impl PolicyTable {
    /// A table where every kind uses the fully delegated rule
    pub fn delegated() -> Self {
        Self {
            entries: ResourceKind::all()
                .map(|kind| (kind, ResourcePolicy::default()))
                .collect(),
        }
    }

    pub fn get(&self, kind: impl Into<ResourceKind>) -> ResourcePolicy {
        self.entries
            .get(&kind.into())
            .copied()
            .unwrap_or_default()
    }

    pub fn set(&mut self, kind: impl Into<ResourceKind>, policy: ResourcePolicy) {
        self.entries.insert(kind.into(), policy);
    }

    /// Replace a policy dimension with the given set of slugs.
    ///
    /// A `None` list keeps the defaults for that dimension; a present list
    /// (even an empty one) becomes the exact set of kinds carrying the flag.
    pub fn apply_overrides(
        &mut self,
        filtered_listing: Option<Vec<String>>,
        owner_only_list: Option<Vec<String>>,
        owner_only_delete: Option<Vec<String>>,
        public_listing: Option<Vec<String>>,
    ) -> Result<(), String> {
        if let Some(slugs) = filtered_listing {
            let kinds = resolve_slugs(&slugs)?;
            for (kind, policy) in self.entries.iter_mut() {
                policy.listing = if kinds.contains(kind) {
                    ListingPolicy::Filtered
                } else {
                    ListingPolicy::Unfiltered
                };
            }
        }

        if let Some(slugs) = owner_only_list {
            let kinds = resolve_slugs(&slugs)?;
            for (kind, policy) in self.entries.iter_mut() {
                policy.list = owner_only_if(kinds.contains(kind));
            }
        }

        if let Some(slugs) = owner_only_delete {
            let kinds = resolve_slugs(&slugs)?;
            for (kind, policy) in self.entries.iter_mut() {
                policy.delete = owner_only_if(kinds.contains(kind));
            }
        }

        if let Some(slugs) = public_listing {
            let kinds = resolve_slugs(&slugs)?;
            for (kind, policy) in self.entries.iter_mut() {
                policy.public_listing = kinds.contains(kind);
            }
        }

        Ok(())
    }
}

fn owner_only_if(flag: bool) -> AccessPolicy {
    if flag {
        AccessPolicy::OwnerOnly
    } else {
        AccessPolicy::Delegated
    }
}

fn resolve_slugs(slugs: &[String]) -> Result<Vec<ResourceKind>, String> {
    slugs
        .iter()
        .map(|slug| {
            ResourceKind::from_slug(slug).ok_or_else(|| format!("Unknown resource kind '{}'", slug))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let table = PolicyTable::default();

        let docs = table.get(ItemKind::Document);
        assert_eq!(docs.list, AccessPolicy::OwnerOnly);
        assert_eq!(docs.delete, AccessPolicy::OwnerOnly);

        let albums = table.get(CollectionKind::PhotoAlbum);
        assert_eq!(albums.listing, ListingPolicy::Filtered);
        assert_eq!(albums.delete, AccessPolicy::Delegated);

        let photos = table.get(ItemKind::Photo);
        assert_eq!(photos, ResourcePolicy::default());

        assert!(table.get(CollectionKind::Room).public_listing);
        assert!(!table.get(ItemKind::Message).public_listing);

        let room_messages = table.get(ItemKind::RoomMessage);
        assert_eq!(room_messages.list, AccessPolicy::OwnerOnly);
        assert!(!room_messages.public_listing);
        assert_eq!(room_messages.delete, AccessPolicy::Delegated);
    }

    #[test]
    fn test_overrides_replace_dimension() {
        let mut table = PolicyTable::default();
        table
            .apply_overrides(
                None,
                Some(vec![]),
                Some(vec!["photos".into()]),
                None,
            )
            .unwrap();

        assert_eq!(table.get(ItemKind::Document).list, AccessPolicy::Delegated);
        assert_eq!(table.get(ItemKind::Document).delete, AccessPolicy::Delegated);
        assert_eq!(table.get(ItemKind::Photo).delete, AccessPolicy::OwnerOnly);
        // untouched dimensions keep their defaults
        assert_eq!(
            table.get(CollectionKind::VideoAlbum).listing,
            ListingPolicy::Filtered
        );
        assert!(table.get(ItemKind::RoomAudio).public_listing);
    }

    #[test]
    fn test_unknown_slug_rejected() {
        let mut table = PolicyTable::default();
        let err = table
            .apply_overrides(Some(vec!["starships".into()]), None, None, None)
            .unwrap_err();
        assert!(err.contains("starships"));
    }
}
