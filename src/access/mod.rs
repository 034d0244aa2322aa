//! Authorization engine
//!
//! Every decision is made against the live star document plus the chain of
//! grant-bearing resources between the star and the target (collection,
//! then item). No effective ACL is denormalized onto descendants, so a
//! revoked star grant cuts off every descendant immediately.
//!
//! Rights propagate downward only:
//! - a star grant covers every collection and item of the star
//! - a collection grant covers the collection's items
//! - an item grant covers only that item

pub mod policy;
pub mod rights;

pub use policy::{AccessPolicy, ListingPolicy, PolicyTable, ResourcePolicy};
pub use rights::{update_rights, RightsAction, RightsMode};

use tracing::debug;

use crate::db::schemas::StarDoc;
use crate::types::{FirmamentError, Result};

/// Permission level checked throughout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    View,
    Edit,
}

/// A resource carrying its own view/edit lists.
///
/// The effective edit set is `editors ∪ {implicit editor}`; the effective
/// view set is `viewers ∪ edit set`, so edit always implies view.
pub trait Grants {
    fn viewers(&self) -> &[String];
    fn editors(&self) -> &[String];

    /// Principal holding edit rights regardless of the lists
    /// (the owner of a star, the sender of a message).
    fn implicit_editor(&self) -> Option<&str> {
        None
    }

    fn grants_edit(&self, principal: &str) -> bool {
        self.implicit_editor() == Some(principal) || self.editors().iter().any(|e| e == principal)
    }

    fn grants_view(&self, principal: &str) -> bool {
        self.viewers().iter().any(|v| v == principal) || self.grants_edit(principal)
    }

    fn grants(&self, principal: &str, capability: Capability) -> bool {
        match capability {
            Capability::View => self.grants_view(principal),
            Capability::Edit => self.grants_edit(principal),
        }
    }
}

pub fn is_owner(star: &StarDoc, principal: &str) -> bool {
    star.user_id == principal
}

/// Owner, viewer or editor of the star
pub fn can_see_star(star: &StarDoc, principal: &str) -> bool {
    star.grants_view(principal)
}

/// Owner or editor of the star
pub fn can_edit_star(star: &StarDoc, principal: &str) -> bool {
    star.grants_edit(principal)
}

/// Star-level grant, or a grant on any resource of the chain
pub fn can_access_resource(
    star: &StarDoc,
    chain: &[&dyn Grants],
    principal: &str,
    capability: Capability,
) -> bool {
    star.grants(principal, capability) || chain.iter().any(|g| g.grants(principal, capability))
}

/// Turn an access decision into the request outcome.
///
/// A denied view-requiring operation reads as `NotFound` so the caller
/// learns nothing about the resource; a denied edit-requiring operation is
/// `Forbidden`. Existence of the resource and its parents must already have
/// been established by the caller.
pub fn authorize(
    star: &StarDoc,
    chain: &[&dyn Grants],
    principal: &str,
    capability: Capability,
    policy: AccessPolicy,
) -> Result<()> {
    let allowed = match policy {
        AccessPolicy::OwnerOnly => is_owner(star, principal),
        AccessPolicy::Delegated => can_access_resource(star, chain, principal, capability),
    };

    if allowed {
        return Ok(());
    }

    debug!(
        star = %star.id,
        principal = %principal,
        ?capability,
        ?policy,
        "Access denied"
    );

    match capability {
        Capability::View => Err(FirmamentError::NotFound("Not found".into())),
        Capability::Edit => Err(FirmamentError::Forbidden("Forbidden".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{CollectionDoc, ItemDoc};

    fn star() -> StarDoc {
        StarDoc {
            id: "s1".into(),
            user_id: "owner".into(),
            can_view: vec!["viewer".into()],
            can_edit: vec!["editor".into()],
            ..Default::default()
        }
    }

    fn album(id: &str, viewers: &[&str], editors: &[&str]) -> CollectionDoc {
        CollectionDoc {
            id: id.into(),
            star_id: "s1".into(),
            can_view: viewers.iter().map(|s| s.to_string()).collect(),
            can_edit: editors.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_owner_supremacy() {
        let mut s = star();
        s.can_view.clear();
        s.can_edit.clear();
        assert!(can_see_star(&s, "owner"));
        assert!(can_edit_star(&s, "owner"));
    }

    #[test]
    fn test_star_lists() {
        let s = star();
        assert!(can_see_star(&s, "viewer"));
        assert!(!can_edit_star(&s, "viewer"));
        assert!(can_see_star(&s, "editor"));
        assert!(can_edit_star(&s, "editor"));
        assert!(!can_see_star(&s, "stranger"));
    }

    #[test]
    fn test_edit_implies_view() {
        let s = star();
        let a = album("a1", &[], &["album-editor"]);
        let i = ItemDoc {
            can_edit: vec!["item-editor".into()],
            ..Default::default()
        };
        let chain: [&dyn Grants; 2] = [&a, &i];
        for p in ["owner", "viewer", "editor", "album-editor", "item-editor", "stranger"] {
            if can_access_resource(&s, &chain, p, Capability::Edit) {
                assert!(can_access_resource(&s, &chain, p, Capability::View), "{p}");
            }
        }
    }

    #[test]
    fn test_downward_propagation() {
        let s = star();
        let a = album("a1", &[], &[]);
        let i = ItemDoc::default();
        assert!(can_access_resource(&s, &[&a, &i], "editor", Capability::Edit));
        assert!(can_access_resource(&s, &[&a, &i], "viewer", Capability::View));
        assert!(!can_access_resource(&s, &[&a, &i], "viewer", Capability::Edit));
    }

    #[test]
    fn test_no_sideways_propagation() {
        let s = star();
        let c1 = album("c1", &[], &["p"]);
        let c2 = album("c2", &[], &[]);
        assert!(can_access_resource(&s, &[&c1], "p", Capability::Edit));
        assert!(!can_access_resource(&s, &[&c2], "p", Capability::View));
    }

    #[test]
    fn test_sender_is_implicit_editor() {
        let s = star();
        let msg = ItemDoc {
            sender: Some("sender".into()),
            ..Default::default()
        };
        assert!(can_access_resource(&s, &[&msg], "sender", Capability::Edit));
        assert!(can_access_resource(&s, &[&msg], "sender", Capability::View));
    }

    #[test]
    fn test_authorize_outcomes() {
        let s = star();
        let doc = ItemDoc {
            can_edit: vec!["u2".into()],
            ..Default::default()
        };

        assert!(authorize(&s, &[&doc], "u2", Capability::Edit, AccessPolicy::Delegated).is_ok());

        let err = authorize(&s, &[&doc], "u2", Capability::Edit, AccessPolicy::OwnerOnly)
            .unwrap_err();
        assert!(matches!(err, FirmamentError::Forbidden(_)));

        let err = authorize(&s, &[], "u2", Capability::View, AccessPolicy::Delegated).unwrap_err();
        assert!(matches!(err, FirmamentError::NotFound(_)));

        assert!(authorize(&s, &[], "owner", Capability::Edit, AccessPolicy::OwnerOnly).is_ok());
    }
}
