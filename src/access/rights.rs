//! Star rights mutation
//!
//! The only sanctioned path for changing a star's `canView` / `canEdit`.
//! Editors may manage viewers; only the owner may grow or shrink the editor
//! set.

use std::str::FromStr;

use tracing::info;

use crate::access::{can_edit_star, is_owner};
use crate::db::schemas::StarDoc;
use crate::types::{FirmamentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RightsMode {
    View,
    Edit,
}

impl FromStr for RightsMode {
    type Err = FirmamentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "view" => Ok(Self::View),
            "edit" => Ok(Self::Edit),
            other => Err(FirmamentError::BadRequest(format!(
                "Invalid mode '{}', expected 'view' or 'edit'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RightsAction {
    Add,
    Remove,
}

impl FromStr for RightsAction {
    type Err = FirmamentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "add" => Ok(Self::Add),
            "remove" => Ok(Self::Remove),
            other => Err(FirmamentError::BadRequest(format!(
                "Invalid action '{}', expected 'add' or 'remove'",
                other
            ))),
        }
    }
}

/// Apply a rights change to a star, returning the updated document.
///
/// The caller persists the result once; nothing is written on error.
/// Adding an already present id and removing an absent one are no-ops.
pub fn update_rights(
    mut star: StarDoc,
    requester: &str,
    target: &str,
    mode: RightsMode,
    action: RightsAction,
) -> Result<StarDoc> {
    let target = target.trim();
    if target.is_empty() {
        return Err(FirmamentError::BadRequest("targetUserId is required".into()));
    }

    if !can_edit_star(&star, requester) {
        return Err(FirmamentError::Forbidden(
            "Only the owner or an editor can change rights".into(),
        ));
    }

    if mode == RightsMode::Edit && !is_owner(&star, requester) {
        return Err(FirmamentError::Forbidden(
            "Only the owner can change edit rights".into(),
        ));
    }

    // The owner holds both capabilities implicitly.
    if action == RightsAction::Add && is_owner(&star, target) {
        return Ok(star);
    }

    let list = match mode {
        RightsMode::View => &mut star.can_view,
        RightsMode::Edit => &mut star.can_edit,
    };

    match action {
        RightsAction::Add => {
            if !list.iter().any(|id| id == target) {
                list.push(target.to_string());
            }
        }
        RightsAction::Remove => list.retain(|id| id != target),
    }

    info!(
        star = %star.id,
        requester = %requester,
        target = %target,
        ?mode,
        ?action,
        "Star rights updated"
    );

    Ok(star)
}
