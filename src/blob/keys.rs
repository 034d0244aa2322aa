//! Object key layout
//!
//! - star-level items: `stars/{star}/{kind}/{ts}-{name}`
//! - album items:      `stars/{star}/{album-kind}/{album}/{ts}-{name}`
//! - 3D-room media:    `stars/{star}/three-d-rooms/{room}/{kind}/{ts}-{name}`

use chrono::Utc;

use crate::resources::{CollectionKind, ItemKind};

/// Key for a newly uploaded item blob
pub fn blob_key(
    kind: ItemKind,
    star_id: &str,
    collection_id: Option<&str>,
    original_name: &str,
) -> String {
    blob_key_at(kind, star_id, collection_id, original_name, Utc::now().timestamp_millis())
}

pub(crate) fn blob_key_at(
    kind: ItemKind,
    star_id: &str,
    collection_id: Option<&str>,
    original_name: &str,
    timestamp_ms: i64,
) -> String {
    let file = format!("{}-{}", timestamp_ms, sanitize(original_name));
    match (kind.parent(), collection_id) {
        (Some(CollectionKind::Room), Some(room)) => format!(
            "stars/{}/{}/{}/{}/{}",
            star_id,
            CollectionKind::Room.slug(),
            room,
            kind.segment(),
            file
        ),
        (Some(album), Some(album_id)) => {
            format!("stars/{}/{}/{}/{}", star_id, album.slug(), album_id, file)
        }
        _ => format!("stars/{}/{}/{}", star_id, kind.segment(), file),
    }
}

/// Key for death certificate evidence
pub fn death_certificate_key(user_id: &str, original_name: &str) -> String {
    format!(
        "death-certificates/{}/{}-{}",
        user_id,
        Utc::now().timestamp_millis(),
        sanitize(original_name)
    )
}

/// Keep a client file name from escaping its directory
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "file".to_string()
    } else {
        cleaned
    }
}
