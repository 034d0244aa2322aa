//! Resource kinds of the star hierarchy
//!
//! A star owns collections (photo albums, video albums, 3D rooms) and a flat
//! set of star-level items (audios, documents, messages). Collections own
//! items of their own kinds. Every kind knows its storage collection, its URL
//! segment and the slug used to address it in policy configuration.

use std::fmt;

/// A named grouping owned by exactly one star
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    PhotoAlbum,
    VideoAlbum,
    Room,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 3] = [Self::PhotoAlbum, Self::VideoAlbum, Self::Room];

    /// URL segment and policy slug
    pub fn slug(self) -> &'static str {
        match self {
            Self::PhotoAlbum => "photo-albums",
            Self::VideoAlbum => "video-albums",
            Self::Room => "three-d-rooms",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.slug() == slug)
    }

    /// Backing document collection
    pub fn collection_name(self) -> &'static str {
        match self {
            Self::PhotoAlbum => "photo_albums",
            Self::VideoAlbum => "video_albums",
            Self::Room => "three_d_rooms",
        }
    }

    /// Item kinds that live inside this collection
    pub fn item_kinds(self) -> &'static [ItemKind] {
        match self {
            Self::PhotoAlbum => &[ItemKind::Photo],
            Self::VideoAlbum => &[ItemKind::Video],
            Self::Room => &[
                ItemKind::RoomPhoto,
                ItemKind::RoomVideo,
                ItemKind::RoomAudio,
                ItemKind::RoomDocument,
                ItemKind::RoomMessage,
            ],
        }
    }

    /// Resolve a nested URL segment (`photos`, `documents`, ...) to an item kind
    pub fn item_kind(self, segment: &str) -> Option<ItemKind> {
        self.item_kinds()
            .iter()
            .copied()
            .find(|k| k.segment() == segment)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::PhotoAlbum => "Photo album",
            Self::VideoAlbum => "Video album",
            Self::Room => "3D room",
        }
    }
}

/// A leaf content unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Photo,
    Video,
    Audio,
    Document,
    Message,
    RoomPhoto,
    RoomVideo,
    RoomAudio,
    RoomDocument,
    RoomMessage,
}

impl ItemKind {
    pub const ALL: [ItemKind; 10] = [
        Self::Photo,
        Self::Video,
        Self::Audio,
        Self::Document,
        Self::Message,
        Self::RoomPhoto,
        Self::RoomVideo,
        Self::RoomAudio,
        Self::RoomDocument,
        Self::RoomMessage,
    ];

    /// Items attached directly to a star
    pub const STAR_LEVEL: [ItemKind; 3] = [Self::Audio, Self::Document, Self::Message];

    /// Owning collection kind, `None` for star-level items
    pub fn parent(self) -> Option<CollectionKind> {
        match self {
            Self::Photo => Some(CollectionKind::PhotoAlbum),
            Self::Video => Some(CollectionKind::VideoAlbum),
            Self::Audio | Self::Document | Self::Message => None,
            Self::RoomPhoto
            | Self::RoomVideo
            | Self::RoomAudio
            | Self::RoomDocument
            | Self::RoomMessage => Some(CollectionKind::Room),
        }
    }

    /// URL segment below the star or collection
    pub fn segment(self) -> &'static str {
        match self {
            Self::Photo | Self::RoomPhoto => "photos",
            Self::Video | Self::RoomVideo => "videos",
            Self::Audio | Self::RoomAudio => "audios",
            Self::Document | Self::RoomDocument => "documents",
            Self::Message | Self::RoomMessage => "messages",
        }
    }

    /// Policy slug, unique across all resource kinds
    pub fn slug(self) -> &'static str {
        match self {
            Self::Photo => "photos",
            Self::Video => "videos",
            Self::Audio => "audios",
            Self::Document => "documents",
            Self::Message => "messages",
            Self::RoomPhoto => "three-d-room-photos",
            Self::RoomVideo => "three-d-room-videos",
            Self::RoomAudio => "three-d-room-audios",
            Self::RoomDocument => "three-d-room-documents",
            Self::RoomMessage => "three-d-room-messages",
        }
    }

    pub fn collection_name(self) -> &'static str {
        match self {
            Self::Photo => "photos",
            Self::Video => "videos",
            Self::Audio => "audios",
            Self::Document => "documents",
            Self::Message => "messages",
            Self::RoomPhoto => "three_d_room_photos",
            Self::RoomVideo => "three_d_room_videos",
            Self::RoomAudio => "three_d_room_audios",
            Self::RoomDocument => "three_d_room_documents",
            Self::RoomMessage => "three_d_room_messages",
        }
    }

    /// Resolve a star-level URL segment (`audios`, `documents`, `messages`)
    pub fn star_level(segment: &str) -> Option<Self> {
        Self::STAR_LEVEL.into_iter().find(|k| k.segment() == segment)
    }

    /// Whether records carry their own view/edit lists.
    /// Photos and videos inherit only through their collection.
    pub fn has_own_grants(self) -> bool {
        !matches!(
            self,
            Self::Photo | Self::Video | Self::RoomPhoto | Self::RoomVideo
        )
    }

    /// Whether records point at a stored blob
    pub fn is_blob(self) -> bool {
        !self.is_message()
    }

    pub fn is_message(self) -> bool {
        matches!(self, Self::Message | Self::RoomMessage)
    }

    /// Multipart field carrying the file
    pub fn upload_field(self) -> &'static str {
        match self {
            Self::Photo | Self::RoomPhoto => "photo",
            Self::Video | Self::RoomVideo => "video",
            Self::Audio | Self::RoomAudio => "audio",
            Self::Document | Self::RoomDocument => "document",
            Self::Message | Self::RoomMessage => "message",
        }
    }

    /// Item kinds that store blobs, used for reference counting
    pub fn blob_kinds() -> impl Iterator<Item = ItemKind> {
        Self::ALL.into_iter().filter(|k| k.is_blob())
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Photo | Self::RoomPhoto => "Photo",
            Self::Video | Self::RoomVideo => "Video",
            Self::Audio | Self::RoomAudio => "Audio",
            Self::Document | Self::RoomDocument => "Document",
            Self::Message | Self::RoomMessage => "Message",
        }
    }
}

/// Any resource kind addressable by policy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Collection(CollectionKind),
    Item(ItemKind),
}

impl ResourceKind {
    pub fn all() -> impl Iterator<Item = ResourceKind> {
        CollectionKind::ALL
            .into_iter()
            .map(Self::Collection)
            .chain(ItemKind::ALL.into_iter().map(Self::Item))
    }

    pub fn slug(self) -> &'static str {
        match self {
            Self::Collection(kind) => kind.slug(),
            Self::Item(kind) => kind.slug(),
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::all().find(|k| k.slug() == slug)
    }
}

impl From<CollectionKind> for ResourceKind {
    fn from(kind: CollectionKind) -> Self {
        Self::Collection(kind)
    }
}

impl From<ItemKind> for ResourceKind {
    fn from(kind: ItemKind) -> Self {
        Self::Item(kind)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}
