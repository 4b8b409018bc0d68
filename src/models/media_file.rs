use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
}

impl MediaKind {
    /// Classifies a content type by its top-level category. Only lower-case
    /// `video/*`, `audio/*` or `image/*` with a non-empty subtype is media.
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        let (category, subtype) = mime_type.split_once('/')?;
        if subtype.is_empty() {
            return None;
        }
        match category {
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Image => write!(f, "image"),
        }
    }
}

/// Metadata snapshot of a media file, keyed by the provider's file id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFileRecord {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(with = "size_as_string")]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5_checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_folder_id: Option<String>,
    /// Wall-clock milliseconds at discovery.
    pub indexed_at: i64,
}

impl MediaFileRecord {
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_mime_type(&self.mime_type)
    }
}

/// Parses a wire-form byte count. Sizes travel as decimal strings so values past
/// 2^53 survive intact.
pub fn parse_size(raw: &str) -> Result<u64, AppError> {
    let trimmed = raw.trim();
    trimmed
        .parse::<u64>()
        .map_err(|e| AppError::InvalidRecord(format!("invalid size {trimmed:?}: {e}")))
}

mod size_as_string {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(size: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&size.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SizeVisitor;

        impl<'de> Visitor<'de> for SizeVisitor {
            type Value = u64;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a non-negative integer or a decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
                Ok(v)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
                super::parse_size(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(SizeVisitor)
    }
}
