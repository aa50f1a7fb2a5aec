//! Media item images.

use serde::{Deserialize, Serialize};

/// Kind of image attached to a media item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageType {
    /// Thumbnail / cover art.
    #[default]
    Thumb,
    /// Landscape artwork.
    Landscape,
    /// Fan art.
    Fanart,
    /// Logo.
    Logo,
    /// Clear art.
    Clearart,
    /// Banner.
    Banner,
    /// Disc art.
    Cutout,
    /// Anything else.
    #[serde(other)]
    Other,
}

/// An image reference on a media item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItemImage {
    /// Image kind.
    #[serde(rename = "type")]
    pub image_type: ImageType,
    /// Path or URL of the image.
    pub path: String,
    /// Provider instance that can resolve `path`.
    pub provider: String,
    /// Whether `path` is a URL any client can fetch directly.
    #[serde(default)]
    pub remotely_accessible: bool,
}
