//! Shared types used by both the extractor and the patcher.
//!
//! These appear in `sitefix.toml` and in the JSON run report, so their serde
//! representation is part of the tool's external surface.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raster format tag recognized in `data:image/<tag>;base64,` references.
///
/// `jpg` and `jpeg` are kept distinct because the tag is matched literally in
/// the markup; both describe JPEG content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpg,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Every tag the extractor knows, in the order they are tried.
    pub const ALL: [ImageFormat; 5] = [
        ImageFormat::Png,
        ImageFormat::Jpg,
        ImageFormat::Jpeg,
        ImageFormat::Gif,
        ImageFormat::Webp,
    ];

    /// The literal tag as it appears after `data:image/`.
    pub fn tag(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
        }
    }

    /// Whether content sniffed as `detected` is consistent with this tag.
    pub fn matches_content(self, detected: image::ImageFormat) -> bool {
        matches!(
            (self, detected),
            (ImageFormat::Png, image::ImageFormat::Png)
                | (ImageFormat::Jpg | ImageFormat::Jpeg, image::ImageFormat::Jpeg)
                | (ImageFormat::Gif, image::ImageFormat::Gif)
                | (ImageFormat::Webp, image::ImageFormat::WebP)
        )
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageFormat::ALL
            .into_iter()
            .find(|f| f.tag().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown image format '{s}'"))
    }
}
