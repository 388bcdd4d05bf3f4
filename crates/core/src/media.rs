//! Accepted upload formats and how they are recognised.

use image::ImageFormat;

/// Number of leading bytes inspected when sniffing an upload.
pub const SNIFF_LEN: usize = 512;

/// Image formats the compositing executable accepts as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    WebP,
}

impl ImageKind {
    /// File extension used for tokens of this kind.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }

    /// Match a `Content-Type` header value. Parameters such as `charset`
    /// are tolerated.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let content_type = content_type.to_ascii_lowercase();
        [
            ("image/png", Self::Png),
            ("image/jpeg", Self::Jpeg),
            ("image/gif", Self::Gif),
            ("image/webp", Self::WebP),
        ]
        .into_iter()
        .find_map(|(mime, kind)| content_type.contains(mime).then_some(kind))
    }

    /// Recognise an image from its leading bytes (magic signature only).
    pub fn sniff(head: &[u8]) -> Option<Self> {
        match image::guess_format(head).ok()? {
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::WebP => Some(Self::WebP),
            _ => None,
        }
    }
}
