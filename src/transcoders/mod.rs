pub mod audio;
pub mod image;
pub mod text;
pub mod video;

use bytes::Bytes;
use log::{info, warn};

use crate::classifier::Category;
use crate::transcoders::video::VideoQuality;

/// per-call overrides; anything left as None falls back to the converter's config
#[derive(Debug, Default, Clone)]
pub struct ConversionOptions {
    /// image encoder quality in [0, 1]; JPEG and WebP honor it
    pub quality: Option<f32>,
    /// video quality preset, mapped to a constant rate factor
    pub video_quality: Option<VideoQuality>,
    /// MP3 bitrate in kbps
    pub bitrate_kbps: Option<u32>,
}

/// what a pipeline hands back through the dispatcher
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub payload: Bytes,
    pub filename: String,
    pub mime_type: String,
}

/// fallback media type for targets missing from the lookup tables
pub const GENERIC_MIME_TYPE: &str = "application/octet-stream";

/// canonical output media type for a target within a category
///
/// unknown targets degrade to `GENERIC_MIME_TYPE` instead of failing
pub fn output_mime_type(category: Category, target: &str) -> &'static str {
    let target = target.to_ascii_lowercase();
    let mime = match category {
        Category::Image => match target.as_str() {
            "jpg" | "jpeg" => Some("image/jpeg"),
            "png" => Some("image/png"),
            "webp" => Some("image/webp"),
            "gif" => Some("image/gif"),
            "bmp" => Some("image/bmp"),
            "ico" => Some("image/x-icon"),
            _ => None,
        },
        Category::Text => match target.as_str() {
            "txt" => Some("text/plain"),
            "csv" => Some("text/csv"),
            "json" => Some("application/json"),
            "md" => Some("text/markdown"),
            "html" => Some("text/html"),
            "xml" => Some("application/xml"),
            _ => None,
        },
        Category::Audio => match target.as_str() {
            "mp3" => Some("audio/mpeg"),
            "wav" => Some("audio/wav"),
            _ => None,
        },
        Category::Video => match target.as_str() {
            "mp4" => Some("video/mp4"),
            "webm" => Some("video/webm"),
            "avi" => Some("video/x-msvideo"),
            "mov" => Some("video/quicktime"),
            "gif" => Some("image/gif"),
            "mp3" => Some("audio/mpeg"),
            "wav" => Some("audio/wav"),
            _ => None,
        },
        Category::Unsupported => None,
    };

    match mime {
        Some(mime) => mime,
        None => {
            warn!("No media type known for {} target '{}', using {}", category, target, GENERIC_MIME_TYPE);
            GENERIC_MIME_TYPE
        }
    }
}

/// logs and returns the fallback a pipeline uses for an unrecognized target
pub(crate) fn fallback_target<T: std::fmt::Debug>(pipeline: &str, requested: &str, fallback: T) -> T {
    info!("{} pipeline: unrecognized target '{}', falling back to {:?}", pipeline, requested, fallback);
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_mime_types() {
        assert_eq!(output_mime_type(Category::Image, "jpg"), "image/jpeg");
        assert_eq!(output_mime_type(Category::Image, "ICO"), "image/x-icon");
        assert_eq!(output_mime_type(Category::Text, "xml"), "application/xml");
        assert_eq!(output_mime_type(Category::Audio, "mp3"), "audio/mpeg");
        assert_eq!(output_mime_type(Category::Video, "gif"), "image/gif");
        assert_eq!(output_mime_type(Category::Video, "avi"), "video/x-msvideo");
    }

    // unrecognized targets are not rejected; they silently get the generic type
    #[test]
    fn test_unknown_target_degrades_to_octet_stream() {
        assert_eq!(output_mime_type(Category::Text, "docx"), GENERIC_MIME_TYPE);
        assert_eq!(output_mime_type(Category::Video, "mkv"), GENERIC_MIME_TYPE);
        assert_eq!(output_mime_type(Category::Image, "tiff"), GENERIC_MIME_TYPE);
        assert_eq!(output_mime_type(Category::Audio, "ogg"), GENERIC_MIME_TYPE);
    }
}
