use serde::Serialize;
use std::fmt;

use crate::config::LimitsConfig;
use crate::errors::Rejection;
use crate::source::SourceFile;
use crate::transcoders::{audio, image, text, video};

/// which pipeline handles a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Image,
    Text,
    Audio,
    Video,
    Unsupported,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Image => "image",
            Category::Text => "text",
            Category::Audio => "audio",
            Category::Video => "video",
            Category::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// classifies from a declared media type and a lowercase extension
///
/// GIF is always video: only the engine can write animated output. After
/// that the media type is tried image, text, audio, video; then the extension
/// in the same order.
pub fn classify_parts(media_type: &str, extension: &str) -> Category {
    let media_type = media_type.to_ascii_lowercase();
    let extension = extension.to_ascii_lowercase();

    if media_type == "image/gif" || extension == "gif" {
        return Category::Video;
    }

    if image::SUPPORTED_MEDIA_TYPES.contains(&media_type.as_str()) {
        return Category::Image;
    }
    if text::SUPPORTED_MEDIA_TYPES.contains(&media_type.as_str()) {
        return Category::Text;
    }
    if audio::SUPPORTED_MEDIA_TYPES.contains(&media_type.as_str()) {
        return Category::Audio;
    }
    if video::SUPPORTED_MEDIA_TYPES.contains(&media_type.as_str()) {
        return Category::Video;
    }

    if !extension.is_empty() {
        let ext = extension.as_str();
        if image::EXTENSIONS.contains(&ext) {
            return Category::Image;
        }
        if text::EXTENSIONS.contains(&ext) {
            return Category::Text;
        }
        if audio::EXTENSIONS.contains(&ext) {
            return Category::Audio;
        }
        if video::EXTENSIONS.contains(&ext) {
            return Category::Video;
        }
    }

    Category::Unsupported
}

pub fn classify(file: &SourceFile) -> Category {
    classify_parts(file.media_type(), &file.extension())
}

/// legal targets for a source extension within a category, in display order
pub fn available_formats_for(category: Category, extension: &str) -> Vec<&'static str> {
    match category {
        Category::Image => image::available_formats(extension),
        Category::Text => text::available_formats(extension),
        Category::Audio => audio::available_formats(extension),
        Category::Video => video::available_formats(extension),
        Category::Unsupported => Vec::new(),
    }
}

pub fn available_formats(file: &SourceFile) -> Vec<&'static str> {
    available_formats_for(classify(file), &file.extension())
}

/// size ceiling that applies to a category
pub fn size_limit(category: Category, limits: &LimitsConfig) -> u64 {
    match category {
        Category::Video => limits.video_max_bytes,
        _ => limits.default_max_bytes,
    }
}

/// checks a file against the size ceiling for its category, then its support
pub fn validate(file: &SourceFile, limits: &LimitsConfig) -> Result<Category, Rejection> {
    let category = classify(file);
    let limit = size_limit(category, limits);

    if file.size() > limit {
        return Err(Rejection::TooLarge { limit_bytes: limit });
    }

    if category == Category::Unsupported {
        return Err(Rejection::Unsupported);
    }

    Ok(category)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn sparse_file(dir: &tempfile::TempDir, name: &str, size: u64) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(size).unwrap();
        path
    }

    #[test]
    fn test_gif_is_always_video() {
        assert_eq!(classify_parts("image/gif", "png"), Category::Video);
        assert_eq!(classify_parts("image/png", "gif"), Category::Video);
        assert_eq!(classify_parts("", "GIF"), Category::Video);
        assert_eq!(classify_parts("IMAGE/GIF", ""), Category::Video);
    }

    #[test]
    fn test_media_type_wins_over_extension() {
        assert_eq!(classify_parts("audio/mpeg", "txt"), Category::Audio);
        assert_eq!(classify_parts("text/csv", "png"), Category::Text);
        assert_eq!(classify_parts("video/quicktime", ""), Category::Video);
        assert_eq!(classify_parts("image/bmp", "wav"), Category::Image);
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(classify_parts("", "tif"), Category::Image);
        assert_eq!(classify_parts("application/octet-stream", "yml"), Category::Text);
        assert_eq!(classify_parts("", "wma"), Category::Audio);
        assert_eq!(classify_parts("", "3gp"), Category::Video);
        assert_eq!(classify_parts("", "bin"), Category::Unsupported);
        assert_eq!(classify_parts("application/x-thing", ""), Category::Unsupported);
    }

    #[test]
    fn test_avif_is_unsupported() {
        assert_eq!(classify_parts("", "avif"), Category::Unsupported);
        assert_eq!(classify_parts("image/avif", "avif"), Category::Unsupported);

        let file = SourceFile::from_bytes("photo.avif", "image/avif", vec![0u8; 32]);
        assert!(available_formats(&file).is_empty());
    }

    #[test]
    fn test_source_never_in_own_targets() {
        let all = image::EXTENSIONS
            .iter()
            .chain(text::EXTENSIONS)
            .chain(audio::EXTENSIONS)
            .chain(video::EXTENSIONS)
            .chain(["gif", "jpeg", "wave"].iter());

        for ext in all {
            let category = classify_parts("", ext);
            let targets = available_formats_for(category, ext);
            assert!(!targets.is_empty(), "{} has no targets", ext);
            assert!(!targets.contains(ext), "{} lists itself", ext);
        }
        assert!(!available_formats_for(Category::Image, "jpeg").contains(&"jpg"));
    }

    #[test]
    fn test_unsupported_has_no_targets() {
        let file = SourceFile::from_bytes("blob.bin", "", vec![0u8; 8]);
        assert!(available_formats(&file).is_empty());
    }

    #[tokio::test]
    async fn test_validate_size_limits() {
        let dir = tempfile::tempdir().unwrap();
        let limits = LimitsConfig::default();

        let big_video = SourceFile::open(sparse_file(&dir, "movie.mp4", 600 * MIB)).await.unwrap();
        assert_eq!(
            validate(&big_video, &limits),
            Err(Rejection::TooLarge { limit_bytes: 500 * MIB })
        );
        assert!(validate(&big_video, &limits).unwrap_err().to_string().contains("500MB"));

        let big_image = SourceFile::open(sparse_file(&dir, "scan.png", 150 * MIB)).await.unwrap();
        assert_eq!(
            validate(&big_image, &limits),
            Err(Rejection::TooLarge { limit_bytes: 100 * MIB })
        );

        let video_ok = SourceFile::open(sparse_file(&dir, "ok.mp4", 150 * MIB)).await.unwrap();
        assert_eq!(validate(&video_ok, &limits), Ok(Category::Video));
    }

    #[test]
    fn test_validate_rejects_unsupported() {
        let file = SourceFile::from_bytes("archive.xyz", "", vec![1, 2, 3]);
        assert_eq!(validate(&file, &LimitsConfig::default()), Err(Rejection::Unsupported));
    }
}
