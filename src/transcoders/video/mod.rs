pub mod args;
pub mod engine;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use self::engine::{ThreadFlavour, VideoEngine};

/// declared media types routed to this pipeline; GIF is listed because only the
/// engine can write animated output
pub const SUPPORTED_MEDIA_TYPES: &[&str] = &[
    "video/mp4",
    "video/webm",
    "video/x-msvideo",
    "video/avi",
    "video/quicktime",
    "video/x-matroska",
    "video/mkv",
    "image/gif",
];

/// extensions recognized when the media type is missing or unknown
pub const EXTENSIONS: &[&str] = &["mp4", "webm", "avi", "mov", "mkv", "flv", "wmv", "3gp"];

const TARGETS: &[&str] = &["mp4", "webm", "avi", "mov", "gif", "mp3", "wav"];

// GIF sources carry no audio, so audio-only targets and GIF itself are not offered
const GIF_SOURCE_TARGETS: &[&str] = &["mp4", "webm", "avi", "mov"];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl VideoQuality {
    /// constant rate factor handed to codecs that support one
    pub fn crf(&self) -> u32 {
        match self {
            VideoQuality::Low => 35,
            VideoQuality::Medium => 28,
            VideoQuality::High => 23,
        }
    }
}

impl fmt::Display for VideoQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VideoQuality::Low => "low",
            VideoQuality::Medium => "medium",
            VideoQuality::High => "high",
        };
        f.write_str(name)
    }
}

pub fn available_formats(source_ext: &str) -> Vec<&'static str> {
    let source = source_ext.to_ascii_lowercase();
    if source == "gif" {
        return GIF_SOURCE_TARGETS.to_vec();
    }
    TARGETS.iter().copied().filter(|f| *f != source).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_formats() {
        assert_eq!(available_formats("mp4"), vec!["webm", "avi", "mov", "gif", "mp3", "wav"]);
        assert_eq!(available_formats("GIF"), vec!["mp4", "webm", "avi", "mov"]);
        assert_eq!(available_formats("mkv").len(), 7);
    }

    #[test]
    fn test_crf_values() {
        assert_eq!(VideoQuality::Low.crf(), 35);
        assert_eq!(VideoQuality::Medium.crf(), 28);
        assert_eq!(VideoQuality::High.crf(), 23);
        assert_eq!(VideoQuality::default(), VideoQuality::Medium);
        assert_eq!(VideoQuality::High.to_string(), "high");
    }
}
