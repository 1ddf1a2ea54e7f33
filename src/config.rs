use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::ConvertError;
use crate::transcoders::video::VideoQuality;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub limits: LimitsConfig,
    pub image: ImageConfig,
    pub audio: AudioConfig,
    pub video: VideoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// size ceiling for files classified as video
    pub video_max_bytes: u64,
    /// size ceiling for every other category
    pub default_max_bytes: u64,
    /// audio/video longer than this needs confirmation before a batch runs
    pub long_media_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// encoder quality in [0, 1], honored by lossy targets only
    pub quality: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// MP3 bitrate in kbps
    pub bitrate_kbps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub quality: VideoQuality,
    /// explicit ffmpeg binary; when None the sidecar default location or PATH is used
    pub ffmpeg_path: Option<PathBuf>,
    /// fetch an ffmpeg build when none is installed
    pub auto_download: bool,
    /// overrides the detected thread flavour (0 = let ffmpeg decide)
    pub threads: Option<usize>,
    /// parent of the per-conversion workspaces; the system temp dir when None
    pub scratch_dir: Option<PathBuf>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            video_max_bytes: 500 * MIB,
            default_max_bytes: 100 * MIB,
            long_media_secs: 180.0,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self { quality: 0.92 }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { bitrate_kbps: 192 }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            quality: VideoQuality::Medium,
            ffmpeg_path: None,
            auto_download: true,
            threads: None,
            scratch_dir: None,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConvertError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConvertError::Argument(format!("Failed to read config file {:?}: {}", path.as_ref(), e))
        })?;

        toml::from_str(&content)
            .map_err(|e| ConvertError::Argument(format!("Failed to parse config file: {}", e)))
    }
}
