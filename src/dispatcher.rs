use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::classifier::{self, Category};
use crate::config::Config;
use crate::errors::{ConvertError, Rejection};
use crate::progress::ProgressReporter;
use crate::service::LazyService;
use crate::source::SourceFile;
use crate::transcoders::audio::{self, AudioTarget, Mp3Backend};
use crate::transcoders::video::VideoEngine;
use crate::transcoders::{ConversionOptions, ConversionResult, image, output_mime_type, text};
use crate::utils;

/// single entry point over the four pipelines
///
/// The MP3 encoder backend and the video engine are loaded on first use and
/// shared by every conversion this converter runs.
pub struct Converter {
    config: Config,
    mp3: LazyService<Mp3Backend>,
    engine: LazyService<VideoEngine>,
}

impl Converter {
    pub fn new(config: Config) -> Self {
        let mp3 = LazyService::new("MP3 encoder", || async {
            tokio::task::spawn_blocking(Mp3Backend::load).await?
        });

        let video_config = config.video.clone();
        let engine = LazyService::new("video engine", move || {
            let video_config = video_config.clone();
            async move { tokio::task::spawn_blocking(move || VideoEngine::load(&video_config)).await? }
        });

        Self::with_services(config, mp3, engine)
    }

    /// builds a converter around prepared (or stubbed) dependencies
    pub fn with_services(config: Config, mp3: LazyService<Mp3Backend>, engine: LazyService<VideoEngine>) -> Self {
        Self { config, mp3, engine }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mp3_service(&self) -> &LazyService<Mp3Backend> {
        &self.mp3
    }

    pub fn engine_service(&self) -> &LazyService<VideoEngine> {
        &self.engine
    }

    /// lets dependencies that failed to load be tried again
    pub fn reset_failed_services(&self) {
        self.mp3.reset_failed();
        self.engine.reset_failed();
    }

    pub fn get_category(&self, file: &SourceFile) -> Category {
        classifier::classify(file)
    }

    pub fn get_available_formats(&self, file: &SourceFile) -> Vec<&'static str> {
        classifier::available_formats(file)
    }

    pub fn validate(&self, file: &SourceFile) -> Result<Category, Rejection> {
        classifier::validate(file, &self.config.limits)
    }

    /// converts one file; the result is named `<basename>.<target>`
    ///
    /// the target is not checked against `get_available_formats`: pipelines
    /// substitute their own fallback for targets they do not know
    pub async fn convert(
        &self,
        file: &SourceFile,
        target: &str,
        progress: ProgressReporter,
        options: &ConversionOptions,
    ) -> Result<ConversionResult, ConvertError> {
        let category = self.get_category(file);
        if category == Category::Unsupported {
            return Err(unsupported(file));
        }

        info!("Converting {:?} ({}) to '{}'", file.name(), category, target);
        let source_ext = file.extension();
        let data = file.read().await?;
        let target_ext = target.to_string();

        let payload = match category {
            Category::Image => {
                let quality = options.quality.unwrap_or(self.config.image.quality);
                tokio::task::spawn_blocking(move || image::convert(&data, &target_ext, quality, &progress)).await??
            }
            Category::Text => {
                tokio::task::spawn_blocking(move || text::convert(&data, &source_ext, &target_ext, &progress))
                    .await??
            }
            Category::Audio => {
                let audio_target = AudioTarget::resolve(target);
                let bitrate = options.bitrate_kbps.unwrap_or(self.config.audio.bitrate_kbps);
                let backend = match audio_target {
                    AudioTarget::Mp3 => Some(self.mp3.get().await?),
                    AudioTarget::Wav => None,
                };
                tokio::task::spawn_blocking(move || {
                    audio::convert(&data, &source_ext, audio_target, bitrate, backend.as_deref(), &progress)
                })
                .await??
            }
            Category::Video => {
                let quality = options.video_quality.unwrap_or(self.config.video.quality);
                progress.report(5.0);
                let engine = self.engine.get().await?;
                progress.report(15.0);
                tokio::task::spawn_blocking(move || engine.convert(&data, &source_ext, &target_ext, quality, &progress))
                    .await??
            }
            Category::Unsupported => return Err(unsupported(file)),
        };

        let result = ConversionResult {
            payload: payload.into(),
            filename: utils::output_filename(file.name(), target),
            mime_type: output_mime_type(category, target).to_string(),
        };
        info!("Converted {:?} -> {:?} ({} bytes)", file.name(), result.filename, result.payload.len());
        Ok(result)
    }

    /// media duration in seconds; `None` for categories without one
    pub async fn get_duration(&self, file: &SourceFile) -> Result<Option<f64>, ConvertError> {
        let source_ext = file.extension();
        match self.get_category(file) {
            Category::Audio => {
                let data = file.read().await?;
                let duration =
                    tokio::task::spawn_blocking(move || audio::probe_duration(&data, &source_ext)).await??;
                Ok(Some(duration))
            }
            Category::Video => {
                let engine = self.engine.get().await?;
                let data = file.read().await?;
                let duration =
                    tokio::task::spawn_blocking(move || engine.probe_duration(&data, &source_ext)).await??;
                Ok(Some(duration))
            }
            _ => Ok(None),
        }
    }

    pub async fn is_long_video(&self, file: &SourceFile) -> bool {
        self.is_long(file, Category::Video).await
    }

    pub async fn is_long_audio(&self, file: &SourceFile) -> bool {
        self.is_long(file, Category::Audio).await
    }

    /// the duration of audio or video running past `limits.long_media_secs`
    ///
    /// probe failures count as "not long"
    pub async fn long_media_duration(&self, file: &SourceFile) -> Option<f64> {
        match self.get_duration(file).await {
            Ok(Some(duration)) if duration > self.config.limits.long_media_secs => Some(duration),
            Ok(_) => None,
            Err(e) => {
                debug!("Duration probe failed for {:?}: {}", file.name(), e);
                None
            }
        }
    }

    async fn is_long(&self, file: &SourceFile, category: Category) -> bool {
        self.get_category(file) == category && self.long_media_duration(file).await.is_some()
    }

    pub fn format_duration(seconds: f64) -> String {
        utils::format_duration(seconds)
    }

    pub fn format_file_size(bytes: u64) -> String {
        utils::format_file_size(bytes)
    }

    /// saves a payload as `dir/filename`
    ///
    /// the bytes go to a temporary file in `dir` first, which is then renamed into
    /// place, so a failed write never leaves a partial file under the final name
    pub async fn download(&self, payload: &[u8], filename: &str, dir: &Path) -> Result<PathBuf, ConvertError> {
        let file_name = Path::new(filename)
            .file_name()
            .ok_or_else(|| ConvertError::Path(format!("Invalid output file name: {:?}", filename)))?
            .to_owned();
        let destination = dir.join(file_name);
        let dir = dir.to_path_buf();
        let payload = payload.to_vec();

        let target = destination.clone();
        tokio::task::spawn_blocking(move || -> Result<(), ConvertError> {
            use std::io::Write;

            std::fs::create_dir_all(&dir)?;
            let mut staged = tempfile::NamedTempFile::new_in(&dir)?;
            staged.write_all(&payload)?;
            staged.flush()?;
            staged.persist(&target).map_err(|e| ConvertError::Io(e.error))?;
            Ok(())
        })
        .await??;

        info!("Saved {:?}", destination);
        Ok(destination)
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

fn unsupported(file: &SourceFile) -> ConvertError {
    ConvertError::UnsupportedInputFormat(file.name().to_string())
}
