use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

use crate::config::VideoConfig;
use crate::errors::ConvertError;
use crate::progress::ProgressReporter;

use super::{VideoQuality, args};

/// which ffmpeg threading mode the engine runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadFlavour {
    /// ffmpeg picks its own thread count
    Multi,
    Single,
    Fixed(usize),
}

impl ThreadFlavour {
    /// multi-threaded when more than one CPU is available, unless overridden
    pub fn detect(configured: Option<usize>) -> Self {
        match configured {
            Some(0) => ThreadFlavour::Multi,
            Some(1) => ThreadFlavour::Single,
            Some(n) => ThreadFlavour::Fixed(n),
            None if num_cpus::get() > 1 => ThreadFlavour::Multi,
            None => ThreadFlavour::Single,
        }
    }

    fn arg(&self) -> String {
        match self {
            ThreadFlavour::Multi => "0".to_string(),
            ThreadFlavour::Single => "1".to_string(),
            ThreadFlavour::Fixed(n) => n.to_string(),
        }
    }
}

/// a located, runnable ffmpeg binary
#[derive(Debug, Clone)]
pub struct VideoEngine {
    ffmpeg_path: PathBuf,
    threads: ThreadFlavour,
    scratch_dir: Option<PathBuf>,
}

fn is_runnable(path: &Path) -> bool {
    Command::new(path)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// parses an `HH:MM:SS.ss` timestamp as printed in ffmpeg progress lines
pub fn parse_timestamp(time: &str) -> Option<f64> {
    let mut parts = time.trim().split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || hours < 0.0 || minutes < 0.0 || seconds < 0.0 {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// engine progress mapped into the 25..=90 band of the whole conversion
pub fn progress_percent(elapsed_secs: f64, duration_secs: f64) -> f32 {
    if duration_secs <= 0.0 || !elapsed_secs.is_finite() {
        return 25.0;
    }
    let fraction = (elapsed_secs / duration_secs).clamp(0.0, 1.0);
    (25.0 + fraction * 65.0).min(90.0) as f32
}

/// a private scratch directory standing in for the engine's file namespace
struct Workspace {
    dir: TempDir,
    input: PathBuf,
    output: PathBuf,
}

impl Workspace {
    fn stage(parent: Option<&Path>, data: &[u8], input_ext: &str, output_ext: &str) -> Result<Self, ConvertError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("fileforge-");
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        let input = dir.path().join(format!("input.{}", input_ext));
        let output = dir.path().join(format!("output.{}", output_ext));
        fs::write(&input, data)?;
        Ok(Self { dir, input, output })
    }

    /// removal failures are logged and swallowed so they never mask a conversion error
    fn cleanup(self) {
        for path in [&self.input, &self.output] {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!("Failed to remove {:?}: {}", path, e);
                }
            }
        }
        if let Err(e) = self.dir.close() {
            debug!("Failed to remove engine workspace: {}", e);
        }
    }
}

impl VideoEngine {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, threads: ThreadFlavour) -> Self {
        Self { ffmpeg_path: ffmpeg_path.into(), threads, scratch_dir: None }
    }

    /// stages workspaces under `dir` instead of the system temp dir
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// finds a usable ffmpeg and applies the configured scratch dir
    pub fn load(config: &VideoConfig) -> Result<Self, ConvertError> {
        let engine = Self::locate(config)?;
        Ok(match &config.scratch_dir {
            Some(dir) => engine.with_scratch_dir(dir.clone()),
            None => engine,
        })
    }

    /// the configured path, then the sidecar location or PATH, downloading a build
    /// as a last resort when allowed
    fn locate(config: &VideoConfig) -> Result<Self, ConvertError> {
        let threads = ThreadFlavour::detect(config.threads);

        if let Some(path) = &config.ffmpeg_path {
            if is_runnable(path) {
                info!("Video engine: using configured ffmpeg at {:?} ({:?})", path, threads);
                return Ok(Self::new(path.clone(), threads));
            }
            return Err(ConvertError::Engine(format!("Configured ffmpeg at {:?} cannot be executed", path)));
        }

        let default_path = ffmpeg_sidecar::paths::ffmpeg_path();
        if is_runnable(&default_path) {
            info!("Video engine: using ffmpeg at {:?} ({:?})", default_path, threads);
            return Ok(Self::new(default_path, threads));
        }

        if !config.auto_download {
            return Err(ConvertError::Engine(
                "ffmpeg was not found and automatic download is disabled".to_string(),
            ));
        }

        warn!("Video engine: ffmpeg not found, downloading a build");
        ffmpeg_sidecar::download::auto_download()
            .map_err(|e| ConvertError::Engine(format!("Failed to download ffmpeg: {}", e)))?;

        let downloaded = ffmpeg_sidecar::paths::ffmpeg_path();
        if !is_runnable(&downloaded) {
            return Err(ConvertError::Engine(format!("Downloaded ffmpeg at {:?} cannot be executed", downloaded)));
        }
        info!("Video engine: using downloaded ffmpeg at {:?} ({:?})", downloaded, threads);
        Ok(Self::new(downloaded, threads))
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    pub fn threads(&self) -> ThreadFlavour {
        self.threads
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch_dir.as_deref()
    }

    /// runs one conversion in a fresh workspace; both staged files are removed afterwards
    /// whether or not the run succeeded
    pub fn convert(
        &self,
        data: &[u8],
        source_ext: &str,
        target: &str,
        quality: VideoQuality,
        progress: &ProgressReporter,
    ) -> Result<Vec<u8>, ConvertError> {
        let source_ext = if source_ext.is_empty() { "mp4" } else { source_ext };
        let target = target.to_ascii_lowercase();

        let workspace = Workspace::stage(self.scratch_dir(), data, source_ext, &target)?;
        progress.report(25.0);

        let result = self.run(&workspace, source_ext, &target, quality, progress);
        workspace.cleanup();

        let output = result?;
        progress.report(100.0);
        Ok(output)
    }

    fn run(
        &self,
        workspace: &Workspace,
        source_ext: &str,
        target: &str,
        quality: VideoQuality,
        progress: &ProgressReporter,
    ) -> Result<Vec<u8>, ConvertError> {
        let mut arguments = args::build(
            &workspace.input.to_string_lossy(),
            &workspace.output.to_string_lossy(),
            target,
            quality,
            source_ext.eq_ignore_ascii_case("gif"),
        );
        let output_at = arguments.len() - 1;
        arguments.splice(output_at..output_at, ["-threads".to_string(), self.threads.arg()]);

        info!("Video engine: {} -> {} ({:?})", source_ext, target, quality);
        debug!("Video engine arguments: {:?}", arguments);

        let mut child = FfmpegCommand::new_with_path(&self.ffmpeg_path)
            .hide_banner()
            .overwrite()
            .args(&arguments)
            .spawn()
            .map_err(|e| ConvertError::Engine(format!("Failed to start ffmpeg: {}", e)))?;

        let mut duration: Option<f64> = None;
        let mut failures: Vec<String> = Vec::new();

        let events = child
            .iter()
            .map_err(|e| ConvertError::Engine(format!("Failed to read ffmpeg output: {}", e)))?;
        for event in events {
            match event {
                FfmpegEvent::ParsedDuration(parsed) if duration.is_none() => duration = Some(parsed.duration),
                FfmpegEvent::Progress(p) => {
                    if let (Some(total), Some(elapsed)) = (duration, parse_timestamp(&p.time)) {
                        progress.report(progress_percent(elapsed, total));
                    }
                }
                FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, msg) => {
                    debug!("[ffmpeg] {}", msg);
                    failures.push(msg);
                }
                FfmpegEvent::Error(msg) => failures.push(msg),
                _ => {}
            }
        }

        let status = child
            .wait()
            .map_err(|e| ConvertError::Engine(format!("Failed to wait for ffmpeg: {}", e)))?;

        if !status.success() {
            error!("Video engine: ffmpeg exited with {:?}", status.code());
            return Err(ConvertError::Engine(format!(
                "ffmpeg exited with status {:?}: {}",
                status.code(),
                failures.join("; ")
            )));
        }

        progress.report(92.0);
        let output = fs::read(&workspace.output).map_err(|e| {
            ConvertError::Engine(format!("Conversion produced no output, the format may not be supported: {}", e))
        })?;
        if output.is_empty() {
            return Err(ConvertError::Engine("Conversion produced an empty file".to_string()));
        }

        info!("Video engine: produced {} bytes of {}", output.len(), target);
        Ok(output)
    }

    /// asks ffmpeg for the container duration without decoding any frames
    pub fn probe_duration(&self, data: &[u8], source_ext: &str) -> Result<f64, ConvertError> {
        let source_ext = if source_ext.is_empty() { "mp4" } else { source_ext };
        let workspace = Workspace::stage(self.scratch_dir(), data, source_ext, "probe")?;

        let result = self.run_probe(&workspace.input);
        workspace.cleanup();
        result
    }

    fn run_probe(&self, input: &Path) -> Result<f64, ConvertError> {
        let input = input.to_string_lossy();
        let mut child = FfmpegCommand::new_with_path(&self.ffmpeg_path)
            .hide_banner()
            .args(["-i", input.as_ref(), "-t", "0", "-f", "null", "-"])
            .spawn()
            .map_err(|e| ConvertError::Engine(format!("Failed to start ffmpeg: {}", e)))?;

        let mut duration = None;
        let events = child
            .iter()
            .map_err(|e| ConvertError::Engine(format!("Failed to read ffmpeg output: {}", e)))?;
        for event in events {
            if let FfmpegEvent::ParsedDuration(parsed) = event {
                duration.get_or_insert(parsed.duration);
            }
        }

        if let Err(e) = child.wait() {
            debug!("ffmpeg probe did not exit cleanly: {}", e);
        }

        duration.ok_or_else(|| ConvertError::Engine("ffmpeg reported no duration".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::codecs::gif::{GifEncoder, Repeat};
    use ::image::{Delay, Frame, Rgba, RgbaImage};

    fn local_engine() -> Option<VideoEngine> {
        let config = VideoConfig { auto_download: false, ..VideoConfig::default() };
        VideoEngine::load(&config).ok()
    }

    fn animated_gif(frames: u32) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut out);
            encoder.set_repeat(Repeat::Infinite).unwrap();
            for i in 0..frames {
                let image = RgbaImage::from_pixel(33, 21, Rgba([(i * 40) as u8, 80, 160, 255]));
                encoder
                    .encode_frame(Frame::from_parts(image, 0, 0, Delay::from_numer_denom_ms(100, 1)))
                    .unwrap();
            }
        }
        out
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:00:01.50"), Some(1.5));
        assert_eq!(parse_timestamp("01:02:03.00"), Some(3723.0));
        assert_eq!(parse_timestamp("N/A"), None);
        assert_eq!(parse_timestamp("1:2"), None);
        assert_eq!(parse_timestamp("-00:00:01.00"), None);
    }

    #[test]
    fn test_progress_band() {
        assert_eq!(progress_percent(0.0, 10.0), 25.0);
        assert_eq!(progress_percent(5.0, 10.0), 57.5);
        assert_eq!(progress_percent(30.0, 10.0), 90.0);
        assert_eq!(progress_percent(3.0, 0.0), 25.0);
    }

    #[test]
    fn test_thread_flavour() {
        assert_eq!(ThreadFlavour::detect(Some(0)), ThreadFlavour::Multi);
        assert_eq!(ThreadFlavour::detect(Some(1)), ThreadFlavour::Single);
        assert_eq!(ThreadFlavour::detect(Some(4)).arg(), "4");
        let detected = ThreadFlavour::detect(None);
        assert_eq!(detected == ThreadFlavour::Multi, num_cpus::get() > 1);
    }

    #[test]
    fn test_missing_configured_binary() {
        let config = VideoConfig {
            ffmpeg_path: Some(PathBuf::from("/nonexistent/ffmpeg-binary")),
            ..VideoConfig::default()
        };
        assert!(matches!(VideoEngine::load(&config), Err(ConvertError::Engine(_))));
    }

    fn is_empty_dir(dir: &Path) -> bool {
        fs::read_dir(dir).unwrap().next().is_none()
    }

    #[test]
    fn test_unstartable_engine_leaves_no_workspace() {
        let root = tempfile::tempdir().unwrap();
        let engine = VideoEngine::new("/nonexistent/ffmpeg", ThreadFlavour::Single).with_scratch_dir(root.path());

        let err = engine
            .convert(&animated_gif(2), "gif", "mp4", VideoQuality::Low, &ProgressReporter::silent())
            .unwrap_err();
        assert!(matches!(err, ConvertError::Engine(_)), "{:?}", err);
        assert!(is_empty_dir(root.path()));

        let err = engine.probe_duration(&animated_gif(2), "gif").unwrap_err();
        assert!(matches!(err, ConvertError::Engine(_)), "{:?}", err);
        assert!(is_empty_dir(root.path()));
    }

    #[test]
    fn test_load_applies_scratch_dir() {
        let Some(engine) = local_engine() else {
            eprintln!("ffmpeg not available, skipping");
            return;
        };
        assert_eq!(engine.scratch_dir(), None);

        let root = tempfile::tempdir().unwrap();
        let config = VideoConfig {
            ffmpeg_path: Some(engine.ffmpeg_path().to_path_buf()),
            scratch_dir: Some(root.path().to_path_buf()),
            ..VideoConfig::default()
        };
        let engine = VideoEngine::load(&config).unwrap();
        assert_eq!(engine.scratch_dir(), Some(root.path()));

        engine
            .convert(b"not a video", "mp4", "avi", VideoQuality::Low, &ProgressReporter::silent())
            .unwrap_err();
        assert!(is_empty_dir(root.path()));
    }

    #[test]
    fn test_gif_to_avi() {
        let Some(engine) = local_engine() else {
            eprintln!("ffmpeg not available, skipping");
            return;
        };

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress = ProgressReporter::new(move |p| sink.lock().unwrap().push(p));

        let avi = engine.convert(&animated_gif(5), "gif", "avi", VideoQuality::Medium, &progress).unwrap();
        assert_eq!(&avi[0..4], b"RIFF");
        assert_eq!(&avi[8..11], b"AVI");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&25.0));
        assert_eq!(seen.last(), Some(&100.0));
        assert!(seen.contains(&92.0));
    }

    #[test]
    fn test_failed_run_reports_engine_error() {
        let Some(engine) = local_engine() else {
            eprintln!("ffmpeg not available, skipping");
            return;
        };

        let err = engine
            .convert(b"not a video", "mp4", "avi", VideoQuality::Low, &ProgressReporter::silent())
            .unwrap_err();
        assert!(matches!(err, ConvertError::Engine(_)));
    }

    #[test]
    fn test_probe_duration() {
        let Some(engine) = local_engine() else {
            eprintln!("ffmpeg not available, skipping");
            return;
        };

        let duration = engine.probe_duration(&animated_gif(10), "gif").unwrap();
        assert!((duration - 1.0).abs() < 0.2, "duration {}", duration);
    }
}
