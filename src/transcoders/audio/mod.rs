pub mod decode;
pub mod mp3;
pub mod wav;

use log::info;

use crate::errors::ConvertError;
use crate::progress::ProgressReporter;
use crate::transcoders::fallback_target;

pub use self::decode::{DecodedAudio, probe_duration};
pub use self::mp3::Mp3Backend;

/// declared media types routed to this pipeline
pub const SUPPORTED_MEDIA_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/wave",
    "audio/x-wav",
    "audio/ogg",
    "audio/flac",
    "audio/aac",
    "audio/mp4",
    "audio/webm",
];

/// extensions recognized when the media type is missing or unknown
pub const EXTENSIONS: &[&str] = &["mp3", "wav", "wave", "ogg", "flac", "aac", "m4a", "wma"];

const TARGETS: &[&str] = &["mp3", "wav"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioTarget {
    Mp3,
    Wav,
}

impl AudioTarget {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp3" => Some(AudioTarget::Mp3),
            "wav" | "wave" => Some(AudioTarget::Wav),
            _ => None,
        }
    }

    /// like `from_extension`, but unknown targets are written as WAV
    pub fn resolve(ext: &str) -> Self {
        Self::from_extension(ext).unwrap_or_else(|| fallback_target("Audio", ext, AudioTarget::Wav))
    }
}

/// legal targets for a source extension; `wave` counts as `wav`
pub fn available_formats(source_ext: &str) -> Vec<&'static str> {
    let source = source_ext.to_ascii_lowercase();
    let source = if source == "wave" { "wav".to_string() } else { source };
    TARGETS.iter().copied().filter(|f| *f != source).collect()
}

/// decodes `data` and re-encodes it as `target`
///
/// MP3 output needs a loaded `Mp3Backend`; WAV output has no such dependency
pub fn convert(
    data: &[u8],
    source_ext: &str,
    target: AudioTarget,
    bitrate_kbps: u32,
    backend: Option<&Mp3Backend>,
    progress: &ProgressReporter,
) -> Result<Vec<u8>, ConvertError> {
    info!("Audio pipeline: {} bytes of '{}' to {:?}", data.len(), source_ext, target);
    progress.report(5.0);

    if target == AudioTarget::Mp3 && backend.is_none() {
        return Err(ConvertError::Mp3Encoder("MP3 encoder backend is not loaded".to_string()));
    }
    progress.report(15.0);

    let audio = decode::decode(data, source_ext)?;
    info!(
        "Audio pipeline: decoded {} frame(s), {} channel(s) at {} Hz",
        audio.frames(),
        audio.channel_count(),
        audio.sample_rate
    );
    progress.report(30.0);

    let encoded = match (target, backend) {
        (AudioTarget::Mp3, Some(backend)) => backend.encode(&audio, bitrate_kbps, progress)?,
        _ => wav::encode(&audio, progress),
    };
    progress.report(90.0);

    progress.report(100.0);
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    fn mono_wav(sample_rate: u32, frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec { channels: 1, sample_rate, bits_per_sample: 16, sample_format: hound::SampleFormat::Int };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                writer.write_sample(((i % 200) as i16 - 100) * 100).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_available_formats() {
        assert_eq!(available_formats("mp3"), vec!["wav"]);
        assert_eq!(available_formats("WAVE"), vec!["mp3"]);
        assert_eq!(available_formats("ogg"), vec!["mp3", "wav"]);
    }

    #[test]
    fn test_resolve_falls_back_to_wav() {
        assert_eq!(AudioTarget::resolve("mp3"), AudioTarget::Mp3);
        assert_eq!(AudioTarget::resolve("ogg"), AudioTarget::Wav);
    }

    #[test]
    fn test_wav_to_wav_keeps_samples() {
        let source = mono_wav(16000, 1600);
        let out = convert(&source, "wav", AudioTarget::Wav, 192, None, &ProgressReporter::silent()).unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(out)).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().bits_per_sample, 16);

        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples.len(), 1600);
        // negative samples come back exact, positive ones may lose one step
        assert_eq!(samples[0], -10000);
        assert_eq!(samples[150], 4999);
    }

    #[test]
    fn test_mp3_without_backend_fails() {
        let err = convert(&mono_wav(8000, 10), "wav", AudioTarget::Mp3, 128, None, &ProgressReporter::silent())
            .unwrap_err();
        assert!(matches!(err, ConvertError::Mp3Encoder(_)));
    }

    #[test]
    fn test_wav_to_mp3_progress() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress = ProgressReporter::new(move |p| sink.lock().unwrap().push(p));

        let backend = Mp3Backend::load().unwrap();
        let mp3 = convert(&mono_wav(16000, 4000), "wav", AudioTarget::Mp3, 64, Some(&backend), &progress).unwrap();
        assert!(mp3.windows(2).any(|w| w[0] == 0xFF && w[1] & 0xE0 == 0xE0));

        let seen = seen.lock().unwrap();
        assert_eq!(&seen[..3], &[5.0, 15.0, 30.0]);
        assert_eq!(&seen[seen.len() - 2..], &[90.0, 100.0]);
    }

    #[test]
    fn test_wav_progress_checkpoints() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress = ProgressReporter::new(move |p| sink.lock().unwrap().push(p));

        convert(&mono_wav(8000, 100), "wav", AudioTarget::Wav, 192, None, &progress).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![5.0, 15.0, 30.0, 50.0, 70.0, 85.0, 90.0, 100.0]);
    }
}
