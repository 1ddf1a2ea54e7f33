use log::{debug, info};
use mp3lame_encoder::{Bitrate, Builder, DualPcm, Encoder, FlushNoGap, Mode, MonoPcm, Quality};

use crate::audio_processor;
use crate::errors::ConvertError;
use crate::progress::ProgressReporter;

use super::decode::DecodedAudio;

/// samples per channel handed to the encoder per call
pub const BLOCK_SIZE: usize = 1152;

// LAME asks for at least this much room when flushing
const FLUSH_BUFFER_LEN: usize = 7200;

const BITRATES: &[(u32, Bitrate)] = &[
    (8, Bitrate::Kbps8),
    (16, Bitrate::Kbps16),
    (24, Bitrate::Kbps24),
    (32, Bitrate::Kbps32),
    (40, Bitrate::Kbps40),
    (48, Bitrate::Kbps48),
    (64, Bitrate::Kbps64),
    (80, Bitrate::Kbps80),
    (96, Bitrate::Kbps96),
    (112, Bitrate::Kbps112),
    (128, Bitrate::Kbps128),
    (160, Bitrate::Kbps160),
    (192, Bitrate::Kbps192),
    (224, Bitrate::Kbps224),
    (256, Bitrate::Kbps256),
    (320, Bitrate::Kbps320),
];

/// nearest bitrate LAME accepts; ties resolve to the lower one
pub fn nearest_bitrate(kbps: u32) -> (u32, Bitrate) {
    BITRATES
        .iter()
        .copied()
        .min_by_key(|(rate, _)| rate.abs_diff(kbps))
        .unwrap_or((192, Bitrate::Kbps192))
}

/// handle to the LAME encoder library
///
/// loading only proves the library can allocate an encoder context; every
/// conversion builds its own encoder from it
#[derive(Debug)]
pub struct Mp3Backend {
    _private: (),
}

impl Mp3Backend {
    pub fn load() -> Result<Self, ConvertError> {
        Builder::new()
            .map(|_| Self { _private: () })
            .ok_or_else(|| ConvertError::Mp3Encoder("LAME could not allocate an encoder context".to_string()))
    }

    fn build_encoder(&self, channels: u8, sample_rate: u32, bitrate: Bitrate) -> Result<Encoder, ConvertError> {
        let mut builder = Builder::new()
            .ok_or_else(|| ConvertError::Mp3Encoder("LAME could not allocate an encoder context".to_string()))?;

        builder
            .set_num_channels(channels)
            .map_err(|e| ConvertError::Mp3Encoder(format!("Invalid channel count {}: {:?}", channels, e)))?;
        builder
            .set_sample_rate(sample_rate)
            .map_err(|e| ConvertError::Mp3Encoder(format!("Invalid sample rate {}: {:?}", sample_rate, e)))?;
        builder
            .set_brate(bitrate)
            .map_err(|e| ConvertError::Mp3Encoder(format!("Invalid bitrate: {:?}", e)))?;
        let mode = if channels == 2 { Mode::JointStereo } else { Mode::Mono };
        builder
            .set_mode(mode)
            .map_err(|e| ConvertError::Mp3Encoder(format!("Invalid mode: {:?}", e)))?;
        builder
            .set_quality(Quality::Good)
            .map_err(|e| ConvertError::Mp3Encoder(format!("Invalid quality: {:?}", e)))?;

        builder
            .build()
            .map_err(|e| ConvertError::Mp3Encoder(format!("Failed to initialize LAME: {:?}", e)))
    }

    /// encodes at most two channels; anything wider is mixed down to stereo first
    ///
    /// progress moves linearly from 30 to 90 with the processed blocks
    pub fn encode(
        &self,
        audio: &DecodedAudio,
        bitrate_kbps: u32,
        progress: &ProgressReporter,
    ) -> Result<Vec<u8>, ConvertError> {
        let channels = match audio.channel_count() {
            0 => return Err(ConvertError::AudioDecode("Audio has no channels".to_string())),
            1 | 2 => audio.channels.clone(),
            n => {
                debug!("MP3 encoder: mixing {} channels down to stereo", n);
                let interleaved = audio_processor::interleave(&audio.channels);
                let mixed = audio_processor::mix_channels(&interleaved, n.min(u8::MAX as usize) as u8, 2);
                audio_processor::deinterleave(&mixed, 2)
            }
        };

        let (kbps, bitrate) = nearest_bitrate(bitrate_kbps);
        info!(
            "MP3 encoder: {} channel(s), {} Hz, {} kbps (requested {})",
            channels.len(),
            audio.sample_rate,
            kbps,
            bitrate_kbps
        );

        let left = audio_processor::f32_to_i16(&channels[0]);
        let right = channels.get(1).map(|right| audio_processor::f32_to_i16(right));

        let mut encoder = self.build_encoder(channels.len() as u8, audio.sample_rate, bitrate)?;
        let total_blocks = left.len().div_ceil(BLOCK_SIZE);
        let mut out = Vec::new();

        for (index, start) in (0..left.len()).step_by(BLOCK_SIZE).enumerate() {
            let end = (start + BLOCK_SIZE).min(left.len());
            out.reserve(mp3lame_encoder::max_required_buffer_size(end - start));

            let written = match &right {
                Some(right) => encoder.encode_to_vec(
                    DualPcm { left: &left[start..end], right: &right[start..end] },
                    &mut out,
                ),
                None => encoder.encode_to_vec(MonoPcm(&left[start..end]), &mut out),
            }
            .map_err(|e| ConvertError::Mp3Encoder(format!("Failed to encode block {}: {:?}", index, e)))?;

            debug!("MP3 encoder: block {}/{} produced {} bytes", index + 1, total_blocks, written);
            progress.report_span(index as f64 / total_blocks as f64, 30.0, 90.0);
        }

        out.reserve(FLUSH_BUFFER_LEN);
        encoder
            .flush_to_vec::<FlushNoGap>(&mut out)
            .map_err(|e| ConvertError::Mp3Encoder(format!("Failed to flush: {:?}", e)))?;

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn tone(channels: usize, sample_rate: u32, secs: f32) -> DecodedAudio {
        let frames = (sample_rate as f32 * secs) as usize;
        let channel = |phase: f32| {
            (0..frames)
                .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / sample_rate as f32 + phase).sin() * 0.5)
                .collect::<Vec<_>>()
        };
        DecodedAudio { channels: (0..channels).map(|c| channel(c as f32)).collect(), sample_rate }
    }

    fn has_frame_sync(mp3: &[u8]) -> bool {
        mp3.windows(2).any(|w| w[0] == 0xFF && w[1] & 0xE0 == 0xE0)
    }

    #[test]
    fn test_nearest_bitrate() {
        assert_eq!(nearest_bitrate(192).0, 192);
        assert_eq!(nearest_bitrate(200).0, 192);
        assert_eq!(nearest_bitrate(1000).0, 320);
        assert_eq!(nearest_bitrate(0).0, 8);
        assert_eq!(nearest_bitrate(144).0, 128);
    }

    #[test]
    fn test_stereo_and_mono_produce_frames() {
        let backend = Mp3Backend::load().unwrap();

        let stereo = backend.encode(&tone(2, 44100, 0.5), 192, &ProgressReporter::silent()).unwrap();
        assert!(has_frame_sync(&stereo));

        let mono = backend.encode(&tone(1, 22050, 0.5), 64, &ProgressReporter::silent()).unwrap();
        assert!(has_frame_sync(&mono));
    }

    #[test]
    fn test_surround_is_mixed_down() {
        let backend = Mp3Backend::load().unwrap();
        let mp3 = backend.encode(&tone(6, 48000, 0.2), 128, &ProgressReporter::silent()).unwrap();
        assert!(has_frame_sync(&mp3));
    }

    #[test]
    fn test_progress_stays_in_encode_span() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress = ProgressReporter::new(move |p| sink.lock().unwrap().push(p));

        Mp3Backend::load().unwrap().encode(&tone(1, 16000, 1.0), 64, &progress).unwrap();

        let seen = seen.lock().unwrap();
        // 16000 frames in blocks of 1152
        assert_eq!(seen.len(), 14);
        assert_eq!(seen[0], 30.0);
        assert!(seen.iter().all(|p| (30.0..90.0).contains(p)));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }
}
