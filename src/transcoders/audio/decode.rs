use claxon::FlacReader;
use log::{debug, info, warn};
use std::io::{Cursor, ErrorKind};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio_processor;
use crate::errors::ConvertError;

/// decoded audio: one f32 buffer per channel at the source sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

fn is_wav(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE"
}

fn is_flac(data: &[u8]) -> bool {
    data.starts_with(b"fLaC")
}

/// decodes a complete audio payload
///
/// WAV and FLAC go through the native `hound`/`claxon` readers first; anything
/// they cannot read, and every other container, is handed to `symphonia`
pub fn decode(data: &[u8], extension: &str) -> Result<DecodedAudio, ConvertError> {
    if is_wav(data) {
        match decode_wav(data) {
            Ok(decoded) => return Ok(decoded),
            Err(e) => warn!("Native WAV decoder failed ({}), trying symphonia", e),
        }
    } else if is_flac(data) {
        match decode_flac(data) {
            Ok(decoded) => return Ok(decoded),
            Err(e) => warn!("Native FLAC decoder failed ({}), trying symphonia", e),
        }
    }

    decode_with_symphonia(data, extension)
}

fn decode_wav(data: &[u8]) -> Result<DecodedAudio, ConvertError> {
    let reader = hound::WavReader::new(Cursor::new(data))?;
    let spec = reader.spec();
    debug!("Native WAV decoder: input specifications {:?}", spec);

    let interleaved = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let samples = reader.into_samples::<i32>().collect::<Result<Vec<_>, _>>()?;
            audio_processor::int_to_f32(&samples, spec.bits_per_sample as u32)
        }
    };

    Ok(DecodedAudio {
        channels: audio_processor::deinterleave(&interleaved, spec.channels as usize),
        sample_rate: spec.sample_rate,
    })
}

fn decode_flac(data: &[u8]) -> Result<DecodedAudio, ConvertError> {
    let mut reader = FlacReader::new(Cursor::new(data))
        .map_err(|e| ConvertError::Flac(format!("Failed to create FLAC decoder: {:?}", e)))?;

    let stream_info = reader.streaminfo();
    debug!("Native FLAC decoder: stream info {:?}", stream_info);

    let samples = reader
        .samples()
        .collect::<Result<Vec<i32>, _>>()
        .map_err(|e| ConvertError::Flac(format!("Error decoding FLAC sample: {:?}", e)))?;
    let interleaved = audio_processor::int_to_f32(&samples, stream_info.bits_per_sample);

    Ok(DecodedAudio {
        channels: audio_processor::deinterleave(&interleaved, stream_info.channels as usize),
        sample_rate: stream_info.sample_rate,
    })
}

fn open_format(data: &[u8], extension: &str) -> Result<Box<dyn FormatReader>, ConvertError> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(data.to_vec())), Default::default());

    let mut hint = Hint::new();
    if !extension.is_empty() {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, source, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| ConvertError::AudioDecode(format!("Unrecognized audio container: {}", e)))?;

    Ok(probed.format)
}

fn decode_with_symphonia(data: &[u8], extension: &str) -> Result<DecodedAudio, ConvertError> {
    let mut format = open_format(data, extension)?;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ConvertError::AudioDecode("No decodable audio track".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| ConvertError::AudioDecode(format!("Unsupported audio codec: {}", e)))?;

    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(ConvertError::AudioDecode(format!("Failed to read packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(ConvertError::AudioDecode(format!("Decoder failed: {}", e))),
        };

        let spec = *decoded.spec();
        let channel_count = spec.channels.count();
        sample_rate = spec.rate;
        if channels.is_empty() {
            channels = vec![Vec::new(); channel_count];
        }

        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);

        for frame in buf.samples().chunks_exact(channel_count) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
    }

    if channels.is_empty() || sample_rate == 0 {
        return Err(ConvertError::AudioDecode("Audio stream contained no samples".to_string()));
    }

    info!("Symphonia decoder: {} channel(s) at {} Hz", channels.len(), sample_rate);
    Ok(DecodedAudio { channels, sample_rate })
}

/// duration in seconds from the container's frame count, decoding only when it is absent
pub fn probe_duration(data: &[u8], extension: &str) -> Result<f64, ConvertError> {
    let format = open_format(data, extension)?;

    let header_duration = format
        .default_track()
        .and_then(|track| Some((track.codec_params.n_frames?, track.codec_params.sample_rate?)))
        .filter(|(_, rate)| *rate > 0)
        .map(|(frames, rate)| frames as f64 / rate as f64);

    match header_duration {
        Some(duration) => Ok(duration),
        None => {
            debug!("No frame count in the container header, decoding to measure duration");
            Ok(decode(data, extension)?.duration_secs())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_fixture(spec: hound::WavSpec, frames: usize) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                for c in 0..spec.channels {
                    let value = ((i as f32 * 0.05).sin() * 12000.0) as i16 + c as i16;
                    writer.write_sample(value).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn spec(channels: u16, sample_rate: u32) -> hound::WavSpec {
        hound::WavSpec { channels, sample_rate, bits_per_sample: 16, sample_format: hound::SampleFormat::Int }
    }

    #[test]
    fn test_decode_stereo_wav() {
        let data = wav_fixture(spec(2, 22050), 1000);
        let decoded = decode(&data, "wav").unwrap();

        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.frames(), 1000);
        assert_eq!(decoded.sample_rate, 22050);
        // second channel is offset by one LSB
        let diff = decoded.channels[1][10] - decoded.channels[0][10];
        assert!((diff - 1.0 / 32768.0).abs() < 1e-6);
    }

    #[test]
    fn test_float_wav() {
        let spec = hound::WavSpec { channels: 1, sample_rate: 8000, bits_per_sample: 32, sample_format: hound::SampleFormat::Float };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in [0.25f32, -0.5, 1.0] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }

        let decoded = decode(&cursor.into_inner(), "wav").unwrap();
        assert_eq!(decoded.channels, vec![vec![0.25, -0.5, 1.0]]);
    }

    #[test]
    fn test_probe_duration_from_header() {
        let data = wav_fixture(spec(1, 8000), 8000 * 3);
        let duration = probe_duration(&data, "wav").unwrap();
        assert!((duration - 3.0).abs() < 1e-6, "duration {}", duration);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = decode(b"this is not audio at all, just words", "mp3").unwrap_err();
        assert!(matches!(err, ConvertError::AudioDecode(_)));
    }
}
