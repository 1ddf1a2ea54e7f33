use crate::audio_processor;
use crate::progress::ProgressReporter;

use super::decode::DecodedAudio;

pub const WAV_HEADER_LEN: usize = 44;
const BITS_PER_SAMPLE: u16 = 16;
const PCM_FORMAT_TAG: u16 = 1;

/// serializes decoded audio as canonical 16-bit PCM WAV at the source sample rate
pub fn encode(audio: &DecodedAudio, progress: &ProgressReporter) -> Vec<u8> {
    let channels = audio.channel_count() as u16;
    let block_align = channels * BITS_PER_SAMPLE / 8;
    let byte_rate = audio.sample_rate * block_align as u32;
    progress.report(50.0);

    let samples = audio_processor::f32_to_i16(&audio_processor::interleave(&audio.channels));
    progress.report(70.0);

    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_len as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&audio.sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    progress.report(85.0);

    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }

    out
}
