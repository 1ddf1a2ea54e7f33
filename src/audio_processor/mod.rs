use log::debug;
use rayon::prelude::*;

/// converts integer PCM samples of the given bit depth to f32 in [-1, 1)
pub fn int_to_f32(samples: &[i32], bits_per_sample: u32) -> Vec<f32> {
    let scale = (1u64 << bits_per_sample.clamp(1, 32).saturating_sub(1)) as f32;
    samples
        .par_iter()
        .map(|&s| s as f32 / scale)
        .collect()
}

/// converts a single f32 sample to i16
/// clamps to [-1, 1] first; negative values scale by 0x8000 and positive ones by 0x7FFF
pub fn sample_to_i16(s: f32) -> i16 {
    let s = if s.is_nan() { 0.0 } else { s.clamp(-1.0, 1.0) };
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// converts a slice of f32 samples to i16 samples
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples.par_iter().map(|&s| sample_to_i16(s)).collect()
}

/// interleaves per-channel buffers frame by frame; shorter channels are padded with silence
pub fn interleave(channels: &[Vec<f32>]) -> Vec<f32> {
    let channel_count = channels.len();
    let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
    if channel_count == 0 {
        return Vec::new();
    }

    (0..frames * channel_count)
        .into_par_iter()
        .map(|i| {
            let (frame, channel) = (i / channel_count, i % channel_count);
            channels[channel].get(frame).copied().unwrap_or(0.0)
        })
        .collect()
}

/// splits interleaved samples into per-channel buffers; a trailing partial frame is dropped
pub fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    if channels == 0 {
        return Vec::new();
    }

    let frames = samples.len() / channels;
    let mut out: Vec<Vec<f32>> = (0..channels).map(|_| Vec::with_capacity(frames)).collect();
    for frame in samples.chunks_exact(channels) {
        for (channel, &sample) in out.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
    out
}

/// a simplified channel mixer over interleaved samples
/// if `target_channels` is 1, all channels are averaged into mono
/// if the input has fewer channels than the target, input channels are repeated cyclically
/// if the input has more channels than the target, input channel `i` is averaged into output `i % target`
pub fn mix_channels(
    input_samples: &[f32],
    input_channels: u8,
    target_channels: u8,
) -> Vec<f32> {
    if input_channels == target_channels {
        return input_samples.to_vec();
    }

    if input_samples.is_empty() || input_channels == 0 || target_channels == 0 {
        return Vec::new();
    }

    let n_in = input_channels as usize;
    let n_out = target_channels as usize;
    debug!("Channel mix: {} -> {} channels", n_in, n_out);

    // parallelizing processing of individual frames
    input_samples
        .par_chunks_exact(n_in)
        .flat_map_iter(|input_frame| {
            let mut output_frame = vec![0.0f32; n_out];

            if n_in < n_out {
                for (c_out, sample) in output_frame.iter_mut().enumerate() {
                    *sample = input_frame[c_out % n_in];
                }
            } else {
                for (c_out, sample) in output_frame.iter_mut().enumerate() {
                    let group: Vec<f32> = input_frame.iter().skip(c_out).step_by(n_out).copied().collect();
                    *sample = group.iter().sum::<f32>() / group.len() as f32;
                }
            }

            output_frame
        })
        .collect()
}
