//! Sample format conversion and channel shuffling.
//!
//! Everything here is a pure, stateless per-sample mapping into the engine's
//! canonical 32-bit float working format. No dithering, no noise shaping.
//! Channel adaptation ("shuffling") follows a fixed deterministic policy so
//! mixes are bit-reproducible across runs.

use crate::config::MAX_CHANNELS;

/// On-disk PCM sample formats accepted by buffers.
///
/// Multi-byte formats are little-endian. `S24` is the packed 3-byte layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    U8,
    S16,
    S24,
    S32,
    F32,
}

impl SampleFormat {
    /// Storage bytes per sample.
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S24 => 3,
            SampleFormat::S32 | SampleFormat::F32 => 4,
        }
    }
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S16 => "s16",
            SampleFormat::S24 => "s24",
            SampleFormat::S32 => "s32",
            SampleFormat::F32 => "f32",
        };
        f.write_str(name)
    }
}

/// Unsigned 8-bit to float: 0 maps to -1.0, 255 to just under +1.0.
pub fn convert_u8_to_f32(out: &mut [f32], input: &[u8]) {
    for (dst, &src) in out.iter_mut().zip(input) {
        *dst = (src as f32 / 127.5) - 1.0;
    }
}

/// Signed 16-bit little-endian to float: -32768 maps to -1.0.
pub fn convert_s16_to_f32(out: &mut [f32], input: &[u8]) {
    for (dst, src) in out.iter_mut().zip(input.chunks_exact(2)) {
        let v = i16::from_le_bytes([src[0], src[1]]);
        *dst = v as f32 / 32768.0;
    }
}

/// Packed 3-byte little-endian signed 24-bit to float.
///
/// The 24-bit value is placed in the top three bytes of an i32 so its
/// extremes land on the same ±1.0 scale as 32-bit samples.
pub fn convert_s24_to_f32(out: &mut [f32], input: &[u8]) {
    for (dst, src) in out.iter_mut().zip(input.chunks_exact(3)) {
        let v = i32::from_le_bytes([0, src[0], src[1], src[2]]);
        *dst = v as f32 / 2_147_483_648.0;
    }
}

/// Signed 32-bit little-endian to float: i32::MIN maps to -1.0.
pub fn convert_s32_to_f32(out: &mut [f32], input: &[u8]) {
    for (dst, src) in out.iter_mut().zip(input.chunks_exact(4)) {
        let v = i32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        *dst = v as f32 / 2_147_483_648.0;
    }
}

/// Float to float: identity bit copy from little-endian storage.
pub fn convert_f32_to_f32(out: &mut [f32], input: &[u8]) {
    for (dst, src) in out.iter_mut().zip(input.chunks_exact(4)) {
        *dst = f32::from_le_bytes([src[0], src[1], src[2], src[3]]);
    }
}

/// Convert `out.len()` samples of `format` starting at the beginning of `input`.
pub fn convert_to_f32(format: SampleFormat, out: &mut [f32], input: &[u8]) {
    match format {
        SampleFormat::U8 => convert_u8_to_f32(out, input),
        SampleFormat::S16 => convert_s16_to_f32(out, input),
        SampleFormat::S24 => convert_s24_to_f32(out, input),
        SampleFormat::S32 => convert_s32_to_f32(out, input),
        SampleFormat::F32 => convert_f32_to_f32(out, input),
    }
}

/// Copy up to `out.len()` converted samples out of `data`, starting at sample
/// index `offset` and wrapping to the start when `looping`.
///
/// Returns the number of samples produced. A short count is the only
/// end-of-stream signal a non-looping source gives.
pub fn copy_with_looping(
    out: &mut [f32],
    format: SampleFormat,
    data: &[u8],
    offset: usize,
    looping: bool,
) -> usize {
    let bytes = format.bytes_per_sample();
    let total = data.len() / bytes;
    if total == 0 {
        return 0;
    }

    let mut pos = if looping { offset % total } else { offset.min(total) };
    let mut produced = 0;
    while produced < out.len() {
        let available = total - pos;
        if available == 0 {
            if !looping {
                break;
            }
            pos = 0;
            continue;
        }
        let run = available.min(out.len() - produced);
        convert_to_f32(
            format,
            &mut out[produced..produced + run],
            &data[pos * bytes..(pos + run) * bytes],
        );
        produced += run;
        pos += run;
    }
    produced
}

/// Remap one frame of samples between channel counts.
///
/// Policy, in priority order:
/// - mono input is broadcast to every output channel;
/// - mono output is the arithmetic mean of all input channels;
/// - more outputs than inputs: copy, zero-fill the remainder;
/// - fewer outputs than inputs: copy the first outputs, drop the rest.
pub fn shuffle_channels(out: &mut [f32], input: &[f32]) {
    let channels_in = input.len();
    let channels_out = out.len();

    if channels_in == 1 {
        out.fill(input[0]);
    } else if channels_out == 1 {
        out[0] = input.iter().sum::<f32>() / channels_in as f32;
    } else if channels_out > channels_in {
        out[..channels_in].copy_from_slice(input);
        out[channels_in..].fill(0.0);
    } else {
        out.copy_from_slice(&input[..channels_out]);
    }
}

/// Frame-wise composition of [`copy_with_looping`] and [`shuffle_channels`]:
/// converts whole input frames starting at `frame_offset`, shuffles each into
/// `channels_out`-wide output frames, and wraps when `looping`.
///
/// Returns the number of frames produced; `frames * channels_out` samples of
/// `out` are written.
#[allow(clippy::too_many_arguments)]
pub fn copy_with_looping_and_shuffle(
    out: &mut [f32],
    format: SampleFormat,
    data: &[u8],
    channels_in: usize,
    channels_out: usize,
    frame_offset: usize,
    looping: bool,
) -> usize {
    debug_assert!(channels_in <= MAX_CHANNELS as usize);
    let bytes = format.bytes_per_sample();
    let frame_bytes = channels_in * bytes;
    let total_frames = data.len() / frame_bytes;
    if total_frames == 0 || channels_out == 0 {
        return 0;
    }

    let frames_requested = out.len() / channels_out;
    let mut frame = if looping {
        frame_offset % total_frames
    } else {
        frame_offset.min(total_frames)
    };
    let mut in_frame = [0.0f32; MAX_CHANNELS as usize];

    let mut produced = 0;
    while produced < frames_requested {
        if frame == total_frames {
            if !looping {
                break;
            }
            frame = 0;
        }
        convert_to_f32(
            format,
            &mut in_frame[..channels_in],
            &data[frame * frame_bytes..(frame + 1) * frame_bytes],
        );
        let out_frame = &mut out[produced * channels_out..(produced + 1) * channels_out];
        shuffle_channels(out_frame, &in_frame[..channels_in]);
        produced += 1;
        frame += 1;
    }
    produced
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_u8_extremes() {
        let mut out = [0.0f32; 3];
        convert_u8_to_f32(&mut out, &[0, 128, 255]);
        assert_eq!(out[0], -1.0);
        assert_relative_eq!(out[1], 0.0039216, epsilon = 1e-6);
        assert_relative_eq!(out[2], 1.0, epsilon = 0.01);
        assert!(out.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_s16_extremes() {
        let mut out = [0.0f32; 2];
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&i16::MIN.to_le_bytes());
        bytes.extend_from_slice(&i16::MAX.to_le_bytes());
        convert_s16_to_f32(&mut out, &bytes);
        assert_eq!(out[0], -1.0);
        assert_relative_eq!(out[1], 0.99997, epsilon = 1e-5);
    }

    #[test]
    fn test_s24_extremes() {
        let mut out = [0.0f32; 3];
        // min (0x800000), zero, max (0x7FFFFF) in packed LE
        let bytes = [0x00, 0x00, 0x80, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0x7F];
        convert_s24_to_f32(&mut out, &bytes);
        assert_eq!(out[0], -1.0);
        assert_eq!(out[1], 0.0);
        assert_relative_eq!(out[2], 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_s32_extremes() {
        let mut out = [0.0f32; 2];
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&i32::MIN.to_le_bytes());
        bytes.extend_from_slice(&i32::MAX.to_le_bytes());
        convert_s32_to_f32(&mut out, &bytes);
        assert_eq!(out[0], -1.0);
        assert_relative_eq!(out[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_f32_identity() {
        let samples = [0.25f32, -0.75, 1.0];
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut out = [0.0f32; 3];
        convert_f32_to_f32(&mut out, &bytes);
        assert_eq!(out, samples);
    }

    fn s16_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_looping_copy_is_cyclic() {
        // 4-sample source, read 11 samples: must repeat every 4.
        let data = s16_bytes(&[1000, 2000, 3000, 4000]);
        let mut out = [0.0f32; 11];
        let produced = copy_with_looping(&mut out, SampleFormat::S16, &data, 0, true);
        assert_eq!(produced, 11);
        for i in 0..11 {
            assert_eq!(out[i], out[i % 4]);
        }
    }

    #[test]
    fn test_looping_copy_from_offset() {
        let data = s16_bytes(&[10, 20, 30, 40]);
        let mut out = [0.0f32; 4];
        copy_with_looping(&mut out, SampleFormat::S16, &data, 2, true);
        // starts at sample 2 and wraps
        assert_eq!(out[0], 30.0 / 32768.0);
        assert_eq!(out[1], 40.0 / 32768.0);
        assert_eq!(out[2], 10.0 / 32768.0);
        assert_eq!(out[3], 20.0 / 32768.0);
    }

    #[test]
    fn test_non_looping_copy_stops_short() {
        let data = s16_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut out = [9.0f32; 8];
        let produced = copy_with_looping(&mut out, SampleFormat::S16, &data, 5, false);
        assert_eq!(produced, 3);
        // untouched past the produced count
        assert_eq!(out[3], 9.0);
    }

    #[test]
    fn test_non_looping_copy_past_end() {
        let data = s16_bytes(&[1, 2]);
        let mut out = [0.0f32; 4];
        assert_eq!(
            copy_with_looping(&mut out, SampleFormat::S16, &data, 7, false),
            0
        );
    }

    #[test]
    fn test_shuffle_mono_broadcast() {
        let mut out = [0.0f32; 6];
        shuffle_channels(&mut out, &[0.5]);
        assert_eq!(out, [0.5; 6]);
    }

    #[test]
    fn test_shuffle_downmix_to_mono_is_mean() {
        let mut out = [0.0f32; 1];
        shuffle_channels(&mut out, &[0.2, 0.6]);
        assert_relative_eq!(out[0], 0.4, epsilon = 1e-7);
    }

    #[test]
    fn test_shuffle_upmix_zero_fills() {
        let mut out = [9.0f32; 4];
        shuffle_channels(&mut out, &[0.1, 0.2]);
        assert_eq!(out, [0.1, 0.2, 0.0, 0.0]);
    }

    #[test]
    fn test_shuffle_downmix_truncates() {
        let mut out = [0.0f32; 2];
        shuffle_channels(&mut out, &[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(out, [0.1, 0.2]);
    }

    #[test]
    fn test_looping_shuffle_mono_to_stereo() {
        let samples = [0.25f32, -0.5];
        let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut out = [0.0f32; 6];
        let frames = copy_with_looping_and_shuffle(
            &mut out,
            SampleFormat::F32,
            &data,
            1,
            2,
            0,
            true,
        );
        assert_eq!(frames, 3);
        assert_eq!(out, [0.25, 0.25, -0.5, -0.5, 0.25, 0.25]);
    }

    #[test]
    fn test_non_looping_shuffle_stops_at_end() {
        let samples = [0.1f32, 0.2, 0.3, 0.4]; // 2 stereo frames
        let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut out = [7.0f32; 4];
        let frames = copy_with_looping_and_shuffle(
            &mut out,
            SampleFormat::F32,
            &data,
            2,
            1,
            1,
            false,
        );
        assert_eq!(frames, 1);
        assert_relative_eq!(out[0], 0.35, epsilon = 1e-7);
        assert_eq!(out[1], 7.0);
    }
}
