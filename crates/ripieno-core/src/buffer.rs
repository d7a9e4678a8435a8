//! Sample buffers: the leaf sources of the mixer tree.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::convert::{self, SampleFormat};
use crate::graph::{BufferId, MixerId};
use crate::lockfree::{AtomicFlag, AtomicFloat};
use crate::{Error, Result};

/// Lock-free playback state, shared between buffer handles and the mixing
/// pass so play/stop/seek never contend with the graph lock.
#[derive(Debug)]
pub(crate) struct BufferState {
    pub(crate) playing: AtomicFlag,
    pub(crate) looping: AtomicFlag,
    pub(crate) gain: AtomicFloat,
    /// Read cursor in samples, wrapping modulo buffer length while looping.
    pub(crate) position: AtomicU64,
}

impl BufferState {
    fn new() -> Self {
        Self {
            playing: AtomicFlag::new(false),
            looping: AtomicFlag::new(false),
            gain: AtomicFloat::new(1.0),
            position: AtomicU64::new(0),
        }
    }
}

/// One buffer record in the device's graph arena.
pub(crate) struct BufferRecord {
    pub(crate) format: SampleFormat,
    pub(crate) channels: u16,
    pub(crate) sample_rate: u32,
    pub(crate) data: Box<[u8]>,
    pub(crate) state: Arc<BufferState>,

    // Attachment links, maintained by the graph.
    pub(crate) mixer: Option<MixerId>,
    pub(crate) prev: Option<BufferId>,
    pub(crate) next: Option<BufferId>,

    /// One warning per buffer when the unsupported-rate path is hit.
    pub(crate) rate_warned: AtomicBool,
}

impl BufferRecord {
    pub(crate) fn new(
        format: SampleFormat,
        channels: u16,
        sample_rate: u32,
        data: Box<[u8]>,
    ) -> Self {
        Self {
            format,
            channels,
            sample_rate,
            data,
            state: Arc::new(BufferState::new()),
            mixer: None,
            prev: None,
            next: None,
            rate_warned: AtomicBool::new(false),
        }
    }

    pub(crate) fn total_samples(&self) -> usize {
        self.data.len() / self.format.bytes_per_sample()
    }

    pub(crate) fn total_frames(&self) -> usize {
        self.total_samples() / self.channels as usize
    }

    /// Read up to `out.len()` samples of device-formatted audio, advancing
    /// the cursor. Four paths:
    ///
    /// (a) matching rate and channels: converting copy with looping;
    /// (b) matching rate, differing channels: converting copy + channel
    ///     shuffle (returns frames x device channels);
    /// (c)/(d) differing sample rate: rejected with an explicit error;
    ///     resampling between a buffer and its device is not implemented,
    ///     and silently producing zeros would hide that.
    ///
    /// The short-read return value is the only end-of-stream signal.
    pub(crate) fn read_samples(
        &self,
        out: &mut [f32],
        device_channels: u16,
        device_rate: u32,
    ) -> Result<usize> {
        if self.sample_rate != device_rate {
            return Err(Error::Unsupported(
                "sample-rate conversion between buffer and device",
            ));
        }
        if out.is_empty() {
            return Ok(0);
        }
        let looping = self.state.looping.get();
        let position = self.state.position.load(Ordering::Acquire) as usize;

        if self.channels == device_channels {
            let total = self.total_samples();
            if total == 0 {
                return Ok(0);
            }
            let produced =
                convert::copy_with_looping(out, self.format, &self.data, position, looping);
            let new_position = if looping {
                (position + produced) % total
            } else {
                (position + produced).min(total)
            };
            self.state
                .position
                .store(new_position as u64, Ordering::Release);
            Ok(produced)
        } else {
            let total_frames = self.total_frames();
            if total_frames == 0 {
                return Ok(0);
            }
            let frame_position = position / self.channels as usize;
            let frames = convert::copy_with_looping_and_shuffle(
                out,
                self.format,
                &self.data,
                self.channels as usize,
                device_channels as usize,
                frame_position,
                looping,
            );
            let new_frame = if looping {
                (frame_position + frames) % total_frames
            } else {
                (frame_position + frames).min(total_frames)
            };
            self.state
                .position
                .store((new_frame * self.channels as usize) as u64, Ordering::Release);
            Ok(frames * device_channels as usize)
        }
    }
}
