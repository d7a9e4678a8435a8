//! Cheap clonable handles into a device's mixer graph.
//!
//! Handles hold the device and a generational id; structural operations take
//! the graph lock, while buffer playback state is flipped lock-free so
//! play/stop never contend with a mixing pass in progress.

use std::sync::Arc;

use crate::buffer::BufferState;
use crate::device::DeviceInner;
use crate::graph::{BufferId, MixerId};
use crate::{Error, Result};

/// Handle to one mixer node.
#[derive(Clone)]
pub struct MixerHandle {
    pub(crate) device: Arc<DeviceInner>,
    pub(crate) id: MixerId,
}

impl MixerHandle {
    pub fn id(&self) -> MixerId {
        self.id
    }

    pub fn is_master(&self) -> bool {
        self.device.graph.lock().master() == self.id
    }

    /// Attach `child` under this mixer, detaching it from any previous
    /// parent. Cycles and reattaching the master are rejected.
    pub fn attach_mixer(&self, child: &MixerHandle) -> Result<()> {
        self.device.graph.lock().attach_mixer(self.id, child.id)
    }

    pub fn detach_mixer(&self, child: &MixerHandle) -> Result<()> {
        self.device.graph.lock().detach_mixer(self.id, child.id)
    }

    pub fn detach_all_mixers(&self) -> Result<()> {
        self.device.graph.lock().detach_all_mixers(self.id)
    }

    /// Attach `buffer` to this mixer, moving it from wherever it was.
    pub fn attach_buffer(&self, buffer: &BufferHandle) -> Result<()> {
        self.device.graph.lock().attach_buffer(self.id, buffer.id)
    }

    pub fn detach_buffer(&self, buffer: &BufferHandle) -> Result<()> {
        self.device.graph.lock().detach_buffer(self.id, buffer.id)
    }

    pub fn detach_all_buffers(&self) -> Result<()> {
        self.device.graph.lock().detach_all_buffers(self.id)
    }

    /// Number of buffers attached directly to this mixer.
    pub fn buffer_count(&self) -> Result<usize> {
        Ok(self.device.graph.lock().buffers_of(self.id)?.len())
    }

    /// Number of child mixers attached directly to this mixer.
    pub fn mixer_count(&self) -> Result<usize> {
        Ok(self.device.graph.lock().children_of(self.id)?.len())
    }

    /// Whether `buffer` is attached directly to this mixer.
    pub fn contains_buffer(&self, buffer: &BufferHandle) -> Result<bool> {
        Ok(self.device.graph.lock().buffer_mixer(buffer.id)? == Some(self.id))
    }

    /// Mix this subtree into `out` (clamped to one fragment). Returns the
    /// number of samples any source in the subtree actually produced; the
    /// remainder of `out` up to the requested count is zeroed.
    ///
    /// This is the same pass the playback thread runs per hardware fragment;
    /// calling it directly renders offline.
    pub fn mix_next_samples(&self, out: &mut [f32]) -> Result<usize> {
        let mut graph = self.device.graph.lock();
        let count = out.len().min(self.device.fragment_samples);
        let mixed = graph.mix_next_samples(self.id, count)?;
        out[..count].copy_from_slice(&graph.staging(self.id)?[..count]);
        Ok(mixed)
    }

    /// Detach all children and buffers, detach from the parent, and free
    /// this mixer. Orphans survive unattached; reattaching them is the
    /// caller's business.
    pub fn delete(self) -> Result<()> {
        self.device.graph.lock().delete_mixer(self.id)
    }
}

/// Handle to one sample buffer.
#[derive(Clone)]
pub struct BufferHandle {
    pub(crate) device: Arc<DeviceInner>,
    pub(crate) id: BufferId,
    pub(crate) state: Arc<BufferState>,
}

impl BufferHandle {
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Start (or keep) playing. Lazily starts the device's backend and
    /// playback thread on the first playing buffer.
    pub fn play(&self, looping: bool) -> Result<()> {
        if !self.device.graph.lock().buffer_exists(self.id) {
            return Err(Error::StaleHandle("buffer"));
        }
        self.state.looping.set(looping);
        if !self.state.playing.swap(true) {
            if let Err(e) = self.device.buffer_started() {
                self.state.playing.set(false);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Stop playing. The device's backend keeps running until the last
    /// playing buffer stops.
    pub fn stop(&self) {
        if self.state.playing.swap(false) {
            self.device.buffer_stopped();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing.get()
    }

    pub fn is_looping(&self) -> bool {
        self.state.looping.get()
    }

    /// Change the loop flag without touching playback.
    pub fn set_looping(&self, looping: bool) {
        self.state.looping.set(looping);
    }

    /// Linear gain applied while mixing (default 1.0).
    pub fn set_gain(&self, gain: f32) {
        self.state.gain.set(gain);
    }

    pub fn gain(&self) -> f32 {
        self.state.gain.get()
    }

    /// Current read cursor, in samples.
    pub fn position(&self) -> u64 {
        self.state.position.load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn format(&self) -> Result<crate::SampleFormat> {
        Ok(self.device.graph.lock().buffer(self.id)?.format)
    }

    pub fn channels(&self) -> Result<u16> {
        Ok(self.device.graph.lock().buffer(self.id)?.channels)
    }

    pub fn sample_rate(&self) -> Result<u32> {
        Ok(self.device.graph.lock().buffer(self.id)?.sample_rate)
    }

    /// Length of the buffer, in samples.
    pub fn total_samples(&self) -> Result<usize> {
        Ok(self.device.graph.lock().buffer(self.id)?.total_samples())
    }

    /// Read up to `out.len()` device-formatted samples from the cursor,
    /// advancing it. This is the same primitive the mixing pass uses;
    /// a short count is the end-of-stream signal, and a buffer at a foreign
    /// sample rate is an [`Error::Unsupported`](crate::Error::Unsupported).
    pub fn read_samples(&self, out: &mut [f32]) -> Result<usize> {
        let graph = self.device.graph.lock();
        let record = graph.buffer(self.id)?;
        record.read_samples(out, graph.device_channels(), graph.device_rate())
    }

    /// Move the read cursor, clamped to the end of the buffer.
    pub fn seek(&self, sample: u64) -> Result<()> {
        let total = self.device.graph.lock().buffer(self.id)?.total_samples() as u64;
        self.state
            .position
            .store(sample.min(total), std::sync::atomic::Ordering::Release);
        Ok(())
    }

    /// Detach from the current mixer, leaving the buffer alive and
    /// unattached.
    pub fn detach(&self) -> Result<()> {
        let mut graph = self.device.graph.lock();
        match graph.buffer_mixer(self.id)? {
            Some(mixer) => graph.detach_buffer(mixer, self.id),
            None => Ok(()),
        }
    }

    /// Detach and free the buffer. A playing buffer counts as stopped from
    /// here on.
    pub fn delete(self) -> Result<()> {
        let was_playing = self.state.playing.swap(false);
        let result = self.device.graph.lock().delete_buffer(self.id).map(|_| ());
        if was_playing {
            self.device.buffer_stopped();
        }
        result
    }
}
