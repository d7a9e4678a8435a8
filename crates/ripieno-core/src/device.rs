//! Device: one backend connection, one master mixer, one playback thread.
//!
//! The playback thread owns the real-time loop: it sleeps on the event
//! channel between sessions, and inside a session it waits for hardware
//! fragment slots and refills them from the master mixer. Application
//! threads drive it through buffer handles; the backend is started lazily on
//! the first `play` and stopped again once no buffer is left playing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use thread_priority::ThreadPriority;

use crate::backend::{Backend, BackendDevice};
use crate::buffer::BufferRecord;
use crate::config::{DeviceConfig, MAX_CHANNELS};
use crate::convert::SampleFormat;
use crate::graph::MixerGraph;
use crate::handle::{BufferHandle, MixerHandle};
use crate::{Error, Result};

/// Playback thread commands. A bounded channel (not a single-slot mailbox):
/// a `Play` posted just before `Terminate` is delivered, not overwritten.
pub(crate) enum DeviceEvent {
    Play,
    Terminate,
}

const EVENT_CAPACITY: usize = 4;

/// An opened playback device.
///
/// Closing (explicitly or on drop) stops playback, terminates the playback
/// thread, tears down the mixer graph, and releases the backend device.
pub struct Device {
    inner: Arc<DeviceInner>,
}

pub(crate) struct DeviceInner {
    config: DeviceConfig,
    pub(crate) fragment_samples: usize,
    backend: Box<dyn BackendDevice>,
    pub(crate) graph: Mutex<MixerGraph>,
    master: crate::graph::MixerId,
    events: Sender<DeviceEvent>,
    /// Guards the stopped/playing transition (pre-fill + backend start).
    transport: Mutex<()>,
    playing: AtomicBool,
    closed: AtomicBool,
    /// Buffers currently marked playing anywhere in the graph. The backend
    /// only stops once this reaches zero.
    active_buffers: AtomicUsize,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Device {
    pub(crate) fn open(backend: &dyn Backend, config: &DeviceConfig) -> Result<Device> {
        config.validate()?;
        let backend_device = backend.open_device(config)?;
        let fragment_samples = backend_device.fragment_samples();
        let graph = MixerGraph::new(fragment_samples, config.channels, config.sample_rate);
        let master = graph.master();
        let (events, receiver) = bounded(EVENT_CAPACITY);

        let inner = Arc::new(DeviceInner {
            config: config.clone(),
            fragment_samples,
            backend: backend_device,
            graph: Mutex::new(graph),
            master,
            events,
            transport: Mutex::new(()),
            playing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            active_buffers: AtomicUsize::new(0),
            thread: Mutex::new(None),
        });

        // Spawned last so the thread never observes a half-built device.
        let thread_inner = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name("ripieno-device".into())
            .spawn(move || {
                let _ = thread_priority::set_current_thread_priority(ThreadPriority::Max);
                playback_loop(&thread_inner, receiver);
            })
            .map_err(|e| Error::Backend(format!("failed to spawn playback thread: {e}")))?;
        *inner.thread.lock() = Some(handle);

        Ok(Device { inner })
    }

    /// The root mixer every buffer and sub-mixer attaches to by default.
    pub fn master(&self) -> MixerHandle {
        MixerHandle {
            device: Arc::clone(&self.inner),
            id: self.inner.master,
        }
    }

    /// New mixer, attached under the master.
    pub fn create_mixer(&self) -> Result<MixerHandle> {
        self.inner.ensure_open()?;
        let id = self.inner.graph.lock().create_mixer();
        Ok(MixerHandle {
            device: Arc::clone(&self.inner),
            id,
        })
    }

    /// New buffer holding a copy of `data`, attached to the master mixer.
    pub fn create_buffer(
        &self,
        format: SampleFormat,
        channels: u16,
        sample_rate: u32,
        data: &[u8],
    ) -> Result<BufferHandle> {
        self.inner.ensure_open()?;
        if data.is_empty() {
            return Err(Error::InvalidArgument("buffer data must not be empty"));
        }
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(Error::InvalidArgument("buffer channel count out of range"));
        }
        let record = BufferRecord::new(format, channels, sample_rate, data.into());
        self.inner.new_buffer_handle(record)
    }

    /// New silent buffer of `size_in_bytes`, attached to the master mixer.
    pub fn create_buffer_sized(
        &self,
        format: SampleFormat,
        channels: u16,
        sample_rate: u32,
        size_in_bytes: usize,
    ) -> Result<BufferHandle> {
        self.inner.ensure_open()?;
        if size_in_bytes == 0 {
            return Err(Error::InvalidArgument("buffer size must not be zero"));
        }
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(Error::InvalidArgument("buffer channel count out of range"));
        }
        let record = BufferRecord::new(
            format,
            channels,
            sample_rate,
            vec![0u8; size_in_bytes].into_boxed_slice(),
        );
        self.inner.new_buffer_handle(record)
    }

    /// New buffer in the device's own format (f32, device channels, device
    /// rate), so it mixes on the direct path.
    pub fn create_compatible_buffer(&self, samples: &[f32]) -> Result<BufferHandle> {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        self.create_buffer(
            SampleFormat::F32,
            self.inner.config.channels,
            self.inner.config.sample_rate,
            &bytes,
        )
    }

    pub fn channels(&self) -> u16 {
        self.inner.config.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.config.sample_rate
    }

    /// Interleaved samples in one hardware fragment.
    pub fn fragment_samples(&self) -> usize {
        self.inner.fragment_samples
    }

    pub fn is_playing(&self) -> bool {
        self.inner.playing.load(Ordering::Acquire)
    }

    /// Buffers currently marked playing on this device.
    pub fn active_buffers(&self) -> usize {
        self.inner.active_buffers.load(Ordering::Acquire)
    }

    /// Stop playback, terminate the playback thread, and release the
    /// backend. Equivalent to dropping the device.
    pub fn close(self) {
        self.inner.close();
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl DeviceInner {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn new_buffer_handle(self: &Arc<Self>, record: BufferRecord) -> Result<BufferHandle> {
        let state = Arc::clone(&record.state);
        let id = self.graph.lock().add_buffer(record);
        Ok(BufferHandle {
            device: Arc::clone(self),
            id,
            state,
        })
    }

    /// A buffer went from stopped to playing: lazily start the device.
    pub(crate) fn buffer_started(&self) -> Result<()> {
        self.active_buffers.fetch_add(1, Ordering::AcqRel);
        match self.start_playback() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.active_buffers.fetch_sub(1, Ordering::AcqRel);
                Err(e)
            }
        }
    }

    /// A playing buffer stopped or was deleted: stop the backend once the
    /// last one is gone.
    pub(crate) fn buffer_stopped(&self) {
        if self.active_buffers.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.stop_playback();
        }
    }

    fn start_playback(&self) -> Result<()> {
        self.ensure_open()?;
        let _transport = self.transport.lock();
        if self.playing.load(Ordering::Acquire) {
            return Ok(());
        }
        // Pre-fill the first fragment so the hardware never starts on
        // whatever the ring held before.
        self.mix_next_fragment()?;
        self.backend.play()?;
        match self.events.try_send(DeviceEvent::Play) {
            // Full means a play is already queued.
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => return Err(Error::Closed),
        }
        self.playing.store(true, Ordering::Release);
        Ok(())
    }

    fn stop_playback(&self) {
        let _transport = self.transport.lock();
        if self.playing.swap(false, Ordering::AcqRel) {
            if let Err(e) = self.backend.stop() {
                tracing::warn!("backend stop failed: {e}");
            }
        }
    }

    /// Map the next hardware fragment, mix the master subtree into it, and
    /// commit it.
    fn mix_next_fragment(&self) -> Result<()> {
        {
            let mut fragment = self.backend.map_next_fragment()?;
            let mut graph = self.graph.lock();
            let count = fragment.len();
            graph.mix_next_samples(self.master, count)?;
            let staging = graph.staging(self.master)?;
            fragment.copy_from_slice(&staging[..count]);
        }
        self.backend.unmap_next_fragment()
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop_playback();
        let _ = self.events.send(DeviceEvent::Terminate);
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
        if let Err(e) = self.backend.close() {
            tracing::warn!("backend close failed: {e}");
        }
    }
}

/// Runs for the device's entire lifetime: idle on the event channel between
/// sessions, hard real-time inside one.
fn playback_loop(inner: &DeviceInner, events: Receiver<DeviceEvent>) {
    loop {
        match events.recv() {
            Err(_) | Ok(DeviceEvent::Terminate) => break,
            Ok(DeviceEvent::Play) => {
                let _ = inner.backend.play();
                while inner.playing.load(Ordering::Acquire) && inner.backend.wait() {
                    if let Err(e) = inner.mix_next_fragment() {
                        tracing::warn!("fragment mix failed, stopping playback: {e}");
                        let _ = inner.backend.stop();
                        inner.playing.store(false, Ordering::Release);
                        break;
                    }
                }
                // The event may have been consumed after a stop already won
                // the race; make sure the backend did not come back up.
                if !inner.playing.load(Ordering::Acquire) {
                    let _ = inner.backend.stop();
                }
            }
        }
    }
}
