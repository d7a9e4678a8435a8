//! Hardware backend contract.
//!
//! The engine consumes a deliberately narrow, fragment-oriented contract from
//! whatever produces actual sound: a device exposes fixed-size fragments of
//! its ring buffer one at a time, and `wait` paces the mixing thread against
//! hardware consumption. Backends are selected at runtime via [`Backend`]
//! trait objects rather than compile-time configuration.

use parking_lot::MappedMutexGuard;

use crate::config::DeviceConfig;
use crate::Result;

mod null;
pub use null::NullBackend;

#[cfg(feature = "cpal")]
mod output;
#[cfg(feature = "cpal")]
pub use output::CpalBackend;

/// Writable view of the next hardware fragment, held while filling it.
///
/// Dropping the guard releases the mapping; commit it with
/// [`BackendDevice::unmap_next_fragment`].
pub type MappedFragment<'a> = MappedMutexGuard<'a, [f32]>;

/// A source of playback devices (one per audio API).
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open a device for the given configuration. Fragment geometry is fixed
    /// for the lifetime of the returned device.
    fn open_device(&self, config: &DeviceConfig) -> Result<Box<dyn BackendDevice>>;
}

/// One opened playback device.
///
/// Implementations carry their own interior locking: `stop` may be called
/// from a different thread than a blocked `wait` and must unblock it.
pub trait BackendDevice: Send + Sync {
    /// Interleaved samples in one fragment.
    fn fragment_samples(&self) -> usize;

    /// Begin hardware playback of the ring buffer. Non-blocking.
    fn play(&self) -> Result<()>;

    /// Halt hardware playback and reset the play cursor.
    fn stop(&self) -> Result<()>;

    /// Block until the next fragment slot is writable or the device is
    /// stopped. Returns false on stop or backend error.
    fn wait(&self) -> bool;

    /// Map the next fragment-sized region of the ring buffer for writing.
    fn map_next_fragment(&self) -> Result<MappedFragment<'_>>;

    /// Commit the previously mapped fragment to the hardware.
    fn unmap_next_fragment(&self) -> Result<()>;

    /// Release the device. Idempotent.
    fn close(&self) -> Result<()>;
}
