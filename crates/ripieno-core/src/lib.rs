//! Real-time audio mixing and playback engine core.
//!
//! A hierarchical mixer graph blends independently-playing sample buffers
//! into hardware-sized fragments on a dedicated playback thread, converting
//! formats and channel counts on the way.
//!
//! # Primary API
//!
//! - [`Context`]: owns the selected [`Backend`], opens [`Device`]s
//! - [`Device`]: one backend connection, one master mixer, one playback thread
//! - [`MixerHandle`] / [`BufferHandle`]: graph manipulation and playback
//! - [`convert`]: the sample format conversion library
//!
//! # Example
//!
//! ```no_run
//! use ripieno_core::{Context, DeviceConfig};
//!
//! # fn main() -> ripieno_core::Result<()> {
//! let context = Context::new();
//! let device = context.open_device(&DeviceConfig::default())?;
//!
//! let tone = device.create_compatible_buffer(&vec![0.25; 4410])?;
//! tone.play(true)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

mod config;
pub use config::{DeviceConfig, MAX_CHANNELS};

pub mod convert;
pub use convert::SampleFormat;

pub mod backend;
pub use backend::{Backend, BackendDevice, MappedFragment, NullBackend};

#[cfg(feature = "cpal")]
pub use backend::CpalBackend;

mod buffer;

mod graph;
pub use graph::{BufferId, MixerId};

mod device;
pub use device::Device;

mod handle;
pub use handle::{BufferHandle, MixerHandle};

mod context;
pub use context::Context;

pub(crate) mod lockfree;
pub use lockfree::{AtomicFlag, AtomicFloat};
