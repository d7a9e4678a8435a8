//! # Ripieno - Real-time Audio Mixing and Playback
//!
//! Hierarchical mixers blend independently-playing sample buffers into
//! hardware fragments on a dedicated playback thread, with format and
//! channel-count conversion on the way in.
//!
//! ## Architecture
//!
//! Ripieno is an umbrella crate over:
//! - **ripieno-core** - Mixer graph, sample buffers, device playback thread,
//!   and the swappable hardware backend contract
//!
//! ## Quick Start
//!
//! ```no_run
//! use ripieno::prelude::*;
//!
//! # fn main() -> ripieno::Result<()> {
//! let engine = RipienoEngine::builder()
//!     .channels(2)
//!     .sample_rate(48_000)
//!     .build()?;
//!
//! let loop_buffer = engine.create_compatible_buffer(&vec![0.25; 9600])?;
//! loop_buffer.play(true)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Engine over the silent null backend
//! - `cpal` - Real hardware output (ALSA/WASAPI/CoreAudio)

/// Re-export of ripieno-core for direct access
pub use ripieno_core as core;

pub use ripieno_core::{
    Backend,
    BackendDevice,
    BufferHandle,
    BufferId,
    Context,
    Device,
    DeviceConfig,
    MappedFragment,
    MixerHandle,
    MixerId,
    NullBackend,
    SampleFormat,
};

#[cfg(feature = "cpal")]
pub use ripieno_core::CpalBackend;

/// The sample format conversion library.
pub use ripieno_core::convert;

mod builder;
mod engine;
mod error;

pub use builder::RipienoEngineBuilder;
pub use engine::RipienoEngine;
pub use error::{Error, Result};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{RipienoEngine, RipienoEngineBuilder};

    pub use crate::{BufferHandle, DeviceConfig, MixerHandle, SampleFormat};
}
