//! Process-wide engine context: owns the selected hardware backend and
//! opens playback devices against it.

use crate::backend::{Backend, NullBackend};
use crate::config::DeviceConfig;
use crate::device::Device;
use crate::Result;

#[cfg(feature = "cpal")]
use crate::backend::CpalBackend;

/// Root of the object graph. Devices opened from a context must be closed
/// before the context is dropped; this is the caller's responsibility.
pub struct Context {
    backend: Box<dyn Backend>,
}

impl Context {
    /// Context over the default backend: cpal when compiled in, otherwise
    /// the silent null backend.
    pub fn new() -> Self {
        #[cfg(feature = "cpal")]
        {
            Self::with_backend(Box::new(CpalBackend::new()))
        }
        #[cfg(not(feature = "cpal"))]
        {
            Self::with_backend(Box::new(NullBackend))
        }
    }

    /// Context over an explicitly selected backend.
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Context over the silent null backend, regardless of features.
    pub fn null() -> Self {
        Self::with_backend(Box::new(NullBackend))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn open_device(&self, config: &DeviceConfig) -> Result<Device> {
        Device::open(self.backend.as_ref(), config)
    }

    pub fn open_default_device(&self) -> Result<Device> {
        self.open_device(&DeviceConfig::default())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
