//! Builder for configuring and constructing a `RipienoEngine`.

use ripieno_core::{Backend, Context, DeviceConfig};

use crate::{Result, RipienoEngine};

/// Device parameters default to stereo 44.1 kHz with 50 ms fragments; the
/// backend defaults to real hardware when the `cpal` feature is compiled in
/// and to the silent null backend otherwise.
///
/// # Example
///
/// ```no_run
/// use ripieno::prelude::*;
///
/// # fn main() -> ripieno::Result<()> {
/// let engine = RipienoEngine::builder()
///     .channels(2)
///     .sample_rate(48_000)
///     .latency_ms(50)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RipienoEngineBuilder {
    config: DeviceConfig,
    backend: Option<Box<dyn Backend>>,
    null_backend: bool,
}

impl Default for RipienoEngineBuilder {
    fn default() -> Self {
        Self {
            config: DeviceConfig::default(),
            backend: None,
            null_backend: false,
        }
    }
}

impl RipienoEngineBuilder {
    /// Default: 2
    pub fn channels(mut self, channels: u16) -> Self {
        self.config.channels = channels;
        self
    }

    /// Default: 44100
    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Fragment duration in milliseconds. Default: 50
    pub fn latency_ms(mut self, latency_ms: u32) -> Self {
        self.config.latency_ms = latency_ms;
        self
    }

    /// Hardware ring fragments. Default: 2
    pub fn fragment_count(mut self, fragment_count: u32) -> Self {
        self.config.fragment_count = fragment_count;
        self
    }

    /// Use a custom backend implementation.
    pub fn backend(mut self, backend: Box<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self.null_backend = false;
        self
    }

    /// Use the silent null backend (headless, CI, tests).
    pub fn null_backend(mut self) -> Self {
        self.backend = None;
        self.null_backend = true;
        self
    }

    pub fn build(self) -> Result<RipienoEngine> {
        let context = match (self.backend, self.null_backend) {
            (Some(backend), _) => Context::with_backend(backend),
            (None, true) => Context::null(),
            (None, false) => Context::new(),
        };
        let device = context.open_device(&self.config)?;
        Ok(RipienoEngine::from_parts(context, device))
    }
}
