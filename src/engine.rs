//! RipienoEngine: the context + device pair behind a single facade.

use ripieno_core::{BufferHandle, Context, Device, MixerHandle, SampleFormat};

use crate::Result;

/// Main engine handle: one context, one open playback device.
///
/// All mixing semantics live in `ripieno-core`; the engine only bundles
/// construction and forwards to the device.
///
/// # Example
///
/// ```no_run
/// use ripieno::prelude::*;
///
/// # fn main() -> ripieno::Result<()> {
/// let engine = RipienoEngine::builder().sample_rate(48_000).build()?;
///
/// let drums = engine.create_mixer()?;
/// let kick = engine.create_compatible_buffer(&vec![0.5; 4800])?;
/// drums.attach_buffer(&kick)?;
///
/// kick.play(true)?;
/// # Ok(())
/// # }
/// ```
pub struct RipienoEngine {
    context: Context,
    device: Device,
}

impl RipienoEngine {
    /// Create a new engine builder.
    pub fn builder() -> crate::RipienoEngineBuilder {
        crate::RipienoEngineBuilder::default()
    }

    /// The device's master mixer.
    pub fn master(&self) -> MixerHandle {
        self.device.master()
    }

    /// New mixer attached under the master.
    pub fn create_mixer(&self) -> Result<MixerHandle> {
        Ok(self.device.create_mixer()?)
    }

    /// New buffer from raw PCM bytes, attached to the master mixer.
    pub fn create_buffer(
        &self,
        format: SampleFormat,
        channels: u16,
        sample_rate: u32,
        data: &[u8],
    ) -> Result<BufferHandle> {
        Ok(self
            .device
            .create_buffer(format, channels, sample_rate, data)?)
    }

    /// New buffer already in the device's format (f32, device channels,
    /// device rate).
    pub fn create_compatible_buffer(&self, samples: &[f32]) -> Result<BufferHandle> {
        Ok(self.device.create_compatible_buffer(samples)?)
    }

    pub fn channels(&self) -> u16 {
        self.device.channels()
    }

    pub fn sample_rate(&self) -> u32 {
        self.device.sample_rate()
    }

    /// Interleaved samples in one hardware fragment.
    pub fn fragment_samples(&self) -> usize {
        self.device.fragment_samples()
    }

    pub fn is_playing(&self) -> bool {
        self.device.is_playing()
    }

    pub fn backend_name(&self) -> &'static str {
        self.context.backend_name()
    }

    /// Direct access to the underlying device.
    pub fn device(&self) -> &Device {
        &self.device
    }

    pub(crate) fn from_parts(context: Context, device: Device) -> Self {
        Self { context, device }
    }
}
