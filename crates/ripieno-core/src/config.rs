//! Device configuration.

use std::time::Duration;

use crate::{Error, Result};

/// Upper bound on buffer and device channel counts.
pub const MAX_CHANNELS: u16 = 32;

/// Parameters for opening a playback device.
///
/// `latency_ms` is the duration of one hardware fragment; the mixing thread
/// must refill a fragment within that budget or playback glitches.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub channels: u16,
    pub sample_rate: u32,
    pub latency_ms: u32,
    pub fragment_count: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            channels: 2,
            sample_rate: 44100,
            latency_ms: 50,
            fragment_count: 2,
        }
    }
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(Error::InvalidConfig(format!(
                "channels {} out of range (1-{MAX_CHANNELS})",
                self.channels
            )));
        }
        if self.sample_rate < 8000 || self.sample_rate > 384_000 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.latency_ms == 0 || self.latency_ms > 1000 {
            return Err(Error::InvalidConfig(format!(
                "latency_ms {} out of range (1-1000)",
                self.latency_ms
            )));
        }
        if self.fragment_count < 2 || self.fragment_count > 8 {
            return Err(Error::InvalidConfig(format!(
                "fragment_count {} out of range (2-8)",
                self.fragment_count
            )));
        }
        if self.fragment_samples() == 0 {
            return Err(Error::InvalidConfig(
                "latency too short for one fragment at this sample rate".into(),
            ));
        }
        Ok(())
    }

    /// Interleaved samples in one hardware fragment.
    pub fn fragment_samples(&self) -> usize {
        (self.sample_rate as usize * self.latency_ms as usize / 1000) * self.channels as usize
    }

    /// Wall-clock duration of one fragment.
    pub fn fragment_duration(&self) -> Duration {
        Duration::from_millis(self.latency_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DeviceConfig::default();
        assert_eq!(config.channels, 2);
        assert_eq!(config.sample_rate, 44100);
        assert!(config.validate().is_ok());
        // 50 ms of stereo 44.1 kHz
        assert_eq!(config.fragment_samples(), 2205 * 2);
    }

    #[test]
    fn test_rejects_out_of_range() {
        let mut config = DeviceConfig::default();
        config.channels = 0;
        assert!(config.validate().is_err());

        let mut config = DeviceConfig::default();
        config.sample_rate = 1000;
        assert!(config.validate().is_err());

        let mut config = DeviceConfig::default();
        config.fragment_count = 1;
        assert!(config.validate().is_err());

        let mut config = DeviceConfig::default();
        config.latency_ms = 0;
        assert!(config.validate().is_err());
    }
}
