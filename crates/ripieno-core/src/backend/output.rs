//! CPAL-backed playback device (requires the `cpal` feature).
//!
//! Adapts the callback-driven CPAL stream to the fragment contract: mapped
//! fragments are staged locally and committed into a lock-free ring on unmap;
//! the stream callback drains the ring and `wait` blocks until a whole
//! fragment of ring space is free again.

use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::{Condvar, Mutex, MutexGuard};
use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};

use crate::backend::{Backend, BackendDevice, MappedFragment};
use crate::config::DeviceConfig;
use crate::{Error, Result};

/// Wrapper to hold `cpal::Stream` in a `Send` context.
///
/// # Safety
/// `cpal::Stream` is `!Send` due to platform internals. This is safe because
/// the stream is only touched behind the device's mutex.
struct StreamHandle(#[allow(dead_code)] cpal::Stream);

unsafe impl Send for StreamHandle {}

/// Backend producing devices over the host's default audio API.
#[derive(Debug, Default)]
pub struct CpalBackend {
    device_index: Option<usize>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific output device from [`CpalBackend::list_devices`].
    pub fn with_device(index: usize) -> Self {
        Self {
            device_index: Some(index),
        }
    }

    pub fn list_devices() -> Result<Vec<String>> {
        cpal::default_host()
            .output_devices()?
            .enumerate()
            .map(|(i, d)| Ok(format!("{i}: {}", d.name()?)))
            .collect()
    }
}

impl Backend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn open_device(&self, config: &DeviceConfig) -> Result<Box<dyn BackendDevice>> {
        config.validate()?;
        let device = get_device(self.device_index)?;
        let supported = device.default_output_config()?;

        let fragment_samples = config.fragment_samples();
        let ring = HeapRb::<f32>::new(fragment_samples * config.fragment_count as usize);
        let (producer, consumer) = ring.split();

        let shared = Arc::new(Shared {
            running: Mutex::new(false),
            wakeup: Condvar::new(),
        });

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, consumer, shared.clone())?
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, consumer, shared.clone())?
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &stream_config, consumer, shared.clone())?
            }
            format => {
                return Err(Error::Backend(format!(
                    "unsupported sample format: {format:?}"
                )));
            }
        };
        stream.pause()?;

        Ok(Box::new(CpalDevice {
            fragment_samples,
            staging: Mutex::new(vec![0.0; fragment_samples].into_boxed_slice()),
            producer: Mutex::new(producer),
            shared,
            stream: Mutex::new(Some(StreamHandle(stream))),
        }))
    }
}

struct Shared {
    running: Mutex<bool>,
    wakeup: Condvar,
}

struct CpalDevice {
    fragment_samples: usize,
    staging: Mutex<Box<[f32]>>,
    producer: Mutex<HeapProd<f32>>,
    shared: Arc<Shared>,
    stream: Mutex<Option<StreamHandle>>,
}

impl BackendDevice for CpalDevice {
    fn fragment_samples(&self) -> usize {
        self.fragment_samples
    }

    fn play(&self) -> Result<()> {
        if let Some(stream) = self.stream.lock().as_ref() {
            stream.0.play()?;
        }
        *self.shared.running.lock() = true;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        *self.shared.running.lock() = false;
        self.shared.wakeup.notify_all();
        if let Some(stream) = self.stream.lock().as_ref() {
            stream.0.pause()?;
        }
        Ok(())
    }

    fn wait(&self) -> bool {
        loop {
            let mut running = self.shared.running.lock();
            if !*running {
                return false;
            }
            if self.producer.lock().vacant_len() >= self.fragment_samples {
                return true;
            }
            // Re-checked on every callback wakeup; the timeout covers a
            // wakeup racing in between the space check and the wait.
            self.shared
                .wakeup
                .wait_for(&mut running, Duration::from_millis(10));
            if !*running {
                return false;
            }
        }
    }

    fn map_next_fragment(&self) -> Result<MappedFragment<'_>> {
        Ok(MutexGuard::map(self.staging.lock(), |s| &mut s[..]))
    }

    fn unmap_next_fragment(&self) -> Result<()> {
        let staging = self.staging.lock();
        let pushed = self.producer.lock().push_slice(&staging);
        if pushed < staging.len() {
            tracing::debug!(
                dropped = staging.len() - pushed,
                "hardware ring full on unmap"
            );
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        *self.shared.running.lock() = false;
        self.shared.wakeup.notify_all();
        *self.stream.lock() = None;
        Ok(())
    }
}

fn get_device(index: Option<usize>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    match index {
        Some(i) => {
            let devices: Vec<_> = host.output_devices()?.collect();
            let count = devices.len();
            devices.into_iter().nth(i).ok_or_else(|| {
                Error::Backend(format!("device index {i} out of range ({count} available)"))
            })
        }
        None => host
            .default_output_device()
            .ok_or_else(|| Error::Backend("no output device available".into())),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut consumer: HeapCons<f32>,
    shared: Arc<Shared>,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            // Underruns come out as silence; the mixing thread has missed
            // its fragment deadline and there is nothing better to play.
            for sample in data.iter_mut() {
                *sample = T::from_sample(consumer.try_pop().unwrap_or(0.0));
            }
            shared.wakeup.notify_all();
        },
        |_err| {},
        None,
    )?;

    Ok(stream)
}
