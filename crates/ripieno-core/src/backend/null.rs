//! Silent backend: satisfies the full device contract without touching any
//! audio API, pacing the mixing thread by wall clock. Used headless and in
//! tests.

use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::backend::{Backend, BackendDevice, MappedFragment};
use crate::config::DeviceConfig;
use crate::Result;

#[derive(Debug, Default)]
pub struct NullBackend;

impl NullBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn open_device(&self, config: &DeviceConfig) -> Result<Box<dyn BackendDevice>> {
        config.validate()?;
        let fragment_samples = config.fragment_samples();
        Ok(Box::new(NullDevice {
            fragment_samples,
            fragment_duration: config.fragment_duration(),
            staging: Mutex::new(vec![0.0; fragment_samples].into_boxed_slice()),
            running: Mutex::new(false),
            wakeup: Condvar::new(),
        }))
    }
}

struct NullDevice {
    fragment_samples: usize,
    fragment_duration: Duration,
    staging: Mutex<Box<[f32]>>,
    running: Mutex<bool>,
    wakeup: Condvar,
}

impl BackendDevice for NullDevice {
    fn fragment_samples(&self) -> usize {
        self.fragment_samples
    }

    fn play(&self) -> Result<()> {
        *self.running.lock() = true;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        *self.running.lock() = false;
        self.wakeup.notify_all();
        Ok(())
    }

    fn wait(&self) -> bool {
        let mut running = self.running.lock();
        if !*running {
            return false;
        }
        // Pretend the hardware consumed one fragment; stop() cuts the nap short.
        self.wakeup.wait_for(&mut running, self.fragment_duration);
        *running
    }

    fn map_next_fragment(&self) -> Result<MappedFragment<'_>> {
        Ok(MutexGuard::map(self.staging.lock(), |s| &mut s[..]))
    }

    fn unmap_next_fragment(&self) -> Result<()> {
        // Samples go nowhere.
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.stop()
    }
}
