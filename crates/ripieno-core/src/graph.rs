//! The mixer graph: every mixer and buffer of one device lives in a
//! generational arena and is addressed by a stable handle. Parent/child and
//! attachment relationships are index-linked lists, so attach and detach are
//! O(1) and the recursive mixing pass never chases raw pointers.

use std::sync::atomic::Ordering;

use crate::buffer::BufferRecord;
use crate::{Error, Result};

/// Stable handle to a mixer in its device's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MixerId {
    index: u32,
    generation: u32,
}

/// Stable handle to a buffer in its device's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId {
    index: u32,
    generation: u32,
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot arena with generation counters; a freed slot's handle goes stale
/// instead of aliasing its successor.
struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Arena<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn insert(&mut self, value: T) -> (u32, u32) {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.value = Some(value);
                (index, slot.generation)
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    value: Some(value),
                });
                (self.slots.len() as u32 - 1, 0)
            }
        }
    }

    fn get(&self, index: u32, generation: u32) -> Option<&T> {
        self.slots
            .get(index as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_ref())
    }

    fn get_mut(&mut self, index: u32, generation: u32) -> Option<&mut T> {
        self.slots
            .get_mut(index as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_mut())
    }

    fn remove(&mut self, index: u32, generation: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation || slot.value.is_none() {
            return None;
        }
        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        value
    }
}

/// One mixer node: tree links, attached-buffer list, and the two
/// fragment-sized scratch blocks the mixing pass works in.
pub(crate) struct MixerRecord {
    pub(crate) parent: Option<MixerId>,
    pub(crate) first_child: Option<MixerId>,
    pub(crate) last_child: Option<MixerId>,
    pub(crate) prev_sibling: Option<MixerId>,
    pub(crate) next_sibling: Option<MixerId>,
    pub(crate) first_buffer: Option<BufferId>,
    pub(crate) last_buffer: Option<BufferId>,
    staging: Vec<f32>,
    scratch: Vec<f32>,
}

impl MixerRecord {
    fn new(fragment_samples: usize) -> Self {
        Self {
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            first_buffer: None,
            last_buffer: None,
            staging: vec![0.0; fragment_samples],
            scratch: vec![0.0; fragment_samples],
        }
    }
}

pub(crate) struct MixerGraph {
    mixers: Arena<MixerRecord>,
    buffers: Arena<BufferRecord>,
    master: MixerId,
    fragment_samples: usize,
    device_channels: u16,
    device_rate: u32,
}

impl MixerGraph {
    pub(crate) fn new(fragment_samples: usize, device_channels: u16, device_rate: u32) -> Self {
        let mut mixers = Arena::new();
        let (index, generation) = mixers.insert(MixerRecord::new(fragment_samples));
        Self {
            mixers,
            buffers: Arena::new(),
            master: MixerId { index, generation },
            fragment_samples,
            device_channels,
            device_rate,
        }
    }

    pub(crate) fn master(&self) -> MixerId {
        self.master
    }

    pub(crate) fn device_channels(&self) -> u16 {
        self.device_channels
    }

    pub(crate) fn device_rate(&self) -> u32 {
        self.device_rate
    }

    fn mixer(&self, id: MixerId) -> Result<&MixerRecord> {
        self.mixers
            .get(id.index, id.generation)
            .ok_or(Error::StaleHandle("mixer"))
    }

    fn mixer_mut(&mut self, id: MixerId) -> Result<&mut MixerRecord> {
        self.mixers
            .get_mut(id.index, id.generation)
            .ok_or(Error::StaleHandle("mixer"))
    }

    pub(crate) fn buffer(&self, id: BufferId) -> Result<&BufferRecord> {
        self.buffers
            .get(id.index, id.generation)
            .ok_or(Error::StaleHandle("buffer"))
    }

    fn buffer_mut(&mut self, id: BufferId) -> Result<&mut BufferRecord> {
        self.buffers
            .get_mut(id.index, id.generation)
            .ok_or(Error::StaleHandle("buffer"))
    }

    pub(crate) fn mixer_exists(&self, id: MixerId) -> bool {
        self.mixers.get(id.index, id.generation).is_some()
    }

    pub(crate) fn buffer_exists(&self, id: BufferId) -> bool {
        self.buffers.get(id.index, id.generation).is_some()
    }

    // ------------------------------------------------------------------
    // Mixer tree surgery
    // ------------------------------------------------------------------

    /// New mixer, attached under the master.
    pub(crate) fn create_mixer(&mut self) -> MixerId {
        let (index, generation) = self.mixers.insert(MixerRecord::new(self.fragment_samples));
        let id = MixerId { index, generation };
        // Cannot fail: both ends were just verified to exist.
        let _ = self.attach_mixer(self.master, id);
        id
    }

    /// Detach every child and buffer, then the mixer itself, then free it.
    /// Orphaned children and buffers stay alive, unattached.
    pub(crate) fn delete_mixer(&mut self, id: MixerId) -> Result<()> {
        if id == self.master {
            return Err(Error::InvalidArgument("the master mixer cannot be deleted"));
        }
        self.mixer(id)?;
        self.detach_all_mixers(id)?;
        self.detach_all_buffers(id)?;
        self.unlink_mixer(id)?;
        self.mixers.remove(id.index, id.generation);
        Ok(())
    }

    /// Attach `child` under `parent`, detaching it from any previous parent.
    pub(crate) fn attach_mixer(&mut self, parent: MixerId, child: MixerId) -> Result<()> {
        self.mixer(parent)?;
        self.mixer(child)?;
        if child == self.master {
            return Err(Error::InvalidArgument("the master mixer cannot be attached"));
        }
        if parent == child {
            return Err(Error::InvalidArgument("a mixer cannot be its own parent"));
        }
        // Reject attachments that would close a cycle through `child`.
        let mut ancestor = Some(parent);
        while let Some(node) = ancestor {
            if node == child {
                return Err(Error::InvalidArgument("attachment would create a cycle"));
            }
            ancestor = self.mixer(node)?.parent;
        }
        if self.mixer(child)?.parent == Some(parent) {
            return Ok(());
        }
        self.unlink_mixer(child)?;

        let old_tail = self.mixer(parent)?.last_child;
        {
            let record = self.mixer_mut(child)?;
            record.parent = Some(parent);
            record.prev_sibling = old_tail;
            record.next_sibling = None;
        }
        match old_tail {
            Some(tail) => self.mixer_mut(tail)?.next_sibling = Some(child),
            None => self.mixer_mut(parent)?.first_child = Some(child),
        }
        self.mixer_mut(parent)?.last_child = Some(child);
        Ok(())
    }

    pub(crate) fn detach_mixer(&mut self, parent: MixerId, child: MixerId) -> Result<()> {
        if self.mixer(child)?.parent != Some(parent) {
            return Err(Error::InvalidArgument("mixer is not attached to this parent"));
        }
        self.unlink_mixer(child)
    }

    pub(crate) fn detach_all_mixers(&mut self, parent: MixerId) -> Result<()> {
        let mut cursor = self.mixer(parent)?.first_child;
        while let Some(child) = cursor {
            cursor = self.mixer(child)?.next_sibling;
            self.unlink_mixer(child)?;
        }
        Ok(())
    }

    fn unlink_mixer(&mut self, child: MixerId) -> Result<()> {
        let (parent, prev, next) = {
            let record = self.mixer(child)?;
            (record.parent, record.prev_sibling, record.next_sibling)
        };
        let Some(parent) = parent else {
            return Ok(());
        };
        match prev {
            Some(p) => self.mixer_mut(p)?.next_sibling = next,
            None => self.mixer_mut(parent)?.first_child = next,
        }
        match next {
            Some(n) => self.mixer_mut(n)?.prev_sibling = prev,
            None => self.mixer_mut(parent)?.last_child = prev,
        }
        let record = self.mixer_mut(child)?;
        record.parent = None;
        record.prev_sibling = None;
        record.next_sibling = None;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Buffer attachment
    // ------------------------------------------------------------------

    /// New buffer record, attached to the master mixer.
    pub(crate) fn add_buffer(&mut self, record: BufferRecord) -> BufferId {
        let (index, generation) = self.buffers.insert(record);
        let id = BufferId { index, generation };
        let _ = self.attach_buffer(self.master, id);
        id
    }

    /// Remove a buffer from the graph, returning its record so the device
    /// can settle playback accounting.
    pub(crate) fn delete_buffer(&mut self, id: BufferId) -> Result<BufferRecord> {
        self.buffer(id)?;
        self.unlink_buffer(id)?;
        self.buffers
            .remove(id.index, id.generation)
            .ok_or(Error::StaleHandle("buffer"))
    }

    /// Attach a buffer to `mixer`, moving it from any previous mixer. A
    /// buffer is attached to at most one mixer at any time.
    pub(crate) fn attach_buffer(&mut self, mixer: MixerId, buffer: BufferId) -> Result<()> {
        self.mixer(mixer)?;
        if self.buffer(buffer)?.mixer == Some(mixer) {
            return Ok(());
        }
        self.unlink_buffer(buffer)?;

        let old_tail = self.mixer(mixer)?.last_buffer;
        {
            let record = self.buffer_mut(buffer)?;
            record.mixer = Some(mixer);
            record.prev = old_tail;
            record.next = None;
        }
        match old_tail {
            Some(tail) => self.buffer_mut(tail)?.next = Some(buffer),
            None => self.mixer_mut(mixer)?.first_buffer = Some(buffer),
        }
        self.mixer_mut(mixer)?.last_buffer = Some(buffer);
        Ok(())
    }

    pub(crate) fn detach_buffer(&mut self, mixer: MixerId, buffer: BufferId) -> Result<()> {
        if self.buffer(buffer)?.mixer != Some(mixer) {
            return Err(Error::InvalidArgument(
                "buffer is not attached to this mixer",
            ));
        }
        self.unlink_buffer(buffer)
    }

    pub(crate) fn detach_all_buffers(&mut self, mixer: MixerId) -> Result<()> {
        let mut cursor = self.mixer(mixer)?.first_buffer;
        while let Some(buffer) = cursor {
            cursor = self.buffer(buffer)?.next;
            self.unlink_buffer(buffer)?;
        }
        Ok(())
    }

    fn unlink_buffer(&mut self, buffer: BufferId) -> Result<()> {
        let (mixer, prev, next) = {
            let record = self.buffer(buffer)?;
            (record.mixer, record.prev, record.next)
        };
        let Some(mixer) = mixer else {
            return Ok(());
        };
        match prev {
            Some(p) => self.buffer_mut(p)?.next = next,
            None => self.mixer_mut(mixer)?.first_buffer = next,
        }
        match next {
            Some(n) => self.buffer_mut(n)?.prev = prev,
            None => self.mixer_mut(mixer)?.last_buffer = prev,
        }
        let record = self.buffer_mut(buffer)?;
        record.mixer = None;
        record.prev = None;
        record.next = None;
        Ok(())
    }

    pub(crate) fn buffer_mixer(&self, buffer: BufferId) -> Result<Option<MixerId>> {
        Ok(self.buffer(buffer)?.mixer)
    }

    /// Attached buffers of one mixer, in attachment order.
    pub(crate) fn buffers_of(&self, mixer: MixerId) -> Result<Vec<BufferId>> {
        let mut out = Vec::new();
        let mut cursor = self.mixer(mixer)?.first_buffer;
        while let Some(buffer) = cursor {
            out.push(buffer);
            cursor = self.buffer(buffer)?.next;
        }
        Ok(out)
    }

    /// Child mixers of one mixer, in attachment order.
    pub(crate) fn children_of(&self, mixer: MixerId) -> Result<Vec<MixerId>> {
        let mut out = Vec::new();
        let mut cursor = self.mixer(mixer)?.first_child;
        while let Some(child) = cursor {
            out.push(child);
            cursor = self.mixer(child)?.next_sibling;
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Mixing
    // ------------------------------------------------------------------

    /// Recursively mix one fragment's worth of the subtree under `id` into
    /// its staging block. Returns the maximum number of samples any source
    /// produced; the staging block is zeroed beyond that.
    pub(crate) fn mix_next_samples(&mut self, id: MixerId, sample_count: usize) -> Result<usize> {
        self.mixer(id)?;
        Ok(self.mix_into(id, sample_count))
    }

    pub(crate) fn staging(&self, id: MixerId) -> Result<&[f32]> {
        Ok(&self.mixer(id)?.staging)
    }

    fn mix_into(&mut self, id: MixerId, sample_count: usize) -> usize {
        let (mut staging, mut scratch, first_buffer, first_child) = {
            let Some(record) = self.mixers.get_mut(id.index, id.generation) else {
                return 0;
            };
            (
                std::mem::take(&mut record.staging),
                std::mem::take(&mut record.scratch),
                record.first_buffer,
                record.first_child,
            )
        };
        let count = sample_count.min(staging.len());
        staging[..count].fill(0.0);
        let mut samples_mixed = 0;

        // Attached buffers, in attachment order.
        let mut cursor = first_buffer;
        while let Some(buffer_id) = cursor {
            let Some(record) = self.buffers.get(buffer_id.index, buffer_id.generation) else {
                break;
            };
            cursor = record.next;
            if !record.state.playing.get() {
                continue;
            }
            match record.read_samples(&mut scratch[..count], self.device_channels, self.device_rate)
            {
                Ok(produced) => {
                    let gain = record.state.gain.get();
                    for i in 0..produced {
                        staging[i] += scratch[i] * gain;
                    }
                    samples_mixed = samples_mixed.max(produced);
                }
                Err(_) => {
                    if !record.rate_warned.swap(true, Ordering::Relaxed) {
                        tracing::warn!(
                            buffer_rate = record.sample_rate,
                            device_rate = self.device_rate,
                            "buffer sample rate differs from device; skipping (no resampler)"
                        );
                    }
                }
            }
        }

        // Child mixers, recursively.
        let mut cursor = first_child;
        while let Some(child_id) = cursor {
            cursor = self
                .mixers
                .get(child_id.index, child_id.generation)
                .and_then(|record| record.next_sibling);
            let produced = self.mix_into(child_id, count);
            let Some(child) = self.mixers.get_mut(child_id.index, child_id.generation) else {
                continue;
            };
            let child_staging = std::mem::take(&mut child.staging);
            for i in 0..produced {
                staging[i] += child_staging[i];
            }
            samples_mixed = samples_mixed.max(produced);
            if let Some(child) = self.mixers.get_mut(child_id.index, child_id.generation) {
                child.staging = child_staging;
            }
        }

        // Hard clip into the legal sample range.
        for sample in &mut staging[..count] {
            *sample = sample.clamp(-1.0, 1.0);
        }

        if let Some(record) = self.mixers.get_mut(id.index, id.generation) {
            record.staging = staging;
            record.scratch = scratch;
        }
        samples_mixed
    }
}
