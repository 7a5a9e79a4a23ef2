// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use kiln_core::renderer::{
    BufferDescriptor, BufferId, BufferTarget, DeviceLimits, FenceId, FenceStatus, GraphicsDevice,
    MapFlags, ResourceError, VertexAttribute,
};
use std::collections::HashMap;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Configuration of a [`HeadlessDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessConfig {
    /// Largest buffer the device accepts, in bytes.
    pub max_buffer_size: u64,
    /// Whether `MapFlags::PERSISTENT` mappings are supported.
    pub persistent_mapping: bool,
    /// Completes submitted work as soon as it is flushed, instead of waiting
    /// for [`HeadlessDevice::complete_submitted`].
    pub auto_complete: bool,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: 64 * 1024 * 1024,
            persistent_mapping: true,
            auto_complete: false,
        }
    }
}

/// Host storage of one buffer. Allocated once, never moved until destroyed,
/// so mapped pointers stay valid for the buffer's lifetime.
#[derive(Debug)]
struct HeadlessBuffer {
    data: NonNull<u8>,
    size: usize,
    target: BufferTarget,
    mapping: Option<Mapping>,
}

#[derive(Debug, Clone, Copy)]
struct Mapping {
    offset: u64,
    len: u64,
    flags: MapFlags,
}

// SAFETY: the storage is uniquely owned by the entry and only accessed under
// the buffer map's mutex or through a mapping handed out by the device.
unsafe impl Send for HeadlessBuffer {}

impl HeadlessBuffer {
    fn allocate(size: usize, target: BufferTarget) -> Self {
        let storage = vec![0u8; size].into_boxed_slice();
        let raw = Box::into_raw(storage) as *mut u8;
        Self {
            // SAFETY: `Box::into_raw` never returns null.
            data: unsafe { NonNull::new_unchecked(raw) },
            size,
            target,
            mapping: None,
        }
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) {
        debug_assert!(offset + bytes.len() <= self.size);
        // SAFETY: bounds are checked by every caller.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), self.data.as_ptr().add(offset), bytes.len()) }
    }

    fn read(&self, offset: usize, out: &mut [u8]) {
        debug_assert!(offset + out.len() <= self.size);
        // SAFETY: bounds are checked by every caller.
        unsafe { ptr::copy_nonoverlapping(self.data.as_ptr().add(offset), out.as_mut_ptr(), out.len()) }
    }
}

impl Drop for HeadlessBuffer {
    fn drop(&mut self) {
        // SAFETY: `data`/`size` come from `Box::into_raw` of a boxed slice.
        unsafe {
            drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
                self.data.as_ptr(),
                self.size,
            )));
        }
    }
}

/// A buffer bound as a vertex stream, with the layout it was bound with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexStream {
    /// The bound buffer.
    pub buffer: BufferId,
    /// Distance between two vertices, in bytes.
    pub stride: u32,
    /// The enabled attributes.
    pub attributes: Vec<VertexAttribute>,
}

/// Progress of the simulated command stream.
///
/// Every command gets a serial. `submitted` is the last serial handed to the
/// GPU by a flush, `completed` the last serial the GPU finished.
#[derive(Debug, Default)]
struct Timeline {
    recorded: u64,
    submitted: u64,
    completed: u64,
    lost: bool,
}

impl Timeline {
    fn record(&mut self) -> u64 {
        self.recorded += 1;
        self.recorded
    }
}

/// The internal, non-clonable state of the [`HeadlessDevice`].
#[derive(Debug)]
struct HeadlessDeviceInternal {
    config: HeadlessConfig,
    buffers: Mutex<HashMap<BufferId, HeadlessBuffer>>,
    fences: Mutex<HashMap<FenceId, u64>>,
    timeline: Mutex<Timeline>,
    progress: Condvar,
    vertex_streams: Mutex<HashMap<u32, VertexStream>>,

    next_buffer_id: AtomicUsize,
    next_fence_id: AtomicU64,

    allocated_bytes: AtomicUsize,
    peak_bytes: AtomicU64,
    bind_calls: AtomicU64,
    invalidations: AtomicU64,
    flushes: AtomicU64,
}

/// A software [`GraphicsDevice`] with a simulated GPU timeline.
///
/// Buffers live in host memory. Commands (uploads, binds, fences) are only
/// recorded; [`flush`](GraphicsDevice::flush) submits them and
/// [`complete_submitted`](Self::complete_submitted) makes the simulated GPU
/// finish everything submitted so far. A fence therefore never signals before
/// the work in front of it has been both submitted and completed.
///
/// Cloning yields another handle to the same device.
#[derive(Debug, Clone)]
pub struct HeadlessDevice {
    internal: Arc<HeadlessDeviceInternal>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(HeadlessConfig::default())
    }
}

impl HeadlessDevice {
    /// Creates a device with the given configuration.
    pub fn new(config: HeadlessConfig) -> Self {
        log::info!(
            "HeadlessDevice created (max buffer {} bytes, persistent mapping: {}, auto-complete: {})",
            config.max_buffer_size,
            config.persistent_mapping,
            config.auto_complete
        );
        Self {
            internal: Arc::new(HeadlessDeviceInternal {
                config,
                buffers: Mutex::new(HashMap::new()),
                fences: Mutex::new(HashMap::new()),
                timeline: Mutex::new(Timeline::default()),
                progress: Condvar::new(),
                vertex_streams: Mutex::new(HashMap::new()),
                next_buffer_id: AtomicUsize::new(1),
                next_fence_id: AtomicU64::new(1),
                allocated_bytes: AtomicUsize::new(0),
                peak_bytes: AtomicU64::new(0),
                bind_calls: AtomicU64::new(0),
                invalidations: AtomicU64::new(0),
                flushes: AtomicU64::new(0),
            }),
        }
    }

    /// The configuration of the device.
    pub fn config(&self) -> HeadlessConfig {
        self.internal.config
    }

    // --- Simulated GPU controls ---

    /// Makes the simulated GPU finish every submitted command.
    pub fn complete_submitted(&self) {
        let mut timeline = self.timeline();
        timeline.completed = timeline.submitted;
        self.internal.progress.notify_all();
    }

    /// Submits and completes every recorded command, signaling every fence.
    pub fn signal_all(&self) {
        let mut timeline = self.timeline();
        timeline.submitted = timeline.recorded;
        timeline.completed = timeline.recorded;
        self.internal.progress.notify_all();
    }

    /// Simulates a device loss. Every subsequent operation fails and every
    /// fence reports [`FenceStatus::DeviceLost`].
    pub fn lose_device(&self) {
        log::warn!("HeadlessDevice: simulated device loss");
        self.timeline().lost = true;
        self.internal.progress.notify_all();
    }

    /// Returns `true` after [`lose_device`](Self::lose_device).
    pub fn is_lost(&self) -> bool {
        self.timeline().lost
    }

    // --- Introspection ---

    /// Commands recorded but not yet submitted.
    pub fn unsubmitted_commands(&self) -> u64 {
        let timeline = self.timeline();
        timeline.recorded - timeline.submitted
    }

    /// Number of live buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers().len()
    }

    /// Number of live fences.
    pub fn fence_count(&self) -> usize {
        self.fences().len()
    }

    /// Number of buffers with a live mapping (persistent ones included).
    pub fn live_mappings(&self) -> usize {
        self.buffers()
            .values()
            .filter(|buffer| buffer.mapping.is_some())
            .count()
    }

    /// Returns `true` if the buffer has a live mapping.
    pub fn is_mapped(&self, id: BufferId) -> bool {
        self.buffers()
            .get(&id)
            .is_some_and(|buffer| buffer.mapping.is_some())
    }

    /// A copy of the buffer's contents.
    pub fn buffer_contents(&self, id: BufferId) -> Option<Vec<u8>> {
        self.buffers().get(&id).map(|buffer| {
            let mut out = vec![0; buffer.size];
            buffer.read(0, &mut out);
            out
        })
    }

    /// The target a buffer was created for.
    pub fn buffer_target(&self, id: BufferId) -> Option<BufferTarget> {
        self.buffers().get(&id).map(|buffer| buffer.target)
    }

    /// Bytes currently allocated.
    pub fn allocated_bytes(&self) -> usize {
        self.internal.allocated_bytes.load(Ordering::Relaxed)
    }

    /// Highest number of bytes allocated at once.
    pub fn peak_bytes(&self) -> u64 {
        self.internal.peak_bytes.load(Ordering::Relaxed)
    }

    /// Bind calls that reached the device.
    pub fn bind_calls(&self) -> u64 {
        self.internal.bind_calls.load(Ordering::Relaxed)
    }

    /// Number of buffer invalidations.
    pub fn invalidations(&self) -> u64 {
        self.internal.invalidations.load(Ordering::Relaxed)
    }

    /// The buffer and layout bound to vertex stream `slot`, if any.
    pub fn vertex_stream(&self, slot: u32) -> Option<VertexStream> {
        self.vertex_streams().get(&slot).cloned()
    }

    /// Number of flushes, explicit or requested by a fence wait.
    pub fn flush_count(&self) -> u64 {
        self.internal.flushes.load(Ordering::Relaxed)
    }

    // --- Helpers ---

    fn buffers(&self) -> MutexGuard<'_, HashMap<BufferId, HeadlessBuffer>> {
        self.internal
            .buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn fences(&self) -> MutexGuard<'_, HashMap<FenceId, u64>> {
        self.internal
            .fences
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn vertex_streams(&self) -> MutexGuard<'_, HashMap<u32, VertexStream>> {
        self.internal
            .vertex_streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn timeline(&self) -> MutexGuard<'_, Timeline> {
        self.internal
            .timeline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Records one command, failing if the device is lost.
    fn record(&self) -> Result<u64, ResourceError> {
        let mut timeline = self.timeline();
        if timeline.lost {
            return Err(ResourceError::DeviceLost);
        }
        Ok(timeline.record())
    }

    fn ensure_alive(&self) -> Result<(), ResourceError> {
        if self.timeline().lost {
            Err(ResourceError::DeviceLost)
        } else {
            Ok(())
        }
    }

    fn generate_buffer_id(&self) -> BufferId {
        BufferId(self.internal.next_buffer_id.fetch_add(1, Ordering::Relaxed))
    }

    fn generate_fence_id(&self) -> FenceId {
        FenceId(self.internal.next_fence_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn limits(&self) -> DeviceLimits {
        DeviceLimits {
            max_buffer_size: self.internal.config.max_buffer_size,
            persistent_mapping: self.internal.config.persistent_mapping,
        }
    }

    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        initial_data: Option<&[u8]>,
    ) -> Result<BufferId, ResourceError> {
        self.ensure_alive()?;
        if descriptor.size == 0 {
            return Err(ResourceError::InvalidDescriptor(
                "buffer size must be non-zero".to_string(),
            ));
        }
        let limit = self.internal.config.max_buffer_size;
        if descriptor.size > limit {
            return Err(ResourceError::Allocation {
                requested: descriptor.size,
                limit,
            });
        }
        let size = descriptor.size as usize;
        if initial_data.is_some_and(|data| data.len() > size) {
            return Err(ResourceError::InvalidDescriptor(
                "initial data larger than the buffer".to_string(),
            ));
        }

        let mut buffer = HeadlessBuffer::allocate(size, descriptor.target);
        if let Some(data) = initial_data {
            buffer.write(0, data);
            self.record()?;
        }

        let id = self.generate_buffer_id();
        self.buffers().insert(id, buffer);

        let current = self.internal.allocated_bytes.fetch_add(size, Ordering::Relaxed) + size;
        self.internal
            .peak_bytes
            .fetch_max(current as u64, Ordering::Relaxed);

        log::debug!(
            "HeadlessDevice: Created buffer {id:?} ({} bytes, {:?}, {:?}, label: {:?})",
            size,
            descriptor.target,
            descriptor.policy,
            descriptor.label
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        match self.buffers().remove(&id) {
            Some(buffer) => {
                self.vertex_streams()
                    .retain(|_, stream| stream.buffer != id);
                self.internal
                    .allocated_bytes
                    .fetch_sub(buffer.size, Ordering::Relaxed);
                log::debug!("HeadlessDevice: Destroyed buffer with ID: {id:?}");
                Ok(())
            }
            None => Err(ResourceError::NotFound),
        }
    }

    fn map_buffer(
        &self,
        id: BufferId,
        offset: u64,
        len: u64,
        flags: MapFlags,
    ) -> Result<NonNull<u8>, ResourceError> {
        self.ensure_alive()?;
        if flags.contains(MapFlags::PERSISTENT) && !self.internal.config.persistent_mapping {
            return Err(ResourceError::Backend(
                "persistent mapping is not supported by this device".to_string(),
            ));
        }

        let mut buffers = self.buffers();
        let buffer = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        let end = offset.checked_add(len).ok_or(ResourceError::OutOfBounds)?;
        if len == 0 || end > buffer.size as u64 {
            return Err(ResourceError::OutOfBounds);
        }
        if buffer.mapping.is_some() {
            return Err(ResourceError::AlreadyMapped(id));
        }

        buffer.mapping = Some(Mapping { offset, len, flags });
        log::trace!("HeadlessDevice: Mapped {id:?} [{offset}..{end}) with {flags:?}");
        // SAFETY: `offset < size`, so the pointer stays inside the allocation.
        Ok(unsafe { NonNull::new_unchecked(buffer.data.as_ptr().add(offset as usize)) })
    }

    fn unmap_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mapping = {
            let mut buffers = self.buffers();
            let buffer = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
            buffer.mapping.take().ok_or(ResourceError::NotMapped(id))?
        };
        // The written range becomes an upload in the command stream.
        if mapping.flags.contains(MapFlags::WRITE) {
            self.record()?;
        }
        log::trace!(
            "HeadlessDevice: Unmapped {id:?} [{}..{})",
            mapping.offset,
            mapping.offset + mapping.len
        );
        Ok(())
    }

    fn read_buffer(&self, id: BufferId, offset: u64, out: &mut [u8]) -> Result<(), ResourceError> {
        let buffers = self.buffers();
        let buffer = buffers.get(&id).ok_or(ResourceError::NotFound)?;
        let end = offset
            .checked_add(out.len() as u64)
            .ok_or(ResourceError::OutOfBounds)?;
        if end > buffer.size as u64 {
            return Err(ResourceError::OutOfBounds);
        }
        buffer.read(offset as usize, out);
        Ok(())
    }

    fn clear_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        {
            let mut buffers = self.buffers();
            let buffer = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
            let zeros = vec![0u8; buffer.size];
            buffer.write(0, &zeros);
        }
        self.record()?;
        log::trace!("HeadlessDevice: Cleared {id:?}");
        Ok(())
    }

    fn invalidate_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        if !self.buffers().contains_key(&id) {
            return Err(ResourceError::NotFound);
        }
        self.internal.invalidations.fetch_add(1, Ordering::Relaxed);
        log::trace!("HeadlessDevice: Invalidated {id:?}");
        Ok(())
    }

    fn bind_vertex_buffer(
        &self,
        slot: u32,
        id: BufferId,
        stride: u32,
        attributes: &[VertexAttribute],
    ) -> Result<(), ResourceError> {
        if !self.buffers().contains_key(&id) {
            return Err(ResourceError::NotFound);
        }
        self.record()?;
        self.internal.bind_calls.fetch_add(1, Ordering::Relaxed);
        self.vertex_streams().insert(
            slot,
            VertexStream {
                buffer: id,
                stride,
                attributes: attributes.to_vec(),
            },
        );
        log::trace!(
            "HeadlessDevice: Bound {id:?} to vertex stream {slot} ({} attributes, stride {stride})",
            attributes.len()
        );
        Ok(())
    }

    fn bind_buffer(&self, target: BufferTarget, id: Option<BufferId>) -> Result<(), ResourceError> {
        if let Some(id) = id {
            if !self.buffers().contains_key(&id) {
                return Err(ResourceError::NotFound);
            }
        }
        self.record()?;
        self.internal.bind_calls.fetch_add(1, Ordering::Relaxed);
        log::trace!("HeadlessDevice: Bound {id:?} to {target:?}");
        Ok(())
    }

    fn insert_fence(&self) -> Result<FenceId, ResourceError> {
        let serial = self.record()?;
        let fence = self.generate_fence_id();
        self.fences().insert(fence, serial);
        log::trace!("HeadlessDevice: Inserted {fence:?} at serial {serial}");
        Ok(fence)
    }

    fn client_wait_fence(&self, fence: FenceId, timeout_ns: u64, flush: bool) -> FenceStatus {
        if flush {
            self.flush();
        }
        let Some(serial) = self.fences().get(&fence).copied() else {
            log::warn!("HeadlessDevice: wait on unknown fence {fence:?}");
            return FenceStatus::Signaled;
        };

        let timeline = self.timeline();
        let (timeline, _) = self
            .internal
            .progress
            .wait_timeout_while(timeline, Duration::from_nanos(timeout_ns), |t| {
                !t.lost && t.completed < serial
            })
            .unwrap_or_else(PoisonError::into_inner);

        if timeline.lost {
            FenceStatus::DeviceLost
        } else if timeline.completed >= serial {
            FenceStatus::Signaled
        } else {
            FenceStatus::Timeout
        }
    }

    fn delete_fence(&self, fence: FenceId) {
        self.fences().remove(&fence);
    }

    fn flush(&self) {
        self.internal.flushes.fetch_add(1, Ordering::Relaxed);
        let mut timeline = self.timeline();
        timeline.submitted = timeline.recorded;
        if self.internal.config.auto_complete {
            timeline.completed = timeline.submitted;
            self.internal.progress.notify_all();
        }
    }
}
