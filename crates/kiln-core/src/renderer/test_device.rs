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

//! A recording device for the unit tests of this crate.

use crate::renderer::api::*;
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GraphicsDevice;
use std::collections::{HashMap, HashSet};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub(crate) struct RecordingDevice {
    next_id: AtomicUsize,
    next_fence: AtomicU64,
    buffers: Mutex<HashMap<BufferId, Box<[u8]>>>,
    mapped: Mutex<HashSet<BufferId>>,
    fences: Mutex<HashMap<FenceId, bool>>,
    bind_calls: AtomicUsize,
    invalidations: AtomicUsize,
    streams: Mutex<HashMap<u32, (BufferId, u32, Vec<VertexAttribute>)>>,
    flushes: AtomicUsize,
    lost: AtomicBool,
    no_persistent_mapping: AtomicBool,
}

impl RecordingDevice {
    pub(crate) fn without_persistent_mapping() -> Self {
        let device = Self::default();
        device.no_persistent_mapping.store(true, Ordering::Relaxed);
        device
    }

    pub(crate) fn bind_calls(&self) -> usize {
        self.bind_calls.load(Ordering::Relaxed)
    }

    pub(crate) fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::Relaxed)
    }

    pub(crate) fn vertex_stream(&self, slot: u32) -> Option<(BufferId, u32, Vec<VertexAttribute>)> {
        self.streams.lock().unwrap().get(&slot).cloned()
    }

    pub(crate) fn flushes(&self) -> usize {
        self.flushes.load(Ordering::Relaxed)
    }

    pub(crate) fn live_buffers(&self) -> usize {
        self.buffers.lock().unwrap().len()
    }

    pub(crate) fn live_fences(&self) -> usize {
        self.fences.lock().unwrap().len()
    }

    pub(crate) fn is_mapped(&self, id: BufferId) -> bool {
        self.mapped.lock().unwrap().contains(&id)
    }

    pub(crate) fn signal_all(&self) {
        for signaled in self.fences.lock().unwrap().values_mut() {
            *signaled = true;
        }
    }

    pub(crate) fn lose(&self) {
        self.lost.store(true, Ordering::Relaxed);
    }
}

impl GraphicsDevice for RecordingDevice {
    fn limits(&self) -> DeviceLimits {
        DeviceLimits {
            max_buffer_size: 1024,
            persistent_mapping: !self.no_persistent_mapping.load(Ordering::Relaxed),
        }
    }

    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        initial_data: Option<&[u8]>,
    ) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let mut storage = vec![0u8; descriptor.size as usize].into_boxed_slice();
        if let Some(data) = initial_data {
            storage[..data.len()].copy_from_slice(data);
        }
        self.buffers.lock().unwrap().insert(id, storage);
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.mapped.lock().unwrap().remove(&id);
        self.streams.lock().unwrap().retain(|_, stream| stream.0 != id);
        self.buffers
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn map_buffer(
        &self,
        id: BufferId,
        offset: u64,
        len: u64,
        _flags: MapFlags,
    ) -> Result<NonNull<u8>, ResourceError> {
        let mut buffers = self.buffers.lock().unwrap();
        let storage = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        if offset + len > storage.len() as u64 {
            return Err(ResourceError::OutOfBounds);
        }
        if !self.mapped.lock().unwrap().insert(id) {
            return Err(ResourceError::AlreadyMapped(id));
        }
        let ptr = unsafe { storage.as_mut_ptr().add(offset as usize) };
        NonNull::new(ptr).ok_or(ResourceError::NotFound)
    }

    fn unmap_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        if self.mapped.lock().unwrap().remove(&id) {
            Ok(())
        } else {
            Err(ResourceError::NotMapped(id))
        }
    }

    fn read_buffer(&self, id: BufferId, offset: u64, out: &mut [u8]) -> Result<(), ResourceError> {
        let buffers = self.buffers.lock().unwrap();
        let storage = buffers.get(&id).ok_or(ResourceError::NotFound)?;
        let start = offset as usize;
        let end = start + out.len();
        if end > storage.len() {
            return Err(ResourceError::OutOfBounds);
        }
        out.copy_from_slice(&storage[start..end]);
        Ok(())
    }

    fn clear_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut buffers = self.buffers.lock().unwrap();
        buffers.get_mut(&id).ok_or(ResourceError::NotFound)?.fill(0);
        Ok(())
    }

    fn invalidate_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        if !self.buffers.lock().unwrap().contains_key(&id) {
            return Err(ResourceError::NotFound);
        }
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn bind_vertex_buffer(
        &self,
        slot: u32,
        id: BufferId,
        stride: u32,
        attributes: &[VertexAttribute],
    ) -> Result<(), ResourceError> {
        self.bind_calls.fetch_add(1, Ordering::Relaxed);
        self.streams
            .lock()
            .unwrap()
            .insert(slot, (id, stride, attributes.to_vec()));
        Ok(())
    }

    fn bind_buffer(&self, _target: BufferTarget, _id: Option<BufferId>) -> Result<(), ResourceError> {
        self.bind_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn insert_fence(&self) -> Result<FenceId, ResourceError> {
        if self.lost.load(Ordering::Relaxed) {
            return Err(ResourceError::DeviceLost);
        }
        let fence = FenceId(self.next_fence.fetch_add(1, Ordering::Relaxed) + 1);
        self.fences.lock().unwrap().insert(fence, false);
        Ok(fence)
    }

    fn client_wait_fence(&self, fence: FenceId, _timeout_ns: u64, flush: bool) -> FenceStatus {
        if flush {
            self.flush();
        }
        if self.lost.load(Ordering::Relaxed) {
            return FenceStatus::DeviceLost;
        }
        match self.fences.lock().unwrap().get(&fence) {
            Some(true) => FenceStatus::Signaled,
            _ => FenceStatus::Timeout,
        }
    }

    fn delete_fence(&self, fence: FenceId) {
        self.fences.lock().unwrap().remove(&fence);
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }
}
