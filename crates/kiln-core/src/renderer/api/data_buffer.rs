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

//! A GPU memory block with a storage policy and explicit mapping discipline.
//!
//! # Mapping
//!
//! [`DataBuffer::map`] returns a [`MappedRange`] guard that borrows the buffer
//! mutably. The host pointer is only reachable through the guard, so it cannot
//! outlive the mapping: dropping the guard unmaps, and no slice obtained from
//! it survives that point.
//!
//! Buffers with a [`StoragePolicy::Dynamic`] or [`StoragePolicy::Stream`]
//! policy are mapped once at creation when the device supports persistent
//! mapping. Their guards reuse the retained pointer and unmapping is a no-op.
//! Before rewriting a region that earlier GPU commands may still read, call
//! [`DataBuffer::synchronize`] after submitting those commands; a later
//! [`MapMode::InvalidateAll`] map refuses the region until that fence signals.

use super::buffer::*;
use super::context::GpuContext;
use super::fence::FenceStatus;
use super::sync_fence::SyncFence;
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GraphicsDevice;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::sync::Arc;

/// A GPU buffer owned by the thread that owns the graphics context.
pub struct DataBuffer {
    device: Arc<dyn GraphicsDevice>,
    id: BufferId,
    target: BufferTarget,
    policy: StoragePolicy,
    size: u64,
    persistent: Option<NonNull<u8>>,
    mapped: Option<(u64, u64)>,
    fence: SyncFence,
    released: bool,
}

impl DataBuffer {
    /// Allocates a buffer of `size` bytes.
    ///
    /// `initial_data` is copied to the start of the buffer. Dynamic and stream
    /// buffers are mapped persistently right away if the device supports it.
    ///
    /// # Errors
    ///
    /// * [`ResourceError::InvalidDescriptor`] if `size` is zero or the initial
    ///   data is larger than `size`.
    /// * [`ResourceError::Allocation`] if `size` exceeds the device limit.
    pub fn create(
        ctx: &GpuContext,
        target: BufferTarget,
        size: u64,
        initial_data: Option<&[u8]>,
        policy: StoragePolicy,
    ) -> Result<Self, ResourceError> {
        ctx.check_owner()?;
        let limits = ctx.limits();
        if size == 0 {
            return Err(ResourceError::InvalidDescriptor(
                "buffer size must be non-zero".to_string(),
            ));
        }
        if size > limits.max_buffer_size {
            return Err(ResourceError::Allocation {
                requested: size,
                limit: limits.max_buffer_size,
            });
        }
        if let Some(data) = initial_data {
            if data.len() as u64 > size {
                return Err(ResourceError::InvalidDescriptor(format!(
                    "{} bytes of initial data do not fit in a {size} byte buffer",
                    data.len()
                )));
            }
        }

        let device = Arc::clone(ctx.device());
        let descriptor = BufferDescriptor {
            label: None,
            size,
            target,
            policy,
        };
        let id = device.create_buffer(&descriptor, initial_data)?;

        let persistent = if policy.is_mappable() && limits.persistent_mapping {
            let flags = MapFlags::WRITE | MapFlags::PERSISTENT | MapFlags::UNSYNCHRONIZED;
            match device.map_buffer(id, 0, size, flags) {
                Ok(ptr) => Some(ptr),
                Err(e) => {
                    let _ = device.destroy_buffer(id);
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::debug!(
            "Created {policy:?} buffer {id:?} ({size} bytes, {target:?}, persistent: {})",
            persistent.is_some()
        );

        Ok(Self {
            fence: SyncFence::new(Arc::clone(&device)),
            device,
            id,
            target,
            policy,
            size,
            persistent,
            mapped: None,
            released: false,
        })
    }

    /// The backing-store identifier.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// The binding class the buffer was created for.
    pub fn target(&self) -> BufferTarget {
        self.target
    }

    /// The storage policy.
    pub fn policy(&self) -> StoragePolicy {
        self.policy
    }

    /// The size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns `true` if the buffer keeps a persistent host pointer.
    pub fn is_persistent(&self) -> bool {
        self.persistent.is_some()
    }

    /// Returns `true` while a [`MappedRange`] is live.
    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    /// The currently mapped `(offset, len)` range, if any.
    pub fn mapped_range(&self) -> Option<(u64, u64)> {
        self.mapped
    }

    /// Returns `true` while the fence inserted by [`synchronize`](Self::synchronize)
    /// is outstanding.
    pub fn has_pending_fence(&self) -> bool {
        self.fence.is_pending()
    }

    /// The fence covering prior writes.
    pub fn fence(&self) -> &SyncFence {
        &self.fence
    }

    /// Maps `len` bytes starting at `offset` for writing.
    ///
    /// # Errors
    ///
    /// * [`ResourceError::OutOfBounds`] if the range is empty or does not fit.
    /// * [`ResourceError::RegionInFlight`] if the buffer is persistent, `mode`
    ///   is [`MapMode::InvalidateAll`] and the fence from the last
    ///   [`synchronize`](Self::synchronize) has not signaled yet.
    /// * A contract violation for static buffers, and for a buffer whose
    ///   previous guard was leaked.
    pub fn map(&mut self, offset: u64, len: u64, mode: MapMode) -> Result<MappedRange<'_>, ResourceError> {
        if !self.policy.is_mappable() {
            return Err(ResourceError::misuse(format!(
                "static buffer {:?} cannot be mapped after its initial upload",
                self.id
            )));
        }
        if let Some(range) = self.mapped {
            return Err(ResourceError::misuse(format!(
                "buffer {:?} mapped while range {range:?} is still mapped",
                self.id
            )));
        }
        if len == 0 || offset.checked_add(len).map_or(true, |end| end > self.size) {
            return Err(ResourceError::OutOfBounds);
        }

        let ptr = match self.persistent {
            Some(base) => {
                if mode == MapMode::InvalidateAll {
                    self.wait_for_region()?;
                }
                // SAFETY: `offset + len <= size` and the persistent pointer
                // covers the whole buffer.
                unsafe { NonNull::new_unchecked(base.as_ptr().add(offset as usize)) }
            }
            None => self
                .device
                .map_buffer(self.id, offset, len, MapFlags::for_mode(mode))?,
        };

        self.mapped = Some((offset, len));
        Ok(MappedRange {
            buffer: self,
            ptr,
            len: len as usize,
        })
    }

    /// Copies `bytes` into the buffer at `offset` through a temporary mapping.
    pub fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<(), ResourceError> {
        let mut range = self.map(offset, bytes.len() as u64, MapMode::InvalidateAll)?;
        range.copy_from_slice(bytes);
        range.unmap()
    }

    /// Inserts a fence covering every command recorded so far, replacing the
    /// previous one.
    ///
    /// Call this after submitting GPU work that reads a persistently mapped
    /// region and before rewriting that region.
    pub fn synchronize(&mut self) -> Result<(), ResourceError> {
        self.fence.delete();
        if self.fence.try_create()? {
            log::trace!("Buffer {:?} synchronized with {:?}", self.id, self.fence.id());
        }
        Ok(())
    }

    /// Binds the buffer to `target`, skipping the device call if already current.
    ///
    /// Returns `true` if the bind reached the device.
    pub fn bind(&self, ctx: &mut GpuContext, target: BufferTarget) -> Result<bool, ResourceError> {
        ctx.bind_buffer(target, self.id)
    }

    /// Clears whatever buffer is bound to `target`. See [`GpuContext::unbind_target`].
    pub fn unbind(ctx: &mut GpuContext, target: BufferTarget, full: bool) -> Result<(), ResourceError> {
        ctx.unbind_target(target, full)
    }

    /// Fills the whole buffer with zeros through the device.
    ///
    /// The clear is a recorded command, ordered after earlier GPU work. Clearing
    /// a buffer with a live mapping is a contract violation.
    pub fn clear(&mut self, ctx: &GpuContext) -> Result<(), ResourceError> {
        ctx.check_owner()?;
        if let Some(range) = self.mapped {
            return Err(ResourceError::misuse(format!(
                "buffer {:?} cleared while range {range:?} is mapped",
                self.id
            )));
        }
        self.device.clear_buffer(self.id)
    }

    /// Orphans the buffer's contents.
    ///
    /// Commands already recorded keep reading the old data, so the fence
    /// guarding the persistent region is dropped and the next
    /// [`MapMode::InvalidateAll`] map succeeds right away.
    pub fn invalidate(&mut self) -> Result<(), ResourceError> {
        if let Some(range) = self.mapped {
            return Err(ResourceError::misuse(format!(
                "buffer {:?} invalidated while range {range:?} is mapped",
                self.id
            )));
        }
        self.device.invalidate_buffer(self.id)?;
        self.fence.delete();
        log::trace!("Buffer {:?} invalidated", self.id);
        Ok(())
    }

    /// Destroys the buffer, clearing any bound-cache entry that refers to it.
    pub fn destroy(mut self, ctx: &mut GpuContext) -> Result<(), ResourceError> {
        ctx.forget_buffer(self.id)?;
        self.release()
    }

    fn wait_for_region(&mut self) -> Result<(), ResourceError> {
        match self.fence.check(0, false) {
            FenceStatus::Signaled => {
                self.fence.delete();
                Ok(())
            }
            FenceStatus::Timeout => Err(ResourceError::RegionInFlight(self.id)),
            FenceStatus::DeviceLost => Err(ResourceError::DeviceLost),
        }
    }

    fn unmap_range(&mut self) -> Result<(), ResourceError> {
        if self.mapped.take().is_none() {
            return Err(ResourceError::NotMapped(self.id));
        }
        if self.persistent.is_some() {
            return Ok(());
        }
        self.device.unmap_buffer(self.id)
    }

    fn release(&mut self) -> Result<(), ResourceError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.fence.delete();
        self.persistent = None;
        self.mapped = None;
        log::trace!("Releasing buffer {:?}", self.id);
        self.device.destroy_buffer(self.id)
    }
}

impl fmt::Debug for DataBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataBuffer")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("policy", &self.policy)
            .field("size", &self.size)
            .field("persistent", &self.persistent.is_some())
            .field("mapped", &self.mapped)
            .field("fence", &self.fence)
            .finish()
    }
}

impl Drop for DataBuffer {
    fn drop(&mut self) {
        if !self.released {
            log::debug!("Buffer {:?} dropped without destroy(); releasing storage", self.id);
            if let Err(e) = self.release() {
                log::warn!("Failed to release buffer {:?}: {e}", self.id);
            }
        }
    }
}

/// A live mapping of a [`DataBuffer`] range.
///
/// Dereferences to the mapped bytes. Dropping the guard unmaps the range;
/// use [`MappedRange::unmap`] to observe unmap errors.
#[must_use = "the range is unmapped as soon as the guard is dropped"]
pub struct MappedRange<'a> {
    buffer: &'a mut DataBuffer,
    ptr: NonNull<u8>,
    len: usize,
}

impl MappedRange<'_> {
    /// Unmaps the range. A no-op on the device for persistent buffers.
    pub fn unmap(self) -> Result<(), ResourceError> {
        let mut this = std::mem::ManuallyDrop::new(self);
        this.buffer.unmap_range()
    }

    /// The `(offset, len)` of the mapped range inside the buffer.
    pub fn range(&self) -> (u64, u64) {
        self.buffer.mapped.unwrap_or((0, 0))
    }
}

impl Deref for MappedRange<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: the device guarantees `len` bytes at `ptr` until unmap, and
        // the guard's exclusive borrow of the buffer prevents a second mapping.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for MappedRange<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: see `deref`.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for MappedRange<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.buffer.unmap_range() {
            log::warn!("Failed to unmap buffer {:?}: {e}", self.buffer.id);
        }
    }
}
