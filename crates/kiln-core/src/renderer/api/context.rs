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

//! The owned GPU context and its bound-target cache.

use super::buffer::{BufferId, BufferTarget, DeviceLimits};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GraphicsDevice;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Tracks which buffer is currently bound to each [`BufferTarget`].
///
/// Binding the buffer that is already current is skipped without reaching the
/// device. The cache is only reachable through a [`GpuContext`], so it is owned
/// by the thread that owns the graphics context.
#[derive(Debug, Default, Clone)]
pub struct BindingCache {
    current: [Option<BufferId>; BufferTarget::ALL.len()],
    binds_issued: u64,
    binds_skipped: u64,
}

impl BindingCache {
    /// The buffer the cache believes is bound to `target`.
    pub fn current(&self, target: BufferTarget) -> Option<BufferId> {
        self.current[target.index()]
    }

    /// Number of bind calls that reached the device.
    pub fn binds_issued(&self) -> u64 {
        self.binds_issued
    }

    /// Number of bind calls skipped because the buffer was already current.
    pub fn binds_skipped(&self) -> u64 {
        self.binds_skipped
    }

    /// Returns `true` if `id` is current on any target.
    pub fn is_bound(&self, id: BufferId) -> bool {
        self.current.iter().any(|slot| *slot == Some(id))
    }

    /// Forgets every cached binding, e.g. after the device state was reset
    /// behind the cache's back.
    pub fn invalidate(&mut self) {
        self.current = Default::default();
    }

    fn set(&mut self, target: BufferTarget, id: Option<BufferId>) {
        self.current[target.index()] = id;
    }

    fn forget(&mut self, id: BufferId) {
        for slot in self.current.iter_mut().filter(|slot| **slot == Some(id)) {
            *slot = None;
        }
    }
}

/// The explicit, owned graphics context.
///
/// Holds the device and the process-wide bound-target cache, and records the
/// thread that owns it. Every operation that touches the cache checks the
/// calling thread; calling from any other thread is a contract violation.
#[derive(Debug)]
pub struct GpuContext {
    device: Arc<dyn GraphicsDevice>,
    bindings: BindingCache,
    owner: ThreadId,
}

impl GpuContext {
    /// Creates a context owned by the calling thread.
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        let owner = thread::current().id();
        log::debug!("GpuContext created, owned by {owner:?}");
        Self {
            device,
            bindings: BindingCache::default(),
            owner,
        }
    }

    /// The graphics device behind this context.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// The limits reported by the device.
    pub fn limits(&self) -> DeviceLimits {
        self.device.limits()
    }

    /// The bound-target cache.
    pub fn bindings(&self) -> &BindingCache {
        &self.bindings
    }

    /// The thread that owns this context.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Returns `true` if the calling thread owns this context.
    pub fn is_owner(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Makes the calling thread the owner, e.g. after moving the context to a
    /// dedicated render thread.
    pub fn adopt_current_thread(&mut self) {
        self.owner = thread::current().id();
        log::debug!("GpuContext adopted by {:?}", self.owner);
    }

    /// Fails with a contract violation when called from a non-owning thread.
    #[track_caller]
    pub fn check_owner(&self) -> Result<(), ResourceError> {
        if self.is_owner() {
            Ok(())
        } else {
            Err(ResourceError::misuse(format!(
                "GpuContext owned by {:?} used from {:?}",
                self.owner,
                thread::current().id()
            )))
        }
    }

    /// Binds `id` to `target` unless it is already current.
    ///
    /// Returns `true` if the bind reached the device.
    pub fn bind_buffer(&mut self, target: BufferTarget, id: BufferId) -> Result<bool, ResourceError> {
        self.check_owner()?;
        if self.bindings.current(target) == Some(id) {
            self.bindings.binds_skipped += 1;
            return Ok(false);
        }
        self.device.bind_buffer(target, Some(id))?;
        self.bindings.set(target, Some(id));
        self.bindings.binds_issued += 1;
        Ok(true)
    }

    /// Clears whatever buffer is bound to `target`.
    ///
    /// With `full == false` only the cache entry is cleared and the device
    /// keeps the old binding, on the assumption that another bind follows.
    /// Nothing reaches the device when the cache holds no binding for `target`.
    pub fn unbind_target(&mut self, target: BufferTarget, full: bool) -> Result<(), ResourceError> {
        self.check_owner()?;
        if self.bindings.current(target).is_none() {
            return Ok(());
        }
        if full {
            self.device.bind_buffer(target, None)?;
        }
        self.bindings.set(target, None);
        Ok(())
    }

    /// Unbinds `id` from `target` if it is current. See
    /// [`unbind_target`](Self::unbind_target) for `full`.
    pub fn unbind_buffer(
        &mut self,
        target: BufferTarget,
        id: BufferId,
        full: bool,
    ) -> Result<(), ResourceError> {
        self.check_owner()?;
        if self.bindings.current(target) != Some(id) {
            return Ok(());
        }
        if full {
            self.device.bind_buffer(target, None)?;
        }
        self.bindings.set(target, None);
        Ok(())
    }

    /// Drops every cache entry that refers to `id`. Called when a buffer is destroyed.
    pub fn forget_buffer(&mut self, id: BufferId) -> Result<(), ResourceError> {
        self.check_owner()?;
        self.bindings.forget(id);
        Ok(())
    }
}
