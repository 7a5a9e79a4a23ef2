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

//! A RAII wrapper around a single outstanding GPU completion marker.

use super::fence::{FenceId, FenceStatus};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GraphicsDevice;
use std::fmt;
use std::sync::Arc;

/// Answers one question: "has this batch of GPU work finished?".
///
/// A `SyncFence` holds at most one outstanding fence. [`create`](Self::create)
/// inserts a marker after the most recently recorded command,
/// [`check`](Self::check) polls it and [`delete`](Self::delete) releases it.
/// The fence is released automatically when the wrapper is dropped.
///
/// Separating "was the work issued" from "did it finish" lets the owning
/// thread keep rendering while an upload is in flight and poll cheaply with a
/// zero timeout instead of blocking.
pub struct SyncFence {
    device: Arc<dyn GraphicsDevice>,
    fence: Option<FenceId>,
}

impl SyncFence {
    /// Creates an empty wrapper with no outstanding fence.
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self {
            device,
            fence: None,
        }
    }

    /// Inserts a new fence.
    ///
    /// Returns `false` without side effects if a fence is already outstanding,
    /// or if the device refused to insert one.
    pub fn create(&mut self) -> bool {
        match self.try_create() {
            Ok(created) => created,
            Err(e) => {
                log::warn!("Failed to insert fence: {e}");
                false
            }
        }
    }

    /// Like [`create`](Self::create), but surfaces device errors.
    ///
    /// Returns `Ok(false)` if a fence is already outstanding.
    pub fn try_create(&mut self) -> Result<bool, ResourceError> {
        if self.fence.is_some() {
            log::trace!("SyncFence::create ignored: a fence is already outstanding");
            return Ok(false);
        }
        self.fence = Some(self.device.insert_fence()?);
        Ok(true)
    }

    /// Polls the outstanding fence.
    ///
    /// Waits at most `timeout_ns`. With `flush` set the command stream is
    /// submitted first, which is required when nothing else ever flushes it.
    /// A wrapper without an outstanding fence reports [`FenceStatus::Signaled`].
    pub fn check(&self, timeout_ns: u64, flush: bool) -> FenceStatus {
        match self.fence {
            Some(fence) => self.device.client_wait_fence(fence, timeout_ns, flush),
            None => FenceStatus::Signaled,
        }
    }

    /// Releases the outstanding fence, if any.
    pub fn delete(&mut self) {
        if let Some(fence) = self.fence.take() {
            self.device.delete_fence(fence);
        }
    }

    /// Returns `true` if a fence is outstanding.
    pub fn is_pending(&self) -> bool {
        self.fence.is_some()
    }

    /// The outstanding fence, if any.
    pub fn id(&self) -> Option<FenceId> {
        self.fence
    }
}

impl fmt::Debug for SyncFence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncFence")
            .field("fence", &self.fence)
            .finish_non_exhaustive()
    }
}

impl Drop for SyncFence {
    fn drop(&mut self) {
        self.delete();
    }
}
