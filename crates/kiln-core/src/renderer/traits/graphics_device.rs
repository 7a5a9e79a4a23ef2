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

//! The contract between the loading pipeline and a concrete graphics backend.

use crate::renderer::api::*;
use crate::renderer::error::ResourceError;
use std::fmt::Debug;
use std::ptr::NonNull;

/// The operations the loading pipeline issues against a graphics API.
///
/// Only buffer storage, mapping, binding and fences are covered: everything the
/// pipeline needs to upload decoded data and to learn when the GPU consumed it.
/// A backend in `kiln-infra` implements this trait; the rest of the workspace
/// only ever sees `Arc<dyn GraphicsDevice>`.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Returns the capabilities and limits of the device.
    fn limits(&self) -> DeviceLimits;

    /// Allocates a new GPU buffer.
    /// ## Arguments
    /// * `descriptor` - The size, target and storage policy of the buffer.
    /// * `initial_data` - Optional bytes copied to the start of the buffer.
    /// ## Returns
    /// The ID of the created buffer.
    /// ## Errors
    /// * `ResourceError::Allocation` - If the size exceeds the device limit.
    /// * `ResourceError::InvalidDescriptor` - If the size is zero or the initial
    ///   data does not fit.
    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        initial_data: Option<&[u8]>,
    ) -> Result<BufferId, ResourceError>;

    /// Releases a GPU buffer and any mapping it still has.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Maps `len` bytes of a buffer starting at `offset` into host memory.
    ///
    /// The returned pointer is valid for `len` bytes until [`unmap_buffer`] is
    /// called for the same buffer. With [`MapFlags::PERSISTENT`] it stays valid
    /// until the buffer is destroyed.
    ///
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the range does not fit in the buffer.
    /// * `ResourceError::AlreadyMapped` - If the buffer already has a live mapping.
    ///
    /// [`unmap_buffer`]: GraphicsDevice::unmap_buffer
    fn map_buffer(
        &self,
        id: BufferId,
        offset: u64,
        len: u64,
        flags: MapFlags,
    ) -> Result<NonNull<u8>, ResourceError>;

    /// Releases the live mapping of a buffer.
    fn unmap_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Copies bytes out of a buffer. Used for readback and verification.
    fn read_buffer(&self, id: BufferId, offset: u64, out: &mut [u8]) -> Result<(), ResourceError>;

    /// Records a command that fills the whole buffer with zeros.
    fn clear_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Tells the driver the buffer's contents are no longer needed.
    ///
    /// GPU work already recorded keeps reading the old contents; the host may
    /// rewrite the storage right away.
    fn invalidate_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Binds `id` to `target`, or clears the binding with `None`.
    fn bind_buffer(&self, target: BufferTarget, id: Option<BufferId>) -> Result<(), ResourceError>;

    /// Binds `id` as vertex stream `slot` with the given stride and enables
    /// the attributes it feeds.
    fn bind_vertex_buffer(
        &self,
        slot: u32,
        id: BufferId,
        stride: u32,
        attributes: &[VertexAttribute],
    ) -> Result<(), ResourceError>;

    /// Inserts a completion marker right after the most recently recorded command.
    fn insert_fence(&self) -> Result<FenceId, ResourceError>;

    /// Waits up to `timeout_ns` for a fence to signal.
    ///
    /// With `flush` set the pending command stream is submitted before waiting,
    /// otherwise a fence whose commands were never submitted cannot signal.
    fn client_wait_fence(&self, fence: FenceId, timeout_ns: u64, flush: bool) -> FenceStatus;

    /// Releases a fence. Unknown fences are ignored.
    fn delete_fence(&self, fence: FenceId);

    /// Submits every recorded command to the GPU.
    fn flush(&self);
}
