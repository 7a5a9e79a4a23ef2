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

//! Defines data structures related to GPU buffer resources.

use crate::kiln_bitflags;
use std::borrow::Cow;

/// An opaque handle to a GPU buffer resource.
///
/// This ID is returned by [`GraphicsDevice::create_buffer`](crate::renderer::GraphicsDevice::create_buffer)
/// and is used to reference the buffer in all subsequent operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub usize);

/// The binding class a buffer is attached to.
///
/// Each target has exactly one "currently bound" buffer at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Per-vertex attribute data.
    Vertex,
    /// Index data for indexed draws.
    Index,
    /// Uniform (constant) data.
    Uniform,
    /// Shader storage data.
    Storage,
    /// Source of pixel uploads into textures.
    PixelUnpack,
    /// Source of buffer-to-buffer copies.
    CopySource,
    /// Destination of buffer-to-buffer copies.
    CopyDestination,
}

impl BufferTarget {
    /// Every binding target, in a stable order.
    pub const ALL: [BufferTarget; 7] = [
        BufferTarget::Vertex,
        BufferTarget::Index,
        BufferTarget::Uniform,
        BufferTarget::Storage,
        BufferTarget::PixelUnpack,
        BufferTarget::CopySource,
        BufferTarget::CopyDestination,
    ];

    /// A dense index usable for per-target tables.
    pub const fn index(self) -> usize {
        match self {
            BufferTarget::Vertex => 0,
            BufferTarget::Index => 1,
            BufferTarget::Uniform => 2,
            BufferTarget::Storage => 3,
            BufferTarget::PixelUnpack => 4,
            BufferTarget::CopySource => 5,
            BufferTarget::CopyDestination => 6,
        }
    }
}

/// How often the contents of a buffer are expected to change.
///
/// The policy decides where the driver places the memory and whether the
/// buffer may be mapped after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoragePolicy {
    /// Written once at creation, never mapped again.
    Static,
    /// Rewritten occasionally. Persistently mapped when the device supports it.
    Dynamic,
    /// Rewritten every frame. Persistently mapped when the device supports it.
    Stream,
}

impl StoragePolicy {
    /// Returns `true` if buffers of this policy may be mapped after creation.
    pub const fn is_mappable(self) -> bool {
        !matches!(self, StoragePolicy::Static)
    }
}

/// The synchronization behaviour requested when mapping a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapMode {
    /// The prior contents of the range are irrelevant to the caller. Safe for
    /// whole-range overwrites.
    InvalidateAll,
    /// Skip any implicit wait for the GPU. Only correct when the caller has
    /// fenced prior GPU reads of the same region itself.
    Unsynchronized,
}

kiln_bitflags! {
    /// Low-level flags passed to the device when mapping a buffer range.
    pub struct MapFlags: u32 {
        /// The mapping is written by the host.
        const WRITE = 1 << 0;
        /// The previous contents of the buffer may be discarded.
        const INVALIDATE_BUFFER = 1 << 1;
        /// The device must not wait for pending GPU work on the buffer.
        const UNSYNCHRONIZED = 1 << 2;
        /// The mapping stays valid while the GPU uses the buffer.
        const PERSISTENT = 1 << 3;
    }
}

impl MapFlags {
    /// Translates a [`MapMode`] into device flags for a transient write mapping.
    pub fn for_mode(mode: MapMode) -> Self {
        match mode {
            MapMode::InvalidateAll => MapFlags::WRITE | MapFlags::INVALIDATE_BUFFER,
            MapMode::Unsynchronized => MapFlags::WRITE | MapFlags::UNSYNCHRONIZED,
        }
    }
}

/// A descriptor used to create a [`BufferId`].
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label for the buffer.
    pub label: Option<Cow<'a, str>>,
    /// The total size of the buffer in bytes.
    pub size: u64,
    /// The binding class the buffer is created for.
    pub target: BufferTarget,
    /// The storage policy of the buffer.
    pub policy: StoragePolicy,
}

/// Capabilities and limits reported by a graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Largest buffer the device can allocate, in bytes.
    pub max_buffer_size: u64,
    /// Whether buffers can stay mapped while the GPU uses them.
    pub persistent_mapping: bool,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_buffer_size: 256 * 1024 * 1024,
            persistent_mapping: true,
        }
    }
}
