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

//! Defines the error type for GPU resource operations.

use crate::renderer::api::BufferId;
use std::fmt;

/// An error related to the creation or use of a GPU resource (buffers, fences).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The device could not allocate the requested amount of memory.
    Allocation {
        /// Requested size in bytes.
        requested: u64,
        /// The device limit in bytes.
        limit: u64,
    },
    /// The descriptor is not valid (e.g. a zero-sized buffer).
    InvalidDescriptor(String),
    /// The resource does not exist (never created or already destroyed).
    NotFound,
    /// An access fell outside the bounds of the resource.
    OutOfBounds,
    /// The requested range overlaps a mapping that is still live.
    AlreadyMapped(BufferId),
    /// An unmap was requested for a buffer that has no live mapping.
    NotMapped(BufferId),
    /// A persistently mapped region is still being read by GPU work whose fence
    /// has not signaled.
    RegionInFlight(BufferId),
    /// The graphics device was lost.
    DeviceLost,
    /// A contract violation by the caller (double map, mapping a static buffer,
    /// touching owner-only state from another thread).
    Misuse(String),
    /// An error originating from the specific graphics backend implementation.
    Backend(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Allocation { requested, limit } => write!(
                f,
                "GPU allocation of {requested} bytes failed (device limit {limit} bytes)"
            ),
            ResourceError::InvalidDescriptor(msg) => write!(f, "Invalid descriptor: {msg}"),
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::OutOfBounds => write!(f, "Resource access out of bounds."),
            ResourceError::AlreadyMapped(id) => {
                write!(f, "Buffer {id:?} already has a live mapping")
            }
            ResourceError::NotMapped(id) => write!(f, "Buffer {id:?} is not mapped"),
            ResourceError::RegionInFlight(id) => write!(
                f,
                "Buffer {id:?} is still in use by GPU work that has not completed"
            ),
            ResourceError::DeviceLost => write!(f, "The graphics device was lost."),
            ResourceError::Misuse(msg) => write!(f, "Contract violation: {msg}"),
            ResourceError::Backend(msg) => write!(f, "Backend-specific resource error: {msg}"),
        }
    }
}

impl std::error::Error for ResourceError {}

impl ResourceError {
    /// Reports a contract violation.
    ///
    /// Debug builds panic with `message`; release builds log it and return
    /// [`ResourceError::Misuse`] so the caller can propagate it.
    #[track_caller]
    pub fn misuse(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("Contract violation: {message}");
        debug_assert!(false, "{message}");
        ResourceError::Misuse(message)
    }

    /// Returns `true` for errors that describe an allocation failure of a single
    /// resource rather than a broken device.
    pub fn is_allocation_failure(&self) -> bool {
        matches!(
            self,
            ResourceError::Allocation { .. } | ResourceError::InvalidDescriptor(_)
        )
    }
}
