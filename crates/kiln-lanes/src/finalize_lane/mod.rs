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

//! The owning-thread half of loading: turning decoded data into GPU-backed
//! resources.

mod fallback;
mod gpu_upload_lane;

pub use fallback::fallback_for;
pub use gpu_upload_lane::GpuUploadLane;

use kiln_core::asset::{DecodedResource, Resource};
use kiln_core::renderer::{GpuContext, ResourceError};

/// Builds a finalized [`Resource`] from a decoded payload.
///
/// Called on the thread that owns the [`GpuContext`]. Implementations create
/// [`DataBuffer`](kiln_core::renderer::DataBuffer)s and map, write and unmap
/// them as needed. They do not wait for the GPU: the caller fences the
/// upload afterwards.
pub trait FinalizeLane {
    /// A short name for logs.
    fn name(&self) -> &'static str;

    /// Uploads `decoded` and returns the finished resource.
    fn finalize(&self, ctx: &GpuContext, decoded: DecodedResource) -> Result<Resource, ResourceError>;
}
