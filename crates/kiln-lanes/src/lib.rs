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

//! # Kiln Lanes
//!
//! The collaborators of the resource manager, split by the thread they run on.
//!
//! - [`decode_lane`]: decoders turning raw bytes into a
//!   [`DecodedResource`](kiln_core::asset::DecodedResource). They run inside
//!   worker-thread tasks and never touch a GPU handle.
//! - [`finalize_lane`]: the owning-thread step that creates
//!   [`DataBuffer`](kiln_core::renderer::DataBuffer)s and uploads the decoded
//!   data, plus the fallback objects served while a resource is not usable.
//! - [`source`]: where raw bytes come from.

#![warn(missing_docs)]

pub mod decode_lane;
pub mod finalize_lane;
pub mod source;

pub use decode_lane::{DecoderLane, DecoderRegistry, LaneError};
pub use finalize_lane::{FinalizeLane, GpuUploadLane};
pub use source::{
    write_archive, ArchiveError, ArchiveSource, DirectorySource, LayeredSource, MemorySource,
    ResourceSource,
};
