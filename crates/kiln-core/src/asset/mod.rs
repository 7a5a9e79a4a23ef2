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

//! Provides the resource vocabulary shared by decoders, finalizers and the
//! resource manager.
//!
//! The key components are:
//! - [`ResourceKind`] and [`LoadState`]: what a resource is and where it stands
//!   in its load lifecycle.
//! - [`DecodedResource`]: the intermediate representation produced off-thread by
//!   a decoder. It never holds GPU handles and can cross threads.
//! - [`Resource`]: the finalized object built on the owning thread, backed by
//!   [`DataBuffer`](crate::renderer::DataBuffer)s where the kind needs GPU memory.
//! - [`DecodeError`] and [`LoadError`]: the failure taxonomy surfaced at a handle.
//!
//! The set of kinds is closed, so payloads are tagged enum variants rather than
//! trait objects.

mod decoded;
mod error;
mod kind;
mod resource;

pub use decoded::*;
pub use error::*;
pub use kind::*;
pub use resource::*;
