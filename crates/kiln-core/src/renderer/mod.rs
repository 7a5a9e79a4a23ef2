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

//! Provides the backend-agnostic GPU contracts of the loading pipeline.
//!
//! This module defines the "common language" between the owning thread and the
//! graphics API: the [`GraphicsDevice`] trait, the owned [`GpuContext`] with its
//! bound-target cache, and the [`SyncFence`] and [`DataBuffer`] wrappers built on
//! top of them. A concrete backend (for instance the headless device in
//! `kiln-infra`) implements the trait; lanes and agents only use the wrappers.

pub mod api;
pub mod error;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_device;

pub use self::api::*;
pub use self::error::ResourceError;
pub use self::traits::GraphicsDevice;
