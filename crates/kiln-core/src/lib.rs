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

//! # Kiln Core
//!
//! Foundational crate containing the primitives, traits, and core types of the
//! asynchronous resource loading pipeline.
//!
//! - [`sync`]: the spinlock used for the short critical sections shared between
//!   loader threads and the owning thread.
//! - [`worker`]: background worker threads that step loading tasks.
//! - [`renderer`]: the graphics-device contract, sync fences, data buffers and
//!   the owned GPU context with its bound-target cache.
//! - [`asset`]: resource kinds, load states, decoded payloads and finalized
//!   resource objects.
//! - [`config`]: the loader configuration.
//! - [`event`]: a generic event bus used to report resource lifecycle events.

#![warn(missing_docs)]

pub mod asset;
pub mod config;
pub mod event;
pub mod renderer;
pub mod sync;
pub mod utils;
pub mod worker;

pub use config::LoaderConfig;
pub use renderer::{GpuContext, GraphicsDevice};
