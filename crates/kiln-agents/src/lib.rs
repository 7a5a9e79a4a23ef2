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

//! # Kiln Agents
//!
//! The resource manager of the loading pipeline. It composes the primitives of
//! `kiln-core` with the decode and finalize lanes of `kiln-lanes`.

#![warn(missing_docs)]

pub mod config;
pub mod resource_agent;

pub use config::load_config;
pub use resource_agent::{
    ResetPhase, ResetToken, ResourceAgent, ResourceEvent, ResourcePointer, WorkerMode,
};
