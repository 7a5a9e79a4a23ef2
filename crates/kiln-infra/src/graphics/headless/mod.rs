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

//! A headless graphics device.
//!
//! Storage lives in host memory and the GPU is a counter: commands are recorded,
//! submitted by a flush and completed on request. This makes every fence
//! transition observable and controllable from a test.

mod device;

pub use self::device::{HeadlessConfig, HeadlessDevice, VertexStream};
