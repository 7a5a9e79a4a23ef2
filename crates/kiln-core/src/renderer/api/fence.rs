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

//! Defines data structures related to GPU completion markers.

/// An opaque handle to a GPU fence (a completion marker in the command stream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FenceId(pub u64);

/// The result of waiting on a fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FenceStatus {
    /// All GPU work submitted before the fence has completed.
    Signaled,
    /// The fence did not signal within the timeout. Not an error: poll again later.
    Timeout,
    /// The device was lost; the fence will never signal.
    DeviceLost,
}

impl FenceStatus {
    /// Returns `true` if the fence has signaled.
    pub const fn is_signaled(self) -> bool {
        matches!(self, FenceStatus::Signaled)
    }
}
