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

use kiln_core::asset::{LoadError, ResourceKind};

/// A lifecycle event published by the [`ResourceAgent`](super::ResourceAgent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceEvent {
    /// A handle was promoted to loaded.
    Loaded {
        /// The resource path.
        path: String,
        /// The resource kind.
        kind: ResourceKind,
    },
    /// A load failed. The handle keeps serving its fallback.
    Failed {
        /// The resource path.
        path: String,
        /// What went wrong.
        error: LoadError,
    },
    /// A handle without holders was removed from the table.
    Evicted {
        /// The resource path.
        path: String,
    },
    /// A handle was removed from the table on request.
    Freed {
        /// The resource path.
        path: String,
    },
}

impl ResourceEvent {
    /// The path the event refers to.
    pub fn path(&self) -> &str {
        match self {
            ResourceEvent::Loaded { path, .. }
            | ResourceEvent::Failed { path, .. }
            | ResourceEvent::Evicted { path }
            | ResourceEvent::Freed { path } => path,
        }
    }
}
