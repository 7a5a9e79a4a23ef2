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

use super::ResourceKind;
use crate::renderer::error::ResourceError;
use std::fmt;

/// The source data of a resource is missing or cannot be parsed.
///
/// Produced on a worker thread and carried to the owning thread by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No data exists at the path.
    Missing {
        /// The requested path.
        path: String,
    },
    /// The data exists but could not be read.
    Io {
        /// The requested path.
        path: String,
        /// The underlying I/O error message.
        message: String,
    },
    /// The data was read but is not valid for its kind.
    Malformed {
        /// The requested path.
        path: String,
        /// What the decoder rejected.
        message: String,
    },
    /// No decoder is registered for the kind.
    Unsupported {
        /// The requested path.
        path: String,
        /// The kind inferred from the path.
        kind: ResourceKind,
    },
}

impl DecodeError {
    /// The path the error refers to.
    pub fn path(&self) -> &str {
        match self {
            DecodeError::Missing { path }
            | DecodeError::Io { path, .. }
            | DecodeError::Malformed { path, .. }
            | DecodeError::Unsupported { path, .. } => path,
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Missing { path } => write!(f, "Resource '{path}' not found"),
            DecodeError::Io { path, message } => {
                write!(f, "Failed to read resource '{path}': {message}")
            }
            DecodeError::Malformed { path, message } => {
                write!(f, "Malformed resource '{path}': {message}")
            }
            DecodeError::Unsupported { path, kind } => {
                write!(f, "No decoder registered for {kind} resource '{path}'")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Why a resource handle ended up [`Failed`](super::LoadState::Failed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The source could not be decoded.
    Decode(DecodeError),
    /// The GPU side of the resource could not be created.
    GpuAllocation(ResourceError),
    /// The device was lost while the upload was in flight.
    DeviceLost,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Decode(e) => write!(f, "Decode error: {e}"),
            LoadError::GpuAllocation(e) => write!(f, "GPU allocation error: {e}"),
            LoadError::DeviceLost => write!(f, "The graphics device was lost during upload"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Decode(e) => Some(e),
            LoadError::GpuAllocation(e) => Some(e),
            LoadError::DeviceLost => None,
        }
    }
}

impl From<DecodeError> for LoadError {
    fn from(e: DecodeError) -> Self {
        LoadError::Decode(e)
    }
}

impl From<ResourceError> for LoadError {
    fn from(e: ResourceError) -> Self {
        match e {
            ResourceError::DeviceLost => LoadError::DeviceLost,
            other => LoadError::GpuAllocation(other),
        }
    }
}
