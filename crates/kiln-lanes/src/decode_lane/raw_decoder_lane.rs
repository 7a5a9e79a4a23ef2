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

use super::{DecoderLane, LaneError};
use kiln_core::asset::DecodedResource;

/// Passes bytes through unchanged. Empty files are rejected since a GPU buffer
/// cannot be zero-sized.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDecoderLane;

impl DecoderLane for RawDecoderLane {
    fn name(&self) -> &'static str {
        "RawDecoder"
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedResource, LaneError> {
        if bytes.is_empty() {
            return Err(LaneError::Invalid("raw buffer is empty".to_string()));
        }
        Ok(DecodedResource::Buffer(bytes.to_vec()))
    }
}
