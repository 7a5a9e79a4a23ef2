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

//! Decoders: the CPU-intensive, GPU-free half of loading.
//!
//! A [`DecoderLane`] parses the bytes of one [`ResourceKind`]. The
//! [`DecoderRegistry`] picks the lane from the path's extension and converts
//! lane errors into the [`DecodeError`] taxonomy surfaced at resource handles.

mod image_decoder_lane;
mod obj_decoder_lane;
mod raw_decoder_lane;
mod wav_decoder_lane;

pub use image_decoder_lane::ImageDecoderLane;
pub use obj_decoder_lane::ObjDecoderLane;
pub use raw_decoder_lane::RawDecoderLane;
pub use wav_decoder_lane::WavDecoderLane;

use kiln_core::asset::{DecodeError, DecodedResource, ResourceKind};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// An error raised by a decoder lane.
#[derive(Debug, thiserror::Error)]
pub enum LaneError {
    /// The `image` crate rejected the data.
    #[error("image decoding failed: {0}")]
    Image(#[from] image::ImageError),
    /// The WAV reader rejected the data.
    #[error("WAV decoding failed: {0}")]
    Wav(#[from] hound::Error),
    /// The OBJ parser rejected the data.
    #[error("OBJ parsing failed: {0}")]
    Obj(#[from] tobj::LoadError),
    /// The data parsed but is not usable.
    #[error("{0}")]
    Invalid(String),
}

/// Decodes the raw bytes of one resource kind.
///
/// Runs inside worker-thread tasks: implementations must be thread-safe and
/// must not touch any GPU handle.
pub trait DecoderLane: Send + Sync {
    /// A short name for logs.
    fn name(&self) -> &'static str;

    /// Parses `bytes` into an intermediate representation.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedResource, LaneError>;
}

/// Decoder lanes keyed by the kind they produce.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    lanes: HashMap<ResourceKind, Arc<dyn DecoderLane>>,
}

impl DecoderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in lanes: image textures, OBJ models,
    /// WAV sounds and raw buffers. Fonts have no built-in decoder.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ResourceKind::Texture, ImageDecoderLane);
        registry.register(ResourceKind::Model, ObjDecoderLane);
        registry.register(ResourceKind::Sound, WavDecoderLane);
        registry.register(ResourceKind::Buffer, RawDecoderLane);
        registry
    }

    /// Registers `lane` for `kind`, replacing any previous lane.
    pub fn register<L: DecoderLane + 'static>(&mut self, kind: ResourceKind, lane: L) {
        log::debug!("Registered decoder '{}' for {kind} resources", lane.name());
        self.lanes.insert(kind, Arc::new(lane));
    }

    /// The lane registered for `kind`.
    pub fn get(&self, kind: ResourceKind) -> Option<&Arc<dyn DecoderLane>> {
        self.lanes.get(&kind)
    }

    /// Returns `true` if a lane is registered for `kind`.
    pub fn supports(&self, kind: ResourceKind) -> bool {
        self.lanes.contains_key(&kind)
    }

    /// Decodes the bytes of `path` with the lane of the path's kind.
    pub fn decode(&self, path: &str, bytes: &[u8]) -> Result<DecodedResource, DecodeError> {
        let kind = ResourceKind::from_path(path);
        let lane = self.get(kind).ok_or_else(|| DecodeError::Unsupported {
            path: path.to_string(),
            kind,
        })?;

        let decoded = lane.decode(bytes).map_err(|e| DecodeError::Malformed {
            path: path.to_string(),
            message: e.to_string(),
        })?;

        if decoded.kind() != kind {
            return Err(DecodeError::Malformed {
                path: path.to_string(),
                message: format!(
                    "decoder '{}' produced a {} for a {kind} path",
                    lane.name(),
                    decoded.kind()
                ),
            });
        }

        log::trace!(
            "Decoded '{path}' with '{}' ({} bytes)",
            lane.name(),
            decoded.byte_len()
        );
        Ok(decoded)
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.lanes.keys().collect();
        kinds.sort();
        f.debug_struct("DecoderRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}
