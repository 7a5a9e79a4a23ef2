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

use super::{Glyph, ResourceKind};
use crate::renderer::{DataBuffer, GpuContext, ResourceError, VertexBuffer};
use std::sync::Arc;

/// A texture whose pixels live in a GPU buffer.
#[derive(Debug)]
pub struct Texture {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// RGBA8 pixel storage.
    pub pixels: DataBuffer,
}

/// Indexed geometry in GPU buffers.
#[derive(Debug)]
pub struct Model {
    /// Vertex storage with the [`Vertex`](super::Vertex) layout.
    pub vertices: VertexBuffer,
    /// Index storage (`u32` indices).
    pub indices: DataBuffer,
    /// Number of indices to draw.
    pub index_count: u32,
}

/// PCM audio. Audio is played from host memory, so no GPU buffer is involved.
#[derive(Debug, Clone)]
pub struct Sound {
    /// Frames per second.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Interleaved samples.
    pub samples: Arc<[f32]>,
}

impl Sound {
    /// Duration in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / (self.sample_rate as f32 * self.channels as f32)
    }
}

/// A font atlas texture and its glyph table.
#[derive(Debug)]
pub struct Font {
    /// The glyph atlas.
    pub atlas: Texture,
    /// Glyph placements in the atlas.
    pub glyphs: Vec<Glyph>,
    /// Distance between baselines in pixels.
    pub line_height: f32,
}

impl Font {
    /// Looks up the glyph of a character.
    pub fn glyph(&self, codepoint: char) -> Option<&Glyph> {
        self.glyphs.iter().find(|g| g.codepoint == codepoint)
    }
}

/// A finalized resource object, built on the owning thread.
///
/// Holds [`DataBuffer`]s and is therefore confined to the owning thread.
#[derive(Debug)]
pub enum Resource {
    /// See [`Texture`].
    Texture(Texture),
    /// See [`Model`].
    Model(Model),
    /// See [`Sound`].
    Sound(Sound),
    /// See [`Font`].
    Font(Font),
    /// Raw bytes in a GPU buffer.
    Buffer(DataBuffer),
}

impl Resource {
    /// The kind of this resource.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Texture(_) => ResourceKind::Texture,
            Resource::Model(_) => ResourceKind::Model,
            Resource::Sound(_) => ResourceKind::Sound,
            Resource::Font(_) => ResourceKind::Font,
            Resource::Buffer(_) => ResourceKind::Buffer,
        }
    }

    /// The GPU buffers backing this resource.
    pub fn buffers(&self) -> Vec<&DataBuffer> {
        match self {
            Resource::Texture(t) => vec![&t.pixels],
            Resource::Model(m) => vec![m.vertices.buffer(), &m.indices],
            Resource::Sound(_) => Vec::new(),
            Resource::Font(f) => vec![&f.atlas.pixels],
            Resource::Buffer(b) => vec![b],
        }
    }

    /// Returns `true` if finalizing this resource issued GPU work.
    pub fn has_gpu_buffers(&self) -> bool {
        !matches!(self, Resource::Sound(_))
    }

    /// Total GPU memory held, in bytes.
    pub fn gpu_bytes(&self) -> u64 {
        self.buffers().iter().map(|b| b.size()).sum()
    }

    /// Returns the texture, if this is one.
    pub fn as_texture(&self) -> Option<&Texture> {
        match self {
            Resource::Texture(t) => Some(t),
            _ => None,
        }
    }

    /// Returns the model, if this is one.
    pub fn as_model(&self) -> Option<&Model> {
        match self {
            Resource::Model(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the sound, if this is one.
    pub fn as_sound(&self) -> Option<&Sound> {
        match self {
            Resource::Sound(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the font, if this is one.
    pub fn as_font(&self) -> Option<&Font> {
        match self {
            Resource::Font(f) => Some(f),
            _ => None,
        }
    }

    /// Returns the raw buffer, if this is one.
    pub fn as_buffer(&self) -> Option<&DataBuffer> {
        match self {
            Resource::Buffer(b) => Some(b),
            _ => None,
        }
    }

    /// Destroys every GPU buffer of the resource.
    ///
    /// All buffers are destroyed even if one fails; the first error is returned.
    pub fn destroy(self, ctx: &mut GpuContext) -> Result<(), ResourceError> {
        let buffers = match self {
            Resource::Texture(t) => vec![t.pixels],
            Resource::Model(m) => vec![m.vertices.into_buffer(), m.indices],
            Resource::Sound(_) => Vec::new(),
            Resource::Font(f) => vec![f.atlas.pixels],
            Resource::Buffer(b) => vec![b],
        };
        let mut result = Ok(());
        for buffer in buffers {
            if let Err(e) = buffer.destroy(ctx) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}
