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
use crate::renderer::{ComponentType, VertexAttribute};
use bytemuck::{Pod, Zeroable};

/// Decoded RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTexture {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Tightly packed RGBA8 rows, top to bottom.
    pub pixels: Vec<u8>,
}

impl DecodedTexture {
    /// A `width` x `height` texture filled with one RGBA color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: rgba.repeat(count),
        }
    }

    /// Returns `true` if the pixel data matches the dimensions.
    pub fn is_consistent(&self) -> bool {
        self.pixels.len() == self.width as usize * self.height as usize * 4
    }
}

/// A single mesh vertex as laid out in the vertex buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Object-space normal.
    pub normal: [f32; 3],
    /// Texture coordinates.
    pub uv: [f32; 2],
}

impl Vertex {
    /// Shader inputs fed by a [`Vertex`]: position, normal, uv.
    pub const ATTRIBUTES: [VertexAttribute; 3] = [
        VertexAttribute::new(0, 3, ComponentType::F32, 0),
        VertexAttribute::new(1, 3, ComponentType::F32, 12),
        VertexAttribute::new(2, 2, ComponentType::F32, 24),
    ];
}

/// Decoded indexed triangle geometry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedModel {
    /// Vertex data.
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`.
    pub indices: Vec<u32>,
}

/// Decoded PCM audio, interleaved.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedSound {
    /// Frames per second.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Samples normalized to `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
}

/// Placement and metrics of one glyph inside a font atlas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    /// The character the glyph renders.
    pub codepoint: char,
    /// Atlas rectangle as `[x, y, width, height]` in pixels.
    pub rect: [u32; 4],
    /// Horizontal pen advance in pixels.
    pub advance: f32,
}

/// A decoded font: a rasterized atlas and its glyph table.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFont {
    /// The glyph atlas.
    pub atlas: DecodedTexture,
    /// Glyph placements in the atlas.
    pub glyphs: Vec<Glyph>,
    /// Distance between baselines in pixels.
    pub line_height: f32,
}

/// The intermediate representation a decoder hands to the owning thread.
///
/// Holds only host memory, so it can be produced on a worker thread and sent
/// through a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedResource {
    /// See [`DecodedTexture`].
    Texture(DecodedTexture),
    /// See [`DecodedModel`].
    Model(DecodedModel),
    /// See [`DecodedSound`].
    Sound(DecodedSound),
    /// See [`DecodedFont`].
    Font(DecodedFont),
    /// Raw bytes.
    Buffer(Vec<u8>),
}

impl DecodedResource {
    /// The kind of resource this payload finalizes into.
    pub fn kind(&self) -> ResourceKind {
        match self {
            DecodedResource::Texture(_) => ResourceKind::Texture,
            DecodedResource::Model(_) => ResourceKind::Model,
            DecodedResource::Sound(_) => ResourceKind::Sound,
            DecodedResource::Font(_) => ResourceKind::Font,
            DecodedResource::Buffer(_) => ResourceKind::Buffer,
        }
    }

    /// Approximate host memory held by the payload, for logs.
    pub fn byte_len(&self) -> usize {
        match self {
            DecodedResource::Texture(t) => t.pixels.len(),
            DecodedResource::Model(m) => {
                m.vertices.len() * std::mem::size_of::<Vertex>() + m.indices.len() * 4
            }
            DecodedResource::Sound(s) => s.samples.len() * 4,
            DecodedResource::Font(f) => f.atlas.pixels.len(),
            DecodedResource::Buffer(bytes) => bytes.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_texture_is_consistent() {
        let texture = DecodedTexture::solid(2, 3, [255, 0, 255, 255]);
        assert!(texture.is_consistent());
        assert_eq!(&texture.pixels[..8], &[255, 0, 255, 255, 255, 0, 255, 255]);
    }

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        let vertex = Vertex::zeroed();
        assert_eq!(bytemuck::bytes_of(&vertex).len(), 32);

        let offsets = Vertex::ATTRIBUTES.map(|attribute| attribute.offset as usize);
        assert_eq!(
            offsets,
            [
                std::mem::offset_of!(Vertex, position),
                std::mem::offset_of!(Vertex, normal),
                std::mem::offset_of!(Vertex, uv),
            ]
        );
    }

    #[test]
    fn payload_kinds() {
        assert_eq!(
            DecodedResource::Buffer(vec![1, 2, 3]).kind(),
            ResourceKind::Buffer
        );
        assert_eq!(DecodedResource::Buffer(vec![1, 2, 3]).byte_len(), 3);
        assert_eq!(
            DecodedResource::Sound(DecodedSound::default()).kind(),
            ResourceKind::Sound
        );
    }
}
