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

use bytemuck::Zeroable;
use kiln_core::asset::{
    DecodedFont, DecodedModel, DecodedResource, DecodedSound, DecodedTexture, ResourceKind, Vertex,
};

/// Magenta, so a missing texture is obvious on screen.
const MISSING_TEXTURE_RGBA: [u8; 4] = [255, 0, 255, 255];

/// The placeholder payload served for `kind` while a resource is not usable.
///
/// - Texture: a single magenta pixel.
/// - Model: one degenerate triangle, which rasterizes to nothing.
/// - Sound: silence.
/// - Font: a 1x1 opaque atlas without glyphs.
/// - Buffer: four zero bytes.
pub fn fallback_for(kind: ResourceKind) -> DecodedResource {
    match kind {
        ResourceKind::Texture => {
            DecodedResource::Texture(DecodedTexture::solid(1, 1, MISSING_TEXTURE_RGBA))
        }
        ResourceKind::Model => DecodedResource::Model(DecodedModel {
            vertices: vec![Vertex::zeroed(); 3],
            indices: vec![0, 1, 2],
        }),
        ResourceKind::Sound => DecodedResource::Sound(DecodedSound {
            sample_rate: 44_100,
            channels: 1,
            samples: Vec::new(),
        }),
        ResourceKind::Font => DecodedResource::Font(DecodedFont {
            atlas: DecodedTexture::solid(1, 1, [255; 4]),
            glyphs: Vec::new(),
            line_height: 0.0,
        }),
        ResourceKind::Buffer => DecodedResource::Buffer(vec![0; 4]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_matches_its_kind() {
        for kind in ResourceKind::ALL {
            assert_eq!(fallback_for(kind).kind(), kind);
        }
    }

    #[test]
    fn missing_texture_is_magenta() {
        let DecodedResource::Texture(texture) = fallback_for(ResourceKind::Texture) else {
            panic!("expected a texture");
        };
        assert_eq!(texture.pixels, MISSING_TEXTURE_RGBA.to_vec());
    }
}
