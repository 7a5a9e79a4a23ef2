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

//! Texture decoding.

use super::{DecoderLane, LaneError};
use kiln_core::asset::{DecodedResource, DecodedTexture};

/// Decodes any format the `image` crate recognizes into RGBA8 pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoderLane;

impl DecoderLane for ImageDecoderLane {
    fn name(&self) -> &'static str {
        "ImageDecoder"
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedResource, LaneError> {
        let img = image::load_from_memory(bytes)?;

        // Convert to RGBA8 (keep in sRGB space)
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(LaneError::Invalid(format!(
                "image has an empty extent ({width}x{height})"
            )));
        }

        Ok(DecodedResource::Texture(DecodedTexture {
            width,
            height,
            pixels: rgba.into_raw(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn png_decodes_to_rgba8() {
        let bytes = png_bytes(2, 2, [10, 20, 30, 255]);
        let DecodedResource::Texture(texture) = ImageDecoderLane.decode(&bytes).unwrap() else {
            panic!("expected a texture");
        };
        assert_eq!((texture.width, texture.height), (2, 2));
        assert!(texture.is_consistent());
        assert_eq!(&texture.pixels[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn garbage_is_an_image_error() {
        assert!(matches!(
            ImageDecoderLane.decode(&[0, 1, 2, 3]),
            Err(LaneError::Image(_))
        ));
    }
}
