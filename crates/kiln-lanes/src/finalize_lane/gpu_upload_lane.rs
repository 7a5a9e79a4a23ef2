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

use super::FinalizeLane;
use kiln_core::asset::{
    DecodedResource, DecodedTexture, Font, Model, Resource, Sound, Texture, Vertex,
};
use kiln_core::renderer::{
    BufferTarget, DataBuffer, GpuContext, MapMode, ResourceError, StoragePolicy, VertexBuffer,
};

/// The default finalize lane.
///
/// Immutable data (pixels, geometry) goes into [`StoragePolicy::Static`]
/// buffers initialized at creation. Raw buffers are created
/// [`StoragePolicy::Dynamic`] so callers can rewrite them, and are filled
/// through a mapping. Sounds stay in host memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpuUploadLane;

impl GpuUploadLane {
    fn upload_texture(ctx: &GpuContext, texture: DecodedTexture) -> Result<Texture, ResourceError> {
        if !texture.is_consistent() {
            return Err(ResourceError::InvalidDescriptor(format!(
                "{} bytes of pixels for a {}x{} RGBA8 texture",
                texture.pixels.len(),
                texture.width,
                texture.height
            )));
        }
        let pixels = DataBuffer::create(
            ctx,
            BufferTarget::PixelUnpack,
            texture.pixels.len() as u64,
            Some(&texture.pixels),
            StoragePolicy::Static,
        )?;
        Ok(Texture {
            width: texture.width,
            height: texture.height,
            pixels,
        })
    }
}

impl FinalizeLane for GpuUploadLane {
    fn name(&self) -> &'static str {
        "GpuUpload"
    }

    fn finalize(&self, ctx: &GpuContext, decoded: DecodedResource) -> Result<Resource, ResourceError> {
        match decoded {
            DecodedResource::Texture(texture) => {
                Ok(Resource::Texture(Self::upload_texture(ctx, texture)?))
            }
            DecodedResource::Model(model) => {
                let vertices =
                    VertexBuffer::from_vertices(ctx, &model.vertices, StoragePolicy::Static)?
                        .with_layout(&Vertex::ATTRIBUTES)?;
                let index_bytes: &[u8] = bytemuck::cast_slice(&model.indices);
                let indices = DataBuffer::create(
                    ctx,
                    BufferTarget::Index,
                    index_bytes.len() as u64,
                    Some(index_bytes),
                    StoragePolicy::Static,
                )?;
                Ok(Resource::Model(Model {
                    vertices,
                    indices,
                    index_count: model.indices.len() as u32,
                }))
            }
            DecodedResource::Sound(sound) => Ok(Resource::Sound(Sound {
                sample_rate: sound.sample_rate,
                channels: sound.channels,
                samples: sound.samples.into(),
            })),
            DecodedResource::Font(font) => Ok(Resource::Font(Font {
                atlas: Self::upload_texture(ctx, font.atlas)?,
                glyphs: font.glyphs,
                line_height: font.line_height,
            })),
            DecodedResource::Buffer(bytes) => {
                let mut buffer = DataBuffer::create(
                    ctx,
                    BufferTarget::Storage,
                    bytes.len() as u64,
                    None,
                    StoragePolicy::Dynamic,
                )?;
                let mut range = buffer.map(0, bytes.len() as u64, MapMode::InvalidateAll)?;
                range.copy_from_slice(&bytes);
                range.unmap()?;
                Ok(Resource::Buffer(buffer))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finalize_lane::fallback_for;
    use kiln_core::asset::{DecodedSound, ResourceKind};
    use kiln_infra::{HeadlessConfig, HeadlessDevice};
    use std::sync::Arc;

    fn context(config: HeadlessConfig) -> (HeadlessDevice, GpuContext) {
        let device = HeadlessDevice::new(config);
        let ctx = GpuContext::new(Arc::new(device.clone()));
        (device, ctx)
    }

    #[test]
    fn every_fallback_finalizes() {
        let (device, ctx) = context(HeadlessConfig::default());
        let resources: Vec<Resource> = ResourceKind::ALL
            .into_iter()
            .map(|kind| {
                let resource = GpuUploadLane.finalize(&ctx, fallback_for(kind)).unwrap();
                assert_eq!(resource.kind(), kind);
                resource
            })
            .collect();
        // Models hold two buffers, sounds none.
        assert_eq!(device.buffer_count(), 5);
        drop(resources);
        assert_eq!(device.buffer_count(), 0);
    }

    #[test]
    fn texture_pixels_reach_the_device() {
        let (device, ctx) = context(HeadlessConfig::default());
        let resource = GpuUploadLane
            .finalize(
                &ctx,
                DecodedResource::Texture(DecodedTexture::solid(2, 1, [1, 2, 3, 4])),
            )
            .unwrap();
        let texture = resource.as_texture().unwrap();
        assert_eq!(
            device.buffer_contents(texture.pixels.id()).unwrap(),
            vec![1, 2, 3, 4, 1, 2, 3, 4]
        );
        assert!(device.unsubmitted_commands() > 0);
    }

    #[test]
    fn model_vertices_carry_their_layout() {
        let (device, mut ctx) = context(HeadlessConfig::default());
        let resource = GpuUploadLane
            .finalize(&ctx, fallback_for(ResourceKind::Model))
            .unwrap();
        let model = resource.as_model().unwrap();
        assert_eq!(model.vertices.vertex_size(), 32);
        assert_eq!(model.vertices.attributes(), &Vertex::ATTRIBUTES);

        model.vertices.activate(&mut ctx, 0).unwrap();
        let stream = device.vertex_stream(0).unwrap();
        assert_eq!(stream.buffer, model.vertices.id());
        assert_eq!(stream.stride, 32);
        assert_eq!(stream.attributes.len(), 3);
    }

    #[test]
    fn raw_buffer_is_written_through_a_mapping() {
        let (device, ctx) = context(HeadlessConfig {
            persistent_mapping: false,
            ..Default::default()
        });
        let resource = GpuUploadLane
            .finalize(&ctx, DecodedResource::Buffer(vec![9, 8, 7]))
            .unwrap();
        let buffer = resource.as_buffer().unwrap();
        assert!(!buffer.is_mapped());
        assert_eq!(device.live_mappings(), 0);
        assert_eq!(device.buffer_contents(buffer.id()).unwrap(), vec![9, 8, 7]);
    }

    #[test]
    fn inconsistent_texture_is_rejected() {
        let (_device, ctx) = context(HeadlessConfig::default());
        let broken = DecodedTexture {
            width: 4,
            height: 4,
            pixels: vec![0; 3],
        };
        let err = GpuUploadLane
            .finalize(&ctx, DecodedResource::Texture(broken))
            .unwrap_err();
        assert!(err.is_allocation_failure());
    }

    #[test]
    fn oversized_upload_is_an_allocation_error() {
        let (_device, ctx) = context(HeadlessConfig {
            max_buffer_size: 16,
            ..Default::default()
        });
        let err = GpuUploadLane
            .finalize(&ctx, DecodedResource::Buffer(vec![0; 64]))
            .unwrap_err();
        assert_eq!(
            err,
            ResourceError::Allocation {
                requested: 64,
                limit: 16
            }
        );
    }

    #[test]
    fn sound_stays_on_the_host() {
        let (_device, ctx) = context(HeadlessConfig::default());
        let resource = GpuUploadLane
            .finalize(
                &ctx,
                DecodedResource::Sound(DecodedSound {
                    sample_rate: 8_000,
                    channels: 2,
                    samples: vec![0.0; 16_000],
                }),
            )
            .unwrap();
        assert!(!resource.has_gpu_buffers());
        assert_eq!(resource.as_sound().unwrap().duration_secs(), 1.0);
    }
}
