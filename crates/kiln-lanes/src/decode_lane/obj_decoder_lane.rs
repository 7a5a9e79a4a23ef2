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

//! Defines a decoder lane for OBJ meshes.

use super::{DecoderLane, LaneError};
use ahash::AHashMap;
use kiln_core::asset::{DecodedModel, DecodedResource, Vertex};

/// Decodes Wavefront OBJ text into a single indexed triangle list.
///
/// Every object of the file is merged into one model. Materials are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjDecoderLane;

impl DecoderLane for ObjDecoderLane {
    fn name(&self) -> &'static str {
        "ObjDecoder"
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedResource, LaneError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| LaneError::Invalid(format!("OBJ file is not valid UTF-8: {e}")))?;

        let (models, _materials) = tobj::load_obj_buf(
            &mut std::io::Cursor::new(text),
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            |_| Ok((Vec::new(), AHashMap::new())),
        )?;

        let mut decoded = DecodedModel::default();
        for model in &models {
            let mesh = &model.mesh;
            let base = decoded.vertices.len() as u32;
            let count = mesh.positions.len() / 3;

            decoded.vertices.extend((0..count).map(|i| Vertex {
                position: [
                    mesh.positions[i * 3],
                    mesh.positions[i * 3 + 1],
                    mesh.positions[i * 3 + 2],
                ],
                normal: if mesh.normals.len() >= (i + 1) * 3 {
                    [
                        mesh.normals[i * 3],
                        mesh.normals[i * 3 + 1],
                        mesh.normals[i * 3 + 2],
                    ]
                } else {
                    [0.0; 3]
                },
                uv: if mesh.texcoords.len() >= (i + 1) * 2 {
                    [mesh.texcoords[i * 2], mesh.texcoords[i * 2 + 1]]
                } else {
                    [0.0; 2]
                },
            }));
            decoded
                .indices
                .extend(mesh.indices.iter().map(|index| base + index));
        }

        if decoded.vertices.is_empty() || decoded.indices.is_empty() {
            return Err(LaneError::Invalid("OBJ file contains no triangles".to_string()));
        }

        Ok(DecodedResource::Model(decoded))
    }
}
