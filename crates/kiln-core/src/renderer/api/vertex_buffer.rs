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

//! Vertex storage described by an attribute layout.

use super::buffer::{BufferId, BufferTarget, StoragePolicy};
use super::context::GpuContext;
use super::data_buffer::DataBuffer;
use crate::renderer::error::ResourceError;
use bytemuck::Pod;

/// The scalar type of one vertex attribute component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    /// 32-bit float.
    F32,
    /// 32-bit signed integer.
    I32,
    /// 32-bit unsigned integer.
    U32,
    /// 16-bit unsigned integer.
    U16,
    /// 8-bit unsigned integer.
    U8,
}

impl ComponentType {
    /// Size of one component in bytes.
    pub const fn size(self) -> u32 {
        match self {
            ComponentType::F32 | ComponentType::I32 | ComponentType::U32 => 4,
            ComponentType::U16 => 2,
            ComponentType::U8 => 1,
        }
    }
}

/// Where one attribute sits inside a vertex and which shader input it feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader input location.
    pub location: u32,
    /// Number of components, 1 to 4.
    pub components: u8,
    /// Type of each component.
    pub component_type: ComponentType,
    /// Byte offset inside the vertex.
    pub offset: u32,
}

impl VertexAttribute {
    /// Describes `components` values of `component_type` at `offset`.
    pub const fn new(location: u32, components: u8, component_type: ComponentType, offset: u32) -> Self {
        Self {
            location,
            components,
            component_type,
            offset,
        }
    }

    /// Bytes the attribute occupies inside a vertex.
    pub const fn byte_len(&self) -> u32 {
        self.components as u32 * self.component_type.size()
    }
}

/// A [`DataBuffer`] of fixed-size vertices plus the attribute layout that
/// describes them.
///
/// Attributes are declared once with [`define_attribute`](Self::define_attribute);
/// [`activate`](Self::activate) then binds the buffer as a vertex stream with
/// that layout.
#[derive(Debug)]
pub struct VertexBuffer {
    buffer: DataBuffer,
    vertex_size: u32,
    vertex_count: u32,
    attributes: Vec<VertexAttribute>,
}

impl VertexBuffer {
    /// Allocates storage for `vertex_count` vertices of `vertex_size` bytes.
    ///
    /// # Errors
    ///
    /// [`ResourceError::InvalidDescriptor`] for a zero vertex size, plus every
    /// error of [`DataBuffer::create`].
    pub fn create(
        ctx: &GpuContext,
        vertex_count: u32,
        vertex_size: u32,
        data: Option<&[u8]>,
        policy: StoragePolicy,
    ) -> Result<Self, ResourceError> {
        if vertex_size == 0 {
            return Err(ResourceError::InvalidDescriptor(
                "vertex size must be non-zero".to_string(),
            ));
        }
        let size = u64::from(vertex_count) * u64::from(vertex_size);
        let buffer = DataBuffer::create(ctx, BufferTarget::Vertex, size, data, policy)?;
        Ok(Self {
            buffer,
            vertex_size,
            vertex_count,
            attributes: Vec::with_capacity(4),
        })
    }

    /// Uploads `vertices`, using the size of `V` as the vertex size.
    pub fn from_vertices<V: Pod>(
        ctx: &GpuContext,
        vertices: &[V],
        policy: StoragePolicy,
    ) -> Result<Self, ResourceError> {
        let count = u32::try_from(vertices.len()).map_err(|_| {
            ResourceError::InvalidDescriptor(format!("{} vertices do not fit a u32 count", vertices.len()))
        })?;
        Self::create(
            ctx,
            count,
            std::mem::size_of::<V>() as u32,
            Some(bytemuck::cast_slice(vertices)),
            policy,
        )
    }

    /// Declares one attribute of the vertex layout.
    ///
    /// # Errors
    ///
    /// * [`ResourceError::InvalidDescriptor`] if the component count is not 1
    ///   to 4 or the attribute does not fit inside the vertex.
    /// * A contract violation if `location` is already declared.
    pub fn define_attribute(&mut self, attribute: VertexAttribute) -> Result<(), ResourceError> {
        if self
            .attributes
            .iter()
            .any(|existing| existing.location == attribute.location)
        {
            return Err(ResourceError::misuse(format!(
                "vertex attribute location {} defined twice on buffer {:?}",
                attribute.location,
                self.buffer.id()
            )));
        }
        if !(1..=4).contains(&attribute.components) {
            return Err(ResourceError::InvalidDescriptor(format!(
                "vertex attribute with {} components",
                attribute.components
            )));
        }
        if u64::from(attribute.offset) + u64::from(attribute.byte_len()) > u64::from(self.vertex_size) {
            return Err(ResourceError::InvalidDescriptor(format!(
                "attribute at location {} ends past the {} byte vertex",
                attribute.location, self.vertex_size
            )));
        }
        self.attributes.push(attribute);
        Ok(())
    }

    /// Declares every attribute of `layout`, in order.
    pub fn with_layout(mut self, layout: &[VertexAttribute]) -> Result<Self, ResourceError> {
        for attribute in layout {
            self.define_attribute(*attribute)?;
        }
        Ok(self)
    }

    /// Binds the buffer as vertex stream `slot` and enables its attributes.
    ///
    /// Activating a buffer without a declared layout is a contract violation.
    pub fn activate(&self, ctx: &mut GpuContext, slot: u32) -> Result<(), ResourceError> {
        ctx.check_owner()?;
        if self.attributes.is_empty() {
            return Err(ResourceError::misuse(format!(
                "vertex buffer {:?} activated without attributes",
                self.buffer.id()
            )));
        }
        ctx.device()
            .bind_vertex_buffer(slot, self.buffer.id(), self.vertex_size, &self.attributes)
    }

    /// The declared attributes, in declaration order.
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Size of one vertex in bytes.
    pub fn vertex_size(&self) -> u32 {
        self.vertex_size
    }

    /// Number of vertices the buffer holds.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// The backing-store identifier.
    pub fn id(&self) -> BufferId {
        self.buffer.id()
    }

    /// The underlying data buffer.
    pub fn buffer(&self) -> &DataBuffer {
        &self.buffer
    }

    /// The underlying data buffer, for rewriting dynamic vertex data.
    pub fn buffer_mut(&mut self) -> &mut DataBuffer {
        &mut self.buffer
    }

    /// Drops the layout and returns the underlying data buffer.
    pub fn into_buffer(self) -> DataBuffer {
        self.buffer
    }

    /// Destroys the storage. See [`DataBuffer::destroy`].
    pub fn destroy(self, ctx: &mut GpuContext) -> Result<(), ResourceError> {
        self.buffer.destroy(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::test_device::RecordingDevice;
    use std::sync::Arc;

    fn setup() -> (Arc<RecordingDevice>, GpuContext) {
        let device = Arc::new(RecordingDevice::default());
        let ctx = GpuContext::new(device.clone());
        (device, ctx)
    }

    const POSITION: VertexAttribute = VertexAttribute::new(0, 3, ComponentType::F32, 0);
    const COLOR: VertexAttribute = VertexAttribute::new(1, 4, ComponentType::U8, 12);

    #[test]
    fn layout_is_validated_against_the_vertex_size() {
        let (_device, ctx) = setup();
        let mut buffer =
            VertexBuffer::create(&ctx, 4, 16, None, StoragePolicy::Static).unwrap();
        assert_eq!(buffer.buffer().size(), 64);

        buffer.define_attribute(POSITION).unwrap();
        buffer.define_attribute(COLOR).unwrap();
        assert_eq!(buffer.attributes(), &[POSITION, COLOR]);

        let overflowing = VertexAttribute::new(2, 2, ComponentType::F32, 12);
        assert!(matches!(
            buffer.define_attribute(overflowing),
            Err(ResourceError::InvalidDescriptor(_))
        ));
        let empty = VertexAttribute::new(3, 0, ComponentType::F32, 0);
        assert!(matches!(
            buffer.define_attribute(empty),
            Err(ResourceError::InvalidDescriptor(_))
        ));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "defined twice")]
    fn duplicate_location_is_a_contract_violation() {
        let (_device, ctx) = setup();
        let mut buffer =
            VertexBuffer::create(&ctx, 1, 16, None, StoragePolicy::Static).unwrap();
        buffer.define_attribute(POSITION).unwrap();
        let _ = buffer.define_attribute(VertexAttribute::new(0, 1, ComponentType::F32, 12));
    }

    #[test]
    fn activation_hands_the_layout_to_the_device() {
        let (device, mut ctx) = setup();
        let vertices: [[f32; 4]; 3] = [[0.0; 4], [1.0; 4], [2.0; 4]];
        let buffer = VertexBuffer::from_vertices(&ctx, &vertices, StoragePolicy::Static)
            .unwrap()
            .with_layout(&[VertexAttribute::new(0, 4, ComponentType::F32, 0)])
            .unwrap();
        assert_eq!(buffer.vertex_count(), 3);
        assert_eq!(buffer.vertex_size(), 16);

        buffer.activate(&mut ctx, 2).unwrap();
        let (id, stride, attributes) = device.vertex_stream(2).unwrap();
        assert_eq!(id, buffer.id());
        assert_eq!(stride, 16);
        assert_eq!(attributes.len(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "without attributes")]
    fn activating_without_a_layout_is_a_contract_violation() {
        let (_device, mut ctx) = setup();
        let buffer = VertexBuffer::create(&ctx, 1, 8, None, StoragePolicy::Static).unwrap();
        let _ = buffer.activate(&mut ctx, 0);
    }

    #[test]
    fn zero_vertex_size_is_rejected() {
        let (device, ctx) = setup();
        assert!(matches!(
            VertexBuffer::create(&ctx, 4, 0, None, StoragePolicy::Static),
            Err(ResourceError::InvalidDescriptor(_))
        ));
        assert_eq!(device.live_buffers(), 0);
    }
}
