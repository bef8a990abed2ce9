//! Fixed-capacity quad batch storage.
//!
//! The batch owns one vertex buffer sized for `4 * max_quads` vertices and
//! one index buffer holding the `0,1,2,2,3,0` pattern for every quad. The
//! index buffer is written once at creation; each frame only the vertex
//! range the builder produced is uploaded and the submitted index count
//! varies.

use bytemuck::{Pod, Zeroable};
use sandbox_common::BatchError;
use tracing::{debug, info};
use wgpu::{util::DeviceExt, Device, Queue};

use crate::batch_builder::BatchBuilder;

/// Maximum number of quads in a batch.
pub const MAX_QUADS: usize = 1000;

/// Vertices per quad.
pub const VERTICES_PER_QUAD: usize = 4;

/// Indices per quad (two triangles).
pub const INDICES_PER_QUAD: usize = 6;

/// Maximum vertices in a batch.
pub const MAX_VERTICES: usize = MAX_QUADS * VERTICES_PER_QUAD;

/// Maximum indices in a batch.
pub const MAX_INDICES: usize = MAX_QUADS * INDICES_PER_QUAD;

/// One batch vertex.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    /// Position (z is always 0)
    pub position: [f32; 3],
    /// RGBA tint
    pub color: [f32; 4],
    /// Texture coordinate, one of the unit-square corners
    pub tex_coords: [f32; 2],
    /// Texture slot, stored as a float
    pub tex_index: f32,
}

impl QuadVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x4,
        2 => Float32x2,
        3 => Float32,
    ];

    /// Vertex buffer layout matching the struct.
    #[must_use]
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Builds the index pattern for `max_quads` quads.
#[must_use]
pub fn quad_indices(max_quads: usize) -> Vec<u32> {
    let mut indices = Vec::with_capacity(max_quads * INDICES_PER_QUAD);
    for quad in 0..max_quads as u32 {
        let base = quad * VERTICES_PER_QUAD as u32;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    indices
}

/// Fails with [`BatchError::CapacityExceeded`] when `requested` quads do
/// not fit in `capacity`.
pub const fn check_capacity(capacity: usize, requested: usize) -> Result<(), BatchError> {
    if requested > capacity {
        return Err(BatchError::CapacityExceeded {
            capacity,
            requested,
        });
    }
    Ok(())
}

/// GPU vertex and index storage for one quad batch.
///
/// Both buffers are destroyed when the batch is dropped.
pub struct QuadBatchBuffer {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    max_quads: usize,
    /// Indices to submit for the last upload
    index_count: u32,
}

impl QuadBatchBuffer {
    /// Allocates storage for `max_quads` quads.
    ///
    /// Fails if `max_quads` is larger than [`MAX_QUADS`].
    pub fn new(device: &Device, max_quads: usize) -> Result<Self, BatchError> {
        check_capacity(MAX_QUADS, max_quads)?;

        info!(
            "Creating quad batch buffer: {} quads, {} vertices, {} indices",
            max_quads,
            max_quads * VERTICES_PER_QUAD,
            max_quads * INDICES_PER_QUAD
        );

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Quad Batch Vertex Buffer"),
            size: (max_quads.max(1) * VERTICES_PER_QUAD * std::mem::size_of::<QuadVertex>())
                as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let indices = quad_indices(max_quads.max(1));
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Batch Index Buffer"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Ok(Self {
            vertex_buffer,
            index_buffer,
            max_quads,
            index_count: 0,
        })
    }

    /// Uploads the vertices the builder wrote this frame.
    ///
    /// Only the written range is transferred. Returns the index count to
    /// submit. A builder holding more quads than this batch is rejected
    /// before anything is written.
    pub fn upload(&mut self, queue: &Queue, builder: &BatchBuilder) -> Result<u32, BatchError> {
        check_capacity(self.max_quads, builder.quad_count())?;

        let bytes = builder.vertex_bytes();
        if !bytes.is_empty() {
            queue.write_buffer(&self.vertex_buffer, 0, bytes);
        }

        self.index_count = builder.index_count();
        Ok(self.index_count)
    }

    /// Binds both buffers and draws the last uploaded range.
    ///
    /// The caller binds the pipeline and its bind groups first.
    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        if self.index_count == 0 {
            return;
        }
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..self.index_count, 0, 0..1);
    }

    /// Index count from the last upload.
    #[must_use]
    pub const fn index_count(&self) -> u32 {
        self.index_count
    }
}

impl Drop for QuadBatchBuffer {
    fn drop(&mut self) {
        debug!("Releasing quad batch buffer ({} quads)", self.max_quads);
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
    }
}

impl std::fmt::Debug for QuadBatchBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuadBatchBuffer")
            .field("max_quads", &self.max_quads)
            .field("index_count", &self.index_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 40);
        assert_eq!(QuadVertex::layout().array_stride, 40);
    }

    #[test]
    fn test_vertex_attribute_offsets() {
        let offsets: Vec<u64> = QuadVertex::ATTRIBUTES.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 28, 36]);
    }

    #[test]
    fn test_max_sizes() {
        assert_eq!(MAX_VERTICES, 4000);
        assert_eq!(MAX_INDICES, 6000);
        assert_eq!(quad_indices(MAX_QUADS).len(), MAX_INDICES);
    }

    #[test]
    fn test_index_pattern() {
        assert_eq!(quad_indices(2), vec![0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]);
        assert!(quad_indices(0).is_empty());
    }

    #[test]
    fn test_check_capacity() {
        assert!(check_capacity(MAX_QUADS, 0).is_ok());
        assert!(check_capacity(MAX_QUADS, MAX_QUADS).is_ok());
        assert_eq!(
            check_capacity(MAX_QUADS, MAX_QUADS + 1),
            Err(BatchError::CapacityExceeded {
                capacity: MAX_QUADS,
                requested: MAX_QUADS + 1,
            })
        );
        assert!(check_capacity(0, 1).is_err());
    }

    #[test]
    fn test_last_quad_indices() {
        let indices = quad_indices(MAX_QUADS);
        let last = &indices[MAX_INDICES - 6..];
        assert_eq!(last, &[3996, 3997, 3998, 3998, 3999, 3996]);
    }
}
