//! CPU-side quad expansion for the batch renderer.
//!
//! Each frame the builder is reset and refilled from a list of logical
//! quads. Every quad becomes four vertices written contiguously from the
//! start of the staging area in the order bottom-left, bottom-right,
//! top-right, top-left.

use glam::{Vec2, Vec4};
use sandbox_common::BatchError;

use crate::batch::{check_capacity, QuadVertex, INDICES_PER_QUAD, MAX_QUADS, VERTICES_PER_QUAD};

/// Number of texture slots a quad can select from.
pub const MAX_TEXTURE_SLOTS: u32 = 4;

/// Unit-square texture coordinates in corner order.
const CORNER_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

/// A quad requested for this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    /// Bottom-left corner in world units.
    pub position: Vec2,
    /// Width and height.
    pub size: Vec2,
    /// RGBA tint multiplied with the sampled texel.
    pub color: Vec4,
    /// Texture slot to sample.
    pub texture_slot: u32,
}

impl Quad {
    /// Creates a unit quad anchored at `position`.
    #[must_use]
    pub const fn new(position: Vec2, color: Vec4, texture_slot: u32) -> Self {
        Self {
            position,
            size: Vec2::ONE,
            color,
            texture_slot,
        }
    }

    /// Sets the quad size.
    #[must_use]
    pub const fn with_size(mut self, size: Vec2) -> Self {
        self.size = size;
        self
    }

    /// Expands the quad into its four vertices.
    #[must_use]
    pub fn vertices(&self) -> [QuadVertex; 4] {
        let Vec2 { x, y } = self.position;
        let Vec2 { x: w, y: h } = self.size;
        let corners = [[x, y], [x + w, y], [x + w, y + h], [x, y + h]];
        let color = self.color.to_array();
        let tex_index = self.texture_slot as f32;

        std::array::from_fn(|i| QuadVertex {
            position: [corners[i][0], corners[i][1], 0.0],
            color,
            tex_coords: CORNER_UVS[i],
            tex_index,
        })
    }
}

/// Per-frame staging area for quad vertices.
#[derive(Debug, Clone)]
pub struct BatchBuilder {
    vertices: Vec<QuadVertex>,
    max_quads: usize,
}

impl Default for BatchBuilder {
    fn default() -> Self {
        Self::new(MAX_QUADS)
    }
}

impl BatchBuilder {
    /// Creates a builder that holds at most `max_quads` quads.
    #[must_use]
    pub fn new(max_quads: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(max_quads * VERTICES_PER_QUAD),
            max_quads,
        }
    }

    /// Starts a new frame; previously written quads are discarded.
    pub fn begin(&mut self) {
        self.vertices.clear();
    }

    /// Appends one quad.
    ///
    /// Fails without writing anything when the builder is full or the quad
    /// names a texture slot that does not exist.
    pub fn push(&mut self, quad: &Quad) -> Result<(), BatchError> {
        if quad.texture_slot >= MAX_TEXTURE_SLOTS {
            return Err(BatchError::InvalidTextureSlot {
                slot: quad.texture_slot,
                max: MAX_TEXTURE_SLOTS,
            });
        }
        check_capacity(self.max_quads, self.quad_count() + 1)?;
        self.vertices.extend_from_slice(&quad.vertices());
        Ok(())
    }

    /// Resets and writes `quads` in order.
    ///
    /// The whole list is checked before anything is written, so a rejected
    /// frame leaves the builder empty rather than partially filled.
    pub fn build(&mut self, quads: &[Quad]) -> Result<(), BatchError> {
        self.begin();

        check_capacity(self.max_quads, quads.len())?;
        if let Some(bad) = quads.iter().find(|q| q.texture_slot >= MAX_TEXTURE_SLOTS) {
            return Err(BatchError::InvalidTextureSlot {
                slot: bad.texture_slot,
                max: MAX_TEXTURE_SLOTS,
            });
        }

        for quad in quads {
            self.vertices.extend_from_slice(&quad.vertices());
        }
        Ok(())
    }

    /// Vertices written this frame.
    #[must_use]
    pub fn vertices(&self) -> &[QuadVertex] {
        &self.vertices
    }

    /// Vertices written this frame as raw bytes.
    #[must_use]
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Quads written this frame.
    #[must_use]
    pub fn quad_count(&self) -> usize {
        self.vertices.len() / VERTICES_PER_QUAD
    }

    /// Indices to submit for the quads written this frame.
    #[must_use]
    pub fn index_count(&self) -> u32 {
        (self.quad_count() * INDICES_PER_QUAD) as u32
    }

    /// Maximum quads per frame.
    #[must_use]
    pub const fn max_quads(&self) -> usize {
        self.max_quads
    }

    /// Returns true when no more quads fit.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.quad_count() >= self.max_quads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::quad_indices;
    use proptest::prelude::*;

    fn white_quad(x: f32, y: f32, slot: u32) -> Quad {
        Quad::new(Vec2::new(x, y), Vec4::ONE, slot)
    }

    #[test]
    fn test_corner_order() {
        let vertices = white_quad(1.0, 2.0, 0).vertices();
        assert_eq!(vertices[0].position, [1.0, 2.0, 0.0]);
        assert_eq!(vertices[1].position, [2.0, 2.0, 0.0]);
        assert_eq!(vertices[2].position, [2.0, 3.0, 0.0]);
        assert_eq!(vertices[3].position, [1.0, 3.0, 0.0]);
        assert_eq!(vertices[0].tex_coords, [0.0, 0.0]);
        assert_eq!(vertices[2].tex_coords, [1.0, 1.0]);
    }

    #[test]
    fn test_quad_size() {
        let quad = white_quad(0.0, 0.0, 0).with_size(Vec2::new(2.0, 0.5));
        let vertices = quad.vertices();
        assert_eq!(vertices[2].position, [2.0, 0.5, 0.0]);
    }

    #[test]
    fn test_two_quad_scenario() {
        let mut builder = BatchBuilder::new(MAX_QUADS);
        builder
            .build(&[white_quad(0.0, 0.0, 0), white_quad(1.0, 0.0, 1)])
            .expect("two quads fit");

        let vertices = builder.vertices();
        assert_eq!(vertices.len(), 8);
        for v in &vertices[0..4] {
            assert!((0.0..=1.0).contains(&v.position[0]));
            assert!(v.tex_index.abs() < f32::EPSILON);
        }
        for v in &vertices[4..8] {
            assert!((1.0..=2.0).contains(&v.position[0]));
            assert!((v.tex_index - 1.0).abs() < f32::EPSILON);
        }

        let count = builder.index_count() as usize;
        assert_eq!(count, 12);
        assert_eq!(
            &quad_indices(MAX_QUADS)[..count],
            &[0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]
        );
    }

    #[test]
    fn test_exact_capacity_accepted() {
        let mut builder = BatchBuilder::new(3);
        let quads = vec![white_quad(0.0, 0.0, 0); 3];
        assert!(builder.build(&quads).is_ok());
        assert_eq!(builder.quad_count(), 3);
        assert!(builder.is_full());
    }

    #[test]
    fn test_over_capacity_rejected_without_partial_write() {
        let mut builder = BatchBuilder::new(3);
        let quads = vec![white_quad(0.0, 0.0, 0); 4];
        assert_eq!(
            builder.build(&quads),
            Err(BatchError::CapacityExceeded {
                capacity: 3,
                requested: 4
            })
        );
        assert_eq!(builder.quad_count(), 0);
        assert_eq!(builder.index_count(), 0);
    }

    #[test]
    fn test_push_past_capacity_fails() {
        let mut builder = BatchBuilder::new(1);
        builder.begin();
        assert!(builder.push(&white_quad(0.0, 0.0, 0)).is_ok());
        assert_eq!(
            builder.push(&white_quad(1.0, 0.0, 0)),
            Err(BatchError::CapacityExceeded {
                capacity: 1,
                requested: 2
            })
        );
        assert_eq!(builder.quad_count(), 1);
    }

    #[test]
    fn test_invalid_texture_slot() {
        let mut builder = BatchBuilder::new(4);
        let err = builder
            .build(&[white_quad(0.0, 0.0, 0), white_quad(0.0, 0.0, MAX_TEXTURE_SLOTS)])
            .expect_err("slot out of range");
        assert_eq!(
            err,
            BatchError::InvalidTextureSlot {
                slot: MAX_TEXTURE_SLOTS,
                max: MAX_TEXTURE_SLOTS
            }
        );
        assert_eq!(builder.quad_count(), 0);
    }

    #[test]
    fn test_begin_resets() {
        let mut builder = BatchBuilder::new(4);
        builder.build(&[white_quad(0.0, 0.0, 0)]).expect("fits");
        builder.begin();
        assert!(builder.vertices().is_empty());
        assert!(builder.vertex_bytes().is_empty());
    }

    #[test]
    fn test_vertex_bytes_cover_written_range() {
        let mut builder = BatchBuilder::new(10);
        builder
            .build(&[white_quad(0.0, 0.0, 0), white_quad(1.0, 1.0, 2)])
            .expect("fits");
        assert_eq!(
            builder.vertex_bytes().len(),
            2 * VERTICES_PER_QUAD * std::mem::size_of::<QuadVertex>()
        );
    }

    proptest! {
        #[test]
        fn prop_counts_follow_quads(n in 0usize..=MAX_QUADS) {
            let mut builder = BatchBuilder::new(MAX_QUADS);
            let quads: Vec<Quad> = (0..n)
                .map(|i| white_quad(i as f32, 0.0, (i % MAX_TEXTURE_SLOTS as usize) as u32))
                .collect();
            prop_assert!(builder.build(&quads).is_ok());
            prop_assert_eq!(builder.vertices().len(), 4 * n);
            prop_assert_eq!(builder.index_count() as usize, 6 * n);
        }

        #[test]
        fn prop_overflow_always_rejected(capacity in 0usize..64, extra in 1usize..16) {
            let mut builder = BatchBuilder::new(capacity);
            let quads = vec![white_quad(0.0, 0.0, 0); capacity + extra];
            prop_assert!(builder.build(&quads).is_err());
            prop_assert_eq!(builder.quad_count(), 0);
        }
    }
}
