//! Quads drawn by the batch each frame.
//!
//! A tinted background grid plus one quad the user moves with the arrow
//! keys. The grid is built once; the per-frame list is grid then user quad.

use glam::{Vec2, Vec4};
use sandbox_kernel::Quad;

/// Tint at the grid's bottom-left corner.
const GRID_TINT_START: Vec4 = Vec4::new(0.18, 0.6, 0.96, 1.0);

/// Tint at the grid's top-right corner.
const GRID_TINT_END: Vec4 = Vec4::new(1.0, 0.93, 0.24, 1.0);

/// Share of the grid spacing each quad covers.
const GRID_FILL: f32 = 0.8;

/// Builds a `columns` x `rows` grid centered on the origin.
///
/// Tints blend from blue to yellow along the diagonal. Texture slots
/// alternate 0 and 1 in a checker pattern.
#[must_use]
pub fn quad_grid(columns: u32, rows: u32, spacing: f32) -> Vec<Quad> {
    let size = spacing * GRID_FILL;
    let extent = Vec2::new(
        columns.saturating_sub(1) as f32,
        rows.saturating_sub(1) as f32,
    ) * spacing;
    let origin = -extent * 0.5 - Vec2::splat(size * 0.5);
    let steps = (columns + rows).saturating_sub(2).max(1) as f32;

    let mut quads = Vec::with_capacity((columns * rows) as usize);
    for y in 0..rows {
        for x in 0..columns {
            let t = (x + y) as f32 / steps;
            let position = origin + Vec2::new(x as f32, y as f32) * spacing;
            quads.push(
                Quad::new(position, GRID_TINT_START.lerp(GRID_TINT_END, t), (x + y) % 2)
                    .with_size(Vec2::splat(size)),
            );
        }
    }
    quads
}

/// The batch's quad list for a frame.
#[derive(Debug, Clone)]
pub struct Scene {
    grid: Vec<Quad>,
    user_quad: Quad,
    quads: Vec<Quad>,
}

impl Scene {
    /// Creates a scene from a prebuilt grid and the user quad's anchor.
    #[must_use]
    pub fn new(grid: Vec<Quad>, user_position: Vec2) -> Self {
        let quads = Vec::with_capacity(grid.len() + 1);
        Self {
            grid,
            user_quad: Quad::new(user_position, Vec4::ONE, 1),
            quads,
        }
    }

    /// Moves the user quad by `direction * speed * dt`.
    pub fn move_user_quad(&mut self, direction: Vec2, speed: f32, dt: f32) {
        self.user_quad.position += direction * speed * dt;
    }

    /// Places the user quad's bottom-left corner.
    pub fn set_user_position(&mut self, position: Vec2) {
        self.user_quad.position = position;
    }

    /// The user quad's bottom-left corner.
    #[must_use]
    pub const fn user_position(&self) -> Vec2 {
        self.user_quad.position
    }

    /// Grid quads followed by the user quad.
    pub fn quads(&mut self) -> &[Quad] {
        self.quads.clear();
        self.quads.extend_from_slice(&self.grid);
        self.quads.push(self.user_quad);
        &self.quads
    }

    /// Quads [`Self::quads`] returns.
    #[must_use]
    pub fn quad_count(&self) -> usize {
        self.grid.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_dimensions_and_centering() {
        let grid = quad_grid(3, 2, 1.0);
        assert_eq!(grid.len(), 6);

        let min = grid.iter().map(|q| q.position).fold(Vec2::MAX, Vec2::min);
        let max = grid
            .iter()
            .map(|q| q.position + q.size)
            .fold(Vec2::MIN, Vec2::max);
        assert!((min + max).length() < 1e-5);
    }

    #[test]
    fn test_grid_tints_and_slots() {
        let grid = quad_grid(2, 2, 1.0);
        assert_eq!(grid[0].color, GRID_TINT_START);
        assert!(grid[3].color.abs_diff_eq(GRID_TINT_END, 1e-6));
        assert_eq!(grid[0].texture_slot, 0);
        assert_eq!(grid[1].texture_slot, 1);
        assert_eq!(grid[2].texture_slot, 1);
        assert_eq!(grid[3].texture_slot, 0);
    }

    #[test]
    fn test_single_cell_grid() {
        let grid = quad_grid(1, 1, 0.25);
        assert_eq!(grid.len(), 1);
        assert_eq!(grid[0].color, GRID_TINT_START);
        assert!((grid[0].position - Vec2::splat(-0.1)).length() < 1e-6);
    }

    #[test]
    fn test_empty_grid() {
        assert!(quad_grid(0, 5, 1.0).is_empty());
    }

    #[test]
    fn test_user_quad_is_last() {
        let mut scene = Scene::new(quad_grid(2, 2, 1.0), Vec2::new(-1.5, -0.5));
        assert_eq!(scene.quad_count(), 5);

        let quads = scene.quads();
        assert_eq!(quads.len(), 5);
        let user = quads[4];
        assert_eq!(user.position, Vec2::new(-1.5, -0.5));
        assert_eq!(user.texture_slot, 1);
        assert_eq!(user.size, Vec2::ONE);
    }

    #[test]
    fn test_move_user_quad() {
        let mut scene = Scene::new(Vec::new(), Vec2::ZERO);
        scene.move_user_quad(Vec2::new(1.0, -1.0), 2.0, 0.5);
        assert_eq!(scene.user_position(), Vec2::new(1.0, -1.0));

        // Rebuilding does not accumulate quads
        assert_eq!(scene.quads().len(), 1);
        assert_eq!(scene.quads().len(), 1);
    }
}
