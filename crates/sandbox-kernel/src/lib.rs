//! # Sandbox Kernel
//!
//! Core of the rendering sandbox: a recycling particle pool drawn one
//! particle at a time, and a quad batch drawn in a single call.
//!
//! ## Particles
//!
//! [`ParticlePool`] is a fixed array plus a wrapping cursor. Emission always
//! succeeds and may overwrite a live particle. [`ParticleRenderer`] derives
//! each live particle's color, size and transform from its remaining life
//! and issues one draw call per particle.
//!
//! ## Quad batch
//!
//! [`BatchBuilder`] expands logical [`Quad`]s into four vertices each and
//! rejects frames that exceed capacity. [`QuadBatchBuffer`] holds the GPU
//! vertex storage and the precomputed index pattern, and
//! [`QuadBatchRenderer`] draws the whole batch with one indexed draw.
//!
//! ## Frame order
//!
//! [`FrameDriver::step`] runs emission, decay and the batch rebuild in that
//! order. The host then uploads and submits.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod batch;
pub mod batch_builder;
pub mod camera;
pub mod frame;
pub mod particle_render;
pub mod particles;
pub mod quad_render;
pub mod texture;
pub mod validation;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::batch::*;
    pub use crate::batch_builder::*;
    pub use crate::camera::*;
    pub use crate::frame::*;
    pub use crate::particle_render::*;
    pub use crate::particles::*;
    pub use crate::quad_render::*;
    pub use crate::texture::*;
    pub use crate::validation::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacities() {
        assert_eq!(MAX_PARTICLES, 1000);
        assert_eq!(MAX_QUADS, 1000);
        assert_eq!(MAX_TEXTURE_SLOTS, 4);
    }

    #[test]
    fn test_default_frame_driver_capacities() {
        let driver = FrameDriver::default();
        assert_eq!(driver.pool().capacity(), MAX_PARTICLES);
        assert_eq!(driver.pool().cursor(), MAX_PARTICLES - 1);
        assert_eq!(driver.builder().max_quads(), MAX_QUADS);
    }
}
