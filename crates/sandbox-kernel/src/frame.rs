//! CPU side of one sandbox frame.
//!
//! Each step runs, in order: emission, a full pool decay pass, and the
//! batch rebuild. GPU submission happens afterwards in the host renderer,
//! which reads the pool and builder this driver owns.

use glam::Vec2;
use sandbox_common::BatchError;
use tracing::warn;

use crate::batch::MAX_QUADS;
use crate::batch_builder::{BatchBuilder, Quad};
use crate::particles::{ParticlePool, ParticleProps, MAX_PARTICLES};

/// Inputs gathered by the host for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    /// Where to emit this frame, in world units, if at all.
    pub emit_at: Option<Vec2>,
    /// Emissions per frame while `emit_at` is set.
    pub emit_count: usize,
    /// Emission parameters; `position` is replaced by `emit_at`.
    pub props: &'a ParticleProps,
    /// Quads to draw this frame.
    pub quads: &'a [Quad],
}

/// What one step produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameSummary {
    /// Particles emitted this step.
    pub emitted: usize,
    /// Live particles after decay.
    pub active_particles: usize,
    /// Quads written to the batch.
    pub quad_count: usize,
    /// Indices the batch draw will submit.
    pub index_count: u32,
}

/// Owns the particle pool and batch builder and steps them once per frame.
#[derive(Debug)]
pub struct FrameDriver {
    pool: ParticlePool,
    builder: BatchBuilder,
    frame: u64,
}

impl Default for FrameDriver {
    fn default() -> Self {
        Self::new(ParticlePool::new(MAX_PARTICLES), BatchBuilder::new(MAX_QUADS))
    }
}

impl FrameDriver {
    /// Creates a driver around an existing pool and builder.
    #[must_use]
    pub const fn new(pool: ParticlePool, builder: BatchBuilder) -> Self {
        Self {
            pool,
            builder,
            frame: 0,
        }
    }

    /// Runs one frame: emit, advance by `dt`, rebuild the batch.
    ///
    /// Emission and decay are applied even when the batch rebuild fails;
    /// the error then marks the frame as not submittable.
    pub fn step(&mut self, dt: f32, input: &FrameInput<'_>) -> Result<FrameSummary, BatchError> {
        self.frame += 1;

        let mut emitted = 0;
        if let Some(position) = input.emit_at {
            let props = input.props.with_position(position);
            for _ in 0..input.emit_count {
                self.pool.emit(&props);
            }
            emitted = input.emit_count;
        }

        self.pool.advance(dt);

        if let Err(e) = self.builder.build(input.quads) {
            warn!("Frame {}: batch rebuild failed: {e}", self.frame);
            return Err(e);
        }

        Ok(FrameSummary {
            emitted,
            active_particles: self.pool.active_count(),
            quad_count: self.builder.quad_count(),
            index_count: self.builder.index_count(),
        })
    }

    /// The particle pool.
    #[must_use]
    pub const fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    /// The batch builder holding this frame's vertices.
    #[must_use]
    pub const fn builder(&self) -> &BatchBuilder {
        &self.builder
    }

    /// Frames stepped so far.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn props() -> ParticleProps {
        ParticleProps::default().with_lifetime(1.0).without_variation()
    }

    #[test]
    fn test_step_emits_then_decays() {
        let mut driver = FrameDriver::new(ParticlePool::with_seed(16, 1), BatchBuilder::new(8));
        let props = props();
        let quads = [Quad::new(Vec2::ZERO, Vec4::ONE, 0)];

        let summary = driver
            .step(
                0.25,
                &FrameInput {
                    emit_at: Some(Vec2::new(3.0, 4.0)),
                    emit_count: 5,
                    props: &props,
                    quads: &quads,
                },
            )
            .expect("frame fits");

        assert_eq!(summary.emitted, 5);
        assert_eq!(summary.active_particles, 5);
        assert_eq!(summary.quad_count, 1);
        assert_eq!(summary.index_count, 6);

        let particle = driver.pool().active().next().expect("live particle");
        assert_eq!(particle.position, Vec2::new(3.0, 4.0));
        assert!((particle.life_remaining - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_no_emission_without_position() {
        let mut driver = FrameDriver::new(ParticlePool::with_seed(4, 1), BatchBuilder::new(4));
        let props = props();
        let summary = driver
            .step(
                0.016,
                &FrameInput {
                    emit_at: None,
                    emit_count: 5,
                    props: &props,
                    quads: &[],
                },
            )
            .expect("empty frame");
        assert_eq!(summary, FrameSummary::default());
        assert_eq!(driver.frame(), 1);
    }

    #[test]
    fn test_overflowing_batch_fails_frame() {
        let mut driver = FrameDriver::new(ParticlePool::with_seed(4, 1), BatchBuilder::new(1));
        let props = props();
        let quads = [Quad::new(Vec2::ZERO, Vec4::ONE, 0); 2];
        let result = driver.step(
            0.016,
            &FrameInput {
                emit_at: Some(Vec2::ZERO),
                emit_count: 1,
                props: &props,
                quads: &quads,
            },
        );
        assert!(matches!(result, Err(BatchError::CapacityExceeded { .. })));
        assert_eq!(driver.pool().active_count(), 1);
        assert_eq!(driver.builder().quad_count(), 0);
    }

    #[test]
    fn test_particles_expire_across_frames() {
        let mut driver = FrameDriver::new(ParticlePool::with_seed(4, 1), BatchBuilder::new(4));
        let props = props();
        let mut input = FrameInput {
            emit_at: Some(Vec2::ZERO),
            emit_count: 1,
            props: &props,
            quads: &[],
        };
        driver.step(0.5, &input).expect("frame");

        input.emit_at = None;
        let summary = driver.step(0.6, &input).expect("frame");
        assert_eq!(summary.active_particles, 0);
    }
}
