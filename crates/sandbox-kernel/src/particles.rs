//! Fixed-capacity particle pool with time-based decay.
//!
//! The pool is a plain array of particle records plus a cursor. Emission
//! writes into the slot under the cursor and then moves the cursor back one
//! slot, wrapping from the first slot to the last. The cursor moves whether
//! or not the slot it lands on is still alive, so a saturated pool evicts
//! particles in cursor order rather than by age.

use std::f32::consts::TAU;

use glam::{Vec2, Vec4};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Maximum number of particles in the default pool.
pub const MAX_PARTICLES: usize = 1000;

/// Angular rate (radians per second) applied to every live particle.
pub const ROTATION_RATE: f32 = 0.01;

/// Emission parameters for a single particle.
///
/// Velocity and size jitter are uniform in `±variation / 2` around the base.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleProps {
    /// Spawn position in world units.
    pub position: Vec2,
    /// Base velocity in world units per second.
    pub velocity: Vec2,
    /// Full width of the per-axis velocity jitter.
    pub velocity_variation: Vec2,
    /// Color at the start of the particle's life (RGBA, 0-1).
    pub color_begin: Vec4,
    /// Color at the end of the particle's life (RGBA, 0-1).
    pub color_end: Vec4,
    /// Base size at birth.
    pub size_begin: f32,
    /// Size at death.
    pub size_end: f32,
    /// Full width of the birth-size jitter.
    pub size_variation: f32,
    /// Lifetime in seconds.
    pub lifetime: f32,
}

impl Default for ParticleProps {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            velocity_variation: Vec2::new(3.0, 1.0),
            color_begin: Vec4::new(254.0 / 255.0, 212.0 / 255.0, 123.0 / 255.0, 1.0),
            color_end: Vec4::new(254.0 / 255.0, 109.0 / 255.0, 41.0 / 255.0, 1.0),
            size_begin: 0.5,
            size_end: 0.0,
            size_variation: 0.3,
            lifetime: 1.0,
        }
    }
}

impl ParticleProps {
    /// Sets the spawn position.
    #[must_use]
    pub const fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    /// Sets the base velocity and its jitter.
    #[must_use]
    pub const fn with_velocity(mut self, velocity: Vec2, variation: Vec2) -> Self {
        self.velocity = velocity;
        self.velocity_variation = variation;
        self
    }

    /// Sets the lifetime in seconds.
    #[must_use]
    pub const fn with_lifetime(mut self, lifetime: f32) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Sets birth and death colors.
    #[must_use]
    pub const fn with_colors(mut self, begin: Vec4, end: Vec4) -> Self {
        self.color_begin = begin;
        self.color_end = end;
        self
    }

    /// Sets birth size, death size and birth-size jitter.
    #[must_use]
    pub const fn with_size(mut self, begin: f32, end: f32, variation: f32) -> Self {
        self.size_begin = begin;
        self.size_end = end;
        self.size_variation = variation;
        self
    }

    /// Removes all random jitter (rotation is still randomized).
    #[must_use]
    pub const fn without_variation(mut self) -> Self {
        self.velocity_variation = Vec2::ZERO;
        self.size_variation = 0.0;
        self
    }
}

/// A single particle record.
///
/// Records are created inactive when the pool is built and are reused in
/// place; nothing is ever deallocated.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Particle {
    /// Position in world units.
    pub position: Vec2,
    /// Velocity in world units per second.
    pub velocity: Vec2,
    /// Rotation about the view axis, in radians.
    pub rotation: f32,
    /// Birth color.
    pub color_begin: Vec4,
    /// Death color.
    pub color_end: Vec4,
    /// Birth size (after jitter).
    pub size_begin: f32,
    /// Death size.
    pub size_end: f32,
    /// Lifetime fixed at emission.
    pub lifetime: f32,
    /// Seconds of life left; counts down.
    pub life_remaining: f32,
    /// Whether the slot holds a live particle.
    pub active: bool,
}

impl Particle {
    /// Remaining-life ratio clamped to `[0, 1]`.
    ///
    /// A particle emitted with a non-positive lifetime reports `0.0`.
    #[must_use]
    pub fn life_fraction(&self) -> f32 {
        if self.lifetime <= 0.0 {
            return 0.0;
        }
        (self.life_remaining / self.lifetime).clamp(0.0, 1.0)
    }
}

/// Emission counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total emissions since creation (or the last clear).
    pub emitted: u64,
    /// Emissions that overwrote a still-active particle.
    pub evicted: u64,
}

/// Fixed-capacity ring of particles.
pub struct ParticlePool {
    /// Particle storage, never resized.
    particles: Vec<Particle>,
    /// Next slot to write.
    cursor: usize,
    /// Source of emission jitter.
    rng: fastrand::Rng,
    /// Emission counters.
    stats: PoolStats,
}

impl Default for ParticlePool {
    fn default() -> Self {
        Self::new(MAX_PARTICLES)
    }
}

impl ParticlePool {
    /// Creates a pool with `capacity` inactive slots (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, fastrand::Rng::new())
    }

    /// Creates a pool whose jitter is reproducible from `seed`.
    #[must_use]
    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(capacity: usize, rng: fastrand::Rng) -> Self {
        let capacity = capacity.max(1);
        debug!("Creating particle pool with {} slots", capacity);
        Self {
            particles: vec![Particle::default(); capacity],
            cursor: capacity - 1,
            rng,
            stats: PoolStats::default(),
        }
    }

    /// Emits one particle into the slot under the cursor and returns that slot.
    ///
    /// Always succeeds. A live particle in the slot is overwritten.
    pub fn emit(&mut self, props: &ParticleProps) -> usize {
        let slot = self.cursor;
        let particle = &mut self.particles[slot];

        if particle.active {
            self.stats.evicted += 1;
        }

        particle.active = true;
        particle.position = props.position;
        particle.rotation = self.rng.f32() * TAU;

        particle.velocity = props.velocity;
        particle.velocity.x += props.velocity_variation.x * (self.rng.f32() - 0.5);
        particle.velocity.y += props.velocity_variation.y * (self.rng.f32() - 0.5);

        particle.color_begin = props.color_begin;
        particle.color_end = props.color_end;

        particle.lifetime = props.lifetime;
        particle.life_remaining = props.lifetime;
        particle.size_begin = props.size_begin + props.size_variation * (self.rng.f32() - 0.5);
        particle.size_end = props.size_end;

        self.cursor = if slot == 0 {
            self.particles.len() - 1
        } else {
            slot - 1
        };
        self.stats.emitted += 1;

        slot
    }

    /// Emits `count` particles with the same props.
    pub fn emit_many(&mut self, props: &ParticleProps, count: usize) {
        for _ in 0..count {
            self.emit(props);
        }
    }

    /// Advances every live particle by `dt` seconds.
    ///
    /// A particle whose remaining life reaches zero is deactivated on the
    /// step that crosses the threshold and is not integrated on that step.
    pub fn advance(&mut self, dt: f32) {
        let dt = dt.max(0.0);

        for particle in &mut self.particles {
            if !particle.active {
                continue;
            }

            if particle.life_remaining <= 0.0 {
                particle.active = false;
                continue;
            }

            particle.life_remaining -= dt;
            if particle.life_remaining <= 0.0 {
                particle.active = false;
                continue;
            }

            particle.position += particle.velocity * dt;
            particle.rotation += ROTATION_RATE * dt;
        }
    }

    /// Deactivates every particle and resets the cursor and counters.
    pub fn clear(&mut self) {
        self.particles.fill(Particle::default());
        self.cursor = self.particles.len() - 1;
        self.stats = PoolStats::default();
    }

    /// Returns the number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.particles.len()
    }

    /// Returns the slot the next emission will write.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns the particle in `slot`, if in range.
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&Particle> {
        self.particles.get(slot)
    }

    /// Returns all slots, live or not.
    #[must_use]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Iterates over live particles in slot order.
    pub fn active(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter().filter(|p| p.active)
    }

    /// Returns the number of live particles.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Returns emission counters.
    #[must_use]
    pub const fn stats(&self) -> PoolStats {
        self.stats
    }
}

impl std::fmt::Debug for ParticlePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticlePool")
            .field("capacity", &self.particles.len())
            .field("cursor", &self.cursor)
            .field("active", &self.active_count())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
