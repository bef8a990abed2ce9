//! Per-particle rendering.
//!
//! Every live particle is drawn on its own: its transform and color are
//! written into one slot of a dynamic-offset uniform buffer and the shared
//! unit quad is drawn once per slot. There is no batching across particles.

use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3, Vec4};
use sandbox_common::GpuError;
use tracing::{debug, info};
use wgpu::{util::DeviceExt, Device, Queue};

use crate::camera::CameraUniform;
use crate::particles::{Particle, ParticlePool, MAX_PARTICLES};
use crate::validation::compile_shader;

/// Particle shader in WGSL.
pub const PARTICLE_SHADER: &str = r"
struct Camera {
    view_proj: mat4x4<f32>,
    transform: mat4x4<f32>,
}

struct Particle {
    transform: mat4x4<f32>,
    color: vec4<f32>,
}

@group(0) @binding(0) var<uniform> camera: Camera;
@group(1) @binding(0) var<uniform> particle: Particle;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return camera.view_proj * particle.transform * vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return particle.color;
}
";

/// Unit quad centered on the origin, side length 1.
const UNIT_QUAD: [[f32; 3]; 4] = [
    [-0.5, -0.5, 0.0],
    [0.5, -0.5, 0.0],
    [0.5, 0.5, 0.0],
    [-0.5, 0.5, 0.0],
];

const UNIT_QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Visual attributes derived from a particle's remaining life.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleVisual {
    /// Interpolated RGBA color, alpha already faded.
    pub color: Vec4,
    /// Interpolated uniform scale.
    pub size: f32,
    /// Model transform: translate, then rotate about Z, then scale.
    pub transform: Mat4,
}

impl ParticleVisual {
    /// Derives color, size and transform from a particle.
    ///
    /// With `f` the life fraction, color is `lerp(color_end, color_begin, f)`
    /// with alpha scaled by `f`, and size is `lerp(size_end, size_begin, f)`.
    /// As life runs out the particle moves away from its birth color toward
    /// its death color and fades out.
    #[must_use]
    pub fn from_particle(particle: &Particle) -> Self {
        let f = particle.life_fraction();

        let mut color = particle.color_end.lerp(particle.color_begin, f);
        color.w *= f;

        let size = particle.size_end + (particle.size_begin - particle.size_end) * f;

        let transform = Mat4::from_scale_rotation_translation(
            Vec3::new(size, size, 1.0),
            Quat::from_rotation_z(particle.rotation),
            particle.position.extend(0.0),
        );

        Self {
            color,
            size,
            transform,
        }
    }
}

/// Per-draw uniform for one particle.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ParticleUniform {
    /// Column-major model transform
    pub transform: [[f32; 4]; 4],
    /// RGBA color
    pub color: [f32; 4],
}

impl From<&ParticleVisual> for ParticleUniform {
    fn from(visual: &ParticleVisual) -> Self {
        Self {
            transform: visual.transform.to_cols_array_2d(),
            color: visual.color.to_array(),
        }
    }
}

/// Rounds `size` up to the next multiple of `alignment`.
#[must_use]
pub const fn aligned_stride(size: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return size;
    }
    size.div_ceil(alignment) * alignment
}

/// Packs one [`ParticleUniform`] per live particle into `staging`.
///
/// Slot `i` starts at byte `i * stride` and the bytes after the uniform up
/// to the next slot are zero. At most `capacity` particles are packed.
/// Returns the number of slots written.
pub fn pack_uniforms(
    pool: &ParticlePool,
    stride: usize,
    capacity: usize,
    staging: &mut Vec<u8>,
) -> u32 {
    let uniform_size = std::mem::size_of::<ParticleUniform>();
    let stride = stride.max(uniform_size);
    staging.clear();

    let mut count = 0usize;
    for particle in pool.active().take(capacity) {
        let uniform = ParticleUniform::from(&ParticleVisual::from_particle(particle));
        let start = count * stride;
        staging.resize(start + stride, 0);
        staging[start..start + uniform_size].copy_from_slice(bytemuck::bytes_of(&uniform));
        count += 1;
    }

    count as u32
}

/// Draws live particles from a [`ParticlePool`], one draw call each.
pub struct ParticleRenderer {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    particle_buffer: wgpu::Buffer,
    particle_bind_group: wgpu::BindGroup,
    /// Byte distance between particle uniform slots
    stride: u64,
    /// Number of slots in the uniform buffer
    capacity: usize,
    /// Reused CPU-side copy of the uniform buffer
    staging: Vec<u8>,
    /// Draws recorded by the last `prepare`
    draw_count: u32,
}

impl ParticleRenderer {
    /// Creates the particle pipeline for `MAX_PARTICLES` draws per frame.
    pub fn new(
        device: &Device,
        surface_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Result<Self, GpuError> {
        Self::with_capacity(device, surface_format, depth_format, MAX_PARTICLES)
    }

    /// Creates the particle pipeline with room for `capacity` draws per frame.
    pub fn with_capacity(
        device: &Device,
        surface_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
        capacity: usize,
    ) -> Result<Self, GpuError> {
        let capacity = capacity.max(1);
        let uniform_size = std::mem::size_of::<ParticleUniform>() as u64;
        let stride = aligned_stride(
            uniform_size,
            u64::from(device.limits().min_uniform_buffer_offset_alignment),
        );

        info!(
            "Creating particle renderer: {} slots, stride {} bytes",
            capacity, stride
        );

        let shader = compile_shader(device, "Particle Shader", PARTICLE_SHADER)?;

        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Camera Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let particle_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Uniform Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(uniform_size),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Pipeline Layout"),
            bind_group_layouts: &[&camera_layout, &particle_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Particle Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            // Particles overlay the batch in submission order.
            depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(&UNIT_QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Quad Index Buffer"),
            contents: bytemuck::cast_slice(&UNIT_QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Camera Buffer"),
            contents: bytemuck::bytes_of(&CameraUniform::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Camera Bind Group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let particle_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Uniform Buffer"),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let particle_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Uniform Bind Group"),
            layout: &particle_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &particle_buffer,
                    offset: 0,
                    size: NonZeroU64::new(uniform_size),
                }),
            }],
        });

        debug!(
            "Particle uniform buffer: {} bytes",
            stride * capacity as u64
        );

        Ok(Self {
            pipeline,
            vertex_buffer,
            index_buffer,
            camera_buffer,
            camera_bind_group,
            particle_buffer,
            particle_bind_group,
            stride,
            capacity,
            staging: Vec::with_capacity(stride as usize * capacity),
            draw_count: 0,
        })
    }

    /// Writes the camera and one uniform slot per live particle.
    ///
    /// Returns the number of draws the next [`draw`](Self::draw) will issue.
    pub fn prepare(&mut self, queue: &Queue, pool: &ParticlePool, view_proj: Mat4) -> u32 {
        queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::bytes_of(&CameraUniform::new(view_proj, Mat4::IDENTITY)),
        );

        self.draw_count =
            pack_uniforms(pool, self.stride as usize, self.capacity, &mut self.staging);

        if !self.staging.is_empty() {
            queue.write_buffer(&self.particle_buffer, 0, &self.staging);
        }

        self.draw_count
    }

    /// Issues one indexed draw per particle recorded by the last `prepare`.
    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        if self.draw_count == 0 {
            return;
        }

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);

        for i in 0..self.draw_count {
            let offset = (u64::from(i) * self.stride) as wgpu::DynamicOffset;
            render_pass.set_bind_group(1, &self.particle_bind_group, &[offset]);
            render_pass.draw_indexed(0..UNIT_QUAD_INDICES.len() as u32, 0, 0..1);
        }
    }
}

impl std::fmt::Debug for ParticleRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleRenderer")
            .field("capacity", &self.capacity)
            .field("stride", &self.stride)
            .field("draw_count", &self.draw_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::ParticleProps;
    use glam::{Vec2, Vec4Swizzles};

    fn particle(life_remaining: f32, lifetime: f32) -> Particle {
        Particle {
            position: Vec2::new(2.0, -3.0),
            rotation: 0.0,
            color_begin: Vec4::new(1.0, 0.0, 0.0, 1.0),
            color_end: Vec4::new(0.0, 0.0, 1.0, 1.0),
            size_begin: 0.5,
            size_end: 0.0,
            lifetime,
            life_remaining,
            active: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_uniform_size() {
        assert_eq!(std::mem::size_of::<ParticleUniform>(), 80);
    }

    #[test]
    fn test_aligned_stride() {
        assert_eq!(aligned_stride(80, 256), 256);
        assert_eq!(aligned_stride(256, 256), 256);
        assert_eq!(aligned_stride(257, 256), 512);
        assert_eq!(aligned_stride(80, 0), 80);
    }

    #[test]
    fn test_full_life_uses_begin_values() {
        let visual = ParticleVisual::from_particle(&particle(2.0, 2.0));
        assert_eq!(visual.color, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert!((visual.size - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_half_life_interpolates_and_fades() {
        let visual = ParticleVisual::from_particle(&particle(1.0, 2.0));
        assert!((visual.color.x - 0.5).abs() < 1e-6);
        assert!((visual.color.z - 0.5).abs() < 1e-6);
        assert!((visual.color.w - 0.5).abs() < 1e-6);
        assert!((visual.size - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_expired_particle_is_end_color_and_transparent() {
        let visual = ParticleVisual::from_particle(&particle(-0.1, 2.0));
        assert_eq!(visual.color.xyz(), Vec3::new(0.0, 0.0, 1.0));
        assert!(visual.color.w.abs() < f32::EPSILON);
        assert!(visual.size.abs() < f32::EPSILON);
    }

    #[test]
    fn test_zero_lifetime_is_fully_faded() {
        let visual = ParticleVisual::from_particle(&particle(0.0, 0.0));
        assert!(visual.color.w.abs() < f32::EPSILON);
    }

    #[test]
    fn test_transform_translates_rotates_scales() {
        let mut p = particle(2.0, 2.0);
        p.rotation = std::f32::consts::FRAC_PI_2;
        let visual = ParticleVisual::from_particle(&p);

        // (0.5, 0) on the unit quad: scaled to 0.25, rotated to (0, 0.25), moved by position.
        let corner = visual.transform.transform_point3(Vec3::new(0.5, 0.0, 0.0));
        assert!((corner.x - 2.0).abs() < 1e-5);
        assert!((corner.y - (-3.0 + 0.25)).abs() < 1e-5);
        assert!(corner.z.abs() < 1e-6);
    }

    #[test]
    fn test_uniform_from_visual() {
        let visual = ParticleVisual::from_particle(&particle(2.0, 2.0));
        let uniform = ParticleUniform::from(&visual);
        assert_eq!(uniform.color, [1.0, 0.0, 0.0, 1.0]);
        assert!((uniform.transform[3][0] - 2.0).abs() < f32::EPSILON);
        assert!((uniform.transform[3][1] + 3.0).abs() < f32::EPSILON);
    }

    fn live_props(lifetime: f32) -> ParticleProps {
        ParticleProps::default()
            .with_position(Vec2::new(1.0, 1.0))
            .with_lifetime(lifetime)
            .without_variation()
    }

    #[test]
    fn test_pack_skips_inactive_slots() {
        let mut pool = ParticlePool::with_seed(4, 3);
        pool.emit(&live_props(1.0)); // slot 3
        pool.emit(&live_props(0.1)); // slot 2
        pool.emit(&live_props(1.0)); // slot 1
        pool.advance(0.2);
        assert_eq!(pool.active_count(), 2);

        let stride = 256;
        let mut staging = Vec::new();
        let count = pack_uniforms(&pool, stride, 4, &mut staging);

        assert_eq!(count, 2);
        assert_eq!(staging.len(), 2 * stride);

        let size = std::mem::size_of::<ParticleUniform>();
        for (i, slot) in [1usize, 3].into_iter().enumerate() {
            let particle = pool.get(slot).expect("slot in range");
            let expected = ParticleUniform::from(&ParticleVisual::from_particle(particle));
            let start = i * stride;
            assert_eq!(&staging[start..start + size], bytemuck::bytes_of(&expected));
            assert!(staging[start + size..start + stride].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_pack_stops_at_capacity() {
        let mut pool = ParticlePool::with_seed(8, 3);
        pool.emit_many(&live_props(1.0), 8);

        let mut staging = Vec::new();
        let count = pack_uniforms(&pool, 256, 3, &mut staging);

        assert_eq!(count, 3);
        assert_eq!(staging.len(), 3 * 256);
    }

    #[test]
    fn test_pack_empty_pool() {
        let pool = ParticlePool::new(8);
        let mut staging = vec![1u8; 64];

        assert_eq!(pack_uniforms(&pool, 256, 8, &mut staging), 0);
        assert!(staging.is_empty());
    }

    #[test]
    fn test_shader_parses() {
        let module = wgpu::naga::front::wgsl::parse_str(PARTICLE_SHADER).expect("valid WGSL");
        assert!(module.entry_points.iter().any(|e| e.name == "vs_main"));
        assert!(module.entry_points.iter().any(|e| e.name == "fs_main"));
    }
}
