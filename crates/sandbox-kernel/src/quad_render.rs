//! Batched quad render pipeline.
//!
//! All quads of a frame share one vertex buffer and are drawn with a single
//! indexed draw. Each vertex carries the texture slot it samples; the
//! fragment stage samples every slot and keeps the one the vertex asked
//! for, so sampling stays in uniform control flow.

use glam::Mat4;
use sandbox_common::{AssetError, BatchError, SandboxResult};
use tracing::info;
use wgpu::{util::DeviceExt, Device, Queue};

use crate::batch::{QuadBatchBuffer, QuadVertex};
use crate::batch_builder::{BatchBuilder, MAX_TEXTURE_SLOTS};
use crate::camera::CameraUniform;
use crate::texture::GpuTexture;
use crate::validation::compile_shader;

/// Depth format shared by the batch and particle pipelines.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Quad batch shader in WGSL.
pub const QUAD_SHADER: &str = r"
struct Camera {
    view_proj: mat4x4<f32>,
    transform: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> camera: Camera;
@group(0) @binding(1) var texture_0: texture_2d<f32>;
@group(0) @binding(2) var texture_1: texture_2d<f32>;
@group(0) @binding(3) var texture_2: texture_2d<f32>;
@group(0) @binding(4) var texture_3: texture_2d<f32>;
@group(0) @binding(5) var quad_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
    @location(2) tex_coords: vec2<f32>,
    @location(3) tex_index: f32,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) tex_coords: vec2<f32>,
    @location(2) @interpolate(flat) tex_index: u32,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var output: VertexOutput;
    output.clip_position = camera.view_proj * camera.transform * vec4<f32>(input.position, 1.0);
    output.color = input.color;
    // Quad UVs have v pointing up; texture rows start at the top.
    output.tex_coords = vec2<f32>(input.tex_coords.x, 1.0 - input.tex_coords.y);
    output.tex_index = u32(input.tex_index + 0.5);
    return output;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let s0 = textureSample(texture_0, quad_sampler, input.tex_coords);
    let s1 = textureSample(texture_1, quad_sampler, input.tex_coords);
    let s2 = textureSample(texture_2, quad_sampler, input.tex_coords);
    let s3 = textureSample(texture_3, quad_sampler, input.tex_coords);

    var texel = s0;
    switch input.tex_index {
        case 1u: { texel = s1; }
        case 2u: { texel = s2; }
        case 3u: { texel = s3; }
        default: {}
    }

    return texel * input.color;
}
";

/// Renders one [`QuadBatchBuffer`] per frame with up to four texture slots.
pub struct QuadBatchRenderer {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    camera_buffer: wgpu::Buffer,
    /// One texture per slot; unset slots hold generated fallbacks.
    /// Held so the bound textures outlive the bind group.
    textures: Vec<GpuTexture>,
    batch: QuadBatchBuffer,
}

impl QuadBatchRenderer {
    /// Creates the pipeline and a batch of `max_quads` quads.
    ///
    /// `textures` fill slots from 0 upward; remaining slots get a white
    /// texture, except slot 1 which gets a checkerboard.
    pub fn new(
        device: &Device,
        queue: &Queue,
        surface_format: wgpu::TextureFormat,
        max_quads: usize,
        textures: Vec<GpuTexture>,
    ) -> SandboxResult<Self> {
        let slots = MAX_TEXTURE_SLOTS as usize;
        if textures.len() > slots {
            return Err(AssetError::TooManyTextures {
                count: textures.len(),
                max: slots,
            }
            .into());
        }

        info!(
            "Creating quad batch renderer: {} quads, {} user textures",
            max_quads,
            textures.len()
        );

        let shader = compile_shader(device, "Quad Batch Shader", QUAD_SHADER)?;
        let batch = QuadBatchBuffer::new(device, max_quads)?;

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Quad Batch Bind Group Layout"),
            entries: &[
                // camera - uniform buffer
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                texture_entry(4),
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Quad Batch Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Quad Batch Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[QuadVertex::layout()],
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
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
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

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Batch Camera Buffer"),
            contents: bytemuck::bytes_of(&CameraUniform::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Quad Batch Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let mut textures = textures;
        while textures.len() < slots {
            let fallback = if textures.len() == 1 {
                GpuTexture::checkerboard(device, queue)
            } else {
                GpuTexture::white(device, queue)
            };
            textures.push(fallback);
        }

        let bind_group =
            Self::create_bind_group(device, &bind_group_layout, &camera_buffer, &textures, &sampler);

        info!("Quad batch renderer created successfully");

        Ok(Self {
            pipeline,
            bind_group,
            camera_buffer,
            textures,
            batch,
        })
    }

    fn create_bind_group(
        device: &Device,
        layout: &wgpu::BindGroupLayout,
        camera_buffer: &wgpu::Buffer,
        textures: &[GpuTexture],
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Quad Batch Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(textures[0].view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(textures[1].view()),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(textures[2].view()),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(textures[3].view()),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    /// Writes the camera and uploads this frame's vertices.
    ///
    /// Returns the index count the draw will submit.
    pub fn prepare(
        &mut self,
        queue: &Queue,
        builder: &BatchBuilder,
        view_proj: Mat4,
    ) -> Result<u32, BatchError> {
        queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::bytes_of(&CameraUniform::new(view_proj, Mat4::IDENTITY)),
        );
        self.batch.upload(queue, builder)
    }

    /// Draws the whole batch with one indexed draw.
    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        if self.batch.index_count() == 0 {
            return;
        }
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        self.batch.draw(render_pass);
    }
}

impl std::fmt::Debug for QuadBatchRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuadBatchRenderer")
            .field("batch", &self.batch)
            .field("textures", &self.textures)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_parses_and_validates() {
        let module = wgpu::naga::front::wgsl::parse_str(QUAD_SHADER).expect("valid WGSL");
        let mut validator = wgpu::naga::valid::Validator::new(
            wgpu::naga::valid::ValidationFlags::all(),
            wgpu::naga::valid::Capabilities::empty(),
        );
        assert!(validator.validate(&module).is_ok());
    }

    #[test]
    fn test_shader_binds_every_slot() {
        for slot in 0..MAX_TEXTURE_SLOTS {
            assert!(QUAD_SHADER.contains(&format!("texture_{slot}: texture_2d<f32>")));
        }
    }
}
