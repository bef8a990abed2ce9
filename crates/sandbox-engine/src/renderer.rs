//! GPU renderer using wgpu.
//!
//! Owns the surface, device and depth target, and draws one frame as a
//! single scene pass (quad batch, then particles) followed by the egui
//! overlay pass.

use std::sync::Arc;

use anyhow::{Context, Result};
use glam::Mat4;
use tracing::{info, warn};
use winit::{dpi::PhysicalSize, window::Window};

use sandbox_kernel::{
    create_validated_instance, request_device, FrameDriver, GpuTexture, ParticleRenderer,
    QuadBatchRenderer, DEPTH_FORMAT, MAX_QUADS,
};

use crate::config::SandboxConfig;
use crate::ui::EguiIntegration;

/// Which layers to draw this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderLayers {
    /// Draw the quad batch
    pub batch: bool,
    /// Draw the particles
    pub particles: bool,
}

/// Main renderer that manages GPU resources and rendering.
pub struct Renderer {
    /// wgpu surface for presenting to the window
    surface: wgpu::Surface<'static>,
    /// wgpu device for GPU operations
    device: wgpu::Device,
    /// wgpu queue for submitting commands
    queue: wgpu::Queue,
    /// Surface configuration
    config: wgpu::SurfaceConfiguration,
    /// Current surface size
    size: PhysicalSize<u32>,
    /// Depth target shared by both scene layers
    depth_view: wgpu::TextureView,
    /// Background color
    clear_color: wgpu::Color,
    /// Quad batch pipeline and buffers
    quads: QuadBatchRenderer,
    /// Particle pipeline and uniforms
    particles: ParticleRenderer,
    /// Egui overlay
    egui: EguiIntegration,
    /// Frame counter
    frame_count: u64,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("size", &self.size)
            .field("format", &self.config.format)
            .field("frame_count", &self.frame_count)
            .finish_non_exhaustive()
    }
}

impl Renderer {
    /// Creates a new renderer for the given window.
    ///
    /// Fails if no adapter or device is available, a shader does not
    /// validate, or a configured texture cannot be loaded.
    pub async fn new(window: Arc<Window>, sandbox: &SandboxConfig) -> Result<Self> {
        let size = window.inner_size();

        let instance = create_validated_instance(sandbox.gpu_validation);

        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("Failed to create window surface")?;

        let (adapter, device, queue) = request_device(&instance, &surface).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("Surface reports no supported formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if sandbox.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_view = create_depth_view(&device, config.width, config.height);

        info!("Loading {} batch textures...", sandbox.batch.textures.len());
        let textures = sandbox
            .batch
            .textures
            .iter()
            .map(|path| GpuTexture::load(&device, &queue, path))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load batch texture")?;

        info!("Initializing quad batch pipeline...");
        let quads = QuadBatchRenderer::new(&device, &queue, surface_format, MAX_QUADS, textures)
            .context("Failed to create quad batch renderer")?;

        info!("Initializing particle pipeline...");
        let particles = ParticleRenderer::new(&device, surface_format, Some(DEPTH_FORMAT))
            .context("Failed to create particle renderer")?;

        let egui = EguiIntegration::new(&device, surface_format, &window);

        let [r, g, b] = sandbox.clear_color.map(f64::from);

        info!("Renderer initialized successfully");

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            depth_view,
            clear_color: wgpu::Color { r, g, b, a: 1.0 },
            quads,
            particles,
            egui,
            frame_count: 0,
        })
    }

    /// Resizes the surface and depth target. Zero sizes are ignored.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, new_size.width, new_size.height);
        }
    }

    /// Uploads this frame's particles and quads, draws them, then the UI.
    ///
    /// A lost or outdated surface is reconfigured and the frame skipped.
    pub fn render(
        &mut self,
        view_proj: Mat4,
        driver: &FrameDriver,
        layers: RenderLayers,
        ui: Option<egui::FullOutput>,
    ) -> Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("Surface lost, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            },
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("Surface timed out, skipping frame");
                return Ok(());
            },
            Err(e) => return Err(e).context("Failed to get surface texture"),
        };

        if layers.batch {
            self.quads
                .prepare(&self.queue, driver.builder(), view_proj)
                .context("Failed to upload quad batch")?;
        }
        if layers.particles {
            self.particles.prepare(&self.queue, driver.pool(), view_proj);
        }

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if layers.batch {
                self.quads.draw(&mut render_pass);
            }
            if layers.particles {
                self.particles.draw(&mut render_pass);
            }
        }

        let mut extra = Vec::new();
        if let Some(ui) = ui {
            let screen = self
                .egui
                .screen_descriptor(self.config.width, self.config.height);
            let (paint_jobs, buffers) =
                self.egui
                    .prepare(&self.device, &self.queue, &mut encoder, &screen, ui);
            extra = buffers;

            let mut render_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("UI Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();
            self.egui.render(&mut render_pass, &paint_jobs, &screen);
        }

        self.queue
            .submit(extra.into_iter().chain(std::iter::once(encoder.finish())));
        output.present();

        self.frame_count += 1;

        Ok(())
    }

    /// The egui overlay.
    pub fn egui_mut(&mut self) -> &mut EguiIntegration {
        &mut self.egui
    }

    /// Current surface size.
    #[must_use]
    pub const fn size(&self) -> PhysicalSize<u32> {
        self.size
    }
}

/// Creates a depth target matching the surface size.
fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
