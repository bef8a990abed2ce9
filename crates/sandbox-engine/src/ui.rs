//! Egui overlay: integration plumbing and the settings panel.

use egui::{Context, FullOutput, ViewportId};
use glam::{Vec2, Vec4};

use sandbox_kernel::ParticleProps;

/// Egui integration for wgpu and winit.
pub struct EguiIntegration {
    /// The egui context.
    context: Context,
    /// Egui-winit state for event handling.
    state: egui_winit::State,
    /// Egui-wgpu renderer.
    renderer: egui_wgpu::Renderer,
}

impl std::fmt::Debug for EguiIntegration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EguiIntegration").finish_non_exhaustive()
    }
}

impl EguiIntegration {
    /// Create a new egui integration drawing into `output_format` targets.
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        output_format: wgpu::TextureFormat,
        window: &winit::window::Window,
    ) -> Self {
        let context = Context::default();
        context.set_pixels_per_point(window.scale_factor() as f32);

        let state = egui_winit::State::new(
            context.clone(),
            ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let renderer = egui_wgpu::Renderer::new(device, output_format, None, 1, false);

        Self {
            context,
            state,
            renderer,
        }
    }

    /// Handle a winit window event.
    ///
    /// Returns `true` if egui consumed the event.
    pub fn handle_event(
        &mut self,
        window: &winit::window::Window,
        event: &winit::event::WindowEvent,
    ) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    /// Begin a new frame.
    pub fn begin_frame(&mut self, window: &winit::window::Window) {
        let raw_input = self.state.take_egui_input(window);
        self.context.begin_pass(raw_input);
    }

    /// End the current frame and get the output.
    pub fn end_frame(&mut self, window: &winit::window::Window) -> FullOutput {
        let output = self.context.end_pass();
        self.state
            .handle_platform_output(window, output.platform_output.clone());
        output
    }

    /// Uploads textures and vertex data for `output`.
    ///
    /// Returns the paint jobs and any command buffers egui recorded, which
    /// must be submitted before the encoder that renders the jobs.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
        output: FullOutput,
    ) -> (Vec<egui::ClippedPrimitive>, Vec<wgpu::CommandBuffer>) {
        for (id, image_delta) in &output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }

        let paint_jobs = self
            .context
            .tessellate(output.shapes, output.pixels_per_point);

        let extra = self.renderer.update_buffers(
            device,
            queue,
            encoder,
            &paint_jobs,
            screen_descriptor,
        );

        for id in &output.textures_delta.free {
            self.renderer.free_texture(id);
        }

        (paint_jobs, extra)
    }

    /// Render egui to an existing render pass.
    ///
    /// The pass must be `'static`; use `RenderPass::forget_lifetime`.
    pub fn render(
        &self,
        render_pass: &mut wgpu::RenderPass<'static>,
        paint_jobs: &[egui::ClippedPrimitive],
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
    ) {
        self.renderer
            .render(render_pass, paint_jobs, screen_descriptor);
    }

    /// Get the egui context for UI code.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Create a screen descriptor from framebuffer dimensions.
    #[must_use]
    pub fn screen_descriptor(&self, width: u32, height: u32) -> egui_wgpu::ScreenDescriptor {
        egui_wgpu::ScreenDescriptor {
            size_in_pixels: [width, height],
            pixels_per_point: self.context.pixels_per_point(),
        }
    }
}

/// Read-only numbers shown in the settings panel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PanelStats {
    /// Averaged frames per second
    pub fps: f32,
    /// Live particles
    pub active_particles: usize,
    /// Pool slots
    pub pool_capacity: usize,
    /// Live particles overwritten by emission since startup
    pub evicted: u64,
    /// Quads in the last batch
    pub quads: usize,
    /// Zoom level
    pub zoom: f32,
}

/// Values the settings panel edits in place.
#[derive(Debug)]
pub struct PanelState<'a> {
    /// Emitter parameters
    pub emitter: &'a mut ParticleProps,
    /// Emissions per frame while the mouse is held
    pub emit_per_frame: &'a mut u32,
    /// User quad anchor
    pub quad_position: &'a mut Vec2,
    /// Particle drawing toggle
    pub particles_enabled: &'a mut bool,
    /// Batch drawing toggle
    pub batch_enabled: &'a mut bool,
}

fn color_edit(ui: &mut egui::Ui, label: &str, color: &mut Vec4) -> bool {
    let mut rgba = color.to_array();
    let changed = ui
        .horizontal(|ui| {
            let changed = ui.color_edit_button_rgba_unmultiplied(&mut rgba).changed();
            ui.label(label);
            changed
        })
        .inner;
    if changed {
        *color = Vec4::from_array(rgba);
    }
    changed
}

/// Draws the "Settings" window. Returns true if any value changed.
pub fn settings_panel(ctx: &Context, state: &mut PanelState<'_>, stats: &PanelStats) -> bool {
    let mut changed = false;

    egui::Window::new("Settings")
        .default_pos([10.0, 10.0])
        .resizable(false)
        .show(ctx, |ui| {
            ui.heading("Particles");
            changed |= ui.checkbox(&mut *state.particles_enabled, "Enabled").changed();
            changed |= color_edit(ui, "Birth Color", &mut state.emitter.color_begin);
            changed |= color_edit(ui, "Death Color", &mut state.emitter.color_end);
            changed |= ui
                .add(
                    egui::DragValue::new(&mut state.emitter.lifetime)
                        .speed(0.1)
                        .range(0.0..=1000.0)
                        .prefix("Life Time: "),
                )
                .changed();
            changed |= ui
                .add(
                    egui::Slider::new(&mut state.emitter.size_begin, 0.0..=2.0)
                        .text("Birth Size"),
                )
                .changed();
            changed |= ui
                .add(egui::Slider::new(&mut state.emitter.size_end, 0.0..=2.0).text("Death Size"))
                .changed();
            changed |= ui
                .add(
                    egui::Slider::new(&mut state.emitter.size_variation, 0.0..=1.0)
                        .text("Size Variation"),
                )
                .changed();
            ui.horizontal(|ui| {
                ui.label("Velocity Variation");
                changed |= ui
                    .add(egui::DragValue::new(&mut state.emitter.velocity_variation.x).speed(0.05))
                    .changed();
                changed |= ui
                    .add(egui::DragValue::new(&mut state.emitter.velocity_variation.y).speed(0.05))
                    .changed();
            });
            changed |= ui
                .add(egui::Slider::new(&mut *state.emit_per_frame, 0..=50).text("Per Frame"))
                .changed();

            ui.separator();
            ui.heading("Batch");
            changed |= ui.checkbox(&mut *state.batch_enabled, "Enabled").changed();
            ui.horizontal(|ui| {
                ui.label("Quad Position");
                changed |= ui
                    .add(egui::DragValue::new(&mut state.quad_position.x).speed(0.1))
                    .changed();
                changed |= ui
                    .add(egui::DragValue::new(&mut state.quad_position.y).speed(0.1))
                    .changed();
            });

            ui.separator();
            ui.label(format!("FPS: {:.0}", stats.fps));
            ui.label(format!(
                "Particles: {} / {}",
                stats.active_particles, stats.pool_capacity
            ));
            ui.label(format!("Evicted: {}", stats.evicted));
            ui.label(format!("Quads: {}", stats.quads));
            ui.label(format!("Zoom: {:.2}", stats.zoom));
        });

    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_panel_runs_headless() {
        let ctx = Context::default();
        let mut emitter = ParticleProps::default();
        let mut emit_per_frame = 5;
        let mut quad_position = Vec2::new(-1.5, -0.5);
        let mut particles_enabled = true;
        let mut batch_enabled = true;
        let stats = PanelStats {
            fps: 60.0,
            active_particles: 12,
            pool_capacity: 1000,
            evicted: 0,
            quads: 101,
            zoom: 1.0,
        };

        let mut changed = true;
        let _output = ctx.run(egui::RawInput::default(), |ctx| {
            let mut state = PanelState {
                emitter: &mut emitter,
                emit_per_frame: &mut emit_per_frame,
                quad_position: &mut quad_position,
                particles_enabled: &mut particles_enabled,
                batch_enabled: &mut batch_enabled,
            };
            changed = settings_panel(ctx, &mut state, &stats);
        });

        assert!(!changed);
        assert_eq!(emitter, ParticleProps::default());
        assert_eq!(emit_per_frame, 5);
    }
}
