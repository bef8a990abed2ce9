//! Application lifecycle management.
//!
//! Owns the window, renderer and frame driver, and runs one
//! input, update and render cycle per redraw.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::KeyCode,
    window::{Window, WindowId},
};

use glam::Vec2;
use sandbox_kernel::{FrameDriver, FrameInput, FrameSummary, OrthographicCameraController, Quad};

use crate::config::SandboxConfig;
use crate::input::{InputHandler, PanelInput};
use crate::renderer::{RenderLayers, Renderer};
use crate::scene::{quad_grid, Scene};
use crate::timing::FrameTiming;
use crate::ui::{settings_panel, PanelState, PanelStats};

/// Application state.
struct SandboxApp {
    /// Sandbox configuration, edited live by the settings panel
    config: SandboxConfig,
    /// Window handle (created after resume)
    window: Option<Arc<Window>>,
    /// Renderer (initialized after window creation)
    renderer: Option<Renderer>,
    /// Fatal error raised while starting up
    startup_error: Option<anyhow::Error>,

    /// Input handler
    input: InputHandler,
    /// Frame timing
    timing: FrameTiming,
    /// Camera with WASD pan, Q/E rotation and wheel zoom
    camera: OrthographicCameraController,
    /// Particle pool and quad batch
    driver: FrameDriver,
    /// Quads submitted to the batch
    scene: Scene,
    /// Result of the last successful step
    last_summary: FrameSummary,
}

impl SandboxApp {
    /// Creates a new application instance.
    fn new(config: SandboxConfig) -> Self {
        let timing = FrameTiming::new(config.target_fps).with_vsync(config.vsync);

        let aspect = config.window_width as f32 / config.window_height.max(1) as f32;
        let camera =
            OrthographicCameraController::with_zoom(aspect, config.camera.zoom, config.camera.rotation);

        let batch = &config.batch;
        let grid = quad_grid(batch.grid_columns, batch.grid_rows, batch.grid_spacing);
        let scene = Scene::new(grid, Vec2::from_array(batch.quad_position));

        Self {
            config,
            window: None,
            renderer: None,
            startup_error: None,

            input: InputHandler::new(),
            timing,
            camera,
            driver: FrameDriver::default(),
            scene,
            last_summary: FrameSummary::default(),
        }
    }

    /// Main update and render loop.
    fn update_and_render(&mut self) {
        let dt = self.timing.delta_time();

        let (Some(window), Some(renderer)) = (self.window.clone(), self.renderer.as_mut()) else {
            return;
        };

        if self.input.is_key_just_pressed(KeyCode::F1) {
            self.config.show_ui = !self.config.show_ui;
            info!("Settings panel: {}", if self.config.show_ui { "ON" } else { "OFF" });
        }

        // Camera and user quad
        self.camera.on_update(dt, &self.input.camera_input());
        if self.input.scroll() != 0.0 {
            self.camera.on_scroll(self.input.scroll());
        }
        self.scene
            .move_user_quad(self.input.arrow_direction(), self.config.batch.quad_speed, dt);

        // Settings panel
        let ui_output = if self.config.show_ui {
            let stats = PanelStats {
                fps: self.timing.current_fps(),
                active_particles: self.last_summary.active_particles,
                pool_capacity: self.driver.pool().capacity(),
                evicted: self.driver.pool().stats().evicted,
                quads: self.last_summary.quad_count,
                zoom: self.camera.zoom(),
            };
            let mut quad_position = self.scene.user_position();

            let egui = renderer.egui_mut();
            egui.begin_frame(&window);
            let mut state = PanelState {
                emitter: &mut self.config.particles.emitter,
                emit_per_frame: &mut self.config.particles.emit_per_frame,
                quad_position: &mut quad_position,
                particles_enabled: &mut self.config.particles.enabled,
                batch_enabled: &mut self.config.batch.enabled,
            };
            settings_panel(egui.context(), &mut state, &stats);
            let output = egui.end_frame(&window);

            self.scene.set_user_position(quad_position);
            Some(output)
        } else {
            None
        };

        // Emission follows the held left button
        let size = renderer.size();
        let emit_at = (self.config.particles.enabled && self.input.left_button()).then(|| {
            self.camera
                .screen_to_world(self.input.mouse_position(), size.width, size.height)
        });

        let quads: &[Quad] = if self.config.batch.enabled {
            self.scene.quads()
        } else {
            &[]
        };
        let input = FrameInput {
            emit_at,
            emit_count: self.config.particles.emit_per_frame as usize,
            props: &self.config.particles.emitter,
            quads,
        };

        match self.driver.step(dt, &input) {
            Ok(summary) => {
                self.last_summary = summary;
                let layers = RenderLayers {
                    batch: self.config.batch.enabled,
                    particles: self.config.particles.enabled,
                };
                let view_proj = self.camera.camera().view_projection();
                if let Err(e) = renderer.render(view_proj, &self.driver, layers, ui_output) {
                    error!("Render failed: {e:#}");
                }
            },
            Err(e) => error!("Frame {} not submitted: {e}", self.driver.frame()),
        }

        self.input.end_frame();
        self.timing.sleep_remainder();
    }

    /// Copies live state back into the config and writes it to disk.
    fn save_config(&mut self) {
        self.config.batch.quad_position = self.scene.user_position().to_array();
        self.config.camera.zoom = self.camera.zoom();
        if let Err(e) = self.config.save() {
            warn!("Failed to save config: {e}");
        }
    }
}

impl ApplicationHandler for SandboxApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        info!("Application resumed, creating window...");

        let window_attrs = Window::default_attributes()
            .with_title("Sandbox")
            .with_inner_size(PhysicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.startup_error = Some(anyhow::anyhow!("Failed to create window: {e}"));
                event_loop.exit();
                return;
            },
        };
        info!("Window created successfully");

        match pollster::block_on(Renderer::new(Arc::clone(&window), &self.config)) {
            Ok(renderer) => {
                let size = renderer.size();
                self.camera.on_resize(size.width, size.height);
                self.renderer = Some(renderer);
            },
            Err(e) => {
                self.startup_error = Some(e);
                event_loop.exit();
                return;
            },
        }

        window.request_redraw();
        self.window = Some(window);
        self.timing.reset();

        info!(
            "Sandbox ready - {}x{}, {} quads per frame",
            self.config.window_width,
            self.config.window_height,
            self.scene.quad_count()
        );
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let ui_consumed = match (&mut self.renderer, &self.window) {
            (Some(renderer), Some(window)) if self.config.show_ui => {
                renderer.egui_mut().handle_event(window, &event)
            },
            _ => false,
        };

        // Key presses, clicks and wheel the panel consumed stay with it.
        let ui_owned = PanelInput::of(&event).withheld(ui_consumed);
        if !ui_owned {
            self.input.handle_event(&event);
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down...");
                self.save_config();
                event_loop.exit();
            },
            WindowEvent::Resized(new_size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.resize(new_size);
                }
                if new_size.width > 0 && new_size.height > 0 {
                    self.config.window_width = new_size.width;
                    self.config.window_height = new_size.height;
                }
                self.camera.on_resize(new_size.width, new_size.height);
            },
            WindowEvent::RedrawRequested => {
                self.update_and_render();

                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            },
            _ => {},
        }
    }
}

/// Runs the main application loop.
///
/// Returns an error if the window or renderer could not be created.
pub fn run() -> Result<()> {
    let mut config = SandboxConfig::load();
    config.validate();

    info!("Configuration loaded:");
    info!("  Window: {}x{}", config.window_width, config.window_height);
    info!("  VSync: {}", config.vsync);
    info!(
        "  Particles: {} per frame, lifetime {:.2}s",
        config.particles.emit_per_frame, config.particles.emitter.lifetime
    );
    info!(
        "  Batch: {}x{} grid, {} textures",
        config.batch.grid_columns,
        config.batch.grid_rows,
        config.batch.textures.len()
    );

    info!("Creating event loop...");
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = SandboxApp::new(config);

    info!("Starting event loop...");
    event_loop.run_app(&mut app)?;

    if let Some(e) = app.startup_error.take() {
        return Err(e);
    }

    Ok(())
}
