//! 2D orthographic camera and its controller.
//!
//! The camera produces the view-projection matrix consumed by both the
//! particle renderer and the quad batch renderer. The controller maps
//! pan/rotate input, scroll and resize events onto it.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

/// Minimum zoom level (most zoomed in).
pub const MIN_ZOOM: f32 = 0.25;

/// Default zoom level.
pub const DEFAULT_ZOOM: f32 = 1.0;

/// Zoom change per unit of scroll.
pub const ZOOM_STEP: f32 = 0.25;

/// Rotation speed in radians per second.
pub const ROTATION_SPEED: f32 = std::f32::consts::PI;

/// Orthographic 2D camera.
#[derive(Debug, Clone, PartialEq)]
pub struct OrthographicCamera {
    projection: Mat4,
    view: Mat4,
    view_projection: Mat4,
    position: Vec2,
    rotation: f32,
}

impl OrthographicCamera {
    /// Creates a camera looking at the given bounds.
    #[must_use]
    pub fn new(left: f32, right: f32, bottom: f32, top: f32) -> Self {
        let projection = Mat4::orthographic_rh(left, right, bottom, top, -1.0, 1.0);
        Self {
            projection,
            view: Mat4::IDENTITY,
            view_projection: projection,
            position: Vec2::ZERO,
            rotation: 0.0,
        }
    }

    /// Replaces the projection bounds.
    pub fn set_projection(&mut self, left: f32, right: f32, bottom: f32, top: f32) {
        self.projection = Mat4::orthographic_rh(left, right, bottom, top, -1.0, 1.0);
        self.view_projection = self.projection * self.view;
    }

    /// Moves the camera.
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.recalculate_view();
    }

    /// Rotates the camera about the view axis (radians).
    pub fn set_rotation(&mut self, rotation: f32) {
        self.rotation = rotation;
        self.recalculate_view();
    }

    fn recalculate_view(&mut self) {
        let transform = Mat4::from_translation(self.position.extend(0.0))
            * Mat4::from_rotation_z(self.rotation);
        self.view = transform.inverse();
        self.view_projection = self.projection * self.view;
    }

    /// Camera position in world units.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    /// Camera rotation in radians.
    #[must_use]
    pub const fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Projection matrix.
    #[must_use]
    pub const fn projection(&self) -> Mat4 {
        self.projection
    }

    /// View matrix (inverse camera transform).
    #[must_use]
    pub const fn view(&self) -> Mat4 {
        self.view
    }

    /// Combined view-projection matrix.
    #[must_use]
    pub const fn view_projection(&self) -> Mat4 {
        self.view_projection
    }
}

/// Directional input for one controller update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CameraInput {
    /// Pan left
    pub left: bool,
    /// Pan right
    pub right: bool,
    /// Pan up
    pub up: bool,
    /// Pan down
    pub down: bool,
    /// Rotate counter-clockwise
    pub rotate_ccw: bool,
    /// Rotate clockwise
    pub rotate_cw: bool,
}

/// Aspect-ratio aware controller for an [`OrthographicCamera`].
///
/// The visible region is `[-aspect * zoom, aspect * zoom] x [-zoom, zoom]`
/// around the camera position. Pan speed follows the zoom level so panning
/// feels the same at every zoom.
#[derive(Debug, Clone)]
pub struct OrthographicCameraController {
    aspect_ratio: f32,
    zoom: f32,
    rotation_enabled: bool,
    position: Vec2,
    rotation: f32,
    camera: OrthographicCamera,
}

impl OrthographicCameraController {
    /// Creates a controller for the given aspect ratio.
    #[must_use]
    pub fn new(aspect_ratio: f32, rotation_enabled: bool) -> Self {
        Self::with_zoom(aspect_ratio, DEFAULT_ZOOM, rotation_enabled)
    }

    /// Creates a controller with an initial zoom level.
    #[must_use]
    pub fn with_zoom(aspect_ratio: f32, zoom: f32, rotation_enabled: bool) -> Self {
        let zoom = zoom.max(MIN_ZOOM);
        Self {
            aspect_ratio,
            zoom,
            rotation_enabled,
            position: Vec2::ZERO,
            rotation: 0.0,
            camera: OrthographicCamera::new(
                -aspect_ratio * zoom,
                aspect_ratio * zoom,
                -zoom,
                zoom,
            ),
        }
    }

    /// Applies one frame of pan and rotate input.
    pub fn on_update(&mut self, dt: f32, input: &CameraInput) {
        let speed = self.zoom * dt;
        let (sin, cos) = self.rotation.sin_cos();
        let right = Vec2::new(cos, sin);
        let up = Vec2::new(-sin, cos);

        let mut delta = Vec2::ZERO;
        if input.left {
            delta -= right;
        }
        if input.right {
            delta += right;
        }
        if input.up {
            delta += up;
        }
        if input.down {
            delta -= up;
        }
        self.position += delta * speed;

        if self.rotation_enabled {
            if input.rotate_ccw {
                self.rotation += ROTATION_SPEED * dt;
            }
            if input.rotate_cw {
                self.rotation -= ROTATION_SPEED * dt;
            }
            self.camera.set_rotation(self.rotation);
        }

        self.camera.set_position(self.position);
    }

    /// Zooms by `delta` scroll units; positive scrolls zoom in.
    pub fn on_scroll(&mut self, delta: f32) {
        self.zoom = (self.zoom - delta * ZOOM_STEP).max(MIN_ZOOM);
        self.update_projection();
    }

    /// Adapts to a new framebuffer size. Zero sizes are ignored.
    pub fn on_resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect_ratio = width as f32 / height as f32;
        self.update_projection();
    }

    fn update_projection(&mut self) {
        self.camera.set_projection(
            -self.aspect_ratio * self.zoom,
            self.aspect_ratio * self.zoom,
            -self.zoom,
            self.zoom,
        );
    }

    /// Converts a window position in pixels to world coordinates.
    ///
    /// Pixel `(0, 0)` is the top-left corner of the window.
    #[must_use]
    pub fn screen_to_world(&self, screen: Vec2, width: u32, height: u32) -> Vec2 {
        if width == 0 || height == 0 {
            return self.position;
        }
        let ndc = Vec3::new(
            screen.x / width as f32 * 2.0 - 1.0,
            1.0 - screen.y / height as f32 * 2.0,
            0.0,
        );
        self.camera
            .view_projection()
            .inverse()
            .project_point3(ndc)
            .truncate()
    }

    /// The controlled camera.
    #[must_use]
    pub const fn camera(&self) -> &OrthographicCamera {
        &self.camera
    }

    /// Current zoom level.
    #[must_use]
    pub const fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Current aspect ratio.
    #[must_use]
    pub const fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    /// Sets the zoom level directly.
    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.max(MIN_ZOOM);
        self.update_projection();
    }
}

/// Camera uniform shared by the particle and quad pipelines.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    /// Column-major view-projection matrix
    pub view_proj: [[f32; 4]; 4],
    /// Column-major model transform applied to every vertex
    pub transform: [[f32; 4]; 4],
}

impl CameraUniform {
    /// Builds a uniform from matrices.
    #[must_use]
    pub fn new(view_proj: Mat4, transform: Mat4) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            transform: transform.to_cols_array_2d(),
        }
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn test_camera_uniform_size() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 128);
    }

    #[test]
    fn test_projection_maps_bounds_to_ndc() {
        let camera = OrthographicCamera::new(-2.0, 2.0, -1.0, 1.0);
        let corner = camera
            .view_projection()
            .project_point3(Vec3::new(2.0, 1.0, 0.0));
        assert!((corner.x - 1.0).abs() < 1e-6);
        assert!((corner.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_view_is_inverse_of_position() {
        let mut camera = OrthographicCamera::new(-1.0, 1.0, -1.0, 1.0);
        camera.set_position(Vec2::new(0.5, 0.5));
        let center = camera.view_projection().project_point3(Vec3::new(0.5, 0.5, 0.0));
        assert!(center.x.abs() < 1e-6);
        assert!(center.y.abs() < 1e-6);
    }

    #[test]
    fn test_scroll_zoom_clamped() {
        let mut controller = OrthographicCameraController::new(16.0 / 9.0, false);
        controller.on_scroll(1.0);
        assert!((controller.zoom() - 0.75).abs() < f32::EPSILON);
        controller.on_scroll(10.0);
        assert!((controller.zoom() - MIN_ZOOM).abs() < f32::EPSILON);
        controller.on_scroll(-2.0);
        assert!((controller.zoom() - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn test_resize_updates_aspect() {
        let mut controller = OrthographicCameraController::new(1.0, false);
        controller.on_resize(1600, 900);
        assert!((controller.aspect_ratio() - 16.0 / 9.0).abs() < 1e-6);
        controller.on_resize(0, 900);
        assert!((controller.aspect_ratio() - 16.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_pan_speed_follows_zoom() {
        let mut controller = OrthographicCameraController::with_zoom(1.0, 2.0, false);
        controller.on_update(
            0.5,
            &CameraInput {
                right: true,
                ..Default::default()
            },
        );
        assert!(approx(controller.camera().position(), Vec2::new(1.0, 0.0)));
    }

    #[test]
    fn test_rotation_requires_enable() {
        let input = CameraInput {
            rotate_ccw: true,
            ..Default::default()
        };

        let mut fixed = OrthographicCameraController::new(1.0, false);
        fixed.on_update(1.0, &input);
        assert!(fixed.camera().rotation().abs() < f32::EPSILON);

        let mut rotating = OrthographicCameraController::new(1.0, true);
        rotating.on_update(1.0, &input);
        assert!((rotating.camera().rotation() - ROTATION_SPEED).abs() < 1e-6);
    }

    #[test]
    fn test_screen_to_world() {
        let controller = OrthographicCameraController::new(2.0, false);
        // 200x100 window, aspect 2, zoom 1: x spans [-2, 2], y spans [-1, 1].
        assert!(approx(
            controller.screen_to_world(Vec2::new(100.0, 50.0), 200, 100),
            Vec2::ZERO
        ));
        assert!(approx(
            controller.screen_to_world(Vec2::new(0.0, 0.0), 200, 100),
            Vec2::new(-2.0, 1.0)
        ));
        assert!(approx(
            controller.screen_to_world(Vec2::new(200.0, 100.0), 200, 100),
            Vec2::new(2.0, -1.0)
        ));
    }

    #[test]
    fn test_screen_to_world_follows_pan() {
        let mut controller = OrthographicCameraController::new(1.0, false);
        controller.on_update(
            1.0,
            &CameraInput {
                up: true,
                ..Default::default()
            },
        );
        assert!(approx(
            controller.screen_to_world(Vec2::new(50.0, 50.0), 100, 100),
            Vec2::new(0.0, 1.0)
        ));
    }
}
