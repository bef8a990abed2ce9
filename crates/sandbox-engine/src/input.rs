//! Input handling for the sandbox.
//!
//! Tracks held keys, the cursor and the left mouse button from winit
//! window events, and maps them onto camera and quad movement.

use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use sandbox_kernel::CameraInput;

/// Pixels of trackpad scroll treated as one wheel line.
const PIXELS_PER_LINE: f32 = 40.0;

/// Input the settings panel can take away from the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelInput {
    /// Key press or release
    Key(ElementState),
    /// Mouse button press or release
    Button(ElementState),
    /// Wheel scroll
    Wheel,
    /// Everything else; always reaches the scene
    Other,
}

impl PanelInput {
    /// Classifies a window event.
    #[must_use]
    pub fn of(event: &WindowEvent) -> Self {
        match event {
            WindowEvent::KeyboardInput { event, .. } => Self::Key(event.state),
            WindowEvent::MouseInput { state, .. } => Self::Button(*state),
            WindowEvent::MouseWheel { .. } => Self::Wheel,
            _ => Self::Other,
        }
    }

    /// Whether an event the panel `consumed` is kept from the scene.
    ///
    /// Releases always pass so nothing stays held.
    #[must_use]
    pub fn withheld(self, consumed: bool) -> bool {
        consumed
            && matches!(
                self,
                Self::Wheel
                    | Self::Key(ElementState::Pressed)
                    | Self::Button(ElementState::Pressed)
            )
    }
}

/// Collects winit input into per-frame state.
#[derive(Debug, Default)]
pub struct InputHandler {
    /// Keys currently held
    held: HashSet<KeyCode>,
    /// Keys pressed since the last `end_frame`
    just_pressed: HashSet<KeyCode>,
    /// Cursor position in physical pixels, top-left origin
    mouse_position: Vec2,
    /// Whether the left button is held
    left_button: bool,
    /// Wheel lines scrolled since the last `end_frame`
    scroll: f32,
}

impl InputHandler {
    /// Create a new input handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a winit window event. Returns true if the event was handled.
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    let pressed = event.state == ElementState::Pressed;
                    if pressed && event.repeat {
                        return true;
                    }
                    self.set_key(key, pressed);
                }
                true
            },
            WindowEvent::MouseInput { state, button, .. } => {
                if *button == MouseButton::Left {
                    self.set_left_button(*state == ElementState::Pressed);
                }
                true
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.set_mouse_position(Vec2::new(position.x as f32, position.y as f32));
                true
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_LINE,
                };
                self.add_scroll(lines);
                true
            },
            WindowEvent::Focused(false) => {
                self.release_all();
                true
            },
            _ => false,
        }
    }

    /// Record a key press or release.
    pub fn set_key(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            if self.held.insert(key) {
                self.just_pressed.insert(key);
            }
        } else {
            self.held.remove(&key);
        }
    }

    /// Record the left button state.
    pub fn set_left_button(&mut self, pressed: bool) {
        self.left_button = pressed;
    }

    /// Record the cursor position.
    pub fn set_mouse_position(&mut self, position: Vec2) {
        self.mouse_position = position;
    }

    /// Accumulate wheel lines; positive scrolls up.
    pub fn add_scroll(&mut self, lines: f32) {
        self.scroll += lines;
    }

    /// Drop every held key and button, e.g. when focus is lost.
    pub fn release_all(&mut self) {
        self.held.clear();
        self.left_button = false;
    }

    /// Check if a key is currently held.
    #[must_use]
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.held.contains(&key)
    }

    /// Check if a key was pressed this frame.
    #[must_use]
    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed.contains(&key)
    }

    /// Cursor position in physical pixels.
    #[must_use]
    pub const fn mouse_position(&self) -> Vec2 {
        self.mouse_position
    }

    /// Whether the left mouse button is held.
    #[must_use]
    pub const fn left_button(&self) -> bool {
        self.left_button
    }

    /// Wheel lines scrolled this frame.
    #[must_use]
    pub const fn scroll(&self) -> f32 {
        self.scroll
    }

    /// WASD pans, Q and E rotate.
    #[must_use]
    pub fn camera_input(&self) -> CameraInput {
        CameraInput {
            left: self.is_key_pressed(KeyCode::KeyA),
            right: self.is_key_pressed(KeyCode::KeyD),
            up: self.is_key_pressed(KeyCode::KeyW),
            down: self.is_key_pressed(KeyCode::KeyS),
            rotate_ccw: self.is_key_pressed(KeyCode::KeyQ),
            rotate_cw: self.is_key_pressed(KeyCode::KeyE),
        }
    }

    /// Unit-per-axis direction from the arrow keys. Opposing keys cancel.
    #[must_use]
    pub fn arrow_direction(&self) -> Vec2 {
        let axis = |neg: KeyCode, pos: KeyCode| {
            f32::from(u8::from(self.is_key_pressed(pos))) - f32::from(u8::from(self.is_key_pressed(neg)))
        };
        Vec2::new(
            axis(KeyCode::ArrowLeft, KeyCode::ArrowRight),
            axis(KeyCode::ArrowDown, KeyCode::ArrowUp),
        )
    }

    /// Reset per-frame state. Call at the end of each frame.
    pub fn end_frame(&mut self) {
        self.just_pressed.clear();
        self.scroll = 0.0;
    }
}
