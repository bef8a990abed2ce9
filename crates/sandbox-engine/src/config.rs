//! Sandbox configuration.
//!
//! Window, particle emitter, quad batch and camera settings. Configuration
//! is loaded from and saved to a TOML file in the platform config directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use sandbox_kernel::{ParticleProps, MAX_PARTICLES, MAX_QUADS, MAX_TEXTURE_SLOTS, MIN_ZOOM};

/// Configuration file name.
const CONFIG_FILE: &str = "sandbox.toml";

/// Application directory under the platform config directory.
const CONFIG_DIR: &str = "sandbox";

/// Top-level sandbox configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    // === Window Settings ===
    /// Window width in pixels
    pub window_width: u32,
    /// Window height in pixels
    pub window_height: u32,
    /// Enable VSync
    pub vsync: bool,
    /// Target frames per second (when VSync is off)
    pub target_fps: u32,
    /// Background clear color (RGB)
    pub clear_color: [f32; 3],

    // === Debug Settings ===
    /// Enable GPU validation layers
    pub gpu_validation: bool,
    /// Show the settings panel
    pub show_ui: bool,

    /// Particle emitter settings
    pub particles: ParticleConfig,
    /// Quad batch settings
    pub batch: BatchConfig,
    /// Camera settings
    pub camera: CameraConfig,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            vsync: true,
            target_fps: 60,
            clear_color: [0.1, 0.1, 0.1],

            gpu_validation: cfg!(debug_assertions),
            show_ui: true,

            particles: ParticleConfig::default(),
            batch: BatchConfig::default(),
            camera: CameraConfig::default(),
        }
    }
}

/// Particle emitter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    /// Draw and emit particles
    pub enabled: bool,
    /// Emissions per frame while the left mouse button is held
    pub emit_per_frame: u32,
    /// Emission parameters (position is taken from the mouse)
    pub emitter: ParticleProps,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            emit_per_frame: 5,
            emitter: ParticleProps::default(),
        }
    }
}

/// Quad batch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Draw the quad batch
    pub enabled: bool,
    /// Background grid columns
    pub grid_columns: u32,
    /// Background grid rows
    pub grid_rows: u32,
    /// Distance between grid quad anchors
    pub grid_spacing: f32,
    /// Starting anchor of the user-controlled quad
    pub quad_position: [f32; 2],
    /// User quad speed in world units per second
    pub quad_speed: f32,
    /// Texture files bound to slots 0.. in order
    pub textures: Vec<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            grid_columns: 10,
            grid_rows: 10,
            grid_spacing: 0.25,
            quad_position: [-1.5, -0.5],
            quad_speed: 1.0,
            textures: Vec::new(),
        }
    }
}

/// Camera settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Allow Q/E rotation
    pub rotation: bool,
    /// Initial zoom level
    pub zoom: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            rotation: true,
            zoom: 1.0,
        }
    }
}

impl SandboxConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read config file: {e}");
                return Self::default();
            },
        };

        match toml::from_str(&contents) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to parse config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to the default file location.
    pub fn save(&self) -> io::Result<()> {
        self.save_to(Self::config_path())
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path.
    fn config_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join(CONFIG_DIR).join(CONFIG_FILE),
            None => PathBuf::from(CONFIG_FILE),
        }
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        // Window
        self.window_width = self.window_width.clamp(320, 7680);
        self.window_height = self.window_height.clamp(240, 4320);
        self.target_fps = self.target_fps.clamp(30, 240);
        for c in &mut self.clear_color {
            *c = c.clamp(0.0, 1.0);
        }

        // Particles
        self.particles.emit_per_frame = self.particles.emit_per_frame.min(MAX_PARTICLES as u32);
        let emitter = &mut self.particles.emitter;
        emitter.lifetime = emitter.lifetime.clamp(0.0, 1000.0);
        emitter.size_begin = emitter.size_begin.max(0.0);
        emitter.size_end = emitter.size_end.max(0.0);
        emitter.size_variation = emitter.size_variation.max(0.0);
        emitter.color_begin = emitter.color_begin.clamp(glam::Vec4::ZERO, glam::Vec4::ONE);
        emitter.color_end = emitter.color_end.clamp(glam::Vec4::ZERO, glam::Vec4::ONE);

        // Batch: the grid plus the user quad must fit in one batch
        let batch = &mut self.batch;
        batch.grid_columns = batch.grid_columns.min(MAX_QUADS as u32 - 1);
        let max_rows = if batch.grid_columns == 0 {
            0
        } else {
            (MAX_QUADS as u32 - 1) / batch.grid_columns
        };
        if batch.grid_rows > max_rows {
            warn!(
                "Grid of {}x{} quads does not fit in one batch, clamping rows to {}",
                batch.grid_columns, batch.grid_rows, max_rows
            );
            batch.grid_rows = max_rows;
        }
        batch.grid_spacing = batch.grid_spacing.max(0.0);
        batch.quad_speed = batch.quad_speed.clamp(0.0, 100.0);
        if batch.textures.len() > MAX_TEXTURE_SLOTS as usize {
            warn!(
                "{} textures configured, only the first {} are bound",
                batch.textures.len(),
                MAX_TEXTURE_SLOTS
            );
            batch.textures.truncate(MAX_TEXTURE_SLOTS as usize);
        }

        // Camera
        self.camera.zoom = self.camera.zoom.max(MIN_ZOOM);
    }

    /// Total quads the configured scene draws each frame.
    #[must_use]
    pub fn scene_quad_count(&self) -> usize {
        (self.batch.grid_columns * self.batch.grid_rows) as usize + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SandboxConfig::default();
        assert_eq!(config.window_width, 1280);
        assert_eq!(config.window_height, 720);
        assert!(config.vsync);
        assert_eq!(config.particles.emit_per_frame, 5);
        assert!((config.particles.emitter.lifetime - 1.0).abs() < f32::EPSILON);
        assert!(config.batch.textures.is_empty());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SandboxConfig::default();

        config.window_width = 100;
        config.particles.emitter.lifetime = -3.0;
        config.particles.emit_per_frame = 5000;
        config.camera.zoom = 0.0;

        config.validate();

        assert_eq!(config.window_width, 320);
        assert!(config.particles.emitter.lifetime.abs() < f32::EPSILON);
        assert_eq!(config.particles.emit_per_frame, MAX_PARTICLES as u32);
        assert!((config.camera.zoom - MIN_ZOOM).abs() < f32::EPSILON);
    }

    #[test]
    fn test_oversized_grid_is_clamped_to_batch() {
        let mut config = SandboxConfig::default();
        config.batch.grid_columns = 100;
        config.batch.grid_rows = 100;

        config.validate();

        assert_eq!(config.batch.grid_rows, 9);
        assert!(config.scene_quad_count() <= MAX_QUADS);
    }

    #[test]
    fn test_extra_textures_truncated() {
        let mut config = SandboxConfig::default();
        config.batch.textures = (0..6).map(|i| PathBuf::from(format!("t{i}.png"))).collect();
        config.validate();
        assert_eq!(config.batch.textures.len(), MAX_TEXTURE_SLOTS as usize);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test_config.toml");

        let mut config = SandboxConfig::default();
        config.window_width = 1920;
        config.vsync = false;
        config.particles.emitter.lifetime = 2.5;
        config.batch.textures = vec![PathBuf::from("assets/checker.png")];

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = SandboxConfig::load_from(&config_path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = SandboxConfig::load_from("/nonexistent/path/config.toml");
        assert_eq!(config, SandboxConfig::default());
    }

    #[test]
    fn test_config_load_invalid_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "window_width = \"wide\"").expect("write");

        let config = SandboxConfig::load_from(&config_path);
        assert_eq!(config, SandboxConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("partial.toml");
        fs::write(
            &config_path,
            "vsync = false\n[particles.emitter]\nlifetime = 3.0\n",
        )
        .expect("write");

        let config = SandboxConfig::load_from(&config_path);
        assert!(!config.vsync);
        assert!((config.particles.emitter.lifetime - 3.0).abs() < f32::EPSILON);
        assert!((config.particles.emitter.size_begin - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.batch.grid_columns, 10);
    }

    #[test]
    fn test_config_toml_serialization() {
        let config = SandboxConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("Failed to serialize");

        assert!(toml_str.contains("window_width"));
        assert!(toml_str.contains("[particles.emitter]"));
        assert!(toml_str.contains("emit_per_frame"));
    }
}
