//! Daemon configuration.
//!
//! Layered the usual way: TOML file (path from `--config` or
//! `VISION_CONFIG`), then `VISION_*` environment overrides, then
//! validation. Every field has a default so an empty deployment runs
//! against one synthetic camera.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::frame::Resolution;

const DEFAULT_CAMERA_DEVICE: &str = "stub://0";
const DEFAULT_CAMERA_WIDTH: u32 = 320;
const DEFAULT_CAMERA_HEIGHT: u32 = 240;
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_EXPOSURE: f64 = 0.01;
const DEFAULT_OUTPUT_WIDTH: u32 = 320;
const DEFAULT_OUTPUT_HEIGHT: u32 = 200;
const DEFAULT_DETECTION_THRESHOLD: f64 = 96.0;

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    camera: Vec<CameraFile>,
    output: Option<OutputFile>,
    detection: Option<DetectionFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraFile {
    name: Option<String>,
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    exposure: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionFile {
    enabled: Option<bool>,
    threshold: Option<f64>,
}

/// Settings for one camera, resolved from file and defaults.
#[derive(Clone, Debug)]
pub struct CameraSettings {
    pub name: String,
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    pub exposure: f64,
}

#[derive(Clone, Debug)]
pub struct DetectionSettings {
    pub enabled: bool,
    pub threshold: f64,
}

#[derive(Clone, Debug)]
pub struct VisiondConfig {
    pub cameras: Vec<CameraSettings>,
    pub output_resolution: Resolution,
    pub detection: DetectionSettings,
}

impl VisiondConfig {
    /// Load from `VISION_CONFIG` (when set), apply env overrides, validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("VISION_CONFIG").ok();
        Self::load_from(config_path.as_deref())
    }

    pub fn load_from(path: Option<&str>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(Path::new(path))?,
            None => ConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ConfigFile) -> Self {
        let mut cameras: Vec<CameraSettings> = file
            .camera
            .into_iter()
            .enumerate()
            .map(|(index, camera)| CameraSettings {
                name: camera.name.unwrap_or_else(|| format!("camera{}", index)),
                device: camera
                    .device
                    .unwrap_or_else(|| format!("stub://{}", index)),
                width: camera.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
                target_fps: camera.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
                exposure: camera.exposure.unwrap_or(DEFAULT_EXPOSURE),
            })
            .collect();
        if cameras.is_empty() {
            cameras.push(CameraSettings {
                name: "camera0".to_string(),
                device: DEFAULT_CAMERA_DEVICE.to_string(),
                width: DEFAULT_CAMERA_WIDTH,
                height: DEFAULT_CAMERA_HEIGHT,
                target_fps: DEFAULT_CAMERA_FPS,
                exposure: DEFAULT_EXPOSURE,
            });
        }

        let output_resolution = Resolution::new(
            file.output
                .as_ref()
                .and_then(|output| output.width)
                .unwrap_or(DEFAULT_OUTPUT_WIDTH),
            file.output
                .and_then(|output| output.height)
                .unwrap_or(DEFAULT_OUTPUT_HEIGHT),
        );

        let detection = DetectionSettings {
            enabled: file
                .detection
                .as_ref()
                .and_then(|detection| detection.enabled)
                .unwrap_or(true),
            threshold: file
                .detection
                .and_then(|detection| detection.threshold)
                .unwrap_or(DEFAULT_DETECTION_THRESHOLD),
        };

        Self {
            cameras,
            output_resolution,
            detection,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("VISION_DEVICE") {
            if !device.trim().is_empty() {
                // Single-camera override for quick field swaps.
                if let Some(first) = self.cameras.first_mut() {
                    first.device = device;
                }
            }
        }
        if let Ok(exposure) = std::env::var("VISION_EXPOSURE") {
            if !exposure.trim().is_empty() {
                let parsed: f64 = exposure
                    .parse()
                    .map_err(|_| anyhow!("VISION_EXPOSURE must be a number"))?;
                for camera in &mut self.cameras {
                    camera.exposure = parsed;
                }
            }
        }
        if let Ok(res) = std::env::var("VISION_OUTPUT_RES") {
            if !res.trim().is_empty() {
                self.output_resolution = parse_resolution(&res)?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.cameras.is_empty() {
            return Err(anyhow!("at least one camera must be configured"));
        }
        for camera in &self.cameras {
            if camera.width == 0 || camera.height == 0 {
                return Err(anyhow!(
                    "camera '{}' has a zero dimension ({}x{})",
                    camera.name,
                    camera.width,
                    camera.height
                ));
            }
        }
        if self.output_resolution.width == 0 || self.output_resolution.height == 0 {
            return Err(anyhow!("output resolution must be non-zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn parse_resolution(value: &str) -> Result<Resolution> {
    let (width, height) = value
        .split_once('x')
        .ok_or_else(|| anyhow!("resolution must be WIDTHxHEIGHT, got '{}'", value))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid resolution width '{}'", width))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid resolution height '{}'", height))?;
    Ok(Resolution::new(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_give_one_synthetic_camera() {
        let cfg = VisiondConfig::from_file(ConfigFile::default());
        assert_eq!(cfg.cameras.len(), 1);
        assert_eq!(cfg.cameras[0].device, "stub://0");
        assert_eq!(cfg.output_resolution, Resolution::new(320, 200));
        assert!(cfg.detection.enabled);
    }

    #[test]
    fn parse_resolution_accepts_wxh() {
        assert_eq!(
            parse_resolution("640x480").unwrap(),
            Resolution::new(640, 480)
        );
        assert!(parse_resolution("640").is_err());
        assert!(parse_resolution("axb").is_err());
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let mut cfg = VisiondConfig::from_file(ConfigFile::default());
        cfg.cameras[0].width = 0;
        assert!(cfg.validate().is_err());
    }
}
