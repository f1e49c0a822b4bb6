//! Camera device backends.
//!
//! `CameraDevice` is the seam between the capture loop and hardware. The
//! synthetic backend paces itself to a target frame rate and produces a
//! deterministic pattern, which is what tests and `stub://` deployments use.
//! The V4L2 backend (feature `camera-v4l2`) drives a real device node.

use anyhow::{anyhow, Result};
use std::time::Duration;

use crate::config::CameraSettings;
use crate::frame::Resolution;

/// Exclusive handle on one camera.
///
/// `read_frame` blocks for the device's frame cadence. `Ok(None)` is an
/// undecoded frame: the device produced nothing usable this cycle but is
/// still alive.
pub trait CameraDevice: Send {
    /// Open the device. May be retried after failure.
    fn open(&mut self) -> Result<Resolution>;

    /// Blocking read of the next frame as packed RGB24.
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>>;

    fn set_exposure(&mut self, value: f64) -> Result<()>;

    fn resolution(&self) -> Resolution;
}

/// Build the backend for a device path. `stub://NAME` selects the synthetic
/// camera; anything else requires the V4L2 feature.
pub fn open_camera(settings: &CameraSettings) -> Result<Box<dyn CameraDevice>> {
    if settings.device.starts_with("stub://") {
        return Ok(Box::new(SyntheticCamera::from_settings(settings)));
    }
    #[cfg(feature = "camera-v4l2")]
    {
        return Ok(Box::new(V4l2Camera::from_settings(settings)));
    }
    #[cfg(not(feature = "camera-v4l2"))]
    Err(anyhow!(
        "device '{}' requires the camera-v4l2 feature",
        settings.device
    ))
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://)
// ----------------------------------------------------------------------------

/// Deterministic pattern generator paced to a target frame rate.
///
/// The first payload byte always carries `tag`, so a consumer can tell which
/// camera a frame came from without inspecting metadata. The rest of the
/// payload varies with the frame counter to exercise motion-sensitive
/// consumers.
pub struct SyntheticCamera {
    resolution: Resolution,
    frame_interval: Duration,
    tag: u8,
    frame_count: u64,
    opened: bool,
    /// Number of open() calls that fail before one succeeds. Test hook for
    /// the fault-and-retry path.
    fail_opens: u32,
    /// Number of read_frame() calls that fail before reads succeed again.
    fail_reads: u32,
    /// Number of read_frame() calls that return an undecoded frame.
    undecode_reads: u32,
}

impl SyntheticCamera {
    pub fn new(resolution: Resolution, target_fps: u32, tag: u8) -> Self {
        let interval_ms = if target_fps == 0 {
            0
        } else {
            1_000 / target_fps as u64
        };
        Self {
            resolution,
            frame_interval: Duration::from_millis(interval_ms),
            tag,
            frame_count: 0,
            opened: false,
            fail_opens: 0,
            fail_reads: 0,
            undecode_reads: 0,
        }
    }

    pub fn from_settings(settings: &CameraSettings) -> Self {
        // Tag from the full trailing number of the device path, so
        // stub://12 and stub://2 stay distinct.
        let tag = settings
            .device
            .rsplit(|c: char| !c.is_ascii_digit())
            .next()
            .and_then(|digits| digits.parse().ok())
            .unwrap_or(0);
        Self::new(
            Resolution::new(settings.width, settings.height),
            settings.target_fps,
            tag,
        )
    }

    /// Make the next `count` open() calls fail.
    pub fn fail_next_opens(mut self, count: u32) -> Self {
        self.fail_opens = count;
        self
    }

    /// Make the next `count` read_frame() calls fail.
    pub fn fail_next_reads(mut self, count: u32) -> Self {
        self.fail_reads = count;
        self
    }

    /// Make the next `count` read_frame() calls return an undecoded frame.
    pub fn undecode_next_reads(mut self, count: u32) -> Self {
        self.undecode_reads = count;
        self
    }
}

impl CameraDevice for SyntheticCamera {
    fn open(&mut self) -> Result<Resolution> {
        if self.fail_opens > 0 {
            self.fail_opens -= 1;
            return Err(anyhow!("synthetic camera {} refused to open", self.tag));
        }
        self.opened = true;
        log::info!(
            "SyntheticCamera[{}]: opened at {}",
            self.tag,
            self.resolution
        );
        Ok(self.resolution)
    }

    fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.opened {
            return Err(anyhow!("synthetic camera {} not opened", self.tag));
        }
        if self.fail_reads > 0 {
            self.fail_reads -= 1;
            return Err(anyhow!("synthetic camera {} read failure", self.tag));
        }
        if !self.frame_interval.is_zero() {
            std::thread::sleep(self.frame_interval);
        }
        if self.undecode_reads > 0 {
            self.undecode_reads -= 1;
            return Ok(None);
        }
        self.frame_count += 1;

        let len = self.resolution.byte_len()?;
        let mut pixels = vec![self.tag; len];
        // Vary a noisy diagonal band per frame so consecutive frames
        // differ, as real sensor data would. Byte 0 stays the tag.
        let noise: u8 = rand::random();
        for (i, pixel) in pixels.iter_mut().enumerate().skip(1) {
            if i % 17 == (self.frame_count as usize) % 17 {
                *pixel = (((i as u64) ^ self.frame_count) as u8).wrapping_add(noise);
            }
        }
        Ok(Some(pixels))
    }

    fn set_exposure(&mut self, value: f64) -> Result<()> {
        log::debug!("SyntheticCamera[{}]: exposure set to {}", self.tag, value);
        Ok(())
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }
}

// ----------------------------------------------------------------------------
// V4L2 camera (feature: camera-v4l2)
// ----------------------------------------------------------------------------

#[cfg(feature = "camera-v4l2")]
pub use v4l2::V4l2Camera;

#[cfg(feature = "camera-v4l2")]
mod v4l2 {
    use super::*;
    use anyhow::Context;
    use ouroboros::self_referencing;

    /// Real device node (e.g. /dev/video0) via libv4l, RGB3 format.
    pub struct V4l2Camera {
        device_path: String,
        requested: Resolution,
        target_fps: u32,
        active: Resolution,
        state: Option<V4l2State>,
    }

    #[self_referencing]
    struct V4l2State {
        device: v4l::Device,
        #[borrows(mut device)]
        #[covariant]
        stream: v4l::prelude::MmapStream<'this, v4l::Device>,
    }

    impl V4l2Camera {
        pub fn from_settings(settings: &CameraSettings) -> Self {
            Self {
                device_path: settings.device.clone(),
                requested: Resolution::new(settings.width, settings.height),
                target_fps: settings.target_fps,
                active: Resolution::new(settings.width, settings.height),
                state: None,
            }
        }
    }

    impl CameraDevice for V4l2Camera {
        fn open(&mut self) -> Result<Resolution> {
            use v4l::buffer::Type;
            use v4l::video::Capture;

            let mut device = v4l::Device::with_path(&self.device_path)
                .with_context(|| format!("open v4l2 device {}", self.device_path))?;
            let mut format = device.format().context("read v4l2 format")?;
            format.width = self.requested.width;
            format.height = self.requested.height;
            format.fourcc = v4l::FourCC::new(b"RGB3");

            let format = match device.set_format(&format) {
                Ok(format) => format,
                Err(err) => {
                    log::warn!(
                        "V4l2Camera: failed to set format on {}: {}",
                        self.device_path,
                        err
                    );
                    device
                        .format()
                        .context("read v4l2 format after set failure")?
                }
            };

            if self.target_fps > 0 {
                let params = v4l::video::capture::Parameters::with_fps(self.target_fps);
                if let Err(err) = device.set_params(&params) {
                    log::warn!(
                        "V4l2Camera: failed to set fps on {}: {}",
                        self.device_path,
                        err
                    );
                }
            }

            self.active = Resolution::new(format.width, format.height);

            let state = V4l2StateBuilder {
                device,
                stream_builder: |device| {
                    v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                        .map_err(|err| {
                            anyhow::Error::new(err).context("create v4l2 buffer stream")
                        })
                },
            }
            .try_build()?;
            self.state = Some(state);

            log::info!(
                "V4l2Camera: opened {} at {}",
                self.device_path,
                self.active
            );
            Ok(self.active)
        }

        fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
            use v4l::io::traits::CaptureStream;

            let state = self.state.as_mut().context("v4l2 device not opened")?;
            let (buf, _meta) = state
                .with_mut(|fields| fields.stream.next())
                .map_err(|err| anyhow::Error::new(err).context("capture v4l2 frame"))?;

            let expected = self.active.byte_len()?;
            if buf.len() != expected {
                // Driver handed back a partial or padded buffer; treat as
                // undecoded rather than corrupting downstream stages.
                return Ok(None);
            }
            Ok(Some(buf.to_vec()))
        }

        fn set_exposure(&mut self, value: f64) -> Result<()> {
            // The device handle is pinned under the capture stream, so
            // exposure goes through v4l2-ctl like the deployment scripts do.
            let status = std::process::Command::new("v4l2-ctl")
                .arg("-d")
                .arg(&self.device_path)
                .arg("-c")
                .arg(format!("exposure_absolute={}", value as i64))
                .status()
                .with_context(|| format!("run v4l2-ctl for {}", self.device_path))?;
            if !status.success() {
                return Err(anyhow!(
                    "v4l2-ctl failed to set exposure on {}",
                    self.device_path
                ));
            }
            Ok(())
        }

        fn resolution(&self) -> Resolution {
            self.active
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_settings() -> CameraSettings {
        CameraSettings {
            name: "camera0".to_string(),
            device: "stub://0".to_string(),
            width: 64,
            height: 48,
            target_fps: 0,
            exposure: 0.01,
        }
    }

    #[test]
    fn synthetic_camera_produces_tagged_frames() -> Result<()> {
        let mut camera = SyntheticCamera::from_settings(&stub_settings());
        camera.open()?;

        let pixels = camera.read_frame()?.expect("frame");
        assert_eq!(pixels.len(), 64 * 48 * 3);
        assert_eq!(pixels[0], 0);
        Ok(())
    }

    #[test]
    fn consecutive_synthetic_frames_differ() -> Result<()> {
        let mut camera = SyntheticCamera::new(Resolution::new(32, 32), 0, 7);
        camera.open()?;
        let first = camera.read_frame()?.expect("frame");
        let second = camera.read_frame()?.expect("frame");
        assert_ne!(first, second);
        assert_eq!(first[0], 7);
        assert_eq!(second[0], 7);
        Ok(())
    }

    #[test]
    fn read_before_open_is_an_error() {
        let mut camera = SyntheticCamera::new(Resolution::new(8, 8), 0, 1);
        assert!(camera.read_frame().is_err());
    }

    #[test]
    fn multi_digit_device_paths_keep_distinct_tags() -> Result<()> {
        let mut settings = stub_settings();
        settings.device = "stub://12".to_string();
        let mut twelve = SyntheticCamera::from_settings(&settings);
        settings.device = "stub://2".to_string();
        let mut two = SyntheticCamera::from_settings(&settings);

        twelve.open()?;
        two.open()?;
        assert_eq!(twelve.read_frame()?.expect("frame")[0], 12);
        assert_eq!(two.read_frame()?.expect("frame")[0], 2);
        Ok(())
    }

    #[test]
    fn fail_next_opens_recovers_after_count() -> Result<()> {
        let mut camera = SyntheticCamera::new(Resolution::new(8, 8), 0, 1).fail_next_opens(2);
        assert!(camera.open().is_err());
        assert!(camera.open().is_err());
        assert!(camera.open().is_ok());
        Ok(())
    }

    #[test]
    fn fail_next_reads_recovers_after_count() -> Result<()> {
        let mut camera = SyntheticCamera::new(Resolution::new(8, 8), 0, 1).fail_next_reads(2);
        camera.open()?;
        assert!(camera.read_frame().is_err());
        assert!(camera.read_frame().is_err());
        assert!(camera.read_frame()?.is_some());
        Ok(())
    }

    #[test]
    fn undecode_next_reads_yields_none_then_frames() -> Result<()> {
        let mut camera = SyntheticCamera::new(Resolution::new(8, 8), 0, 1).undecode_next_reads(1);
        camera.open()?;
        assert!(camera.read_frame()?.is_none());
        assert!(camera.read_frame()?.is_some());
        Ok(())
    }

    #[test]
    fn open_camera_rejects_unknown_device_without_feature() {
        let mut settings = stub_settings();
        settings.device = "/dev/video9".to_string();
        #[cfg(not(feature = "camera-v4l2"))]
        assert!(open_camera(&settings).is_err());
        let _ = settings;
    }
}
