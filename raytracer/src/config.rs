use glam::{Vec2, Vec3, Vec4};
use shaders::RaytracePushConstants;

use crate::RenderError;

/// Pixel dimensions of the output texture and display target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` when either dimension is zero, e.g. for a minimised window.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Settings fixed for the lifetime of a render engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderSettings {
    pub samples_per_pixel: u32,
    pub max_depth: u32,

    /// Height of the screen plane in world units.
    pub world_height: f32,

    pub background: Vec4,

    /// Seed for jitter generation. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            samples_per_pixel: 10,
            max_depth: 10,
            world_height: 1.0,
            background: Vec4::new(125.0 / 255.0, 206.0 / 255.0, 235.0 / 255.0, 1.0),
            seed: None,
        }
    }
}

impl RenderSettings {
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.samples_per_pixel == 0 {
            return Err(RenderError::Configuration(
                "samples per pixel must be at least 1".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(RenderError::Configuration(
                "max depth must be at least 1".to_string(),
            ));
        }
        if !self.world_height.is_finite() || self.world_height <= 0.0 {
            return Err(RenderError::Configuration(format!(
                "world height must be finite and positive, got {}",
                self.world_height
            )));
        }
        if !self.background.is_finite() {
            return Err(RenderError::Configuration(format!(
                "background colour must be finite, got {}",
                self.background
            )));
        }
        Ok(())
    }
}

/// Everything the kernel needs to know about one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameConfig {
    pub extent: Extent,

    /// Size of the screen plane in world units; width follows the extent's aspect ratio.
    pub world_size: Vec2,

    pub samples_per_pixel: u32,
    pub max_depth: u32,
    pub camera_position: Vec3,
    pub light_position: Vec3,
    pub background: Vec4,
}

impl FrameConfig {
    /// `extent` must not be empty.
    pub fn new(
        settings: &RenderSettings,
        extent: Extent,
        camera_position: Vec3,
        light_position: Vec3,
    ) -> Self {
        let world_size = Vec2::new(
            settings.world_height * extent.aspect_ratio(),
            settings.world_height,
        );

        Self {
            extent,
            world_size,
            samples_per_pixel: settings.samples_per_pixel,
            max_depth: settings.max_depth,
            camera_position,
            light_position,
            background: settings.background,
        }
    }

    /// World-space size of one pixel on the screen plane.
    pub fn pixel_extent(&self) -> Vec2 {
        self.world_size / Vec2::new(self.extent.width as f32, self.extent.height as f32)
    }

    pub fn push_constants(&self, object_count: u32) -> RaytracePushConstants {
        RaytracePushConstants {
            background_colour: self.background.to_array(),
            camera_position: self.camera_position.extend(1.0).to_array(),
            light_position: self.light_position.extend(1.0).to_array(),
            screen_size_world: self.world_size.to_array(),
            screen_size_pixels: [self.extent.width, self.extent.height],
            samples_per_pixel: self.samples_per_pixel,
            max_depth: self.max_depth,
            object_count,
            _pad: 0,
        }
    }
}

/// The inputs that size device resources. Any change starts a new configuration epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EpochKey {
    pub extent: Extent,
    pub samples_per_pixel: u32,
    pub object_count: usize,
}

impl EpochKey {
    pub fn new(extent: Extent, samples_per_pixel: u32, object_count: usize) -> Self {
        Self {
            extent,
            samples_per_pixel,
            object_count,
        }
    }

    /// Number of entries in the jitter sample buffer.
    pub fn sample_count(&self) -> usize {
        self.extent.pixel_count() * self.samples_per_pixel as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_width_follows_aspect_ratio() {
        let settings = RenderSettings {
            world_height: 2.0,
            ..Default::default()
        };
        let config = FrameConfig::new(&settings, Extent::new(640, 480), Vec3::ZERO, Vec3::Y);

        assert_eq!(config.world_size, Vec2::new(2.0 * 640.0 / 480.0, 2.0));
        assert!((config.pixel_extent().x - config.pixel_extent().y).abs() < 1e-6);
    }

    #[test]
    fn push_constants_carry_frame_values() {
        let settings = RenderSettings::default();
        let config = FrameConfig::new(
            &settings,
            Extent::new(16, 8),
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::new(1.0, 2.0, 3.0),
        );
        let pc = config.push_constants(3);

        assert_eq!(pc.screen_size_pixels, [16, 8]);
        assert_eq!(pc.samples_per_pixel, 10);
        assert_eq!(pc.max_depth, 10);
        assert_eq!(pc.object_count, 3);
        assert_eq!(pc.camera_position, [0.0, 0.0, -5.0, 1.0]);
        assert_eq!(pc.light_position, [1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn validate_rejects_degenerate_settings() {
        let zero_samples = RenderSettings {
            samples_per_pixel: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_samples.validate(),
            Err(RenderError::Configuration(_))
        ));

        let zero_depth = RenderSettings {
            max_depth: 0,
            ..Default::default()
        };
        assert!(zero_depth.validate().is_err());

        let nan_height = RenderSettings {
            world_height: f32::NAN,
            ..Default::default()
        };
        assert!(nan_height.validate().is_err());

        assert!(RenderSettings::default().validate().is_ok());
    }

    #[test]
    fn epoch_sample_count() {
        let key = EpochKey::new(Extent::new(16, 16), 4, 1);
        assert_eq!(key.sample_count(), 1024);
        assert!(Extent::new(0, 10).is_empty());
        assert!(!Extent::new(1, 1).is_empty());
    }
}
