use log::debug;
use shaders::{GpuSphere, WORKGROUP_SIZE};

use crate::{ComputeDevice, DeviceResources, EpochKey, Extent, FrameConfig, RenderError};

/// Number of `tile`-sized groups needed to cover `length` invocations.
pub fn workgroup_count(length: u32, tile: u32) -> u32 {
    length.div_ceil(tile)
}

/// Workgroup grid for one dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Workgroups {
    pub x: u32,
    pub y: u32,

    /// Edge length of each square group in invocations.
    pub tile_size: u32,
}

impl Workgroups {
    pub fn for_extent(extent: Extent, tile_size: u32) -> Self {
        Self {
            x: workgroup_count(extent.width, tile_size),
            y: workgroup_count(extent.height, tile_size),
            tile_size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x == 0 || self.y == 0
    }
}

/// Uploads the frame's objects and issues the kernel dispatch.
pub struct Dispatcher {
    tile_size: u32,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self {
            tile_size: WORKGROUP_SIZE,
        }
    }
}

impl Dispatcher {
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Writes `snapshot` to the object buffer, then dispatches the kernel against the allocated
    /// resources. The resources must have been allocated for exactly this frame's epoch.
    pub fn dispatch_frame<D: ComputeDevice>(
        &self,
        device: &mut D,
        resources: &mut DeviceResources<D>,
        snapshot: &[GpuSphere],
        config: &FrameConfig,
    ) -> Result<(), RenderError> {
        let workgroups = Workgroups::for_extent(config.extent, self.tile_size);
        if workgroups.is_empty() {
            return Err(RenderError::Configuration(format!(
                "cannot dispatch over an empty {}x{} extent",
                config.extent.width, config.extent.height
            )));
        }

        let key = EpochKey::new(config.extent, config.samples_per_pixel, snapshot.len());
        resources.upload_objects(device, &key, snapshot)?;

        let push_constants = config.push_constants(snapshot.len() as u32);
        let bindings = resources.bindings(&key)?;

        debug!(
            "Dispatching {}x{} workgroups of {}x{} for {} objects",
            workgroups.x,
            workgroups.y,
            workgroups.tile_size,
            workgroups.tile_size,
            snapshot.len()
        );

        device.dispatch(bindings, &push_constants, workgroups)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workgroup_count_examples() {
        assert_eq!(workgroup_count(1920, 8), 240);
        assert_eq!(workgroup_count(1921, 8), 241);
        assert_eq!(workgroup_count(16, 16), 1);
        assert_eq!(workgroup_count(17, 16), 2);
        assert_eq!(workgroup_count(0, 16), 0);
    }

    #[test]
    fn test_workgroups_cover_without_spare_group() {
        for tile in [1, 8, 16, 32] {
            for width in 1..=300 {
                let wg = workgroup_count(width, tile);
                assert!(tile * wg >= width, "tile {tile} width {width}");
                assert!(tile * wg < width + tile, "tile {tile} width {width}");
            }
        }
    }

    #[test]
    fn test_workgroups_for_extent() {
        let wg = Workgroups::for_extent(Extent::new(640, 481), 16);
        assert_eq!(wg, Workgroups { x: 40, y: 31, tile_size: 16 });
        assert!(Workgroups::for_extent(Extent::new(0, 480), 16).is_empty());
    }
}
