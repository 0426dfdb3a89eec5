use std::mem::size_of;

use log::{debug, info, warn};
use shaders::{
    GpuSphere, JITTER_SAMPLE_STRIDE, JitterSample, LAYOUT_VERSION, PUSH_CONSTANTS_SIZE,
    RaytracePushConstants, SPHERE_STRIDE,
};

use crate::{ComputeDevice, EpochKey, KernelBindings, RenderError};

/// Lifecycle of the device resource set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceState {
    /// Nothing has been allocated yet.
    Uninitialized,

    /// Resources exist and match the current epoch.
    Allocated,

    /// Resources exist but belong to a previous epoch. They are released before reallocation.
    Stale,

    /// Resources have been released.
    Released,
}

/// The three device resources valid for one configuration epoch.
pub struct ResourceSet<D: ComputeDevice> {
    key: EpochKey,
    object_buffer: D::Buffer,
    sample_buffer: D::Buffer,
    output_texture: D::Texture,
}

impl<D: ComputeDevice> ResourceSet<D> {
    pub fn key(&self) -> &EpochKey {
        &self.key
    }
}

enum Slot<D: ComputeDevice> {
    Uninitialized,
    Allocated(ResourceSet<D>),
    Stale(ResourceSet<D>),
    Released,
}

/// Owns the object buffer, sample buffer and output texture, and releases each exactly once.
pub struct DeviceResources<D: ComputeDevice> {
    slot: Slot<D>,
    epochs: u64,
}

impl<D: ComputeDevice> Default for DeviceResources<D> {
    fn default() -> Self {
        Self {
            slot: Slot::Uninitialized,
            epochs: 0,
        }
    }
}

impl<D: ComputeDevice> DeviceResources<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ResourceState {
        match self.slot {
            Slot::Uninitialized => ResourceState::Uninitialized,
            Slot::Allocated(_) => ResourceState::Allocated,
            Slot::Stale(_) => ResourceState::Stale,
            Slot::Released => ResourceState::Released,
        }
    }

    /// Number of resource sets allocated so far.
    pub fn epochs(&self) -> u64 {
        self.epochs
    }

    /// Key of the allocated set, if any.
    pub fn current_key(&self) -> Option<&EpochKey> {
        match &self.slot {
            Slot::Allocated(set) => Some(&set.key),
            _ => None,
        }
    }

    /// Returns `true` if a set is allocated for exactly `key`.
    pub fn is_current(&self, key: &EpochKey) -> bool {
        self.current_key() == Some(key)
    }

    /// Marks an allocated set as belonging to a previous epoch.
    pub fn invalidate(&mut self) {
        self.slot = match std::mem::replace(&mut self.slot, Slot::Uninitialized) {
            Slot::Allocated(set) => {
                debug!("Resources for {:?} are now stale", set.key);
                Slot::Stale(set)
            }
            other => other,
        };
    }

    /// Allocates resources for `key` and uploads `samples` into the sample buffer. Any set from a
    /// previous epoch is released first. Does nothing if a set for `key` is already allocated.
    pub fn allocate(
        &mut self,
        device: &mut D,
        key: EpochKey,
        samples: &[JitterSample],
    ) -> Result<(), RenderError> {
        if self.is_current(&key) {
            return Ok(());
        }

        self.invalidate();
        if matches!(self.slot, Slot::Stale(_)) {
            self.release(device);
        }

        check_layouts()?;

        if key.extent.is_empty() {
            return Err(RenderError::Configuration(format!(
                "cannot allocate resources for an empty {}x{} extent",
                key.extent.width, key.extent.height
            )));
        }
        if key.samples_per_pixel == 0 {
            return Err(RenderError::Configuration(
                "cannot allocate resources for 0 samples per pixel".to_string(),
            ));
        }
        if samples.len() != key.sample_count() {
            return Err(RenderError::Configuration(format!(
                "expected {} jitter samples, got {}",
                key.sample_count(),
                samples.len()
            )));
        }

        let set = create_set(device, key, samples)?;
        self.epochs += 1;

        info!(
            "Allocated resources for {}x{}, {} spp, {} objects (epoch {}, layout v{LAYOUT_VERSION})",
            key.extent.width,
            key.extent.height,
            key.samples_per_pixel,
            key.object_count,
            self.epochs
        );

        self.slot = Slot::Allocated(set);
        Ok(())
    }

    /// Writes `snapshot` into the object buffer of the set allocated for `key`. An empty
    /// snapshot is a zero-length write.
    pub fn upload_objects(
        &mut self,
        device: &mut D,
        key: &EpochKey,
        snapshot: &[GpuSphere],
    ) -> Result<(), RenderError> {
        let set = self.current_set_mut(key)?;

        if snapshot.len() != set.key.object_count {
            return Err(RenderError::Configuration(format!(
                "object buffer holds {} objects but {} were uploaded",
                set.key.object_count,
                snapshot.len()
            )));
        }

        device.write_buffer(&mut set.object_buffer, bytemuck::cast_slice(snapshot))?;
        Ok(())
    }

    /// Borrows the set allocated for `key` as kernel bindings.
    pub fn bindings(&mut self, key: &EpochKey) -> Result<KernelBindings<'_, D>, RenderError> {
        let set = self.current_set_mut(key)?;
        Ok(KernelBindings {
            objects: &set.object_buffer,
            samples: &set.sample_buffer,
            output: &mut set.output_texture,
        })
    }

    /// The output texture of the allocated set.
    pub fn output_texture(&self) -> Option<&D::Texture> {
        match &self.slot {
            Slot::Allocated(set) => Some(&set.output_texture),
            _ => None,
        }
    }

    /// Releases whatever is held. Calling it again is a no-op.
    pub fn release(&mut self, device: &mut D) {
        match std::mem::replace(&mut self.slot, Slot::Released) {
            Slot::Allocated(set) | Slot::Stale(set) => {
                info!("Releasing resources for {:?}", set.key);
                release_set(device, set);
            }
            Slot::Uninitialized | Slot::Released => {}
        }
    }

    fn current_set_mut(&mut self, key: &EpochKey) -> Result<&mut ResourceSet<D>, RenderError> {
        match &mut self.slot {
            Slot::Allocated(set) => {
                if set.key == *key {
                    Ok(set)
                } else {
                    Err(RenderError::Configuration(format!(
                        "resources were allocated for {:?} but the frame needs {key:?}",
                        set.key
                    )))
                }
            }
            _ => Err(RenderError::Configuration(format!(
                "no resources are allocated for {key:?}"
            ))),
        }
    }
}

impl<D: ComputeDevice> Drop for DeviceResources<D> {
    fn drop(&mut self) {
        if let Slot::Allocated(set) | Slot::Stale(set) = &self.slot {
            warn!(
                "Device resources for {:?} dropped without being released",
                set.key
            );
        }
    }
}

/// Compares every host layout with the stride the kernel declares for it.
pub fn check_layouts() -> Result<(), RenderError> {
    check_stride("GpuSphere", size_of::<GpuSphere>(), SPHERE_STRIDE)?;
    check_stride("JitterSample", size_of::<JitterSample>(), JITTER_SAMPLE_STRIDE)?;
    check_stride(
        "RaytracePushConstants",
        size_of::<RaytracePushConstants>(),
        PUSH_CONSTANTS_SIZE,
    )?;
    Ok(())
}

pub fn check_stride(name: &'static str, host: usize, kernel: usize) -> Result<(), RenderError> {
    if host == kernel {
        Ok(())
    } else {
        Err(RenderError::LayoutMismatch { name, host, kernel })
    }
}

fn create_set<D: ComputeDevice>(
    device: &mut D,
    key: EpochKey,
    samples: &[JitterSample],
) -> Result<ResourceSet<D>, RenderError> {
    // Device APIs reject zero-sized buffers, so an empty scene still gets one element.
    let object_buffer_size = (SPHERE_STRIDE * key.object_count.max(1)) as u64;
    let sample_buffer_size = (JITTER_SAMPLE_STRIDE * key.sample_count()) as u64;

    let object_buffer = device.create_storage_buffer("objects", object_buffer_size)?;

    let mut sample_buffer = match device.create_storage_buffer("samples", sample_buffer_size) {
        Ok(buffer) => buffer,
        Err(e) => {
            device.release_buffer(object_buffer);
            return Err(e.into());
        }
    };

    if let Err(e) = device.write_buffer(&mut sample_buffer, bytemuck::cast_slice(samples)) {
        device.release_buffer(sample_buffer);
        device.release_buffer(object_buffer);
        return Err(e.into());
    }

    let output_texture = match device.create_output_texture(key.extent) {
        Ok(texture) => texture,
        Err(e) => {
            device.release_buffer(sample_buffer);
            device.release_buffer(object_buffer);
            return Err(e.into());
        }
    };

    Ok(ResourceSet {
        key,
        object_buffer,
        sample_buffer,
        output_texture,
    })
}

fn release_set<D: ComputeDevice>(device: &mut D, set: ResourceSet<D>) {
    let ResourceSet {
        object_buffer,
        sample_buffer,
        output_texture,
        ..
    } = set;

    device.release_texture(output_texture);
    device.release_buffer(sample_buffer);
    device.release_buffer(object_buffer);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeviceEvent, Extent, HeadlessDevice};

    fn samples_for(key: &EpochKey) -> Vec<JitterSample> {
        vec![JitterSample::default(); key.sample_count()]
    }

    #[test]
    fn allocate_then_release_leaves_nothing_live() {
        let mut device = HeadlessDevice::new();
        let mut resources = DeviceResources::new();
        assert_eq!(resources.state(), ResourceState::Uninitialized);

        let key = EpochKey::new(Extent::new(8, 4), 2, 3);
        resources
            .allocate(&mut device, key, &samples_for(&key))
            .unwrap();
        assert_eq!(resources.state(), ResourceState::Allocated);
        assert_eq!(device.live_handles(), 3);

        resources.release(&mut device);
        assert_eq!(resources.state(), ResourceState::Released);
        assert_eq!(device.live_handles(), 0);

        let released = device.events().len();
        resources.release(&mut device);
        assert_eq!(device.events().len(), released);
    }

    #[test]
    fn buffers_are_sized_from_kernel_strides() {
        let mut device = HeadlessDevice::new();
        let mut resources = DeviceResources::new();
        let key = EpochKey::new(Extent::new(16, 16), 4, 5);
        resources
            .allocate(&mut device, key, &samples_for(&key))
            .unwrap();

        let sizes: Vec<_> = device
            .events()
            .iter()
            .filter_map(|e| match e {
                DeviceEvent::BufferCreated { label, size, .. } => Some((*label, *size)),
                _ => None,
            })
            .collect();
        assert_eq!(
            sizes,
            vec![
                ("objects", 5 * SPHERE_STRIDE as u64),
                ("samples", 1024 * JITTER_SAMPLE_STRIDE as u64),
            ]
        );

        resources.release(&mut device);
    }

    #[test]
    fn empty_scene_gets_placeholder_buffer_and_empty_upload() {
        let mut device = HeadlessDevice::new();
        let mut resources = DeviceResources::new();
        let key = EpochKey::new(Extent::new(4, 4), 1, 0);
        resources
            .allocate(&mut device, key, &samples_for(&key))
            .unwrap();

        resources.upload_objects(&mut device, &key, &[]).unwrap();

        assert!(device.events().iter().any(|e| matches!(
            e,
            DeviceEvent::BufferCreated { label: "objects", size, .. } if *size == SPHERE_STRIDE as u64
        )));
        assert!(matches!(
            device.events().last(),
            Some(DeviceEvent::BufferWritten { label: "objects", bytes, .. }) if bytes.is_empty()
        ));

        resources.release(&mut device);
    }

    #[test]
    fn bindings_require_the_allocated_key() {
        let mut device = HeadlessDevice::new();
        let mut resources = DeviceResources::new();
        let key = EpochKey::new(Extent::new(4, 4), 1, 1);

        assert!(matches!(
            resources.bindings(&key),
            Err(RenderError::Configuration(_))
        ));

        resources
            .allocate(&mut device, key, &samples_for(&key))
            .unwrap();
        assert!(resources.bindings(&key).is_ok());

        let other = EpochKey::new(Extent::new(8, 4), 1, 1);
        assert!(matches!(
            resources.bindings(&other),
            Err(RenderError::Configuration(msg)) if msg.contains("allocated for")
        ));
        assert!(matches!(
            resources.upload_objects(&mut device, &other, &[GpuSphere::default()]),
            Err(RenderError::Configuration(_))
        ));

        resources.release(&mut device);
    }

    #[test]
    fn new_epoch_releases_old_set_before_allocating() {
        let mut device = HeadlessDevice::new();
        let mut resources = DeviceResources::new();

        let small = EpochKey::new(Extent::new(4, 4), 1, 1);
        resources
            .allocate(&mut device, small, &samples_for(&small))
            .unwrap();
        device.clear_events();

        let large = EpochKey::new(Extent::new(8, 8), 1, 1);
        resources
            .allocate(&mut device, large, &samples_for(&large))
            .unwrap();

        let events = device.events();
        let last_release = events
            .iter()
            .rposition(|e| {
                matches!(
                    e,
                    DeviceEvent::BufferReleased { .. } | DeviceEvent::TextureReleased { .. }
                )
            })
            .unwrap();
        let first_create = events
            .iter()
            .position(|e| {
                matches!(
                    e,
                    DeviceEvent::BufferCreated { .. } | DeviceEvent::TextureCreated { .. }
                )
            })
            .unwrap();
        assert!(last_release < first_create);
        assert_eq!(device.live_handles(), 3);
        assert_eq!(resources.epochs(), 2);
        assert!(resources.is_current(&large));

        resources.release(&mut device);
    }

    #[test]
    fn allocating_same_key_twice_is_a_no_op() {
        let mut device = HeadlessDevice::new();
        let mut resources = DeviceResources::new();
        let key = EpochKey::new(Extent::new(4, 4), 1, 1);
        resources
            .allocate(&mut device, key, &samples_for(&key))
            .unwrap();
        let events = device.events().len();

        resources
            .allocate(&mut device, key, &samples_for(&key))
            .unwrap();
        assert_eq!(device.events().len(), events);
        assert_eq!(resources.epochs(), 1);

        resources.release(&mut device);
    }

    #[test]
    fn invalidate_marks_set_stale() {
        let mut device = HeadlessDevice::new();
        let mut resources = DeviceResources::new();
        let key = EpochKey::new(Extent::new(4, 4), 1, 1);
        resources
            .allocate(&mut device, key, &samples_for(&key))
            .unwrap();

        resources.invalidate();
        assert_eq!(resources.state(), ResourceState::Stale);
        assert!(resources.output_texture().is_none());
        assert!(resources.bindings(&key).is_err());

        resources.release(&mut device);
        assert_eq!(device.live_handles(), 0);
    }

    #[test]
    fn upload_with_wrong_object_count_is_rejected() {
        let mut device = HeadlessDevice::new();
        let mut resources = DeviceResources::new();
        let key = EpochKey::new(Extent::new(4, 4), 1, 2);
        resources
            .allocate(&mut device, key, &samples_for(&key))
            .unwrap();

        let other = EpochKey::new(Extent::new(4, 4), 1, 3);
        let snapshot = vec![GpuSphere::default(); 3];
        assert!(matches!(
            resources.upload_objects(&mut device, &other, &snapshot),
            Err(RenderError::Configuration(_))
        ));
        assert!(resources.upload_objects(&mut device, &key, &snapshot).is_err());

        resources.release(&mut device);
    }

    #[test]
    fn failed_allocation_releases_partial_set() {
        let mut device = HeadlessDevice::new();
        device.fail_texture_creation(true);
        let mut resources = DeviceResources::new();
        let key = EpochKey::new(Extent::new(4, 4), 1, 1);

        assert!(matches!(
            resources.allocate(&mut device, key, &samples_for(&key)),
            Err(RenderError::Device(_))
        ));
        assert_eq!(device.live_handles(), 0);
        assert_ne!(resources.state(), ResourceState::Allocated);
    }

    #[test]
    fn sample_count_must_match_key() {
        let mut device = HeadlessDevice::new();
        let mut resources = DeviceResources::new();
        let key = EpochKey::new(Extent::new(4, 4), 2, 1);

        assert!(
            resources
                .allocate(&mut device, key, &[JitterSample::default(); 3])
                .is_err()
        );
        assert_eq!(device.live_handles(), 0);
    }

    #[test]
    fn stride_mismatch_is_an_error() {
        assert!(check_layouts().is_ok());
        assert!(matches!(
            check_stride("GpuSphere", 48, 64),
            Err(RenderError::LayoutMismatch {
                name: "GpuSphere",
                host: 48,
                kernel: 64
            })
        ));
    }
}
