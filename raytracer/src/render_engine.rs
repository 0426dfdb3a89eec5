use std::sync::{Arc, RwLock};

use log::{debug, error, info, warn};

use crate::{
    Camera, Compositor, ComputeDevice, DeviceResources, Dispatcher, EpochKey, Extent,
    FrameConfig, Light, ObjectId, PresentOutcome, RenderError, RenderSettings, SampleSource,
    SceneRegistry, SharedObject, read_lock,
};

/// What happened to a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,

    /// The window has no area, so nothing was rendered.
    Skipped,

    /// The frame was rendered but the display target must be recreated before it can be shown.
    TargetOutOfDate,
}

/// Owns the device, the registered scene and the per-epoch resources, and renders frames.
pub struct RenderEngine<D: ComputeDevice> {
    device: D,
    settings: RenderSettings,

    registry: SceneRegistry,
    camera: Arc<RwLock<dyn Camera>>,
    light: Arc<RwLock<dyn Light>>,

    /// Current size of the display target.
    extent: Extent,

    samples: SampleSource,
    resources: DeviceResources<D>,
    dispatcher: Dispatcher,
    compositor: Compositor,

    frame_index: u64,
}

impl<D: ComputeDevice> RenderEngine<D> {
    pub fn new(
        device: D,
        settings: RenderSettings,
        camera: Arc<RwLock<dyn Camera>>,
        light: Arc<RwLock<dyn Light>>,
        extent: Extent,
    ) -> Result<Self, RenderError> {
        settings.validate()?;

        if extent.is_empty() {
            return Err(RenderError::Configuration(format!(
                "initial extent {}x{} has no area",
                extent.width, extent.height
            )));
        }

        info!(
            "Render engine: {}x{}, {} spp, max depth {}",
            extent.width, extent.height, settings.samples_per_pixel, settings.max_depth
        );

        Ok(Self {
            device,
            samples: SampleSource::new(settings.seed),
            settings,
            registry: SceneRegistry::new(),
            camera,
            light,
            extent,
            resources: DeviceResources::new(),
            dispatcher: Dispatcher::default(),
            compositor: Compositor,
            frame_index: 0,
        })
    }

    /// Adds an object to the end of the render order. It is included from the next frame on.
    pub fn register(&mut self, object: SharedObject) -> Result<ObjectId, RenderError> {
        self.registry.register(object)
    }

    pub fn deregister(&mut self, id: ObjectId) -> Option<SharedObject> {
        self.registry.deregister(id)
    }

    /// Records a new display size. Resources are reallocated on the next rendered frame.
    pub fn update_window_size(&mut self, extent: Extent) {
        if extent != self.extent {
            debug!(
                "Window size {}x{} -> {}x{}",
                self.extent.width, self.extent.height, extent.width, extent.height
            );
            self.extent = extent;
        }
    }

    /// Renders and presents one frame.
    pub fn render(&mut self) -> Result<FrameOutcome, RenderError> {
        if self.extent.is_empty() {
            warn!(
                "Skipping frame {}: window is {}x{}",
                self.frame_index, self.extent.width, self.extent.height
            );
            return Ok(FrameOutcome::Skipped);
        }

        let outcome = self.render_frame();
        if let Err(e) = &outcome {
            error!("Frame {} failed: {e}", self.frame_index);
        }
        self.frame_index += 1;
        outcome
    }

    fn render_frame(&mut self) -> Result<FrameOutcome, RenderError> {
        let camera_position = read_lock(&self.camera).position();
        let light_position = read_lock(&self.light).position();
        let config = FrameConfig::new(&self.settings, self.extent, camera_position, light_position);

        let snapshot = self.registry.snapshot();
        let key = EpochKey::new(self.extent, self.settings.samples_per_pixel, snapshot.len());

        if !self.resources.is_current(&key) {
            info!(
                "New epoch at frame {}: {}x{}, {} spp, {} objects",
                self.frame_index,
                key.extent.width,
                key.extent.height,
                key.samples_per_pixel,
                key.object_count
            );

            self.resources.invalidate();
            let table =
                self.samples
                    .table(key.extent, key.samples_per_pixel, config.pixel_extent());
            self.resources.allocate(&mut self.device, key, table)?;
        }

        self.dispatcher
            .dispatch_frame(&mut self.device, &mut self.resources, &snapshot, &config)?;

        match self.compositor.present(&mut self.device, &self.resources)? {
            PresentOutcome::Presented => Ok(FrameOutcome::Presented),
            PresentOutcome::TargetOutOfDate => Ok(FrameOutcome::TargetOutOfDate),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the device, e.g. to recreate the display target.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }

    pub fn resources(&self) -> &DeviceResources<D> {
        &self.resources
    }

    /// Number of jitter tables generated so far.
    pub fn sample_generations(&self) -> u64 {
        self.samples.generations()
    }

    /// Number of frames attempted, skipped frames excluded.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Releases device resources. The engine allocates again on the next frame.
    pub fn release(&mut self) {
        self.resources.release(&mut self.device);
    }
}

impl<D: ComputeDevice> Drop for RenderEngine<D> {
    fn drop(&mut self) {
        debug!("RenderEngine::drop()");
        self.resources.release(&mut self.device);
    }
}
