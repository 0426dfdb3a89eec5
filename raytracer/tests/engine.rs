use std::sync::{Arc, RwLock};

use glam::{Vec3, Vec4};
use raytracer::{
    Camera, ComputeDevice, DeviceEvent, Extent, FrameOutcome, HeadlessDevice, Light,
    MaterialKind, RenderEngine, RenderError, RenderSettings, ResourceState, SceneObject,
};
use shaders::{GpuSphere, MAT_TYPE_LAMBERTIAN, SPHERE_STRIDE};

struct Sphere {
    name: String,
    position: Vec3,
    scale: f32,
    colour: Vec4,
}

impl SceneObject for Sphere {
    fn name(&self) -> &str {
        &self.name
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn scale(&self) -> f32 {
        self.scale
    }

    fn colour(&self) -> Vec4 {
        self.colour
    }

    fn material_kind(&self) -> MaterialKind {
        MaterialKind::Lambertian
    }

    fn attenuation(&self) -> f32 {
        0.5
    }
}

struct Fixed(Vec3);

impl Camera for Fixed {
    fn position(&self) -> Vec3 {
        self.0
    }
}

impl Light for Fixed {
    fn position(&self) -> Vec3 {
        self.0
    }
}

fn sphere(name: &str, position: Vec3, scale: f32) -> Arc<RwLock<Sphere>> {
    Arc::new(RwLock::new(Sphere {
        name: name.to_string(),
        position,
        scale,
        colour: Vec4::new(1.0, 0.0, 0.0, 1.0),
    }))
}

fn engine(extent: Extent, samples_per_pixel: u32) -> RenderEngine<HeadlessDevice> {
    let settings = RenderSettings {
        samples_per_pixel,
        seed: Some(7),
        ..Default::default()
    };

    RenderEngine::new(
        HeadlessDevice::new(),
        settings,
        Arc::new(RwLock::new(Fixed(Vec3::new(0.0, 0.0, -5.0)))),
        Arc::new(RwLock::new(Fixed(Vec3::new(0.0, 0.0, -10.0)))),
        extent,
    )
    .unwrap()
}

fn object_uploads(device: &HeadlessDevice) -> Vec<Vec<u8>> {
    device
        .events()
        .iter()
        .filter_map(|e| match e {
            DeviceEvent::BufferWritten {
                label: "objects",
                bytes,
                ..
            } => Some(bytes.clone()),
            _ => None,
        })
        .collect()
}

fn count(device: &HeadlessDevice, pred: impl Fn(&DeviceEvent) -> bool) -> usize {
    device.events().iter().filter(|e| pred(e)).count()
}

#[test]
fn empty_scene_renders_background() {
    let mut engine = engine(Extent::new(64, 64), 1);

    assert_eq!(engine.render().unwrap(), FrameOutcome::Presented);

    let uploads = object_uploads(engine.device());
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].is_empty());

    let background = engine.settings().background;
    let frame = engine.device().last_presented().unwrap();
    assert_eq!(frame.extent, Extent::new(64, 64));
    for pixel in &frame.pixels {
        assert_eq!(*pixel, [background.x, background.y, background.z, 1.0]);
    }
}

#[test]
fn single_sphere_frame() {
    let mut engine = engine(Extent::new(16, 16), 4);
    engine
        .register(sphere("ball", Vec3::ZERO, 2.0))
        .unwrap();

    assert_eq!(engine.render().unwrap(), FrameOutcome::Presented);

    let device = engine.device();
    let uploads = object_uploads(device);
    let spheres: Vec<GpuSphere> = bytemuck::pod_collect_to_vec(&uploads[0]);
    assert_eq!(spheres.len(), 1);
    assert_eq!(spheres[0].center, [0.0, 0.0, 0.0]);
    assert_eq!(spheres[0].radius, 1.0);
    assert_eq!(spheres[0].material.kind, MAT_TYPE_LAMBERTIAN);

    let sample_sizes: Vec<u64> = device
        .events()
        .iter()
        .filter_map(|e| match e {
            DeviceEvent::BufferCreated {
                label: "samples",
                size,
                ..
            } => Some(*size),
            _ => None,
        })
        .collect();
    assert_eq!(sample_sizes, vec![1024 * 8]);

    // The centre of the image looks straight at the sphere, the corner misses it.
    let frame = device.last_presented().unwrap();
    let centre = frame.pixel(8, 8);
    assert!(centre[0] > 0.5 && centre[1] == 0.0, "{centre:?}");
    let background = engine.settings().background;
    let corner = Vec4::from_array(frame.pixel(0, 0));
    assert!(corner.abs_diff_eq(background, 1e-6), "{corner:?}");
}

#[test]
fn unchanged_scene_uploads_identical_bytes() {
    let mut engine = engine(Extent::new(32, 24), 2);
    engine.register(sphere("a", Vec3::ZERO, 1.0)).unwrap();
    engine
        .register(sphere("b", Vec3::new(1.0, 1.0, 2.0), 0.5))
        .unwrap();

    engine.render().unwrap();
    engine.render().unwrap();

    let uploads = object_uploads(engine.device());
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0], uploads[1]);
    assert_eq!(uploads[0].len(), 2 * SPHERE_STRIDE);
    assert_eq!(engine.sample_generations(), 1);
}

#[test]
fn moving_object_changes_upload_without_reallocation() {
    let mut engine = engine(Extent::new(8, 8), 1);
    let ball = sphere("ball", Vec3::ZERO, 1.0);
    engine.register(ball.clone()).unwrap();

    engine.render().unwrap();
    ball.write().unwrap().position = Vec3::new(0.0, 0.25, 0.0);
    engine.render().unwrap();

    let device = engine.device();
    let uploads = object_uploads(device);
    assert_ne!(uploads[0], uploads[1]);
    assert_eq!(
        count(device, |e| matches!(e, DeviceEvent::TextureCreated { .. })),
        1
    );
    assert_eq!(engine.resources().epochs(), 1);
}

#[test]
fn resize_releases_before_reallocating() {
    let mut engine = engine(Extent::new(640, 480), 1);
    engine.render().unwrap();
    engine.device_mut().clear_events();

    engine.update_window_size(Extent::new(1280, 720));
    engine.render().unwrap();

    let events = engine.device().events();
    let released: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| {
            matches!(
                e,
                DeviceEvent::BufferReleased { .. } | DeviceEvent::TextureReleased { .. }
            )
        })
        .map(|(i, _)| i)
        .collect();
    let created = events
        .iter()
        .position(|e| {
            matches!(
                e,
                DeviceEvent::BufferCreated { .. } | DeviceEvent::TextureCreated { .. }
            )
        })
        .unwrap();

    assert_eq!(
        count(engine.device(), |e| matches!(
            e,
            DeviceEvent::TextureReleased { .. }
        )),
        1
    );
    assert_eq!(
        count(engine.device(), |e| matches!(
            e,
            DeviceEvent::BufferReleased {
                label: "samples",
                ..
            }
        )),
        1
    );
    assert!(released.iter().all(|i| *i < created));

    // Only one dispatch, and it ran at the new size.
    let dispatches: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            DeviceEvent::Dispatched { push_constants, .. } => {
                Some(push_constants.screen_size_pixels)
            }
            _ => None,
        })
        .collect();
    assert_eq!(dispatches, vec![[1280, 720]]);
    assert_eq!(engine.sample_generations(), 2);
}

#[test]
fn object_count_change_starts_new_epoch() {
    let mut engine = engine(Extent::new(8, 8), 1);
    let a = engine.register(sphere("a", Vec3::ZERO, 1.0)).unwrap();
    engine.render().unwrap();

    engine.register(sphere("b", Vec3::X, 1.0)).unwrap();
    engine.render().unwrap();
    assert_eq!(engine.resources().epochs(), 2);

    engine.deregister(a).unwrap();
    engine.render().unwrap();
    assert_eq!(engine.resources().epochs(), 3);

    // Resolution and sample count did not change, so the jitter table was reused.
    assert_eq!(engine.sample_generations(), 1);

    let device = engine.device();
    assert_eq!(
        count(device, |e| matches!(e, DeviceEvent::TextureCreated { .. })),
        3
    );
    assert_eq!(
        count(device, |e| matches!(e, DeviceEvent::TextureReleased { .. })),
        2
    );
}

#[test]
fn zero_extent_skips_frame() {
    let mut engine = engine(Extent::new(8, 8), 1);
    engine.update_window_size(Extent::new(0, 8));

    assert_eq!(engine.render().unwrap(), FrameOutcome::Skipped);
    assert!(engine.device().events().is_empty());

    engine.update_window_size(Extent::new(8, 8));
    assert_eq!(engine.render().unwrap(), FrameOutcome::Presented);
}

#[test]
fn out_of_date_target_is_reported() {
    let mut engine = engine(Extent::new(8, 8), 1);
    engine.device_mut().invalidate_target();

    assert_eq!(engine.render().unwrap(), FrameOutcome::TargetOutOfDate);
    assert_eq!(engine.render().unwrap(), FrameOutcome::Presented);
}

#[test]
fn release_and_drop_leave_nothing_live() {
    let mut engine = engine(Extent::new(8, 8), 1);
    engine.register(sphere("a", Vec3::ZERO, 1.0)).unwrap();
    engine.render().unwrap();
    assert_eq!(engine.device().live_handles(), 3);

    engine.release();
    assert_eq!(engine.resources().state(), ResourceState::Released);
    assert_eq!(engine.device().live_handles(), 0);

    engine.render().unwrap();
    assert_eq!(engine.resources().state(), ResourceState::Allocated);
    assert_eq!(engine.device().live_handles(), 3);
}

#[test]
fn invalid_construction_is_rejected() {
    let camera = Arc::new(RwLock::new(Fixed(Vec3::ZERO)));
    let light = Arc::new(RwLock::new(Fixed(Vec3::Y)));

    let empty = RenderEngine::new(
        HeadlessDevice::new(),
        RenderSettings::default(),
        camera.clone(),
        light.clone(),
        Extent::new(0, 0),
    );
    assert!(matches!(empty, Err(RenderError::Configuration(_))));

    let no_samples = RenderEngine::new(
        HeadlessDevice::new(),
        RenderSettings {
            samples_per_pixel: 0,
            ..Default::default()
        },
        camera,
        light,
        Extent::new(8, 8),
    );
    assert!(no_samples.is_err());
}

#[test]
fn invalid_object_is_not_registered() {
    let mut engine = engine(Extent::new(8, 8), 1);
    let result = engine.register(sphere("flat", Vec3::ZERO, -1.0));

    assert!(matches!(result, Err(RenderError::InvalidObject { .. })));
    assert!(engine.registry().is_empty());
}

#[test]
fn device_is_usable_directly() {
    let mut device = HeadlessDevice::new();
    let buffer = device.create_storage_buffer("objects", 64).unwrap();
    assert_eq!(device.live_handles(), 1);
    device.release_buffer(buffer);
    assert_eq!(device.live_handles(), 0);
}
