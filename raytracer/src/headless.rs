use std::collections::HashSet;

use anyhow::{Result, bail, ensure};
use glam::{Vec2, Vec3, Vec4};
use log::debug;
use shaders::{GpuSphere, JitterSample, RaytracePushConstants, SPHERE_STRIDE};

use crate::{ComputeDevice, Extent, KernelBindings, PresentOutcome, Workgroups, sample_index};

/// One call made against a [`HeadlessDevice`], in the order it was made.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceEvent {
    BufferCreated {
        handle: u64,
        label: &'static str,
        size: u64,
    },
    BufferWritten {
        handle: u64,
        label: &'static str,
        bytes: Vec<u8>,
    },
    BufferReleased {
        handle: u64,
        label: &'static str,
    },
    TextureCreated {
        handle: u64,
        extent: Extent,
    },
    TextureReleased {
        handle: u64,
    },
    Dispatched {
        objects: u64,
        samples: u64,
        output: u64,
        workgroups: Workgroups,
        push_constants: RaytracePushConstants,
    },
    Presented {
        texture: u64,
    },
}

pub struct HeadlessBuffer {
    handle: u64,
    label: &'static str,
    data: Vec<u8>,
}

impl HeadlessBuffer {
    pub fn handle(&self) -> u64 {
        self.handle
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

pub struct HeadlessTexture {
    handle: u64,
    extent: Extent,
    pixels: Vec<[f32; 4]>,
}

impl HeadlessTexture {
    pub fn handle(&self) -> u64 {
        self.handle
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Row-major RGBA pixels.
    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.pixels
    }
}

/// Copy of the last texture handed to [`ComputeDevice::present`].
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayFrame {
    pub extent: Extent,
    pub pixels: Vec<[f32; 4]>,
}

impl DisplayFrame {
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.pixels[(y * self.extent.width + x) as usize]
    }
}

/// In-memory device. Buffers and textures are host vectors, the kernel is a CPU preview that
/// traces primary rays only, and every call is recorded in an event journal.
#[derive(Default)]
pub struct HeadlessDevice {
    next_handle: u64,
    live: HashSet<u64>,
    events: Vec<DeviceEvent>,
    presented: Option<DisplayFrame>,
    target_out_of_date: bool,
    fail_texture_creation: bool,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[DeviceEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Number of buffers and textures created and not yet released.
    pub fn live_handles(&self) -> usize {
        self.live.len()
    }

    pub fn last_presented(&self) -> Option<&DisplayFrame> {
        self.presented.as_ref()
    }

    /// Makes the next present report [`PresentOutcome::TargetOutOfDate`].
    pub fn invalidate_target(&mut self) {
        self.target_out_of_date = true;
    }

    /// Makes output texture creation fail until cleared.
    pub fn fail_texture_creation(&mut self, fail: bool) {
        self.fail_texture_creation = fail;
    }

    fn new_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.live.insert(self.next_handle);
        self.next_handle
    }

    fn ensure_live(&self, handle: u64, what: &str) -> Result<()> {
        ensure!(
            self.live.contains(&handle),
            "{what} {handle} used after release"
        );
        Ok(())
    }
}

impl ComputeDevice for HeadlessDevice {
    type Buffer = HeadlessBuffer;
    type Texture = HeadlessTexture;

    fn create_storage_buffer(&mut self, label: &'static str, size: u64) -> Result<HeadlessBuffer> {
        ensure!(size > 0, "Buffer '{label}' requested with size 0");

        let handle = self.new_handle();
        self.events.push(DeviceEvent::BufferCreated {
            handle,
            label,
            size,
        });

        Ok(HeadlessBuffer {
            handle,
            label,
            data: vec![0; size as usize],
        })
    }

    fn write_buffer(&mut self, buffer: &mut HeadlessBuffer, bytes: &[u8]) -> Result<()> {
        self.ensure_live(buffer.handle, "Buffer")?;
        ensure!(
            bytes.len() <= buffer.data.len(),
            "Data size {} is larger than buffer {} size {}",
            bytes.len(),
            buffer.label,
            buffer.data.len()
        );

        buffer.data[..bytes.len()].copy_from_slice(bytes);
        self.events.push(DeviceEvent::BufferWritten {
            handle: buffer.handle,
            label: buffer.label,
            bytes: bytes.to_vec(),
        });

        Ok(())
    }

    fn release_buffer(&mut self, buffer: HeadlessBuffer) {
        self.live.remove(&buffer.handle);
        self.events.push(DeviceEvent::BufferReleased {
            handle: buffer.handle,
            label: buffer.label,
        });
    }

    fn create_output_texture(&mut self, extent: Extent) -> Result<HeadlessTexture> {
        if self.fail_texture_creation {
            bail!("Output texture creation failed for {extent:?}");
        }
        ensure!(!extent.is_empty(), "Output texture requested with {extent:?}");

        let handle = self.new_handle();
        self.events
            .push(DeviceEvent::TextureCreated { handle, extent });

        Ok(HeadlessTexture {
            handle,
            extent,
            pixels: vec![[0.0; 4]; extent.pixel_count()],
        })
    }

    fn release_texture(&mut self, texture: HeadlessTexture) {
        self.live.remove(&texture.handle);
        self.events
            .push(DeviceEvent::TextureReleased { handle: texture.handle });
    }

    fn dispatch(
        &mut self,
        bindings: KernelBindings<'_, Self>,
        push_constants: &RaytracePushConstants,
        workgroups: Workgroups,
    ) -> Result<()> {
        let KernelBindings {
            objects,
            samples,
            output,
        } = bindings;

        self.ensure_live(objects.handle, "Buffer")?;
        self.ensure_live(samples.handle, "Buffer")?;
        self.ensure_live(output.handle, "Texture")?;

        let [width, height] = push_constants.screen_size_pixels;
        ensure!(
            output.extent == Extent::new(width, height),
            "Output texture is {:?} but the kernel was configured for {width}x{height}",
            output.extent
        );

        let object_count = push_constants.object_count as usize;
        ensure!(
            objects.data.len() >= object_count * SPHERE_STRIDE,
            "Object buffer holds {} bytes, {object_count} objects need {}",
            objects.data.len(),
            object_count * SPHERE_STRIDE
        );
        let spheres: Vec<GpuSphere> =
            bytemuck::pod_collect_to_vec(&objects.data[..object_count * SPHERE_STRIDE]);

        let sample_count = output.extent.pixel_count() * push_constants.samples_per_pixel as usize;
        let jitter: Vec<JitterSample> = bytemuck::pod_collect_to_vec(&samples.data);
        ensure!(
            jitter.len() >= sample_count,
            "Sample buffer holds {} samples, the frame needs {sample_count}",
            jitter.len()
        );

        debug!(
            "Headless dispatch {}x{} groups, {object_count} objects",
            workgroups.x, workgroups.y
        );

        let kernel = PreviewKernel::new(push_constants, &spheres, &jitter);
        let tile = workgroups.tile_size;
        for group_y in 0..workgroups.y {
            for group_x in 0..workgroups.x {
                for local_y in 0..tile {
                    for local_x in 0..tile {
                        let x = group_x * tile + local_x;
                        let y = group_y * tile + local_y;
                        if x >= width || y >= height {
                            continue;
                        }
                        output.pixels[(y * width + x) as usize] = kernel.shade_pixel(x, y);
                    }
                }
            }
        }

        self.events.push(DeviceEvent::Dispatched {
            objects: objects.handle,
            samples: samples.handle,
            output: output.handle,
            workgroups,
            push_constants: *push_constants,
        });

        Ok(())
    }

    fn present(&mut self, texture: &HeadlessTexture) -> Result<PresentOutcome> {
        self.ensure_live(texture.handle, "Texture")?;

        if self.target_out_of_date {
            self.target_out_of_date = false;
            return Ok(PresentOutcome::TargetOutOfDate);
        }

        self.presented = Some(DisplayFrame {
            extent: texture.extent,
            pixels: texture.pixels.clone(),
        });
        self.events.push(DeviceEvent::Presented {
            texture: texture.handle,
        });

        Ok(PresentOutcome::Presented)
    }
}

/// Primary-ray shading: nearest sphere hit lit by the point light, background on a miss.
struct PreviewKernel<'a> {
    spheres: &'a [GpuSphere],
    samples: &'a [JitterSample],
    camera: Vec3,
    light: Vec3,
    background: Vec4,
    screen_world: Vec2,
    width: u32,
    height: u32,
    samples_per_pixel: u32,
}

impl<'a> PreviewKernel<'a> {
    fn new(
        pc: &RaytracePushConstants,
        spheres: &'a [GpuSphere],
        samples: &'a [JitterSample],
    ) -> Self {
        Self {
            spheres,
            samples,
            camera: Vec4::from_array(pc.camera_position).truncate(),
            light: Vec4::from_array(pc.light_position).truncate(),
            background: Vec4::from_array(pc.background_colour),
            screen_world: Vec2::from_array(pc.screen_size_world),
            width: pc.screen_size_pixels[0],
            height: pc.screen_size_pixels[1],
            samples_per_pixel: pc.samples_per_pixel,
        }
    }

    fn shade_pixel(&self, x: u32, y: u32) -> [f32; 4] {
        let uv = (Vec2::new(x as f32, y as f32) + 0.5)
            / Vec2::new(self.width as f32, self.height as f32);
        let centre = Vec2::new(uv.x - 0.5, 0.5 - uv.y) * self.screen_world;

        let extent = Extent::new(self.width, self.height);
        let base = sample_index(extent, self.samples_per_pixel, x, y, 0);
        let mut colour = Vec3::ZERO;
        for s in 0..self.samples_per_pixel as usize {
            let jitter = self.samples[base + s];
            let direction = Vec3::new(centre.x + jitter.dx, centre.y + jitter.dy, 1.0).normalize();
            colour += self.trace(direction);
        }

        let colour = colour / self.samples_per_pixel.max(1) as f32;
        [colour.x, colour.y, colour.z, 1.0]
    }

    fn trace(&self, direction: Vec3) -> Vec3 {
        let mut closest: Option<(f32, &GpuSphere)> = None;
        for sphere in self.spheres {
            if let Some(t) = hit_sphere(sphere, self.camera, direction) {
                if closest.is_none_or(|(best, _)| t < best) {
                    closest = Some((t, sphere));
                }
            }
        }

        let Some((t, sphere)) = closest else {
            return self.background.truncate();
        };

        let point = self.camera + direction * t;
        let normal = (point - Vec3::from_array(sphere.center)).normalize();
        let to_light = (self.light - point).normalize();
        let albedo = Vec4::from_array(sphere.material.base_colour).truncate();

        albedo * (0.1 + 0.9 * normal.dot(to_light).max(0.0))
    }
}

fn hit_sphere(sphere: &GpuSphere, origin: Vec3, direction: Vec3) -> Option<f32> {
    const T_MIN: f32 = 0.001;

    let oc = origin - Vec3::from_array(sphere.center);
    let a = direction.length_squared();
    let half_b = oc.dot(direction);
    let c = oc.length_squared() - sphere.radius * sphere.radius;
    let discriminant = half_b * half_b - a * c;
    if discriminant < 0.0 {
        return None;
    }

    let sqrtd = discriminant.sqrt();
    [(-half_b - sqrtd) / a, (-half_b + sqrtd) / a]
        .into_iter()
        .find(|t| *t > T_MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shaders::GpuMaterial;

    fn sphere_at(center: [f32; 3], radius: f32, colour: [f32; 4]) -> GpuSphere {
        GpuSphere {
            center,
            radius,
            material: GpuMaterial::new(0, colour, 0.5),
        }
    }

    #[test]
    fn nearest_root_in_front_of_origin() {
        let sphere = sphere_at([0.0, 0.0, 0.0], 1.0, [1.0; 4]);
        let t = hit_sphere(&sphere, Vec3::new(0.0, 0.0, -5.0), Vec3::Z).unwrap();
        assert!((t - 4.0).abs() < 1e-5);

        assert!(hit_sphere(&sphere, Vec3::new(0.0, 0.0, -5.0), Vec3::Y).is_none());
        assert!(hit_sphere(&sphere, Vec3::new(0.0, 0.0, 5.0), Vec3::Z).is_none());
    }

    #[test]
    fn released_handles_cannot_be_written() {
        let mut device = HeadlessDevice::new();
        let buffer = device.create_storage_buffer("objects", 64).unwrap();
        let mut stale = HeadlessBuffer {
            handle: buffer.handle,
            label: buffer.label,
            data: vec![0; 64],
        };
        device.release_buffer(buffer);

        assert!(device.write_buffer(&mut stale, &[1, 2, 3]).is_err());
        assert_eq!(device.live_handles(), 0);
    }

    #[test]
    fn oversized_write_is_rejected() {
        let mut device = HeadlessDevice::new();
        let mut buffer = device.create_storage_buffer("samples", 8).unwrap();
        assert!(device.write_buffer(&mut buffer, &[0; 9]).is_err());
        device.release_buffer(buffer);
    }

    #[test]
    fn preview_shades_hit_and_miss() {
        let spheres = [sphere_at([0.0, 0.0, 0.0], 1.0, [1.0, 0.0, 0.0, 1.0])];
        let samples = vec![JitterSample::default(); 4];
        let pc = RaytracePushConstants {
            background_colour: [0.2, 0.4, 0.6, 1.0],
            camera_position: [0.0, 0.0, -5.0, 1.0],
            light_position: [0.0, 0.0, -10.0, 1.0],
            screen_size_world: [2.0, 2.0],
            screen_size_pixels: [2, 2],
            samples_per_pixel: 1,
            max_depth: 1,
            object_count: 1,
            _pad: 0,
        };
        let kernel = PreviewKernel::new(&pc, &spheres, &samples);

        // Pixel (0, 0) looks through (-0.5, 0.5, 1), which passes by the sphere.
        assert_eq!(kernel.shade_pixel(0, 0), [0.2, 0.4, 0.6, 1.0]);

        let hit = kernel.trace(Vec3::Z);
        assert!((hit.x - 1.0).abs() < 1e-5);
        assert_eq!(hit.y, 0.0);
    }

    #[test]
    fn preview_reads_jitter_in_pixel_major_order() {
        let spheres = [sphere_at([0.0, 0.0, 0.0], 1.0, [1.0, 0.0, 0.0, 1.0])];
        let pc = RaytracePushConstants {
            background_colour: [0.0, 0.0, 1.0, 1.0],
            camera_position: [0.0, 0.0, -5.0, 1.0],
            light_position: [0.0, 0.0, -10.0, 1.0],
            screen_size_world: [4.0, 2.0],
            screen_size_pixels: [2, 1],
            samples_per_pixel: 2,
            max_depth: 1,
            object_count: 1,
            _pad: 0,
        };

        // Both samples of pixel (1, 0) are pulled back onto the sphere; pixel (0, 0) looks
        // past it at (-1, 0, 1).
        let mut samples = vec![JitterSample::default(); 4];
        let extent = Extent::new(2, 1);
        for s in 0..2 {
            samples[sample_index(extent, 2, 1, 0, s)] = JitterSample { dx: -1.0, dy: 0.0 };
        }
        let kernel = PreviewKernel::new(&pc, &spheres, &samples);

        assert_eq!(kernel.shade_pixel(0, 0), [0.0, 0.0, 1.0, 1.0]);
        let hit = kernel.shade_pixel(1, 0);
        assert!((hit[0] - 1.0).abs() < 1e-5, "{hit:?}");
        assert_eq!(hit[2], 0.0);
    }
}
