use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use glam::{Vec3, Vec4};
use log::debug;
use shaders::GpuSphere;

use crate::{Material, MaterialKind, RenderError};

/// Read-only view of a renderable sphere owned by the host.
pub trait SceneObject {
    fn name(&self) -> &str;

    /// World-space centre.
    fn position(&self) -> Vec3;

    /// Uniform scale. This is the sphere's diameter.
    fn scale(&self) -> f32;

    fn colour(&self) -> Vec4;

    fn material_kind(&self) -> MaterialKind;

    fn attenuation(&self) -> f32;
}

/// Camera interface.
pub trait Camera {
    /// Returns the world-space position rays originate from.
    fn position(&self) -> Vec3;
}

/// Light interface.
pub trait Light {
    /// Returns the world-space position of the light.
    fn position(&self) -> Vec3;
}

pub type SharedObject = Arc<RwLock<dyn SceneObject>>;

/// Acquires a read guard, ignoring poisoning.
pub(crate) fn read_lock<T: ?Sized>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

/// Converts a uniform scale into a sphere radius.
pub fn radius_from_scale(scale: f32) -> f32 {
    scale * 0.5
}

/// Handle returned by [`SceneRegistry::register`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

pub struct RegisteredObject {
    id: ObjectId,
    object: SharedObject,
    material: Material,
}

impl RegisteredObject {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn object(&self) -> &SharedObject {
        &self.object
    }

    /// Material captured at registration.
    pub fn material(&self) -> &Material {
        &self.material
    }
}

/// Ordered set of objects the engine renders.
#[derive(Default)]
pub struct SceneRegistry {
    objects: Vec<RegisteredObject>,
    next_id: u64,
    generation: u64,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `object`, caches its material and appends it to the render order.
    pub fn register(&mut self, object: SharedObject) -> Result<ObjectId, RenderError> {
        let material = {
            let o = read_lock(&object);
            validate(&*o)?;
            Material::new(o.material_kind(), o.colour(), o.attenuation())
        };

        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.generation += 1;

        debug!(
            "Registered scene object {id:?} '{}' (generation {})",
            read_lock(&object).name(),
            self.generation
        );

        self.objects.push(RegisteredObject {
            id,
            object,
            material,
        });

        Ok(id)
    }

    /// Removes an object, keeping the relative order of the rest. Returns `None` for an
    /// unknown or already removed id.
    pub fn deregister(&mut self, id: ObjectId) -> Option<SharedObject> {
        let index = self.objects.iter().position(|o| o.id == id)?;
        let removed = self.objects.remove(index);
        self.generation += 1;

        debug!(
            "Deregistered scene object {id:?} (generation {})",
            self.generation
        );

        Some(removed.object)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Incremented on every registration and removal.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn objects(&self) -> &[RegisteredObject] {
        &self.objects
    }

    pub fn snapshot(&self) -> Vec<GpuSphere> {
        build_snapshot(&self.objects)
    }
}

/// Produces one sphere record per object, in registration order, reading each object's
/// current position and scale together with its cached material.
pub fn build_snapshot(objects: &[RegisteredObject]) -> Vec<GpuSphere> {
    objects
        .iter()
        .map(|registered| {
            let object = read_lock(&registered.object);
            GpuSphere {
                center: object.position().to_array(),
                radius: radius_from_scale(object.scale()),
                material: registered.material.to_shader(),
            }
        })
        .collect()
}

fn validate(object: &dyn SceneObject) -> Result<(), RenderError> {
    let invalid = |reason: String| RenderError::InvalidObject {
        name: object.name().to_string(),
        reason,
    };

    if !object.position().is_finite() {
        return Err(invalid(format!(
            "position {} is not finite",
            object.position()
        )));
    }

    let scale = object.scale();
    if !scale.is_finite() || scale <= 0.0 {
        return Err(invalid(format!(
            "scale {scale} must be finite and positive"
        )));
    }

    if !object.colour().is_finite() {
        return Err(invalid(format!("colour {} is not finite", object.colour())));
    }

    let attenuation = object.attenuation();
    if !(0.0..=1.0).contains(&attenuation) {
        return Err(invalid(format!(
            "attenuation {attenuation} is outside [0, 1]"
        )));
    }

    Ok(())
}
