use std::sync::{Arc, PoisonError, RwLock};

use glam::{Quat, Vec2, Vec3, Vec4};
use log::info;
use raytracer::{
    Camera, ComputeDevice, Extent, Light, MaterialKind, ObjectId, RenderEngine, RenderError,
    RenderSettings, SceneObject,
};
use scene_file::{MaterialType, Motion, Primitive, SceneFile};

/// How a sphere moves between frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Animation {
    /// Rotates about the vertical axis through `pivot`.
    Orbit { pivot: Vec3, radians_per_second: f32 },

    /// Moves in the XY plane, reversing an axis when the sphere touches the edge of the view.
    Bounce { velocity: Vec2 },
}

impl From<Motion> for Animation {
    fn from(motion: Motion) -> Self {
        match motion {
            Motion::Orbit {
                pivot,
                degrees_per_second,
            } => Self::Orbit {
                pivot: Vec3::from_array(pivot),
                radians_per_second: degrees_per_second.to_radians(),
            },
            Motion::Bounce { velocity } => Self::Bounce {
                velocity: Vec2::from_array(velocity),
            },
        }
    }
}

pub struct SphereObject {
    name: String,
    position: Vec3,
    scale: f32,
    colour: Vec4,
    material: MaterialKind,
    attenuation: f32,
    animation: Option<Animation>,
}

impl SphereObject {
    pub fn from_primitive(primitive: &Primitive) -> Self {
        match primitive {
            Primitive::Sphere {
                name,
                position,
                scale,
                colour,
                material,
                attenuation,
                motion,
            } => Self {
                name: name.clone(),
                position: Vec3::from_array(*position),
                scale: *scale,
                colour: Vec4::from_array(*colour),
                material: match material {
                    MaterialType::Lambertian => MaterialKind::Lambertian,
                    MaterialType::Glossy => MaterialKind::Glossy,
                },
                attenuation: *attenuation,
                animation: motion.map(Animation::from),
            },
        }
    }

    pub fn animation(&self) -> Option<Animation> {
        self.animation
    }

    /// Advances the animation by `dt` seconds. `view_centre` and `half_view` describe the visible
    /// world rectangle bouncing spheres stay inside.
    pub fn step(&mut self, dt: f32, view_centre: Vec2, half_view: Vec2) {
        match &mut self.animation {
            None => {}

            Some(Animation::Orbit {
                pivot,
                radians_per_second,
            }) => {
                let rotation = Quat::from_rotation_y(*radians_per_second * dt);
                self.position = *pivot + rotation * (self.position - *pivot);
            }

            Some(Animation::Bounce { velocity }) => {
                let radius = self.scale * 0.5;
                let min = view_centre - half_view + radius;
                let max = view_centre + half_view - radius;

                let mut xy = self.position.truncate() + *velocity * dt;
                for axis in 0..2 {
                    if (xy[axis] <= min[axis] && velocity[axis] < 0.0)
                        || (xy[axis] >= max[axis] && velocity[axis] > 0.0)
                    {
                        velocity[axis] = -velocity[axis];
                    }
                    xy[axis] = xy[axis].clamp(min[axis].min(max[axis]), max[axis].max(min[axis]));
                }

                self.position = xy.extend(self.position.z);
            }
        }
    }
}

impl SceneObject for SphereObject {
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
        self.material
    }

    fn attenuation(&self) -> f32 {
        self.attenuation
    }
}

pub struct FixedCamera {
    pub position: Vec3,
}

impl Camera for FixedCamera {
    fn position(&self) -> Vec3 {
        self.position
    }
}

pub struct PointLight {
    pub position: Vec3,
}

impl Light for PointLight {
    fn position(&self) -> Vec3 {
        self.position
    }
}

/// Host-side objects built from a scene file.
pub struct LoadedScene {
    pub settings: RenderSettings,
    pub camera: Arc<RwLock<FixedCamera>>,
    pub light: Arc<RwLock<PointLight>>,
    pub spheres: Vec<Arc<RwLock<SphereObject>>>,
}

impl LoadedScene {
    pub fn new(scene_file: &SceneFile) -> Result<Self, RenderError> {
        let camera = scene_file
            .get_camera()
            .map_err(|e| RenderError::MissingDependency(e.to_string()))?;
        let light = scene_file
            .get_light()
            .map_err(|e| RenderError::MissingDependency(e.to_string()))?;

        let render = &scene_file.render;
        let settings = RenderSettings {
            samples_per_pixel: render.samples_per_pixel,
            max_depth: render.max_depth,
            world_height: render.world_height,
            background: Vec4::from_array(render.background),
            seed: render.seed,
        };
        settings.validate()?;

        let spheres = scene_file
            .primitives
            .iter()
            .map(|p| Arc::new(RwLock::new(SphereObject::from_primitive(p))))
            .collect();

        info!(
            "Loaded scene with camera '{}', light '{}' and {} primitives",
            camera.get_name(),
            light.get_name(),
            scene_file.primitives.len()
        );

        Ok(Self {
            settings,
            camera: Arc::new(RwLock::new(FixedCamera {
                position: Vec3::from_array(camera.get_position()),
            })),
            light: Arc::new(RwLock::new(PointLight {
                position: Vec3::from_array(light.get_position()),
            })),
            spheres,
        })
    }

    /// Creates an engine on `device` and registers every sphere with it.
    pub fn create_engine<D: ComputeDevice>(
        &self,
        device: D,
        extent: Extent,
    ) -> Result<(RenderEngine<D>, Vec<ObjectId>), RenderError> {
        let mut engine = RenderEngine::new(
            device,
            self.settings,
            self.camera.clone(),
            self.light.clone(),
            extent,
        )?;

        let ids = self
            .spheres
            .iter()
            .map(|sphere| engine.register(sphere.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((engine, ids))
    }

    /// Advances every animated sphere by `dt` seconds for a view of `extent`.
    pub fn step(&self, dt: f32, extent: Extent) {
        if extent.is_empty() {
            return;
        }

        let world_size = Vec2::new(
            self.settings.world_height * extent.aspect_ratio(),
            self.settings.world_height,
        );
        let view_centre = self
            .camera
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .position
            .truncate();

        for sphere in &self.spheres {
            sphere
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .step(dt, view_centre, world_size * 0.5);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"{
        "cameras": [{ "fixed": { "name": "main", "position": [0.0, 1.5, -2.0] } }],
        "lights": [{ "point": { "name": "sun", "position": [0.0, 5.0, -5.0] } }],
        "primitives": [
            { "sphere": {
                "name": "orbiter",
                "position": [1.0, 1.5, 4.0],
                "scale": 0.5,
                "colour": [1.0, 1.0, 1.0, 1.0],
                "motion": { "orbit": {} }
            } },
            { "sphere": {
                "name": "bouncer",
                "position": [0.0, 1.5, 3.0],
                "scale": 0.2,
                "colour": [0.0, 1.0, 0.0, 1.0],
                "material": "glossy",
                "motion": { "bounce": { "velocity": [0.5, 0.25] } }
            } }
        ],
        "render": { "camera": "main", "light": "sun", "seed": 3 }
    }"#;

    fn bouncer(position: Vec3, velocity: Vec2) -> SphereObject {
        SphereObject {
            name: "b".to_string(),
            position,
            scale: 0.2,
            colour: Vec4::ONE,
            material: MaterialKind::Lambertian,
            attenuation: 0.5,
            animation: Some(Animation::Bounce { velocity }),
        }
    }

    #[test]
    fn loads_settings_and_objects() {
        let scene_file = SceneFile::from_json_str(SCENE).unwrap();
        let scene = LoadedScene::new(&scene_file).unwrap();

        assert_eq!(scene.settings.seed, Some(3));
        assert_eq!(scene.settings.samples_per_pixel, 10);
        assert_eq!(scene.spheres.len(), 2);

        let bouncer = scene.spheres[1].read().unwrap();
        assert_eq!(bouncer.material_kind(), MaterialKind::Glossy);
        assert_eq!(
            bouncer.animation(),
            Some(Animation::Bounce {
                velocity: Vec2::new(0.5, 0.25)
            })
        );
    }

    #[test]
    fn missing_camera_is_a_missing_dependency() {
        let mut scene_file = SceneFile::from_json_str(SCENE).unwrap();
        scene_file.render.camera = "nowhere".to_string();

        assert!(matches!(
            LoadedScene::new(&scene_file),
            Err(RenderError::MissingDependency(msg)) if msg.contains("nowhere")
        ));
    }

    #[test]
    fn orbit_keeps_distance_to_pivot() {
        let scene_file = SceneFile::from_json_str(SCENE).unwrap();
        let mut orbiter = SphereObject::from_primitive(&scene_file.primitives[0]);
        let pivot = Vec3::new(0.0, 1.5, 4.0);

        // 50 degrees per second for 1.8 seconds is a quarter turn.
        orbiter.step(1.8, Vec2::ZERO, Vec2::splat(10.0));

        let position = orbiter.position();
        assert!((position.distance(pivot) - 1.0).abs() < 1e-4);
        assert!((position.y - 1.5).abs() < 1e-6);
        assert!(position.x.abs() < 1e-4, "{position}");
    }

    #[test]
    fn bounce_reverses_at_edge() {
        let mut sphere = bouncer(Vec3::new(0.35, 0.0, 3.0), Vec2::new(1.0, 0.0));

        // The right edge is at 0.5, so a radius 0.1 sphere turns around at 0.4.
        sphere.step(0.1, Vec2::ZERO, Vec2::splat(0.5));

        assert!((sphere.position().x - 0.4).abs() < 1e-6);
        assert_eq!(
            sphere.animation(),
            Some(Animation::Bounce {
                velocity: Vec2::new(-1.0, 0.0)
            })
        );

        sphere.step(0.1, Vec2::ZERO, Vec2::splat(0.5));
        assert!((sphere.position().x - 0.3).abs() < 1e-6);
    }

    #[test]
    fn bounce_moves_freely_inside_view() {
        let mut sphere = bouncer(Vec3::new(0.0, 0.0, 3.0), Vec2::new(0.5, 0.25));
        sphere.step(0.2, Vec2::ZERO, Vec2::splat(1.0));

        assert!((sphere.position() - Vec3::new(0.1, 0.05, 3.0)).length() < 1e-6);
    }

    #[test]
    fn static_sphere_does_not_move() {
        let mut sphere = bouncer(Vec3::new(0.0, 0.0, 3.0), Vec2::ZERO);
        sphere.animation = None;
        sphere.step(1.0, Vec2::ZERO, Vec2::ONE);
        assert_eq!(sphere.position(), Vec3::new(0.0, 0.0, 3.0));
    }
}
