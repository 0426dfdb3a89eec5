use anyhow::Result;
use clap::{Parser, Subcommand};
use glam::Vec3;
use random::Random;
use scene_file::{
    Camera, DEFAULT_BACKGROUND, DEFAULT_MAX_DEPTH, DEFAULT_ORBIT_DEGREES_PER_SECOND,
    DEFAULT_ORBIT_PIVOT, DEFAULT_SAMPLES_PER_PIXEL, DEFAULT_WORLD_HEIGHT, Light, MaterialType,
    Motion, Primitive, Render, SceneFile,
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Small spheres bouncing around the view
    GenBouncingSpheres {
        /// Number of spheres
        #[arg(short, long, default_value_t = 40)]
        count: usize,

        #[arg(short, long, default_value = "assets/bouncing-spheres.json")]
        output: String,
    },

    /// Ground, a mirror sphere, an orbiting sphere and a bouncing sphere
    GenShowcase {
        #[arg(short, long, default_value = "assets/showcase.json")]
        output: String,
    },
}

const CAMERA_POSITION: [f32; 3] = [0.0, 1.5, -1.0];

fn main() -> Result<()> {
    let cli = Cli::parse();

    Random::seed(485_674_958_675_300);

    match &cli.command {
        Some(Commands::GenBouncingSpheres { count, output }) => {
            generate_bouncing_spheres_scene(*count, output)?;
        }
        Some(Commands::GenShowcase { output }) => {
            generate_showcase_scene(output)?;
        }
        None => {
            println!("Please specify a command");
        }
    }

    Ok(())
}

fn new_scene_file(primitives: Vec<Primitive>, seed: Option<u64>) -> SceneFile {
    let cameras = vec![Camera::Fixed {
        name: "main".to_string(),
        position: CAMERA_POSITION,
    }];

    let lights = vec![Light::Point {
        name: "sun".to_string(),
        position: [-3.0, 6.0, -2.0],
    }];

    let render = Render {
        camera: cameras[0].get_name().to_string(),
        light: lights[0].get_name().to_string(),
        samples_per_pixel: DEFAULT_SAMPLES_PER_PIXEL,
        max_depth: DEFAULT_MAX_DEPTH,
        world_height: DEFAULT_WORLD_HEIGHT,
        background: DEFAULT_BACKGROUND,
        seed,
    };

    SceneFile {
        cameras,
        lights,
        primitives,
        render,
    }
}

fn ground() -> Primitive {
    Primitive::Sphere {
        name: "ground".to_string(),
        position: [0.0, -100.0, 4.0],
        scale: 200.0,
        colour: [0.5, 0.5, 0.5, 1.0],
        material: MaterialType::Lambertian,
        attenuation: 0.5,
        motion: None,
    }
}

fn generate_bouncing_spheres_scene(count: usize, output: &str) -> Result<()> {
    println!("Generating {count} bouncing spheres");

    let mut primitives = vec![ground()];

    for i in 0..count {
        let scale = Random::sample_in_range(0.05, 0.2);

        // Keep the spheres inside the rectangle the bounce motion confines them to.
        let centre = Vec3::new(
            CAMERA_POSITION[0] + Random::sample_in_range(-0.6, 0.6),
            CAMERA_POSITION[1] + Random::sample_in_range(-0.3, 0.3),
            Random::sample_in_range(2.0, 6.0),
        );

        let material = if Random::sample::<f32>() < 0.8 {
            MaterialType::Lambertian
        } else {
            MaterialType::Glossy
        };

        let colour = Random::vec3_in_range(0.2, 1.0).extend(1.0).to_array();
        let velocity = [
            Random::sample_in_range(-0.5, 0.5),
            Random::sample_in_range(-0.5, 0.5),
        ];

        primitives.push(Primitive::Sphere {
            name: format!("sphere_{i}"),
            position: centre.to_array(),
            scale,
            colour,
            material,
            attenuation: Random::sample_in_range(0.3, 0.9),
            motion: Some(Motion::Bounce { velocity }),
        });
    }

    new_scene_file(primitives, None).save_json(output)
}

fn generate_showcase_scene(output: &str) -> Result<()> {
    println!("Generating showcase scene file");

    let primitives = vec![
        ground(),
        Primitive::Sphere {
            name: "mirror".to_string(),
            position: [0.0, 1.0, 4.0],
            scale: 2.0,
            colour: [0.9, 0.9, 0.9, 1.0],
            material: MaterialType::Glossy,
            attenuation: 0.8,
            motion: None,
        },
        Primitive::Sphere {
            name: "orbiter".to_string(),
            position: [1.5, 0.5, 4.0],
            scale: 1.0,
            colour: [0.8, 0.2, 0.2, 1.0],
            material: MaterialType::Lambertian,
            attenuation: 0.5,
            motion: Some(Motion::Orbit {
                pivot: DEFAULT_ORBIT_PIVOT,
                degrees_per_second: DEFAULT_ORBIT_DEGREES_PER_SECOND,
            }),
        },
        Primitive::Sphere {
            name: "bouncer".to_string(),
            position: [0.0, 1.5, 3.0],
            scale: 0.3,
            colour: [0.2, 0.8, 0.3, 1.0],
            material: MaterialType::Lambertian,
            attenuation: 0.5,
            motion: Some(Motion::Bounce {
                velocity: [0.4, 0.3],
            }),
        },
    ];

    new_scene_file(primitives, Some(1)).save_json(output)
}
