use anyhow::{Context, Result};
use image::{DynamicImage, Rgba32FImage};
use log::info;
use raytracer::{Extent, FrameOutcome, HeadlessDevice};
use scene_file::SceneFile;

use crate::scene::LoadedScene;

/// Time step between headless frames, in seconds.
const FRAME_TIME: f32 = 1.0 / 60.0;

/// Renders `frames` frames in memory and writes the last one to `output` as an 8-bit PNG.
pub fn render_to_png(
    scene_path: &str,
    extent: Extent,
    frames: u32,
    output: &str,
) -> Result<()> {
    let scene_file = SceneFile::load_json(scene_path)?;
    let scene = LoadedScene::new(&scene_file)?;
    let (mut engine, _ids) = scene.create_engine(HeadlessDevice::new(), extent)?;

    for frame in 0..frames.max(1) {
        if frame > 0 {
            scene.step(FRAME_TIME, extent);
        }

        match engine.render()? {
            FrameOutcome::Presented => {}
            outcome => info!("Frame {frame}: {outcome:?}"),
        }
    }

    let frame = engine
        .device()
        .last_presented()
        .context("No frame was presented")?;

    let pixels: Vec<f32> = frame
        .pixels
        .iter()
        .flat_map(|p| p.map(|c| c.clamp(0.0, 1.0)))
        .collect();

    let image = Rgba32FImage::from_raw(frame.extent.width, frame.extent.height, pixels)
        .context("Output texture does not match its extent")?;

    DynamicImage::ImageRgba32F(image)
        .to_rgba8()
        .save(output)
        .with_context(|| format!("Unable to write '{output}'"))?;

    info!(
        "Wrote {}x{} frame to '{output}' after {} frames",
        frame.extent.width,
        frame.extent.height,
        frames.max(1)
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"{
        "cameras": [{ "fixed": { "name": "eye", "position": [0.0, 0.0, -5.0] } }],
        "lights": [{ "point": { "name": "lamp", "position": [0.0, 0.0, -10.0] } }],
        "primitives": [
            { "sphere": {
                "name": "ball",
                "position": [0.0, 0.0, 0.0],
                "scale": 2.0,
                "colour": [0.0, 0.0, 3.0, 1.0]
            } }
        ],
        "render": {
            "camera": "eye",
            "light": "lamp",
            "samples_per_pixel": 2,
            "background": [2.0, 0.5, -1.0, 1.0],
            "seed": 5
        }
    }"#;

    #[test]
    fn writes_clamped_png_of_requested_size() {
        let dir = tempfile::tempdir().unwrap();
        let scene_path = dir.path().join("scene.json");
        let output = dir.path().join("frame.png");
        std::fs::write(&scene_path, SCENE).unwrap();

        render_to_png(
            scene_path.to_str().unwrap(),
            Extent::new(16, 9),
            1,
            output.to_str().unwrap(),
        )
        .unwrap();

        let image = image::open(&output).unwrap().to_rgba8();
        assert_eq!(image.dimensions(), (16, 9));

        // Background red is above 1.0 and blue below 0.0.
        let corner = image.get_pixel(0, 0);
        assert_eq!(corner[0], 255);
        assert_eq!(corner[2], 0);
        assert_eq!(corner[3], 255);

        // The lit side of the sphere has a blue albedo of 3.0.
        let centre = image.get_pixel(8, 4);
        assert_eq!(centre[0], 0);
        assert_eq!(centre[2], 255);
    }
}
