use std::time::Instant;

use anyhow::Result;
use log::{error, info};
use raytracer::{Extent, FrameOutcome, RenderEngine, VulkanDevice};
use scene_file::SceneFile;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, KeyEvent, StartCause, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::scene::LoadedScene;

const INITIAL_WINDOW_SIZE: [f32; 2] = [1024.0, 576.0];

const APP_NAME: &str = "Sphere Tracer - Vulkan";

/// Winit application.
pub struct App {
    /// The render engine. Declared first so it is dropped before the window.
    render_engine: Option<RenderEngine<VulkanDevice>>,

    /// The winit window.
    window: Option<Window>,

    /// Host objects of the scene being rendered.
    scene: Option<LoadedScene>,

    /// The scene file being rendered.
    scene_path: String,

    /// Reload the scene file before the next frame.
    reload: bool,

    /// Recreate the swapchain before the next frame.
    recreate_swapchain: bool,

    last_frame: Instant,
}

impl App {
    pub fn new(scene_path: &str) -> Self {
        Self {
            render_engine: None,
            window: None,
            scene: None,
            scene_path: scene_path.to_string(),
            reload: false,
            recreate_swapchain: false,
            last_frame: Instant::now(),
        }
    }

    /// Builds the device, engine and scene objects for the current scene file.
    fn load(&mut self) -> Result<()> {
        let Some(window) = self.window.as_ref() else {
            return Ok(());
        };

        let scene_file = SceneFile::load_json(&self.scene_path)?;
        let scene = LoadedScene::new(&scene_file)?;

        // The old engine owns the surface, so it has to go before a new one is created.
        self.render_engine = None;

        let device = VulkanDevice::new(APP_NAME, window)?;
        let extent = device.display_extent();
        let (render_engine, ids) = scene.create_engine(device, extent)?;

        info!("Rendering '{}' with {} spheres", self.scene_path, ids.len());

        self.render_engine = Some(render_engine);
        self.scene = Some(scene);
        self.recreate_swapchain = false;
        self.last_frame = Instant::now();

        Ok(())
    }

    fn recreate_swapchain(&mut self) -> Result<()> {
        let (Some(window), Some(render_engine)) =
            (self.window.as_ref(), self.render_engine.as_mut())
        else {
            return Ok(());
        };

        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            // Minimised; the engine skips frames until the window has an area again.
            render_engine.update_window_size(Extent::new(size.width, size.height));
            return Ok(());
        }

        render_engine.device_mut().recreate_swapchain(window)?;
        let extent = render_engine.device().display_extent();
        render_engine.update_window_size(extent);

        self.recreate_swapchain = false;
        window.request_redraw();

        Ok(())
    }

    fn render(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        let (Some(render_engine), Some(scene)) = (self.render_engine.as_mut(), self.scene.as_ref())
        else {
            return;
        };

        scene.step(dt, render_engine.extent());

        match render_engine.render() {
            Ok(FrameOutcome::TargetOutOfDate) => self.recreate_swapchain = true,
            Ok(FrameOutcome::Presented | FrameOutcome::Skipped) => {}
            Err(e) => error!("failed to render. {e:?}"),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match event_loop.create_window(
            Window::default_attributes()
                .with_title(APP_NAME)
                .with_inner_size(LogicalSize::new(
                    INITIAL_WINDOW_SIZE[0],
                    INITIAL_WINDOW_SIZE[1],
                )),
        ) {
            Ok(window) => window,
            Err(e) => {
                error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window);

        if let Err(e) = self.load() {
            error!("Failed to load '{}': {e:?}", self.scene_path);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("The close button was pressed; stopping");
                event_loop.exit();
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: key,
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match key.as_ref() {
                Key::Character("q") | Key::Named(NamedKey::Escape) => {
                    info!("Exit key was pressed; stopping.");
                    event_loop.exit();
                }

                Key::Character("r") => {
                    info!("Reloading '{}'", self.scene_path);
                    self.reload = true;
                }

                _ => (),
            },

            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                self.recreate_swapchain = true;
            }

            WindowEvent::RedrawRequested => {
                if !self.recreate_swapchain {
                    self.render();
                }
            }

            _ => (),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn new_events(&mut self, event_loop: &ActiveEventLoop, _cause: StartCause) {
        if self.reload {
            self.reload = false;
            if let Err(e) = self.load() {
                error!("Failed to reload '{}': {e:?}", self.scene_path);
            }
        }

        if self.recreate_swapchain {
            if let Err(e) = self.recreate_swapchain() {
                error!("Failed to recreate swapchain: {e:?}");
                event_loop.exit();
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Release device resources while the surface is still alive.
        self.render_engine = None;
    }
}
