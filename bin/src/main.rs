mod app;
mod headless;
mod scene;

use anyhow::Result;
use clap::Parser;
use raytracer::Extent;
use winit::event_loop::EventLoop;

use crate::app::App;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Scene file
    #[arg(short, long, default_value = "assets/showcase.json")]
    path: String,

    /// Render in memory and write a PNG instead of opening a window
    #[arg(long)]
    headless: bool,

    /// Number of frames to render in headless mode
    #[arg(long, default_value_t = 1)]
    frames: u32,

    /// Headless image width
    #[arg(long, default_value_t = 1024)]
    width: u32,

    /// Headless image height
    #[arg(long, default_value_t = 576)]
    height: u32,

    /// Headless output path
    #[arg(short, long, default_value = "render.png")]
    output: String,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if cli.headless {
        return headless::render_to_png(
            &cli.path,
            Extent::new(cli.width, cli.height),
            cli.frames,
            &cli.output,
        );
    }

    let event_loop = EventLoop::new()?;

    let mut app = App::new(&cli.path);
    event_loop.run_app(&mut app)?;

    Ok(())
}
