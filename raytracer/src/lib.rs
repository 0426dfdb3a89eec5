//! Frame orchestration for a compute-shader sphere ray tracer.
//!
//! Each frame the [`RenderEngine`] snapshots the registered scene objects, makes sure the
//! device resources match the current configuration epoch, uploads the snapshot, dispatches the
//! kernel and presents its output. Devices plug in through [`ComputeDevice`]:
//! [`VulkanDevice`] renders to a window and [`HeadlessDevice`] renders in memory.

mod compositor;
mod config;
mod device;
mod dispatch;
mod error;
mod headless;
mod material;
mod pipeline;
mod render_engine;
mod resources;
mod samples;
mod scene;
mod vk_device;

pub use compositor::*;
pub use config::*;
pub use device::*;
pub use dispatch::*;
pub use error::*;
pub use headless::*;
pub use material::*;
pub use pipeline::*;
pub use render_engine::*;
pub use resources::*;
pub use samples::*;
pub use scene::*;
pub use vk_device::*;
