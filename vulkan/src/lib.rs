mod buffer;
mod command_buffer;
mod context;
mod descriptor_set;
mod descriptor_set_layout;
mod fence;
mod frame_sync;
mod image;
mod swapchain;

pub use buffer::*;
pub use command_buffer::*;
pub use context::*;
pub use descriptor_set::*;
pub use descriptor_set_layout::*;
pub use fence::*;
pub use frame_sync::*;
pub use image::*;
pub use swapchain::*;
