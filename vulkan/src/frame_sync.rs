use std::sync::Arc;

use anyhow::Result;
use ash::vk;
use log::debug;

use crate::VulkanContext;

/// Semaphores one queue submission waits on and signals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmitSemaphores {
    pub wait: [vk::Semaphore; 1],
    pub signal: [vk::Semaphore; 1],
}

/// The pair of binary semaphores that orders one presented frame: acquire signals
/// `image_available`, the blit waits on it and signals `render_finished`, and present waits on
/// `render_finished`.
pub struct FrameSync {
    context: Arc<VulkanContext>,
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
}

impl FrameSync {
    pub fn new(context: Arc<VulkanContext>) -> Result<Self> {
        let device = &context.device;
        let info = vk::SemaphoreCreateInfo::default();

        let image_available = unsafe { device.create_semaphore(&info, None)? };
        let render_finished = match unsafe { device.create_semaphore(&info, None) } {
            Ok(semaphore) => semaphore,
            Err(e) => {
                unsafe { device.destroy_semaphore(image_available, None) };
                return Err(e.into());
            }
        };
        debug!("FrameSync: created");

        Ok(Self {
            context,
            image_available,
            render_finished,
        })
    }

    /// Signaled by the presentation engine once the acquired image can be written.
    pub fn acquire_signal(&self) -> vk::Semaphore {
        self.image_available
    }

    /// Semaphores for the submission that writes the acquired image.
    pub fn blit_submission(&self) -> SubmitSemaphores {
        frame_ordering(self.image_available, self.render_finished).0
    }

    /// Semaphores presentation waits on.
    pub fn present_wait(&self) -> [vk::Semaphore; 1] {
        frame_ordering(self.image_available, self.render_finished).1
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        debug!("FrameSync: destroy");
        unsafe {
            let device = &self.context.device;
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_finished, None);
        }
    }
}

fn frame_ordering(
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
) -> (SubmitSemaphores, [vk::Semaphore; 1]) {
    let submit = SubmitSemaphores {
        wait: [image_available],
        signal: [render_finished],
    };
    (submit, submit.signal)
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;

    #[test]
    fn blit_sits_between_acquire_and_present() {
        let acquired = vk::Semaphore::from_raw(1);
        let rendered = vk::Semaphore::from_raw(2);

        let (submit, present_wait) = frame_ordering(acquired, rendered);

        assert_eq!(submit.wait, [acquired]);
        assert_eq!(submit.signal, [rendered]);
        assert_eq!(present_wait, submit.signal);
        assert_ne!(submit.wait, submit.signal);
    }
}
