use log::debug;

use crate::{ComputeDevice, DeviceResources, PresentOutcome, RenderError};

/// Copies the kernel output into the display target.
#[derive(Default)]
pub struct Compositor;

impl Compositor {
    pub fn present<D: ComputeDevice>(
        &self,
        device: &mut D,
        resources: &DeviceResources<D>,
    ) -> Result<PresentOutcome, RenderError> {
        let texture = resources.output_texture().ok_or_else(|| {
            RenderError::Configuration("no output texture is allocated".to_string())
        })?;

        let outcome = device.present(texture)?;
        debug!("Present: {outcome:?}");
        Ok(outcome)
    }
}
