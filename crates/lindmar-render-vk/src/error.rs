use ash::{prelude::VkResult, vk};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VkError {
    /// A native call returned an error code. `op` is the Vulkan entry point.
    #[error("{op} failed: {result}")]
    Call { op: &'static str, result: vk::Result },

    #[error("no suitable GPU: {0}")]
    NoSuitableGpu(&'static str),

    #[error("surface reports no formats")]
    NoSurfaceFormat,

    #[error("swapchain bundle is not built")]
    NoBundle,

    #[error("image index {index} out of range for {count} swapchain images")]
    ImageIndex { index: u32, count: usize },
}

pub trait VkResultExt<T> {
    /// Tags a raw result with the name of the call that produced it.
    fn op(self, op: &'static str) -> Result<T, VkError>;
}

impl<T> VkResultExt<T> for VkResult<T> {
    fn op(self, op: &'static str) -> Result<T, VkError> {
        self.map_err(|result| VkError::Call { op, result })
    }
}
