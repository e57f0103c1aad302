//! Sorting native acquire/present results into what the frame loop can
//! recover from and what it cannot.

use ash::{prelude::VkResult, vk};
use lindmar_render::{Acquire, Present};

use crate::error::VkError;

pub(crate) fn classify_acquire(result: VkResult<(u32, bool)>) -> Result<Acquire, VkError> {
    match result {
        Ok((index, suboptimal)) => Ok(Acquire::Image { index, suboptimal }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquire::OutOfDate),
        Err(result) => Err(VkError::Call {
            op: "vkAcquireNextImageKHR",
            result,
        }),
    }
}

pub(crate) fn classify_present(result: VkResult<bool>) -> Result<Present, VkError> {
    match result {
        Ok(false) => Ok(Present::Presented),
        // ash reports SUBOPTIMAL_KHR as Ok(true)
        Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Present::Stale),
        Err(result) => Err(VkError::Call {
            op: "vkQueuePresentKHR",
            result,
        }),
    }
}
