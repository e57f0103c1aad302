// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use portable_atomic::{AtomicBool, Ordering};

/// Creates the one-directional hand-off between the window's resize callback
/// and the frame loop.
pub fn resize_channel() -> (ResizeNotifier, ResizeWatch) {
    let flag = Arc::new(AtomicBool::new(false));
    (
        ResizeNotifier {
            flag: Arc::clone(&flag),
        },
        ResizeWatch { flag },
    )
}

/// Producer half, held by the windowing layer.
#[derive(Clone, Debug)]
pub struct ResizeNotifier {
    flag: Arc<AtomicBool>,
}

impl ResizeNotifier {
    pub fn notify(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

/// Consumer half, read only by the frame loop at iteration boundaries.
#[derive(Debug)]
pub struct ResizeWatch {
    flag: Arc<AtomicBool>,
}

impl ResizeWatch {
    pub fn is_pending(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Clears the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}
