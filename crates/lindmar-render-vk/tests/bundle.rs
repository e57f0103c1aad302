//! Swapchain bundle checks against a real device.
//!
//! These need a GPU and a display and are marked `#[ignore]`.
//! Run with: cargo test -p lindmar-render-vk --test bundle -- --ignored

use lindmar_render::{FrameBackend, RenderSize};
use lindmar_render_vk::{VkConfig, VkRenderer};
use winit::event_loop::EventLoop;
use winit::window::Window;

// winit allows one event loop per process, so everything shares one test.
#[allow(deprecated)]
fn hidden_window() -> (Window, EventLoop<()>) {
    let event_loop = EventLoop::new().unwrap();
    let attrs = Window::default_attributes()
        .with_title("lindmar bundle test")
        .with_inner_size(winit::dpi::PhysicalSize::new(640, 480))
        .with_visible(false);
    let window = event_loop.create_window(attrs).unwrap();
    (window, event_loop)
}

fn assert_lengths_match(renderer: &VkRenderer) {
    let info = renderer.swapchain_info().expect("bundle built");
    let lengths = renderer.bundle_lengths().expect("bundle built");
    for len in lengths {
        assert_eq!(len, info.image_count, "per-image arrays: {lengths:?}");
    }
    assert_eq!(renderer.image_count(), info.image_count);
    assert!(info.image_count >= 1);
}

#[test]
#[ignore] // Requires GPU and display
fn bundle_arrays_track_returned_images_and_rebuild_is_idempotent() {
    let (window, _event_loop) = hidden_window();
    let size = RenderSize::new(640, 480);
    let mut renderer =
        unsafe { VkRenderer::new(&window, &window, size, VkConfig::default()) }.unwrap();

    assert_lengths_match(&renderer);
    let first = renderer.swapchain_info().unwrap();
    assert!(first.extent.width > 0 && first.extent.height > 0);

    // Same surface, same size: the rebuilt bundle is indistinguishable.
    for _ in 0..2 {
        renderer.wait_idle().unwrap();
        renderer.rebuild(size).unwrap();
        assert_lengths_match(&renderer);
        assert_eq!(renderer.swapchain_info().unwrap(), first);
    }

    renderer.wait_idle().unwrap();
    drop(renderer);
    drop(window);
}
