//! Swapchain selection policies. Pure functions over the capability snapshot.

use ash::vk;
use lindmar_render::RenderSize;

use crate::context::QueueFamilies;

/// Surfaces with a fixed size report this as `current_extent.width`.
pub const FLEXIBLE_EXTENT: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PresentPreference {
    /// Low-latency triple buffering when available, FIFO otherwise.
    #[default]
    Mailbox,
    /// Always FIFO (strict vsync).
    Fifo,
}

/// BGRA8 sRGB with a non-linear sRGB color space, else the driver's first
/// format. `None` only for an empty list.
pub fn select_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first().copied())
}

/// FIFO is the only mode every implementation must support.
pub fn select_present_mode(
    modes: &[vk::PresentModeKHR],
    preference: PresentPreference,
) -> vk::PresentModeKHR {
    match preference {
        PresentPreference::Mailbox if modes.contains(&vk::PresentModeKHR::MAILBOX) => {
            vk::PresentModeKHR::MAILBOX
        }
        _ => vk::PresentModeKHR::FIFO,
    }
}

/// Requested size clamped per axis when the surface lets us choose,
/// otherwise the surface's own extent.
pub fn select_extent(caps: &vk::SurfaceCapabilitiesKHR, requested: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != FLEXIBLE_EXTENT {
        return caps.current_extent;
    }
    vk::Extent2D {
        width: clamp_axis(
            requested.width,
            caps.min_image_extent.width,
            caps.max_image_extent.width,
        ),
        height: clamp_axis(
            requested.height,
            caps.min_image_extent.height,
            caps.max_image_extent.height,
        ),
    }
}

// u32::clamp panics when min > max.
fn clamp_axis(value: u32, min: u32, max: u32) -> u32 {
    value.max(min).min(max)
}

/// One above the minimum so we never wait on the driver for an image;
/// `max_image_count == 0` means unbounded.
pub fn select_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        wanted.min(caps.max_image_count)
    } else {
        wanted
    }
}

/// Exclusive ownership when one family both draws and presents, concurrent
/// across the two families otherwise.
pub fn select_sharing(families: QueueFamilies) -> (vk::SharingMode, Vec<u32>) {
    if families.graphics == families.present {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (
            vk::SharingMode::CONCURRENT,
            vec![families.graphics, families.present],
        )
    }
}

pub(crate) fn format_name(f: vk::Format) -> &'static str {
    match f {
        vk::Format::B8G8R8A8_SRGB => "B8G8R8A8_SRGB",
        vk::Format::B8G8R8A8_UNORM => "B8G8R8A8_UNORM",
        vk::Format::R8G8B8A8_SRGB => "R8G8B8A8_SRGB",
        vk::Format::R8G8B8A8_UNORM => "R8G8B8A8_UNORM",
        vk::Format::A2B10G10R10_UNORM_PACK32 => "A2B10G10R10_UNORM",
        vk::Format::R16G16B16A16_SFLOAT => "R16G16B16A16_SFLOAT",
        _ => "OTHER",
    }
}

pub(crate) fn present_mode_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::FIFO_RELAXED => "FIFO_RELAXED",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        vk::PresentModeKHR::IMMEDIATE => "IMMEDIATE",
        _ => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn caps(
        current: (u32, u32),
        min: (u32, u32),
        max: (u32, u32),
        images: (u32, u32),
    ) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            min_image_count: images.0,
            max_image_count: images.1,
            ..Default::default()
        }
    }

    const FLEX: (u32, u32) = (FLEXIBLE_EXTENT, FLEXIBLE_EXTENT);

    #[test]
    fn preferred_format_wins_wherever_it_appears() {
        let rgba = fmt(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR);
        let bgra = fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR);
        assert_eq!(select_surface_format(&[rgba, bgra]), Some(bgra));
        assert_eq!(select_surface_format(&[bgra, rgba]), Some(bgra));
    }

    #[test]
    fn first_format_is_the_fallback() {
        let rgba = fmt(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR);
        let hdr = fmt(
            vk::Format::A2B10G10R10_UNORM_PACK32,
            vk::ColorSpaceKHR::HDR10_ST2084_EXT,
        );
        assert_eq!(select_surface_format(&[rgba]), Some(rgba));
        assert_eq!(select_surface_format(&[hdr, rgba]), Some(hdr));
        // right format, wrong color space
        let bgra_p3 = fmt(
            vk::Format::B8G8R8A8_SRGB,
            vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT,
        );
        assert_eq!(select_surface_format(&[rgba, bgra_p3]), Some(rgba));
        assert_eq!(select_surface_format(&[]), None);
    }

    #[test]
    fn mailbox_when_offered_fifo_otherwise() {
        use vk::PresentModeKHR as M;
        let pref = PresentPreference::Mailbox;
        assert_eq!(select_present_mode(&[M::MAILBOX, M::FIFO], pref), M::MAILBOX);
        assert_eq!(select_present_mode(&[M::FIFO, M::FIFO_RELAXED], pref), M::FIFO);
        assert_eq!(select_present_mode(&[M::IMMEDIATE], pref), M::FIFO);
        assert_eq!(select_present_mode(&[], pref), M::FIFO);
    }

    #[test]
    fn fifo_preference_ignores_mailbox() {
        use vk::PresentModeKHR as M;
        assert_eq!(
            select_present_mode(&[M::MAILBOX, M::FIFO], PresentPreference::Fifo),
            M::FIFO
        );
    }

    #[test]
    fn flexible_extent_clamps_each_axis() {
        let c = caps(FLEX, (64, 64), (4096, 4096), (2, 0));
        assert_eq!(
            select_extent(&c, RenderSize::new(100, 100)),
            vk::Extent2D {
                width: 100,
                height: 100
            }
        );
        assert_eq!(
            select_extent(&c, RenderSize::new(10, 10)),
            vk::Extent2D {
                width: 64,
                height: 64
            }
        );
        assert_eq!(
            select_extent(&c, RenderSize::new(10, 9000)),
            vk::Extent2D {
                width: 64,
                height: 4096
            }
        );
    }

    #[test]
    fn fixed_extent_ignores_request() {
        let c = caps((1920, 1080), (1, 1), (8192, 8192), (2, 0));
        for requested in [
            RenderSize::new(1, 1),
            RenderSize::new(1920, 1080),
            RenderSize::new(5000, 10),
        ] {
            assert_eq!(
                select_extent(&c, requested),
                vk::Extent2D {
                    width: 1920,
                    height: 1080
                }
            );
        }
    }

    #[test]
    fn image_count_is_min_plus_one_capped() {
        let unbounded = caps(FLEX, (1, 1), (1, 1), (2, 0));
        let capped = caps(FLEX, (1, 1), (1, 1), (2, 2));
        let roomy = caps(FLEX, (1, 1), (1, 1), (3, 8));
        assert_eq!(select_image_count(&unbounded), 3);
        assert_eq!(select_image_count(&capped), 2);
        assert_eq!(select_image_count(&roomy), 4);
    }

    #[test]
    fn image_count_bounds_hold() {
        for min in 1..6 {
            for max in 0..8 {
                if max != 0 && max < min {
                    continue;
                }
                let n = select_image_count(&caps(FLEX, (1, 1), (1, 1), (min, max)));
                if max == 0 {
                    assert_eq!(n, min + 1);
                } else {
                    assert!(n <= max && n >= min);
                    assert_eq!(n, (min + 1).min(max));
                }
            }
        }
    }

    #[test]
    fn shared_family_is_exclusive() {
        let (mode, indices) = select_sharing(QueueFamilies {
            graphics: 0,
            present: 0,
        });
        assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
        assert!(indices.is_empty());
    }

    #[test]
    fn split_families_are_concurrent() {
        let (mode, indices) = select_sharing(QueueFamilies {
            graphics: 0,
            present: 2,
        });
        assert_eq!(mode, vk::SharingMode::CONCURRENT);
        assert_eq!(indices, vec![0, 2]);
    }
}
