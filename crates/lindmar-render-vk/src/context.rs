use std::ffi::CStr;

use anyhow::{anyhow, Result};
use ash::khr::{surface, swapchain};
use ash::{vk, Device, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info, warn};

use crate::debug::{validation_available, DebugMessenger, VALIDATION_LAYER};
use crate::error::{VkError, VkResultExt};

const APP_NAME: &CStr = c"Lindmar";
const ENGINE_NAME: &CStr = c"Mountain Smithy";

/// Queue family indices; may be equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

/// Prefers one family that does both. Otherwise the first graphics family and
/// the first present-capable family.
pub fn find_queue_families(
    props: &[vk::QueueFamilyProperties],
    mut can_present: impl FnMut(u32) -> bool,
) -> Option<QueueFamilies> {
    let mut graphics = None;
    let mut present = None;
    for (i, q) in props.iter().enumerate() {
        let i = i as u32;
        let g = q.queue_count > 0 && q.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let p = can_present(i);
        if g && p {
            return Some(QueueFamilies {
                graphics: i,
                present: i,
            });
        }
        if g && graphics.is_none() {
            graphics = Some(i);
        }
        if p && present.is_none() {
            present = Some(i);
        }
    }
    Some(QueueFamilies {
        graphics: graphics?,
        present: present?,
    })
}

/// Capability snapshot for one surface/GPU pair. Re-queried before every
/// bundle build; never cached across rebuilds.
#[derive(Clone, Debug, Default)]
pub struct SwapchainDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainDetails {
    pub unsafe fn query(
        loader: &surface::Instance,
        phys: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self, VkError> {
        Ok(Self {
            capabilities: loader
                .get_physical_device_surface_capabilities(phys, surface)
                .op("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?,
            formats: loader
                .get_physical_device_surface_formats(phys, surface)
                .op("vkGetPhysicalDeviceSurfaceFormatsKHR")?,
            present_modes: loader
                .get_physical_device_surface_present_modes(phys, surface)
                .op("vkGetPhysicalDeviceSurfacePresentModesKHR")?,
        })
    }

    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Instance, surface, device and queues. Lives for the whole run; the
/// swapchain bundle is built on top of it and must be gone before it drops.
pub struct DeviceContext {
    _entry: Entry,
    pub instance: Instance,
    debug: Option<DebugMessenger>,
    pub surface_loader: surface::Instance,
    pub surface: vk::SurfaceKHR,
    pub phys: vk::PhysicalDevice,
    pub device: Device,
    pub families: QueueFamilies,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub swapchain_loader: swapchain::Device,
    pub command_pool: vk::CommandPool,
}

impl DeviceContext {
    /// # Safety
    /// `window` must outlive the returned context.
    pub unsafe fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        validation: bool,
    ) -> Result<Self> {
        let dh = display
            .display_handle()
            .map_err(|e| anyhow!("display handle: {e}"))?
            .as_raw();
        let wh = window
            .window_handle()
            .map_err(|e| anyhow!("window handle: {e}"))?
            .as_raw();

        let entry = Entry::linked();
        let validation = validation_available(&entry, validation);
        let instance = create_instance(&entry, dh, validation)?;

        // From here on, partially built state is torn down by `Partial`.
        let mut partial = Partial::default();
        partial.instance = Some(instance.clone());

        if validation {
            partial.debug = Some(DebugMessenger::new(&entry, &instance)?);
            info!("validation layer enabled");
        }

        let surface_loader = surface::Instance::new(&entry, &instance);
        partial.surface_loader = Some(surface_loader.clone());
        let surface = ash_window::create_surface(&entry, &instance, dh, wh, None)
            .op("vkCreateSurfaceKHR")?;
        partial.surface = surface;

        let (phys, families) = pick_physical_device(&instance, &surface_loader, surface)?;
        {
            let props = instance.get_physical_device_properties(phys);
            let name = props
                .device_name_as_c_str()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!(
                "GPU: {} (graphics family {}, present family {})",
                name, families.graphics, families.present
            );
        }

        let device = create_device(&instance, phys, families)?;
        partial.device = Some(device.clone());
        let graphics_queue = device.get_device_queue(families.graphics, 0);
        let present_queue = device.get_device_queue(families.present, 0);
        let swapchain_loader = swapchain::Device::new(&instance, &device);

        let pool_ci = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: families.graphics,
            ..Default::default()
        };
        let command_pool = device
            .create_command_pool(&pool_ci, None)
            .op("vkCreateCommandPool")?;

        let debug = partial.release();
        Ok(Self {
            _entry: entry,
            instance,
            debug,
            surface_loader,
            surface,
            phys,
            device,
            families,
            graphics_queue,
            present_queue,
            swapchain_loader,
            command_pool,
        })
    }

    pub fn query_details(&self) -> Result<SwapchainDetails, VkError> {
        unsafe { SwapchainDetails::query(&self.surface_loader, self.phys, self.surface) }
    }

    pub fn wait_idle(&self) -> Result<(), VkError> {
        unsafe { self.device.device_wait_idle() }.op("vkDeviceWaitIdle")
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_device(None);
            if let Some(debug) = self.debug.take() {
                debug.destroy();
            }
            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
        debug!("device context destroyed");
    }
}

/// Owned pieces of a context that failed halfway through construction.
#[derive(Default)]
struct Partial {
    instance: Option<Instance>,
    debug: Option<DebugMessenger>,
    surface_loader: Option<surface::Instance>,
    surface: vk::SurfaceKHR,
    device: Option<Device>,
}

impl Partial {
    /// Construction succeeded; ownership moves to `DeviceContext`.
    fn release(mut self) -> Option<DebugMessenger> {
        self.device = None;
        self.surface_loader = None;
        self.instance = None;
        self.debug.take()
    }
}

impl Drop for Partial {
    fn drop(&mut self) {
        unsafe {
            if let Some(device) = self.device.take() {
                device.destroy_device(None);
            }
            if let Some(debug) = self.debug.take() {
                debug.destroy();
            }
            if let Some(loader) = self.surface_loader.take() {
                loader.destroy_surface(self.surface, None);
            }
            if let Some(instance) = self.instance.take() {
                instance.destroy_instance(None);
            }
        }
    }
}

unsafe fn create_instance(
    entry: &Entry,
    display: raw_window_handle::RawDisplayHandle,
    validation: bool,
) -> Result<Instance> {
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: APP_NAME.as_ptr(),
        application_version: vk::make_api_version(0, 1, 0, 0),
        p_engine_name: ENGINE_NAME.as_ptr(),
        engine_version: vk::make_api_version(0, 1, 0, 0),
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let mut extensions = ash_window::enumerate_required_extensions(display)
        .op("vkEnumerateInstanceExtensionProperties")?
        .to_vec();
    let mut layers = Vec::new();
    if validation {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        layers.push(VALIDATION_LAYER.as_ptr());
    }

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };

    Ok(entry
        .create_instance(&create_info, None)
        .op("vkCreateInstance")?)
}

unsafe fn supports_swapchain(instance: &Instance, phys: vk::PhysicalDevice) -> bool {
    instance
        .enumerate_device_extension_properties(phys)
        .unwrap_or_default()
        .iter()
        .any(|e| e.extension_name_as_c_str().is_ok_and(|n| n == swapchain::NAME))
}

unsafe fn pick_physical_device(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, QueueFamilies), VkError> {
    let devices = instance
        .enumerate_physical_devices()
        .op("vkEnumeratePhysicalDevices")?;
    if devices.is_empty() {
        return Err(VkError::NoSuitableGpu("no Vulkan devices"));
    }

    for phys in devices {
        let props = instance.get_physical_device_queue_family_properties(phys);
        let Some(families) = find_queue_families(&props, |i| {
            surface_loader
                .get_physical_device_surface_support(phys, i, surface)
                .unwrap_or(false)
        }) else {
            continue;
        };
        if !supports_swapchain(instance, phys) {
            continue;
        }
        match SwapchainDetails::query(surface_loader, phys, surface) {
            Ok(details) if details.is_adequate() => return Ok((phys, families)),
            Ok(_) => {}
            Err(e) => warn!("skipping GPU: {e}"),
        }
    }
    Err(VkError::NoSuitableGpu(
        "need graphics and present queues, VK_KHR_swapchain, and a usable surface",
    ))
}

unsafe fn create_device(
    instance: &Instance,
    phys: vk::PhysicalDevice,
    families: QueueFamilies,
) -> Result<Device, VkError> {
    let priorities = [1.0f32];
    let mut unique = vec![families.graphics];
    if families.present != families.graphics {
        unique.push(families.present);
    }
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique
        .iter()
        .map(|&family| vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        })
        .collect();

    let extensions = [swapchain::NAME.as_ptr()];
    let features = vk::PhysicalDeviceFeatures::default();
    let create_info = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: queue_infos.len() as u32,
        p_queue_create_infos: queue_infos.as_ptr(),
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        p_enabled_features: &features,
        ..Default::default()
    };

    instance
        .create_device(phys, &create_info, None)
        .op("vkCreateDevice")
}
