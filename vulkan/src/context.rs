use std::{
    borrow::Cow,
    ffi::{CStr, CString, c_char, c_void},
};

use anyhow::{Context, Result};
use ash::{
    ext::debug_utils,
    khr::{surface, swapchain},
    vk,
};
use log::{Level, debug, error, info, warn};
use winit::{
    raw_window_handle::{HasDisplayHandle, HasWindowHandle},
    window::Window,
};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// What the compute path needs from a physical device.
#[derive(Clone, Copy, Debug)]
pub struct DeviceRequirements {
    /// Format of the image the compute shader writes and blits from.
    pub storage_image_format: vk::Format,

    /// Local workgroup size in x and y.
    pub workgroup_size: [u32; 2],
}

/// Instance, device and surface shared by every other wrapper in this crate.
pub struct VulkanContext {
    pub instance: ash::Instance,
    pub device: ash::Device,

    pub debug_utils_instance: debug_utils::Instance,
    pub debug_utils_loader: debug_utils::Device,
    pub surface_loader: surface::Instance,
    pub swapchain_loader: swapchain::Device,

    pub debug_callback: vk::DebugUtilsMessengerEXT,

    pub physical_device: vk::PhysicalDevice,
    pub device_memory_properties: vk::PhysicalDeviceMemoryProperties,

    /// A single family that supports graphics, compute and presentation to `surface`. Blits
    /// need the graphics capability.
    pub queue_family_index: u32,

    pub surface: vk::SurfaceKHR,

    pub command_pool: vk::CommandPool,

    // Keeps the loader alive for as long as the instance.
    _entry: ash::Entry,
}

impl VulkanContext {
    pub fn new(app_name: &str, window: &Window, requirements: &DeviceRequirements) -> Result<Self> {
        let entry = unsafe { ash::Entry::load()? };
        let instance = create_instance(app_name, &entry, window)?;

        let (debug_callback, debug_utils_instance) = setup_debug_callback(&entry, &instance)?;

        let display_handle = window.display_handle()?.as_raw();
        let window_handle = window.window_handle()?.as_raw();

        let surface_loader = surface::Instance::new(&entry, &instance);
        let surface = unsafe {
            ash_window::create_surface(&entry, &instance, display_handle, window_handle, None)?
        };

        let (physical_device, queue_family_index) =
            select_physical_device(&instance, &surface_loader, surface, requirements)?;

        let device = create_device(&instance, physical_device, queue_family_index)?;
        let swapchain_loader = swapchain::Device::new(&instance, &device);
        let command_pool = create_command_pool(&device, queue_family_index)?;

        let device_memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        info!(
            "Using device {:?} (queue family {queue_family_index})",
            properties.device_name_as_c_str().unwrap_or(c"unknown")
        );

        let debug_utils_loader = debug_utils::Device::new(&instance, &device);

        Ok(Self {
            instance,
            device,
            queue_family_index,
            physical_device,
            device_memory_properties,
            surface,
            surface_loader,
            swapchain_loader,
            command_pool,
            debug_callback,
            debug_utils_loader,
            debug_utils_instance,
            _entry: entry,
        })
    }

    /// The queue used for compute dispatches, blits and presentation.
    pub fn queue(&self) -> vk::Queue {
        unsafe { self.device.get_device_queue(self.queue_family_index, 0) }
    }

    pub fn set_debug_utils_object_name<T: vk::Handle>(
        &self,
        object_handle: T,
        object_name: &str,
    ) -> Result<()> {
        let name_cstr = CString::new(object_name)?;

        let name_info = vk::DebugUtilsObjectNameInfoEXT::default()
            .object_handle(object_handle)
            .object_name(&name_cstr);

        unsafe {
            self.debug_utils_loader
                .set_debug_utils_object_name(&name_info)?
        };

        Ok(())
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                error!("VulkanContext: device_wait_idle failed: {e:?}");
            }

            self.device.destroy_command_pool(self.command_pool, None);

            self.device.destroy_device(None);

            self.surface_loader.destroy_surface(self.surface, None);

            self.debug_utils_instance
                .destroy_debug_utils_messenger(self.debug_callback, None);

            self.instance.destroy_instance(None);
        }
    }
}

fn create_command_pool(device: &ash::Device, queue_family_index: u32) -> Result<vk::CommandPool> {
    // Every command buffer is recorded once and freed after its submission completes.
    let pool_create_info = vk::CommandPoolCreateInfo::default()
        .flags(vk::CommandPoolCreateFlags::TRANSIENT)
        .queue_family_index(queue_family_index);

    Ok(unsafe { device.create_command_pool(&pool_create_info, None)? })
}

/// Instance layers to enable. Validation is used when the layer is installed.
fn instance_layers(entry: &ash::Entry) -> Vec<*const c_char> {
    let installed = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
    let has_validation = installed.iter().any(|layer| {
        layer
            .layer_name_as_c_str()
            .is_ok_and(|name| name == VALIDATION_LAYER)
    });

    if has_validation {
        debug!("Enabling {VALIDATION_LAYER:?}");
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        warn!("{VALIDATION_LAYER:?} is not installed; running without validation");
        Vec::new()
    }
}

fn create_instance(app_name: &str, entry: &ash::Entry, window: &Window) -> Result<ash::Instance> {
    let layers = instance_layers(entry);

    let display_handle = window.display_handle()?.as_raw();
    let mut extensions = ash_window::enumerate_required_extensions(display_handle)?.to_vec();
    extensions.push(debug_utils::NAME.as_ptr());

    let mut flags = vk::InstanceCreateFlags::empty();
    if cfg!(any(target_os = "macos", target_os = "ios")) {
        extensions.push(ash::khr::portability_enumeration::NAME.as_ptr());
        extensions.push(ash::khr::get_physical_device_properties2::NAME.as_ptr());
        flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    }

    let app_name = CString::new(app_name)?;
    let version = vk::make_api_version(0, 0, 1, 0);
    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(version)
        .engine_name(c"raytracer")
        .engine_version(version)
        .api_version(vk::API_VERSION_1_1);

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_layer_names(&layers)
        .enabled_extension_names(&extensions)
        .flags(flags);

    Ok(unsafe { entry.create_instance(&create_info, None)? })
}

/// Returns a reason `physical_device` cannot run the compute path, if any.
fn unsuitable_reason(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    requirements: &DeviceRequirements,
) -> Option<String> {
    let has_swapchain = unsafe { instance.enumerate_device_extension_properties(physical_device) }
        .map(|exts| {
            exts.iter().any(|ext| {
                ext.extension_name_as_c_str()
                    .is_ok_and(|name| name == ash::khr::swapchain::NAME)
            })
        })
        .unwrap_or(false);
    if !has_swapchain {
        return Some("no swapchain support".to_string());
    }

    let limits = unsafe { instance.get_physical_device_properties(physical_device) }.limits;
    let [x, y] = requirements.workgroup_size;
    if x > limits.max_compute_work_group_size[0]
        || y > limits.max_compute_work_group_size[1]
        || x * y > limits.max_compute_work_group_invocations
    {
        return Some(format!("workgroups of {x}x{y} are too large"));
    }

    let format = unsafe {
        instance.get_physical_device_format_properties(
            physical_device,
            requirements.storage_image_format,
        )
    };
    let needed = vk::FormatFeatureFlags::STORAGE_IMAGE | vk::FormatFeatureFlags::BLIT_SRC;
    if !format.optimal_tiling_features.contains(needed) {
        return Some(format!(
            "{:?} cannot be a storage image and blit source",
            requirements.storage_image_format
        ));
    }

    None
}

fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
    requirements: &DeviceRequirements,
) -> Result<(vk::PhysicalDevice, u32)> {
    let mut candidates: Vec<_> = unsafe { instance.enumerate_physical_devices() }?
        .into_iter()
        .filter_map(|physical_device| {
            if let Some(reason) = unsuitable_reason(instance, physical_device, requirements) {
                debug!("Skipping physical device {physical_device:?}: {reason}");
                return None;
            }

            let families =
                unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

            families
                .iter()
                .enumerate()
                .position(|(i, properties)| {
                    let supports_present = unsafe {
                        surface_loader.get_physical_device_surface_support(
                            physical_device,
                            i as u32,
                            surface,
                        )
                    }
                    .unwrap_or(false);

                    properties.queue_count > 0
                        && properties
                            .queue_flags
                            .contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
                        && supports_present
                })
                .map(|i| (physical_device, i as u32))
        })
        .collect();

    // Prefer discrete GPUs.
    candidates.sort_by_key(|(physical_device, _)| {
        let properties = unsafe { instance.get_physical_device_properties(*physical_device) };
        properties.device_type != vk::PhysicalDeviceType::DISCRETE_GPU
    });

    candidates
        .into_iter()
        .next()
        .context("No device can run compute workloads and present to this window")
}

fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
) -> Result<ash::Device> {
    let device_extension_names_raw = [
        ash::khr::swapchain::NAME.as_ptr(),
        #[cfg(any(target_os = "macos", target_os = "ios"))]
        ash::khr::portability_subset::NAME.as_ptr(),
    ];

    let priorities = [1.0];

    let queue_info = vk::DeviceQueueCreateInfo::default()
        .queue_family_index(queue_family_index)
        .queue_priorities(&priorities);

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(std::slice::from_ref(&queue_info))
        .enabled_extension_names(&device_extension_names_raw);

    let device = unsafe { instance.create_device(physical_device, &device_create_info, None)? };
    Ok(device)
}

fn setup_debug_callback(
    entry: &ash::Entry,
    instance: &ash::Instance,
) -> Result<(vk::DebugUtilsMessengerEXT, debug_utils::Instance)> {
    type Severity = vk::DebugUtilsMessageSeverityFlagsEXT;
    type Kind = vk::DebugUtilsMessageTypeFlagsEXT;

    let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(Severity::ERROR | Severity::WARNING | Severity::INFO)
        .message_type(Kind::GENERAL | Kind::VALIDATION | Kind::PERFORMANCE)
        .pfn_user_callback(Some(log_validation_message));

    let debug_utils_instance = debug_utils::Instance::new(entry, instance);
    let messenger =
        unsafe { debug_utils_instance.create_debug_utils_messenger(&debug_info, None)? };

    Ok((messenger, debug_utils_instance))
}

/// Forwards validation and driver messages to `log` under the `vulkan` target.
extern "system" fn log_validation_message(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    kind: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let level = if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        Level::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        Level::Warn
    } else {
        Level::Debug
    };

    if !log::log_enabled!(target: "vulkan", level) {
        return vk::FALSE;
    }

    let lossy = |ptr: *const c_char| {
        if ptr.is_null() {
            Cow::from("")
        } else {
            unsafe { CStr::from_ptr(ptr).to_string_lossy() }
        }
    };

    let data = unsafe { &*callback_data };
    log::log!(
        target: "vulkan",
        level,
        "{kind:?} [{} ({})] {}",
        lossy(data.p_message_id_name),
        data.message_id_number,
        lossy(data.p_message)
    );

    vk::FALSE
}
