// Vulkan device - instance, surface, device selection, queues
//
// Responsibilities:
// - Instance creation with validation layers
// - Window surface creation
// - Physical device selection (first suitable in enumeration order)
// - Logical device + queue creation

use ash::khr::surface;
use ash::{vk, Entry};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{CStr, CString};
use std::sync::Arc;
use winit::window::Window;

use super::debug::{self, DebugMessenger};
use super::error::VulkanError;
use super::query::{self, QueueFamilyIndices};

/// Device extensions every candidate GPU must expose.
pub fn required_device_extensions() -> [&'static CStr; 1] {
    [ash::khr::swapchain::NAME]
}

/// Vulkan device wrapper with automatic cleanup.
///
/// Owns the whole instance-level chain; teardown runs in strict reverse
/// creation order: device, debug messenger, surface, instance.
pub struct VulkanDevice {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub graphics_family: u32,
    pub present_family: u32,

    pub surface: vk::SurfaceKHR,
    pub surface_loader: surface::Instance,

    debug_messenger: Option<DebugMessenger>,
    pub instance: ash::Instance,
    _entry: Entry,
}

impl VulkanDevice {
    /// Bring the device up from nothing: load the loader, create the
    /// instance (with validation when enabled), create the window surface,
    /// pick a physical device, and open a logical device with its queues.
    pub fn new(
        window: &Window,
        app_name: &str,
        enable_validation: bool,
    ) -> Result<Arc<Self>, VulkanError> {
        log::info!("Creating Vulkan device: {}", app_name);

        let entry = unsafe { Entry::load() }?;

        if enable_validation && !debug::check_layer_support(&entry)? {
            return Err(VulkanError::ValidationLayersUnavailable);
        }

        for extension in query::instance_extensions(&entry)? {
            let name = unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) };
            log::debug!("available instance extension: {}", name.to_string_lossy());
        }

        let instance = Self::create_instance(&entry, window, app_name, enable_validation)?;

        let debug_messenger = if enable_validation {
            Some(DebugMessenger::new(&entry, &instance)?)
        } else {
            None
        };

        let surface_loader = surface::Instance::new(&entry, &instance);
        let surface = unsafe {
            ash_window::create_surface(
                &entry,
                &instance,
                window.display_handle()?.as_raw(),
                window.window_handle()?.as_raw(),
                None,
            )
        }
        .map_err(|result| VulkanError::ResourceCreation {
            what: "window surface",
            result,
        })?;

        let (physical_device, graphics_family, present_family) =
            Self::select_physical_device(&instance, &surface_loader, surface)?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        log::info!(
            "Selected GPU: {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy()
        );
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );

        let (device, graphics_queue, present_queue) = Self::create_logical_device(
            &instance,
            physical_device,
            graphics_family,
            present_family,
            enable_validation,
        )?;

        Ok(Arc::new(Self {
            device,
            physical_device,
            graphics_queue,
            present_queue,
            graphics_family,
            present_family,
            surface,
            surface_loader,
            debug_messenger,
            instance,
            _entry: entry,
        }))
    }

    fn create_instance(
        entry: &Entry,
        window: &Window,
        app_name: &str,
        enable_validation: bool,
    ) -> Result<ash::Instance, VulkanError> {
        let app_name_cstr = CString::new(app_name).unwrap_or_default();
        let engine_name = c"No Engine";

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        // Surface extensions for the current windowing system
        let mut extensions = ash_window::enumerate_required_extensions(
            window.display_handle()?.as_raw(),
        )
        .map_err(|result| VulkanError::DriverQuery {
            call: "enumerate_required_extensions",
            result,
        })?
        .to_vec();

        if enable_validation {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layer_names: Vec<*const std::os::raw::c_char> = if enable_validation {
            debug::VALIDATION_LAYERS
                .iter()
                .map(|layer| layer.as_ptr())
                .collect()
        } else {
            Vec::new()
        };

        // Chained into pNext so instance creation and destruction are
        // covered by the messenger as well.
        let mut debug_info = debug::messenger_create_info();

        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);
        if enable_validation {
            create_info = create_info.push_next(&mut debug_info);
        }

        let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(
            |result| VulkanError::ResourceCreation {
                what: "instance",
                result,
            },
        )?;

        Ok(instance)
    }

    /// Scan devices in enumeration order and take the first suitable one.
    /// No scoring across eligible GPUs.
    fn select_physical_device(
        instance: &ash::Instance,
        surface_loader: &surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<(vk::PhysicalDevice, u32, u32), VulkanError> {
        let devices = query::physical_devices(instance)?;
        log::debug!("{} physical device(s) enumerated", devices.len());

        for device in devices {
            let indices = Self::check_suitability(instance, surface_loader, device, surface)?;
            if let Some(QueueFamilyIndices {
                graphics: Some(graphics_family),
                present: Some(present_family),
            }) = indices
            {
                return Ok((device, graphics_family, present_family));
            }
        }

        Err(VulkanError::DeviceSelection)
    }

    /// Suitable iff queue families are complete, all required device
    /// extensions are present, and the surface offers at least one format
    /// and one present mode.
    fn check_suitability(
        instance: &ash::Instance,
        surface_loader: &surface::Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Option<QueueFamilyIndices>, VulkanError> {
        let indices = query::queue_families(instance, surface_loader, device, surface)?;
        if !indices.is_complete() {
            return Ok(None);
        }

        let available = query::device_extensions(instance, device)?;
        let missing = query::missing_extensions(&required_device_extensions(), &available);
        if !missing.is_empty() {
            log::debug!("device rejected, missing extensions: {:?}", missing);
            return Ok(None);
        }

        // Only queried once the swapchain extension is known to exist.
        let support = query::swapchain_support(surface_loader, device, surface)?;
        if !support.is_adequate() {
            return Ok(None);
        }

        Ok(Some(indices))
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        graphics_family: u32,
        present_family: u32,
        enable_validation: bool,
    ) -> Result<(ash::Device, vk::Queue, vk::Queue), VulkanError> {
        let queue_priorities = [1.0];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> =
            unique_queue_families(graphics_family, present_family)
                .into_iter()
                .map(|family| {
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(family)
                        .queue_priorities(&queue_priorities)
                })
                .collect();

        let extensions: Vec<*const std::os::raw::c_char> = required_device_extensions()
            .iter()
            .map(|name| name.as_ptr())
            .collect();

        // Device-level layers are ignored by modern drivers but passed for
        // compatibility with older implementations.
        let layer_names: Vec<*const std::os::raw::c_char> = if enable_validation {
            debug::VALIDATION_LAYERS
                .iter()
                .map(|layer| layer.as_ptr())
                .collect()
        } else {
            Vec::new()
        };

        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }
            .map_err(VulkanError::DeviceCreation)?;

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };

        Ok((device, graphics_queue, present_queue))
    }

    /// Wait for the device to go idle (e.g. before teardown).
    pub fn wait_idle(&self) -> Result<(), VulkanError> {
        unsafe { self.device.device_wait_idle() }.map_err(|result| {
            VulkanError::DriverQuery {
                call: "vkDeviceWaitIdle",
                result,
            }
        })
    }
}

/// One queue request per distinct family; a shared graphics/present family
/// yields a single request.
pub fn unique_queue_families(graphics_family: u32, present_family: u32) -> Vec<u32> {
    let mut families = vec![graphics_family];
    if present_family != graphics_family {
        families.push(present_family);
    }
    families
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        let _ = self.wait_idle();

        // Cleanup in reverse order
        unsafe {
            self.device.destroy_device(None);

            if let Some(mut messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }

            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_family_yields_one_queue_request() {
        assert_eq!(unique_queue_families(0, 0), vec![0]);
    }

    #[test]
    fn distinct_families_yield_two_queue_requests() {
        assert_eq!(unique_queue_families(0, 2), vec![0, 2]);
    }
}
