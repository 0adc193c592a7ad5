// Capability queries against the Vulkan driver
//
// Pure read queries; nothing here mutates process state. A failing native
// call surfaces as DriverQuery naming the call, never as an empty result.

use ash::khr::surface;
use ash::vk;
use std::ffi::{CStr, CString};

use super::error::VulkanError;

/// Queue family assignment for a candidate physical device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }
}

/// Surface support details for a (device, surface) pair. Queried fresh at
/// suitability checks and again at chain creation; never cached.
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// At least one format and one present mode - the bare minimum a chain
    /// can be built from.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

pub fn instance_extensions(
    entry: &ash::Entry,
) -> Result<Vec<vk::ExtensionProperties>, VulkanError> {
    unsafe { entry.enumerate_instance_extension_properties(None) }.map_err(|result| {
        VulkanError::DriverQuery {
            call: "vkEnumerateInstanceExtensionProperties",
            result,
        }
    })
}

pub fn instance_layers(entry: &ash::Entry) -> Result<Vec<vk::LayerProperties>, VulkanError> {
    unsafe { entry.enumerate_instance_layer_properties() }.map_err(|result| {
        VulkanError::DriverQuery {
            call: "vkEnumerateInstanceLayerProperties",
            result,
        }
    })
}

pub fn physical_devices(
    instance: &ash::Instance,
) -> Result<Vec<vk::PhysicalDevice>, VulkanError> {
    unsafe { instance.enumerate_physical_devices() }.map_err(|result| {
        VulkanError::DriverQuery {
            call: "vkEnumeratePhysicalDevices",
            result,
        }
    })
}

pub fn device_extensions(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> Result<Vec<vk::ExtensionProperties>, VulkanError> {
    unsafe { instance.enumerate_device_extension_properties(device) }.map_err(|result| {
        VulkanError::DriverQuery {
            call: "vkEnumerateDeviceExtensionProperties",
            result,
        }
    })
}

/// Resolve queue families for `device` against `surface`.
pub fn queue_families(
    instance: &ash::Instance,
    surface_loader: &surface::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<QueueFamilyIndices, VulkanError> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    // Present support is tested per family, independently of graphics.
    let mut present_support = Vec::with_capacity(families.len());
    for index in 0..families.len() as u32 {
        let supported = unsafe {
            surface_loader.get_physical_device_surface_support(device, index, surface)
        }
        .map_err(|result| VulkanError::DriverQuery {
            call: "vkGetPhysicalDeviceSurfaceSupportKHR",
            result,
        })?;
        present_support.push(supported);
    }

    Ok(resolve_queue_families(&families, &present_support))
}

/// Assignment policy: scan families in index order, record the first
/// graphics-capable family and the first present-capable family, and stop at
/// the first complete assignment. A family offering both yields a shared
/// index; there is no exhaustive search for an optimal shared assignment.
pub fn resolve_queue_families(
    families: &[vk::QueueFamilyProperties],
    present_support: &[bool],
) -> QueueFamilyIndices {
    let mut indices = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        if indices.graphics.is_none()
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            indices.graphics = Some(i as u32);
        }
        if indices.present.is_none() && present_support.get(i).copied().unwrap_or(false) {
            indices.present = Some(i as u32);
        }
        if indices.is_complete() {
            break;
        }
    }

    indices
}

pub fn swapchain_support(
    surface_loader: &surface::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<SwapchainSupport, VulkanError> {
    let capabilities = unsafe {
        surface_loader.get_physical_device_surface_capabilities(device, surface)
    }
    .map_err(|result| VulkanError::DriverQuery {
        call: "vkGetPhysicalDeviceSurfaceCapabilitiesKHR",
        result,
    })?;

    let formats = unsafe {
        surface_loader.get_physical_device_surface_formats(device, surface)
    }
    .map_err(|result| VulkanError::DriverQuery {
        call: "vkGetPhysicalDeviceSurfaceFormatsKHR",
        result,
    })?;

    let present_modes = unsafe {
        surface_loader.get_physical_device_surface_present_modes(device, surface)
    }
    .map_err(|result| VulkanError::DriverQuery {
        call: "vkGetPhysicalDeviceSurfacePresentModesKHR",
        result,
    })?;

    Ok(SwapchainSupport {
        capabilities,
        formats,
        present_modes,
    })
}

/// Set-difference check: required extension names the driver did not report.
/// The required set staying non-empty means the device is unusable.
pub fn missing_extensions(
    required: &[&CStr],
    available: &[vk::ExtensionProperties],
) -> Vec<CString> {
    let available: Vec<&CStr> = available
        .iter()
        .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) })
        .collect();

    required
        .iter()
        .filter(|name| !available.contains(name))
        .map(|name| CString::from(*name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::raw::c_char;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn ext(name: &str) -> vk::ExtensionProperties {
        let mut props = vk::ExtensionProperties::default();
        for (dst, src) in props.extension_name.iter_mut().zip(name.bytes()) {
            *dst = src as c_char;
        }
        props
    }

    #[test]
    fn incomplete_without_both_indices() {
        let indices = QueueFamilyIndices {
            graphics: Some(0),
            present: None,
        };
        assert!(!indices.is_complete());
        assert!(QueueFamilyIndices {
            graphics: Some(0),
            present: Some(1),
        }
        .is_complete());
    }

    #[test]
    fn first_graphics_family_wins() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let indices = resolve_queue_families(&families, &[false, false, true]);
        assert_eq!(indices.graphics, Some(1));
        assert_eq!(indices.present, Some(2));
    }

    #[test]
    fn shared_family_assigned_when_first_family_has_both() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let indices = resolve_queue_families(&families, &[true, true]);
        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(0));
    }

    #[test]
    fn scan_stops_at_first_complete_assignment() {
        // Later families never overwrite an already complete assignment.
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let indices = resolve_queue_families(&families, &[true, true]);
        assert_eq!(indices, QueueFamilyIndices {
            graphics: Some(0),
            present: Some(0),
        });
    }

    #[test]
    fn no_present_support_leaves_assignment_incomplete() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let indices = resolve_queue_families(&families, &[false]);
        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, None);
        assert!(!indices.is_complete());
    }

    #[test]
    fn missing_swapchain_extension_is_reported() {
        let available = [ext("VK_KHR_maintenance1"), ext("VK_EXT_debug_marker")];
        let missing = missing_extensions(&[ash::khr::swapchain::NAME], &available);
        assert_eq!(missing.len(), 1);
    }

    #[test]
    fn present_extensions_leave_required_set_empty() {
        let available = [ext("VK_KHR_swapchain"), ext("VK_KHR_maintenance1")];
        let missing = missing_extensions(&[ash::khr::swapchain::NAME], &available);
        assert!(missing.is_empty());
    }

    #[test]
    fn adequacy_needs_a_format_and_a_present_mode() {
        let support = SwapchainSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![],
        };
        assert!(!support.is_adequate());
    }
}
