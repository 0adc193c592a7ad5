// Diagnostics bridge - validation layers and the debug messenger
//
// Conditionally active: the runtime flag is consulted once at bootstrap.
// Messages from the driver are forwarded through the log facade by severity.

use ash::ext::debug_utils;
use ash::vk;
use std::ffi::CStr;

use super::error::VulkanError;
use super::query;

pub const VALIDATION_LAYERS: &[&CStr] = &[c"VK_LAYER_KHRONOS_validation"];

/// Verify that every requested validation layer is reported by the driver.
pub fn check_layer_support(entry: &ash::Entry) -> Result<bool, VulkanError> {
    let available = query::instance_layers(entry)?;
    Ok(layers_all_found(VALIDATION_LAYERS, &available))
}

fn layers_all_found(requested: &[&CStr], available: &[vk::LayerProperties]) -> bool {
    requested.iter().all(|wanted| {
        available
            .iter()
            .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == *wanted)
    })
}

/// Shared messenger configuration, also chained into instance create/destroy
/// via pNext so those two calls are covered as well.
pub fn messenger_create_info<'a>() -> vk::DebugUtilsMessengerCreateInfoEXT<'a> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
}

pub struct DebugMessenger {
    loader: debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    pub fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Self, VulkanError> {
        let loader = debug_utils::Instance::new(entry, instance);
        let create_info = messenger_create_info();

        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }
            .map_err(|result| VulkanError::ResourceCreation {
                what: "debug messenger",
                result,
            })?;

        Ok(Self { loader, messenger })
    }

    pub fn destroy(&mut self) {
        unsafe {
            self.loader
                .destroy_debug_utils_messenger(self.messenger, None);
        }
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::raw::c_char;

    fn layer(name: &str) -> vk::LayerProperties {
        let mut props = vk::LayerProperties::default();
        for (dst, src) in props.layer_name.iter_mut().zip(name.bytes()) {
            *dst = src as c_char;
        }
        props
    }

    #[test]
    fn layer_check_requires_every_layer() {
        // Each requested layer must be verified, not just the first one.
        let requested = [c"VK_LAYER_KHRONOS_validation", c"VK_LAYER_LUNARG_api_dump"];
        let available = [layer("VK_LAYER_KHRONOS_validation")];
        assert!(!layers_all_found(&requested, &available));
    }

    #[test]
    fn layer_check_passes_when_all_present() {
        let available = [
            layer("VK_LAYER_NV_optimus"),
            layer("VK_LAYER_KHRONOS_validation"),
        ];
        assert!(layers_all_found(VALIDATION_LAYERS, &available));
    }

    #[test]
    fn layer_check_fails_on_empty_driver_list() {
        assert!(!layers_all_found(VALIDATION_LAYERS, &[]));
    }
}
