// Backend error taxonomy
//
// Every native call that can fail is checked immediately. There is no retry
// or partial-success path during bootstrap; errors propagate to main, which
// is the only place that reports to the user and picks the exit status.

use ash::vk;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VulkanError {
    #[error("failed to load Vulkan library: {0}")]
    EntryLoad(#[from] ash::LoadingError),

    #[error("failed to get native window handle: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),

    #[error("validation layers requested but unavailable")]
    ValidationLayersUnavailable,

    /// A read-only capability query was rejected by the driver. Carries the
    /// offending call name so "zero items" is never confused with "error".
    #[error("driver query {call} failed: {result}")]
    DriverQuery {
        call: &'static str,
        result: vk::Result,
    },

    #[error("no suitable gpu")]
    DeviceSelection,

    #[error("logical device creation failed: {0}")]
    DeviceCreation(vk::Result),

    #[error("swapchain creation failed: {0}")]
    SwapchainCreation(vk::Result),

    /// Names the stage that failed: render pass, pipeline layout, or the
    /// graphics pipeline itself.
    #[error("pipeline creation failed at {stage}: {result}")]
    PipelineCreation {
        stage: &'static str,
        result: vk::Result,
    },

    /// Recording, submission, or presentation of a frame failed.
    #[error("command recording failed: {0}")]
    CommandRecording(vk::Result),

    #[error("failed to read shader {path}: {source}")]
    ShaderLoad {
        path: String,
        source: std::io::Error,
    },

    /// Generic creation failure for the remaining owned objects (instance,
    /// surface, shader module, framebuffer, command pool, fence, ...).
    #[error("failed to create {what}: {result}")]
    ResourceCreation {
        what: &'static str,
        result: vk::Result,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_query_names_the_offending_call() {
        let err = VulkanError::DriverQuery {
            call: "vkEnumeratePhysicalDevices",
            result: vk::Result::ERROR_INITIALIZATION_FAILED,
        };
        assert!(err.to_string().contains("vkEnumeratePhysicalDevices"));
    }

    #[test]
    fn pipeline_error_names_the_stage() {
        let err = VulkanError::PipelineCreation {
            stage: "render pass",
            result: vk::Result::ERROR_OUT_OF_HOST_MEMORY,
        };
        assert!(err.to_string().contains("render pass"));
    }

    #[test]
    fn device_selection_message_matches_contract() {
        assert_eq!(VulkanError::DeviceSelection.to_string(), "no suitable gpu");
    }
}
