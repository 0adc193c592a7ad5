// Vulkan backend: bootstrap and single-frame recording
//
// Covers the path from capability queries through device and swapchain
// setup to a fixed triangle pipeline and one re-recorded command buffer.
// Each owned object group tears itself down in reverse creation order.

pub mod command;
pub mod debug;
pub mod device;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod shader;
pub mod swapchain;

pub use command::FrameResources;
pub use device::VulkanDevice;
pub use error::VulkanError;
pub use pipeline::PipelineResources;
pub use swapchain::Swapchain;
