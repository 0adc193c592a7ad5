// Swapchain - window presentation
//
// Owns the presentation chain, its images, and one view per image.
// Chain parameters are derived fresh from the surface support query.

use ash::khr::swapchain;
use ash::vk;
use std::sync::Arc;

use super::error::VulkanError;
use super::query;
use super::VulkanDevice;

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub loader: swapchain::Device,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    device: Arc<VulkanDevice>,
}

/// Prefer B8G8R8A8_SRGB with the sRGB nonlinear color space; otherwise fall
/// back to the first reported entry. The fallback is weak - the first entry
/// may be an arbitrary format - but matches the documented policy.
pub fn choose_surface_format(
    available: &[vk::SurfaceFormatKHR],
) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| available.first().copied())
}

/// Prefer MAILBOX (replace the queued frame, low latency); FIFO is the
/// fallback since the platform guarantees it is always available.
pub fn choose_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    available
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Use the surface's current extent verbatim unless it carries the u32::MAX
/// "window manager decides" sentinel, in which case the live framebuffer
/// size is clamped into the supported range component-wise.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Request the minimum image count, bumped down to the maximum if that bound
/// is nonzero and exceeded (max_image_count == 0 means unbounded).
pub fn clamp_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut image_count = capabilities.min_image_count;
    if capabilities.max_image_count > 0 && image_count > capabilities.max_image_count {
        image_count = capabilities.max_image_count;
    }
    image_count
}

impl Swapchain {
    pub fn new(device: Arc<VulkanDevice>, width: u32, height: u32) -> Result<Self, VulkanError> {
        let support = query::swapchain_support(
            &device.surface_loader,
            device.physical_device,
            device.surface,
        )?;

        let surface_format = choose_surface_format(&support.formats).ok_or(
            VulkanError::SwapchainCreation(vk::Result::ERROR_FORMAT_NOT_SUPPORTED),
        )?;
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, width, height);
        let image_count = clamp_image_count(&support.capabilities);

        log::info!(
            "Creating swapchain: {}x{}, {:?}, {:?}",
            extent.width,
            extent.height,
            surface_format.format,
            present_mode
        );

        let loader = swapchain::Device::new(&device.instance, &device.device);

        let queue_family_indices = [device.graphics_family, device.present_family];

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(device.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            // Obscured pixels may be undefined; fine since nothing reads back.
            .clipped(true);

        // Exclusive ownership when one family does both; concurrent across
        // exactly the two distinct families otherwise.
        let create_info = if device.graphics_family != device.present_family {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_family_indices)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(VulkanError::SwapchainCreation)?;

        // The driver may hand back more images than requested.
        let images = unsafe { loader.get_swapchain_images(swapchain) }
            .map_err(VulkanError::SwapchainCreation)?;

        log::info!("Created swapchain with {} images", images.len());

        let image_views = create_image_views(&device, &images, surface_format.format)?;

        Ok(Self {
            swapchain,
            loader,
            images,
            image_views,
            format: surface_format.format,
            extent,
            device,
        })
    }

    /// Block until an image is available, signalled through `fence`.
    pub fn acquire_next_image(&self, fence: vk::Fence) -> Result<u32, VulkanError> {
        let (index, _suboptimal) = unsafe {
            self.loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                vk::Semaphore::null(),
                fence,
            )
        }
        .map_err(VulkanError::CommandRecording)?;

        Ok(index)
    }

    /// Present `image_index`. The caller has already drained the queue, so
    /// no wait semaphores are attached.
    pub fn present(&self, image_index: u32) -> Result<(), VulkanError> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe {
            self.loader
                .queue_present(self.device.present_queue, &present_info)
        }
        .map_err(VulkanError::CommandRecording)?;

        Ok(())
    }
}

/// One 2D, identity-swizzled, single-mip, single-layer color view per image.
fn create_image_views(
    device: &VulkanDevice,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>, VulkanError> {
    images
        .iter()
        .map(|&image| {
            let create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            unsafe { device.device.create_image_view(&create_info, None) }
                .map_err(VulkanError::SwapchainCreation)
        })
        .collect()
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn preferred_format_chosen_wherever_it_sits() {
        let available = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&available).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn format_falls_back_to_first_entry() {
        let available = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&available).unwrap();
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn format_choice_on_empty_list_is_none() {
        assert!(choose_surface_format(&[]).is_none());
    }

    #[test]
    fn mailbox_preferred_when_available() {
        let available = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(choose_present_mode(&available), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn fifo_assumed_always_present() {
        let available = [vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&available), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn current_extent_used_verbatim_when_set() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
            ..Default::default()
        };
        let extent = choose_extent(&capabilities, 1024, 768);
        assert_eq!(extent.width, 640);
        assert_eq!(extent.height, 480);
    }

    #[test]
    fn sentinel_extent_clamps_framebuffer_size() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };
        let extent = choose_extent(&capabilities, 1024, 768);
        assert_eq!(extent.width, 1024);
        assert_eq!(extent.height, 768);

        let oversized = choose_extent(&capabilities, 8192, 8192);
        assert_eq!(oversized.width, 4096);
        assert_eq!(oversized.height, 4096);
    }

    #[test]
    fn image_count_stays_within_bounds() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            ..Default::default()
        };
        let count = clamp_image_count(&capabilities);
        assert!(count >= capabilities.min_image_count);
        assert!(count <= capabilities.max_image_count);
    }

    #[test]
    fn unbounded_max_keeps_minimum_request() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0, // unbounded
            ..Default::default()
        };
        assert_eq!(clamp_image_count(&capabilities), 2);
    }

    #[test]
    fn tight_max_bumps_request_down() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 4,
            max_image_count: 2,
            ..Default::default()
        };
        assert_eq!(clamp_image_count(&capabilities), 2);
    }
}
