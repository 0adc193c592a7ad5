// Command recording - framebuffers, pool, buffer, and the per-frame recording
//
// One framebuffer per swapchain image view, a resettable pool, and a single
// primary command buffer re-recorded every frame.

use ash::vk;
use std::sync::Arc;

use super::error::VulkanError;
use super::VulkanDevice;

pub struct FrameResources {
    pub framebuffers: Vec<vk::Framebuffer>,
    pub command_pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
    /// Image acquisition needs at least one signalable object; this single
    /// fence is the only sync object in the blocking render cadence.
    pub acquire_fence: vk::Fence,
    device: Arc<VulkanDevice>,
}

impl FrameResources {
    pub fn new(
        device: Arc<VulkanDevice>,
        render_pass: vk::RenderPass,
        image_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<Self, VulkanError> {
        let framebuffers = create_framebuffers(&device, render_pass, image_views, extent)?;
        let command_pool = create_command_pool(&device)?;
        let command_buffer = allocate_command_buffer(&device, command_pool)?;

        let fence_info = vk::FenceCreateInfo::default();
        let acquire_fence = unsafe { device.device.create_fence(&fence_info, None) }.map_err(
            |result| VulkanError::ResourceCreation {
                what: "fence",
                result,
            },
        )?;

        log::info!("Created {} framebuffers and command buffer", framebuffers.len());

        Ok(Self {
            framebuffers,
            command_pool,
            command_buffer,
            acquire_fence,
            device,
        })
    }
}

impl Drop for FrameResources {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_fence(self.acquire_fence, None);
            // Destroying the pool frees its buffers.
            self.device
                .device
                .destroy_command_pool(self.command_pool, None);
            for &framebuffer in &self.framebuffers {
                self.device.device.destroy_framebuffer(framebuffer, None);
            }
        }
    }
}

/// One single-attachment framebuffer per image view, matching the chain
/// extent, one layer.
fn create_framebuffers(
    device: &VulkanDevice,
    render_pass: vk::RenderPass,
    image_views: &[vk::ImageView],
    extent: vk::Extent2D,
) -> Result<Vec<vk::Framebuffer>, VulkanError> {
    image_views
        .iter()
        .map(|&image_view| {
            let attachments = &[image_view];
            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            unsafe { device.device.create_framebuffer(&framebuffer_info, None) }.map_err(
                |result| VulkanError::ResourceCreation {
                    what: "framebuffer",
                    result,
                },
            )
        })
        .collect()
}

/// Pool on the graphics family, flagged so the buffer can be reset and
/// re-recorded each frame.
fn create_command_pool(device: &VulkanDevice) -> Result<vk::CommandPool, VulkanError> {
    let pool_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(device.graphics_family)
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

    unsafe { device.device.create_command_pool(&pool_info, None) }.map_err(|result| {
        VulkanError::ResourceCreation {
            what: "command pool",
            result,
        }
    })
}

fn allocate_command_buffer(
    device: &VulkanDevice,
    command_pool: vk::CommandPool,
) -> Result<vk::CommandBuffer, VulkanError> {
    let alloc_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(command_pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);

    let buffers = unsafe { device.device.allocate_command_buffers(&alloc_info) }.map_err(
        |result| VulkanError::ResourceCreation {
            what: "command buffer",
            result,
        },
    )?;

    Ok(buffers[0])
}

/// Record one frame: render pass over the full extent with an opaque black
/// clear, bind the pipeline, set the dynamic viewport and scissor, and draw
/// the three hardcoded vertices.
pub fn record_frame(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    framebuffer: vk::Framebuffer,
    render_pass: vk::RenderPass,
    pipeline: vk::Pipeline,
    extent: vk::Extent2D,
) -> Result<(), VulkanError> {
    let begin_info = vk::CommandBufferBeginInfo::default();

    unsafe {
        device
            .begin_command_buffer(command_buffer, &begin_info)
            .map_err(VulkanError::CommandRecording)?;

        let clear_color = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        };
        let clear_values = [clear_color];

        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        device.cmd_begin_render_pass(
            command_buffer,
            &render_pass_info,
            vk::SubpassContents::INLINE,
        );

        device.cmd_bind_pipeline(
            command_buffer,
            vk::PipelineBindPoint::GRAPHICS,
            pipeline,
        );

        // Dynamic state must be set before drawing.
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        device.cmd_set_viewport(command_buffer, 0, &[viewport]);

        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        device.cmd_set_scissor(command_buffer, 0, &[scissor]);

        // 3 vertices, 1 instance, no vertex buffer bound.
        device.cmd_draw(command_buffer, 3, 1, 0, 0);

        device.cmd_end_render_pass(command_buffer);

        device
            .end_command_buffer(command_buffer)
            .map_err(VulkanError::CommandRecording)?;
    }

    Ok(())
}
