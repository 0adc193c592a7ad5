// Graphics pipeline creation
//
// Fixed-function state for the triangle: no vertex input (geometry lives in
// the vertex shader), dynamic viewport/scissor, no depth, no blending.

use ash::vk;
use std::sync::Arc;

use super::error::VulkanError;
use super::shader;
use super::VulkanDevice;

/// Render pass, pipeline layout, and pipeline, owned jointly. The layout
/// and pass outlive the pipeline and are destroyed after it.
pub struct PipelineResources {
    pub render_pass: vk::RenderPass,
    pub layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
    device: Arc<VulkanDevice>,
}

impl PipelineResources {
    pub fn new(
        device: Arc<VulkanDevice>,
        format: vk::Format,
        vert_code: &[u32],
        frag_code: &[u32],
    ) -> Result<Self, VulkanError> {
        let render_pass = create_render_pass(&device, format)?;
        let layout = create_pipeline_layout(&device)?;
        let pipeline =
            create_graphics_pipeline(&device, render_pass, layout, vert_code, frag_code)?;

        Ok(Self {
            render_pass,
            layout,
            pipeline,
            device,
        })
    }
}

impl Drop for PipelineResources {
    fn drop(&mut self) {
        // Reverse creation order: pipeline, then layout, then render pass.
        unsafe {
            self.device.device.destroy_pipeline(self.pipeline, None);
            self.device.device.destroy_pipeline_layout(self.layout, None);
            self.device.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// Single color attachment in the chain's format: cleared on load, stored
/// for presentation, stencil ignored, UNDEFINED in and PRESENT_SRC out.
fn create_render_pass(
    device: &VulkanDevice,
    format: vk::Format,
) -> Result<vk::RenderPass, VulkanError> {
    log::debug!("Creating render pass");

    let color_attachment = vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

    // Index 0 matches the fragment shader's single output location.
    let color_attachment_ref = vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

    let color_attachments = &[color_attachment_ref];
    let subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(color_attachments);

    let attachments = &[color_attachment];
    let subpasses = &[subpass];
    let render_pass_info = vk::RenderPassCreateInfo::default()
        .attachments(attachments)
        .subpasses(subpasses);

    unsafe { device.device.create_render_pass(&render_pass_info, None) }.map_err(|result| {
        VulkanError::PipelineCreation {
            stage: "render pass",
            result,
        }
    })
}

/// Zero descriptor-set layouts and zero push-constant ranges; reserved for
/// future uniform support.
fn create_pipeline_layout(device: &VulkanDevice) -> Result<vk::PipelineLayout, VulkanError> {
    let layout_info = vk::PipelineLayoutCreateInfo::default();

    unsafe { device.device.create_pipeline_layout(&layout_info, None) }.map_err(|result| {
        VulkanError::PipelineCreation {
            stage: "pipeline layout",
            result,
        }
    })
}

fn create_graphics_pipeline(
    device: &VulkanDevice,
    render_pass: vk::RenderPass,
    layout: vk::PipelineLayout,
    vert_code: &[u32],
    frag_code: &[u32],
) -> Result<vk::Pipeline, VulkanError> {
    log::debug!("Creating graphics pipeline");

    let vert_module = shader::create_shader_module(device, vert_code)?;
    let frag_module = match shader::create_shader_module(device, frag_code) {
        Ok(module) => module,
        Err(e) => {
            unsafe { device.device.destroy_shader_module(vert_module, None) };
            return Err(e);
        }
    };

    let entry_point = c"main";

    let vert_stage = vk::PipelineShaderStageCreateInfo::default()
        .stage(vk::ShaderStageFlags::VERTEX)
        .module(vert_module)
        .name(entry_point);

    let frag_stage = vk::PipelineShaderStageCreateInfo::default()
        .stage(vk::ShaderStageFlags::FRAGMENT)
        .module(frag_module)
        .name(entry_point);

    let shader_stages = &[vert_stage, frag_stage];

    // No bindings or attributes; the triangle is hardcoded in the shader.
    let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::default();

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    // Viewport and scissor are dynamic; only the counts are baked in.
    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);

    let rasterizer = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::CLOCKWISE)
        .depth_bias_enable(false);

    let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    // Blending disabled: pass-through write of all four channels.
    let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(false);

    let color_blend_attachments = &[color_blend_attachment];
    let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(color_blend_attachments);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(shader_stages)
        .vertex_input_state(&vertex_input_info)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let result = unsafe {
        device.device.create_graphics_pipelines(
            vk::PipelineCache::null(),
            &[pipeline_info],
            None,
        )
    };

    // Modules are transient: destroyed as soon as the create call returns,
    // whatever its outcome.
    unsafe {
        device.device.destroy_shader_module(vert_module, None);
        device.device.destroy_shader_module(frag_module, None);
    }

    let pipelines = result.map_err(|(_, result)| VulkanError::PipelineCreation {
        stage: "graphics pipeline",
        result,
    })?;

    Ok(pipelines[0])
}
