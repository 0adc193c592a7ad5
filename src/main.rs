// Vulkan triangle bootstrap
//
// Brings a rendering surface up from nothing: instance, surface, device,
// swapchain, pipeline, command recording, and a blocking present loop that
// draws one hardcoded triangle per iteration.
//
// INITIALIZATION CHAIN (each stage consumes the previous stage's handles):
// instance -> debug messenger -> surface -> physical device -> logical
// device -> swapchain + views -> render pass + pipeline -> framebuffers +
// command buffer. Teardown runs the exact reverse order.

mod backend;
mod config;

use anyhow::Result;
use ash::vk;
use backend::{
    command, shader, FrameResources, PipelineResources, Swapchain, VulkanDevice, VulkanError,
};
use config::Config;
use std::path::Path;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

const VERT_SHADER_PATH: &str = "shaders/triangle.vert.spv";
const FRAG_SHADER_PATH: &str = "shaders/triangle.frag.spv";

fn main() -> Result<()> {
    init_logging();

    let config = Config::load();
    log::info!("Starting Vulkan triangle");
    log::info!("Window: {}x{}", config.window.width, config.window.height);

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    // Any fatal error from inside the event loop surfaces here; main is the
    // only place that reports to the user and decides the exit status.
    if let Some(err) = app.fatal.take() {
        return Err(err);
    }
    Ok(())
}

fn init_logging() {
    use env_logger::Builder;
    use log::LevelFilter;

    let mut builder = Builder::from_default_env();
    builder.filter_level(LevelFilter::Info);
    builder.init();
}

/// Main application struct holding all Vulkan resources.
///
/// Teardown order is encoded in Drop: frame resources, pipeline, swapchain,
/// then the device (which tears down messenger, surface, and instance).
struct App {
    config: Config,

    window: Option<Arc<Window>>,

    device: Option<Arc<VulkanDevice>>,
    swapchain: Option<Swapchain>,
    pipeline: Option<PipelineResources>,
    frame: Option<FrameResources>,

    /// First fatal error raised inside the event loop, reported by main.
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            window: None,
            device: None,
            swapchain: None,
            pipeline: None,
            frame: None,
            fatal: None,
        }
    }

    /// Run the full bootstrap chain against a freshly created window.
    fn init_vulkan(&mut self, window: &Window) -> Result<(), VulkanError> {
        log::info!("Initializing Vulkan...");

        let enable_validation =
            cfg!(debug_assertions) && self.config.debug.validation_layers;

        let device =
            VulkanDevice::new(window, &self.config.window.title, enable_validation)?;

        let size = window.inner_size();
        let swapchain = Swapchain::new(device.clone(), size.width, size.height)?;

        let vert_code = shader::load_shader(Path::new(VERT_SHADER_PATH))?;
        let frag_code = shader::load_shader(Path::new(FRAG_SHADER_PATH))?;
        let pipeline =
            PipelineResources::new(device.clone(), swapchain.format, &vert_code, &frag_code)?;

        let frame = FrameResources::new(
            device.clone(),
            pipeline.render_pass,
            &swapchain.image_views,
            swapchain.extent,
        )?;

        self.device = Some(device);
        self.swapchain = Some(swapchain);
        self.pipeline = Some(pipeline);
        self.frame = Some(frame);

        log::info!("Vulkan initialized successfully");
        Ok(())
    }

    /// Draw one frame, blocking: acquire, re-record, submit, drain, present.
    /// Single-buffered cadence; the acquire fence is the only sync object.
    fn draw_frame(&mut self) -> Result<(), VulkanError> {
        let (Some(device), Some(swapchain), Some(pipeline), Some(frame)) = (
            self.device.as_ref(),
            self.swapchain.as_ref(),
            self.pipeline.as_ref(),
            self.frame.as_ref(),
        ) else {
            return Ok(());
        };

        unsafe { device.device.reset_fences(&[frame.acquire_fence]) }
            .map_err(VulkanError::CommandRecording)?;

        let image_index = swapchain.acquire_next_image(frame.acquire_fence)?;

        unsafe {
            device
                .device
                .wait_for_fences(&[frame.acquire_fence], true, u64::MAX)
        }
        .map_err(VulkanError::CommandRecording)?;

        unsafe {
            device.device.reset_command_buffer(
                frame.command_buffer,
                vk::CommandBufferResetFlags::empty(),
            )
        }
        .map_err(VulkanError::CommandRecording)?;

        command::record_frame(
            &device.device,
            frame.command_buffer,
            frame.framebuffers[image_index as usize],
            pipeline.render_pass,
            pipeline.pipeline,
            swapchain.extent,
        )?;

        let command_buffers = [frame.command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

        unsafe {
            device.device.queue_submit(
                device.graphics_queue,
                &[submit_info],
                vk::Fence::null(),
            )
        }
        .map_err(VulkanError::CommandRecording)?;

        // Drain the queue before presenting; with no frames in flight there
        // is nothing to overlap with.
        unsafe { device.device.queue_wait_idle(device.graphics_queue) }
            .map_err(VulkanError::CommandRecording)?;

        swapchain.present(image_index)?;

        Ok(())
    }

    fn abort(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(false);

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                self.abort(event_loop, e.into());
                return;
            }
        };

        if let Err(e) = self.init_vulkan(&window) {
            self.abort(event_loop, e.into());
            return;
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                if let Some(ref device) = self.device {
                    let _ = device.wait_idle();
                }
                event_loop.exit();
            }

            WindowEvent::RedrawRequested => {
                if let Err(e) = self.draw_frame() {
                    self.abort(event_loop, e.into());
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{Key, NamedKey};

                if event.state.is_pressed()
                    && event.logical_key == Key::Named(NamedKey::Escape)
                {
                    log::info!("ESC pressed, exiting...");
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");

        if let Some(ref device) = self.device {
            let _ = device.wait_idle();
        }

        // Destroy in reverse order of creation.
        self.frame = None;
        self.pipeline = None;
        self.swapchain = None;
        self.device = None;

        log::info!("Cleanup complete");
    }
}
