//! Full-screen window that hosts the slideshow and the brightness poller on a
//! single `winit` event loop.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use chrono::{Local, Timelike};
use image::{RgbaImage, imageops};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wgpu::util::DeviceExt;
use wgpu::SurfaceError;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowAttributes, WindowId},
};

use crate::backlight::SysfsBacklight;
use crate::config::SlideshowConfig;
use crate::scale::ScaledImage;
use crate::schedule::BrightnessPoller;
use crate::shutdown::forward_cancellation;
use crate::slideshow::{FrameSink, Slideshow, SlideshowState, Termination};
use crate::store::ImageStore;

const WINDOW_TITLE: &str = "Photos";

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    pos: [f32; 2],
    uv: [f32; 2],
}

const QUAD: [Vertex; 4] = [
    Vertex {
        pos: [-1.0, -1.0],
        uv: [0.0, 1.0],
    },
    Vertex {
        pos: [1.0, -1.0],
        uv: [1.0, 1.0],
    },
    Vertex {
        pos: [-1.0, 1.0],
        uv: [0.0, 0.0],
    },
    Vertex {
        pos: [1.0, 1.0],
        uv: [1.0, 0.0],
    },
];

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Params {
    extent: [f32; 4],
}

#[derive(Debug)]
enum ViewerEvent {
    Interrupted,
}

/// The photo currently on screen.
struct Photo {
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

/// GPU-backed [`FrameSink`] for one window.
struct GpuSurface {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    bind_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    params: wgpu::Buffer,
    vbuf: wgpu::Buffer,
    photo: Option<Photo>,
}

impl GpuSurface {
    fn new(window: Arc<Window>) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("slideshow-device"),
            required_limits: adapter.limits(),
            ..Default::default()
        }))
        .context("failed to acquire GPU device")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(wgpu::TextureFormat::is_srgb)
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no texture formats"))?;
        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };
        surface.configure(&device, &config);
        info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            "surface configured"
        );

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("photo-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/photo.wgsl").into()),
        });

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("photo-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("photo-pipeline-layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("photo-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        // 1:1 pixel mapping, so nearest sampling keeps the photo sharp.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("photo-sampler"),
            ..Default::default()
        });

        let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("photo-params"),
            contents: bytemuck::bytes_of(&Params { extent: [1.0; 4] }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let vbuf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("photo-quad"),
            contents: bytemuck::cast_slice(&QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            pipeline,
            bind_layout,
            sampler,
            params,
            vbuf,
            photo: None,
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
        self.write_params();
        debug!(width = size.width, height = size.height, "surface resized");
        self.window.request_redraw();
    }

    fn write_params(&self) {
        let Some(photo) = &self.photo else { return };
        let extent = quad_extent(
            (photo.width, photo.height),
            (self.config.width, self.config.height),
        );
        self.queue
            .write_buffer(&self.params, 0, bytemuck::bytes_of(&Params { extent }));
    }

    fn upload(&self, pixels: &RgbaImage) -> wgpu::TextureView {
        let (width, height) = pixels.dimensions();
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("photo"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            texture.as_image_copy(),
            pixels.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn draw(&mut self) -> Result<()> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Outdated | SurfaceError::Lost | SurfaceError::Other) => {
                info!("surface lost; reconfiguring");
                self.resize(self.window.inner_size());
                return Ok(());
            }
            Err(SurfaceError::Timeout) => {
                warn!("surface acquisition timed out");
                return Ok(());
            }
            Err(SurfaceError::OutOfMemory) => return Err(anyhow!("surface out of memory")),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("photo-encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("photo-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if let Some(photo) = &self.photo {
                rpass.set_pipeline(&self.pipeline);
                rpass.set_bind_group(0, &photo.bind_group, &[]);
                rpass.set_vertex_buffer(0, self.vbuf.slice(..));
                rpass.draw(0..4, 0..1);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

impl FrameSink for GpuSurface {
    fn size(&self) -> (u32, u32) {
        let PhysicalSize { width, height } = self.window.inner_size();
        (width, height)
    }

    fn present(&mut self, frame: &ScaledImage) -> Result<()> {
        let max_dim = self.device.limits().max_texture_dimension_2d;
        let visible = visible_region(
            &frame.pixels,
            (self.config.width.min(max_dim), self.config.height.min(max_dim)),
        );
        let view = self.upload(&visible);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("photo-bind-group"),
            layout: &self.bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.params.as_entire_binding(),
                },
            ],
        });
        self.photo = Some(Photo {
            bind_group,
            width: visible.width(),
            height: visible.height(),
        });
        self.write_params();
        self.draw()
    }
}

/// Centre-crop `pixels` to at most `bounds`; the rest would fall outside the
/// viewport anyway.
fn visible_region(pixels: &RgbaImage, bounds: (u32, u32)) -> Cow<'_, RgbaImage> {
    let (w, h) = pixels.dimensions();
    let vis_w = w.min(bounds.0).max(1);
    let vis_h = h.min(bounds.1).max(1);
    if (vis_w, vis_h) == (w, h) {
        return Cow::Borrowed(pixels);
    }
    let x = (w - vis_w) / 2;
    let y = (h - vis_h) / 2;
    Cow::Owned(imageops::crop_imm(pixels, x, y, vis_w, vis_h).to_image())
}

/// NDC half-extent of a centred quad showing `image` pixels 1:1 on `surface`.
#[allow(clippy::cast_precision_loss)]
fn quad_extent(image: (u32, u32), surface: (u32, u32)) -> [f32; 4] {
    let sw = surface.0.max(1) as f32;
    let sh = surface.1.max(1) as f32;
    [image.0 as f32 / sw, image.1 as f32 / sh, 0.0, 0.0]
}

struct ViewerApp {
    slideshow: Slideshow,
    poller: Option<BrightnessPoller<SysfsBacklight>>,
    window: Option<Arc<Window>>,
    gpu: Option<GpuSurface>,
    failure: Option<anyhow::Error>,
}

impl ViewerApp {
    fn new(cfg: SlideshowConfig) -> Self {
        let poller = cfg
            .brightness
            .map(|schedule| BrightnessPoller::new(schedule, SysfsBacklight::default()));
        Self {
            slideshow: Slideshow::new(ImageStore::new(cfg.store), cfg.period),
            poller,
            window: None,
            gpu: None,
            failure: None,
        }
    }

    fn create_window(event_loop: &ActiveEventLoop) -> Result<Arc<Window>> {
        let attrs = WindowAttributes::default()
            .with_title(WINDOW_TITLE)
            .with_fullscreen(Some(Fullscreen::Borderless(None)));
        let window = event_loop
            .create_window(attrs)
            .context("failed to create slideshow window")?;
        window.set_cursor_visible(false);
        info!("window fullscreen initialized");
        Ok(Arc::new(window))
    }

    fn run_due_work(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if let Some(gpu) = self.gpu.as_mut() {
            if let Err(err) = self.slideshow.poll(now, gpu) {
                self.fail(event_loop, err.into());
                return;
            }
        }
        if let Some(poller) = self.poller.as_mut() {
            poller.poll(now, Local::now().hour());
        }
        self.schedule_wakeup(event_loop);
    }

    fn schedule_wakeup(&self, event_loop: &ActiveEventLoop) {
        let poll_deadline = self.poller.as_ref().and_then(BrightnessPoller::next_deadline);
        let deadline = match (self.slideshow.next_deadline(), poll_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        event_loop.set_control_flow(deadline.map_or(ControlFlow::Wait, ControlFlow::WaitUntil));
    }

    /// Start the slideshow once the window has a usable size, or re-fit the
    /// image on screen to a new size without advancing.
    fn fit_to_window(&mut self, event_loop: &ActiveEventLoop) {
        let Some(gpu) = self.gpu.as_mut() else { return };
        let (width, height) = gpu.size();
        if width == 0 || height == 0 {
            return;
        }
        let result = if self.slideshow.state() == SlideshowState::Idle {
            self.slideshow.start(Instant::now(), gpu).map(Some)
        } else {
            self.slideshow.refresh(gpu)
        };
        match result {
            Ok(Some(outcome)) => debug!(width, height, ?outcome, "fitted to window"),
            Ok(None) => {}
            Err(err) => return self.fail(event_loop, err.into()),
        }
        self.schedule_wakeup(event_loop);
    }

    /// Stop ticking and release the display.
    fn shut_down(&mut self, event_loop: &ActiveEventLoop) {
        self.slideshow.interrupt();
        self.gpu = None;
        self.window = None;
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!(error = ?err, "slideshow stopped");
        self.failure = Some(err);
        self.shut_down(event_loop);
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.slideshow.state() != SlideshowState::Idle {
            return;
        }
        let window = match Self::create_window(event_loop) {
            Ok(window) => window,
            Err(err) => return self.fail(event_loop, err),
        };
        let mut gpu = match GpuSurface::new(window.clone()) {
            Ok(gpu) => gpu,
            Err(err) => return self.fail(event_loop, err.context("failed to initialize GPU state")),
        };
        if let Err(err) = gpu.draw() {
            return self.fail(event_loop, err);
        }
        // The first tick waits for the window manager to settle the
        // fullscreen geometry; see `fit_to_window`.
        window.request_redraw();
        self.window = Some(window);
        self.gpu = Some(gpu);
        self.run_due_work(event_loop);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("window close requested");
                self.shut_down(event_loop);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let quit_key = matches!(
                    event.physical_key,
                    PhysicalKey::Code(KeyCode::Escape | KeyCode::KeyQ)
                );
                if event.state == ElementState::Released && quit_key {
                    info!("quit key pressed");
                    self.shut_down(event_loop);
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(size);
                }
                self.fit_to_window(event_loop);
            }
            WindowEvent::RedrawRequested if self.slideshow.state() == SlideshowState::Idle => {
                self.fit_to_window(event_loop);
            }
            WindowEvent::RedrawRequested => {
                let drawn = self.gpu.as_mut().map_or(Ok(()), GpuSurface::draw);
                if let Err(err) = drawn {
                    self.fail(event_loop, err);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            self.run_due_work(event_loop);
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Interrupted => {
                info!("interrupt received");
                self.shut_down(event_loop);
            }
        }
    }
}

/// Open the full-screen window and cycle photos until interrupted.
///
/// Must be called on the main thread from within a tokio runtime context.
///
/// # Errors
/// Returns an error if the window or GPU cannot be initialised, or if the
/// slideshow terminated on a fatal scaling or rendering failure.
pub fn run_windowed(cfg: SlideshowConfig, cancel: CancellationToken) -> Result<()> {
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build event loop")?;
    let proxy = event_loop.create_proxy();
    let forwarder = forward_cancellation(cancel, move || {
        let _ = proxy.send_event(ViewerEvent::Interrupted);
    });

    let mut app = ViewerApp::new(cfg);
    let run_result = event_loop.run_app(&mut app);
    forwarder.abort();
    run_result.context("event loop failed")?;

    if let Some(err) = app.failure.take() {
        return Err(err);
    }
    match app.slideshow.state() {
        SlideshowState::Terminated(Termination::Fatal) => Err(anyhow!("slideshow terminated")),
        _ => Ok(()),
    }
}
