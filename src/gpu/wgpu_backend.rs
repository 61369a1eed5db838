//! wgpu implementation of the render backend plus the surface presenter.

use std::sync::Arc;

use anyhow::Context;
use bytemuck::{Pod, Zeroable};
use tracing::{debug, info, warn};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::error::{Error, Result};
use crate::events::PreparedImageCpu;
use crate::gpu::backend::RenderBackend;
use crate::gpu::frame::{CommandSequence, FilterKind, QUAD, SampleSource, SuperSamplePass, Vertex};
use crate::processing::kernels::{JINC_RADIUS, LANCZOS_RADIUS, ResampleKernel};
use crate::processing::scale_plan::Size;

const PRESENT_WGSL: &str = include_str!("shaders/present.wgsl");
const UPSCALE_WGSL: &str = include_str!("shaders/upscale.wgsl");
const SOURCE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const UPSCALE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const UPSCALE_WORKGROUP: u32 = 8;
const UPSCALE_SHARPEN: f32 = 0.25;

pub struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

pub struct GpuScaler {
    _output: wgpu::Texture,
    view: wgpu::TextureView,
    params: wgpu::Buffer,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct ScalerParams {
    in_size: [u32; 2],
    out_size: [u32; 2],
    sharpen: f32,
    _pad: [f32; 3],
}

struct UpscalePipeline {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    max_dim: u32,
    upscale: Option<UpscalePipeline>,
}

impl WgpuBackend {
    /// Builds the super-sampling pipeline when `super_sampling` is set.
    /// A shader or pipeline validation failure is fatal.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, super_sampling: bool) -> Result<Self> {
        let max_dim = device.limits().max_texture_dimension_2d;
        let upscale = if super_sampling {
            Some(build_upscale_pipeline(&device)?)
        } else {
            None
        };
        Ok(Self {
            device,
            queue,
            max_dim,
            upscale,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Drives completion callbacks without blocking.
    pub fn poll(&self) {
        if let Err(err) = self.device.poll(wgpu::PollType::Poll) {
            warn!(error = %err, "device poll failed");
        }
    }

    fn encode_super_sample(&self, encoder: &mut wgpu::CommandEncoder, pass: &SuperSamplePass<Self>) {
        let Some(upscale) = self.upscale.as_ref() else {
            return;
        };
        let bind = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("upscale-bind-group"),
            layout: &upscale.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&pass.source.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&pass.scaler.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: pass.scaler.params.as_entire_binding(),
                },
            ],
        });
        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("upscale-pass"),
            timestamp_writes: None,
        });
        cpass.set_pipeline(&upscale.pipeline);
        cpass.set_bind_group(0, &bind, &[]);
        cpass.dispatch_workgroups(
            pass.output.width.div_ceil(UPSCALE_WORKGROUP),
            pass.output.height.div_ceil(UPSCALE_WORKGROUP),
            1,
        );
    }
}

impl RenderBackend for WgpuBackend {
    type Texture = GpuTexture;
    type Scaler = GpuScaler;

    fn max_texture_dimension(&self) -> u32 {
        self.max_dim
    }

    fn upload(&self, image: &PreparedImageCpu) -> Result<GpuTexture> {
        let (w, h) = (image.width, image.height);
        let upload_err = |reason: String| Error::Upload {
            path: image.path.clone(),
            reason,
        };
        if w == 0 || h == 0 || w > self.max_dim || h > self.max_dim {
            return Err(upload_err(format!("{w}x{h} exceeds texture limit {}", self.max_dim)));
        }
        if image.pixels.len() != (w as usize) * (h as usize) * 4 {
            return Err(upload_err("pixel buffer length does not match dimensions".into()));
        }
        let size = wgpu::Extent3d {
            width: w,
            height: h,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("slide"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SOURCE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            texture.as_image_copy(),
            &image.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * w),
                rows_per_image: Some(h),
            },
            size,
        );
        Ok(GpuTexture {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            _texture: texture,
        })
    }

    fn super_sampling_available(&self) -> bool {
        self.upscale.is_some()
    }

    fn build_scaler(&self, input: Size, output: Size) -> Result<GpuScaler> {
        let scaler_err = |reason: String| Error::Scaler {
            input: input.to_string(),
            output: output.to_string(),
            reason,
        };
        if self.upscale.is_none() {
            return Err(scaler_err("super-sampling pipeline not built".into()));
        }
        if input.is_empty() || output.is_empty() {
            return Err(scaler_err("empty size".into()));
        }
        if output.width > self.max_dim || output.height > self.max_dim {
            return Err(scaler_err(format!("output exceeds texture limit {}", self.max_dim)));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("upscale-output"),
            size: wgpu::Extent3d {
                width: output.width,
                height: output.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: UPSCALE_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let params = ScalerParams {
            in_size: [input.width, input.height],
            out_size: [output.width, output.height],
            sharpen: UPSCALE_SHARPEN,
            _pad: [0.0; 3],
        };
        let params = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("upscale-params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(scaler_err(err.to_string()));
        }

        Ok(GpuScaler {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            _output: texture,
            params,
        })
    }
}

fn build_upscale_pipeline(device: &wgpu::Device) -> Result<UpscalePipeline> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("upscale-shader"),
        source: wgpu::ShaderSource::Wgsl(UPSCALE_WGSL.into()),
    });
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("upscale-bind-layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: UPSCALE_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
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
        label: Some("upscale-pipeline-layout"),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("upscale-pipeline"),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point: Some("cs_main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(Error::Pipeline(format!("super-sampling: {err}")));
    }
    Ok(UpscalePipeline { pipeline, layout })
}

/// Owns the window surface and the quad pipelines; encodes and submits frames.
pub struct Presenter {
    backend: Arc<WgpuBackend>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    bind_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    passthrough: wgpu::RenderPipeline,
    kernel: wgpu::RenderPipeline,
    uniforms: wgpu::Buffer,
    vertices: wgpu::Buffer,
}

/// Creates the device, the backend and the presenter for `window`.
pub fn init_gpu(
    window: Arc<Window>,
    kernel: ResampleKernel,
    super_sampling: bool,
) -> anyhow::Result<(Arc<WgpuBackend>, Presenter)> {
    let instance = wgpu::Instance::default();
    let surface = instance
        .create_surface(window.clone())
        .context("failed to create surface")?;
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: Some(&surface),
        force_fallback_adapter: false,
    }))
    .context("failed to acquire GPU adapter")?;

    let caps = surface.get_capabilities(&adapter);
    let format = caps
        .formats
        .iter()
        .copied()
        .find(|fmt| fmt.is_srgb())
        .or_else(|| caps.formats.first().copied())
        .context("surface reports no formats")?;

    let compute = adapter
        .get_downlevel_capabilities()
        .flags
        .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS);
    let storage = adapter
        .get_texture_format_features(UPSCALE_FORMAT)
        .allowed_usages
        .contains(wgpu::TextureUsages::STORAGE_BINDING);
    let super_sampling = super_sampling && compute && storage;
    info!(
        adapter = %adapter.get_info().name,
        compute,
        storage,
        super_sampling,
        "GPU adapter selected"
    );

    let limits = adapter.limits();
    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("viewer-device"),
        required_limits: limits,
        ..Default::default()
    }))
    .context("failed to acquire GPU device")?;

    let size = window.inner_size();
    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: wgpu::PresentMode::AutoVsync,
        alpha_mode: caps.alpha_modes[0],
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &config);
    info!(
        width = config.width,
        height = config.height,
        format = ?config.format,
        "viewer surface configured",
    );

    let backend = Arc::new(WgpuBackend::new(device, queue, super_sampling)?);
    let presenter = Presenter::new(Arc::clone(&backend), surface, config, kernel)?;
    Ok((backend, presenter))
}

impl Presenter {
    fn new(
        backend: Arc<WgpuBackend>,
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
        kernel: ResampleKernel,
    ) -> Result<Self> {
        let device = backend.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let source = PRESENT_WGSL
            .replace("__LANCZOS_RADIUS__", &LANCZOS_RADIUS.to_string())
            .replace("__JINC_RADIUS__", &JINC_RADIUS.to_string());
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("present-shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("present-bind-layout"),
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
            label: Some("present-pipeline-layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });

        let build = |label: &str, fragment: &str| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<Vertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
                    }],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(fragment),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: config.format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview: None,
                cache: None,
            })
        };
        let passthrough = build("present-passthrough", "fs_passthrough");
        let kernel_pipeline = match kernel {
            ResampleKernel::Lanczos => build("present-lanczos", "fs_lanczos"),
            ResampleKernel::Jinc => build("present-jinc", "fs_jinc"),
        };

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("present-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("quad-uniforms"),
            size: std::mem::size_of::<crate::gpu::frame::QuadUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad-vertices"),
            contents: bytemuck::cast_slice(&QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(Error::Pipeline(format!("present ({kernel}): {err}")));
        }
        debug!(%kernel, "present pipelines built");

        Ok(Self {
            backend,
            surface,
            config,
            bind_layout,
            sampler,
            passthrough,
            kernel: kernel_pipeline,
            uniforms,
            vertices,
        })
    }

    /// Reconfigures the surface. Zero sizes are ignored; the caller skips frames instead.
    pub fn resize(&mut self, size: Size) {
        if size.is_empty() {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(self.backend.device(), &self.config);
        debug!(width = size.width, height = size.height, "viewer surface resized");
    }

    pub fn reconfigure(&self) {
        self.surface.configure(self.backend.device(), &self.config);
    }

    pub fn acquire(&self) -> std::result::Result<wgpu::SurfaceTexture, wgpu::SurfaceError> {
        self.surface.get_current_texture()
    }

    /// Encodes `seq` into `frame` and submits it. `on_done` runs once the GPU
    /// has finished the submission; the residency set is released just before.
    pub fn execute<F>(&self, seq: CommandSequence<WgpuBackend>, frame: &wgpu::SurfaceTexture, on_done: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let device = self.backend.device();
        let queue = self.backend.queue();
        debug_assert!(seq.ordering_is_sound());

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("viewer-encoder"),
        });

        // The compute pass is recorded first in the same encoder, so its
        // storage writes are visible to the render pass that samples them.
        if let Some(pass) = seq.super_sample.as_ref() {
            self.backend.encode_super_sample(&mut encoder, pass);
        }

        queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&seq.uniforms));

        let view = match &seq.source {
            SampleSource::Texture(t) => &t.view,
            SampleSource::ScalerOutput(s) => &s.view,
        };
        let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("present-bind-group"),
            layout: &self.bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.uniforms.as_entire_binding(),
                },
            ],
        });
        let pipeline = match seq.filter {
            FilterKind::Passthrough => &self.passthrough,
            FilterKind::Kernel(_) => &self.kernel,
        };

        let target = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("present-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &bind, &[]);
            rpass.set_vertex_buffer(0, self.vertices.slice(..));
            rpass.draw(0..seq.vertex_count, 0..1);
        }

        queue.submit(std::iter::once(encoder.finish()));
        let residency = seq.residency;
        queue.on_submitted_work_done(move || {
            drop(residency);
            on_done();
        });
    }

    pub fn poll(&self) {
        self.backend.poll();
    }
}
