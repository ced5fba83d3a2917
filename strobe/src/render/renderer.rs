//! wgpu renderer for timeline snapshots
//!
//! Three pipelines share one bind group: opaque call boxes drawn lane by lane
//! (the lane index is a uniform selected by dynamic offset), then the
//! translucent idle shading per lane and the GC overlay on top, both without
//! depth writes.

use glam::Mat4;
use log::{info, warn};
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use super::camera::Camera;
use super::geometry::{Vertex, INDICES, VERTICES};
use super::gpu_types::{encode_time, CallBox, CameraUniform, GcBox, IdleBox, LaneUniform};
use super::gpu_vec::GpuVec;
use crate::domain::ViewerError;
use crate::timeline::TimelineSnapshot;

/// Lanes beyond this are not drawn
pub const MAX_LANES: usize = 256;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const CLEAR_COLOR: wgpu::Color = wgpu::Color { r: 0.01, g: 0.02, b: 0.05, a: 1.0 };

pub struct Renderer {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    device: wgpu::Device,
    queue: wgpu::Queue,
    depth_view: wgpu::TextureView,
    call_pipeline: wgpu::RenderPipeline,
    idle_pipeline: wgpu::RenderPipeline,
    gc_pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_indices: u32,
    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    lane_stride: u32,
    lanes: Vec<GpuVec<CallBox>>,
    idle: Vec<GpuVec<IdleBox>>,
    gc: GpuVec<GcBox>,
    lane_overflow_warned: bool,
}

impl Renderer {
    /// Set up the GPU for `window`
    ///
    /// # Errors
    /// Returns [`ViewerError::Gpu`] or [`ViewerError::Surface`] if no usable
    /// adapter, device or surface format is available.
    pub fn new(window: Arc<Window>) -> Result<Self, ViewerError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| ViewerError::Gpu("no compatible adapter".to_string()))?;
        info!("Using GPU adapter {:?}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("strobe device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| ViewerError::Surface("surface reports no formats".to_string()))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::include_wgsl!("shader.wgsl"));

        let camera_uniform = CameraUniform {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            base_time: [0, 0],
            max_depth: 0,
            num_threads: 0,
        };
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camera"),
            contents: bytemuck::bytes_of(&camera_uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        // One lane uniform per aligned slot, selected per draw by dynamic offset
        #[allow(clippy::cast_possible_truncation)]
        let lane_size = std::mem::size_of::<LaneUniform>() as u32;
        let lane_stride = device.limits().min_uniform_buffer_offset_alignment.max(lane_size);
        let mut lane_data = vec![0u8; MAX_LANES * lane_stride as usize];
        for (i, slot) in lane_data.chunks_exact_mut(lane_stride as usize).enumerate() {
            let lane = LaneUniform::new(u32::try_from(i).unwrap_or(u32::MAX));
            slot[..lane_size as usize].copy_from_slice(bytemuck::bytes_of(&lane));
        }
        let lane_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lanes"),
            contents: &lane_data,
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("camera_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(u64::from(lane_size)),
                    },
                    count: None,
                },
            ],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera_bind_group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: camera_buffer.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &lane_buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(u64::from(lane_size)),
                    }),
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("timeline pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let call_pipeline = create_pipeline(
            &device,
            &layout,
            &shader,
            &PipelineSpec {
                label: "call boxes",
                vs_entry: "vs_main",
                instance_layout: CallBox::desc(),
                format,
                blend: wgpu::BlendState::REPLACE,
                depth_write: true,
            },
        );
        let idle_pipeline = create_pipeline(
            &device,
            &layout,
            &shader,
            &PipelineSpec {
                label: "idle shading",
                vs_entry: "vs_idle",
                instance_layout: IdleBox::desc(),
                format,
                blend: wgpu::BlendState::ALPHA_BLENDING,
                depth_write: false,
            },
        );
        let gc_pipeline = create_pipeline(
            &device,
            &layout,
            &shader,
            &PipelineSpec {
                label: "gc overlay",
                vs_entry: "vs_gc",
                instance_layout: GcBox::desc(),
                format,
                blend: wgpu::BlendState::ALPHA_BLENDING,
                depth_write: false,
            },
        );

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("box vertices"),
            contents: bytemuck::cast_slice(VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("box indices"),
            contents: bytemuck::cast_slice(INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        let num_indices = u32::try_from(INDICES.len()).unwrap_or(u32::MAX);

        let depth_view = create_depth_view(&device, &config);

        Ok(Self {
            surface,
            config,
            device,
            queue,
            depth_view,
            call_pipeline,
            idle_pipeline,
            gc_pipeline,
            vertex_buffer,
            index_buffer,
            num_indices,
            camera_uniform,
            camera_buffer,
            bind_group,
            lane_stride,
            lanes: Vec::new(),
            idle: Vec::new(),
            gc: GpuVec::new("gc boxes", wgpu::BufferUsages::VERTEX),
            lane_overflow_warned: false,
        })
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_view(&self.device, &self.config);
    }

    /// Upload a new snapshot's instance data and camera fields
    pub fn update(&mut self, snapshot: &TimelineSnapshot) {
        if snapshot.lanes.len() > MAX_LANES && !self.lane_overflow_warned {
            warn!("{} thread lanes, only the first {MAX_LANES} are drawn", snapshot.lanes.len());
            self.lane_overflow_warned = true;
        }
        let lane_count = snapshot.lanes.len().min(MAX_LANES);

        self.lanes.resize_with(lane_count, || GpuVec::new("call boxes", wgpu::BufferUsages::VERTEX));
        for (boxes, lane) in self.lanes.iter_mut().zip(&snapshot.lanes) {
            boxes.assign(lane.intervals.iter().map(CallBox::from_interval));
            boxes.sync(&self.device, &self.queue);
        }
        self.idle.resize_with(lane_count, || GpuVec::new("idle boxes", wgpu::BufferUsages::VERTEX));
        for (boxes, lane) in self.idle.iter_mut().zip(&snapshot.lanes) {
            boxes.assign(lane.idle_spans().iter().map(IdleBox::from_span));
            boxes.sync(&self.device, &self.queue);
        }
        self.gc.assign(snapshot.gc.iter().map(GcBox::from_interval));
        self.gc.sync(&self.device, &self.queue);

        self.camera_uniform.base_time = encode_time(snapshot.base_time.as_nanos());
        self.camera_uniform.max_depth = snapshot.max_depth;
        self.camera_uniform.num_threads = u32::try_from(lane_count).unwrap_or(u32::MAX);
    }

    /// Draw one frame
    ///
    /// # Errors
    /// Passes through the surface's acquisition error; the caller decides
    /// whether to reconfigure or give up.
    #[allow(clippy::cast_precision_loss)]
    pub fn render(&mut self, camera: &Camera) -> Result<(), wgpu::SurfaceError> {
        let aspect = self.config.width as f32 / self.config.height as f32;
        self.camera_uniform.view_proj = camera.view_proj(aspect).to_cols_array_2d();
        self.queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&self.camera_uniform));

        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("frame") });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("timeline"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);

            pass.set_pipeline(&self.call_pipeline);
            self.draw_per_lane(&mut pass, &self.lanes);
            pass.set_pipeline(&self.idle_pipeline);
            self.draw_per_lane(&mut pass, &self.idle);

            if let Some(buffer) = self.gc.buffer().filter(|_| !self.gc.is_empty()) {
                pass.set_pipeline(&self.gc_pipeline);
                pass.set_bind_group(0, &self.bind_group, &[0]);
                pass.set_vertex_buffer(1, buffer.slice(..));
                pass.draw_indexed(0..self.num_indices, 0, 0..instance_count(self.gc.len()));
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    /// One instanced draw per lane, selecting the lane uniform by dynamic offset
    fn draw_per_lane<T>(&self, pass: &mut wgpu::RenderPass<'_>, lanes: &[GpuVec<T>])
    where
        T: bytemuck::Pod + PartialEq,
    {
        for (lane, boxes) in lanes.iter().enumerate() {
            let Some(buffer) = boxes.buffer() else { continue };
            if boxes.is_empty() {
                continue;
            }
            let offset = u32::try_from(lane).unwrap_or(0) * self.lane_stride;
            pass.set_bind_group(0, &self.bind_group, &[offset]);
            pass.set_vertex_buffer(1, buffer.slice(..));
            pass.draw_indexed(0..self.num_indices, 0, 0..instance_count(boxes.len()));
        }
    }
}

fn instance_count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

struct PipelineSpec {
    label: &'static str,
    vs_entry: &'static str,
    instance_layout: wgpu::VertexBufferLayout<'static>,
    format: wgpu::TextureFormat,
    blend: wgpu::BlendState,
    depth_write: bool,
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    spec: &PipelineSpec,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(spec.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(spec.vs_entry),
            buffers: &[Vertex::desc(), spec.instance_layout.clone()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: spec.format,
                blend: Some(spec.blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: spec.depth_write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn create_depth_view(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth"),
        size: wgpu::Extent3d { width: config.width, height: config.height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
