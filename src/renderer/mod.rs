//! Stereo scene renderer
//!
//! Draws the surround sphere, the UI screen, the aim line and controller
//! models into one offscreen target per eye, then resolves each target
//! through its half of the lens distortion mesh into the texture handed to
//! the compositor.

pub mod model;
pub mod scene;

use std::rc::Rc;

use glam::{Mat4, Vec3, Vec4};
use log::info;
use wgpu::util::DeviceExt;

use crate::distortion::{DistortionMesh, DistortionVertex};
use crate::gpu::GpuContext;
use crate::media::{UiSurface, UvRect};
use crate::runtime::Eye;
use crate::screen::VirtualScreen;

pub use model::{GpuComponent, GpuUploader};
use scene::{sphere_mesh, sphere_model, DrawUniforms, SceneVertex, SphereSource, SPHERE_RINGS, SPHERE_SEGMENTS};

pub const EYE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const AIM_LINE_COLOR: Vec4 = Vec4::new(0.2, 0.8, 1.0, 1.0);
const INITIAL_UNIFORM_SLOTS: u64 = 64;

const SCENE_ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];
const DISTORTION_ATTRIBUTES: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Float32x2, 3 => Float32x2];

/// Per-eye target size for the runtime's recommendation scaled by the
/// render size factor.
pub fn eye_target_size(recommended: (u32, u32), factor: f32) -> (u32, u32) {
    let scale = |v: u32| ((v as f32 * factor).round() as u32).max(1);
    (scale(recommended.0), scale(recommended.1))
}

/// A loaded component placed in tracking space.
pub struct ModelDraw {
    pub transform: Mat4,
    pub component: Rc<GpuComponent>,
}

/// Everything the renderer needs for one stereo frame.
pub struct SceneFrame<'a> {
    /// Projection × inverse eye-to-head × head, per eye.
    pub view_projection: [Mat4; 2],
    pub sphere: Option<SphereSource<&'a wgpu::TextureView>>,
    /// Surround pan in degrees, already snapped.
    pub pan: f32,
    pub ui: &'a dyn UiSurface,
    pub aim_line: Option<(Vec3, Vec3)>,
    pub models: Vec<ModelDraw>,
}

#[derive(Clone, Copy)]
enum DrawKind {
    Sphere { blend: bool },
    Screen,
    Line,
    Model(usize),
}

struct Draw {
    kind: DrawKind,
    slot: u32,
}

struct EyeTarget {
    _color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    resolve: wgpu::Texture,
    resolve_view: wgpu::TextureView,
    distortion_bind_group: wgpu::BindGroup,
}

struct MeshBuffers {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

/// Dynamic-offset uniform buffer holding one [`DrawUniforms`] per draw.
struct UniformRing {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    stride: u64,
    slots: u64,
}

impl UniformRing {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, slots: u64) -> Self {
        let align = device.limits().min_uniform_buffer_offset_alignment as u64;
        let size = std::mem::size_of::<DrawUniforms>() as u64;
        let stride = size.div_ceil(align) * align;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw Uniform Buffer"),
            size: stride * slots,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Uniform Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(size),
                }),
            }],
        });
        Self {
            buffer,
            bind_group,
            stride,
            slots,
        }
    }

    fn upload(&mut self, gpu: &GpuContext, layout: &wgpu::BindGroupLayout, uniforms: &[DrawUniforms]) {
        if uniforms.is_empty() {
            return;
        }
        let needed = uniforms.len() as u64;
        if needed > self.slots {
            *self = Self::new(&gpu.device, layout, needed.next_power_of_two());
        }
        let mut bytes = vec![0u8; (self.stride * needed) as usize];
        for (i, u) in uniforms.iter().enumerate() {
            let start = i * self.stride as usize;
            let data = bytemuck::bytes_of(u);
            bytes[start..start + data.len()].copy_from_slice(data);
        }
        gpu.queue.write_buffer(&self.buffer, 0, &bytes);
    }

    fn offset(&self, slot: u32) -> u32 {
        (slot as u64 * self.stride) as u32
    }
}

pub struct StereoRenderer {
    gpu: GpuContext,
    eye_size: (u32, u32),
    targets: [EyeTarget; 2],

    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    uniforms: UniformRing,

    screen_pipeline: wgpu::RenderPipeline,
    textured_pipeline: wgpu::RenderPipeline,
    blended_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    distortion_pipeline: wgpu::RenderPipeline,

    media_sampler: wgpu::Sampler,
    model_sampler: wgpu::Sampler,
    _white_texture: wgpu::Texture,
    white_bind_group: wgpu::BindGroup,

    sphere: MeshBuffers,
    screen: Option<(wgpu::Buffer, u32)>,
    line_buffer: wgpu::Buffer,
    distortion: MeshBuffers,
    distortion_ranges: [std::ops::Range<u32>; 2],
}

impl StereoRenderer {
    pub fn new(gpu: &GpuContext, eye_size: (u32, u32), mesh: &DistortionMesh) -> Result<Self, String> {
        if eye_size.0 == 0 || eye_size.1 == 0 {
            return Err(format!("Invalid eye target size {}x{}", eye_size.0, eye_size.1));
        }
        if mesh.indices.is_empty() {
            return Err("Distortion mesh is empty".to_string());
        }
        let device = &gpu.device;

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<DrawUniforms>() as u64),
                },
                count: None,
            }],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let scene_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
        });
        let scene_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });
        let alpha = Some(wgpu::BlendState::ALPHA_BLENDING);
        let opaque = Some(wgpu::BlendState::REPLACE);
        let screen_pipeline = scene_pipeline(
            device,
            &scene_layout,
            &scene_shader,
            wgpu::PrimitiveTopology::TriangleStrip,
            alpha,
            "Screen Pipeline",
        );
        let textured_pipeline = scene_pipeline(
            device,
            &scene_layout,
            &scene_shader,
            wgpu::PrimitiveTopology::TriangleList,
            opaque,
            "Textured Pipeline",
        );
        let blended_pipeline = scene_pipeline(
            device,
            &scene_layout,
            &scene_shader,
            wgpu::PrimitiveTopology::TriangleList,
            alpha,
            "Blended Pipeline",
        );
        let line_pipeline = scene_pipeline(
            device,
            &scene_layout,
            &scene_shader,
            wgpu::PrimitiveTopology::LineList,
            opaque,
            "Aim Line Pipeline",
        );

        let distortion_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Distortion Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/distortion.wgsl").into()),
        });
        let distortion_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Distortion Pipeline Layout"),
            bind_group_layouts: &[&texture_layout],
            push_constant_ranges: &[],
        });
        let distortion_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Distortion Pipeline"),
            layout: Some(&distortion_layout),
            vertex: wgpu::VertexState {
                module: &distortion_shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<DistortionVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &DISTORTION_ATTRIBUTES,
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &distortion_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: EYE_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let media_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Media Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let model_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Render Model Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            anisotropy_clamp: 16,
            ..Default::default()
        });

        let white_texture = device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some("White Texture"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[255, 255, 255, 255],
        );
        let white_view = white_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let white_bind_group = texture_bind_group(device, &texture_layout, &white_view, &media_sampler, "White Bind Group");

        let sphere_data = sphere_mesh(SPHERE_RINGS, SPHERE_SEGMENTS);
        let sphere = MeshBuffers {
            vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Sphere Vertex Buffer"),
                contents: bytemuck::cast_slice(&sphere_data.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            index_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Sphere Index Buffer"),
                contents: bytemuck::cast_slice(&sphere_data.indices),
                usage: wgpu::BufferUsages::INDEX,
            }),
            index_count: sphere_data.indices.len() as u32,
        };

        let line_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Aim Line Buffer"),
            size: 2 * std::mem::size_of::<SceneVertex>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let distortion = MeshBuffers {
            vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Distortion Vertex Buffer"),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            index_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Distortion Index Buffer"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            }),
            index_count: mesh.indices.len() as u32,
        };

        let targets = Eye::BOTH.map(|eye| create_eye_target(gpu, &texture_layout, &media_sampler, eye, eye_size));
        let uniforms = UniformRing::new(device, &uniform_layout, INITIAL_UNIFORM_SLOTS);

        info!(
            "Stereo renderer ready: {}x{} per eye, {} distortion indices",
            eye_size.0, eye_size.1, distortion.index_count
        );

        Ok(Self {
            gpu: gpu.clone(),
            eye_size,
            targets,
            uniform_layout,
            texture_layout,
            uniforms,
            screen_pipeline,
            textured_pipeline,
            blended_pipeline,
            line_pipeline,
            distortion_pipeline,
            media_sampler,
            model_sampler,
            _white_texture: white_texture,
            white_bind_group,
            sphere,
            screen: None,
            line_buffer,
            distortion,
            distortion_ranges: [mesh.indices_for(Eye::Left), mesh.indices_for(Eye::Right)],
        })
    }

    pub fn eye_size(&self) -> (u32, u32) {
        self.eye_size
    }

    /// Recreates the eye targets when the size changed.
    pub fn set_eye_size(&mut self, eye_size: (u32, u32)) {
        if eye_size == self.eye_size || eye_size.0 == 0 || eye_size.1 == 0 {
            return;
        }
        info!("Resizing eye targets to {}x{}", eye_size.0, eye_size.1);
        self.eye_size = eye_size;
        self.targets = Eye::BOTH.map(|eye| {
            create_eye_target(&self.gpu, &self.texture_layout, &self.media_sampler, eye, eye_size)
        });
    }

    /// Uploads a regenerated screen mesh.
    pub fn set_screen(&mut self, screen: &VirtualScreen) {
        if screen.is_empty() {
            self.screen = None;
            return;
        }
        let vertices = scene::screen_vertices(screen);
        let buffer = self.gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Screen Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        self.screen = Some((buffer, vertices.len() as u32));
    }

    pub fn uploader(&self) -> GpuUploader<'_> {
        GpuUploader {
            device: &self.gpu.device,
            queue: &self.gpu.queue,
            layout: &self.texture_layout,
            sampler: &self.model_sampler,
        }
    }

    /// Distorted output of one eye, valid after [`render`](Self::render).
    pub fn resolved_texture(&self, eye: Eye) -> &wgpu::Texture {
        &self.targets[eye.index()].resolve
    }

    pub fn render(&mut self, frame: &SceneFrame<'_>) {
        let sphere_group = frame.sphere.as_ref().map(|s| {
            texture_bind_group(&self.gpu.device, &self.texture_layout, s.texture, &self.media_sampler, "Sphere Bind Group")
        });
        let ui_groups = Eye::BOTH.map(|eye| {
            texture_bind_group(
                &self.gpu.device,
                &self.texture_layout,
                frame.ui.eye_texture(eye),
                &self.media_sampler,
                "UI Bind Group",
            )
        });
        if let Some((start, end)) = frame.aim_line {
            let vertices = [
                SceneVertex {
                    position: start.to_array(),
                    uv: [0.5, 0.5],
                },
                SceneVertex {
                    position: end.to_array(),
                    uv: [0.5, 0.5],
                },
            ];
            self.gpu.queue.write_buffer(&self.line_buffer, 0, bytemuck::cast_slice(&vertices));
        }

        let mut uniforms = Vec::new();
        let mut draws: [Vec<Draw>; 2] = Default::default();
        for eye in Eye::BOTH {
            let i = eye.index();
            let vp = frame.view_projection[i];
            let mut push = |kind: DrawKind, u: DrawUniforms| {
                draws[i].push(Draw {
                    kind,
                    slot: uniforms.len() as u32,
                });
                uniforms.push(u);
            };
            if let Some(sphere) = &frame.sphere {
                let mvp = vp * sphere_model(frame.pan + sphere.pan);
                push(
                    DrawKind::Sphere { blend: sphere.blend },
                    DrawUniforms::new(mvp, sphere.rect(i), sphere.tint),
                );
            }
            if self.screen.is_some() {
                push(DrawKind::Screen, DrawUniforms::new(vp, UvRect::FULL, Vec4::ONE));
            }
            if frame.aim_line.is_some() {
                push(DrawKind::Line, DrawUniforms::new(vp, UvRect::FULL, AIM_LINE_COLOR));
            }
            for (m, model) in frame.models.iter().enumerate() {
                push(
                    DrawKind::Model(m),
                    DrawUniforms::new(vp * model.transform, UvRect::FULL, Vec4::ONE),
                );
            }
        }
        self.uniforms.upload(&self.gpu, &self.uniform_layout, &uniforms);

        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Stereo Frame Encoder"),
        });
        for eye in Eye::BOTH {
            let i = eye.index();
            self.encode_scene(&mut encoder, i, &draws[i], sphere_group.as_ref(), &ui_groups[i], frame);
            self.encode_distortion(&mut encoder, i);
        }
        self.gpu.queue.submit(Some(encoder.finish()));
    }

    fn encode_scene(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        eye: usize,
        draws: &[Draw],
        sphere_group: Option<&wgpu::BindGroup>,
        ui_group: &wgpu::BindGroup,
        frame: &SceneFrame<'_>,
    ) {
        let target = &self.targets[eye];
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Eye Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &target.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for draw in draws {
            pass.set_bind_group(0, &self.uniforms.bind_group, &[self.uniforms.offset(draw.slot)]);
            match draw.kind {
                DrawKind::Sphere { blend } => {
                    let Some(group) = sphere_group else { continue };
                    pass.set_pipeline(if blend {
                        &self.blended_pipeline
                    } else {
                        &self.textured_pipeline
                    });
                    pass.set_bind_group(1, group, &[]);
                    pass.set_vertex_buffer(0, self.sphere.vertex_buffer.slice(..));
                    pass.set_index_buffer(self.sphere.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                    pass.draw_indexed(0..self.sphere.index_count, 0, 0..1);
                }
                DrawKind::Screen => {
                    let Some((buffer, count)) = &self.screen else { continue };
                    pass.set_pipeline(&self.screen_pipeline);
                    pass.set_bind_group(1, ui_group, &[]);
                    pass.set_vertex_buffer(0, buffer.slice(..));
                    pass.draw(0..*count, 0..1);
                }
                DrawKind::Line => {
                    pass.set_pipeline(&self.line_pipeline);
                    pass.set_bind_group(1, &self.white_bind_group, &[]);
                    pass.set_vertex_buffer(0, self.line_buffer.slice(..));
                    pass.draw(0..2, 0..1);
                }
                DrawKind::Model(m) => {
                    let component = &frame.models[m].component;
                    pass.set_pipeline(&self.textured_pipeline);
                    pass.set_bind_group(1, &component.bind_group, &[]);
                    pass.set_vertex_buffer(0, component.vertex_buffer.slice(..));
                    pass.set_index_buffer(component.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                    pass.draw_indexed(0..component.index_count, 0, 0..1);
                }
            }
        }
    }

    fn encode_distortion(&self, encoder: &mut wgpu::CommandEncoder, eye: usize) {
        let target = &self.targets[eye];
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Distortion Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.resolve_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.distortion_pipeline);
        pass.set_bind_group(0, &target.distortion_bind_group, &[]);
        pass.set_vertex_buffer(0, self.distortion.vertex_buffer.slice(..));
        pass.set_index_buffer(self.distortion.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(self.distortion_ranges[eye].clone(), 0, 0..1);
    }
}

fn scene_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    topology: wgpu::PrimitiveTopology,
    blend: Option<wgpu::BlendState>,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<SceneVertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &SCENE_ATTRIBUTES,
            }],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: EYE_FORMAT,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

fn create_eye_target(
    gpu: &GpuContext,
    texture_layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    eye: Eye,
    (width, height): (u32, u32),
) -> EyeTarget {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = |label: &str, format: wgpu::TextureFormat, usage: wgpu::TextureUsages| {
        gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        })
    };
    let (color_label, resolve_label) = match eye {
        Eye::Left => ("Left Eye Color", "Left Eye Resolve"),
        Eye::Right => ("Right Eye Color", "Right Eye Resolve"),
    };

    let color = texture(
        color_label,
        EYE_FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
    );
    let depth = texture("Eye Depth", DEPTH_FORMAT, wgpu::TextureUsages::RENDER_ATTACHMENT);
    let resolve = texture(
        resolve_label,
        EYE_FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
    );

    let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
    let distortion_bind_group = texture_bind_group(&gpu.device, texture_layout, &color_view, sampler, "Distortion Bind Group");
    EyeTarget {
        depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
        resolve_view: resolve.create_view(&wgpu::TextureViewDescriptor::default()),
        _color: color,
        color_view,
        resolve,
        distortion_bind_group,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eye_target_scales_with_factor() {
        assert_eq!(eye_target_size((1512, 1680), 1.0), (1512, 1680));
        assert_eq!(eye_target_size((1512, 1680), 0.5), (756, 840));
        assert_eq!(eye_target_size((1000, 1000), 1.25), (1250, 1250));
        assert_eq!(eye_target_size((10, 10), 0.0), (1, 1));
    }

    #[test]
    fn uniform_block_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<DrawUniforms>(), 96);
        assert_eq!(std::mem::size_of::<SceneVertex>(), 20);
    }
}
