//! GPU upload of render model components

use wgpu::util::DeviceExt;

use crate::render_model::{build_mip_chain, ComponentUploader};
use crate::runtime::{ModelData, TextureData};

use super::scene::SceneVertex;

/// Uploaded geometry and texture of one component model.
pub struct GpuComponent {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
    pub bind_group: wgpu::BindGroup,
    _texture: wgpu::Texture,
}

/// Uploads components with the renderer's texture layout and anisotropic
/// sampler.
pub struct GpuUploader<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub layout: &'a wgpu::BindGroupLayout,
    pub sampler: &'a wgpu::Sampler,
}

impl ComponentUploader for GpuUploader<'_> {
    type Handle = GpuComponent;

    fn upload(&mut self, name: &str, model: &ModelData, texture: &TextureData) -> Result<GpuComponent, String> {
        if model.indices.is_empty() || model.vertices.is_empty() {
            return Err(format!("render model {} has no geometry", name));
        }
        let expected = texture.width as usize * texture.height as usize * 4;
        if texture.width == 0 || texture.height == 0 || texture.rgba.len() < expected {
            return Err(format!(
                "render model {} texture is {}x{} with {} bytes",
                name,
                texture.width,
                texture.height,
                texture.rgba.len()
            ));
        }

        let vertices: Vec<SceneVertex> = model.vertices.iter().map(SceneVertex::from).collect();
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(name),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(name),
            contents: bytemuck::cast_slice(&model.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let chain = build_mip_chain(texture);
        let gpu_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(name),
            size: wgpu::Extent3d {
                width: texture.width,
                height: texture.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: chain.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (level, mip) in chain.iter().enumerate() {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &gpu_texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &mip.rgba,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * mip.width),
                    rows_per_image: Some(mip.height),
                },
                wgpu::Extent3d {
                    width: mip.width,
                    height: mip.height,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(name),
            layout: self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(self.sampler),
                },
            ],
        });

        Ok(GpuComponent {
            vertex_buffer,
            index_buffer,
            index_count: model.indices.len() as u32,
            bind_group,
            _texture: gpu_texture,
        })
    }
}
