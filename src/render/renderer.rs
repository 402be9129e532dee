//! Offscreen scene renderer for the avatar head and ground plane.
//!
//! Manages the render pipeline, per-object vertex/index/uniform buffers, the
//! retained offscreen color target with depth, and pixel readback for export.
//! The color target persists between frames (store-op store), which is what
//! makes synchronous frame export possible at all.

use glam::{Mat4, Vec3};

use crate::config::ViewerConfig;
use crate::customize::MaterialParams;
use crate::error::ExportError;
use crate::export;
use crate::pose::HeadRotation;
use crate::render::geometry::{self, MeshData, Vertex};
use crate::render::resources::{ResourceId, ResourceKind, ResourceRegistry};
use crate::render::texture::{self, AvatarTexture};

const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Uniform buffer layout matching the shader.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    mvp: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    light_dir: [f32; 4],
    light_color: [f32; 4],
    ambient: [f32; 4],
    base_color: [f32; 4],
    eye_color: [f32; 4],
    params: [f32; 4],
}

/// One draw call's GPU resources.
struct DrawCall {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    num_indices: u32,
    ids: [ResourceId; 3],
}

/// The offscreen render targets (recreated on resize).
struct TargetState {
    color_texture: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    size: [u32; 2],
    color_id: ResourceId,
    depth_id: ResourceId,
}

/// The scene renderer. Holds every GPU resource for the avatar scene.
pub struct SceneRenderer {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    head: DrawCall,
    floor: DrawCall,
    placeholder: Option<AvatarTexture>,
    target: TargetState,
    background: wgpu::Color,
    light_dir: Vec3,
    light_color: [f32; 4],
    ambient: [f32; 4],
    floor_color: [f32; 4],
    material: MaterialParams,
    head_rotation: HeadRotation,
    head_height: f32,
    textured: bool,
    frames_rendered: u64,
    disposed: bool,
}

impl SceneRenderer {
    /// Create the renderer: pipeline, meshes, default material, targets.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        registry: &mut ResourceRegistry,
        config: &ViewerConfig,
        width: u32,
        height: u32,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pl"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("scene_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: OFFSCREEN_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("surface_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let placeholder = texture::white_placeholder(device, queue, registry);

        let head_mesh = geometry::head_sphere(config.avatar.head_radius, 64, 64);
        let floor_mesh = geometry::ground_plane(config.avatar.floor_size);

        let head = Self::build_draw_call(
            device,
            queue,
            registry,
            &bind_group_layout,
            &sampler,
            &placeholder.view,
            &head_mesh,
            "head",
        );
        let floor = Self::build_draw_call(
            device,
            queue,
            registry,
            &bind_group_layout,
            &sampler,
            &placeholder.view,
            &floor_mesh,
            "floor",
        );

        let target = Self::create_targets(device, registry, width, height);

        let bg = config.render.background;
        let background = wgpu::Color {
            r: bg.r as f64,
            g: bg.g as f64,
            b: bg.b as f64,
            a: 1.0,
        };

        let key = Vec3::from_array(config.lighting.key_position);
        let i = config.lighting.key_intensity;
        let a = config.lighting.ambient_intensity;

        Self {
            pipeline,
            bind_group_layout,
            sampler,
            head,
            floor,
            placeholder: Some(placeholder),
            target,
            background,
            // illumination travels from the key position toward the origin
            light_dir: (-key).normalize(),
            light_color: [i, i, i, 1.0],
            ambient: [a, a, a, 1.0],
            floor_color: config.avatar.floor_color.to_array(1.0),
            material: MaterialParams {
                skin: config.avatar.default_skin_tone,
                eye: config.avatar.default_eye_color,
            },
            head_rotation: HeadRotation::default(),
            head_height: config.avatar.head_height,
            textured: false,
            frames_rendered: 0,
            disposed: false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_draw_call(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        registry: &mut ResourceRegistry,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        surface_view: &wgpu::TextureView,
        mesh: &MeshData,
        name: &str,
    ) -> DrawCall {
        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{name}_vb")),
            size: (mesh.vertices.len() * std::mem::size_of::<Vertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&vertex_buffer, 0, bytemuck::cast_slice(&mesh.vertices));

        let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{name}_ib")),
            size: (mesh.indices.len() * std::mem::size_of::<u32>()) as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&index_buffer, 0, bytemuck::cast_slice(&mesh.indices));

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{name}_ub")),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = Self::build_bind_group(device, layout, &uniform_buffer, surface_view, sampler, name);

        let ids = [
            registry.register(ResourceKind::Buffer),
            registry.register(ResourceKind::Buffer),
            registry.register(ResourceKind::Buffer),
        ];

        DrawCall {
            vertex_buffer,
            index_buffer,
            uniform_buffer,
            bind_group,
            num_indices: mesh.indices.len() as u32,
            ids,
        }
    }

    fn build_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        uniform_buffer: &wgpu::Buffer,
        surface_view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        name: &str,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{name}_bg")),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(surface_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    fn create_targets(
        device: &wgpu::Device,
        registry: &mut ResourceRegistry,
        width: u32,
        height: u32,
    ) -> TargetState {
        let color_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen_color"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            // COPY_SRC keeps the drawing buffer readable for frame export
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let color_view = color_texture.create_view(&Default::default());

        let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen_depth"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth_texture.create_view(&Default::default());

        TargetState {
            color_texture,
            color_view,
            depth_texture,
            depth_view,
            size: [width, height],
            color_id: registry.register(ResourceKind::Texture),
            depth_id: registry.register(ResourceKind::Texture),
        }
    }

    /// Recreate the offscreen targets for a new viewport size.
    ///
    /// Idempotent: same size or a zero dimension is a no-op, so it is safe
    /// to call on every resize event, however rapid.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        registry: &mut ResourceRegistry,
        width: u32,
        height: u32,
    ) {
        if width == 0 || height == 0 || self.target.size == [width, height] {
            return;
        }

        tracing::debug!(
            "resizing output {}x{} -> {}x{}",
            self.target.size[0],
            self.target.size[1],
            width,
            height
        );

        let old = std::mem::replace(&mut self.target, Self::create_targets(device, registry, width, height));
        old.color_texture.destroy();
        old.depth_texture.destroy();
        registry.release(old.color_id);
        registry.release(old.depth_id);
    }

    /// Current output dimensions.
    pub fn output_size(&self) -> (u32, u32) {
        (self.target.size[0], self.target.size[1])
    }

    /// Bind a newly loaded photo texture to the head material.
    ///
    /// Only rebuilds the head bind group; the previous texture stays valid
    /// until the caller retires it after this returns.
    pub fn bind_surface_texture(&mut self, device: &wgpu::Device, texture: &AvatarTexture) {
        self.head.bind_group = Self::build_bind_group(
            device,
            &self.bind_group_layout,
            &self.head.uniform_buffer,
            &texture.view,
            &self.sampler,
            "head",
        );
        self.textured = true;
    }

    /// Update material colors from the customization mapping. Takes effect
    /// on the next rendered frame.
    pub fn set_material(&mut self, params: MaterialParams) {
        self.material = params;
    }

    /// Apply an estimated head rotation.
    pub fn set_head_rotation(&mut self, rotation: HeadRotation) {
        self.head_rotation = rotation;
    }

    /// Number of frames drawn so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    fn head_uniforms(&self, view_proj: Mat4) -> Uniforms {
        // pitch about X, negative yaw about Y (see pose::estimate)
        let rotation = Mat4::from_euler(
            glam::EulerRot::XYZ,
            self.head_rotation.pitch,
            -self.head_rotation.yaw,
            0.0,
        );
        let model = Mat4::from_translation(Vec3::new(0.0, self.head_height, 0.0)) * rotation;

        Uniforms {
            mvp: (view_proj * model).to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            light_dir: [self.light_dir.x, self.light_dir.y, self.light_dir.z, 0.0],
            light_color: self.light_color,
            ambient: self.ambient,
            base_color: self.material.skin.to_array(1.0),
            eye_color: self.material.eye.to_array(1.0),
            params: [if self.textured { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        }
    }

    fn floor_uniforms(&self, view_proj: Mat4) -> Uniforms {
        let model = Mat4::IDENTITY;
        Uniforms {
            mvp: (view_proj * model).to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            light_dir: [self.light_dir.x, self.light_dir.y, self.light_dir.z, 0.0],
            light_color: self.light_color,
            ambient: self.ambient,
            base_color: self.floor_color,
            eye_color: self.floor_color,
            params: [0.0; 4],
        }
    }

    /// Draw one full frame into the retained offscreen target.
    pub fn render(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, view_proj: Mat4) {
        queue.write_buffer(
            &self.head.uniform_buffer,
            0,
            bytemuck::bytes_of(&self.head_uniforms(view_proj)),
        );
        queue.write_buffer(
            &self.floor.uniform_buffer,
            0,
            bytemuck::bytes_of(&self.floor_uniforms(view_proj)),
        );

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("scene_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.background),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            pass.set_pipeline(&self.pipeline);

            for dc in [&self.floor, &self.head] {
                pass.set_bind_group(0, &dc.bind_group, &[]);
                pass.set_vertex_buffer(0, dc.vertex_buffer.slice(..));
                pass.set_index_buffer(dc.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..dc.num_indices, 0, 0..1);
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
        self.frames_rendered += 1;
    }

    /// Read back the most recently rendered frame as tightly packed RGBA.
    pub fn read_pixels(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        registry: &mut ResourceRegistry,
    ) -> Result<(Vec<u8>, u32, u32), ExportError> {
        let [width, height] = self.target.size;
        let unpadded = 4 * width;
        let padded = export::padded_bytes_per_row(unpadded);

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("export_staging"),
            size: (padded * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let staging_id = registry.register(ResourceKind::Buffer);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("export_encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.target.color_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device.poll(wgpu::Maintain::Wait);

        // the staging buffer is destroyed and released on both branches, so a
        // failed readback never leaves a live registry entry behind
        let padded_bytes = rx
            .recv()
            .map_err(|e| ExportError::Readback(e.to_string()))
            .and_then(|r| r.map_err(|e| ExportError::Readback(e.to_string())))
            .map(|()| {
                let bytes = slice.get_mapped_range().to_vec();
                staging.unmap();
                bytes
            });
        staging.destroy();
        registry.release(staging_id);
        let padded_bytes = padded_bytes?;

        let pixels = export::strip_row_padding(&padded_bytes, padded, unpadded, height);
        Ok((pixels, width, height))
    }

    /// Destroy every GPU resource this renderer owns and release it from the
    /// registry. Runs between frames only; idempotent.
    pub fn dispose(&mut self, registry: &mut ResourceRegistry) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        for dc in [&self.head, &self.floor] {
            dc.vertex_buffer.destroy();
            dc.index_buffer.destroy();
            dc.uniform_buffer.destroy();
            for id in dc.ids {
                registry.release(id);
            }
        }

        self.target.color_texture.destroy();
        self.target.depth_texture.destroy();
        registry.release(self.target.color_id);
        registry.release(self.target.depth_id);

        if let Some(placeholder) = self.placeholder.take() {
            placeholder.destroy(registry);
        }

        tracing::debug!("scene renderer disposed");
    }
}
