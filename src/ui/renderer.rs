//! wgpu rendering pipeline for the cat scene.
//!
//! Surfaces and fur shells are drawn into an HDR target with depth. The
//! furcat-fx chain (bloom, film grain, tonemapping) turns that into a display
//! texture, which `blit` copies into the egui render pass. Vertex buffers are
//! refreshed every frame from CPU morphing and skinning.

#![cfg(feature = "native-ui")]

use std::sync::Mutex;

use bytemuck::{Pod, Zeroable};
use eframe::wgpu;
use furcat_fx::{FxSettings, PostProcessChain, HDR_FORMAT, OUTPUT_FORMAT};
use glam::{Mat4, Vec3};

use crate::camera::OrbitCamera;
use crate::fur::{FurParams, FurPattern, FurShells};
use crate::mesh::SurfaceMaterial;
use crate::model::CatModel;
use crate::scene::{FrameSink, FrameView};
use crate::skinning;

/// Where the key light shines from.
const KEY_LIGHT_POSITION: Vec3 = Vec3::new(2.0, 2.0, 1.0);

/// Vertex layout shared by the surface and fur shaders.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

fn build_vertices(positions: &[Vec3], normals: &[Vec3], uvs: &[[f32; 2]]) -> Vec<Vertex> {
    positions
        .iter()
        .enumerate()
        .map(|(i, p)| Vertex {
            position: p.to_array(),
            normal: normals.get(i).copied().unwrap_or(Vec3::Y).to_array(),
            uv: uvs.get(i).copied().unwrap_or([0.0; 2]),
        })
        .collect()
}

/// Lights and camera position, laid out as in both shaders.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct LightRig {
    camera_pos: [f32; 4],
    hemi_sky: [f32; 4],
    hemi_ground: [f32; 4],
    key_dir: [f32; 4],
    key_color: [f32; 4],
    ambient: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct SceneUniforms {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    rig: LightRig,
    base_color: [f32; 4],
    emissive: [f32; 4],
    material: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FurUniforms {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    rig: LightRig,
    tint: [f32; 4],
    wind: [f32; 4],
    shell: [f32; 4],
}

/// One primitive's GPU resources.
struct DrawCall {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    num_indices: u32,
    num_vertices: usize,
    mesh_idx: usize,
    prim_idx: usize,
}

/// Shell geometry, drawn once per shell with instancing.
struct FurDraw {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    num_indices: u32,
}

/// Per-frame values captured in `prepare_frame` and consumed by `render_offscreen`.
struct FrameState {
    camera: OrbitCamera,
    rig: LightRig,
    materials: Vec<SurfaceMaterial>,
    fur: Option<(Mat4, f32, FurParams, u32)>,
    fx: FxSettings,
}

/// Render targets and the post chain. Resized together under one lock.
struct OffscreenState {
    scene_texture: wgpu::Texture,
    scene_view: wgpu::TextureView,
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    display_texture: wgpu::Texture,
    display_view: wgpu::TextureView,
    blit_bind_group: wgpu::BindGroup,
    chain: PostProcessChain,
    offscreen_size: [u32; 2],
}

impl OffscreenState {
    fn aspect(&self) -> f32 {
        self.offscreen_size[0] as f32 / self.offscreen_size[1].max(1) as f32
    }
}

/// The cat renderer. Holds all GPU resources for offscreen rendering.
pub struct CatRenderer {
    scene_pipeline: wgpu::RenderPipeline,
    fur_pipeline: wgpu::RenderPipeline,
    blit_pipeline: wgpu::RenderPipeline,
    draw_calls: Vec<DrawCall>,
    fur: Option<FurDraw>,
    offscreen: Mutex<OffscreenState>,
    frame: Mutex<FrameState>,
    blit_bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl CatRenderer {
    /// Create a renderer for `model` and its fur shells.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target_format: wgpu::TextureFormat,
        model: &CatModel,
        fur: Option<&FurShells>,
        width: u32,
        height: u32,
    ) -> Self {
        let scene_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("cat_scene_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("scene.wgsl").into()),
        });
        let fur_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("cat_fur_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("fur.wgsl").into()),
        });
        let blit_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("cat_blit_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("blit.wgsl").into()),
        });

        let scene_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("cat_scene_bgl"),
                entries: &[uniform_entry(0)],
            });
        let fur_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("cat_fur_bgl"),
                entries: &[uniform_entry(0), texture_entry(1), sampler_entry(2)],
            });
        let blit_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("cat_blit_bgl"),
                entries: &[texture_entry(0), sampler_entry(1)],
            });

        // Surfaces write depth; shells only test against it
        let scene_pipeline = mesh_pipeline(
            device,
            "cat_scene_pipeline",
            &scene_shader,
            ("vs_main", "fs_main"),
            &scene_bind_group_layout,
            true,
        );
        let fur_pipeline = mesh_pipeline(
            device,
            "cat_fur_pipeline",
            &fur_shader,
            ("vs_fur", "fs_fur"),
            &fur_bind_group_layout,
            false,
        );

        let blit_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("cat_blit_pl"),
                bind_group_layouts: &[&blit_bind_group_layout],
                push_constant_ranges: &[],
            });
        let blit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("cat_blit_pipeline"),
            layout: Some(&blit_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &blit_shader,
                entry_point: Some("vs_blit"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &blit_shader,
                entry_point: Some("fs_blit"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("cat_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let offscreen = create_offscreen(device, &blit_bind_group_layout, &sampler, width, height);

        // One draw call per drawable primitive of each mesh
        let mut draw_calls = Vec::new();
        for (mesh_idx, mesh) in model.meshes.iter().enumerate() {
            for (prim_idx, prim) in mesh.primitives.iter().enumerate() {
                if !prim.is_drawable() {
                    continue;
                }
                let label = format!("cat_{}_{}", mesh_idx, prim_idx);
                let surface = &prim.surface;
                let vertices = build_vertices(&surface.positions, &surface.normals, &surface.uvs);
                let (vertex_buffer, index_buffer) =
                    upload_geometry(device, queue, &label, &vertices, &surface.indices);

                let uniform_buffer = uniform_buffer::<SceneUniforms>(device, &label);
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&label),
                    layout: &scene_bind_group_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    }],
                });

                draw_calls.push(DrawCall {
                    vertex_buffer,
                    index_buffer,
                    uniform_buffer,
                    bind_group,
                    num_indices: surface.indices.len() as u32,
                    num_vertices: vertices.len(),
                    mesh_idx,
                    prim_idx,
                });
            }
        }

        let fur = fur.map(|shells| {
            create_fur_draw(device, queue, &fur_bind_group_layout, shells)
        });

        let materials = draw_calls
            .iter()
            .map(|dc| model.meshes[dc.mesh_idx].primitives[dc.prim_idx].material)
            .collect();

        tracing::info!(
            "Renderer ready: {} draw calls, fur {}",
            draw_calls.len(),
            if fur.is_some() { "on" } else { "off" }
        );

        Self {
            scene_pipeline,
            fur_pipeline,
            blit_pipeline,
            draw_calls,
            fur,
            offscreen: Mutex::new(offscreen),
            frame: Mutex::new(FrameState {
                camera: OrbitCamera::default(),
                rig: LightRig::zeroed(),
                materials,
                fur: None,
                fx: FxSettings::default(),
            }),
            blit_bind_group_layout,
            sampler,
        }
    }

    /// Resize render targets, post-chain textures and aspect if the viewport changed.
    pub fn resize(&self, device: &wgpu::Device, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        let mut state = self.offscreen.lock().unwrap();
        if state.offscreen_size == [width, height] {
            return;
        }

        let (scene_texture, scene_view) =
            create_color_texture(device, width, height, HDR_FORMAT, "cat_scene_color");
        let (depth_texture, depth_view) = create_depth_texture(device, width, height);
        let (display_texture, display_view) =
            create_color_texture(device, width, height, OUTPUT_FORMAT, "cat_display_color");
        let blit_bind_group =
            create_blit_bind_group(device, &self.blit_bind_group_layout, &display_view, &self.sampler);

        state.scene_texture = scene_texture;
        state.scene_view = scene_view;
        state.depth_texture = depth_texture;
        state.depth_view = depth_view;
        state.display_texture = display_texture;
        state.display_view = display_view;
        state.blit_bind_group = blit_bind_group;
        state.chain.resize(device, width, height);
        state.offscreen_size = [width, height];
    }

    /// Morph, skin and upload every primitive, and capture this frame's lighting.
    pub fn prepare_frame(&self, queue: &wgpu::Queue, frame: &FrameView<'_>) {
        let model = frame.model;

        let deformed = skinning::deform_model(model, frame.world);

        for dc in &self.draw_calls {
            let Some(prim) = deformed.get(dc.mesh_idx).and_then(|m| m.get(dc.prim_idx)) else {
                continue;
            };
            if prim.positions.len() != dc.num_vertices {
                continue;
            }
            let uvs = &model.meshes[dc.mesh_idx].primitives[dc.prim_idx].surface.uvs;
            let vertices = build_vertices(&prim.positions, &prim.normals, uvs);
            queue.write_buffer(&dc.vertex_buffer, 0, bytemuck::cast_slice(&vertices));
        }

        let bundle = frame.bundle;
        let ambient = frame
            .environment
            .map(|env| env.ambient())
            .unwrap_or(Vec3::ZERO);
        let rig = LightRig {
            camera_pos: frame.camera.position.extend(1.0).to_array(),
            hemi_sky: bundle
                .hemisphere_sky
                .scaled(bundle.hemisphere_intensity)
                .to_array4(1.0),
            hemi_ground: bundle
                .hemisphere_ground
                .scaled(bundle.hemisphere_intensity)
                .to_array4(1.0),
            key_dir: KEY_LIGHT_POSITION.normalize().extend(0.0).to_array(),
            key_color: bundle.key_color.scaled(bundle.key_intensity).to_array4(1.0),
            ambient: ambient.extend(1.0).to_array(),
        };

        let mut state = self.frame.lock().unwrap();
        state.camera = frame.camera.clone();
        state.rig = rig;
        for (material, dc) in state.materials.iter_mut().zip(&self.draw_calls) {
            *material = model.meshes[dc.mesh_idx].primitives[dc.prim_idx].material;
        }
        state.fur = frame
            .fur
            .map(|fur| (frame.fur_transform, fur.time(), fur.params, fur.shell_count()));
        state.fx = FxSettings {
            bloom_strength: bundle.bloom_strength,
            film_enabled: bundle.film_enabled,
            exposure: bundle.exposure,
            time: frame.elapsed,
        };
    }

    /// Render the scene offscreen and run the post chain. Call this in `prepare()`.
    pub fn render_offscreen(&self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let mut state = self.offscreen.lock().unwrap();
        let frame = self.frame.lock().unwrap();
        let view_proj = frame.camera.view_projection(state.aspect()).to_cols_array_2d();

        for (dc, material) in self.draw_calls.iter().zip(&frame.materials) {
            let uniforms = SceneUniforms {
                view_proj,
                model: Mat4::IDENTITY.to_cols_array_2d(),
                rig: frame.rig,
                base_color: material.base_rgba(),
                emissive: material
                    .emissive
                    .scaled(material.emissive_intensity)
                    .to_array4(1.0),
                material: [material.roughness, material.metalness, 0.0, 0.0],
            };
            queue.write_buffer(&dc.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        }

        let fur_instances = match (&self.fur, frame.fur) {
            (Some(draw), Some((transform, time, params, count))) => {
                let uniforms = FurUniforms {
                    view_proj,
                    model: transform.to_cols_array_2d(),
                    rig: frame.rig,
                    tint: params.tint.to_array4(params.tint_mix),
                    wind: [params.wind.x, params.wind.y, params.strength, time],
                    shell: [params.extrude, count as f32, params.tile, params.alpha_cutoff],
                };
                queue.write_buffer(&draw.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
                count
            }
            _ => 0,
        };

        state.chain.configure(&frame.fx);
        state.chain.set_params(queue);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("cat_offscreen_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("cat_scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &state.scene_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &state.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            pass.set_pipeline(&self.scene_pipeline);

            // Opaque surfaces first, then transparent ones
            let (opaque, transparent): (Vec<_>, Vec<_>) = self
                .draw_calls
                .iter()
                .zip(&frame.materials)
                .partition(|(_, m)| !m.transparent);
            for (dc, _) in opaque.into_iter().chain(transparent) {
                pass.set_bind_group(0, &dc.bind_group, &[]);
                pass.set_vertex_buffer(0, dc.vertex_buffer.slice(..));
                pass.set_index_buffer(dc.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..dc.num_indices, 0, 0..1);
            }

            if let Some(fur) = self.fur.as_ref().filter(|_| fur_instances > 0) {
                pass.set_pipeline(&self.fur_pipeline);
                pass.set_bind_group(0, &fur.bind_group, &[]);
                pass.set_vertex_buffer(0, fur.vertex_buffer.slice(..));
                pass.set_index_buffer(fur.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..fur.num_indices, 0, 0..fur_instances);
            }
        }

        state
            .chain
            .run(device, &mut encoder, &state.scene_view, &state.display_view);

        // Drop locks before submit
        drop(frame);
        drop(state);
        queue.submit(std::iter::once(encoder.finish()));
    }

    /// Blit the display texture to the current render pass. Call this in `paint()`.
    pub fn blit(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        let state = self.offscreen.lock().unwrap();
        render_pass.set_pipeline(&self.blit_pipeline);
        render_pass.set_bind_group(0, Some(&state.blit_bind_group), &[]);
        drop(state);
        render_pass.draw(0..3, 0..1); // fullscreen triangle
    }

    /// Post effects that ran on the last frame.
    pub fn active_effects(&self) -> Vec<String> {
        let state = self.offscreen.lock().unwrap();
        state
            .chain
            .enabled_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

/// Frame sink that hands composed frames to the GPU renderer.
pub struct RendererSink<'a> {
    renderer: &'a CatRenderer,
    queue: &'a wgpu::Queue,
}

impl<'a> RendererSink<'a> {
    pub fn new(renderer: &'a CatRenderer, queue: &'a wgpu::Queue) -> Self {
        Self { renderer, queue }
    }
}

impl FrameSink for RendererSink<'_> {
    fn draw(&mut self, frame: &FrameView<'_>) -> crate::Result<()> {
        self.renderer.prepare_frame(self.queue, frame);
        Ok(())
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Alpha-blended triangle pipeline into the HDR target, no culling.
fn mesh_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader: &wgpu::ShaderModule,
    (vs_entry, fs_entry): (&str, &str),
    bind_group_layout: &wgpu::BindGroupLayout,
    depth_write: bool,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(vs_entry),
            buffers: &[Vertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fs_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: HDR_FORMAT,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
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
            format: wgpu::TextureFormat::Depth32Float,
            depth_write_enabled: depth_write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

fn upload_geometry(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    vertices: &[Vertex],
    indices: &[u32],
) -> (wgpu::Buffer, wgpu::Buffer) {
    let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(&format!("{}_vb", label)),
        size: std::mem::size_of_val(vertices) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    queue.write_buffer(&vertex_buffer, 0, bytemuck::cast_slice(vertices));

    let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(&format!("{}_ib", label)),
        size: std::mem::size_of_val(indices) as u64,
        usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    queue.write_buffer(&index_buffer, 0, bytemuck::cast_slice(indices));

    (vertex_buffer, index_buffer)
}

fn uniform_buffer<T: Pod>(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(&format!("{}_ub", label)),
        size: std::mem::size_of::<T>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_fur_draw(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    shells: &FurShells,
) -> FurDraw {
    let geometry = &shells.geometry;
    let vertices = build_vertices(&geometry.positions, &geometry.normals, &geometry.uvs);
    let (vertex_buffer, index_buffer) =
        upload_geometry(device, queue, "cat_fur", &vertices, &geometry.indices);
    let uniform_buffer = uniform_buffer::<FurUniforms>(device, "cat_fur");

    let pattern_view = upload_pattern(device, queue, &shells.pattern);
    let pattern_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("cat_fur_sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("cat_fur_bg"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&pattern_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&pattern_sampler),
            },
        ],
    });

    FurDraw {
        vertex_buffer,
        index_buffer,
        uniform_buffer,
        bind_group,
        num_indices: geometry.indices.len() as u32,
    }
}

/// Upload the fur pattern as an sRGB texture so sampling yields linear values.
fn upload_pattern(device: &wgpu::Device, queue: &wgpu::Queue, pattern: &FurPattern) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width: pattern.width,
        height: pattern.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("cat_fur_pattern"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &pattern.pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * pattern.width),
            rows_per_image: Some(pattern.height),
        },
        size,
    );
    texture.create_view(&Default::default())
}

fn create_offscreen(
    device: &wgpu::Device,
    blit_layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
) -> OffscreenState {
    let (scene_texture, scene_view) =
        create_color_texture(device, width, height, HDR_FORMAT, "cat_scene_color");
    let (depth_texture, depth_view) = create_depth_texture(device, width, height);
    let (display_texture, display_view) =
        create_color_texture(device, width, height, OUTPUT_FORMAT, "cat_display_color");
    let blit_bind_group = create_blit_bind_group(device, blit_layout, &display_view, sampler);

    OffscreenState {
        scene_texture,
        scene_view,
        depth_texture,
        depth_view,
        display_texture,
        display_view,
        blit_bind_group,
        chain: PostProcessChain::standard(device, width, height),
        offscreen_size: [width, height],
    }
}

fn create_blit_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("cat_blit_bg"),
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

fn create_color_texture(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    label: &str,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&Default::default());
    (texture, view)
}

fn create_depth_texture(
    device: &wgpu::Device,
    width: u32,
    height: u32,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("cat_offscreen_depth"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Depth32Float,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&Default::default());
    (texture, view)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layouts_are_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<LightRig>() % 16, 0);
        assert_eq!(std::mem::size_of::<SceneUniforms>(), 272);
        assert_eq!(std::mem::size_of::<FurUniforms>(), 272);
    }

    #[test]
    fn test_build_vertices_fills_missing_attributes() {
        let verts = build_vertices(&[Vec3::X, Vec3::Y], &[Vec3::Z], &[]);
        assert_eq!(verts.len(), 2);
        assert_eq!(verts[0].normal, [0.0, 0.0, 1.0]);
        assert_eq!(verts[1].normal, [0.0, 1.0, 0.0]);
        assert_eq!(verts[1].uv, [0.0, 0.0]);
    }
}
