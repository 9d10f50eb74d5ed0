//! Render pipelines of the five passes.

use super::targets::{TARGET_COLOR_FORMAT, TARGET_DEPTH_STENCIL_FORMAT};

/// Stencil value the outline pass tests for.
pub const OUTLINE_STENCIL_REF: u32 = 1;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

fn mesh_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: 24,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

fn segment_instance_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: 24,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

fn uniform_layout_entry(visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn stencil_face(compare: wgpu::CompareFunction, pass_op: wgpu::StencilOperation) -> wgpu::StencilFaceState {
    wgpu::StencilFaceState {
        compare,
        fail_op: wgpu::StencilOperation::Keep,
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op,
    }
}

/// Depth/stencil state of a pass.
struct DepthStencil {
    depth_write: bool,
    depth_compare: wgpu::CompareFunction,
    stencil: wgpu::StencilState,
}

impl DepthStencil {
    /// Depth-tested drawing with the stencil ignored.
    fn scene() -> Self {
        Self {
            depth_write: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
        }
    }

    /// Writes the stencil reference wherever the mask is visible.
    fn mask() -> Self {
        let face = stencil_face(wgpu::CompareFunction::Always, wgpu::StencilOperation::Replace);
        Self {
            depth_write: false,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState {
                front: face,
                back: face,
                read_mask: 0xFF,
                write_mask: 0xFF,
            },
        }
    }

    /// Draws only where the stencil equals the reference.
    fn outline() -> Self {
        let face = stencil_face(wgpu::CompareFunction::Equal, wgpu::StencilOperation::Keep);
        Self {
            depth_write: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState {
                front: face,
                back: face,
                read_mask: 0xFF,
                write_mask: 0x00,
            },
        }
    }

    fn state(self) -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format: TARGET_DEPTH_STENCIL_FORMAT,
            depth_write_enabled: self.depth_write,
            depth_compare: self.depth_compare,
            stencil: self.stencil,
            bias: wgpu::DepthBiasState::default(),
        }
    }
}

struct PipelineSpec<'a> {
    label: &'a str,
    shader: &'a wgpu::ShaderModule,
    vs_entry: &'a str,
    fs_entry: &'a str,
    vertex_layout: wgpu::VertexBufferLayout<'static>,
    color_writes: wgpu::ColorWrites,
    depth_stencil: DepthStencil,
}

fn create_target_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    spec: PipelineSpec<'_>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(spec.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: spec.shader,
            entry_point: Some(spec.vs_entry),
            buffers: &[spec.vertex_layout],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: spec.shader,
            entry_point: Some(spec.fs_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: TARGET_COLOR_FORMAT,
                blend: None,
                write_mask: spec.color_writes,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            // two-sided: offset shells and open meshes are visible from both sides
            cull_mode: None,
            ..wgpu::PrimitiveState::default()
        },
        depth_stencil: Some(spec.depth_stencil.state()),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// All pipelines and shared bind group layouts.
pub struct PassPipelines {
    /// Group 0: camera uniforms.
    pub camera_layout: wgpu::BindGroupLayout,
    /// Group 1: per-draw uniforms.
    pub object_layout: wgpu::BindGroupLayout,
    /// Composite source texture.
    pub composite_layout: wgpu::BindGroupLayout,
    pub scene_mesh: wgpu::RenderPipeline,
    pub scene_lines: wgpu::RenderPipeline,
    pub mask_mesh: wgpu::RenderPipeline,
    pub mask_lines: wgpu::RenderPipeline,
    pub outline_mesh: wgpu::RenderPipeline,
    pub outline_lines: wgpu::RenderPipeline,
    /// Composite into the presentation surface.
    pub composite_surface: wgpu::RenderPipeline,
    /// Composite into the capture texture or a pass target.
    pub composite_offscreen: wgpu::RenderPipeline,
}

impl PassPipelines {
    /// Compiles the shaders and builds every pipeline.
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("camera bind group layout"),
            entries: &[uniform_layout_entry(
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
        });
        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object bind group layout"),
            entries: &[uniform_layout_entry(
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
        });
        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("composite bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        let draw_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("draw pipeline layout"),
            bind_group_layouts: &[&camera_layout, &object_layout],
            push_constant_ranges: &[],
        });

        let scene_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/scene.wgsl").into()),
        });
        let lines_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lines shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/lines.wgsl").into()),
        });
        let outline_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("outline shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/outline.wgsl").into()),
        });

        let scene_mesh = create_target_pipeline(
            device,
            &draw_layout,
            PipelineSpec {
                label: "scene mesh pipeline",
                shader: &scene_shader,
                vs_entry: "vs_main",
                fs_entry: "fs_main",
                vertex_layout: mesh_vertex_layout(),
                color_writes: wgpu::ColorWrites::ALL,
                depth_stencil: DepthStencil::scene(),
            },
        );
        let scene_lines = create_target_pipeline(
            device,
            &draw_layout,
            PipelineSpec {
                label: "scene lines pipeline",
                shader: &lines_shader,
                vs_entry: "vs_main",
                fs_entry: "fs_main",
                vertex_layout: segment_instance_layout(),
                color_writes: wgpu::ColorWrites::ALL,
                depth_stencil: DepthStencil::scene(),
            },
        );
        let mask_mesh = create_target_pipeline(
            device,
            &draw_layout,
            PipelineSpec {
                label: "mask mesh pipeline",
                shader: &outline_shader,
                vs_entry: "vs_mesh",
                fs_entry: "fs_flat",
                vertex_layout: mesh_vertex_layout(),
                color_writes: wgpu::ColorWrites::empty(),
                depth_stencil: DepthStencil::mask(),
            },
        );
        let mask_lines = create_target_pipeline(
            device,
            &draw_layout,
            PipelineSpec {
                label: "mask lines pipeline",
                shader: &outline_shader,
                vs_entry: "vs_lines",
                fs_entry: "fs_flat",
                vertex_layout: segment_instance_layout(),
                color_writes: wgpu::ColorWrites::empty(),
                depth_stencil: DepthStencil::mask(),
            },
        );
        let outline_mesh = create_target_pipeline(
            device,
            &draw_layout,
            PipelineSpec {
                label: "outline mesh pipeline",
                shader: &outline_shader,
                vs_entry: "vs_mesh",
                fs_entry: "fs_flat",
                vertex_layout: mesh_vertex_layout(),
                color_writes: wgpu::ColorWrites::ALL,
                depth_stencil: DepthStencil::outline(),
            },
        );
        let outline_lines = create_target_pipeline(
            device,
            &draw_layout,
            PipelineSpec {
                label: "outline lines pipeline",
                shader: &outline_shader,
                vs_entry: "vs_lines",
                fs_entry: "fs_flat",
                vertex_layout: segment_instance_layout(),
                color_writes: wgpu::ColorWrites::ALL,
                depth_stencil: DepthStencil::outline(),
            },
        );

        let copy_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("composite shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/copy.wgsl").into()),
        });
        let composite_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("composite pipeline layout"),
                bind_group_layouts: &[&composite_layout],
                push_constant_ranges: &[],
            });
        let composite_surface = create_composite_pipeline(
            device,
            &composite_pipeline_layout,
            &copy_shader,
            surface_format,
        );
        let composite_offscreen = create_composite_pipeline(
            device,
            &composite_pipeline_layout,
            &copy_shader,
            TARGET_COLOR_FORMAT,
        );

        Self {
            camera_layout,
            object_layout,
            composite_layout,
            scene_mesh,
            scene_lines,
            mask_mesh,
            mask_lines,
            outline_mesh,
            outline_lines,
            composite_surface,
            composite_offscreen,
        }
    }
}

fn create_composite_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("composite pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
