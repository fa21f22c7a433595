//! # GPU Program
//!
//! The `wgpu` side of a program. [`GpuProgramFactory`] implements [`ProgramBackend`] by
//! turning a [`LinkedProgram`] into a render pipeline with its own uniform buffer and
//! bind group, and [`ScenePass`] implements [`FrameTarget`] by recording the draws into
//! an open render pass.
//!
//! ## Pipeline state
//!
//! Every pipeline draws the shared full-screen quad as a four-vertex triangle strip with
//! counter-clockwise front faces and back-face culling, a depth test of `Less` and alpha
//! blending into the surface format.
//!
//! A program without a fragment stage is given [`FIXED_FUNCTION_FRAGMENT_SHADER`], which
//! writes opaque white. A `wgpu` pipeline with no fragment stage cannot be used in a pass
//! that has a colour attachment.
//!
//! ## Errors
//!
//! Shader module and pipeline creation run inside a validation error scope. Anything the
//! device reports there becomes a [`ProgramError::Link`], so a bad program surfaces as a
//! result instead of through the device's uncaptured-error handler.

use std::borrow::Cow;

use crate::program::{LinkedProgram, ProgramBackend, ProgramError, FRAGMENT_ENTRY_POINT};
use crate::scene::FrameTarget;
use crate::uniform_buffer::UniformBlock;
use crate::vertex::{QuadVertex, QUAD_VERTEX_COUNT};

/// Fragment stage used for programs that do not supply one.
pub const FIXED_FUNCTION_FRAGMENT_SHADER: &str = r#"
@fragment
fn fragment_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}
"#;

/// A program resident on the GPU.
pub struct GpuProgram {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Builds [`GpuProgram`]s on one device.
pub struct GpuProgramFactory<'a> {
    device: &'a wgpu::Device,
    surface_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
}

impl<'a> GpuProgramFactory<'a> {
    pub fn new(
        device: &'a wgpu::Device,
        surface_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            device,
            surface_format,
            depth_format,
        }
    }

    fn build(&self, linked: &LinkedProgram) -> GpuProgram {
        let device = self.device;
        let staging = UniformBlock::zeroed(linked.block_size());

        let uniform_buffer = wgpu::util::DeviceExt::create_buffer_init(
            device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("Program Uniform Buffer"),
                contents: staging.as_bytes(),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            },
        );

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("program_uniform_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("program_uniform_bind_group"),
        });

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Vertex Stage"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(linked.vertex().source())),
        });

        let fragment_source = linked
            .fragment()
            .map_or(FIXED_FUNCTION_FRAGMENT_SHADER, |stage| stage.source());
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Fragment Stage"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(fragment_source)),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Program Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Program Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some(linked.vertex().entry_point()),
                buffers: &[QuadVertex::description(&QuadVertex::vertex_attributes())],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
                unclipped_depth: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: self.depth_format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some(FRAGMENT_ENTRY_POINT),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        });

        GpuProgram {
            pipeline,
            uniform_buffer,
            bind_group,
        }
    }
}

/// Resolves a device future that is ready once queued work is validated.
#[cfg(not(target_arch = "wasm32"))]
fn resolve<F: std::future::Future>(future: F) -> F::Output {
    pollster::block_on(future)
}

/// On the web the error scope cannot be awaited synchronously; a scope that has not
/// resolved yet is treated as clean.
#[cfg(target_arch = "wasm32")]
fn resolve<T, F: std::future::Future<Output = Option<T>>>(future: F) -> Option<T> {
    futures::FutureExt::now_or_never(future).flatten()
}

impl ProgramBackend for GpuProgramFactory<'_> {
    type Program = GpuProgram;

    fn create_program(&mut self, linked: &LinkedProgram) -> Result<GpuProgram, ProgramError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let program = self.build(linked);
        match resolve(self.device.pop_error_scope()) {
            None => Ok(program),
            Some(error) => {
                self.destroy_program(program);
                Err(ProgramError::Link {
                    diagnostic: error.to_string(),
                })
            }
        }
    }

    fn destroy_program(&mut self, program: GpuProgram) {
        program.uniform_buffer.destroy();
    }
}

/// Records entity draws into an open render pass.
pub struct ScenePass<'a, 'pass> {
    queue: &'a wgpu::Queue,
    render_pass: &'a mut wgpu::RenderPass<'pass>,
    quad: &'a wgpu::Buffer,
}

impl<'a, 'pass> ScenePass<'a, 'pass> {
    pub fn new(
        queue: &'a wgpu::Queue,
        render_pass: &'a mut wgpu::RenderPass<'pass>,
        quad: &'a wgpu::Buffer,
    ) -> Self {
        Self {
            queue,
            render_pass,
            quad,
        }
    }
}

impl FrameTarget<GpuProgram> for ScenePass<'_, '_> {
    fn draw_quad(&mut self, program: &GpuProgram, uniforms: &UniformBlock) {
        self.queue
            .write_buffer(&program.uniform_buffer, 0, uniforms.as_bytes());
        self.render_pass.set_pipeline(&program.pipeline);
        self.render_pass.set_bind_group(0, &program.bind_group, &[]);
        self.render_pass.set_vertex_buffer(0, self.quad.slice(..));
        self.render_pass.draw(0..QUAD_VERTEX_COUNT, 0..1);
    }
}
