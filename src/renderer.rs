//! # Renderer Module
//!
//! The `Renderer` ties the GPU, the scene and the egui overlay together and produces one
//! presented frame per call to [`Renderer::render_frame`].
//!
//! ## Overview
//!
//! - **Creation**: [`Renderer::new`] brings up the [`Gpu`], builds one entity per
//!   configured [`EntitySource`] and applies the configured [`ShaderErrorPolicy`] to any
//!   entity whose program fails.
//! - **Resizing**: [`Renderer::resize`] reconfigures the surface and recreates the depth
//!   texture.
//! - **Rendering**: each frame clears colour and depth, lets the scene record its draws,
//!   then paints the overlay on top.
//! - **Teardown**: [`Renderer::destroy`] releases every program exactly once.
//!
//! ## Frame order
//!
//! Cursor input has already been folded into the camera by the time a frame starts. The
//! frame then advances the clock, writes the uniforms, records the draws and presents.

use web_time::Instant;

use crate::config::{EntitySource, ShaderErrorPolicy, SkyConfig};
use crate::gpu::{Gpu, DEPTH_FORMAT};
use crate::gpu_program::{GpuProgram, GpuProgramFactory, ScenePass};
use crate::program::{ProgramBackend, ProgramError};
use crate::scene::Scene;
use crate::vertex::QUAD_VERTICES;
use crate::{camera::CameraState, clock::AnimationClock};

/// Errors that stop the renderer from starting.
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("failed to request device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("entity `{label}` could not be created: {source}")]
    Entity {
        label: String,
        #[source]
        source: ProgramError,
    },
}

pub struct Renderer {
    gpu: Gpu,
    depth_texture_view: wgpu::TextureView,
    egui_renderer: egui_wgpu::Renderer,
    quad_buffer: wgpu::Buffer,
    scene: Scene<GpuProgram>,
}

impl Renderer {
    /// Creates the renderer and every configured entity.
    ///
    /// # Errors
    ///
    /// GPU bring-up failures, and under [`ShaderErrorPolicy::Abort`] the first entity that
    /// fails to build. Entities created before an aborting failure are released first.
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        config: &SkyConfig,
    ) -> Result<Self, RendererError> {
        let gpu = Gpu::new_async(window, width, height).await?;

        let depth_texture_view = gpu.create_depth_texture(width, height);

        let egui_renderer = egui_wgpu::Renderer::new(
            &gpu.device,
            gpu.surface_config.format,
            Some(DEPTH_FORMAT),
            1,
            false,
        );

        let quad_buffer = wgpu::util::DeviceExt::create_buffer_init(
            &gpu.device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("Quad Vertex Buffer"),
                contents: bytemuck::cast_slice(&QUAD_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            },
        );

        let mut factory = GpuProgramFactory::new(&gpu.device, gpu.surface_format, DEPTH_FORMAT);
        let scene = build_scene(&mut factory, config)?;

        Ok(Self {
            gpu,
            depth_texture_view,
            egui_renderer,
            quad_buffer,
            scene,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
        self.depth_texture_view = self.gpu.create_depth_texture(width, height);
    }

    pub fn scene(&self) -> &Scene<GpuProgram> {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene<GpuProgram> {
        &mut self.scene
    }

    /// Renders and presents one frame. Minimised windows and unavailable surface textures
    /// skip the frame.
    pub fn render_frame(
        &mut self,
        screen_descriptor: egui_wgpu::ScreenDescriptor,
        paint_jobs: Vec<egui::epaint::ClippedPrimitive>,
        textures_delta: egui::TexturesDelta,
        now: Instant,
    ) {
        let (width, height) = self.gpu.size();
        if width == 0 || height == 0 {
            return;
        }

        for (id, image_delta) in &textures_delta.set {
            self.egui_renderer
                .update_texture(&self.gpu.device, &self.gpu.queue, *id, image_delta);
        }

        for id in &textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        let surface_texture = match self.gpu.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                log::debug!("Surface outdated, reconfiguring");
                self.resize(width, height);
                return;
            }
            Err(error) => {
                log::warn!("Skipping frame: {error}");
                return;
            }
        };

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        self.egui_renderer.update_buffers(
            &self.gpu.device,
            &self.gpu.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        let surface_texture_view =
            surface_texture
                .texture
                .create_view(&wgpu::TextureViewDescriptor {
                    label: wgpu::Label::default(),
                    aspect: wgpu::TextureAspect::default(),
                    format: Some(self.gpu.surface_format),
                    dimension: None,
                    base_mip_level: 0,
                    mip_level_count: None,
                    base_array_layer: 0,
                    array_layer_count: None,
                    usage: None,
                });

        encoder.insert_debug_marker("Render scene");

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_texture_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let mut pass = ScenePass::new(&self.gpu.queue, &mut render_pass, &self.quad_buffer);
            self.scene.render(&mut pass, width, height, now);

            self.egui_renderer.render(
                &mut render_pass.forget_lifetime(),
                &paint_jobs,
                &screen_descriptor,
            );
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
    }

    /// Releases every program in the scene along with the GPU.
    pub fn destroy(self) {
        let Self { gpu, scene, .. } = self;
        let mut factory = GpuProgramFactory::new(&gpu.device, gpu.surface_format, DEPTH_FORMAT);
        scene.destroy(&mut factory);
    }
}

/// Builds one entity per configured source, in order, applying the configured
/// [`ShaderErrorPolicy`] to each entity that fails.
///
/// Under [`ShaderErrorPolicy::Abort`] the entities created so far are released through
/// `backend` before the error is returned.
pub fn build_scene<B: ProgramBackend>(
    backend: &mut B,
    config: &SkyConfig,
) -> Result<Scene<B::Program>, RendererError> {
    let mut scene = Scene::new(
        CameraState::new(config.mouse_sensitivity),
        AnimationClock::new(config.start_time, config.animation_speed),
    );

    for EntitySource {
        label,
        vertex,
        fragment,
    } in &config.entities
    {
        match scene.create_entity(backend, vertex.as_deref(), fragment.as_deref()) {
            Ok(id) => log::info!("Entity `{label}` is {id}"),
            Err(error) => match config.on_shader_error {
                ShaderErrorPolicy::Abort => {
                    log::error!("Entity `{label}` failed, aborting: {error}");
                    scene.destroy(backend);
                    return Err(RendererError::Entity {
                        label: label.clone(),
                        source: error,
                    });
                }
                ShaderErrorPolicy::Skip => {
                    log::warn!("Entity `{label}` failed, skipping it: {error}");
                }
            },
        }
    }

    if scene.is_empty() {
        log::warn!("No entities were created, only the clear colour will be drawn");
    }
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;
    use crate::program::{LinkedProgram, ShaderStage};

    #[derive(Default)]
    struct CountingBackend {
        created: usize,
        destroyed: Vec<usize>,
    }

    impl ProgramBackend for CountingBackend {
        type Program = usize;

        fn create_program(&mut self, _linked: &LinkedProgram) -> Result<usize, ProgramError> {
            self.created += 1;
            Ok(self.created - 1)
        }

        fn destroy_program(&mut self, program: usize) {
            self.destroyed.push(program);
        }
    }

    fn broken(label: &str) -> EntitySource {
        EntitySource {
            label: label.to_owned(),
            vertex: None,
            fragment: Some(Cow::Borrowed("@fragment fn fragment_main() {")),
        }
    }

    fn config(policy: ShaderErrorPolicy) -> SkyConfig {
        SkyConfig {
            on_shader_error: policy,
            entities: vec![EntitySource::sky(), broken("broken"), EntitySource::sky()],
            ..SkyConfig::default()
        }
    }

    #[test]
    fn abort_releases_earlier_entities_and_stops() {
        let mut backend = CountingBackend::default();
        let error = build_scene(&mut backend, &config(ShaderErrorPolicy::Abort))
            .err()
            .expect("second entity fails");

        match error {
            RendererError::Entity { label, source } => {
                assert_eq!(label, "broken");
                assert!(matches!(
                    source,
                    ProgramError::Compile {
                        stage: ShaderStage::Fragment,
                        ..
                    }
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.created, 1);
        assert_eq!(backend.destroyed, vec![0]);
    }

    #[test]
    fn skip_drops_only_the_failing_entity() {
        let mut backend = CountingBackend::default();
        let scene =
            build_scene(&mut backend, &config(ShaderErrorPolicy::Skip)).expect("scene builds");

        assert_eq!(scene.len(), 2);
        assert_eq!(backend.created, 2);
        assert!(backend.destroyed.is_empty());
    }

    #[test]
    fn scene_takes_camera_and_clock_settings() {
        let mut backend = CountingBackend::default();
        let config = SkyConfig {
            mouse_sensitivity: 0.01,
            start_time: -4.0,
            ..SkyConfig::default()
        };
        let scene = build_scene(&mut backend, &config).expect("scene builds");

        assert_eq!(scene.len(), 1);
        assert_eq!(scene.camera.sensitivity(), 0.01);
        assert_eq!(scene.clock.elapsed(), -4.0);
    }
}
