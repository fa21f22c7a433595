//! # Sky Renderer Library
//!
//! This library draws a full-screen procedural sky with `wgpu`. The sky is one or more
//! *entities*, each a shader program drawn over a full-screen quad, fed every frame with
//! a projection, two camera rotations, the viewport aspect ratio and an animation time.
//!
//! ## Modules
//!
//! - [`program`]: compiles and links WGSL programs and resolves their uniforms.
//! - [`uniform_binding`] / [`uniform_buffer`]: the six well-known uniforms and the CPU
//!   staging block they are written into.
//! - [`scene`]: entities, the per-frame update and teardown.
//! - [`transform`]: projection and rotation matrices.
//! - [`camera`] / [`clock`]: mouse-look angles and the pausable animation clock.
//! - [`gpu`], [`gpu_program`], [`renderer`], [`app`]: the `wgpu` and `winit` plumbing.
//! - [`config`]: start-up options.
//!
//! Everything above [`gpu`] in that list is free of GPU types and is tested without a
//! device, through the [`program::ProgramBackend`] and [`scene::FrameTarget`] traits.
//!
//! ## Controls
//!
//! - Moving the cursor turns the camera.
//! - `Space` pauses and resumes the animation clock.
//! - `Escape` quits.
//!
//! ## Dependencies
//!
//! - `wgpu` and `naga`: rendering, and CPU-side shader compilation.
//! - `winit`, `egui`: window, events and the overlay.
//! - `nalgebra-glm`, `bytemuck`: matrices and their byte layout.
//! - `log` with `env_logger` (native) or `console_log` (web): logging.
//! - `thiserror`: error types.

pub mod app;
pub mod camera;
pub mod clock;
pub mod config;
pub mod gpu;
pub mod gpu_program;
pub mod program;
pub mod renderer;
pub mod scene;
pub mod transform;
pub mod uniform_binding;
pub mod uniform_buffer;
pub mod vertex;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub use crate::app::App;
pub use crate::config::{EntitySource, ShaderErrorPolicy, SkyConfig};
pub use crate::program::{
    compile_program, LinkedProgram, ProgramBackend, ProgramError, ShaderStage,
};
pub use crate::renderer::{build_scene, Renderer, RendererError};
pub use crate::scene::{Entity, EntityId, FrameTarget, FrameUniforms, Scene};

/// Vertex stage of the bundled sky.
///
/// Rotates each quad corner into a view ray with `RY * RX`, squashes it vertically by
/// `aspectRatio`, and passes the ray and a sun direction derived from `time` to the
/// fragment stage at locations 0 and 1.
pub const SKY_VERTEX_SHADER: &str = include_str!("sky_vertex.wgsl");

/// Fragment stage of the bundled sky.
///
/// The sun disc, Rayleigh and Mie scattering for the sky colour, cirrus and cumulus cloud
/// layers from fractal noise scrolled by `time`, and a flat grey fill below the horizon.
pub const SKY_FRAGMENT_SHADER: &str = include_str!("sky_fragment.wgsl");

/// Errors that end [`run`].
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("event loop failed: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error(transparent)]
    Renderer(#[from] RendererError),
}

/// Opens the window and runs the sky until it is closed.
#[cfg(not(target_arch = "wasm32"))]
pub fn run(config: SkyConfig) -> Result<(), RunError> {
    let event_loop = winit::event_loop::EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.take_failure() {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

/// Web entry point: sets up console logging and hands the app to the browser's event loop.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    std::panic::set_hook(Box::new(console_error_panic_hook::hook));
    if console_log::init_with_level(log::Level::Info).is_err() {
        return;
    }

    let event_loop = match winit::event_loop::EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(error) => {
            log::error!("Failed to create event loop: {error}");
            return;
        }
    };

    use winit::platform::web::EventLoopExtWebSys;
    event_loop.spawn_app(App::default());
}
