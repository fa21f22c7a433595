//! # Application Core (`app.rs`)
//!
//! The `App` struct is the `winit` [`ApplicationHandler`] for the sky. It owns the window,
//! the egui integration and the [`Renderer`], which in turn owns the scene.
//!
//! ## Responsibilities
//!
//! - **Window Management**: creates the window (or binds the HTML canvas on the web) with
//!   the configured static title and size.
//! - **Input**: captures and hides the cursor and feeds relative mouse motion to the
//!   camera, toggles the animation clock on `Space`, and exits on `Escape` or a close
//!   request. Where the cursor cannot be captured, absolute cursor positions are used.
//! - **Overlay**: draws a small egui window with the clock and camera state and a
//!   Pause/Resume button.
//! - **Teardown**: releases the scene when the event loop exits, whatever the reason.
//!
//! ## Platform-Specific Notes
//!
//! - **Desktop**: the renderer is created synchronously through `pollster`. A failure is
//!   logged, handed out by [`App::take_failure`] and ends the event loop.
//! - **WebAssembly**: the renderer is created in a spawned task and delivered through a
//!   `oneshot` channel, which is polled on every window event until it yields.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

use std::sync::Arc;

use web_time::Instant;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Theme, Window},
};

use crate::config::SkyConfig;
use crate::renderer::{Renderer, RendererError};

#[cfg(target_arch = "wasm32")]
type RendererReceiver = futures::channel::oneshot::Receiver<Result<Renderer, RendererError>>;

pub struct App {
    config: SkyConfig,

    window: Option<Arc<Window>>,

    renderer: Option<Renderer>,

    gui_state: Option<egui_winit::State>,

    /// _(WebAssembly only)_ Delivers the renderer once its async creation finishes.
    #[cfg(target_arch = "wasm32")]
    renderer_receiver: Option<RendererReceiver>,

    /// Last known surface size in physical pixels, for the egui screen descriptor.
    last_size: (u32, u32),

    /// Whether the cursor is grabbed, so camera input comes from relative device motion.
    cursor_captured: bool,

    /// Why the application stopped early, if it did.
    failure: Option<RendererError>,
}

/// Grabs and hides the cursor, preferring `Locked` over `Confined`. Returns whether
/// either grab mode took.
fn capture_cursor(window: &Window) -> bool {
    let grab = window
        .set_cursor_grab(CursorGrabMode::Locked)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
    match grab {
        Ok(()) => {
            window.set_cursor_visible(false);
            true
        }
        Err(error) => {
            log::warn!("Cursor could not be captured, using absolute positions: {error}");
            false
        }
    }
}

impl App {
    pub fn new(config: SkyConfig) -> Self {
        Self {
            config,
            window: None,
            renderer: None,
            gui_state: None,
            #[cfg(target_arch = "wasm32")]
            renderer_receiver: None,
            last_size: (0, 0),
            cursor_captured: false,
            failure: None,
        }
    }

    /// Takes ownership of the error that ended the event loop, if start-up failed.
    pub fn take_failure(&mut self) -> Option<RendererError> {
        self.failure.take()
    }

    fn fail(&mut self, event_loop: &winit::event_loop::ActiveEventLoop, error: RendererError) {
        log::error!("Renderer could not start: {error}");
        self.failure = Some(error);
        event_loop.exit();
    }

    #[cfg(target_arch = "wasm32")]
    fn poll_renderer(&mut self, event_loop: &winit::event_loop::ActiveEventLoop) {
        let Some(receiver) = self.renderer_receiver.as_mut() else {
            return;
        };
        match receiver.try_recv() {
            Ok(Some(Ok(renderer))) => {
                self.renderer = Some(renderer);
                self.renderer_receiver = None;
            }
            Ok(Some(Err(error))) => {
                self.renderer_receiver = None;
                self.fail(event_loop, error);
            }
            Ok(None) => {}
            Err(_) => {
                log::error!("Renderer task was dropped before finishing");
                self.renderer_receiver = None;
            }
        }
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new(SkyConfig::default())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &winit::event_loop::ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let mut attributes = Window::default_attributes().with_title(self.config.title.clone());

        #[cfg(not(target_arch = "wasm32"))]
        {
            attributes = attributes
                .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        }

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowAttributesExtWebSys;

            let canvas = wgpu::web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id("canvas"))
                .and_then(|element| element.dyn_into::<wgpu::web_sys::HtmlCanvasElement>().ok());
            let Some(canvas) = canvas else {
                log::error!("No <canvas id=\"canvas\"> element to render into");
                event_loop.exit();
                return;
            };
            self.last_size = (canvas.width(), canvas.height());
            log::info!("Canvas dimensions: ({} x {})", canvas.width(), canvas.height());
            attributes = attributes.with_canvas(Some(canvas));
        }

        let window_handle = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(error) => {
                log::error!("Failed to create window: {error}");
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window_handle.clone());
        self.cursor_captured = capture_cursor(&window_handle);

        let gui_context = egui::Context::default();

        #[cfg(not(target_arch = "wasm32"))]
        {
            let inner_size = window_handle.inner_size();
            self.last_size = (inner_size.width, inner_size.height);
        }

        #[cfg(target_arch = "wasm32")]
        {
            gui_context.set_pixels_per_point(window_handle.scale_factor() as f32);
        }

        let viewport_id = gui_context.viewport_id();
        self.gui_state = Some(egui_winit::State::new(
            gui_context,
            viewport_id,
            &window_handle,
            Some(window_handle.scale_factor() as _),
            Some(Theme::Dark),
            None,
        ));

        let (width, height) = self.last_size;

        #[cfg(not(target_arch = "wasm32"))]
        {
            let config = &self.config;
            match pollster::block_on(Renderer::new(window_handle, width, height, config)) {
                Ok(renderer) => self.renderer = Some(renderer),
                Err(error) => self.fail(event_loop, error),
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let (sender, receiver) = futures::channel::oneshot::channel();
            self.renderer_receiver = Some(receiver);
            let config = self.config.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let renderer = Renderer::new(window_handle, width, height, &config).await;
                if sender.send(renderer).is_err() {
                    log::error!("Failed to send renderer!");
                }
            });
        }
    }

    fn window_event(
        &mut self,
        event_loop: &winit::event_loop::ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: winit::event::WindowEvent,
    ) {
        #[cfg(target_arch = "wasm32")]
        self.poll_renderer(event_loop);

        let (Some(gui_state), Some(renderer), Some(window)) = (
            self.gui_state.as_mut(),
            self.renderer.as_mut(),
            self.window.as_ref(),
        ) else {
            return;
        };

        if gui_state.on_window_event(window, &event).consumed {
            return;
        }

        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key_code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match key_code {
                KeyCode::Escape => event_loop.exit(),
                KeyCode::Space => {
                    renderer.scene_mut().clock.toggle();
                }
                _ => {}
            },
            WindowEvent::CursorMoved { position, .. } if !self.cursor_captured => {
                renderer
                    .scene_mut()
                    .camera
                    .observe_cursor(position.x, position.y);
            }
            WindowEvent::Focused(true) if self.cursor_captured => {
                capture_cursor(window);
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                log::info!("Resizing renderer surface to: ({width}, {height})");
                renderer.resize(width, height);
                self.last_size = (width, height);
            }
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting...");
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();

                let gui_input = gui_state.take_egui_input(window);
                gui_state.egui_ctx().begin_pass(gui_input);

                let scene = renderer.scene_mut();
                egui::Window::new(self.config.title.as_str()).show(gui_state.egui_ctx(), |ui| {
                    ui.label(format!("time: {:.2} s", scene.clock.elapsed()));
                    ui.label(format!(
                        "camera: r = {:.3}, r2 = {:.3}",
                        scene.camera.r, scene.camera.r2
                    ));
                    ui.label(format!("entities: {}", scene.len()));
                    let label = if scene.clock.is_paused() {
                        "Resume"
                    } else {
                        "Pause"
                    };
                    if ui.button(label).clicked() {
                        scene.clock.toggle();
                    }
                });

                let egui_winit::egui::FullOutput {
                    textures_delta,
                    shapes,
                    pixels_per_point,
                    platform_output,
                    ..
                } = gui_state.egui_ctx().end_pass();

                gui_state.handle_platform_output(window, platform_output);

                let paint_jobs = gui_state.egui_ctx().tessellate(shapes, pixels_per_point);

                let screen_descriptor = {
                    let (width, height) = self.last_size;
                    egui_wgpu::ScreenDescriptor {
                        size_in_pixels: [width, height],
                        pixels_per_point: window.scale_factor() as f32,
                    }
                };

                renderer.render_frame(screen_descriptor, paint_jobs, textures_delta, now);
            }
            _ => (),
        }

        window.request_redraw();
    }

    fn device_event(
        &mut self,
        _event_loop: &winit::event_loop::ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if !self.cursor_captured {
            return;
        }
        if let (DeviceEvent::MouseMotion { delta: (dx, dy) }, Some(renderer)) =
            (event, self.renderer.as_mut())
        {
            renderer.scene_mut().camera.observe_motion(dx, dy);
        }
    }

    fn exiting(&mut self, _event_loop: &winit::event_loop::ActiveEventLoop) {
        if let Some(renderer) = self.renderer.take() {
            log::info!("Event loop exiting, releasing scene");
            renderer.destroy();
        }
    }
}
