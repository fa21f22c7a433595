//! # GPU Management Module
//!
//! The `gpu` module is responsible for setting up and managing the GPU resources the sky
//! renders into: the window surface, the device and its queue.
//!
//! ## Overview
//!
//! [`Gpu::new_async`] walks through the usual `wgpu` bring-up (instance, surface,
//! adapter, device) and configures the surface for the window's size. Each step that can
//! fail is reported as a [`RendererError`] instead of panicking, so the application can
//! log the failure and leave the event loop cleanly.
//!
//! The remaining methods cover what changes while the application runs: resizing the
//! surface, and recreating the depth texture to match it.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use sky_core::gpu::Gpu;
//!
//! async fn create_gpu(window: std::sync::Arc<winit::window::Window>) -> Gpu {
//!     Gpu::new_async(window, 800, 600).await.expect("GPU available")
//! }
//! ```

use wgpu::InstanceDescriptor;

use crate::renderer::RendererError;

/// Format of the depth buffer shared by every pipeline.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// A struct representing the GPU-related resources and configurations required for rendering.
///
/// # Fields
/// - `surface` (`wgpu::Surface`): The window or canvas the frames are presented to.
/// - `device` (`wgpu::Device`): Creates buffers, textures and pipelines.
/// - `queue` (`wgpu::Queue`): Receives buffer writes and command buffers.
/// - `surface_config` (`wgpu::SurfaceConfiguration`): The surface's current size, format
///   and present mode.
/// - `surface_format` (`wgpu::TextureFormat`): The colour format chosen for the surface.
pub struct Gpu {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface_config: wgpu::SurfaceConfiguration,
    pub surface_format: wgpu::TextureFormat,
}

impl Gpu {
    /// Current surface size in physical pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    /// Reconfigures the surface for a new size.
    ///
    /// A zero-sized surface cannot be configured, so a minimised window only records the
    /// new size; the surface is configured again once the window is restored.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface_config.width = width;
        self.surface_config.height = height;
        if width > 0 && height > 0 {
            self.surface.configure(&self.device, &self.surface_config);
        }
    }

    /// Creates a depth texture view of the given size.
    ///
    /// Zero dimensions are clamped to one texel.
    pub fn create_depth_texture(&self, width: u32, height: u32) -> wgpu::TextureView {
        let texture = self.device.create_texture(
            &(wgpu::TextureDescriptor {
                label: Some("Depth Texture"),
                size: wgpu::Extent3d {
                    width: width.max(1),
                    height: height.max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            }),
        );
        texture.create_view(&wgpu::TextureViewDescriptor {
            label: None,
            format: Some(DEPTH_FORMAT),
            dimension: Some(wgpu::TextureViewDimension::D2),
            aspect: wgpu::TextureAspect::All,
            base_mip_level: 0,
            base_array_layer: 0,
            array_layer_count: None,
            mip_level_count: None,
            usage: None,
        })
    }

    /// Asynchronously brings up the GPU for `window`.
    ///
    /// # Errors
    ///
    /// - [`RendererError::Surface`] if no surface can be created for the window.
    /// - [`RendererError::NoAdapter`] if no adapter can present to that surface.
    /// - [`RendererError::Device`] if the adapter refuses to hand out a device.
    pub async fn new_async(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<Self, RendererError> {
        let instance = wgpu::Instance::new(&InstanceDescriptor::default());
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RendererError::NoAdapter)?;
        log::info!("Adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&device_descriptor(adapter.limits()), None)
            .await?;

        let capabilities = surface.get_capabilities(&adapter);
        let surface_format =
            choose_surface_format(&capabilities.formats).ok_or(RendererError::NoAdapter)?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: capabilities
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let mut gpu = Self {
            surface,
            device,
            queue,
            surface_config,
            surface_format,
        };
        gpu.resize(width, height);
        Ok(gpu)
    }
}

fn device_descriptor(adapter_limits: wgpu::Limits) -> wgpu::DeviceDescriptor<'static> {
    #[cfg(all(target_arch = "wasm32", feature = "webgl"))]
    let limits = wgpu::Limits::downlevel_webgl2_defaults();
    #[cfg(not(all(target_arch = "wasm32", feature = "webgl")))]
    let limits = wgpu::Limits::default();

    wgpu::DeviceDescriptor {
        label: Some("Sky Device"),
        required_features: wgpu::Features::empty(),
        required_limits: limits.using_resolution(adapter_limits),
        memory_hints: wgpu::MemoryHints::default(),
    }
}

/// Picks the surface colour format. egui expects a linear (non-sRGB) target, so the first
/// linear format wins and the first format of any kind is the fallback.
pub fn choose_surface_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    formats
        .iter()
        .copied()
        .find(|format| !format.is_srgb())
        .or_else(|| formats.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_surface_format_is_preferred() {
        let formats = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm,
        ];
        assert_eq!(
            choose_surface_format(&formats),
            Some(wgpu::TextureFormat::Bgra8Unorm)
        );
    }

    #[test]
    fn srgb_only_surface_falls_back_to_first() {
        let formats = [wgpu::TextureFormat::Rgba8UnormSrgb];
        assert_eq!(
            choose_surface_format(&formats),
            Some(wgpu::TextureFormat::Rgba8UnormSrgb)
        );
        assert_eq!(choose_surface_format(&[]), None);
    }
}
