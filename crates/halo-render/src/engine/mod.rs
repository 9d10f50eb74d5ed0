//! The wgpu rendering engine.

mod capture;
mod pipelines;
mod rendering;
mod targets;

use std::sync::Arc;

use wgpu::util::DeviceExt;

use halo_core::{Camera, Viewport};

use crate::error::{RenderError, RenderResult};
use crate::gpu_geometry::GeometryCache;

pub use capture::CaptureTarget;
pub use pipelines::{PassPipelines, OUTLINE_STENCIL_REF};
pub use targets::{PassTarget, TargetPair, TARGET_COLOR_FORMAT, TARGET_DEPTH_STENCIL_FORMAT};

/// Camera uniforms for GPU.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    /// Viewport size in pixels (xy).
    pub viewport: [f32; 4],
}

impl CameraUniforms {
    /// Uniforms for `camera` rendering into `viewport`.
    #[must_use]
    pub fn new(camera: &Camera, viewport: Viewport) -> Self {
        Self {
            view_proj: camera.view_projection_matrix().to_cols_array_2d(),
            camera_pos: camera.position.extend(1.0).to_array(),
            viewport: [viewport.width as f32, viewport.height as f32, 0.0, 0.0],
        }
    }
}

impl Default for CameraUniforms {
    fn default() -> Self {
        Self {
            view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            camera_pos: [0.0, 0.0, 5.0, 1.0],
            viewport: [1.0, 1.0, 0.0, 0.0],
        }
    }
}

/// Uniform buffer and bind group for a single overlay draw.
pub(crate) struct OverlayDraw {
    pub(crate) buffer: wgpu::Buffer,
    pub(crate) bind_group: wgpu::BindGroup,
}

impl OverlayDraw {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, label: &str) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&[
                <halo_core::OutlineUniforms as bytemuck::Zeroable>::zeroed(),
            ]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self { buffer, bind_group }
    }
}

/// The wgpu renderer of the selection-and-outline pipeline.
///
/// Implements [`halo_core::RenderBackend`]; the pipeline driver decides when
/// targets are recreated and which passes run.
pub struct RenderEngine {
    /// The wgpu instance.
    pub instance: wgpu::Instance,
    /// The wgpu adapter.
    pub adapter: wgpu::Adapter,
    /// The wgpu device.
    pub device: wgpu::Device,
    /// The wgpu queue.
    pub queue: wgpu::Queue,
    /// The render surface (None for headless).
    pub surface: Option<wgpu::Surface<'static>>,
    /// Surface configuration.
    pub surface_config: wgpu::SurfaceConfiguration,
    /// Current viewport width.
    pub width: u32,
    /// Current viewport height.
    pub height: u32,
    pub(crate) pipelines: PassPipelines,
    pub(crate) camera_buffer: wgpu::Buffer,
    pub(crate) camera_bind_group: wgpu::BindGroup,
    pub(crate) geometry: GeometryCache,
    pub(crate) mask_draw: OverlayDraw,
    pub(crate) outline_draw: OverlayDraw,
    /// Ping-pong targets of the current generation.
    pub(crate) targets: Option<TargetPair>,
    /// Offscreen copy of the composited frame.
    pub(crate) capture: Option<CaptureTarget>,
    /// Composite into `capture` as well as the surface.
    pub(crate) capture_requested: bool,
}

impl RenderEngine {
    /// Creates a new windowed render engine.
    pub async fn new_windowed(window: Arc<winit::window::Window>) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = Self::request_device(&adapter, "halo device").await?;

        let size = window.inner_size();
        let Viewport { width, height } = Viewport {
            width: size.width.max(1),
            height: size.height.max(1),
        }
        .fit_within(device.limits().max_texture_dimension_2d);

        let surface_caps = surface.get_capabilities(&adapter);
        // Colors are written as given, so prefer a non-sRGB surface.
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(RenderError::SurfaceConfigurationFailed)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        log::info!(
            "render engine created on {} ({:?}), surface {:?} {}x{}",
            adapter.get_info().name,
            adapter.get_info().backend,
            surface_format,
            width,
            height
        );

        Ok(Self::assemble(
            instance,
            adapter,
            device,
            queue,
            Some(surface),
            surface_config,
        ))
    }

    /// Creates a headless render engine that composites into a capture texture.
    pub async fn new_headless(width: u32, height: u32) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = Self::request_device(&adapter, "halo device (headless)").await?;

        let Viewport { width, height } = Viewport {
            width: width.max(1),
            height: height.max(1),
        }
        .fit_within(device.limits().max_texture_dimension_2d);
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            format: TARGET_COLOR_FORMAT,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        log::info!(
            "headless render engine created on {} ({:?}), {}x{}",
            adapter.get_info().name,
            adapter.get_info().backend,
            width,
            height
        );

        let mut engine = Self::assemble(instance, adapter, device, queue, None, surface_config);
        engine.capture_requested = true;
        Ok(engine)
    }

    async fn request_device(
        adapter: &wgpu::Adapter,
        label: &str,
    ) -> RenderResult<(wgpu::Device, wgpu::Queue)> {
        Ok(adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some(label),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?)
    }

    fn assemble(
        instance: wgpu::Instance,
        adapter: wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface: Option<wgpu::Surface<'static>>,
        surface_config: wgpu::SurfaceConfiguration,
    ) -> Self {
        let pipelines = PassPipelines::new(&device, surface_config.format);

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camera uniforms"),
            contents: bytemuck::cast_slice(&[CameraUniforms::default()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera bind group"),
            layout: &pipelines.camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let mask_draw = OverlayDraw::new(&device, &pipelines.object_layout, "mask uniforms");
        let outline_draw = OverlayDraw::new(&device, &pipelines.object_layout, "outline uniforms");

        Self {
            width: surface_config.width,
            height: surface_config.height,
            instance,
            adapter,
            device,
            queue,
            surface,
            surface_config,
            pipelines,
            camera_buffer,
            camera_bind_group,
            geometry: GeometryCache::new(),
            mask_draw,
            outline_draw,
            targets: None,
            capture: None,
            capture_requested: false,
        }
    }

    /// Returns true when rendering to a window surface.
    #[must_use]
    pub fn is_windowed(&self) -> bool {
        self.surface.is_some()
    }

    /// Current viewport.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.height,
        }
    }

    /// Largest texture width or height the device supports.
    #[must_use]
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Number of renderables with GPU buffers.
    #[must_use]
    pub fn cached_geometry_count(&self) -> usize {
        self.geometry.len()
    }

    /// Reconfigures the surface for a new size. Zero sizes are ignored.
    pub(crate) fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.width = width;
        self.height = height;
        self.surface_config.width = width;
        self.surface_config.height = height;

        if let Some(ref surface) = self.surface {
            surface.configure(&self.device, &self.surface_config);
        }
    }

    /// Uploads the camera uniforms.
    pub(crate) fn update_camera_uniforms(&self, camera: &Camera) {
        let uniforms = CameraUniforms::new(camera, self.viewport());
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[uniforms]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_uniforms_layout() {
        assert_eq!(std::mem::size_of::<CameraUniforms>(), 96);
    }

    #[test]
    fn test_camera_uniforms_viewport() {
        let camera = Camera::new(2.0);
        let uniforms = CameraUniforms::new(&camera, Viewport::new(800, 400).unwrap());
        assert_eq!(uniforms.viewport[0], 800.0);
        assert_eq!(uniforms.viewport[1], 400.0);
        assert_eq!(uniforms.camera_pos[3], 1.0);
    }
}
