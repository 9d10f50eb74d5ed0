//! Reading the composited frame back to the CPU.

use halo_core::Viewport;

use super::targets::TARGET_COLOR_FORMAT;
use super::RenderEngine;
use crate::error::{RenderError, RenderResult};

/// Offscreen texture the composite pass also writes when a capture is wanted.
pub struct CaptureTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub viewport: Viewport,
    /// Set once a frame has been composited into `texture`.
    pub(crate) written: bool,
}

impl CaptureTarget {
    pub(crate) fn new(device: &wgpu::Device, viewport: Viewport) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("capture texture"),
            size: wgpu::Extent3d {
                width: viewport.width,
                height: viewport.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            viewport,
            written: false,
        }
    }
}

/// Calculates bytes per row with proper alignment for wgpu buffer copies.
pub(crate) fn aligned_bytes_per_row(width: u32) -> u32 {
    let bytes_per_pixel = 4u32; // RGBA8
    let unaligned = width * bytes_per_pixel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unaligned.div_ceil(align) * align
}

/// Copies the visible part of each padded row.
pub(crate) fn strip_row_padding(data: &[u8], width: u32, height: u32, padded_row: u32) -> Vec<u8> {
    let row_bytes = (width * 4) as usize;
    let mut result = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * padded_row as usize;
        result.extend_from_slice(&data[start..start + row_bytes]);
    }
    result
}

impl RenderEngine {
    /// Makes the next frames also composite into an offscreen capture texture.
    pub fn request_capture(&mut self) {
        self.capture_requested = true;
        if self.capture.as_ref().map(|c| c.viewport) != Some(self.viewport()) {
            self.capture = Some(CaptureTarget::new(&self.device, self.viewport()));
        }
    }

    /// Reads back the last composited frame as tightly packed RGBA8 rows.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NoCaptureTarget`] if no frame was captured, or
    /// [`RenderError::BufferMapFailed`] if the readback fails.
    pub fn capture_frame(&self) -> RenderResult<Vec<u8>> {
        let capture = self
            .capture
            .as_ref()
            .filter(|c| c.written)
            .ok_or(RenderError::NoCaptureTarget)?;
        let Viewport { width, height } = capture.viewport;

        let bytes_per_row = aligned_bytes_per_row(width);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("capture readback buffer"),
            size: u64::from(bytes_per_row * height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("capture copy encoder"),
            });

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &capture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
        rx.recv()
            .map_err(|_| RenderError::BufferMapFailed)?
            .map_err(|_| RenderError::BufferMapFailed)?;

        let data = buffer_slice.get_mapped_range();
        let result = strip_row_padding(&data, width, height, bytes_per_row);
        drop(data);
        buffer.unmap();

        Ok(result)
    }
}
