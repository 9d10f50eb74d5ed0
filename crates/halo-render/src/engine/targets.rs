//! Off-screen pass targets: color plus depth/stencil, ping-ponged in pairs.

use halo_core::{TargetHandle, TargetSet, TargetSlot, Viewport};

use crate::error::{RenderError, RenderResult};

/// Color format of the pass targets.
pub const TARGET_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Depth/stencil format of the pass targets.
pub const TARGET_DEPTH_STENCIL_FORMAT: wgpu::TextureFormat =
    wgpu::TextureFormat::Depth24PlusStencil8;

/// A color buffer paired with a depth/stencil buffer.
pub struct PassTarget {
    pub color_texture: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub depth_stencil_texture: wgpu::Texture,
    pub depth_stencil_view: wgpu::TextureView,
    /// Samples `color_view` for the composite pass.
    pub composite_bind_group: wgpu::BindGroup,
}

impl PassTarget {
    fn new(
        device: &wgpu::Device,
        composite_layout: &wgpu::BindGroupLayout,
        viewport: Viewport,
        slot: TargetSlot,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: viewport.width,
            height: viewport.height,
            depth_or_array_layers: 1,
        };

        let color_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("pass target {slot:?} color")),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let depth_stencil_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("pass target {slot:?} depth/stencil")),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_DEPTH_STENCIL_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_stencil_view =
            depth_stencil_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let composite_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite bind group"),
            layout: composite_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&color_view),
            }],
        });

        Self {
            color_texture,
            color_view,
            depth_stencil_texture,
            depth_stencil_view,
            composite_bind_group,
        }
    }
}

/// The two targets of one generation.
pub struct TargetPair {
    set: TargetSet,
    a: PassTarget,
    b: PassTarget,
}

impl TargetPair {
    /// Creates both targets for `set`.
    pub fn new(device: &wgpu::Device, composite_layout: &wgpu::BindGroupLayout, set: TargetSet) -> Self {
        Self {
            set,
            a: PassTarget::new(device, composite_layout, set.viewport, TargetSlot::A),
            b: PassTarget::new(device, composite_layout, set.viewport, TargetSlot::B),
        }
    }

    /// The generation and size these targets were created for.
    pub fn set(&self) -> TargetSet {
        self.set
    }

    /// Resolves a handle, rejecting handles of another generation.
    pub fn get(&self, handle: &TargetHandle) -> RenderResult<&PassTarget> {
        if handle.generation != self.set.generation || handle.viewport != self.set.viewport {
            return Err(RenderError::StaleTarget {
                expected: self.set.generation,
                actual: handle.generation,
            });
        }
        Ok(match handle.slot {
            TargetSlot::A => &self.a,
            TargetSlot::B => &self.b,
        })
    }

    /// Releases the GPU memory of both targets.
    pub fn destroy(&self) {
        for target in [&self.a, &self.b] {
            target.color_texture.destroy();
            target.depth_stencil_texture.destroy();
        }
    }
}
