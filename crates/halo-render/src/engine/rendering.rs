//! Frame execution: encodes the planned passes into one command buffer.

use halo_core::{
    outline_line_width, Emphasis, FrameContext, MaskMaterial, OverlayEntry, PassKind, RenderBackend,
    TargetSet,
};

use super::capture::CaptureTarget;
use super::pipelines::OUTLINE_STENCIL_REF;
use super::targets::{PassTarget, TargetPair};
use super::{OverlayDraw, RenderEngine};
use crate::error::{RenderError, RenderResult};

/// Where the composite pass writes.
enum CompositeOutput<'a> {
    Surface(&'a wgpu::TextureView),
    Offscreen(&'a wgpu::TextureView),
}

impl RenderEngine {
    /// Releases the current pass targets and creates the targets of `set`.
    ///
    /// Sizes beyond the device limit are refused before anything is released.
    pub fn recreate_pass_targets(&mut self, set: &TargetSet) -> RenderResult<()> {
        let max = self.max_texture_dimension();
        if set.viewport.width > max || set.viewport.height > max {
            return Err(RenderError::TargetTooLarge {
                width: set.viewport.width,
                height: set.viewport.height,
                max,
            });
        }

        self.resize_surface(set.viewport.width, set.viewport.height);

        if let Some(old) = self.targets.take() {
            old.destroy();
        }
        self.targets = Some(TargetPair::new(
            &self.device,
            &self.pipelines.composite_layout,
            *set,
        ));

        if self.capture_requested {
            if let Some(old) = self.capture.take() {
                old.texture.destroy();
            }
            self.capture = Some(CaptureTarget::new(&self.device, set.viewport));
        }

        log::info!(
            "pass targets recreated: {}x{}, generation {}",
            set.viewport.width,
            set.viewport.height,
            set.generation
        );
        Ok(())
    }

    /// Renders one frame of the plan carried by `frame`.
    pub fn render_frame(&mut self, frame: &FrameContext<'_>) -> RenderResult<()> {
        let Some(pair) = self.targets.as_ref() else {
            return Err(RenderError::TargetsMissing);
        };
        for pass in &frame.plan.passes {
            pair.get(&pass.read)?;
            pair.get(&pass.write)?;
        }

        self.update_camera_uniforms(frame.camera);
        self.geometry.sync(
            &self.device,
            &self.queue,
            &self.pipelines.object_layout,
            frame,
        );
        self.write_overlay_uniforms(frame);

        let surface_texture = match &self.surface {
            Some(surface) => match surface.get_current_texture() {
                Ok(texture) => Some(texture),
                Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                    log::warn!("surface outdated, skipping frame {}", frame.frame);
                    surface.configure(&self.device, &self.surface_config);
                    return Ok(());
                }
                Err(wgpu::SurfaceError::Timeout) => {
                    log::warn!("surface timeout, skipping frame {}", frame.frame);
                    return Ok(());
                }
                Err(wgpu::SurfaceError::OutOfMemory) => return Err(RenderError::OutOfMemory),
                Err(err) => {
                    log::warn!("surface error {err}, skipping frame {}", frame.frame);
                    return Ok(());
                }
            },
            None => None,
        };
        let surface_view = surface_texture
            .as_ref()
            .map(|t| t.texture.create_view(&wgpu::TextureViewDescriptor::default()));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });

        let Some(pair) = self.targets.as_ref() else {
            return Err(RenderError::TargetsMissing);
        };
        let mut captured = false;
        for pass in &frame.plan.passes {
            let read = pair.get(&pass.read)?;
            let write = pair.get(&pass.write)?;
            match pass.kind {
                PassKind::Scene => self.encode_scene(&mut encoder, read, frame, pass.clear),
                PassKind::Mask { inverse } => {
                    // Inverted: clear to the tested value, write the other one.
                    let (clear_value, write_value) = if inverse {
                        (OUTLINE_STENCIL_REF, 0)
                    } else {
                        (0, OUTLINE_STENCIL_REF)
                    };
                    self.encode_mask(&mut encoder, read, frame, clear_value, write_value, true);
                    self.encode_mask(&mut encoder, write, frame, clear_value, write_value, false);
                }
                PassKind::Outline => self.encode_outline(&mut encoder, read, frame),
                PassKind::ClearMask => {
                    Self::encode_stencil_clear(&mut encoder, read);
                    Self::encode_stencil_clear(&mut encoder, write);
                }
                PassKind::Composite => {
                    if pass.to_screen {
                        if let Some(view) = surface_view.as_ref() {
                            self.encode_composite(&mut encoder, read, CompositeOutput::Surface(view));
                        }
                        if self.capture_requested {
                            if let Some(capture) = self.capture.as_ref() {
                                self.encode_composite(
                                    &mut encoder,
                                    read,
                                    CompositeOutput::Offscreen(&capture.view),
                                );
                                captured = true;
                            }
                        }
                    } else {
                        self.encode_composite(
                            &mut encoder,
                            read,
                            CompositeOutput::Offscreen(&write.color_view),
                        );
                    }
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        if let Some(texture) = surface_texture {
            texture.present();
        }
        if captured {
            if let Some(capture) = self.capture.as_mut() {
                capture.written = true;
            }
        }
        Ok(())
    }

    fn write_overlay_uniforms(&self, frame: &FrameContext<'_>) {
        let highlighted = frame.line_widths.width(Emphasis::Highlighted);
        if let Some(entry) = frame.overlays.mask().entry() {
            let mut uniforms = MaskMaterial.uniforms(entry.transform);
            uniforms.line_width = highlighted;
            self.queue
                .write_buffer(&self.mask_draw.buffer, 0, bytemuck::cast_slice(&[uniforms]));
        }
        if let Some(entry) = frame.overlays.outline().entry() {
            let mut uniforms = frame.outline.uniforms(entry.transform);
            uniforms.line_width = outline_line_width(highlighted, frame.outline.offset());
            self.queue
                .write_buffer(&self.outline_draw.buffer, 0, bytemuck::cast_slice(&[uniforms]));
        }
    }

    fn encode_scene(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &PassTarget,
        frame: &FrameContext<'_>,
        clear: bool,
    ) {
        let c = frame.clear_color;
        let (color_load, depth_load, stencil_load) = if clear {
            (
                wgpu::LoadOp::Clear(wgpu::Color {
                    r: f64::from(c.x),
                    g: f64::from(c.y),
                    b: f64::from(c.z),
                    a: 1.0,
                }),
                wgpu::LoadOp::Clear(1.0),
                wgpu::LoadOp::Clear(0),
            )
        } else {
            (wgpu::LoadOp::Load, wgpu::LoadOp::Load, wgpu::LoadOp::Load)
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &target.depth_stencil_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: stencil_load,
                    store: wgpu::StoreOp::Store,
                }),
            }),
            ..Default::default()
        });

        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
        for renderable in frame.renderables {
            let Some(gpu) = self.geometry.get(renderable.id) else {
                continue;
            };
            let pipeline = if gpu.shape.is_lines() {
                &self.pipelines.scene_lines
            } else {
                &self.pipelines.scene_mesh
            };
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(1, &gpu.bind_group, &[]);
            gpu.shape.draw(&mut render_pass);
        }
    }

    /// Writes the stencil of `target`. Only the target holding the scene
    /// keeps its depth, so the mask there respects occlusion.
    fn encode_mask(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &PassTarget,
        frame: &FrameContext<'_>,
        clear_value: u32,
        write_value: u32,
        keep_depth: bool,
    ) {
        let depth_load = if keep_depth {
            wgpu::LoadOp::Load
        } else {
            wgpu::LoadOp::Clear(1.0)
        };
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("mask pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &target.depth_stencil_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_value),
                    store: wgpu::StoreOp::Store,
                }),
            }),
            ..Default::default()
        });

        if let Some(entry) = frame.overlays.mask().entry() {
            render_pass.set_stencil_reference(write_value);
            self.draw_overlay(
                &mut render_pass,
                entry,
                &self.mask_draw,
                (&self.pipelines.mask_mesh, &self.pipelines.mask_lines),
            );
        }
    }

    fn encode_outline(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &PassTarget,
        frame: &FrameContext<'_>,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("outline pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &target.depth_stencil_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
            }),
            ..Default::default()
        });

        if let Some(entry) = frame.overlays.outline().entry() {
            render_pass.set_stencil_reference(OUTLINE_STENCIL_REF);
            self.draw_overlay(
                &mut render_pass,
                entry,
                &self.outline_draw,
                (&self.pipelines.outline_mesh, &self.pipelines.outline_lines),
            );
        }
    }

    fn draw_overlay(
        &self,
        render_pass: &mut wgpu::RenderPass<'_>,
        entry: &OverlayEntry,
        draw: &OverlayDraw,
        (mesh_pipeline, lines_pipeline): (&wgpu::RenderPipeline, &wgpu::RenderPipeline),
    ) {
        let Some(gpu) = self.geometry.get(entry.id) else {
            log::warn!("no GPU geometry for overlay of renderable {}", entry.id);
            return;
        };
        let pipeline = if gpu.shape.is_lines() {
            lines_pipeline
        } else {
            mesh_pipeline
        };
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
        render_pass.set_bind_group(1, &draw.bind_group, &[]);
        gpu.shape.draw(render_pass);
    }

    fn encode_stencil_clear(encoder: &mut wgpu::CommandEncoder, target: &PassTarget) {
        let _render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear mask pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &target.depth_stencil_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0),
                    store: wgpu::StoreOp::Store,
                }),
            }),
            ..Default::default()
        });
    }

    fn encode_composite(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        source: &PassTarget,
        output: CompositeOutput<'_>,
    ) {
        let (view, pipeline) = match output {
            CompositeOutput::Surface(view) => (view, &self.pipelines.composite_surface),
            CompositeOutput::Offscreen(view) => (view, &self.pipelines.composite_offscreen),
        };
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("composite pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });

        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &source.composite_bind_group, &[]);
        render_pass.draw(0..3, 0..1); // Fullscreen triangle
    }
}

impl RenderBackend for RenderEngine {
    fn recreate_targets(&mut self, targets: &TargetSet) -> halo_core::Result<()> {
        self.recreate_pass_targets(targets).map_err(Into::into)
    }

    fn max_target_dimension(&self) -> u32 {
        self.max_texture_dimension()
    }

    fn execute(&mut self, frame: &FrameContext<'_>) -> halo_core::Result<()> {
        self.render_frame(frame).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use halo_core::{
        Camera, LineWidths, OutlineMaterial, OverlayScenes, PassGraph, Selection, TargetSlot,
        Viewport,
    };
    use pollster::FutureExt;

    use super::*;

    fn engine(width: u32, height: u32) -> Option<RenderEngine> {
        match RenderEngine::new_headless(width, height).block_on() {
            Ok(engine) => Some(engine),
            Err(e) => {
                eprintln!("Skipping GPU test: {e}");
                None
            }
        }
    }

    #[test]
    fn test_render_without_targets_fails() {
        let Some(mut engine) = engine(16, 16) else {
            return;
        };
        let graph = PassGraph::outline(Viewport::new(16, 16).unwrap(), true);
        let plan = graph.plan();
        let camera = Camera::default();
        let overlays = OverlayScenes::new();
        let outline = OutlineMaterial::default();
        let frame = FrameContext {
            frame: 1,
            camera: &camera,
            renderables: &[],
            overlays: &overlays,
            outline: &outline,
            line_widths: LineWidths::default(),
            selection: Selection::new(),
            clear_color: glam::Vec3::ZERO,
            plan: &plan,
        };
        assert!(matches!(
            engine.render_frame(&frame),
            Err(RenderError::TargetsMissing)
        ));
    }

    #[test]
    fn test_recreated_targets_reject_old_handles() {
        let Some(mut engine) = engine(16, 16) else {
            return;
        };
        let mut graph = PassGraph::outline(Viewport::new(16, 16).unwrap(), true);
        engine.recreate_pass_targets(&graph.targets()).unwrap();
        let old = graph.targets().handle(TargetSlot::A);

        assert!(graph.resize(Viewport::new(32, 8).unwrap()));
        engine.recreate_pass_targets(&graph.targets()).unwrap();
        assert_eq!(engine.viewport(), Viewport::new(32, 8).unwrap());

        let targets = engine.targets.as_ref().unwrap();
        assert!(matches!(
            targets.get(&old),
            Err(RenderError::StaleTarget {
                expected: 1,
                actual: 0
            })
        ));
        assert!(targets.get(&graph.targets().handle(TargetSlot::B)).is_ok());
        assert_eq!(engine.capture.as_ref().unwrap().viewport, engine.viewport());
    }

    #[test]
    fn test_oversized_targets_rejected() {
        let Some(mut engine) = engine(16, 16) else {
            return;
        };
        let mut graph = PassGraph::outline(Viewport::new(16, 16).unwrap(), true);
        engine.recreate_pass_targets(&graph.targets()).unwrap();

        let max = engine.max_target_dimension();
        assert!(graph.resize(Viewport::new(max + 1, 16).unwrap()));
        assert!(matches!(
            engine.recreate_pass_targets(&graph.targets()),
            Err(RenderError::TargetTooLarge { width, .. }) if width == max + 1
        ));
        // The previous targets are still in place
        assert_eq!(engine.viewport(), Viewport::new(16, 16).unwrap());
        assert!(engine.targets.is_some());
    }
}
