//! GPU copies of renderable geometry.
//!
//! Buffers are uploaded once per geometry and kept while the renderable
//! stays in the scene. A renderable whose `Arc<Geometry>` changes is
//! re-uploaded; one that disappears is dropped at the next sync.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Mat4;
use halo_core::{FrameContext, Geometry, Polyline, Renderable, RenderableId, TriangleMesh};
use wgpu::util::DeviceExt;

/// Per-renderable uniforms of the scene pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// x = lit, y = line width in pixels.
    pub params: [f32; 4],
}

impl ObjectUniforms {
    /// Uniforms for drawing `renderable` with lines `line_width` pixels wide.
    #[must_use]
    pub fn new(renderable: &Renderable, line_width: f32) -> Self {
        let model = renderable.transform;
        let normal_matrix = if model.determinant().abs() > 1e-12 {
            model.inverse().transpose()
        } else {
            Mat4::IDENTITY
        };
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
            color: renderable.material.color.extend(1.0).to_array(),
            params: [
                if renderable.material.lit { 1.0 } else { 0.0 },
                line_width,
                0.0,
                0.0,
            ],
        }
    }
}

/// Interleaved position + normal vertices.
#[must_use]
pub fn mesh_vertex_data(mesh: &TriangleMesh) -> Vec<[f32; 6]> {
    mesh.positions()
        .iter()
        .zip(mesh.normals())
        .map(|(p, n)| [p.x, p.y, p.z, n.x, n.y, n.z])
        .collect()
}

/// One `start, end` instance per segment.
#[must_use]
pub fn segment_instance_data(lines: &Polyline) -> Vec<[f32; 6]> {
    lines
        .iter_segments()
        .map(|(_, a, b)| [a.x, a.y, a.z, b.x, b.y, b.z])
        .collect()
}

/// Vertex buffers of one geometry.
pub(crate) enum GpuShape {
    Mesh {
        vertex_buffer: wgpu::Buffer,
        index_buffer: wgpu::Buffer,
        index_count: u32,
    },
    Lines {
        instance_buffer: wgpu::Buffer,
        segment_count: u32,
    },
}

impl GpuShape {
    fn upload(device: &wgpu::Device, id: RenderableId, geometry: &Geometry) -> Option<Self> {
        if geometry.is_empty() {
            return None;
        }
        let shape = match geometry {
            Geometry::Mesh(mesh) => {
                let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("mesh vertices {id}")),
                    contents: bytemuck::cast_slice(&mesh_vertex_data(mesh)),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("mesh indices {id}")),
                    contents: bytemuck::cast_slice(mesh.triangles()),
                    usage: wgpu::BufferUsages::INDEX,
                });
                GpuShape::Mesh {
                    vertex_buffer,
                    index_buffer,
                    index_count: (mesh.triangles().len() * 3) as u32,
                }
            }
            Geometry::Lines(lines) => {
                let data = segment_instance_data(lines);
                let instance_buffer =
                    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("line segments {id}")),
                        contents: bytemuck::cast_slice(&data),
                        usage: wgpu::BufferUsages::VERTEX,
                    });
                GpuShape::Lines {
                    instance_buffer,
                    segment_count: data.len() as u32,
                }
            }
        };
        Some(shape)
    }

    /// Issues the draw call; the pipeline and bind groups must already be set.
    pub(crate) fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        match self {
            GpuShape::Mesh {
                vertex_buffer,
                index_buffer,
                index_count,
            } => {
                render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                render_pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..*index_count, 0, 0..1);
            }
            GpuShape::Lines {
                instance_buffer,
                segment_count,
            } => {
                render_pass.set_vertex_buffer(0, instance_buffer.slice(..));
                render_pass.draw(0..6, 0..*segment_count);
            }
        }
    }

    pub(crate) fn is_lines(&self) -> bool {
        matches!(self, GpuShape::Lines { .. })
    }
}

/// GPU state of one renderable.
pub(crate) struct GpuRenderable {
    source: Arc<Geometry>,
    pub(crate) shape: GpuShape,
    uniform_buffer: wgpu::Buffer,
    pub(crate) bind_group: wgpu::BindGroup,
}

/// Geometry buffers and scene uniforms keyed by renderable identity.
#[derive(Default)]
pub struct GeometryCache {
    entries: HashMap<RenderableId, GpuRenderable>,
}

impl GeometryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of renderables with GPU buffers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn get(&self, id: RenderableId) -> Option<&GpuRenderable> {
        self.entries.get(&id)
    }

    /// Brings the cache in line with this frame's renderables and writes
    /// their scene uniforms.
    pub(crate) fn sync(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        object_layout: &wgpu::BindGroupLayout,
        frame: &FrameContext<'_>,
    ) {
        self.entries
            .retain(|id, _| frame.renderables.iter().any(|r| r.id == *id));

        for renderable in frame.renderables {
            let stale = self
                .entries
                .get(&renderable.id)
                .is_some_and(|e| !Arc::ptr_eq(&e.source, &renderable.geometry));
            if stale {
                self.entries.remove(&renderable.id);
            }

            if !self.entries.contains_key(&renderable.id) {
                let Some(shape) = GpuShape::upload(device, renderable.id, &renderable.geometry)
                else {
                    continue;
                };
                let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("object uniforms {}", renderable.id)),
                    size: std::mem::size_of::<ObjectUniforms>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("object bind group"),
                    layout: object_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    }],
                });
                log::debug!("uploaded geometry for renderable {}", renderable.id);
                self.entries.insert(
                    renderable.id,
                    GpuRenderable {
                        source: Arc::clone(&renderable.geometry),
                        shape,
                        uniform_buffer,
                        bind_group,
                    },
                );
            }

            if let Some(entry) = self.entries.get(&renderable.id) {
                let uniforms = ObjectUniforms::new(renderable, frame.line_width(renderable.id));
                queue.write_buffer(&entry.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use halo_core::SurfaceMaterial;

    #[test]
    fn test_object_uniforms_layout() {
        assert_eq!(std::mem::size_of::<ObjectUniforms>(), 160);
    }

    #[test]
    fn test_object_uniforms_values() {
        let renderable = Renderable::new(
            RenderableId(1),
            Geometry::from(Polyline::strip(vec![Vec3::ZERO, Vec3::X])),
        )
        .at(Vec3::new(1.0, 2.0, 3.0))
        .with_material(SurfaceMaterial::flat(Vec3::new(1.0, 0.0, 1.0)));
        let uniforms = ObjectUniforms::new(&renderable, 12.0);
        assert_eq!(uniforms.model[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(uniforms.color, [1.0, 0.0, 1.0, 1.0]);
        assert_eq!(uniforms.params[0], 0.0);
        assert_eq!(uniforms.params[1], 12.0);
    }

    #[test]
    fn test_mesh_vertex_data_interleaves_normals() {
        let mesh = TriangleMesh::cuboid(2.0);
        let data = mesh_vertex_data(&mesh);
        assert_eq!(data.len(), 24);
        let p = mesh.positions()[0];
        let n = mesh.normals()[0];
        assert_eq!(data[0], [p.x, p.y, p.z, n.x, n.y, n.z]);
    }

    #[test]
    fn test_segment_instances_follow_mode() {
        let points = vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z];
        assert_eq!(segment_instance_data(&Polyline::strip(points.clone())).len(), 3);
        let pairs = segment_instance_data(&Polyline::segments(points));
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1], [0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    }
}
