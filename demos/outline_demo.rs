//! Selection outline demonstration.
//!
//! Hover a shape to outline it; drag to orbit, scroll to zoom.
//! The cube shows the gaps an offset silhouette opens at hard corners.
//! Grey boxes mark each shape's bounds.
//!
//! Run with: cargo run --example outline_demo

use std::sync::Arc;

use halo::*;

fn main() -> Result<()> {
    init_logging();

    let material = SurfaceMaterial::from_hex(0x4080ff);

    let knot = Arc::new(Geometry::from(TriangleMesh::torus_knot(
        60.0, 12.0, 96, 12, 2, 3,
    )));
    let sphere = Arc::new(Geometry::from(TriangleMesh::uv_sphere(60.0, 16, 16)));
    let cube = Arc::new(Geometry::from(TriangleMesh::cuboid(80.0)));

    let mut scene = vec![
        Renderable::new(RenderableId(1), knot).with_material(material),
        Renderable::new(RenderableId(2), sphere)
            .with_material(material)
            .at(Vec3::new(-200.0, 0.0, 0.0)),
        Renderable::new(RenderableId(3), cube)
            .with_material(material)
            .at(Vec3::new(200.0, 0.0, 0.0)),
    ];

    // Box helpers around each shape; they are drawn but never picked
    let helpers: Vec<Renderable> = scene
        .iter()
        .filter_map(|r| r.bounds_helper(RenderableId(r.id.0 + 100), hex_to_rgb(0x606060)))
        .collect();
    scene.extend(helpers);

    let camera = Camera::perspective(70.0, 16.0 / 9.0, 1.0, 1000.0)
        .with_position(Vec3::new(0.0, 0.0, 400.0));

    let options = PipelineOptions {
        outline_offset: 3.0,
        ..PipelineOptions::default()
    };
    run(scene, camera, options)
}
