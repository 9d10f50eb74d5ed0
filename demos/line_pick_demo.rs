//! Line picking demonstration.
//!
//! A stack of small diamond line strips; the one under the pointer is
//! drawn wider with an outline. Picking tolerance is set with
//! `line_precision` in the options file given as the first argument.
//!
//! Run with: cargo run --example line_pick_demo [options.json]

use std::sync::Arc;

use halo::*;

const COLORS: [u32; 3] = [0xff00ff, 0xffff00, 0x00ffff];

fn diamond(z: f32, size: f32) -> Polyline {
    Polyline::strip(vec![
        Vec3::new(-size, 0.0, z),
        Vec3::new(0.0, size, z),
        Vec3::new(size, 0.0, z),
        Vec3::new(0.0, -size, z),
        Vec3::new(-size, 0.0, z),
    ])
}

fn main() -> Result<()> {
    init_logging();

    let options = match std::env::args().nth(1) {
        Some(path) => PipelineOptions::from_json_file(path)?,
        None => PipelineOptions {
            clear_color: hex_to_rgb(0x090909),
            ..PipelineOptions::default()
        },
    };
    log::info!("line precision {}", options.line_precision);

    let scene: Vec<Renderable> = (0..36u8)
        .map(|i| {
            let z = -0.8 + 0.05 * f32::from(i + 1);
            let lines = Arc::new(Geometry::from(diamond(z, 0.05)));
            let color = COLORS[usize::from(i) % COLORS.len()];
            Renderable::new(RenderableId(u64::from(i)), lines)
                .with_material(SurfaceMaterial::flat(hex_to_rgb(color)))
                // Rotated so overlapping strips stay distinguishable
                .with_transform(Mat4::from_rotation_z(f32::from(i) * 0.17))
        })
        .collect();

    let camera = Camera::perspective(45.0, 16.0 / 9.0, 0.1, 1000.0)
        .with_position(Vec3::new(0.3, 0.2, 1.5))
        .looking_at(Vec3::new(0.0, 0.0, -0.4));

    run(scene, camera, options)
}
