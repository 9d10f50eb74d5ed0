//! Pipeline integration tests against the recording backend.
//!
//! These run the full per-frame algorithm (pick, select, rebuild the mask and
//! outline scenes, plan the passes) without a GPU.

use std::sync::Arc;

use halo::*;
use proptest::prelude::*;

const A: RenderableId = RenderableId(1);
const B: RenderableId = RenderableId(2);
const C: RenderableId = RenderableId(3);

fn pipeline(width: u32, height: u32) -> Pipeline<RecordingBackend> {
    Pipeline::new(
        RecordingBackend::new(),
        PipelineOptions::default(),
        Viewport::new(width, height).unwrap(),
    )
    .unwrap()
}

fn camera() -> Camera {
    Camera::perspective(60.0, 1.0, 0.1, 100.0).with_position(Vec3::new(0.0, 0.0, 10.0))
}

/// Three unit cubes along the x axis; only B is on the view axis.
fn three_cubes() -> Vec<Renderable> {
    let cube = Arc::new(Geometry::from(TriangleMesh::cuboid(1.0)));
    vec![
        Renderable::new(A, cube.clone()).at(Vec3::new(-4.0, 0.0, 0.0)),
        Renderable::new(B, cube.clone()).at(Vec3::ZERO),
        Renderable::new(C, cube).at(Vec3::new(4.0, 0.0, 0.0)),
    ]
}

fn mask_kind() -> PassKind {
    PassKind::Mask {
        inverse: PipelineOptions::default().mask_inverse,
    }
}

#[test]
fn no_hit_leaves_scenes_empty() {
    let mut pipeline = pipeline(320, 240);
    let mut camera = camera();
    let scene = three_cubes();

    pipeline.pointer_moved(Vec2::new(0.9, 0.9));
    for _ in 0..3 {
        let report = pipeline.advance_frame(&mut camera, &scene).unwrap();
        assert!(report.hit.is_none());
        assert_eq!(report.selection, None);
        assert!(pipeline.overlays().mask().is_empty());
        assert!(pipeline.overlays().outline().is_empty());
    }

    let frame = pipeline.backend().last_frame().unwrap();
    assert!(frame.draws(mask_kind()).is_empty());
    assert!(frame.draws(PassKind::Outline).is_empty());
}

#[test]
fn no_pointer_means_no_selection() {
    let mut pipeline = pipeline(320, 240);
    let mut camera = camera();
    let report = pipeline.advance_frame(&mut camera, &three_cubes()).unwrap();
    assert!(report.hit.is_none());
    assert_eq!(report.change, SelectionChange::Unchanged);
}

#[test]
fn pointer_over_middle_cube_selects_it() {
    let mut pipeline = pipeline(320, 240);
    let mut camera = camera();
    let scene = three_cubes();

    pipeline.pointer_moved(Vec2::ZERO);
    let report = pipeline.advance_frame(&mut camera, &scene).unwrap();

    let hit = report.hit.unwrap();
    assert_eq!(hit.id, B);
    assert!((hit.distance - 9.5).abs() < 1e-3);
    assert_eq!(report.selection, Some(B));
    assert_eq!(report.change, SelectionChange::Selected(B));

    let outline = pipeline.overlays().outline();
    assert_eq!(outline.len(), 1);
    let entry = outline.entry().unwrap();
    assert_eq!(entry.id, B);
    assert!(Arc::ptr_eq(&entry.geometry, &scene[1].geometry));
    assert_eq!(entry.transform, scene[1].transform);

    let frame = pipeline.backend().last_frame().unwrap();
    assert_eq!(frame.draws(PassKind::Scene), &[A, B, C]);
    assert_eq!(frame.draws(mask_kind()), &[B]);
    assert_eq!(frame.draws(PassKind::Outline), &[B]);
}

#[test]
fn moving_off_geometry_deselects_in_one_frame() {
    let mut pipeline = pipeline(320, 240);
    let mut camera = camera();
    let scene = three_cubes();

    pipeline.pointer_moved(Vec2::ZERO);
    pipeline.advance_frame(&mut camera, &scene).unwrap();
    assert_eq!(pipeline.selection().current(), Some(B));

    pipeline.pointer_moved(Vec2::new(-0.95, 0.95));
    let report = pipeline.advance_frame(&mut camera, &scene).unwrap();
    assert_eq!(report.change, SelectionChange::Deselected(B));
    assert_eq!(report.selection, None);
    assert!(pipeline.overlays().mask().is_empty());
    assert!(pipeline.overlays().outline().is_empty());
}

#[test]
fn switching_between_renderables() {
    let mut pipeline = pipeline(400, 400);
    let mut camera = camera();
    let scene = three_cubes();

    pipeline.pointer_moved(Vec2::ZERO);
    pipeline.advance_frame(&mut camera, &scene).unwrap();

    // Project C's center to find its pointer position
    let clip = camera.view_projection_matrix() * Vec3::new(4.0, 0.0, 0.0).extend(1.0);
    pipeline.pointer_moved(Vec2::new(clip.x / clip.w, clip.y / clip.w));
    let report = pipeline.advance_frame(&mut camera, &scene).unwrap();
    assert_eq!(report.change, SelectionChange::Switched { from: B, to: C });
    assert_eq!(pipeline.overlays().selected(), Some(C));
}

#[test]
fn removed_renderable_is_not_outlined() {
    let mut pipeline = pipeline(320, 240);
    let mut camera = camera();
    let mut scene = three_cubes();

    pipeline.pointer_moved(Vec2::ZERO);
    pipeline.advance_frame(&mut camera, &scene).unwrap();

    scene.remove(1);
    let report = pipeline.advance_frame(&mut camera, &scene).unwrap();
    assert_eq!(report.selection, None);
    assert!(pipeline.overlays().outline().is_empty());
    let frame = pipeline.backend().last_frame().unwrap();
    assert_eq!(frame.draws(PassKind::Scene), &[A, C]);
}

#[test]
fn frames_without_selection_match_the_plain_scene() {
    let scene = three_cubes();

    let mut outlined = pipeline(320, 240);
    outlined.pointer_moved(Vec2::new(0.9, -0.9));
    outlined.advance_frame(&mut camera(), &scene).unwrap();

    let mut plain = pipeline(320, 240);
    plain.set_pass_enabled(2, false).unwrap();
    plain.set_pass_enabled(1, false).unwrap();
    plain.advance_frame(&mut camera(), &scene).unwrap();

    let outlined = outlined.backend().last_frame().unwrap();
    let plain = plain.backend().last_frame().unwrap();
    assert_eq!(outlined.draws(PassKind::Scene), plain.draws(PassKind::Scene));
    assert!(outlined.draws(mask_kind()).is_empty());
    assert!(outlined.draws(PassKind::Outline).is_empty());
    assert_eq!(
        plain.kinds(),
        vec![PassKind::Scene, PassKind::ClearMask, PassKind::Composite]
    );

    // Both composite the target the scene was drawn into
    for frame in [outlined, plain] {
        let composite = frame.passes.last().unwrap().invocation;
        assert_eq!(composite.read.slot, frame.passes[0].invocation.read.slot);
        assert!(composite.to_screen);
    }
}

#[test]
fn required_passes_cannot_be_disabled() {
    let mut pipeline = pipeline(64, 64);
    assert!(pipeline.set_pass_enabled(0, false).is_err());
    assert!(pipeline.set_pass_enabled(3, false).is_err());
    assert!(pipeline.set_pass_enabled(4, false).is_err());
    assert!(pipeline.set_pass_enabled(9, true).is_err());
}

#[test]
fn mask_cannot_be_disabled_under_an_enabled_outline() {
    let mut pipeline = pipeline(320, 240);
    let mut camera = camera();
    let scene = three_cubes();

    assert!(matches!(
        pipeline.set_pass_enabled(1, false),
        Err(HaloError::InvalidPassOrder(_))
    ));

    // The rejected toggle leaves the five passes in place
    pipeline.pointer_moved(Vec2::ZERO);
    pipeline.advance_frame(&mut camera, &scene).unwrap();
    let frame = pipeline.backend().last_frame().unwrap();
    assert_eq!(
        frame.kinds(),
        vec![
            PassKind::Scene,
            mask_kind(),
            PassKind::Outline,
            PassKind::ClearMask,
            PassKind::Composite
        ]
    );
    assert_eq!(frame.draws(mask_kind()), &[B]);
}

#[test]
fn resize_never_references_old_targets() {
    let mut pipeline = pipeline(320, 240);
    let mut camera = camera();
    let scene = three_cubes();

    pipeline.pointer_moved(Vec2::ZERO);
    pipeline.advance_frame(&mut camera, &scene).unwrap();
    let old = pipeline.backend().last_frame().unwrap().targets;

    // Only the latest notification counts
    pipeline.resized(1024, 768);
    pipeline.resized(640, 360);
    let report = pipeline.advance_frame(&mut camera, &scene).unwrap();

    let expected = Viewport::new(640, 360).unwrap();
    assert_eq!(report.viewport, expected);
    assert_eq!(pipeline.viewport(), expected);
    assert!((camera.aspect_ratio - 640.0 / 360.0).abs() < 1e-6);

    let backend = pipeline.backend();
    assert_eq!(backend.target_sets().len(), 2);
    let live = backend.live_targets().unwrap();
    assert_eq!(live.viewport, expected);
    assert!(live.generation > old.generation);

    let frame = backend.last_frame().unwrap();
    for pass in &frame.passes {
        for handle in [pass.invocation.read, pass.invocation.write] {
            assert_eq!(handle.viewport, expected);
            assert_eq!(handle.generation, live.generation);
        }
    }
    // The resized frame still picks
    assert_eq!(report.selection, Some(B));
}

#[test]
fn line_pick_tolerance() {
    let mut pipeline = pipeline(256, 256);
    let mut camera = camera();

    let vertical = |x: f32| {
        Geometry::from(Polyline::strip(vec![
            Vec3::new(x, -1.0, 0.0),
            Vec3::new(x, 1.0, 0.0),
        ]))
    };
    let near = vec![Renderable::new(A, vertical(0.004))];
    let far = vec![Renderable::new(A, vertical(0.01))];

    pipeline.pointer_moved(Vec2::ZERO);
    let report = pipeline.advance_frame(&mut camera, &near).unwrap();
    let hit = report.hit.unwrap();
    assert_eq!(hit.id, A);
    assert_eq!(hit.element, HitElement::Segment(0));

    let report = pipeline.advance_frame(&mut camera, &far).unwrap();
    assert!(report.hit.is_none());
    assert_eq!(report.change, SelectionChange::Deselected(A));
}

#[test]
fn options_from_json_drive_the_graph() {
    let options = PipelineOptions::from_json_str(r#"{ "mask_inverse": false }"#).unwrap();
    assert!(!options.mask_inverse);
    let mut pipeline = Pipeline::new(
        RecordingBackend::new(),
        options,
        Viewport::new(32, 32).unwrap(),
    )
    .unwrap();
    pipeline.advance_frame(&mut camera(), &[]).unwrap();
    let kinds = pipeline.backend().last_frame().unwrap().kinds();
    assert_eq!(kinds[1], PassKind::Mask { inverse: false });
}

#[test]
fn empty_scene_is_not_an_error() {
    let mut pipeline = pipeline(32, 32);
    pipeline.pointer_moved(Vec2::ZERO);
    let report = pipeline.advance_frame(&mut camera(), &[]).unwrap();
    assert!(report.hit.is_none());
    assert_eq!(pipeline.backend().frames().len(), 1);
}

proptest! {
    #[test]
    fn at_most_one_outlined_renderable(
        pointers in proptest::collection::vec((-1.0f32..1.0, -1.0f32..1.0), 1..12)
    ) {
        let mut pipeline = pipeline(200, 200);
        let mut camera = camera();
        let scene = three_cubes();

        for (x, y) in pointers {
            pipeline.pointer_moved(Vec2::new(x, y));
            let report = pipeline.advance_frame(&mut camera, &scene).unwrap();
            let overlays = pipeline.overlays();
            prop_assert!(overlays.mask().len() <= 1);
            prop_assert!(overlays.outline().len() <= 1);
            prop_assert_eq!(overlays.selected(), report.selection);
            prop_assert_eq!(report.selection, report.hit.map(|h| h.id));
            if let Some(id) = report.selection {
                prop_assert_eq!(overlays.mask().entry().map(|e| e.id), Some(id));
            }
        }
    }
}
