use glam::Vec2;
use winit::{
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::WindowId,
};

use super::{App, ApplicationHandler};

/// Radians of orbit per pixel of drag.
const ORBIT_SPEED: f32 = 0.01;

/// Converts a pointer position in pixels (origin top-left) to normalized
/// device coordinates in `[-1, 1]²` with +y up.
///
/// Returns `None` for a zero-sized viewport.
pub fn normalize_pointer(x: f64, y: f64, width: u32, height: u32) -> Option<Vec2> {
    if width == 0 || height == 0 {
        return None;
    }
    let ndc_x = x / f64::from(width) * 2.0 - 1.0;
    let ndc_y = -(y / f64::from(height)) * 2.0 + 1.0;
    Some(Vec2::new(ndc_x as f32, ndc_y as f32))
}

/// Mouse state for camera control.
#[derive(Debug, Default)]
pub(super) struct PointerState {
    /// Last cursor position in physical pixels.
    pub(super) position: Option<(f64, f64)>,
    pub(super) left_down: bool,
}

impl PointerState {
    /// Records a new position and returns the movement since the last one.
    fn moved_to(&mut self, x: f64, y: f64) -> Option<(f64, f64)> {
        let delta = self.position.map(|(px, py)| (x - px, y - py));
        self.position = Some((x, y));
        delta
    }
}

/// Zoom amount for a wheel event.
fn wheel_zoom(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y * 0.5,
        MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.01,
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(error) = self.create_window(event_loop) {
            self.fail(event_loop, error);
            return;
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    self.close_requested = true;
                    event_loop.exit();
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(pipeline) = &mut self.pipeline {
                    pipeline.resized(size.width, size.height);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let delta = self.pointer.moved_to(position.x, position.y);
                if self.pointer.left_down {
                    if let Some((dx, dy)) = delta {
                        self.camera
                            .orbit(dx as f32 * ORBIT_SPEED, dy as f32 * ORBIT_SPEED);
                    }
                }

                let ndc = self.window_size().and_then(|(width, height)| {
                    normalize_pointer(position.x, position.y, width, height)
                });
                if let (Some(pipeline), Some(ndc)) = (&mut self.pipeline, ndc) {
                    pipeline.pointer_moved(ndc);
                }
            }
            WindowEvent::CursorLeft { .. } => {
                self.pointer.position = None;
                if let Some(pipeline) = &mut self.pipeline {
                    pipeline.pointer_left();
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.pointer.left_down = state == ElementState::Pressed;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.camera.zoom(wheel_zoom(delta));
            }
            WindowEvent::RedrawRequested => {
                if self.close_requested {
                    return;
                }
                if let Err(error) = self.redraw() {
                    self.fail(event_loop, error);
                    return;
                }
                // The next frame is scheduled only once this one is submitted
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_pointer_corners() {
        assert_eq!(normalize_pointer(0.0, 0.0, 800, 600), Some(Vec2::new(-1.0, 1.0)));
        assert_eq!(normalize_pointer(800.0, 600.0, 800, 600), Some(Vec2::new(1.0, -1.0)));
        assert_eq!(normalize_pointer(400.0, 300.0, 800, 600), Some(Vec2::ZERO));
    }

    #[test]
    fn test_normalize_pointer_zero_viewport() {
        assert_eq!(normalize_pointer(10.0, 10.0, 0, 600), None);
        assert_eq!(normalize_pointer(10.0, 10.0, 800, 0), None);
    }

    #[test]
    fn test_pointer_state_delta() {
        let mut state = PointerState::default();
        assert_eq!(state.moved_to(10.0, 20.0), None);
        assert_eq!(state.moved_to(15.0, 18.0), Some((5.0, -2.0)));
    }

    #[test]
    fn test_wheel_zoom_direction() {
        assert!(wheel_zoom(MouseScrollDelta::LineDelta(0.0, 1.0)) > 0.0);
        assert!(wheel_zoom(MouseScrollDelta::LineDelta(0.0, -2.0)) < 0.0);
    }
}
