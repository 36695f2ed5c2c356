//! Camera and controller for first-person navigation
//!
//! The camera is described by position, target and up vector like a classic
//! look-at camera. Both rendering techniques derive their view from it: the
//! rasterizer through [`Camera::clip_from_world`], the ray marcher through
//! [`Camera::scaled_dir`].

use glam::{Mat4, Vec3};
use winit::event::ElementState;
use winit::keyboard::KeyCode;

use crate::depth::{self, DepthRange};

/// Narrowest vertical field of view in degrees.
pub const MIN_FOVY: f32 = 1.0;
/// Widest vertical field of view in degrees.
pub const MAX_FOVY: f32 = 179.0;
const DEFAULT_FOVY: f32 = 45.0;

/// Clamps `fovy` to `MIN_FOVY..=MAX_FOVY`; NaN becomes 45 degrees.
///
/// At 0 or 180 degrees the camera distance is infinite or zero and every ray
/// direction degenerates.
pub fn clamp_fovy(fovy: f32) -> f32 {
    if fovy.is_nan() {
        DEFAULT_FOVY
    } else {
        fovy.clamp(MIN_FOVY, MAX_FOVY)
    }
}

/// Projection kinds supported by the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    Perspective,
}

/// Perspective look-at camera
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,
    /// Point the camera is looking at
    pub target: Vec3,
    /// Up vector
    pub up: Vec3,
    /// Near clipping plane distance
    pub znear: f32,
    /// Far clipping plane distance
    pub zfar: f32,
    pub projection: Projection,
    /// Vertical field of view in degrees
    fovy: f32,
    cam_dist: f32,
}

impl Camera {
    /// `fovy` is clamped with [`clamp_fovy`].
    pub fn new(position: Vec3, target: Vec3, up: Vec3, fovy: f32) -> Self {
        let fovy = clamp_fovy(fovy);
        Self {
            position,
            target,
            up,
            znear: 0.1,
            zfar: 100.0,
            projection: Projection::Perspective,
            fovy,
            cam_dist: depth::camera_distance(fovy),
        }
    }

    /// Camera framing the demo scene.
    pub fn demo() -> Self {
        Self::new(Vec3::new(0.5, 1.0, 1.5), Vec3::new(0.0, 0.5, 0.0), Vec3::Y, DEFAULT_FOVY)
    }

    pub fn fovy(&self) -> f32 {
        self.fovy
    }

    /// Changes the field of view and recomputes the cached camera distance.
    /// Out-of-range values are clamped with [`clamp_fovy`].
    pub fn set_fovy(&mut self, fovy: f32) {
        self.fovy = clamp_fovy(fovy);
        self.cam_dist = depth::camera_distance(self.fovy);
    }

    /// `1 / tan(fovy / 2)`, see [`depth::camera_distance`].
    pub fn cam_dist(&self) -> f32 {
        self.cam_dist
    }

    /// Unit vector from the position towards the target.
    pub fn view_dir(&self) -> Vec3 {
        (self.target - self.position).normalize()
    }

    /// View direction scaled by [`Camera::cam_dist`].
    ///
    /// The length of this vector encodes the field of view for the ray
    /// marcher: a wider field of view gives a shorter vector.
    pub fn scaled_dir(&self) -> Vec3 {
        self.view_dir() * self.cam_dist
    }

    pub fn depth_range(&self) -> DepthRange {
        DepthRange {
            near: self.znear,
            far: self.zfar,
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        match self.projection {
            Projection::Perspective => {
                Mat4::perspective_rh(self.fovy.to_radians(), aspect, self.znear, self.zfar)
            }
        }
    }

    /// Clip transform used by the raster pass, including the row flip of the
    /// render target.
    pub fn clip_from_world(&self, aspect: f32) -> Mat4 {
        depth::FLIP_Y * self.projection_matrix(aspect) * self.view_matrix()
    }
}

/// First person camera controller for handling input
pub struct CameraController {
    /// Movement speed in units per second
    speed: f32,
    /// Mouse look sensitivity
    sensitivity: f32,
    pub is_forward_pressed: bool,
    pub is_backward_pressed: bool,
    pub is_left_pressed: bool,
    pub is_right_pressed: bool,
    pub is_up_pressed: bool,
    pub is_down_pressed: bool,
    pending_yaw: f32,
    pending_pitch: f32,
}

impl CameraController {
    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self {
            speed,
            sensitivity,
            is_forward_pressed: false,
            is_backward_pressed: false,
            is_left_pressed: false,
            is_right_pressed: false,
            is_up_pressed: false,
            is_down_pressed: false,
            pending_yaw: 0.0,
            pending_pitch: 0.0,
        }
    }

    /// Records key state. Returns `true` when the key is a movement key.
    pub fn process_keyboard(&mut self, keycode: KeyCode, state: ElementState) -> bool {
        let is_pressed = state == ElementState::Pressed;
        match keycode {
            KeyCode::KeyW | KeyCode::ArrowUp => self.is_forward_pressed = is_pressed,
            KeyCode::KeyA | KeyCode::ArrowLeft => self.is_left_pressed = is_pressed,
            KeyCode::KeyS | KeyCode::ArrowDown => self.is_backward_pressed = is_pressed,
            KeyCode::KeyD | KeyCode::ArrowRight => self.is_right_pressed = is_pressed,
            KeyCode::Space => self.is_up_pressed = is_pressed,
            KeyCode::ShiftLeft => self.is_down_pressed = is_pressed,
            _ => return false,
        }
        true
    }

    /// Accumulates raw mouse motion until the next update.
    pub fn process_mouse(&mut self, delta_x: f64, delta_y: f64) {
        self.pending_yaw -= delta_x as f32 * self.sensitivity * 0.003;
        self.pending_pitch -= delta_y as f32 * self.sensitivity * 0.003;
    }

    /// Moves and turns the camera. Position and target move together so the
    /// look distance is preserved.
    pub fn update_camera(&mut self, camera: &mut Camera, dt: f32) {
        let offset = camera.target - camera.position;
        let distance = offset.length().max(1e-3);
        let mut forward = offset / distance;

        if self.pending_yaw != 0.0 || self.pending_pitch != 0.0 {
            let up = camera.up.normalize();
            let right = forward.cross(up).normalize();
            let pitch = forward.dot(up).clamp(-1.0, 1.0).asin();
            let new_pitch = (pitch + self.pending_pitch).clamp(-1.5, 1.5);
            let yawed = glam::Quat::from_axis_angle(up, self.pending_yaw) * forward;
            let turned = glam::Quat::from_axis_angle(
                glam::Quat::from_axis_angle(up, self.pending_yaw) * right,
                new_pitch - pitch,
            ) * yawed;
            forward = turned.normalize();
            self.pending_yaw = 0.0;
            self.pending_pitch = 0.0;
        }

        let flat_forward = (forward - camera.up * forward.dot(camera.up)).normalize_or_zero();
        let right = forward.cross(camera.up).normalize_or_zero();

        let mut velocity = Vec3::ZERO;
        if self.is_forward_pressed {
            velocity += flat_forward;
        }
        if self.is_backward_pressed {
            velocity -= flat_forward;
        }
        if self.is_right_pressed {
            velocity += right;
        }
        if self.is_left_pressed {
            velocity -= right;
        }
        // Normalize to prevent faster diagonal movement
        if velocity.length_squared() > 0.0 {
            camera.position += velocity.normalize() * self.speed * dt;
        }

        // Vertical movement (global axis)
        if self.is_up_pressed {
            camera.position += camera.up * self.speed * dt;
        }
        if self.is_down_pressed {
            camera.position -= camera.up * self.speed * dt;
        }

        camera.target = camera.position + forward * distance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_key_moves_towards_target() {
        let mut camera = Camera::new(Vec3::new(0.0, 1.0, 5.0), Vec3::new(0.0, 1.0, 0.0), Vec3::Y, 45.0);
        let mut controller = CameraController::new(2.0, 1.0);
        assert!(controller.process_keyboard(KeyCode::KeyW, ElementState::Pressed));
        controller.update_camera(&mut camera, 0.5);
        assert!((camera.position - Vec3::new(0.0, 1.0, 4.0)).length() < 1e-5);
        assert!((camera.target - Vec3::new(0.0, 1.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn mouse_look_keeps_look_distance_and_clamps_pitch() {
        let mut camera = Camera::demo();
        let distance = (camera.target - camera.position).length();
        let mut controller = CameraController::new(2.0, 1.0);
        controller.process_mouse(120.0, -10_000.0);
        controller.update_camera(&mut camera, 0.016);
        assert!(((camera.target - camera.position).length() - distance).abs() < 1e-4);
        assert!(camera.view_dir().dot(Vec3::Y) < 1.5f32.sin() + 1e-4);
    }

    #[test]
    fn degenerate_fov_is_clamped() {
        let mut camera = Camera::demo();
        let cases = [
            (0.0, MIN_FOVY),
            (-30.0, MIN_FOVY),
            (180.0, MAX_FOVY),
            (f32::NAN, 45.0),
        ];
        for (fovy, expected) in cases {
            camera.set_fovy(fovy);
            assert_eq!(camera.fovy(), expected, "{fovy}");
            assert!(camera.cam_dist().is_finite() && camera.cam_dist() > 0.0);
        }
        let wide = Camera::new(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, 270.0);
        assert_eq!(wide.fovy(), MAX_FOVY);
    }

    #[test]
    fn non_movement_keys_are_ignored() {
        let mut controller = CameraController::new(1.0, 1.0);
        assert!(!controller.process_keyboard(KeyCode::KeyR, ElementState::Pressed));
    }
}
