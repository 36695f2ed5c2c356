//! The depth convention shared by the ray-march and raster passes.
//!
//! The raster pass projects with [`glam::Mat4::perspective_rh`], which maps
//! view distance `near` to depth 0 and `far` to depth 1. The ray marcher has no
//! projection matrix, so it reproduces that mapping from the hit distance
//! along the camera's forward axis with [`DepthRange::depth_at`]. As long as
//! both programs write depth this way the GPU depth test orders their surfaces
//! correctly, whatever the draw order.
//!
//! The per-pixel ray ([`pixel_ray`]) mirrors what `raymarch.wgsl` computes so
//! the contract can be checked on the CPU.

use glam::{Mat4, Vec2, Vec3};

/// Compare function used by every pipeline writing the shared depth texture.
pub const DEPTH_COMPARE: wgpu::CompareFunction = wgpu::CompareFunction::LessEqual;

/// Value the depth texture is cleared to at the start of a frame.
pub const DEPTH_CLEAR: f32 = 1.0;

/// Clip-space flip applied by the raster pass.
///
/// The render target stores rows bottom-up (row 0 is the bottom of the
/// scene); the blit flips them back when drawing to the screen.
pub const FLIP_Y: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0, //
    0.0, -1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
]);

/// Focal-length-like scale for the ray direction: `1 / tan(fovy / 2)`.
///
/// Scaling the view direction by this value makes the ray marcher's implicit
/// field of view equal to the rasterizer's perspective field of view.
pub fn camera_distance(fovy_degrees: f32) -> f32 {
    1.0 / (fovy_degrees.to_radians() * 0.5).tan()
}

/// Near and far clip distances of the perspective projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthRange {
    pub near: f32,
    pub far: f32,
}

impl DepthRange {
    /// Depth buffer value of a point `view_distance` in front of the camera.
    pub fn depth_at(&self, view_distance: f32) -> f32 {
        self.far * (view_distance - self.near) / ((self.far - self.near) * view_distance)
    }

    /// Inverse of [`DepthRange::depth_at`].
    pub fn view_distance(&self, depth: f32) -> f32 {
        self.near * self.far / (self.far - depth * (self.far - self.near))
    }
}

/// World-space direction of the ray through `pixel`.
///
/// `pixel` is in framebuffer coordinates with rows counted bottom-up,
/// `screen_center` is half the target size and `cam_dir` the view direction
/// scaled by [`camera_distance`].
pub fn pixel_ray(pixel: Vec2, screen_center: Vec2, cam_dir: Vec3, cam_up: Vec3) -> Vec3 {
    let cam_dist = cam_dir.length();
    let forward = cam_dir / cam_dist;
    let right = forward.cross(cam_up).normalize();
    let up = right.cross(forward);

    let p = (pixel - screen_center) / screen_center.y;
    (right * p.x + up * p.y + forward * cam_dist).normalize()
}

/// Framebuffer position (bottom-up rows) and depth of a clip-space point.
pub fn clip_to_framebuffer(clip: glam::Vec4, size: Vec2) -> Vec3 {
    let ndc = clip.truncate() / clip.w;
    Vec3::new(
        (ndc.x + 1.0) * 0.5 * size.x,
        (1.0 - ndc.y) * 0.5 * size.y,
        ndc.z,
    )
}
