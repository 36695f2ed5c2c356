//! The ray marcher and the rasterizer must agree on where a point lands and
//! what depth it gets. These tests check the CPU mirror of the ray-march
//! shader against the raster projection.

use glam::{Vec2, Vec3, Vec4};
use render::camera::Camera;
use render::depth::{clip_to_framebuffer, pixel_ray, DepthRange};

const SIZE: Vec2 = Vec2::new(800.0, 450.0);

fn cameras() -> Vec<Camera> {
    vec![
        Camera::demo(),
        Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y, 45.0),
        Camera::new(Vec3::new(-3.0, 2.0, 1.0), Vec3::new(1.0, 0.0, -2.0), Vec3::Y, 70.0),
    ]
}

fn points() -> Vec<Vec3> {
    vec![
        Vec3::new(0.0, 0.5, 1.0),
        Vec3::new(0.0, 0.5, -1.0),
        Vec3::new(0.3, 0.1, 0.2),
        Vec3::new(-0.4, 0.9, -0.3),
    ]
}

#[test]
fn pixel_ray_passes_through_projected_point() {
    for camera in cameras() {
        let clip_from_world = camera.clip_from_world(SIZE.x / SIZE.y);
        for point in points() {
            let clip = clip_from_world * point.extend(1.0);
            if clip.w <= 0.0 {
                continue;
            }
            let frag = clip_to_framebuffer(clip, SIZE);
            let ray = pixel_ray(frag.truncate(), SIZE * 0.5, camera.scaled_dir(), camera.up);
            let expected = (point - camera.position).normalize();
            assert!(
                (ray - expected).length() < 1e-4,
                "ray {ray} vs {expected} for {point}"
            );
        }
    }
}

#[test]
fn ray_depth_matches_raster_depth() {
    for camera in cameras() {
        let clip_from_world = camera.clip_from_world(SIZE.x / SIZE.y);
        let range = camera.depth_range();
        for point in points() {
            let clip = clip_from_world * point.extend(1.0);
            let raster_depth = clip_to_framebuffer(clip, SIZE).z;

            let view_z = camera.view_dir().dot(point - camera.position);
            let ray_depth = range.depth_at(view_z);
            assert!(
                (raster_depth - ray_depth).abs() < 1e-5,
                "{raster_depth} vs {ray_depth} for {point}"
            );
        }
    }
}

#[test]
fn upper_scene_lands_in_upper_rows() {
    let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y, 45.0);
    let clip_from_world = camera.clip_from_world(1.0);
    let above = clip_to_framebuffer(clip_from_world * Vec4::new(0.0, 1.0, 0.0, 1.0), SIZE);
    let below = clip_to_framebuffer(clip_from_world * Vec4::new(0.0, -1.0, 0.0, 1.0), SIZE);
    assert!(above.y > SIZE.y * 0.5);
    assert!(below.y < SIZE.y * 0.5);
}

#[test]
fn nearer_points_get_smaller_depth() {
    let range = DepthRange {
        near: 0.1,
        far: 100.0,
    };
    let mut previous = -1.0;
    for d in [0.1_f32, 0.5, 1.0, 3.0, 4.0, 10.0, 100.0] {
        let depth = range.depth_at(d);
        assert!(depth > previous);
        assert!((0.0..=1.0 + 1e-6).contains(&depth));
        previous = depth;
    }
}
