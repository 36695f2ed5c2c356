use glam::Vec3;
use render::camera::Camera;
use render::depth::camera_distance;

#[test]
fn forty_five_degrees() {
    assert!((camera_distance(45.0) - 2.4142).abs() < 1e-4);
}

#[test]
fn ninety_degrees_is_unit() {
    assert!((camera_distance(90.0) - 1.0).abs() < 1e-6);
}

#[test]
fn decreases_with_field_of_view() {
    let mut previous = f32::INFINITY;
    for fovy in (1..180).map(|d| d as f32) {
        let dist = camera_distance(fovy);
        assert!(dist < previous, "not decreasing at {fovy}");
        assert!(dist > 0.0);
        previous = dist;
    }
}

#[test]
fn scaled_dir_length_is_cam_dist() {
    let camera = Camera::new(Vec3::new(0.5, 1.0, 1.5), Vec3::new(0.0, 0.5, 0.0), Vec3::Y, 45.0);
    assert!((camera.scaled_dir().length() - camera.cam_dist()).abs() < 1e-5);
    assert!((camera.scaled_dir().normalize() - camera.view_dir()).length() < 1e-6);
}

#[test]
fn changing_fov_recomputes_cam_dist() {
    let mut camera = Camera::demo();
    assert!((camera.cam_dist() - 2.4142).abs() < 1e-4);
    camera.set_fovy(90.0);
    assert_eq!(camera.fovy(), 90.0);
    assert!((camera.cam_dist() - 1.0).abs() < 1e-6);
    assert!((camera.scaled_dir().length() - 1.0).abs() < 1e-5);
}
