//! Golden-pixel checks of the two passes sharing one depth texture.
//!
//! The scene is a unit sphere at the origin seen from `(0, 0, 5)`, so the
//! ray-marched surface at the center pixel is 4 units away. A quad is placed
//! either in front of it (3 units away) or behind it (7 units away).
//!
//! Colors are always checked. Depth values are only checked on adapters that
//! can copy depth textures to buffers.

use glam::Vec3;
use render::blit::SCREEN_CLEAR;
use render::camera::Camera;
use render::compositor::{Compositor, CompositorConfig, Passes};
use render::gpu::GpuContext;
use render::overlay::{GLYPH_SCALE, TEXT_COLOR, TEXT_ORIGIN};
use render::readback;
use render::scene::{SceneGeometry, SdfScene};
use render::shader::{ShaderError, ShaderKind};
use render::target::COLOR_FORMAT;

const SIZE: u32 = 64;
const CENTER: u32 = SIZE / 2;
const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

fn gpu() -> Option<GpuContext> {
    match GpuContext::headless() {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("skipping GPU test: {e}");
            None
        }
    }
}

fn camera() -> Camera {
    Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y, 45.0)
}

fn quad_at(z: f32, bottom: f32, top: f32) -> SceneGeometry {
    let mut geometry = SceneGeometry::default();
    geometry.push_quad(
        [
            Vec3::new(-0.5, bottom, z),
            Vec3::new(0.5, bottom, z),
            Vec3::new(0.5, top, z),
            Vec3::new(-0.5, top, z),
        ],
        BLUE,
    );
    geometry
}

fn compositor(ctx: &GpuContext, geometry: SceneGeometry) -> Compositor {
    let config = CompositorConfig {
        geometry,
        sdf: SdfScene::sphere(Vec3::ZERO, 1.0),
        ..CompositorConfig::new(SIZE, SIZE, COLOR_FORMAT)
    };
    Compositor::new(ctx, config).unwrap()
}

/// Center color, and center depth when the adapter can read depth back.
fn center_pixel(
    ctx: &GpuContext,
    compositor: &mut Compositor,
    passes: Passes,
) -> ([u8; 4], Option<f32>) {
    let target = compositor
        .render_target_only(ctx, &camera(), passes)
        .expect("render target");
    let color = target.read_color(ctx).unwrap();
    let depth = ctx
        .can_copy_depth()
        .then(|| target.read_depth(ctx).unwrap().get(CENTER, CENTER).unwrap());
    (color.get_pixel(CENTER, CENTER).0, depth)
}

fn assert_depth_at(depth: Option<f32>, distance: f32) {
    if let Some(depth) = depth {
        let expected = camera().depth_range().depth_at(distance);
        assert!((depth - expected).abs() < 1e-3, "{depth} vs {expected}");
    }
}

fn offscreen_screen(ctx: &GpuContext, width: u32, height: u32) -> wgpu::Texture {
    ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Screen"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: COLOR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

/// Renders a full frame into an offscreen screen and reads it back.
fn render_screen(ctx: &GpuContext, compositor: &mut Compositor) -> Vec<u8> {
    let screen = offscreen_screen(ctx, SIZE, SIZE);
    let view = screen.create_view(&wgpu::TextureViewDescriptor::default());
    compositor.render(ctx, &camera(), &view);
    readback::read_texture(ctx, &screen, wgpu::TextureAspect::All, 4).unwrap()
}

fn pixel_at(pixels: &[u8], x: u32, y: u32) -> [u8; 4] {
    let i = ((y * SIZE + x) * 4) as usize;
    [pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]]
}

fn to_rgba8(color: [f32; 4]) -> [u8; 4] {
    color.map(|c| (c * 255.0).round() as u8)
}

#[test]
fn raymarch_pass_writes_sphere_depth() {
    let Some(ctx) = gpu() else { return };
    let mut compositor = compositor(&ctx, SceneGeometry::default());
    let (color, depth) = center_pixel(&ctx, &mut compositor, Passes::RAYMARCH_ONLY);
    assert_depth_at(depth, 4.0);
    assert_ne!(color, [255, 255, 255, 255]);

    // Rays that miss leave the clear values.
    let target = compositor.target().unwrap();
    assert_eq!(target.read_color(&ctx).unwrap().get_pixel(0, 0).0, [255, 255, 255, 255]);
    if ctx.can_copy_depth() {
        assert_eq!(target.read_depth(&ctx).unwrap().get(0, 0), Some(1.0));
    }
    compositor.destroy().unwrap();
}

#[test]
fn raster_pass_writes_projected_depth() {
    let Some(ctx) = gpu() else { return };
    let mut compositor = compositor(&ctx, quad_at(2.0, -0.5, 0.5));
    let (color, depth) = center_pixel(&ctx, &mut compositor, Passes::RASTER_ONLY);
    assert_depth_at(depth, 3.0);
    assert_eq!(color, [0, 0, 255, 255]);
    compositor.destroy().unwrap();
}

#[test]
fn nearer_raster_geometry_occludes_raymarched_surface() {
    let Some(ctx) = gpu() else { return };
    let mut compositor = compositor(&ctx, quad_at(2.0, -0.5, 0.5));
    let (color, depth) = center_pixel(&ctx, &mut compositor, Passes::ALL);
    assert_eq!(color, [0, 0, 255, 255]);
    assert_depth_at(depth, 3.0);
    compositor.destroy().unwrap();
}

#[test]
fn raymarched_surface_occludes_farther_raster_geometry() {
    let Some(ctx) = gpu() else { return };
    let mut compositor = compositor(&ctx, quad_at(-2.0, -0.5, 0.5));
    let (color, depth) = center_pixel(&ctx, &mut compositor, Passes::ALL);
    assert!(color[2] < 128, "{color:?}");
    assert!(color[0] > color[2]);
    assert_depth_at(depth, 4.0);
    compositor.destroy().unwrap();
}

#[test]
fn swapping_distances_swaps_visibility() {
    let Some(ctx) = gpu() else { return };
    let mut compositor = compositor(&ctx, quad_at(2.0, -0.5, 0.5));
    let (front, _) = center_pixel(&ctx, &mut compositor, Passes::ALL);
    compositor.set_geometry(&ctx, &quad_at(-2.0, -0.5, 0.5));
    let (behind, _) = center_pixel(&ctx, &mut compositor, Passes::ALL);
    assert_eq!(front, [0, 0, 255, 255]);
    assert_ne!(behind, front);
    compositor.destroy().unwrap();
}

#[test]
fn blit_flips_rows() {
    let Some(ctx) = gpu() else { return };
    // Only the upper half of the scene is covered by the quad.
    let mut compositor = compositor(&ctx, quad_at(2.0, 0.2, 1.0));
    let screen = render_screen(&ctx, &mut compositor);
    let target = compositor.target().unwrap().read_color(&ctx).unwrap();

    assert_eq!(pixel_at(&screen, 0, 0), target.get_pixel(0, SIZE - 1).0);
    for y in 0..SIZE {
        for x in 0..SIZE {
            assert_eq!(
                pixel_at(&screen, x, y),
                target.get_pixel(x, SIZE - 1 - y).0,
                "({x}, {y})"
            );
        }
    }

    // The quad is above the center, so it shows in the top half of the screen.
    assert_eq!(pixel_at(&screen, CENTER, 16), [0, 0, 255, 255]);
    assert_eq!(pixel_at(&screen, CENTER, 48), [255, 255, 255, 255]);
    compositor.destroy().unwrap();
}

#[test]
fn overlay_text_is_drawn_at_the_top_left_of_the_screen() {
    let Some(ctx) = gpu() else { return };
    let mut compositor = compositor(&ctx, SceneGeometry::default());
    compositor.set_overlay_text(&ctx, "8");
    assert_eq!(compositor.overlay_text(), "8");
    let screen = render_screen(&ctx, &mut compositor);
    let target = compositor.target().unwrap().read_color(&ctx).unwrap();
    let blitted = |x: u32, y: u32| target.get_pixel(x, SIZE - 1 - y).0;

    let lit = to_rgba8(TEXT_COLOR);
    let (left, top) = (TEXT_ORIGIN.x as u32, TEXT_ORIGIN.y as u32);
    let cell = GLYPH_SCALE as u32;
    // Top-left and bottom-right cells of the 8.
    assert_eq!(pixel_at(&screen, left, top), lit);
    assert_eq!(pixel_at(&screen, left + 3 * cell - 1, top + 5 * cell - 1), lit);
    // The hole in the upper loop and the pixels around the glyph show the blit.
    for (x, y) in [
        (left + cell, top + cell),
        (left - 1, top),
        (left, top - 1),
        (left + 3 * cell, top),
        (left, top + 5 * cell),
    ] {
        assert_eq!(pixel_at(&screen, x, y), blitted(x, y), "({x}, {y})");
        assert_ne!(pixel_at(&screen, x, y), lit, "({x}, {y})");
    }
    // The rest of the frame is untouched.
    assert_eq!(pixel_at(&screen, CENTER, CENTER), blitted(CENTER, CENTER));

    compositor.set_overlay_text(&ctx, "");
    let cleared = render_screen(&ctx, &mut compositor);
    assert_eq!(pixel_at(&cleared, left, top), blitted(left, top));
    compositor.destroy().unwrap();
}

#[test]
fn failed_target_degrades_to_blank_frames() {
    let Some(ctx) = gpu() else { return };
    let config = CompositorConfig::new(0, 0, COLOR_FORMAT);
    let mut compositor = Compositor::new(&ctx, config).unwrap();
    assert!(compositor.target().is_none());
    assert!(compositor
        .render_target_only(&ctx, &camera(), Passes::ALL)
        .is_none());

    let screen = offscreen_screen(&ctx, 4, 4);
    let view = screen.create_view(&wgpu::TextureViewDescriptor::default());
    compositor.render(&ctx, &camera(), &view);
    let pixels = readback::read_texture(&ctx, &screen, wgpu::TextureAspect::All, 4).unwrap();
    let clear = (SCREEN_CLEAR.r * 255.0).round() as u8;
    assert!(pixels.chunks(4).all(|p| p == [clear, clear, clear, 255]));
    compositor.destroy().unwrap();
}

#[test]
fn failed_reload_keeps_running_program() {
    let Some(ctx) = gpu() else { return };
    let mut compositor = compositor(&ctx, SceneGeometry::default());
    let err = compositor
        .reload(&ctx, ShaderKind::RayMarch, "fn fs_main( {")
        .unwrap_err();
    assert!(matches!(err, ShaderError::Parse { .. }));

    let (color, depth) = center_pixel(&ctx, &mut compositor, Passes::RAYMARCH_ONLY);
    assert_ne!(color, [255, 255, 255, 255]);
    assert_depth_at(depth, 4.0);
    compositor.destroy().unwrap();
}

#[test]
fn reload_needing_missing_device_feature_keeps_running_program() {
    let Some(ctx) = gpu() else { return };
    let mut compositor = compositor(&ctx, quad_at(2.0, 0.2, 1.0));
    let before = render_screen(&ctx, &mut compositor);

    let source = format!("{}\nvar<private> wide: f64;\n", ShaderKind::Blit.embedded_source());
    let err = compositor
        .reload(&ctx, ShaderKind::Blit, &source)
        .unwrap_err();
    assert!(matches!(err, ShaderError::Validation { .. }), "{err}");

    let after = render_screen(&ctx, &mut compositor);
    assert_eq!(pixel_at(&after, CENTER, 16), [0, 0, 255, 255]);
    assert_eq!(before, after);
    compositor.destroy().unwrap();
}

#[test]
fn reload_re_resolves_uniform_locations() {
    let Some(ctx) = gpu() else { return };
    let mut compositor = compositor(&ctx, SceneGeometry::default());
    let before = *compositor.raymarch().locations();
    compositor
        .reload(&ctx, ShaderKind::RayMarch, ShaderKind::RayMarch.embedded_source())
        .unwrap();
    let after = *compositor.raymarch().locations();
    assert_eq!(after.cam_pos, before.cam_pos);
    assert!(after.cam_dir.is_some());
    assert!(after.screen_center.is_some());

    let (color, depth) = center_pixel(&ctx, &mut compositor, Passes::RAYMARCH_ONLY);
    assert_ne!(color, [255, 255, 255, 255]);
    assert_depth_at(depth, 4.0);
    compositor.destroy().unwrap();
}
