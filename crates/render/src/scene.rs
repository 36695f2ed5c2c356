//! Static scene content
//!
//! [`SceneGeometry`] holds the explicit triangles and lines drawn by the
//! raster pass. [`SdfScene`] holds the parameters of the analytic surfaces the
//! ray marcher evaluates.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

pub mod colors {
    pub const RED: [f32; 4] = [230.0 / 255.0, 41.0 / 255.0, 55.0 / 255.0, 1.0];
    pub const PURPLE: [f32; 4] = [200.0 / 255.0, 122.0 / 255.0, 1.0, 1.0];
    pub const DARK_GREEN: [f32; 4] = [0.0, 117.0 / 255.0, 44.0 / 255.0, 1.0];
    pub const YELLOW: [f32; 4] = [253.0 / 255.0, 249.0 / 255.0, 0.0, 1.0];
    pub const GRID_AXIS: [f32; 4] = [0.5, 0.5, 0.5, 1.0];
    pub const GRID_LINE: [f32; 4] = [0.75, 0.75, 0.75, 1.0];
}

/// Vertex layout of the raster pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x4];

    pub fn new(position: Vec3, color: [f32; 4]) -> Self {
        Self {
            position: position.to_array(),
            color,
        }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

// Corner signs of a unit cube, indexed by bit pattern (x, y, z).
fn cube_corner(center: Vec3, half: Vec3, index: usize) -> Vec3 {
    let sign = |bit: usize| if index & bit != 0 { 1.0 } else { -1.0 };
    center + half * Vec3::new(sign(1), sign(2), sign(4))
}

const CUBE_FACES: [[usize; 4]; 6] = [
    [4, 5, 7, 6], // +z
    [1, 0, 2, 3], // -z
    [5, 1, 3, 7], // +x
    [0, 4, 6, 2], // -x
    [6, 7, 3, 2], // +y
    [0, 1, 5, 4], // -y
];

const CUBE_EDGES: [[usize; 2]; 12] = [
    [0, 1], [2, 3], [4, 5], [6, 7], // along x
    [0, 2], [1, 3], [4, 6], [5, 7], // along y
    [0, 4], [1, 5], [2, 6], [3, 7], // along z
];

/// Triangles and lines of the raster pass.
#[derive(Debug, Clone, Default)]
pub struct SceneGeometry {
    pub triangles: Vec<Vertex>,
    pub lines: Vec<Vertex>,
}

impl SceneGeometry {
    /// Two cubes with wireframe outlines standing on a 10x10 grid.
    pub fn demo() -> Self {
        let mut scene = Self::default();
        let size = Vec3::ONE;
        let front = Vec3::new(0.0, 0.5, 1.0);
        let back = Vec3::new(0.0, 0.5, -1.0);
        scene.push_cube_wires(front, size, colors::RED);
        scene.push_cube(front, size, colors::PURPLE);
        scene.push_cube_wires(back, size, colors::DARK_GREEN);
        scene.push_cube(back, size, colors::YELLOW);
        scene.push_grid(10, 1.0);
        scene
    }

    pub fn push_cube(&mut self, center: Vec3, size: Vec3, color: [f32; 4]) {
        let half = size * 0.5;
        for face in CUBE_FACES {
            let [a, b, c, d] = face.map(|i| cube_corner(center, half, i));
            self.push_quad([a, b, c, d], color);
        }
    }

    pub fn push_cube_wires(&mut self, center: Vec3, size: Vec3, color: [f32; 4]) {
        let half = size * 0.5;
        for [a, b] in CUBE_EDGES {
            self.lines.push(Vertex::new(cube_corner(center, half, a), color));
            self.lines.push(Vertex::new(cube_corner(center, half, b), color));
        }
    }

    /// Two triangles spanning the corners in order.
    pub fn push_quad(&mut self, corners: [Vec3; 4], color: [f32; 4]) {
        let [a, b, c, d] = corners;
        for p in [a, b, c, a, c, d] {
            self.triangles.push(Vertex::new(p, color));
        }
    }

    /// Grid on the y = 0 plane centered at the origin.
    pub fn push_grid(&mut self, slices: u32, spacing: f32) {
        let half = (slices / 2) as i32;
        let extent = half as f32 * spacing;
        for i in -half..=half {
            let color = if i == 0 { colors::GRID_AXIS } else { colors::GRID_LINE };
            let offset = i as f32 * spacing;
            self.lines.push(Vertex::new(Vec3::new(offset, 0.0, -extent), color));
            self.lines.push(Vertex::new(Vec3::new(offset, 0.0, extent), color));
            self.lines.push(Vertex::new(Vec3::new(-extent, 0.0, offset), color));
            self.lines.push(Vertex::new(Vec3::new(extent, 0.0, offset), color));
        }
    }
}

/// Analytic surfaces evaluated by the ray marcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SdfScene {
    pub sphere_center: Vec3,
    pub sphere_radius: f32,
    pub torus_center: Vec3,
    pub torus_major: f32,
    /// Torus tube radius; zero disables the torus.
    pub torus_minor: f32,
}

impl SdfScene {
    /// A single sphere.
    pub fn sphere(center: Vec3, radius: f32) -> Self {
        Self {
            sphere_center: center,
            sphere_radius: radius,
            torus_center: Vec3::ZERO,
            torus_major: 0.0,
            torus_minor: 0.0,
        }
    }

    /// A sphere between the demo cubes, ringed by a torus passing through
    /// both of them.
    pub fn demo() -> Self {
        Self {
            sphere_center: Vec3::new(0.0, 0.5, 0.0),
            sphere_radius: 0.35,
            torus_center: Vec3::new(0.0, 0.5, 0.0),
            torus_major: 1.0,
            torus_minor: 0.12,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_twelve_triangles_and_edges() {
        let mut scene = SceneGeometry::default();
        scene.push_cube(Vec3::ZERO, Vec3::ONE, colors::RED);
        scene.push_cube_wires(Vec3::ZERO, Vec3::ONE, colors::RED);
        assert_eq!(scene.triangles.len(), 36);
        assert_eq!(scene.lines.len(), 24);
    }

    #[test]
    fn cube_vertices_lie_on_its_bounds() {
        let mut scene = SceneGeometry::default();
        let center = Vec3::new(0.0, 0.5, 1.0);
        scene.push_cube(center, Vec3::ONE, colors::PURPLE);
        for v in &scene.triangles {
            let d = (Vec3::from(v.position) - center).abs();
            assert!((d - Vec3::splat(0.5)).length() < 1e-6);
        }
    }

    #[test]
    fn each_cube_face_is_planar() {
        let mut scene = SceneGeometry::default();
        scene.push_cube(Vec3::ZERO, Vec3::splat(2.0), colors::YELLOW);
        for face in scene.triangles.chunks(6) {
            let first = Vec3::from(face[0].position);
            let shared_axis = (0..3).find(|&axis| {
                face.iter().all(|v| (v.position[axis] - first[axis]).abs() < 1e-6)
            });
            assert!(shared_axis.is_some());
        }
    }

    #[test]
    fn grid_spans_slices() {
        let mut scene = SceneGeometry::default();
        scene.push_grid(10, 1.0);
        // 11 lines per axis, two vertices each
        assert_eq!(scene.lines.len(), 44);
        let max = scene
            .lines
            .iter()
            .map(|v| v.position[0].abs().max(v.position[2].abs()))
            .fold(0.0_f32, f32::max);
        assert_eq!(max, 5.0);
        assert!(scene.lines.iter().all(|v| v.position[1] == 0.0));
    }

    #[test]
    fn demo_scene_contents() {
        let scene = SceneGeometry::demo();
        assert_eq!(scene.triangles.len(), 72);
        assert_eq!(scene.lines.len(), 48 + 44);
    }
}
