//! Full-screen ray-march pass
//!
//! Draws one rectangle covering the whole target with a fragment shader that
//! marches a ray per pixel and writes both color and depth. The camera reaches
//! the shader through named uniforms resolved from the program
//! ([`RayLocations`]).

use glam::Vec2;

use crate::camera::Camera;
use crate::gpu::GpuContext;
use crate::pipeline::{self, PipelineDesc};
use crate::scene::SdfScene;
use crate::shader::{ShaderError, ShaderProgram, UniformBlock, UniformHandle};
use crate::target::{DepthFormat, COLOR_FORMAT};

/// Uniform locations of the ray-march program.
#[derive(Debug, Clone, Copy, Default)]
pub struct RayLocations {
    pub cam_pos: Option<UniformHandle>,
    pub cam_dir: Option<UniformHandle>,
    pub cam_up: Option<UniformHandle>,
    pub screen_center: Option<UniformHandle>,
    pub near: Option<UniformHandle>,
    pub far: Option<UniformHandle>,
    pub sphere: Option<UniformHandle>,
    pub torus_center: Option<UniformHandle>,
    pub torus_radii: Option<UniformHandle>,
}

impl RayLocations {
    pub fn resolve(program: &ShaderProgram) -> Self {
        Self {
            cam_pos: program.uniform_location("cam_pos"),
            cam_dir: program.uniform_location("cam_dir"),
            cam_up: program.uniform_location("cam_up"),
            screen_center: program.uniform_location("screen_center"),
            near: program.uniform_location("near"),
            far: program.uniform_location("far"),
            sphere: program.uniform_location("sphere"),
            torus_center: program.uniform_location("torus_center"),
            torus_radii: program.uniform_location("torus_radii"),
        }
    }
}

pub struct RayMarchPass {
    program: ShaderProgram,
    locations: RayLocations,
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    uniforms: UniformBlock,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    quad: wgpu::Buffer,
    depth_format: DepthFormat,
    screen_center: Vec2,
    scene: SdfScene,
}

impl RayMarchPass {
    pub fn new(
        ctx: &GpuContext,
        source: &str,
        depth_format: DepthFormat,
        scene: SdfScene,
    ) -> Result<Self, ShaderError> {
        let layout = pipeline::create_uniform_layout(
            &ctx.device,
            "Ray March Bind Group Layout",
            wgpu::ShaderStages::FRAGMENT,
        );
        let program = ShaderProgram::compile(ctx, "Ray March Shader", source)?;
        let pipeline = Self::create_pipeline(ctx, &program, &layout, depth_format)?;
        let uniforms = UniformBlock::new(program.uniform_block_size(0, 0).unwrap_or(0));
        let uniform_buffer = Self::create_uniform_buffer(ctx, &uniforms);
        let bind_group = pipeline::create_uniform_bind_group(
            &ctx.device,
            "Ray March Bind Group",
            &layout,
            &uniform_buffer,
        );

        let mut pass = Self {
            locations: RayLocations::resolve(&program),
            program,
            pipeline,
            layout,
            uniforms,
            uniform_buffer,
            bind_group,
            quad: pipeline::create_fullscreen_quad(&ctx.device),
            depth_format,
            screen_center: Vec2::ZERO,
            scene,
        };
        pass.write_scene();
        Ok(pass)
    }

    fn create_pipeline(
        ctx: &GpuContext,
        program: &ShaderProgram,
        layout: &wgpu::BindGroupLayout,
        depth_format: DepthFormat,
    ) -> Result<wgpu::RenderPipeline, ShaderError> {
        pipeline::create_pipeline(
            ctx,
            PipelineDesc {
                label: "Ray March Pipeline",
                program,
                bind_group_layout: layout,
                vertex_layout: pipeline::fullscreen_quad_layout(),
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                color_format: COLOR_FORMAT,
                depth: Some(pipeline::target_depth_state(depth_format)),
            },
        )
    }

    fn create_uniform_buffer(ctx: &GpuContext, uniforms: &UniformBlock) -> wgpu::Buffer {
        ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Ray March Uniforms"),
            size: uniforms.size(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub fn locations(&self) -> &RayLocations {
        &self.locations
    }

    /// Sets the pixel center used to derive per-pixel rays. Constant for the
    /// lifetime of the target.
    pub fn set_screen_center(&mut self, screen_center: Vec2) {
        self.screen_center = screen_center;
        self.uniforms
            .set(self.locations.screen_center, screen_center.to_array());
    }

    pub fn set_scene(&mut self, scene: SdfScene) {
        self.scene = scene;
        self.write_scene();
    }

    fn write_scene(&mut self) {
        let SdfScene {
            sphere_center,
            sphere_radius,
            torus_center,
            torus_major,
            torus_minor,
        } = self.scene;
        let loc = self.locations;
        self.uniforms
            .set(loc.sphere, sphere_center.extend(sphere_radius).to_array());
        self.uniforms
            .set(loc.torus_center, torus_center.extend(0.0).to_array());
        self.uniforms.set(loc.torus_radii, [torus_major, torus_minor]);
    }

    /// Uploads the per-frame camera uniforms.
    pub fn sync(&mut self, ctx: &GpuContext, camera: &Camera) {
        let loc = self.locations;
        let range = camera.depth_range();
        self.uniforms.set(loc.cam_pos, camera.position.to_array());
        self.uniforms.set(loc.cam_dir, camera.scaled_dir().to_array());
        self.uniforms.set(loc.cam_up, camera.up.to_array());
        self.uniforms.set(loc.near, range.near);
        self.uniforms.set(loc.far, range.far);
        ctx.queue
            .write_buffer(&self.uniform_buffer, 0, self.uniforms.as_bytes());
    }

    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.quad.slice(..));
        pass.draw(0..pipeline::FULLSCREEN_QUAD_VERTICES, 0..1);
    }

    /// Recompiles the program from `source` and re-resolves its uniform
    /// locations. On failure the current program stays in use.
    pub fn reload(&mut self, ctx: &GpuContext, source: &str) -> Result<(), ShaderError> {
        let program = ShaderProgram::compile(ctx, "Ray March Shader", source)?;
        let pipeline = Self::create_pipeline(ctx, &program, &self.layout, self.depth_format)?;

        let size = program.uniform_block_size(0, 0).unwrap_or(0);
        let uniforms = UniformBlock::new(size);
        if uniforms.size() != self.uniforms.size() {
            self.uniform_buffer = Self::create_uniform_buffer(ctx, &uniforms);
            self.bind_group = pipeline::create_uniform_bind_group(
                &ctx.device,
                "Ray March Bind Group",
                &self.layout,
                &self.uniform_buffer,
            );
        }

        self.locations = RayLocations::resolve(&program);
        self.program = program;
        self.pipeline = pipeline;
        self.uniforms = uniforms;
        self.set_screen_center(self.screen_center);
        self.write_scene();
        tracing::info!("{} reloaded", self.program.label);
        Ok(())
    }
}
