//! Raster pass over explicit scene geometry
//!
//! Solid triangles and wire lines go through two pipelines that share one
//! program, one uniform buffer and the render target's depth texture. The
//! program writes fragment depth explicitly, matching the ray marcher.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::camera::Camera;
use crate::gpu::GpuContext;
use crate::pipeline::{self, PipelineDesc};
use crate::scene::{SceneGeometry, Vertex};
use crate::shader::{ShaderError, ShaderProgram};
use crate::target::{DepthFormat, COLOR_FORMAT};

/// Uniform buffer of the raster program.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct RasterUniforms {
    /// Projection * view, including the target's row flip
    pub clip_from_world: [[f32; 4]; 4],
}

impl RasterUniforms {
    pub fn new(camera: &Camera, aspect: f32) -> Self {
        Self {
            clip_from_world: camera.clip_from_world(aspect).to_cols_array_2d(),
        }
    }
}

struct GeometryBuffer {
    buffer: wgpu::Buffer,
    count: u32,
}

impl GeometryBuffer {
    fn new(device: &wgpu::Device, label: &str, vertices: &[Vertex]) -> Option<Self> {
        if vertices.is_empty() {
            return None;
        }
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Some(Self {
            buffer,
            count: vertices.len() as u32,
        })
    }
}

pub struct RasterPass {
    triangle_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    triangles: Option<GeometryBuffer>,
    lines: Option<GeometryBuffer>,
    depth_format: DepthFormat,
}

impl RasterPass {
    pub fn new(
        ctx: &GpuContext,
        source: &str,
        depth_format: DepthFormat,
        geometry: &SceneGeometry,
    ) -> Result<Self, ShaderError> {
        let layout = pipeline::create_uniform_layout(
            &ctx.device,
            "Raster Bind Group Layout",
            wgpu::ShaderStages::VERTEX,
        );
        let program = ShaderProgram::compile(ctx, "Raster Shader", source)?;
        let (triangle_pipeline, line_pipeline) =
            Self::create_pipelines(ctx, &program, &layout, depth_format)?;

        let uniform_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Raster Uniforms"),
            contents: bytemuck::bytes_of(&RasterUniforms::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = pipeline::create_uniform_bind_group(
            &ctx.device,
            "Raster Bind Group",
            &layout,
            &uniform_buffer,
        );

        Ok(Self {
            triangle_pipeline,
            line_pipeline,
            layout,
            uniform_buffer,
            bind_group,
            triangles: GeometryBuffer::new(&ctx.device, "Scene Triangles", &geometry.triangles),
            lines: GeometryBuffer::new(&ctx.device, "Scene Lines", &geometry.lines),
            depth_format,
        })
    }

    fn create_pipelines(
        ctx: &GpuContext,
        program: &ShaderProgram,
        layout: &wgpu::BindGroupLayout,
        depth_format: DepthFormat,
    ) -> Result<(wgpu::RenderPipeline, wgpu::RenderPipeline), ShaderError> {
        let build = |label, topology| {
            pipeline::create_pipeline(
                ctx,
                PipelineDesc {
                    label,
                    program,
                    bind_group_layout: layout,
                    vertex_layout: Vertex::layout(),
                    topology,
                    color_format: COLOR_FORMAT,
                    depth: Some(pipeline::target_depth_state(depth_format)),
                },
            )
        };
        Ok((
            build("Raster Triangle Pipeline", wgpu::PrimitiveTopology::TriangleList)?,
            build("Raster Line Pipeline", wgpu::PrimitiveTopology::LineList)?,
        ))
    }

    /// Replaces the static geometry.
    pub fn set_geometry(&mut self, ctx: &GpuContext, geometry: &SceneGeometry) {
        self.triangles = GeometryBuffer::new(&ctx.device, "Scene Triangles", &geometry.triangles);
        self.lines = GeometryBuffer::new(&ctx.device, "Scene Lines", &geometry.lines);
    }

    /// Uploads the camera transform for a target with the given aspect ratio.
    pub fn sync(&self, ctx: &GpuContext, camera: &Camera, aspect: f32) {
        let uniforms = RasterUniforms::new(camera, aspect);
        ctx.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        pass.set_bind_group(0, &self.bind_group, &[]);
        if let Some(triangles) = &self.triangles {
            pass.set_pipeline(&self.triangle_pipeline);
            pass.set_vertex_buffer(0, triangles.buffer.slice(..));
            pass.draw(0..triangles.count, 0..1);
        }
        if let Some(lines) = &self.lines {
            pass.set_pipeline(&self.line_pipeline);
            pass.set_vertex_buffer(0, lines.buffer.slice(..));
            pass.draw(0..lines.count, 0..1);
        }
    }

    /// Recompiles the program. On failure the current pipelines stay in use.
    pub fn reload(&mut self, ctx: &GpuContext, source: &str) -> Result<(), ShaderError> {
        let program = ShaderProgram::compile(ctx, "Raster Shader", source)?;
        let (triangle_pipeline, line_pipeline) =
            Self::create_pipelines(ctx, &program, &self.layout, self.depth_format)?;
        self.triangle_pipeline = triangle_pipeline;
        self.line_pipeline = line_pipeline;
        tracing::info!("{} reloaded", program.label);
        Ok(())
    }
}
