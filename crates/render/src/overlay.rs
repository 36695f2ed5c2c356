//! Frame-rate readout drawn over the composited screen
//!
//! Text is built from a 3x5 bitmap font: every lit cell of a glyph becomes a
//! solid quad in screen pixels, drawn in the screen pass after the blit.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use wgpu::util::DeviceExt;

use crate::gpu::GpuContext;
use crate::pipeline::{self, PipelineDesc};
use crate::scene::Vertex;
use crate::shader::{ShaderError, ShaderProgram};

/// Top-left corner of the readout, in screen pixels.
pub const TEXT_ORIGIN: Vec2 = Vec2::new(10.0, 10.0);
/// Screen pixels per font cell.
pub const GLYPH_SCALE: f32 = 2.0;
/// raylib's LIME.
pub const TEXT_COLOR: [f32; 4] = [0.0, 158.0 / 255.0, 47.0 / 255.0, 1.0];

pub const GLYPH_COLUMNS: u32 = 3;
pub const GLYPH_ROWS: u32 = 5;

/// Rows of a glyph, top first, most significant of the low three bits on the
/// left. Characters without a glyph draw as blanks.
fn glyph(c: char) -> [u8; GLYPH_ROWS as usize] {
    match c.to_ascii_uppercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        _ => [0; GLYPH_ROWS as usize],
    }
}

/// Pixel rectangles `(min, max)` covering the lit cells of `text`.
pub fn text_rects(text: &str, origin: Vec2, scale: f32) -> Vec<(Vec2, Vec2)> {
    let mut rects = Vec::new();
    let mut pen = origin;
    for c in text.chars() {
        for (row, bits) in glyph(c).into_iter().enumerate() {
            for col in 0..GLYPH_COLUMNS {
                if bits & (1 << (GLYPH_COLUMNS - 1 - col)) != 0 {
                    let min = pen + Vec2::new(col as f32, row as f32) * scale;
                    rects.push((min, min + Vec2::splat(scale)));
                }
            }
        }
        // One blank column between glyphs
        pen.x += (GLYPH_COLUMNS + 1) as f32 * scale;
    }
    rects
}

/// Two triangles per lit cell.
pub fn text_vertices(text: &str, origin: Vec2, scale: f32, color: [f32; 4]) -> Vec<Vertex> {
    text_rects(text, origin, scale)
        .into_iter()
        .flat_map(|(min, max)| {
            let corner = |x: f32, y: f32| Vertex::new(Vec3::new(x, y, 0.0), color);
            [
                corner(min.x, min.y),
                corner(max.x, min.y),
                corner(max.x, max.y),
                corner(min.x, min.y),
                corner(max.x, max.y),
                corner(min.x, max.y),
            ]
        })
        .collect()
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct OverlayUniforms {
    screen_size: [f32; 2],
    _padding: [f32; 2],
}

struct TextBuffer {
    buffer: wgpu::Buffer,
    count: u32,
}

pub struct TextOverlay {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    quads: Option<TextBuffer>,
    text: String,
    screen_format: wgpu::TextureFormat,
}

impl TextOverlay {
    /// Creates an overlay with no text for a `width` x `height` screen.
    pub fn new(
        ctx: &GpuContext,
        source: &str,
        screen_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Result<Self, ShaderError> {
        let layout = pipeline::create_uniform_layout(
            &ctx.device,
            "Overlay Bind Group Layout",
            wgpu::ShaderStages::VERTEX,
        );
        let program = ShaderProgram::compile(ctx, "Overlay Shader", source)?;
        let pipeline = Self::create_pipeline(ctx, &program, &layout, screen_format)?;

        let uniform_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Overlay Uniform Buffer"),
                contents: bytemuck::bytes_of(&Self::uniforms(width, height)),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let bind_group = pipeline::create_uniform_bind_group(
            &ctx.device,
            "Overlay Bind Group",
            &layout,
            &uniform_buffer,
        );

        Ok(Self {
            pipeline,
            layout,
            uniform_buffer,
            bind_group,
            quads: None,
            text: String::new(),
            screen_format,
        })
    }

    fn uniforms(width: u32, height: u32) -> OverlayUniforms {
        OverlayUniforms {
            screen_size: [width.max(1) as f32, height.max(1) as f32],
            _padding: [0.0; 2],
        }
    }

    fn create_pipeline(
        ctx: &GpuContext,
        program: &ShaderProgram,
        layout: &wgpu::BindGroupLayout,
        screen_format: wgpu::TextureFormat,
    ) -> Result<wgpu::RenderPipeline, ShaderError> {
        pipeline::create_pipeline(
            ctx,
            PipelineDesc {
                label: "Overlay Pipeline",
                program,
                bind_group_layout: layout,
                vertex_layout: Vertex::layout(),
                topology: wgpu::PrimitiveTopology::TriangleList,
                color_format: screen_format,
                depth: None,
            },
        )
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the text. Quads are only rebuilt when it changes.
    pub fn set_text(&mut self, ctx: &GpuContext, text: &str) {
        if text == self.text {
            return;
        }
        text.clone_into(&mut self.text);
        let vertices = text_vertices(text, TEXT_ORIGIN, GLYPH_SCALE, TEXT_COLOR);
        self.quads = (!vertices.is_empty()).then(|| TextBuffer {
            buffer: ctx
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Overlay Vertex Buffer"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
            count: vertices.len() as u32,
        });
    }

    /// Keeps the text at the same pixel size after the screen is resized.
    pub fn set_screen_size(&self, ctx: &GpuContext, width: u32, height: u32) {
        ctx.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&Self::uniforms(width, height)),
        );
    }

    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        let Some(quads) = &self.quads else {
            return;
        };
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, quads.buffer.slice(..));
        pass.draw(0..quads.count, 0..1);
    }

    pub fn reload(&mut self, ctx: &GpuContext, source: &str) -> Result<(), ShaderError> {
        let program = ShaderProgram::compile(ctx, "Overlay Shader", source)?;
        self.pipeline = Self::create_pipeline(ctx, &program, &self.layout, self.screen_format)?;
        tracing::info!("{} reloaded", program.label);
        Ok(())
    }
}
