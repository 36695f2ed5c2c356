//! Target-to-screen blit
//!
//! Draws the render target's color texture over the whole screen as a
//! textured quad. The target stores rows bottom-up, the screen top-down, so the
//! quad samples with the vertical axis flipped: screen pixel `(x, 0)` shows
//! target pixel `(x, height - 1)`.

use crate::gpu::GpuContext;
use crate::pipeline::{self, PipelineDesc};
use crate::shader::{ShaderError, ShaderProgram};
use crate::target::RenderTarget;

/// Screen clear color (raylib's RAYWHITE).
pub const SCREEN_CLEAR: wgpu::Color = wgpu::Color {
    r: 245.0 / 255.0,
    g: 245.0 / 255.0,
    b: 245.0 / 255.0,
    a: 1.0,
};

/// Begins the screen pass, cleared to [`SCREEN_CLEAR`].
pub fn begin_screen_pass<'a>(
    encoder: &'a mut wgpu::CommandEncoder,
    screen: &'a wgpu::TextureView,
) -> wgpu::RenderPass<'a> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Screen Pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: screen,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(SCREEN_CLEAR),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

pub struct BlitPass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    quad: wgpu::Buffer,
    source: Option<wgpu::BindGroup>,
    screen_format: wgpu::TextureFormat,
}

impl BlitPass {
    pub fn new(
        ctx: &GpuContext,
        source: &str,
        screen_format: wgpu::TextureFormat,
    ) -> Result<Self, ShaderError> {
        let layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Blit Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });
        let program = ShaderProgram::compile(ctx, "Blit Shader", source)?;
        let pipeline = Self::create_pipeline(ctx, &program, &layout, screen_format)?;
        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Blit Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            pipeline,
            layout,
            sampler,
            quad: pipeline::create_fullscreen_quad(&ctx.device),
            source: None,
            screen_format,
        })
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
                label: "Blit Pipeline",
                program,
                bind_group_layout: layout,
                vertex_layout: pipeline::fullscreen_quad_layout(),
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                color_format: screen_format,
                depth: None,
            },
        )
    }

    /// Uses `target`'s color texture as the blit source.
    pub fn set_source(&mut self, ctx: &GpuContext, target: &RenderTarget) {
        self.source = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Blit Bind Group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(target.color_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        }));
    }

    pub fn clear_source(&mut self) {
        self.source = None;
    }

    /// Draws the source over the whole screen. Without a source nothing is
    /// drawn and the pass's clear shows.
    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        if let Some(source) = &self.source {
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, source, &[]);
            pass.set_vertex_buffer(0, self.quad.slice(..));
            pass.draw(0..pipeline::FULLSCREEN_QUAD_VERTICES, 0..1);
        }
    }

    pub fn reload(&mut self, ctx: &GpuContext, source: &str) -> Result<(), ShaderError> {
        let program = ShaderProgram::compile(ctx, "Blit Shader", source)?;
        self.pipeline = Self::create_pipeline(ctx, &program, &self.layout, self.screen_format)?;
        tracing::info!("{} reloaded", program.label);
        Ok(())
    }
}
