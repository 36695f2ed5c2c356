//! Pipeline building blocks shared by the passes
//!
//! This module handles the full-screen quad used by the ray-march and blit
//! passes, the single-uniform bind group layout, and the depth state every
//! pipeline drawing into the render target uses.

use wgpu::util::DeviceExt;

use crate::depth;
use crate::shader::{ShaderError, ShaderProgram, FRAGMENT_ENTRY, VERTEX_ENTRY};
use crate::target::DepthFormat;

/// Number of vertices in [`create_fullscreen_quad`].
pub const FULLSCREEN_QUAD_VERTICES: u32 = 4;

const QUAD_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

/// Create the fullscreen quad vertex buffer
///
/// Returns a buffer containing 4 vertices for a fullscreen triangle strip
pub fn create_fullscreen_quad(device: &wgpu::Device) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Fullscreen Quad Vertex Buffer"),
        contents: bytemuck::cast_slice(&[
            -1.0_f32, -1.0, 0.0, // Bottom-left
            1.0, -1.0, 0.0, // Bottom-right
            -1.0, 1.0, 0.0, // Top-left
            1.0, 1.0, 0.0, // Top-right
        ]),
        usage: wgpu::BufferUsages::VERTEX,
    })
}

/// Vertex layout of [`create_fullscreen_quad`].
pub fn fullscreen_quad_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: (3 * std::mem::size_of::<f32>()) as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &QUAD_ATTRIBUTES,
    }
}

/// Bind group layout with one uniform buffer at binding 0.
pub fn create_uniform_layout(
    device: &wgpu::Device,
    label: &str,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

pub fn create_uniform_bind_group(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    })
}

/// Depth state for pipelines drawing into the render target.
///
/// Tests and writes are always on, including for the full-screen ray-march
/// draw.
pub fn target_depth_state(format: DepthFormat) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: format.texture_format(),
        depth_write_enabled: true,
        depth_compare: depth::DEPTH_COMPARE,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

/// Everything that varies between the pipelines built by [`create_pipeline`].
pub struct PipelineDesc<'a> {
    pub label: &'a str,
    pub program: &'a ShaderProgram,
    pub bind_group_layout: &'a wgpu::BindGroupLayout,
    pub vertex_layout: wgpu::VertexBufferLayout<'a>,
    pub topology: wgpu::PrimitiveTopology,
    pub color_format: wgpu::TextureFormat,
    pub depth: Option<wgpu::DepthStencilState>,
}

/// Create a render pipeline from a compiled program
///
/// Pipeline creation runs inside an error scope so a program that does not
/// match the layout is reported instead of aborting.
pub fn create_pipeline(
    ctx: &crate::gpu::GpuContext,
    desc: PipelineDesc<'_>,
) -> Result<wgpu::RenderPipeline, ShaderError> {
    ctx.check(|device| {
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &[desc.bind_group_layout],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &desc.program.module,
                entry_point: VERTEX_ENTRY,
                buffers: &[desc.vertex_layout],
            },
            fragment: Some(wgpu::FragmentState {
                module: &desc.program.module,
                entry_point: FRAGMENT_ENTRY,
                targets: &[Some(wgpu::ColorTargetState {
                    format: desc.color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: desc.topology,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: desc.depth,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        })
    })
    .map_err(|message| ShaderError::Pipeline {
        label: desc.label.to_owned(),
        message,
    })
}
