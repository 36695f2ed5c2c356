//! Depth-readable render target
//!
//! An offscreen framebuffer with a color texture and a depth *texture*: the
//! depth result is an ordinary bindable, copyable resource shared by the
//! ray-march and raster passes instead of an opaque attachment.
//!
//! Rows are stored bottom-up; the blit pass flips them for display.

use std::sync::Arc;

use thiserror::Error;

use crate::depth;
use crate::gpu::GpuContext;
use crate::readback::{self, DepthImage, ReadbackError};
use crate::resources::{ResourceError, ResourceTracker, TargetId};

/// Format of the color attachment: 8 bits per RGBA channel.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Depth attachment formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthFormat {
    /// 32-bit float depth, copyable to buffers.
    #[default]
    Depth32Float,
    /// At least 24 bits of depth; cannot be read back.
    Depth24Plus,
}

impl DepthFormat {
    pub fn texture_format(self) -> wgpu::TextureFormat {
        match self {
            DepthFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
            DepthFormat::Depth24Plus => wgpu::TextureFormat::Depth24Plus,
        }
    }

    pub fn is_copyable(self) -> bool {
        matches!(self, DepthFormat::Depth32Float)
    }
}

#[derive(Error, Debug)]
pub enum RenderTargetError {
    #[error("render target size {width}x{height} must be non-zero")]
    InvalidSize { width: u32, height: u32 },
    #[error("render target size {width}x{height} exceeds the device limit of {limit}")]
    TooLarge { width: u32, height: u32, limit: u32 },
    #[error("framebuffer is incomplete: {0}")]
    Incomplete(String),
}

#[derive(Debug, Clone, Copy)]
pub struct RenderTargetDescriptor {
    pub width: u32,
    pub height: u32,
    pub depth_format: DepthFormat,
}

impl RenderTargetDescriptor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth_format: DepthFormat::default(),
        }
    }
}

pub struct RenderTarget {
    id: TargetId,
    width: u32,
    height: u32,
    depth_format: DepthFormat,
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
    tracker: Arc<ResourceTracker>,
    released: bool,
}

impl RenderTarget {
    /// Creates a target with the default depth format.
    pub fn create(ctx: &GpuContext, width: u32, height: u32) -> Result<Self, RenderTargetError> {
        Self::create_with(ctx, RenderTargetDescriptor::new(width, height))
    }

    pub fn create_with(
        ctx: &GpuContext,
        desc: RenderTargetDescriptor,
    ) -> Result<Self, RenderTargetError> {
        let RenderTargetDescriptor {
            width,
            height,
            depth_format,
        } = desc;
        if width == 0 || height == 0 {
            return Err(RenderTargetError::InvalidSize { width, height });
        }
        let limit = ctx.device.limits().max_texture_dimension_2d;
        if width > limit || height > limit {
            return Err(RenderTargetError::TooLarge {
                width,
                height,
                limit,
            });
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let mut depth_usage =
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        if depth_format.is_copyable() {
            depth_usage |= wgpu::TextureUsages::COPY_SRC;
        }

        let (color, depth) = ctx
            .check(|device| {
                let color = device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("Render Target Color"),
                    size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: COLOR_FORMAT,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                        | wgpu::TextureUsages::TEXTURE_BINDING
                        | wgpu::TextureUsages::COPY_SRC,
                    view_formats: &[],
                });
                let depth = device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("Render Target Depth"),
                    size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: depth_format.texture_format(),
                    usage: depth_usage,
                    view_formats: &[],
                });
                (color, depth)
            })
            .map_err(RenderTargetError::Incomplete)?;

        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        let tracker = Arc::clone(ctx.resources());
        let target = Self {
            id: tracker.register_target(),
            width,
            height,
            depth_format,
            color,
            color_view,
            depth,
            depth_view,
            tracker,
            released: false,
        };

        if !target.is_complete() {
            return Err(RenderTargetError::Incomplete(format!(
                "attachments differ in size: color {:?}, depth {:?}",
                target.color.size(),
                target.depth.size()
            )));
        }
        tracing::info!(
            "Render target [ID {}] created successfully ({}x{}, {:?})",
            target.id,
            width,
            height,
            depth_format
        );
        Ok(target)
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn depth_format(&self) -> DepthFormat {
        self.depth_format
    }

    pub fn color_view(&self) -> &wgpu::TextureView {
        &self.color_view
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    /// Both attachments exist with the same non-zero size.
    pub fn is_complete(&self) -> bool {
        let color = self.color.size();
        let depth = self.depth.size();
        !self.released
            && color.width > 0
            && color.height > 0
            && color.width == depth.width
            && color.height == depth.height
            && color.width == self.width
            && color.height == self.height
    }

    /// Binds the target for drawing.
    ///
    /// Color is cleared to `clear` and depth to [`depth::DEPTH_CLEAR`]. The
    /// target stays bound for as long as the returned pass lives; dropping it
    /// unbinds the target.
    pub fn bind<'a>(
        &'a self,
        encoder: &'a mut wgpu::CommandEncoder,
        clear: wgpu::Color,
    ) -> wgpu::RenderPass<'a> {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Render Target Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(depth::DEPTH_CLEAR),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }

    /// Reads the color attachment. Row 0 of the image is the bottom of the
    /// scene.
    pub fn read_color(&self, ctx: &GpuContext) -> Result<image::RgbaImage, ReadbackError> {
        let bytes = readback::read_texture(ctx, &self.color, wgpu::TextureAspect::All, 4)?;
        let expected = (self.width * self.height * 4) as usize;
        let got = bytes.len();
        image::RgbaImage::from_raw(self.width, self.height, bytes)
            .ok_or(ReadbackError::Size { expected, got })
    }

    /// Reads the depth attachment.
    ///
    /// Only [`DepthFormat::Depth32Float`] targets can be read back, and only
    /// on adapters where [`GpuContext::can_copy_depth`] holds.
    pub fn read_depth(&self, ctx: &GpuContext) -> Result<DepthImage, ReadbackError> {
        if !self.depth_format.is_copyable() {
            return Err(ReadbackError::DepthNotCopyable(self.depth_format.texture_format()));
        }
        if !ctx.can_copy_depth() {
            return Err(ReadbackError::DepthCopyUnsupported(ctx.adapter_info.name.clone()));
        }
        let bytes = readback::read_texture(ctx, &self.depth, wgpu::TextureAspect::DepthOnly, 4)?;
        let values = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok(DepthImage {
            width: self.width,
            height: self.height,
            values,
        })
    }

    /// Frees the color texture, then the depth texture, then the framebuffer
    /// id.
    pub fn destroy(mut self) -> Result<(), ResourceError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), ResourceError> {
        self.color.destroy();
        self.depth.destroy();
        self.released = true;
        self.tracker.release_target(self.id)?;
        tracing::info!("Render target [ID {}] unloaded", self.id);
        Ok(())
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        tracing::debug!("Render target [ID {}] dropped without destroy", self.id);
        if let Err(e) = self.release() {
            tracing::error!("{e}");
        }
    }
}
