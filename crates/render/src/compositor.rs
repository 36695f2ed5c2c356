//! Dual-pipeline compositor
//!
//! Owns the render target and the three passes, and runs them in a fixed
//! order every frame:
//!
//! 1. upload camera uniforms for both passes
//! 2. bind the target, clearing color to white and depth to 1.0
//! 3. ray-march the full target, writing color and depth
//! 4. rasterize the scene geometry against the same depth texture
//! 5. unbind the target (the render pass ends)
//! 6. blit the target to the screen with the rows flipped
//! 7. draw the overlay text in the same screen pass
//!
//! If the target cannot be created the compositor still runs, but every frame
//! is only the blit pass's clear.

use glam::Vec2;

use crate::blit::{self, BlitPass};
use crate::camera::Camera;
use crate::gpu::GpuContext;
use crate::overlay::TextOverlay;
use crate::raster::RasterPass;
use crate::raymarch::RayMarchPass;
use crate::resources::ResourceError;
use crate::scene::{SceneGeometry, SdfScene};
use crate::shader::{ShaderError, ShaderKind, ShaderSet};
use crate::target::{DepthFormat, RenderTarget, RenderTargetDescriptor};

/// Color the target is cleared to before the ray-march pass.
pub const TARGET_CLEAR: wgpu::Color = wgpu::Color::WHITE;

pub struct CompositorConfig {
    pub width: u32,
    pub height: u32,
    pub screen_format: wgpu::TextureFormat,
    pub depth_format: DepthFormat,
    pub geometry: SceneGeometry,
    pub sdf: SdfScene,
    pub shaders: ShaderSet,
}

impl CompositorConfig {
    /// The demo scene at the given size.
    pub fn new(width: u32, height: u32, screen_format: wgpu::TextureFormat) -> Self {
        Self {
            width,
            height,
            screen_format,
            depth_format: DepthFormat::default(),
            geometry: SceneGeometry::demo(),
            sdf: SdfScene::demo(),
            shaders: ShaderSet::default(),
        }
    }
}

/// Which passes [`Compositor::render_target_only`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Passes {
    pub raymarch: bool,
    pub raster: bool,
}

impl Passes {
    pub const ALL: Passes = Passes {
        raymarch: true,
        raster: true,
    };
    pub const RAYMARCH_ONLY: Passes = Passes {
        raymarch: true,
        raster: false,
    };
    pub const RASTER_ONLY: Passes = Passes {
        raymarch: false,
        raster: true,
    };
}

pub struct Compositor {
    target: Option<RenderTarget>,
    raymarch: RayMarchPass,
    raster: RasterPass,
    blit: BlitPass,
    overlay: TextOverlay,
    aspect: f32,
}

impl Compositor {
    pub fn new(ctx: &GpuContext, config: CompositorConfig) -> Result<Self, ShaderError> {
        let CompositorConfig {
            width,
            height,
            screen_format,
            depth_format,
            geometry,
            sdf,
            shaders,
        } = config;

        let mut raymarch = RayMarchPass::new(ctx, &shaders.raymarch, depth_format, sdf)?;
        let raster = RasterPass::new(ctx, &shaders.raster, depth_format, &geometry)?;
        let mut blit = BlitPass::new(ctx, &shaders.blit, screen_format)?;
        let overlay = TextOverlay::new(ctx, &shaders.overlay, screen_format, width, height)?;

        let desc = RenderTargetDescriptor {
            width,
            height,
            depth_format,
        };
        let target = match RenderTarget::create_with(ctx, desc) {
            Ok(target) => {
                blit.set_source(ctx, &target);
                Some(target)
            }
            Err(e) => {
                tracing::warn!("Render target could not be created: {e}; frames will be blank");
                None
            }
        };

        raymarch.set_screen_center(Vec2::new(width as f32, height as f32) * 0.5);

        Ok(Self {
            target,
            raymarch,
            raster,
            blit,
            overlay,
            aspect: width.max(1) as f32 / height.max(1) as f32,
        })
    }

    /// The render target, or `None` when it failed to create.
    pub fn target(&self) -> Option<&RenderTarget> {
        self.target.as_ref()
    }

    pub fn raymarch(&self) -> &RayMarchPass {
        &self.raymarch
    }

    pub fn set_geometry(&mut self, ctx: &GpuContext, geometry: &SceneGeometry) {
        self.raster.set_geometry(ctx, geometry);
    }

    pub fn set_sdf_scene(&mut self, scene: SdfScene) {
        self.raymarch.set_scene(scene);
    }

    /// Text drawn at the top-left of every frame, such as `"60 FPS"`.
    pub fn set_overlay_text(&mut self, ctx: &GpuContext, text: &str) {
        self.overlay.set_text(ctx, text);
    }

    pub fn overlay_text(&self) -> &str {
        self.overlay.text()
    }

    /// Size of the screen passed to [`Compositor::render`]. Starts as the
    /// target size.
    pub fn set_screen_size(&self, ctx: &GpuContext, width: u32, height: u32) {
        self.overlay.set_screen_size(ctx, width, height);
    }

    /// Uploads the camera uniforms of both passes.
    pub fn sync_uniforms(&mut self, ctx: &GpuContext, camera: &Camera) {
        self.raymarch.sync(ctx, camera);
        self.raster.sync(ctx, camera, self.aspect);
    }

    /// Renders one frame into the target, blits it to `screen` and draws the
    /// overlay over it.
    pub fn render(&mut self, ctx: &GpuContext, camera: &Camera, screen: &wgpu::TextureView) {
        self.sync_uniforms(ctx, camera);
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        self.encode_target(&mut encoder, Passes::ALL);
        {
            let mut pass = blit::begin_screen_pass(&mut encoder, screen);
            self.blit.draw(&mut pass);
            self.overlay.draw(&mut pass);
        }
        ctx.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Renders into the target without touching the screen.
    ///
    /// Returns the target so it can be read back, or `None` when there is no
    /// target to draw into.
    pub fn render_target_only(
        &mut self,
        ctx: &GpuContext,
        camera: &Camera,
        passes: Passes,
    ) -> Option<&RenderTarget> {
        self.target.as_ref()?;
        self.sync_uniforms(ctx, camera);
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Offscreen Encoder"),
            });
        self.encode_target(&mut encoder, passes);
        ctx.queue.submit(std::iter::once(encoder.finish()));
        self.target.as_ref()
    }

    fn encode_target(&self, encoder: &mut wgpu::CommandEncoder, passes: Passes) {
        let Some(target) = &self.target else {
            return;
        };
        let mut pass = target.bind(encoder, TARGET_CLEAR);
        if passes.raymarch {
            self.raymarch.draw(&mut pass);
        }
        if passes.raster {
            self.raster.draw(&mut pass);
        }
    }

    /// Recompiles one program. The running program is kept on failure.
    pub fn reload(
        &mut self,
        ctx: &GpuContext,
        kind: ShaderKind,
        source: &str,
    ) -> Result<(), ShaderError> {
        match kind {
            ShaderKind::RayMarch => self.raymarch.reload(ctx, source),
            ShaderKind::Raster => self.raster.reload(ctx, source),
            ShaderKind::Blit => self.blit.reload(ctx, source),
            ShaderKind::Overlay => self.overlay.reload(ctx, source),
        }
    }

    /// Releases the render target.
    pub fn destroy(mut self) -> Result<(), ResourceError> {
        self.blit.clear_source();
        match self.target.take() {
            Some(target) => target.destroy(),
            None => Ok(()),
        }
    }
}
