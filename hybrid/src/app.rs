//! # Application loop
//!
//! Owns the window, the presentation surface and the [`Compositor`], and
//! drives them from the `winit` event loop. Every frame moves the camera from
//! input, applies pending shader reloads, renders with the frame-rate readout
//! on top, presents, and sleeps out the rest of the frame budget.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use render::shader;
use render::{
    Camera, CameraController, Compositor, CompositorConfig, GpuContext, ShaderKind, ShaderSet,
};
use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowBuilder};

use crate::fps::FpsCounter;
use crate::watcher::ShaderWatcher;
use crate::Args;

const TITLE: &str = "Hybrid Renderer";

/// Opens the window and runs until it is closed, Esc is pressed or the
/// requested number of frames has been rendered.
///
/// # Errors
///
/// Returns an error when the window, surface, device or shader programs
/// cannot be created.
pub fn run(args: Args) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(TITLE)
            .with_inner_size(PhysicalSize::new(args.width, args.height))
            .with_resizable(false)
            .build(&event_loop)
            .context("failed to create window")?,
    );

    let mut app = pollster::block_on(App::new(window, &args))?;

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent {
            ref event,
            window_id,
        } if window_id == app.window.id() => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => {
                if *code == KeyCode::Escape && *state == ElementState::Pressed {
                    elwt.exit();
                } else {
                    app.controller.process_keyboard(*code, *state);
                }
            }
            WindowEvent::Resized(size) => app.resize(*size),
            WindowEvent::RedrawRequested => {
                let frame_start = Instant::now();
                app.update();
                match app.render() {
                    Ok(()) => {}
                    // Reconfigure the surface if lost
                    Err(wgpu::SurfaceError::Lost) => app.resize(app.window.inner_size()),
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        error!("Surface out of memory");
                        elwt.exit();
                    }
                    // Outdated and Timeout resolve by the next frame
                    Err(e) => warn!("{e:?}"),
                }
                if app.finished() {
                    elwt.exit();
                } else {
                    app.pace(frame_start);
                }
            }
            _ => {}
        },
        Event::DeviceEvent {
            event: DeviceEvent::MouseMotion { delta },
            ..
        } => app.controller.process_mouse(delta.0, delta.1),
        Event::AboutToWait => app.window.request_redraw(),
        Event::LoopExiting => app.shutdown(),
        _ => {}
    })?;
    Ok(())
}

struct App {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    ctx: GpuContext,
    compositor: Option<Compositor>,
    camera: Camera,
    controller: CameraController,
    watcher: Option<ShaderWatcher>,
    fps: FpsCounter,
    last_update: Instant,
    frame_duration: Duration,
    frames_rendered: u64,
    max_frames: Option<u64>,
    screenshot: Option<PathBuf>,
}

impl App {
    async fn new(window: Arc<Window>, args: &Args) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("failed to create surface")?;
        let ctx = GpuContext::new(&instance, Some(&surface)).await?;

        let caps = surface.get_capabilities(&ctx.adapter);
        // The target holds display-ready bytes, so present them unconverted.
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no supported formats")?;
        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            desired_maximum_frame_latency: 2,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&ctx.device, &config);

        let shaders = args
            .shaders
            .as_deref()
            .map(ShaderSet::load)
            .unwrap_or_default();
        let watcher = args.shaders.as_deref().and_then(|dir| match ShaderWatcher::start(dir) {
            Ok(watcher) => {
                info!("Shader watcher started successfully.");
                Some(watcher)
            }
            Err(e) => {
                error!("Failed to start shader watcher: {e:?}");
                None
            }
        });

        let mut compositor = Compositor::new(
            &ctx,
            CompositorConfig {
                shaders,
                ..CompositorConfig::new(args.width, args.height, format)
            },
        )?;
        compositor.set_screen_size(&ctx, config.width, config.height);
        compositor.set_overlay_text(&ctx, &fps_text(0.0));

        let mut camera = Camera::demo();
        camera.set_fovy(args.fov);

        if let Err(e) = window
            .set_cursor_grab(CursorGrabMode::Confined)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
        {
            warn!("Could not grab cursor: {e}");
        }
        window.set_cursor_visible(false);

        let now = Instant::now();
        Ok(Self {
            window,
            surface,
            config,
            ctx,
            compositor: Some(compositor),
            camera,
            controller: CameraController::new(2.0, 1.0),
            watcher,
            fps: FpsCounter::new(now),
            last_update: now,
            frame_duration: Duration::from_secs_f32(1.0 / args.target_fps.max(1) as f32),
            frames_rendered: 0,
            max_frames: args.frames,
            screenshot: args.screenshot.clone(),
        })
    }

    /// Reconfigures the surface. The render target keeps its size and is
    /// stretched over the new surface by the blit.
    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.ctx.device, &self.config);
            if let Some(compositor) = &self.compositor {
                compositor.set_screen_size(&self.ctx, new_size.width, new_size.height);
            }
        }
    }

    fn update(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        self.controller.update_camera(&mut self.camera, dt);
        self.reload_changed_shaders();
    }

    fn reload_changed_shaders(&mut self) {
        let (Some(watcher), Some(compositor)) = (&self.watcher, self.compositor.as_mut()) else {
            return;
        };
        for path in watcher.drain() {
            let Some(kind) = ShaderKind::from_path(&path) else {
                debug!("Ignoring change to {}", path.display());
                continue;
            };
            let result = shader::read_source(&path)
                .and_then(|source| compositor.reload(&self.ctx, kind, &source));
            if let Err(e) = result {
                error!("Keeping previous {} program: {e}", kind.file_name());
            }
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let Some(compositor) = self.compositor.as_mut() else {
            return Ok(());
        };
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        compositor.render(&self.ctx, &self.camera, &view);
        output.present();

        self.frames_rendered += 1;
        if let Some(fps) = self.fps.tick(Instant::now()) {
            compositor.set_overlay_text(&self.ctx, &fps_text(fps));
            debug!("{fps:.1} FPS");
        }
        Ok(())
    }

    fn finished(&self) -> bool {
        self.max_frames.is_some_and(|limit| self.frames_rendered >= limit)
    }

    /// Sleeps out the remainder of the frame budget.
    fn pace(&self, frame_start: Instant) {
        let frame_time = frame_start.elapsed();
        if frame_time < self.frame_duration {
            std::thread::sleep(self.frame_duration - frame_time);
        }
    }

    fn shutdown(&mut self) {
        let Some(compositor) = self.compositor.take() else {
            return;
        };
        if let Some(path) = self.screenshot.take() {
            if let Err(e) = save_screenshot(&self.ctx, &compositor, &path) {
                error!("Failed to save screenshot: {e:#}");
            }
        }
        if let Err(e) = compositor.destroy() {
            error!("{e}");
        }
        info!(
            "Rendered {} frames, last reading {:.1} FPS",
            self.frames_rendered,
            self.fps.fps()
        );
    }
}

fn fps_text(fps: f32) -> String {
    format!("{fps:.0} FPS")
}

/// Saves the last composited frame in screen orientation.
fn save_screenshot(ctx: &GpuContext, compositor: &Compositor, path: &Path) -> Result<()> {
    let target = compositor
        .target()
        .context("no render target to capture")?;
    let image = target.read_color(ctx)?;
    image::imageops::flip_vertical(&image)
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("Screenshot saved to {}", path.display());
    Ok(())
}
