//! Hybrid ray-march and raster rendering into one depth-consistent target.
//!
//! A [`RenderTarget`] owns a color texture and a depth texture. Each frame the
//! [`Compositor`] ray-marches the full target, rasterizes explicit geometry
//! against the depth the marcher wrote, then blits the result to the screen with a frame-rate readout on top.

pub mod blit;
pub mod camera;
pub mod compositor;
pub mod depth;
pub mod gpu;
pub mod overlay;
pub mod pipeline;
pub mod raster;
pub mod raymarch;
pub mod readback;
pub mod resources;
pub mod scene;
pub mod shader;
pub mod target;

pub use camera::{Camera, CameraController};
pub use compositor::{Compositor, CompositorConfig, Passes};
pub use gpu::{GpuContext, GpuError};
pub use resources::{ResourceCounts, ResourceError, ResourceTracker, TargetId};
pub use scene::{SceneGeometry, SdfScene};
pub use shader::{ShaderError, ShaderKind, ShaderSet};
pub use target::{DepthFormat, RenderTarget, RenderTargetDescriptor, RenderTargetError};
