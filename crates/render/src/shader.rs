//! Shader programs and uniform locations
//!
//! WGSL sources are parsed and validated with naga before they reach wgpu, so
//! a broken shader is reported as a [`ShaderError`] instead of tripping the
//! device's error handler. The naga module is kept as reflection data:
//! [`ShaderProgram::uniform_location`] looks up a uniform struct member by
//! name and returns its offset, the equivalent of a GL uniform location.
//!
//! A location that cannot be resolved is `None`, and [`UniformBlock::set`]
//! turns an upload through it into an explicit no-op.

use std::path::{Path, PathBuf};

use bytemuck::Pod;
use thiserror::Error;

use crate::gpu::GpuContext;

pub const RAYMARCH_WGSL: &str = include_str!("../../../shaders/raymarch.wgsl");
pub const RASTER_WGSL: &str = include_str!("../../../shaders/raster.wgsl");
pub const BLIT_WGSL: &str = include_str!("../../../shaders/blit.wgsl");
pub const OVERLAY_WGSL: &str = include_str!("../../../shaders/overlay.wgsl");

/// Vertex stage entry point every program must export.
pub const VERTEX_ENTRY: &str = "vs_main";
/// Fragment stage entry point every program must export.
pub const FRAGMENT_ENTRY: &str = "fs_main";

#[derive(Error, Debug)]
pub enum ShaderError {
    #[error("failed to read shader {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("WGSL parse error in {label}:\n{report}")]
    Parse { label: String, report: String },
    #[error("WGSL validation error in {label}:\n{report}")]
    Validation { label: String, report: String },
    #[error("shader {label} has no entry point `{entry}`")]
    MissingEntryPoint { label: String, entry: &'static str },
    #[error("failed to create pipeline for {label}: {message}")]
    Pipeline { label: String, message: String },
}

/// The programs used by the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    RayMarch,
    Raster,
    Blit,
    Overlay,
}

impl ShaderKind {
    pub const ALL: [ShaderKind; 4] = [
        ShaderKind::RayMarch,
        ShaderKind::Raster,
        ShaderKind::Blit,
        ShaderKind::Overlay,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            ShaderKind::RayMarch => "raymarch.wgsl",
            ShaderKind::Raster => "raster.wgsl",
            ShaderKind::Blit => "blit.wgsl",
            ShaderKind::Overlay => "overlay.wgsl",
        }
    }

    pub fn embedded_source(self) -> &'static str {
        match self {
            ShaderKind::RayMarch => RAYMARCH_WGSL,
            ShaderKind::Raster => RASTER_WGSL,
            ShaderKind::Blit => BLIT_WGSL,
            ShaderKind::Overlay => OVERLAY_WGSL,
        }
    }

    /// Maps a file name back to its program.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        Self::ALL.into_iter().find(|kind| kind.file_name() == name)
    }
}

/// WGSL sources for all programs.
#[derive(Debug, Clone)]
pub struct ShaderSet {
    pub raymarch: String,
    pub raster: String,
    pub blit: String,
    pub overlay: String,
}

impl Default for ShaderSet {
    fn default() -> Self {
        Self {
            raymarch: RAYMARCH_WGSL.to_owned(),
            raster: RASTER_WGSL.to_owned(),
            blit: BLIT_WGSL.to_owned(),
            overlay: OVERLAY_WGSL.to_owned(),
        }
    }
}

impl ShaderSet {
    /// Loads every program from `dir`, falling back to the embedded source
    /// for files that cannot be read.
    pub fn load(dir: &Path) -> Self {
        let mut set = Self::default();
        for kind in ShaderKind::ALL {
            match read_source(&dir.join(kind.file_name())) {
                Ok(source) => *set.get_mut(kind) = source,
                Err(e) => tracing::warn!("{e}; using embedded {}", kind.file_name()),
            }
        }
        set
    }

    pub fn get(&self, kind: ShaderKind) -> &str {
        match kind {
            ShaderKind::RayMarch => &self.raymarch,
            ShaderKind::Raster => &self.raster,
            ShaderKind::Blit => &self.blit,
            ShaderKind::Overlay => &self.overlay,
        }
    }

    fn get_mut(&mut self, kind: ShaderKind) -> &mut String {
        match kind {
            ShaderKind::RayMarch => &mut self.raymarch,
            ShaderKind::Raster => &mut self.raster,
            ShaderKind::Blit => &mut self.blit,
            ShaderKind::Overlay => &mut self.overlay,
        }
    }
}

/// Reads shader source text from disk.
pub fn read_source(path: &Path) -> Result<String, ShaderError> {
    std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
        path: path.to_owned(),
        source,
    })
}

/// Shader capabilities a device with `features` supports.
///
/// Sources are validated against these before reaching the device, so a
/// program using something the device lacks (`f64`, push constants) fails
/// validation instead of module creation.
pub fn capabilities_for(features: wgpu::Features) -> naga::valid::Capabilities {
    use naga::valid::Capabilities;
    let mut caps = Capabilities::empty();
    caps.set(Capabilities::FLOAT64, features.contains(wgpu::Features::SHADER_F64));
    caps.set(
        Capabilities::PUSH_CONSTANT,
        features.contains(wgpu::Features::PUSH_CONSTANTS),
    );
    caps.set(
        Capabilities::PRIMITIVE_INDEX,
        features.contains(wgpu::Features::SHADER_PRIMITIVE_INDEX),
    );
    caps.set(Capabilities::MULTIVIEW, features.contains(wgpu::Features::MULTIVIEW));
    caps
}

/// Parses and validates WGSL for a device without optional features, and
/// checks the expected entry points exist.
pub fn parse_and_validate(label: &str, source: &str) -> Result<naga::Module, ShaderError> {
    parse_and_validate_with(label, source, capabilities_for(wgpu::Features::empty()))
}

pub fn parse_and_validate_with(
    label: &str,
    source: &str,
    capabilities: naga::valid::Capabilities,
) -> Result<naga::Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Parse {
        label: label.to_owned(),
        report: e.emit_to_string(source),
    })?;

    let mut validator =
        naga::valid::Validator::new(naga::valid::ValidationFlags::all(), capabilities);
    validator
        .validate(&module)
        .map_err(|e| ShaderError::Validation {
            label: label.to_owned(),
            report: e.emit_to_string(source),
        })?;

    for entry in [VERTEX_ENTRY, FRAGMENT_ENTRY] {
        if !module.entry_points.iter().any(|ep| ep.name == entry) {
            return Err(ShaderError::MissingEntryPoint {
                label: label.to_owned(),
                entry,
            });
        }
    }

    Ok(module)
}

/// Shape of a uniform value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformKind {
    fn from_type(inner: &naga::TypeInner) -> Option<Self> {
        use naga::{ScalarKind, TypeInner, VectorSize};
        let is_f32 = |scalar: &naga::Scalar| scalar.kind == ScalarKind::Float && scalar.width == 4;
        match inner {
            TypeInner::Scalar(scalar) if is_f32(scalar) => Some(Self::Float),
            TypeInner::Vector { size, scalar } if is_f32(scalar) => Some(match size {
                VectorSize::Bi => Self::Vec2,
                VectorSize::Tri => Self::Vec3,
                VectorSize::Quad => Self::Vec4,
            }),
            TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                scalar,
            } if is_f32(scalar) => Some(Self::Mat4),
            _ => None,
        }
    }
}

/// Resolved location of a uniform struct member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformHandle {
    pub group: u32,
    pub binding: u32,
    pub offset: u32,
    pub kind: UniformKind,
}

/// Finds the member called `name` in any uniform-space struct of `module`.
pub fn find_uniform(module: &naga::Module, name: &str) -> Option<UniformHandle> {
    module.global_variables.iter().find_map(|(_, var)| {
        if var.space != naga::AddressSpace::Uniform {
            return None;
        }
        let binding = var.binding.as_ref()?;
        let naga::TypeInner::Struct { members, .. } = &module.types[var.ty].inner else {
            return None;
        };
        let member = members.iter().find(|m| m.name.as_deref() == Some(name))?;
        let kind = UniformKind::from_type(&module.types[member.ty].inner)?;
        Some(UniformHandle {
            group: binding.group,
            binding: binding.binding,
            offset: member.offset,
            kind,
        })
    })
}

/// Size in bytes of the uniform struct bound at `group`/`binding`.
pub fn uniform_block_size(module: &naga::Module, group: u32, binding: u32) -> Option<u32> {
    module.global_variables.iter().find_map(|(_, var)| {
        let rb = var.binding.as_ref()?;
        if var.space != naga::AddressSpace::Uniform || rb.group != group || rb.binding != binding {
            return None;
        }
        match &module.types[var.ty].inner {
            naga::TypeInner::Struct { span, .. } => Some(*span),
            _ => None,
        }
    })
}

/// A compiled program with its reflection data.
pub struct ShaderProgram {
    pub label: String,
    pub module: wgpu::ShaderModule,
    reflection: naga::Module,
}

impl ShaderProgram {
    /// Validates `source` against the device's capabilities and creates the
    /// module inside an error scope.
    pub fn compile(ctx: &GpuContext, label: &str, source: &str) -> Result<Self, ShaderError> {
        let capabilities = capabilities_for(ctx.device.features());
        let reflection = parse_and_validate_with(label, source, capabilities)?;
        let module = ctx
            .check(|device| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                })
            })
            .map_err(|report| ShaderError::Validation {
                label: label.to_owned(),
                report,
            })?;
        Ok(Self {
            label: label.to_owned(),
            module,
            reflection,
        })
    }

    pub fn uniform_location(&self, name: &str) -> Option<UniformHandle> {
        let handle = find_uniform(&self.reflection, name);
        if handle.is_none() {
            tracing::warn!("{}: uniform `{name}` not found, uploads will be skipped", self.label);
        }
        handle
    }

    pub fn uniform_block_size(&self, group: u32, binding: u32) -> Option<u32> {
        uniform_block_size(&self.reflection, group, binding)
    }
}

/// Values that can be written through a [`UniformHandle`].
pub trait UniformValue: Pod {
    const KIND: UniformKind;
}

impl UniformValue for f32 {
    const KIND: UniformKind = UniformKind::Float;
}

impl UniformValue for [f32; 2] {
    const KIND: UniformKind = UniformKind::Vec2;
}

impl UniformValue for [f32; 3] {
    const KIND: UniformKind = UniformKind::Vec3;
}

impl UniformValue for [f32; 4] {
    const KIND: UniformKind = UniformKind::Vec4;
}

impl UniformValue for [[f32; 4]; 4] {
    const KIND: UniformKind = UniformKind::Mat4;
}

/// CPU staging copy of one uniform struct.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    bytes: Vec<u8>,
}

impl UniformBlock {
    /// Allocates a zeroed block, rounded up to 16 bytes.
    pub fn new(size: u32) -> Self {
        let size = (size.max(16) as usize).next_multiple_of(16);
        Self { bytes: vec![0; size] }
    }

    /// Writes `value` at the handle's offset.
    ///
    /// Returns `false` without touching the block when the handle is absent,
    /// has a different kind, or points past the end of the block.
    pub fn set<T: UniformValue>(&mut self, handle: Option<UniformHandle>, value: T) -> bool {
        let Some(handle) = handle else {
            tracing::trace!("skipping upload to unresolved uniform");
            return false;
        };
        if handle.kind != T::KIND {
            tracing::warn!(
                "uniform at offset {} is {:?}, refusing to write {:?}",
                handle.offset,
                handle.kind,
                T::KIND
            );
            return false;
        }
        let start = handle.offset as usize;
        let data = bytemuck::bytes_of(&value);
        match self.bytes.get_mut(start..start + data.len()) {
            Some(dst) => {
                dst.copy_from_slice(data);
                true
            }
            None => false,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}
