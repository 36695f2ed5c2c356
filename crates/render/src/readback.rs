//! Copying textures back to the CPU.

use thiserror::Error;

use crate::gpu::GpuContext;

#[derive(Error, Debug)]
pub enum ReadbackError {
    #[error("failed to map readback buffer: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
    #[error("readback callback was dropped before completing")]
    Channel,
    #[error("depth format {0:?} cannot be copied to a buffer")]
    DepthNotCopyable(wgpu::TextureFormat),
    #[error("adapter {0} cannot copy depth textures to buffers")]
    DepthCopyUnsupported(String),
    #[error("texture copy was rejected: {0}")]
    Copy(String),
    #[error("readback produced {got} bytes, expected {expected}")]
    Size { expected: usize, got: usize },
}

/// Depth values of a render target, one `f32` per pixel in row order.
#[derive(Debug, Clone)]
pub struct DepthImage {
    pub width: u32,
    pub height: u32,
    pub values: Vec<f32>,
}

impl DepthImage {
    /// Depth at `(x, y)`, or `None` outside the image.
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values.get((y * self.width + x) as usize).copied()
    }
}

/// Row pitch of a buffer copy, rounded up to wgpu's copy alignment.
pub fn padded_bytes_per_row(width: u32, bytes_per_pixel: u32) -> u32 {
    let unpadded = width * bytes_per_pixel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Copies one aspect of mip 0 of `texture` into tightly packed bytes.
///
/// The copy is recorded inside an error scope and only submitted when the
/// device accepts it. A rejected copy comes back as [`ReadbackError::Copy`].
pub fn read_texture(
    ctx: &GpuContext,
    texture: &wgpu::Texture,
    aspect: wgpu::TextureAspect,
    bytes_per_pixel: u32,
) -> Result<Vec<u8>, ReadbackError> {
    let size = texture.size();
    let unpadded = (size.width * bytes_per_pixel) as usize;
    let padded = padded_bytes_per_row(size.width, bytes_per_pixel);

    let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Buffer"),
        size: u64::from(padded) * u64::from(size.height),
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    ctx.check(|device| {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(size.height),
                },
            },
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );
        encoder.finish()
    })
    .map(|commands| ctx.queue.submit(Some(commands)))
    .map_err(ReadbackError::Copy)?;

    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    ctx.device.poll(wgpu::Maintain::Wait);
    rx.recv().map_err(|_| ReadbackError::Channel)??;

    let mut pixels = Vec::with_capacity(unpadded * size.height as usize);
    {
        let data = slice.get_mapped_range();
        for row in data.chunks(padded as usize) {
            pixels.extend_from_slice(&row[..unpadded]);
        }
    }
    buffer.unmap();

    let expected = unpadded * size.height as usize;
    if pixels.len() != expected {
        return Err(ReadbackError::Size { expected, got: pixels.len() });
    }
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(64, 4), 256);
        assert_eq!(padded_bytes_per_row(65, 4), 512);
        assert_eq!(padded_bytes_per_row(800, 4), 3328);
        assert_eq!(padded_bytes_per_row(1, 4), 256);
    }

    #[test]
    fn depth_lookup_is_bounded() {
        let image = DepthImage {
            width: 2,
            height: 2,
            values: vec![0.1, 0.2, 0.3, 0.4],
        };
        assert_eq!(image.get(1, 0), Some(0.2));
        assert_eq!(image.get(0, 1), Some(0.3));
        assert_eq!(image.get(2, 0), None);
        assert_eq!(image.get(0, 2), None);
        assert_eq!(image.get(u32::MAX, u32::MAX), None);
    }
}
