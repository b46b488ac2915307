//! Pixel buffers backing rendered tiles

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pixel layout of a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 32-bit RGBA, 4 bytes per pixel.
    Rgba8888,
    /// 16-bit RGB 5-6-5, little endian, 2 bytes per pixel.
    Rgb565,
}

impl PixelFormat {
    /// Number of bytes used by a single pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8888 => 4,
            PixelFormat::Rgb565 => 2,
        }
    }
}

/// Rasterization quality knob.
///
/// `Best` renders into 32-bit buffers, `Fast` halves memory with 16-bit ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderQuality {
    Best,
    #[default]
    Fast,
}

impl RenderQuality {
    pub const fn pixel_format(self) -> PixelFormat {
        match self {
            RenderQuality::Best => PixelFormat::Rgba8888,
            RenderQuality::Fast => PixelFormat::Rgb565,
        }
    }
}

/// Raised when a pixel buffer cannot be allocated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot allocate {width}x{height} pixel buffer ({bytes} bytes)")]
pub struct AllocationError {
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
}

/// Owned pixel storage for a rendered tile or thumbnail.
///
/// The memory is released when the buffer is dropped, so whoever owns the
/// buffer (the cache, or a tile being discarded) is responsible for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Allocate a zeroed buffer, reporting allocation failure instead of aborting.
    pub fn try_new(width: u32, height: u32, format: PixelFormat) -> Result<Self, AllocationError> {
        let overflow = AllocationError {
            width,
            height,
            bytes: usize::MAX,
        };
        let bytes = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(format.bytes_per_pixel()))
            .ok_or(overflow)?;

        let mut data = Vec::new();
        data.try_reserve_exact(bytes).map_err(|_| AllocationError {
            width,
            height,
            bytes,
        })?;
        data.resize(bytes, 0);

        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Fill every pixel with one RGBA color.
    pub fn fill(&mut self, rgba: [u8; 4]) {
        let bpp = self.format.bytes_per_pixel();
        let encoded = encode(self.format, rgba);
        for pixel in self.data.chunks_exact_mut(bpp) {
            pixel.copy_from_slice(&encoded[..bpp]);
        }
    }

    /// Write one RGBA pixel, converting to the buffer format.
    /// Coordinates outside the buffer are ignored.
    pub fn put_rgba(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let bpp = self.format.bytes_per_pixel();
        let start = y as usize * self.stride() + x as usize * bpp;
        let encoded = encode(self.format, rgba);
        self.data[start..start + bpp].copy_from_slice(&encoded[..bpp]);
    }

    /// Read back one pixel as RGBA.
    pub fn rgba_at(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let start = y as usize * self.stride() + x as usize * bpp;
        let px = &self.data[start..start + bpp];
        Some(match self.format {
            PixelFormat::Rgba8888 => [px[0], px[1], px[2], px[3]],
            PixelFormat::Rgb565 => {
                let v = u16::from_le_bytes([px[0], px[1]]);
                let r = ((v >> 11) & 0x1f) as u8;
                let g = ((v >> 5) & 0x3f) as u8;
                let b = (v & 0x1f) as u8;
                [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2), 255]
            }
        })
    }

    /// Copy a window of an RGBA source image into this buffer.
    ///
    /// The window starts at (`src_x`, `src_y`) in the source and has the size
    /// of this buffer. Pixels falling outside the source are left untouched.
    pub fn blit_rgba(&mut self, src: &[u8], src_width: u32, src_height: u32, src_x: i64, src_y: i64) {
        let src_stride = src_width as usize * 4;
        for row in 0..self.height {
            let sy = src_y + i64::from(row);
            if sy < 0 || sy >= i64::from(src_height) {
                continue;
            }
            for col in 0..self.width {
                let sx = src_x + i64::from(col);
                if sx < 0 || sx >= i64::from(src_width) {
                    continue;
                }
                let idx = sy as usize * src_stride + sx as usize * 4;
                if let Some(px) = src.get(idx..idx + 4) {
                    self.put_rgba(col, row, [px[0], px[1], px[2], px[3]]);
                }
            }
        }
    }
}

/// Pixel bytes in `format`; only the first `bytes_per_pixel` are meaningful.
fn encode(format: PixelFormat, [r, g, b, a]: [u8; 4]) -> [u8; 4] {
    match format {
        PixelFormat::Rgba8888 => [r, g, b, a],
        PixelFormat::Rgb565 => {
            let v = (u16::from(r >> 3) << 11) | (u16::from(g >> 2) << 5) | u16::from(b >> 3);
            let [lo, hi] = v.to_le_bytes();
            [lo, hi, 0, 0]
        }
    }
}
