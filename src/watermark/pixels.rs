//! Pixel buffers, power-of-two padding and YUV channel planes.

use image::RgbaImage;

use super::error::WatermarkError;
use super::plane::Plane;
use super::Result;

/// Fill value for padded pixels (white, opaque).
const PAD_FILL: u8 = 255;

/// Row-major RGBA8 pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap RGBA samples, checking that the length matches the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(WatermarkError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(WatermarkError::InvalidBuffer {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Buffer of the given size with every channel set to `fill`.
    pub fn filled(width: u32, height: u32, fill: [u8; 4]) -> Result<Self> {
        let count = width as usize * height as usize;
        let mut data = Vec::with_capacity(count * 4);
        for _ in 0..count {
            data.extend_from_slice(&fill);
        }
        Self::new(width, height, data)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.index(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, px: [u8; 4]) {
        let i = self.index(x, y);
        self.data[i..i + 4].copy_from_slice(&px);
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Convert into an `image` crate buffer.
    pub fn into_rgba_image(self) -> RgbaImage {
        // Length was validated at construction.
        RgbaImage::from_raw(self.width, self.height, self.data)
            .unwrap_or_else(|| RgbaImage::new(0, 0))
    }

    /// Luma plane using the BT.601 weights, same as the Y channel of [`to_yuv`].
    pub fn luma_plane(&self) -> Plane {
        Plane::from_fn(self.height as usize, self.width as usize, |r, c| {
            let [red, g, b, _] = self.pixel(c as u32, r as u32);
            rgb_to_yuv(red as f64, g as f64, b as f64).0
        })
    }
}

impl TryFrom<RgbaImage> for PixelBuffer {
    type Error = WatermarkError;

    fn try_from(img: RgbaImage) -> Result<Self> {
        let (w, h) = img.dimensions();
        PixelBuffer::new(w, h, img.into_raw())
    }
}

// ---------------------------------------------------------------------------
// Power-of-two padding
// ---------------------------------------------------------------------------

/// Pad both dimensions up to the next power of two with opaque white.
///
/// Returns the padded buffer together with the original width and height.
/// An image that is already power-of-two sized is returned as a plain copy.
pub fn pad_to_power_of_two(buffer: &PixelBuffer) -> (PixelBuffer, u32, u32) {
    let (w, h) = (buffer.width, buffer.height);
    let new_w = w.next_power_of_two();
    let new_h = h.next_power_of_two();
    if new_w == w && new_h == h {
        return (buffer.clone(), w, h);
    }

    let mut data = vec![PAD_FILL; new_w as usize * new_h as usize * 4];
    let src_stride = w as usize * 4;
    let dst_stride = new_w as usize * 4;
    for row in 0..h as usize {
        let src = &buffer.data[row * src_stride..(row + 1) * src_stride];
        data[row * dst_stride..row * dst_stride + src_stride].copy_from_slice(src);
    }

    let padded = PixelBuffer {
        width: new_w,
        height: new_h,
        data,
    };
    (padded, w, h)
}

/// Crop back to the top-left `width × height` region.
pub fn remove_padding(buffer: &PixelBuffer, width: u32, height: u32) -> PixelBuffer {
    if buffer.width == width && buffer.height == height {
        return buffer.clone();
    }
    let width = width.min(buffer.width);
    let height = height.min(buffer.height);
    let src_stride = buffer.width as usize * 4;
    let dst_stride = width as usize * 4;
    let mut data = Vec::with_capacity(dst_stride * height as usize);
    for row in 0..height as usize {
        data.extend_from_slice(&buffer.data[row * src_stride..row * src_stride + dst_stride]);
    }
    PixelBuffer {
        width,
        height,
        data,
    }
}

// ---------------------------------------------------------------------------
// Color space conversion
// ---------------------------------------------------------------------------

#[inline]
fn rgb_to_yuv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = -0.14713 * r - 0.28886 * g + 0.436 * b;
    let v = 0.615 * r - 0.51499 * g - 0.10001 * b;
    (y, u, v)
}

#[inline]
fn yuv_to_rgb(y: f64, u: f64, v: f64) -> (f64, f64, f64) {
    let r = y + 1.13983 * v;
    let g = y - 0.39465 * u - 0.58060 * v;
    let b = y + 2.03211 * u;
    (r, g, b)
}

#[inline]
fn to_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Y, U, V planes of a pixel buffer plus its untouched alpha channel.
#[derive(Clone, Debug)]
pub struct YuvPlanes {
    pub y: Plane,
    pub u: Plane,
    pub v: Plane,
    pub alpha: Vec<u8>,
}

/// Split a pixel buffer into real-valued Y, U, V planes.
pub fn to_yuv(buffer: &PixelBuffer) -> YuvPlanes {
    let rows = buffer.height as usize;
    let cols = buffer.width as usize;
    let mut y = Plane::zeros(rows, cols);
    let mut u = Plane::zeros(rows, cols);
    let mut v = Plane::zeros(rows, cols);
    let mut alpha = Vec::with_capacity(rows * cols);

    for (i, px) in buffer.data.chunks_exact(4).enumerate() {
        let (yy, uu, vv) = rgb_to_yuv(px[0] as f64, px[1] as f64, px[2] as f64);
        let (r, c) = (i / cols, i % cols);
        y.set(r, c, yy);
        u.set(r, c, uu);
        v.set(r, c, vv);
        alpha.push(px[3]);
    }

    YuvPlanes { y, u, v, alpha }
}

/// Reassemble YUV planes into RGBA, rounding and clipping to [0, 255].
///
/// `alpha` is copied through unchanged.
pub fn from_yuv(y: &Plane, u: &Plane, v: &Plane, alpha: &[u8]) -> Result<PixelBuffer> {
    y.ensure_same_shape(u)?;
    y.ensure_same_shape(v)?;
    let rows = y.rows();
    let cols = y.cols();
    if alpha.len() != rows * cols {
        return Err(WatermarkError::InvalidBuffer {
            expected: rows * cols,
            got: alpha.len(),
        });
    }

    let mut data = Vec::with_capacity(rows * cols * 4);
    for r in 0..rows {
        for c in 0..cols {
            let (red, g, b) = yuv_to_rgb(y.get(r, c), u.get(r, c), v.get(r, c));
            data.extend_from_slice(&[to_u8(red), to_u8(g), to_u8(b), alpha[r * cols + c]]);
        }
    }
    PixelBuffer::new(cols as u32, rows as u32, data)
}

impl YuvPlanes {
    /// Merge back into a pixel buffer.
    pub fn to_pixels(&self) -> Result<PixelBuffer> {
        from_yuv(&self.y, &self.u, &self.v, &self.alpha)
    }
}
