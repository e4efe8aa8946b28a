// Decoded image containers and conversion to `image` types

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::error::{JpegError, Result};
use crate::layout::planner::{PlaneLayout, plan_planes};
use crate::layout::{ChromaRatio, ImageInfo};

/// Three aligned YCbCr planes in one buffer, as filled by a raw decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YCbCrImage {
    width: u32,
    height: u32,
    layout: PlaneLayout,
    data: Vec<u8>,
}

impl YCbCrImage {
    pub fn new(width: u32, height: u32, ratio: ChromaRatio, data: Vec<u8>) -> Result<Self> {
        let layout = plan_planes(width, height, ratio);
        if !layout.is_raw_capable() {
            return Err(JpegError::unsupported(format!(
                "no plane layout for chroma ratio {ratio}"
            )));
        }
        JpegError::check_buffer(layout.total_len(), data.len())?;
        Ok(YCbCrImage {
            width,
            height,
            layout,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn ratio(&self) -> ChromaRatio {
        self.layout.ratio
    }

    pub fn layout(&self) -> &PlaneLayout {
        &self.layout
    }

    /// Plane 0 (Y), 1 (Cb) or 2 (Cr), including alignment padding.
    pub fn plane(&self, index: usize) -> &[u8] {
        &self.data[self.layout.plane_range(index)]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Convert to RGB with full-range BT.601 coefficients.
    pub fn to_rgb(&self) -> RgbImage {
        let (x_div, y_div) = match self.layout.ratio {
            ChromaRatio::S422 | ChromaRatio::S420 => (2, self.layout.row_divisor),
            ChromaRatio::S411 | ChromaRatio::S410 => (4, self.layout.row_divisor),
            _ => (1, self.layout.row_divisor),
        };
        let ys = self.layout.y_stride();
        let cs = self.layout.c_stride();
        let (y_plane, cb_plane, cr_plane) = (self.plane(0), self.plane(1), self.plane(2));

        RgbImage::from_fn(self.width, self.height, |x, y| {
            let (x, y) = (x as usize, y as usize);
            let luma = f32::from(y_plane[y * ys + x]);
            let ci = (y / y_div) * cs + x / x_div;
            let cb = f32::from(cb_plane[ci]) - 128.0;
            let cr = f32::from(cr_plane[ci]) - 128.0;
            let r = luma + 1.402 * cr;
            let g = luma - 0.344_136 * cb - 0.714_136 * cr;
            let b = luma + 1.772 * cb;
            image::Rgb([clamp_u8(r), clamp_u8(g), clamp_u8(b)])
        })
    }
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Packed 4-byte CMYK pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmykImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl CmykImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        JpegError::check_buffer(width as usize * height as usize * 4, data.len())?;
        Ok(CmykImage {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Naive conversion without color management.
    pub fn to_rgb(&self) -> RgbImage {
        let w = self.width as usize;
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let i = (y as usize * w + x as usize) * 4;
            let k = 255 - u32::from(self.data[i + 3]);
            let channel = |c: u8| ((255 - u32::from(c)) * k / 255) as u8;
            image::Rgb([
                channel(self.data[i]),
                channel(self.data[i + 1]),
                channel(self.data[i + 2]),
            ])
        })
    }
}

/// Pixel buffer produced by a full decode.
#[derive(Debug, Clone)]
pub enum Pixels {
    Gray(GrayImage),
    Rgba(RgbaImage),
    YCbCr(YCbCrImage),
    Cmyk(CmykImage),
}

/// A decoded image together with the descriptor the decoder reported.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    info: ImageInfo,
    pixels: Pixels,
}

impl DecodedImage {
    /// Wrap a buffer filled by [`crate::codec::decoder::Decoder::decode_into`].
    pub fn from_buffer(info: ImageInfo, buffer: Vec<u8>) -> Result<Self> {
        use crate::layout::ColorPlan;

        let (w, h) = (info.width, info.height);
        let too_small = || JpegError::image(format!("decoded buffer does not fit {w}x{h}"));
        let pixels = match info.plan() {
            ColorPlan::Gray => Pixels::Gray(GrayImage::from_raw(w, h, buffer).ok_or_else(too_small)?),
            ColorPlan::Rgb(_) => Pixels::Rgba(RgbaImage::from_raw(w, h, buffer).ok_or_else(too_small)?),
            ColorPlan::YCbCr(ratio) => Pixels::YCbCr(YCbCrImage::new(w, h, ratio, buffer)?),
            ColorPlan::Cmyk => Pixels::Cmyk(CmykImage::new(w, h, buffer)?),
        };
        Ok(DecodedImage { info, pixels })
    }

    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    pub fn pixels(&self) -> &Pixels {
        &self.pixels
    }

    pub fn into_pixels(self) -> Pixels {
        self.pixels
    }

    /// Convert into an `image` crate buffer for saving or further processing.
    pub fn to_dynamic(&self) -> DynamicImage {
        match &self.pixels {
            Pixels::Gray(img) => DynamicImage::ImageLuma8(img.clone()),
            Pixels::Rgba(img) => DynamicImage::ImageRgba8(img.clone()),
            Pixels::YCbCr(img) => DynamicImage::ImageRgb8(img.to_rgb()),
            Pixels::Cmyk(img) => DynamicImage::ImageRgb8(img.to_rgb()),
        }
    }
}
