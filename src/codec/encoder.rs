// Encode pipeline: format selection, transfer loop, stream finalization

use image::DynamicImage;
use serde::Deserialize;
use tracing::{debug, trace};

use super::repack;
use super::state::{Phase, PhaseTracker};
use crate::engine::{
    DctMethod, EncodeEngine, EncodeSession, EncodeSetup, OutputMode, PixelFormat, PlaneRows,
};
use crate::error::{JpegError, Result};
use crate::layout::format::{Transfer, select_format};
use crate::layout::planner::{plan_gray, plan_planes};
use crate::layout::{ChromaRatio, ColorPlan, ColorSpace};

/// Quality used when the requested quality is not positive.
pub const DEFAULT_QUALITY: i32 = 75;

/// Encoder options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// 1..=100; values <= 0 select [`DEFAULT_QUALITY`], larger values clamp to 100.
    pub quality: i32,
    /// Subsampling used by [`Encoder::encode_image`] for color input.
    pub chroma: ChromaRatio,
    /// 0 is sequential; 1 and 2 add progression steps.
    pub progressive_level: i32,
    pub optimize_coding: bool,
    pub adaptive_quantization: bool,
    pub use_standard_quant_tables: bool,
    pub fancy_downsampling: bool,
    pub arithmetic_coding: bool,
    pub dct_method: DctMethod,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            quality: DEFAULT_QUALITY,
            chroma: ChromaRatio::S420,
            progressive_level: 0,
            optimize_coding: true,
            adaptive_quantization: true,
            use_standard_quant_tables: false,
            fancy_downsampling: false,
            arithmetic_coding: false,
            dct_method: DctMethod::ISlow,
        }
    }
}

impl EncodeOptions {
    /// Clamp quality and progressive level into their valid ranges.
    pub fn normalized(&self) -> Self {
        let quality = if self.quality <= 0 {
            DEFAULT_QUALITY
        } else {
            self.quality.min(100)
        };
        EncodeOptions {
            quality,
            progressive_level: self.progressive_level.clamp(0, 2),
            ..*self
        }
    }
}

/// JPEG encoder driving a codec engine.
pub struct Encoder<E> {
    engine: E,
    options: EncodeOptions,
}

#[cfg(feature = "mozjpeg")]
impl Encoder<crate::ffi::MozjpegEngine> {
    /// Encoder backed by the bundled mozjpeg engine.
    pub fn mozjpeg(options: EncodeOptions) -> Self {
        Encoder::new(crate::ffi::MozjpegEngine, options)
    }
}

impl<E: EncodeEngine> Encoder<E> {
    pub fn new(engine: E, options: EncodeOptions) -> Self {
        Encoder { engine, options }
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    /// Encode an `image` crate buffer.
    ///
    /// Images without color go through the gray plane path; everything else
    /// is converted to RGBA and encoded at the configured chroma ratio.
    pub fn encode_image(&self, img: &DynamicImage) -> Result<Vec<u8>> {
        let (w, h) = (img.width(), img.height());
        if img.color().has_color() {
            let rgba = img.to_rgba8();
            self.encode(rgba.as_raw(), w, h, ColorSpace::Rgb, self.options.chroma)
        } else {
            let gray = img.to_luma8();
            self.encode(gray.as_raw(), w, h, ColorSpace::Grayscale, self.options.chroma)
        }
    }

    /// Compress `pixels` into a JPEG stream.
    ///
    /// The buffer layout follows [`ColorPlan::buffer_len`]: a gray plane with
    /// stride = width, three aligned YCbCr planes, or 4 bytes per pixel for
    /// RGBA (alpha ignored) and CMYK. `chroma` is ignored for gray and CMYK.
    pub fn encode(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        color_space: ColorSpace,
        chroma: ChromaRatio,
    ) -> Result<Vec<u8>> {
        if width == 0 || height == 0 {
            return Err(JpegError::unsupported(format!(
                "cannot encode an empty {width}x{height} image"
            )));
        }
        let options = self.options.normalized();
        let selection = select_format(color_space, chroma)?;
        JpegError::check_buffer(selection.plan.buffer_len(width, height), pixels.len())?;

        let pixel_count = width as usize * height as usize;
        let (input, rgb_scratch) = match (selection.transfer, selection.plan) {
            (Transfer::RawPlanes, _) => (OutputMode::RawPlanes, None),
            (Transfer::Interleaved { .. }, ColorPlan::Rgb(_)) if !self.engine.native_rgba() => (
                OutputMode::Scanlines(PixelFormat::Rgb),
                Some(repack::rgba_to_rgb(&pixels[..pixel_count * 4])),
            ),
            (Transfer::Interleaved { .. }, ColorPlan::Cmyk) => {
                (OutputMode::Scanlines(PixelFormat::Cmyk), None)
            }
            (Transfer::Interleaved { .. }, _) => (OutputMode::Scanlines(PixelFormat::Rgba), None),
        };

        let setup = EncodeSetup {
            width,
            height,
            color_space,
            sampling: selection.sampling.clone(),
            input,
            quality: options.quality as u8,
            progressive_level: options.progressive_level as u8,
            optimize_coding: options.optimize_coding,
            adaptive_quantization: options.adaptive_quantization,
            use_standard_quant_tables: options.use_standard_quant_tables,
            fancy_downsampling: options.fancy_downsampling,
            arithmetic_coding: options.arithmetic_coding,
            dct_method: options.dct_method,
        };
        debug!(?selection.plan, ?input, quality = setup.quality, "encode setup");

        let mut phase = PhaseTracker::new("encode");
        let mut session = self.engine.open()?;
        let sampling = session.start(&setup)?;
        phase.advance(Phase::Started);

        phase.advance(Phase::Transferring);
        match selection.plan {
            ColorPlan::Gray => {
                let layout = plan_gray(width, height);
                let luma = layout.luma();
                let plane = repack::pad_plane(
                    &pixels[..pixel_count],
                    width as usize,
                    height as usize,
                    luma.aligned_width as usize,
                    luma.aligned_height as usize,
                );
                let stride = layout.y_stride();
                let rows = batch_rows(&sampling, 0)?;
                while session.next_scanline() < height {
                    let s = session.next_scanline() as usize;
                    let base = s * stride;
                    let data = plane
                        .get(base..base + rows * stride)
                        .ok_or_else(|| overrun("gray", s))?;
                    write_batch(&mut *session, s, &[PlaneRows { data, stride, rows }])?;
                }
            }
            ColorPlan::YCbCr(ratio) => {
                let layout = plan_planes(width, height, ratio);
                let (ys, cs, div) = (layout.y_stride(), layout.c_stride(), layout.row_divisor);
                let y_h = batch_rows(&sampling, 0)?;
                let c_h = batch_rows(&sampling, 1)?;
                let y_plane = &pixels[layout.plane_range(0)];
                let cb_plane = &pixels[layout.plane_range(1)];
                let cr_plane = &pixels[layout.plane_range(2)];
                while session.next_scanline() < height {
                    let s = session.next_scanline() as usize;
                    let y_base = s * ys;
                    let c_base = s * cs / div;
                    let y = y_plane
                        .get(y_base..y_base + y_h * ys)
                        .ok_or_else(|| overrun("luma", s))?;
                    let cb = cb_plane
                        .get(c_base..c_base + c_h * cs)
                        .ok_or_else(|| overrun("cb", s))?;
                    let cr = cr_plane
                        .get(c_base..c_base + c_h * cs)
                        .ok_or_else(|| overrun("cr", s))?;
                    let planes = [
                        PlaneRows { data: y, stride: ys, rows: y_h },
                        PlaneRows { data: cb, stride: cs, rows: c_h },
                        PlaneRows { data: cr, stride: cs, rows: c_h },
                    ];
                    write_batch(&mut *session, s, &planes)?;
                }
            }
            ColorPlan::Rgb(_) | ColorPlan::Cmyk => {
                let (src, channels) = match &rgb_scratch {
                    Some(rgb) => (rgb.as_slice(), 3),
                    None => (pixels, 4),
                };
                let row_bytes = width as usize * channels;
                while session.next_scanline() < height {
                    let s = session.next_scanline() as usize;
                    let row = src
                        .get(s * row_bytes..(s + 1) * row_bytes)
                        .ok_or_else(|| overrun("scanline", s))?;
                    session.write_scanline(row)?;
                }
            }
        }

        let bytes = session.finish()?;
        phase.advance(Phase::Finished);
        drop(session);
        phase.close();
        debug!(bytes = bytes.len(), "encode finished");
        Ok(bytes)
    }
}

/// Rows per raw batch for component `index`: 8 x its vertical factor.
fn batch_rows(sampling: &[crate::layout::SamplingFactors], index: usize) -> Result<usize> {
    sampling
        .get(index)
        .map(|s| usize::from(s.v.max(1)) * 8)
        .ok_or_else(|| JpegError::engine(format!("engine reported no component {index}")))
}

fn overrun(plane: &str, scanline: usize) -> JpegError {
    JpegError::engine(format!("{plane} batch at scanline {scanline} overruns its plane"))
}

fn write_batch(
    session: &mut (dyn EncodeSession + '_),
    scanline: usize,
    planes: &[PlaneRows<'_>],
) -> Result<()> {
    let written = session.write_plane_batch(planes)?;
    trace!(scanline, rows = written, "raw batch");
    if written == 0 {
        return Err(JpegError::engine("raw write made no progress"));
    }
    Ok(())
}
