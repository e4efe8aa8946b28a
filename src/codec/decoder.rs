// Decode pipeline: header inspection, strategy selection, transfer loop

use serde::Deserialize;
use tracing::{debug, trace};

use super::image::DecodedImage;
use super::repack;
use super::state::{Phase, PhaseTracker};
use crate::engine::{
    DctMethod, DecodeEngine, DecodeParams, DecodeSession, HeaderInfo, OutputMode, PixelFormat,
    PlaneRowsMut,
};
use crate::error::{JpegError, Result};
use crate::layout::classify::classify;
use crate::layout::planner::{PlaneLayout, plan_gray, plan_planes};
use crate::layout::scale::find_scale_factor;
use crate::layout::{ChromaRatio, ColorPlan, ColorSpace, ImageInfo};

/// Decoder options. All flags default to off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    pub fancy_upsampling: bool,
    pub block_smoothing: bool,
    pub arithmetic_coding: bool,
    pub dct_method: DctMethod,
    /// Downscale target; applied only when both targets are non-zero.
    pub target_width: u32,
    pub target_height: u32,
}

impl DecodeOptions {
    fn params(&self) -> DecodeParams {
        DecodeParams {
            fancy_upsampling: self.fancy_upsampling,
            block_smoothing: self.block_smoothing,
            arithmetic_coding: self.arithmetic_coding,
            dct_method: self.dct_method,
        }
    }
}

/// Transfer strategy, fixed for the whole call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    GrayPlane,
    YCbCrPlanes(ChromaRatio),
    Interleaved(PixelFormat),
}

impl Strategy {
    fn mode(self) -> OutputMode {
        match self {
            Strategy::GrayPlane | Strategy::YCbCrPlanes(_) => OutputMode::RawPlanes,
            Strategy::Interleaved(format) => OutputMode::Scanlines(format),
        }
    }
}

/// Whether raw batches of `8 * max_v` luma rows tile every plane of
/// `layout` and give each component at least the rows it reads per call.
///
/// Holds for vertical sampling factors up to 2; a factor of 4 only fits
/// when the aligned height is a multiple of 32.
fn raw_batches_fit(header: &HeaderInfo, layout: &PlaneLayout) -> bool {
    let max_v = header
        .components
        .iter()
        .map(|c| usize::from(c.sampling.v))
        .max()
        .unwrap_or(1)
        .max(1);
    let mcu_rows = max_v * 8;
    let div = layout.row_divisor.max(1);
    if mcu_rows % div != 0 || layout.planes.len() > header.components.len() {
        return false;
    }
    layout.planes.iter().zip(&header.components).enumerate().all(|(i, (plane, comp))| {
        let rows = if i == 0 { mcu_rows } else { mcu_rows / div };
        rows >= usize::from(comp.sampling.v) * 8 && plane.aligned_height as usize % rows == 0
    })
}

/// Pick the transfer strategy and the plan reported to the caller.
fn select_strategy(
    header: &HeaderInfo,
    color_space: ColorSpace,
    scaled: bool,
    native_rgba: bool,
) -> (Strategy, ColorPlan) {
    let rgba_format = if native_rgba {
        PixelFormat::Rgba
    } else {
        PixelFormat::Rgb
    };
    let fallback = |ratio| (Strategy::Interleaved(rgba_format), ColorPlan::Rgb(ratio));

    match color_space {
        ColorSpace::Grayscale if !scaled => {
            if raw_batches_fit(header, &plan_gray(header.width, header.height)) {
                (Strategy::GrayPlane, ColorPlan::Gray)
            } else {
                debug!("interleaved fallback: raw batches do not tile the gray plane");
                fallback(ChromaRatio::Unknown)
            }
        }
        ColorSpace::YCbCr if !scaled => {
            let ratio = match header.components.as_slice() {
                [y, cb, cr, ..] => classify(y.downsampled, cb.downsampled, cr.sampling),
                _ => ChromaRatio::Unknown,
            };
            if header.force_interleaved_hint {
                debug!(%ratio, "interleaved fallback forced by APP13 marker");
                fallback(ratio)
            } else if ratio == ChromaRatio::Unknown {
                debug!("interleaved fallback for unclassified subsampling");
                fallback(ratio)
            } else if !raw_batches_fit(header, &plan_planes(header.width, header.height, ratio)) {
                debug!(%ratio, "interleaved fallback: raw batches do not tile the planes");
                fallback(ratio)
            } else {
                (Strategy::YCbCrPlanes(ratio), ColorPlan::YCbCr(ratio))
            }
        }
        ColorSpace::Grayscale | ColorSpace::YCbCr | ColorSpace::Rgb => fallback(ChromaRatio::Unknown),
        ColorSpace::Cmyk | ColorSpace::Ycck => (Strategy::Interleaved(PixelFormat::Cmyk), ColorPlan::Cmyk),
    }
}

/// JPEG decoder driving a codec engine.
pub struct Decoder<E> {
    engine: E,
    options: DecodeOptions,
}

#[cfg(feature = "mozjpeg")]
impl Decoder<crate::ffi::MozjpegEngine> {
    /// Decoder backed by the bundled mozjpeg engine.
    pub fn mozjpeg(options: DecodeOptions) -> Self {
        Decoder::new(crate::ffi::MozjpegEngine, options)
    }
}

impl<E: DecodeEngine> Decoder<E> {
    pub fn new(engine: E, options: DecodeOptions) -> Self {
        Decoder { engine, options }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Inspect the header and report the image descriptor only.
    pub fn read_info(&self, data: &[u8]) -> Result<ImageInfo> {
        self.decode_into(data, true, &mut [])
    }

    /// Decode into a freshly allocated buffer.
    pub fn decode(&self, data: &[u8]) -> Result<DecodedImage> {
        let info = self.read_info(data)?;
        let mut buffer = vec![0u8; info.buffer_len()];
        let info = self.decode_into(data, false, &mut buffer)?;
        DecodedImage::from_buffer(info, buffer)
    }

    /// Decode `data` into `out`.
    ///
    /// With `config_only` the header is inspected and classified but `out`
    /// is never touched. Otherwise `out` must hold at least
    /// [`ImageInfo::buffer_len`] bytes; its layout follows the reported plan:
    /// a gray plane with stride = width, three aligned YCbCr planes, or
    /// 4 bytes per pixel for RGBA and CMYK.
    pub fn decode_into(&self, data: &[u8], config_only: bool, out: &mut [u8]) -> Result<ImageInfo> {
        let mut phase = PhaseTracker::new("decode");
        let mut session = self.engine.open(data)?;
        let header = session.header();
        let color_space = header.color_space.ok_or_else(|| {
            JpegError::unsupported("stream uses an unrecognized color space")
        })?;

        let scale = find_scale_factor(
            header.width,
            header.height,
            self.options.target_width,
            self.options.target_height,
        );
        let (width, height) = match scale {
            Some(k) => {
                let size = session.set_scale(k)?;
                debug!(k, width = size.0, height = size.1, "decode scale selected");
                size
            }
            None => (header.width, header.height),
        };

        let (strategy, plan) =
            select_strategy(&header, color_space, scale.is_some(), self.engine.native_rgba());
        let info = ImageInfo {
            width,
            height,
            color_space: plan.color_space(),
            chroma_ratio: plan.chroma(),
            is_scaled: scale.is_some(),
        };
        debug!(?strategy, ?info, "decode strategy");

        if config_only {
            phase.close();
            return Ok(info);
        }
        JpegError::check_buffer(info.buffer_len(), out.len())?;

        let start = session.start(strategy.mode(), &self.options.params())?;
        phase.advance(Phase::Started);
        if (start.output_width, start.output_height) != (width, height) {
            return Err(JpegError::engine(format!(
                "engine output is {}x{}, expected {width}x{height}",
                start.output_width, start.output_height
            )));
        }
        let mcu_rows = usize::from(start.max_v_samp.max(1)) * 8;

        phase.advance(Phase::Transferring);
        match strategy {
            Strategy::GrayPlane => {
                let layout = plan_gray(width, height);
                let stride = layout.y_stride();
                let mut scratch = vec![0u8; layout.total_len()];
                while session.output_scanline() < height {
                    let s = session.output_scanline() as usize;
                    let base = s * stride;
                    let data = scratch
                        .get_mut(base..base + mcu_rows * stride)
                        .ok_or_else(|| overrun("gray", s))?;
                    let mut planes = [PlaneRowsMut {
                        data,
                        stride,
                        rows: mcu_rows,
                    }];
                    read_batch(&mut *session, s, &mut planes)?;
                }
                session.finish()?;
                phase.advance(Phase::Finished);
                repack::compact_plane(&scratch, stride, out, width as usize, height as usize);
            }
            Strategy::YCbCrPlanes(ratio) => {
                let layout = plan_planes(width, height, ratio);
                let (ys, cs, div) = (layout.y_stride(), layout.c_stride(), layout.row_divisor);
                let c_rows = mcu_rows / div;
                let (y_plane, rest) = out.split_at_mut(layout.offsets[1]);
                let (cb_plane, cr_plane) = rest.split_at_mut(layout.offsets[2] - layout.offsets[1]);
                while session.output_scanline() < height {
                    let s = session.output_scanline() as usize;
                    let y_base = s * ys;
                    let c_base = s * cs / div;
                    let y = y_plane
                        .get_mut(y_base..y_base + mcu_rows * ys)
                        .ok_or_else(|| overrun("luma", s))?;
                    let cb = cb_plane
                        .get_mut(c_base..c_base + c_rows * cs)
                        .ok_or_else(|| overrun("cb", s))?;
                    let cr = cr_plane
                        .get_mut(c_base..c_base + c_rows * cs)
                        .ok_or_else(|| overrun("cr", s))?;
                    let mut planes = [
                        PlaneRowsMut { data: y, stride: ys, rows: mcu_rows },
                        PlaneRowsMut { data: cb, stride: cs, rows: c_rows },
                        PlaneRowsMut { data: cr, stride: cs, rows: c_rows },
                    ];
                    read_batch(&mut *session, s, &mut planes)?;
                }
                session.finish()?;
                phase.advance(Phase::Finished);
            }
            Strategy::Interleaved(PixelFormat::Rgb) => {
                let row_bytes = width as usize * 3;
                let mut scratch = vec![0u8; row_bytes * height as usize];
                read_rows(&mut *session, height, &mut scratch, row_bytes)?;
                session.finish()?;
                phase.advance(Phase::Finished);
                repack::rgb_into_rgba(&scratch, out);
            }
            Strategy::Interleaved(format) => {
                let row_bytes = width as usize * format.channels();
                read_rows(&mut *session, height, out, row_bytes)?;
                session.finish()?;
                phase.advance(Phase::Finished);
            }
        }

        drop(session);
        phase.close();
        Ok(info)
    }
}

fn overrun(plane: &str, scanline: usize) -> JpegError {
    JpegError::engine(format!("{plane} batch at scanline {scanline} overruns its plane"))
}

/// Hand one MCU row batch to the engine.
fn read_batch(
    session: &mut (dyn DecodeSession + '_),
    scanline: usize,
    planes: &mut [PlaneRowsMut<'_>],
) -> Result<()> {
    let read = session.read_plane_batch(planes)?;
    trace!(scanline, rows = read, "raw batch");
    if read == 0 {
        return Err(JpegError::engine("raw read made no progress"));
    }
    Ok(())
}

/// Scanline loop: one packed row per call.
fn read_rows(
    session: &mut (dyn DecodeSession + '_),
    height: u32,
    dst: &mut [u8],
    row_bytes: usize,
) -> Result<()> {
    while session.output_scanline() < height {
        let s = session.output_scanline() as usize;
        let row = dst
            .get_mut(s * row_bytes..(s + 1) * row_bytes)
            .ok_or_else(|| overrun("scanline", s))?;
        session.read_scanline(row)?;
    }
    Ok(())
}
