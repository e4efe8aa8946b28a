// mozjpeg adapter: engine capability traits over mozjpeg-sys (RAII Drop)

use std::marker::PhantomData;
use std::mem::size_of;
use std::ptr;

use mozjpeg_sys::*;

use super::errmgr::{guarded, unwinding_error_mgr};
use crate::engine::{
    ComponentInfo, DctMethod, DecodeEngine, DecodeParams, DecodeSession, DecodeStart,
    EncodeEngine, EncodeSession, EncodeSetup, HeaderInfo, OutputMode, PixelFormat, PlaneRows,
    PlaneRowsMut,
};
use crate::error::{JpegError, Result};
use crate::layout::classify::FORCE_INTERLEAVED_MARKER;
use crate::layout::planner::align16;
use crate::layout::scale::SCALE_DENOM;
use crate::layout::{ColorSpace, PlaneSize, SamplingFactors};

/// Samples per DCT block edge.
const BLOCK: usize = 8;

/// `jpeg_read_header` status for a complete header.
const JPEG_HEADER_OK: i32 = 1;

/// Room for markers and tables on top of the entropy-coded data.
const OUTPUT_SLACK: usize = 64 * 1024;

/// Upper bound on the compressed size of a frame.
///
/// Two bytes per sample over the 16-aligned frame, as libjpeg-turbo's
/// `tjBufSize` bounds baseline output at any quality. The engine only
/// replaces the buffer past this size, and a replacement is unreachable
/// from here until `jpeg_finish_compress` reports it.
fn output_capacity(width: u32, height: u32, components: usize) -> usize {
    let padded = align16(width) as usize * align16(height) as usize;
    padded * components * 2 + OUTPUT_SLACK
}

/// Codec engine backed by mozjpeg.
///
/// Stateless; every call opens its own session.
#[derive(Debug, Clone, Copy, Default)]
pub struct MozjpegEngine;

fn to_color_space(cs: J_COLOR_SPACE) -> Option<ColorSpace> {
    match cs {
        J_COLOR_SPACE::JCS_GRAYSCALE => Some(ColorSpace::Grayscale),
        J_COLOR_SPACE::JCS_RGB => Some(ColorSpace::Rgb),
        J_COLOR_SPACE::JCS_YCbCr => Some(ColorSpace::YCbCr),
        J_COLOR_SPACE::JCS_CMYK => Some(ColorSpace::Cmyk),
        J_COLOR_SPACE::JCS_YCCK => Some(ColorSpace::Ycck),
        _ => None,
    }
}

fn pixel_color_space(format: PixelFormat) -> J_COLOR_SPACE {
    match format {
        PixelFormat::Gray => J_COLOR_SPACE::JCS_GRAYSCALE,
        PixelFormat::Rgb => J_COLOR_SPACE::JCS_RGB,
        PixelFormat::Rgba => J_COLOR_SPACE::JCS_EXT_RGBA,
        PixelFormat::Cmyk => J_COLOR_SPACE::JCS_CMYK,
    }
}

fn dct_method(method: DctMethod) -> J_DCT_METHOD {
    match method {
        DctMethod::ISlow => J_DCT_METHOD::JDCT_ISLOW,
        DctMethod::IFast => J_DCT_METHOD::JDCT_IFAST,
        DctMethod::Float => J_DCT_METHOD::JDCT_FLOAT,
    }
}

fn flag(value: bool) -> boolean {
    if value { 1 } else { 0 }
}

/// Check that a plane view can hold one batch of `needed` rows of
/// `row_bytes` samples each.
fn check_plane(rows: usize, stride: usize, len: usize, needed: usize, row_bytes: usize) -> Result<()> {
    if rows < needed {
        return Err(JpegError::engine(format!(
            "plane batch has {rows} rows, engine needs {needed}"
        )));
    }
    if stride < row_bytes {
        return Err(JpegError::engine(format!(
            "plane stride {stride} is narrower than {row_bytes} samples"
        )));
    }
    JpegError::check_buffer(rows * stride, len)
}

/// Component plane size as libjpeg derives it:
/// `ceil(image_width * h / max_h)` and likewise for the height.
fn downsampled_size(width: u32, height: u32, s: SamplingFactors, all: &[SamplingFactors]) -> PlaneSize {
    let max_h = all.iter().map(|f| u64::from(f.h)).max().unwrap_or(1).max(1);
    let max_v = all.iter().map(|f| u64::from(f.v)).max().unwrap_or(1).max(1);
    PlaneSize::new(
        (u64::from(width) * u64::from(s.h)).div_ceil(max_h) as u32,
        (u64::from(height) * u64::from(s.v)).div_ceil(max_v) as u32,
    )
}

// ============================================================
// Decompression
// ============================================================

/// Owns a decompress struct and the error manager it points at.
struct DecompressHandle {
    cinfo: Box<jpeg_decompress_struct>,
    _err: Box<jpeg_error_mgr>,
}

impl Drop for DecompressHandle {
    fn drop(&mut self) {
        // safe on a struct whose create call failed: mem is still null
        unsafe { jpeg_destroy_decompress(&mut *self.cinfo) }
    }
}

/// Decode session borrowing the compressed stream for its lifetime.
pub struct MozjpegDecodeSession<'a> {
    handle: DecompressHandle,
    _data: PhantomData<&'a [u8]>,
}

impl DecodeEngine for MozjpegEngine {
    fn open<'a>(&self, data: &'a [u8]) -> Result<Box<dyn DecodeSession + 'a>> {
        let mut err = unwinding_error_mgr();
        let mut cinfo: Box<jpeg_decompress_struct> = Box::new(unsafe { std::mem::zeroed() });
        cinfo.common.err = &mut *err;
        let mut handle = DecompressHandle { cinfo, _err: err };

        let c = &mut *handle.cinfo;
        guarded("create decompressor", || unsafe {
            jpeg_CreateDecompress(c, JPEG_LIB_VERSION as _, size_of::<jpeg_decompress_struct>() as _)
        })?;

        let c = &mut *handle.cinfo;
        let status = guarded("read header", || unsafe {
            jpeg_mem_src(c, data.as_ptr() as _, data.len() as _);
            jpeg_save_markers(c, FORCE_INTERLEAVED_MARKER as _, 0xFFFF);
            jpeg_read_header(c, 1)
        })
        .map_err(|e| JpegError::malformed(e.to_string()))?;
        if status as i32 != JPEG_HEADER_OK {
            return Err(JpegError::malformed(format!(
                "header parse returned status {status}"
            )));
        }

        Ok(Box::new(MozjpegDecodeSession {
            handle,
            _data: PhantomData,
        }))
    }
}

impl MozjpegDecodeSession<'_> {
    fn component(&self, index: usize) -> Option<&jpeg_component_info> {
        let c = &*self.handle.cinfo;
        if c.comp_info.is_null() || index >= c.num_components.max(0) as usize {
            return None;
        }
        unsafe { Some(&*c.comp_info.add(index)) }
    }

    fn has_force_interleaved_marker(&self) -> bool {
        let mut marker = self.handle.cinfo.marker_list;
        while !marker.is_null() {
            let m = unsafe { &*marker };
            if m.marker as u8 == FORCE_INTERLEAVED_MARKER && m.data_length > 0 {
                return true;
            }
            marker = m.next;
        }
        false
    }
}

impl DecodeSession for MozjpegDecodeSession<'_> {
    fn header(&self) -> HeaderInfo {
        let c = &*self.handle.cinfo;
        let (width, height) = (c.image_width as u32, c.image_height as u32);
        let sampling: Vec<SamplingFactors> = (0..c.num_components.max(0) as usize)
            .filter_map(|i| self.component(i))
            .map(|comp| SamplingFactors::new(comp.h_samp_factor as u8, comp.v_samp_factor as u8))
            .collect();
        let components = sampling
            .iter()
            .map(|&s| ComponentInfo {
                sampling: s,
                downsampled: downsampled_size(width, height, s, &sampling),
            })
            .collect();
        HeaderInfo {
            width,
            height,
            color_space: to_color_space(c.jpeg_color_space),
            components,
            force_interleaved_hint: self.has_force_interleaved_marker(),
        }
    }

    fn set_scale(&mut self, numerator: u32) -> Result<(u32, u32)> {
        let c = &mut *self.handle.cinfo;
        c.scale_num = numerator as _;
        c.scale_denom = SCALE_DENOM as _;
        guarded("calc output dimensions", || unsafe { jpeg_calc_output_dimensions(c) })?;
        let c = &*self.handle.cinfo;
        Ok((c.output_width as u32, c.output_height as u32))
    }

    fn start(&mut self, mode: OutputMode, params: &DecodeParams) -> Result<DecodeStart> {
        let c = &mut *self.handle.cinfo;
        match mode {
            OutputMode::RawPlanes => c.raw_data_out = 1,
            OutputMode::Scanlines(format) => {
                c.raw_data_out = 0;
                c.out_color_space = pixel_color_space(format);
            }
        }
        c.do_fancy_upsampling = flag(params.fancy_upsampling);
        c.do_block_smoothing = flag(params.block_smoothing);
        if params.arithmetic_coding {
            // the SOF marker decides the entropy decoder
            tracing::trace!("arithmetic coding requested; taken from the stream header");
        }
        c.dct_method = dct_method(params.dct_method);

        let started = guarded("start decompress", || unsafe { jpeg_start_decompress(c) })?;
        if started == 0 {
            return Err(JpegError::malformed("decompressor refused to start"));
        }
        let c = &*self.handle.cinfo;
        Ok(DecodeStart {
            output_width: c.output_width as u32,
            output_height: c.output_height as u32,
            max_v_samp: c.max_v_samp_factor as u8,
        })
    }

    fn output_scanline(&self) -> u32 {
        self.handle.cinfo.output_scanline as u32
    }

    fn read_plane_batch(&mut self, planes: &mut [PlaneRowsMut<'_>]) -> Result<u32> {
        let ncomp = self.handle.cinfo.num_components.max(0) as usize;
        if planes.len() != ncomp {
            return Err(JpegError::engine(format!(
                "{} planes offered for {ncomp} components",
                planes.len()
            )));
        }

        let mut rows: Vec<Vec<*mut u8>> = Vec::with_capacity(ncomp);
        for (i, plane) in planes.iter_mut().enumerate() {
            let comp = self
                .component(i)
                .ok_or_else(|| JpegError::engine(format!("missing component {i}")))?;
            let needed = comp.v_samp_factor as usize * BLOCK;
            let row_bytes = comp.width_in_blocks as usize * BLOCK;
            check_plane(plane.rows, plane.stride, plane.data.len(), needed, row_bytes)?;
            let base = plane.data.as_mut_ptr();
            rows.push(
                (0..plane.rows)
                    .map(|r| unsafe { base.add(r * plane.stride) })
                    .collect(),
            );
        }
        let mut image: Vec<*mut *mut u8> = rows.iter_mut().map(|r| r.as_mut_ptr()).collect();

        let c = &mut *self.handle.cinfo;
        let max_lines = c.max_v_samp_factor as u32 * BLOCK as u32;
        let read = guarded("read raw data", || unsafe {
            jpeg_read_raw_data(c, image.as_mut_ptr() as _, max_lines as _)
        })?;
        if read == 0 {
            return Err(JpegError::engine("raw read made no progress"));
        }
        Ok(read as u32)
    }

    fn read_scanline(&mut self, row: &mut [u8]) -> Result<()> {
        let c = &mut *self.handle.cinfo;
        let row_bytes = c.output_width as usize * c.out_color_components.max(0) as usize;
        JpegError::check_buffer(row_bytes, row.len())?;

        let mut line = row.as_mut_ptr();
        let read = guarded("read scanline", || unsafe {
            jpeg_read_scanlines(c, &mut line as *mut *mut u8 as _, 1)
        })?;
        if read != 1 {
            return Err(JpegError::engine("scanline read made no progress"));
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let c = &mut *self.handle.cinfo;
        let done = guarded("finish decompress", || unsafe { jpeg_finish_decompress(c) })?;
        if done == 0 {
            return Err(JpegError::engine("decompressor could not finish"));
        }
        Ok(())
    }
}

// ============================================================
// Compression
// ============================================================

/// Output buffer handed to `jpeg_mem_dest`.
///
/// Boxed so the engine can keep pointers to both fields.
struct MemDest {
    buffer: *mut u8,
    size: libc::c_ulong,
    /// The allocation made by us, freed on drop.
    initial: *mut u8,
}

/// Owns a compress struct, its error manager and its output memory.
struct CompressHandle {
    cinfo: Box<jpeg_compress_struct>,
    _err: Box<jpeg_error_mgr>,
    dest: Box<MemDest>,
    finished: bool,
}

impl Drop for CompressHandle {
    fn drop(&mut self) {
        unsafe {
            jpeg_destroy_compress(&mut *self.cinfo);
            // a finished stream may have moved into an engine-grown buffer
            if self.finished && !self.dest.buffer.is_null() && self.dest.buffer != self.dest.initial {
                libc::free(self.dest.buffer as *mut libc::c_void);
            }
            if !self.dest.initial.is_null() {
                libc::free(self.dest.initial as *mut libc::c_void);
            }
        }
    }
}

/// Encode session writing into malloc'd memory owned by the handle.
pub struct MozjpegEncodeSession {
    handle: CompressHandle,
}

impl EncodeEngine for MozjpegEngine {
    fn open(&self) -> Result<Box<dyn EncodeSession>> {
        let mut err = unwinding_error_mgr();
        let mut cinfo: Box<jpeg_compress_struct> = Box::new(unsafe { std::mem::zeroed() });
        cinfo.common.err = &mut *err;
        let mut handle = CompressHandle {
            cinfo,
            _err: err,
            dest: Box::new(MemDest {
                buffer: ptr::null_mut(),
                size: 0,
                initial: ptr::null_mut(),
            }),
            finished: false,
        };

        let c = &mut *handle.cinfo;
        guarded("create compressor", || unsafe {
            jpeg_CreateCompress(c, JPEG_LIB_VERSION as _, size_of::<jpeg_compress_struct>() as _)
        })?;

        Ok(Box::new(MozjpegEncodeSession { handle }))
    }
}

impl MozjpegEncodeSession {
    fn component_mut(&mut self, index: usize) -> Option<&mut jpeg_component_info> {
        let c = &mut *self.handle.cinfo;
        if c.comp_info.is_null() || index >= c.num_components.max(0) as usize {
            return None;
        }
        unsafe { Some(&mut *c.comp_info.add(index)) }
    }

    /// Preallocate the output at its worst-case size so the engine never
    /// has to grow it.
    fn attach_output(&mut self, setup: &EncodeSetup, components: usize) -> Result<()> {
        let capacity = output_capacity(setup.width, setup.height, components);
        let buffer = unsafe { libc::malloc(capacity) } as *mut u8;
        if buffer.is_null() {
            return Err(JpegError::engine(format!(
                "cannot allocate {capacity} byte output buffer"
            )));
        }
        let dest = &mut *self.handle.dest;
        dest.buffer = buffer;
        dest.initial = buffer;
        dest.size = capacity as libc::c_ulong;

        let c = &mut *self.handle.cinfo;
        let dest = &mut *self.handle.dest;
        guarded("attach destination", || unsafe {
            jpeg_mem_dest(c, &mut dest.buffer, &mut dest.size)
        })
    }
}

impl EncodeSession for MozjpegEncodeSession {
    fn start(&mut self, setup: &EncodeSetup) -> Result<Vec<SamplingFactors>> {
        let (components, in_color_space) = match setup.input {
            OutputMode::RawPlanes => match setup.color_space {
                ColorSpace::Grayscale => (1, J_COLOR_SPACE::JCS_GRAYSCALE),
                ColorSpace::YCbCr => (3, J_COLOR_SPACE::JCS_YCbCr),
                other => {
                    return Err(JpegError::unsupported(format!(
                        "{other:?} cannot be written as raw planes"
                    )));
                }
            },
            OutputMode::Scanlines(format) => (format.channels(), pixel_color_space(format)),
        };
        self.attach_output(setup, components)?;

        {
            let c = &mut *self.handle.cinfo;
            c.image_width = setup.width as _;
            c.image_height = setup.height as _;
            c.input_components = components as _;
            c.in_color_space = in_color_space;
            guarded("set defaults", || unsafe { jpeg_set_defaults(c) })?;
        }

        let c = &mut *self.handle.cinfo;
        let quality = i32::from(setup.quality);
        let use_standard = setup.use_standard_quant_tables;
        guarded("set quality", || unsafe {
            if use_standard {
                jpeg_c_set_int_param(c, J_INT_PARAM::JINT_BASE_QUANT_TBL_IDX, 0);
            }
            jpeg_set_quality(c, quality as _, 1);
        })?;

        let ncomp = self.handle.cinfo.num_components.max(0) as usize;
        if ncomp != setup.sampling.len() {
            return Err(JpegError::unsupported(format!(
                "{} sampling factors for {ncomp} components",
                setup.sampling.len()
            )));
        }
        for (i, s) in setup.sampling.iter().enumerate() {
            let comp = self
                .component_mut(i)
                .ok_or_else(|| JpegError::engine(format!("missing component {i}")))?;
            comp.h_samp_factor = s.h as _;
            comp.v_samp_factor = s.v as _;
        }

        let c = &mut *self.handle.cinfo;
        c.raw_data_in = flag(setup.input == OutputMode::RawPlanes);
        // Huffman table optimisation has no meaning for arithmetic coding
        c.optimize_coding = flag(setup.optimize_coding && !setup.arithmetic_coding);
        c.dct_method = dct_method(setup.dct_method);
        if setup.fancy_downsampling {
            tracing::debug!("fancy downsampling is not exposed by this engine; ignored");
        }

        c.arith_code = flag(setup.arithmetic_coding);

        let trellis = flag(setup.adaptive_quantization);
        let level = setup.progressive_level;
        // scan optimisation measures Huffman cost only
        let optimize_scans = flag(level >= 2 && !setup.arithmetic_coding);
        guarded("configure scans", || unsafe {
            jpeg_c_set_bool_param(c, J_BOOLEAN_PARAM::JBOOLEAN_TRELLIS_QUANT, trellis);
            jpeg_c_set_bool_param(c, J_BOOLEAN_PARAM::JBOOLEAN_TRELLIS_QUANT_DC, trellis);
            jpeg_c_set_bool_param(c, J_BOOLEAN_PARAM::JBOOLEAN_OPTIMIZE_SCANS, optimize_scans);
            if level == 0 {
                c.num_scans = 0;
                c.scan_info = ptr::null();
            } else {
                jpeg_simple_progression(c);
            }
        })?;

        guarded("start compress", || unsafe { jpeg_start_compress(c, 1) })?;

        let mut sampling = Vec::with_capacity(ncomp);
        for i in 0..ncomp {
            let comp = self
                .component_mut(i)
                .ok_or_else(|| JpegError::engine(format!("missing component {i}")))?;
            sampling.push(SamplingFactors::new(comp.h_samp_factor as u8, comp.v_samp_factor as u8));
        }
        Ok(sampling)
    }

    fn next_scanline(&self) -> u32 {
        self.handle.cinfo.next_scanline as u32
    }

    fn write_plane_batch(&mut self, planes: &[PlaneRows<'_>]) -> Result<u32> {
        let ncomp = self.handle.cinfo.num_components.max(0) as usize;
        if planes.len() != ncomp {
            return Err(JpegError::engine(format!(
                "{} planes offered for {ncomp} components",
                planes.len()
            )));
        }

        let mut rows: Vec<Vec<*const u8>> = Vec::with_capacity(ncomp);
        for (i, plane) in planes.iter().enumerate() {
            let comp = self
                .component_mut(i)
                .ok_or_else(|| JpegError::engine(format!("missing component {i}")))?;
            let needed = comp.v_samp_factor as usize * BLOCK;
            let row_bytes = comp.width_in_blocks as usize * BLOCK;
            check_plane(plane.rows, plane.stride, plane.data.len(), needed, row_bytes)?;
            let base = plane.data.as_ptr();
            rows.push(
                (0..plane.rows)
                    .map(|r| unsafe { base.add(r * plane.stride) })
                    .collect(),
            );
        }
        let image: Vec<*const *const u8> = rows.iter().map(|r| r.as_ptr()).collect();

        let c = &mut *self.handle.cinfo;
        let max_lines = c.max_v_samp_factor as u32 * BLOCK as u32;
        let written = guarded("write raw data", || unsafe {
            jpeg_write_raw_data(c, image.as_ptr() as _, max_lines as _)
        })?;
        if written == 0 {
            return Err(JpegError::engine("raw write made no progress"));
        }
        Ok(written as u32)
    }

    fn write_scanline(&mut self, row: &[u8]) -> Result<()> {
        let c = &mut *self.handle.cinfo;
        let row_bytes = c.image_width as usize * c.input_components.max(0) as usize;
        JpegError::check_buffer(row_bytes, row.len())?;

        let line = row.as_ptr();
        let written = guarded("write scanline", || unsafe {
            jpeg_write_scanlines(c, &line as *const *const u8 as _, 1)
        })?;
        if written != 1 {
            return Err(JpegError::engine("scanline write made no progress"));
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        let c = &mut *self.handle.cinfo;
        guarded("finish compress", || unsafe { jpeg_finish_compress(c) })?;
        self.handle.finished = true;

        let dest = &*self.handle.dest;
        if dest.buffer.is_null() {
            return Err(JpegError::engine("compressor produced no output buffer"));
        }
        let bytes = unsafe { std::slice::from_raw_parts(dest.buffer, dest.size as usize) };
        Ok(bytes.to_vec())
    }
}
