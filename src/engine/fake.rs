// In-memory engine used by unit tests of the transfer loops
//
// Records every batch the loops hand over so tests can check geometry
// without a real codec.

use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    ComponentInfo, DecodeEngine, DecodeParams, DecodeSession, DecodeStart, EncodeEngine,
    EncodeSession, EncodeSetup, HeaderInfo, OutputMode, PlaneRows, PlaneRowsMut,
};
use crate::error::{JpegError, Result};
use crate::layout::scale::SCALE_DENOM;
use crate::layout::{ColorSpace, PlaneSize, SamplingFactors};

/// One plane handed over in a batch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneCall {
    pub rows: usize,
    pub stride: usize,
    pub first_row: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct FakeLog {
    pub scale: Option<u32>,
    pub mode: Option<OutputMode>,
    pub setup: Option<EncodeSetup>,
    pub batches: Vec<Vec<PlaneCall>>,
    pub scanlines: Vec<Vec<u8>>,
    pub finished: bool,
    pub dropped: bool,
}

pub type SharedLog = Arc<Mutex<FakeLog>>;

fn lock(log: &SharedLog) -> MutexGuard<'_, FakeLog> {
    log.lock().unwrap()
}

/// Header of a YCbCr stream with the given component geometry.
pub fn ycbcr_header(width: u32, height: u32, luma: SamplingFactors, chroma: PlaneSize) -> HeaderInfo {
    let c = ComponentInfo {
        sampling: SamplingFactors::new(1, 1),
        downsampled: chroma,
    };
    HeaderInfo {
        width,
        height,
        color_space: Some(ColorSpace::YCbCr),
        components: vec![
            ComponentInfo {
                sampling: luma,
                downsampled: PlaneSize::new(width, height),
            },
            c,
            c,
        ],
        force_interleaved_hint: false,
    }
}

/// Header with one full-resolution component per channel.
pub fn flat_header(width: u32, height: u32, color_space: ColorSpace, components: usize) -> HeaderInfo {
    let c = ComponentInfo {
        sampling: SamplingFactors::new(1, 1),
        downsampled: PlaneSize::new(width, height),
    };
    HeaderInfo {
        width,
        height,
        color_space: Some(color_space),
        components: vec![c; components],
        force_interleaved_hint: false,
    }
}

fn max_v(sampling: impl Iterator<Item = SamplingFactors>) -> u32 {
    sampling.map(|s| u32::from(s.v)).max().unwrap_or(1)
}

pub struct FakeDecodeEngine {
    pub header: HeaderInfo,
    pub native_rgba: bool,
    /// Fail the n-th batch or scanline read (0-based).
    pub fail_at: Option<usize>,
    pub log: SharedLog,
}

impl FakeDecodeEngine {
    pub fn new(header: HeaderInfo) -> Self {
        FakeDecodeEngine {
            header,
            native_rgba: true,
            fail_at: None,
            log: SharedLog::default(),
        }
    }
}

struct FakeDecodeSession {
    header: HeaderInfo,
    fail_at: Option<usize>,
    log: SharedLog,
    out_size: (u32, u32),
    max_v: u32,
    scanline: u32,
    reads: usize,
}

impl FakeDecodeSession {
    fn check_failure(&mut self) -> Result<()> {
        let n = self.reads;
        self.reads += 1;
        if self.fail_at == Some(n) {
            return Err(JpegError::engine("fake engine failure"));
        }
        Ok(())
    }
}

impl DecodeEngine for FakeDecodeEngine {
    fn open<'a>(&self, data: &'a [u8]) -> Result<Box<dyn DecodeSession + 'a>> {
        if data.is_empty() {
            return Err(JpegError::malformed("empty stream"));
        }
        Ok(Box::new(FakeDecodeSession {
            header: self.header.clone(),
            fail_at: self.fail_at,
            log: Arc::clone(&self.log),
            out_size: (self.header.width, self.header.height),
            max_v: max_v(self.header.components.iter().map(|c| c.sampling)),
            scanline: 0,
            reads: 0,
        }))
    }

    fn native_rgba(&self) -> bool {
        self.native_rgba
    }
}

impl DecodeSession for FakeDecodeSession {
    fn header(&self) -> HeaderInfo {
        self.header.clone()
    }

    fn set_scale(&mut self, numerator: u32) -> Result<(u32, u32)> {
        let scaled = |d: u32| (d * numerator).div_ceil(SCALE_DENOM);
        self.out_size = (scaled(self.header.width), scaled(self.header.height));
        lock(&self.log).scale = Some(numerator);
        Ok(self.out_size)
    }

    fn start(&mut self, mode: OutputMode, _params: &DecodeParams) -> Result<DecodeStart> {
        lock(&self.log).mode = Some(mode);
        Ok(DecodeStart {
            output_width: self.out_size.0,
            output_height: self.out_size.1,
            max_v_samp: self.max_v as u8,
        })
    }

    fn output_scanline(&self) -> u32 {
        self.scanline
    }

    fn read_plane_batch(&mut self, planes: &mut [PlaneRowsMut<'_>]) -> Result<u32> {
        self.check_failure()?;
        let mut calls = Vec::with_capacity(planes.len());
        for (ci, (plane, comp)) in planes.iter_mut().zip(&self.header.components).enumerate() {
            let needed = usize::from(comp.sampling.v) * 8;
            if plane.rows < needed || plane.data.len() < plane.rows * plane.stride {
                return Err(JpegError::engine("plane batch too small"));
            }
            plane.data[..plane.rows * plane.stride].fill((ci as u8 + 1) * 10);
            calls.push(PlaneCall {
                rows: plane.rows,
                stride: plane.stride,
                first_row: plane.data[..plane.stride].to_vec(),
            });
        }
        lock(&self.log).batches.push(calls);
        let advanced = (self.max_v * 8).min(self.out_size.1 - self.scanline);
        self.scanline += advanced;
        Ok(advanced)
    }

    fn read_scanline(&mut self, row: &mut [u8]) -> Result<()> {
        self.check_failure()?;
        let channels = match lock(&self.log).mode {
            Some(OutputMode::Scanlines(fmt)) => fmt.channels(),
            _ => return Err(JpegError::engine("scanline read in raw mode")),
        };
        // channel c reads back as (c + 1) * 10
        for (i, b) in row.iter_mut().enumerate() {
            *b = (i % channels) as u8 * 10 + 10;
        }
        lock(&self.log).scanlines.push(row.to_vec());
        self.scanline += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        lock(&self.log).finished = true;
        Ok(())
    }
}

impl Drop for FakeDecodeSession {
    fn drop(&mut self) {
        if let Ok(mut log) = self.log.lock() {
            log.dropped = true;
        }
    }
}

pub struct FakeEncodeEngine {
    pub native_rgba: bool,
    pub fail_at: Option<usize>,
    pub log: SharedLog,
}

impl FakeEncodeEngine {
    pub fn new() -> Self {
        FakeEncodeEngine {
            native_rgba: true,
            fail_at: None,
            log: SharedLog::default(),
        }
    }
}

struct FakeEncodeSession {
    fail_at: Option<usize>,
    log: SharedLog,
    height: u32,
    max_v: u32,
    scanline: u32,
    writes: usize,
}

impl FakeEncodeSession {
    fn check_failure(&mut self) -> Result<()> {
        let n = self.writes;
        self.writes += 1;
        if self.fail_at == Some(n) {
            return Err(JpegError::engine("fake engine failure"));
        }
        Ok(())
    }
}

impl EncodeEngine for FakeEncodeEngine {
    fn open(&self) -> Result<Box<dyn EncodeSession>> {
        Ok(Box::new(FakeEncodeSession {
            fail_at: self.fail_at,
            log: Arc::clone(&self.log),
            height: 0,
            max_v: 1,
            scanline: 0,
            writes: 0,
        }))
    }

    fn native_rgba(&self) -> bool {
        self.native_rgba
    }
}

impl EncodeSession for FakeEncodeSession {
    fn start(&mut self, setup: &EncodeSetup) -> Result<Vec<SamplingFactors>> {
        self.height = setup.height;
        self.max_v = max_v(setup.sampling.iter().copied());
        lock(&self.log).setup = Some(setup.clone());
        Ok(setup.sampling.clone())
    }

    fn next_scanline(&self) -> u32 {
        self.scanline
    }

    fn write_plane_batch(&mut self, planes: &[PlaneRows<'_>]) -> Result<u32> {
        self.check_failure()?;
        let calls = planes
            .iter()
            .map(|p| PlaneCall {
                rows: p.rows,
                stride: p.stride,
                first_row: p.data[..p.stride].to_vec(),
            })
            .collect();
        lock(&self.log).batches.push(calls);
        let advanced = (self.max_v * 8).min(self.height - self.scanline);
        self.scanline += advanced;
        Ok(advanced)
    }

    fn write_scanline(&mut self, row: &[u8]) -> Result<()> {
        self.check_failure()?;
        lock(&self.log).scanlines.push(row.to_vec());
        self.scanline += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        lock(&self.log).finished = true;
        Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
    }
}

impl Drop for FakeEncodeSession {
    fn drop(&mut self) {
        if let Ok(mut log) = self.log.lock() {
            log.dropped = true;
        }
    }
}
