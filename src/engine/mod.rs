// Codec engine capability interface
//
// The engine owns the bitstream, entropy coding, DCT and color conversion.
// Everything above this module only sees these traits.

#[cfg(test)]
pub(crate) mod fake;

use serde::Deserialize;

use crate::layout::{ColorSpace, PlaneSize, SamplingFactors};

/// DCT/IDCT algorithm handed through to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DctMethod {
    /// Slow but accurate integer algorithm.
    #[default]
    ISlow,
    /// Faster, less accurate integer algorithm.
    IFast,
    /// Floating point.
    Float,
}

/// Per-component information reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentInfo {
    pub sampling: SamplingFactors,
    pub downsampled: PlaneSize,
}

/// What the engine learned from the stream header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    pub width: u32,
    pub height: u32,
    /// `None` when the stream uses a color space this crate cannot handle.
    pub color_space: Option<ColorSpace>,
    pub components: Vec<ComponentInfo>,
    /// A non-empty [`crate::layout::classify::FORCE_INTERLEAVED_MARKER`] was found.
    pub force_interleaved_hint: bool,
}

/// Packed pixel formats for scanline transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Gray,
    Rgb,
    Rgba,
    Cmyk,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Gray => 1,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba | PixelFormat::Cmyk => 4,
        }
    }
}

/// Row delivery mode requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    RawPlanes,
    Scanlines(PixelFormat),
}

/// Decoder flags passed through unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeParams {
    pub fancy_upsampling: bool,
    pub block_smoothing: bool,
    pub arithmetic_coding: bool,
    pub dct_method: DctMethod,
}

/// Geometry fixed once decompression has started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeStart {
    pub output_width: u32,
    pub output_height: u32,
    pub max_v_samp: u8,
}

/// Rows of one plane offered to the engine for writing.
///
/// Row `i` starts at `i * stride`; `data` holds at least `rows * stride`
/// bytes.
pub struct PlaneRowsMut<'a> {
    pub data: &'a mut [u8],
    pub stride: usize,
    pub rows: usize,
}

/// Rows of one plane offered to the engine for reading.
pub struct PlaneRows<'a> {
    pub data: &'a [u8],
    pub stride: usize,
    pub rows: usize,
}

/// One decompression session over an in-memory stream.
///
/// Dropping the session releases every engine resource, whatever state the
/// session is in.
pub trait DecodeSession {
    /// Header information; reflects the scale once [`Self::set_scale`] ran.
    fn header(&self) -> HeaderInfo;

    /// Request a `numerator/8` output scale and return the output size.
    fn set_scale(&mut self, numerator: u32) -> crate::error::Result<(u32, u32)>;

    fn start(&mut self, mode: OutputMode, params: &DecodeParams) -> crate::error::Result<DecodeStart>;

    /// Number of output rows already delivered.
    fn output_scanline(&self) -> u32;

    /// Read one MCU row batch into the given planes. Returns rows advanced.
    fn read_plane_batch(&mut self, planes: &mut [PlaneRowsMut<'_>]) -> crate::error::Result<u32>;

    /// Read one packed scanline.
    fn read_scanline(&mut self, row: &mut [u8]) -> crate::error::Result<()>;

    fn finish(&mut self) -> crate::error::Result<()>;
}

/// Factory for decode sessions.
pub trait DecodeEngine: Send + Sync {
    /// Parse the stream header. Fails with a malformed-input error.
    fn open<'a>(&self, data: &'a [u8]) -> crate::error::Result<Box<dyn DecodeSession + 'a>>;

    /// Whether scanlines can be delivered as 4-channel RGBA directly.
    fn native_rgba(&self) -> bool {
        true
    }
}

/// Engine configuration for one compression call.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSetup {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub sampling: Vec<SamplingFactors>,
    pub input: OutputMode,
    pub quality: u8,
    pub progressive_level: u8,
    pub optimize_coding: bool,
    pub adaptive_quantization: bool,
    pub use_standard_quant_tables: bool,
    pub fancy_downsampling: bool,
    /// Arithmetic instead of Huffman entropy coding.
    pub arithmetic_coding: bool,
    pub dct_method: DctMethod,
}

/// One compression session writing into engine-owned memory.
pub trait EncodeSession {
    /// Configure and start compression; returns the component sampling the
    /// engine settled on.
    fn start(&mut self, setup: &EncodeSetup) -> crate::error::Result<Vec<SamplingFactors>>;

    /// Number of input rows already consumed.
    fn next_scanline(&self) -> u32;

    fn write_plane_batch(&mut self, planes: &[PlaneRows<'_>]) -> crate::error::Result<u32>;

    fn write_scanline(&mut self, row: &[u8]) -> crate::error::Result<()>;

    /// Complete the stream and hand back its bytes.
    fn finish(&mut self) -> crate::error::Result<Vec<u8>>;
}

/// Factory for encode sessions.
pub trait EncodeEngine: Send + Sync {
    fn open(&self) -> crate::error::Result<Box<dyn EncodeSession>>;

    /// Whether 4-channel RGBA rows are accepted directly.
    fn native_rgba(&self) -> bool {
        true
    }
}
