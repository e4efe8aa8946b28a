// Image descriptor types shared by the decode and encode pipelines

pub mod classify;
pub mod format;
pub mod planner;
pub mod scale;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::JpegError;

/// Color space of a JPEG stream or of a caller pixel buffer.
///
/// The numeric codes follow the libjpeg `J_COLOR_SPACE` numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    Grayscale,
    Rgb,
    #[serde(rename = "ycbcr")]
    YCbCr,
    Cmyk,
    Ycck,
}

impl ColorSpace {
    /// Map a libjpeg color space code to a [`ColorSpace`].
    pub fn from_code(code: u32) -> crate::error::Result<Self> {
        match code {
            1 => Ok(ColorSpace::Grayscale),
            2 => Ok(ColorSpace::Rgb),
            3 => Ok(ColorSpace::YCbCr),
            4 => Ok(ColorSpace::Cmyk),
            5 => Ok(ColorSpace::Ycck),
            other => Err(JpegError::unsupported(format!(
                "unrecognized color space code {other}"
            ))),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            ColorSpace::Grayscale => 1,
            ColorSpace::Rgb => 2,
            ColorSpace::YCbCr => 3,
            ColorSpace::Cmyk => 4,
            ColorSpace::Ycck => 5,
        }
    }
}

/// Chroma subsampling ratio between the chroma planes and the luma plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChromaRatio {
    S444,
    S440,
    S422,
    #[default]
    S420,
    S411,
    S410,
    Unknown,
}

impl ChromaRatio {
    /// Factor mapping a luma scanline index to a chroma row index.
    pub fn row_divisor(self) -> usize {
        match self {
            ChromaRatio::S440 | ChromaRatio::S420 | ChromaRatio::S410 => 2,
            _ => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChromaRatio::S444 => "4:4:4",
            ChromaRatio::S440 => "4:4:0",
            ChromaRatio::S422 => "4:2:2",
            ChromaRatio::S420 => "4:2:0",
            ChromaRatio::S411 => "4:1:1",
            ChromaRatio::S410 => "4:1:0",
            ChromaRatio::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ChromaRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChromaRatio {
    type Err = JpegError;

    /// Accepts `"420"` as well as `"4:2:0"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.trim().chars().filter(|c| *c != ':').collect();
        match digits.as_str() {
            "444" => Ok(ChromaRatio::S444),
            "440" => Ok(ChromaRatio::S440),
            "422" => Ok(ChromaRatio::S422),
            "420" => Ok(ChromaRatio::S420),
            "411" => Ok(ChromaRatio::S411),
            "410" => Ok(ChromaRatio::S410),
            _ => Err(JpegError::config(format!("Invalid chroma ratio: '{s}'"))),
        }
    }
}

impl Serialize for ChromaRatio {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChromaRatio {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // YAML reads a bare 420 as an integer
        let raw = serde_yml::Value::deserialize(deserializer)?;
        let text = match raw {
            serde_yml::Value::String(s) => s,
            serde_yml::Value::Number(n) => n.to_string(),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "chroma ratio must be a string or number, got {other:?}"
                )));
            }
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Horizontal and vertical sampling factors of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingFactors {
    pub h: u8,
    pub v: u8,
}

impl SamplingFactors {
    pub const fn new(h: u8, v: u8) -> Self {
        SamplingFactors { h, v }
    }
}

/// Downsampled dimensions of one component as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneSize {
    pub width: u32,
    pub height: u32,
}

impl PlaneSize {
    pub const fn new(width: u32, height: u32) -> Self {
        PlaneSize { width, height }
    }
}

/// Pixel arrangement negotiated for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorPlan {
    Gray,
    YCbCr(ChromaRatio),
    Rgb(ChromaRatio),
    Cmyk,
}

impl ColorPlan {
    pub fn color_space(self) -> ColorSpace {
        match self {
            ColorPlan::Gray => ColorSpace::Grayscale,
            ColorPlan::YCbCr(_) => ColorSpace::YCbCr,
            ColorPlan::Rgb(_) => ColorSpace::Rgb,
            ColorPlan::Cmyk => ColorSpace::Cmyk,
        }
    }

    pub fn chroma(self) -> ChromaRatio {
        match self {
            ColorPlan::YCbCr(ratio) | ColorPlan::Rgb(ratio) => ratio,
            ColorPlan::Gray | ColorPlan::Cmyk => ChromaRatio::Unknown,
        }
    }

    /// Size in bytes of the caller-visible pixel buffer for this plan.
    pub fn buffer_len(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            ColorPlan::Gray => pixels,
            ColorPlan::YCbCr(ratio) => planner::plan_planes(width, height, ratio).total_len(),
            ColorPlan::Rgb(_) | ColorPlan::Cmyk => pixels * 4,
        }
    }
}

/// Image descriptor reported by decode (and by a config-only decode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub chroma_ratio: ChromaRatio,
    pub is_scaled: bool,
}

impl ImageInfo {
    /// The plan describing the pixel buffer a full decode fills.
    pub fn plan(&self) -> ColorPlan {
        match self.color_space {
            ColorSpace::Grayscale => ColorPlan::Gray,
            ColorSpace::YCbCr => ColorPlan::YCbCr(self.chroma_ratio),
            ColorSpace::Rgb => ColorPlan::Rgb(self.chroma_ratio),
            ColorSpace::Cmyk | ColorSpace::Ycck => ColorPlan::Cmyk,
        }
    }

    /// Bytes the caller must provide to [`crate::codec::decoder::Decoder::decode_into`].
    pub fn buffer_len(&self) -> usize {
        self.plan().buffer_len(self.width, self.height)
    }
}
