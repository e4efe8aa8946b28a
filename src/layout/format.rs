// Format selector: caller (color space, ratio) -> engine component setup

use super::{ChromaRatio, ColorPlan, ColorSpace, SamplingFactors};
use crate::error::JpegError;

/// How pixel rows reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Per-component planes, no color conversion in the engine.
    RawPlanes,
    /// One packed row per call with `channels` bytes per pixel.
    Interleaved { channels: usize },
}

/// Result of format selection for one encode call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSelection {
    pub plan: ColorPlan,
    pub sampling: Vec<SamplingFactors>,
    pub transfer: Transfer,
}

/// Luma sampling factors for a subsampling ratio; chroma is always (1,1).
pub fn luma_sampling(ratio: ChromaRatio) -> Option<SamplingFactors> {
    match ratio {
        ChromaRatio::S444 => Some(SamplingFactors::new(1, 1)),
        ChromaRatio::S440 => Some(SamplingFactors::new(1, 2)),
        ChromaRatio::S422 => Some(SamplingFactors::new(2, 1)),
        ChromaRatio::S420 => Some(SamplingFactors::new(2, 2)),
        _ => None,
    }
}

fn three_component(ratio: ChromaRatio) -> crate::error::Result<Vec<SamplingFactors>> {
    let luma = luma_sampling(ratio).ok_or_else(|| {
        JpegError::unsupported(format!("chroma ratio {ratio} cannot be encoded"))
    })?;
    let chroma = SamplingFactors::new(1, 1);
    Ok(vec![luma, chroma, chroma])
}

/// Select the component layout for encoding `color_space` at `ratio`.
///
/// Fails before any engine session exists when the combination is not
/// encodable.
pub fn select_format(
    color_space: ColorSpace,
    ratio: ChromaRatio,
) -> crate::error::Result<FormatSelection> {
    match color_space {
        ColorSpace::Grayscale => Ok(FormatSelection {
            plan: ColorPlan::Gray,
            sampling: vec![SamplingFactors::new(1, 1)],
            transfer: Transfer::RawPlanes,
        }),
        ColorSpace::YCbCr => Ok(FormatSelection {
            plan: ColorPlan::YCbCr(ratio),
            sampling: three_component(ratio)?,
            transfer: Transfer::RawPlanes,
        }),
        ColorSpace::Rgb => Ok(FormatSelection {
            plan: ColorPlan::Rgb(ratio),
            sampling: three_component(ratio)?,
            transfer: Transfer::Interleaved { channels: 4 },
        }),
        ColorSpace::Cmyk => Ok(FormatSelection {
            plan: ColorPlan::Cmyk,
            sampling: vec![SamplingFactors::new(1, 1); 4],
            transfer: Transfer::Interleaved { channels: 4 },
        }),
        ColorSpace::Ycck => Err(JpegError::unsupported(
            "YCCK input cannot be encoded",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_gray_ignores_ratio() {
        let sel = select_format(ColorSpace::Grayscale, ChromaRatio::S411).unwrap();
        assert_eq!(sel.plan, ColorPlan::Gray);
        assert_eq!(sel.sampling, vec![SamplingFactors::new(1, 1)]);
        assert_eq!(sel.transfer, Transfer::RawPlanes);
    }

    #[test]
    fn test_select_ycbcr_luma_factors() {
        let cases = [
            (ChromaRatio::S444, (1, 1)),
            (ChromaRatio::S440, (1, 2)),
            (ChromaRatio::S422, (2, 1)),
            (ChromaRatio::S420, (2, 2)),
        ];
        for (ratio, (h, v)) in cases {
            let sel = select_format(ColorSpace::YCbCr, ratio).unwrap();
            assert_eq!(sel.sampling[0], SamplingFactors::new(h, v));
            assert_eq!(sel.sampling[1], SamplingFactors::new(1, 1));
            assert_eq!(sel.sampling[2], SamplingFactors::new(1, 1));
        }
    }

    #[test]
    fn test_select_rgb_is_interleaved() {
        let sel = select_format(ColorSpace::Rgb, ChromaRatio::S422).unwrap();
        assert_eq!(sel.plan, ColorPlan::Rgb(ChromaRatio::S422));
        assert_eq!(sel.transfer, Transfer::Interleaved { channels: 4 });
    }

    #[test]
    fn test_select_cmyk_four_full_planes() {
        let sel = select_format(ColorSpace::Cmyk, ChromaRatio::S420).unwrap();
        assert_eq!(sel.sampling.len(), 4);
        assert!(sel.sampling.iter().all(|s| *s == SamplingFactors::new(1, 1)));
    }

    #[test]
    fn test_select_rejects_unencodable() {
        assert!(select_format(ColorSpace::Ycck, ChromaRatio::S444).is_err());
        assert!(select_format(ColorSpace::YCbCr, ChromaRatio::S411).is_err());
        assert!(select_format(ColorSpace::Rgb, ChromaRatio::Unknown).is_err());
    }
}
