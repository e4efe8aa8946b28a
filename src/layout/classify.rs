// Subsampling classifier: engine-reported component sizes -> ChromaRatio

use super::{ChromaRatio, PlaneSize, SamplingFactors};

/// Application marker whose non-empty presence forces interleaved RGBA output.
pub const FORCE_INTERLEAVED_MARKER: u8 = 0xED; // APP13

fn half_up(x: u32) -> u32 {
    x.div_ceil(2)
}

/// Classify the luma/chroma relationship of a YCbCr stream.
///
/// Rules apply in order and the first match wins. A numeric 4:2:0 match
/// degrades to [`ChromaRatio::Unknown`] when the Cr component is sampled
/// (1,2) or (2,2), since the raw transfer loop shares one row divisor
/// between both chroma planes.
pub fn classify(luma: PlaneSize, cb: PlaneSize, cr_sampling: SamplingFactors) -> ChromaRatio {
    let (w, h) = (luma.width, luma.height);
    let (cw, ch) = (cb.width, cb.height);

    if w == cw && h == ch {
        ChromaRatio::S444
    } else if w == cw && half_up(h) == ch {
        ChromaRatio::S440
    } else if half_up(w) == cw && h == ch {
        ChromaRatio::S422
    } else if half_up(w) == cw && half_up(h) == ch {
        if matches!((cr_sampling.h, cr_sampling.v), (1, 2) | (2, 2)) {
            ChromaRatio::Unknown
        } else {
            ChromaRatio::S420
        }
    } else {
        ChromaRatio::Unknown
    }
}
