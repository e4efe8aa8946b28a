// Layout planner: plane geometry and offsets inside one flat pixel buffer

use super::ChromaRatio;

/// Granularity of raw-plane transfer, in pixels.
pub const ALIGN: u32 = 16;

/// Round `x` up to the next multiple of 16.
pub fn align16(x: u32) -> u32 {
    x.div_ceil(ALIGN) * ALIGN
}

/// Dimensions of one component plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaneGeometry {
    pub downsampled_width: u32,
    pub downsampled_height: u32,
    pub aligned_width: u32,
    pub aligned_height: u32,
}

impl PlaneGeometry {
    pub fn stride(&self) -> usize {
        self.aligned_width as usize
    }

    pub fn len(&self) -> usize {
        self.aligned_width as usize * self.aligned_height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where each plane lives inside a single buffer, Y then Cb then Cr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneLayout {
    pub planes: Vec<PlaneGeometry>,
    pub offsets: Vec<usize>,
    pub row_divisor: usize,
    pub ratio: ChromaRatio,
}

impl PlaneLayout {
    pub fn luma(&self) -> &PlaneGeometry {
        &self.planes[0]
    }

    pub fn chroma(&self) -> Option<&PlaneGeometry> {
        self.planes.get(1)
    }

    pub fn y_stride(&self) -> usize {
        self.luma().stride()
    }

    pub fn c_stride(&self) -> usize {
        self.chroma().map_or(0, PlaneGeometry::stride)
    }

    /// Byte range of plane `index`.
    pub fn plane_range(&self, index: usize) -> std::ops::Range<usize> {
        let start = self.offsets[index];
        start..start + self.planes[index].len()
    }

    pub fn total_len(&self) -> usize {
        self.planes
            .last()
            .map_or(0, |last| self.offsets[self.planes.len() - 1] + last.len())
    }

    /// False for the degenerate layout produced for an unknown ratio.
    pub fn is_raw_capable(&self) -> bool {
        self.planes.iter().all(|p| !p.is_empty())
    }
}

fn chroma_dims(ratio: ChromaRatio, w: u32, h: u32) -> (u32, u32) {
    match ratio {
        ChromaRatio::S444 => (w, h),
        ChromaRatio::S440 => (w, h.div_ceil(2)),
        ChromaRatio::S422 => (w.div_ceil(2), h),
        ChromaRatio::S420 => (w.div_ceil(2), h.div_ceil(2)),
        ChromaRatio::S411 => (w.div_ceil(4), h),
        ChromaRatio::S410 => (w.div_ceil(4), h.div_ceil(2)),
        ChromaRatio::Unknown => (0, 0),
    }
}

/// Plan the three-plane YCbCr layout for an image of `width` x `height`.
///
/// Chroma aligned dimensions derive from the aligned luma dimensions, so
/// with vertical sampling factors up to 2 every plane height is a whole
/// number of MCU row batches.
pub fn plan_planes(width: u32, height: u32, ratio: ChromaRatio) -> PlaneLayout {
    let aw = align16(width);
    let ah = align16(height);
    let (dcw, dch) = chroma_dims(ratio, width, height);
    let (acw, ach) = chroma_dims(ratio, aw, ah);

    let luma = PlaneGeometry {
        downsampled_width: width,
        downsampled_height: height,
        aligned_width: aw,
        aligned_height: ah,
    };
    let chroma = PlaneGeometry {
        downsampled_width: dcw,
        downsampled_height: dch,
        aligned_width: acw,
        aligned_height: ach,
    };

    let cb_offset = luma.len();
    let cr_offset = cb_offset + chroma.len();

    PlaneLayout {
        planes: vec![luma, chroma, chroma],
        offsets: vec![0, cb_offset, cr_offset],
        row_divisor: ratio.row_divisor(),
        ratio,
    }
}

/// Plan the single aligned plane used for raw grayscale transfer.
pub fn plan_gray(width: u32, height: u32) -> PlaneLayout {
    PlaneLayout {
        planes: vec![PlaneGeometry {
            downsampled_width: width,
            downsampled_height: height,
            aligned_width: align16(width),
            aligned_height: align16(height),
        }],
        offsets: vec![0],
        row_divisor: 1,
        ratio: ChromaRatio::Unknown,
    }
}
