// Pixel repacking between caller buffers and engine buffers

/// Expand packed RGB into RGBA with opaque alpha.
///
/// Copies `min(src.len() / 3, dst.len() / 4)` pixels.
pub fn rgb_into_rgba(src: &[u8], dst: &mut [u8]) {
    for (rgb, rgba) in src.chunks_exact(3).zip(dst.chunks_exact_mut(4)) {
        rgba[..3].copy_from_slice(rgb);
        rgba[3] = 255;
    }
}

/// Drop the alpha channel of packed RGBA.
pub fn rgba_to_rgb(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len() / 4 * 3);
    for px in src.chunks_exact(4) {
        out.extend_from_slice(&px[..3]);
    }
    out
}

/// Copy `width` x `height` samples out of a plane with `src_stride` into a
/// tightly packed destination.
pub fn compact_plane(src: &[u8], src_stride: usize, dst: &mut [u8], width: usize, height: usize) {
    for (src_row, dst_row) in src
        .chunks(src_stride)
        .zip(dst.chunks_exact_mut(width))
        .take(height)
    {
        dst_row.copy_from_slice(&src_row[..width]);
    }
}

/// Copy a tightly packed plane into an `aligned_width` x `aligned_height`
/// plane, replicating the last column and the last row into the padding.
pub fn pad_plane(
    src: &[u8],
    width: usize,
    height: usize,
    aligned_width: usize,
    aligned_height: usize,
) -> Vec<u8> {
    let mut out = vec![0u8; aligned_width * aligned_height];
    if width == 0 || height == 0 {
        return out;
    }
    for (y, row) in out.chunks_exact_mut(aligned_width).enumerate() {
        let sy = y.min(height - 1);
        let src_row = &src[sy * width..(sy + 1) * width];
        row[..width].copy_from_slice(src_row);
        let edge = src_row[width - 1];
        row[width..].fill(edge);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_into_rgba_sets_alpha() {
        let src = [1, 2, 3, 4, 5, 6];
        let mut dst = [0u8; 8];
        rgb_into_rgba(&src, &mut dst);
        assert_eq!(dst, [1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn test_rgba_to_rgb_drops_alpha() {
        assert_eq!(rgba_to_rgb(&[1, 2, 3, 9, 4, 5, 6, 0]), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_compact_plane() {
        // 3x2 image in a plane of stride 4
        let src = [1, 2, 3, 0, 4, 5, 6, 0, 9, 9, 9, 9];
        let mut dst = [0u8; 6];
        compact_plane(&src, 4, &mut dst, 3, 2);
        assert_eq!(dst, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_pad_plane_replicates_edges() {
        let src = [1, 2, 3, 4];
        let out = pad_plane(&src, 2, 2, 4, 3);
        assert_eq!(out, vec![1, 2, 2, 2, 3, 4, 4, 4, 3, 4, 4, 4]);
    }
}
