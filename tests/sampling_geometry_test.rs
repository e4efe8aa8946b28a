// Real streams with sampling layouts the encoder never writes itself

use jpeg_planar::codec::image::Pixels;
use jpeg_planar::{ChromaRatio, ColorSpace, DecodeOptions, Decoder};

fn decoder() -> Decoder<jpeg_planar::ffi::MozjpegEngine> {
    Decoder::mozjpeg(DecodeOptions::default())
}

/// Smooth RGB gradient, 3 bytes per pixel.
fn rgb_gradient(w: u32, h: u32) -> Vec<u8> {
    (0..h)
        .flat_map(|y| (0..w).flat_map(move |x| [(x * 255 / w) as u8, (y * 255 / h) as u8, 128]))
        .collect()
}

/// Encode RGB scanlines with explicit (h, v) sampling per component.
fn encode_with_sampling(rgb: &[u8], w: u32, h: u32, sampling: [(i32, i32); 3]) -> Vec<u8> {
    use mozjpeg_sys::*;
    use std::ffi::c_void;
    use std::ptr;

    unsafe {
        let mut cinfo: jpeg_compress_struct = std::mem::zeroed();
        let mut jerr: jpeg_error_mgr = std::mem::zeroed();

        cinfo.common.err = jpeg_std_error(&mut jerr);
        jpeg_CreateCompress(
            &mut cinfo,
            JPEG_LIB_VERSION as i32,
            std::mem::size_of::<jpeg_compress_struct>(),
        );

        let mut outbuffer: *mut u8 = ptr::null_mut();
        let mut outsize: libc::c_ulong = 0;
        jpeg_mem_dest(&mut cinfo, &mut outbuffer, &mut outsize);

        cinfo.image_width = w;
        cinfo.image_height = h;
        cinfo.input_components = 3;
        cinfo.in_color_space = J_COLOR_SPACE::JCS_RGB;

        // baseline libjpeg defaults: one sequential scan
        jpeg_c_set_int_param(
            &mut cinfo,
            J_INT_PARAM::JINT_COMPRESS_PROFILE,
            JCP_FASTEST as i32,
        );
        jpeg_set_defaults(&mut cinfo);
        jpeg_set_quality(&mut cinfo, 100, 1);

        for (i, (hs, vs)) in sampling.into_iter().enumerate() {
            let comp = cinfo.comp_info.add(i).as_mut().unwrap();
            comp.h_samp_factor = hs;
            comp.v_samp_factor = vs;
        }

        jpeg_start_compress(&mut cinfo, 1);

        let row_stride = w as usize * 3;
        let mut row_pointer: [*const u8; 1] = [ptr::null()];
        while cinfo.next_scanline < cinfo.image_height {
            let row_idx = cinfo.next_scanline as usize;
            row_pointer[0] = rgb.as_ptr().add(row_idx * row_stride);
            jpeg_write_scanlines(&mut cinfo, row_pointer.as_ptr() as _, 1);
        }

        jpeg_finish_compress(&mut cinfo);
        jpeg_destroy_compress(&mut cinfo);

        let result = std::slice::from_raw_parts(outbuffer, outsize as usize).to_vec();
        libc::free(outbuffer as *mut c_void);
        result
    }
}

fn mean_abs_diff(a: impl Iterator<Item = u8>, b: impl Iterator<Item = u8>) -> f64 {
    let (sum, n) = a
        .zip(b)
        .fold((0u64, 0u64), |(s, n), (x, y)| (s + u64::from(x.abs_diff(y)), n + 1));
    sum as f64 / n.max(1) as f64
}

/// RGB channels of an RGBA buffer.
fn rgb_of(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4).flat_map(|p| [p[0], p[1], p[2]]).collect()
}

// ============================================================
// 1. Cr sampled differently from Cb
// ============================================================

#[test]
fn test_mismatched_cr_sampling_falls_back_to_rgba() {
    let (w, h) = (32, 32);
    let rgb = rgb_gradient(w, h);
    let jpeg = encode_with_sampling(&rgb, w, h, [(2, 2), (1, 1), (1, 2)]);

    let info = decoder().read_info(&jpeg).expect("read info");
    assert_eq!(info.color_space, ColorSpace::Rgb);
    assert_eq!(info.chroma_ratio, ChromaRatio::Unknown);
    assert_eq!(info.buffer_len(), 32 * 32 * 4);

    let decoded = decoder().decode(&jpeg).expect("fallback decode");
    let Pixels::Rgba(img) = decoded.pixels() else {
        panic!("expected RGBA output");
    };
    assert_eq!(img.dimensions(), (w, h));
    assert!(img.pixels().all(|p| p[3] == 255));
    let err = mean_abs_diff(rgb_of(img.as_raw()).into_iter(), rgb.iter().copied());
    assert!(err < 8.0, "mean error {err}");
}

// ============================================================
// 2. Vertical luma factor 4
// ============================================================

#[test]
fn test_luma_v4_untiled_height_falls_back() {
    // 40 rows align to 48, which 32-row batches cannot tile
    let (w, h) = (24, 40);
    let rgb = rgb_gradient(w, h);
    let jpeg = encode_with_sampling(&rgb, w, h, [(1, 4), (1, 2), (1, 2)]);

    let info = decoder().read_info(&jpeg).expect("read info");
    assert_eq!(info.color_space, ColorSpace::Rgb);
    assert_eq!(info.chroma_ratio, ChromaRatio::S440);

    let mut out = vec![0u8; info.buffer_len()];
    let decoded_info = decoder()
        .decode_into(&jpeg, false, &mut out)
        .expect("decode after fallback");
    assert_eq!(decoded_info, info);
    let err = mean_abs_diff(rgb_of(&out).into_iter(), rgb.iter().copied());
    assert!(err < 8.0, "mean error {err}");
}

#[test]
fn test_luma_v4_tiled_height_stays_planar() {
    let (w, h) = (24, 64);
    let rgb = rgb_gradient(w, h);
    let jpeg = encode_with_sampling(&rgb, w, h, [(1, 4), (1, 2), (1, 2)]);

    let decoded = decoder().decode(&jpeg).expect("planar decode");
    assert_eq!(decoded.info().color_space, ColorSpace::YCbCr);
    assert_eq!(decoded.info().chroma_ratio, ChromaRatio::S440);
    let Pixels::YCbCr(img) = decoded.pixels() else {
        panic!("expected planar output");
    };
    let err = mean_abs_diff(img.to_rgb().into_raw().into_iter(), rgb.iter().copied());
    assert!(err < 8.0, "mean error {err}");
}

// ============================================================
// 3. Standard layouts classify from the real header
// ============================================================

#[test]
fn test_real_headers_classify_standard_ratios() {
    let (w, h) = (33, 17);
    let rgb = rgb_gradient(w, h);
    for (sampling, ratio) in [
        ([(1, 1), (1, 1), (1, 1)], ChromaRatio::S444),
        ([(1, 2), (1, 1), (1, 1)], ChromaRatio::S440),
        ([(2, 1), (1, 1), (1, 1)], ChromaRatio::S422),
        ([(2, 2), (1, 1), (1, 1)], ChromaRatio::S420),
    ] {
        let jpeg = encode_with_sampling(&rgb, w, h, sampling);
        let info = decoder().read_info(&jpeg).expect("read info");
        assert_eq!(info.color_space, ColorSpace::YCbCr, "{ratio}");
        assert_eq!(info.chroma_ratio, ratio);
    }
}
