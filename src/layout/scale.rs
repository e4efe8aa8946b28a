// Decode-time eighths scale factor search

/// Denominator of every decode scale factor.
pub const SCALE_DENOM: u32 = 8;

/// Pick the smallest `k` in 1..=8 whose `k/8` output still covers the target.
///
/// Returns `None` when no downscale is requested (either target is 0) or
/// when only the full 8/8 scale satisfies the target.
pub fn find_scale_factor(
    width: u32,
    height: u32,
    target_width: u32,
    target_height: u32,
) -> Option<u32> {
    if target_width == 0 || target_height == 0 {
        return None;
    }

    let covers = |k: u32| {
        scaled_dim(width, k) >= u64::from(target_width)
            && scaled_dim(height, k) >= u64::from(target_height)
    };

    (1..SCALE_DENOM).find(|&k| covers(k))
}

fn scaled_dim(dim: u32, k: u32) -> u64 {
    (u64::from(k) * u64::from(dim)).div_ceil(u64::from(SCALE_DENOM))
}
