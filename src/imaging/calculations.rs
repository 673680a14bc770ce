//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Scale `original` so its longer edge fits within `bound`, preserving aspect ratio.
///
/// Never upscales: an image whose longer edge is already within the bound
/// keeps its exact size. The shorter edge is rounded to the nearest pixel and
/// never drops below 1.
///
/// Returns `None` for a zero-area source or a zero bound.
///
/// # Examples
/// ```
/// # use imgbundle::imaging::fit_within_bound;
/// assert_eq!(fit_within_bound((4000, 3000), 256), Some((256, 192)));
/// assert_eq!(fit_within_bound((10, 10), 256), Some((10, 10)));
/// ```
pub fn fit_within_bound(original: (u32, u32), bound: u32) -> Option<(u32, u32)> {
    let (orig_w, orig_h) = original;
    if orig_w == 0 || orig_h == 0 || bound == 0 {
        return None;
    }

    let longer_edge = orig_w.max(orig_h);
    if longer_edge <= bound {
        return Some(original);
    }

    let ratio = bound as f64 / longer_edge as f64;
    let scaled = if orig_w >= orig_h {
        // Landscape or square
        (bound, scale_edge(orig_h, ratio))
    } else {
        // Portrait
        (scale_edge(orig_w, ratio), bound)
    };
    Some(scaled)
}

fn scale_edge(edge: u32, ratio: f64) -> u32 {
    ((edge as f64 * ratio).round() as u32).max(1)
}
