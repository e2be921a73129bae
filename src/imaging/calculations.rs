//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Height that preserves the source aspect ratio at `target_width`.
///
/// Width is the only explicit control; height is always derived as
/// `round(target_width * height / width)`. Never returns zero, so extremely
/// wide sources still produce a one-pixel-tall output.
///
/// # Examples
/// ```
/// # use image_scaler::imaging::scaled_height;
/// // 4:3 landscape at 150px wide → 150x113 (112.5 rounds up)
/// assert_eq!(scaled_height(150, (800, 600)), 113);
///
/// // Portrait 3:4 at 400px wide → 400x533
/// assert_eq!(scaled_height(400, (600, 800)), 533);
/// ```
pub fn scaled_height(target_width: u32, original: (u32, u32)) -> u32 {
    let (orig_w, orig_h) = original;
    if orig_w == 0 {
        return 1;
    }
    let h = (target_width as f64 * orig_h as f64 / orig_w as f64).round() as u32;
    h.max(1)
}

/// Output dimensions for a target width: `(target_width, scaled_height)`.
pub fn scaled_dimensions(target_width: u32, original: (u32, u32)) -> (u32, u32) {
    (target_width, scaled_height(target_width, original))
}
