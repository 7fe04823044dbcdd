use crate::{
    error::{PixelioError, PixelioResult},
    frame::Frame,
};

/// Alpha-blends `overlay` (rgba) onto `background` (rgb, extra channels
/// dropped) with its top-left corner at canvas coordinate `(x, y)`.
///
/// The placement may be negative or past the canvas edges; the visible
/// footprint is clipped and anything fully off-canvas is a no-op. Canvas
/// pixels outside the footprint are untouched. The background is consumed and
/// returned as a 3-channel frame on every path; the overlay is never mutated.
pub fn overlay(background: Frame, overlay: &Frame, x: i64, y: i64) -> PixelioResult<Frame> {
    if overlay.channels != 4 {
        return Err(PixelioError::validation(format!(
            "overlay must be rgba (4 channels), got {}",
            overlay.channels
        )));
    }
    if background.channels < 3 {
        return Err(PixelioError::validation(format!(
            "background must have at least 3 channels, got {}",
            background.channels
        )));
    }

    let mut bg = background.to_rgb()?;

    let bg_w = i64::from(bg.width);
    let bg_h = i64::from(bg.height);
    let mut w = i64::from(overlay.width);
    let mut h = i64::from(overlay.height);
    let (mut x, mut y) = (x, y);

    // Bounding boxes do not intersect at all.
    if x >= bg_w || y >= bg_h || x + w <= 0 || y + h <= 0 {
        return Ok(bg);
    }

    // Clip left/top/right/bottom in that order. Left and top keep the
    // rightmost/bottom-most columns/rows of the overlay; right and bottom
    // keep the first columns/rows of the already-clipped view.
    let mut src_x = 0i64;
    let mut src_y = 0i64;

    if x < 0 {
        w += x;
        src_x = i64::from(overlay.width) - w;
        x = 0;
    }
    if y < 0 {
        h += y;
        src_y = i64::from(overlay.height) - h;
        y = 0;
    }
    if x + w > bg_w {
        w = bg_w - x;
    }
    if y + h > bg_h {
        h = bg_h - y;
    }

    for row in 0..h {
        for col in 0..w {
            let src = overlay.pixel((src_x + col) as u32, (src_y + row) as u32);
            let alpha = f64::from(src[3]) / 255.0;
            let dst = bg.pixel_mut((x + col) as u32, (y + row) as u32);
            for c in 0..3 {
                let blended = (1.0 - alpha) * f64::from(dst[c]) + alpha * f64::from(src[c]);
                // Truncating cast, then clamp, to match the reference blend.
                dst[c] = (blended as i32).clamp(0, 255) as u8;
            }
        }
    }

    Ok(bg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_rgba(w: u32, h: u32, rgb: [u8; 3], a: u8) -> Frame {
        let mut data = Vec::with_capacity((w * h * 4) as usize);
        for _ in 0..w * h {
            data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], a]);
        }
        Frame::from_raw(w, h, 4, data).unwrap()
    }

    #[test]
    fn rejects_non_rgba_overlay_and_narrow_background() {
        let bg = Frame::filled(4, 4, 3, 0).unwrap();
        let rgb_overlay = Frame::filled(2, 2, 3, 0).unwrap();
        assert!(overlay(bg.clone(), &rgb_overlay, 0, 0).is_err());

        let gray_bg = Frame::filled(4, 4, 1, 0).unwrap();
        let ov = solid_rgba(2, 2, [0, 0, 0], 255);
        assert!(overlay(gray_bg, &ov, 0, 0).is_err());
    }

    #[test]
    fn fully_inside_placement_blends_region_only() {
        let bg = Frame::filled(4, 4, 3, 10).unwrap();
        let ov = solid_rgba(2, 2, [255, 0, 0], 255);
        let out = overlay(bg, &ov, 1, 1).unwrap();

        for yy in 0..4u32 {
            for xx in 0..4u32 {
                let inside = (1..3).contains(&xx) && (1..3).contains(&yy);
                let expected: &[u8] = if inside { &[255, 0, 0] } else { &[10, 10, 10] };
                assert_eq!(out.pixel(xx, yy), expected, "pixel ({xx},{yy})");
            }
        }
    }

    #[test]
    fn full_miss_on_every_side_returns_background_unchanged() {
        let bg = Frame::filled(4, 4, 3, 42).unwrap();
        let ov = solid_rgba(2, 2, [255, 255, 255], 255);
        for (x, y) in [(4, 0), (0, 4), (-2, 0), (0, -2), (100, -100), (-2, 4)] {
            let out = overlay(bg.clone(), &ov, x, y).unwrap();
            assert_eq!(out, bg, "placement ({x},{y})");
        }
    }

    #[test]
    fn alpha_zero_is_identity_alpha_full_replaces() {
        let bg = Frame::filled(3, 3, 3, 77).unwrap();

        let transparent = solid_rgba(2, 2, [255, 255, 255], 0);
        assert_eq!(overlay(bg.clone(), &transparent, 0, 0).unwrap(), bg);

        let opaque = solid_rgba(2, 2, [1, 2, 3], 255);
        let out = overlay(bg, &opaque, 0, 0).unwrap();
        assert_eq!(out.pixel(0, 0), &[1, 2, 3]);
        assert_eq!(out.pixel(1, 1), &[1, 2, 3]);
        assert_eq!(out.pixel(2, 2), &[77, 77, 77]);
    }

    #[test]
    fn flush_right_edge_takes_no_clip() {
        let bg = Frame::filled(4, 2, 3, 0).unwrap();
        let ov = solid_rgba(2, 2, [9, 9, 9], 255);
        // x + w == W exactly: full overlay width lands on columns 2..4.
        let out = overlay(bg, &ov, 2, 0).unwrap();
        for yy in 0..2u32 {
            assert_eq!(out.pixel(1, yy), &[0, 0, 0]);
            assert_eq!(out.pixel(2, yy), &[9, 9, 9]);
            assert_eq!(out.pixel(3, yy), &[9, 9, 9]);
        }
    }

    #[test]
    fn left_clip_scenario_red_column_survives() {
        // 4x4 black canvas, 2x2 opaque red overlay at (-1, 1): only the
        // overlay's right column is visible, on canvas rows 1..3, column 0.
        let bg = Frame::filled(4, 4, 3, 0).unwrap();
        let ov = solid_rgba(2, 2, [255, 0, 0], 255);
        let out = overlay(bg, &ov, -1, 1).unwrap();

        for yy in 0..4u32 {
            for xx in 0..4u32 {
                let red = xx == 0 && (1..3).contains(&yy);
                let expected: &[u8] = if red { &[255, 0, 0] } else { &[0, 0, 0] };
                assert_eq!(out.pixel(xx, yy), expected, "pixel ({xx},{yy})");
            }
        }
    }

    #[test]
    fn half_alpha_blend_truncates() {
        // alpha 128 over black with color 200: trunc(128/255 * 200) = 100.
        let bg = Frame::filled(2, 2, 3, 0).unwrap();
        let ov = solid_rgba(2, 2, [200, 200, 200], 128);
        let out = overlay(bg, &ov, 0, 0).unwrap();
        for px in out.data.chunks_exact(3) {
            assert_eq!(px, &[100, 100, 100]);
        }
    }

    #[test]
    fn left_clip_matches_preclipped_overlay() {
        // Compositing at x = -2 must equal dropping the overlay's two
        // leftmost columns and compositing the remainder at x = 0.
        let mut data = Vec::new();
        for row in 0..3u8 {
            for col in 0..4u8 {
                data.extend_from_slice(&[col * 10, row * 10, 0, 200]);
            }
        }
        let ov = Frame::from_raw(4, 3, 4, data).unwrap();

        let mut pre = Vec::new();
        for row in 0..3u32 {
            for col in 2..4u32 {
                pre.extend_from_slice(ov.pixel(col, row));
            }
        }
        let preclipped = Frame::from_raw(2, 3, 4, pre).unwrap();

        let bg = Frame::filled(6, 6, 3, 30).unwrap();
        let a = overlay(bg.clone(), &ov, -2, 0).unwrap();
        let b = overlay(bg, &preclipped, 0, 0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn left_and_right_clip_on_narrow_canvas() {
        // Overlay wider than the whole canvas, shifted left: x = -5 with
        // width 10 on a width-3 canvas keeps overlay columns 5..8.
        let mut data = Vec::new();
        for _row in 0..2u32 {
            for col in 0..10u8 {
                data.extend_from_slice(&[col, 0, 0, 255]);
            }
        }
        let ov = Frame::from_raw(10, 2, 4, data).unwrap();
        let bg = Frame::filled(3, 2, 3, 0).unwrap();

        let out = overlay(bg, &ov, -5, 0).unwrap();
        for yy in 0..2u32 {
            assert_eq!(out.pixel(0, yy), &[5, 0, 0]);
            assert_eq!(out.pixel(1, yy), &[6, 0, 0]);
            assert_eq!(out.pixel(2, yy), &[7, 0, 0]);
        }
    }

    #[test]
    fn corner_clip_on_all_four_corners() {
        let ov = solid_rgba(2, 2, [50, 60, 70], 255);
        for (x, y, visible) in [
            (-1, -1, (0u32, 0u32)),
            (3, -1, (3, 0)),
            (-1, 3, (0, 3)),
            (3, 3, (3, 3)),
        ] {
            let bg = Frame::filled(4, 4, 3, 0).unwrap();
            let out = overlay(bg, &ov, x, y).unwrap();
            let mut touched = 0;
            for yy in 0..4u32 {
                for xx in 0..4u32 {
                    if out.pixel(xx, yy) == [50, 60, 70] {
                        assert_eq!((xx, yy), visible, "placement ({x},{y})");
                        touched += 1;
                    }
                }
            }
            assert_eq!(touched, 1, "placement ({x},{y})");
        }
    }

    #[test]
    fn rgba_background_is_truncated_on_both_paths() {
        let bg = Frame::filled(2, 2, 4, 5).unwrap();
        let ov = solid_rgba(1, 1, [0, 0, 0], 0);

        // Full-miss path.
        let missed = overlay(bg.clone(), &ov, 10, 10).unwrap();
        assert_eq!(missed.channels, 3);
        assert_eq!(missed.data, vec![5; 12]);

        // Blend path.
        let hit = overlay(bg, &ov, 0, 0).unwrap();
        assert_eq!(hit.channels, 3);
        assert_eq!(hit.data, vec![5; 12]);
    }

    #[test]
    fn overlay_buffer_is_not_mutated() {
        let ov = solid_rgba(2, 2, [250, 5, 5], 130);
        let snapshot = ov.clone();
        let bg = Frame::filled(4, 4, 3, 200).unwrap();
        let _ = overlay(bg, &ov, -1, -1).unwrap();
        assert_eq!(ov, snapshot);
    }

    #[test]
    fn zero_width_overlay_is_a_noop() {
        let bg = Frame::filled(3, 3, 3, 8).unwrap();
        let ov = Frame::from_raw(0, 2, 4, Vec::new()).unwrap();
        assert_eq!(overlay(bg.clone(), &ov, 1, 1).unwrap(), bg);
        assert_eq!(overlay(bg.clone(), &ov, -1, 0).unwrap(), bg);
    }
}
