//! Geometric card normalization.
//!
//! Photographs arrive at arbitrary resolution and angle. This module
//! shrinks oversized frames, hunts for the card outline as the largest
//! four-corner contour, and warps it into a fixed landscape frame so the
//! downstream region layouts apply. When no outline is found the resized
//! frame passes through unchanged; normalization never fails, it only
//! degrades.

use image::imageops::{self, FilterType};
use image::{GrayImage, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::equalize_histogram;
use imageproc::edges::canny;
use imageproc::filter::bilateral_filter;
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use tracing::debug;

use crate::config::PipelineConfig;

const BILATERAL_WINDOW: u32 = 9;
const BILATERAL_SIGMA: f32 = 75.0;
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;
const CORNER_EPSILON_RATIO: f64 = 0.02;

/// A frame normalized for field extraction.
#[derive(Debug, Clone)]
pub struct NormalizedCard {
    pub image: RgbImage,
    /// False when no card outline was found and `image` is just the
    /// resized input frame.
    pub card_detected: bool,
}

/// Normalize one decoded frame.
pub fn normalize(frame: RgbImage, pipeline: &PipelineConfig) -> NormalizedCard {
    let resized = shrink_to_fit(frame, pipeline.max_width, pipeline.max_height);
    if resized.width() == 0 || resized.height() == 0 {
        return NormalizedCard { image: resized, card_detected: false };
    }

    // Detection runs on a cleaned grayscale copy; the warp itself always
    // samples the untouched color frame.
    let gray = imageops::grayscale(&resized);
    let denoised = bilateral_filter(&gray, BILATERAL_WINDOW, BILATERAL_SIGMA, BILATERAL_SIGMA);
    let detection = equalize_histogram(&denoised);

    if let Some(corners) = find_card_corners(&detection, pipeline.min_card_area) {
        if let Some(card) = rectify(&resized, corners, pipeline.card_width, pipeline.card_height)
        {
            debug!(
                width = card.width(),
                height = card.height(),
                "card outline rectified"
            );
            return NormalizedCard { image: card, card_detected: true };
        }
    }

    debug!("no card outline found, using resized frame");
    NormalizedCard { image: resized, card_detected: false }
}

/// Scale a frame down to fit within the given bounds, preserving aspect
/// ratio. Frames that already fit are returned untouched.
fn shrink_to_fit(frame: RgbImage, max_width: u32, max_height: u32) -> RgbImage {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return frame;
    }
    let scale = f64::min(
        f64::from(max_width.max(1)) / f64::from(width),
        f64::from(max_height.max(1)) / f64::from(height),
    );
    if scale >= 1.0 {
        return frame;
    }
    let new_width = ((f64::from(width) * scale).round() as u32).max(1);
    let new_height = ((f64::from(height) * scale).round() as u32).max(1);
    imageops::resize(&frame, new_width, new_height, FilterType::Triangle)
}

/// Find the corners of the largest plausible card outline.
///
/// Candidates are outer contours whose polygon approximation collapses to
/// exactly four corners and whose area clears `min_area`. Returns corners
/// ordered top-left, top-right, bottom-right, bottom-left.
fn find_card_corners(detection: &GrayImage, min_area: f64) -> Option<[(f32, f32); 4]> {
    let edges = canny(detection, CANNY_LOW, CANNY_HIGH);
    let contours = find_contours::<i32>(&edges);

    let mut best: Option<(f64, [Point<i32>; 4])> = None;
    for contour in &contours {
        if contour.border_type != BorderType::Outer || contour.points.len() < 4 {
            continue;
        }
        let perimeter = arc_length(&contour.points, true);
        let approx = approximate_polygon_dp(
            &contour.points,
            CORNER_EPSILON_RATIO * perimeter,
            true,
        );
        if approx.len() != 4 {
            continue;
        }
        let area = polygon_area(&approx);
        if area <= min_area {
            continue;
        }
        let quad = [approx[0], approx[1], approx[2], approx[3]];
        match best {
            Some((best_area, _)) if best_area >= area => {}
            _ => best = Some((area, quad)),
        }
    }

    best.map(|(area, quad)| {
        debug!(area, "card outline candidate accepted");
        order_corners(quad)
    })
}

/// Shoelace area of a closed polygon.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut doubled = 0i64;
    for i in 0..points.len() {
        let p = points[i];
        let q = points[(i + 1) % points.len()];
        doubled += i64::from(p.x) * i64::from(q.y) - i64::from(q.x) * i64::from(p.y);
    }
    doubled.abs() as f64 / 2.0
}

/// Order four corners as top-left, top-right, bottom-right, bottom-left.
///
/// The top-left corner minimizes x+y and the bottom-right maximizes it;
/// the other two are separated by the sign of y-x.
fn order_corners(quad: [Point<i32>; 4]) -> [(f32, f32); 4] {
    let sum = |p: &&Point<i32>| i64::from(p.x) + i64::from(p.y);
    let diff = |p: &&Point<i32>| i64::from(p.y) - i64::from(p.x);

    let top_left = quad.iter().min_by_key(sum).copied().unwrap_or(quad[0]);
    let bottom_right = quad.iter().max_by_key(sum).copied().unwrap_or(quad[0]);
    let top_right = quad.iter().min_by_key(diff).copied().unwrap_or(quad[0]);
    let bottom_left = quad.iter().max_by_key(diff).copied().unwrap_or(quad[0]);

    [
        (top_left.x as f32, top_left.y as f32),
        (top_right.x as f32, top_right.y as f32),
        (bottom_right.x as f32, bottom_right.y as f32),
        (bottom_left.x as f32, bottom_left.y as f32),
    ]
}

/// Warp the quad spanned by `corners` onto a `width` x `height` frame.
///
/// Returns `None` when the corners are degenerate and no projection
/// exists, in which case the caller falls back to the unwarped frame.
fn rectify(
    frame: &RgbImage,
    corners: [(f32, f32); 4],
    width: u32,
    height: u32,
) -> Option<RgbImage> {
    let width = width.max(1);
    let height = height.max(1);
    let target = [
        (0.0, 0.0),
        ((width - 1) as f32, 0.0),
        ((width - 1) as f32, (height - 1) as f32),
        (0.0, (height - 1) as f32),
    ];
    let projection = Projection::from_control_points(corners, target)?;
    let mut card = RgbImage::new(width, height);
    warp_into(
        frame,
        &projection,
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
        &mut card,
    );
    Some(card)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    #[test]
    fn test_shrink_downscales_oversized_frames() {
        let frame = RgbImage::new(2400, 1600);
        let resized = shrink_to_fit(frame, 1200, 800);
        assert_eq!(resized.dimensions(), (1200, 800));
    }

    #[test]
    fn test_shrink_preserves_aspect_ratio() {
        let frame = RgbImage::new(2400, 1200);
        let resized = shrink_to_fit(frame, 1200, 800);
        assert_eq!(resized.dimensions(), (1200, 600));
    }

    #[test]
    fn test_shrink_leaves_small_frames_alone() {
        let frame = RgbImage::new(600, 400);
        let resized = shrink_to_fit(frame, 1200, 800);
        assert_eq!(resized.dimensions(), (600, 400));
    }

    #[test]
    fn test_polygon_area_rectangle() {
        let points = vec![
            Point::new(0, 0),
            Point::new(100, 0),
            Point::new(100, 50),
            Point::new(0, 50),
        ];
        assert_eq!(polygon_area(&points), 5000.0);
        assert_eq!(polygon_area(&points[..2]), 0.0);
    }

    #[test]
    fn test_order_corners_from_scrambled_input() {
        let quad = [
            Point::new(500, 80),
            Point::new(90, 400),
            Point::new(100, 100),
            Point::new(510, 390),
        ];
        let ordered = order_corners(quad);
        assert_eq!(ordered[0], (100.0, 100.0));
        assert_eq!(ordered[1], (500.0, 80.0));
        assert_eq!(ordered[2], (510.0, 390.0));
        assert_eq!(ordered[3], (90.0, 400.0));
    }

    #[test]
    fn test_normalize_detects_synthetic_card() {
        let mut frame = RgbImage::new(640, 440);
        draw_filled_rect_mut(
            &mut frame,
            Rect::at(70, 60).of_size(480, 300),
            Rgb([230, 230, 230]),
        );
        let card = normalize(frame, &PipelineConfig::default());
        assert!(card.card_detected);
        assert_eq!(card.image.dimensions(), (640, 400));
        // The bright card interior fills the warped frame.
        assert!(card.image.get_pixel(320, 200)[0] > 160);
    }

    #[test]
    fn test_normalize_falls_back_on_featureless_frame() {
        let frame = RgbImage::from_pixel(500, 300, Rgb([128, 128, 128]));
        let card = normalize(frame, &PipelineConfig::default());
        assert!(!card.card_detected);
        assert_eq!(card.image.dimensions(), (500, 300));
    }

    #[test]
    fn test_normalize_ignores_small_outlines() {
        // A 60x40 blob is a valid quad but far below the area floor.
        let mut frame = RgbImage::new(500, 300);
        draw_filled_rect_mut(
            &mut frame,
            Rect::at(200, 100).of_size(60, 40),
            Rgb([230, 230, 230]),
        );
        let card = normalize(frame, &PipelineConfig::default());
        assert!(!card.card_detected);
        assert_eq!(card.image.dimensions(), (500, 300));
    }
}
