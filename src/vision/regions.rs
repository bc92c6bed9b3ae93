//! Field region cropping and enhancement.
//!
//! A rectified card has a fixed layout, so each field of interest is
//! addressed by fractional coordinates relative to the card frame. Three
//! alternative layouts cover the drift seen on real photographs; the
//! recognizer walks them in order until one yields text.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::{equalize_histogram, otsu_level};
use imageproc::distance_transform::Norm;
use imageproc::filter::median_filter;
use imageproc::morphology::close;

/// Card fields the pipeline extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Ethnicity,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Ethnicity => "ethnicity",
        }
    }
}

/// A region given as fractions of the card frame, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionSpec {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One candidate placement of both fields on the card.
#[derive(Debug, Clone, Copy)]
pub struct RegionLayout {
    pub label: &'static str,
    pub name: RegionSpec,
    pub ethnicity: RegionSpec,
}

/// Candidate layouts in the order they are attempted. The first entry is
/// the nominal card geometry; the others shift and resize the windows to
/// catch cards photographed with the text displaced.
pub const REGION_LAYOUTS: [RegionLayout; 3] = [
    RegionLayout {
        label: "standard",
        name: RegionSpec { x: 0.13, y: 0.12, width: 0.28, height: 0.10 },
        ethnicity: RegionSpec { x: 0.13, y: 0.28, width: 0.20, height: 0.10 },
    },
    RegionLayout {
        label: "wide",
        name: RegionSpec { x: 0.10, y: 0.10, width: 0.30, height: 0.12 },
        ethnicity: RegionSpec { x: 0.10, y: 0.25, width: 0.25, height: 0.12 },
    },
    RegionLayout {
        label: "tight",
        name: RegionSpec { x: 0.15, y: 0.15, width: 0.25, height: 0.08 },
        ethnicity: RegionSpec { x: 0.15, y: 0.32, width: 0.18, height: 0.08 },
    },
];

/// A concrete pixel rectangle, guaranteed in-bounds and at least 1x1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Resolve a fractional spec against concrete image dimensions.
///
/// Total for any spec: out-of-range fractions are clamped so the result
/// always lies inside the image and covers at least one pixel.
fn clamp_region(spec: RegionSpec, image_width: u32, image_height: u32) -> PixelRect {
    let iw = i64::from(image_width.max(1));
    let ih = i64::from(image_height.max(1));
    let x = ((image_width.max(1) as f64 * spec.x) as i64).clamp(0, iw - 1);
    let y = ((image_height.max(1) as f64 * spec.y) as i64).clamp(0, ih - 1);
    let width = ((image_width.max(1) as f64 * spec.width) as i64).clamp(1, iw - x);
    let height = ((image_height.max(1) as f64 * spec.height) as i64).clamp(1, ih - y);
    PixelRect {
        x: x as u32,
        y: y as u32,
        width: width as u32,
        height: height as u32,
    }
}

/// Enhanced crops of both fields under one layout.
#[derive(Debug, Clone)]
pub struct FieldCrops {
    pub name: GrayImage,
    pub ethnicity: GrayImage,
}

/// Crop both field regions from a rectified card and enhance them for
/// text recognition.
pub fn extract_regions(card: &RgbImage, layout: &RegionLayout, upscale: u32) -> FieldCrops {
    FieldCrops {
        name: extract_field(card, layout.name, upscale),
        ethnicity: extract_field(card, layout.ethnicity, upscale),
    }
}

/// Crop one field region and run it through the enhancement chain.
pub fn extract_field(card: &RgbImage, spec: RegionSpec, upscale: u32) -> GrayImage {
    if card.width() == 0 || card.height() == 0 {
        return GrayImage::new(1, 1);
    }
    let rect = clamp_region(spec, card.width(), card.height());
    let crop = imageops::crop_imm(card, rect.x, rect.y, rect.width, rect.height).to_image();
    enhance_region(&crop, upscale)
}

/// Upscale, denoise and binarize a field crop.
///
/// The crops are small (tens of pixels tall), so they are first upscaled
/// with a smooth kernel to give the recognizer enough stroke detail, then
/// flattened to high-contrast black-on-white via Otsu thresholding. A
/// final close pass heals single-pixel breaks in strokes.
fn enhance_region(region: &RgbImage, upscale: u32) -> GrayImage {
    let factor = upscale.max(1);
    let scaled = imageops::resize(
        region,
        region.width() * factor,
        region.height() * factor,
        FilterType::CatmullRom,
    );
    let gray = imageops::grayscale(&scaled);
    let smoothed = median_filter(&gray, 1, 1);
    let equalized = equalize_histogram(&smoothed);
    let level = otsu_level(&equalized);
    let binary = GrayImage::from_fn(equalized.width(), equalized.height(), |x, y| {
        if equalized.get_pixel(x, y)[0] > level {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    close(&binary, Norm::L1, 1)
}
