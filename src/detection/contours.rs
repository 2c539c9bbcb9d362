// src/detection/contours.rs
//
// Outer contours of a binary mask, reduced to the bounding box and enclosed
// area that the classifier and tracker consume.

use crate::types::BoundingBox;

#[cfg(feature = "video")]
use opencv::{
    core::{self, Mat, Vector},
    imgproc,
};

/// One connected foreground component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub bbox: BoundingBox,
    /// Area enclosed by the outer contour, in pixels
    pub area: u32,
}

/// External contours of `mask` (CV_8UC1), ordered by top-left corner.
#[cfg(feature = "video")]
pub fn find_regions(mask: &Mat) -> opencv::Result<Vec<Region>> {
    let mut contours: Vector<Vector<core::Point>> = Vector::new();
    imgproc::find_contours(
        mask,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_SIMPLE,
        core::Point::new(0, 0),
    )?;

    let mut regions = Vec::with_capacity(contours.len());
    for contour in contours.iter() {
        let area = imgproc::contour_area(&contour, false)?;
        let rect = imgproc::bounding_rect(&contour)?;
        regions.push(Region {
            bbox: BoundingBox::new(rect.x, rect.y, rect.width, rect.height),
            area: area.round() as u32,
        });
    }
    regions.sort_by_key(|r| (r.bbox.y, r.bbox.x));
    Ok(regions)
}
