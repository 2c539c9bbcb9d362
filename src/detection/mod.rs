// src/detection/mod.rs
//
// Candidate region extraction.
//
// Signal flow:
//   RGB Frame → MOG2 background → open/close (5x5 rect)      → contours → motion regions
//   RGB Frame → YCrCb in_range  → open/close (11x11 ellipse) → contours → skin boxes
//
// The extraction itself runs on OpenCV (feature `video`); the region types
// and configuration are plain data shared with the classifier.

pub mod background;
pub mod contours;
pub mod region_detector;
pub mod skin;

pub use background::BackgroundConfig;
pub use contours::Region;
pub use region_detector::{DetectedRegions, DetectionConfig};
pub use skin::SkinRange;

#[cfg(feature = "video")]
pub use background::BackgroundModel;
#[cfg(feature = "video")]
pub use contours::find_regions;
#[cfg(feature = "video")]
pub use region_detector::RegionDetector;
#[cfg(feature = "video")]
pub use skin::skin_mask;
