//! # SIFT-Rust
//!
//! A pure Rust implementation of the SIFT (Scale-Invariant Feature
//! Transform) keypoint detector and descriptor extractor.
//!
//! Given a single-channel image of intensities in `[0, 1]`, the detector
//! produces keypoints with sub-pixel coordinates, a characteristic scale and
//! a dominant gradient orientation, together with a 128-byte descriptor per
//! keypoint that is robust to rotation, scaling and moderate illumination
//! change.
//!
//! ## Example
//!
//! ```rust
//! use ndarray::Array2;
//! use sift_rust::prelude::*;
//!
//! # fn main() -> sift_rust::error::Result<()> {
//! let image = Array2::<f64>::zeros((64, 64));
//!
//! let mut sift = Sift::new();
//! sift.detect_and_extract(&image)?;
//!
//! // A featureless image produces empty, shape-consistent outputs.
//! assert_eq!(sift.keypoints.nrows(), sift.descriptors.nrows());
//! # Ok(())
//! # }
//! ```

pub mod descriptor;
pub mod error;
pub mod extrema;
pub mod imgcodecs;
pub mod imgproc;
pub mod matching;
pub mod orientation;
pub mod scalespace;
pub mod sift;

pub use sift::{Sift, SiftParams};

pub mod prelude {
    //! Convenience module that re-exports commonly used items
    pub use crate::error::{Error, Result};
    pub use crate::matching::{match_descriptors, DMatch};
    pub use crate::sift::{Sift, SiftParams};
}
