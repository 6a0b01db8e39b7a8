use crate::error::{Error, Result};
use image::DynamicImage;
use ndarray::Array2;
use num_traits::ToPrimitive;
use std::path::Path;

/// Load an image from disk as a grayscale intensity array in [0, 1].
pub fn imread_gray<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    let img = image::open(path)?;
    Ok(to_gray_f64(&img))
}

/// Convert a decoded image to a grayscale intensity array in [0, 1].
pub fn to_gray_f64(img: &DynamicImage) -> Array2<f64> {
    let gray = img.to_luma8();
    let (width, height) = gray.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(r, c)| {
        f64::from(gray.get_pixel(c as u32, r as u32).0[0]) / 255.0
    })
}

/// Build an intensity image from a row-major buffer of any primitive type.
///
/// Values are converted to `f64` as-is; rescaling to [0, 1] is up to the
/// caller.
pub fn from_gray_buffer<T>(data: &[T], rows: usize, cols: usize) -> Result<Array2<f64>>
where
    T: ToPrimitive + Copy,
{
    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions(format!(
            "buffer of {} values cannot fill a {}x{} image",
            data.len(),
            rows,
            cols
        )));
    }
    let values: Vec<f64> = data
        .iter()
        .map(|v| v.to_f64().unwrap_or(0.0))
        .collect();
    Array2::from_shape_vec((rows, cols), values)
        .map_err(|e| Error::InvalidDimensions(e.to_string()))
}
