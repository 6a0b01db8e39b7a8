use super::reflect;
use ndarray::{Array2, ArrayView2, ArrayViewMut1, Axis};

#[cfg(feature = "rayon")]
use ndarray::parallel::prelude::*;

/// Create a 1-D Gaussian kernel with truncation radius ⌈4σ⌉, normalized to
/// unit sum.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (4.0 * sigma).ceil() as isize;
    let denom = 2.0 * sigma * sigma;

    let mut kernel = Vec::with_capacity(2 * radius as usize + 1);
    let mut sum = 0.0;
    for i in -radius..=radius {
        let x = i as f64;
        let value = (-x * x / denom).exp();
        kernel.push(value);
        sum += value;
    }
    for value in &mut kernel {
        *value /= sum;
    }
    kernel
}

/// One pass of a separable convolution along `axis`, reflected borders.
fn smooth_pass(src: ArrayView2<'_, f64>, kernel: &[f64], axis: Axis) -> Array2<f64> {
    let (rows, cols) = src.dim();
    let half = (kernel.len() / 2) as isize;
    let vertical = axis == Axis(0);

    let mut dst = Array2::zeros((rows, cols));
    let fill = |r: usize, row: &mut ArrayViewMut1<'_, f64>| {
        for c in 0..cols {
            let mut acc = 0.0;
            for (k, &weight) in kernel.iter().enumerate() {
                let offset = k as isize - half;
                let value = if vertical {
                    src[(reflect(r as isize + offset, rows), c)]
                } else {
                    src[(r, reflect(c as isize + offset, cols))]
                };
                acc += value * weight;
            }
            row[c] = acc;
        }
    };

    #[cfg(feature = "rayon")]
    dst.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(r, mut row)| fill(r, &mut row));

    #[cfg(not(feature = "rayon"))]
    dst.axis_iter_mut(Axis(0))
        .enumerate()
        .for_each(|(r, mut row)| fill(r, &mut row));

    dst
}

/// Apply separable Gaussian smoothing with reflected borders.
///
/// A non-positive sigma is a no-op and returns a copy of the input.
pub fn gaussian_smooth(src: ArrayView2<'_, f64>, sigma: f64) -> Array2<f64> {
    if sigma <= 0.0 {
        return src.to_owned();
    }
    let kernel = gaussian_kernel(sigma);
    let horizontal = smooth_pass(src, &kernel, Axis(1));
    smooth_pass(horizontal.view(), &kernel, Axis(0))
}
