use super::reflect;
use ndarray::{s, Array2, ArrayView2};

/// Cubic convolution kernel (Catmull-Rom variant, a = -0.5).
fn cubic(t: f64) -> f64 {
    const A: f64 = -0.5;
    let t = t.abs();
    if t <= 1.0 {
        ((A + 2.0) * t - (A + 3.0)) * t * t + 1.0
    } else if t < 2.0 {
        ((A * t - 5.0 * A) * t + 8.0 * A) * t - 4.0 * A
    } else {
        0.0
    }
}

/// Upscale an image by an integer factor with bicubic interpolation.
///
/// Output pixel centers are aligned with the input grid so the result covers
/// the same field of view; borders are reflected.
pub fn upscale_bicubic(src: ArrayView2<'_, f64>, factor: usize) -> Array2<f64> {
    let (rows, cols) = src.dim();
    let (out_rows, out_cols) = (rows * factor, cols * factor);
    let inv = 1.0 / factor as f64;

    let mut dst = Array2::zeros((out_rows, out_cols));
    for out_r in 0..out_rows {
        let sy = (out_r as f64 + 0.5) * inv - 0.5;
        let y0 = sy.floor() as isize;
        let fy = sy - y0 as f64;
        let wy = [cubic(1.0 + fy), cubic(fy), cubic(1.0 - fy), cubic(2.0 - fy)];

        for out_c in 0..out_cols {
            let sx = (out_c as f64 + 0.5) * inv - 0.5;
            let x0 = sx.floor() as isize;
            let fx = sx - x0 as f64;
            let wx = [cubic(1.0 + fx), cubic(fx), cubic(1.0 - fx), cubic(2.0 - fx)];

            let mut acc = 0.0;
            for (i, &weight_y) in wy.iter().enumerate() {
                let r = reflect(y0 - 1 + i as isize, rows);
                let mut row_acc = 0.0;
                for (j, &weight_x) in wx.iter().enumerate() {
                    let c = reflect(x0 - 1 + j as isize, cols);
                    row_acc += src[(r, c)] * weight_x;
                }
                acc += row_acc * weight_y;
            }
            dst[(out_r, out_c)] = acc;
        }
    }
    dst
}

/// Downscale by taking every second pixel in both axes.
pub fn subsample2(src: ArrayView2<'_, f64>) -> Array2<f64> {
    src.slice(s![..;2, ..;2]).to_owned()
}
