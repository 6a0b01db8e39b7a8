use crate::orientation::{GradientPyramid, OrientedKeypoint};
use ndarray::Array2;
use std::f64::consts::{PI, SQRT_2};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Saturate the accumulated histogram at 0.2 of its norm, renormalize and
/// quantize to bytes.
fn quantize(hist: &[f64]) -> Vec<u8> {
    let norm = hist.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm == 0.0 {
        return vec![0; hist.len()];
    }
    let cap = 0.2 * norm;
    let clipped: Vec<f64> = hist.iter().map(|v| v.min(cap)).collect();
    let norm2 = clipped.iter().map(|v| v * v).sum::<f64>().sqrt();
    clipped
        .iter()
        .map(|v| (512.0 * v / norm2).floor().min(255.0) as u8)
        .collect()
}

/// Accumulate the rotated, Gaussian-weighted gradient patch of one keypoint
/// into an (n_hist, n_hist, n_ori) histogram and quantize it.
fn describe_keypoint(
    key: &OrientedKeypoint,
    gradients: &GradientPyramid,
    delta: f64,
    lambda_descr: f64,
    n_hist: usize,
    n_ori: usize,
) -> Vec<u8> {
    let dy = &gradients.dy[key.octave];
    let dx = &gradients.dx[key.octave];
    let (rows, cols, _) = dy.dim();

    let y = key.row / delta;
    let x = key.col / delta;
    let sigma = key.sigma / delta;
    let theta0 = key.orientation;

    // square patch of half-side `radius`; the bounding box is blown up by
    // sqrt(2) so the rotated square is fully covered
    let radius = lambda_descr * (1.0 + 1.0 / n_hist as f64) * sigma;
    let bound = SQRT_2 * radius;
    let min_r = (y - bound + 0.5).max(0.0) as usize;
    let min_c = (x - bound + 0.5).max(0.0) as usize;
    let max_r = (y + bound + 0.5).min((rows - 1) as f64) as usize;
    let max_c = (x + bound + 0.5).min((cols - 1) as f64) as usize;

    let cos_t = (-theta0).cos();
    let sin_t = (-theta0).sin();
    let step = 2.0 * lambda_descr * sigma / n_hist as f64;
    let weight_denom = 2.0 * (lambda_descr * sigma).powi(2);
    let bin_offset = (1.0 + n_hist as f64) / 2.0;

    let mut hist = vec![0.0f64; n_hist * n_hist * n_ori];
    for m in min_r..max_r {
        for n in min_c..max_c {
            // patch coordinates rotated into the keypoint frame
            let ry = m as f64 - y;
            let rx = n as f64 - x;
            let py = cos_t * ry - sin_t * rx;
            let px = sin_t * ry + cos_t * rx;
            if py.abs().max(px.abs()) >= radius {
                continue;
            }

            let gy = dy[(m, n, key.scale)];
            let gx = dx[(m, n, key.scale)];
            let theta = (gx.atan2(gy) - theta0).rem_euclid(2.0 * PI);
            let weight = (-(py * py + px * px) / weight_denom).exp();
            let contribution = weight * (gy * gy + gx * gx).sqrt();

            // the orientation weight is split linearly between the two
            // nearest circular bin centers
            let t = theta / (2.0 * PI) * n_ori as f64;
            let lower = t.floor();
            let frac = t - lower;
            let bin0 = lower as usize % n_ori;
            let bin1 = (bin0 + 1) % n_ori;

            for j in 0..n_hist {
                let center_y = (j as f64 + 1.0 - bin_offset) * step;
                let dist_y = (center_y - py).abs();
                if dist_y > step {
                    continue;
                }
                let weight_y = 1.0 - dist_y / step;

                for i in 0..n_hist {
                    let center_x = (i as f64 + 1.0 - bin_offset) * step;
                    let dist_x = (center_x - px).abs();
                    if dist_x > step {
                        continue;
                    }
                    let weight_x = 1.0 - dist_x / step;

                    let base = (j * n_hist + i) * n_ori;
                    let shared = weight_y * weight_x * contribution;
                    hist[base + bin0] += shared * (1.0 - frac);
                    hist[base + bin1] += shared * frac;
                }
            }
        }
    }

    quantize(&hist)
}

/// Compute the descriptor of every oriented keypoint.
///
/// Returns a `(N, n_hist * n_hist * n_ori)` array of bytes, rows aligned
/// with the keypoint order.
pub fn compute_descriptors(
    keypoints: &[OrientedKeypoint],
    gradients: &GradientPyramid,
    deltas: &[f64],
    lambda_descr: f64,
    n_hist: usize,
    n_ori: usize,
) -> Array2<u8> {
    let descriptor_len = n_hist * n_hist * n_ori;

    #[cfg(feature = "rayon")]
    let rows: Vec<Vec<u8>> = keypoints
        .par_iter()
        .map(|key| {
            describe_keypoint(key, gradients, deltas[key.octave], lambda_descr, n_hist, n_ori)
        })
        .collect();

    #[cfg(not(feature = "rayon"))]
    let rows: Vec<Vec<u8>> = keypoints
        .iter()
        .map(|key| {
            describe_keypoint(key, gradients, deltas[key.octave], lambda_descr, n_hist, n_ori)
        })
        .collect();

    let mut descriptors = Array2::zeros((keypoints.len(), descriptor_len));
    for (i, row) in rows.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            descriptors[(i, j)] = value;
        }
    }
    descriptors
}
