use crate::extrema::Extremum;
use crate::imgproc::gradient_stacks;
use ndarray::Array3;
use std::f64::consts::PI;

/// A keypoint with an assigned reference orientation, θ ∈ (−π, π].
#[derive(Debug, Clone)]
pub struct OrientedKeypoint {
    pub row: f64,
    pub col: f64,
    pub scale: usize,
    pub sigma: f64,
    pub octave: usize,
    pub orientation: f64,
}

/// Per-octave gradient stacks, shared by orientation assignment and
/// descriptor extraction.
pub struct GradientPyramid {
    pub dy: Vec<Array3<f64>>,
    pub dx: Vec<Array3<f64>>,
}

impl GradientPyramid {
    pub fn build(octaves: &[Array3<f64>]) -> Self {
        let mut dy = Vec::with_capacity(octaves.len());
        let mut dx = Vec::with_capacity(octaves.len());
        for octave in octaves {
            let (grad_y, grad_x) = gradient_stacks(octave.view());
            dy.push(grad_y);
            dx.push(grad_x);
        }
        GradientPyramid { dy, dx }
    }
}

/// Six passes of a circular box filter [1, 1, 1] / 3.
fn smooth_histogram(hist: &mut [f64]) {
    let n = hist.len();
    let mut buffer = vec![0.0; n];
    for _ in 0..6 {
        for i in 0..n {
            buffer[i] = (hist[(i + n - 1) % n] + hist[i] + hist[(i + 1) % n]) / 3.0;
        }
        hist.copy_from_slice(&buffer);
    }
}

/// Refine the position of a histogram peak by fitting a parabola through it
/// and its two neighbors.
fn fit_peak(previous: f64, center: f64, next: f64) -> f64 {
    let denom = 2.0 * (previous + next - 2.0 * center);
    if denom == 0.0 {
        0.0
    } else {
        (previous - next) / denom
    }
}

/// Assign a reference orientation to every localized extremum.
///
/// Keypoints whose patch degenerates after clipping are dropped. A keypoint
/// whose smoothed histogram carries several qualifying peaks is cloned once
/// per extra peak; clones are appended after all primary keypoints.
pub fn assign_orientations(
    extrema: &[Extremum],
    gradients: &GradientPyramid,
    deltas: &[f64],
    n_bins: usize,
    lambda_ori: f64,
    c_max: f64,
) -> Vec<OrientedKeypoint> {
    let mut primaries = Vec::with_capacity(extrema.len());
    let mut clones = Vec::new();

    for key in extrema {
        let delta = deltas[key.octave];
        let dy = &gradients.dy[key.octave];
        let dx = &gradients.dx[key.octave];
        let (rows, cols, _) = dy.dim();

        // octave coordinates
        let y = key.row / delta;
        let x = key.col / delta;
        let sigma = key.sigma / delta;

        let radius = 3.0 * lambda_ori * sigma;
        let min_r = (y - radius + 0.5).max(0.0) as usize;
        let min_c = (x - radius + 0.5).max(0.0) as usize;
        let max_r = (y + radius + 0.5).min((rows - 1) as f64) as usize;
        let max_c = (x + radius + 0.5).min((cols - 1) as f64) as usize;
        if min_r == 0 || min_c == 0 || max_r <= min_r || max_c <= min_c {
            continue;
        }

        let mut hist = vec![0.0f64; n_bins];
        let weight_denom = 2.0 * (lambda_ori * sigma).powi(2);
        for n in min_r..=max_r {
            for m in min_c..=max_c {
                let gy = dy[(n, m, key.scale)];
                let gx = dx[(n, m, key.scale)];
                let magnitude = (gy * gy + gx * gx).sqrt();
                // angle measured from the +y axis
                let theta = gx.atan2(gy).rem_euclid(2.0 * PI);

                let dn = n as f64 - y;
                let dm = m as f64 - x;
                let weight = (-(dn * dn + dm * dm) / weight_denom).exp();

                let bin = (theta / (2.0 * PI) * n_bins as f64 + 0.5).floor() as usize % n_bins;
                hist[bin] += weight * magnitude;
            }
        }

        smooth_histogram(&mut hist);
        let hist_max = hist.iter().cloned().fold(0.0f64, f64::max);
        if hist_max <= 0.0 {
            continue;
        }

        let mut first = true;
        for b in 0..n_bins {
            let previous = hist[(b + n_bins - 1) % n_bins];
            let next = hist[(b + 1) % n_bins];
            if hist[b] < previous || hist[b] < next || hist[b] < c_max * hist_max {
                continue;
            }

            let offset = fit_peak(previous, hist[b], next);
            let mut angle = (b as f64 + offset + 0.5) * 2.0 * PI / n_bins as f64;
            if angle > PI {
                angle -= 2.0 * PI;
            }

            let oriented = OrientedKeypoint {
                row: key.row,
                col: key.col,
                scale: key.scale,
                sigma: key.sigma,
                octave: key.octave,
                orientation: angle,
            };
            if first {
                primaries.push(oriented);
                first = false;
            } else {
                clones.push(oriented);
            }
        }
    }

    primaries.extend(clones);
    primaries
}
