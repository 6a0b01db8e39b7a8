use ndarray::{Array2, Array3};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// A refined scale-space extremum in original-image coordinates.
#[derive(Debug, Clone)]
pub struct Extremum {
    /// Sub-pixel row position.
    pub row: f64,
    /// Sub-pixel column position.
    pub col: f64,
    /// Scale index within the octave, `1 ..= n_scales` after localization.
    pub scale: usize,
    /// Absolute blur at the interpolated scale.
    pub sigma: f64,
    /// Octave index.
    pub octave: usize,
}

/// First derivative of the DoG stack at an interior position.
fn jacobian(dog: &Array3<f64>, p: [usize; 3]) -> [f64; 3] {
    let [r, c, s] = p;
    [
        0.5 * (dog[(r + 1, c, s)] - dog[(r - 1, c, s)]),
        0.5 * (dog[(r, c + 1, s)] - dog[(r, c - 1, s)]),
        0.5 * (dog[(r, c, s + 1)] - dog[(r, c, s - 1)]),
    ]
}

/// Second-order central-difference Hessian at an interior position.
fn hessian(dog: &Array3<f64>, p: [usize; 3]) -> [[f64; 3]; 3] {
    let [r, c, s] = p;
    let center = dog[(r, c, s)];

    let h00 = dog[(r - 1, c, s)] + dog[(r + 1, c, s)] - 2.0 * center;
    let h11 = dog[(r, c - 1, s)] + dog[(r, c + 1, s)] - 2.0 * center;
    let h22 = dog[(r, c, s - 1)] + dog[(r, c, s + 1)] - 2.0 * center;

    let h01 = 0.25
        * (dog[(r + 1, c + 1, s)] - dog[(r - 1, c + 1, s)] - dog[(r + 1, c - 1, s)]
            + dog[(r - 1, c - 1, s)]);
    let h02 = 0.25
        * (dog[(r + 1, c, s + 1)] - dog[(r + 1, c, s - 1)] + dog[(r - 1, c, s - 1)]
            - dog[(r - 1, c, s + 1)]);
    let h12 = 0.25
        * (dog[(r, c + 1, s + 1)] - dog[(r, c + 1, s - 1)] + dog[(r, c - 1, s - 1)]
            - dog[(r, c - 1, s + 1)]);

    [[h00, h01, h02], [h01, h11, h12], [h02, h12, h22]]
}

/// Solve a 3x3 linear system with partial pivoting; `None` when singular.
fn solve3(a: [[f64; 3]; 3], b: [f64; 3]) -> Option<[f64; 3]> {
    let mut m = [[0.0; 4]; 3];
    for i in 0..3 {
        m[i][..3].copy_from_slice(&a[i]);
        m[i][3] = b[i];
    }

    for col in 0..3 {
        let mut pivot = col;
        for row in col + 1..3 {
            if m[row][col].abs() > m[pivot][col].abs() {
                pivot = row;
            }
        }
        if m[pivot][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot);
        for row in col + 1..3 {
            let factor = m[row][col] / m[col][col];
            for k in col..4 {
                m[row][k] -= factor * m[col][k];
            }
        }
    }

    let mut x = [0.0; 3];
    for i in (0..3).rev() {
        let mut acc = m[i][3];
        for j in i + 1..3 {
            acc -= m[i][j] * x[j];
        }
        x[i] = acc / m[i][i];
    }
    Some(x)
}

/// Scan one DoG octave for strict 3x3x3 extrema above `threshold`.
fn scan_octave(dog: &Array3<f64>, threshold: f64) -> Vec<[usize; 3]> {
    let (rows, cols, layers) = dog.dim();
    if rows < 3 || cols < 3 || layers < 3 {
        return Vec::new();
    }

    let scan_row = |r: usize| {
        let mut found = Vec::new();
        for c in 1..cols - 1 {
            for s in 1..layers - 1 {
                let value = dog[(r, c, s)];
                if value.abs() <= threshold {
                    continue;
                }
                let mut is_max = value > 0.0;
                let mut is_min = value < 0.0;
                'neighbors: for dr in -1isize..=1 {
                    for dc in -1isize..=1 {
                        for ds in -1isize..=1 {
                            if dr == 0 && dc == 0 && ds == 0 {
                                continue;
                            }
                            let neighbor = dog[(
                                (r as isize + dr) as usize,
                                (c as isize + dc) as usize,
                                (s as isize + ds) as usize,
                            )];
                            if neighbor >= value {
                                is_max = false;
                            }
                            if neighbor <= value {
                                is_min = false;
                            }
                            if !is_max && !is_min {
                                break 'neighbors;
                            }
                        }
                    }
                }
                if is_max || is_min {
                    found.push([r, c, s]);
                }
            }
        }
        found
    };

    #[cfg(feature = "rayon")]
    return (1..rows - 1).into_par_iter().flat_map(scan_row).collect();

    #[cfg(not(feature = "rayon"))]
    (1..rows - 1).flat_map(scan_row).collect()
}

/// Iteratively refine a candidate with the quadratic Taylor step.
///
/// Returns the final integer position, the offset vector and the gradient at
/// that position when the candidate stays localizable, `None` otherwise.
fn localize(dog: &Array3<f64>, start: [usize; 3]) -> Option<([usize; 3], [f64; 3], [f64; 3])> {
    let (rows, cols, layers) = dog.dim();
    let dims = [rows, cols, layers];

    let mut p = start;
    let mut offset = [0.0; 3];
    let mut grad = [0.0; 3];

    for iteration in 0..5 {
        grad = jacobian(dog, p);
        let h = hessian(dog, p);
        offset = solve3(h, [-grad[0], -grad[1], -grad[2]])?;

        if iteration == 4 {
            break;
        }

        // move only along axes where the offset overshoots and the shifted
        // index stays in the interior
        let mut moved = false;
        let mut next = p;
        for axis in 0..3 {
            if offset[axis] > 0.5 && p[axis] + 1 < dims[axis] - 1 {
                next[axis] += 1;
                moved = true;
            } else if offset[axis] < -0.5 && p[axis] > 1 {
                next[axis] -= 1;
                moved = true;
            }
        }
        if !moved {
            break;
        }
        p = next;
    }

    if offset.iter().all(|v| v.abs() < 0.5) {
        Some((p, offset, grad))
    } else {
        None
    }
}

/// Localize one candidate and run the contrast, edge and border filters.
#[allow(clippy::too_many_arguments)]
fn refine(
    dog: &Array3<f64>,
    candidate: [usize; 3],
    octave: usize,
    delta: f64,
    sigmas: &Array2<f64>,
    sigma_ratio: f64,
    img_shape: (usize, usize),
    contrast_threshold: f64,
    edge_threshold: f64,
) -> Option<Extremum> {
    let (p, offset, grad) = localize(dog, candidate)?;

    // value at the interpolated point
    let value = dog[(p[0], p[1], p[2])];
    let response =
        value + 0.5 * (grad[0] * offset[0] + grad[1] * offset[1] + grad[2] * offset[2]);
    if response.abs() <= contrast_threshold {
        return None;
    }

    // edgeness of the 2x2 spatial sub-Hessian
    let h = hessian(dog, p);
    let trace = h[0][0] + h[1][1];
    let det = h[0][0] * h[1][1] - h[0][1] * h[1][0];
    if det <= 0.0 || trace * trace / det > edge_threshold {
        return None;
    }

    let row = (p[0] as f64 + offset[0]) * delta;
    let col = (p[1] as f64 + offset[1]) * delta;
    let sigma = sigmas[(octave, p[2])] * sigma_ratio.powf(offset[2]);

    let (height, width) = img_shape;
    if row - sigma <= 0.0
        || col - sigma <= 0.0
        || row + sigma >= height as f64
        || col + sigma >= width as f64
    {
        return None;
    }

    Some(Extremum {
        row,
        col,
        scale: p[2],
        sigma,
        octave,
    })
}

/// Scan every DoG octave for extrema, refine them to sub-pixel precision and
/// filter by contrast, edge response and distance to the image border.
pub fn find_extrema(
    dogspace: &[Array3<f64>],
    deltas: &[f64],
    sigmas: &Array2<f64>,
    img_shape: (usize, usize),
    c_dog: f64,
    c_edge: f64,
    n_scales: usize,
) -> Vec<Extremum> {
    let peak_threshold = 0.8 * c_dog;
    let contrast_threshold = c_dog / n_scales as f64;
    let edge_threshold = (c_edge + 1.0).powi(2) / c_edge;
    let sigma_ratio = sigmas[(0, 1)] / sigmas[(0, 0)];

    let mut extrema = Vec::new();
    for (octave, dog) in dogspace.iter().enumerate() {
        let delta = deltas[octave];
        let candidates = scan_octave(dog, peak_threshold);

        #[cfg(feature = "rayon")]
        let refined: Vec<Extremum> = candidates
            .par_iter()
            .filter_map(|&candidate| {
                refine(
                    dog,
                    candidate,
                    octave,
                    delta,
                    sigmas,
                    sigma_ratio,
                    img_shape,
                    contrast_threshold,
                    edge_threshold,
                )
            })
            .collect();

        #[cfg(not(feature = "rayon"))]
        let refined: Vec<Extremum> = candidates
            .iter()
            .filter_map(|&candidate| {
                refine(
                    dog,
                    candidate,
                    octave,
                    delta,
                    sigmas,
                    sigma_ratio,
                    img_shape,
                    contrast_threshold,
                    edge_threshold,
                )
            })
            .collect();

        extrema.extend(refined);
    }
    extrema
}
