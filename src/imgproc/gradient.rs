use ndarray::{Array3, ArrayView3};

/// Per-layer (∂y, ∂x) stacks for a Gaussian octave.
///
/// Central differences with unit spacing in the interior; one-sided
/// differences on the first and last row/column.
pub fn gradient_stacks(octave: ArrayView3<'_, f64>) -> (Array3<f64>, Array3<f64>) {
    let (rows, cols, layers) = octave.dim();
    let mut grad_y = Array3::zeros((rows, cols, layers));
    let mut grad_x = Array3::zeros((rows, cols, layers));

    for layer in 0..layers {
        for r in 0..rows {
            for c in 0..cols {
                grad_y[(r, c, layer)] = if rows < 2 {
                    0.0
                } else if r == 0 {
                    octave[(1, c, layer)] - octave[(0, c, layer)]
                } else if r == rows - 1 {
                    octave[(r, c, layer)] - octave[(r - 1, c, layer)]
                } else {
                    0.5 * (octave[(r + 1, c, layer)] - octave[(r - 1, c, layer)])
                };

                grad_x[(r, c, layer)] = if cols < 2 {
                    0.0
                } else if c == 0 {
                    octave[(r, 1, layer)] - octave[(r, 0, layer)]
                } else if c == cols - 1 {
                    octave[(r, c, layer)] - octave[(r, c - 1, layer)]
                } else {
                    0.5 * (octave[(r, c + 1, layer)] - octave[(r, c - 1, layer)])
                };
            }
        }
    }
    (grad_y, grad_x)
}
