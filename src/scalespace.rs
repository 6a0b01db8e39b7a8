use crate::imgproc::{gaussian_smooth, subsample2, upscale_bicubic};
use ndarray::{s, Array2, Array3, ArrayView2};

/// Gaussian scale-space pyramid together with its blur bookkeeping.
///
/// `octaves[o]` has shape `(H_o, W_o, n_scales + 3)`; `sigmas[(o, s)]` is the
/// absolute blur of layer `(o, s)` in original-image pixels and `deltas[o]`
/// the sampling distance of octave `o`.
pub struct ScaleSpace {
    pub octaves: Vec<Array3<f64>>,
    pub sigmas: Array2<f64>,
    pub deltas: Vec<f64>,
}

/// Build the Gaussian scale-space by gradually blurring (scales) and
/// subsampling (octaves) the image.
///
/// `sigma_min` is the seed blur already divided by the upsampling factor;
/// `sigma_in` is the blur the input image is assumed to carry.
pub fn build_scalespace(
    image: ArrayView2<'_, f64>,
    n_octaves: usize,
    n_scales: usize,
    upsampling: usize,
    sigma_min: f64,
    sigma_in: f64,
) -> ScaleSpace {
    let delta_min = 1.0 / upsampling as f64;
    let n_layers = n_scales + 3;

    let seed = if upsampling > 1 {
        upscale_bicubic(image, upsampling)
    } else {
        image.to_owned()
    };

    // smooth to sigma_min, assuming the input is already at sigma_in
    let seed_sigma = (sigma_min * sigma_min - sigma_in * sigma_in).max(0.0).sqrt() / delta_min;
    let mut current = gaussian_smooth(seed.view(), seed_sigma);

    // after n_scales steps the smoothing has doubled
    let k = 2f64.powf(1.0 / n_scales as f64);

    let mut octaves = Vec::with_capacity(n_octaves);
    let mut sigmas = Array2::zeros((n_octaves, n_layers));
    let mut deltas = Vec::with_capacity(n_octaves);
    let mut current_sigma = sigma_min;

    for o in 0..n_octaves {
        let delta = delta_min * 2f64.powi(o as i32);
        deltas.push(delta);

        let (rows, cols) = current.dim();
        let mut octave = Array3::zeros((rows, cols, n_layers));
        octave.slice_mut(s![.., .., 0]).assign(&current);
        sigmas[(o, 0)] = current_sigma;

        for layer in 1..n_layers {
            // blur the new scale assuming the sigma of the previous one
            let increment =
                ((current_sigma * k).powi(2) - current_sigma.powi(2)).sqrt() / delta;
            let previous = octave.slice(s![.., .., layer - 1]).to_owned();
            let blurred = gaussian_smooth(previous.view(), increment);
            octave.slice_mut(s![.., .., layer]).assign(&blurred);
            current_sigma *= k;
            sigmas[(o, layer)] = current_sigma;
        }

        current = subsample2(octave.slice(s![.., .., n_scales]));
        current_sigma = sigmas[(o, n_scales)];
        octaves.push(octave);
    }

    ScaleSpace {
        octaves,
        sigmas,
        deltas,
    }
}

/// Adjacent-layer differences along the scale axis.
pub fn difference_of_gaussians(octave: &Array3<f64>) -> Array3<f64> {
    let (rows, cols, layers) = octave.dim();
    let mut dog = Array3::zeros((rows, cols, layers - 1));
    for layer in 0..layers - 1 {
        let upper = octave.slice(s![.., .., layer + 1]);
        let lower = octave.slice(s![.., .., layer]);
        dog.slice_mut(s![.., .., layer]).assign(&(&upper - &lower));
    }
    dog
}
