use crate::descriptor::compute_descriptors;
use crate::error::{Error, Result};
use crate::extrema::find_extrema;
use crate::orientation::{assign_orientations, GradientPyramid, OrientedKeypoint};
use crate::scalespace::{build_scalespace, difference_of_gaussians, ScaleSpace};
use ndarray::{Array1, Array2, ArrayBase, ArrayView2, Data, Dimension, Ix2};

/// minimum size of the last octave
const S_MIN: f64 = 12.0;

/// Tuning parameters for [`Sift`], immutable after construction.
#[derive(Debug, Clone)]
pub struct SiftParams {
    /// Pre-scale factor applied before detection; must be 1, 2 or 4.
    pub upsampling: usize,
    /// Maximum number of octaves; the actual count is bounded by image size.
    pub n_octaves: usize,
    /// Intra-octave scale steps.
    pub n_scales: usize,
    /// Seed blur at octave 0, scale 0 (in original-image pixels).
    pub sigma_min: f64,
    /// Assumed prior blur of the input image.
    pub sigma_in: f64,
    /// Base contrast threshold for DoG extrema.
    pub c_dog: f64,
    /// Edge-response threshold.
    pub c_edge: f64,
    /// Orientation histogram bins.
    pub n_bins: usize,
    /// Orientation patch scale factor.
    pub lambda_ori: f64,
    /// Secondary-peak acceptance ratio.
    pub c_max: f64,
    /// Descriptor patch scale factor.
    pub lambda_descr: f64,
    /// Descriptor spatial grid per side.
    pub n_hist: usize,
    /// Descriptor orientation bins.
    pub n_ori: usize,
}

impl Default for SiftParams {
    fn default() -> Self {
        Self {
            upsampling: 2,
            n_octaves: 8,
            n_scales: 3,
            sigma_min: 1.6,
            sigma_in: 0.5,
            c_dog: 0.04 / 3.0,
            c_edge: 10.0,
            n_bins: 36,
            lambda_ori: 1.5,
            c_max: 0.8,
            lambda_descr: 6.0,
            n_hist: 4,
            n_ori: 8,
        }
    }
}

/// SIFT keypoint detector and descriptor extractor.
///
/// One instance carries the configuration plus the output arrays of the most
/// recent call; all outputs share the same first dimension.
pub struct Sift {
    params: SiftParams,
    // derived once at construction
    sigma_seed: f64,
    c_dog_adjusted: f64,

    /// Keypoint coordinates as `(row, col)`, rounded to integers.
    pub keypoints: Array2<i64>,
    /// Sub-pixel keypoint coordinates as `(row, col)`.
    pub positions: Array2<f64>,
    /// Blur value of every keypoint.
    pub sigmas: Array1<f64>,
    /// Intra-octave scale index of every keypoint.
    pub scales: Array1<usize>,
    /// Octave index of every keypoint.
    pub octaves: Array1<usize>,
    /// Gradient orientation of every keypoint, in (−π, π].
    pub orientations: Array1<f64>,
    /// Descriptor bytes, one row per keypoint.
    pub descriptors: Array2<u8>,
    /// Blur table of the scale-space built by the last call.
    pub scalespace_sigmas: Array2<f64>,
    /// Sampling distance of every octave of the last call.
    pub deltas: Vec<f64>,
}

impl Sift {
    /// Create a detector/extractor with the default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::build(SiftParams::default())
    }

    /// Create a detector/extractor with explicit parameters.
    ///
    /// Fails when `upsampling` is not 1, 2 or 4 or a structural parameter is
    /// degenerate.
    pub fn with_params(params: SiftParams) -> Result<Self> {
        if !matches!(params.upsampling, 1 | 2 | 4) {
            return Err(Error::InvalidParameter(
                "upsampling must be 1, 2 or 4".to_string(),
            ));
        }
        if params.n_octaves == 0 || params.n_scales == 0 {
            return Err(Error::InvalidParameter(
                "n_octaves and n_scales must be positive".to_string(),
            ));
        }
        if params.n_bins == 0 || params.n_hist == 0 || params.n_ori == 0 {
            return Err(Error::InvalidParameter(
                "histogram bin counts must be positive".to_string(),
            ));
        }
        if params.sigma_min <= 0.0 || params.sigma_in < 0.0 {
            return Err(Error::InvalidParameter(
                "blur levels must be positive".to_string(),
            ));
        }
        if params.c_dog <= 0.0 || params.c_edge <= 0.0 {
            return Err(Error::InvalidParameter(
                "contrast and edge thresholds must be positive".to_string(),
            ));
        }
        Ok(Self::build(params))
    }

    fn build(params: SiftParams) -> Self {
        let sigma_seed = params.sigma_min / params.upsampling as f64;
        let c_dog_adjusted = (2f64.powf(1.0 / params.n_scales as f64) - 1.0)
            / (2f64.powf(1.0 / 3.0) - 1.0)
            * params.c_dog;
        let descriptor_len = params.n_hist * params.n_hist * params.n_ori;
        let sigma_columns = params.n_scales + 3;
        Sift {
            sigma_seed,
            c_dog_adjusted,
            keypoints: Array2::zeros((0, 2)),
            positions: Array2::zeros((0, 2)),
            sigmas: Array1::zeros(0),
            scales: Array1::zeros(0),
            octaves: Array1::zeros(0),
            orientations: Array1::zeros(0),
            descriptors: Array2::zeros((0, descriptor_len)),
            scalespace_sigmas: Array2::zeros((0, sigma_columns)),
            deltas: Vec::new(),
            params,
        }
    }

    /// The configured parameters.
    #[must_use]
    pub fn params(&self) -> &SiftParams {
        &self.params
    }

    /// Number of octaves that fit the given image under the configured cap.
    fn effective_octaves(&self, shape: (usize, usize)) -> usize {
        let smallest = shape.0.min(shape.1) as f64;
        let bound = (smallest / S_MIN).log2() + self.params.upsampling as f64;
        let n = (self.params.n_octaves as f64).min(bound) as usize;
        n.max(1)
    }

    fn build_pyramid(&mut self, image: ArrayView2<'_, f64>) -> ScaleSpace {
        let n_octaves = self.effective_octaves(image.dim());
        let scalespace = build_scalespace(
            image,
            n_octaves,
            self.params.n_scales,
            self.params.upsampling,
            self.sigma_seed,
            self.params.sigma_in,
        );
        self.scalespace_sigmas = scalespace.sigmas.clone();
        self.deltas = scalespace.deltas.clone();
        scalespace
    }

    fn detect_keypoints(
        &mut self,
        image: ArrayView2<'_, f64>,
    ) -> (Vec<OrientedKeypoint>, GradientPyramid) {
        let scalespace = self.build_pyramid(image);

        let dogspace: Vec<_> = scalespace
            .octaves
            .iter()
            .map(difference_of_gaussians)
            .collect();
        let extrema = find_extrema(
            &dogspace,
            &scalespace.deltas,
            &scalespace.sigmas,
            image.dim(),
            self.c_dog_adjusted,
            self.params.c_edge,
            self.params.n_scales,
        );
        drop(dogspace);

        let gradients = GradientPyramid::build(&scalespace.octaves);
        drop(scalespace);

        let oriented = assign_orientations(
            &extrema,
            &gradients,
            &self.deltas,
            self.params.n_bins,
            self.params.lambda_ori,
            self.params.c_max,
        );
        (oriented, gradients)
    }

    fn store_keypoints(&mut self, keys: &[OrientedKeypoint]) {
        let n = keys.len();
        let mut keypoints = Array2::zeros((n, 2));
        let mut positions = Array2::zeros((n, 2));
        let mut sigmas = Array1::zeros(n);
        let mut scales = Array1::zeros(n);
        let mut octaves = Array1::zeros(n);
        let mut orientations = Array1::zeros(n);

        for (i, key) in keys.iter().enumerate() {
            positions[(i, 0)] = key.row;
            positions[(i, 1)] = key.col;
            keypoints[(i, 0)] = key.row.round() as i64;
            keypoints[(i, 1)] = key.col.round() as i64;
            sigmas[i] = key.sigma;
            scales[i] = key.scale;
            octaves[i] = key.octave;
            orientations[i] = key.orientation;
        }

        self.keypoints = keypoints;
        self.positions = positions;
        self.sigmas = sigmas;
        self.scales = scales;
        self.octaves = octaves;
        self.orientations = orientations;
    }

    fn stored_keypoints(&self) -> Vec<OrientedKeypoint> {
        (0..self.positions.nrows())
            .map(|i| OrientedKeypoint {
                row: self.positions[(i, 0)],
                col: self.positions[(i, 1)],
                scale: self.scales[i],
                sigma: self.sigmas[i],
                octave: self.octaves[i],
                orientation: self.orientations[i],
            })
            .collect()
    }

    /// Detect the keypoints of `image`.
    ///
    /// Populates `keypoints`, `positions`, `sigmas`, `scales`, `octaves` and
    /// `orientations`.
    pub fn detect<S, D>(&mut self, image: &ArrayBase<S, D>) -> Result<()>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let image = as_image_view(image)?;
        let (oriented, _gradients) = self.detect_keypoints(image);
        self.store_keypoints(&oriented);
        Ok(())
    }

    /// Extract the descriptors for the keypoints currently on the instance.
    ///
    /// The keypoint fields must come from a prior [`Sift::detect`] on the
    /// same image, or be filled in by the caller.
    pub fn extract<S, D>(&mut self, image: &ArrayBase<S, D>) -> Result<()>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let image = as_image_view(image)?;
        let keys = self.stored_keypoints();
        let descriptor_len = self.params.n_hist * self.params.n_hist * self.params.n_ori;
        if keys.is_empty() {
            self.descriptors = Array2::zeros((0, descriptor_len));
            return Ok(());
        }

        let scalespace = self.build_pyramid(image);
        self.check_octave_bounds(&keys, scalespace.octaves.len())?;
        let gradients = GradientPyramid::build(&scalespace.octaves);
        drop(scalespace);

        self.descriptors = compute_descriptors(
            &keys,
            &gradients,
            &self.deltas,
            self.params.lambda_descr,
            self.params.n_hist,
            self.params.n_ori,
        );
        Ok(())
    }

    /// Detect the keypoints of `image` and extract their descriptors in one
    /// pass, reusing the Gaussian and gradient pyramids.
    pub fn detect_and_extract<S, D>(&mut self, image: &ArrayBase<S, D>) -> Result<()>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let image = as_image_view(image)?;
        let (oriented, gradients) = self.detect_keypoints(image);
        self.store_keypoints(&oriented);
        self.descriptors = compute_descriptors(
            &oriented,
            &gradients,
            &self.deltas,
            self.params.lambda_descr,
            self.params.n_hist,
            self.params.n_ori,
        );
        Ok(())
    }

    fn check_octave_bounds(&self, keys: &[OrientedKeypoint], n_octaves: usize) -> Result<()> {
        let n_layers = self.params.n_scales + 3;
        for key in keys {
            if key.octave >= n_octaves || key.scale >= n_layers {
                return Err(Error::OutOfRange(format!(
                    "keypoint at octave {} scale {} does not fit a pyramid of {} octaves",
                    key.octave, key.scale, n_octaves
                )));
            }
        }
        Ok(())
    }
}

impl Default for Sift {
    fn default() -> Self {
        Self::new()
    }
}

/// Check that the input is a non-empty 2-D intensity image.
fn as_image_view<S, D>(image: &ArrayBase<S, D>) -> Result<ArrayView2<'_, f64>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let view = image
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| {
            Error::InvalidDimensions(format!(
                "expected a 2-d image, got {} axes",
                image.ndim()
            ))
        })?;
    if view.nrows() == 0 || view.ncols() == 0 {
        return Err(Error::InvalidDimensions(
            "image must be non-empty".to_string(),
        ));
    }
    Ok(view)
}
