// End-to-end tests for the SIFT pipeline on synthetic images.

use ndarray::{s, Array2, ArrayD, IxDyn};
use sift_rust::imgproc::gaussian_smooth;
use sift_rust::prelude::*;

/// Deterministic pseudo-random noise in [0, 1).
fn lcg_noise(size: usize, seed: u64) -> Array2<f64> {
    let mut state = seed;
    Array2::from_shape_fn((size, size), |_| {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (state >> 11) as f64 / (1u64 << 53) as f64
    })
}

/// Smooth random texture with structure at two scales; values stay in [0, 1].
fn textured_image(size: usize) -> Array2<f64> {
    let fine = gaussian_smooth(lcg_noise(size, 42).view(), 1.5);
    let coarse = gaussian_smooth(lcg_noise(size, 1234).view(), 5.0);
    let mut image = Array2::zeros((size, size));
    for ((r, c), v) in image.indexed_iter_mut() {
        *v = 0.65 * fine[(r, c)] + 0.35 * coarse[(r, c)];
    }
    image
}

fn rot180(image: &Array2<f64>) -> Array2<f64> {
    image.slice(s![..;-1, ..;-1]).to_owned()
}

/// Rotate a square image a quarter turn: (r, c) -> (c, size - 1 - r).
fn rot90(image: &Array2<f64>) -> Array2<f64> {
    let size = image.nrows();
    let mut out = Array2::zeros((size, size));
    for ((r, c), &v) in image.indexed_iter() {
        out[(c, size - 1 - r)] = v;
    }
    out
}

/// Inverse-mapped similarity warp (scale then rotate about the center) with
/// bilinear sampling; samples outside the source are zero.
fn warp_similarity(image: &Array2<f64>, scale: f64, angle: f64, out_size: usize) -> Array2<f64> {
    let (rows, cols) = image.dim();
    let c_in = ((rows as f64 - 1.0) / 2.0, (cols as f64 - 1.0) / 2.0);
    let c_out = ((out_size as f64 - 1.0) / 2.0, (out_size as f64 - 1.0) / 2.0);
    let (sin, cos) = (-angle).sin_cos();

    Array2::from_shape_fn((out_size, out_size), |(r, c)| {
        let dy = (r as f64 - c_out.0) / scale;
        let dx = (c as f64 - c_out.1) / scale;
        let sy = cos * dy - sin * dx + c_in.0;
        let sx = sin * dy + cos * dx + c_in.1;
        let (y0, x0) = (sy.floor(), sx.floor());
        let (fy, fx) = (sy - y0, sx - x0);
        let mut acc = 0.0;
        for (iy, wy) in [(y0 as isize, 1.0 - fy), (y0 as isize + 1, fy)] {
            for (ix, wx) in [(x0 as isize, 1.0 - fx), (x0 as isize + 1, fx)] {
                if iy >= 0 && ix >= 0 && (iy as usize) < rows && (ix as usize) < cols {
                    acc += wy * wx * image[(iy as usize, ix as usize)];
                }
            }
        }
        acc
    })
}

fn assert_output_invariants(sift: &Sift, shape: (usize, usize)) {
    let n = sift.keypoints.nrows();
    assert_eq!(sift.positions.nrows(), n);
    assert_eq!(sift.sigmas.len(), n);
    assert_eq!(sift.scales.len(), n);
    assert_eq!(sift.octaves.len(), n);
    assert_eq!(sift.orientations.len(), n);

    let n_scales = sift.params().n_scales;
    for i in 0..n {
        let y = sift.positions[(i, 0)];
        let x = sift.positions[(i, 1)];
        let sigma = sift.sigmas[i];
        assert!(sigma > 0.0);
        assert!(y - sigma >= 0.0 && x - sigma >= 0.0, "border invariant");
        assert!(
            y + sigma <= shape.0 as f64 && x + sigma <= shape.1 as f64,
            "border invariant"
        );
        assert!(sift.scales[i] >= 1 && sift.scales[i] <= n_scales);
        let theta = sift.orientations[i];
        assert!(theta > -std::f64::consts::PI && theta <= std::f64::consts::PI);
    }
}

#[test]
fn test_constant_image_has_no_keypoints() {
    let image = Array2::<f64>::zeros((128, 128));
    let mut sift = Sift::new();
    sift.detect_and_extract(&image).unwrap();

    assert_eq!(sift.keypoints.dim(), (0, 2));
    assert_eq!(sift.positions.dim(), (0, 2));
    assert_eq!(sift.descriptors.dim(), (0, 128));
    assert_eq!(sift.sigmas.len(), 0);
}

#[test]
fn test_single_blob_is_detected_at_center() {
    let mut image = Array2::<f64>::zeros((64, 64));
    for r in 31..=33 {
        for c in 31..=33 {
            image[(r, c)] = 1.0;
        }
    }

    let mut sift = Sift::new();
    sift.detect(&image).unwrap();
    assert!(sift.keypoints.nrows() >= 1);
    assert_output_invariants(&sift, (64, 64));

    let mut best = f64::INFINITY;
    let mut best_sigma = 0.0;
    for i in 0..sift.positions.nrows() {
        let dy = (sift.positions[(i, 0)] - 32.0).abs();
        let dx = (sift.positions[(i, 1)] - 32.0).abs();
        if dy.max(dx) < best {
            best = dy.max(dx);
            best_sigma = sift.sigmas[i];
        }
    }
    assert!(best <= 1.0, "closest keypoint is {best} pixels from the blob");
    assert!(best_sigma > 0.5 && best_sigma < 8.0);
}

#[test]
fn test_rejects_3d_input() {
    let mut sift = Sift::new();
    let volume = ArrayD::<f64>::zeros(IxDyn(&[16, 16, 3]));
    assert!(matches!(
        sift.detect(&volume),
        Err(Error::InvalidDimensions(_))
    ));
}

#[test]
fn test_detect_and_extract_aligns_all_outputs() {
    let image = textured_image(96);
    let mut sift = Sift::new();
    sift.detect_and_extract(&image).unwrap();

    let n = sift.keypoints.nrows();
    assert!(n > 10, "expected a textured image to yield keypoints, got {n}");
    assert_eq!(sift.descriptors.dim(), (n, 128));
    assert_output_invariants(&sift, (96, 96));

    // every descriptor carries signal
    for i in 0..n {
        let sum: u64 = sift.descriptors.row(i).iter().map(|&v| u64::from(v)).sum();
        assert!(sum > 0, "descriptor {i} is empty");
    }
}

#[test]
fn test_extract_matches_fused_pipeline() {
    let image = textured_image(64);

    let mut fused = Sift::new();
    fused.detect_and_extract(&image).unwrap();

    let mut staged = Sift::new();
    staged.detect(&image).unwrap();
    staged.extract(&image).unwrap();

    assert_eq!(staged.keypoints, fused.keypoints);
    assert_eq!(staged.descriptors, fused.descriptors);
}

#[test]
fn test_more_upsampling_finds_more_keypoints() {
    let image = textured_image(96);

    let mut coarse = Sift::with_params(SiftParams {
        upsampling: 1,
        ..SiftParams::default()
    })
    .unwrap();
    coarse.detect_and_extract(&image).unwrap();

    let mut fine = Sift::with_params(SiftParams {
        upsampling: 2,
        ..SiftParams::default()
    })
    .unwrap();
    fine.detect_and_extract(&image).unwrap();

    assert_output_invariants(&coarse, (96, 96));
    assert_output_invariants(&fine, (96, 96));
    assert!(fine.keypoints.nrows() >= coarse.keypoints.nrows());
}

#[test]
fn test_180_degree_rotation_matches() {
    let size = 80;
    let image = textured_image(size);
    let rotated = rot180(&image);

    let mut sift1 = Sift::new();
    sift1.detect_and_extract(&image).unwrap();
    let mut sift2 = Sift::new();
    sift2.detect_and_extract(&rotated).unwrap();

    let matches = match_descriptors(
        sift1.descriptors.view(),
        sift2.descriptors.view(),
        0.6,
        true,
    )
    .unwrap();
    assert!(
        matches.len() >= 20,
        "expected the rotated texture to match, got {} matches",
        matches.len()
    );

    // matched keypoints map under the same rotation
    let mapped = matches
        .iter()
        .filter(|m| {
            let y1 = sift1.positions[(m.query_idx, 0)];
            let x1 = sift1.positions[(m.query_idx, 1)];
            let y2 = sift2.positions[(m.train_idx, 0)];
            let x2 = sift2.positions[(m.train_idx, 1)];
            let expected = (size as f64 - 1.0 - y1, size as f64 - 1.0 - x1);
            (y2 - expected.0).abs() <= 2.0 && (x2 - expected.1).abs() <= 2.0
        })
        .count();
    assert!(
        2 * mapped >= matches.len(),
        "only {mapped} of {} matches map under the rotation",
        matches.len()
    );
}

#[test]
fn test_quarter_turn_keypoints_are_covariant() {
    let size = 80;
    let image = textured_image(size);
    let rotated = rot90(&image);

    let mut sift1 = Sift::new();
    sift1.detect(&image).unwrap();
    let mut sift2 = Sift::new();
    sift2.detect(&rotated).unwrap();

    assert!(sift1.keypoints.nrows() > 10);
    assert!(sift2.keypoints.nrows() > 10);

    // (r, c) -> (c, size - 1 - r), compare against the detected set
    let mut recovered = 0;
    let total = sift1.positions.nrows();
    for i in 0..total {
        let expected = (
            sift1.positions[(i, 1)],
            size as f64 - 1.0 - sift1.positions[(i, 0)],
        );
        let found = (0..sift2.positions.nrows()).any(|j| {
            (sift2.positions[(j, 0)] - expected.0).abs() <= 1.5
                && (sift2.positions[(j, 1)] - expected.1).abs() <= 1.5
        });
        if found {
            recovered += 1;
        }
    }
    assert!(
        2 * recovered >= total,
        "only {recovered} of {total} keypoints survive a quarter turn"
    );
}

#[test]
fn test_scaled_and_rotated_copy_still_matches() {
    let image = textured_image(80);
    let warped = warp_similarity(&image, 1.3, 0.5, 120);

    let mut sift1 = Sift::new();
    sift1.detect_and_extract(&image).unwrap();
    let mut sift2 = Sift::new();
    sift2.detect_and_extract(&warped).unwrap();

    let matches = match_descriptors(
        sift1.descriptors.view(),
        sift2.descriptors.view(),
        0.6,
        true,
    )
    .unwrap();
    assert!(
        matches.len() >= 5,
        "expected matches across a similarity warp, got {}",
        matches.len()
    );
}
