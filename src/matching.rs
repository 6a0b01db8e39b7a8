use crate::error::{Error, Result};
use ndarray::{ArrayView1, ArrayView2};

/// A correspondence between a query and a train descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct DMatch {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f64,
}

impl DMatch {
    #[must_use]
    pub fn new(query_idx: usize, train_idx: usize, distance: f64) -> Self {
        Self {
            query_idx,
            train_idx,
            distance,
        }
    }
}

fn l2_distance(a: ArrayView1<'_, u8>, b: ArrayView1<'_, u8>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Brute-force nearest-neighbor matching of descriptor rows.
///
/// Every query descriptor is matched to its L2-nearest train descriptor.
/// A match is kept when the nearest distance is below `max_ratio` times the
/// second-nearest (Lowe's ratio test; pass 1.0 to disable) and, with
/// `cross_check`, when the train descriptor also elects the query as its
/// nearest neighbor.
pub fn match_descriptors(
    query: ArrayView2<'_, u8>,
    train: ArrayView2<'_, u8>,
    max_ratio: f64,
    cross_check: bool,
) -> Result<Vec<DMatch>> {
    if query.nrows() > 0 && train.nrows() > 0 && query.ncols() != train.ncols() {
        return Err(Error::InvalidDimensions(
            "descriptor sets must have the same width".to_string(),
        ));
    }

    let mut matches = Vec::new();
    for (query_idx, q) in query.outer_iter().enumerate() {
        let mut best_idx = usize::MAX;
        let mut best = f64::INFINITY;
        let mut second = f64::INFINITY;
        for (train_idx, t) in train.outer_iter().enumerate() {
            let distance = l2_distance(q, t);
            if distance < best {
                second = best;
                best = distance;
                best_idx = train_idx;
            } else if distance < second {
                second = distance;
            }
        }
        if best_idx == usize::MAX {
            continue;
        }
        if best >= max_ratio * second {
            continue;
        }
        matches.push(DMatch::new(query_idx, best_idx, best));
    }

    if cross_check {
        let mut best_for_train = vec![(usize::MAX, f64::INFINITY); train.nrows()];
        for (query_idx, q) in query.outer_iter().enumerate() {
            for (train_idx, t) in train.outer_iter().enumerate() {
                let distance = l2_distance(q, t);
                if distance < best_for_train[train_idx].1 {
                    best_for_train[train_idx] = (query_idx, distance);
                }
            }
        }
        matches.retain(|m| best_for_train[m.train_idx].0 == m.query_idx);
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn descriptor_set(rows: &[[u8; 4]]) -> Array2<u8> {
        let mut out = Array2::zeros((rows.len(), 4));
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                out[(i, j)] = v;
            }
        }
        out
    }

    #[test]
    fn test_identical_descriptor_matches_with_zero_distance() {
        let query = descriptor_set(&[[10, 20, 30, 40]]);
        let train = descriptor_set(&[[10, 20, 30, 40], [200, 0, 0, 0]]);
        let matches = match_descriptors(query.view(), train.view(), 0.8, false).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].train_idx, 0);
        assert_eq!(matches[0].distance, 0.0);
    }

    #[test]
    fn test_ratio_test_rejects_ambiguous_match() {
        // two train descriptors almost equally close to the query
        let query = descriptor_set(&[[100, 100, 100, 100]]);
        let train = descriptor_set(&[[101, 100, 100, 100], [99, 100, 100, 100]]);
        let matches = match_descriptors(query.view(), train.view(), 0.6, false).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_cross_check_keeps_mutual_best() {
        let query = descriptor_set(&[[0, 0, 0, 0], [50, 50, 50, 50]]);
        let train = descriptor_set(&[[1, 0, 0, 0], [50, 50, 50, 51]]);
        let matches = match_descriptors(query.view(), train.view(), 1.0, true).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].train_idx, 0);
        assert_eq!(matches[1].train_idx, 1);
    }

    #[test]
    fn test_empty_inputs() {
        let empty = Array2::<u8>::zeros((0, 4));
        let train = descriptor_set(&[[1, 2, 3, 4]]);
        assert!(match_descriptors(empty.view(), train.view(), 0.8, true)
            .unwrap()
            .is_empty());
        assert!(match_descriptors(train.view(), empty.view(), 0.8, true)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_mismatched_widths_are_rejected() {
        let query = Array2::<u8>::zeros((1, 4));
        let train = Array2::<u8>::zeros((1, 8));
        assert!(match_descriptors(query.view(), train.view(), 0.8, false).is_err());
    }
}
