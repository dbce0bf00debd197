//! Numeric helpers shared across the pipeline stages.

use std::f32::consts::TAU;

/// Wraps an angle in radians to the range [0, 2π).
pub(crate) fn wrap_two_pi(angle: f32) -> f32 {
    let mut wrapped = angle % TAU;
    if wrapped < 0.0 {
        wrapped += TAU;
    }
    // `% TAU` can return TAU for inputs just below a multiple of 2π.
    if wrapped >= TAU {
        wrapped -= TAU;
    }
    wrapped
}

/// Logistic sigmoid.
pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Numerically stable in-place softmax. No-op on an empty slice.
pub(crate) fn softmax_in_place(logits: &mut [f32]) {
    let Some(&max) = logits
        .iter()
        .reduce(|a, b| if b > a { b } else { a })
    else {
        return;
    };
    let mut sum = 0.0f32;
    for logit in logits.iter_mut() {
        *logit = (*logit - max).exp();
        sum += *logit;
    }
    for logit in logits.iter_mut() {
        *logit /= sum;
    }
}

/// Index of the largest value, lowest index on ties. Empty slices yield 0.
pub(crate) fn argmax(values: &[f32]) -> usize {
    let mut best_idx = 0usize;
    let mut best = f32::NEG_INFINITY;
    for (idx, &value) in values.iter().enumerate() {
        if value > best {
            best = value;
            best_idx = idx;
        }
    }
    best_idx
}

/// Squared Euclidean distance between two 3D points.
pub(crate) fn dist_sq(a: &[f32], b: &[f32]) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

#[cfg(test)]
mod tests {
    use super::{argmax, dist_sq, sigmoid, softmax_in_place, wrap_two_pi};
    use std::f32::consts::{PI, TAU};

    #[test]
    fn wrap_two_pi_maps_to_expected_range() {
        assert!((wrap_two_pi(TAU + 0.5) - 0.5).abs() < 1e-6);
        assert!((wrap_two_pi(-PI) - PI).abs() < 1e-6);
        assert!((wrap_two_pi(0.0)).abs() < 1e-6);
        let wrapped = wrap_two_pi(-1e-8);
        assert!((0.0..TAU).contains(&wrapped));
    }

    #[test]
    fn sigmoid_matches_midpoint_and_saturation() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(20.0) > 0.999);
        assert!(sigmoid(-20.0) < 0.001);
    }

    #[test]
    fn softmax_normalizes_and_preserves_order() {
        let mut values = [1.0f32, 3.0, 2.0];
        softmax_in_place(&mut values);
        let sum: f32 = values.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(values[1] > values[2] && values[2] > values[0]);
    }

    #[test]
    fn argmax_breaks_ties_toward_lowest_index() {
        assert_eq!(argmax(&[0.5, 1.0, 1.0, 0.1]), 1);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn dist_sq_matches_hand_computation() {
        let a = [1.0f32, 2.0, 3.0];
        let b = [4.0f32, 6.0, 3.0];
        assert!((dist_sq(&a, &b) - 25.0).abs() < 1e-6);
    }
}
