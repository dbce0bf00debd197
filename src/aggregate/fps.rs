//! Deterministic farthest-point sampling over packed 3D positions.

use crate::util::math::dist_sq;

/// Selects `count` indices from `n` points (`positions` packed as `[x, y, z]`
/// triples) by greedy farthest-point sampling.
///
/// Selection starts at index 0 and repeatedly takes the point whose minimum
/// distance to the already selected set is largest; equal distances keep the
/// lowest index. When `count > n` the selection wraps around by index modulo
/// `n`, so callers always receive exactly `count` indices (duplicated in a
/// deterministic order). An empty point set yields an empty selection.
pub(crate) fn farthest_point_sample(positions: &[f32], n: usize, count: usize) -> Vec<usize> {
    if n == 0 || count == 0 {
        return Vec::new();
    }

    let unique = count.min(n);
    let mut selected = Vec::with_capacity(count);
    // min squared distance from each point to the selected set
    let mut min_dist = vec![f32::INFINITY; n];

    let mut current = 0usize;
    selected.push(current);
    for _ in 1..unique {
        let picked = &positions[3 * current..3 * current + 3];
        let mut best_idx = 0usize;
        let mut best_dist = f32::NEG_INFINITY;
        for i in 0..n {
            let d = dist_sq(&positions[3 * i..3 * i + 3], picked);
            if d < min_dist[i] {
                min_dist[i] = d;
            }
            if min_dist[i] > best_dist {
                best_dist = min_dist[i];
                best_idx = i;
            }
        }
        current = best_idx;
        selected.push(current);
    }

    // Fewer distinct points than requested: wrap deterministically.
    for i in unique..count {
        selected.push(selected[i % unique]);
    }

    selected
}
