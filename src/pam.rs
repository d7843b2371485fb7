//! Partitioning around medoids (BUILD + SWAP) with Euclidean dissimilarity.
//!
//! Distances are recomputed on demand instead of being stored in an n×n
//! matrix, so memory stays linear in the sample count while time is
//! O(k·n²) per SWAP pass. The whole procedure is deterministic: ties go to
//! the lowest sample index.

use crate::cluster::ClusterResult;
use crate::color::{Perceptual, distance_squared};

/// Minimum improvement for a swap to be accepted.
const SWAP_EPSILON: f64 = 1e-9;

#[inline]
fn dist(a: &Perceptual, b: &Perceptual) -> f64 {
    distance_squared(a, b).sqrt()
}

/// Per-sample distance to the nearest and second-nearest medoid.
struct Assignment {
    nearest: Vec<usize>,
    first: Vec<f64>,
    second: Vec<f64>,
}

impl Assignment {
    fn compute(samples: &[Perceptual], medoids: &[usize]) -> Self {
        let n = samples.len();
        let mut nearest = vec![0; n];
        let mut first = vec![f64::INFINITY; n];
        let mut second = vec![f64::INFINITY; n];

        for (j, sample) in samples.iter().enumerate() {
            for (slot, &m) in medoids.iter().enumerate() {
                let d = dist(sample, &samples[m]);
                if d < first[j] {
                    second[j] = first[j];
                    first[j] = d;
                    nearest[j] = slot;
                } else if d < second[j] {
                    second[j] = d;
                }
            }
        }

        Self { nearest, first, second }
    }

    fn cost(&self) -> f64 {
        self.first.iter().sum()
    }
}

pub(crate) fn pam(samples: &[Perceptual], k: usize, max_swaps: usize) -> ClusterResult {
    let mut medoids = build(samples, k);
    let mut is_medoid = vec![false; samples.len()];
    for &m in &medoids {
        is_medoid[m] = true;
    }

    let mut assignment = Assignment::compute(samples, &medoids);
    for _ in 0..max_swaps {
        let Some((slot, candidate)) = best_swap(samples, &medoids, &is_medoid, &assignment) else {
            break;
        };
        is_medoid[medoids[slot]] = false;
        is_medoid[candidate] = true;
        medoids[slot] = candidate;
        assignment = Assignment::compute(samples, &medoids);
    }

    ClusterResult {
        representatives: medoids.iter().map(|&m| samples[m]).collect(),
        cost: assignment.cost(),
        assignments: assignment.nearest,
        medoid_indices: Some(medoids),
    }
}

/// Greedy initial medoids: the most central sample, then repeatedly the
/// sample that lowers total dissimilarity the most.
fn build(samples: &[Perceptual], k: usize) -> Vec<usize> {
    let n = samples.len();
    let mut medoids = Vec::with_capacity(k);
    let mut is_medoid = vec![false; n];

    let mut best = (0, f64::INFINITY);
    for (i, candidate) in samples.iter().enumerate() {
        let total: f64 = samples.iter().map(|s| dist(s, candidate)).sum();
        if total < best.1 {
            best = (i, total);
        }
    }
    medoids.push(best.0);
    is_medoid[best.0] = true;
    let mut nearest: Vec<f64> = samples.iter().map(|s| dist(s, &samples[best.0])).collect();

    while medoids.len() < k {
        let mut chosen: Option<(usize, f64)> = None;
        for (c, candidate) in samples.iter().enumerate() {
            if is_medoid[c] {
                continue;
            }
            let gain: f64 = samples
                .iter()
                .zip(&nearest)
                .map(|(s, &d)| (d - dist(s, candidate)).max(0.0))
                .sum();
            if chosen.is_none_or(|(_, g)| gain > g) {
                chosen = Some((c, gain));
            }
        }
        // k <= n guarantees a non-medoid candidate exists
        let Some((c, _)) = chosen else { break };
        medoids.push(c);
        is_medoid[c] = true;
        for (d, s) in nearest.iter_mut().zip(samples) {
            *d = d.min(dist(s, &samples[c]));
        }
    }

    medoids
}

/// The (medoid slot, replacement sample) with the most negative cost change.
fn best_swap(
    samples: &[Perceptual],
    medoids: &[usize],
    is_medoid: &[bool],
    assignment: &Assignment,
) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut best_delta = -SWAP_EPSILON;

    for slot in 0..medoids.len() {
        for (h, candidate) in samples.iter().enumerate() {
            if is_medoid[h] {
                continue;
            }
            let mut delta = 0.0;
            for (j, sample) in samples.iter().enumerate() {
                let d_jh = dist(sample, candidate);
                let d_j = assignment.first[j];
                if assignment.nearest[j] == slot {
                    delta += d_jh.min(assignment.second[j]) - d_j;
                } else if d_jh < d_j {
                    delta += d_jh - d_j;
                }
            }
            if delta < best_delta {
                best_delta = delta;
                best = Some((slot, h));
            }
        }
    }

    best
}
