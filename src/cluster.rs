//! Clustering of perceptual samples into palette representatives.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use kmeans_colors::{Kmeans, get_kmeans};
use palette::Lab;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::color::{self, Perceptual};
use crate::config::{EarthtonesConfig, KmeansConfig, PamConfig};
use crate::pam;
use crate::{EarthtonesError, Result};

/// The k-means backend stores assignments as `u8`.
pub const MAX_CENTROID_COLORS: usize = 256;

/// How cluster representatives are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// k-means: each representative is the mean of its cluster
    #[serde(rename = "kmeans")]
    Centroid,
    /// Partitioning around medoids: each representative is an observed sample
    #[default]
    #[serde(rename = "pam")]
    Medoid,
}

impl Method {
    pub const ALL: [Method; 2] = [Method::Centroid, Method::Medoid];

    pub fn name(self) -> &'static str {
        match self {
            Method::Centroid => "kmeans",
            Method::Medoid => "pam",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = EarthtonesError;

    fn from_str(s: &str) -> Result<Self> {
        Method::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let names: Vec<&str> = Method::ALL.iter().map(|m| m.name()).collect();
                EarthtonesError::invalid_parameter(
                    "method",
                    format!("`{s}` is not supported; expected one of: {}", names.join(", ")),
                )
            })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClusterOptions {
    /// `None` draws a fresh seed from the OS, so repeated calls may differ
    pub seed: Option<u64>,
    pub kmeans: KmeansConfig,
    pub pam: PamConfig,
}

impl ClusterOptions {
    pub fn from_config(config: &EarthtonesConfig, seed: Option<u64>) -> Self {
        Self {
            seed,
            kmeans: config.kmeans.clone(),
            pam: config.pam.clone(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterResult {
    /// One point per cluster, in the algorithm's own order
    pub representatives: Vec<Perceptual>,
    /// Cluster index of every input sample
    pub assignments: Vec<usize>,
    /// For PAM, the sample index behind each representative
    pub medoid_indices: Option<Vec<usize>>,
    /// Sum of squared L*a*b* distances to the assigned centroid (k-means) or
    /// total dissimilarity to the assigned medoid (PAM)
    pub cost: f64,
}

/// Partition `samples` into `k` clusters and return their representatives.
pub fn cluster(samples: &[Perceptual], k: usize, method: Method, options: &ClusterOptions) -> Result<ClusterResult> {
    let available = match method {
        Method::Centroid => samples.len().min(MAX_CENTROID_COLORS),
        Method::Medoid => samples.len(),
    };
    if k == 0 || k > available {
        return Err(EarthtonesError::InvalidClusterCount {
            requested: k,
            available,
        });
    }

    let result = match method {
        Method::Centroid => kmeans(samples, k, &options.kmeans, resolve_seed(options.seed)),
        Method::Medoid => pam::pam(samples, k, options.pam.max_swaps),
    };
    debug!(
        method = %method,
        k,
        samples = samples.len(),
        cost = result.cost,
        "clustered samples"
    );
    Ok(result)
}

fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| {
        getrandom::u64().unwrap_or_else(|err| {
            warn!(%err, "no OS entropy available, falling back to seed 0");
            0
        })
    })
}

fn kmeans(samples: &[Perceptual], k: usize, config: &KmeansConfig, seed: u64) -> ClusterResult {
    let buf: Vec<Lab> = samples
        .iter()
        .map(|s| Lab::new(s.l as f32, s.a as f32, s.b as f32))
        .collect();

    // k-means++ cannot pick k distinct seeds from fewer than k distinct points.
    let distinct = distinct_points(&buf);
    if distinct.len() < k {
        return degenerate_centroids(&buf, &distinct, k);
    }

    let runs = (0..config.runs.max(1) as u64)
        .map(|run| get_kmeans(k, config.max_iter, config.converge, false, &buf, seed.wrapping_add(run)));
    lowest_error(samples, runs, k).unwrap_or_else(|| degenerate_centroids(&buf, &distinct, k))
}

/// Keep the restart with the smallest within-cluster squared error.
///
/// `Kmeans::score` only measures how far the centroids moved on the last
/// iteration, so it says nothing about clustering quality.
fn lowest_error<I>(samples: &[Perceptual], runs: I, k: usize) -> Option<ClusterResult>
where
    I: IntoIterator<Item = Kmeans<Lab>>,
{
    runs.into_iter()
        .filter_map(|run| centroid_result(samples, run, k))
        .reduce(|best, run| if run.cost < best.cost { run } else { best })
}

fn centroid_result(samples: &[Perceptual], run: Kmeans<Lab>, k: usize) -> Option<ClusterResult> {
    let mut representatives: Vec<Perceptual> = run.centroids.iter().map(widen).collect();
    if representatives.is_empty() {
        return None;
    }
    // Seeding stops early once every point sits on a center.
    let found = representatives.len();
    for i in found..k {
        representatives.push(representatives[i % found]);
    }

    let assignments: Vec<usize> = run.indices.iter().map(|&i| i as usize).collect();
    let cost = samples
        .iter()
        .zip(&assignments)
        .map(|(s, &i)| color::distance_squared(s, &representatives[i.min(found - 1)]))
        .sum();
    Some(ClusterResult {
        representatives,
        assignments,
        medoid_indices: None,
        cost,
    })
}

/// First-seen order of the distinct points in `buf`. Signed zeros compare
/// equal, as they do for the backend's distances.
fn distinct_points(buf: &[Lab]) -> Vec<Lab> {
    let mut seen = HashSet::new();
    buf.iter()
        .filter(|p| seen.insert(((p.l + 0.0).to_bits(), (p.a + 0.0).to_bits(), (p.b + 0.0).to_bits())))
        .copied()
        .collect()
}

/// With fewer distinct points than clusters, every distinct point is its own
/// center (zero cost) and the surplus slots repeat them in order.
fn degenerate_centroids(buf: &[Lab], distinct: &[Lab], k: usize) -> ClusterResult {
    let assignments = buf
        .iter()
        .map(|p| distinct.iter().position(|d| same_point(d, p)).unwrap_or(0))
        .collect();
    ClusterResult {
        representatives: distinct.iter().cycle().take(k).map(widen).collect(),
        assignments,
        medoid_indices: None,
        cost: 0.0,
    }
}

fn same_point(a: &Lab, b: &Lab) -> bool {
    a.l == b.l && a.a == b.a && a.b == b.b
}

fn widen(lab: &Lab) -> Perceptual {
    Perceptual::new(lab.l as f64, lab.a as f64, lab.b as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<Perceptual> {
        let mut samples = Vec::new();
        for i in 0..20 {
            let jitter = i as f64 * 0.1;
            samples.push(Perceptual::new(20.0 + jitter, 10.0, -5.0));
            samples.push(Perceptual::new(80.0 - jitter, -30.0, 40.0));
        }
        samples
    }

    fn seeded() -> ClusterOptions {
        ClusterOptions::default().with_seed(7)
    }

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("KMeans".parse::<Method>().unwrap(), Method::Centroid);
        assert_eq!(" pam ".parse::<Method>().unwrap(), Method::Medoid);
    }

    #[test]
    fn unknown_method_lists_supported_names() {
        let err = "invalid".parse::<Method>().unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, EarthtonesError::InvalidParameter { .. }));
        assert!(message.contains("kmeans") && message.contains("pam"), "{message}");
    }

    #[test]
    fn rejects_zero_and_oversized_k() {
        let samples = two_blobs();
        for method in Method::ALL {
            assert!(matches!(
                cluster(&samples, 0, method, &seeded()),
                Err(EarthtonesError::InvalidClusterCount { requested: 0, .. })
            ));
            assert!(matches!(
                cluster(&samples, samples.len() + 1, method, &seeded()),
                Err(EarthtonesError::InvalidClusterCount { .. })
            ));
        }
    }

    #[test]
    fn returns_exactly_k() {
        let samples = two_blobs();
        for method in Method::ALL {
            for k in [1, 2, 5, samples.len()] {
                let result = cluster(&samples, k, method, &seeded()).unwrap();
                assert_eq!(result.representatives.len(), k, "{method} k={k}");
                assert_eq!(result.assignments.len(), samples.len());
            }
        }
    }

    #[test]
    fn kmeans_is_reproducible_with_seed() {
        let samples = two_blobs();
        let a = cluster(&samples, 3, Method::Centroid, &seeded()).unwrap();
        let b = cluster(&samples, 3, Method::Centroid, &seeded()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn kmeans_separates_blobs() {
        let samples = two_blobs();
        let result = cluster(&samples, 2, Method::Centroid, &seeded()).unwrap();
        let mut lightness: Vec<f64> = result.representatives.iter().map(|r| r.l).collect();
        lightness.sort_by(|a, b| a.total_cmp(b));
        assert!((lightness[0] - 20.95).abs() < 0.01, "{lightness:?}");
        assert!((lightness[1] - 79.05).abs() < 0.01, "{lightness:?}");
    }

    #[test]
    fn kmeans_with_duplicates_pads_with_distinct_points() {
        let samples = vec![Perceptual::new(50.0, 0.0, 0.0); 10];
        let result = cluster(&samples, 3, Method::Centroid, &seeded()).unwrap();
        assert_eq!(result.representatives.len(), 3);
        assert!(result.representatives.iter().all(|r| *r == samples[0]));
        assert_eq!(result.cost, 0.0);
    }

    #[test]
    fn kmeans_treats_signed_zeros_as_one_point() {
        let samples = vec![Perceptual::new(50.0, 0.0, 0.0), Perceptual::new(50.0, -0.0, 0.0)];
        let result = cluster(&samples, 2, Method::Centroid, &ClusterOptions::default().with_seed(1)).unwrap();
        assert_eq!(result.representatives.len(), 2);
        assert_eq!(result.assignments, vec![0, 0]);
    }

    #[test]
    fn kmeans_pads_when_seeding_stops_early() {
        // Distinct in f32, but their squared distance underflows to zero.
        let samples = vec![Perceptual::new(0.0, 0.0, 0.0), Perceptual::new(1e-30, 0.0, 0.0)];
        for seed in 0..8 {
            let result = cluster(&samples, 2, Method::Centroid, &ClusterOptions::default().with_seed(seed)).unwrap();
            assert_eq!(result.representatives.len(), 2, "seed {seed}");
            assert_eq!(result.assignments.len(), 2);
        }
    }

    fn sse(samples: &[Perceptual], run: &Kmeans<Lab>) -> f64 {
        samples
            .iter()
            .zip(&run.indices)
            .map(|(s, &i)| color::distance_squared(s, &widen(&run.centroids[i as usize])))
            .sum()
    }

    #[test]
    fn restart_with_lowest_error_wins_over_score() {
        let samples = two_blobs();
        let lab: Vec<Lab> = samples.iter().map(|s| Lab::new(s.l as f32, s.a as f32, s.b as f32)).collect();
        // Converged (score 0) but both centers sit in the dark blob.
        let poor = Kmeans {
            score: 0.0,
            centroids: vec![lab[0], lab[2]],
            indices: vec![1; samples.len()],
        };
        let good = Kmeans {
            score: 0.5,
            centroids: vec![Lab::new(20.95, 10.0, -5.0), Lab::new(79.05, -30.0, 40.0)],
            indices: (0..samples.len()).map(|i| (i % 2) as u8).collect(),
        };
        let expected = sse(&samples, &good);
        assert!(expected < sse(&samples, &poor));

        let chosen = lowest_error(&samples, [poor, good], 2).unwrap();
        assert!((chosen.cost - expected).abs() < 1e-9);
        assert!((chosen.representatives[0].l - 20.95).abs() < 1e-4);
    }

    #[test]
    fn kmeans_cost_is_best_of_its_restarts() {
        // Unequal blobs so restarts settle in different local minima.
        let mut samples = Vec::new();
        for (i, (center, size)) in [(10.0, 60), (30.0, 5), (50.0, 40), (70.0, 5), (90.0, 30)].into_iter().enumerate() {
            for j in 0..size {
                let jitter = (j % 7) as f64 * 0.3;
                samples.push(Perceptual::new(center + jitter, i as f64 * 4.0 - jitter, jitter));
            }
        }
        let lab: Vec<Lab> = samples.iter().map(|s| Lab::new(s.l as f32, s.a as f32, s.b as f32)).collect();
        let config = KmeansConfig::default();

        for seed in 0..40u64 {
            let result = cluster(&samples, 4, Method::Centroid, &ClusterOptions::default().with_seed(seed)).unwrap();
            let best = (0..config.runs.max(1) as u64)
                .map(|run| get_kmeans(4, config.max_iter, config.converge, false, &lab, seed.wrapping_add(run)))
                .map(|run| sse(&samples, &run))
                .fold(f64::INFINITY, f64::min);
            assert!((result.cost - best).abs() <= 1e-6 * best.max(1.0), "seed {seed}: {} vs {best}", result.cost);
        }
    }

    #[test]
    fn kmeans_caps_k_at_backend_width() {
        let samples: Vec<Perceptual> = (0..300).map(|i| Perceptual::new(i as f64 / 3.0, 0.0, 0.0)).collect();
        assert!(matches!(
            cluster(&samples, 257, Method::Centroid, &seeded()),
            Err(EarthtonesError::InvalidClusterCount { available: 256, .. })
        ));
        assert!(cluster(&samples, 257, Method::Medoid, &seeded()).is_ok());
    }

    #[test]
    fn medoids_are_observed_samples() {
        let samples = two_blobs();
        let result = cluster(&samples, 2, Method::Medoid, &ClusterOptions::default()).unwrap();
        let indices = result.medoid_indices.clone().unwrap();
        for (rep, idx) in result.representatives.iter().zip(&indices) {
            assert_eq!(*rep, samples[*idx]);
        }
    }

    #[test]
    fn method_serde_uses_short_names() {
        assert_eq!(serde_json::to_string(&Method::Medoid).unwrap(), "\"pam\"");
        let m: Method = serde_json::from_str("\"kmeans\"").unwrap();
        assert_eq!(m, Method::Centroid);
    }
}
