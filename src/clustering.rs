//! K-means grouping of scaled feature vectors.
//!
//! Groups rows of a [`FeatureMatrix`] by Euclidean distance to iteratively
//! refined centroids, and scans candidate group counts to pick one.
//!
//! ## Reproducibility
//!
//! Initialization is k-means++ driven by a seeded [`StdRng`]. Identical
//! input, `k` and [`ClusterConfig`] always produce identical labels.
//!
//! ## Choosing `k`
//!
//! [`find_optimal_k`] returns the candidate with the lowest distortion.
//! Distortion never grows with `k`, so on distinct rows this is usually
//! `max_k` itself rather than the bend of the curve:
//!
//! ```
//! use cadence::clustering::find_optimal_k;
//! use cadence::features::FeatureMatrix;
//!
//! let rows = (0..4)
//!     .flat_map(|group| (0..5).map(move |i| vec![100.0 * group as f64 + i as f64, 0.0]))
//!     .collect();
//! let matrix = FeatureMatrix::from_rows(rows)?;
//! assert_eq!(find_optimal_k(&matrix, 6)?, 6);
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::features::FeatureMatrix;
use anyhow::{bail, Result};
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed used unless a caller overrides it.
pub const DEFAULT_SEED: u64 = 42;

/// Tuning for a k-means run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    /// Lloyd iterations per initialization.
    pub max_iterations: usize,
    /// Stop once no centroid moves further than this.
    pub tolerance: f64,
    pub seed: u64,
    /// Seeded initializations per fit; the lowest distortion wins.
    pub n_init: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            tolerance: 1e-4,
            seed: DEFAULT_SEED,
            n_init: 10,
        }
    }
}

/// Outcome of one fit.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Group per row, each in `[0, k)`.
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances from rows to their group's centroid.
    pub distortion: f64,
    /// Lloyd iterations used by the winning initialization.
    pub iterations: usize,
}

impl Clustering {
    /// Number of rows in each group.
    #[must_use]
    pub fn group_sizes(&self) -> Vec<usize> {
        group_sizes(&self.labels, self.centroids.len())
    }
}

/// K-means grouping engine.
#[derive(Debug, Clone, Default)]
pub struct KMeans {
    config: ClusterConfig,
}

impl KMeans {
    #[must_use]
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Partitions the rows of `matrix` into exactly `k` groups.
    ///
    /// # Errors
    ///
    /// Fails if the matrix is empty, `k` is zero, or `k` exceeds the row count.
    pub fn fit(&self, matrix: &FeatureMatrix, k: usize) -> Result<Clustering> {
        validate(matrix, k)?;

        let rows = matrix.rows();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut best: Option<Clustering> = None;

        for init in 0..self.config.n_init.max(1) {
            let run = run_once(rows, k, &self.config, &mut rng);
            trace!(
                "k={k} init {init}: distortion {:.6} after {} iterations",
                run.distortion,
                run.iterations
            );
            let better = best
                .as_ref()
                .map_or(true, |current| run.distortion < current.distortion);
            if better {
                best = Some(run);
            }
        }

        match best {
            Some(clustering) => {
                debug!(
                    "Clustered {} rows into {k} groups, distortion {:.4}, sizes {:?}",
                    rows.len(),
                    clustering.distortion,
                    clustering.group_sizes()
                );
                Ok(clustering)
            }
            None => bail!("K-means produced no result for k={k}"),
        }
    }

    /// Labels only; see [`KMeans::fit`].
    pub fn cluster(&self, matrix: &FeatureMatrix, k: usize) -> Result<Vec<usize>> {
        self.fit(matrix, k).map(|clustering| clustering.labels)
    }

    /// Distortion for every candidate count in `1..=max_k`, in order.
    ///
    /// # Errors
    ///
    /// Fails if `max_k` is zero or exceeds the row count.
    pub fn distortion_curve(&self, matrix: &FeatureMatrix, max_k: usize) -> Result<Vec<f64>> {
        if max_k == 0 {
            bail!("Maximum cluster count must be at least 1");
        }
        if max_k > matrix.n_rows() {
            bail!(
                "Maximum cluster count {max_k} exceeds the number of tracks ({})",
                matrix.n_rows()
            );
        }

        (1..=max_k)
            .map(|k| self.fit(matrix, k).map(|clustering| clustering.distortion))
            .collect()
    }

    /// Candidate count in `1..=max_k` with the smallest distortion, the
    /// earliest one on ties.
    pub fn find_optimal_k(&self, matrix: &FeatureMatrix, max_k: usize) -> Result<usize> {
        let curve = self.distortion_curve(matrix, max_k)?;
        let optimal = optimal_k_from_curve(&curve);
        debug!("Distortion curve {curve:?}, picked k={optimal}");
        Ok(optimal)
    }
}

/// [`KMeans::cluster`] with the default configuration.
pub fn cluster(matrix: &FeatureMatrix, k: usize) -> Result<Vec<usize>> {
    KMeans::default().cluster(matrix, k)
}

/// [`KMeans::distortion_curve`] with the default configuration.
pub fn distortion_curve(matrix: &FeatureMatrix, max_k: usize) -> Result<Vec<f64>> {
    KMeans::default().distortion_curve(matrix, max_k)
}

/// [`KMeans::find_optimal_k`] with the default configuration.
pub fn find_optimal_k(matrix: &FeatureMatrix, max_k: usize) -> Result<usize> {
    KMeans::default().find_optimal_k(matrix, max_k)
}

/// Count whose distortion is lowest in a curve starting at `k = 1`.
#[must_use]
pub fn optimal_k_from_curve(curve: &[f64]) -> usize {
    minimum_index(curve) + 1
}

/// Rows per label for labels in `[0, k)`.
#[must_use]
pub fn group_sizes(labels: &[usize], k: usize) -> Vec<usize> {
    let mut sizes = vec![0; k];
    for &label in labels {
        if let Some(size) = sizes.get_mut(label) {
            *size += 1;
        }
    }
    sizes
}

fn validate(matrix: &FeatureMatrix, k: usize) -> Result<()> {
    if matrix.is_empty() {
        bail!("Cannot cluster an empty feature matrix");
    }
    if k == 0 {
        bail!("Cluster count must be at least 1");
    }
    if k > matrix.n_rows() {
        bail!(
            "Cluster count {k} exceeds the number of tracks ({})",
            matrix.n_rows()
        );
    }
    Ok(())
}

/// One seeded initialization followed by Lloyd iterations.
fn run_once(rows: &[Vec<f64>], k: usize, config: &ClusterConfig, rng: &mut StdRng) -> Clustering {
    let mut centroids = plus_plus_init(rows, k, rng);
    let mut labels = vec![usize::MAX; rows.len()];
    let mut iterations = 0;

    for iter in 0..config.max_iterations.max(1) {
        iterations = iter + 1;

        let mut next = assign(rows, &centroids);
        fill_empty_groups(rows, &mut next, &centroids, k);
        let stable = next == labels;
        labels = next;

        let updated = means(rows, &labels, &centroids);
        let shift = centroids
            .iter()
            .zip(&updated)
            .map(|(old, new)| distance_sq(old, new))
            .fold(0.0, f64::max);
        centroids = updated;

        if stable || shift <= config.tolerance * config.tolerance {
            break;
        }
    }

    let distortion: f64 = rows
        .iter()
        .zip(&labels)
        .map(|(row, &label)| distance_sq(row, &centroids[label]))
        .sum();

    Clustering {
        labels,
        centroids,
        distortion,
        iterations,
    }
}

/// k-means++ seeding: first centroid uniform, the rest weighted by squared
/// distance to the nearest centroid chosen so far.
fn plus_plus_init(rows: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(rows[rng.gen_range(0..rows.len())].clone());

    while centroids.len() < k {
        let weights: Vec<f64> = rows
            .iter()
            .map(|row| {
                centroids
                    .iter()
                    .map(|c| distance_sq(row, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();

        if total <= 0.0 {
            // Every row sits on a centroid already.
            centroids.push(rows[rng.gen_range(0..rows.len())].clone());
            continue;
        }

        let threshold = rng.gen::<f64>() * total;
        let mut cumulative = 0.0;
        let mut selected = rows.len() - 1;
        for (idx, weight) in weights.iter().enumerate() {
            cumulative += weight;
            if cumulative >= threshold && *weight > 0.0 {
                selected = idx;
                break;
            }
        }
        centroids.push(rows[selected].clone());
    }

    centroids
}

fn assign(rows: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<usize> {
    rows.iter().map(|row| nearest(row, centroids)).collect()
}

/// Index of the closest centroid, lowest index on ties.
fn nearest(row: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (idx, centroid) in centroids.iter().enumerate() {
        let dist = distance_sq(row, centroid);
        if dist < best_dist {
            best = idx;
            best_dist = dist;
        }
    }
    best
}

/// Moves rows into groups that received none: each empty group takes the
/// row farthest from its current centroid, drawn from groups that can
/// spare one. Requires `rows.len() >= k`.
fn fill_empty_groups(rows: &[Vec<f64>], labels: &mut [usize], centroids: &[Vec<f64>], k: usize) {
    let mut sizes = group_sizes(labels, k);

    for group in 0..k {
        if sizes[group] > 0 {
            continue;
        }

        let mut donor: Option<(usize, f64)> = None;
        for (idx, row) in rows.iter().enumerate() {
            let label = labels[idx];
            if sizes[label] < 2 {
                continue;
            }
            let dist = distance_sq(row, &centroids[label]);
            if donor.map_or(true, |(_, best)| dist > best) {
                donor = Some((idx, dist));
            }
        }

        if let Some((idx, _)) = donor {
            trace!("Re-seating empty group {group} on row {idx}");
            sizes[labels[idx]] -= 1;
            labels[idx] = group;
            sizes[group] += 1;
        }
    }
}

/// Mean of each group's rows; a group with no rows keeps its old centroid.
#[allow(clippy::cast_precision_loss)]
fn means(rows: &[Vec<f64>], labels: &[usize], previous: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let width = rows.first().map_or(0, Vec::len);
    let mut sums = vec![vec![0.0; width]; previous.len()];
    let mut counts = vec![0_usize; previous.len()];

    for (row, &label) in rows.iter().zip(labels) {
        counts[label] += 1;
        for (sum, value) in sums[label].iter_mut().zip(row) {
            *sum += value;
        }
    }

    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((sum, count), old)| match count {
            0 => old.clone(),
            n => sum.into_iter().map(|s| s / n as f64).collect(),
        })
        .collect()
}

fn distance_sq(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn minimum_index(values: &[f64]) -> usize {
    let mut best = 0;
    for (idx, value) in values.iter().enumerate() {
        if *value < values[best] {
            best = idx;
        }
    }
    best
}
