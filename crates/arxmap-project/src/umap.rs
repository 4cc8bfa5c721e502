//! Uniform Manifold Approximation and Projection to 3 dimensions.
//!
//! Exact k-nearest neighbours, smooth-kNN bandwidths, fuzzy union of the
//! directed membership graph, then SGD on the cross entropy with negative
//! sampling. All randomness comes from one `StdRng` seeded with
//! `random_state`, and the optimisation runs sequentially, so a given input
//! and seed always produce the same layout.

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::str::FromStr;

use arxmap_core::error::{Error, Result};

use crate::pca;

const N_COMPONENTS: usize = 3;
const SMOOTH_K_TOLERANCE: f64 = 1e-5;
const MIN_K_DIST_SCALE: f64 = 1e-3;
const BANDWIDTH_ITERATIONS: usize = 64;
const NEGATIVE_SAMPLE_RATE: f64 = 5.0;
const REPULSION_STRENGTH: f64 = 1.0;
const INITIAL_ALPHA: f64 = 1.0;
const GRADIENT_CLIP: f64 = 4.0;
const INIT_EXTENT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    #[default]
    Cosine,
    Euclidean,
    Manhattan,
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "manhattan" | "l1" => Ok(Self::Manhattan),
            other => Err(Error::Config(format!("unknown metric '{other}'"))),
        }
    }
}

impl Metric {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Metric::Euclidean => a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt(),
            Metric::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
            Metric::Cosine => {
                let (mut dot, mut na, mut nb) = (0.0, 0.0, 0.0);
                for (x, y) in a.iter().zip(b) {
                    dot += x * y;
                    na += x * x;
                    nb += y * y;
                }
                if na == 0.0 && nb == 0.0 {
                    0.0
                } else if na == 0.0 || nb == 0.0 {
                    1.0
                } else {
                    (1.0 - dot / (na.sqrt() * nb.sqrt())).max(0.0)
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UmapParams {
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub spread: f64,
    pub metric: Metric,
    /// `None` picks 500 for up to 10k rows, 200 above that.
    pub n_epochs: Option<usize>,
    pub random_state: u64,
}

impl Default for UmapParams {
    fn default() -> Self {
        Self { n_neighbors: 15, min_dist: 0.1, spread: 1.0, metric: Metric::Cosine, n_epochs: None, random_state: 42 }
    }
}

impl UmapParams {
    fn epochs_for(&self, rows: usize) -> usize {
        self.n_epochs.unwrap_or(if rows <= 10_000 { 500 } else { 200 })
    }
}

/// Fit `1 / (1 + a * x^(2b))` to the offset exponential implied by
/// `min_dist` and `spread` with Levenberg-Marquardt.
pub fn find_ab_params(spread: f64, min_dist: f64) -> (f64, f64) {
    const FALLBACK: (f64, f64) = (1.577, 0.895);
    let xs: Vec<f64> = (0..300).map(|i| spread * 3.0 * i as f64 / 299.0).collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| if x < min_dist { 1.0 } else { (-(x - min_dist) / spread).exp() })
        .collect();

    let residuals = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| (1.0 / (1.0 + a * x.powf(2.0 * b)) - y).powi(2))
            .sum()
    };

    let (mut a, mut b) = (1.0f64, 1.0f64);
    let mut lambda = 1e-3;
    let mut cost = residuals(a, b);
    for _ in 0..200 {
        // Normal equations J^T J and J^T r for the two parameters.
        let (mut jaa, mut jab, mut jbb, mut ga, mut gb) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (&x, &y) in xs.iter().zip(&ys) {
            if x <= 0.0 {
                continue;
            }
            let p = x.powf(2.0 * b);
            let denom = 1.0 + a * p;
            let f = 1.0 / denom;
            let r = f - y;
            let da = -p / (denom * denom);
            let db = -a * p * 2.0 * x.ln() / (denom * denom);
            jaa += da * da;
            jab += da * db;
            jbb += db * db;
            ga += da * r;
            gb += db * r;
        }
        let (maa, mbb) = (jaa * (1.0 + lambda), jbb * (1.0 + lambda));
        let det = maa * mbb - jab * jab;
        if det.abs() < 1e-300 {
            break;
        }
        let step_a = -(mbb * ga - jab * gb) / det;
        let step_b = -(maa * gb - jab * ga) / det;
        let (na, nb) = (a + step_a, b + step_b);
        let new_cost = if na > 0.0 && nb > 0.0 { residuals(na, nb) } else { f64::INFINITY };
        if new_cost < cost {
            let converged = (cost - new_cost).abs() < 1e-14;
            a = na;
            b = nb;
            cost = new_cost;
            lambda /= 10.0;
            if converged {
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > 1e12 {
                break;
            }
        }
    }
    if a.is_finite() && b.is_finite() && a > 0.0 && b > 0.0 { (a, b) } else { FALLBACK }
}

struct Knn {
    indices: Vec<Vec<usize>>,
    distances: Vec<Vec<f64>>,
}

/// Exact neighbours; each row's own index comes first at distance 0.
fn nearest_neighbors(x: &DMatrix<f64>, k: usize, metric: Metric) -> Knn {
    let n = x.nrows();
    let rows: Vec<Vec<f64>> = (0..n).map(|i| x.row(i).iter().copied().collect()).collect();
    let mut indices = Vec::with_capacity(n);
    let mut distances = Vec::with_capacity(n);
    for i in 0..n {
        let mut d: Vec<(f64, usize)> = (0..n)
            .map(|j| (if i == j { 0.0 } else { metric.distance(&rows[i], &rows[j]) }, j))
            .collect();
        d.sort_by(|a, b| {
            let self_first = (a.1 != i).cmp(&(b.1 != i));
            self_first.then(a.0.total_cmp(&b.0)).then(a.1.cmp(&b.1))
        });
        d.truncate(k);
        indices.push(d.iter().map(|p| p.1).collect());
        distances.push(d.iter().map(|p| p.0).collect());
    }
    Knn { indices, distances }
}

/// Per-row `rho` (distance to the closest real neighbour) and `sigma`
/// such that the membership strengths sum to `log2(k)`.
fn smooth_knn_dist(distances: &[Vec<f64>], k: usize) -> (Vec<f64>, Vec<f64>) {
    let target = (k as f64).log2();
    let global_mean = {
        let all: Vec<f64> = distances.iter().flatten().copied().collect();
        if all.is_empty() { 0.0 } else { all.iter().sum::<f64>() / all.len() as f64 }
    };
    let mut rhos = Vec::with_capacity(distances.len());
    let mut sigmas = Vec::with_capacity(distances.len());
    for row in distances {
        let rho = row.iter().copied().find(|&d| d > 0.0).unwrap_or(0.0);
        let (mut lo, mut hi, mut mid) = (0.0f64, f64::INFINITY, 1.0f64);
        for _ in 0..BANDWIDTH_ITERATIONS {
            let psum: f64 = row
                .iter()
                .skip(1)
                .map(|&d| {
                    let gap = d - rho;
                    if gap > 0.0 { (-gap / mid).exp() } else { 1.0 }
                })
                .sum();
            if (psum - target).abs() < SMOOTH_K_TOLERANCE {
                break;
            }
            if psum > target {
                hi = mid;
                mid = (lo + hi) / 2.0;
            } else {
                lo = mid;
                mid = if hi.is_infinite() { mid * 2.0 } else { (lo + hi) / 2.0 };
            }
        }
        let row_mean = row.iter().sum::<f64>() / row.len().max(1) as f64;
        let floor = if rho > 0.0 { MIN_K_DIST_SCALE * row_mean } else { MIN_K_DIST_SCALE * global_mean };
        rhos.push(rho);
        sigmas.push(mid.max(floor));
    }
    (rhos, sigmas)
}

/// Symmetrised fuzzy graph as `(head, tail, weight)` edges in both directions.
fn fuzzy_simplicial_set(knn: &Knn, k: usize) -> Vec<(usize, usize, f64)> {
    let (rhos, sigmas) = smooth_knn_dist(&knn.distances, k);
    let mut directed: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (i, (idx, dist)) in knn.indices.iter().zip(&knn.distances).enumerate() {
        for (&j, &d) in idx.iter().zip(dist) {
            if j == i {
                continue;
            }
            let w = if d - rhos[i] <= 0.0 || sigmas[i] == 0.0 { 1.0 } else { (-(d - rhos[i]) / sigmas[i]).exp() };
            directed.insert((i, j), w);
        }
    }
    let mut union: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (&(i, j), &w) in &directed {
        let wt = directed.get(&(j, i)).copied().unwrap_or(0.0);
        let p = w + wt - w * wt;
        union.insert((i, j), p);
        union.insert((j, i), p);
    }
    union.into_iter().filter(|&(_, w)| w > 0.0).map(|((i, j), w)| (i, j, w)).collect()
}

/// PCA layout rescaled per axis to `[0, INIT_EXTENT]`. Axes with no spread
/// are filled uniformly at random instead.
fn initial_layout(x: &DMatrix<f64>, rng: &mut StdRng) -> Result<Vec<[f64; N_COMPONENTS]>> {
    let n = x.nrows();
    let init = pca::fit_transform(x, N_COMPONENTS, false)?.projected;
    let mut layout = vec![[0.0; N_COMPONENTS]; n];
    for c in 0..N_COMPONENTS {
        let col: Vec<f64> = if c < init.ncols() { init.column(c).iter().copied().collect() } else { vec![0.0; n] };
        let (min, max) = col.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let range = max - min;
        for (i, point) in layout.iter_mut().enumerate() {
            point[c] = if range > 1e-12 {
                INIT_EXTENT * (col[i] - min) / range + rng.gen_range(-1e-4..1e-4)
            } else {
                rng.gen_range(0.0..INIT_EXTENT)
            };
        }
    }
    Ok(layout)
}

fn clip(v: f64) -> f64 {
    v.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

fn rdist(a: &[f64; N_COMPONENTS], b: &[f64; N_COMPONENTS]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

struct Layout {
    a: f64,
    b: f64,
    n_epochs: usize,
}

impl Layout {
    fn optimize(&self, embedding: &mut [[f64; N_COMPONENTS]], edges: &[(usize, usize, f64)], rng: &mut StdRng) {
        let n_vertices = embedding.len();
        let max_w = edges.iter().map(|e| e.2).fold(0.0f64, f64::max);
        if edges.is_empty() || max_w <= 0.0 {
            return;
        }
        let epochs_per_sample: Vec<f64> = edges.iter().map(|e| max_w / e.2).collect();
        let epochs_per_negative: Vec<f64> = epochs_per_sample.iter().map(|e| e / NEGATIVE_SAMPLE_RATE).collect();
        let mut next_sample = epochs_per_sample.clone();
        let mut next_negative = epochs_per_negative.clone();
        let (a, b) = (self.a, self.b);

        for epoch in 0..self.n_epochs {
            let alpha = INITIAL_ALPHA * (1.0 - epoch as f64 / self.n_epochs as f64);
            let now = epoch as f64;
            for (e, &(head, tail, _)) in edges.iter().enumerate() {
                if next_sample[e] > now {
                    continue;
                }

                let current = embedding[head];
                let other = embedding[tail];
                let dist_sq = rdist(&current, &other);
                let coeff = if dist_sq > 0.0 {
                    -2.0 * a * b * dist_sq.powf(b - 1.0) / (a * dist_sq.powf(b) + 1.0)
                } else {
                    0.0
                };
                for d in 0..N_COMPONENTS {
                    let grad = clip(coeff * (current[d] - other[d]));
                    embedding[head][d] += grad * alpha;
                    embedding[tail][d] -= grad * alpha;
                }
                next_sample[e] += epochs_per_sample[e];

                let n_neg = ((now - next_negative[e]) / epochs_per_negative[e]).max(0.0) as usize;
                for _ in 0..n_neg {
                    let k = rng.gen_range(0..n_vertices);
                    if k == head {
                        continue;
                    }
                    let current = embedding[head];
                    let other = embedding[k];
                    let dist_sq = rdist(&current, &other);
                    if dist_sq <= 0.0 {
                        continue;
                    }
                    let coeff = 2.0 * REPULSION_STRENGTH * b / ((0.001 + dist_sq) * (a * dist_sq.powf(b) + 1.0));
                    for d in 0..N_COMPONENTS {
                        embedding[head][d] += clip(coeff * (current[d] - other[d])) * alpha;
                    }
                }
                next_negative[e] += n_neg as f64 * epochs_per_negative[e];
            }
        }
    }
}

/// Embed the rows of `x` in 3 dimensions.
pub fn fit_transform(x: &DMatrix<f64>, params: &UmapParams) -> Result<DMatrix<f64>> {
    let n = x.nrows();
    if params.n_neighbors < 2 {
        return Err(Error::Config(format!("n_neighbors must be at least 2, got {}", params.n_neighbors)));
    }
    if n < params.n_neighbors {
        return Err(Error::Config(format!(
            "UMAP needs at least n_neighbors={} rows, got {n}",
            params.n_neighbors
        )));
    }
    if params.spread.is_nan() || params.spread <= 0.0 || params.min_dist < 0.0 || params.min_dist > params.spread {
        return Err(Error::Config(format!(
            "invalid min_dist={} / spread={}",
            params.min_dist, params.spread
        )));
    }

    let n_epochs = params.epochs_for(n);
    let (a, b) = find_ab_params(params.spread, params.min_dist);
    tracing::info!(rows = n, dims = x.ncols(), n_neighbors = params.n_neighbors, n_epochs, a, b, "running UMAP");

    let knn = nearest_neighbors(x, params.n_neighbors, params.metric);
    let mut edges = fuzzy_simplicial_set(&knn, params.n_neighbors);
    let max_w = edges.iter().map(|e| e.2).fold(0.0f64, f64::max);
    edges.retain(|e| e.2 >= max_w / n_epochs as f64);
    tracing::debug!(edges = edges.len(), "fuzzy graph built");

    let mut rng = StdRng::seed_from_u64(params.random_state);
    let mut embedding = initial_layout(x, &mut rng)?;
    Layout { a, b, n_epochs }.optimize(&mut embedding, &edges, &mut rng);

    let flat: Vec<f64> = embedding.iter().flat_map(|p| p.iter().copied()).collect();
    Ok(DMatrix::from_row_slice(n, N_COMPONENTS, &flat))
}
