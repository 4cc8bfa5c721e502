use nalgebra::DMatrix;
use std::str::FromStr;

use arxmap_core::error::{Error, Result};
use arxmap_core::types::EmbeddingMap;

use crate::matrix::{stack, unstack};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizationMethod {
    /// Per-dimension z-score.
    #[default]
    Standard,
    /// Per-dimension rescale to [0, 1].
    MinMax,
    /// Each row to unit length.
    L2,
}

impl FromStr for NormalizationMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "minmax" => Ok(Self::MinMax),
            "l2" => Ok(Self::L2),
            other => Err(Error::Config(format!("unknown normalization method '{other}'"))),
        }
    }
}

pub trait Normalizer {
    /// Rescale the whole `n x d` batch in place.
    fn fit_transform(&self, m: &mut DMatrix<f64>);
}

pub struct StandardScaler;
pub struct MinMaxScaler;
pub struct L2Normalizer;

impl Normalizer for StandardScaler {
    fn fit_transform(&self, m: &mut DMatrix<f64>) {
        let n = m.nrows() as f64;
        if n == 0.0 {
            return;
        }
        for mut col in m.column_iter_mut() {
            let mean = col.sum() / n;
            let var = col.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            // Constant dimensions are only centered.
            let scale = if std > f64::EPSILON { std } else { 1.0 };
            col.apply(|x| *x = (*x - mean) / scale);
        }
    }
}

impl Normalizer for MinMaxScaler {
    fn fit_transform(&self, m: &mut DMatrix<f64>) {
        for mut col in m.column_iter_mut() {
            let (min, max) = col.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));
            let range = max - min;
            if range > f64::EPSILON {
                col.apply(|x| *x = (*x - min) / range);
            } else {
                col.fill(0.0);
            }
        }
    }
}

impl Normalizer for L2Normalizer {
    fn fit_transform(&self, m: &mut DMatrix<f64>) {
        for mut row in m.row_iter_mut() {
            let norm = row.norm();
            if norm > 0.0 {
                row /= norm;
            }
        }
    }
}

impl NormalizationMethod {
    pub fn normalizer(&self) -> Box<dyn Normalizer> {
        match self {
            Self::Standard => Box::new(StandardScaler),
            Self::MinMax => Box::new(MinMaxScaler),
            Self::L2 => Box::new(L2Normalizer),
        }
    }
}

/// Normalize all vectors as one batch; the key set is unchanged.
pub fn normalize(vectors: &EmbeddingMap, method: NormalizationMethod) -> Result<EmbeddingMap> {
    let (keys, mut m) = stack(vectors)?;
    method.normalizer().fit_transform(&mut m);
    tracing::info!(method = ?method, rows = m.nrows(), dims = m.ncols(), "normalized embeddings");
    Ok(unstack(keys, &m))
}
