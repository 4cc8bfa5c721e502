use nalgebra::DMatrix;
use std::str::FromStr;

use arxmap_core::config::ProjectionSettings;
use arxmap_core::error::{Error, Result};
use arxmap_core::types::{EmbeddingMap, ReducedMap};

use crate::matrix::stack;
use crate::pca;
use crate::umap::{self, UmapParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReductionMethod {
    Pca,
    #[default]
    Umap,
    PcaUmap,
}

impl FromStr for ReductionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pca" => Ok(Self::Pca),
            "umap" => Ok(Self::Umap),
            "pca_umap" | "pca+umap" => Ok(Self::PcaUmap),
            other => Err(Error::Config(format!("unknown reduction method '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReduceParams {
    pub umap: UmapParams,
    pub whiten: bool,
    /// Intermediate dimensionality for `PcaUmap`.
    pub pca_components: usize,
}

impl Default for ReduceParams {
    fn default() -> Self {
        Self { umap: UmapParams::default(), whiten: false, pca_components: 50 }
    }
}

impl ReduceParams {
    pub fn from_settings(s: &ProjectionSettings) -> Result<Self> {
        Ok(Self {
            umap: UmapParams {
                n_neighbors: s.n_neighbors,
                min_dist: s.min_dist,
                spread: s.spread,
                metric: s.metric.parse()?,
                n_epochs: s.n_epochs,
                random_state: s.random_state,
            },
            whiten: s.whiten,
            pca_components: s.pca_components,
        })
    }
}

pub trait Reducer {
    fn name(&self) -> &'static str;
    /// `n x d` in, `n x 3` out, rows in the same order.
    fn fit_transform(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>>;
}

pub struct PcaReducer {
    pub whiten: bool,
}

pub struct UmapReducer {
    pub params: UmapParams,
}

pub struct PcaUmapReducer {
    pub pca_components: usize,
    pub params: UmapParams,
}

impl Reducer for PcaReducer {
    fn name(&self) -> &'static str { "pca" }

    fn fit_transform(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let out = pca::fit_transform(x, 3, self.whiten)?;
        tracing::info!(
            variance_explained = %format!("{:.2}%", out.variance_ratio * 100.0),
            "PCA: variance explained by 3 components"
        );
        Ok(out.projected)
    }
}

impl Reducer for UmapReducer {
    fn name(&self) -> &'static str { "umap" }

    fn fit_transform(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        umap::fit_transform(x, &self.params)
    }
}

impl Reducer for PcaUmapReducer {
    fn name(&self) -> &'static str { "pca_umap" }

    fn fit_transform(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if self.pca_components < 3 {
            return Err(Error::Config(format!("pca_components must be at least 3, got {}", self.pca_components)));
        }
        let k = self.pca_components.min(x.ncols());
        let out = pca::fit_transform(x, k, false)?;
        tracing::info!(
            from = x.ncols(),
            to = k,
            variance_retained = %format!("{:.2}%", out.variance_ratio * 100.0),
            "PCA stage before UMAP"
        );
        umap::fit_transform(&out.projected, &self.params)
    }
}

impl ReductionMethod {
    pub fn reducer(&self, params: &ReduceParams) -> Box<dyn Reducer> {
        match self {
            Self::Pca => Box::new(PcaReducer { whiten: params.whiten }),
            Self::Umap => Box::new(UmapReducer { params: params.umap.clone() }),
            Self::PcaUmap => Box::new(PcaUmapReducer { pca_components: params.pca_components, params: params.umap.clone() }),
        }
    }
}

/// Project every vector to 3 coordinates. The output has exactly the
/// input's keys.
pub fn reduce(vectors: &EmbeddingMap, method: ReductionMethod, params: &ReduceParams) -> Result<ReducedMap> {
    let (keys, x) = stack(vectors)?;
    if keys.is_empty() {
        return Err(Error::Config("nothing to reduce: no embeddings".into()));
    }
    if x.ncols() < 3 {
        return Err(Error::Config(format!("cannot reduce {}-component vectors to 3D", x.ncols())));
    }

    let reducer = method.reducer(params);
    let y = reducer.fit_transform(&x)?;
    if y.shape() != (keys.len(), 3) {
        return Err(Error::Config(format!(
            "{} produced shape {:?}, expected ({}, 3)",
            reducer.name(),
            y.shape(),
            keys.len()
        )));
    }
    tracing::info!(method = reducer.name(), rows = keys.len(), "reduced embeddings to 3D");

    Ok(keys
        .into_iter()
        .enumerate()
        .map(|(i, k)| (k, [y[(i, 0)] as f32, y[(i, 1)] as f32, y[(i, 2)] as f32]))
        .collect())
}
