use nalgebra::DMatrix;

use arxmap_core::error::{Error, Result};
use arxmap_core::types::{EmbeddingMap, PaperId};

/// Stack the map's vectors into an `n x d` matrix. Keys come back in the
/// map's iteration order, row `i` belongs to `keys[i]`.
pub fn stack(vectors: &EmbeddingMap) -> Result<(Vec<PaperId>, DMatrix<f64>)> {
    let dim = vectors.values().next().map_or(0, Vec::len);
    if let Some((id, v)) = vectors.iter().find(|(_, v)| v.len() != dim) {
        return Err(Error::Config(format!(
            "embedding for '{id}' has {} components, expected {dim}",
            v.len()
        )));
    }
    let keys: Vec<PaperId> = vectors.keys().cloned().collect();
    let flat: Vec<f64> = vectors.values().flat_map(|v| v.iter().map(|&x| f64::from(x))).collect();
    let m = DMatrix::from_row_slice(keys.len(), dim, &flat);
    Ok((keys, m))
}

/// Inverse of `stack`.
pub fn unstack(keys: Vec<PaperId>, m: &DMatrix<f64>) -> EmbeddingMap {
    keys.into_iter()
        .enumerate()
        .map(|(i, k)| (k, m.row(i).iter().map(|&x| x as f32).collect()))
        .collect()
}
