use nalgebra::{DMatrix, DVector, SymmetricEigen};

use arxmap_core::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct PcaOutput {
    /// `n x n_components` scores.
    pub projected: DMatrix<f64>,
    /// Variance along each returned component, descending.
    pub explained_variance: Vec<f64>,
    /// Share of total variance the returned components carry, in [0, 1].
    pub variance_ratio: f64,
}

/// Flip `v` so its largest-magnitude loading is positive.
fn fix_sign(v: &mut DVector<f64>) {
    let pivot = v.iter().copied().fold(0.0f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        v.neg_mut();
    }
}

fn descending_order(values: &DVector<f64>) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));
    idx
}

/// Project the rows of `x` onto its top `n_components` principal axes.
///
/// Uses the `d x d` covariance when there are at least as many rows as
/// columns, the `n x n` Gram matrix otherwise. Components beyond the rank of
/// the data come back as zero columns with zero variance.
pub fn fit_transform(x: &DMatrix<f64>, n_components: usize, whiten: bool) -> Result<PcaOutput> {
    let (n, d) = x.shape();
    if n == 0 || d == 0 {
        return Err(Error::Config("PCA needs a non-empty input matrix".into()));
    }
    let k = n_components.min(d);

    let mut xc = x.clone();
    for mut col in xc.column_iter_mut() {
        let mean = col.mean();
        col.add_scalar_mut(-mean);
    }
    let denom = (n.saturating_sub(1)).max(1) as f64;
    let total_variance = xc.norm_squared() / denom;

    let mut projected = DMatrix::zeros(n, k);
    let mut explained = vec![0.0; k];

    if n >= d {
        let cov = (xc.transpose() * &xc) / denom;
        let eig = SymmetricEigen::new(cov);
        for (c, &i) in descending_order(&eig.eigenvalues).iter().take(k).enumerate() {
            let mut v: DVector<f64> = eig.eigenvectors.column(i).into_owned();
            fix_sign(&mut v);
            projected.set_column(c, &(&xc * &v));
            explained[c] = eig.eigenvalues[i].max(0.0);
        }
    } else {
        let gram = &xc * xc.transpose();
        let eig = SymmetricEigen::new(gram);
        let largest = eig.eigenvalues.iter().copied().fold(0.0f64, f64::max);
        let tol = 1e-10 * largest.max(1.0);
        for (c, &i) in descending_order(&eig.eigenvalues).iter().take(k).enumerate() {
            let lambda = eig.eigenvalues[i];
            if lambda <= tol {
                continue;
            }
            let u = eig.eigenvectors.column(i);
            let mut v: DVector<f64> = (xc.transpose() * u) / lambda.sqrt();
            fix_sign(&mut v);
            projected.set_column(c, &(&xc * &v));
            explained[c] = lambda / denom;
        }
    }

    if whiten {
        for (c, &var) in explained.iter().enumerate() {
            if var > f64::EPSILON {
                let scale = var.sqrt();
                projected.column_mut(c).apply(|x| *x /= scale);
            }
        }
    }

    let variance_ratio = if total_variance > 0.0 {
        (explained.iter().sum::<f64>() / total_variance).clamp(0.0, 1.0)
    } else {
        0.0
    };
    Ok(PcaOutput { projected, explained_variance: explained, variance_ratio })
}
