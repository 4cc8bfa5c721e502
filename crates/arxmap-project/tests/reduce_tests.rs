use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use arxmap_core::types::EmbeddingMap;
use arxmap_core::Error;
use arxmap_project::{normalize, reduce, Metric, NormalizationMethod, ReduceParams, ReductionMethod, UmapParams};

/// Two blobs of `per_cluster` points in `dim` dimensions, far apart.
fn clusters(per_cluster: usize, dim: usize) -> EmbeddingMap {
    let mut rng = StdRng::seed_from_u64(7);
    let mut map = EmbeddingMap::new();
    for c in 0..2 {
        for i in 0..per_cluster {
            let v: Vec<f32> = (0..dim)
                .map(|d| {
                    let centre = if (d % 2 == 0) == (c == 0) { 5.0 } else { -5.0 };
                    centre + rng.gen_range(-0.5f32..0.5)
                })
                .collect();
            map.insert(format!("paper-{c}-{i:02}"), v);
        }
    }
    map
}

fn fast_params() -> ReduceParams {
    ReduceParams {
        umap: UmapParams { n_neighbors: 5, n_epochs: Some(60), metric: Metric::Euclidean, ..UmapParams::default() },
        whiten: false,
        pca_components: 4,
    }
}

#[test]
fn every_method_preserves_keys() {
    let input = clusters(10, 8);
    for method in [ReductionMethod::Pca, ReductionMethod::Umap, ReductionMethod::PcaUmap] {
        let out = reduce(&input, method, &fast_params()).expect("reduce");
        assert_eq!(out.keys().collect::<Vec<_>>(), input.keys().collect::<Vec<_>>(), "{method:?}");
        assert!(out.values().all(|p| p.iter().all(|c| c.is_finite())), "{method:?}");
    }
}

#[test]
fn pca_on_two_one_hot_vectors() {
    let mut a = vec![0.0f32; 1024];
    a[0] = 1.0;
    let mut b = vec![0.0f32; 1024];
    b[1] = 1.0;
    let input: EmbeddingMap = [("A".to_string(), a), ("B".to_string(), b)].into_iter().collect();

    let out = reduce(&input, ReductionMethod::Pca, &ReduceParams::default()).expect("pca");

    assert_eq!(out.keys().cloned().collect::<Vec<_>>(), vec!["A".to_string(), "B".to_string()]);
    assert!(out.values().all(|p| p.iter().all(|c| c.is_finite())));
    assert!((out["A"][0] + out["B"][0]).abs() < 1e-6, "points sit symmetric about the mean");
}

#[test]
fn umap_is_deterministic_for_a_seed() {
    let input = clusters(8, 6);
    let params = fast_params();
    let first = reduce(&input, ReductionMethod::Umap, &params).unwrap();
    let second = reduce(&input, ReductionMethod::Umap, &params).unwrap();
    assert_eq!(first, second);

    let other_seed = ReduceParams { umap: UmapParams { random_state: 1, ..params.umap.clone() }, ..params };
    let third = reduce(&input, ReductionMethod::Umap, &other_seed).unwrap();
    assert_ne!(first, third);
}

#[test]
fn umap_keeps_clusters_apart() {
    let input = clusters(12, 10);
    let out = reduce(&input, ReductionMethod::Umap, &ReduceParams { umap: UmapParams { n_neighbors: 5, n_epochs: Some(200), ..UmapParams::default() }, ..ReduceParams::default() })
        .unwrap();

    let centroid = |prefix: &str| -> [f32; 3] {
        let pts: Vec<&[f32; 3]> = out.iter().filter(|(k, _)| k.starts_with(prefix)).map(|(_, v)| v).collect();
        let mut c = [0.0; 3];
        for p in &pts {
            for d in 0..3 {
                c[d] += p[d] / pts.len() as f32;
            }
        }
        c
    };
    let dist = |a: &[f32; 3], b: &[f32; 3]| a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt();
    let (c0, c1) = (centroid("paper-0"), centroid("paper-1"));
    let spread0 = out.iter().filter(|(k, _)| k.starts_with("paper-0")).map(|(_, v)| dist(v, &c0)).fold(0.0f32, f32::max);
    assert!(dist(&c0, &c1) > spread0, "between={} within={}", dist(&c0, &c1), spread0);
}

#[test]
fn invalid_inputs_are_config_errors() {
    let empty = EmbeddingMap::new();
    assert!(matches!(reduce(&empty, ReductionMethod::Pca, &ReduceParams::default()), Err(Error::Config(_))));

    let short: EmbeddingMap = [("a".to_string(), vec![1.0, 2.0]), ("b".to_string(), vec![3.0, 4.0])].into_iter().collect();
    assert!(matches!(reduce(&short, ReductionMethod::Pca, &ReduceParams::default()), Err(Error::Config(_))));

    let input = clusters(3, 4);
    let mut params = fast_params();
    params.umap.n_neighbors = 1;
    assert!(matches!(reduce(&input, ReductionMethod::Umap, &params), Err(Error::Config(_))));
    params.umap.n_neighbors = 15;
    assert!(matches!(reduce(&input, ReductionMethod::Umap, &params), Err(Error::Config(_))));

    assert!(matches!("tsne".parse::<ReductionMethod>(), Err(Error::Config(_))));
    assert!(matches!("zscore".parse::<NormalizationMethod>(), Err(Error::Config(_))));
    assert!(matches!("hamming".parse::<Metric>(), Err(Error::Config(_))));
}

#[test]
fn normalize_preserves_keys_and_rejects_ragged_input() {
    let input = clusters(4, 5);
    for method in [NormalizationMethod::Standard, NormalizationMethod::MinMax, NormalizationMethod::L2] {
        let out = normalize(&input, method).unwrap();
        assert_eq!(out.keys().collect::<Vec<_>>(), input.keys().collect::<Vec<_>>());
        assert!(out.values().all(|v| v.len() == 5));
    }
    let l2 = normalize(&input, NormalizationMethod::L2).unwrap();
    let norm: f32 = l2.values().next().unwrap().iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);

    let ragged: EmbeddingMap = [("a".to_string(), vec![1.0, 2.0, 3.0]), ("b".to_string(), vec![1.0])].into_iter().collect();
    assert!(matches!(normalize(&ragged, NormalizationMethod::Standard), Err(Error::Config(_))));
}
