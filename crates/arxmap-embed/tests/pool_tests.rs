use candle_core::{DType, Device, Tensor};
use arxmap_embed::masked_mean_l2;

#[test]
fn masked_mean_l2_ignores_padding() {
    let dev = Device::Cpu;
    // Row 0: second token masked. Row 1: both tokens live.
    let h = Tensor::from_slice(
        &[
            3.0f32, 4.0, 0.0, //
            9.0, 9.0, 9.0, //
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0,
        ],
        (2, 2, 3),
        &dev,
    )
    .unwrap();
    let mask = Tensor::from_slice(&[1u32, 0, 1, 1], (2, 2), &dev)
        .unwrap()
        .to_dtype(DType::F32)
        .unwrap();

    let out: Vec<Vec<f32>> = masked_mean_l2(&h, &mask).unwrap().to_vec2().unwrap();

    let expected = [[0.6f32, 0.8, 0.0], [0.5f32.sqrt(), 0.5f32.sqrt(), 0.0]];
    for (row, exp) in out.iter().zip(expected.iter()) {
        for (a, b) in row.iter().zip(exp.iter()) {
            assert!((a - b).abs() < 1e-5, "a={a} b={b}");
        }
    }
}

#[test]
fn rejects_two_dimensional_hidden_states() {
    let dev = Device::Cpu;
    let h = Tensor::zeros((2, 3), DType::F32, &dev).unwrap();
    let mask = Tensor::ones((2, 1), DType::F32, &dev).unwrap();
    assert!(masked_mean_l2(&h, &mask).is_err());
}
