use super::*;

fn sample() -> Vec<Vec<f32>> {
    vec![
        vec![0.0, -1.0, 10.0],
        vec![1.0, 0.0, 20.0],
        vec![2.0, 1.0, 30.0],
    ]
}

#[test]
fn encode_before_train_is_invalid() {
    let q = ScalarQuantizer::new();
    assert!(matches!(q.encode(&[1.0, 2.0, 3.0]), Err(Error::Invalid(_))));
}

#[test]
fn train_rejects_empty_sample() {
    let mut q = ScalarQuantizer::new();
    assert!(matches!(q.train(&[]), Err(Error::Invalid(_))));
}

#[test]
fn train_rejects_inconsistent_lengths() {
    let mut q = ScalarQuantizer::new();
    assert!(matches!(
        q.train(&[vec![1.0, 2.0], vec![1.0]]),
        Err(Error::Invalid(_))
    ));
}

#[test]
fn roundtrip_is_approximately_lossless() {
    let mut q = ScalarQuantizer::new();
    q.train(&sample()).unwrap();
    for v in sample() {
        let code = q.encode(&v).unwrap();
        let back = q.decode(&code).unwrap();
        for (a, b) in v.iter().zip(&back) {
            assert!((a - b).abs() < 0.2, "{a} vs {b}");
        }
    }
}

#[test]
fn encode_rejects_wrong_dimension() {
    let mut q = ScalarQuantizer::new();
    q.train(&sample()).unwrap();
    assert!(matches!(q.encode(&[1.0, 2.0]), Err(Error::Invalid(_))));
}

#[test]
fn distance_is_zero_for_exact_trained_points() {
    let mut q = ScalarQuantizer::new();
    q.train(&sample()).unwrap();
    let v = &sample()[0];
    let code = q.encode(v).unwrap();
    let d = q.distance(v, &code).unwrap();
    assert!(d < 0.5, "distance was {d}");
}

#[test]
fn constant_dimension_does_not_divide_by_zero() {
    let mut q = ScalarQuantizer::new();
    q.train(&[vec![5.0, 1.0], vec![5.0, 2.0], vec![5.0, 3.0]]).unwrap();
    let code = q.encode(&[5.0, 2.0]).unwrap();
    let back = q.decode(&code).unwrap();
    assert!((back[0] - 5.0).abs() < 1e-3);
}

#[test]
fn stats_report_compression_ratio() {
    let mut q = ScalarQuantizer::new();
    q.train(&sample()).unwrap();
    let stats = q.stats();
    assert_eq!(stats.bytes_per_code, 3);
    assert_eq!(stats.bytes_per_raw_vector, 12);
    assert!((stats.compression_ratio() - 4.0).abs() < 1e-9);
}
