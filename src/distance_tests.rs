use super::*;

#[test]
fn l2_matches_known_values() {
    let a = [0.0, 0.0];
    let b = [3.0, 4.0];
    assert!((l2(&a, &b) - 25.0).abs() < 1e-6);
}

#[test]
fn inner_product_is_negated_dot() {
    let a = [1.0, 2.0, 3.0];
    let b = [4.0, 5.0, 6.0];
    assert!((inner_product(&a, &b) - -32.0).abs() < 1e-6);
}

#[test]
fn cosine_self_distance_is_zero() {
    let v = [1.0, 2.0, -3.0, 0.5];
    assert!(cosine(&v, &v).abs() < 1e-6);
}

#[test]
fn cosine_orthogonal_vectors_distance_one() {
    let a = [1.0, 0.0];
    let b = [0.0, 1.0];
    assert!((cosine(&a, &b) - 1.0).abs() < 1e-6);
}

#[test]
fn cosine_is_symmetric() {
    let a = [1.0, 2.0, 3.0];
    let b = [-1.0, 0.5, 2.0];
    assert!((cosine(&a, &b) - cosine(&b, &a)).abs() < 1e-6);
}

#[test]
fn l2_is_symmetric() {
    let a = [1.0, 2.0, 3.0];
    let b = [-1.0, 0.5, 2.0];
    assert!((l2(&a, &b) - l2(&b, &a)).abs() < 1e-6);
}

#[test]
fn cosine_zero_vector_is_max_distance() {
    let a = [0.0, 0.0, 0.0];
    let b = [1.0, 1.0, 1.0];
    assert!((cosine(&a, &b) - 2.0).abs() < 1e-6);
}

#[test]
fn dimension_mismatch_is_invalid() {
    let a = [1.0, 2.0];
    let b = [1.0, 2.0, 3.0];
    let err = distance(DistanceMetric::L2, &a, &b).unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
}

#[test]
fn simd_path_agrees_with_scalar_path() {
    let a: Vec<f32> = (0..37).map(|i| i as f32 * 0.37).collect();
    let b: Vec<f32> = (0..37).map(|i| (i as f32 * 0.11).sin()).collect();
    let scalar = l2(&a, &b);
    let simd = l2_simd(&a, &b);
    let tol = 1e-3 * a.len() as f32;
    assert!((scalar - simd).abs() < tol, "{scalar} vs {simd}");
}

#[test]
fn normalize_produces_unit_length() {
    let mut v = vec![3.0, 4.0];
    normalize(&mut v);
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-6);
}

#[test]
fn normalize_zero_vector_is_noop() {
    let mut v = vec![0.0, 0.0];
    normalize(&mut v);
    assert_eq!(v, vec![0.0, 0.0]);
}

#[test]
fn all_finite_rejects_nan_and_inf() {
    assert!(all_finite(&[1.0, 2.0, -3.5]));
    assert!(!all_finite(&[1.0, f32::NAN]));
    assert!(!all_finite(&[1.0, f32::INFINITY]));
    assert!(!all_finite(&[f32::NEG_INFINITY]));
}

#[test]
fn from_str_parses_known_metrics() {
    assert_eq!("cosine".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cosine);
    assert_eq!("l2".parse::<DistanceMetric>().unwrap(), DistanceMetric::L2);
    assert_eq!(
        "inner_product".parse::<DistanceMetric>().unwrap(),
        DistanceMetric::InnerProduct
    );
    assert!("bogus".parse::<DistanceMetric>().is_err());
}
