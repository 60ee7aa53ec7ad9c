use super::*;

#[test]
fn fresh_layer_has_no_neighbors() {
    let layer = Layer::new(4);
    assert!(layer.get_neighbors(2).is_empty());
}

#[test]
fn set_then_get_roundtrips() {
    let mut layer = Layer::new(4);
    layer.set_neighbors(1, vec![0, 2, 3]);
    assert_eq!(layer.get_neighbors(1), &[0, 2, 3]);
}

#[test]
fn ensure_capacity_grows_without_losing_existing_entries() {
    let mut layer = Layer::new(2);
    layer.set_neighbors(1, vec![0]);
    layer.ensure_capacity(10);
    assert_eq!(layer.get_neighbors(1), &[0]);
    assert!(layer.get_neighbors(10).is_empty());
}

#[test]
fn get_neighbors_out_of_bounds_is_empty_not_panic() {
    let layer = Layer::new(1);
    assert!(layer.get_neighbors(99).is_empty());
}

#[test]
fn set_neighbors_beyond_capacity_grows_layer() {
    let mut layer = Layer::new(1);
    layer.set_neighbors(5, vec![1, 2]);
    assert_eq!(layer.get_neighbors(5), &[1, 2]);
}
