use test_case::test_case;

use crate::error::Error;
use crate::shape::*;

#[test_case(&[], 1; "scalar")]
#[test_case(&[3], 3; "vector")]
#[test_case(&[2, 3, 4], 24; "rank_3")]
#[test_case(&[5, 0], 0; "empty_axis")]
fn test_shape_size(shape: &[usize], expected: usize) {
    assert_eq!(shape_size(shape), expected);
}

#[test]
fn test_row_major_strides() {
    assert_eq!(row_major_strides(&[2, 3, 4]).as_slice(), &[12, 4, 1]);
    assert_eq!(row_major_strides(&[7]).as_slice(), &[1]);
    assert!(row_major_strides(&[]).is_empty());
}

#[test_case(&[0, 1, 2], 3, true; "identity")]
#[test_case(&[2, 0, 1], 3, true; "rotation")]
#[test_case(&[0, 0, 1], 3, false; "duplicate")]
#[test_case(&[0, 1], 3, false; "too_short")]
#[test_case(&[0, 3, 1], 3, false; "out_of_range")]
fn test_validate_permutation(order: &[usize], rank: usize, valid: bool) {
    let result = validate_permutation(order, rank);
    assert_eq!(result.is_ok(), valid);
    if !valid {
        assert!(matches!(result, Err(Error::InvalidPermutation { .. })));
    }
}

#[test]
fn test_invert_permutation_round_trips() {
    let order = [2, 0, 1];
    let inverse = invert_permutation(&order);
    let shape = [4, 5, 6];
    let permuted = permute_shape(&shape, &order);
    assert_eq!(permuted.as_slice(), &[6, 4, 5]);
    assert_eq!(permute_shape(&permuted, &inverse).as_slice(), &shape);
}

#[test_case(&[0, 2], 3, true; "increasing")]
#[test_case(&[], 0, true; "none")]
#[test_case(&[1, 1], 3, false; "repeated")]
#[test_case(&[2, 0], 3, false; "decreasing")]
#[test_case(&[3], 3, false; "out_of_range")]
fn test_validate_axes(axes: &[usize], rank: usize, valid: bool) {
    assert_eq!(validate_axes(axes, rank).is_ok(), valid);
}

#[test]
fn test_remove_axes() {
    assert_eq!(remove_axes(&[2, 3, 4, 5], &[1, 3]).as_slice(), &[2, 4]);
    assert_eq!(remove_axes(&[2, 3], &[]).as_slice(), &[2, 3]);
}

#[test]
fn test_ensure_same_shape_names_operation() {
    let err = ensure_same_shape("Concat", &[2, 3], &[2, 4]).unwrap_err();
    assert_eq!(err.to_string(), "Concat: expected shape [2, 3], got [2, 4]");
}

#[test]
fn test_tensor_type_display() {
    let ty = TensorType::new(kiln_dtype::DType::Float32, Shape::from_slice(&[2, 3]));
    assert_eq!(ty.to_string(), "f32[2, 3]");
    assert_eq!(ty.rank(), 2);
    assert_eq!(ty.element_count(), 6);
}
