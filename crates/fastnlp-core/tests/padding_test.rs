//! Integration tests for the padders.

use fastnlp_core::padders::{
    ArrayPadder, DType, ElementType, FieldKind, FieldValue, NumberPadder, Pad, Padder, PadderError, Scalar,
    SequencePadder,
};
use ndarray::{arr1, arr2};
use serde_json::json;

#[test]
fn test_number_padder_from_json_batch() {
    let batch: Vec<FieldValue> = [json!(1), json!(2), json!(3)].iter().map(FieldValue::from_json).collect();
    let padder = NumberPadder::new(Scalar::Int(0), Some(ElementType::parse("int")), None).unwrap();
    let padded = padder.pad(&batch).unwrap();
    assert_eq!(padded.shape(), &[3]);
    assert_eq!(padded.to_json(), json!([1, 2, 3]));
}

#[test]
fn test_sequence_padder_two_levels() {
    let batch = [FieldValue::from_json(&json!([1])), FieldValue::from_json(&json!([1, 2]))];
    let padder = SequencePadder::new(Scalar::Int(0), None, None).unwrap();
    assert_eq!(padder.pad(&batch).unwrap().to_json(), json!([[1, 0], [1, 2]]));
}

#[test]
fn test_sequence_padder_irregular_three_levels() {
    let batch = [
        FieldValue::from_json(&json!([[1, 2]])),
        FieldValue::from_json(&json!([[3], [4, 5, 6]])),
    ];
    let padder = SequencePadder::new(Scalar::Int(-1), None, Some(DType::Int32.into())).unwrap();
    let padded = padder.pad(&batch).unwrap();
    assert_eq!(padded.shape(), &[2, 2, 3]);
    assert_eq!(padded.dtype(), DType::Int32);
    assert_eq!(padded.to_json(), json!([[[1, 2, -1], [-1, -1, -1]], [[3, -1, -1], [4, 5, 6]]]));
}

#[test]
fn test_array_padder_different_extents() {
    let a = FieldValue::Array(arr1(&[1.5, 2.5]).mapv(Scalar::Float).into_dyn());
    let b = FieldValue::Array(arr1(&[3.5]).mapv(Scalar::Float).into_dyn());
    let padder = ArrayPadder::new(Scalar::Float(0.0), None, Some(ElementType::parse("float32"))).unwrap();
    let padded = padder.pad(&[a, b]).unwrap();
    assert_eq!(padded.get::<f32>().unwrap(), &arr2(&[[1.5_f32, 2.5], [3.5, 0.0]]).into_dyn());
}

#[test]
fn test_rectangular_lists_become_arrays() {
    let a = FieldValue::from_json(&json!([[1, 2], [3, 4]])).into_array().unwrap();
    let b = FieldValue::from_json(&json!([[5, 6, 7]])).into_array().unwrap();
    let padder = Padder::new(FieldKind::Array, Scalar::Int(0), None, None).unwrap();
    let padded = padder.pad(&[a.into(), b.into()]).unwrap();
    assert_eq!(padded.to_json(), json!([[[1, 2, 0], [3, 4, 0]], [[5, 6, 7], [0, 0, 0]]]));
}

#[test]
fn test_every_padder_rejects_string_dtypes() {
    for kind in [FieldKind::Number, FieldKind::Sequence, FieldKind::Array] {
        let err = Padder::new(kind, Scalar::Int(0), Some(ElementType::parse("str")), None).unwrap_err();
        assert!(matches!(err, PadderError::EleDtypeUnsupported { .. }), "{kind}: {err}");

        let err = Padder::new(kind, Scalar::Int(0), Some(ElementType::parse("int")), Some(ElementType::parse("str")))
            .unwrap_err();
        assert!(matches!(err, PadderError::DtypeUnsupported { .. }), "{kind}: {err}");
    }
}

#[test]
fn test_padding_does_not_mutate_input() {
    let batch = vec![FieldValue::from(vec![1, 2, 3]), FieldValue::from(vec![4])];
    let before = batch.clone();
    let padder = SequencePadder::new(Scalar::Int(0), None, None).unwrap();
    let first = padder.pad(&batch).unwrap();
    let second = padder.pad(&batch).unwrap();
    assert_eq!(batch, before);
    assert_eq!(first, second);
}

#[test]
fn test_inferred_dtypes() {
    let padder = SequencePadder::new(Scalar::Int(0), None, None).unwrap();
    let ints = padder.pad(&[FieldValue::from(vec![1, 2])]).unwrap();
    assert_eq!(ints.dtype(), DType::Int64);
    let floats = padder.pad(&[FieldValue::from(vec![1.0, 2.5])]).unwrap();
    assert_eq!(floats.dtype(), DType::Float64);
    let flags = padder.pad(&[FieldValue::from(vec![true, false])]).unwrap();
    assert_eq!(flags.dtype(), DType::Bool);
}
