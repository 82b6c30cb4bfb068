//! Matrix interchange tests: binary and CSV files.
//!
//! Run with: cargo test --test io_formats

use std::fs;

use ndarray::{array, Array2};
use nettrain::{read_binary, read_csv, remove_column, split_labels, write_binary, write_csv, TrainError};
use tempfile::tempdir;

fn sample() -> Array2<f32> {
    array![[1.5, -2.25, 0.0, 1e-6], [3.0, 4.125, -0.5, 123456.0], [f32::MIN_POSITIVE, 7.0, 8.5, -9.75]]
}

#[test]
fn test_binary_roundtrip_preserves_values() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("m.bin");

    write_binary(&path, &sample()).unwrap();
    assert_eq!(read_binary(&path).unwrap(), sample());
}

#[test]
fn test_binary_layout() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("m.bin");
    write_binary(&path, &array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 16 + 6 * 4);
    assert_eq!(i64::from_le_bytes(bytes[0..8].try_into().unwrap()), 2);
    assert_eq!(i64::from_le_bytes(bytes[8..16].try_into().unwrap()), 3);

    let payload: Vec<f32> = bytes[16..]
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
        .collect();
    assert_eq!(payload, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
}

#[test]
fn test_binary_empty_matrix() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.bin");
    let empty = Array2::<f32>::zeros((0, 5));

    write_binary(&path, &empty).unwrap();
    assert_eq!(read_binary(&path).unwrap().dim(), (0, 5));
}

#[test]
fn test_binary_rejects_truncated_payload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("short.bin");
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&2i64.to_le_bytes());
    bytes.extend_from_slice(&2i64.to_le_bytes());
    bytes.extend_from_slice(&1.0f32.to_le_bytes());
    fs::write(&path, bytes).unwrap();

    assert!(matches!(read_binary(&path), Err(TrainError::Parse(_))));
}

#[test]
fn test_binary_rejects_header_larger_than_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("huge.bin");
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&(1i64 << 29).to_le_bytes());
    bytes.extend_from_slice(&(1i64 << 29).to_le_bytes());
    bytes.extend_from_slice(&[0u8; 8]);
    fs::write(&path, bytes).unwrap();

    assert!(matches!(read_binary(&path), Err(TrainError::Parse(_))));
}

#[test]
fn test_csv_quoted_cells() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("quoted.csv");
    fs::write(&path, "\"1.5\",2\n3,\" 4 \"\n").unwrap();

    assert_eq!(read_csv(&path).unwrap(), array![[1.5, 2.0], [3.0, 4.0]]);
}

#[test]
fn test_binary_rejects_negative_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("neg.bin");
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&(-1i64).to_le_bytes());
    bytes.extend_from_slice(&1i64.to_le_bytes());
    fs::write(&path, bytes).unwrap();

    assert!(matches!(read_binary(&path), Err(TrainError::Parse(_))));
}

#[test]
fn test_binary_missing_file() {
    let dir = tempdir().unwrap();
    assert!(matches!(read_binary(dir.path().join("nope.bin")), Err(TrainError::Io(_))));
}

#[test]
fn test_csv_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("m.csv");

    write_csv(&path, &sample()).unwrap();
    assert_eq!(read_csv(&path).unwrap(), sample());

    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert!(text.lines().next().unwrap().starts_with("1.5,-2.25,0,"));
}

#[test]
fn test_csv_tolerates_spacing_and_blank_lines() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("loose.csv");
    fs::write(&path, "1, 2 ,3\n\n4,5,6\n\n").unwrap();

    assert_eq!(read_csv(&path).unwrap(), array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
}

#[test]
fn test_csv_rejects_ragged_rows() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ragged.csv");
    fs::write(&path, "1,2,3\n4,5\n").unwrap();

    let err = read_csv(&path).unwrap_err();
    assert!(err.to_string().contains("line 2"), "{err}");
}

#[test]
fn test_csv_rejects_non_numeric() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    fs::write(&path, "1,two,3\n").unwrap();

    assert!(matches!(read_csv(&path), Err(TrainError::Parse(_))));
}

#[test]
fn test_label_column_split() {
    // Typical dataset prep: last CSV column holds the label.
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.csv");
    fs::write(&path, "0,0,0\n0,1,1\n1,0,1\n1,1,0\n").unwrap();

    let mut table = read_csv(&path).unwrap();
    let labels = table.column(2).to_owned().insert_axis(ndarray::Axis(0));
    remove_column(&mut table, 2).unwrap();
    let inputs = table.reversed_axes();

    assert_eq!(inputs, array![[0.0, 0.0, 1.0, 1.0], [0.0, 1.0, 0.0, 1.0]]);
    assert_eq!(labels, array![[0.0, 1.0, 1.0, 0.0]]);
}

#[test]
fn test_split_labels() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.csv");
    fs::write(&path, "0,0,0\n0,1,1\n1,0,1\n1,1,0\n").unwrap();

    let (inputs, labels) = split_labels(read_csv(&path).unwrap()).unwrap();
    assert_eq!(inputs, array![[0.0, 0.0, 1.0, 1.0], [0.0, 1.0, 0.0, 1.0]]);
    assert_eq!(labels, array![[0.0, 1.0, 1.0, 0.0]]);
}

#[test]
fn test_split_labels_rejects_empty_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.csv");
    fs::write(&path, "").unwrap();

    let table = read_csv(&path).unwrap();
    assert_eq!(table.dim(), (0, 0));
    assert!(matches!(split_labels(table), Err(TrainError::ShapeMismatch { .. })));
}
