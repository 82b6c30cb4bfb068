//! Host matrix interchange: a compact binary format and CSV.
//!
//! # Binary layout
//!
//! | Offset | Size | Content |
//! |--------|------|---------|
//! | 0 | 8 | rows, little-endian `i64` |
//! | 8 | 8 | cols, little-endian `i64` |
//! | 16 | `4 * rows * cols` | f32 payload, little-endian, column-major |
//!
//! These are pass-through utilities; the trainer never reads or writes files.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use ndarray::{Array2, Axis, ShapeBuilder};

use crate::error::{TrainError, TrainResult};
use crate::matrix::checked_len;

const HEADER_FIELD: usize = std::mem::size_of::<i64>();

/// Writes `matrix` in the binary interchange format.
pub fn write_binary<P: AsRef<Path>>(path: P, matrix: &Array2<f32>) -> TrainResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    let (rows, cols) = matrix.dim();
    out.write_all(&(rows as i64).to_le_bytes())?;
    out.write_all(&(cols as i64).to_le_bytes())?;
    for v in matrix.t().iter() {
        out.write_all(&v.to_le_bytes())?;
    }
    out.flush()?;
    Ok(())
}

/// Reads a matrix written by [`write_binary`].
///
/// # Errors
///
/// Returns [`TrainError::Parse`] if the header is negative or the payload is
/// shorter than the header announces.
pub fn read_binary<P: AsRef<Path>>(path: P) -> TrainResult<Array2<f32>> {
    let file = File::open(path)?;
    let available = file.metadata()?.len().saturating_sub(2 * HEADER_FIELD as u64);
    let mut input = BufReader::new(file);

    let mut field = [0u8; HEADER_FIELD];
    input.read_exact(&mut field)?;
    let rows = header_dim(i64::from_le_bytes(field), "rows")?;
    input.read_exact(&mut field)?;
    let cols = header_dim(i64::from_le_bytes(field), "cols")?;

    let len = checked_len(rows, cols)?;
    let byte_len = len
        .checked_mul(std::mem::size_of::<f32>())
        .ok_or_else(|| TrainError::overflow(format!("{} x {} payload", rows, cols)))?;
    if byte_len as u64 > available {
        return Err(TrainError::parse(format!(
            "payload holds {} bytes, header announces {}",
            available, byte_len
        )));
    }
    let mut payload = Vec::with_capacity(byte_len);
    input.take(byte_len as u64).read_to_end(&mut payload)?;
    if payload.len() != byte_len {
        return Err(TrainError::parse(format!(
            "payload holds {} bytes, header announces {}",
            payload.len(),
            byte_len
        )));
    }

    let data: Vec<f32> = payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    let matrix = Array2::from_shape_vec((rows, cols).f(), data)?;
    Ok(matrix.as_standard_layout().into_owned())
}

fn header_dim(value: i64, name: &str) -> TrainResult<usize> {
    usize::try_from(value).map_err(|_| TrainError::parse(format!("invalid {} in header: {}", name, value)))
}

/// Writes `matrix` as CSV, one row per line, no header.
pub fn write_csv<P: AsRef<Path>>(path: P, matrix: &Array2<f32>) -> TrainResult<()> {
    let mut out = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    for row in matrix.rows() {
        out.write_record(row.iter().map(|v| v.to_string()))?;
    }
    out.flush()?;
    Ok(())
}

/// Reads a header-less CSV file of numbers into a matrix.
///
/// Cells are trimmed and blank lines are skipped.
///
/// # Errors
///
/// Returns [`TrainError::Parse`] on a non-numeric cell or ragged rows.
pub fn read_csv<P: AsRef<Path>>(path: P) -> TrainResult<Array2<f32>> {
    let mut input = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut data = Vec::new();
    let mut cols = None;
    let mut rows = 0usize;
    for record in input.records() {
        let record = record?;
        let line = record.position().map_or(rows as u64 + 1, |p| p.line());
        match cols {
            None => cols = Some(record.len()),
            Some(c) if c != record.len() => {
                return Err(TrainError::parse(format!(
                    "line {}: {} cells, expected {}",
                    line,
                    record.len(),
                    c
                )));
            }
            Some(_) => {}
        }
        for cell in record.iter() {
            let v: f32 = cell
                .parse()
                .map_err(|_| TrainError::parse(format!("line {}: '{}' is not a number", line, cell)))?;
            data.push(v);
        }
        rows += 1;
    }

    Ok(Array2::from_shape_vec((rows, cols.unwrap_or(0)), data)?)
}

/// Removes column `col` from `matrix`.
///
/// # Errors
///
/// Returns [`TrainError::ShapeMismatch`] if `col` is out of range.
pub fn remove_column(matrix: &mut Array2<f32>, col: usize) -> TrainResult<()> {
    let cols = matrix.ncols();
    if col >= cols {
        return Err(TrainError::shape_mismatch(&[matrix.nrows(), col + 1], &[matrix.nrows(), cols]));
    }
    let keep: Vec<usize> = (0..cols).filter(|&c| c != col).collect();
    *matrix = matrix.select(Axis(1), &keep);
    Ok(())
}

/// Splits a table of examples, one per row with the label last, into
/// column-per-example inputs and a `1 × n` label row.
///
/// # Errors
///
/// Returns [`TrainError::ShapeMismatch`] if the table has no rows or fewer
/// than two columns.
pub fn split_labels(mut table: Array2<f32>) -> TrainResult<(Array2<f32>, Array2<f32>)> {
    if table.nrows() == 0 || table.ncols() < 2 {
        return Err(TrainError::shape_mismatch(&[table.nrows().max(1), 2], &[table.nrows(), table.ncols()]));
    }
    let label_col = table.ncols() - 1;
    let labels = table.column(label_col).to_owned().insert_axis(Axis(0));
    remove_column(&mut table, label_col)?;
    Ok((table.reversed_axes().as_standard_layout().into_owned(), labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_remove_column() {
        let mut m = array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        remove_column(&mut m, 1).unwrap();
        assert_eq!(m, array![[1.0, 3.0], [4.0, 6.0]]);

        remove_column(&mut m, 1).unwrap();
        assert_eq!(m, array![[1.0], [4.0]]);
        assert!(remove_column(&mut m, 1).is_err());
    }

    #[test]
    fn test_split_labels_rejects_narrow_tables() {
        assert!(split_labels(Array2::zeros((0, 3))).is_err());
        assert!(split_labels(Array2::zeros((4, 1))).is_err());
        assert!(split_labels(Array2::zeros((0, 0))).is_err());
    }

    #[test]
    fn test_header_dim_rejects_negative() {
        assert!(header_dim(-1, "rows").is_err());
        assert_eq!(header_dim(12, "rows").unwrap(), 12);
    }
}
