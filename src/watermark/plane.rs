//! Dense 2D plane of real-valued samples.
//!
//! Data is stored in row-major order as Vec<f64> of length rows*cols.

use super::error::WatermarkError;
use super::Result;

#[derive(Clone, Debug, PartialEq)]
pub struct Plane {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Plane {
    /// All-zero plane.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self { rows, cols, data }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        let cols = self.cols;
        &mut self.data[row * cols..(row + 1) * cols]
    }

    /// Copy of one column.
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.get(r, col)).collect()
    }

    pub fn set_column(&mut self, col: usize, values: &[f64]) {
        debug_assert_eq!(values.len(), self.rows);
        for (r, &v) in values.iter().enumerate() {
            self.set(r, col, v);
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Copy of the `rows × cols` window whose top-left corner is `(row, col)`.
    pub fn sub_plane(&self, row: usize, col: usize, rows: usize, cols: usize) -> Plane {
        Plane::from_fn(rows, cols, |r, c| self.get(row + r, col + c))
    }

    /// Write `src` into this plane with its top-left corner at `(row, col)`.
    pub fn paste(&mut self, src: &Plane, row: usize, col: usize) {
        for r in 0..src.rows {
            let dst = row + r;
            self.row_mut(dst)[col..col + src.cols].copy_from_slice(src.row(r));
        }
    }

    pub(crate) fn ensure_same_shape(&self, other: &Plane) -> Result<()> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(WatermarkError::ShapeMismatch {
                left_rows: self.rows,
                left_cols: self.cols,
                right_rows: other.rows,
                right_cols: other.cols,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_plane_and_paste() {
        let p = Plane::from_fn(4, 4, |r, c| (r * 4 + c) as f64);
        let q = p.sub_plane(2, 2, 2, 2);
        assert_eq!(q.as_slice(), &[10.0, 11.0, 14.0, 15.0]);

        let mut z = Plane::zeros(4, 4);
        z.paste(&q, 0, 0);
        assert_eq!(z.row(0), &[10.0, 11.0, 0.0, 0.0]);
        assert_eq!(z.row(1), &[14.0, 15.0, 0.0, 0.0]);
    }

    #[test]
    fn test_column_roundtrip() {
        let mut p = Plane::zeros(3, 2);
        p.set_column(1, &[1.0, 2.0, 3.0]);
        assert_eq!(p.column(1), vec![1.0, 2.0, 3.0]);
        assert_eq!(p.column(0), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Plane::zeros(2, 2);
        let b = Plane::zeros(2, 3);
        assert!(a.ensure_same_shape(&b).is_err());
        assert!(a.ensure_same_shape(&a.clone()).is_ok());
    }
}
