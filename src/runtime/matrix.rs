//! Dense row-major matrices.
//!
//! Small and deliberately boring: enough linear algebra to back the `matrix`
//! and `transpose` builtins and the arithmetic operators. Sizes are checked
//! here, value-level coercions (lists as column vectors, scalars broadcast)
//! live in the operator code.

use crate::runtime::signal::Flow;
use crate::runtime::value::format_number;

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Builds from row data. Callers guarantee the rows are non-empty and of
    /// equal length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Matrix {
        let n = rows.len();
        let m = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(n * m);
        for row in &rows {
            data.extend_from_slice(row);
        }
        Matrix {
            rows: n,
            cols: m,
            data,
        }
    }

    /// A single-column matrix.
    pub fn column(values: Vec<f64>) -> Matrix {
        Matrix {
            rows: values.len(),
            cols: 1,
            data: values,
        }
    }

    pub fn identity(size: usize) -> Matrix {
        let mut m = Matrix::zeros(size, size);
        for i in 0..size {
            m.data[i * size + i] = 1.0;
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    /// Returns the previous value.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Option<f64> {
        if row < self.rows && col < self.cols {
            let slot = &mut self.data[row * self.cols + col];
            let old = *slot;
            *slot = value;
            Some(old)
        } else {
            None
        }
    }

    /// True when every entry is zero.
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|v| *v == 0.0)
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix, Flow> {
        self.zip(other, "add", |a, b| a + b)
    }

    pub fn subtract(&self, other: &Matrix) -> Result<Matrix, Flow> {
        self.zip(other, "subtract", |a, b| a - b)
    }

    fn zip(&self, other: &Matrix, verb: &str, f: impl Fn(f64, f64) -> f64) -> Result<Matrix, Flow> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(Flow::internal(format!("Cannot {verb} matrices of uneven sizes")));
        }
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| f(*a, *b))
            .collect();
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data,
        })
    }

    pub fn multiply(&self, other: &Matrix) -> Result<Matrix, Flow> {
        if self.cols != other.rows {
            return Err(Flow::internal(
                "When multiplying, the first matrix must have the same number of columns as the second's rows",
            ));
        }
        let mut out = Matrix::zeros(self.rows, other.cols);
        for r in 0..self.rows {
            for c in 0..other.cols {
                let mut acc = 0.0;
                for i in 0..self.cols {
                    acc += self.data[r * self.cols + i] * other.data[i * other.cols + c];
                }
                out.data[r * other.cols + c] = acc;
            }
        }
        Ok(out)
    }

    pub fn scale(&self, factor: f64) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|v| v * factor).collect(),
        }
    }

    pub fn transpose(&self) -> Matrix {
        let mut out = Matrix::zeros(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.data[c * self.rows + r] = self.data[r * self.cols + c];
            }
        }
        out
    }

    /// One bracketed line per row, entries padded to equal width.
    pub fn render(&self) -> String {
        let cells: Vec<String> = self.data.iter().map(|v| format_number(*v)).collect();
        let width = cells.iter().map(String::len).max().unwrap_or(0);
        let mut out = String::new();
        for r in 0..self.rows {
            let row: Vec<String> = cells[r * self.cols..(r + 1) * self.cols]
                .iter()
                .map(|c| format!("{c:>width$}"))
                .collect();
            out.push('[');
            out.push_str(&row.join(", "));
            out.push_str("]\n");
        }
        out
    }
}
