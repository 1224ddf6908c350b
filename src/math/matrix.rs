/// Row-major dense matrix. The fully-connected layer keeps one row per neuron
/// and one column per incoming activation.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Vec<f64>>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![vec![0.0; cols]; rows],
        }
    }

    /// Wraps rows of equal length. An empty `data` gives a 0x0 matrix.
    pub fn from_data(data: Vec<Vec<f64>>) -> Matrix {
        Matrix {
            rows: data.len(),
            cols: data.first().map_or(0, Vec::len),
            data,
        }
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i]
    }

    pub fn fill(&mut self, value: f64) {
        for row in &mut self.data {
            row.iter_mut().for_each(|x| *x = value);
        }
    }

    pub fn map_in_place<F>(&mut self, functor: F)
    where
        F: Fn(f64) -> f64,
    {
        for row in &mut self.data {
            row.iter_mut().for_each(|x| *x = functor(*x));
        }
    }

    /// `self · v`, one entry per row.
    pub fn mul_vec(&self, v: &[f64]) -> Vec<f64> {
        self.data
            .iter()
            .map(|row| row.iter().zip(v).map(|(w, x)| w * x).sum())
            .collect()
    }

    /// `selfᵀ · v`, one entry per column.
    pub fn transpose_mul_vec(&self, v: &[f64]) -> Vec<f64> {
        let mut res = vec![0.0; self.cols];
        for (row, &scale) in self.data.iter().zip(v) {
            for (acc, w) in res.iter_mut().zip(row) {
                *acc += w * scale;
            }
        }
        res
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}
