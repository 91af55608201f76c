use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Pivots smaller than this fraction of the largest matrix entry count as zero.
const SINGULAR_TOLERANCE: f64 = 1e-12;

pub struct MatrixHelper;

impl MatrixHelper {
    /// Ordinary least squares: minimises `|Xβ - y|²`.
    pub fn least_squares(design: ArrayView2<f64>, target: ArrayView1<f64>) -> Option<Array1<f64>> {
        let penalty = Array1::zeros(design.ncols());
        Self::penalized_least_squares(design, target, penalty.view())
    }

    /// Ridge-style least squares: solves `(XᵀX + diag(penalty)) β = Xᵀy`.
    ///
    /// Returns `None` when the system is singular or the solution is not finite.
    pub fn penalized_least_squares(
        design: ArrayView2<f64>,
        target: ArrayView1<f64>,
        penalty: ArrayView1<f64>,
    ) -> Option<Array1<f64>> {
        if design.nrows() != target.len() || design.ncols() != penalty.len() {
            return None;
        }

        let mut gram = design.t().dot(&design);
        for (idx, weight) in penalty.iter().enumerate() {
            gram[[idx, idx]] += weight;
        }
        let rhs = design.t().dot(&target);
        Self::solve(gram, rhs)
    }

    /// Solves a square system with Gaussian elimination and partial pivoting.
    pub fn solve(mut lhs: Array2<f64>, mut rhs: Array1<f64>) -> Option<Array1<f64>> {
        let n = rhs.len();
        if lhs.nrows() != n || lhs.ncols() != n || n == 0 {
            return None;
        }

        let scale = lhs.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if scale == 0.0 || !scale.is_finite() {
            return None;
        }

        for col in 0..n {
            let pivot_row = (col..n)
                .max_by(|&i, &j| lhs[[i, col]].abs().total_cmp(&lhs[[j, col]].abs()))?;
            if lhs[[pivot_row, col]].abs() <= SINGULAR_TOLERANCE * scale {
                return None;
            }
            if pivot_row != col {
                for k in 0..n {
                    lhs.swap([col, k], [pivot_row, k]);
                }
                rhs.swap(col, pivot_row);
            }

            for row in col + 1..n {
                let factor = lhs[[row, col]] / lhs[[col, col]];
                if factor == 0.0 {
                    continue;
                }
                for k in col..n {
                    lhs[[row, k]] -= factor * lhs[[col, k]];
                }
                rhs[row] -= factor * rhs[col];
            }
        }

        let mut solution = Array1::<f64>::zeros(n);
        for row in (0..n).rev() {
            let mut acc = rhs[row];
            for k in row + 1..n {
                acc -= lhs[[row, k]] * solution[k];
            }
            solution[row] = acc / lhs[[row, row]];
        }

        if solution.iter().all(|v| v.is_finite()) {
            Some(solution)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn solve_handles_row_swaps() {
        let lhs = array![[0.0, 1.0], [2.0, 0.0]];
        let rhs = array![3.0, 4.0];
        let solution = MatrixHelper::solve(lhs, rhs).unwrap();
        assert!((solution[0] - 2.0).abs() < 1e-12);
        assert!((solution[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn solve_rejects_singular_system() {
        let lhs = array![[1.0, 2.0], [2.0, 4.0]];
        let rhs = array![1.0, 2.0];
        assert!(MatrixHelper::solve(lhs, rhs).is_none());
    }

    #[test]
    fn least_squares_recovers_line() {
        let design = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let target = array![1.0, 3.0, 5.0, 7.0];
        let beta = MatrixHelper::least_squares(design.view(), target.view()).unwrap();
        assert!((beta[0] - 1.0).abs() < 1e-9);
        assert!((beta[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn penalty_shrinks_coefficients() {
        let design = array![[1.0], [1.0], [1.0]];
        let target = array![3.0, 3.0, 3.0];
        let plain = MatrixHelper::least_squares(design.view(), target.view()).unwrap();
        let shrunk = MatrixHelper::penalized_least_squares(
            design.view(),
            target.view(),
            array![3.0].view(),
        )
        .unwrap();
        assert!((plain[0] - 3.0).abs() < 1e-12);
        assert!((shrunk[0] - 1.5).abs() < 1e-12);
    }
}
