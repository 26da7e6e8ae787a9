//! Hungarian algorithm for optimal assignment
//!
//! Shortest augmenting path formulation of Kuhn-Munkres with row and column
//! potentials, O(n³). Rectangular matrices are padded to square; entries that
//! are not finite mark forbidden pairs and are never returned as matches.

use nalgebra::DMatrix;

/// Hungarian algorithm result
#[derive(Debug, Clone, PartialEq)]
pub struct HungarianResult {
    /// `row_to_col[i]` is the column assigned to row `i`, if any
    pub row_to_col: Vec<Option<usize>>,
    /// Total cost of the returned (allowed) pairs
    pub cost: f64,
}

impl HungarianResult {
    /// Iterate over assigned `(row, col)` pairs in row order
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.row_to_col
            .iter()
            .enumerate()
            .filter_map(|(row, col)| col.map(|c| (row, c)))
    }

    /// Number of assigned pairs
    pub fn num_assigned(&self) -> usize {
        self.row_to_col.iter().filter(|c| c.is_some()).count()
    }
}

/// Hungarian algorithm for optimal assignment
///
/// Finds the minimum cost assignment in a bipartite graph. Rows are processed
/// in index order, so for a fixed matrix the result is deterministic; callers
/// that need a tie-breaking order (e.g. lowest track id) order the rows
/// accordingly.
///
/// # Arguments
/// * `cost` - Cost matrix (MxN). Use `f64::INFINITY` for impossible assignments.
///
/// # Returns
/// HungarianResult with the row-to-column mapping and total cost
pub fn hungarian(cost: &DMatrix<f64>) -> HungarianResult {
    let m = cost.nrows();
    let n = cost.ncols();

    if m == 0 || n == 0 {
        return HungarianResult {
            row_to_col: vec![None; m],
            cost: 0.0,
        };
    }

    // Forbidden pairs get a cost larger than any complete finite assignment
    let max_finite = cost
        .iter()
        .filter(|v| v.is_finite())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let size = m.max(n);
    let forbidden = (max_finite + 1.0) * (size as f64 + 1.0);

    let mut square = DMatrix::from_element(size, size, 0.0);
    for i in 0..m {
        for j in 0..n {
            let v = cost[(i, j)];
            square[(i, j)] = if v.is_finite() { v } else { forbidden };
        }
    }

    let assignment = solve_square(&square);

    let mut row_to_col = vec![None; m];
    let mut total = 0.0;
    for (i, slot) in row_to_col.iter_mut().enumerate() {
        let j = assignment[i];
        if j < n && cost[(i, j)].is_finite() {
            *slot = Some(j);
            total += cost[(i, j)];
        }
    }

    HungarianResult {
        row_to_col,
        cost: total,
    }
}

/// Solve a square assignment problem, returning the column for each row.
///
/// Uses 1-based potentials `u`, `v` and a virtual column 0, as in the classic
/// shortest augmenting path presentation.
fn solve_square(a: &DMatrix<f64>) -> Vec<usize> {
    let n = a.nrows();
    let mut u = vec![0.0_f64; n + 1];
    let mut v = vec![0.0_f64; n + 1];
    // p[j] = row (1-based) matched to column j; p[0] is the row being inserted
    let mut p = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;

            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let cur = a[(i0 - 1, j - 1)] - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        // Augment along the alternating path
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut row_to_col = vec![0usize; n];
    for j in 1..=n {
        if p[j] > 0 {
            row_to_col[p[j] - 1] = j - 1;
        }
    }
    row_to_col
}
