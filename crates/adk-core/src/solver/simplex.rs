//! Dense two-phase primal simplex.
//!
//! Variables with arbitrary (possibly missing) bounds are mapped onto
//! non-negative columns, finite upper bounds become explicit rows, and the
//! tableau is pivoted with Bland's rule so the pivot sequence (and therefore
//! the solution) is a pure function of the input.

use crate::canonical::CanonicalModel;
use crate::domain::model::{Relation, Sense};
use crate::solver::Deadline;

const PIVOT_EPS: f64 = 1e-9;
const PHASE_ONE_TOL: f64 = 1e-7;

/// One row `sum(coefs) <relation> rhs` over original variable indices.
#[derive(Debug, Clone, PartialEq)]
pub struct LpRow {
    pub coefs: Vec<(usize, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

/// `minimize costs·x + constant` subject to rows and per-variable bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProgram {
    pub costs: Vec<f64>,
    pub constant: f64,
    pub lower: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
    pub rows: Vec<LpRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LpOutcome {
    /// `objective` is in minimization form, constant included.
    Optimal { values: Vec<f64>, objective: f64 },
    Infeasible,
    Unbounded,
    Timeout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution {
    pub outcome: LpOutcome,
    pub pivots: u64,
}

/// How an original variable is expressed in non-negative tableau columns.
#[derive(Debug, Clone, Copy)]
enum Column {
    /// `x = offset + y`
    Shift { col: usize, offset: f64 },
    /// `x = offset - y`
    Mirror { col: usize, offset: f64 },
    /// `x = y_pos - y_neg`
    Split { pos: usize, neg: usize },
}

impl LinearProgram {
    /// LP relaxation of a canonical model, objective in minimization form.
    pub fn relaxation(model: &CanonicalModel) -> Self {
        let n = model.num_variables();
        let sign = match model.objective().sense {
            Sense::Minimize => 1.0,
            Sense::Maximize => -1.0,
        };
        let mut costs = vec![0.0; n];
        for t in &model.objective().terms {
            costs[t.index] += sign * t.coef;
        }
        let rows = model
            .constraints()
            .iter()
            .map(|c| LpRow {
                coefs: c.terms.iter().map(|t| (t.index, t.coef)).collect(),
                relation: c.relation,
                rhs: c.rhs,
            })
            .collect();
        Self {
            costs,
            constant: sign * model.objective().constant,
            lower: model.variables().iter().map(|v| v.lower).collect(),
            upper: model.variables().iter().map(|v| v.upper).collect(),
            rows,
        }
    }

    /// Solve, checking `deadline` before every pivot.
    pub fn solve(&self, deadline: &Deadline, max_pivots: u64) -> LpSolution {
        let mut tableau = match Tableau::build(self) {
            Some(t) => t,
            None => {
                return LpSolution {
                    outcome: LpOutcome::Infeasible,
                    pivots: 0,
                }
            }
        };
        let outcome = tableau.run(deadline, max_pivots);
        let outcome = match outcome {
            Phase::Optimal => {
                let values = tableau.values();
                let objective = self.constant
                    + self
                        .costs
                        .iter()
                        .zip(&values)
                        .map(|(c, x)| c * x)
                        .sum::<f64>();
                LpOutcome::Optimal { values, objective }
            }
            Phase::Infeasible => LpOutcome::Infeasible,
            Phase::Unbounded => LpOutcome::Unbounded,
            Phase::Timeout => LpOutcome::Timeout,
        };
        LpSolution {
            outcome,
            pivots: tableau.pivots,
        }
    }
}

enum Phase {
    Optimal,
    Infeasible,
    Unbounded,
    Timeout,
}

struct Tableau {
    /// `rows x width`; the last column holds the right-hand side.
    cells: Vec<Vec<f64>>,
    basis: Vec<usize>,
    columns: Vec<Column>,
    structural: usize,
    artificial_start: usize,
    width: usize,
    costs: Vec<f64>,
    pivots: u64,
}

impl Tableau {
    /// Returns `None` when a variable's bounds are already inverted.
    fn build(lp: &LinearProgram) -> Option<Self> {
        let n = lp.costs.len();
        let mut columns = Vec::with_capacity(n);
        let mut bound_rows = Vec::new();
        let mut structural = 0usize;
        for j in 0..n {
            match (lp.lower[j], lp.upper[j]) {
                (Some(l), upper) => {
                    if let Some(u) = upper {
                        if l > u {
                            return None;
                        }
                        bound_rows.push((structural, u - l));
                    }
                    columns.push(Column::Shift {
                        col: structural,
                        offset: l,
                    });
                    structural += 1;
                }
                (None, Some(u)) => {
                    columns.push(Column::Mirror {
                        col: structural,
                        offset: u,
                    });
                    structural += 1;
                }
                (None, None) => {
                    columns.push(Column::Split {
                        pos: structural,
                        neg: structural + 1,
                    });
                    structural += 2;
                }
            }
        }

        let mut costs = vec![0.0; structural];
        for (j, &c) in lp.costs.iter().enumerate() {
            match columns[j] {
                Column::Shift { col, .. } => costs[col] += c,
                Column::Mirror { col, .. } => costs[col] -= c,
                Column::Split { pos, neg } => {
                    costs[pos] += c;
                    costs[neg] -= c;
                }
            }
        }

        // Rows over structural columns with non-negative right-hand sides.
        let mut rows: Vec<(Vec<f64>, Relation, f64)> = Vec::new();
        for row in &lp.rows {
            let mut dense = vec![0.0; structural];
            let mut rhs = row.rhs;
            for &(j, a) in &row.coefs {
                match columns[j] {
                    Column::Shift { col, offset } => {
                        dense[col] += a;
                        rhs -= a * offset;
                    }
                    Column::Mirror { col, offset } => {
                        dense[col] -= a;
                        rhs -= a * offset;
                    }
                    Column::Split { pos, neg } => {
                        dense[pos] += a;
                        dense[neg] -= a;
                    }
                }
            }
            rows.push((dense, row.relation, rhs));
        }
        for (col, span) in bound_rows {
            let mut dense = vec![0.0; structural];
            dense[col] = 1.0;
            rows.push((dense, Relation::Le, span));
        }
        for (dense, relation, rhs) in rows.iter_mut() {
            if *rhs < 0.0 {
                dense.iter_mut().for_each(|a| *a = -*a);
                *rhs = -*rhs;
                *relation = match relation {
                    Relation::Le => Relation::Ge,
                    Relation::Ge => Relation::Le,
                    Relation::Eq => Relation::Eq,
                };
            }
        }

        let slacks = rows
            .iter()
            .filter(|(_, r, _)| matches!(r, Relation::Le | Relation::Ge))
            .count();
        let artificials = rows
            .iter()
            .filter(|(_, r, _)| matches!(r, Relation::Ge | Relation::Eq))
            .count();
        let artificial_start = structural + slacks;
        let width = artificial_start + artificials + 1;

        let mut cells = Vec::with_capacity(rows.len());
        let mut basis = Vec::with_capacity(rows.len());
        let mut next_slack = structural;
        let mut next_artificial = artificial_start;
        for (dense, relation, rhs) in rows {
            let mut cellrow = vec![0.0; width];
            cellrow[..structural].copy_from_slice(&dense);
            cellrow[width - 1] = rhs;
            match relation {
                Relation::Le => {
                    cellrow[next_slack] = 1.0;
                    basis.push(next_slack);
                    next_slack += 1;
                }
                Relation::Ge => {
                    cellrow[next_slack] = -1.0;
                    next_slack += 1;
                    cellrow[next_artificial] = 1.0;
                    basis.push(next_artificial);
                    next_artificial += 1;
                }
                Relation::Eq => {
                    cellrow[next_artificial] = 1.0;
                    basis.push(next_artificial);
                    next_artificial += 1;
                }
            }
            cells.push(cellrow);
        }

        Some(Self {
            cells,
            basis,
            columns,
            structural,
            artificial_start,
            width,
            costs,
            pivots: 0,
        })
    }

    fn rhs(&self) -> usize {
        self.width - 1
    }

    fn run(&mut self, deadline: &Deadline, max_pivots: u64) -> Phase {
        if self.artificial_start + 1 < self.width {
            // Phase one: minimise the sum of artificials.
            let mut reduced = vec![0.0; self.width];
            for j in self.artificial_start..self.rhs() {
                reduced[j] = 1.0;
            }
            for i in 0..self.cells.len() {
                if self.basis[i] >= self.artificial_start {
                    for j in 0..self.width {
                        reduced[j] -= self.cells[i][j];
                    }
                }
            }
            match self.iterate(&mut reduced, self.rhs(), deadline, max_pivots) {
                Phase::Optimal => {}
                Phase::Unbounded => return Phase::Infeasible,
                other => return other,
            }
            if -reduced[self.rhs()] > PHASE_ONE_TOL {
                return Phase::Infeasible;
            }
            self.drive_out_artificials();
        }

        let mut reduced = vec![0.0; self.width];
        reduced[..self.structural].copy_from_slice(&self.costs);
        for i in 0..self.cells.len() {
            let b = self.basis[i];
            let cb = if b < self.structural { self.costs[b] } else { 0.0 };
            if cb != 0.0 {
                for j in 0..self.width {
                    reduced[j] -= cb * self.cells[i][j];
                }
            }
        }
        let limit = self.artificial_start;
        self.iterate(&mut reduced, limit, deadline, max_pivots)
    }

    /// Pivot until no column below `limit` has a negative reduced cost.
    fn iterate(
        &mut self,
        reduced: &mut [f64],
        limit: usize,
        deadline: &Deadline,
        max_pivots: u64,
    ) -> Phase {
        loop {
            if deadline.expired() || self.pivots >= max_pivots {
                return Phase::Timeout;
            }
            let entering = match (0..limit).find(|&j| reduced[j] < -PIVOT_EPS) {
                Some(j) => j,
                None => return Phase::Optimal,
            };

            let rhs = self.rhs();
            let mut leaving: Option<(usize, f64)> = None;
            for (i, row) in self.cells.iter().enumerate() {
                let a = row[entering];
                if a > PIVOT_EPS {
                    let ratio = row[rhs] / a;
                    leaving = match leaving {
                        None => Some((i, ratio)),
                        Some((best, best_ratio)) => {
                            if ratio < best_ratio - PIVOT_EPS
                                || ((ratio - best_ratio).abs() <= PIVOT_EPS
                                    && self.basis[i] < self.basis[best])
                            {
                                Some((i, ratio))
                            } else {
                                Some((best, best_ratio))
                            }
                        }
                    };
                }
            }
            let Some((row, _)) = leaving else {
                return Phase::Unbounded;
            };

            self.pivot(row, entering, reduced);
        }
    }

    fn pivot(&mut self, row: usize, col: usize, reduced: &mut [f64]) {
        let p = self.cells[row][col];
        for v in self.cells[row].iter_mut() {
            *v /= p;
        }
        let pivot_row = self.cells[row].clone();
        for (i, other) in self.cells.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = other[col];
            if factor != 0.0 {
                for (v, pv) in other.iter_mut().zip(&pivot_row) {
                    *v -= factor * pv;
                }
            }
        }
        let factor = reduced[col];
        if factor != 0.0 {
            for (v, pv) in reduced.iter_mut().zip(&pivot_row) {
                *v -= factor * pv;
            }
        }
        self.basis[row] = col;
        self.pivots += 1;
    }

    /// Replace artificials left in the basis at zero level where possible.
    /// Rows with no usable column are redundant and keep their artificial.
    fn drive_out_artificials(&mut self) {
        let mut scratch = vec![0.0; self.width];
        for i in 0..self.cells.len() {
            if self.basis[i] < self.artificial_start {
                continue;
            }
            if let Some(j) =
                (0..self.artificial_start).find(|&j| self.cells[i][j].abs() > PIVOT_EPS)
            {
                self.pivot(i, j, &mut scratch);
            }
        }
    }

    /// Values of the original variables at the current basis.
    fn values(&self) -> Vec<f64> {
        let mut y = vec![0.0; self.structural];
        let rhs = self.rhs();
        for (i, &b) in self.basis.iter().enumerate() {
            if b < self.structural {
                y[b] = self.cells[i][rhs];
            }
        }
        self.columns
            .iter()
            .map(|c| match *c {
                Column::Shift { col, offset } => offset + y[col],
                Column::Mirror { col, offset } => offset - y[col],
                Column::Split { pos, neg } => y[pos] - y[neg],
            })
            .collect()
    }
}
