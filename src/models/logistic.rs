// src/models/logistic.rs
// Regularized binary logistic regression. The intercept is an extra constant
// feature and is penalized together with the weights.
//
//   Ridge: 0.5 * |w|^2 + C * sum log(1 + exp(-y_i w.x_i))   (Newton)
//   Lasso: |w|_1       + C * sum log(1 + exp(-y_i w.x_i))   (proximal gradient)

use std::fmt;

use serde::Serialize;

use crate::error::{FairnessError, Result};

const NEWTON_MAX_ITER: usize = 100;
const PROX_MAX_ITER: usize = 50_000;
const TOL: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Penalty {
    #[serde(rename = "Ridge")]
    L2,
    #[serde(rename = "Lasso")]
    L1,
}

impl Penalty {
    pub fn label(&self) -> &'static str {
        match self {
            Penalty::L2 => "Ridge",
            Penalty::L1 => "Lasso",
        }
    }

    pub fn short(&self) -> &'static str {
        match self {
            Penalty::L2 => "l2",
            Penalty::L1 => "l1",
        }
    }
}

impl fmt::Display for Penalty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    pub penalty: Penalty,
    pub c: f64,
    weights: Vec<f64>,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// log(1 + exp(-m)) without overflow.
fn log_loss(margin: f64) -> f64 {
    if margin > 0.0 {
        (-margin).exp().ln_1p()
    } else {
        -margin + margin.exp().ln_1p()
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Rows with a trailing 1.0 for the intercept, and labels mapped to -1/+1.
fn augment(x: &[Vec<f64>], y: &[u8]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let rows = x
        .iter()
        .map(|row| {
            let mut r = row.clone();
            r.push(1.0);
            r
        })
        .collect();
    let signs = y.iter().map(|&c| if c == 1 { 1.0 } else { -1.0 }).collect();
    (rows, signs)
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut out = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * out[k]).sum();
        out[row] = (b[row] - tail) / a[row][row];
    }
    Some(out)
}

impl LogisticRegression {
    pub fn fit(x: &[Vec<f64>], y: &[u8], penalty: Penalty, c: f64) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(FairnessError::Model(format!(
                "logistic regression needs matching, non-empty inputs ({} rows, {} labels)",
                x.len(),
                y.len()
            )));
        }
        if !(y.contains(&0) && y.contains(&1)) {
            return Err(FairnessError::Model(
                "target has a single class; logistic regression needs both".to_string(),
            ));
        }
        if c <= 0.0 {
            return Err(FairnessError::Model(format!("C must be positive, got {}", c)));
        }

        let (rows, signs) = augment(x, y);
        let weights = match penalty {
            Penalty::L2 => Self::newton_l2(&rows, &signs, c),
            Penalty::L1 => Self::proximal_l1(&rows, &signs, c),
        };
        Ok(Self { penalty, c, weights })
    }

    fn objective_l2(w: &[f64], rows: &[Vec<f64>], signs: &[f64], c: f64) -> f64 {
        let reg = 0.5 * dot(w, w);
        let loss: f64 = rows.iter().zip(signs).map(|(r, s)| log_loss(s * dot(w, r))).sum();
        reg + c * loss
    }

    fn newton_l2(rows: &[Vec<f64>], signs: &[f64], c: f64) -> Vec<f64> {
        let d = rows[0].len();
        let mut w = vec![0.0; d];

        for _ in 0..NEWTON_MAX_ITER {
            let mut grad = w.clone();
            let mut hess: Vec<Vec<f64>> = (0..d)
                .map(|i| (0..d).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
                .collect();

            for (r, &s) in rows.iter().zip(signs) {
                let p = sigmoid(s * dot(&w, r));
                let g = c * (p - 1.0) * s;
                let h = c * p * (1.0 - p);
                for i in 0..d {
                    grad[i] += g * r[i];
                    for j in 0..d {
                        hess[i][j] += h * r[i] * r[j];
                    }
                }
            }

            if dot(&grad, &grad).sqrt() < TOL {
                break;
            }
            // Singular Hessian: fall back to a plain gradient step.
            let step = solve(hess, grad.clone()).unwrap_or_else(|| grad.clone());

            // Backtracking keeps each step a descent step.
            let current = Self::objective_l2(&w, rows, signs, c);
            let slope = dot(&grad, &step);
            let mut t = 1.0;
            loop {
                let candidate: Vec<f64> = w.iter().zip(&step).map(|(wi, si)| wi - t * si).collect();
                if Self::objective_l2(&candidate, rows, signs, c) <= current - 1e-4 * t * slope
                    || t < 1e-10
                {
                    w = candidate;
                    break;
                }
                t *= 0.5;
            }
        }
        w
    }

    fn proximal_l1(rows: &[Vec<f64>], signs: &[f64], c: f64) -> Vec<f64> {
        let d = rows[0].len();
        // Lipschitz bound of the smooth part's gradient.
        let lipschitz = 0.25 * c * rows.iter().map(|r| dot(r, r)).sum::<f64>();
        let step = 1.0 / lipschitz.max(1e-12);
        let mut w = vec![0.0; d];

        for _ in 0..PROX_MAX_ITER {
            let mut grad = vec![0.0; d];
            for (r, &s) in rows.iter().zip(signs) {
                let g = c * (sigmoid(s * dot(&w, r)) - 1.0) * s;
                for i in 0..d {
                    grad[i] += g * r[i];
                }
            }

            let next: Vec<f64> = w
                .iter()
                .zip(&grad)
                .map(|(wi, gi)| {
                    let z = wi - step * gi;
                    z.signum() * (z.abs() - step).max(0.0)
                })
                .collect();

            let change: f64 = next.iter().zip(&w).map(|(a, b)| (a - b).abs()).fold(0.0, f64::max);
            w = next;
            if change < TOL {
                break;
            }
        }
        w
    }

    /// Feature weights, intercept excluded.
    pub fn coefficients(&self) -> &[f64] {
        &self.weights[..self.weights.len() - 1]
    }

    pub fn intercept(&self) -> f64 {
        self.weights[self.weights.len() - 1]
    }

    pub fn decision(&self, row: &[f64]) -> f64 {
        dot(self.coefficients(), row) + self.intercept()
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<u8> {
        x.iter().map(|row| u8::from(self.decision(row) > 0.0)).collect()
    }
}
