//! Contextual Bandits: LinUCB with per-arm ridge regression.
//!
//! Each arm keeps `A = lambda * I + sum(x x^T)` and `b = sum(r x)`. Scores are
//! `theta . x + alpha * sqrt(x^T A^{-1} x)` with `theta = A^{-1} b`, computed
//! through a Cholesky factorization of `A` rather than an explicit inverse.
//! `A` starts at `lambda * I` with `lambda > 0`, so it is always positive definite.

use bandit_lab_core::config::PolicyConfig;
use bandit_lab_core::error::{BanditError, BanditResult};
use ndarray::{Array1, Array2};
use rand::Rng;
use serde::Serialize;

use crate::bandits::{
    argmax, check_arm, check_reward, ensure_arms, ArmStats, BanditPolicy, Selection,
};

/// Per-arm score breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinUcbScore {
    pub ucb: f64,
    pub mean: f64,
    pub bonus: f64,
}

#[derive(Debug, Clone)]
struct RidgeState {
    design: Array2<f64>,
    response: Array1<f64>,
}

impl RidgeState {
    fn new(dim: usize, lambda: f64) -> Self {
        Self {
            design: Array2::eye(dim) * lambda,
            response: Array1::zeros(dim),
        }
    }

    fn score(&self, x: &Array1<f64>, alpha_explore: f64) -> BanditResult<LinUcbScore> {
        let l = cholesky(&self.design)?;
        let theta = back_substitute(&l, &forward_substitute(&l, &self.response));
        let mean = theta.dot(x);
        // x^T A^{-1} x == |L^{-1} x|^2
        let z = forward_substitute(&l, x);
        let bonus = alpha_explore * z.dot(&z).max(0.0).sqrt();
        Ok(LinUcbScore {
            ucb: mean + bonus,
            mean,
            bonus,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LinUcb {
    dim: usize,
    alpha_explore: f64,
    lambda: f64,
    arms: Vec<RidgeState>,
    stats: Vec<ArmStats>,
}

impl LinUcb {
    pub fn new(n_arms: usize, dim: usize, alpha_explore: f64, lambda: f64) -> BanditResult<Self> {
        PolicyConfig::LinUcb {
            alpha_explore,
            lambda,
        }
        .validate("", n_arms)?;
        if dim == 0 {
            return Err(BanditError::invalid("context.dim", "must be greater than 0"));
        }
        Ok(Self {
            dim,
            alpha_explore,
            lambda,
            arms: (0..n_arms).map(|_| RidgeState::new(dim, lambda)).collect(),
            stats: vec![ArmStats::default(); n_arms],
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn alpha_explore(&self) -> f64 {
        self.alpha_explore
    }

    pub fn design_matrix(&self, arm: usize) -> BanditResult<&Array2<f64>> {
        check_arm(arm, self.arms.len())?;
        Ok(&self.arms[arm].design)
    }

    pub fn response_vector(&self, arm: usize) -> BanditResult<&Array1<f64>> {
        check_arm(arm, self.arms.len())?;
        Ok(&self.arms[arm].response)
    }

    /// Ridge coefficients `theta` per arm.
    pub fn coefficients(&self) -> BanditResult<Vec<Vec<f64>>> {
        self.arms
            .iter()
            .map(|st| {
                let l = cholesky(&st.design)?;
                Ok(back_substitute(&l, &forward_substitute(&l, &st.response)).to_vec())
            })
            .collect()
    }

    pub fn scores(&self, context: &[f64]) -> BanditResult<Vec<LinUcbScore>> {
        let x = self.context_vector(Some(context))?;
        self.arms
            .iter()
            .map(|st| st.score(&x, self.alpha_explore))
            .collect()
    }

    fn context_vector(&self, context: Option<&[f64]>) -> BanditResult<Array1<f64>> {
        let ctx = context.unwrap_or(&[]);
        if ctx.len() != self.dim {
            return Err(BanditError::DimensionMismatch {
                expected: self.dim,
                actual: ctx.len(),
            });
        }
        if ctx.iter().any(|v| !v.is_finite()) {
            return Err(BanditError::invalid("context", "values must be finite"));
        }
        Ok(Array1::from(ctx.to_vec()))
    }
}

impl BanditPolicy for LinUcb {
    fn n_arms(&self) -> usize {
        self.arms.len()
    }

    fn context_dim(&self) -> Option<usize> {
        Some(self.dim)
    }

    /// Argmax UCB score. `explored` is set when the bonus changed the choice
    /// away from the arm with the best ridge estimate.
    fn select<R: Rng>(&self, _rng: &mut R, context: Option<&[f64]>) -> BanditResult<Selection> {
        ensure_arms(self.arms.len())?;
        let x = self.context_vector(context)?;
        let scores = self
            .arms
            .iter()
            .map(|st| st.score(&x, self.alpha_explore))
            .collect::<BanditResult<Vec<_>>>()?;
        let arm = argmax(scores.iter().map(|s| s.ucb)).unwrap_or(0);
        let greedy = argmax(scores.iter().map(|s| s.mean)).unwrap_or(0);
        Ok(Selection {
            arm,
            explored: arm != greedy,
        })
    }

    fn update(&mut self, arm: usize, reward: u8, context: Option<&[f64]>) -> BanditResult<()> {
        check_arm(arm, self.arms.len())?;
        let x = self.context_vector(context)?;
        let r = check_reward(reward)?;

        let x_col = x.view().insert_axis(ndarray::Axis(1));
        let x_row = x.view().insert_axis(ndarray::Axis(0));
        let state = &mut self.arms[arm];
        state.design += &x_col.dot(&x_row);
        state.response.scaled_add(r, &x);
        self.stats[arm].observe(r);
        Ok(())
    }

    fn arm_stats(&self) -> &[ArmStats] {
        &self.stats
    }
}

/// Lower-triangular `L` with `A = L L^T`.
fn cholesky(a: &Array2<f64>) -> BanditResult<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return Err(BanditError::InvalidState(format!(
                        "design matrix is not positive definite (pivot {i} = {sum})"
                    )));
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Ok(l)
}

/// Solve `L y = b`.
fn forward_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * y[k];
        }
        y[i] = sum / l[[i, i]];
    }
    y
}

/// Solve `L^T x = y`.
fn back_substitute(l: &Array2<f64>, y: &Array1<f64>) -> Array1<f64> {
    let n = y.len();
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}
