//! Lateral MPC problem and the built-in condensed LQ solver

use crate::params::CostWeights;
use crate::SolverError;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// State size: `[x, y, psi, psi_rate]`
pub const NX: usize = 4;

/// Speed offset applied to the speed-scaled cost terms (m/s)
const COST_SPEED_OFFSET: f64 = 5.0;

/// One tick's optimisation problem. All slices hold one value per knot.
#[derive(Debug, Clone, Copy)]
pub struct MpcProblem<'a> {
    pub x0: [f64; NX],
    /// Knot times starting at 0 (s)
    pub t: &'a [f64],
    pub v: &'a [f64],
    pub lateral_factor: &'a [f64],
    pub y_ref: &'a [f64],
    pub psi_ref: &'a [f64],
    pub psi_rate_ref: &'a [f64],
    pub weights: CostWeights,
}

impl<'a> MpcProblem<'a> {
    /// Number of input steps
    pub fn horizon(&self) -> usize {
        self.t.len().saturating_sub(1)
    }

    pub fn validate(&self) -> Result<(), SolverError> {
        let knots = self.t.len();
        if knots < 2 {
            return Err(SolverError::Horizon(knots));
        }
        for (field, values) in [
            ("v", self.v),
            ("lateral_factor", self.lateral_factor),
            ("y_ref", self.y_ref),
            ("psi_ref", self.psi_ref),
            ("psi_rate_ref", self.psi_rate_ref),
        ] {
            if values.len() != knots {
                return Err(SolverError::LengthMismatch {
                    field,
                    expected: knots,
                    actual: values.len(),
                });
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(SolverError::NonFinite(field));
            }
        }
        if self.t.iter().any(|t| !t.is_finite()) {
            return Err(SolverError::NonFinite("t"));
        }
        if self.t.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SolverError::NonMonotonic);
        }
        if self.x0.iter().any(|x| !x.is_finite()) {
            return Err(SolverError::NonFinite("x0"));
        }
        if !self.weights.is_finite() {
            return Err(SolverError::NonFinite("weights"));
        }
        Ok(())
    }

    /// Exact zero-order-hold discretisation of step `k`: `(A, B, c)`
    fn discretise(&self, k: usize) -> (DMatrix<f64>, DVector<f64>, DVector<f64>) {
        let dt = self.t[k + 1] - self.t[k];
        let v = self.v[k];
        let lf = self.lateral_factor[k];
        let dt2 = dt * dt;

        #[rustfmt::skip]
        let a = DMatrix::from_row_slice(NX, NX, &[
            1.0, 0.0, 0.0,    0.0,
            0.0, 1.0, v * dt, lf * dt + v * dt2 / 2.0,
            0.0, 0.0, 1.0,    dt,
            0.0, 0.0, 0.0,    1.0,
        ]);
        let b = DVector::from_column_slice(&[
            0.0,
            lf * dt2 / 2.0 + v * dt2 * dt / 6.0,
            dt2 / 2.0,
            dt,
        ]);
        let c = DVector::from_column_slice(&[v * dt, 0.0, 0.0, 0.0]);
        (a, b, c)
    }

    /// Diagonal state weights at knot `k`
    fn state_weights(&self, k: usize) -> DMatrix<f64> {
        let scale = self.v[k] + COST_SPEED_OFFSET;
        let w = &self.weights;
        DMatrix::from_diagonal(&DVector::from_column_slice(&[
            0.0,
            w.path,
            w.motion * scale * scale,
            w.accel * scale * scale,
        ]))
    }

    fn reference(&self, k: usize) -> DVector<f64> {
        DVector::from_column_slice(&[0.0, self.y_ref[k], self.psi_ref[k], self.psi_rate_ref[k]])
    }

    fn input_weight(&self, k: usize) -> f64 {
        let scale = self.v[k] + COST_SPEED_OFFSET;
        self.weights.jerk * scale * scale + self.weights.steering_rate
    }
}

/// Solved trajectory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// State per knot
    pub x: Vec<[f64; NX]>,
    /// Yaw acceleration per step
    pub u: Vec<f64>,
    pub cost: f64,
}

impl Solution {
    pub fn zeros(knots: usize) -> Self {
        Self {
            x: vec![[0.0; NX]; knots],
            u: vec![0.0; knots.saturating_sub(1)],
            cost: 0.0,
        }
    }

    /// Any NaN or infinity in the yaw rate trajectory, or a NaN cost
    pub fn has_non_finite(&self) -> bool {
        self.x.iter().any(|x| !x[3].is_finite()) || self.cost.is_nan()
    }

    pub fn column(&self, index: usize) -> Vec<f64> {
        self.x.iter().map(|x| x[index]).collect()
    }
}

/// Seam for swapping the numerical solver
pub trait LateralSolver {
    fn solve(&mut self, problem: &MpcProblem<'_>) -> Result<Solution, SolverError>;
}

/// Unconstrained linear-quadratic solver.
///
/// The horizon is condensed into a dense QP over the inputs and solved
/// with a Cholesky factorisation.
#[derive(Debug, Clone, Default)]
pub struct LqSolver;

impl LqSolver {
    pub fn new() -> Self {
        Self
    }

    fn rollout(problem: &MpcProblem<'_>, u: &[f64]) -> Solution {
        let n = problem.horizon();
        let mut state = DVector::from_column_slice(&problem.x0);
        let mut x = Vec::with_capacity(n + 1);
        x.push(problem.x0);
        let mut cost = 0.0;

        for (k, &u_k) in u.iter().enumerate().take(n) {
            let (a, b, c) = problem.discretise(k);
            state = &a * &state + &b * u_k + c;
            let error = &state - problem.reference(k + 1);
            cost += (error.transpose() * problem.state_weights(k + 1) * &error)[(0, 0)];
            cost += problem.input_weight(k) * u_k * u_k;
            x.push([state[0], state[1], state[2], state[3]]);
        }

        Solution {
            x,
            u: u.to_vec(),
            cost,
        }
    }
}

impl LateralSolver for LqSolver {
    fn solve(&mut self, problem: &MpcProblem<'_>) -> Result<Solution, SolverError> {
        problem.validate()?;
        let n = problem.horizon();

        // Knot state = free response + gain * inputs
        let mut free = DVector::from_column_slice(&problem.x0);
        let mut gain = DMatrix::<f64>::zeros(NX, n);
        let mut hessian = DMatrix::<f64>::zeros(n, n);
        let mut gradient = DVector::<f64>::zeros(n);

        for k in 0..n {
            let (a, b, c) = problem.discretise(k);
            free = &a * &free + c;
            gain = &a * &gain;
            gain.set_column(k, &b);

            let weighted = gain.transpose() * problem.state_weights(k + 1);
            hessian += &weighted * &gain;
            gradient += &weighted * (&free - problem.reference(k + 1));
        }
        for k in 0..n {
            hessian[(k, k)] += problem.input_weight(k);
        }

        let cholesky = hessian.cholesky().ok_or(SolverError::NotPositiveDefinite)?;
        let u = -cholesky.solve(&gradient);
        if u.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::NonFiniteSolution);
        }

        Ok(Self::rollout(problem, u.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_core::{t_idxs, LAT_MPC_N};

    struct Fixture {
        t: Vec<f64>,
        v: Vec<f64>,
        lf: Vec<f64>,
        y: Vec<f64>,
        psi: Vec<f64>,
        rate: Vec<f64>,
    }

    impl Fixture {
        fn straight(v: f64, y: f64) -> Self {
            let knots = LAT_MPC_N + 1;
            Self {
                t: t_idxs()[..knots].to_vec(),
                v: vec![v; knots],
                lf: vec![1.0; knots],
                y: vec![y; knots],
                psi: vec![0.0; knots],
                rate: vec![0.0; knots],
            }
        }

        fn problem(&self, x0: [f64; NX]) -> MpcProblem<'_> {
            MpcProblem {
                x0,
                t: &self.t,
                v: &self.v,
                lateral_factor: &self.lf,
                y_ref: &self.y,
                psi_ref: &self.psi,
                psi_rate_ref: &self.rate,
                weights: CostWeights::default(),
            }
        }
    }

    #[test]
    fn test_on_reference_stays_put() {
        let fixture = Fixture::straight(20.0, 0.0);
        let solution = LqSolver::new().solve(&fixture.problem([0.0; NX])).unwrap();
        assert_eq!(solution.x.len(), LAT_MPC_N + 1);
        assert_eq!(solution.u.len(), LAT_MPC_N);
        assert!(solution.u.iter().all(|u| u.abs() < 1e-9));
        assert!(solution.cost.abs() < 1e-9);
        // x advances with speed
        let last = solution.x[LAT_MPC_N];
        assert!((last[0] - 20.0 * fixture.t[LAT_MPC_N]).abs() < 1e-6);
    }

    #[test]
    fn test_steers_toward_offset_path() {
        let fixture = Fixture::straight(15.0, 1.0);
        let solution = LqSolver::new().solve(&fixture.problem([0.0; NX])).unwrap();
        // Positive y is right: the plan moves right
        let last = solution.x[LAT_MPC_N];
        assert!(last[1] > 0.0, "y = {}", last[1]);
        assert!(solution.u[0] > 0.0);
        assert!(!solution.has_non_finite());
    }

    #[test]
    fn test_cost_decreases_versus_zero_input() {
        let fixture = Fixture::straight(15.0, 1.0);
        let problem = fixture.problem([0.0; NX]);
        let solved = LqSolver::new().solve(&problem).unwrap();
        let idle = LqSolver::rollout(&problem, &vec![0.0; LAT_MPC_N]);
        assert!(solved.cost < idle.cost);
    }

    #[test]
    fn test_rejects_bad_problems() {
        let mut fixture = Fixture::straight(15.0, 0.0);
        fixture.y[3] = f64::NAN;
        let err = LqSolver::new().solve(&fixture.problem([0.0; NX])).unwrap_err();
        assert_eq!(err, SolverError::NonFinite("y_ref"));
        assert_eq!(err.status(), 3);

        let mut fixture = Fixture::straight(15.0, 0.0);
        fixture.v.pop();
        let err = LqSolver::new().solve(&fixture.problem([0.0; NX])).unwrap_err();
        assert!(matches!(err, SolverError::LengthMismatch { field: "v", .. }));

        let fixture = Fixture::straight(15.0, 0.0);
        let err = LqSolver::new()
            .solve(&fixture.problem([0.0, f64::INFINITY, 0.0, 0.0]))
            .unwrap_err();
        assert_eq!(err, SolverError::NonFinite("x0"));
    }
}
