//! This module implements a dummy backend that accepts problems but does no numerics. Every
//! problem it receives is recorded, and answered with an optimal all-zero solution.
//!
use parking_lot::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::problem::LinearProblem;
use crate::solver::{Solution,SolveOptions,SolverBackend};

#[derive(Default)]
pub struct Backend {
    problems : Mutex<Vec<LinearProblem>>,
}

impl Backend {
    pub fn new() -> Backend { Default::default() }

    /// Problems received so far, in the order they were solved.
    pub fn problems(&self) -> Vec<LinearProblem> { self.problems.lock().clone() }

    pub fn num_solved(&self) -> usize { self.problems.lock().len() }

    /// Forget the recorded problems.
    pub fn clear(&self) { self.problems.lock().clear(); }
}

impl SolverBackend for Backend {
    fn name(&self) -> &str { "dummy" }

    fn solve(&self, problem : &LinearProblem, _options : &SolveOptions) -> Result<Solution> {
        debug!(problem = %problem.name, columns = problem.num_columns(), rows = problem.num_rows(), "dummy solve");
        self.problems.lock().push(problem.clone());
        Ok(Solution::optimal(problem, vec![0.0; problem.num_columns()]))
    }
}
