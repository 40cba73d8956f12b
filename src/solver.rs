//! The solve backend seam.
//!
//! A backend receives one [LinearProblem] at a time and returns a [Solution] in the problem's
//! local column order. Backends are shared between worker threads, so they must be `Send + Sync`
//! and keep any per-solve state local to [SolverBackend::solve].

use std::time::Duration;

use crate::error::Result;
use crate::problem::LinearProblem;

/// Per-solve options.
#[derive(Debug,Clone,Default,PartialEq)]
pub struct SolveOptions {
    /// Backend specific solver selection
    pub solver     : Option<String>,
    pub time_limit : Option<Duration>,
    pub verbose    : bool,
}

#[derive(Debug,Clone,PartialEq)]
pub enum SolutionStatus {
    Optimal,
    Infeasible,
    Unbounded,
    /// Any other outcome: time limit, numerical trouble, ...
    Error(String),
}

#[derive(Debug,Clone,PartialEq)]
pub struct Solution {
    pub status    : SolutionStatus,
    /// Column values; only meaningful when `status` is [SolutionStatus::Optimal]
    pub values    : Vec<f64>,
    pub objective : Option<f64>,
}

impl Solution {
    pub fn optimal(problem : &LinearProblem, values : Vec<f64>) -> Solution {
        let objective = Some(problem.objective_value(&values));
        Solution{ status : SolutionStatus::Optimal, values, objective }
    }
    pub fn failed(status : SolutionStatus) -> Solution {
        Solution{ status, values : Vec::new(), objective : None }
    }
}

pub trait SolverBackend : Send + Sync {
    fn name(&self) -> &str;
    fn solve(&self, problem : &LinearProblem, options : &SolveOptions) -> Result<Solution>;
}
