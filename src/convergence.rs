//! Independent and integrated (fixed point) solving of sub-problems.

use std::collections::{BTreeMap,HashMap};
use std::time::{Duration,Instant};
use rayon::prelude::*;
use tracing::{debug,info,warn};

use crate::catalog::VariableCatalog;
use crate::error::Result;
use crate::problem::{LinearProblem,Status,SubProblem};
use crate::solver::{Solution,SolutionStatus,SolveOptions,SolverBackend};
use crate::storage::{Filter,Row,Storage};

/// Lower and solve every `Unsolved` sub-problem, then apply the solutions to `catalog`.
///
/// Sub-problems that are not `Unsolved` are skipped; re-solving needs an explicit
/// [SubProblem::request_resolve]. A failure in one sub-problem is recorded in its status and
/// does not affect the others. With `parallel` the backend calls run on the rayon pool;
/// solutions are applied in the order of `problems` either way.
pub fn solve_independent<'p,I>(problems : I, catalog : & mut VariableCatalog, backend : &dyn SolverBackend, options : &SolveOptions, parallel : bool) -> Result<()>
    where I : IntoIterator<Item = &'p mut SubProblem>
{
    let mut ps : Vec<&mut SubProblem> = problems.into_iter().collect();

    let mut jobs : Vec<(usize,LinearProblem)> = Vec::with_capacity(ps.len());
    for (i,p) in ps.iter_mut().enumerate() {
        if ! p.begin_solve() {
            warn!(sub_problem = %p.key, status = %p.status(), "re-solve skipped, sub-problem was not reset");
            continue;
        }
        match p.lower(catalog) {
            Ok(lp) => jobs.push((i,lp)),
            Err(e) => {
                warn!(sub_problem = %p.key, error = %e, "sub-problem could not be assembled");
                p.finish(Status::SolverError(e.to_string()));
            }
        }
    }

    let solve = |(i,lp) : &(usize,LinearProblem)| (*i,backend.solve(lp, options));
    let results : Vec<(usize,Result<Solution>)> =
        if parallel { jobs.par_iter().map(solve).collect() }
        else { jobs.iter().map(solve).collect() };

    let mut optimal = 0;
    for ((i,res),(_,lp)) in results.into_iter().zip(jobs.iter()) {
        let p = & mut ps[i];
        let status = match res {
            Ok(sol) => match sol.status {
                SolutionStatus::Optimal if sol.values.len() == lp.num_columns() => {
                    catalog.set_values(&lp.columns, &sol.values);
                    Status::Optimal
                },
                SolutionStatus::Optimal => Status::SolverError(format!("backend returned {} values for {} columns",sol.values.len(),lp.num_columns())),
                SolutionStatus::Infeasible => Status::Infeasible,
                SolutionStatus::Unbounded  => Status::Unbounded,
                SolutionStatus::Error(m)   => Status::SolverError(m),
            },
            Err(e) => Status::SolverError(e.to_string()),
        };
        if status.is_optimal() {
            optimal += 1;
            debug!(sub_problem = %p.key, columns = lp.num_columns(), "solved");
        }
        else {
            warn!(sub_problem = %p.key, %status, "sub-problem not solved to optimality");
        }
        p.finish(status);
    }
    info!(backend = backend.name(), solved = jobs.len(), optimal, "solve finished");
    Ok(())
}

/// Largest relative difference `|new-old|/|old|` between two versions of a table.
///
/// Rows are paired by coordinates. New values that are undefined or NaN are skipped. `0 -> 0`
/// counts as no difference and `0 -> x` as an infinite one.
///
/// An old value that is missing, undefined or NaN is not skipped when the new value is defined:
/// the pair counts as an infinite difference. A table that only gains values between two
/// iterations has therefore not converged yet.
pub fn relative_difference(old : &[Row], new : &[Row]) -> f64 {
    let old : HashMap<&[String],Option<f64>> = old.iter().map(|r| (r.coords.as_slice(),r.value)).collect();
    new.iter()
        .filter_map(|r| {
            let v = r.value.filter(|v| ! v.is_nan())?;
            match old.get(r.coords.as_slice()).copied().flatten().filter(|o| ! o.is_nan()) {
                None => Some(f64::INFINITY),
                Some(o) if o == 0.0 => Some(if v == 0.0 { 0.0 } else { f64::INFINITY }),
                Some(o) => Some((v-o).abs()/o.abs()),
            }
        })
        .fold(0.0, f64::max)
}

/// The parts of a model the integrated loop drives.
pub trait CoupledSystem {
    /// Reload exogenous data from storage.
    fn refresh_exogenous(& mut self, storage : &dyn Storage) -> Result<()>;
    /// Reset every sub-problem to `Unsolved`.
    fn request_resolve(& mut self);
    fn solve_all(& mut self) -> Result<()>;
    /// Write solved endogenous values to storage.
    fn push_endogenous(& mut self, storage : & mut dyn Storage) -> Result<()>;
    /// Tables compared between iterations.
    fn monitored_tables(&self) -> Vec<String>;
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum Outcome {
    Converged{ iterations : usize },
    /// The iteration limit was reached; the last iterate is kept
    MaxIterations{ iterations : usize },
    /// An iteration took longer than the iteration timeout
    TimedOut{ iterations : usize },
}

impl Outcome {
    pub fn converged(&self) -> bool { matches!(self, Outcome::Converged{..}) }
    pub fn iterations(&self) -> usize {
        match self {
            Outcome::Converged{ iterations } | Outcome::MaxIterations{ iterations } | Outcome::TimedOut{ iterations } => *iterations
        }
    }
}

#[derive(Debug,Clone,PartialEq)]
pub struct IterationRecord {
    pub iteration   : usize,
    /// Relative difference per monitored table
    pub differences : BTreeMap<String,f64>,
    pub elapsed     : Duration,
}

impl IterationRecord {
    pub fn max_difference(&self) -> f64 { self.differences.values().cloned().fold(0.0, f64::max) }
}

#[derive(Debug,Clone,PartialEq)]
pub struct ConvergenceReport {
    pub outcome : Outcome,
    pub history : Vec<IterationRecord>,
}

/// Fixed point iteration over coupled sub-problems.
#[derive(Debug,Clone,PartialEq)]
pub struct ConvergenceLoop {
    pub tolerance         : f64,
    pub max_iterations    : usize,
    pub iteration_timeout : Option<Duration>,
}

impl ConvergenceLoop {
    pub fn new(tolerance : f64, max_iterations : usize) -> ConvergenceLoop {
        ConvergenceLoop{ tolerance, max_iterations, iteration_timeout : None }
    }
    pub fn with_iteration_timeout(mut self, t : Duration) -> ConvergenceLoop { self.iteration_timeout = Some(t); self }

    /// Iterate until every monitored table changes by at most `tolerance`, the iteration limit
    /// is reached or an iteration times out.
    ///
    /// Each iteration snapshots the monitored tables, solves, pushes the new values and
    /// compares. The snapshot is released on every exit path; an error ends the loop and is
    /// returned.
    pub fn run<S>(&self, system : & mut S, storage : & mut dyn Storage) -> Result<ConvergenceReport> where S : CoupledSystem + ?Sized {
        let tables = system.monitored_tables();
        let all = Filter::new();
        let mut history = Vec::new();
        let mut iteration = 0;
        let outcome = loop {
            iteration += 1;
            if iteration > self.max_iterations {
                warn!(max_iterations = self.max_iterations,
                      last_difference = history.last().map(|r : &IterationRecord| r.max_difference()),
                      "no convergence within the iteration limit");
                break Outcome::MaxIterations{ iterations : self.max_iterations };
            }
            let t0 = Instant::now();
            if iteration > 1 {
                system.refresh_exogenous(storage)?;
                system.request_resolve();
            }

            let snapshot = storage.snapshot(&tables)?;
            system.solve_all()?;
            system.push_endogenous(storage)?;

            let mut differences = BTreeMap::new();
            for t in tables.iter() {
                let new = storage.get_rows(t, &all)?;
                differences.insert(t.clone(), relative_difference(snapshot.rows(t).unwrap_or(&[]), &new));
            }
            snapshot.release();

            let record = IterationRecord{ iteration, differences, elapsed : t0.elapsed() };
            let diff = record.max_difference();
            debug!(iteration, difference = diff, elapsed = ?record.elapsed, "iteration done");
            let elapsed = record.elapsed;
            history.push(record);

            if diff <= self.tolerance {
                info!(iterations = iteration, difference = diff, "converged");
                break Outcome::Converged{ iterations : iteration };
            }
            if let Some(limit) = self.iteration_timeout {
                if elapsed > limit {
                    warn!(iteration, ?elapsed, ?limit, "iteration timed out");
                    break Outcome::TimedOut{ iterations : iteration };
                }
            }
        };
        Ok(ConvergenceReport{ outcome, history })
    }
}
