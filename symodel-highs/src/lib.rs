//! HiGHS backend for symodel.
//!
//! Solves the [LinearProblem] of a sub-problem as an LP, or a MILP if any column is integer.
//!
//! ```no_run
//! use symodel::*;
//!
//! # fn run(mut model : Model, mut store : MemoryStore) -> Result<()> {
//! let backend = symodel_highs::Backend::new();
//! let report = model.solve(&backend, &mut store, &Settings::default(), OverwritePolicy::Overwrite)?;
//! assert!(report.all_optimal());
//! # Ok(())
//! # }
//! ```

use highs::{HighsModelStatus,RowProblem,Sense};
use itertools::izip;
use tracing::debug;

use symodel::{LinearProblem,ModelError,Solution,SolutionStatus,SolveOptions,SolverBackend};

#[derive(Debug,Clone,Default)]
pub struct Backend {
    /// Extra string options passed to HiGHS, e.g. `("presolve","off")`
    options : Vec<(String,String)>,
}

impl Backend {
    pub fn new() -> Backend { Default::default() }

    pub fn with_option(mut self, name : &str, value : &str) -> Backend {
        self.options.push((name.to_string(),value.to_string()));
        self
    }
}

fn build(problem : &LinearProblem) -> RowProblem {
    let mut pb = RowProblem::default();
    let cols : Vec<highs::Col> = izip!(problem.c.iter(),problem.integer.iter())
        .map(|(&c,&int)|
            if int { pb.add_integer_column(c, f64::NEG_INFINITY..=f64::INFINITY) }
            else { pb.add_column(c, f64::NEG_INFINITY..=f64::INFINITY) })
        .collect();
    for (subj,cof,lb,ub) in problem.rows() {
        let factors : Vec<(highs::Col,f64)> = subj.iter().zip(cof.iter()).map(|(&j,&c)| (cols[j],c)).collect();
        pb.add_row(lb..=ub, factors);
    }
    pb
}

impl SolverBackend for Backend {
    fn name(&self) -> &str { "highs" }

    fn solve(&self, problem : &LinearProblem, options : &SolveOptions) -> symodel::Result<Solution> {
        let sense = match problem.sense {
            symodel::Sense::Minimize => Sense::Minimise,
            symodel::Sense::Maximize => Sense::Maximise,
        };
        let mut model = build(problem).optimise(sense);
        if ! options.verbose {
            model.make_quiet();
        }
        if let Some(t) = options.time_limit {
            model.set_option("time_limit", t.as_secs_f64());
        }
        if let Some(ref s) = options.solver {
            model.set_option("solver", s.as_str());
        }
        for (k,v) in self.options.iter() {
            model.set_option(k.as_str(), v.as_str());
        }

        let solved = model.try_solve()
            .map_err(|e| ModelError::Solver(format!("HiGHS failed on '{}': {:?}",problem.name,e)))?;
        let status = solved.status();
        debug!(problem = %problem.name, ?status, "HiGHS finished");

        match status {
            HighsModelStatus::Optimal => {
                let values = solved.get_solution().columns().to_vec();
                Ok(Solution::optimal(problem, values))
            },
            HighsModelStatus::ModelEmpty =>
                Ok(Solution::optimal(problem, vec![0.0; problem.num_columns()])),
            HighsModelStatus::Infeasible => Ok(Solution::failed(SolutionStatus::Infeasible)),
            HighsModelStatus::Unbounded | HighsModelStatus::UnboundedOrInfeasible => Ok(Solution::failed(SolutionStatus::Unbounded)),
            s => Ok(Solution::failed(SolutionStatus::Error(format!("{:?}",s)))),
        }
    }
}
