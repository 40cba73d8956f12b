//! Sub-problems and their assembly from a symbolic model.

mod linear;

pub use linear::LinearProblem;

use std::collections::BTreeMap;
use std::fmt;
use serde::{Deserialize,Serialize};
use tracing::{debug,info};

use crate::catalog::VariableCatalog;
use crate::error::{ModelError,Result};
use crate::expr::Expr;
use crate::sets::{SetRegistry,SubProblemKey};
use crate::symbolic::{self,ConcreteExpression,ConcreteForm,ExpressionCompiler,Node,Sense};

/// Objective and constraint texts of one model.
#[derive(Debug,Clone,Default,PartialEq,Serialize,Deserialize)]
pub struct SymbolicModel {
    #[serde(default)]
    pub objective   : Vec<String>,
    #[serde(default)]
    pub expressions : Vec<String>,
}

impl SymbolicModel {
    pub fn new() -> SymbolicModel { Default::default() }
    pub fn with_objective(mut self, text : &str) -> SymbolicModel { self.objective.push(text.to_string()); self }
    pub fn with_constraint(mut self, text : &str) -> SymbolicModel { self.expressions.push(text.to_string()); self }
}

/// Solve state of a sub-problem.
#[derive(Debug,Clone,PartialEq)]
pub enum Status {
    Unsolved,
    Solving,
    Optimal,
    Infeasible,
    Unbounded,
    SolverError(String),
}

impl Status {
    /// True for the states a solve ends in.
    pub fn is_final(&self) -> bool { ! matches!(self, Status::Unsolved | Status::Solving) }
    pub fn is_optimal(&self) -> bool { matches!(self, Status::Optimal) }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unsolved       => f.write_str("unsolved"),
            Status::Solving        => f.write_str("solving"),
            Status::Optimal        => f.write_str("optimal"),
            Status::Infeasible     => f.write_str("infeasible"),
            Status::Unbounded      => f.write_str("unbounded"),
            Status::SolverError(m) => write!(f,"solver error: {}",m),
        }
    }
}

/// Summed objective of a sub-problem. An empty term list is the constant 0.
#[derive(Debug,Clone,PartialEq)]
pub struct Objective {
    pub sense : Sense,
    pub terms : Vec<Node>,
}

/// One concrete optimization instance.
#[derive(Debug,Clone)]
pub struct SubProblem {
    pub key         : SubProblemKey,
    /// Name of the symbolic model this was built from
    pub model       : String,
    pub objective   : Objective,
    pub constraints : Vec<ConcreteExpression>,
    status          : Status,
}

impl SubProblem {
    pub fn status(&self) -> &Status { &self.status }

    /// Move from `Unsolved` to `Solving`. Returns false, leaving the status as is, if the
    /// sub-problem is not `Unsolved`.
    pub fn begin_solve(& mut self) -> bool {
        if self.status == Status::Unsolved {
            self.status = Status::Solving;
            true
        }
        else {
            false
        }
    }

    pub fn finish(& mut self, status : Status) {
        debug_assert!(status.is_final());
        self.status = status;
    }

    /// Allow the sub-problem to be solved again.
    pub fn request_resolve(& mut self) { self.status = Status::Unsolved; }

    /// Lower the sub-problem with the current parameter values.
    pub fn lower(&self, catalog : &VariableCatalog) -> Result<LinearProblem> {
        let mut obj = Expr::scalar(0.0);
        for n in self.objective.terms.iter() {
            obj = obj.add(symbolic::lower(n, catalog)?).map_err(ModelError::expression)?;
        }
        let mut cons = Vec::with_capacity(self.constraints.len());
        for c in self.constraints.iter() {
            if let ConcreteForm::Constraint{ lhs, rel, rhs } = &c.form {
                let e = symbolic::lower(lhs, catalog)?
                    .sub(symbolic::lower(rhs, catalog)?)
                    .map_err(|e| ModelError::expression(format!("'{}': {}",c.text,e)))?;
                cons.push((e,*rel));
            }
        }
        let name = format!("{}{}",self.model,self.key);
        LinearProblem::from_parts(&name, self.objective.sense, &obj, &cons, catalog)
    }
}

/// What to do with sub-problems that exist already.
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum OverwritePolicy {
    Keep,
    Overwrite,
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum BuildOutcome {
    Built,
    Kept,
}

pub type SubProblems = BTreeMap<SubProblemKey,SubProblem>;

pub struct ProblemBuilder<'a> {
    catalog : &'a VariableCatalog,
    sets    : &'a SetRegistry,
}

impl<'a> ProblemBuilder<'a> {
    pub fn new(catalog : &'a VariableCatalog, sets : &'a SetRegistry) -> ProblemBuilder<'a> { ProblemBuilder{ catalog, sets } }

    /// Build one sub-problem per sub-problem key.
    pub fn build(&self, name : &str, model : &SymbolicModel) -> Result<SubProblems> {
        let compiler = ExpressionCompiler::new(self.catalog);
        let mut res = SubProblems::new();
        for key in self.sets.sub_problem_keys() {
            let mut constraints = Vec::new();
            for text in model.expressions.iter() {
                for c in compiler.compile(text, &key)? {
                    match c.form {
                        ConcreteForm::Constraint{..} => constraints.push(c),
                        _ => return Err(ModelError::expression(format!("'{}' is not a comparison",text))),
                    }
                }
            }

            let mut sense = None;
            let mut terms = Vec::new();
            for text in model.objective.iter() {
                for c in compiler.compile(text, &key)? {
                    match c.form {
                        ConcreteForm::Objective{ sense : s, expr } => {
                            if sense.is_some_and(|s0| s0 != s) {
                                return Err(ModelError::expression(format!("'{}': objectives mix Minimize and Maximize",text)));
                            }
                            sense = Some(s);
                            terms.push(expr);
                        },
                        _ => return Err(ModelError::expression(format!("'{}' is not a Minimize or Maximize objective",text))),
                    }
                }
            }

            debug!(model = name, sub_problem = %key, constraints = constraints.len(), objective_terms = terms.len(), "sub-problem built");
            res.insert(key.clone(), SubProblem{
                key,
                model       : name.to_string(),
                objective   : Objective{ sense : sense.unwrap_or(Sense::Minimize), terms },
                constraints,
                status      : Status::Unsolved,
            });
        }
        info!(model = name, sub_problems = res.len(), "problem built");
        Ok(res)
    }

    /// Build every named model.
    pub fn build_all(&self, models : &BTreeMap<String,SymbolicModel>) -> Result<BTreeMap<String,SubProblems>> {
        models.iter()
            .map(|(name,m)| Ok((name.clone(),self.build(name, m)?)))
            .collect()
    }
}
