//! Symbolic, multi-dimensional linear models decomposed into sub-problems.
//!
//! A model is declared in terms of
//! - named dimensions ("sets") of items ([sets]),
//! - tables keyed by the cartesian product of some dimensions, each constant, exogenous (read
//!   from storage) or endogenous (decided by the solver) ([table]),
//! - variables, which are two-dimensional views of tables ([variable]),
//! - symbolic objective and constraint expressions over the variables ([symbolic]).
//!
//! Dimensions marked as splitting divide the model into independent sub-problems, one per
//! combination of their items. A non-splitting table dimension that is neither the rows nor the
//! columns of a variable is its intra dimension, and expressions using it are replicated once
//! per item. Sub-problems are solved independently, or iterated to a fixed point when they are
//! coupled through storage ([convergence]).
//!
//! The [Model] facade drives the whole pipeline; solver backends implement
//! [solver::SolverBackend].

extern crate itertools;

pub mod error;
pub mod utils;
pub mod matrix;
pub mod sets;
pub mod table;
pub mod variable;
pub mod catalog;
pub mod expr;
pub mod symbolic;
pub mod problem;
pub mod solver;
pub mod dummy;
pub mod storage;
pub mod convergence;
pub mod config;
pub mod model;

/////////////////////////////////////////////////////////////////////
// Re-exports

pub use error::{ErrorKind,ModelError,Result};
pub use sets::{Dimension,ItemFilter,SetRegistry,SubProblemKey};
pub use table::{TableDecl,TableKind,VarType};
pub use variable::{ConstantKind,ResolvedVariable,ShapeSpec,VariableDecl};
pub use catalog::{Binding,BindingValue,VariableCatalog};
pub use expr::Expr;
pub use matrix::NDArray;
pub use symbolic::{ConcreteExpression,ConcreteForm,ExpressionCompiler,Relation,Sense};
pub use problem::{BuildOutcome,LinearProblem,OverwritePolicy,ProblemBuilder,Status,SubProblem,SubProblems,SymbolicModel};
pub use solver::{Solution,SolutionStatus,SolveOptions,SolverBackend};
pub use storage::{Filter,MemoryStore,Row,SharedStorage,Snapshot,Storage,WriteMode};
pub use convergence::{ConvergenceLoop,ConvergenceReport,CoupledSystem,Outcome};
pub use config::{ModelConfig,Settings};
pub use model::{Model,RunReport};
