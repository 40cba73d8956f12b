//! The [Model] ties the pieces together: configuration, resolved variables, sub-problems,
//! storage and solving.
//!
//! # Example
//! ```
//! use symodel::*;
//!
//! let cfg = ModelConfig::from_yaml_str(r#"
//! sets:
//!   - {symbol: A, items: [a1, a2]}
//! tables:
//!   - name: X
//!     type: endogenous
//!     coordinates: [A]
//!     variables: [{symbol: x, rows: A}]
//! problem:
//!   objective: ["Minimize(sum(x))"]
//!   expressions: ["x >= 1"]
//! "#).unwrap();
//! let mut model = Model::new(cfg).unwrap();
//! let mut store = MemoryStore::new();
//! model.initialize_storage(&mut store).unwrap();
//!
//! let backend = dummy::Backend::new();
//! let report = model.solve(&backend, &mut store, &Settings::default(), OverwritePolicy::Overwrite).unwrap();
//! assert_eq!(report.statuses.len(), 1);
//! assert_eq!(backend.problems()[0].num_rows(), 2);
//! ```

use std::collections::BTreeMap;
use tracing::{error,info};

use crate::catalog::VariableCatalog;
use crate::config::{ModelConfig,Settings};
use crate::convergence::{self,ConvergenceReport,CoupledSystem};
use crate::error::{ModelError,Result};
use crate::problem::{BuildOutcome,OverwritePolicy,ProblemBuilder,Status,SubProblems,SymbolicModel};
use crate::sets::{SetRegistry,SubProblemKey};
use crate::solver::{SolveOptions,SolverBackend};
use crate::storage::{Filter,Row,Storage,WriteMode};
use crate::table::TableDecl;

/// Result of [Model::solve].
#[derive(Debug,Clone,PartialEq)]
pub struct RunReport {
    /// Status per (model name, sub-problem)
    pub statuses    : BTreeMap<(String,SubProblemKey),Status>,
    /// Present for integrated runs
    pub convergence : Option<ConvergenceReport>,
}

impl RunReport {
    pub fn all_optimal(&self) -> bool { self.statuses.values().all(|s| s.is_optimal()) }
    pub fn failed(&self) -> Vec<&(String,SubProblemKey)> {
        self.statuses.iter().filter(|(_,s)| ! s.is_optimal()).map(|(k,_)| k).collect()
    }
}

pub struct Model {
    sets     : SetRegistry,
    tables   : Vec<TableDecl>,
    models   : BTreeMap<String,SymbolicModel>,
    catalog  : VariableCatalog,
    problems : BTreeMap<String,SubProblems>,
}

impl Model {
    /// Validate a configuration and resolve all its variables.
    pub fn new(config : ModelConfig) -> Result<Model> {
        let res = config.registry()
            .and_then(|sets| {
                let tables = config.tables(&sets)?;
                let models = config.models()?;
                Model::from_parts(sets, tables, models)
            });
        if let Err(ref e) = res {
            error!(error = %e, "invalid model");
        }
        res
    }

    pub fn from_parts(sets : SetRegistry, tables : Vec<TableDecl>, models : BTreeMap<String,SymbolicModel>) -> Result<Model> {
        let catalog = VariableCatalog::build(&tables, &sets)?;
        Ok(Model{ sets, tables, models, catalog, problems : BTreeMap::new() })
    }

    pub fn sets(&self) -> &SetRegistry { &self.sets }
    pub fn tables(&self) -> &[TableDecl] { self.tables.as_slice() }
    pub fn catalog(&self) -> &VariableCatalog { &self.catalog }
    pub fn problems(&self) -> &BTreeMap<String,SubProblems> { &self.problems }

    /// Create the storage layout: dimension items under each dimension's table name, and one
    /// table per declared table. Endogenous tables get an undefined row for every coordinate
    /// that has no row yet.
    pub fn initialize_storage(&self, storage : & mut dyn Storage) -> Result<()> {
        for d in self.sets.iter() {
            storage.put_dimension_items(&d.table_name, &d.items)?;
        }
        for t in self.tables.iter() {
            storage.create_table(&t.name, &t.coordinates)?;
            if t.kind.has_endogenous() {
                let existing : std::collections::HashSet<Vec<String>> = storage.get_rows(&t.name, &Filter::new())?
                    .into_iter().map(|r| r.coords).collect();
                let rows : Vec<Row> = t.enumerate(&self.sets)?.into_iter()
                    .filter(|c| ! existing.contains(c))
                    .map(|coords| Row{ coords, value : None })
                    .collect();
                storage.put_rows(&t.name, rows, WriteMode::Insert)?;
            }
        }
        info!(tables = self.tables.len(), dimensions = self.sets.iter().count(), "storage initialized");
        Ok(())
    }

    /// Build the sub-problems of every symbolic model. With [OverwritePolicy::Keep] existing
    /// sub-problems are left alone. On failure no sub-problems are retained.
    pub fn build(& mut self, policy : OverwritePolicy) -> Result<BuildOutcome> {
        if ! self.problems.is_empty() && policy == OverwritePolicy::Keep {
            info!("sub-problems exist, keeping them");
            return Ok(BuildOutcome::Kept);
        }
        self.problems.clear();
        match ProblemBuilder::new(&self.catalog, &self.sets).build_all(&self.models) {
            Ok(p) => {
                self.problems = p;
                Ok(BuildOutcome::Built)
            },
            Err(e) => {
                error!(error = %e, "build failed");
                Err(e)
            }
        }
    }

    pub fn load_exogenous(& mut self, storage : &dyn Storage) -> Result<()> {
        self.catalog.load_exogenous(storage)
    }

    /// Write solved endogenous values, rounded to `digits` decimals.
    pub fn push_endogenous(&self, storage : & mut dyn Storage, digits : u32) -> Result<()> {
        for (table,rows) in self.catalog.endogenous_rows(digits) {
            if ! rows.is_empty() {
                storage.put_rows(&table, rows, WriteMode::Replace)?;
            }
        }
        Ok(())
    }

    pub fn statuses(&self) -> BTreeMap<(String,SubProblemKey),Status> {
        self.problems.iter()
            .flat_map(|(name,ps)| ps.iter().map(move |(k,p)| ((name.clone(),k.clone()),p.status().clone())))
            .collect()
    }

    /// Reset every sub-problem to `Unsolved`.
    pub fn request_resolve(& mut self) {
        self.problems.values_mut().flat_map(|ps| ps.values_mut()).for_each(|p| p.request_resolve());
    }

    fn solve_once(& mut self, backend : &dyn SolverBackend, options : &SolveOptions, parallel : bool) -> Result<()> {
        convergence::solve_independent(
            self.problems.values_mut().flat_map(|ps| ps.values_mut()),
            & mut self.catalog,
            backend,
            options,
            parallel)
    }

    /// Build (per `policy`), load exogenous data and solve.
    ///
    /// With `settings.integrated` the sub-problems are iterated to a fixed point; otherwise
    /// each is solved once and the results are written to storage.
    pub fn solve(& mut self, backend : &dyn SolverBackend, storage : & mut dyn Storage, settings : &Settings, policy : OverwritePolicy) -> Result<RunReport> {
        settings.validate()?;
        self.build(policy)?;
        self.load_exogenous(storage)?;
        let options = settings.solve_options();

        let convergence =
            if settings.integrated {
                let lp = settings.convergence_loop();
                let mut sys = Coupled{ model : self, backend, options, parallel : settings.parallel, digits : settings.round_digits };
                Some(lp.run(& mut sys, storage)?)
            }
            else {
                self.solve_once(backend, &options, settings.parallel)?;
                self.push_endogenous(storage, settings.round_digits)?;
                None
            };

        let report = RunReport{ statuses : self.statuses(), convergence };
        info!(sub_problems = report.statuses.len(),
              failed = report.failed().len(),
              outcome = ?report.convergence.as_ref().map(|c| c.outcome),
              "run finished");
        Ok(report)
    }

    /// Re-read the items of dimension `id` from storage and re-resolve every variable.
    /// Existing sub-problems are discarded.
    pub fn reload_dimension(& mut self, storage : &dyn Storage, id : &str) -> Result<()> {
        let table = self.sets.get(id)?.table_name.clone();
        let items = storage.list_dimension_items(&table)?;
        let mut sets = self.sets.clone();
        sets.set_items(id, items)?;
        self.catalog = VariableCatalog::build(&self.tables, &sets)?;
        self.sets = sets;
        self.problems.clear();
        info!(dimension = id, items = self.sets.get(id)?.len(), "dimension reloaded");
        Ok(())
    }

    /// Solved values of every decision binding of `symbol`, keyed by binding label.
    pub fn variable_values(&self, symbol : &str) -> Result<BTreeMap<String,Vec<Option<f64>>>> {
        if self.catalog.variable(symbol).is_none() {
            return Err(ModelError::missing(format!("Variable '{}' not defined",symbol)));
        }
        self.catalog.bindings_of(symbol).iter()
            .map(|&b| self.catalog.binding(b))
            .filter(|b| b.is_decision())
            .map(|b| Ok((b.label(),self.catalog.binding_values(b.id)?)))
            .collect()
    }
}

/// Adapter driving a [Model] from the convergence loop.
struct Coupled<'a> {
    model    : &'a mut Model,
    backend  : &'a dyn SolverBackend,
    options  : SolveOptions,
    parallel : bool,
    digits   : u32,
}

impl CoupledSystem for Coupled<'_> {
    fn refresh_exogenous(& mut self, storage : &dyn Storage) -> Result<()> { self.model.load_exogenous(storage) }
    fn request_resolve(& mut self) { self.model.request_resolve() }
    fn solve_all(& mut self) -> Result<()> { self.model.solve_once(self.backend, &self.options, self.parallel) }
    fn push_endogenous(& mut self, storage : & mut dyn Storage) -> Result<()> { self.model.push_endogenous(storage, self.digits) }
    fn monitored_tables(&self) -> Vec<String> { self.model.catalog.endogenous_tables() }
}
