//! YAML model description and run settings.
//!
//! A [ModelConfig] declares the sets, the tables with their variables and the symbolic
//! model(s). It is only a description: [ModelConfig::registry] and [ModelConfig::tables] turn
//! it into the typed declarations, and validate it on the way.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use serde::{Deserialize,Serialize};
use tracing::debug;

use crate::convergence::ConvergenceLoop;
use crate::error::{ModelError,Result};
use crate::problem::SymbolicModel;
use crate::sets::{Dimension,ItemFilter,SetRegistry};
use crate::solver::SolveOptions;
use crate::table::{TableDecl,TableKind,VarType};
use crate::variable::{ConstantKind,ShapeSpec,VariableDecl};

fn read_file(path : &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|source| ModelError::Io{ context : format!("reading {}",path.display()), source })
}

#[derive(Debug,Clone,Default,PartialEq,Serialize,Deserialize)]
pub struct SetConfig {
    pub symbol        : String,
    #[serde(default)]
    pub table_name    : Option<String>,
    #[serde(default, alias = "splits_problem")]
    pub split_problem : bool,
    #[serde(default)]
    pub items         : Vec<String>,
    /// item -> category
    #[serde(default)]
    pub categories    : BTreeMap<String,String>,
    /// item -> parent item in another set
    #[serde(default)]
    pub aggregation   : BTreeMap<String,String>,
    /// filter name -> item -> value
    #[serde(default)]
    pub filters       : BTreeMap<String,BTreeMap<String,String>>,
    /// Take the items of another set
    #[serde(default)]
    pub copy_from     : Option<String>,
}

/// Table type: a single kind, or one kind per sub-problem label.
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
#[serde(untagged)]
pub enum TableTypeConfig {
    Fixed(TableKind),
    PerSubProblem(BTreeMap<String,TableKind>),
}

/// Row or column spec: a dimension name or the number 1.
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
#[serde(untagged)]
pub enum ShapeConfig {
    Number(u64),
    Name(String),
}

#[derive(Debug,Clone,Default,PartialEq,Serialize,Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub category : Option<String>,
    /// filter name -> accepted values
    #[serde(flatten)]
    pub values   : BTreeMap<String,Vec<String>>,
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct VariableConfig {
    pub symbol  : String,
    #[serde(default)]
    pub rows    : Option<ShapeConfig>,
    #[serde(default)]
    pub cols    : Option<ShapeConfig>,
    #[serde(default)]
    pub value   : Option<ConstantKind>,
    #[serde(default)]
    pub filters : BTreeMap<String,FilterConfig>,
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct TableConfig {
    pub name        : String,
    #[serde(rename = "type")]
    pub kind        : TableTypeConfig,
    #[serde(default)]
    pub coordinates : Vec<String>,
    #[serde(default)]
    pub integer     : bool,
    #[serde(default)]
    pub variables   : Vec<VariableConfig>,
}

#[derive(Debug,Clone,Default,PartialEq,Serialize,Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub sets     : Vec<SetConfig>,
    #[serde(default)]
    pub tables   : Vec<TableConfig>,
    /// A single, unnamed symbolic model
    #[serde(default)]
    pub problem  : Option<SymbolicModel>,
    /// Named symbolic models
    #[serde(default)]
    pub problems : BTreeMap<String,SymbolicModel>,
}

/// Name used for the model given under `problem`.
pub const DEFAULT_MODEL : &str = "default";

fn shape_spec(symbol : &str, s : &Option<ShapeConfig>) -> Result<ShapeSpec> {
    match s {
        None | Some(ShapeConfig::Number(1)) => Ok(ShapeSpec::One),
        Some(ShapeConfig::Number(n)) => Err(ModelError::config(format!("Variable '{}': size must be 1 or a dimension, got {}",symbol,n))),
        Some(ShapeConfig::Name(n)) => Ok(Some(n.as_str()).into()),
    }
}

impl ModelConfig {
    pub fn from_yaml_str(text : &str) -> Result<ModelConfig> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_file<P : AsRef<Path>>(path : P) -> Result<ModelConfig> {
        let path = path.as_ref();
        let cfg = ModelConfig::from_yaml_str(&read_file(path)?)?;
        debug!(path = %path.display(), sets = cfg.sets.len(), tables = cfg.tables.len(), "model configuration loaded");
        Ok(cfg)
    }

    /// Build the set registry. `copy_from` references are followed, in any declaration order.
    pub fn registry(&self) -> Result<SetRegistry> {
        let by_symbol : BTreeMap<&str,&SetConfig> = self.sets.iter().map(|s| (s.symbol.as_str(),s)).collect();
        let mut reg = SetRegistry::new();
        for s in self.sets.iter() {
            let mut src = s;
            let mut depth = 0;
            while let Some(ref other) = src.copy_from {
                src = by_symbol.get(other.as_str()).copied()
                    .ok_or_else(|| ModelError::config(format!("Set '{}': copy_from references unknown set '{}'",s.symbol,other)))?;
                depth += 1;
                if depth > self.sets.len() {
                    return Err(ModelError::config(format!("Set '{}': cyclic copy_from",s.symbol)));
                }
            }
            let mut dim = Dimension::new(&s.symbol, &[]);
            dim.items = src.items.clone();
            if let Some(ref t) = s.table_name { dim.table_name = t.clone(); }
            dim.splits_problem = s.split_problem;
            dim.categories = s.categories.clone();
            dim.aggregation = s.aggregation.clone();
            dim.filters = s.filters.clone();
            reg.insert(dim)?;
        }
        Ok(reg)
    }

    /// Typed table declarations, checked against `sets`.
    pub fn tables(&self, sets : &SetRegistry) -> Result<Vec<TableDecl>> {
        let keys = sets.sub_problem_keys();
        let mut res = Vec::with_capacity(self.tables.len());
        for t in self.tables.iter() {
            if let Some(d) = t.coordinates.iter().find(|d| ! sets.contains(d)) {
                return Err(ModelError::config(format!("Table '{}': unknown dimension '{}'",t.name,d)));
            }
            let kind = match &t.kind {
                TableTypeConfig::Fixed(k) => VarType::Fixed(*k),
                TableTypeConfig::PerSubProblem(m) => {
                    let mut res = BTreeMap::new();
                    for (label,k) in m.iter() {
                        let key = keys.iter().find(|key| key.label() == *label)
                            .ok_or_else(|| ModelError::config(format!("Table '{}': '{}' is not a sub-problem",t.name,label)))?;
                        res.insert(key.clone(), *k);
                    }
                    VarType::PerSubProblem(res)
                },
            };
            let mut decl = TableDecl{
                name        : t.name.clone(),
                kind,
                coordinates : t.coordinates.clone(),
                integer     : t.integer,
                variables   : Vec::new(),
            };
            for v in t.variables.iter() {
                let mut vd = VariableDecl{
                    symbol  : v.symbol.clone(),
                    rows    : shape_spec(&v.symbol, &v.rows)?,
                    cols    : shape_spec(&v.symbol, &v.cols)?,
                    value   : v.value,
                    filters : BTreeMap::new(),
                };
                for (d,f) in v.filters.iter() {
                    vd = vd.with_filter(d, ItemFilter{ category : f.category.clone(), values : f.values.clone() });
                }
                decl.variables.push(vd);
            }
            res.push(decl);
        }
        Ok(res)
    }

    /// The symbolic models by name. A model given under `problem` is named [DEFAULT_MODEL].
    pub fn models(&self) -> Result<BTreeMap<String,SymbolicModel>> {
        match (&self.problem,self.problems.is_empty()) {
            (Some(_),false) => Err(ModelError::config("Both 'problem' and 'problems' are given")),
            (Some(p),true) => Ok([(DEFAULT_MODEL.to_string(),p.clone())].into_iter().collect()),
            (None,false) => Ok(self.problems.clone()),
            (None,true) => Ok([(DEFAULT_MODEL.to_string(),SymbolicModel::default())].into_iter().collect()),
        }
    }
}

/// Run settings.
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backend specific solver selection
    pub solver                 : Option<String>,
    pub verbose                : bool,
    /// Iterate coupled sub-problems to a fixed point
    pub integrated             : bool,
    pub tolerance              : f64,
    pub max_iterations         : usize,
    pub solve_deadline_secs    : Option<f64>,
    pub iteration_timeout_secs : Option<f64>,
    pub parallel               : bool,
    /// Decimals kept when values are written to storage
    pub round_digits           : u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings{
            solver                 : None,
            verbose                : false,
            integrated             : false,
            tolerance              : 0.01,
            max_iterations         : 20,
            solve_deadline_secs    : None,
            iteration_timeout_secs : None,
            parallel               : true,
            round_digits           : 5,
        }
    }
}

impl Settings {
    pub fn from_yaml_str(text : &str) -> Result<Settings> {
        let s : Settings = serde_yaml::from_str(text)?;
        s.validate()?;
        Ok(s)
    }

    pub fn from_file<P : AsRef<Path>>(path : P) -> Result<Settings> {
        Settings::from_yaml_str(&read_file(path.as_ref())?)
    }

    pub fn validate(&self) -> Result<()> {
        if ! (self.tolerance >= 0.0) {
            return Err(ModelError::config(format!("tolerance must be non-negative, got {}",self.tolerance)));
        }
        if self.max_iterations == 0 {
            return Err(ModelError::config("max_iterations must be at least 1"));
        }
        for (name,v) in [("solve_deadline_secs",self.solve_deadline_secs),("iteration_timeout_secs",self.iteration_timeout_secs)] {
            if let Some(v) = v {
                if ! (v > 0.0) || ! v.is_finite() {
                    return Err(ModelError::config(format!("{} must be positive, got {}",name,v)));
                }
            }
        }
        Ok(())
    }

    pub fn solve_options(&self) -> SolveOptions {
        SolveOptions{
            solver     : self.solver.clone(),
            time_limit : self.solve_deadline_secs.map(Duration::from_secs_f64),
            verbose    : self.verbose,
        }
    }

    pub fn convergence_loop(&self) -> ConvergenceLoop {
        let l = ConvergenceLoop::new(self.tolerance, self.max_iterations);
        match self.iteration_timeout_secs {
            Some(t) => l.with_iteration_timeout(Duration::from_secs_f64(t)),
            None => l,
        }
    }
}
