//! Table declarations and coordinate enumeration.

use std::collections::BTreeMap;
use itertools::Itertools;
use serde::{Deserialize,Serialize};

use crate::error::{ModelError,Result};
use crate::sets::{SetRegistry,SubProblemKey};
use crate::variable::VariableDecl;

/// How the values of a table come into being.
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,Serialize,Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    /// Computed from a literal constant kind
    Constant,
    /// Read from storage
    Exogenous,
    /// Decided by the solver and written back to storage
    Endogenous,
}

/// Storage kind of a table, either fixed or chosen per sub-problem.
#[derive(Debug,Clone,PartialEq)]
pub enum VarType {
    Fixed(TableKind),
    PerSubProblem(BTreeMap<SubProblemKey,TableKind>),
}

impl VarType {
    /// Kind used when building `key`.
    pub fn kind_for(&self, key : &SubProblemKey) -> Result<TableKind> {
        match self {
            VarType::Fixed(k) => Ok(*k),
            VarType::PerSubProblem(m) => m.get(key).copied()
                .ok_or_else(|| ModelError::config(format!("No table type given for sub-problem {}",key)))
        }
    }

    pub fn is_constant(&self) -> bool { matches!(self, VarType::Fixed(TableKind::Constant)) }

    /// True if the table is endogenous in at least one sub-problem.
    pub fn has_endogenous(&self) -> bool {
        match self {
            VarType::Fixed(k) => *k == TableKind::Endogenous,
            VarType::PerSubProblem(m) => m.values().any(|k| *k == TableKind::Endogenous),
        }
    }

    pub fn has_exogenous(&self) -> bool {
        match self {
            VarType::Fixed(k) => *k == TableKind::Exogenous,
            VarType::PerSubProblem(m) => m.values().any(|k| *k == TableKind::Exogenous),
        }
    }
}

/// A relation keyed by the cartesian product of its coordinate dimensions.
#[derive(Debug,Clone)]
pub struct TableDecl {
    pub name        : String,
    pub kind        : VarType,
    pub coordinates : Vec<String>,
    pub integer     : bool,
    pub variables   : Vec<VariableDecl>,
}

impl TableDecl {
    pub fn new(name : &str, kind : TableKind, coordinates : &[&str]) -> TableDecl {
        TableDecl{
            name        : name.to_string(),
            kind        : VarType::Fixed(kind),
            coordinates : coordinates.iter().map(|s| s.to_string()).collect(),
            integer     : false,
            variables   : Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind : VarType) -> TableDecl { self.kind = kind; self }
    pub fn integer(mut self) -> TableDecl { self.integer = true; self }
    pub fn with_variable(mut self, v : VariableDecl) -> TableDecl { self.variables.push(v); self }

    /// Splitting dimensions among the table coordinates, in coordinate order.
    pub fn split_dims(&self, sets : &SetRegistry) -> Vec<String> {
        self.coordinates.iter().filter(|d| sets.is_splitting(d)).cloned().collect()
    }

    /// Full coordinate enumeration: one entry per table row, each holding one item per
    /// coordinate in coordinate order. Rows are enumerated in C order over the coordinates.
    pub fn enumerate(&self, sets : &SetRegistry) -> Result<Vec<Vec<String>>> {
        let dims = self.coordinates.iter().map(|d| sets.get(d)).collect::<Result<Vec<_>>>()?;
        if dims.is_empty() {
            return Ok(vec![Vec::new()]);
        }
        Ok(dims.iter()
            .map(|d| d.items.iter().cloned())
            .multi_cartesian_product()
            .collect())
    }

    /// Coordinate enumeration grouped by block key. The block key is the projection of the
    /// row onto the splitting coordinates; an unsplit table has a single default key.
    pub fn enumerate_blocks(&self, sets : &SetRegistry) -> Result<Vec<(SubProblemKey,Vec<Vec<String>>)>> {
        let split : Vec<usize> = self.coordinates.iter().enumerate()
            .filter(|(_,d)| sets.is_splitting(d))
            .map(|(i,_)| i)
            .collect();
        let mut blocks : Vec<(SubProblemKey,Vec<Vec<String>>)> = Vec::new();
        for row in self.enumerate(sets)? {
            let key = SubProblemKey::new(split.iter().map(|&i| (self.coordinates[i].clone(),row[i].clone())).collect());
            if let Some(b) = blocks.iter_mut().find(|b| b.0 == key) {
                b.1.push(row);
            }
            else {
                blocks.push((key,vec![row]));
            }
        }
        Ok(blocks)
    }
}
