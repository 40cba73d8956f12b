//! Variable declarations and their resolution against the set registry.
//!
//! A [VariableDecl] names a view of a table: which table dimension forms the rows, which forms
//! the columns, and how the remaining dimensions are enumerated. [resolve] partitions the
//! table coordinates into rows, columns, at most one intra dimension, and any number of inter
//! (splitting) dimensions, producing a [ResolvedVariable].

pub mod resolve;
pub mod constant;

pub use resolve::*;
pub use constant::ConstantKind;

use std::collections::BTreeMap;

use crate::sets::ItemFilter;

/// Row or column specification of a variable.
#[derive(Debug,Clone,PartialEq,Eq)]
pub enum ShapeSpec {
    /// Literal size 1
    One,
    /// Items of the named dimension
    Dim(String),
}

impl ShapeSpec {
    pub fn dim(&self) -> Option<&str> {
        match self {
            ShapeSpec::One => None,
            ShapeSpec::Dim(d) => Some(d.as_str())
        }
    }
}

impl From<Option<&str>> for ShapeSpec {
    fn from(v : Option<&str>) -> ShapeSpec {
        match v {
            None | Some("1") => ShapeSpec::One,
            Some(d) => ShapeSpec::Dim(d.to_string())
        }
    }
}

/// Declared variable, attached to a table.
#[derive(Debug,Clone,PartialEq)]
pub struct VariableDecl {
    pub symbol   : String,
    pub rows     : ShapeSpec,
    pub cols     : ShapeSpec,
    /// Literal kind, for variables of constant tables
    pub value    : Option<ConstantKind>,
    /// Per-coordinate item restrictions
    pub filters  : BTreeMap<String,ItemFilter>,
}

impl VariableDecl {
    pub fn new(symbol : &str, rows : Option<&str>, cols : Option<&str>) -> VariableDecl {
        VariableDecl{
            symbol  : symbol.to_string(),
            rows    : rows.into(),
            cols    : cols.into(),
            value   : None,
            filters : BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, kind : ConstantKind) -> VariableDecl { self.value = Some(kind); self }

    pub fn with_filter(mut self, dim : &str, filter : ItemFilter) -> VariableDecl {
        self.filters.insert(dim.to_string(), filter);
        self
    }
}
