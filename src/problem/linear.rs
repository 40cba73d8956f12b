//! Flat linear problem handed to a solver backend.

use std::collections::HashMap;
use itertools::izip;

use crate::catalog::VariableCatalog;
use crate::error::{ModelError,Result};
use crate::expr::{Expr,CONST_TERM};
use crate::symbolic::{Relation,Sense};

/// A linear (or mixed integer linear) problem
/// ```text
/// min/max c'x + c0
/// such that lb <= A x <= ub
/// ```
/// where `x` are the columns. `A` is stored row-wise: row `i` consists of the local column
/// indexes `subj[ptr[i]..ptr[i+1]]` with coefficients `cof[ptr[i]..ptr[i+1]]`.
#[derive(Debug,Clone,PartialEq)]
pub struct LinearProblem {
    pub name    : String,
    pub sense   : Sense,
    /// Global decision column index of each local column, ascending
    pub columns : Vec<usize>,
    pub integer : Vec<bool>,
    pub c       : Vec<f64>,
    pub c0      : f64,
    pub ptr     : Vec<usize>,
    pub subj    : Vec<usize>,
    pub cof     : Vec<f64>,
    pub lb      : Vec<f64>,
    pub ub      : Vec<f64>,
}

impl LinearProblem {
    /// Assemble a problem from a 1x1 objective and constraints `e rel 0`.
    pub fn from_parts(name : &str, sense : Sense, objective : &Expr, constraints : &[(Expr,Relation)], catalog : &VariableCatalog) -> Result<LinearProblem> {
        if ! objective.is_scalar() {
            return Err(ModelError::expression(format!("Objective of '{}' has shape {:?}",name,objective.shape())));
        }
        let mut columns : Vec<usize> = objective.variables();
        for (e,_) in constraints.iter() {
            columns.extend(e.variables());
        }
        columns.sort();
        columns.dedup();
        let local : HashMap<usize,usize> = columns.iter().enumerate().map(|(i,&j)| (j,i)).collect();
        let integer = columns.iter().map(|&j| catalog.is_integer(j)).collect();

        let mut c = vec![0.0; columns.len()];
        let mut c0 = 0.0;
        let (js,cs) = objective.element(0);
        for (&j,&v) in js.iter().zip(cs.iter()) {
            if j == CONST_TERM { c0 += v; } else { c[local[&j]] += v; }
        }

        let mut ptr  = vec![0];
        let mut subj = Vec::new();
        let mut cof  = Vec::new();
        let mut lb   = Vec::new();
        let mut ub   = Vec::new();
        for (e,rel) in constraints.iter() {
            for (js,cs) in e.elements() {
                let mut k = 0.0;
                for (&j,&v) in js.iter().zip(cs.iter()) {
                    if j == CONST_TERM { k += v; }
                    else {
                        subj.push(local[&j]);
                        cof.push(v);
                    }
                }
                ptr.push(subj.len());
                let (l,u) = match rel {
                    Relation::Eq => (-k,-k),
                    Relation::Ge => (-k,f64::INFINITY),
                    Relation::Le => (f64::NEG_INFINITY,-k),
                };
                lb.push(l);
                ub.push(u);
            }
        }

        Ok(LinearProblem{ name : name.to_string(), sense, columns, integer, c, c0, ptr, subj, cof, lb, ub })
    }

    pub fn num_columns(&self) -> usize { self.columns.len() }
    pub fn num_rows(&self) -> usize { self.lb.len() }

    pub fn row(&self, i : usize) -> (&[usize],&[f64]) {
        let (p0,p1) = (self.ptr[i],self.ptr[i+1]);
        (&self.subj[p0..p1],&self.cof[p0..p1])
    }

    /// Iterate over rows as `(subj, cof, lb, ub)`.
    pub fn rows(&self) -> impl Iterator<Item = (&[usize],&[f64],f64,f64)> {
        izip!(0..self.num_rows(), self.lb.iter(), self.ub.iter())
            .map(|(i,&l,&u)| { let (j,c) = self.row(i); (j,c,l,u) })
    }

    /// Objective value at `x` (local column order).
    pub fn objective_value(&self, x : &[f64]) -> f64 {
        self.c0 + self.c.iter().zip(x.iter()).map(|(c,x)| c*x).sum::<f64>()
    }

    /// Largest bound violation at `x`.
    pub fn max_violation(&self, x : &[f64]) -> f64 {
        self.rows()
            .map(|(j,c,l,u)| {
                let v : f64 = j.iter().zip(c.iter()).map(|(&j,&c)| c*x[j]).sum();
                (l-v).max(v-u).max(0.0)
            })
            .fold(0.0, f64::max)
    }
}
