//! Affine expressions over decision variables.
//!
//! An [Expr] is a two-dimensional array of affine forms stored in a compressed format: element
//! `i` consists of the terms `asubj[aptr[i]..aptr[i+1]]`, `acof[aptr[i]..aptr[i+1]]`. Elements
//! are stored in row-major order. Variable index 0 is reserved: a term with subscript 0 is a
//! constant term.

mod eval;
mod add;
mod mul;

use itertools::izip;

use crate::matrix::NDArray;
use crate::utils::ChunksByIterExt;

/// Subscript used for constant terms.
pub const CONST_TERM : usize = 0;

#[derive(Clone,Debug,PartialEq)]
pub struct Expr {
    shape : [usize; 2],
    aptr  : Vec<usize>,
    asubj : Vec<usize>,
    acof  : Vec<f64>,
}

impl Expr {
    /// Create a new expression from data
    ///
    /// Arguments:
    /// * `shape` Shape of the expression. The number of elements (`aptr.len()-1`) must be equal to
    ///   the product of the dimensions.
    /// * `aptr` Ascending vector of indexes of the starting points of each element in `asubj` and
    ///   `acof`.
    /// * `asubj` Variable subscripts.
    /// * `acof`  Coefficients.
    pub fn new(shape : [usize;2],
               aptr  : Vec<usize>,
               asubj : Vec<usize>,
               acof  : Vec<f64>) -> Result<Expr,String> {
        if aptr.is_empty() {
            return Err("Invalid aptr".to_string());
        }
        if aptr.iter().zip(aptr[1..].iter()).any(|(a,b)| a > b) {
            return Err("Invalid aptr: Not sorted".to_string());
        }
        let sz = aptr[aptr.len()-1];
        if sz != asubj.len() || sz != acof.len() {
            return Err(format!("Mismatching aptr ({}) and lengths of asubj (= {}) and acof (= {})",sz,asubj.len(),acof.len()));
        }
        if shape[0]*shape[1] != aptr.len()-1 {
            return Err("Shape does not match number of elements".to_string());
        }
        Ok(Expr{ shape, aptr, asubj, acof })
    }

    /// Constant expression holding the values of `a`.
    pub fn from_array(a : &NDArray<2>) -> Expr {
        let data = a.to_vec();
        let n = data.len();
        Expr{
            shape : a.shape(),
            aptr  : (0..n+1).collect(),
            asubj : vec![CONST_TERM; n],
            acof  : data,
        }
    }

    /// Expression where element `i` is the variable `idxs[i]`.
    pub fn from_variables(shape : [usize;2], idxs : &[usize]) -> Result<Expr,String> {
        if shape[0]*shape[1] != idxs.len() {
            return Err(format!("Shape {:?} does not match {} variables",shape,idxs.len()));
        }
        if idxs.contains(&CONST_TERM) {
            return Err("Variable index 0 is reserved".to_string());
        }
        Ok(Expr{
            shape,
            aptr  : (0..idxs.len()+1).collect(),
            asubj : idxs.to_vec(),
            acof  : vec![1.0; idxs.len()],
        })
    }

    pub fn scalar(v : f64) -> Expr {
        Expr{ shape : [1,1], aptr : vec![0,1], asubj : vec![CONST_TERM], acof : vec![v] }
    }

    pub fn shape(&self) -> [usize;2] { self.shape }
    pub fn num_elements(&self) -> usize { self.aptr.len()-1 }
    pub fn is_scalar(&self) -> bool { self.shape == [1,1] }

    /// Terms of element `i`.
    pub fn element(&self, i : usize) -> (&[usize],&[f64]) {
        let (p0,p1) = (self.aptr[i],self.aptr[i+1]);
        (&self.asubj[p0..p1],&self.acof[p0..p1])
    }

    /// Iterate over the elements' terms.
    pub fn elements(&self) -> impl Iterator<Item = (&[usize],&[f64])> {
        izip!(self.asubj.chunks_ptr(&self.aptr), self.acof.chunks_ptr(&self.aptr))
    }

    /// True if the expression contains no variable terms.
    pub fn is_constant(&self) -> bool { self.asubj.iter().all(|&j| j == CONST_TERM) }

    /// Value of a constant expression.
    pub fn constant_value(&self) -> Option<NDArray<2>> {
        if ! self.is_constant() {
            None
        }
        else {
            NDArray::dense_from_iter(self.shape, self.elements().map(|(_,c)| c.iter().sum())).ok()
        }
    }

    /// Sorted, distinct variable subscripts appearing in the expression, the constant term excluded.
    pub fn variables(&self) -> Vec<usize> {
        let mut v : Vec<usize> = self.asubj.iter().filter(|&&j| j != CONST_TERM).cloned().collect();
        v.sort();
        v.dedup();
        v
    }

    pub fn dissolve(self) -> ([usize;2],Vec<usize>,Vec<usize>,Vec<f64>) { (self.shape,self.aptr,self.asubj,self.acof) }

    /// Build a new expression where element `i` is the linear combination `terms[i]` of this
    /// expression's elements, given as `(element index, factor)` pairs.
    pub fn combine(&self, shape : [usize;2], terms : &[Vec<(usize,f64)>]) -> Expr {
        assert_eq!(shape[0]*shape[1], terms.len());
        let mut aptr  = Vec::with_capacity(terms.len()+1);
        let mut asubj = Vec::new();
        let mut acof  = Vec::new();
        aptr.push(0);
        for t in terms.iter() {
            for &(src,f) in t.iter() {
                let (js,cs) = self.element(src);
                asubj.extend_from_slice(js);
                acof.extend(cs.iter().map(|c| c*f));
            }
            aptr.push(asubj.len());
        }
        Expr{ shape, aptr, asubj, acof }.eval_finalize()
    }

    /// Repeat a scalar expression to fill `shape`.
    pub fn broadcast(&self, shape : [usize;2]) -> Result<Expr,String> {
        if self.shape == shape {
            Ok(self.clone())
        }
        else if self.is_scalar() {
            Ok(self.combine(shape, &vec![vec![(0,1.0)]; shape[0]*shape[1]]))
        }
        else {
            Err(format!("Cannot broadcast shape {:?} to {:?}",self.shape,shape))
        }
    }
}
