//! Binding symbolic expressions to concrete variable bindings.
//!
//! Compilation turns one expression text into a list of [ConcreteExpression]s for one
//! sub-problem: one instance if no referenced variable has an intra dimension, otherwise one
//! instance per item of the common intra dimension. Each instance is a typed [Node] tree whose
//! leaves are binding ids; shapes and linearity are checked here, numeric values are only
//! looked up when the tree is lowered.

use std::collections::HashMap;
use tracing::debug;

use crate::catalog::{BindingId,BindingValue,VariableCatalog};
use crate::error::{ModelError,Result};
use crate::matrix::NDArray;
use crate::sets::SubProblemKey;
use super::functions::{self,Func};
use super::parser::{self,Ast,BinOp,Relation,Statement};

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum Sense {
    Minimize,
    Maximize,
}

#[derive(Debug,Clone,PartialEq)]
pub enum NodeKind {
    Number(f64),
    Binding(BindingId),
    /// Value computed at compile time
    Data(NDArray<2>),
    Neg(Box<Node>),
    Add(Box<Node>,Box<Node>),
    Sub(Box<Node>,Box<Node>),
    /// Product where one of the operands is 1x1
    Scale(Box<Node>,Box<Node>),
    MatMul(Box<Node>,Box<Node>),
    ElemMul(Box<Node>,Box<Node>),
    Transpose(Box<Node>),
    Diag(Box<Node>),
    Sum(Box<Node>,Option<usize>),
    Shift(Box<Node>,i64),
    Pow(Box<Node>,f64),
    Minv(Box<Node>),
    /// Weibull distribution of length `n`; scale and shape are 1x1 data nodes
    Weibull{ scale : Box<Node>, shape : Box<Node>, n : usize, dims : usize },
}

/// Typed expression tree.
#[derive(Debug,Clone,PartialEq)]
pub struct Node {
    pub shape  : [usize;2],
    /// True if the subtree contains decision variables
    pub linear : bool,
    pub kind   : NodeKind,
}

impl Node {
    fn new(shape : [usize;2], linear : bool, kind : NodeKind) -> Node { Node{ shape, linear, kind } }
    pub fn is_scalar(&self) -> bool { self.shape == [1,1] }
}

#[derive(Debug,Clone,PartialEq)]
pub enum ConcreteForm {
    Constraint{ lhs : Node, rel : Relation, rhs : Node },
    Objective{ sense : Sense, expr : Node },
    Value(Node),
}

/// One compiled instance of a symbolic expression.
#[derive(Debug,Clone,PartialEq)]
pub struct ConcreteExpression {
    pub text  : String,
    /// Item of the common intra dimension this instance is bound to
    pub intra : Option<String>,
    pub form  : ConcreteForm,
}

pub struct ExpressionCompiler<'a> {
    catalog : &'a VariableCatalog,
}

impl<'a> ExpressionCompiler<'a> {
    pub fn new(catalog : &'a VariableCatalog) -> ExpressionCompiler<'a> { ExpressionCompiler{ catalog } }

    /// Compile `text` for sub-problem `key`.
    ///
    /// Returns an empty list if some referenced variable has no binding in this sub-problem.
    pub fn compile(&self, text : &str, key : &SubProblemKey) -> Result<Vec<ConcreteExpression>> {
        let stmt = parser::parse(text)?;
        let idents = stmt.identifiers();

        let mut intra_dim : Option<(&str,&str,&[String])> = None;
        for id in idents.iter() {
            let var = self.catalog.variable(id)
                .ok_or_else(|| ModelError::expression(format!("Unknown identifier '{}' in '{}'",id,text)))?;
            if var.is_constant() { continue; }
            if let (Some(d),Some(items)) = (var.coords.intra.as_deref(),var.intra_items()) {
                match intra_dim {
                    None => intra_dim = Some((id.as_str(),d,items)),
                    Some((other,d0,_)) if d0 != d =>
                        return Err(ModelError::conceptual(format!(
                            "'{}': variables '{}' and '{}' have different intra dimensions ('{}' and '{}')",text,other,id,d0,d))),
                    Some((other,_,items0)) if items0 != items =>
                        return Err(ModelError::conceptual(format!(
                            "'{}': variables '{}' and '{}' use different items of intra dimension '{}'",text,other,id,d))),
                    _ => {}
                }
            }
        }

        let items : Vec<Option<&str>> = match intra_dim {
            None => vec![None],
            Some((_,_,items)) => items.iter().map(|s| Some(s.as_str())).collect(),
        };

        let mut res = Vec::with_capacity(items.len());
        for item in items {
            let Some(bindings) = self.bind(&idents, text, key, item)? else { continue };
            let form = self.form(&stmt, &bindings, text)?;
            res.push(ConcreteExpression{ text : text.to_string(), intra : item.map(|s| s.to_string()), form });
        }
        debug!(expression = text, sub_problem = %key, instances = res.len(), "compiled");
        Ok(res)
    }

    /// Pick exactly one binding per identifier. `None` if some identifier has no binding.
    fn bind(&self, idents : &std::collections::BTreeSet<String>, text : &str, key : &SubProblemKey, item : Option<&str>) -> Result<Option<HashMap<String,BindingId>>> {
        let mut res = HashMap::new();
        for id in idents.iter() {
            let var = self.catalog.variable(id)
                .ok_or_else(|| ModelError::expression(format!("Unknown identifier '{}' in '{}'",id,text)))?;
            let restrict = if var.is_constant() || var.coords.intra.is_none() { None } else { item };
            let c = self.catalog.candidates(id, key, restrict);
            match c.len() {
                0 => {
                    debug!(expression = text, variable = %id, sub_problem = %key, "no binding, expression skipped");
                    return Ok(None);
                },
                1 => { res.insert(id.clone(), c[0]); },
                n => return Err(ModelError::expression(format!(
                    "Ambiguous binding: '{}' has {} bindings in sub-problem {} for '{}'",id,n,key,text))),
            }
        }
        Ok(Some(res))
    }

    fn form(&self, stmt : &Statement, bindings : &HashMap<String,BindingId>, text : &str) -> Result<ConcreteForm> {
        match stmt {
            Statement::Relation{ lhs, rel, rhs } => {
                let l = self.node(lhs, bindings, text)?;
                let r = self.node(rhs, bindings, text)?;
                if l.shape != r.shape && ! l.is_scalar() && ! r.is_scalar() {
                    return Err(ModelError::expression(format!("'{}': mismatching shapes {:?} and {:?} in relation",text,l.shape,r.shape)));
                }
                Ok(ConcreteForm::Constraint{ lhs : l, rel : *rel, rhs : r })
            },
            Statement::Expr(Ast::Call{ func : f @ (Func::Minimize | Func::Maximize), args }) => {
                let e = self.node(&args[0], bindings, text)?;
                if ! e.is_scalar() {
                    return Err(ModelError::expression(format!("'{}': objective must be a scalar, got shape {:?}",text,e.shape)));
                }
                let sense = if *f == Func::Minimize { Sense::Minimize } else { Sense::Maximize };
                Ok(ConcreteForm::Objective{ sense, expr : e })
            },
            Statement::Expr(e) => Ok(ConcreteForm::Value(self.node(e, bindings, text)?)),
        }
    }

    fn node(&self, ast : &Ast, bindings : &HashMap<String,BindingId>, text : &str) -> Result<Node> {
        let err = |msg : String| ModelError::expression(format!("'{}': {}",text,msg));
        match ast {
            Ast::Number(v) => Ok(Node::new([1,1], false, NodeKind::Number(*v))),
            Ast::Ident(id) => {
                let &b = bindings.get(id).ok_or_else(|| err(format!("unknown identifier '{}'",id)))?;
                let binding = self.catalog.binding(b);
                let linear = matches!(binding.value, BindingValue::Slice{..});
                Ok(Node::new(binding.shape, linear, NodeKind::Binding(b)))
            },
            Ast::Neg(e) => {
                let e = self.node(e, bindings, text)?;
                Ok(Node::new(e.shape, e.linear, NodeKind::Neg(Box::new(e))))
            },
            Ast::Binary{ op, lhs, rhs } => {
                let l = self.node(lhs, bindings, text)?;
                let r = self.node(rhs, bindings, text)?;
                let linear = l.linear || r.linear;
                match op {
                    BinOp::Add | BinOp::Sub => {
                        let shape = broadcast_shape(l.shape, r.shape).ok_or_else(|| err(format!("cannot add shapes {:?} and {:?}",l.shape,r.shape)))?;
                        let kind = if *op == BinOp::Add { NodeKind::Add(Box::new(l),Box::new(r)) } else { NodeKind::Sub(Box::new(l),Box::new(r)) };
                        Ok(Node::new(shape, linear, kind))
                    },
                    BinOp::Mul | BinOp::MatMul => {
                        if l.linear && r.linear {
                            return Err(err("product of two expressions containing decision variables".to_string()));
                        }
                        if *op == BinOp::Mul && (l.is_scalar() || r.is_scalar()) {
                            let shape = if l.is_scalar() { r.shape } else { l.shape };
                            Ok(Node::new(shape, linear, NodeKind::Scale(Box::new(l),Box::new(r))))
                        }
                        else if l.shape[1] == r.shape[0] {
                            Ok(Node::new([l.shape[0],r.shape[1]], linear, NodeKind::MatMul(Box::new(l),Box::new(r))))
                        }
                        else {
                            Err(err(format!("cannot multiply shapes {:?} and {:?}",l.shape,r.shape)))
                        }
                    },
                }
            },
            Ast::Call{ func, args } => self.call(*func, args, bindings, text),
        }
    }

    fn call(&self, func : Func, args : &[Ast], bindings : &HashMap<String,BindingId>, text : &str) -> Result<Node> {
        let err = |msg : String| ModelError::expression(format!("'{}': {}",text,msg));
        let literal = |i : usize| args[i].literal().ok_or_else(|| err(format!("argument {} of {}() must be a number",i+1,func.name())));
        let integer = |i : usize| -> Result<i64> {
            let v = literal(i)?;
            if v.fract() != 0.0 { Err(err(format!("argument {} of {}() must be an integer",i+1,func.name()))) } else { Ok(v as i64) }
        };

        match func {
            Func::Minimize | Func::Maximize =>
                Err(err(format!("{}() can only appear as an objective",func.name()))),
            Func::Weibull => {
                let dims = integer(3)?;
                if dims != 1 && dims != 2 {
                    return Err(err(format!("weib() dims must be 1 or 2, got {}",dims)));
                }
                let dims = dims as usize;
                let n = if args[2].literal().is_some() {
                    let n = integer(2)?;
                    if n <= 0 { return Err(err("weib() needs a positive range".to_string())); }
                    n as usize
                }
                else {
                    let r = self.node(&args[2], bindings, text)?;
                    if r.linear || (r.shape[0] != 1 && r.shape[1] != 1) {
                        return Err(err(format!("weib() range must be a data vector, got shape {:?}",r.shape)));
                    }
                    r.shape[0]*r.shape[1]
                };
                if n > functions::MAX_WEIBULL_RANGE {
                    return Err(err(format!("weib() range {} is longer than {}",n,functions::MAX_WEIBULL_RANGE)));
                }

                if let (Some(scale),Some(shape)) = (args[0].literal(),args[1].literal()) {
                    let v = functions::weibull(scale, shape, n, dims)?;
                    return Ok(Node::new(v.shape(), false, NodeKind::Data(v)));
                }
                let factor = |i : usize| -> Result<Box<Node>> {
                    let e = self.node(&args[i], bindings, text)?;
                    if e.linear || ! e.is_scalar() {
                        return Err(err(format!("argument {} of weib() must be a 1x1 data value, got shape {:?}",i+1,e.shape)));
                    }
                    Ok(Box::new(e))
                };
                let (scale,shape) = (factor(0)?,factor(1)?);
                let out = if dims == 1 { [n,1] } else { [n,n] };
                Ok(Node::new(out, false, NodeKind::Weibull{ scale, shape, n, dims }))
            },
            Func::Transpose => {
                let e = self.node(&args[0], bindings, text)?;
                Ok(Node::new([e.shape[1],e.shape[0]], e.linear, NodeKind::Transpose(Box::new(e))))
            },
            Func::Diag => {
                let e = self.node(&args[0], bindings, text)?;
                let [m,n] = e.shape;
                let shape =
                    if m == 1 || n == 1 { [m*n,m*n] }
                    else if m == n { [n,1] }
                    else { return Err(err(format!("diag() needs a vector or a square matrix, got {:?}",e.shape))); };
                Ok(Node::new(shape, e.linear, NodeKind::Diag(Box::new(e))))
            },
            Func::Sum => {
                let e = self.node(&args[0], bindings, text)?;
                let axis = if args.len() > 1 { Some(integer(1)?) } else { None };
                let [m,n] = e.shape;
                let (shape,axis) = match axis {
                    None => ([1,1],None),
                    Some(0) => ([1,n],Some(0)),
                    Some(1) => ([m,1],Some(1)),
                    Some(a) => return Err(err(format!("invalid axis {} for sum()",a))),
                };
                Ok(Node::new(shape, e.linear, NodeKind::Sum(Box::new(e),axis)))
            },
            Func::Multiply => {
                let l = self.node(&args[0], bindings, text)?;
                let r = self.node(&args[1], bindings, text)?;
                if l.linear && r.linear {
                    return Err(err("product of two expressions containing decision variables".to_string()));
                }
                let shape = broadcast_shape(l.shape, r.shape).ok_or_else(|| err(format!("cannot multiply shapes {:?} and {:?} element-wise",l.shape,r.shape)))?;
                let linear = l.linear || r.linear;
                Ok(Node::new(shape, linear, NodeKind::ElemMul(Box::new(l),Box::new(r))))
            },
            Func::Shift => {
                let e = self.node(&args[0], bindings, text)?;
                let k = integer(1)?;
                Ok(Node::new(e.shape, e.linear, NodeKind::Shift(Box::new(e),k)))
            },
            Func::Pow => {
                let e = self.node(&args[0], bindings, text)?;
                if e.linear {
                    return Err(err("pow() of an expression containing decision variables".to_string()));
                }
                let p = literal(1)?;
                Ok(Node::new(e.shape, false, NodeKind::Pow(Box::new(e),p)))
            },
            Func::Minv => {
                let e = self.node(&args[0], bindings, text)?;
                if e.linear {
                    return Err(err("minv() of an expression containing decision variables".to_string()));
                }
                if e.shape[0] != e.shape[1] {
                    return Err(err(format!("minv() needs a square matrix, got {:?}",e.shape)));
                }
                Ok(Node::new(e.shape, false, NodeKind::Minv(Box::new(e))))
            },
        }
    }
}

/// Result shape of an element-wise operation, where a 1x1 operand is broadcast.
fn broadcast_shape(a : [usize;2], b : [usize;2]) -> Option<[usize;2]> {
    if a == b || b == [1,1] { Some(a) }
    else if a == [1,1] { Some(b) }
    else { None }
}
