//! Evaluation of compiled nodes into affine expressions.

use crate::catalog::{BindingValue,VariableCatalog};
use crate::error::{ModelError,Result};
use crate::expr::Expr;
use crate::matrix::NDArray;
use super::compile::{Node,NodeKind};
use super::functions;

fn expr_err(e : String) -> ModelError { ModelError::expression(e) }

/// Evaluate `node` with the current values in `catalog`.
pub fn lower(node : &Node, catalog : &VariableCatalog) -> Result<Expr> {
    match &node.kind {
        NodeKind::Number(v) => Ok(Expr::scalar(*v)),
        NodeKind::Data(a) => Ok(Expr::from_array(a)),
        NodeKind::Binding(b) => {
            let binding = catalog.binding(*b);
            match &binding.value {
                BindingValue::Slice{ idxs, .. } => Expr::from_variables(binding.shape, idxs).map_err(expr_err),
                BindingValue::Parameter(p) => Ok(Expr::from_array(catalog.parameter_value(*p)?)),
                BindingValue::Constant(c) => Ok(Expr::from_array(catalog.constant(*c))),
            }
        },
        NodeKind::Neg(e) => Ok(lower(e, catalog)?.neg()),
        NodeKind::Add(l,r) => lower(l, catalog)?.add(lower(r, catalog)?).map_err(expr_err),
        NodeKind::Sub(l,r) => lower(l, catalog)?.sub(lower(r, catalog)?).map_err(expr_err),
        NodeKind::Scale(l,r) | NodeKind::ElemMul(l,r) => {
            // the data operand becomes the array factor
            let (e,a) = if l.linear { (l,r) } else { (r,l) };
            lower(e, catalog)?.mul_elem(&value(a, catalog)?).map_err(expr_err)
        },
        NodeKind::MatMul(l,r) =>
            if l.linear {
                lower(l, catalog)?.mul_right(&value(r, catalog)?).map_err(expr_err)
            }
            else {
                lower(r, catalog)?.mul_left(&value(l, catalog)?).map_err(expr_err)
            },
        NodeKind::Transpose(e) => Ok(lower(e, catalog)?.transpose()),
        NodeKind::Diag(e) => lower(e, catalog)?.diag().map_err(expr_err),
        NodeKind::Sum(e,None) => Ok(lower(e, catalog)?.sum()),
        NodeKind::Sum(e,Some(axis)) => lower(e, catalog)?.sum_axis(*axis).map_err(expr_err),
        NodeKind::Shift(e,k) => Ok(lower(e, catalog)?.shift(*k)),
        NodeKind::Pow(e,p) => {
            let p = *p;
            Ok(Expr::from_array(&value(e, catalog)?.map(|v| v.powf(p))))
        },
        NodeKind::Minv(e) => {
            let inv = value(e, catalog)?.inverse().map_err(expr_err)?;
            Ok(Expr::from_array(&inv))
        },
        NodeKind::Weibull{ scale, shape, n, dims } => {
            let (sc,sh) = (value(scale, catalog)?.get(0,0),value(shape, catalog)?.get(0,0));
            Ok(Expr::from_array(&functions::weibull(sc, sh, *n, *dims)?))
        },
    }
}

/// Numeric value of a node without decision variables.
pub fn value(node : &Node, catalog : &VariableCatalog) -> Result<NDArray<2>> {
    lower(node, catalog)?
        .constant_value()
        .ok_or_else(|| ModelError::expression("Expected an expression without decision variables"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sets::{Dimension,SetRegistry,SubProblemKey};
    use crate::symbolic::{ConcreteForm,ExpressionCompiler};
    use crate::table::{TableDecl,TableKind};
    use crate::variable::{ConstantKind,VariableDecl};
    use crate::matrix;

    #[test]
    fn lower_with_parameters() {
        let mut r = SetRegistry::new();
        r.insert(Dimension::new("A", &["a1","a2"])).unwrap();
        let tables = vec![
            TableDecl::new("Y", TableKind::Endogenous, &["A"]).with_variable(VariableDecl::new("y", Some("A"), None)),
            TableDecl::new("P", TableKind::Exogenous, &["A"]).with_variable(VariableDecl::new("p", Some("A"), None)),
            TableDecl::new("L", TableKind::Constant, &["A"]).with_variable(VariableDecl::new("L", Some("A"), Some("A")).with_value(ConstantKind::LowerTriangular)),
        ];
        let mut cat = VariableCatalog::build(&tables, &r).unwrap();
        let c = ExpressionCompiler::new(&cat);
        let res = c.compile("L @ y - mult(p, 2) == 0", &SubProblemKey::default_key()).unwrap();
        let ConcreteForm::Constraint{ lhs, .. } = &res[0].form else { panic!("expected a constraint") };

        // no data for p yet
        assert!(lower(lhs, &cat).is_err());
        cat.set_parameter(0, matrix::dense([2,1], vec![1.0,3.0])).unwrap();
        let e = lower(lhs, &cat).unwrap();
        assert_eq!(e.shape(), [2,1]);
        // row 0: y1 - 2, row 1: y1 + y2 - 6
        assert_eq!(e.element(0), (&[0usize,1][..],&[-2.0,1.0][..]));
        assert_eq!(e.element(1), (&[0usize,1,2][..],&[-6.0,1.0,1.0][..]));
    }

    #[test]
    fn weibull_from_parameters() {
        let mut r = SetRegistry::new();
        r.insert(Dimension::new("A", &["a1","a2"])).unwrap();
        let tables = vec![
            TableDecl::new("Y", TableKind::Endogenous, &["A"]).with_variable(VariableDecl::new("y", Some("A"), None)),
            TableDecl::new("P", TableKind::Exogenous, &["A"]).with_variable(VariableDecl::new("p", Some("A"), None)),
        ];
        let mut cat = VariableCatalog::build(&tables, &r).unwrap();
        let c = ExpressionCompiler::new(&cat);
        let res = c.compile("weib(sum(p), 2, p, 2) @ y >= 0", &SubProblemKey::default_key()).unwrap();
        let ConcreteForm::Constraint{ lhs, .. } = &res[0].form else { panic!("expected a constraint") };

        cat.set_parameter(0, matrix::dense([2,1], vec![1.0,3.0])).unwrap();
        let w = functions::weibull(4.0, 2.0, 2, 2).unwrap();
        let e = lower(lhs, &cat).unwrap();
        assert_eq!(e.shape(), [2,1]);
        assert_eq!(e.element(0), (&[1usize][..],&[w.get(0,0)][..]));
        assert_eq!(e.element(1), (&[1usize,2][..],&[w.get(1,0),w.get(1,1)][..]));

        // scale from data is checked when lowering
        cat.set_parameter(0, matrix::dense([2,1], vec![-1.0,0.0])).unwrap();
        assert_eq!(lower(lhs, &cat).unwrap_err().kind(), crate::ErrorKind::Expression);
    }
}
