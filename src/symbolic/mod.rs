//! Symbolic expressions: parsing, compiling against variable bindings and lowering
//! to affine [crate::expr::Expr]s.
//!
//! Expressions are never executed as code. The text is parsed into an [Ast] built from numbers,
//! identifiers, the binary operators `+ - * @`, unary minus and calls of the functions in
//! [Func]; a statement is either an expression or a relation `lhs (== | >= | <=) rhs`.

mod parser;
mod functions;
mod compile;
mod lower;

pub use parser::{parse,Ast,BinOp,Relation,Statement};
pub use functions::{weibull,Func};
pub use compile::{ConcreteExpression,ConcreteForm,ExpressionCompiler,Node,NodeKind,Sense};
pub use lower::{lower,value};
