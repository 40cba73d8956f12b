//! Expression parser producing an [Ast], written with `nom` combinators.
//!
//! Grammar:
//! ```text
//! statement := sum [ ("==" | ">=" | "<=") sum ]
//! sum       := product { ("+" | "-") product }
//! product   := unary { ("*" | "@") unary }
//! unary     := "-" unary | primary
//! primary   := NUMBER | IDENT | IDENT "(" args ")" | "(" sum ")"
//! args      := sum { "," sum }
//! ```

use std::collections::BTreeSet;
use nom::Parser;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag,take_while,take_while1},
    character::complete::{char,multispace0},
    combinator::{all_consuming,cut,map_res,opt,recognize,value},
    error::{context,VerboseError,VerboseErrorKind},
    multi::separated_list0,
    number::complete::recognize_float,
    sequence::{delimited,pair,preceded,terminated},
};

use crate::error::{ModelError,Result};
use super::functions::Func;

type PResult<'a,O> = IResult<&'a str,O,VerboseError<&'a str>>;

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum BinOp {
    Add,
    Sub,
    /// `*`: scaling if either side is 1x1, otherwise matrix product
    Mul,
    /// `@`: matrix product
    MatMul,
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum Relation {
    Eq,
    Ge,
    Le,
}

#[derive(Debug,Clone,PartialEq)]
pub enum Ast {
    Number(f64),
    Ident(String),
    Neg(Box<Ast>),
    Binary{ op : BinOp, lhs : Box<Ast>, rhs : Box<Ast> },
    Call{ func : Func, args : Vec<Ast> },
}

impl Ast {
    /// Identifiers referenced by the tree, function names excluded.
    pub fn identifiers(&self) -> BTreeSet<String> {
        let mut res = BTreeSet::new();
        self.collect_identifiers(& mut res);
        res
    }

    fn collect_identifiers(&self, res : & mut BTreeSet<String>) {
        match self {
            Ast::Number(_) => {},
            Ast::Ident(s) => { res.insert(s.clone()); },
            Ast::Neg(e) => e.collect_identifiers(res),
            Ast::Binary{ lhs, rhs, .. } => { lhs.collect_identifiers(res); rhs.collect_identifiers(res); },
            Ast::Call{ args, .. } => args.iter().for_each(|a| a.collect_identifiers(res)),
        }
    }

    /// Value of a numeric literal, possibly negated.
    pub fn literal(&self) -> Option<f64> {
        match self {
            Ast::Number(v) => Some(*v),
            Ast::Neg(e) => e.literal().map(|v| -v),
            _ => None
        }
    }
}

#[derive(Debug,Clone,PartialEq)]
pub enum Statement {
    Relation{ lhs : Ast, rel : Relation, rhs : Ast },
    Expr(Ast),
}

impl Statement {
    pub fn identifiers(&self) -> BTreeSet<String> {
        match self {
            Statement::Relation{ lhs, rhs, .. } => {
                let mut s = lhs.identifiers();
                s.extend(rhs.identifiers());
                s
            },
            Statement::Expr(e) => e.identifiers(),
        }
    }
}

/// Wraps a parser with leading and trailing whitespace skipping.
fn ws<'a,O,P>(mut parser : P) -> impl FnMut(&'a str) -> PResult<'a,O>
    where P : FnMut(&'a str) -> PResult<'a,O>
{
    move |input| delimited(multispace0, &mut parser, multispace0)(input)
}

fn ws_char<'a>(c : char) -> impl FnMut(&'a str) -> PResult<'a,char> {
    ws(char(c))
}

fn is_ident_start(c : char) -> bool { c == '_' || c.is_ascii_alphabetic() }
fn is_ident_continue(c : char) -> bool { c == '_' || c.is_ascii_alphanumeric() }

/// `[A-Za-z_][A-Za-z0-9_]*`
fn identifier(input : &str) -> PResult<&str> {
    recognize(pair(take_while1(is_ident_start), take_while(is_ident_continue))).parse(input)
}

fn failure<'a>(input : &'a str, ctx : &'static str) -> nom::Err<VerboseError<&'a str>> {
    nom::Err::Failure(VerboseError{ errors : vec![(input, VerboseErrorKind::Context(ctx))] })
}

fn statement(input : &str) -> PResult<Statement> {
    let (input,lhs) = sum(input)?;
    let (input,rel) = opt(pair(relation, cut(context("an expression after the relation", sum)))).parse(input)?;
    let stmt = match rel {
        Some((rel,rhs)) => Statement::Relation{ lhs, rel, rhs },
        None => Statement::Expr(lhs),
    };
    Ok((input,stmt))
}

fn relation(input : &str) -> PResult<Relation> {
    ws(alt((
        value(Relation::Eq, tag("==")),
        value(Relation::Ge, tag(">=")),
        value(Relation::Le, tag("<=")),
    ))).parse(input)
}

/// Left-associative `+` and `-`.
fn sum(input : &str) -> PResult<Ast> {
    let (mut input, mut lhs) = product(input)?;
    loop {
        let (next,op) = opt(alt((ws_char('+'),ws_char('-')))).parse(input)?;
        let Some(op) = op else { break };
        let (next,rhs) = product(next)?;
        let op = if op == '+' { BinOp::Add } else { BinOp::Sub };
        lhs = Ast::Binary{ op, lhs : Box::new(lhs), rhs : Box::new(rhs) };
        input = next;
    }
    Ok((input,lhs))
}

/// Left-associative `*` and `@`.
fn product(input : &str) -> PResult<Ast> {
    let (mut input, mut lhs) = unary(input)?;
    loop {
        let (next,op) = opt(alt((ws_char('*'),ws_char('@')))).parse(input)?;
        let Some(op) = op else { break };
        let (next,rhs) = unary(next)?;
        let op = if op == '*' { BinOp::Mul } else { BinOp::MatMul };
        lhs = Ast::Binary{ op, lhs : Box::new(lhs), rhs : Box::new(rhs) };
        input = next;
    }
    Ok((input,lhs))
}

fn unary(input : &str) -> PResult<Ast> {
    if let Ok((input,_)) = ws_char('-').parse(input) {
        let (input,e) = unary(input)?;
        return Ok((input,Ast::Neg(Box::new(e))));
    }
    primary(input)
}

fn primary(input : &str) -> PResult<Ast> {
    context("a number, identifier or '('", alt((parenthesized, number, ident_or_call))).parse(input)
}

fn parenthesized(input : &str) -> PResult<Ast> {
    preceded(ws_char('('), cut(terminated(sum, context("')'", ws_char(')'))))).parse(input)
}

fn number(input : &str) -> PResult<Ast> {
    let (input,v) = ws(map_res(recognize_float, |s : &str| s.parse::<f64>())).parse(input)?;
    Ok((input,Ast::Number(v)))
}

fn ident_or_call(input : &str) -> PResult<Ast> {
    let start = input;
    let (input,name) = ws(identifier).parse(input)?;
    let (input,args) = opt(preceded(
        ws_char('('),
        cut(terminated(separated_list0(ws_char(','), sum), context("')'", ws_char(')'))))))
        .parse(input)?;
    let Some(args) = args else {
        return Ok((input,Ast::Ident(name.to_string())));
    };

    let func = Func::from_name(name).ok_or_else(|| failure(start, "a known function"))?;
    let (lo,hi) = func.arity();
    if args.len() < lo || args.len() > hi {
        return Err(failure(start, match (lo,hi) {
            (1,1) => "one argument",
            (2,2) => "two arguments",
            (4,4) => "four arguments",
            _     => "one or two arguments",
        }));
    }
    Ok((input,Ast::Call{ func, args }))
}

fn syntax_error(err : nom::Err<VerboseError<&str>>, text : &str) -> ModelError {
    match err {
        nom::Err::Incomplete(_) => ModelError::expression(format!("Incomplete expression '{}'",text)),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let first = e.errors.iter()
                .find(|(_,k)| matches!(k, VerboseErrorKind::Context(_)))
                .or(e.errors.first());
            match first {
                Some((rest,kind)) => {
                    let detail = match kind {
                        VerboseErrorKind::Context(ctx) => format!("Expected {}",ctx),
                        VerboseErrorKind::Char(c)      => format!("Expected '{}'",c),
                        VerboseErrorKind::Nom(kind)    => format!("Syntax error near {:?}",kind),
                    };
                    ModelError::expression(format!("{} at offset {} in '{}'",detail,text.len()-rest.len(),text))
                },
                None => ModelError::expression(format!("Syntax error in '{}'",text)),
            }
        }
    }
}

/// Parse one expression or relation.
pub fn parse(text : &str) -> Result<Statement> {
    if text.trim().is_empty() {
        return Err(ModelError::expression("Empty expression"));
    }
    match all_consuming(delimited(multispace0, statement, multispace0)).parse(text) {
        Ok((_,stmt)) => Ok(stmt),
        Err(e) => Err(syntax_error(e, text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s : &str) -> Box<Ast> { Box::new(Ast::Ident(s.to_string())) }

    #[test]
    fn precedence() {
        let s = parse("a + b*c - d").unwrap();
        assert_eq!(s, Statement::Expr(Ast::Binary{
            op  : BinOp::Sub,
            lhs : Box::new(Ast::Binary{ op : BinOp::Add, lhs : id("a"), rhs : Box::new(Ast::Binary{ op : BinOp::Mul, lhs : id("b"), rhs : id("c") }) }),
            rhs : id("d") }));
    }

    #[test]
    fn relations_and_calls() {
        match parse("sum(x, 1) >= -2").unwrap() {
            Statement::Relation{ lhs : Ast::Call{ func : Func::Sum, args }, rel : Relation::Ge, rhs } => {
                assert_eq!(args.len(), 2);
                assert_eq!(rhs.literal(), Some(-2.0));
            },
            s => panic!("unexpected {:?}",s)
        }
        let s = parse("Minimize(c @ x + y)").unwrap();
        let ids : Vec<String> = s.identifiers().into_iter().collect();
        assert_eq!(ids, vec!["c","x","y"]);
    }

    #[test]
    fn errors() {
        assert!(parse("").is_err());
        assert!(parse("x +").is_err());
        assert!(parse("(x").is_err());
        assert!(parse("x y").is_err());
        assert!(parse("open(x)").is_err());
        assert!(parse("tran(x, y)").is_err());
        assert!(parse("x == y == z").is_err());
        assert!(parse("x = y").is_err());
        assert!(parse("x ; y").is_err());
        assert!(parse("1..2").is_err());
        assert!(parse("sum(x").is_err());
        assert!(parse("x >=").is_err());
    }

    #[test]
    fn numbers_and_identifiers() {
        let s = parse("x_1 @ A >= -2.5e-1*sum(y,0)").unwrap();
        let Statement::Relation{ lhs, rel : Relation::Ge, rhs } = s else { panic!("expected a relation") };
        assert_eq!(lhs, Ast::Binary{ op : BinOp::MatMul, lhs : id("x_1"), rhs : id("A") });
        match rhs {
            Ast::Binary{ op : BinOp::Mul, lhs, rhs } => {
                assert_eq!(lhs.literal(), Some(-0.25));
                assert!(matches!(*rhs, Ast::Call{ func : Func::Sum, ref args } if args.len() == 2));
            },
            e => panic!("unexpected {:?}",e)
        }
        assert_eq!(parse("  y2  ").unwrap(), Statement::Expr(Ast::Ident("y2".to_string())));
    }

    #[test]
    fn error_messages() {
        let e = parse("x + open(y)").unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::Expression);
        assert!(e.to_string().contains("a known function at offset 4"), "{}", e);
        assert!(parse("tran(x, y)").unwrap_err().to_string().contains("one argument"));
    }
}
