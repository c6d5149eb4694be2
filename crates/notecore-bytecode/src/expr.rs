//! Reconstructs an expression tree from a decoded instruction stream, and
//! pretty-prints it back to DSL source. This is the only direction that
//! needs a tree: the VM (in `notecore-vm`) executes the flat instruction
//! stream directly and never builds one of these.

use notecore_rational::Rational;

use crate::instr::{DecodeError, Instr, NoteId, VarIndex};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(Rational),
    Base(VarIndex),
    Ref(NoteId, VarIndex),
    Tempo(Option<NoteId>),
    MeasureLen(Option<NoteId>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
}

/// Replays the instruction stream against a value stack of `Expr` nodes,
/// the same shape the VM executes at runtime, to recover a single tree.
pub fn tree_from_instrs(instrs: &[Instr], constants: &[Rational]) -> Result<Expr, DecodeError> {
    if instrs.is_empty() {
        return Ok(Expr::Const(Rational::from_int(0)));
    }
    let mut stack: Vec<Expr> = Vec::new();
    for instr in instrs {
        let node = match instr {
            Instr::LoadConst(idx) => {
                let c = constants
                    .get(*idx as usize)
                    .cloned()
                    .ok_or(DecodeError::StackUnderflow)?;
                Expr::Const(c)
            }
            Instr::LoadBase(var) => Expr::Base(*var),
            Instr::LoadRef(note, var) => Expr::Ref(*note, *var),
            Instr::LoadTempo(note) => Expr::Tempo(*note),
            Instr::LoadMeasureLen(note) => Expr::MeasureLen(*note),
            Instr::Add | Instr::Sub | Instr::Mul | Instr::Div | Instr::Pow => {
                let rhs = stack.pop().ok_or(DecodeError::StackUnderflow)?;
                let lhs = stack.pop().ok_or(DecodeError::StackUnderflow)?;
                match instr {
                    Instr::Add => Expr::Add(Box::new(lhs), Box::new(rhs)),
                    Instr::Sub => Expr::Sub(Box::new(lhs), Box::new(rhs)),
                    Instr::Mul => Expr::Mul(Box::new(lhs), Box::new(rhs)),
                    Instr::Div => Expr::Div(Box::new(lhs), Box::new(rhs)),
                    Instr::Pow => Expr::Pow(Box::new(lhs), Box::new(rhs)),
                    _ => unreachable!(),
                }
            }
            Instr::Neg => {
                let v = stack.pop().ok_or(DecodeError::StackUnderflow)?;
                Expr::Neg(Box::new(v))
            }
        };
        stack.push(node);
    }
    if stack.len() != 1 {
        return Err(DecodeError::TrailingValues);
    }
    Ok(stack.pop().unwrap())
}

/// Binding power used to decide when a subexpression needs parentheses.
/// Higher binds tighter. Mirrors the DSL grammar's precedence:
/// parens > `^` > unary `-` > `*`/`/` > `+`/`-`.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
enum Prec {
    Sum = 0,
    Product = 1,
    Unary = 2,
    Power = 3,
    Atom = 4,
}

pub fn decompile(expr: &Expr) -> String {
    print_expr(expr, Prec::Sum)
}

fn print_expr(expr: &Expr, min_prec: Prec) -> String {
    let (text, prec) = match expr {
        Expr::Const(r) => (r.to_string(), Prec::Atom),
        Expr::Base(var) => (format!("base.{}", var.dsl_name()), Prec::Atom),
        Expr::Ref(note, var) => (format!("[{}].{}", note, var.dsl_name()), Prec::Atom),
        Expr::Tempo(None) => ("tempo(base)".to_string(), Prec::Atom),
        Expr::Tempo(Some(n)) => (format!("tempo([{}])", n), Prec::Atom),
        Expr::MeasureLen(None) => ("measure(base)".to_string(), Prec::Atom),
        Expr::MeasureLen(Some(n)) => (format!("measure([{}])", n), Prec::Atom),
        Expr::Add(a, b) => (
            format!(
                "{} + {}",
                print_expr(a, Prec::Sum),
                print_expr(b, next(Prec::Sum))
            ),
            Prec::Sum,
        ),
        Expr::Sub(a, b) => (
            format!(
                "{} - {}",
                print_expr(a, Prec::Sum),
                print_expr(b, next(Prec::Sum))
            ),
            Prec::Sum,
        ),
        Expr::Mul(a, b) => (
            format!(
                "{} * {}",
                print_expr(a, Prec::Product),
                print_expr(b, next(Prec::Product))
            ),
            Prec::Product,
        ),
        Expr::Div(a, b) => (
            format!(
                "{} / {}",
                print_expr(a, Prec::Product),
                print_expr(b, next(Prec::Product))
            ),
            Prec::Product,
        ),
        Expr::Neg(a) => (format!("-{}", print_expr(a, Prec::Unary)), Prec::Unary),
        // `^` is right-associative: the right operand may itself be a `^`
        // chain at the same precedence without parenthesizing.
        Expr::Pow(a, b) => (
            format!(
                "{}^{}",
                print_expr(a, next(Prec::Power)),
                print_expr(b, Prec::Power)
            ),
            Prec::Power,
        ),
    };
    if prec < min_prec {
        format!("({})", text)
    } else {
        text
    }
}

fn next(p: Prec) -> Prec {
    match p {
        Prec::Sum => Prec::Product,
        Prec::Product => Prec::Unary,
        Prec::Unary => Prec::Power,
        Prec::Power => Prec::Atom,
        Prec::Atom => Prec::Atom,
    }
}
