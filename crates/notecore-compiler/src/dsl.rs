//! The DSL front end: `expr := term (('+'|'-') term)*`, `term := factor
//! (('*'|'/') factor)*`, `factor := unary ('^' factor)?` (right-associative),
//! `unary := '-' unary | atom`. This module implements the grammar
//! literally, including the base-before-power binding of unary minus the
//! production order implies.

use notecore_bytecode::{Expr, NoteId, VarIndex};
use notecore_rational::Rational;

use crate::error::CompileError;
use crate::token::{Cursor, Lexer, Token};

pub fn parse(source: &str) -> Result<Expr, CompileError> {
    if source.trim().is_empty() {
        return Err(CompileError::EmptyExpression);
    }
    let tokens = Lexer::tokenize(source).map_err(|(pos, msg)| CompileError::SyntaxError { pos, msg })?;
    let mut cursor = Cursor::new(&tokens);
    let expr = parse_expr(&mut cursor)?;
    if !cursor.at_eof() {
        return Err(CompileError::SyntaxError {
            pos: cursor.pos(),
            msg: format!("unexpected trailing token {:?}", cursor.peek()),
        });
    }
    Ok(expr)
}

fn parse_expr(c: &mut Cursor) -> Result<Expr, CompileError> {
    let mut lhs = parse_term(c)?;
    loop {
        match c.peek() {
            Token::Plus => {
                c.advance();
                let rhs = parse_term(c)?;
                lhs = Expr::Add(Box::new(lhs), Box::new(rhs));
            }
            Token::Minus => {
                c.advance();
                let rhs = parse_term(c)?;
                lhs = Expr::Sub(Box::new(lhs), Box::new(rhs));
            }
            _ => break,
        }
    }
    Ok(lhs)
}

fn parse_term(c: &mut Cursor) -> Result<Expr, CompileError> {
    let mut lhs = parse_factor(c)?;
    loop {
        match c.peek() {
            Token::Star => {
                c.advance();
                let rhs = parse_factor(c)?;
                lhs = Expr::Mul(Box::new(lhs), Box::new(rhs));
            }
            Token::Slash => {
                c.advance();
                let rhs = parse_factor(c)?;
                lhs = Expr::Div(Box::new(lhs), Box::new(rhs));
            }
            _ => break,
        }
    }
    Ok(lhs)
}

fn parse_factor(c: &mut Cursor) -> Result<Expr, CompileError> {
    let base = parse_unary(c)?;
    if matches!(c.peek(), Token::Caret) {
        c.advance();
        let exp = parse_factor(c)?; // right-associative
        Ok(Expr::Pow(Box::new(base), Box::new(exp)))
    } else {
        Ok(base)
    }
}

fn parse_unary(c: &mut Cursor) -> Result<Expr, CompileError> {
    if matches!(c.peek(), Token::Minus) {
        c.advance();
        let inner = parse_unary(c)?;
        Ok(Expr::Neg(Box::new(inner)))
    } else {
        parse_atom(c)
    }
}

fn parse_atom(c: &mut Cursor) -> Result<Expr, CompileError> {
    match c.peek().clone() {
        Token::Num(n) => {
            c.advance();
            // number := uint | uint '/' uint -- the fraction form binds
            // tighter than term-level division, so it is consumed here.
            if matches!(c.peek(), Token::Slash) && matches!(c.peek_at(1), Token::Num(_)) {
                c.advance();
                let Token::Num(d) = c.advance() else {
                    unreachable!()
                };
                let r = Rational::from_pair(n, d).map_err(|_| CompileError::DivisionByZeroConstant)?;
                Ok(Expr::Const(r))
            } else {
                Ok(Expr::Const(Rational::from_int(n)))
            }
        }
        Token::LParen => {
            c.advance();
            let inner = parse_expr(c)?;
            if !matches!(c.peek(), Token::RParen) {
                return Err(CompileError::UnbalancedParens);
            }
            c.advance();
            Ok(inner)
        }
        Token::Ident(name) if name == "base" => {
            c.advance();
            expect_dot(c)?;
            let var = parse_prop(c)?;
            Ok(Expr::Base(var))
        }
        Token::Ident(name) if name == "tempo" || name == "measure" || name == "beat" => {
            c.advance();
            expect(c, Token::LParen)?;
            let target = parse_arg(c)?;
            expect(c, Token::RParen)?;
            Ok(match name.as_str() {
                "tempo" => Expr::Tempo(target),
                "measure" => Expr::MeasureLen(target),
                // beat(x) == 60 / tempo(x)
                _ => Expr::Div(
                    Box::new(Expr::Const(Rational::from_int(60))),
                    Box::new(Expr::Tempo(target)),
                ),
            })
        }
        Token::LBracket => {
            c.advance();
            let id = parse_uint(c)?;
            expect(c, Token::RBracket)?;
            expect_dot(c)?;
            let var = parse_prop(c)?;
            Ok(Expr::Ref(id, var))
        }
        Token::Ident(name) => Err(CompileError::UnknownIdentifier(name)),
        other => Err(CompileError::SyntaxError {
            pos: c.pos(),
            msg: format!("unexpected token {other:?}"),
        }),
    }
}

fn parse_arg(c: &mut Cursor) -> Result<Option<NoteId>, CompileError> {
    match c.peek().clone() {
        Token::Ident(name) if name == "base" => {
            c.advance();
            Ok(None)
        }
        Token::LBracket => {
            c.advance();
            let id = parse_uint(c)?;
            expect(c, Token::RBracket)?;
            Ok(Some(id))
        }
        other => Err(CompileError::SyntaxError {
            pos: c.pos(),
            msg: format!("expected 'base' or '[id]', found {other:?}"),
        }),
    }
}

fn parse_uint(c: &mut Cursor) -> Result<NoteId, CompileError> {
    match c.advance() {
        Token::Num(n) if n >= 0 => NoteId::try_from(n).map_err(|_| CompileError::SyntaxError {
            pos: c.pos(),
            msg: format!("note id {n} out of range"),
        }),
        other => Err(CompileError::SyntaxError {
            pos: c.pos(),
            msg: format!("expected a non-negative integer, found {other:?}"),
        }),
    }
}

fn parse_prop(c: &mut Cursor) -> Result<VarIndex, CompileError> {
    match c.advance() {
        Token::Ident(name) => prop_from_name(&name).ok_or(CompileError::UnknownIdentifier(name)),
        other => Err(CompileError::SyntaxError {
            pos: c.pos(),
            msg: format!("expected a property name, found {other:?}"),
        }),
    }
}

fn prop_from_name(name: &str) -> Option<VarIndex> {
    match name {
        "f" | "frequency" => Some(VarIndex::Frequency),
        "t" | "s" | "startTime" => Some(VarIndex::StartTime),
        "d" | "duration" => Some(VarIndex::Duration),
        "tempo" => Some(VarIndex::Tempo),
        "bpm" | "beatsPerMeasure" => Some(VarIndex::BeatsPerMeasure),
        "ml" | "measureLength" => Some(VarIndex::MeasureLength),
        _ => None,
    }
}

fn expect(c: &mut Cursor, expected: Token) -> Result<(), CompileError> {
    if *c.peek() == expected {
        c.advance();
        Ok(())
    } else {
        Err(CompileError::SyntaxError {
            pos: c.pos(),
            msg: format!("expected {expected:?}, found {:?}", c.peek()),
        })
    }
}

fn expect_dot(c: &mut Cursor) -> Result<(), CompileError> {
    expect(c, Token::Dot)
}
