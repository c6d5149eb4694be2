//! The legacy method-chain front end: a fixed vocabulary of
//! `new Fraction(n[,d])` literals, `<target>.getVariable('name')` property
//! accessors, `findTempo(target)` / `findMeasureLength(target)` helpers, and
//! chained `.add|.sub|.mul|.div|.pow(arg)` / `.neg()` operations over
//! `target := baseNote | getNoteById(N)`. Parsed with an explicit grammar,
//! never by string-eval; any identifier or method outside this vocabulary
//! is a compile error.

use notecore_bytecode::{Expr, NoteId, VarIndex};
use notecore_rational::Rational;

use crate::error::CompileError;
use crate::token::{Cursor, Lexer, Token};

/// `baseNote` / `getNoteById(N)` name a note but are not themselves values;
/// only `.getVariable(name)` turns a target into a value expression. A
/// bare target left unresolved at the end of a chain is a syntax error,
/// not a silently-wrong `Expr`.
enum Node {
    Value(Expr),
    Target(Target),
}

enum Target {
    Base,
    Note(NoteId),
}

pub fn parse(source: &str) -> Result<Expr, CompileError> {
    if source.trim().is_empty() {
        return Err(CompileError::EmptyExpression);
    }
    let tokens = Lexer::tokenize(source).map_err(|(pos, msg)| CompileError::SyntaxError { pos, msg })?;
    let mut cursor = Cursor::new(&tokens);
    let node = parse_chain(&mut cursor)?;
    if !cursor.at_eof() {
        return Err(CompileError::SyntaxError {
            pos: cursor.pos(),
            msg: format!("unexpected trailing token {:?}", cursor.peek()),
        });
    }
    require_value(node, cursor.pos())
}

fn require_value(node: Node, pos: usize) -> Result<Expr, CompileError> {
    match node {
        Node::Value(e) => Ok(e),
        Node::Target(_) => Err(CompileError::SyntaxError {
            pos,
            msg: "a bare 'baseNote'/'getNoteById(N)' target must be followed by .getVariable(...)"
                .to_string(),
        }),
    }
}

fn parse_chain(c: &mut Cursor) -> Result<Node, CompileError> {
    let mut node = parse_primary(c)?;
    while matches!(c.peek(), Token::Dot) {
        c.advance();
        let method = expect_ident(c)?;
        match method.as_str() {
            "getVariable" => {
                expect(c, Token::LParen)?;
                let name = expect_string(c)?;
                expect(c, Token::RParen)?;
                let var = prop_from_name(&name).ok_or(CompileError::UnknownIdentifier(name))?;
                node = Node::Value(match node {
                    Node::Target(Target::Base) => Expr::Base(var),
                    Node::Target(Target::Note(id)) => Expr::Ref(id, var),
                    Node::Value(_) => {
                        return Err(CompileError::SyntaxError {
                            pos: c.pos(),
                            msg: "getVariable(...) may only follow a bare target".to_string(),
                        })
                    }
                });
            }
            "add" | "sub" | "mul" | "div" | "pow" => {
                let lhs = require_value(node, c.pos())?;
                expect(c, Token::LParen)?;
                let rhs = require_value(parse_chain(c)?, c.pos())?;
                expect(c, Token::RParen)?;
                node = Node::Value(match method.as_str() {
                    "add" => Expr::Add(Box::new(lhs), Box::new(rhs)),
                    "sub" => Expr::Sub(Box::new(lhs), Box::new(rhs)),
                    "mul" => Expr::Mul(Box::new(lhs), Box::new(rhs)),
                    "div" => Expr::Div(Box::new(lhs), Box::new(rhs)),
                    "pow" => Expr::Pow(Box::new(lhs), Box::new(rhs)),
                    _ => unreachable!(),
                });
            }
            "neg" => {
                let inner = require_value(node, c.pos())?;
                expect(c, Token::LParen)?;
                expect(c, Token::RParen)?;
                node = Node::Value(Expr::Neg(Box::new(inner)));
            }
            other => return Err(CompileError::UnknownIdentifier(other.to_string())),
        }
    }
    Ok(node)
}

fn parse_primary(c: &mut Cursor) -> Result<Node, CompileError> {
    match c.peek().clone() {
        Token::Ident(name) if name == "new" => {
            c.advance();
            let ctor = expect_ident(c)?;
            if ctor != "Fraction" {
                return Err(CompileError::UnknownIdentifier(ctor));
            }
            expect(c, Token::LParen)?;
            let n = expect_int(c)?;
            let d = if matches!(c.peek(), Token::Comma) {
                c.advance();
                expect_int(c)?
            } else {
                1
            };
            expect(c, Token::RParen)?;
            let r = Rational::from_pair(n, d).map_err(|_| CompileError::DivisionByZeroConstant)?;
            Ok(Node::Value(Expr::Const(r)))
        }
        Token::Ident(name) if name == "findTempo" || name == "findMeasureLength" => {
            c.advance();
            expect(c, Token::LParen)?;
            let target = parse_target(c)?;
            expect(c, Token::RParen)?;
            let note = match target {
                Target::Base => None,
                Target::Note(id) => Some(id),
            };
            Ok(Node::Value(if name == "findTempo" {
                Expr::Tempo(note)
            } else {
                Expr::MeasureLen(note)
            }))
        }
        Token::Ident(name) if name == "baseNote" || name == "getNoteById" => {
            Ok(Node::Target(parse_target(c)?))
        }
        Token::Ident(name) => Err(CompileError::UnknownIdentifier(name)),
        other => Err(CompileError::SyntaxError {
            pos: c.pos(),
            msg: format!("unexpected token {other:?}"),
        }),
    }
}

fn parse_target(c: &mut Cursor) -> Result<Target, CompileError> {
    match c.advance() {
        Token::Ident(name) if name == "baseNote" => Ok(Target::Base),
        Token::Ident(name) if name == "getNoteById" => {
            expect(c, Token::LParen)?;
            let id = expect_int(c)?;
            expect(c, Token::RParen)?;
            let id = NoteId::try_from(id).map_err(|_| CompileError::SyntaxError {
                pos: c.pos(),
                msg: format!("note id {id} out of range"),
            })?;
            Ok(Target::Note(id))
        }
        other => Err(CompileError::SyntaxError {
            pos: c.pos(),
            msg: format!("expected 'baseNote' or 'getNoteById(N)', found {other:?}"),
        }),
    }
}

fn prop_from_name(name: &str) -> Option<VarIndex> {
    match name {
        "frequency" => Some(VarIndex::Frequency),
        "startTime" => Some(VarIndex::StartTime),
        "duration" => Some(VarIndex::Duration),
        "tempo" => Some(VarIndex::Tempo),
        "beatsPerMeasure" => Some(VarIndex::BeatsPerMeasure),
        "measureLength" => Some(VarIndex::MeasureLength),
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

fn expect_ident(c: &mut Cursor) -> Result<String, CompileError> {
    match c.advance() {
        Token::Ident(name) => Ok(name),
        other => Err(CompileError::SyntaxError {
            pos: c.pos(),
            msg: format!("expected an identifier, found {other:?}"),
        }),
    }
}

fn expect_string(c: &mut Cursor) -> Result<String, CompileError> {
    match c.advance() {
        Token::Str(s) => Ok(s),
        other => Err(CompileError::SyntaxError {
            pos: c.pos(),
            msg: format!("expected a string literal, found {other:?}"),
        }),
    }
}

fn expect_int(c: &mut Cursor) -> Result<i64, CompileError> {
    match c.advance() {
        Token::Num(n) => Ok(n),
        Token::Minus => match c.advance() {
            Token::Num(n) => Ok(-n),
            other => Err(CompileError::SyntaxError {
                pos: c.pos(),
                msg: format!("expected an integer, found {other:?}"),
            }),
        },
        other => Err(CompileError::SyntaxError {
            pos: c.pos(),
            msg: format!("expected an integer, found {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_fraction_literal() {
        assert_eq!(
            parse("new Fraction(5,4)").unwrap(),
            Expr::Const(Rational::from_pair(5, 4).unwrap())
        );
    }

    #[test]
    fn parses_integer_only_fraction() {
        assert_eq!(
            parse("new Fraction(7)").unwrap(),
            Expr::Const(Rational::from_int(7))
        );
    }

    #[test]
    fn parses_base_note_variable() {
        assert_eq!(
            parse("baseNote.getVariable('frequency')").unwrap(),
            Expr::Base(VarIndex::Frequency)
        );
    }

    #[test]
    fn parses_note_reference_and_chained_mul() {
        let expr = parse("getNoteById(1).getVariable('frequency').mul(new Fraction(3,2))").unwrap();
        assert_eq!(
            expr,
            Expr::Mul(
                Box::new(Expr::Ref(1, VarIndex::Frequency)),
                Box::new(Expr::Const(Rational::from_pair(3, 2).unwrap()))
            )
        );
    }

    #[test]
    fn parses_find_tempo_helper() {
        assert_eq!(parse("findTempo(baseNote)").unwrap(), Expr::Tempo(None));
        assert_eq!(
            parse("findTempo(getNoteById(2))").unwrap(),
            Expr::Tempo(Some(2))
        );
    }

    #[test]
    fn rejects_unknown_method() {
        match parse("baseNote.getVariable('frequency').frobnicate(1)") {
            Err(CompileError::UnknownIdentifier(name)) => assert_eq!(name, "frobnicate"),
            other => panic!("expected UnknownIdentifier, got {other:?}"),
        }
    }

    #[test]
    fn neg_takes_no_argument() {
        let expr = parse("baseNote.getVariable('frequency').neg()").unwrap();
        assert_eq!(expr, Expr::Neg(Box::new(Expr::Base(VarIndex::Frequency))));
    }

    #[test]
    fn bare_target_without_getvariable_is_rejected() {
        assert!(parse("baseNote").is_err());
    }

    #[test]
    fn startime_variable_round_trips_distinctly_from_a_bare_target() {
        let expr = parse("getNoteById(9).getVariable('startTime')").unwrap();
        assert_eq!(expr, Expr::Ref(9, VarIndex::StartTime));
    }
}
