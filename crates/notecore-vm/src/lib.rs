//! Stack VM / evaluator (C5): executes a [`CompiledExpr`]'s instruction
//! stream against an [`Environment`] the host (`notecore-module`) supplies,
//! producing a [`SymbolicPower`] plus a direct-corruption flag.
//!
//! Arithmetic dispatches on C2: when both operands are pure rational and
//! the operator isn't a non-integer `pow`, the fast path goes straight to
//! `notecore-rational`; otherwise it promotes to `notecore-algebra`.
//! Numeric errors (division by zero, a non-positive-integer `pow` base, a
//! radical mismatch on `add`/`sub`) never abort evaluation — they set the
//! corruption flag and the VM continues with the algebra layer's best
//! approximation, so a whole module can still be evaluated and rendered
//! with per-property corruption annotations.
//!
//! `evaluate` takes a `&notecore_rational::Pool` because the host
//! (`notecore-module`'s `Module`) owns one per instance and threads it
//! into every call. The fast path's stack holds `SymbolicPower`, not
//! `Rational`, so there's no scratch storage here for the pool to hand
//! out — it passes through unused.

use notecore_algebra::{self as algebra, AlgebraError, SymbolicPower};
use notecore_bytecode::{CompiledExpr, Instr, NoteId, VarIndex};
use notecore_rational::{Pool, Rational};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("missing dependency: note {note} var {var:?} was not yet evaluated")]
    MissingDependency { note: NoteId, var: VarIndex },
}

/// The host's view into already-evaluated values and the tempo/measure
/// inheritance walk. Kept free of any `Module`/`Note` type so the VM stays
/// a pure function of bytecode + environment, with borrowed evaluation
/// context passed in at each call rather than owned by the VM.
pub trait Environment {
    /// Looks up an already-evaluated property on another note. `None`
    /// signals the property was never evaluated (a `MissingDependency`
    /// under correct topological-order evaluation).
    fn get(&self, note: NoteId, var: VarIndex) -> Option<SymbolicPower>;

    /// Resolves `LOAD_BASE`'s operand against the base note directly.
    fn get_base(&self, var: VarIndex) -> Option<SymbolicPower>;

    /// Performs the tempo inheritance walk from `note` (`None` = base),
    /// ascending the parent chain to the nearest note with a locally-set
    /// tempo. The base note is guaranteed to resolve.
    fn tempo(&self, note: Option<NoteId>) -> Option<SymbolicPower>;

    /// As `tempo`, but for the computed `measureLength = beatsPerMeasure *
    /// 60 / tempo` of the nearest ancestor that has one.
    fn measure_length(&self, note: Option<NoteId>) -> Option<SymbolicPower>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutcome {
    pub value: SymbolicPower,
    /// Set when a numeric error (division by zero, non-rational `pow`
    /// base, radical mismatch) occurred anywhere during evaluation.
    pub corrupted: bool,
}

/// Executes `compiled` against `env`. `pool` is accepted for parity with
/// the rest of `Module`'s scratch lifecycle but is not used: arithmetic
/// here runs on `SymbolicPower`/`Rational` values owned by the stack, not
/// on anything the pool could hand out or reclaim.
pub fn evaluate(
    compiled: &CompiledExpr,
    env: &dyn Environment,
    _pool: &Pool,
) -> Result<EvalOutcome, EvalError> {
    let instrs = compiled
        .instrs()
        .expect("CompiledExpr bytecode was produced by this crate's own encoder");
    if instrs.is_empty() {
        return Ok(EvalOutcome {
            value: SymbolicPower::from_rational(Rational::zero()),
            corrupted: false,
        });
    }

    let mut stack: Vec<SymbolicPower> = Vec::with_capacity(instrs.len());
    let mut corrupted = false;

    for instr in &instrs {
        match instr {
            Instr::LoadConst(idx) => {
                let c = compiled
                    .constants()
                    .get(*idx as usize)
                    .cloned()
                    .unwrap_or_else(Rational::zero);
                stack.push(SymbolicPower::from_rational(c));
            }
            Instr::LoadBase(var) => {
                stack.push(missing_dependency_guard(
                    env.get_base(*var),
                    NoteId::MAX,
                    *var,
                    &mut corrupted,
                )?);
            }
            Instr::LoadRef(note, var) => {
                stack.push(missing_dependency_guard(
                    env.get(*note, *var),
                    *note,
                    *var,
                    &mut corrupted,
                )?);
            }
            Instr::LoadTempo(note) => {
                stack.push(missing_dependency_guard(
                    env.tempo(*note),
                    note.unwrap_or(NoteId::MAX),
                    VarIndex::Tempo,
                    &mut corrupted,
                )?);
            }
            Instr::LoadMeasureLen(note) => {
                stack.push(missing_dependency_guard(
                    env.measure_length(*note),
                    note.unwrap_or(NoteId::MAX),
                    VarIndex::MeasureLength,
                    &mut corrupted,
                )?);
            }
            Instr::Add => binary_op(&mut stack, &mut corrupted, algebra::add, Rational::add_infallible)?,
            Instr::Sub => binary_op(&mut stack, &mut corrupted, algebra::sub, Rational::sub_infallible)?,
            Instr::Mul => {
                let b = stack.pop().expect("stack underflow: malformed bytecode");
                let a = stack.pop().expect("stack underflow: malformed bytecode");
                stack.push(fast_or_symbolic_mul(&a, &b));
            }
            Instr::Div => {
                let b = stack.pop().expect("stack underflow: malformed bytecode");
                let a = stack.pop().expect("stack underflow: malformed bytecode");
                stack.push(fast_or_symbolic_div(&a, &b, &mut corrupted));
            }
            Instr::Pow => {
                let exp = stack.pop().expect("stack underflow: malformed bytecode");
                let base = stack.pop().expect("stack underflow: malformed bytecode");
                stack.push(fast_or_symbolic_pow(&base, &exp, &mut corrupted));
            }
            Instr::Neg => {
                let v = stack.pop().expect("stack underflow: malformed bytecode");
                stack.push(algebra::neg(&v));
            }
        }
    }

    debug_assert_eq!(stack.len(), 1, "malformed bytecode left {} values on the stack", stack.len());
    let value = stack.pop().unwrap_or_else(|| SymbolicPower::from_rational(Rational::zero()));
    Ok(EvalOutcome { value, corrupted })
}

fn missing_dependency_guard(
    value: Option<SymbolicPower>,
    note: NoteId,
    var: VarIndex,
    corrupted: &mut bool,
) -> Result<SymbolicPower, EvalError> {
    match value {
        Some(v) => Ok(v),
        None => {
            if cfg!(debug_assertions) {
                panic!("missing dependency: note {note} var {var:?} was not yet evaluated (topological order violated)");
            }
            *corrupted = true;
            Ok(SymbolicPower::from_rational(Rational::zero()))
        }
    }
}

fn fast_or_symbolic_mul(a: &SymbolicPower, b: &SymbolicPower) -> SymbolicPower {
    if let (Some(ra), Some(rb)) = (a.as_rational(), b.as_rational()) {
        SymbolicPower::from_rational(ra.mul(rb))
    } else {
        algebra::mul(a, b)
    }
}

fn fast_or_symbolic_div(a: &SymbolicPower, b: &SymbolicPower, corrupted: &mut bool) -> SymbolicPower {
    if let (Some(ra), Some(rb)) = (a.as_rational(), b.as_rational()) {
        match ra.div(rb) {
            Ok(r) => SymbolicPower::from_rational(r),
            Err(_) => {
                *corrupted = true;
                SymbolicPower::from_rational(Rational::zero())
            }
        }
    } else {
        match algebra::div(a, b) {
            Ok(v) => v,
            Err(_) => {
                *corrupted = true;
                SymbolicPower::from_rational(Rational::zero())
            }
        }
    }
}

fn fast_or_symbolic_pow(base: &SymbolicPower, exp: &SymbolicPower, corrupted: &mut bool) -> SymbolicPower {
    match algebra::pow_value(base, exp) {
        Ok(v) => v,
        Err(AlgebraError::NonRationalBase) => {
            *corrupted = true;
            SymbolicPower::from_rational(approx_as_rational(base, exp))
        }
        Err(_) => {
            *corrupted = true;
            SymbolicPower::from_rational(Rational::zero())
        }
    }
}

fn approx_as_rational(base: &SymbolicPower, exp: &SymbolicPower) -> Rational {
    let v = base.approx().powf(exp.approx());
    Rational::from_pair((v * 1_000_000_000.0).round() as i64, 1_000_000_000)
        .unwrap_or_else(|_| Rational::zero())
}

/// Applies `algebra_op`; on `RadicalMismatch` falls back to the carried
/// approximation and sets `corrupted`. `fast` is used only when both
/// operands are pure rational, bypassing the algebra layer entirely.
fn binary_op(
    stack: &mut Vec<SymbolicPower>,
    corrupted: &mut bool,
    algebra_op: fn(&SymbolicPower, &SymbolicPower) -> Result<SymbolicPower, AlgebraError>,
    fast: fn(&Rational, &Rational) -> Rational,
) -> Result<(), EvalError> {
    let b = stack.pop().expect("stack underflow: malformed bytecode");
    let a = stack.pop().expect("stack underflow: malformed bytecode");
    let result = if let (Some(ra), Some(rb)) = (a.as_rational(), b.as_rational()) {
        SymbolicPower::from_rational(fast(ra, rb))
    } else {
        match algebra_op(&a, &b) {
            Ok(v) => v,
            Err(AlgebraError::RadicalMismatch { approx }) => {
                *corrupted = true;
                SymbolicPower::from_rational(approx)
            }
            Err(_) => {
                *corrupted = true;
                SymbolicPower::from_rational(Rational::zero())
            }
        }
    };
    stack.push(result);
    Ok(())
}

/// Small extension trait so `binary_op` can pass `Rational::add`/`sub` as
/// infallible `fn` pointers (the fallible `div` has its own dedicated path
/// above since only it can fail).
trait RationalExt {
    fn add_infallible(a: &Rational, b: &Rational) -> Rational;
    fn sub_infallible(a: &Rational, b: &Rational) -> Rational;
}

impl RationalExt for Rational {
    fn add_infallible(a: &Rational, b: &Rational) -> Rational {
        a.add(b)
    }
    fn sub_infallible(a: &Rational, b: &Rational) -> Rational {
        a.sub(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notecore_bytecode::{Expr, NoteId as Id};
    use notecore_compiler::{compile, recompile_decompiled, CompilerConfig};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    struct FakeModule {
        base: HashMap<VarIndex, SymbolicPower>,
        notes: HashMap<(Id, VarIndex), SymbolicPower>,
        tempo: SymbolicPower,
    }

    impl Environment for FakeModule {
        fn get(&self, note: Id, var: VarIndex) -> Option<SymbolicPower> {
            self.notes.get(&(note, var)).cloned()
        }
        fn get_base(&self, var: VarIndex) -> Option<SymbolicPower> {
            self.base.get(&var).cloned()
        }
        fn tempo(&self, _note: Option<Id>) -> Option<SymbolicPower> {
            Some(self.tempo.clone())
        }
        fn measure_length(&self, _note: Option<Id>) -> Option<SymbolicPower> {
            None
        }
    }

    fn env_with_base_frequency(freq: i64) -> FakeModule {
        let mut base = HashMap::new();
        base.insert(VarIndex::Frequency, SymbolicPower::from_rational(Rational::from_int(freq)));
        FakeModule {
            base,
            notes: HashMap::new(),
            tempo: SymbolicPower::from_rational(Rational::from_int(60)),
        }
    }

    #[test]
    fn evaluates_a_major_third_above_base() {
        let config = CompilerConfig::default();
        let compiled = compile("base.f * (5/4)", &config).unwrap();
        let env = env_with_base_frequency(440);
        let pool = Pool::new();
        let outcome = evaluate(&compiled, &env, &pool).unwrap();
        assert!(!outcome.corrupted);
        assert_eq!(outcome.value.coeff(), &Rational::from_int(550));
    }

    #[test]
    fn equal_tempered_fifth_preserves_symbolic_power() {
        let config = CompilerConfig::default();
        let compiled = compile("base.f * 2^(7/12)", &config).unwrap();
        let env = env_with_base_frequency(440);
        let pool = Pool::new();
        let outcome = evaluate(&compiled, &env, &pool).unwrap();
        assert!(!outcome.corrupted);
        assert_eq!(outcome.value.coeff(), &Rational::from_int(440));
        assert_eq!(outcome.value.terms(), &[(2, Rational::from_pair(7, 12).unwrap())]);
    }

    #[test]
    fn division_by_zero_sets_corruption_and_continues() {
        let config = CompilerConfig::default();
        let compiled = compile("base.f / 0", &config).unwrap();
        let env = env_with_base_frequency(440);
        let pool = Pool::new();
        let outcome = evaluate(&compiled, &env, &pool).unwrap();
        assert!(outcome.corrupted);
    }

    #[test]
    fn empty_bytecode_evaluates_to_zero() {
        let compiled = notecore_bytecode::CompiledExpr::empty();
        let env = env_with_base_frequency(440);
        let pool = Pool::new();
        let outcome = evaluate(&compiled, &env, &pool).unwrap();
        assert!(!outcome.corrupted);
        assert_eq!(outcome.value.coeff(), &Rational::zero());
    }

    #[test]
    fn recompiled_decompiled_bytecode_evaluates_identically() {
        let config = CompilerConfig::default();
        let compiled = compile("base.f * (3/2) + base.f * (1/4)", &config).unwrap();
        let tree: Expr =
            notecore_bytecode::tree_from_instrs(&compiled.instrs().unwrap(), compiled.constants()).unwrap();
        let recompiled = recompile_decompiled(&tree);
        let env = env_with_base_frequency(440);
        let pool = Pool::new();
        let a = evaluate(&compiled, &env, &pool).unwrap();
        let b = evaluate(&recompiled, &env, &pool).unwrap();
        assert_eq!(a, b);
    }
}
