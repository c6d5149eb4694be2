//! Evaluate-to-base-note: rewrites a note's current value for
//! `startTime`, `duration`, or `frequency` into a new source expression that
//! reads only the base note and literal constants, preserving the value
//! exactly (symbolic powers of an integer base included, for frequency).
//!
//! This reconstructs from the *evaluated* value rather than the source text,
//! unlike `rewrite::substitute_note` which splices source trees together for
//! `liberate` — evaluate-to-base needs the number, not the expression shape,
//! since a note's current value may be several hops of reference away from
//! the base.

use notecore_algebra::{self as algebra, SymbolicPower};
use notecore_bytecode::{decompile, Expr, VarIndex};
use notecore_rational::Rational;

use crate::{Module, ModuleError, NoteId, BASE_NOTE_ID};

pub(crate) fn evaluate_to_base(module: &mut Module, note_id: NoteId, var: VarIndex) -> Result<String, ModuleError> {
    if module.note(note_id).is_none() {
        return Err(ModuleError::UnknownNote(note_id));
    }
    module.evaluate();

    match var {
        VarIndex::Frequency => frequency_to_base(module, note_id),
        VarIndex::StartTime => start_time_to_base(module, note_id),
        VarIndex::Duration => duration_to_base(module, note_id),
        other => Err(ModuleError::UnsupportedEvaluateToBase(other)),
    }
}

fn exact_value(module: &Module, note_id: NoteId, var: VarIndex) -> Result<SymbolicPower, ModuleError> {
    let (value, corrupted) = module
        .get(note_id, var)
        .ok_or(ModuleError::NotExactlyRepresentable { note: note_id, var })?;
    if corrupted {
        return Err(ModuleError::NotExactlyRepresentable { note: note_id, var });
    }
    Ok(value)
}

fn exact_rational(module: &Module, note_id: NoteId, var: VarIndex) -> Result<Rational, ModuleError> {
    exact_value(module, note_id, var)?
        .as_rational()
        .cloned()
        .ok_or(ModuleError::NotExactlyRepresentable { note: note_id, var })
}

/// `freq / base.frequency`: a pure ratio collapses to `base.frequency`
/// itself; otherwise the ratio (which may carry symbolic terms, e.g. an
/// equal-tempered interval) multiplies it.
fn frequency_to_base(module: &Module, note_id: NoteId) -> Result<String, ModuleError> {
    let value = exact_value(module, note_id, VarIndex::Frequency)?;
    let base_value = exact_value(module, BASE_NOTE_ID, VarIndex::Frequency)?;
    let ratio = algebra::div(&value, &base_value)
        .map_err(|_| ModuleError::NotExactlyRepresentable { note: note_id, var: VarIndex::Frequency })?;

    let one = Rational::from_int(1);
    let expr = if ratio.is_pure_rational() && ratio.coeff().equals(&one) {
        Expr::Base(VarIndex::Frequency)
    } else {
        Expr::Mul(
            Box::new(Expr::Base(VarIndex::Frequency)),
            Box::new(symbolic_power_to_expr(&ratio)),
        )
    };
    Ok(decompile(&expr))
}

/// `base.t + k * 60/tempo(base)`, with `k = (value - base.t) * tempo(base) / 60`
/// a reduced rational.
fn start_time_to_base(module: &Module, note_id: NoteId) -> Result<String, ModuleError> {
    let value = exact_rational(module, note_id, VarIndex::StartTime)?;
    let base_start = exact_rational(module, BASE_NOTE_ID, VarIndex::StartTime)?;
    let tempo = exact_rational(module, BASE_NOTE_ID, VarIndex::Tempo)?;

    let k = value
        .sub(&base_start)
        .mul(&tempo)
        .div(&Rational::from_int(60))
        .map_err(|_| ModuleError::NotExactlyRepresentable { note: note_id, var: VarIndex::StartTime })?;

    let expr = if k.is_zero() {
        Expr::Base(VarIndex::StartTime)
    } else {
        Expr::Add(Box::new(Expr::Base(VarIndex::StartTime)), Box::new(beat_multiple(&k)))
    };
    Ok(decompile(&expr))
}

/// `60/tempo(base) * k`, with `k = value * tempo(base) / 60`.
fn duration_to_base(module: &Module, note_id: NoteId) -> Result<String, ModuleError> {
    let value = exact_rational(module, note_id, VarIndex::Duration)?;
    let tempo = exact_rational(module, BASE_NOTE_ID, VarIndex::Tempo)?;

    let k = value
        .mul(&tempo)
        .div(&Rational::from_int(60))
        .map_err(|_| ModuleError::NotExactlyRepresentable { note: note_id, var: VarIndex::Duration })?;

    if k.is_zero() {
        return Ok(decompile(&Expr::Const(Rational::zero())));
    }
    Ok(decompile(&beat_multiple(&k)))
}

fn beat_multiple(k: &Rational) -> Expr {
    Expr::Mul(
        Box::new(Expr::Const(k.clone())),
        Box::new(Expr::Div(Box::new(Expr::Const(Rational::from_int(60))), Box::new(Expr::Tempo(None)))),
    )
}

/// `c * prod(base_i^exp_i)` as an `Expr` tree, the same shape `pow`/`mul`
/// build up numerically, reconstructed for decompilation.
fn symbolic_power_to_expr(value: &SymbolicPower) -> Expr {
    let one = Rational::from_int(1);
    let mut expr: Option<Expr> = if !value.coeff().equals(&one) || value.terms().is_empty() {
        Some(Expr::Const(value.coeff().clone()))
    } else {
        None
    };
    for (base, exp) in value.terms() {
        let term = Expr::Pow(
            Box::new(Expr::Const(Rational::from_int(*base as i64))),
            Box::new(Expr::Const(exp.clone())),
        );
        expr = Some(match expr {
            Some(existing) => Expr::Mul(Box::new(existing), Box::new(term)),
            None => term,
        });
    }
    expr.unwrap_or_else(|| Expr::Const(value.coeff().clone()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{BaseNoteInit, DeleteStrategy, Module, ModuleError, VarIndex};

    fn base440() -> Module {
        Module::new(BaseNoteInit {
            frequency: "440".to_string(),
            start_time: "0".to_string(),
            tempo: "60".to_string(),
            beats_per_measure: "4".to_string(),
            instrument: None,
        })
        .unwrap()
    }

    #[test]
    fn frequency_equal_to_base_collapses_to_bare_reference() {
        let mut m = base440();
        let n1 = m
            .add_note(None, &[(VarIndex::Frequency, "base.f".to_string())], None, None)
            .unwrap();
        let rewritten = m.evaluate_to_base(n1, VarIndex::Frequency).unwrap();
        assert_eq!(rewritten, "base.frequency");
    }

    #[test]
    fn frequency_through_a_chain_preserves_symbolic_power() {
        let mut m = base440();
        let n1 = m
            .add_note(None, &[(VarIndex::Frequency, "base.f * 2^(7/12)".to_string())], None, None)
            .unwrap();
        let n2 = m
            .add_note(None, &[(VarIndex::Frequency, format!("[{n1}].f * (3/2)"))], None, None)
            .unwrap();

        let rewritten = m.evaluate_to_base(n2, VarIndex::Frequency).unwrap();
        assert!(rewritten.contains("base.frequency"));

        // Splice the rewritten expression onto a fresh note off the base
        // note alone and check it reproduces n2's value exactly.
        let n3 = m
            .add_note(None, &[(VarIndex::Frequency, rewritten)], None, None)
            .unwrap();
        m.evaluate();
        assert_eq!(
            m.get(n2, VarIndex::Frequency).unwrap().0,
            m.get(n3, VarIndex::Frequency).unwrap().0
        );
    }

    #[test]
    fn start_time_rewrites_as_base_plus_beat_multiple() {
        let mut m = base440();
        let n1 = m
            .add_note(None, &[(VarIndex::Duration, "beat(base)".to_string())], None, None)
            .unwrap();
        let n2 = m
            .add_note(
                None,
                &[(VarIndex::StartTime, format!("[{n1}].d * 3"))],
                None,
                None,
            )
            .unwrap();

        let rewritten = m.evaluate_to_base(n2, VarIndex::StartTime).unwrap();
        let n3 = m
            .add_note(None, &[(VarIndex::StartTime, rewritten)], None, None)
            .unwrap();
        m.evaluate();
        assert_eq!(
            m.get(n2, VarIndex::StartTime).unwrap().0,
            m.get(n3, VarIndex::StartTime).unwrap().0
        );
    }

    #[test]
    fn start_time_equal_to_base_collapses_to_bare_reference() {
        let mut m = base440();
        let n1 = m
            .add_note(None, &[(VarIndex::StartTime, "base.t".to_string())], None, None)
            .unwrap();
        assert_eq!(m.evaluate_to_base(n1, VarIndex::StartTime).unwrap(), "base.startTime");
    }

    #[test]
    fn duration_rewrites_in_terms_of_tempo() {
        let mut m = base440();
        let n1 = m
            .add_note(None, &[(VarIndex::Duration, "beat(base) * (3/2)".to_string())], None, None)
            .unwrap();

        let rewritten = m.evaluate_to_base(n1, VarIndex::Duration).unwrap();
        let n2 = m.add_note(None, &[(VarIndex::Duration, rewritten)], None, None).unwrap();
        m.evaluate();
        assert_eq!(
            m.get(n1, VarIndex::Duration).unwrap().0,
            m.get(n2, VarIndex::Duration).unwrap().0
        );
    }

    #[test]
    fn corrupted_value_is_not_representable() {
        let mut m = base440();
        let n1 = m
            .add_note(None, &[(VarIndex::Duration, "base.d / 0".to_string())], None, None)
            .unwrap();
        assert_eq!(
            m.evaluate_to_base(n1, VarIndex::Duration).unwrap_err(),
            ModuleError::NotExactlyRepresentable { note: n1, var: VarIndex::Duration }
        );
    }

    #[test]
    fn tempo_is_not_a_supported_property() {
        let mut m = base440();
        let n1 = m
            .add_note(None, &[(VarIndex::Tempo, "tempo(base)".to_string())], None, None)
            .unwrap();
        assert_eq!(
            m.evaluate_to_base(n1, VarIndex::Tempo).unwrap_err(),
            ModuleError::UnsupportedEvaluateToBase(VarIndex::Tempo)
        );
    }

    #[test]
    fn unknown_note_is_rejected() {
        let mut m = base440();
        assert_eq!(
            m.evaluate_to_base(999, VarIndex::Frequency).unwrap_err(),
            ModuleError::UnknownNote(999)
        );
    }

    #[test]
    fn evaluate_to_base_survives_a_liberate_and_delete() {
        let mut m = base440();
        let n1 = m
            .add_note(None, &[(VarIndex::Frequency, "base.f * (5/4)".to_string())], None, None)
            .unwrap();
        let n2 = m
            .add_note(None, &[(VarIndex::Frequency, format!("[{n1}].f * (6/5)"))], None, None)
            .unwrap();
        m.evaluate();
        let before = m.get(n2, VarIndex::Frequency).unwrap().0;

        let rewritten = m.evaluate_to_base(n2, VarIndex::Frequency).unwrap();
        m.delete(n1, DeleteStrategy::Cascade).unwrap();
        let n3 = m.add_note(None, &[(VarIndex::Frequency, rewritten)], None, None).unwrap();
        m.evaluate();
        assert_eq!(m.get(n3, VarIndex::Frequency).unwrap().0, before);
    }
}
