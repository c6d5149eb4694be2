use std::collections::BTreeMap;

use notecore_algebra::{self as algebra, SymbolicPower};
use notecore_bytecode::{NoteId, VarIndex};
use notecore_rational::{Pool, Rational};
use notecore_vm::{evaluate, Environment};

use crate::cache::EvaluationCache;
use crate::note::Note;
use crate::BASE_NOTE_ID;

/// The `notecore_vm::Environment` the VM evaluates against. `get`/`get_base`
/// read the already-populated cache (correct as long as the caller drives
/// evaluation in topological order, per §4.7's protocol); `tempo`/
/// `measure_length` instead perform a live re-evaluation of the parent
/// chain, because the ancestor that actually owns a tempo/beatsPerMeasure
/// expression is not necessarily the literal note named in the `LOAD_TEMPO`
/// operand, and the dependency graph only registers an edge to that literal
/// operand — trusting the cache for the walk's *destination* note risks
/// reading a stale or not-yet-populated entry for an ancestor the graph
/// never wired an edge to. Recomputing is redundant but always correct,
/// and raw numeric throughput was never a design goal here.
pub(crate) struct ModuleEnv<'a> {
    notes: &'a BTreeMap<NoteId, Note>,
    cache: &'a EvaluationCache,
    pool: &'a Pool,
}

impl<'a> ModuleEnv<'a> {
    pub fn new(notes: &'a BTreeMap<NoteId, Note>, cache: &'a EvaluationCache, pool: &'a Pool) -> Self {
        ModuleEnv { notes, cache, pool }
    }

    fn eval_bytecode(&self, note: NoteId, var: VarIndex) -> Option<SymbolicPower> {
        let compiled = self.notes.get(&note)?.compiled(var)?;
        evaluate(compiled, self, self.pool).ok().map(|o| o.value)
    }

    fn next_ancestor(&self, note: NoteId) -> Option<NoteId> {
        if note == BASE_NOTE_ID {
            return None;
        }
        Some(self.notes.get(&note)?.parent_id().unwrap_or(BASE_NOTE_ID))
    }

    /// Ascends from `start` (inclusive) to the nearest note carrying a local
    /// expression for `var`, evaluating it live. The base note is guaranteed
    /// to always have one for `Tempo`/`BeatsPerMeasure`.
    fn resolve_inherited(&self, start: NoteId, var: VarIndex) -> Option<SymbolicPower> {
        let mut current = start;
        loop {
            if self.notes.get(&current)?.compiled(var).is_some() {
                return self.eval_bytecode(current, var);
            }
            current = self.next_ancestor(current)?;
        }
    }

    fn resolve_tempo(&self, note: Option<NoteId>) -> Option<SymbolicPower> {
        self.resolve_inherited(note.unwrap_or(BASE_NOTE_ID), VarIndex::Tempo)
    }

    fn resolve_beats_per_measure(&self, note: Option<NoteId>) -> Option<SymbolicPower> {
        self.resolve_inherited(note.unwrap_or(BASE_NOTE_ID), VarIndex::BeatsPerMeasure)
    }
}

impl<'a> Environment for ModuleEnv<'a> {
    fn get(&self, note: NoteId, var: VarIndex) -> Option<SymbolicPower> {
        self.cache.get_value(note, var).cloned()
    }

    fn get_base(&self, var: VarIndex) -> Option<SymbolicPower> {
        self.cache.get_value(BASE_NOTE_ID, var).cloned()
    }

    fn tempo(&self, note: Option<NoteId>) -> Option<SymbolicPower> {
        self.resolve_tempo(note)
    }

    /// `measureLength = beatsPerMeasure * 60 / tempo`, each resolved by its
    /// own independent inheritance walk — the two properties are not
    /// guaranteed to bottom out at the same ancestor. A zero tempo degrades
    /// to a best-effort zero rather than propagating a corruption flag —
    /// the corruption mask is defined only over startTime/duration/
    /// frequency, not measureLength.
    fn measure_length(&self, note: Option<NoteId>) -> Option<SymbolicPower> {
        let bpm = self.resolve_beats_per_measure(note)?;
        let tempo = self.resolve_tempo(note)?;
        let sixty = SymbolicPower::from_rational(Rational::from_int(60));
        let per_beat = algebra::mul(&bpm, &sixty);
        Some(algebra::div(&per_beat, &tempo).unwrap_or_else(|_| SymbolicPower::from_rational(Rational::zero())))
    }
}
