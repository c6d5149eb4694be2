use std::collections::BTreeMap;

use notecore_algebra::SymbolicPower;
use notecore_bytecode::{NoteId, VarIndex};

/// The 3-bit corruption mask: only `startTime`,
/// `duration`, `frequency` are tracked (tempo/beatsPerMeasure/measureLength
/// are walked-inheritance values, never themselves flagged). Both a direct
/// bit (this property's own bytecode produced an approximate value) and a
/// transitive bit (something it reads was corrupted) are kept per property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorruptionFlags {
    direct: [bool; 3],
    transitive: [bool; 3],
}

impl CorruptionFlags {
    fn slot(var: VarIndex) -> Option<usize> {
        match var {
            VarIndex::StartTime => Some(0),
            VarIndex::Duration => Some(1),
            VarIndex::Frequency => Some(2),
            _ => None,
        }
    }

    pub fn is_corrupted(&self, var: VarIndex) -> bool {
        match Self::slot(var) {
            Some(i) => self.direct[i] || self.transitive[i],
            None => false,
        }
    }

    pub fn is_directly_corrupted(&self, var: VarIndex) -> bool {
        Self::slot(var).map(|i| self.direct[i]).unwrap_or(false)
    }

    pub fn is_transitively_corrupted(&self, var: VarIndex) -> bool {
        Self::slot(var).map(|i| self.transitive[i]).unwrap_or(false)
    }

    pub(crate) fn set_direct(&mut self, var: VarIndex, value: bool) {
        if let Some(i) = Self::slot(var) {
            self.direct[i] = value;
        }
    }

    pub(crate) fn set_transitive(&mut self, var: VarIndex, value: bool) {
        if let Some(i) = Self::slot(var) {
            self.transitive[i] = value;
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Record {
    values: BTreeMap<VarIndex, SymbolicPower>,
    corruption: CorruptionFlags,
}

/// Lazily-populated mapping from `noteId` to its already-evaluated property
/// values, owned by the `Module`. Entries are invalidated (not just
/// overwritten) when a mutation's dirty closure reaches a note, so a stale
/// read never silently survives a dependency change.
#[derive(Debug, Clone, Default)]
pub struct EvaluationCache {
    records: BTreeMap<NoteId, Record>,
}

impl EvaluationCache {
    pub fn new() -> EvaluationCache {
        EvaluationCache::default()
    }

    pub fn get_value(&self, note: NoteId, var: VarIndex) -> Option<&SymbolicPower> {
        self.records.get(&note)?.values.get(&var)
    }

    /// Both the value and its corruption state, the shape `module.get`
    /// exposes to external collaborators.
    pub fn get(&self, note: NoteId, var: VarIndex) -> Option<(&SymbolicPower, bool)> {
        let record = self.records.get(&note)?;
        let value = record.values.get(&var)?;
        Some((value, record.corruption.is_corrupted(var)))
    }

    pub fn corruption(&self, note: NoteId) -> CorruptionFlags {
        self.records.get(&note).map(|r| r.corruption).unwrap_or_default()
    }

    pub(crate) fn set_direct(&mut self, note: NoteId, var: VarIndex, value: SymbolicPower, corrupted: bool) {
        let record = self.records.entry(note).or_default();
        record.values.insert(var, value);
        record.corruption.set_direct(var, corrupted);
    }

    pub(crate) fn set_transitive(&mut self, note: NoteId, var: VarIndex, corrupted: bool) {
        self.records.entry(note).or_default().corruption.set_transitive(var, corrupted);
    }

    pub(crate) fn invalidate(&mut self, note: NoteId) {
        self.records.remove(&note);
    }

    /// Every `(noteId, var)` slot currently populated, in ascending
    /// `(noteId, var)` order. Used by `notecore-cli` to print the whole
    /// cache as a table without reaching into its internals.
    pub fn entries(&self) -> impl Iterator<Item = (NoteId, VarIndex, &SymbolicPower, bool)> {
        self.records.iter().flat_map(|(&note, record)| {
            record
                .values
                .iter()
                .map(move |(&var, value)| (note, var, value, record.corruption.is_corrupted(var)))
        })
    }
}
