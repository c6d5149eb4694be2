use std::collections::BTreeMap;

use notecore_bytecode::{CompiledExpr, NoteId, VarIndex};

/// The five properties a note may carry a bytecoded expression for.
/// `VarIndex::MeasureLength` is excluded: it is always derived from the
/// tempo inheritance walk (`beatsPerMeasure * 60 / tempo`), never stored.
pub const SETTABLE_PROPERTIES: [VarIndex; 5] = [
    VarIndex::StartTime,
    VarIndex::Duration,
    VarIndex::Frequency,
    VarIndex::Tempo,
    VarIndex::BeatsPerMeasure,
];

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Expression {
    pub source: String,
    pub compiled: CompiledExpr,
}

/// One note: identity, an optional parent for the tempo/measure
/// inheritance walk, up to five bytecoded expressions with their original
/// source text, and a couple of display-only fields carried through JSON
/// round-trips untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub(crate) id: NoteId,
    pub(crate) parent_id: Option<NoteId>,
    pub(crate) color: Option<String>,
    pub(crate) instrument: Option<String>,
    pub(crate) expressions: BTreeMap<VarIndex, Expression>,
}

impl Note {
    pub(crate) fn new(id: NoteId, parent_id: Option<NoteId>) -> Note {
        Note {
            id,
            parent_id,
            color: None,
            instrument: None,
            expressions: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> NoteId {
        self.id
    }

    pub fn parent_id(&self) -> Option<NoteId> {
        self.parent_id
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    pub fn instrument(&self) -> Option<&str> {
        self.instrument.as_deref()
    }

    pub fn source(&self, var: VarIndex) -> Option<&str> {
        self.expressions.get(&var).map(|e| e.source.as_str())
    }

    pub fn compiled(&self, var: VarIndex) -> Option<&CompiledExpr> {
        self.expressions.get(&var).map(|e| &e.compiled)
    }

    pub fn properties(&self) -> impl Iterator<Item = (VarIndex, &str)> {
        self.expressions.iter().map(|(v, e)| (*v, e.source.as_str()))
    }

    pub(crate) fn set(&mut self, var: VarIndex, source: String, compiled: CompiledExpr) {
        self.expressions.insert(var, Expression { source, compiled });
    }
}
