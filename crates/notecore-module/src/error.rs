use notecore_bytecode::{NoteId, VarIndex};
use notecore_compiler::CompileError;
use notecore_graph::GraphError;
use thiserror::Error;

/// Errors raised by `notecore-module`, aggregating the sub-crate error
/// taxonomies (compile, graph) plus the checks only the Module can make —
/// it is the only component that knows both a note's id and its reference
/// set, and the only one that owns the notion of "the base note".
///
/// Structural errors (everything except [`ModuleError::Compile`]'s numeric
/// variants, which don't exist — compile errors are always structural
/// too) abort the operation and leave the Module unchanged; numeric
/// errors during evaluation never reach this type, they are recorded as
/// per-property corruption flags instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("expression for note {note} property {var:?} references itself")]
    SelfReference { note: NoteId, var: VarIndex },

    #[error("circular dependency: {}", path.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(" -> "))]
    CircularDependency { path: Vec<NoteId> },

    #[error("note id {0} is not unique")]
    DuplicateId(NoteId),

    #[error("expression references note {0}, which does not exist")]
    DanglingReference(NoteId),

    #[error("note {0} does not exist")]
    UnknownNote(NoteId),

    #[error("the base note (id 0) cannot be deleted")]
    BaseNoteImmutable,

    #[error("base note is missing required field '{0}'")]
    MissingBaseField(&'static str),

    #[error("malformed module JSON: {0}")]
    InvalidJson(String),

    #[error("the base note's expressions may not reference other notes")]
    BaseReferencesNote,

    #[error("{0:?} cannot be set directly; it is always derived")]
    NotSettable(VarIndex),

    /// Raised by `evaluate_to_base` when the property's current value
    /// cannot be expressed as a rational multiple of the base unit it
    /// reconstructs against (a beat length for timing, the base
    /// frequency for pitch) — e.g. the value is itself radical-mismatch
    /// corrupted, or the reference chain bottoms out in a different
    /// radical than the base's.
    #[error("note {note} property {var:?} cannot be rewritten as an exact expression over the base note")]
    NotExactlyRepresentable { note: NoteId, var: VarIndex },

    /// `evaluate_to_base` is only defined for `startTime`, `duration`, and
    /// `frequency`; `tempo`/`beatsPerMeasure`/`measureLength` have no
    /// base-relative reconstruction rule.
    #[error("evaluate_to_base is not defined for {0:?}")]
    UnsupportedEvaluateToBase(VarIndex),
}

impl From<GraphError> for ModuleError {
    fn from(err: GraphError) -> ModuleError {
        match err {
            GraphError::Cycle(path) => ModuleError::CircularDependency { path },
        }
    }
}
