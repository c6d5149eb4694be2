use notecore_rational::Rational;

use crate::expr::{decompile, tree_from_instrs};
use crate::instr::{decode, encode, DecodeError, Instr, NoteId, VarIndex};

/// An immutable compiled expression: bytecode bytes, its constant pool, the
/// set of other notes/properties it reads, and the base properties it reads.
/// Produced by `notecore-compiler`, consumed by `notecore-vm` and
/// `notecore-graph`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompiledExpr {
    bytecode: Vec<u8>,
    constants: Vec<Rational>,
    references: Vec<(NoteId, VarIndex)>,
    base_references: Vec<VarIndex>,
}

impl CompiledExpr {
    /// Builds from an instruction sequence and its constant pool, deriving
    /// the reference set and base-reference set by scanning the
    /// instructions — callers never hand-compute these.
    pub fn from_instrs(instrs: Vec<Instr>, constants: Vec<Rational>) -> CompiledExpr {
        let mut references = Vec::new();
        let mut base_references = Vec::new();
        let mut push_base = |var: VarIndex| {
            if !base_references.contains(&var) {
                base_references.push(var);
            }
        };
        for instr in &instrs {
            match instr {
                Instr::LoadBase(var) => push_base(*var),
                Instr::LoadRef(note, var) => {
                    if !references.contains(&(*note, *var)) {
                        references.push((*note, *var));
                    }
                }
                Instr::LoadTempo(None) => push_base(VarIndex::Tempo),
                Instr::LoadMeasureLen(None) => push_base(VarIndex::MeasureLength),
                Instr::LoadTempo(Some(note)) => {
                    let edge = (*note, VarIndex::Tempo);
                    if !references.contains(&edge) {
                        references.push(edge);
                    }
                }
                Instr::LoadMeasureLen(Some(note)) => {
                    let edge = (*note, VarIndex::MeasureLength);
                    if !references.contains(&edge) {
                        references.push(edge);
                    }
                }
                _ => {}
            }
        }
        CompiledExpr {
            bytecode: encode(&instrs),
            constants,
            references,
            base_references,
        }
    }

    pub fn empty() -> CompiledExpr {
        CompiledExpr {
            bytecode: Vec::new(),
            constants: Vec::new(),
            references: Vec::new(),
            base_references: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytecode.is_empty()
    }

    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    pub fn constants(&self) -> &[Rational] {
        &self.constants
    }

    pub fn references(&self) -> &[(NoteId, VarIndex)] {
        &self.references
    }

    pub fn references_base(&self) -> bool {
        !self.base_references.is_empty()
    }

    /// The set of base-note properties this expression reads.
    pub fn base_references(&self) -> &[VarIndex] {
        &self.base_references
    }

    pub fn instrs(&self) -> Result<Vec<Instr>, DecodeError> {
        decode(&self.bytecode)
    }

    /// Reconstructs DSL source text from the bytecode. Required for
    /// serialization round-trip and for the `liberate` operation, which
    /// substitutes one note's reconstructed source into another's.
    pub fn decompile(&self) -> Result<String, DecodeError> {
        let instrs = self.instrs()?;
        let tree = tree_from_instrs(&instrs, &self.constants)?;
        Ok(decompile(&tree))
    }
}
