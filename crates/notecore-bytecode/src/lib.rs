//! Bytecode format (C3): a compact, single-byte-opcode stack program that
//! compiled note expressions are stored as. See `instr` for the opcode set
//! and wire encoding, `expr` for the tree used only to decompile back to
//! source, and `compiled` for the immutable [`CompiledExpr`] that
//! `notecore-compiler` emits and `notecore-vm` executes.

mod compiled;
mod expr;
mod instr;

pub use compiled::CompiledExpr;
pub use expr::{decompile, tree_from_instrs, Expr};
pub use instr::{decode, encode, DecodeError, Instr, NoteId, VarIndex, BASE_SENTINEL};
