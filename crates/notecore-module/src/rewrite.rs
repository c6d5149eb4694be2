//! Algebraic source reconstruction for `liberate` and `evaluate_to_base`:
//! both rebuild a new source expression by walking and substituting an
//! `Expr` tree, never by regex/string rewriting.

use notecore_bytecode::{tree_from_instrs, Expr, NoteId, VarIndex};
use notecore_rational::Rational;

use crate::note::Note;

/// The `Expr` tree `note` currently holds for `var`, or the tree an
/// uninherited property falls back to: `Tempo`/`MeasureLength` walk from
/// `note`'s own parent, anything else is the literal zero the VM also
/// defaults an unset property's bytecode to.
pub(crate) fn note_expr_tree(note: &Note, var: VarIndex) -> Expr {
    if let Some(compiled) = note.compiled(var) {
        let instrs = compiled
            .instrs()
            .expect("CompiledExpr bytecode was produced by this crate's own encoder");
        tree_from_instrs(&instrs, compiled.constants())
            .expect("CompiledExpr bytecode was produced by this crate's own encoder")
    } else {
        match var {
            VarIndex::Tempo => Expr::Tempo(note.parent_id()),
            VarIndex::MeasureLength => Expr::MeasureLen(note.parent_id()),
            _ => Expr::Const(Rational::zero()),
        }
    }
}

/// Replaces every node of `expr` that reads `target` (a `[target].var`
/// reference or a `tempo([target])`/`measure([target])` call) with
/// `target_note`'s own reconstructed tree for that property, recursing
/// through the rest of the tree unchanged.
pub(crate) fn substitute_note(expr: &Expr, target: NoteId, target_note: &Note) -> Expr {
    match expr {
        Expr::Ref(note, var) if *note == target => note_expr_tree(target_note, *var),
        Expr::Tempo(Some(note)) if *note == target => note_expr_tree(target_note, VarIndex::Tempo),
        Expr::MeasureLen(Some(note)) if *note == target => note_expr_tree(target_note, VarIndex::MeasureLength),
        Expr::Const(_) | Expr::Base(_) | Expr::Ref(..) | Expr::Tempo(_) | Expr::MeasureLen(_) => expr.clone(),
        Expr::Add(a, b) => Expr::Add(
            Box::new(substitute_note(a, target, target_note)),
            Box::new(substitute_note(b, target, target_note)),
        ),
        Expr::Sub(a, b) => Expr::Sub(
            Box::new(substitute_note(a, target, target_note)),
            Box::new(substitute_note(b, target, target_note)),
        ),
        Expr::Mul(a, b) => Expr::Mul(
            Box::new(substitute_note(a, target, target_note)),
            Box::new(substitute_note(b, target, target_note)),
        ),
        Expr::Div(a, b) => Expr::Div(
            Box::new(substitute_note(a, target, target_note)),
            Box::new(substitute_note(b, target, target_note)),
        ),
        Expr::Pow(a, b) => Expr::Pow(
            Box::new(substitute_note(a, target, target_note)),
            Box::new(substitute_note(b, target, target_note)),
        ),
        Expr::Neg(a) => Expr::Neg(Box::new(substitute_note(a, target, target_note))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notecore_bytecode::decompile;
    use notecore_compiler::{compile, CompilerConfig};
    use pretty_assertions::assert_eq;

    fn note_with(id: NoteId, parent: Option<NoteId>, var: VarIndex, source: &str) -> Note {
        let config = CompilerConfig::default();
        let compiled = compile(source, &config).unwrap();
        let mut note = Note::new(id, parent);
        note.set(var, source.to_string(), compiled);
        note
    }

    #[test]
    fn substitutes_a_direct_reference_with_the_targets_source() {
        let target = note_with(2, Some(0), VarIndex::Frequency, "base.f * (3/2)");
        let dependent_source = "[2].f * (5/4)";
        let config = CompilerConfig::default();
        let compiled = compile(dependent_source, &config).unwrap();
        let tree = tree_from_instrs(&compiled.instrs().unwrap(), compiled.constants()).unwrap();

        let rewritten = substitute_note(&tree, 2, &target);
        assert_eq!(decompile(&rewritten), "base.frequency * (3/2) * (5/4)");
    }

    #[test]
    fn leaves_unrelated_references_untouched() {
        let target = note_with(2, Some(0), VarIndex::Frequency, "base.f");
        let config = CompilerConfig::default();
        let compiled = compile("[3].f + [2].f", &config).unwrap();
        let tree = tree_from_instrs(&compiled.instrs().unwrap(), compiled.constants()).unwrap();

        let rewritten = substitute_note(&tree, 2, &target);
        assert_eq!(decompile(&rewritten), "[3].frequency + base.frequency");
    }
}
