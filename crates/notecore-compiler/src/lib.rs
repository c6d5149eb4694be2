//! Compiler (C4): two surface syntaxes — a DSL (`dsl`) and a legacy
//! method-chain form (`legacy`) — compiling to one bytecode IR
//! ([`notecore_bytecode::CompiledExpr`]). The front end is chosen per
//! expression by a syntactic sniff, never by trying both and seeing which
//! parses; both front ends are explicit recursive-descent parsers, never
//! string-eval.

mod config;
mod dsl;
mod error;
mod legacy;
mod lower;
mod token;

pub use config::CompilerConfig;
pub use error::CompileError;
pub use notecore_bytecode::{CompiledExpr, Expr};

/// Which front end a source string should be parsed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Dsl,
    Legacy,
}

/// Sniffs which surface syntax `source` is written in: `new Fraction(` or a
/// `.method(` call marks legacy; anything else (including `base.prop`,
/// `[id].prop`, and bare operators) is DSL.
pub fn sniff(source: &str) -> Syntax {
    if source.contains("new Fraction(") || source.contains(".getVariable(") {
        Syntax::Legacy
    } else {
        Syntax::Dsl
    }
}

/// Compiles `source`, choosing the front end via [`sniff`].
pub fn compile(source: &str, config: &CompilerConfig) -> Result<CompiledExpr, CompileError> {
    match sniff(source) {
        Syntax::Dsl => compile_dsl(source, config),
        Syntax::Legacy => compile_legacy(source, config),
    }
}

pub fn compile_dsl(source: &str, config: &CompilerConfig) -> Result<CompiledExpr, CompileError> {
    let expr = dsl::parse(source)?;
    check_depth(&expr, config)?;
    Ok(lower::lower(&expr))
}

pub fn compile_legacy(source: &str, config: &CompilerConfig) -> Result<CompiledExpr, CompileError> {
    let expr = legacy::parse(source)?;
    check_depth(&expr, config)?;
    Ok(lower::lower(&expr))
}

/// Recompiles bytecode's decompiled source text through the DSL front end.
/// Used to verify `compile(decompile(bc)) == bc` and to implement
/// `evaluate_to_base`/`liberate`, which reconstruct source algebraically.
pub fn recompile_decompiled(expr: &notecore_bytecode::Expr) -> CompiledExpr {
    lower::lower(expr)
}

fn check_depth(expr: &Expr, config: &CompilerConfig) -> Result<(), CompileError> {
    let depth = lower::depth(expr);
    if depth > config.max_depth {
        Err(CompileError::DepthExceeded {
            depth,
            max: config.max_depth,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notecore_bytecode::{CompiledExpr as Compiled, VarIndex};
    use pretty_assertions::assert_eq;

    #[test]
    fn sniff_picks_legacy_on_fraction_constructor() {
        assert_eq!(sniff("new Fraction(1,2)"), Syntax::Legacy);
        assert_eq!(sniff("base.f * (5/4)"), Syntax::Dsl);
    }

    #[test]
    fn dsl_and_legacy_compile_to_identical_bytecode_for_equivalent_programs() {
        let config = CompilerConfig::default();
        let dsl = compile("base.f * (3/2)", &config).unwrap();
        let legacy = compile(
            "baseNote.getVariable('frequency').mul(new Fraction(3,2))",
            &config,
        )
        .unwrap();
        assert_eq!(dsl, legacy);
    }

    #[test]
    fn compile_decompile_round_trips() {
        let config = CompilerConfig::default();
        let compiled = compile("([1].f + base.f) * 2^(1/12)", &config).unwrap();
        let source = compiled.decompile().unwrap();
        let recompiled = compile(&source, &config).unwrap();
        assert_eq!(compiled, recompiled);
    }

    #[test]
    fn empty_bytecode_is_distinct_from_a_compile_error() {
        let empty = Compiled::empty();
        assert!(empty.is_empty());
        assert_eq!(empty.references(), &[]);
        assert_eq!(
            compile("", &CompilerConfig::default()).unwrap_err(),
            CompileError::EmptyExpression
        );
    }

    #[test]
    fn depth_guard_rejects_pathologically_nested_expressions() {
        let mut source = "1".to_string();
        for _ in 0..100 {
            source = format!("({source} + 1)");
        }
        let config = CompilerConfig { max_depth: 16 };
        match compile(&source, &config) {
            Err(CompileError::DepthExceeded { .. }) => {}
            other => panic!("expected DepthExceeded, got {other:?}"),
        }
    }

    #[test]
    fn reference_set_matches_the_compiled_bytecode() {
        let config = CompilerConfig::default();
        let compiled = compile("[2].f + [2].d * [5].t", &config).unwrap();
        let mut refs = compiled.references().to_vec();
        refs.sort();
        assert_eq!(
            refs,
            vec![
                (2, VarIndex::Frequency),
                (2, VarIndex::Duration),
                (5, VarIndex::StartTime),
            ]
        );
    }
}
