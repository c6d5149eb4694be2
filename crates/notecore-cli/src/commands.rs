//! The four subcommands: `load`, `eval`, `set`, `dump-graph`. Each is a
//! thin consumer of `notecore-module` — this crate performs all file I/O;
//! the library stays pure.

use colored::Colorize;
use notecore_bytecode::{NoteId, VarIndex};
use notecore_module::{Module, ModuleJson, SymbolicPower};

use crate::error::CliError;

fn read_module(path: &str) -> Result<Module, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io { path: path.to_string(), source })?;
    let doc: ModuleJson =
        serde_json::from_str(&text).map_err(|source| CliError::Json { path: path.to_string(), source })?;
    Ok(Module::from_json(&doc)?)
}

fn parse_prop(prop: &str) -> Result<VarIndex, CliError> {
    match prop.to_ascii_lowercase().as_str() {
        "t" | "starttime" => Ok(VarIndex::StartTime),
        "d" | "duration" => Ok(VarIndex::Duration),
        "f" | "frequency" => Ok(VarIndex::Frequency),
        "tempo" => Ok(VarIndex::Tempo),
        "bpm" | "beatspermeasure" => Ok(VarIndex::BeatsPerMeasure),
        "ml" | "measurelength" => Ok(VarIndex::MeasureLength),
        other => Err(CliError::UnknownProperty(other.to_string())),
    }
}

/// `c` on its own for a pure rational; `c * b1^e1 * b2^e2 ...` otherwise,
/// dropping a coefficient of exactly 1.
fn format_value(v: &SymbolicPower) -> String {
    if v.is_pure_rational() {
        return v.coeff().to_string();
    }
    let coeff = v.coeff().to_string();
    let mut parts = Vec::new();
    if coeff != "1" {
        parts.push(coeff);
    }
    for (base, exp) in v.terms() {
        parts.push(format!("{base}^{exp}"));
    }
    parts.join(" * ")
}

fn print_cache(module: &Module) {
    println!("{:<8} {:<16} {:<24} {}", "note", "property", "value", "");
    for (note, var, value, corrupted) in module.cache().entries() {
        let row = format!("{:<8} {:<16} {:<24}", note, var.dsl_name(), format_value(value));
        if corrupted {
            println!("{} {}", row, "CORRUPTED".yellow().bold());
        } else {
            println!("{row}");
        }
    }
}

pub(crate) fn load(file: &str) -> Result<(), CliError> {
    let module = read_module(file)?;
    let count = module.notes().count();
    println!(
        "{} loaded '{}': {} note(s) (including the base note)",
        "ok".green().bold(),
        file,
        count
    );
    Ok(())
}

pub(crate) fn eval(file: &str) -> Result<(), CliError> {
    let mut module = read_module(file)?;
    module.evaluate();
    print_cache(&module);
    Ok(())
}

pub(crate) fn set(file: &str, note_id: NoteId, prop: &str, expr: &str) -> Result<(), CliError> {
    let mut module = read_module(file)?;
    let var = parse_prop(prop)?;
    module.set_expression(note_id, var, expr)?;
    module.evaluate();
    println!("{} set note {note_id} {} = \"{expr}\"", "ok".green().bold(), var.dsl_name());
    print_cache(&module);
    Ok(())
}

pub(crate) fn dump_graph(file: &str) -> Result<(), CliError> {
    let module = read_module(file)?;
    for (&id, _) in module.notes() {
        let dependencies = module.dependencies(id);
        let dependents = module.dependents(id);
        println!(
            "note {id}: depends on {:?}, depended on by {:?}",
            dependencies.into_iter().collect::<Vec<_>>(),
            dependents.into_iter().collect::<Vec<_>>(),
        );
    }
    Ok(())
}
