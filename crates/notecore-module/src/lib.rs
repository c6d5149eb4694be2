//! Module & incremental evaluator: the crate external collaborators
//! actually link against. [`Module`] owns every [`Note`], one
//! [`notecore_graph::DependencyGraph`], one [`EvaluationCache`], a scratch
//! [`notecore_rational::Pool`], and a dirty set. It is the only component
//! that knows both a note's id and its compiled reference set, so it is
//! also the only place self-reference and cycle checks can be made
//! (the compiler itself never learns the owning id; that's enforced here,
//! at validation time, instead).
//!
//! Mutation protocol: compile, validate (self-reference, cycle, dangling
//! reference), register the edge delta, compute the dirty closure
//! (`{note} ∪ transitive_dependents(note)`), invalidate those cache
//! entries, mark them dirty. Evaluation protocol: topo-sort the dirty set,
//! evaluate every set property in order (direct corruption), then one
//! more topo-order pass for transitive corruption. Both run on one thread
//! with no global state.

mod cache;
mod env;
mod error;
mod json;
mod note;
mod rewrite;
mod to_base;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use notecore_bytecode::CompiledExpr;
use notecore_compiler::CompilerConfig;
use notecore_graph::DependencyGraph;
use notecore_rational::Pool;

pub use cache::{CorruptionFlags, EvaluationCache};
pub use error::ModuleError;
pub use json::{BaseNoteJson, MeasureJson, ModuleJson, NoteJson};
pub use note::{Note, SETTABLE_PROPERTIES};
pub use notecore_algebra::SymbolicPower;
pub use notecore_bytecode::{NoteId, VarIndex};

use env::ModuleEnv;

/// Id 0 is reserved for the base note.
pub const BASE_NOTE_ID: NoteId = 0;

/// The four expressions every base note must carry, plus its optional
/// instrument tag. Mirrors `BaseNoteJson` but as owned strings a caller
/// can build without going through JSON.
#[derive(Debug, Clone)]
pub struct BaseNoteInit {
    pub frequency: String,
    pub start_time: String,
    pub tempo: String,
    pub beats_per_measure: String,
    pub instrument: Option<String>,
}

/// `delete`'s two variants: cascade drops the note and
/// every transitive dependent; keep-dependents liberates first so
/// dependents survive with the deleted note's source substituted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStrategy {
    Cascade,
    Keep,
}

/// Owns the composition: notes, the dependency graph, the evaluation
/// cache, the dirty set, and the scratch rational pool. An explicit value
/// passed to every operation; there is no global mutable state.
#[derive(Debug)]
pub struct Module {
    notes: BTreeMap<NoteId, Note>,
    next_id: NoteId,
    graph: DependencyGraph,
    cache: EvaluationCache,
    dirty: BTreeSet<NoteId>,
    pool: Pool,
    compiler_config: CompilerConfig,
}

impl Clone for Module {
    /// The scratch pool is never carried across a clone — it is pure
    /// reuse optimization, never observable state, so a
    /// clone gets a fresh empty one rather than racing the original for
    /// its free list.
    fn clone(&self) -> Self {
        Module {
            notes: self.notes.clone(),
            next_id: self.next_id,
            graph: self.graph.clone(),
            cache: self.cache.clone(),
            dirty: self.dirty.clone(),
            pool: Pool::new(),
            compiler_config: self.compiler_config.clone(),
        }
    }
}

impl Module {
    /// Builds a fresh module with only the base note, compiling its four
    /// required expressions immediately. There is exactly one base note,
    /// and it always lives at id 0.
    pub fn new(base: BaseNoteInit) -> Result<Module, ModuleError> {
        let mut module = Module {
            notes: BTreeMap::new(),
            next_id: 1,
            graph: DependencyGraph::new(),
            cache: EvaluationCache::new(),
            dirty: BTreeSet::new(),
            pool: Pool::new(),
            compiler_config: CompilerConfig::default(),
        };
        module.notes.insert(BASE_NOTE_ID, Note::new(BASE_NOTE_ID, None));
        module.notes.get_mut(&BASE_NOTE_ID).unwrap().instrument = base.instrument;

        for (var, source) in [
            (VarIndex::Frequency, &base.frequency),
            (VarIndex::StartTime, &base.start_time),
            (VarIndex::Tempo, &base.tempo),
            (VarIndex::BeatsPerMeasure, &base.beats_per_measure),
        ] {
            module.set_expression(BASE_NOTE_ID, var, source)?;
        }
        Ok(module)
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.get(&id)
    }

    pub fn notes(&self) -> impl Iterator<Item = (&NoteId, &Note)> {
        self.notes.iter()
    }

    pub fn cache(&self) -> &EvaluationCache {
        &self.cache
    }

    pub fn corruption(&self, note_id: NoteId) -> CorruptionFlags {
        self.cache.corruption(note_id)
    }

    pub fn dependencies(&self, note_id: NoteId) -> BTreeSet<NoteId> {
        self.graph.dependencies(note_id)
    }

    pub fn dependents(&self, note_id: NoteId) -> BTreeSet<NoteId> {
        self.graph.dependents(note_id)
    }

    pub fn transitive_dependents(&self, note_id: NoteId) -> BTreeSet<NoteId> {
        self.graph.transitive_dependents(note_id)
    }

    /// Dependents whose `dependent_var` reads `note_id`'s `note_var`
    /// specifically (used for drag-preview style queries).
    pub fn dependents_by_property(
        &self,
        note_id: NoteId,
        note_var: VarIndex,
        dependent_var: VarIndex,
    ) -> BTreeSet<NoteId> {
        self.graph.dependents_by_property(note_id, note_var, dependent_var)
    }

    /// Reads a cache entry. `VarIndex::MeasureLength` is never stored
    /// directly — it's computed, never authored — so it is resolved
    /// live via the same inheritance walk `LOAD_MEASURE_LEN` uses; every
    /// other property is a plain cache read.
    pub fn get(&self, note_id: NoteId, var: VarIndex) -> Option<(SymbolicPower, bool)> {
        if var == VarIndex::MeasureLength {
            let env = ModuleEnv::new(&self.notes, &self.cache, &self.pool);
            let target = (note_id != BASE_NOTE_ID).then_some(note_id);
            let value = notecore_vm::Environment::measure_length(&env, target)?;
            return Some((value, false));
        }
        self.cache.get(note_id, var).map(|(v, c)| (v.clone(), c))
    }

    /// Compiles `source`, validates it against `note_id`'s reference set
    /// (self-reference, dangling reference, cycle), and — only if every
    /// check passes — registers the edge delta and marks the dirty
    /// closure. A failing check leaves the Module byte-for-byte unchanged.
    pub fn set_expression(&mut self, note_id: NoteId, var: VarIndex, source: &str) -> Result<(), ModuleError> {
        if !self.notes.contains_key(&note_id) {
            return Err(ModuleError::UnknownNote(note_id));
        }
        if !SETTABLE_PROPERTIES.contains(&var) {
            return Err(ModuleError::NotSettable(var));
        }
        let compiled = notecore_compiler::compile(source, &self.compiler_config)?;
        self.validate_references(note_id, var, &compiled)?;
        self.apply_compiled(note_id, var, source.to_string(), compiled);
        Ok(())
    }

    /// Assigns the next id, compiles and registers every initial
    /// expression, and marks the new note dirty. Rolls the note back out
    /// entirely if any expression fails to validate, so a failed
    /// `add_note` never leaves a half-registered note behind.
    pub fn add_note(
        &mut self,
        parent_id: Option<NoteId>,
        initial: &[(VarIndex, String)],
        color: Option<String>,
        instrument: Option<String>,
    ) -> Result<NoteId, ModuleError> {
        if let Some(parent) = parent_id {
            if !self.notes.contains_key(&parent) {
                return Err(ModuleError::UnknownNote(parent));
            }
        }
        let id = self.next_id;
        let mut note = Note::new(id, parent_id);
        note.color = color;
        note.instrument = instrument;
        self.notes.insert(id, note);
        self.next_id += 1;

        for (var, source) in initial {
            if let Err(err) = self.set_expression(id, *var, source) {
                self.notes.remove(&id);
                self.next_id -= 1;
                return Err(err);
            }
        }
        self.dirty.insert(id);
        Ok(id)
    }

    /// Cascade drops `note_id` and every transitive dependent; keep
    /// liberates `note_id` into its dependents first so they survive with
    /// its source substituted in.
    pub fn delete(&mut self, note_id: NoteId, strategy: DeleteStrategy) -> Result<(), ModuleError> {
        if note_id == BASE_NOTE_ID {
            return Err(ModuleError::BaseNoteImmutable);
        }
        if !self.notes.contains_key(&note_id) {
            return Err(ModuleError::UnknownNote(note_id));
        }
        match strategy {
            DeleteStrategy::Cascade => {
                let mut victims = self.graph.transitive_dependents(note_id);
                victims.insert(note_id);
                for &n in &victims {
                    self.graph.remove(n);
                    self.cache.invalidate(n);
                    self.dirty.remove(&n);
                }
                for n in victims {
                    self.notes.remove(&n);
                }
            }
            DeleteStrategy::Keep => {
                self.liberate(note_id)?;
                self.graph.remove(note_id);
                self.cache.invalidate(note_id);
                self.dirty.remove(&note_id);
                self.notes.remove(&note_id);
            }
        }
        Ok(())
    }

    /// Substitutes `note_id`'s own reconstructed source into every
    /// dependent that reads it (for any of its five properties),
    /// recompiling and re-registering each in place. After this call
    /// `note_id` can be deleted without orphaning a reference.
    pub fn liberate(&mut self, note_id: NoteId) -> Result<(), ModuleError> {
        if !self.notes.contains_key(&note_id) {
            return Err(ModuleError::UnknownNote(note_id));
        }
        let target = self.notes.get(&note_id).unwrap().clone();
        let dependents: Vec<NoteId> = self.graph.dependents(note_id).into_iter().collect();

        for dep_id in dependents {
            let dep_note = self.notes.get(&dep_id).unwrap().clone();
            for var in SETTABLE_PROPERTIES {
                let Some(compiled) = dep_note.compiled(var) else {
                    continue;
                };
                if !compiled.references().iter().any(|(n, _)| *n == note_id) {
                    continue;
                }
                let instrs = compiled
                    .instrs()
                    .expect("CompiledExpr bytecode was produced by this crate's own encoder");
                let tree = notecore_bytecode::tree_from_instrs(&instrs, compiled.constants())
                    .expect("CompiledExpr bytecode was produced by this crate's own encoder");
                let substituted = rewrite::substitute_note(&tree, note_id, &target);
                let new_source = notecore_bytecode::decompile(&substituted);
                let recompiled = notecore_compiler::recompile_decompiled(&substituted);

                self.validate_references(dep_id, var, &recompiled)?;
                self.apply_compiled(dep_id, var, new_source, recompiled);
            }
        }
        Ok(())
    }

    /// Applies N `(noteId, var, sourceText)` updates against a staged
    /// clone, compiling, validating and registering every one before any
    /// are committed; only if all succeed does evaluation run once and
    /// the staged module replace `self`. Used for bulk rewrites such as
    /// retargeting the whole module onto base-note references.
    pub fn batch_set(&mut self, updates: &[(NoteId, VarIndex, String)]) -> Result<(), ModuleError> {
        let mut staged = self.clone();
        for (note_id, var, source) in updates {
            staged.set_expression(*note_id, *var, source)?;
        }
        staged.evaluate();
        *self = staged;
        Ok(())
    }

    /// Re-evaluates the dirty set in topological order. A no-op (returns
    /// the cache unchanged) when nothing is dirty.
    pub fn evaluate(&mut self) -> &EvaluationCache {
        if self.dirty.is_empty() {
            return &self.cache;
        }
        let order = self
            .graph
            .topo_sort(&self.dirty)
            .expect("register()'s cycle check keeps the graph acyclic; see notecore_graph::GraphError::Cycle");

        for &note_id in &order {
            for var in SETTABLE_PROPERTIES {
                let compiled = match self.notes.get(&note_id).and_then(|n| n.compiled(var)) {
                    Some(c) => c.clone(),
                    None => continue,
                };
                let outcome = {
                    let env = ModuleEnv::new(&self.notes, &self.cache, &self.pool);
                    notecore_vm::evaluate(&compiled, &env, &self.pool)
                        .expect("MissingDependency cannot fire: evaluation runs in topological order")
                };
                self.cache.set_direct(note_id, var, outcome.value, outcome.corrupted);
            }
        }

        // Transitive corruption: one more topo-order pass, now that every
        // direct flag in the dirty set is final. Corruption breadth is
        // deliberately "same-property edges only" — a property reads
        // exactly the (note, var) pairs in its own reference set, nothing
        // broader.
        for &note_id in &order {
            let Some(note) = self.notes.get(&note_id) else { continue };
            for var in SETTABLE_PROPERTIES {
                let Some(compiled) = note.compiled(var) else { continue };
                let transitively = compiled
                    .references()
                    .iter()
                    .any(|(n, v)| self.cache.corruption(*n).is_corrupted(*v))
                    || compiled
                        .base_references()
                        .iter()
                        .any(|v| self.cache.corruption(BASE_NOTE_ID).is_corrupted(*v));
                self.cache.set_transitive(note_id, var, transitively);
            }
        }

        self.dirty.clear();
        &self.cache
    }

    /// Rewrites `note_id`'s current `var` value into a new source
    /// expression referencing only the base note and literal constants,
    /// preserving its value exactly. Evaluates first so the
    /// cache reflects any pending mutation. Defined only for `startTime`,
    /// `duration`, `frequency`; fails if the value is corrupted or the
    /// property isn't one of those three.
    pub fn evaluate_to_base(&mut self, note_id: NoteId, var: VarIndex) -> Result<String, ModuleError> {
        to_base::evaluate_to_base(self, note_id, var)
    }

    pub fn to_json(&self) -> ModuleJson {
        json::to_json(self)
    }

    pub fn from_json(doc: &ModuleJson) -> Result<Module, ModuleError> {
        json::from_json(doc)
    }

    pub(crate) fn notes_map(&self) -> &BTreeMap<NoteId, Note> {
        &self.notes
    }

    pub(crate) fn notes_map_mut(&mut self) -> &mut BTreeMap<NoteId, Note> {
        &mut self.notes
    }

    pub(crate) fn set_next_id(&mut self, id: NoteId) {
        self.next_id = id;
    }

    fn apply_compiled(&mut self, note_id: NoteId, var: VarIndex, source: String, compiled: CompiledExpr) {
        self.graph.register(note_id, var, &compiled);
        let closure = self.dirty_closure(note_id);
        for &n in &closure {
            self.cache.invalidate(n);
        }
        self.dirty.extend(closure);
        self.notes.get_mut(&note_id).unwrap().set(var, source, compiled);
    }

    fn dirty_closure(&self, note_id: NoteId) -> BTreeSet<NoteId> {
        let mut set = self.graph.transitive_dependents(note_id);
        set.insert(note_id);
        set
    }

    /// The only place self-reference, dangling-reference and cycle checks
    /// happen: only the Module knows both the id being mutated and its
    /// compiled reference set.
    fn validate_references(&self, note_id: NoteId, var: VarIndex, compiled: &CompiledExpr) -> Result<(), ModuleError> {
        if note_id == BASE_NOTE_ID && !compiled.references().is_empty() {
            return Err(ModuleError::BaseReferencesNote);
        }
        for &(ref_note, _) in compiled.references() {
            if ref_note == note_id {
                return Err(ModuleError::SelfReference { note: note_id, var });
            }
            if !self.notes.contains_key(&ref_note) {
                return Err(ModuleError::DanglingReference(ref_note));
            }
            if self.graph.would_cycle(ref_note, note_id) {
                let mut chain = self.find_chain(ref_note, note_id);
                let mut path = vec![note_id];
                path.append(&mut chain);
                return Err(ModuleError::CircularDependency { path });
            }
        }
        Ok(())
    }

    /// BFS over the (already-registered) dependency edges from `from` to
    /// `to`, for a readable `CircularDependency` path. Best-effort: if no
    /// chain is found (shouldn't happen once `would_cycle` said yes) it
    /// falls back to the bare two-node pair.
    fn find_chain(&self, from: NoteId, to: NoteId) -> Vec<NoteId> {
        let mut visited = BTreeSet::new();
        visited.insert(from);
        let mut queue = VecDeque::new();
        queue.push_back(vec![from]);
        while let Some(path) = queue.pop_front() {
            let last = *path.last().unwrap();
            if last == to {
                return path;
            }
            for dep in self.graph.dependencies(last) {
                if visited.insert(dep) {
                    let mut next = path.clone();
                    next.push(dep);
                    queue.push_back(next);
                }
            }
        }
        vec![from, to]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

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

    fn value_of(module: &Module, id: NoteId, var: VarIndex) -> SymbolicPower {
        module.get(id, var).unwrap().0
    }

    #[test]
    fn major_chord_scenario() {
        let mut m = base440();
        let n1 = m
            .add_note(
                None,
                &[
                    (VarIndex::Frequency, "base.f".to_string()),
                    (VarIndex::StartTime, "base.t".to_string()),
                    (VarIndex::Duration, "beat(base)".to_string()),
                ],
                None,
                None,
            )
            .unwrap();
        let n2 = m
            .add_note(
                None,
                &[
                    (VarIndex::Frequency, "base.f*(5/4)".to_string()),
                    (VarIndex::StartTime, "base.t".to_string()),
                    (VarIndex::Duration, "beat(base)".to_string()),
                ],
                None,
                None,
            )
            .unwrap();
        let n3 = m
            .add_note(
                None,
                &[
                    (VarIndex::Frequency, "base.f*(3/2)".to_string()),
                    (VarIndex::StartTime, "base.t".to_string()),
                    (VarIndex::Duration, "beat(base)".to_string()),
                ],
                None,
                None,
            )
            .unwrap();

        m.evaluate();

        assert_eq!(
            value_of(&m, n1, VarIndex::Frequency).coeff(),
            &notecore_rational::Rational::from_int(440)
        );
        assert_eq!(
            value_of(&m, n2, VarIndex::Frequency).coeff(),
            &notecore_rational::Rational::from_int(550)
        );
        assert_eq!(
            value_of(&m, n3, VarIndex::Frequency).coeff(),
            &notecore_rational::Rational::from_int(660)
        );
        for n in [n1, n2, n3] {
            assert!(!m.corruption(n).is_corrupted(VarIndex::Frequency));
            assert_eq!(
                value_of(&m, n, VarIndex::StartTime).coeff(),
                &notecore_rational::Rational::from_int(0)
            );
            assert_eq!(
                value_of(&m, n, VarIndex::Duration).coeff(),
                &notecore_rational::Rational::from_int(1)
            );
        }
    }

    #[test]
    fn sequential_melody_scenario_propagates_a_duration_change() {
        let mut m = base440();
        let n1 = m
            .add_note(
                None,
                &[
                    (VarIndex::Frequency, "base.f".to_string()),
                    (VarIndex::StartTime, "base.t".to_string()),
                    (VarIndex::Duration, "beat(base)".to_string()),
                ],
                None,
                None,
            )
            .unwrap();
        let n2 = m
            .add_note(
                None,
                &[
                    (VarIndex::Frequency, "base.f*(9/8)".to_string()),
                    (VarIndex::StartTime, format!("[{n1}].t+[{n1}].d")),
                    (VarIndex::Duration, "beat(base)".to_string()),
                ],
                None,
                None,
            )
            .unwrap();
        m.evaluate();
        assert_eq!(
            value_of(&m, n2, VarIndex::StartTime).coeff(),
            &notecore_rational::Rational::from_int(1)
        );

        m.set_expression(n1, VarIndex::Duration, "beat(base)*2").unwrap();
        m.evaluate();

        assert_eq!(
            value_of(&m, n2, VarIndex::StartTime).coeff(),
            &notecore_rational::Rational::from_int(2)
        );
    }

    #[test]
    fn equal_temperament_preservation_scenario() {
        let mut m = base440();
        let n1 = m
            .add_note(None, &[(VarIndex::Frequency, "base.f * 2^(7/12)".to_string())], None, None)
            .unwrap();
        m.evaluate();
        let v1 = value_of(&m, n1, VarIndex::Frequency);
        assert!(!m.corruption(n1).is_corrupted(VarIndex::Frequency));
        assert_eq!(v1.coeff(), &notecore_rational::Rational::from_int(440));
        assert_eq!(
            v1.terms(),
            &[(2, notecore_rational::Rational::from_pair(7, 12).unwrap())]
        );

        let n2 = m
            .add_note(
                None,
                &[(VarIndex::Frequency, format!("[{n1}].f * 2^(5/12)"))],
                None,
                None,
            )
            .unwrap();
        m.evaluate();
        let v2 = value_of(&m, n2, VarIndex::Frequency);
        assert!(v2.is_pure_rational());
        assert_eq!(v2.coeff(), &notecore_rational::Rational::from_int(880));
    }

    #[test]
    fn cycle_attempt_is_rejected_and_module_is_unchanged() {
        let mut m = base440();
        let n1 = m
            .add_note(None, &[(VarIndex::Frequency, "base.f".to_string())], None, None)
            .unwrap();
        let n2 = m
            .add_note(None, &[(VarIndex::Frequency, format!("[{n1}].f"))], None, None)
            .unwrap();
        m.evaluate();
        let cache_before = format!("{:?}", m.cache());

        let err = m
            .set_expression(n1, VarIndex::Frequency, &format!("[{n2}].f"))
            .unwrap_err();
        assert!(matches!(err, ModuleError::CircularDependency { .. }));

        m.evaluate();
        assert_eq!(format!("{:?}", m.cache()), cache_before);
    }

    #[test]
    fn liberate_then_delete_preserves_dependent_value() {
        let mut m = base440();
        let n1 = m
            .add_note(None, &[(VarIndex::Frequency, "base.f".to_string())], None, None)
            .unwrap();
        let n2 = m
            .add_note(None, &[(VarIndex::Frequency, format!("[{n1}].f*(3/2)"))], None, None)
            .unwrap();
        let n3 = m
            .add_note(None, &[(VarIndex::Frequency, format!("[{n2}].f*(5/4)"))], None, None)
            .unwrap();

        m.liberate(n2).unwrap();
        assert!(m.note(n3).unwrap().source(VarIndex::Frequency).unwrap().contains("base.frequency"));

        m.delete(n2, DeleteStrategy::Cascade).unwrap();
        assert!(m.note(n2).is_none());
        assert!(m.note(n3).is_some());

        m.evaluate();
        let v = value_of(&m, n3, VarIndex::Frequency);
        assert_eq!(v.coeff(), &notecore_rational::Rational::from_pair(825, 1).unwrap());
    }

    #[test]
    fn division_by_zero_flags_direct_and_transitive_corruption() {
        let mut m = base440();
        let n1 = m
            .add_note(None, &[(VarIndex::Duration, "base.d / 0".to_string())], None, None)
            .unwrap();
        let n2 = m
            .add_note(None, &[(VarIndex::Duration, format!("[{n1}].d + 1"))], None, None)
            .unwrap();
        m.evaluate();

        assert!(m.corruption(n1).is_directly_corrupted(VarIndex::Duration));
        assert!(!m.corruption(n1).is_transitively_corrupted(VarIndex::Duration));
        assert!(m.corruption(n2).is_transitively_corrupted(VarIndex::Duration));
    }

    #[test]
    fn deleting_the_base_note_is_rejected() {
        let mut m = base440();
        assert_eq!(
            m.delete(BASE_NOTE_ID, DeleteStrategy::Cascade).unwrap_err(),
            ModuleError::BaseNoteImmutable
        );
    }

    #[test]
    fn base_note_cannot_reference_another_note() {
        let mut m = base440();
        let n1 = m
            .add_note(None, &[(VarIndex::Frequency, "440".to_string())], None, None)
            .unwrap();
        assert_eq!(
            m.set_expression(BASE_NOTE_ID, VarIndex::Frequency, &format!("[{n1}].f"))
                .unwrap_err(),
            ModuleError::BaseReferencesNote
        );
    }

    #[test]
    fn measure_length_is_derived_not_cached() {
        let m = base440();
        let (ml, corrupted) = m.get(BASE_NOTE_ID, VarIndex::MeasureLength).unwrap();
        assert!(!corrupted);
        // beatsPerMeasure(4) * 60 / tempo(60) == 4
        assert_eq!(ml.coeff(), &notecore_rational::Rational::from_int(4));
    }

    #[test]
    fn batch_set_applies_atomically_and_evaluates_once() {
        let mut m = base440();
        let n1 = m
            .add_note(None, &[(VarIndex::Frequency, "base.f".to_string())], None, None)
            .unwrap();
        m.evaluate();

        let err = m
            .batch_set(&[
                (n1, VarIndex::Frequency, "base.f * 2".to_string()),
                (n1, VarIndex::Frequency, "not a valid ( expr".to_string()),
            ])
            .unwrap_err();
        assert!(matches!(err, ModuleError::Compile(_)));
        // The first update in the failed batch must not have stuck.
        assert_eq!(m.note(n1).unwrap().source(VarIndex::Frequency).unwrap(), "base.f");

        m.batch_set(&[(n1, VarIndex::Frequency, "base.f * 2".to_string())])
            .unwrap();
        assert_eq!(
            value_of(&m, n1, VarIndex::Frequency).coeff(),
            &notecore_rational::Rational::from_int(880)
        );
    }
}
