//! Dependency graph (C6): tracks which note property reads which other
//! note property. Stores one edge per `(from_note, from_var) -> (to_note,
//! to_var)` relationship and maintains four indices over that edge set —
//! forward, inverted, a per-property×per-property index, and a
//! base-dependents index — all updated atomically on every mutation.
//!
//! Every index is a `BTreeMap`/`BTreeSet` rather than a hash collection so
//! that iteration order (and therefore topological-sort tie-breaking) is
//! deterministic without a separate sort pass.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use notecore_bytecode::{CompiledExpr, NoteId, VarIndex};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Raised by `topo_sort` if the reachable subgraph isn't a DAG. Under
    /// the crate's invariants `register` never admits a cycle-forming
    /// edge, so this should never fire in practice; it is retained as a
    /// safety net rather than trusted as the sole guard.
    #[error("cycle detected: {}", path.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(" -> "))]
    Cycle(Vec<NoteId>),
}

/// What a single `(note, property)` slot currently reads, recorded so a
/// later `register` call can compute the edge delta instead of clearing
/// and rebuilding the whole graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Registration {
    notes: BTreeSet<(NoteId, VarIndex)>,
    base: BTreeSet<VarIndex>,
}

#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// note -> set of notes it depends on (any property).
    forward: BTreeMap<NoteId, BTreeSet<NoteId>>,
    /// note -> set of notes depending on it (any property).
    inverted: BTreeMap<NoteId, BTreeSet<NoteId>>,
    /// (to_note, to_var) -> set of (from_note, from_var) reading it.
    prop_edges: BTreeMap<(NoteId, VarIndex), BTreeSet<(NoteId, VarIndex)>>,
    /// base's to_var -> set of (from_note, from_var) reading base.to_var.
    base_dependents: BTreeMap<VarIndex, BTreeSet<(NoteId, VarIndex)>>,
    /// Current registration per `(note, from_var)` slot, for delta
    /// computation and for `remove`.
    registrations: BTreeMap<NoteId, BTreeMap<VarIndex, Registration>>,
}

impl DependencyGraph {
    pub fn new() -> DependencyGraph {
        DependencyGraph::default()
    }

    /// Registers (or re-registers) the edges that `compiled`'s reference
    /// set implies for `note`'s `from_var` property. Computes the delta
    /// against whatever was previously registered for this slot and
    /// applies only the additions/removals — idempotent when nothing
    /// changed.
    pub fn register(&mut self, note: NoteId, from_var: VarIndex, compiled: &CompiledExpr) {
        let new = Registration {
            notes: compiled.references().iter().copied().collect(),
            base: compiled.base_references().iter().copied().collect(),
        };
        let old = self
            .registrations
            .get(&note)
            .and_then(|m| m.get(&from_var))
            .cloned()
            .unwrap_or_default();
        if old == new {
            return;
        }

        let removed_notes: Vec<_> = old.notes.difference(&new.notes).copied().collect();
        let added_notes: Vec<_> = new.notes.difference(&old.notes).copied().collect();
        let removed_base: Vec<_> = old.base.difference(&new.base).copied().collect();
        let added_base: Vec<_> = new.base.difference(&old.base).copied().collect();

        // Record the slot's final state before touching coarse indices, so
        // `any_edge_between` (consulted while removing note-level edges)
        // sees this slot's new reference set rather than its stale one.
        self.registrations.entry(note).or_default().insert(from_var, new);

        for to in removed_notes {
            self.remove_note_edge(note, from_var, to);
        }
        for to in added_notes {
            self.add_note_edge(note, from_var, to);
        }
        for to_var in removed_base {
            self.remove_base_edge(note, from_var, to_var);
        }
        for to_var in added_base {
            self.add_base_edge(note, from_var, to_var);
        }
    }

    fn add_note_edge(&mut self, from: NoteId, from_var: VarIndex, to: (NoteId, VarIndex)) {
        let (to_note, to_var) = to;
        self.forward.entry(from).or_default().insert(to_note);
        self.inverted.entry(to_note).or_default().insert(from);
        self.prop_edges
            .entry((to_note, to_var))
            .or_default()
            .insert((from, from_var));
    }

    fn remove_note_edge(&mut self, from: NoteId, from_var: VarIndex, to: (NoteId, VarIndex)) {
        let (to_note, to_var) = to;
        if let Some(set) = self.prop_edges.get_mut(&(to_note, to_var)) {
            set.remove(&(from, from_var));
            if set.is_empty() {
                self.prop_edges.remove(&(to_note, to_var));
            }
        }
        if !self.any_edge_between(from, to_note) {
            if let Some(set) = self.forward.get_mut(&from) {
                set.remove(&to_note);
                if set.is_empty() {
                    self.forward.remove(&from);
                }
            }
            if let Some(set) = self.inverted.get_mut(&to_note) {
                set.remove(&from);
                if set.is_empty() {
                    self.inverted.remove(&to_note);
                }
            }
        }
    }

    fn add_base_edge(&mut self, from: NoteId, from_var: VarIndex, to_var: VarIndex) {
        self.base_dependents
            .entry(to_var)
            .or_default()
            .insert((from, from_var));
    }

    fn remove_base_edge(&mut self, from: NoteId, from_var: VarIndex, to_var: VarIndex) {
        if let Some(set) = self.base_dependents.get_mut(&to_var) {
            set.remove(&(from, from_var));
            if set.is_empty() {
                self.base_dependents.remove(&to_var);
            }
        }
    }

    /// Whether any remaining property-level edge still connects `from` to
    /// `to`, across every property slot of `from`. Used to decide whether
    /// the coarse forward/inverted note-level edge should survive removal
    /// of one property-level edge.
    fn any_edge_between(&self, from: NoteId, to: NoteId) -> bool {
        self.registrations
            .get(&from)
            .map(|slots| {
                slots
                    .values()
                    .any(|reg| reg.notes.iter().any(|(n, _)| *n == to))
            })
            .unwrap_or(false)
    }

    pub fn dependencies(&self, note: NoteId) -> BTreeSet<NoteId> {
        self.forward.get(&note).cloned().unwrap_or_default()
    }

    pub fn dependents(&self, note: NoteId) -> BTreeSet<NoteId> {
        self.inverted.get(&note).cloned().unwrap_or_default()
    }

    /// BFS over the inverted index: every note reachable by following
    /// "depends on me" edges from `note`, directly or indirectly.
    pub fn transitive_dependents(&self, note: NoteId) -> BTreeSet<NoteId> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(note);
        while let Some(current) = queue.pop_front() {
            for dependent in self.dependents(current) {
                if seen.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }
        seen
    }

    /// Checks a prospective edge before it's registered: `to` is the note
    /// whose expression would gain a new reference to `from`. Returns true
    /// iff `from` already transitively depends on `to` — i.e. `to` lies
    /// upstream of `from` already, so the new `to -> from` edge would
    /// close a loop back to `to`.
    pub fn would_cycle(&self, from: NoteId, to: NoteId) -> bool {
        if from == to {
            return true;
        }
        // Early exit: a direct hit is cheaper than the full BFS below.
        if self.dependents(to).contains(&from) {
            return true;
        }
        self.transitive_dependents(to).contains(&from)
    }

    /// Kahn's algorithm restricted to the subgraph reachable from `seed`
    /// via the inverted index (`seed` plus everything transitively
    /// depending on it), so an incremental re-evaluation only orders the
    /// notes that are actually dirty. Ties broken by ascending `NoteId`.
    pub fn topo_sort(&self, seed: &BTreeSet<NoteId>) -> Result<Vec<NoteId>, GraphError> {
        let mut reachable: BTreeSet<NoteId> = seed.clone();
        for s in seed {
            reachable.extend(self.transitive_dependents(*s));
        }

        let mut in_degree: BTreeMap<NoteId, usize> = reachable.iter().map(|n| (*n, 0)).collect();
        for &note in &reachable {
            for dep in self.dependencies(note) {
                if reachable.contains(&dep) {
                    *in_degree.get_mut(&note).unwrap() += 1;
                }
            }
        }

        let mut ready: BTreeSet<NoteId> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut order = Vec::with_capacity(reachable.len());

        while let Some(&note) = ready.iter().next() {
            ready.remove(&note);
            order.push(note);
            for dependent in self.dependents(note) {
                if let Some(deg) = in_degree.get_mut(&dependent) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if order.len() != reachable.len() {
            let stuck: Vec<NoteId> = reachable.difference(&order.iter().copied().collect()).copied().collect();
            return Err(GraphError::Cycle(stuck));
        }
        Ok(order)
    }

    /// Drops every edge touching `note`, in both directions, across every
    /// index and every registered property slot. Surviving dependents'
    /// own registrations still list `note` until their next `register`
    /// call; the Module always cascades a delete into either removing or
    /// re-registering (liberating) those dependents, so this is never
    /// left dangling in practice.
    pub fn remove(&mut self, note: NoteId) {
        self.registrations.remove(&note);

        for to in self.forward.remove(&note).unwrap_or_default() {
            if let Some(set) = self.inverted.get_mut(&to) {
                set.remove(&note);
                if set.is_empty() {
                    self.inverted.remove(&to);
                }
            }
        }
        for from in self.inverted.remove(&note).unwrap_or_default() {
            if let Some(set) = self.forward.get_mut(&from) {
                set.remove(&note);
                if set.is_empty() {
                    self.forward.remove(&from);
                }
            }
        }
        self.prop_edges.retain(|(to_note, _), froms| {
            froms.retain(|(from_note, _)| *from_note != note);
            *to_note != note && !froms.is_empty()
        });
        for set in self.base_dependents.values_mut() {
            set.retain(|(from_note, _)| *from_note != note);
        }
        self.base_dependents.retain(|_, set| !set.is_empty());
    }

    /// Dependents whose `dependent_var` property depends on `note`'s
    /// `note_var` property specifically — e.g. which notes' `startTime`
    /// shifts when `note`'s `duration` changes, for drag-preview.
    pub fn dependents_by_property(
        &self,
        note: NoteId,
        note_var: VarIndex,
        dependent_var: VarIndex,
    ) -> BTreeSet<NoteId> {
        self.prop_edges
            .get(&(note, note_var))
            .into_iter()
            .flat_map(|set| set.iter())
            .filter(|(_, from_var)| *from_var == dependent_var)
            .map(|(from_note, _)| *from_note)
            .collect()
    }

    /// Dependents reading `to_var` on the base note, e.g. to invalidate
    /// caches when the base note's own expressions change.
    pub fn base_dependents(&self, to_var: VarIndex) -> BTreeSet<(NoteId, VarIndex)> {
        self.base_dependents.get(&to_var).cloned().unwrap_or_default()
    }
}
