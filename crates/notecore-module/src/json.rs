//! Module JSON persistence format. Expressions are always
//! strings in either surface syntax; the loader compiles every one of them
//! and the saver always re-emits a note's *original* source text, giving a
//! byte-for-byte round trip of the authored program even though the
//! compiled bytecode is the thing actually evaluated.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use notecore_bytecode::VarIndex;

use crate::note::Note;
use crate::{BaseNoteInit, Module, ModuleError, BASE_NOTE_ID};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseNoteJson {
    pub frequency: String,
    #[serde(rename = "startTime")]
    pub start_time: String,
    pub tempo: String,
    #[serde(rename = "beatsPerMeasure")]
    pub beats_per_measure: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
}

/// `frequency`/`duration` are optional even though the external schema
/// treats them as required string expressions: the data model explicitly
/// allows a note to hold only a subset of its five expressions (a
/// "silence" has no frequency; a measure marker has only `startTime`), so
/// the JSON schema is widened to round-trip that rather than forcing a
/// dummy `"0"` into fields the note never actually evaluates. See
/// DESIGN.md for this Open Question's resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteJson {
    pub id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasureJson {
    pub id: u16,
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(rename = "beatsPerMeasure", skip_serializing_if = "Option::is_none")]
    pub beats_per_measure: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleJson {
    #[serde(rename = "baseNote")]
    pub base_note: BaseNoteJson,
    pub notes: Vec<NoteJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measures: Vec<MeasureJson>,
}

/// A note with neither a frequency nor a duration expression is a measure
/// marker and is emitted into `measures` rather than `notes`, matching the
/// external schema's split even though `Module` itself keeps no separate
/// store for them — see DESIGN.md's Open Question resolution.
pub(crate) fn to_json(module: &Module) -> ModuleJson {
    let base = module.note(BASE_NOTE_ID).expect("a Module always has a base note");
    let base_note = BaseNoteJson {
        frequency: base.source(VarIndex::Frequency).unwrap_or_default().to_string(),
        start_time: base.source(VarIndex::StartTime).unwrap_or_default().to_string(),
        tempo: base.source(VarIndex::Tempo).unwrap_or_default().to_string(),
        beats_per_measure: base.source(VarIndex::BeatsPerMeasure).unwrap_or_default().to_string(),
        instrument: base.instrument().map(str::to_string),
    };

    let mut notes = Vec::new();
    let mut measures = Vec::new();
    for (&id, note) in module.notes_map() {
        if id == BASE_NOTE_ID {
            continue;
        }
        let frequency = note.source(VarIndex::Frequency).map(str::to_string);
        let duration = note.source(VarIndex::Duration).map(str::to_string);
        let start_time = note.source(VarIndex::StartTime).unwrap_or_default().to_string();

        if frequency.is_none() && duration.is_none() {
            measures.push(MeasureJson {
                id,
                start_time,
                beats_per_measure: note.source(VarIndex::BeatsPerMeasure).map(str::to_string),
            });
        } else {
            notes.push(NoteJson {
                id,
                frequency,
                start_time,
                duration,
                color: note.color().map(str::to_string),
                instrument: note.instrument().map(str::to_string),
            });
        }
    }

    ModuleJson { base_note, notes, measures }
}

/// Loads in two passes so that references in either direction across the
/// document resolve: first every id (from `notes` and `measures` alike) is
/// registered as an empty stub, then every expression is compiled against
/// the now-complete id set. A forward reference to a note defined later in
/// the document is therefore not a dangling reference; a genuine cycle is
/// still caught the moment the second edge of the cycle is registered,
/// exactly as it would be through a sequence of `set_expression` calls.
pub(crate) fn from_json(doc: &ModuleJson) -> Result<Module, ModuleError> {
    let mut module = Module::new(BaseNoteInit {
        frequency: doc.base_note.frequency.clone(),
        start_time: doc.base_note.start_time.clone(),
        tempo: doc.base_note.tempo.clone(),
        beats_per_measure: doc.base_note.beats_per_measure.clone(),
        instrument: doc.base_note.instrument.clone(),
    })?;

    let mut seen: BTreeSet<u16> = BTreeSet::new();
    seen.insert(BASE_NOTE_ID);
    for n in &doc.notes {
        if !seen.insert(n.id) {
            return Err(ModuleError::DuplicateId(n.id));
        }
    }
    for m in &doc.measures {
        if !seen.insert(m.id) {
            return Err(ModuleError::DuplicateId(m.id));
        }
    }

    for n in &doc.notes {
        let mut note = Note::new(n.id, None);
        note.color = n.color.clone();
        note.instrument = n.instrument.clone();
        module.notes_map_mut().insert(n.id, note);
    }
    for m in &doc.measures {
        module.notes_map_mut().insert(m.id, Note::new(m.id, None));
    }
    if let Some(&max_id) = seen.iter().max() {
        module.set_next_id(max_id + 1);
    }

    for n in &doc.notes {
        if let Some(freq) = &n.frequency {
            module.set_expression(n.id, VarIndex::Frequency, freq)?;
        }
        module.set_expression(n.id, VarIndex::StartTime, &n.start_time)?;
        if let Some(dur) = &n.duration {
            module.set_expression(n.id, VarIndex::Duration, dur)?;
        }
    }
    for m in &doc.measures {
        module.set_expression(m.id, VarIndex::StartTime, &m.start_time)?;
        if let Some(bpm) = &m.beats_per_measure {
            module.set_expression(m.id, VarIndex::BeatsPerMeasure, bpm)?;
        }
    }

    Ok(module)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::DeleteStrategy;

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

    #[test]
    fn round_trips_a_chord_through_json() {
        let mut m = base440();
        let n1 = m
            .add_note(
                None,
                &[
                    (VarIndex::StartTime, "base.t".to_string()),
                    (VarIndex::Frequency, "base.f * (5/4)".to_string()),
                ],
                Some("red".to_string()),
                None,
            )
            .unwrap();
        m.evaluate();

        let doc = m.to_json();
        assert_eq!(doc.notes.len(), 1);
        assert_eq!(doc.notes[0].id, n1);
        assert_eq!(doc.notes[0].color.as_deref(), Some("red"));

        let mut reloaded = Module::from_json(&doc).unwrap();
        reloaded.evaluate();
        assert_eq!(
            reloaded.note(n1).unwrap().source(VarIndex::Frequency),
            m.note(n1).unwrap().source(VarIndex::Frequency)
        );
        assert_eq!(
            reloaded.get(n1, VarIndex::Frequency).unwrap().0,
            m.get(n1, VarIndex::Frequency).unwrap().0
        );
    }

    #[test]
    fn a_note_with_only_start_time_round_trips_as_a_measure_marker() {
        let mut m = base440();
        let n1 = m
            .add_note(
                None,
                &[(VarIndex::StartTime, "base.t".to_string()), (VarIndex::BeatsPerMeasure, "3".to_string())],
                None,
                None,
            )
            .unwrap();

        let doc = m.to_json();
        assert!(doc.notes.is_empty());
        assert_eq!(doc.measures.len(), 1);
        assert_eq!(doc.measures[0].id, n1);

        let reloaded = Module::from_json(&doc).unwrap();
        assert_eq!(reloaded.note(n1).unwrap().source(VarIndex::StartTime), Some("base.t"));
        assert_eq!(reloaded.note(n1).unwrap().source(VarIndex::BeatsPerMeasure), Some("3"));
    }

    #[test]
    fn forward_references_across_the_document_resolve() {
        let mut m = base440();
        // n2 comes before n1 in the array but references it; the loader
        // must not reject this as dangling.
        let n1 = m
            .add_note(None, &[(VarIndex::StartTime, "base.t".to_string())], None, None)
            .unwrap();
        let n2 = m
            .add_note(
                None,
                &[
                    (VarIndex::StartTime, "base.t".to_string()),
                    (VarIndex::Frequency, format!("[{n1}].f")),
                ],
                None,
                None,
            )
            .unwrap();
        m.set_expression(n1, VarIndex::Frequency, "base.f").unwrap();

        let mut doc = m.to_json();
        doc.notes.reverse();
        assert_eq!(doc.notes[0].id, n2);

        let mut reloaded = Module::from_json(&doc).unwrap();
        reloaded.evaluate();
        assert_eq!(
            reloaded.get(n2, VarIndex::Frequency).unwrap().0,
            m.get(n2, VarIndex::Frequency).unwrap().0
        );
    }

    #[test]
    fn duplicate_note_id_is_rejected() {
        let m = base440();
        let mut doc = m.to_json();
        doc.notes.push(NoteJson {
            id: 1,
            frequency: Some("base.f".to_string()),
            start_time: "base.t".to_string(),
            duration: None,
            color: None,
            instrument: None,
        });
        doc.notes.push(NoteJson {
            id: 1,
            frequency: Some("base.f".to_string()),
            start_time: "base.t".to_string(),
            duration: None,
            color: None,
            instrument: None,
        });
        assert_eq!(Module::from_json(&doc).unwrap_err(), ModuleError::DuplicateId(1));
    }

    #[test]
    fn dangling_reference_is_rejected() {
        let m = base440();
        let mut doc = m.to_json();
        doc.notes.push(NoteJson {
            id: 1,
            frequency: Some("[2].f".to_string()),
            start_time: "base.t".to_string(),
            duration: None,
            color: None,
            instrument: None,
        });
        assert_eq!(Module::from_json(&doc).unwrap_err(), ModuleError::DanglingReference(2));
    }

    #[test]
    fn deleted_note_is_absent_after_a_round_trip() {
        let mut m = base440();
        let n1 = m.add_note(None, &[(VarIndex::Frequency, "base.f".to_string())], None, None).unwrap();
        m.delete(n1, DeleteStrategy::Cascade).unwrap();

        let doc = m.to_json();
        assert!(doc.notes.is_empty());
        let reloaded = Module::from_json(&doc).unwrap();
        assert!(reloaded.note(n1).is_none());
    }
}
