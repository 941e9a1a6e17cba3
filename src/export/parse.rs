use serde_json::Value;

use super::{LABEL_BREAK, LABEL_FREE, LABEL_LUNCH};
use crate::model::ScheduleModel;
use crate::solver::Chromosome;
use crate::types::{Entry, EntryKind, FacultyId, RoomId, SectionId, SubjectId, TimeSlot};

const SKIP_LABELS: [&str; 4] = [LABEL_FREE, LABEL_BREAK, LABEL_LUNCH, "MENTORSHIP"];

/// Rebuild a chromosome from a previously exported schedule. Accepts the
/// detailed-list format (full fidelity), a whole solution payload, or a bare
/// section-view map; unparseable items are skipped rather than fatal, in the
/// spirit of reading documents that may have passed through other tools.
pub fn chromosome_from_export(model: &ScheduleModel, value: &Value) -> Chromosome {
    let mut chromosome = Chromosome::new();

    match value {
        Value::Array(items) => {
            for item in items {
                if let Some(entry) = entry_from_detailed(model, item) {
                    chromosome.entries.push(entry);
                }
            }
        }
        Value::Object(map) => {
            if let Some(detailed) = map.get("detailed") {
                return chromosome_from_export(model, detailed);
            }
            if let Some(sections) = map.get("sections") {
                return chromosome_from_export(model, sections);
            }
            for (section_id, section_data) in map {
                parse_section_grid(model, section_id, section_data, &mut chromosome.entries);
            }
        }
        _ => {}
    }

    chromosome.rebuild_indices();
    chromosome
}

fn string_field<'v>(item: &'v Value, keys: &[&str]) -> Option<&'v str> {
    keys.iter().find_map(|k| item.get(*k).and_then(Value::as_str))
}

fn day_index(model: &ScheduleModel, item: &Value) -> Option<u8> {
    if let Some(day) = item.get("day") {
        match day {
            Value::String(name) => {
                if let Some(idx) = model.day_index(name) {
                    return Some(idx);
                }
            }
            Value::Number(n) => {
                if let Some(idx) = n.as_u64() {
                    return Some(idx as u8);
                }
            }
            _ => {}
        }
    }
    item.get("day_index")
        .and_then(Value::as_u64)
        .map(|idx| idx as u8)
}

fn entry_from_detailed(model: &ScheduleModel, item: &Value) -> Option<Entry> {
    let section = string_field(item, &["section", "section_id"])?;
    let subject_ref = string_field(item, &["subject_id", "subject"])?;
    let day = day_index(model, item)?;
    let period = item.get("period").and_then(Value::as_u64)? as u8;

    let subject = model
        .resolve_subject(subject_ref)
        .unwrap_or_else(|| SubjectId(subject_ref.to_string()));

    let faculty = string_field(item, &["faculty_id", "faculty"])
        .map(|f| resolve_faculty(model, f))
        .unwrap_or_else(FacultyId::sentinel);
    let room = string_field(item, &["room_id", "room"])
        .map(|r| RoomId(r.to_string()))
        .unwrap_or_else(|| RoomId("TBA".to_string()));

    let lab_session = string_field(item, &["lab_session_id"])
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());
    let elective_group = string_field(item, &["elective_group"])
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());
    let is_continuation = item
        .get("is_continuation")
        .or_else(|| item.get("is_lab_second_period"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let kind = match string_field(item, &["type"]) {
        Some("Lab") => EntryKind::Lab,
        Some("Elective") => EntryKind::Elective,
        Some(_) => EntryKind::Theory,
        None if elective_group.is_some() => EntryKind::Elective,
        None if lab_session.is_some() || model.is_lab_subject(&subject) => EntryKind::Lab,
        None => EntryKind::Theory,
    };

    Some(Entry {
        section: SectionId(section.to_string()),
        subject,
        faculty,
        room,
        slot: TimeSlot::new(day, period),
        kind,
        lab_session,
        is_continuation,
        elective_group,
    })
}

/// Section-view walker: `{section: {timetable: [{day, periods: {p: cell}}]}}`
/// plus the older `{day_name: {period: cell}}` grid shape
fn parse_section_grid(
    model: &ScheduleModel,
    section_id: &str,
    section_data: &Value,
    entries: &mut Vec<Entry>,
) {
    let Some(timetable) = section_data.get("timetable") else {
        return;
    };

    match timetable {
        Value::Array(days) => {
            for day_view in days {
                let Some(day_name) = string_field(day_view, &["day"]) else {
                    continue;
                };
                let Some(day) = model.day_index(day_name) else {
                    continue;
                };
                if let Some(Value::Object(periods)) = day_view.get("periods") {
                    for (period_key, cell) in periods {
                        push_cell_entry(model, section_id, day, period_key, cell, entries);
                    }
                }
            }
        }
        Value::Object(days) => {
            for (day_name, period_map) in days {
                let Some(day) = model.day_index(day_name) else {
                    continue;
                };
                if let Value::Object(periods) = period_map {
                    for (period_key, cell) in periods {
                        push_cell_entry(model, section_id, day, period_key, cell, entries);
                    }
                }
            }
        }
        _ => {}
    }
}

fn push_cell_entry(
    model: &ScheduleModel,
    section_id: &str,
    day: u8,
    period_key: &str,
    cell: &Value,
    entries: &mut Vec<Entry>,
) {
    let Ok(period) = period_key.parse::<u8>() else {
        return;
    };

    match cell {
        Value::String(label) if SKIP_LABELS.contains(&label.as_str()) => {}
        Value::String(subject_ref) => {
            // Bare subject string: minimal entry, fields resolved best-effort
            let subject = model
                .resolve_subject(subject_ref)
                .unwrap_or_else(|| SubjectId(subject_ref.clone()));
            entries.push(Entry {
                section: SectionId(section_id.to_string()),
                subject: subject.clone(),
                faculty: FacultyId::sentinel(),
                room: RoomId("TBA".to_string()),
                slot: TimeSlot::new(day, period),
                kind: if model.is_lab_subject(&subject) {
                    EntryKind::Lab
                } else {
                    EntryKind::Theory
                },
                lab_session: None,
                is_continuation: false,
                elective_group: None,
            });
        }
        Value::Object(_) => {
            let Some(subject_ref) = string_field(cell, &["subject_id", "subject"]) else {
                return;
            };
            let subject = model
                .resolve_subject(subject_ref)
                .unwrap_or_else(|| SubjectId(subject_ref.to_string()));
            let faculty = string_field(cell, &["faculty_id", "faculty"])
                .map(|f| resolve_faculty(model, f))
                .unwrap_or_else(FacultyId::sentinel);
            let room = string_field(cell, &["room_id", "room"])
                .map(|r| RoomId(r.to_string()))
                .unwrap_or_else(|| RoomId("TBA".to_string()));
            let kind = match string_field(cell, &["type"]) {
                Some("Lab") => EntryKind::Lab,
                Some("Elective") => EntryKind::Elective,
                _ if model.is_lab_subject(&subject) => EntryKind::Lab,
                _ => EntryKind::Theory,
            };
            let elective_group = (kind == EntryKind::Elective).then(|| {
                crate::model::elective_group_id(&SectionId(section_id.to_string()))
            });
            entries.push(Entry {
                section: SectionId(section_id.to_string()),
                subject,
                faculty,
                room,
                slot: TimeSlot::new(day, period),
                kind,
                lab_session: None,
                is_continuation: false,
                elective_group,
            });
        }
        _ => {}
    }
}

/// The elective display mask and plain names both resolve back to ids
fn resolve_faculty(model: &ScheduleModel, reference: &str) -> FacultyId {
    let as_id = FacultyId(reference.to_string());
    if model.faculty.contains_key(&as_id) {
        return as_id;
    }
    if let Some((fid, _)) = model.faculty.iter().find(|(_, f)| f.name == reference) {
        return fid.clone();
    }
    if reference == super::ELECTIVE_FACULTY_LABEL || reference == "TBA" {
        return FacultyId::sentinel();
    }
    as_id
}
