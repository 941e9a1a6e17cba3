use serde::Deserialize;
use serde_json::Value;

use crate::error::SchedulerError;
use crate::model::ScheduleModel;
use crate::types::{FacultyId, FixedAssignment, RoomId, SectionId, SubjectId, TimeSlot};

/// Raw repair request: events are kept as JSON values so one unknown event
/// type cannot poison the whole batch
#[derive(Debug, Clone, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub events: Vec<Value>,
}

/// Per-event knobs honoured by the repair pipeline
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPreferences {
    #[serde(default)]
    pub prefer_shift: bool,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub forbidden_periods: Vec<u8>,
    #[serde(default)]
    pub avoid_periods: Vec<u8>,
}

pub const MODE_SAME_SUBSTITUTE: &str = "same_substitute_per_section";

/// A resolved disruptive event. Day names have already been mapped to
/// working-day indices and entity references checked against the model.
#[derive(Debug, Clone)]
pub enum Event {
    FacultyAbsence {
        faculty: FacultyId,
        days: (u8, u8),
        periods: Option<Vec<u8>>,
        /// Distinguishes faculty_partial_absence, which alone may opt into
        /// the deterministic shift
        partial: bool,
        preferences: EventPreferences,
    },
    RoomOutage {
        room: RoomId,
        days: (u8, u8),
        periods: Option<Vec<u8>>,
    },
    SectionUnavailable {
        section: SectionId,
        days: (u8, u8),
        periods: Option<Vec<u8>>,
    },
    ForceAssignment(FixedAssignment),
}

#[derive(Debug, Clone, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    faculty_id: Option<FacultyId>,
    room_id: Option<RoomId>,
    section_id: Option<SectionId>,
    subject_id: Option<SubjectId>,
    start_day: Option<String>,
    end_day: Option<String>,
    date: Option<String>,
    day: Option<Value>,
    period: Option<u8>,
    timeslots: Option<Vec<u8>>,
    #[serde(default)]
    preferences: EventPreferences,
}

fn unresolvable(kind: &str, reference: impl std::fmt::Display) -> String {
    SchedulerError::EventUnresolvable {
        kind: kind.to_string(),
        reference: reference.to_string(),
    }
    .to_string()
}

/// Resolve one raw event. Errors are returned as report strings; the batch
/// carries on without the bad event.
pub fn parse_event(model: &ScheduleModel, value: &Value) -> Result<Event, String> {
    let raw: RawEvent = serde_json::from_value(value.clone())
        .map_err(|e| format!("Malformed event: {e}"))?;

    let day_range = |raw: &RawEvent| -> Result<(u8, u8), String> {
        let start_name = raw
            .start_day
            .as_deref()
            .or(raw.date.as_deref())
            .ok_or_else(|| format!("Event '{}' is missing start_day", raw.kind))?;
        let start = model
            .day_index(start_name)
            .ok_or_else(|| unresolvable("day name", start_name))?;
        let end = match raw.end_day.as_deref() {
            Some(name) => model
                .day_index(name)
                .ok_or_else(|| unresolvable("day name", name))?,
            None => start,
        };
        Ok((start, end.max(start)))
    };

    match raw.kind.as_str() {
        "faculty_absence" | "faculty_partial_absence" => {
            let faculty = raw
                .faculty_id
                .clone()
                .ok_or_else(|| format!("Event '{}' is missing faculty_id", raw.kind))?;
            if !model.faculty.contains_key(&faculty) {
                return Err(unresolvable("faculty", &faculty));
            }
            Ok(Event::FacultyAbsence {
                faculty,
                days: day_range(&raw)?,
                periods: raw.timeslots.clone(),
                partial: raw.kind == "faculty_partial_absence",
                preferences: raw.preferences.clone(),
            })
        }
        "resource_unavailable" | "room_maintenance" => {
            let room = raw
                .room_id
                .clone()
                .ok_or_else(|| format!("Event '{}' is missing room_id", raw.kind))?;
            if !model.rooms.contains_key(&room) {
                return Err(unresolvable("room", &room));
            }
            Ok(Event::RoomOutage {
                room,
                days: day_range(&raw)?,
                periods: raw.timeslots.clone(),
            })
        }
        "section_unavailable" => {
            let section = raw
                .section_id
                .clone()
                .ok_or_else(|| format!("Event '{}' is missing section_id", raw.kind))?;
            if !model.sections.contains_key(&section) {
                return Err(unresolvable("section", &section));
            }
            Ok(Event::SectionUnavailable {
                section,
                days: day_range(&raw)?,
                periods: raw.timeslots.clone(),
            })
        }
        "force_assignment" => {
            let faculty = raw
                .faculty_id
                .clone()
                .ok_or_else(|| "force_assignment is missing faculty_id".to_string())?;
            let subject = raw
                .subject_id
                .clone()
                .ok_or_else(|| "force_assignment is missing subject_id".to_string())?;
            let section = raw
                .section_id
                .clone()
                .ok_or_else(|| "force_assignment is missing section_id".to_string())?;
            if !model.faculty.contains_key(&faculty) {
                return Err(unresolvable("faculty", &faculty));
            }
            if !model.sections.contains_key(&section) {
                return Err(unresolvable("section", &section));
            }
            let day = match &raw.day {
                Some(Value::Number(n)) => n.as_u64().map(|d| d as u8),
                Some(Value::String(name)) => model.day_index(name),
                _ => None,
            }
            .ok_or_else(|| "force_assignment has no resolvable day".to_string())?;
            let period = raw
                .period
                .ok_or_else(|| "force_assignment is missing period".to_string())?;
            Ok(Event::ForceAssignment(FixedAssignment {
                faculty_id: faculty,
                subject_id: subject,
                section_id: section,
                day,
                period,
                room_id: raw.room_id.clone(),
            }))
        }
        other => Err(format!("Unknown event type '{other}'")),
    }
}

/// Translate one resolved event into model mutations: unavailability mask
/// appends, or a locked assignment. Masks cover the declared day range and
/// period list, defaulting to every non-break period.
pub fn apply_event(model: &mut ScheduleModel, event: &Event) {
    let all_periods = |model: &ScheduleModel| -> Vec<u8> {
        model
            .period_ids
            .iter()
            .copied()
            .filter(|&p| !model.is_break(p))
            .collect()
    };

    match event {
        Event::FacultyAbsence {
            faculty,
            days,
            periods,
            ..
        } => {
            let periods = periods.clone().unwrap_or_else(|| all_periods(model));
            for day in days.0..=days.1 {
                for &period in &periods {
                    model.mask_faculty(faculty, TimeSlot::new(day, period));
                }
            }
        }
        Event::RoomOutage {
            room,
            days,
            periods,
        } => {
            let periods = periods.clone().unwrap_or_else(|| all_periods(model));
            for day in days.0..=days.1 {
                for &period in &periods {
                    model.mask_room(room, TimeSlot::new(day, period));
                }
            }
        }
        Event::SectionUnavailable {
            section,
            days,
            periods,
        } => {
            let periods = periods.clone().unwrap_or_else(|| all_periods(model));
            for day in days.0..=days.1 {
                for &period in &periods {
                    model.mask_section(section, TimeSlot::new(day, period));
                }
            }
        }
        Event::ForceAssignment(fixed) => {
            model.add_fixed_assignment(fixed.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Config;

    fn model() -> ScheduleModel {
        let config: Config = serde_json::from_str(
            r#"{
            "time_slots": {
                "periods": [{"id": 1}, {"id": 2}, {"id": 3}, {"id": 4}],
                "working_days": ["Monday", "Tuesday", "Wednesday"],
                "break_periods": [3]
            },
            "sections": [{"section_id": "A", "semester": 1}],
            "subjects": [{"subject_id": "MA101", "name": "Calculus", "semester": 1}],
            "faculty": [{"faculty_id": "F1", "name": "Dr. Rao", "subjects": ["MA101"]}],
            "rooms": [{"room_id": "R1", "name": "Room 1", "capacity": 60}]
        }"#,
        )
        .unwrap();
        ScheduleModel::from_config(config).unwrap()
    }

    #[test]
    fn test_faculty_absence_masks_declared_window() {
        let mut model = model();
        let event = parse_event(
            &model,
            &serde_json::json!({
                "type": "faculty_absence", "faculty_id": "F1",
                "start_day": "Monday", "end_day": "Tuesday", "timeslots": [1, 2]
            }),
        )
        .unwrap();
        apply_event(&mut model, &event);

        let fid = FacultyId("F1".to_string());
        assert!(!model.is_faculty_available(&fid, TimeSlot::new(0, 1)));
        assert!(!model.is_faculty_available(&fid, TimeSlot::new(1, 2)));
        assert!(model.is_faculty_available(&fid, TimeSlot::new(2, 1)));
        assert!(model.is_faculty_available(&fid, TimeSlot::new(0, 4)));
    }

    #[test]
    fn test_missing_timeslots_mask_all_non_break_periods() {
        let mut model = model();
        let event = parse_event(
            &model,
            &serde_json::json!({
                "type": "room_maintenance", "room_id": "R1", "start_day": "Wed"
            }),
        )
        .unwrap();
        apply_event(&mut model, &event);

        let rid = RoomId("R1".to_string());
        for period in [1u8, 2, 4] {
            assert!(!model.is_room_available(&rid, TimeSlot::new(2, period)));
        }
        // Break periods are not part of the default window
        assert!(model.is_room_available(&rid, TimeSlot::new(2, 3)));
        assert!(model.is_room_available(&rid, TimeSlot::new(0, 1)));
    }

    #[test]
    fn test_mask_application_is_idempotent() {
        let mut model = model();
        let value = serde_json::json!({
            "type": "resource_unavailable", "room_id": "R1",
            "start_day": "Monday", "timeslots": [1]
        });
        let event = parse_event(&model, &value).unwrap();
        apply_event(&mut model, &event);
        let mask_once: Vec<_> = {
            let mut m: Vec<_> = model
                .room_mask(&RoomId("R1".to_string()))
                .unwrap()
                .iter()
                .copied()
                .collect();
            m.sort();
            m
        };
        let event = parse_event(&model, &value).unwrap();
        apply_event(&mut model, &event);
        let mask_twice: Vec<_> = {
            let mut m: Vec<_> = model
                .room_mask(&RoomId("R1".to_string()))
                .unwrap()
                .iter()
                .copied()
                .collect();
            m.sort();
            m
        };
        assert_eq!(mask_once, mask_twice);
    }

    #[test]
    fn test_day_prefix_resolution() {
        let model = model();
        let event = parse_event(
            &model,
            &serde_json::json!({
                "type": "faculty_partial_absence", "faculty_id": "F1", "date": "tue"
            }),
        )
        .unwrap();
        match event {
            Event::FacultyAbsence { days, partial, .. } => {
                assert_eq!(days, (1, 1));
                assert!(partial);
            }
            _ => panic!("wrong event kind"),
        }
    }

    #[test]
    fn test_unknown_references_are_rejected_with_names() {
        let model = model();
        let err = parse_event(
            &model,
            &serde_json::json!({
                "type": "faculty_absence", "faculty_id": "F9", "start_day": "Monday"
            }),
        )
        .unwrap_err();
        assert!(err.contains("F9"));

        let err = parse_event(
            &model,
            &serde_json::json!({
                "type": "faculty_absence", "faculty_id": "F1", "start_day": "Caturday"
            }),
        )
        .unwrap_err();
        assert!(err.contains("Caturday"));

        let err = parse_event(&model, &serde_json::json!({"type": "alien_invasion"})).unwrap_err();
        assert!(err.contains("alien_invasion"));
    }

    #[test]
    fn test_force_assignment_becomes_locked_placement() {
        let mut model = model();
        let event = parse_event(
            &model,
            &serde_json::json!({
                "type": "force_assignment", "faculty_id": "F1", "subject_id": "MA101",
                "section_id": "A", "day": "Monday", "period": 2, "room_id": "R1"
            }),
        )
        .unwrap();
        apply_event(&mut model, &event);

        assert_eq!(model.fixed_assignments.len(), 1);
        assert!(model.is_fixed(
            &SectionId("A".to_string()),
            &SubjectId("MA101".to_string()),
            TimeSlot::new(0, 2)
        ));
    }
}
