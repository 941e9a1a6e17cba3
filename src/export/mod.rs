mod parse;

pub use parse::*;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::ScheduleModel;
use crate::solver::Chromosome;
use crate::types::{FacultyId, RoomId, SectionId, SubjectId};

/// Faculty display string for elective entries: the schedule is published
/// before students pick their basket, so no name is shown
pub const ELECTIVE_FACULTY_LABEL: &str = "OE";

pub const LABEL_FREE: &str = "FREE";
pub const LABEL_BREAK: &str = "BREAK";
pub const LABEL_LUNCH: &str = "LUNCH BREAK";

/// One occupied cell of a weekly grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassCell {
    pub subject: String,
    pub subject_id: SubjectId,
    /// Display name; the literal "OE" for electives
    pub faculty: String,
    pub faculty_id: FacultyId,
    pub room: RoomId,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A grid cell is either a class record or a break/free label
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Class(Box<ClassCell>),
    Label(String),
}

/// One day of a weekly grid, periods in declared order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayView {
    pub day: String,
    pub periods: BTreeMap<u8, Cell>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionView {
    pub section_id: SectionId,
    pub section_name: String,
    pub semester: u32,
    pub coordinator: Option<String>,
    pub student_count: u32,
    pub room: Option<RoomId>,
    pub timetable: Vec<DayView>,
    /// Period id -> "start-end" wall times
    pub periods: BTreeMap<u8, String>,
}

/// Day-parallel 0/1 occupancy row for the faculty view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedRow {
    pub day: String,
    pub periods: BTreeMap<u8, u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacultyView {
    pub faculty_id: FacultyId,
    pub faculty_name: String,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub max_hours_per_week: u32,
    pub timetable: Vec<DayView>,
    pub placed: Vec<PlacedRow>,
    pub periods: BTreeMap<u8, String>,
}

/// One record per entry, fully machine-readable; this is the round-trip
/// format the repair pipeline reads back
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedRecord {
    pub section: SectionId,
    pub section_name: String,
    pub subject: String,
    pub subject_id: SubjectId,
    pub faculty: String,
    pub faculty_id: FacultyId,
    pub room: RoomId,
    pub room_name: String,
    pub day: String,
    pub day_index: u8,
    pub period: u8,
    pub time: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub lab_session_id: Option<String>,
    #[serde(default)]
    pub is_continuation: bool,
    #[serde(default)]
    pub elective_group: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub total_classes: usize,
    pub total_periods_scheduled: usize,
    pub lab_sessions: usize,
    pub sections: usize,
    pub subjects: usize,
    pub faculty: usize,
    pub rooms: usize,
    pub required_classes: usize,
    pub electives_assigned: usize,
    pub fitness_score: f64,
    pub constraint_violations: BTreeMap<String, u32>,
}

/// Full payload for one ranked solution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionPayload {
    pub rank: usize,
    pub fitness: f64,
    pub constraint_violations: BTreeMap<String, u32>,
    pub sections: BTreeMap<String, SectionView>,
    pub faculty: BTreeMap<String, FacultyView>,
    pub detailed: Vec<DetailedRecord>,
    pub statistics: Statistics,
}

/// Produces the section, faculty and detailed views of a solution
pub struct Exporter<'a> {
    model: &'a ScheduleModel,
    solution: &'a Chromosome,
}

impl<'a> Exporter<'a> {
    pub fn new(model: &'a ScheduleModel, solution: &'a Chromosome) -> Self {
        Self { model, solution }
    }

    fn period_labels(&self) -> BTreeMap<u8, String> {
        self.model
            .period_ids
            .iter()
            .map(|&p| (p, self.model.period_time_label(p)))
            .collect()
    }

    fn empty_grid(&self) -> Vec<DayView> {
        self.model
            .working_days
            .iter()
            .map(|day| {
                let periods = self
                    .model
                    .period_ids
                    .iter()
                    .map(|&p| {
                        let label = if self.model.lunch_break_periods.contains(&p) {
                            LABEL_LUNCH
                        } else if self.model.is_break(p) {
                            LABEL_BREAK
                        } else {
                            LABEL_FREE
                        };
                        (p, Cell::Label(label.to_string()))
                    })
                    .collect();
                DayView {
                    day: day.clone(),
                    periods,
                }
            })
            .collect()
    }

    fn class_cell(&self, entry: &crate::types::Entry) -> ClassCell {
        let faculty_display = if entry.is_elective() {
            ELECTIVE_FACULTY_LABEL.to_string()
        } else {
            self.model.faculty_display_name(&entry.faculty)
        };
        ClassCell {
            subject: self.model.subject_display_name(&entry.subject),
            subject_id: entry.subject.clone(),
            faculty: faculty_display,
            faculty_id: entry.faculty.clone(),
            room: entry.room.clone(),
            kind: entry.kind.to_string(),
        }
    }

    pub fn section_view(&self) -> BTreeMap<String, SectionView> {
        let mut views = BTreeMap::new();
        for (section_id, section) in &self.model.sections {
            let mut grid = self.empty_grid();
            for entry in self
                .solution
                .entries
                .iter()
                .filter(|e| e.section == *section_id)
            {
                if let Some(day) = grid.get_mut(entry.slot.day as usize) {
                    day.periods
                        .insert(entry.slot.period, Cell::Class(Box::new(self.class_cell(entry))));
                }
            }
            views.insert(
                section_id.0.clone(),
                SectionView {
                    section_id: section_id.clone(),
                    section_name: if section.name.is_empty() {
                        section_id.0.clone()
                    } else {
                        section.name.clone()
                    },
                    semester: section.semester,
                    coordinator: section.coordinator.clone(),
                    student_count: section.student_count,
                    room: section.room.clone(),
                    timetable: grid,
                    periods: self.period_labels(),
                },
            );
        }
        views
    }

    pub fn faculty_view(&self) -> BTreeMap<String, FacultyView> {
        let mut views = BTreeMap::new();
        for (faculty_id, def) in &self.model.faculty {
            let mut grid = self.empty_grid();
            let mut placed: Vec<PlacedRow> = self
                .model
                .working_days
                .iter()
                .map(|day| PlacedRow {
                    day: day.clone(),
                    periods: self.model.period_ids.iter().map(|&p| (p, 0)).collect(),
                })
                .collect();

            for entry in self
                .solution
                .entries
                .iter()
                .filter(|e| e.faculty == *faculty_id)
            {
                let day_idx = entry.slot.day as usize;
                if let Some(day) = grid.get_mut(day_idx) {
                    let mut cell = self.class_cell(entry);
                    // Faculty see their own name even on elective rows
                    cell.faculty = def.name.clone();
                    day.periods
                        .insert(entry.slot.period, Cell::Class(Box::new(cell)));
                }
                if let Some(row) = placed.get_mut(day_idx) {
                    row.periods.insert(entry.slot.period, 1);
                }
            }

            views.insert(
                faculty_id.0.clone(),
                FacultyView {
                    faculty_id: faculty_id.clone(),
                    faculty_name: def.name.clone(),
                    department: def.department.as_ref().map(|d| d.0.clone()),
                    designation: def.designation.clone(),
                    max_hours_per_week: def.max_hours_per_week,
                    timetable: grid,
                    placed,
                    periods: self.period_labels(),
                },
            );
        }
        views
    }

    pub fn detailed(&self) -> Vec<DetailedRecord> {
        let mut entries: Vec<&crate::types::Entry> = self.solution.entries.iter().collect();
        entries.sort_by_key(|e| e.sort_key());

        entries
            .into_iter()
            .map(|entry| {
                let section = self.model.sections.get(&entry.section);
                let room = self.model.rooms.get(&entry.room);
                let day = self
                    .model
                    .working_days
                    .get(entry.slot.day as usize)
                    .cloned()
                    .unwrap_or_else(|| entry.slot.day.to_string());
                DetailedRecord {
                    section: entry.section.clone(),
                    section_name: section
                        .map(|s| {
                            if s.name.is_empty() {
                                entry.section.0.clone()
                            } else {
                                s.name.clone()
                            }
                        })
                        .unwrap_or_else(|| entry.section.0.clone()),
                    subject: self.model.subject_display_name(&entry.subject),
                    subject_id: entry.subject.clone(),
                    faculty: self.model.faculty_display_name(&entry.faculty),
                    faculty_id: entry.faculty.clone(),
                    room: entry.room.clone(),
                    room_name: room.map(|r| r.name.clone()).unwrap_or_default(),
                    day,
                    day_index: entry.slot.day,
                    period: entry.slot.period,
                    time: self.model.period_time_label(entry.slot.period),
                    kind: entry.kind.to_string(),
                    lab_session_id: entry.lab_session.clone(),
                    is_continuation: entry.is_continuation,
                    elective_group: entry.elective_group.clone(),
                }
            })
            .collect()
    }

    pub fn statistics(&self, required_classes: usize) -> Statistics {
        let entries = &self.solution.entries;
        let lab_sessions: BTreeSet<&String> =
            entries.iter().filter_map(|e| e.lab_session.as_ref()).collect();

        Statistics {
            total_classes: self.solution.scheduled_count(),
            total_periods_scheduled: entries.len(),
            lab_sessions: lab_sessions.len(),
            sections: entries
                .iter()
                .map(|e| &e.section)
                .collect::<BTreeSet<&SectionId>>()
                .len(),
            subjects: entries
                .iter()
                .map(|e| &e.subject)
                .collect::<BTreeSet<&SubjectId>>()
                .len(),
            faculty: entries
                .iter()
                .filter(|e| !e.faculty.is_sentinel())
                .map(|e| &e.faculty)
                .collect::<BTreeSet<&FacultyId>>()
                .len(),
            rooms: entries
                .iter()
                .map(|e| &e.room)
                .collect::<BTreeSet<&RoomId>>()
                .len(),
            required_classes,
            electives_assigned: entries
                .iter()
                .filter(|e| e.is_elective() && !e.is_continuation)
                .count(),
            fitness_score: self.solution.fitness,
            constraint_violations: self.solution.violations.clone(),
        }
    }

    /// Assemble the full output payload for one ranked solution
    pub fn solution_payload(
        &self,
        rank: usize,
        displayed_fitness: f64,
        required_classes: usize,
    ) -> SolutionPayload {
        SolutionPayload {
            rank,
            fitness: displayed_fitness,
            constraint_violations: self.solution.violations.clone(),
            sections: self.section_view(),
            faculty: self.faculty_view(),
            detailed: self.detailed(),
            statistics: self.statistics(required_classes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Config, Entry, EntryKind, TimeSlot};

    fn model() -> ScheduleModel {
        let config: Config = serde_json::from_str(
            r#"{
            "time_slots": {
                "periods": [
                    {"id": 1, "start_time": "09:00", "end_time": "09:50"},
                    {"id": 2, "start_time": "09:50", "end_time": "10:40"},
                    {"id": 3, "start_time": "10:40", "end_time": "11:30"}
                ],
                "working_days": ["Monday", "Tuesday"],
                "lunch_period": 3
            },
            "elective_slots": [{"day_name": "Tuesday", "period": 2}],
            "sections": [{"section_id": "A", "name": "CS A", "semester": 1, "student_count": 50}],
            "subjects": [
                {"subject_id": "MA101", "name": "Calculus", "semester": 1},
                {"subject_id": "OE1", "name": "Open Elective", "is_elective": true, "semester": 1}
            ],
            "faculty": [{"faculty_id": "F1", "name": "Dr. Rao", "subjects": ["MA101", "OE1"]}],
            "rooms": [{"room_id": "R1", "name": "Room 1", "capacity": 60}]
        }"#,
        )
        .unwrap();
        ScheduleModel::from_config(config).unwrap()
    }

    fn solution() -> Chromosome {
        let mut chromosome = Chromosome::new();
        chromosome.add(Entry {
            section: SectionId("A".to_string()),
            subject: SubjectId("MA101".to_string()),
            faculty: FacultyId("F1".to_string()),
            room: RoomId("R1".to_string()),
            slot: TimeSlot::new(0, 1),
            kind: EntryKind::Theory,
            lab_session: None,
            is_continuation: false,
            elective_group: None,
        });
        chromosome.add(Entry {
            section: SectionId("A".to_string()),
            subject: SubjectId("OE1".to_string()),
            faculty: FacultyId("F1".to_string()),
            room: RoomId("R1".to_string()),
            slot: TimeSlot::new(1, 2),
            kind: EntryKind::Elective,
            lab_session: None,
            is_continuation: false,
            elective_group: Some("EG_A".to_string()),
        });
        chromosome
    }

    #[test]
    fn test_section_view_labels_breaks_and_classes() {
        let model = model();
        let solution = solution();
        let exporter = Exporter::new(&model, &solution);

        let views = exporter.section_view();
        let view = &views["A"];
        let monday = &view.timetable[0];
        assert_eq!(monday.day, "Monday");
        match &monday.periods[&1] {
            Cell::Class(cell) => {
                assert_eq!(cell.subject, "Calculus");
                assert_eq!(cell.faculty, "Dr. Rao");
            }
            Cell::Label(l) => panic!("expected class cell, got label {l}"),
        }
        match &monday.periods[&3] {
            Cell::Label(l) => assert_eq!(l, LABEL_LUNCH),
            _ => panic!("expected lunch label"),
        }
        match &monday.periods[&2] {
            Cell::Label(l) => assert_eq!(l, LABEL_FREE),
            _ => panic!("expected free label"),
        }
    }

    #[test]
    fn test_elective_faculty_is_masked_in_section_view() {
        let model = model();
        let solution = solution();
        let exporter = Exporter::new(&model, &solution);

        let views = exporter.section_view();
        let tuesday = &views["A"].timetable[1];
        match &tuesday.periods[&2] {
            Cell::Class(cell) => {
                assert_eq!(cell.faculty, ELECTIVE_FACULTY_LABEL);
                // The machine-readable id survives masking
                assert_eq!(cell.faculty_id.0, "F1");
            }
            _ => panic!("expected elective class cell"),
        }
    }

    #[test]
    fn test_faculty_view_carries_placed_bitmap() {
        let model = model();
        let solution = solution();
        let exporter = Exporter::new(&model, &solution);

        let views = exporter.faculty_view();
        let view = &views["F1"];
        assert_eq!(view.placed[0].periods[&1], 1);
        assert_eq!(view.placed[0].periods[&2], 0);
        assert_eq!(view.placed[1].periods[&2], 1);
    }

    #[test]
    fn test_detailed_is_sorted_with_time_strings() {
        let model = model();
        let solution = solution();
        let exporter = Exporter::new(&model, &solution);

        let detailed = exporter.detailed();
        assert_eq!(detailed.len(), 2);
        assert_eq!(detailed[0].day_index, 0);
        assert_eq!(detailed[0].time, "09:00-09:50");
        assert_eq!(detailed[1].kind, "Elective");
    }

    #[test]
    fn test_statistics_counts() {
        let model = model();
        let solution = solution();
        let exporter = Exporter::new(&model, &solution);

        let stats = exporter.statistics(2);
        assert_eq!(stats.total_classes, 2);
        assert_eq!(stats.lab_sessions, 0);
        assert_eq!(stats.electives_assigned, 1);
        assert_eq!(stats.required_classes, 2);
    }
}
