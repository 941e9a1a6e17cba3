//! Property tests: structural invariants that must hold for every returned
//! solution, whatever the seed.

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use timetable_scheduler::model::ScheduleModel;
use timetable_scheduler::solver::{solve, Chromosome, OccKey, SolveProgress};
use timetable_scheduler::types::{Config, Entry, EntryKind, FacultyId, RoomId, SectionId, SubjectId, TimeSlot};

fn model_with_seed(seed: u64) -> ScheduleModel {
    let config: Config = serde_json::from_value(serde_json::json!({
        "time_slots": {
            "periods": [{"id": 1}, {"id": 2}, {"id": 3}, {"id": 4}, {"id": 5}, {"id": 6}],
            "working_days": ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"],
            "break_periods": [4]
        },
        "elective_slots": [{"day_name": "Friday", "period": 6}],
        "sections": [
            {"section_id": "A", "semester": 1, "student_count": 40, "electives": ["E1"]},
            {"section_id": "B", "semester": 1, "student_count": 40}
        ],
        "subjects": [
            {"subject_id": "S1", "name": "Subject One", "lectures_per_week": 2, "semester": 1},
            {"subject_id": "S2", "name": "Subject Two", "lectures_per_week": 2, "semester": 1},
            {"subject_id": "E1", "name": "Elective One", "is_elective": true, "semester": 1}
        ],
        "labs": [
            {"lab_id": "L1", "name": "Lab One", "sessions_per_week": 1,
             "requires_consecutive_periods": 2, "lab_rooms": ["LR1"], "semester": 1}
        ],
        "faculty": [
            {"faculty_id": "F1", "name": "Prof One", "subjects": ["S1", "L1", "E1"]},
            {"faculty_id": "F2", "name": "Prof Two", "subjects": ["S2", "L1", "E1"]}
        ],
        "rooms": [
            {"room_id": "R1", "name": "Room 1", "capacity": 60},
            {"room_id": "R2", "name": "Room 2", "capacity": 60},
            {"room_id": "LR1", "name": "Lab Room", "type": "lab", "capacity": 40}
        ],
        "genetic_algorithm_params": {
            "population_size": 6, "generations": 6, "seed": seed
        }
    }))
    .unwrap();
    ScheduleModel::from_config(config).unwrap()
}

fn assert_invariants(model: &ScheduleModel, solution: &Chromosome) {
    // Every entry sits on a declared, non-break slot of a working day
    for entry in &solution.entries {
        assert!(entry.slot.day < model.num_working_days());
        assert!(model.period_ids.contains(&entry.slot.period));
        assert!(!model.is_break(entry.slot.period));
    }

    // No key occupies one slot twice; elective group members are the one
    // sanctioned exception on the section key
    let mut faculty_seen = HashMap::new();
    let mut room_seen = HashMap::new();
    let mut section_seen: HashMap<(String, TimeSlot), Option<String>> = HashMap::new();
    for entry in &solution.entries {
        if !entry.faculty.is_sentinel() {
            assert!(
                faculty_seen
                    .insert((entry.faculty.0.clone(), entry.slot), ())
                    .is_none(),
                "faculty {} double-booked at {}",
                entry.faculty,
                entry.slot
            );
        }
        assert!(
            room_seen
                .insert((entry.room.0.clone(), entry.slot), ())
                .is_none(),
            "room {} double-booked at {}",
            entry.room,
            entry.slot
        );
        let group = entry.elective_group.clone();
        if let Some(previous) = section_seen.insert((entry.section.0.clone(), entry.slot), group.clone())
        {
            assert!(
                previous.is_some() && previous == group,
                "section {} double-booked at {}",
                entry.section,
                entry.slot
            );
        }
    }

    // Lab sessions are whole, consecutive and consistently flagged
    let mut sessions: HashMap<&String, Vec<&Entry>> = HashMap::new();
    for entry in &solution.entries {
        if let Some(id) = &entry.lab_session {
            sessions.entry(id).or_default().push(entry);
        }
    }
    for (id, mut entries) in sessions {
        let span = model.consecutive_span(&entries[0].subject) as usize;
        assert_eq!(entries.len(), span, "session {id} has wrong size");
        entries.sort_by_key(|e| e.slot.period);
        let first = entries[0];
        for e in &entries {
            assert_eq!(e.section, first.section);
            assert_eq!(e.faculty, first.faculty);
            assert_eq!(e.room, first.room);
            assert_eq!(e.slot.day, first.slot.day);
        }
        for pair in entries.windows(2) {
            assert_eq!(pair[1].slot.period, pair[0].slot.period + 1);
        }
        assert_eq!(entries.iter().filter(|e| !e.is_continuation).count(), 1);
    }

    // Electives inside the elective slots, everything else outside
    for entry in &solution.entries {
        assert_eq!(
            entry.kind == EntryKind::Elective,
            model.is_elective_slot(entry.slot),
            "elective slot discipline broken at {}",
            entry.slot
        );
    }

    // Assigned faculty are qualified (or the sentinel placeholder)
    for entry in &solution.entries {
        if entry.faculty.is_sentinel() {
            continue;
        }
        assert!(
            model.faculty_subjects[&entry.faculty].contains(&entry.subject),
            "{} is not qualified for {}",
            entry.faculty,
            entry.subject
        );
    }

    // No entry violates an unavailability mask
    for entry in &solution.entries {
        if !entry.faculty.is_sentinel() {
            assert!(model.is_faculty_available(&entry.faculty, entry.slot));
        }
        assert!(model.is_room_available(&entry.room, entry.slot));
        assert!(model.is_section_available(&entry.section, entry.slot));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn returned_solutions_always_satisfy_invariants(seed in any::<u64>()) {
        let model = model_with_seed(seed);
        let solutions = solve(&model, Arc::new(SolveProgress::new()), true).unwrap();
        for solution in &solutions {
            assert_invariants(&model, &solution.chromosome);
        }
    }

    #[test]
    fn occupancy_index_matches_full_rebuild(
        placements in prop::collection::vec(
            (0u8..2, 0u8..3, 1u8..5, 0u8..2, 0u8..2, 0u8..2),
            1..12
        ),
        removals in prop::collection::vec(any::<prop::sample::Index>(), 0..6)
    ) {
        let mut chromosome = Chromosome::new();
        for (section, day, period, subject, faculty, room) in placements {
            chromosome.add(Entry {
                section: SectionId(format!("SEC{section}")),
                subject: SubjectId(format!("SUB{subject}")),
                faculty: FacultyId(format!("FAC{faculty}")),
                room: RoomId(format!("ROOM{room}")),
                slot: TimeSlot::new(day, period),
                kind: EntryKind::Theory,
                lab_session: None,
                is_continuation: false,
                elective_group: None,
            });
        }
        for index in removals {
            if !chromosome.entries.is_empty() {
                let i = index.index(chromosome.entries.len());
                chromosome.remove(i);
            }
        }

        let mut rebuilt = chromosome.clone();
        rebuilt.rebuild_indices();

        prop_assert_eq!(&rebuilt.workload, &chromosome.workload);
        for section in 0..2u8 {
            for day in 0..3u8 {
                for period in 1..5u8 {
                    let slot = TimeSlot::new(day, period);
                    for faculty in 0..2u8 {
                        let key = OccKey::Faculty(FacultyId(format!("FAC{faculty}")));
                        prop_assert_eq!(
                            chromosome.is_occupied(key.clone(), slot),
                            rebuilt.is_occupied(key, slot)
                        );
                    }
                    for room in 0..2u8 {
                        let key = OccKey::Room(RoomId(format!("ROOM{room}")));
                        prop_assert_eq!(
                            chromosome.is_occupied(key.clone(), slot),
                            rebuilt.is_occupied(key, slot)
                        );
                    }
                    let key = OccKey::Section(SectionId(format!("SEC{section}")));
                    prop_assert_eq!(
                        chromosome.is_occupied(key.clone(), slot),
                        rebuilt.is_occupied(key, slot)
                    );
                }
            }
        }
    }
}
