//! End-to-end scenarios: full solves and repairs on small, fully pinned
//! configurations with deterministic expectations.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use timetable_scheduler::error::SchedulerError;
use timetable_scheduler::export::{chromosome_from_export, Exporter};
use timetable_scheduler::model::ScheduleModel;
use timetable_scheduler::repair::{EventPayload, RepairPipeline, SubstitutionLedger};
use timetable_scheduler::solver::{solve, SolveProgress};
use timetable_scheduler::types::{Config, EntryKind, FacultyId, TimeSlot};

fn model_from(value: serde_json::Value) -> ScheduleModel {
    let config: Config = serde_json::from_value(value).unwrap();
    ScheduleModel::from_config(config).unwrap()
}

fn periods(n: u8) -> serde_json::Value {
    serde_json::Value::Array(
        (1..=n)
            .map(|id| serde_json::json!({"id": id}))
            .collect(),
    )
}

#[test]
fn trivial_feasible_single_lecture() {
    let model = model_from(serde_json::json!({
        "time_slots": {
            "periods": periods(5),
            "working_days": ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
        },
        "sections": [{"section_id": "A", "semester": 1, "student_count": 50}],
        "subjects": [{"subject_id": "S1", "name": "Subject One", "lectures_per_week": 1, "semester": 1}],
        "faculty": [{"faculty_id": "F1", "name": "Prof One", "subjects": ["S1"]}],
        "rooms": [{"room_id": "R1", "name": "Room 1", "capacity": 60}],
        "genetic_algorithm_params": {"population_size": 8, "generations": 10, "seed": 42}
    }));

    let solutions = solve(&model, Arc::new(SolveProgress::new()), true).unwrap();
    let best = &solutions[0];

    assert_eq!(best.chromosome.entries.len(), 1);
    // Full coverage (+1000) and the vacuous elective ratio (+600)
    assert_eq!(best.raw_fitness, 1600.0);
    assert!(best.chromosome.violations.is_empty());
}

#[test]
fn lab_session_is_consecutive_pair() {
    let model = model_from(serde_json::json!({
        "time_slots": {
            "periods": periods(6),
            "working_days": ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"],
            "break_periods": [3]
        },
        "sections": [{"section_id": "A", "semester": 1, "student_count": 30}],
        "subjects": [],
        "labs": [{"lab_id": "L1", "name": "Lab One", "sessions_per_week": 1,
                  "requires_consecutive_periods": 2, "lab_rooms": ["LR1"], "semester": 1}],
        "faculty": [{"faculty_id": "F1", "name": "Prof One", "subjects": ["L1"]}],
        "rooms": [{"room_id": "LR1", "name": "Lab Room", "type": "lab", "capacity": 30}],
        "genetic_algorithm_params": {"population_size": 8, "generations": 10, "seed": 42}
    }));

    let solutions = solve(&model, Arc::new(SolveProgress::new()), true).unwrap();
    let entries = &solutions[0].chromosome.entries;

    assert_eq!(entries.len(), 2);
    let lead = entries.iter().find(|e| !e.is_continuation).unwrap();
    let tail = entries.iter().find(|e| e.is_continuation).unwrap();
    assert_eq!(lead.lab_session, tail.lab_session);
    assert!(lead.lab_session.is_some());
    assert_eq!(lead.slot.day, tail.slot.day);
    assert_eq!(tail.slot.period, lead.slot.period + 1);
    assert_ne!(lead.slot.period, 3);
    assert_ne!(tail.slot.period, 3);
    assert_eq!(
        solutions[0].chromosome.violations.get("lab_continuity"),
        None
    );
}

#[test]
fn oversubscribed_faculty_yields_best_effort_not_failure() {
    // Two sections, one shared teacher, four lectures into a 1-day, 2-period
    // week: only two placements can ever exist under the clash discipline
    let model = model_from(serde_json::json!({
        "time_slots": {
            "periods": periods(2),
            "working_days": ["Monday"]
        },
        "sections": [
            {"section_id": "A", "semester": 1},
            {"section_id": "B", "semester": 1}
        ],
        "subjects": [{"subject_id": "S1", "name": "Subject One", "lectures_per_week": 2, "semester": 1}],
        "faculty": [{"faculty_id": "F1", "name": "Prof One", "subjects": ["S1"]}],
        "rooms": [{"room_id": "R1", "name": "Room 1", "capacity": 60}],
        "genetic_algorithm_params": {"population_size": 8, "generations": 10, "seed": 42}
    }));

    let solutions = solve(&model, Arc::new(SolveProgress::new()), true).unwrap();
    let best = &solutions[0];

    assert_eq!(best.chromosome.entries.len(), 2);
    assert!(best.chromosome.violations.is_empty());
    // Half coverage: strictly below the full-coverage mark, above the floor
    assert!(best.raw_fitness < 1600.0);
    assert!(best.raw_fitness > 1.0);
}

#[test]
fn elective_groups_share_the_declared_slot() {
    let model = model_from(serde_json::json!({
        "time_slots": {
            "periods": periods(7),
            "working_days": ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
        },
        "elective_slots": [{"day_name": "Monday", "period": 7}],
        "sections": [
            {"section_id": "A", "semester": 1, "electives": ["E1"]},
            {"section_id": "B", "semester": 1, "electives": ["E1"]}
        ],
        "subjects": [{"subject_id": "E1", "name": "Elective One", "is_elective": true, "semester": 1}],
        "faculty": [
            {"faculty_id": "F1", "name": "Prof One", "subjects": ["E1"]},
            {"faculty_id": "F2", "name": "Prof Two", "subjects": ["E1"]}
        ],
        "rooms": [
            {"room_id": "R1", "name": "Room 1", "capacity": 60},
            {"room_id": "R2", "name": "Room 2", "capacity": 60}
        ],
        "genetic_algorithm_params": {"population_size": 8, "generations": 10, "seed": 42}
    }));

    let solutions = solve(&model, Arc::new(SolveProgress::new()), true).unwrap();
    let entries = &solutions[0].chromosome.entries;

    assert_eq!(entries.len(), 2);
    let slot = TimeSlot::new(0, 7);
    for entry in entries {
        assert_eq!(entry.slot, slot);
        assert_eq!(entry.kind, EntryKind::Elective);
    }
    assert_ne!(entries[0].faculty, entries[1].faculty);
    assert_ne!(entries[0].room, entries[1].room);
    assert_ne!(entries[0].section, entries[1].section);
    assert!(solutions[0].chromosome.violations.is_empty());
}

#[test]
fn repair_shifts_deterministically_without_touching_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("substitution_load.json");

    let config: Config = serde_json::from_value(serde_json::json!({
        "time_slots": {
            "periods": periods(6),
            "working_days": ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
        },
        "sections": [{"section_id": "A", "semester": 1, "student_count": 40}],
        "subjects": [{"subject_id": "S1", "name": "Subject One", "lectures_per_week": 3, "semester": 1}],
        "faculty": [{"faculty_id": "F1", "name": "Prof One", "subjects": ["S1"]}],
        "rooms": [{"room_id": "R1", "name": "Room 1", "capacity": 60}],
        "genetic_algorithm_params": {"population_size": 8, "generations": 10, "seed": 42}
    }))
    .unwrap();

    // P1 is already taken, so the first-fit shift lands on P3 and P6
    let prior = serde_json::json!([
        {"section": "A", "subject_id": "S1", "faculty_id": "F1", "room_id": "R1",
         "day": "Monday", "period": 1, "type": "Theory"},
        {"section": "A", "subject_id": "S1", "faculty_id": "F1", "room_id": "R1",
         "day": "Monday", "period": 2, "type": "Theory"},
        {"section": "A", "subject_id": "S1", "faculty_id": "F1", "room_id": "R1",
         "day": "Monday", "period": 5, "type": "Theory"}
    ]);

    let mut pipeline = RepairPipeline::new(config, Some(&prior), &ledger_path).unwrap();
    let outcome = pipeline
        .apply_events(&EventPayload {
            events: vec![serde_json::json!({
                "type": "faculty_partial_absence", "faculty_id": "F1",
                "date": "Monday", "timeslots": [2, 5],
                "preferences": {"prefer_shift": true, "forbidden_periods": [4]}
            })],
        })
        .unwrap();

    let shifted: Vec<(u8, u8)> = outcome
        .report
        .shifted
        .iter()
        .map(|s| (s.orig_period, s.new_period))
        .collect();
    assert_eq!(shifted, vec![(2, 3), (5, 6)]);
    assert!(outcome.report.substitutions.is_empty());
    assert!(outcome.report.unassigned.is_empty());

    let slots: BTreeSet<u8> = outcome
        .solution
        .entries
        .iter()
        .map(|e| e.slot.period)
        .collect();
    assert_eq!(slots, BTreeSet::from([1, 3, 6]));

    // Pure-shift repairs never touch the fairness ledger
    let ledger = SubstitutionLedger::load(&ledger_path);
    assert_eq!(ledger.count(&FacultyId("F1".to_string())), 0);
    assert!(!ledger_path.exists());
}

#[test]
fn substitution_fairness_prefers_lowest_ledger_count() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("substitution_load.json");
    std::fs::write(&ledger_path, r#"{"F3": 5}"#).unwrap();

    let config: Config = serde_json::from_value(serde_json::json!({
        "time_slots": {
            "periods": periods(6),
            "working_days": ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
        },
        "sections": [{"section_id": "A", "semester": 1, "student_count": 40}],
        "subjects": [{"subject_id": "S1", "name": "Subject One", "lectures_per_week": 2, "semester": 1}],
        "faculty": [
            {"faculty_id": "F1", "name": "Prof One", "subjects": ["S1"]},
            {"faculty_id": "F2", "name": "Prof Two", "subjects": ["S1"]},
            {"faculty_id": "F3", "name": "Prof Three", "subjects": ["S1"]}
        ],
        "rooms": [{"room_id": "R1", "name": "Room 1", "capacity": 60}],
        "genetic_algorithm_params": {"population_size": 10, "generations": 10, "seed": 42}
    }))
    .unwrap();

    let prior = serde_json::json!([
        {"section": "A", "subject_id": "S1", "faculty_id": "F1", "room_id": "R1",
         "day": "Monday", "period": 1, "type": "Theory"},
        {"section": "A", "subject_id": "S1", "faculty_id": "F1", "room_id": "R1",
         "day": "Monday", "period": 4, "type": "Theory"}
    ]);

    let mut pipeline = RepairPipeline::new(config, Some(&prior), &ledger_path).unwrap();
    let outcome = pipeline
        .apply_events(&EventPayload {
            events: vec![serde_json::json!({
                "type": "faculty_absence", "faculty_id": "F1", "start_day": "Monday"
            })],
        })
        .unwrap();

    assert_eq!(outcome.report.substitutions.len(), 2);
    for record in &outcome.report.substitutions {
        assert_eq!(record.faculty.0, "F2");
    }
    // No class remains with the absent teacher on the masked day
    assert!(!outcome
        .solution
        .entries
        .iter()
        .any(|e| e.faculty.0 == "F1" && e.slot.day == 0));

    let ledger = SubstitutionLedger::load(&ledger_path);
    assert_eq!(ledger.count(&FacultyId("F2".to_string())), 2);
    assert_eq!(ledger.count(&FacultyId("F3".to_string())), 5);
}

#[test]
fn section_without_electives_draws_one_from_the_pool() {
    let model = model_from(serde_json::json!({
        "time_slots": {
            "periods": periods(4),
            "working_days": ["Monday", "Tuesday"]
        },
        "elective_slots": [{"day_name": "Tuesday", "period": 4}],
        "sections": [{"section_id": "A", "semester": 1}],
        "subjects": [
            {"subject_id": "S1", "name": "Subject One", "lectures_per_week": 1, "semester": 1},
            {"subject_id": "E1", "name": "Elective One", "is_elective": true, "semester": 1},
            {"subject_id": "E2", "name": "Elective Two", "is_elective": true, "semester": 1}
        ],
        "faculty": [{"faculty_id": "F1", "name": "Prof One", "subjects": ["S1", "E1", "E2"]}],
        "rooms": [{"room_id": "R1", "name": "Room 1", "capacity": 60}],
        "genetic_algorithm_params": {"population_size": 8, "generations": 10, "seed": 42}
    }));

    let solutions = solve(&model, Arc::new(SolveProgress::new()), true).unwrap();
    let electives: Vec<_> = solutions[0]
        .chromosome
        .entries
        .iter()
        .filter(|e| e.kind == EntryKind::Elective)
        .collect();

    assert_eq!(electives.len(), 1);
    assert_eq!(electives[0].slot, TimeSlot::new(1, 4));
    assert!(["E1", "E2"].contains(&electives[0].subject.0.as_str()));
}

#[test]
fn lab_span_longer_than_any_run_surfaces_continuity_violation() {
    // Periods 1-6 with a break at 3: the longest run is three periods, so a
    // four-period session can never be placed
    let model = model_from(serde_json::json!({
        "time_slots": {
            "periods": periods(6),
            "working_days": ["Monday", "Tuesday"],
            "break_periods": [3]
        },
        "sections": [{"section_id": "A", "semester": 1}],
        "subjects": [],
        "labs": [{"lab_id": "L1", "name": "Lab One", "sessions_per_week": 1,
                  "requires_consecutive_periods": 4, "lab_rooms": ["LR1"], "semester": 1}],
        "faculty": [{"faculty_id": "F1", "name": "Prof One", "subjects": ["L1"]}],
        "rooms": [{"room_id": "LR1", "name": "Lab Room", "type": "lab", "capacity": 30}],
        "genetic_algorithm_params": {"population_size": 6, "generations": 6, "seed": 42}
    }));

    let err = solve(&model, Arc::new(SolveProgress::new()), true).unwrap_err();
    match err.downcast_ref::<SchedulerError>() {
        Some(SchedulerError::NoSolution { violations }) => {
            assert_eq!(violations.get("lab_continuity"), Some(&1));
        }
        other => panic!("expected NoSolution with violations, got {other:?}"),
    }
}

#[test]
fn triple_period_lab_fits_the_only_long_run() {
    let model = model_from(serde_json::json!({
        "time_slots": {
            "periods": periods(6),
            "working_days": ["Monday"],
            "break_periods": [3]
        },
        "sections": [{"section_id": "A", "semester": 1}],
        "subjects": [],
        "labs": [{"lab_id": "L1", "name": "Lab One", "sessions_per_week": 1,
                  "requires_consecutive_periods": 3, "lab_rooms": ["LR1"], "semester": 1}],
        "faculty": [{"faculty_id": "F1", "name": "Prof One", "subjects": ["L1"]}],
        "rooms": [{"room_id": "LR1", "name": "Lab Room", "type": "lab", "capacity": 30}],
        "genetic_algorithm_params": {"population_size": 6, "generations": 6, "seed": 42}
    }));

    let solutions = solve(&model, Arc::new(SolveProgress::new()), true).unwrap();
    let mut slots: Vec<u8> = solutions[0]
        .chromosome
        .entries
        .iter()
        .map(|e| e.slot.period)
        .collect();
    slots.sort_unstable();
    assert_eq!(slots, vec![4, 5, 6]);
}

#[test]
fn detailed_export_round_trips_to_identical_entries() {
    let model = model_from(serde_json::json!({
        "time_slots": {
            "periods": periods(6),
            "working_days": ["Monday", "Tuesday", "Wednesday"],
            "break_periods": [3]
        },
        "elective_slots": [{"day_name": "Wednesday", "period": 6}],
        "sections": [{"section_id": "A", "semester": 1, "electives": ["E1"]}],
        "subjects": [
            {"subject_id": "S1", "name": "Subject One", "lectures_per_week": 2, "semester": 1},
            {"subject_id": "E1", "name": "Elective One", "is_elective": true, "semester": 1}
        ],
        "labs": [{"lab_id": "L1", "name": "Lab One", "sessions_per_week": 1,
                  "requires_consecutive_periods": 2, "lab_rooms": ["LR1"], "semester": 1}],
        "faculty": [{"faculty_id": "F1", "name": "Prof One", "subjects": ["S1", "E1", "L1"]}],
        "rooms": [
            {"room_id": "R1", "name": "Room 1", "capacity": 60},
            {"room_id": "LR1", "name": "Lab Room", "type": "lab", "capacity": 30}
        ],
        "genetic_algorithm_params": {"population_size": 8, "generations": 10, "seed": 42}
    }));

    let solutions = solve(&model, Arc::new(SolveProgress::new()), true).unwrap();
    let original = &solutions[0].chromosome;

    let exporter = Exporter::new(&model, original);
    let detailed = serde_json::to_value(exporter.detailed()).unwrap();
    let reparsed = chromosome_from_export(&model, &detailed);

    let mut original_entries = original.entries.clone();
    original_entries.sort_by_key(|e| e.sort_key());
    let mut reparsed_entries = reparsed.entries.clone();
    reparsed_entries.sort_by_key(|e| e.sort_key());
    assert_eq!(original_entries, reparsed_entries);
}

#[test]
fn fixed_seed_produces_byte_identical_solution_lists() {
    let run = || {
        let model = model_from(serde_json::json!({
            "time_slots": {
                "periods": periods(5),
                "working_days": ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
            },
            "sections": [
                {"section_id": "A", "semester": 1},
                {"section_id": "B", "semester": 1}
            ],
            "subjects": [
                {"subject_id": "S1", "name": "Subject One", "lectures_per_week": 3, "semester": 1},
                {"subject_id": "S2", "name": "Subject Two", "lectures_per_week": 2, "semester": 1}
            ],
            "faculty": [
                {"faculty_id": "F1", "name": "Prof One", "subjects": ["S1"]},
                {"faculty_id": "F2", "name": "Prof Two", "subjects": ["S2"]}
            ],
            "rooms": [
                {"room_id": "R1", "name": "Room 1", "capacity": 60},
                {"room_id": "R2", "name": "Room 2", "capacity": 60}
            ],
            "genetic_algorithm_params": {"population_size": 10, "generations": 15, "seed": 1234}
        }));

        let solutions = solve(&model, Arc::new(SolveProgress::new()), true).unwrap();
        let required = timetable_scheduler::model::required_class_count(&model);
        let payloads: Vec<_> = solutions
            .iter()
            .map(|s| {
                Exporter::new(&model, &s.chromosome)
                    .solution_payload(s.rank, s.fitness, required)
            })
            .collect();
        serde_json::to_string(&payloads).unwrap()
    };

    assert_eq!(run(), run());
}

#[test]
fn repair_identity_on_empty_event_list() {
    let dir = tempfile::tempdir().unwrap();
    let config: Config = serde_json::from_value(serde_json::json!({
        "time_slots": {
            "periods": periods(4),
            "working_days": ["Monday", "Tuesday"]
        },
        "sections": [{"section_id": "A", "semester": 1}],
        "subjects": [{"subject_id": "S1", "name": "Subject One", "lectures_per_week": 2, "semester": 1}],
        "faculty": [{"faculty_id": "F1", "name": "Prof One", "subjects": ["S1"]}],
        "rooms": [{"room_id": "R1", "name": "Room 1", "capacity": 60}]
    }))
    .unwrap();

    let prior = serde_json::json!([
        {"section": "A", "subject_id": "S1", "faculty_id": "F1", "room_id": "R1",
         "day": "Monday", "period": 1, "type": "Theory"},
        {"section": "A", "subject_id": "S1", "faculty_id": "F1", "room_id": "R1",
         "day": "Tuesday", "period": 2, "type": "Theory"}
    ]);

    let mut pipeline = RepairPipeline::new(
        config,
        Some(&prior),
        &dir.path().join("substitution_load.json"),
    )
    .unwrap();
    let before = pipeline.seed_schedule().entries.clone();

    let outcome = pipeline
        .apply_events(&EventPayload { events: vec![] })
        .unwrap();
    assert_eq!(outcome.solution.entries, before);
    assert!(outcome.report.substitutions.is_empty());
    assert!(outcome.report.unassigned.is_empty());
    assert!(outcome.report.shifted.is_empty());
}

#[test]
fn load_validate_solve_pipeline_smoke() {
    // The same call path the CLI takes: load, validate, build, solve
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    std::fs::write(
        &config_path,
        serde_json::to_string(&serde_json::json!({
            "time_slots": {"periods": periods(4), "working_days": ["Monday", "Tuesday"]},
            "sections": [{"section_id": "A", "semester": 1}],
            "subjects": [{"subject_id": "S1", "name": "Subject One", "lectures_per_week": 1, "semester": 1}],
            "faculty": [{"faculty_id": "F1", "name": "Prof One", "subjects": ["S1"]}],
            "rooms": [{"room_id": "R1", "name": "Room 1", "capacity": 60}]
        }))
        .unwrap(),
    )
    .unwrap();

    let config = timetable_scheduler::parser::load_config(Path::new(&config_path)).unwrap();
    timetable_scheduler::parser::validate_input(&config).unwrap();
    let model = ScheduleModel::from_config(config).unwrap();
    timetable_scheduler::parser::validate_model(&model).unwrap();
    let solutions = solve(&model, Arc::new(SolveProgress::new()), true).unwrap();
    assert!(!solutions.is_empty());
}
