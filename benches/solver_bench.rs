use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use timetable_scheduler::model::ScheduleModel;
use timetable_scheduler::solver::{solve, SolveProgress};
use timetable_scheduler::types::Config;

fn small_model() -> ScheduleModel {
    let config: Config = serde_json::from_value(serde_json::json!({
        "time_slots": {
            "periods": [{"id": 1}, {"id": 2}, {"id": 3}, {"id": 4},
                        {"id": 5}, {"id": 6}, {"id": 7}],
            "working_days": ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"],
            "break_periods": [4]
        },
        "sections": [
            {"section_id": "A", "semester": 1, "student_count": 60},
            {"section_id": "B", "semester": 1, "student_count": 60},
            {"section_id": "C", "semester": 1, "student_count": 60}
        ],
        "subjects": [
            {"subject_id": "S1", "name": "Subject One", "lectures_per_week": 3, "semester": 1},
            {"subject_id": "S2", "name": "Subject Two", "lectures_per_week": 3, "semester": 1},
            {"subject_id": "S3", "name": "Subject Three", "lectures_per_week": 2, "semester": 1}
        ],
        "labs": [
            {"lab_id": "L1", "name": "Lab One", "sessions_per_week": 1,
             "requires_consecutive_periods": 2, "lab_rooms": ["LR1"], "semester": 1}
        ],
        "faculty": [
            {"faculty_id": "F1", "name": "Prof One", "subjects": ["S1", "L1"]},
            {"faculty_id": "F2", "name": "Prof Two", "subjects": ["S2"]},
            {"faculty_id": "F3", "name": "Prof Three", "subjects": ["S3", "L1"]}
        ],
        "rooms": [
            {"room_id": "R1", "name": "Room 1", "capacity": 70},
            {"room_id": "R2", "name": "Room 2", "capacity": 70},
            {"room_id": "R3", "name": "Room 3", "capacity": 70},
            {"room_id": "LR1", "name": "Lab Room", "type": "lab", "capacity": 60}
        ],
        "genetic_algorithm_params": {"population_size": 20, "generations": 30, "seed": 42}
    }))
    .unwrap();
    ScheduleModel::from_config(config).unwrap()
}

fn bench_solve(c: &mut Criterion) {
    let model = small_model();
    c.bench_function("solve_three_sections", |b| {
        b.iter(|| {
            let solutions =
                solve(black_box(&model), Arc::new(SolveProgress::new()), true).unwrap();
            black_box(solutions.len())
        })
    });
}

criterion_group!(benches, bench_solve);
criterion_main!(benches);
