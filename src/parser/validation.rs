use std::collections::HashSet;

use crate::error::{Result, SchedulerError};
use crate::model::ScheduleModel;
use crate::types::Config;

/// Validation result with collected errors and warnings
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
}

/// Structural validation of the raw configuration, before the model and its
/// derived indices are built
pub fn validate_input(config: &Config) -> Result<ValidationResult> {
    let mut result = ValidationResult::default();

    if config.time_slots.periods.is_empty() {
        result.add_error("time_slots.periods is empty");
    }
    if config.time_slots.working_days.is_empty() {
        result.add_error("time_slots.working_days is empty");
    }
    let mut period_ids = HashSet::new();
    for period in &config.time_slots.periods {
        if !period_ids.insert(period.id) {
            result.add_error(format!("Duplicate period id: {}", period.id));
        }
        let times = [
            ("start_time", &period.start_time),
            ("end_time", &period.end_time),
        ];
        for (field, value) in times {
            if !value.is_empty()
                && chrono::NaiveTime::parse_from_str(value, "%H:%M").is_err()
            {
                result.add_error(format!(
                    "Period {} has malformed {field} '{value}' (expected HH:MM)",
                    period.id
                ));
            }
        }
    }

    let section_count = config.sections.len()
        + config
            .departments
            .iter()
            .map(|d| d.sections.len())
            .sum::<usize>();
    if section_count == 0 {
        result.add_error("No sections declared (top-level or inside departments)");
    }
    if config.subjects.is_empty() && config.labs.is_empty() {
        result.add_error("No subjects or labs declared");
    }
    if config.faculty.is_empty() {
        result.add_error("No faculty declared");
    }
    if config.rooms.is_empty() {
        result.add_error("No rooms declared");
    }

    let mut seen = HashSet::new();
    for section in config
        .sections
        .iter()
        .chain(config.departments.iter().flat_map(|d| d.sections.iter()))
    {
        if !seen.insert(&section.section_id) {
            result.add_error(format!("Duplicate section id: '{}'", section.section_id));
        }
    }
    let mut seen = HashSet::new();
    for subject in &config.subjects {
        if !seen.insert(&subject.subject_id) {
            result.add_error(format!("Duplicate subject id: '{}'", subject.subject_id));
        }
    }
    for lab in &config.labs {
        if !seen.insert(&lab.lab_id) {
            result.add_error(format!("Duplicate lab id: '{}'", lab.lab_id));
        }
    }
    let mut seen = HashSet::new();
    for faculty in &config.faculty {
        if !seen.insert(&faculty.faculty_id) {
            result.add_error(format!("Duplicate faculty id: '{}'", faculty.faculty_id));
        }
    }
    let mut seen = HashSet::new();
    for room in &config.rooms {
        if !seen.insert(&room.room_id) {
            result.add_error(format!("Duplicate room id: '{}'", room.room_id));
        }
    }

    if !result.is_valid() {
        return Err(SchedulerError::ConfigurationInvalid(result.errors.join("; ")).into());
    }
    Ok(result)
}

/// Semantic validation on the constructed model: every section must have at
/// least one applicable class, and qualification references should resolve
pub fn validate_model(model: &ScheduleModel) -> Result<ValidationResult> {
    let mut result = ValidationResult::default();

    for (section_id, section) in &model.sections {
        let has_subject = model
            .subjects
            .values()
            .any(|s| model.applies_to_section(&s.departments, s.semester, section))
            || model
                .labs
                .values()
                .any(|l| model.applies_to_section(&l.departments, l.semester, section));
        if !has_subject {
            result.add_error(format!(
                "Section '{}' has zero applicable subjects",
                section_id
            ));
        }
    }

    for (fid, def) in &model.faculty {
        for reference in &def.subjects {
            if model.resolve_subject(reference).is_none() {
                result.add_warning(format!(
                    "Faculty '{}' lists unresolvable subject '{}'",
                    fid, reference
                ));
            }
        }
    }

    for (subject_id, _) in &model.subjects {
        let qualified = model
            .faculty_subjects
            .values()
            .any(|subjects| subjects.contains(subject_id));
        if !qualified {
            result.add_warning(format!(
                "Subject '{}' has no qualified faculty; the placeholder id will be used",
                subject_id
            ));
        }
    }

    if !result.is_valid() {
        return Err(SchedulerError::ConfigurationInvalid(result.errors.join("; ")).into());
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        serde_json::from_str(
            r#"{
            "time_slots": {"periods": [{"id": 1}, {"id": 2}]},
            "sections": [{"section_id": "A", "semester": 1}],
            "subjects": [{"subject_id": "MA101", "name": "Calculus", "semester": 1}],
            "faculty": [{"faculty_id": "F1", "name": "Dr. Rao", "subjects": ["MA101"]}],
            "rooms": [{"room_id": "R1", "name": "Room 1", "capacity": 60}]
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_config_passes() {
        let result = validate_input(&valid_config()).unwrap();
        assert!(result.is_valid());
    }

    #[test]
    fn test_empty_period_table_is_fatal() {
        let mut config = valid_config();
        config.time_slots.periods.clear();
        assert!(validate_input(&config).is_err());
    }

    #[test]
    fn test_malformed_period_time_is_fatal() {
        let mut config = valid_config();
        config.time_slots.periods[0].start_time = "quarter past nine".to_string();
        assert!(validate_input(&config).is_err());
    }

    #[test]
    fn test_missing_rooms_is_fatal() {
        let mut config = valid_config();
        config.rooms.clear();
        assert!(validate_input(&config).is_err());
    }

    #[test]
    fn test_duplicate_faculty_id_is_fatal() {
        let mut config = valid_config();
        let dup = config.faculty[0].clone();
        config.faculty.push(dup);
        assert!(validate_input(&config).is_err());
    }

    #[test]
    fn test_section_without_applicable_subjects_is_fatal() {
        let mut config = valid_config();
        // Semester mismatch leaves section A with no applicable class
        config.subjects[0].semester = Some(5);
        let model = ScheduleModel::from_config(config).unwrap();
        assert!(validate_model(&model).is_err());
    }

    #[test]
    fn test_unresolvable_qualification_is_a_warning() {
        let mut config = valid_config();
        config.faculty[0].subjects.push("Quantum Basketry".to_string());
        let model = ScheduleModel::from_config(config).unwrap();
        let result = validate_model(&model).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
    }
}
