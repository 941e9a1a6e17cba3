use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{DeptId, FacultyId, RoomId, SectionId, SubjectId};

/// Accept integers, floats, and numeric strings for count-like fields.
/// Upstream extractors are loose about numeric types, so absent/odd values
/// must normalise here rather than leak into the solver.
fn flex_u32<'de, D>(de: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Str(String),
    }

    match Raw::deserialize(de)? {
        Raw::Int(i) => Ok(i.max(0) as u32),
        Raw::Float(f) => Ok(f.max(0.0) as u32),
        Raw::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(|f| f.max(0.0) as u32)
            .map_err(serde::de::Error::custom),
    }
}

fn flex_opt_u32<'de, D>(de: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrap(#[serde(deserialize_with = "flex_u32")] u32);

    Ok(Option::<Wrap>::deserialize(de)?.map(|w| w.0))
}

/// Informational header carried through to exports
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollegeInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub effective_date: String,
}

/// One row of the period table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodDef {
    pub id: u8,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
}

fn default_working_days() -> Vec<String> {
    ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
        .iter()
        .map(|d| d.to_string())
        .collect()
}

/// The weekly grid: periods, working days and the break structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlotsConfig {
    #[serde(default)]
    pub periods: Vec<PeriodDef>,
    #[serde(default = "default_working_days")]
    pub working_days: Vec<String>,
    #[serde(default)]
    pub break_periods: Vec<u8>,
    /// Legacy singular keys, folded into the plural sets on ingest
    #[serde(default)]
    pub lunch_period: Option<u8>,
    #[serde(default)]
    pub mentorship_period: Option<u8>,
    #[serde(default)]
    pub lunch_break_periods: Vec<u8>,
    #[serde(default)]
    pub mentorship_periods: Vec<u8>,
}

impl Default for TimeSlotsConfig {
    fn default() -> Self {
        Self {
            periods: Vec::new(),
            working_days: default_working_days(),
            break_periods: Vec::new(),
            lunch_period: None,
            mentorship_period: None,
            lunch_break_periods: Vec::new(),
            mentorship_periods: Vec::new(),
        }
    }
}

/// A (day, period) pair reserved globally for elective classes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectiveSlotDef {
    pub day_name: String,
    pub period: u8,
}

/// Masked-out (day, period) cell on a room, faculty member or section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnavailableSlot {
    pub day: u8,
    pub period: u8,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentDef {
    pub dept_id: DeptId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sections: Vec<SectionDef>,
}

fn default_student_count() -> u32 {
    60
}

fn default_semester() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDef {
    pub section_id: SectionId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_semester", deserialize_with = "flex_u32")]
    pub semester: u32,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default = "default_student_count", deserialize_with = "flex_u32")]
    pub student_count: u32,
    /// Home room, preferred for theory classes
    #[serde(default)]
    pub room: Option<RoomId>,
    /// Coordinator by display name, resolved against faculty names on ingest
    #[serde(default)]
    pub coordinator: Option<String>,
    #[serde(default)]
    pub electives: Vec<SubjectId>,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub unavailable_periods: Vec<UnavailableSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectDef {
    pub subject_id: SubjectId,
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "flex_u32")]
    pub credits: u32,
    /// Weekly lecture requirement; older configs call this min_classes_per_week
    #[serde(
        default,
        alias = "min_classes_per_week",
        deserialize_with = "flex_opt_u32"
    )]
    pub lectures_per_week: Option<u32>,
    #[serde(default, deserialize_with = "flex_opt_u32")]
    pub max_classes_per_day: Option<u32>,
    #[serde(default, deserialize_with = "flex_opt_u32")]
    pub semester: Option<u32>,
    /// Departmental scope; empty means the subject applies everywhere
    #[serde(default)]
    pub departments: Vec<DeptId>,
    #[serde(default)]
    pub is_elective: bool,
}

fn default_consecutive() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabDef {
    pub lab_id: SubjectId,
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "flex_u32")]
    pub credits: u32,
    #[serde(
        default,
        alias = "min_classes_per_week",
        deserialize_with = "flex_opt_u32"
    )]
    pub sessions_per_week: Option<u32>,
    /// Length of one session in consecutive periods (N >= 2)
    #[serde(default = "default_consecutive", deserialize_with = "flex_u32")]
    pub requires_consecutive_periods: u32,
    #[serde(default, deserialize_with = "flex_opt_u32")]
    pub semester: Option<u32>,
    #[serde(default)]
    pub departments: Vec<DeptId>,
    #[serde(default)]
    pub lab_rooms: Vec<RoomId>,
    #[serde(default)]
    pub is_elective: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacultyDef {
    pub faculty_id: FacultyId,
    pub name: String,
    #[serde(default)]
    pub department: Option<DeptId>,
    #[serde(default)]
    pub designation: Option<String>,
    /// Subject references: canonical ids, display names, or synonyms
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default, deserialize_with = "flex_u32")]
    pub max_hours_per_week: u32,
    /// Tie-break scalar in candidate ranking; higher wins
    #[serde(default, deserialize_with = "flex_opt_u32")]
    pub experience: Option<u32>,
    #[serde(default)]
    pub preferred_time_slots: Option<Vec<u8>>,
    #[serde(default)]
    pub unavailable_periods: Vec<UnavailableSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDef {
    pub room_id: RoomId,
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "flex_u32")]
    pub capacity: u32,
    #[serde(default)]
    pub department: Option<DeptId>,
    #[serde(default)]
    pub equipment: Option<Vec<String>>,
    #[serde(default)]
    pub unavailable_periods: Vec<UnavailableSlot>,
}

impl RoomDef {
    pub fn is_lab(&self) -> bool {
        self.kind
            .as_deref()
            .map(|k| {
                let k = k.to_ascii_lowercase();
                k == "lab" || k == "laboratory"
            })
            .unwrap_or(false)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardConstraintsConfig {
    #[serde(default = "default_true")]
    pub no_faculty_clash: bool,
    #[serde(default = "default_true")]
    pub no_room_clash: bool,
    #[serde(default = "default_true")]
    pub no_section_clash: bool,
    #[serde(default = "default_true")]
    pub lab_duration_consecutive: bool,
    #[serde(default, deserialize_with = "flex_opt_u32")]
    pub max_classes_per_day_per_section: Option<u32>,
    #[serde(default, deserialize_with = "flex_opt_u32")]
    pub max_classes_per_subject_per_day: Option<u32>,
    #[serde(default)]
    pub break_periods_fixed: Option<Vec<u8>>,
}

impl Default for HardConstraintsConfig {
    fn default() -> Self {
        Self {
            no_faculty_clash: true,
            no_room_clash: true,
            no_section_clash: true,
            lab_duration_consecutive: true,
            max_classes_per_day_per_section: None,
            max_classes_per_subject_per_day: None,
            break_periods_fixed: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstraintsConfig {
    #[serde(default)]
    pub hard_constraints: HardConstraintsConfig,
    /// Accepted but unenforced knobs (balanced_daily_load and friends);
    /// carried as opaque pass-through
    #[serde(default)]
    pub soft_constraints: BTreeMap<String, serde_json::Value>,
}

/// A pre-decided placement the solver must honour verbatim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedAssignment {
    pub faculty_id: FacultyId,
    pub subject_id: SubjectId,
    pub section_id: SectionId,
    pub day: u8,
    pub period: u8,
    #[serde(default)]
    pub room_id: Option<RoomId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecialRequirements {
    #[serde(default)]
    pub fixed_assignments: Vec<FixedAssignment>,
    #[serde(default)]
    pub force_coordinator_assignments: bool,
}

fn default_population_size() -> u32 {
    30
}
fn default_generations() -> u32 {
    100
}
fn default_mutation_rate() -> f64 {
    0.2
}
fn default_crossover_rate() -> f64 {
    0.8
}
fn default_elite_size() -> u32 {
    3
}
fn default_patience() -> u32 {
    5
}
fn default_tournament_size() -> u32 {
    3
}
fn default_seed() -> u64 {
    42
}

/// Search parameters; every field has a recognised effect on the driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaParams {
    #[serde(default = "default_population_size", deserialize_with = "flex_u32")]
    pub population_size: u32,
    #[serde(default = "default_generations", deserialize_with = "flex_u32")]
    pub generations: u32,
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    #[serde(default = "default_elite_size", deserialize_with = "flex_u32")]
    pub elite_size: u32,
    /// Generations without strict improvement before early stop
    #[serde(
        default = "default_patience",
        alias = "stagnation_limit",
        deserialize_with = "flex_u32"
    )]
    pub early_stopping_patience: u32,
    #[serde(default = "default_tournament_size", deserialize_with = "flex_u32")]
    pub tournament_size: u32,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for GaParams {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            generations: default_generations(),
            mutation_rate: default_mutation_rate(),
            crossover_rate: default_crossover_rate(),
            elite_size: default_elite_size(),
            early_stopping_patience: default_patience(),
            tournament_size: default_tournament_size(),
            seed: default_seed(),
        }
    }
}

/// The structured configuration object consumed by the core.
/// Produced upstream by the document-ingest layer; the core never parses
/// PDFs or spreadsheets itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub college_info: CollegeInfo,
    #[serde(default)]
    pub time_slots: TimeSlotsConfig,
    #[serde(default)]
    pub elective_slots: Vec<ElectiveSlotDef>,
    #[serde(default)]
    pub departments: Vec<DepartmentDef>,
    /// Sections may also be nested inside departments
    #[serde(default)]
    pub sections: Vec<SectionDef>,
    #[serde(default)]
    pub subjects: Vec<SubjectDef>,
    #[serde(default)]
    pub labs: Vec<LabDef>,
    #[serde(default)]
    pub faculty: Vec<FacultyDef>,
    #[serde(default)]
    pub rooms: Vec<RoomDef>,
    #[serde(default)]
    pub subject_name_mapping: BTreeMap<String, SubjectId>,
    #[serde(default)]
    pub constraints: ConstraintsConfig,
    #[serde(default)]
    pub special_requirements: SpecialRequirements,
    #[serde(default)]
    pub genetic_algorithm_params: GaParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"subjects": [], "faculty": []}"#).unwrap();
        assert_eq!(config.time_slots.working_days.len(), 5);
        assert_eq!(config.genetic_algorithm_params.population_size, 30);
        assert_eq!(config.genetic_algorithm_params.seed, 42);
        assert!(config.constraints.hard_constraints.no_faculty_clash);
    }

    #[test]
    fn test_numeric_coercion_accepts_floats_and_strings() {
        let section: SectionDef = serde_json::from_str(
            r#"{"section_id": "CS-A", "student_count": 62.0, "semester": "3"}"#,
        )
        .unwrap();
        assert_eq!(section.student_count, 62);
        assert_eq!(section.semester, 3);
    }

    #[test]
    fn test_subject_weekly_count_alias() {
        let subject: SubjectDef = serde_json::from_str(
            r#"{"subject_id": "MA101", "name": "Calculus", "min_classes_per_week": 4}"#,
        )
        .unwrap();
        assert_eq!(subject.lectures_per_week, Some(4));
    }

    #[test]
    fn test_lab_defaults_to_pairs() {
        let lab: LabDef =
            serde_json::from_str(r#"{"lab_id": "CS101L", "name": "Programming Lab"}"#).unwrap();
        assert_eq!(lab.requires_consecutive_periods, 2);
        assert!(lab.lab_rooms.is_empty());
    }

    #[test]
    fn test_room_lab_typing_is_case_insensitive() {
        let room: RoomDef = serde_json::from_str(
            r#"{"room_id": "L1", "name": "Lab 1", "type": "Laboratory", "capacity": 30}"#,
        )
        .unwrap();
        assert!(room.is_lab());
    }

    #[test]
    fn test_ga_params_stagnation_alias() {
        let params: GaParams = serde_json::from_str(r#"{"stagnation_limit": 9}"#).unwrap();
        assert_eq!(params.early_stopping_patience, 9);
    }
}
