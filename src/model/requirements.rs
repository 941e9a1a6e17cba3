use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

use super::ScheduleModel;
use crate::types::{SectionId, SubjectId};

/// One item of a section's required-class bag
#[derive(Debug, Clone, PartialEq)]
pub enum ClassRequirement {
    Theory {
        subject: SubjectId,
    },
    Lab {
        subject: SubjectId,
        session_id: String,
        /// Consecutive periods one session occupies
        span: u32,
    },
    Elective {
        subject: SubjectId,
        group_id: String,
    },
}

impl ClassRequirement {
    pub fn subject(&self) -> &SubjectId {
        match self {
            ClassRequirement::Theory { subject }
            | ClassRequirement::Lab { subject, .. }
            | ClassRequirement::Elective { subject, .. } => subject,
        }
    }
}

/// Derive the weekly required-class bag for every section.
///
/// Non-elective theory subjects contribute one copy per weekly lecture,
/// non-elective labs one session descriptor per weekly session. Electives
/// follow the section's declared list verbatim; a section without one gets a
/// single elective drawn from its semester pool. All electives of a section
/// share one group id so they can be placed atomically.
pub fn build_required_classes<R: Rng>(
    model: &ScheduleModel,
    rng: &mut R,
) -> BTreeMap<SectionId, Vec<ClassRequirement>> {
    let mut bag = BTreeMap::new();

    for (section_id, section) in &model.sections {
        let mut classes = Vec::new();

        for (subject_id, subject) in &model.subjects {
            if subject.is_elective {
                continue;
            }
            if !model.applies_to_section(&subject.departments, subject.semester, section) {
                continue;
            }
            let lectures = subject.lectures_per_week.unwrap_or(1).max(1);
            for _ in 0..lectures {
                classes.push(ClassRequirement::Theory {
                    subject: subject_id.clone(),
                });
            }
        }

        for (lab_id, lab) in &model.labs {
            if lab.is_elective {
                continue;
            }
            if !model.applies_to_section(&lab.departments, lab.semester, section) {
                continue;
            }
            let sessions = lab.sessions_per_week.unwrap_or(1).max(1);
            for session_num in 0..sessions {
                classes.push(ClassRequirement::Lab {
                    subject: lab_id.clone(),
                    session_id: format!("{}_S{}_{}", lab_id, section_id, session_num),
                    span: lab.requires_consecutive_periods.max(2),
                });
            }
        }

        let group_id = elective_group_id(section_id);
        if section.electives.is_empty() {
            // No declared electives: draw one from the semester pool
            if let Some(subject) = pick_elective(model, section_id, rng) {
                classes.push(ClassRequirement::Elective {
                    subject,
                    group_id: group_id.clone(),
                });
            }
        } else {
            for subject in &section.electives {
                classes.push(ClassRequirement::Elective {
                    subject: subject.clone(),
                    group_id: group_id.clone(),
                });
            }
        }

        bag.insert(section_id.clone(), classes);
    }

    bag
}

pub fn elective_group_id(section: &SectionId) -> String {
    format!("EG_{}", section)
}

pub fn total_required(bag: &BTreeMap<SectionId, Vec<ClassRequirement>>) -> usize {
    bag.values().map(|classes| classes.len()).sum()
}

/// Bag size under the configuration's own seed; the coverage denominator
/// reported in statistics
pub fn required_class_count(model: &ScheduleModel) -> usize {
    use rand::SeedableRng;
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(model.ga_params.seed);
    total_required(&build_required_classes(model, &mut rng))
}

fn pick_elective<R: Rng>(
    model: &ScheduleModel,
    section_id: &SectionId,
    rng: &mut R,
) -> Option<SubjectId> {
    let section = model.sections.get(section_id)?;
    let mut pool: Vec<SubjectId> = model
        .subjects
        .iter()
        .filter(|(_, s)| {
            s.is_elective && model.applies_to_section(&s.departments, s.semester, section)
        })
        .map(|(id, _)| id.clone())
        .collect();
    pool.extend(
        model
            .labs
            .iter()
            .filter(|(_, l)| {
                l.is_elective && model.applies_to_section(&l.departments, l.semester, section)
            })
            .map(|(id, _)| id.clone()),
    );
    pool.choose(rng).cloned()
}
