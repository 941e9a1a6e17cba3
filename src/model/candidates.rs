use std::collections::BTreeMap;

use super::{ClassRequirement, ScheduleModel};
use crate::types::{FacultyId, RoomId, SectionId, SubjectId};

/// Teacher stability map: once a faculty member is chosen for a
/// (section, subject) pair they keep it for the whole week
pub type SectionSubjectMap = BTreeMap<(SectionId, SubjectId), FacultyId>;

/// Classes currently carried by each faculty member this week
pub type WorkloadMap = BTreeMap<FacultyId, u32>;

/// Ordered candidate faculty for one (subject, section) pair.
///
/// Order of precedence: a previously recorded assignment wins outright; a
/// qualified coordinator is forced or fronted; everyone else is ranked by
/// workload (ascending) combined with experience (descending), ties broken
/// by id so the ordering is reproducible. When nobody qualifies a single
/// sentinel id is returned.
pub fn eligible_faculty(
    model: &ScheduleModel,
    subject: &SubjectId,
    section: &SectionId,
    assigned: &SectionSubjectMap,
    workload: &WorkloadMap,
) -> Vec<FacultyId> {
    if let Some(existing) = assigned.get(&(section.clone(), subject.clone())) {
        return vec![existing.clone()];
    }

    let mut qualified: Vec<FacultyId> = model
        .faculty_subjects
        .iter()
        .filter(|(_, subjects)| subjects.contains(subject))
        .map(|(fid, _)| fid.clone())
        .collect();

    if qualified.is_empty() {
        return vec![FacultyId::sentinel()];
    }

    let coordinator = model
        .section_coordinator
        .get(section)
        .filter(|fid| qualified.contains(fid))
        .cloned();

    if let Some(coordinator) = &coordinator {
        if model.force_coordinator_assignments {
            return vec![coordinator.clone()];
        }
        qualified.retain(|fid| fid != coordinator);
    }

    let mut ranked = rank_candidates(model, qualified, workload);

    if let Some(coordinator) = coordinator {
        ranked.insert(0, coordinator);
    }

    ranked
}

/// Combined-rank ordering: ascending workload rank plus descending
/// experience rank, lower total first
fn rank_candidates(
    model: &ScheduleModel,
    candidates: Vec<FacultyId>,
    workload: &WorkloadMap,
) -> Vec<FacultyId> {
    let mut by_workload = candidates.clone();
    by_workload.sort_by_key(|fid| (workload.get(fid).copied().unwrap_or(0), fid.clone()));
    let workload_rank: BTreeMap<&FacultyId, usize> = by_workload
        .iter()
        .enumerate()
        .map(|(rank, fid)| (fid, rank))
        .collect();

    let mut by_experience = candidates.clone();
    by_experience.sort_by_key(|fid| {
        let experience = model
            .faculty
            .get(fid)
            .and_then(|f| f.experience)
            .unwrap_or(0);
        (std::cmp::Reverse(experience), fid.clone())
    });
    let experience_rank: BTreeMap<&FacultyId, usize> = by_experience
        .iter()
        .enumerate()
        .map(|(rank, fid)| (fid, rank))
        .collect();

    let mut ranked = candidates;
    ranked.sort_by_key(|fid| (workload_rank[fid] + experience_rank[fid], fid.clone()));
    ranked
}

/// Room choice for one requirement. Labs prefer their declared pool, then
/// any lab-typed room, then anything. Theory prefers the section's home room
/// when it fits, then any room with sufficient capacity, then anything.
pub fn room_for_requirement(
    model: &ScheduleModel,
    section: &SectionId,
    requirement: &ClassRequirement,
) -> Option<RoomId> {
    let subject = requirement.subject();

    if model.is_lab_subject(subject) {
        if let Some(lab) = model.labs.get(subject) {
            if let Some(room) = lab.lab_rooms.iter().find(|r| model.rooms.contains_key(r)) {
                return Some(room.clone());
            }
        }
        if let Some((rid, _)) = model.rooms.iter().find(|(_, r)| r.is_lab()) {
            return Some(rid.clone());
        }
        return model.rooms.keys().next().cloned();
    }

    let section_def = model.sections.get(section);
    let student_count = section_def.map(|s| s.student_count).unwrap_or(0);

    if let Some(home) = section_def.and_then(|s| s.room.as_ref()) {
        if let Some(room) = model.rooms.get(home) {
            if room.capacity >= student_count {
                return Some(home.clone());
            }
        }
    }

    if let Some((rid, _)) = model
        .rooms
        .iter()
        .find(|(_, r)| r.capacity >= student_count)
    {
        return Some(rid.clone());
    }

    model.rooms.keys().next().cloned()
}
