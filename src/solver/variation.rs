use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

use itertools::Itertools;

use super::fitness::lab_session_is_valid;
use super::Chromosome;
use crate::model::{eligible_faculty, room_for_requirement, ClassRequirement, ScheduleModel};
use crate::types::{Entry, EntryKind, RoomId, SectionId, SubjectId, TimeSlot};

/// Random slot draws per theory requirement before giving up
const MAX_PLACEMENT_ATTEMPTS: usize = 20;
/// Target slots tried per mutation move
const MUTATION_SLOT_ATTEMPTS: usize = 5;

/// The three variation operators: initialisation, mutation and
/// recombination. All of them respect the occupancy discipline; none of
/// them ever places an entry on a break period.
pub struct Variation<'a> {
    model: &'a ScheduleModel,
    bag: &'a BTreeMap<SectionId, Vec<ClassRequirement>>,
}

impl<'a> Variation<'a> {
    pub fn new(
        model: &'a ScheduleModel,
        bag: &'a BTreeMap<SectionId, Vec<ClassRequirement>>,
    ) -> Self {
        Self { model, bag }
    }

    /// Populate a fresh chromosome in phases: pinned placements, then
    /// elective groups, then labs, then theory. Requirements that cannot be
    /// placed stay absent and depress coverage instead of breaking anything.
    pub fn initialize<R: Rng>(&self, rng: &mut R) -> Chromosome {
        let mut chromosome = Chromosome::new();

        // Working copy of the bag; pinned placements consume matching items
        let mut remaining: BTreeMap<SectionId, Vec<ClassRequirement>> = self.bag.clone();
        self.place_fixed_assignments(&mut chromosome, &mut remaining);

        // Elective groups first: each group claims one elective slot as a whole
        for (section_id, requirements) in &remaining {
            let members: Vec<&ClassRequirement> = requirements
                .iter()
                .filter(|r| matches!(r, ClassRequirement::Elective { .. }))
                .collect();
            if !members.is_empty() {
                self.place_elective_group(&mut chromosome, section_id, &members);
            }
        }

        // Labs next: they need windows of consecutive free periods
        for (section_id, requirements) in &remaining {
            for requirement in requirements {
                if let ClassRequirement::Lab {
                    subject,
                    session_id,
                    span,
                } = requirement
                {
                    self.place_lab_session(
                        &mut chromosome,
                        section_id,
                        subject,
                        session_id,
                        *span as usize,
                        rng,
                    );
                }
            }
        }

        // Theory last: single slots are easy to fit around everything else
        for (section_id, requirements) in &remaining {
            for requirement in requirements {
                if let ClassRequirement::Theory { subject } = requirement {
                    self.place_theory(&mut chromosome, section_id, subject, rng);
                }
            }
        }

        chromosome
    }

    fn place_fixed_assignments(
        &self,
        chromosome: &mut Chromosome,
        remaining: &mut BTreeMap<SectionId, Vec<ClassRequirement>>,
    ) {
        for fixed in &self.model.fixed_assignments {
            let slot = TimeSlot::new(fixed.day, fixed.period);

            // Consume one matching requirement so the bag phases skip it
            let consumed = remaining.get_mut(&fixed.section_id).and_then(|reqs| {
                reqs.iter()
                    .position(|r| r.subject() == &fixed.subject_id)
                    .map(|idx| reqs.remove(idx))
            });

            let (kind, elective_group) = match &consumed {
                Some(ClassRequirement::Elective { group_id, .. }) => {
                    (EntryKind::Elective, Some(group_id.clone()))
                }
                Some(ClassRequirement::Lab { .. }) => (EntryKind::Lab, None),
                _ if self.model.is_lab_subject(&fixed.subject_id) => (EntryKind::Lab, None),
                _ => (EntryKind::Theory, None),
            };

            let room = match &fixed.room_id {
                Some(room) => room.clone(),
                None => {
                    let requirement = consumed.clone().unwrap_or(ClassRequirement::Theory {
                        subject: fixed.subject_id.clone(),
                    });
                    match room_for_requirement(self.model, &fixed.section_id, &requirement) {
                        Some(room) => room,
                        None => continue,
                    }
                }
            };

            if chromosome.is_conflict_free(
                self.model,
                &fixed.section_id,
                &fixed.faculty_id,
                &room,
                slot,
            ) {
                chromosome.add(Entry {
                    section: fixed.section_id.clone(),
                    subject: fixed.subject_id.clone(),
                    faculty: fixed.faculty_id.clone(),
                    room,
                    slot,
                    kind,
                    lab_session: None,
                    is_continuation: false,
                    elective_group,
                });
            }
        }
    }

    /// Place every member of one section's elective group atomically: the
    /// first declared elective slot that admits all members wins. Members
    /// share the section's cell by design, so only faculty and room keys are
    /// contested between them.
    fn place_elective_group(
        &self,
        chromosome: &mut Chromosome,
        section_id: &SectionId,
        members: &[&ClassRequirement],
    ) -> bool {
        'slots: for &slot in &self.model.elective_slots {
            if self.model.is_break(slot.period) {
                continue;
            }
            // Slot must be open for the section itself (other groups or
            // stray entries may already hold it)
            if chromosome
                .entries
                .iter()
                .any(|e| e.section == *section_id && e.slot == slot)
            {
                continue;
            }

            let mut placed_here = 0usize;
            for member in members {
                let (subject, group_id) = match member {
                    ClassRequirement::Elective { subject, group_id } => (subject, group_id),
                    _ => continue,
                };
                let candidates = eligible_faculty(
                    self.model,
                    subject,
                    section_id,
                    &chromosome.assigned_faculty,
                    &chromosome.workload,
                );
                let placement = candidates.iter().find_map(|faculty| {
                    self.free_room_at(chromosome, section_id, member, slot)
                        .filter(|room| {
                            chromosome.is_conflict_free_ignoring_section(
                                self.model, section_id, faculty, room, slot,
                            )
                        })
                        .map(|room| (faculty.clone(), room))
                });

                match placement {
                    Some((faculty, room)) => {
                        chromosome.add(Entry {
                            section: section_id.clone(),
                            subject: subject.clone(),
                            faculty,
                            room,
                            slot,
                            kind: EntryKind::Elective,
                            lab_session: None,
                            is_continuation: false,
                            elective_group: Some(group_id.clone()),
                        });
                        placed_here += 1;
                    }
                    None => {
                        // Atomic discipline: roll back partial placements
                        for _ in 0..placed_here {
                            let idx = chromosome.entries.len() - 1;
                            chromosome.remove(idx);
                        }
                        continue 'slots;
                    }
                }
            }
            return true;
        }
        false
    }

    /// First room that suits the requirement and is free at the slot:
    /// the resolver's preferred room, then capacity-sufficient rooms, then
    /// anything at all
    fn free_room_at(
        &self,
        chromosome: &Chromosome,
        section_id: &SectionId,
        requirement: &ClassRequirement,
        slot: TimeSlot,
    ) -> Option<RoomId> {
        let free = |room: &RoomId| {
            self.model.is_room_available(room, slot)
                && !chromosome.is_occupied(super::OccKey::Room(room.clone()), slot)
        };

        if let Some(preferred) = room_for_requirement(self.model, section_id, requirement) {
            if free(&preferred) {
                return Some(preferred);
            }
        }
        let student_count = self
            .model
            .sections
            .get(section_id)
            .map(|s| s.student_count)
            .unwrap_or(0);
        if let Some((rid, _)) = self
            .model
            .rooms
            .iter()
            .find(|(rid, r)| r.capacity >= student_count && free(rid))
        {
            return Some(rid.clone());
        }
        self.model
            .rooms
            .keys()
            .find(|rid| free(rid))
            .cloned()
    }

    /// Lab placement: random day order, maximal consecutive non-break runs,
    /// shuffled windows of the session span, first conflict-free window wins
    fn place_lab_session<R: Rng>(
        &self,
        chromosome: &mut Chromosome,
        section_id: &SectionId,
        subject: &SubjectId,
        session_id: &str,
        span: usize,
        rng: &mut R,
    ) -> bool {
        let requirement = ClassRequirement::Lab {
            subject: subject.clone(),
            session_id: session_id.to_string(),
            span: span as u32,
        };
        let candidates = eligible_faculty(
            self.model,
            subject,
            section_id,
            &chromosome.assigned_faculty,
            &chromosome.workload,
        );
        let faculty = match candidates.first() {
            Some(f) => f.clone(),
            None => return false,
        };
        let room = match room_for_requirement(self.model, section_id, &requirement) {
            Some(r) => r,
            None => return false,
        };

        let mut days: Vec<u8> = (0..self.model.num_working_days()).collect();
        days.shuffle(rng);

        for day in days {
            let mut windows = self.consecutive_windows(day, span);
            windows.shuffle(rng);
            for window in windows {
                if chromosome.is_window_conflict_free(
                    self.model,
                    section_id,
                    &faculty,
                    &room,
                    day,
                    &window,
                ) {
                    for (offset, &period) in window.iter().enumerate() {
                        chromosome.add(Entry {
                            section: section_id.clone(),
                            subject: subject.clone(),
                            faculty: faculty.clone(),
                            room: room.clone(),
                            slot: TimeSlot::new(day, period),
                            kind: EntryKind::Lab,
                            lab_session: Some(session_id.to_string()),
                            is_continuation: offset > 0,
                            elective_group: None,
                        });
                    }
                    return true;
                }
            }
        }
        false
    }

    /// Windows of `span` strictly consecutive periods on a day, skipping
    /// break periods and elective slots
    fn consecutive_windows(&self, day: u8, span: usize) -> Vec<Vec<u8>> {
        let available: Vec<u8> = self
            .model
            .period_ids
            .iter()
            .copied()
            .filter(|&p| {
                !self.model.is_break(p) && !self.model.is_elective_slot(TimeSlot::new(day, p))
            })
            .collect();

        let mut windows = Vec::new();
        if span == 0 || available.len() < span {
            return windows;
        }
        for start in 0..=(available.len() - span) {
            let window = &available[start..start + span];
            if window.windows(2).all(|w| w[1] == w[0] + 1) {
                windows.push(window.to_vec());
            }
        }
        windows
    }

    /// Theory placement: bounded random slot draws over the legal
    /// non-elective grid
    fn place_theory<R: Rng>(
        &self,
        chromosome: &mut Chromosome,
        section_id: &SectionId,
        subject: &SubjectId,
        rng: &mut R,
    ) -> bool {
        let slots: Vec<TimeSlot> = self
            .model
            .legal_slots()
            .into_iter()
            .filter(|&s| !self.model.is_elective_slot(s))
            .collect();
        if slots.is_empty() {
            return false;
        }

        let requirement = ClassRequirement::Theory {
            subject: subject.clone(),
        };
        let candidates = eligible_faculty(
            self.model,
            subject,
            section_id,
            &chromosome.assigned_faculty,
            &chromosome.workload,
        );
        let faculty = match candidates.first() {
            Some(f) => f.clone(),
            None => return false,
        };
        let room = match room_for_requirement(self.model, section_id, &requirement) {
            Some(r) => r,
            None => return false,
        };

        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let slot = *slots.choose(rng).expect("non-empty slot list");
            if chromosome.is_conflict_free(self.model, section_id, &faculty, &room, slot) {
                chromosome.add(Entry {
                    section: section_id.clone(),
                    subject: subject.clone(),
                    faculty,
                    room,
                    slot,
                    kind: EntryKind::Theory,
                    lab_session: None,
                    is_continuation: false,
                    elective_group: None,
                });
                return true;
            }
        }
        false
    }

    /// Mutation. The lab-repair prelude always runs: any session whose
    /// entries no longer form a valid consecutive tuple is torn down and
    /// re-placed. The slot move itself fires with probability
    /// `mutation_rate` and never touches electives, continuations or pinned
    /// placements.
    pub fn mutate<R: Rng>(&self, chromosome: &mut Chromosome, rng: &mut R) {
        self.repair_labs(chromosome, rng);

        if rng.gen::<f64>() >= self.model.ga_params.mutation_rate {
            return;
        }

        let movable: Vec<usize> = chromosome
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                !e.is_continuation
                    && !e.is_elective()
                    && !self.model.is_fixed(&e.section, &e.subject, e.slot)
            })
            .map(|(idx, _)| idx)
            .collect();
        let Some(&index) = movable.choose(rng) else {
            return;
        };

        let slots: Vec<TimeSlot> = self
            .model
            .legal_slots()
            .into_iter()
            .filter(|&s| !self.model.is_elective_slot(s))
            .collect();
        if slots.is_empty() {
            return;
        }

        // Take the entry out so the probes do not see its own keys; it goes
        // back in either at the first workable target or at its old slot
        let mut entry = chromosome.remove(index);
        let cap = self.model.daily_cap(&entry.subject);

        for _ in 0..MUTATION_SLOT_ATTEMPTS {
            let target = *slots.choose(rng).expect("non-empty slot list");
            if target == entry.slot {
                continue;
            }
            let fits = chromosome.is_conflict_free(
                self.model,
                &entry.section,
                &entry.faculty,
                &entry.room,
                target,
            ) && chromosome.subject_count_on_day(&entry.section, &entry.subject, target.day)
                < cap;
            if fits {
                entry.slot = target;
                break;
            }
        }
        chromosome.add(entry);
    }

    fn repair_labs<R: Rng>(&self, chromosome: &mut Chromosome, rng: &mut R) {
        let sessions = chromosome
            .entries
            .iter()
            .filter(|e| e.lab_session.is_some())
            .into_group_map_by(|e| e.lab_session.clone().unwrap());

        let broken: Vec<String> = sessions
            .iter()
            .filter(|(_, entries)| !lab_session_is_valid(self.model, entries))
            .map(|(id, _)| id.clone())
            .sorted()
            .collect();

        for session_id in broken {
            let mut indices: Vec<usize> = chromosome
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.lab_session.as_deref() == Some(session_id.as_str()))
                .map(|(idx, _)| idx)
                .collect();
            let (section, subject) = {
                let first = &chromosome.entries[indices[0]];
                (first.section.clone(), first.subject.clone())
            };
            indices.reverse();
            for idx in indices {
                chromosome.remove(idx);
            }
            let span = self.model.consecutive_span(&subject) as usize;
            self.place_lab_session(chromosome, &section, &subject, &session_id, span, rng);
        }
    }

    /// Recombination: union of both parents' entries, shuffled, re-added
    /// one by one under the occupancy discipline. Elective entries must sit
    /// inside the elective slot set and regular entries outside it; a child
    /// that already bound a teacher to a (section, subject) pair remaps
    /// incoming entries to that teacher or drops them on clash; the
    /// per-subject-per-day cap holds throughout.
    pub fn crossover<R: Rng>(
        &self,
        parent_a: &Chromosome,
        parent_b: &Chromosome,
        rng: &mut R,
    ) -> Chromosome {
        let mut child = Chromosome::new();
        let mut combined: Vec<Entry> = parent_a
            .entries
            .iter()
            .chain(parent_b.entries.iter())
            .cloned()
            .collect();
        combined.shuffle(rng);

        for mut entry in combined {
            let in_elective_slot = self.model.is_elective_slot(entry.slot);
            if entry.is_elective() != in_elective_slot {
                continue;
            }

            if let Some(existing) = child
                .assigned_faculty
                .get(&(entry.section.clone(), entry.subject.clone()))
            {
                if *existing != entry.faculty {
                    entry.faculty = existing.clone();
                }
            }

            if !entry.is_continuation
                && child.subject_count_on_day(&entry.section, &entry.subject, entry.slot.day)
                    >= self.model.daily_cap(&entry.subject)
            {
                continue;
            }

            let fits = if entry.is_elective() {
                // Identical elective from the other parent: drop duplicates
                let duplicate = child.entries.iter().any(|e| {
                    e.section == entry.section && e.subject == entry.subject && e.slot == entry.slot
                });
                let foreign_occupant = child.entries.iter().any(|e| {
                    e.section == entry.section
                        && e.slot == entry.slot
                        && e.elective_group != entry.elective_group
                });
                !duplicate
                    && !foreign_occupant
                    && child.is_conflict_free_ignoring_section(
                        self.model,
                        &entry.section,
                        &entry.faculty,
                        &entry.room,
                        entry.slot,
                    )
            } else {
                child.is_conflict_free(
                    self.model,
                    &entry.section,
                    &entry.faculty,
                    &entry.room,
                    entry.slot,
                )
            };

            if fits {
                child.add(entry);
            }
        }

        child
    }
}
