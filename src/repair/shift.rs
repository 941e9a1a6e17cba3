use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::model::ScheduleModel;
use crate::solver::{Chromosome, OccKey};
use crate::types::{SectionId, TimeSlot};

/// One local repair move: an affected entry relocated to a same-day period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftRecord {
    pub section: SectionId,
    pub day: u8,
    pub orig_period: u8,
    pub new_period: u8,
}

/// Deterministic local repair: move each target entry to the first same-day
/// period (ascending period id) that is outside the forbidden set, permitted
/// by every availability mask, and unoccupied by the entry's faculty,
/// section and room. Targets that cannot move are left in place; the caller
/// hands them to the search phase instead.
pub fn deterministic_shift(
    model: &ScheduleModel,
    chromosome: &mut Chromosome,
    targets: &[(SectionId, TimeSlot)],
    forbidden_periods: &HashSet<u8>,
) -> Vec<ShiftRecord> {
    let mut shifted = Vec::new();

    for (section, slot) in targets {
        let Some(index) = chromosome
            .entries
            .iter()
            .position(|e| e.section == *section && e.slot == *slot)
        else {
            continue;
        };

        let (faculty, room, day, orig_period) = {
            let entry = &chromosome.entries[index];
            (
                entry.faculty.clone(),
                entry.room.clone(),
                entry.slot.day,
                entry.slot.period,
            )
        };

        let new_period = model.period_ids.iter().copied().find(|&p| {
            if p == orig_period || forbidden_periods.contains(&p) || model.is_break(p) {
                return false;
            }
            let candidate = TimeSlot::new(day, p);
            if model.is_elective_slot(candidate) {
                return false;
            }
            if !model.is_faculty_available(&faculty, candidate)
                || !model.is_room_available(&room, candidate)
                || !model.is_section_available(section, candidate)
            {
                return false;
            }
            !chromosome.is_occupied(OccKey::Faculty(faculty.clone()), candidate)
                && !chromosome.is_occupied(OccKey::Section(section.clone()), candidate)
                && !chromosome.is_occupied(OccKey::Room(room.clone()), candidate)
        });

        if let Some(period) = new_period {
            let mut entry = chromosome.remove(index);
            entry.slot = TimeSlot::new(day, period);
            chromosome.add(entry);
            shifted.push(ShiftRecord {
                section: section.clone(),
                day,
                orig_period,
                new_period: period,
            });
        }
    }

    shifted
}
