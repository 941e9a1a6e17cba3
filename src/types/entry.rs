use serde::{Deserialize, Serialize};

use super::{FacultyId, RoomId, SectionId, SubjectId, TimeSlot};

/// What kind of class an entry represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Theory,
    Lab,
    Elective,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Theory => write!(f, "Theory"),
            EntryKind::Lab => write!(f, "Lab"),
            EntryKind::Elective => write!(f, "Elective"),
        }
    }
}

/// One atomic assignment: a section meeting a subject with a faculty member
/// in a room at a time slot. Entries are the sole mutable output artefact of
/// the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub section: SectionId,
    pub subject: SubjectId,
    pub faculty: FacultyId,
    pub room: RoomId,
    pub slot: TimeSlot,
    pub kind: EntryKind,
    /// Groups the N consecutive entries of one lab session
    #[serde(default)]
    pub lab_session: Option<String>,
    /// True for every lab entry after the lead period of its session
    #[serde(default)]
    pub is_continuation: bool,
    /// Shared by all elective entries of one section
    #[serde(default)]
    pub elective_group: Option<String>,
}

impl Entry {
    pub fn is_elective(&self) -> bool {
        self.kind == EntryKind::Elective
    }

    /// Sort/fingerprint key: position-independent identity of the assignment
    pub fn sort_key(&self) -> (SectionId, u8, u8, SubjectId) {
        (
            self.section.clone(),
            self.slot.day,
            self.slot.period,
            self.subject.clone(),
        )
    }
}
