// Genre reconciliation - decides whether and how an item's genres change
//
// Pure decision logic, no I/O. The mutation applier acts on the returned
// Decision without recomputing anything.

use std::fmt;

use crate::models::{GenreSet, SyncMode};

/// Why an item is left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoCandidateGenres,
    AlreadyHasGenres,
    AlreadyUpToDate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoCandidateGenres => write!(f, "no candidate genres"),
            SkipReason::AlreadyHasGenres => write!(f, "already has genres"),
            SkipReason::AlreadyUpToDate => write!(f, "already up to date"),
        }
    }
}

/// Outcome of reconciling an item's genres against the catalog's
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Skip(SkipReason),
    /// Add these genres to an item that has none
    Add(GenreSet),
    /// Clear the item's genres, then add these
    Replace(GenreSet),
}

impl Decision {
    pub fn is_skip(&self) -> bool {
        matches!(self, Decision::Skip(_))
    }
}

/// Decide what to do with an item.
///
/// | mode     | existing | candidate | sets equal | decision                  |
/// |----------|----------|-----------|------------|---------------------------|
/// | Update   | empty    | empty     |            | Skip(no candidate genres) |
/// | Update   | empty    | non-empty |            | Add(candidate)            |
/// | Update   | non-empty| any       |            | Skip(already has genres)  |
/// | FullSync | any      | empty     |            | Skip(no candidate genres) |
/// | FullSync | any      | non-empty | yes        | Skip(already up to date)  |
/// | FullSync | any      | non-empty | no         | Replace(candidate)        |
pub fn decide(existing: &GenreSet, candidate: &GenreSet, mode: SyncMode) -> Decision {
    match mode {
        SyncMode::Update => {
            if !existing.is_empty() {
                Decision::Skip(SkipReason::AlreadyHasGenres)
            } else if candidate.is_empty() {
                Decision::Skip(SkipReason::NoCandidateGenres)
            } else {
                Decision::Add(candidate.clone())
            }
        }
        SyncMode::FullSync => {
            if candidate.is_empty() {
                Decision::Skip(SkipReason::NoCandidateGenres)
            } else if existing == candidate {
                Decision::Skip(SkipReason::AlreadyUpToDate)
            } else {
                Decision::Replace(candidate.clone())
            }
        }
    }
}

/// Whether the catalog could change the decision for this item at all.
///
/// In update mode a tagged item is skipped whatever the catalog says, so the
/// lookup can be avoided entirely.
pub fn needs_candidate(existing: &GenreSet, mode: SyncMode) -> bool {
    match mode {
        SyncMode::Update => existing.is_empty(),
        SyncMode::FullSync => true,
    }
}
