//! Counted set of currently sounding pipes.

use super::note::{NoteId, NOTE_COUNT};
use std::collections::BTreeSet;

/// Outcome of releasing a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteOffResult {
    /// One occurrence was released; `remaining` are still held.
    Released { remaining: u32 },
    /// The note was not sounding. Nothing changed.
    Dangling,
}

/// Multiset of active [`NoteId`]s.
///
/// A pipe triggered twice must be released twice before it stops, so that
/// a re-strike while still sounding is not cut short by the first note-off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveNoteMultiset {
    counts: [u32; NOTE_COUNT as usize],
}

impl Default for ActiveNoteMultiset {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveNoteMultiset {
    pub fn new() -> Self {
        Self {
            counts: [0; NOTE_COUNT as usize],
        }
    }

    /// Adds one occurrence of `id`.
    pub fn note_on(&mut self, id: NoteId) {
        let count = &mut self.counts[id.as_u8() as usize];
        *count = count.saturating_add(1);
    }

    /// Removes one occurrence of `id`, reporting a dangling note-off if
    /// none was held.
    pub fn note_off(&mut self, id: NoteId) -> NoteOffResult {
        let count = &mut self.counts[id.as_u8() as usize];
        if *count == 0 {
            NoteOffResult::Dangling
        } else {
            *count -= 1;
            NoteOffResult::Released { remaining: *count }
        }
    }

    /// Number of held occurrences of `id`.
    pub fn count(&self, id: NoteId) -> u32 {
        self.counts[id.as_u8() as usize]
    }

    pub fn is_active(&self, id: NoteId) -> bool {
        self.count(id) > 0
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    /// Distinct sounding pipes, duplicates collapsed.
    pub fn distinct(&self) -> BTreeSet<NoteId> {
        self.counts
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count > 0)
            .filter_map(|(id, _)| NoteId::new(id as u8))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> NoteId {
        NoteId::new(n).unwrap()
    }

    #[test]
    fn test_duplicate_note_on_needs_two_note_offs() {
        let mut active = ActiveNoteMultiset::new();
        active.note_on(id(36));
        active.note_on(id(36));

        assert_eq!(
            active.note_off(id(36)),
            NoteOffResult::Released { remaining: 1 }
        );
        assert!(active.is_active(id(36)));
        assert_eq!(active.distinct().len(), 1);

        assert_eq!(
            active.note_off(id(36)),
            NoteOffResult::Released { remaining: 0 }
        );
        assert!(!active.is_active(id(36)));
        assert!(active.is_empty());
    }

    #[test]
    fn test_note_off_without_note_on_is_dangling() {
        let mut active = ActiveNoteMultiset::new();
        assert_eq!(active.note_off(id(5)), NoteOffResult::Dangling);
        assert_eq!(active.count(id(5)), 0);

        // Count never goes negative: a later note-on still sounds
        active.note_on(id(5));
        assert!(active.is_active(id(5)));
    }

    #[test]
    fn test_distinct_is_sorted_and_collapsed() {
        let mut active = ActiveNoteMultiset::new();
        for n in [40, 3, 40, 63, 0] {
            active.note_on(id(n));
        }
        let ids: Vec<u8> = active.distinct().into_iter().map(NoteId::as_u8).collect();
        assert_eq!(ids, vec![0, 3, 40, 63]);
    }
}
