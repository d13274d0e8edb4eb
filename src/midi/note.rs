//! Pitch to solenoid mapping.
//!
//! The organ has [`NOTE_COUNT`] pipes. Pipe 0 sounds MIDI pitch
//! [`FIRST_PITCH`]; pitches outside the playable range are moved by whole
//! octaves until they land on a pipe.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of solenoid-driven pipes, and so the number of register bits.
pub const NOTE_COUNT: u8 = 64;

/// MIDI pitch of the lowest pipe.
pub const FIRST_PITCH: u8 = 24;

const OCTAVE: i16 = 12;

/// Index of a pipe in `[0, NOTE_COUNT)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteId(u8);

impl NoteId {
    /// Wraps a raw pipe index, or `None` if it is out of range.
    pub fn new(id: u8) -> Option<Self> {
        (id < NOTE_COUNT).then_some(Self(id))
    }

    /// Returns the raw pipe index.
    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// Register holding this pipe's bit.
    pub fn register(self) -> usize {
        (self.0 / 8) as usize
    }

    /// Bit position within [`NoteId::register`].
    pub fn bit(self) -> u8 {
        self.0 % 8
    }

    /// Maps a MIDI pitch onto a pipe, transposing by octaves if needed.
    ///
    /// # Examples
    ///
    /// ```
    /// use organroll::midi::NoteId;
    ///
    /// let mapping = NoteId::from_pitch(10);
    /// assert_eq!(mapping.id.as_u8(), 10);
    /// assert_eq!(mapping.octaves, 2);
    /// ```
    pub fn from_pitch(pitch: u8) -> NoteMapping {
        let mut id = pitch as i16 - FIRST_PITCH as i16;
        let mut octaves: i8 = 0;
        while id < 0 {
            id += OCTAVE;
            octaves += 1;
        }
        while id >= NOTE_COUNT as i16 {
            id -= OCTAVE;
            octaves -= 1;
        }
        NoteMapping {
            id: NoteId(id as u8),
            octaves,
        }
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of mapping a pitch onto the pipe range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteMapping {
    /// The pipe that will sound.
    pub id: NoteId,
    /// Octaves the pitch was moved by. Positive is up, zero means the pitch
    /// was already playable.
    pub octaves: i8,
}

impl NoteMapping {
    /// Whether the pitch had to be moved.
    pub fn is_transposed(&self) -> bool {
        self.octaves != 0
    }
}
