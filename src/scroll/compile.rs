//! The compile pass: parsed MIDI in, playable [`Scroll`] out.
//!
//! Tempo and note events are handled in one ordered walk over the merged
//! stream, so each note is timed with the tempo in force when it occurs.

use super::keyframe::{Keyframe, KeyframeAssembler};
use super::registers;
use super::{Frame, Scroll};
use crate::error::CompileError;
use crate::midi::{
    import_tracks, merge_tracks, note_to_name, ActiveNoteMultiset, EventKind, NoteId,
    NoteOffResult, ParsedMidi, RawEvent, TempoClock,
};
use std::path::Path;
use tracing::{debug, info, warn};

/// Something worth telling the user about that did not stop the compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    /// A pitch outside the pipe range was moved by whole octaves.
    Transposed {
        pitch: u8,
        note_id: NoteId,
        octaves: i8,
        time_us: u64,
    },
    /// A note-off arrived for a pipe that was not sounding.
    DanglingNoteOff { note_id: NoteId, time_us: u64 },
}

/// Statistics and diagnostics from one compile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileReport {
    pub events_merged: usize,
    pub note_events: usize,
    pub tempo_changes: usize,
    pub keyframes: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileReport {
    pub fn transpositions(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::Transposed { .. }))
            .count()
    }

    pub fn dangling_note_offs(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::DanglingNoteOff { .. }))
            .count()
    }
}

/// A compiled piece ready for playback.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub scroll: Scroll,
    pub report: CompileReport,
}

/// Reads and compiles a MIDI file.
pub fn compile_file<P: AsRef<Path>>(path: P) -> Result<Compiled, CompileError> {
    let parsed = import_tracks(path.as_ref())?;
    info!(
        path = %path.as_ref().display(),
        tracks = parsed.tracks.len(),
        ticks_per_beat = parsed.ticks_per_beat,
        "Imported MIDI file"
    );
    compile(&parsed)
}

/// Compiles parsed MIDI into a scroll.
///
/// # Errors
///
/// Fails on a zero resolution or on a tempo/note event whose payload has the
/// wrong shape. Nothing is played from a file that fails here.
pub fn compile(parsed: &ParsedMidi) -> Result<Compiled, CompileError> {
    if parsed.ticks_per_beat == 0 {
        return Err(CompileError::ZeroTicksPerBeat);
    }
    if parsed.tracks.is_empty() {
        return Err(CompileError::NoTracks);
    }

    let merged = merge_tracks(&parsed.tracks);
    let mut report = CompileReport {
        events_merged: merged.len(),
        ..CompileReport::default()
    };

    let keyframes = annotate(&merged, parsed.ticks_per_beat, &mut report)?;
    report.keyframes = keyframes.len();
    let scroll = build_scroll(&keyframes);

    info!(
        frames = scroll.len(),
        duration_us = scroll.total_duration_us(),
        transpositions = report.transpositions(),
        dangling_note_offs = report.dangling_note_offs(),
        "Compiled scroll"
    );

    Ok(Compiled { scroll, report })
}

/// Single pass over the merged stream: keeps the clock and the active set
/// and snapshots the set after every note event.
fn annotate(
    merged: &[RawEvent],
    ticks_per_beat: u32,
    report: &mut CompileReport,
) -> Result<Vec<Keyframe>, CompileError> {
    let mut clock = TempoClock::new(ticks_per_beat);
    let mut active = ActiveNoteMultiset::new();
    let mut assembler = KeyframeAssembler::new();

    for event in merged {
        match event.kind {
            EventKind::TempoChange => {
                let micros_per_beat = TempoClock::decode_tempo(&event.payload).ok_or(
                    CompileError::MalformedEvent {
                        tick: event.absolute_tick,
                        kind: event.kind,
                        reason: "tempo payload must be 3 bytes",
                    },
                )?;
                clock.set_tempo(micros_per_beat);
                report.tempo_changes += 1;
                debug!(
                    tick = event.absolute_tick,
                    micros_per_beat,
                    bpm = clock.bpm(),
                    "Tempo change"
                );
            }
            EventKind::NoteEvent => {
                let (pitch, velocity) = match event.payload.as_slice() {
                    [pitch, velocity, ..] => (*pitch, *velocity),
                    _ => {
                        return Err(CompileError::MalformedEvent {
                            tick: event.absolute_tick,
                            kind: event.kind,
                            reason: "note payload needs pitch and velocity",
                        })
                    }
                };
                let time_us = clock.advance_to(event.absolute_tick);
                report.note_events += 1;

                let mapping = NoteId::from_pitch(pitch);
                if mapping.is_transposed() {
                    warn!(
                        pitch,
                        name = %note_to_name(pitch),
                        note_id = mapping.id.as_u8(),
                        octaves = mapping.octaves,
                        time_us,
                        "Note transposed by {} octaves",
                        mapping.octaves
                    );
                    report.diagnostics.push(Diagnostic::Transposed {
                        pitch,
                        note_id: mapping.id,
                        octaves: mapping.octaves,
                        time_us,
                    });
                }

                match velocity {
                    1..=127 => active.note_on(mapping.id),
                    0 => {
                        if active.note_off(mapping.id) == NoteOffResult::Dangling {
                            warn!(
                                note_id = mapping.id.as_u8(),
                                time_us, "Note-off for a note that is not sounding"
                            );
                            report.diagnostics.push(Diagnostic::DanglingNoteOff {
                                note_id: mapping.id,
                                time_us,
                            });
                        }
                    }
                    _ => {}
                }

                assembler.record(time_us, active.distinct());
            }
            EventKind::Other => {}
        }
    }

    Ok(assembler.finish())
}

/// Encodes keyframes and converts their absolute times into delays from
/// the previous frame.
fn build_scroll(keyframes: &[Keyframe]) -> Scroll {
    let mut running_us = 0u64;
    let frames = keyframes
        .iter()
        .map(|keyframe| {
            let delay_us = keyframe.time_us - running_us;
            running_us = keyframe.time_us;
            Frame {
                delay_us,
                registers: registers::encode(&keyframe.active),
            }
        })
        .collect();
    Scroll::new(frames)
}
