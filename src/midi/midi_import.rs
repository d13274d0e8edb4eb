//! Standard MIDI File (SMF) import.
//!
//! Reads .mid and .midi files into per-track lists of [`RawEvent`]s on an
//! absolute tick axis. Supports SMF Format 0 (single track) and Format 1
//! (multi-track) files.
//!
//! # Limitations
//!
//! - Only tempo changes and note on/off messages are given a meaning;
//!   every other event is imported as [`EventKind::Other`]
//! - SMPTE timecode timing is rejected
//! - Format 2 (sequential) files are rejected

use super::{EventKind, RawEvent};
use crate::error::CompileError;
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::fs;
use std::path::Path;

/// Parser output: the file's resolution plus one event list per track,
/// each in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMidi {
    /// Ticks per beat (quarter note) from the file header.
    pub ticks_per_beat: u32,
    /// Per-track events with absolute tick positions.
    pub tracks: Vec<Vec<RawEvent>>,
}

impl ParsedMidi {
    /// Total number of events across all tracks.
    pub fn event_count(&self) -> usize {
        self.tracks.iter().map(Vec::len).sum()
    }
}

/// Imports a MIDI file from disk.
///
/// # Errors
///
/// Returns error if the file cannot be read or is not a supported SMF.
pub fn import_tracks<P: AsRef<Path>>(path: P) -> Result<ParsedMidi, CompileError> {
    let data = fs::read(path.as_ref())?;
    parse_bytes(&data)
}

/// Parses an in-memory Standard MIDI File.
pub fn parse_bytes(data: &[u8]) -> Result<ParsedMidi, CompileError> {
    let smf = Smf::parse(data).map_err(|e| CompileError::Parse(e.to_string()))?;

    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int() as u32,
        Timing::Timecode(_, _) => {
            return Err(CompileError::UnsupportedFormat(
                "SMPTE timecode timing not supported".to_string(),
            ))
        }
    };
    if ticks_per_beat == 0 {
        return Err(CompileError::ZeroTicksPerBeat);
    }

    if smf.header.format == Format::Sequential {
        return Err(CompileError::UnsupportedFormat(
            "Format 2 (sequential) MIDI files not supported".to_string(),
        ));
    }

    if smf.tracks.is_empty() {
        return Err(CompileError::NoTracks);
    }

    let tracks = smf.tracks.iter().map(|track| convert_track(track)).collect();

    Ok(ParsedMidi {
        ticks_per_beat,
        tracks,
    })
}

/// Converts one midly track to absolute-tick raw events.
fn convert_track(track: &[midly::TrackEvent]) -> Vec<RawEvent> {
    let mut current_tick: u64 = 0;
    let mut events = Vec::with_capacity(track.len());

    for event in track {
        current_tick += event.delta.as_int() as u64;

        let raw = match event.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                RawEvent::tempo(current_tick, tempo.as_int())
            }
            TrackEventKind::Midi { message, .. } => match message {
                MidiMessage::NoteOn { key, vel } => {
                    RawEvent::note(current_tick, key.as_int(), vel.as_int())
                }
                // A note-off message is a zero-velocity note event
                MidiMessage::NoteOff { key, .. } => RawEvent::note(current_tick, key.as_int(), 0),
                _ => RawEvent::other(current_tick, midi_data(message)),
            },
            TrackEventKind::SysEx(data) | TrackEventKind::Escape(data) => {
                RawEvent::other(current_tick, data.to_vec())
            }
            TrackEventKind::Meta(meta) => RawEvent::other(current_tick, meta_data(&meta)),
        };
        events.push(raw);
    }

    events
}

/// Data bytes of a channel message, without the status byte.
fn midi_data(message: MidiMessage) -> Vec<u8> {
    match message {
        MidiMessage::NoteOff { key, vel }
        | MidiMessage::NoteOn { key, vel }
        | MidiMessage::Aftertouch { key, vel } => vec![key.as_int(), vel.as_int()],
        MidiMessage::Controller { controller, value } => {
            vec![controller.as_int(), value.as_int()]
        }
        MidiMessage::ProgramChange { program } => vec![program.as_int()],
        MidiMessage::ChannelAftertouch { vel } => vec![vel.as_int()],
        MidiMessage::PitchBend { bend } => {
            let raw = bend.0.as_int();
            vec![(raw & 0x7F) as u8, (raw >> 7) as u8]
        }
    }
}

/// Body of a meta event as stored in the file, without type and length.
///
/// SMPTE offsets come back empty; midly only exposes them decoded.
fn meta_data(meta: &MetaMessage) -> Vec<u8> {
    match *meta {
        MetaMessage::TrackNumber(Some(number)) => number.to_be_bytes().to_vec(),
        MetaMessage::Text(data)
        | MetaMessage::Copyright(data)
        | MetaMessage::TrackName(data)
        | MetaMessage::InstrumentName(data)
        | MetaMessage::Lyric(data)
        | MetaMessage::Marker(data)
        | MetaMessage::CuePoint(data)
        | MetaMessage::ProgramName(data)
        | MetaMessage::DeviceName(data)
        | MetaMessage::SequencerSpecific(data)
        | MetaMessage::Unknown(_, data) => data.to_vec(),
        MetaMessage::MidiChannel(channel) => vec![channel.as_int()],
        MetaMessage::MidiPort(port) => vec![port.as_int()],
        MetaMessage::Tempo(tempo) => tempo.as_int().to_be_bytes()[1..].to_vec(),
        MetaMessage::TimeSignature(numerator, denominator, clocks, notated) => {
            vec![numerator, denominator, clocks, notated]
        }
        MetaMessage::KeySignature(sharps, minor) => vec![sharps as u8, minor as u8],
        MetaMessage::TrackNumber(None)
        | MetaMessage::EndOfTrack
        | MetaMessage::SmpteOffset(_) => Vec::new(),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{smf_bytes, Ev};
    use super::*;

    #[test]
    fn test_absolute_ticks_accumulate_per_track() {
        let data = smf_bytes(
            480,
            &[
                vec![Ev::Tempo(0, 500_000)],
                vec![Ev::On(0, 60, 100), Ev::Off(480, 60), Ev::On(240, 62, 90)],
            ],
        );
        let parsed = parse_bytes(&data).unwrap();

        assert_eq!(parsed.ticks_per_beat, 480);
        assert_eq!(parsed.tracks.len(), 2);

        let notes: Vec<(u64, Vec<u8>)> = parsed.tracks[1]
            .iter()
            .filter(|e| e.kind == EventKind::NoteEvent)
            .map(|e| (e.absolute_tick, e.payload.clone()))
            .collect();
        assert_eq!(
            notes,
            vec![(0, vec![60, 100]), (480, vec![60, 0]), (720, vec![62, 90])]
        );
    }

    #[test]
    fn test_tempo_meta_becomes_tempo_change() {
        let data = smf_bytes(96, &[vec![Ev::Tempo(0, 0x0A_0B_0C)]]);
        let parsed = parse_bytes(&data).unwrap();
        let tempo = &parsed.tracks[0][0];
        assert_eq!(tempo.kind, EventKind::TempoChange);
        assert_eq!(tempo.payload, vec![0x0A, 0x0B, 0x0C]);
    }

    #[test]
    fn test_end_of_track_is_other() {
        let data = smf_bytes(96, &[vec![Ev::On(0, 60, 1)]]);
        let parsed = parse_bytes(&data).unwrap();
        assert_eq!(parsed.tracks[0].last().unwrap().kind, EventKind::Other);
        assert_eq!(parsed.event_count(), 2);
    }

    #[test]
    fn test_other_events_keep_their_data_bytes() {
        let data = smf_bytes(
            96,
            &[vec![Ev::Name(0, b"Pedal"), Ev::Controller(10, 64, 127)]],
        );
        let parsed = parse_bytes(&data).unwrap();
        let others: Vec<(u64, Vec<u8>)> = parsed.tracks[0]
            .iter()
            .filter(|e| e.kind == EventKind::Other)
            .map(|e| (e.absolute_tick, e.payload.clone()))
            .collect();
        assert_eq!(
            others,
            vec![(0, b"Pedal".to_vec()), (10, vec![64, 127]), (10, Vec::new())]
        );
    }

    #[test]
    fn test_zero_ticks_per_beat_rejected() {
        let data = smf_bytes(0, &[vec![Ev::On(0, 60, 1)]]);
        assert!(matches!(
            parse_bytes(&data),
            Err(CompileError::ZeroTicksPerBeat)
        ));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert!(matches!(
            parse_bytes(b"definitely not a midi file"),
            Err(CompileError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            import_tracks("/nonexistent/organroll/test.mid"),
            Err(CompileError::Io(_))
        ));
    }
}
