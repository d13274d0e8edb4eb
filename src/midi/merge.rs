//! Merges per-track event lists into one chronological stream.

use super::RawEvent;

/// Flattens all tracks into a single stream ordered by absolute tick.
///
/// Ties keep track order first, then emission order within the track, so a
/// tempo change in the conductor track takes effect before notes on the
/// same tick.
pub fn merge_tracks(tracks: &[Vec<RawEvent>]) -> Vec<RawEvent> {
    let mut merged: Vec<RawEvent> = tracks.iter().flatten().cloned().collect();
    // sort_by_key is stable
    merged.sort_by_key(|event| event.absolute_tick);
    merged
}
