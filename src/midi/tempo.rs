//! Tick to microsecond conversion under a changing tempo.

/// Tempo in effect until the first tempo change of a file.
pub const DEFAULT_MICROS_PER_BEAT: u32 = 50_000;

/// Running absolute clock for one compile pass.
///
/// The clock only moves on note events. Each call to
/// [`TempoClock::advance_to`] converts the whole tick span since the
/// previous note at the tempo in effect now; [`TempoClock::set_tempo`]
/// changes that tempo without moving the clock.
#[derive(Debug, Clone)]
pub struct TempoClock {
    micros_per_beat: u32,
    ticks_per_beat: u32,
    last_tick: u64,
    now_us: u64,
}

impl TempoClock {
    /// Creates a clock at tick 0 with the default tempo.
    ///
    /// `ticks_per_beat` must be non-zero; the importer rejects files where
    /// it is not.
    pub fn new(ticks_per_beat: u32) -> Self {
        debug_assert!(ticks_per_beat > 0);
        Self {
            micros_per_beat: DEFAULT_MICROS_PER_BEAT,
            ticks_per_beat,
            last_tick: 0,
            now_us: 0,
        }
    }

    /// Decodes a 3-byte big-endian tempo payload.
    pub fn decode_tempo(payload: &[u8]) -> Option<u32> {
        match payload {
            [hi, mid, lo] => Some(u32::from_be_bytes([0, *hi, *mid, *lo])),
            _ => None,
        }
    }

    /// Moves the clock forward to the note at `tick` and returns its
    /// absolute time.
    ///
    /// Ticks behind the current position add no time.
    pub fn advance_to(&mut self, tick: u64) -> u64 {
        let delta_ticks = tick.saturating_sub(self.last_tick);
        self.now_us = self.now_us.saturating_add(self.ticks_to_micros(delta_ticks));
        self.last_tick = self.last_tick.max(tick);
        self.now_us
    }

    /// Switches to a new tempo. The span up to the next note is measured at
    /// this tempo.
    pub fn set_tempo(&mut self, micros_per_beat: u32) {
        self.micros_per_beat = micros_per_beat;
    }

    /// Converts a tick span at the current tempo. Multiplies before dividing
    /// so whole beats convert exactly.
    pub fn ticks_to_micros(&self, ticks: u64) -> u64 {
        let micros =
            ticks as u128 * self.micros_per_beat as u128 / self.ticks_per_beat as u128;
        micros.min(u64::MAX as u128) as u64
    }

    pub fn micros_per_beat(&self) -> u32 {
        self.micros_per_beat
    }

    /// Whole microseconds per tick at the current tempo.
    pub fn micros_per_tick(&self) -> u32 {
        self.micros_per_beat / self.ticks_per_beat
    }

    /// Beats per minute at the current tempo.
    pub fn bpm(&self) -> f64 {
        60_000_000.0 / self.micros_per_beat.max(1) as f64
    }

    /// Absolute time of the last note.
    pub fn now_us(&self) -> u64 {
        self.now_us
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_tempo() {
        assert_eq!(TempoClock::decode_tempo(&[0x07, 0xA1, 0x20]), Some(500_000));
        assert_eq!(TempoClock::decode_tempo(&[0, 0, 1]), Some(1));
        assert_eq!(TempoClock::decode_tempo(&[1, 2]), None);
        assert_eq!(TempoClock::decode_tempo(&[1, 2, 3, 4]), None);
    }

    #[test]
    fn test_default_tempo() {
        let mut clock = TempoClock::new(480);
        assert_eq!(clock.micros_per_beat(), DEFAULT_MICROS_PER_BEAT);
        assert_eq!(clock.micros_per_tick(), 104);
        assert_eq!(clock.advance_to(480), 50_000);
    }

    #[test]
    fn test_one_beat_at_120_bpm() {
        let mut clock = TempoClock::new(480);
        clock.set_tempo(500_000);
        assert!((clock.bpm() - 120.0).abs() < 1e-9);
        assert_eq!(clock.advance_to(480), 500_000);
    }

    #[test]
    fn test_set_tempo_does_not_move_the_clock() {
        let mut clock = TempoClock::new(480);
        assert_eq!(clock.advance_to(0), 0);
        clock.set_tempo(250_000);
        assert_eq!(clock.now_us(), 0);
    }

    #[test]
    fn test_tempo_change_covers_whole_span_since_last_note() {
        let mut clock = TempoClock::new(480);
        clock.set_tempo(500_000);
        assert_eq!(clock.advance_to(0), 0);

        // Changed halfway to the next note, still applies to the full beat
        clock.set_tempo(250_000);
        assert_eq!(clock.advance_to(480), 250_000);

        // Earlier notes keep their times
        clock.set_tempo(1_000_000);
        assert_eq!(clock.advance_to(960), 1_250_000);
    }

    #[test]
    fn test_advance_never_goes_backwards() {
        let mut clock = TempoClock::new(96);
        assert_eq!(clock.advance_to(96), 50_000);
        assert_eq!(clock.advance_to(48), 50_000);
        assert_eq!(clock.advance_to(96), 50_000);
    }
}
