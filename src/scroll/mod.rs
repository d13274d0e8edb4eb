//! The compiled performance.
//!
//! A [`Scroll`] is the ordered list of register states the organ steps
//! through, each with the delay to wait after the previous state. It is
//! produced once per MIDI file by [`compile`] and consumed by the player.
//! Scrolls can be saved and reloaded so a piece is compiled once and played
//! many times.

mod compile;
mod keyframe;
pub mod registers;

pub use compile::{compile, compile_file, CompileReport, Compiled, Diagnostic};
pub use keyframe::{Keyframe, KeyframeAssembler};
pub use registers::{Registers, ALL_OFF, REGISTER_COUNT};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// File extension selecting the binary scroll format.
pub const BINARY_EXTENSION: &str = "scroll";

/// One register state and how long to wait before asserting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Microseconds after the previous frame (or after start, for the first).
    pub delay_us: u64,
    /// Register bytes in transfer order.
    pub registers: Registers,
}

/// Ordered frames in playback order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scroll {
    frames: Vec<Frame>,
}

impl Scroll {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Time from the start until the last frame is asserted.
    pub fn total_duration_us(&self) -> u64 {
        self.frames
            .iter()
            .fold(0u64, |total, frame| total.saturating_add(frame.delay_us))
    }

    /// Running sums of the delays: the absolute time of every frame.
    pub fn absolute_times(&self) -> Vec<u64> {
        self.frames
            .iter()
            .scan(0u64, |total, frame| {
                *total = total.saturating_add(frame.delay_us);
                Some(*total)
            })
            .collect()
    }

    /// Serializes the scroll to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Saves the scroll to a JSON file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }

    /// Loads a scroll from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Saves the scroll in the compact binary format.
    pub fn save_to_binary<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let data = bincode::serialize(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, data)
    }

    /// Loads a scroll from the compact binary format.
    pub fn load_from_binary<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let data = fs::read(path)?;
        bincode::deserialize(&data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Saves as binary for `.scroll` paths and as JSON otherwise.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        if is_binary_path(path.as_ref()) {
            self.save_to_binary(path)
        } else {
            self.save_to_file(path)
        }
    }

    /// Loads from binary for `.scroll` paths and from JSON otherwise.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        if is_binary_path(path.as_ref()) {
            Self::load_from_binary(path)
        } else {
            Self::load_from_file(path)
        }
    }
}

impl IntoIterator for Scroll {
    type Item = Frame;
    type IntoIter = std::vec::IntoIter<Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

impl<'a> IntoIterator for &'a Scroll {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

fn is_binary_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(BINARY_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Scroll {
        Scroll::new(vec![
            Frame {
                delay_us: 0,
                registers: [0, 0, 0, 0, 0x10, 0, 0, 0],
            },
            Frame {
                delay_us: 50_000,
                registers: [1, 0, 0, 0, 0x10, 0, 0, 0x80],
            },
            Frame {
                delay_us: 25_000,
                registers: ALL_OFF,
            },
        ])
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("organroll-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_absolute_times_and_duration() {
        let scroll = sample();
        assert_eq!(scroll.absolute_times(), vec![0, 50_000, 75_000]);
        assert_eq!(scroll.total_duration_us(), 75_000);
        assert_eq!(Scroll::default().total_duration_us(), 0);
    }

    #[test]
    fn test_json_file_persistence() {
        let path = temp_path("sample.json");
        sample().save(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"delay_us\": 50000"));
        assert_eq!(Scroll::load(&path).unwrap(), sample());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_binary_file_persistence() {
        let path = temp_path("sample.scroll");
        sample().save(&path).unwrap();
        assert!(serde_json::from_slice::<Scroll>(&fs::read(&path).unwrap()).is_err());
        assert_eq!(Scroll::load(&path).unwrap(), sample());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_bad_json_is_invalid_data() {
        let path = temp_path("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let err = Scroll::load(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        let _ = fs::remove_file(path);
    }
}
