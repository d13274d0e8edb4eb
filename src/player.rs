//! Real-time playback of a compiled scroll.
//!
//! The player owns the bus for the whole performance and steps through the
//! scroll strictly in order: sleep for the frame's delay, then transfer its
//! registers. Delays are relative to the previous frame and sleep overshoot
//! is not compensated, so small drift can accumulate over a long piece.
//!
//! # States
//!
//! `Idle -> Opened -> Playing -> Closed`. A player plays once; a second
//! call to [`Player::play`] is rejected.

use crate::bus::{Bus, BusError, BusHandle, DryRunBus, SpiBus};
use crate::config::PlayerConfig;
use crate::scroll::registers::to_bit_string;
use crate::scroll::{Scroll, ALL_OFF};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Lifecycle of a [`Player`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Created, bus not yet opened.
    Idle,
    /// Bus open and configured.
    Opened,
    /// Stepping through frames.
    Playing,
    /// Bus released. Terminal.
    Closed,
}

/// How a performance ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Every frame was sent.
    Completed,
    /// A [`StopHandle`] ended playback early.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSummary {
    /// Scroll frames transferred, not counting the closing reset frame.
    pub frames_sent: usize,
    pub outcome: PlaybackOutcome,
    /// Wall-clock time from first delay to last transfer.
    pub elapsed: Duration,
}

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("could not open bus: {0}")]
    Open(#[source] BusError),

    #[error("transfer of frame {frame} failed: {source}")]
    Transfer {
        frame: usize,
        #[source]
        source: BusError,
    },

    #[error("player cannot play from state {0:?}")]
    NotIdle(PlayerState),
}

/// Blocks the calling thread between frames.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Wall-clock sleep.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Requests an early end to playback from another thread.
///
/// The player polls it between frames only, so a transfer in progress is
/// always completed.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Plays scrolls on a bus.
pub struct Player<B: Bus, S: Sleeper = ThreadSleeper> {
    bus: B,
    config: PlayerConfig,
    sleeper: S,
    stop: StopHandle,
    state: PlayerState,
}

impl<B: Bus> Player<B, ThreadSleeper> {
    pub fn new(bus: B, config: PlayerConfig) -> Self {
        Self {
            bus,
            config,
            sleeper: ThreadSleeper,
            stop: StopHandle::new(),
            state: PlayerState::Idle,
        }
    }
}

impl<B: Bus, S: Sleeper> Player<B, S> {
    /// Replaces the sleeper, e.g. with a recording one in tests.
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> Player<B, S2> {
        Player {
            bus: self.bus,
            config: self.config,
            sleeper,
            stop: self.stop,
            state: self.state,
        }
    }

    /// Handle that stops this player between frames.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    fn transition(&mut self, next: PlayerState) {
        debug!(from = ?self.state, to = ?next, "Player state");
        self.state = next;
    }

    /// Plays the scroll to the end, or until stopped.
    ///
    /// The bus is closed on every exit path. With `reset_on_exit` set, an
    /// all-zero frame is written first, also after a failed transfer; if
    /// that write fails too it is logged and the original error returned.
    ///
    /// # Errors
    ///
    /// Returns error if the bus cannot be opened or a transfer fails. No
    /// transfer is retried.
    pub fn play(&mut self, scroll: Scroll) -> Result<PlaybackSummary, PlaybackError> {
        if self.state != PlayerState::Idle {
            return Err(PlaybackError::NotIdle(self.state));
        }

        let mut handle = match BusHandle::open(&self.bus, &self.config.bus) {
            Ok(handle) => handle,
            Err(e) => {
                self.transition(PlayerState::Closed);
                return Err(PlaybackError::Open(e));
            }
        };
        self.transition(PlayerState::Opened);

        info!(
            frames = scroll.len(),
            duration_us = scroll.total_duration_us(),
            "Playing"
        );
        self.transition(PlayerState::Playing);
        let result = self.run(&mut handle, scroll);

        if self.config.reset_on_exit {
            match handle.transfer(&ALL_OFF) {
                Ok(_) => debug!("All pipes released"),
                Err(e) => warn!(error = %e, "Could not release pipes before closing"),
            }
        }
        drop(handle);
        self.transition(PlayerState::Closed);

        match &result {
            Ok(summary) => info!(
                frames_sent = summary.frames_sent,
                outcome = ?summary.outcome,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "Playback finished"
            ),
            Err(e) => error!(error = %e, "Playback aborted"),
        }
        result
    }

    fn run(
        &mut self,
        handle: &mut BusHandle<B::Device>,
        scroll: Scroll,
    ) -> Result<PlaybackSummary, PlaybackError> {
        let started = Instant::now();
        let mut frames_sent = 0;

        for (index, frame) in scroll.into_iter().enumerate() {
            if self.stop.is_stopped() {
                return Ok(self.stopped(frames_sent, started));
            }
            self.sleeper.sleep(Duration::from_micros(frame.delay_us));
            if self.stop.is_stopped() {
                return Ok(self.stopped(frames_sent, started));
            }

            handle
                .transfer(&frame.registers)
                .map_err(|source| PlaybackError::Transfer {
                    frame: index,
                    source,
                })?;
            frames_sent += 1;
            debug!(
                frame = index,
                delay_us = frame.delay_us,
                registers = %to_bit_string(&frame.registers),
                "Frame sent"
            );
        }

        Ok(PlaybackSummary {
            frames_sent,
            outcome: PlaybackOutcome::Completed,
            elapsed: started.elapsed(),
        })
    }

    fn stopped(&self, frames_sent: usize, started: Instant) -> PlaybackSummary {
        info!(frames_sent, "Playback stopped");
        PlaybackSummary {
            frames_sent,
            outcome: PlaybackOutcome::Stopped,
            elapsed: started.elapsed(),
        }
    }
}

/// Plays on the real SPI bus.
pub fn play_on_spi(scroll: Scroll, config: PlayerConfig) -> Result<PlaybackSummary, PlaybackError> {
    Player::new(SpiBus, config).play(scroll)
}

/// Plays against the logging transport, with real timing.
pub fn play_dry_run(scroll: Scroll, config: PlayerConfig) -> Result<PlaybackSummary, PlaybackError> {
    Player::new(DryRunBus, config).play(scroll)
}
