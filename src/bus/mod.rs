//! Synchronous serial bus that drives the organ's shift registers.
//!
//! A [`Bus`] opens a [`Transport`] to one device. Playback never touches a
//! transport directly; it goes through [`BusHandle`], which configures the
//! device on open and closes it when dropped, whatever the exit path.

mod dry_run;
mod spi;

pub use dry_run::{DryRunBus, DryRunDevice};
pub use spi::{SpiBus, SpiDevice};

use crate::scroll::Registers;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Errors reported by a bus transport.
#[derive(Error, Debug)]
pub enum BusError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to configure bus: {0}")]
    Configure(#[source] std::io::Error),

    #[error("transfer failed: {0}")]
    Transfer(#[source] std::io::Error),

    #[error("device is closed")]
    Closed,

    #[error("SPI bus is not available on this platform")]
    Unsupported,
}

/// Which device to open and how to clock it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    /// Bus number, `X` in `/dev/spidevX.Y`.
    pub bus: u16,
    /// Chip select, `Y` in `/dev/spidevX.Y`.
    pub device: u8,
    /// Maximum clock rate in Hz.
    pub max_clock_hz: u32,
    /// SPI mode flags (CPHA = 1, CPOL = 2).
    pub mode: u8,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            bus: 0,
            device: 0,
            max_clock_hz: 100_000,
            mode: 0,
        }
    }
}

/// An open device that shifts register bytes out, full duplex.
pub trait Transport {
    /// Sets clock rate and mode. Called once, right after open.
    fn configure(&mut self, max_clock_hz: u32, mode: u8) -> Result<(), BusError>;

    /// Clocks `tx` out in array order and returns the bytes shifted in.
    fn transfer(&mut self, tx: &Registers) -> Result<Registers, BusError>;

    /// Releases the device. Further transfers fail.
    fn close(&mut self);
}

/// Something that can open transports.
pub trait Bus {
    type Device: Transport;

    fn open(&self, bus: u16, device: u8) -> Result<Self::Device, BusError>;
}

/// Scoped ownership of an open, configured transport.
///
/// The transport is closed when the handle is dropped, including when a
/// transfer error unwinds playback.
pub struct BusHandle<T: Transport> {
    device: T,
    settings: BusSettings,
    transfers: u64,
}

impl<T: Transport> BusHandle<T> {
    /// Opens and configures the device named by `settings`.
    ///
    /// If configuration fails the freshly opened device is closed before the
    /// error is returned.
    pub fn open<B>(bus: &B, settings: &BusSettings) -> Result<Self, BusError>
    where
        B: Bus<Device = T>,
    {
        let device = bus.open(settings.bus, settings.device)?;
        info!(
            bus = settings.bus,
            device = settings.device,
            "SPI {}.{} opened",
            settings.bus,
            settings.device
        );
        // From here on Drop logs the matching close
        let mut handle = Self {
            device,
            settings: *settings,
            transfers: 0,
        };
        handle
            .device
            .configure(settings.max_clock_hz, settings.mode)?;
        debug!(
            max_clock_hz = settings.max_clock_hz,
            mode = settings.mode,
            "Bus configured"
        );
        Ok(handle)
    }

    /// Sends one register state.
    pub fn transfer(&mut self, registers: &Registers) -> Result<Registers, BusError> {
        let rx = self.device.transfer(registers)?;
        self.transfers += 1;
        Ok(rx)
    }

    /// Number of successful transfers so far.
    pub fn transfers(&self) -> u64 {
        self.transfers
    }
}

impl<T: Transport> Drop for BusHandle<T> {
    fn drop(&mut self) {
        self.device.close();
        debug!(transfers = self.transfers, "Bus handle released");
        info!(
            bus = self.settings.bus,
            device = self.settings.device,
            "SPI {}.{} closed",
            self.settings.bus,
            self.settings.device
        );
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{BusOp, MockBus};
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Log sink for asserting on emitted messages.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn capture_logs(f: impl FnOnce()) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        buffer.contents()
    }

    #[test]
    fn test_open_configures_and_drop_closes() {
        let bus = MockBus::new();
        let settings = BusSettings {
            bus: 1,
            device: 2,
            max_clock_hz: 5_000_000,
            mode: 3,
        };
        {
            let mut handle = BusHandle::open(&bus, &settings).unwrap();
            assert_eq!(handle.transfer(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap(), [1, 2, 3, 4, 5, 6, 7, 8]);
            assert_eq!(handle.transfers(), 1);
        }
        assert_eq!(
            bus.ops(),
            vec![
                BusOp::Open(1, 2),
                BusOp::Configure(5_000_000, 3),
                BusOp::Transfer([1, 2, 3, 4, 5, 6, 7, 8]),
                BusOp::Close,
            ]
        );
    }

    #[test]
    fn test_failed_configure_still_closes() {
        let bus = MockBus::new();
        bus.state.borrow_mut().fail_configure = true;
        let result = BusHandle::open(&bus, &BusSettings::default());
        assert!(matches!(result, Err(BusError::Configure(_))));
        assert_eq!(bus.ops(), vec![BusOp::Open(0, 0), BusOp::Close]);
    }

    #[test]
    fn test_failed_configure_logs_open_before_close() {
        let bus = MockBus::new();
        bus.state.borrow_mut().fail_configure = true;
        let settings = BusSettings {
            bus: 1,
            device: 3,
            ..BusSettings::default()
        };
        let logs = capture_logs(|| {
            assert!(BusHandle::open(&bus, &settings).is_err());
        });

        let opened = logs.find("SPI 1.3 opened").expect("open logged");
        let closed = logs.find("SPI 1.3 closed").expect("close logged");
        assert!(opened < closed);
    }

    #[test]
    fn test_failed_open_logs_nothing() {
        let bus = MockBus::new();
        bus.state.borrow_mut().fail_open = true;
        let logs = capture_logs(|| {
            assert!(BusHandle::open(&bus, &BusSettings::default()).is_err());
        });
        assert!(!logs.contains("opened"));
        assert!(!logs.contains("closed"));
    }

    #[test]
    fn test_failed_open_has_nothing_to_close() {
        let bus = MockBus::new();
        bus.state.borrow_mut().fail_open = true;
        let result = BusHandle::open(&bus, &BusSettings::default());
        assert!(matches!(result, Err(BusError::Open { .. })));
        assert!(bus.ops().is_empty());
    }

    #[test]
    fn test_default_settings() {
        let settings = BusSettings::default();
        assert_eq!((settings.bus, settings.device), (0, 0));
        assert_eq!(settings.max_clock_hz, 100_000);
        assert_eq!(settings.mode, 0);
    }
}
