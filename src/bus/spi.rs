//! Linux spidev transport.
//!
//! Talks to `/dev/spidevX.Y` through the kernel's userspace SPI driver with
//! 8-bit words. On other platforms opening fails with
//! [`BusError::Unsupported`].

use super::{Bus, BusError, Transport};
use crate::scroll::Registers;
#[cfg(target_os = "linux")]
use crate::scroll::REGISTER_COUNT;
#[cfg(target_os = "linux")]
use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};

/// The host's SPI controllers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpiBus;

/// An open spidev character device.
pub struct SpiDevice {
    #[cfg(target_os = "linux")]
    spi: Option<Spidev>,
}

fn device_path(bus: u16, device: u8) -> String {
    format!("/dev/spidev{}.{}", bus, device)
}

impl Bus for SpiBus {
    type Device = SpiDevice;

    #[cfg(target_os = "linux")]
    fn open(&self, bus: u16, device: u8) -> Result<SpiDevice, BusError> {
        let path = device_path(bus, device);
        let spi = Spidev::open(&path).map_err(|source| BusError::Open { path, source })?;
        Ok(SpiDevice { spi: Some(spi) })
    }

    #[cfg(not(target_os = "linux"))]
    fn open(&self, bus: u16, device: u8) -> Result<SpiDevice, BusError> {
        tracing::error!(path = %device_path(bus, device), "spidev requires Linux");
        Err(BusError::Unsupported)
    }
}

#[cfg(target_os = "linux")]
impl Transport for SpiDevice {
    fn configure(&mut self, max_clock_hz: u32, mode: u8) -> Result<(), BusError> {
        let spi = self.spi.as_mut().ok_or(BusError::Closed)?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(max_clock_hz)
            .mode(SpiModeFlags::from_bits_truncate(mode as u32))
            .build();
        spi.configure(&options).map_err(BusError::Configure)
    }

    fn transfer(&mut self, tx: &Registers) -> Result<Registers, BusError> {
        let spi = self.spi.as_mut().ok_or(BusError::Closed)?;
        let mut rx = [0u8; REGISTER_COUNT];
        {
            let mut transfer = SpidevTransfer::read_write(tx, &mut rx);
            spi.transfer(&mut transfer).map_err(BusError::Transfer)?;
        }
        Ok(rx)
    }

    fn close(&mut self) {
        // Dropping the Spidev closes the file descriptor
        self.spi.take();
    }
}

#[cfg(not(target_os = "linux"))]
impl Transport for SpiDevice {
    fn configure(&mut self, _max_clock_hz: u32, _mode: u8) -> Result<(), BusError> {
        Err(BusError::Unsupported)
    }

    fn transfer(&mut self, _tx: &Registers) -> Result<Registers, BusError> {
        Err(BusError::Unsupported)
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_path() {
        assert_eq!(device_path(0, 0), "/dev/spidev0.0");
        assert_eq!(device_path(1, 2), "/dev/spidev1.2");
    }

    #[test]
    fn test_missing_device_fails_to_open() {
        let result = SpiBus.open(250, 250);
        assert!(result.is_err());
    }
}
