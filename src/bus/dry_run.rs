//! Transport that logs instead of driving hardware.
//!
//! Used for `--dry-run` and for checking a scroll's timing on a machine
//! without the organ attached.

use super::{Bus, BusError, Transport};
use crate::scroll::registers::to_bit_string;
use crate::scroll::Registers;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunBus;

/// Echoes every transfer back, like a loopback cable would.
#[derive(Debug, Default)]
pub struct DryRunDevice {
    open: bool,
    transfers: u64,
    last: Option<Registers>,
}

impl DryRunDevice {
    pub fn transfers(&self) -> u64 {
        self.transfers
    }

    /// Last register state sent.
    pub fn last(&self) -> Option<Registers> {
        self.last
    }
}

impl Bus for DryRunBus {
    type Device = DryRunDevice;

    fn open(&self, bus: u16, device: u8) -> Result<DryRunDevice, BusError> {
        info!(bus, device, "Dry run: no hardware will be driven");
        Ok(DryRunDevice {
            open: true,
            ..DryRunDevice::default()
        })
    }
}

impl Transport for DryRunDevice {
    fn configure(&mut self, max_clock_hz: u32, mode: u8) -> Result<(), BusError> {
        if !self.open {
            return Err(BusError::Closed);
        }
        debug!(max_clock_hz, mode, "Dry run configure");
        Ok(())
    }

    fn transfer(&mut self, tx: &Registers) -> Result<Registers, BusError> {
        if !self.open {
            return Err(BusError::Closed);
        }
        self.transfers += 1;
        self.last = Some(*tx);
        debug!(frame = self.transfers, registers = %to_bit_string(tx), "Dry run transfer");
        Ok(*tx)
    }

    fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echoes_and_counts() {
        let mut device = DryRunBus.open(0, 0).unwrap();
        device.configure(100_000, 0).unwrap();
        let tx = [0, 1, 2, 3, 4, 5, 6, 7];
        assert_eq!(device.transfer(&tx).unwrap(), tx);
        assert_eq!(device.transfers(), 1);
        assert_eq!(device.last(), Some(tx));
    }

    #[test]
    fn test_closed_device_rejects_transfers() {
        let mut device = DryRunBus.open(0, 0).unwrap();
        device.close();
        assert!(matches!(device.transfer(&[0; 8]), Err(BusError::Closed)));
    }
}
