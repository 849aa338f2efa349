/*++

Licensed under the Apache-2.0 license.

File Name:

    fake_bus.rs

Abstract:

    File contains code for a fake implementation of the Bus trait.

--*/
use std::collections::{HashMap, VecDeque};
use std::fmt::Write;

use crate::{testing::Log, Bus, BusError, RegAddr, RegData};

/// A Bus implementation that logs all calls, and lets the test script the
/// values returned by reads.
///
/// Reads of an offset with queued values pop the queue front; once the queue
/// for an offset is empty (or was never filled) `read_result` is returned.
///
/// # Example
///
/// ```
/// use hsm_emu_bus::{Bus, testing::FakeBus};
///
/// let mut fake_bus = FakeBus::new();
/// fake_bus.queue_reads(0x4, [0, 0, 1]);
/// assert_eq!(fake_bus.read(0x4), Ok(0));
/// assert_eq!(fake_bus.read(0x4), Ok(0));
/// assert_eq!(fake_bus.read(0x4), Ok(1));
/// fake_bus.read_result = Ok(35);
/// assert_eq!(fake_bus.read(0x4), Ok(35));
/// assert_eq!(
///     "read(0x4)\nread(0x4)\nread(0x4)\nread(0x4)\n",
///     fake_bus.log.take()
/// );
/// ```
pub struct FakeBus {
    pub log: Log,
    pub read_result: Result<RegData, BusError>,
    pub write_result: Result<(), BusError>,
    queued_reads: HashMap<RegAddr, VecDeque<RegData>>,
}
impl FakeBus {
    pub fn new() -> Self {
        Self {
            log: Log::new(),
            read_result: Ok(0),
            write_result: Ok(()),
            queued_reads: HashMap::new(),
        }
    }

    /// Queue values to be returned by successive reads of `addr`.
    pub fn queue_reads(&mut self, addr: RegAddr, vals: impl IntoIterator<Item = RegData>) {
        self.queued_reads.entry(addr).or_default().extend(vals);
    }
}
impl Default for FakeBus {
    fn default() -> Self {
        Self::new()
    }
}
impl Bus for FakeBus {
    fn read(&mut self, addr: RegAddr) -> Result<RegData, BusError> {
        writeln!(self.log.w(), "read({addr:#x})").unwrap();
        match self.queued_reads.get_mut(&addr).and_then(VecDeque::pop_front) {
            Some(val) => Ok(val),
            None => self.read_result,
        }
    }

    fn write(&mut self, addr: RegAddr, val: RegData) -> Result<(), BusError> {
        writeln!(self.log.w(), "write({addr:#x}, {val:#x})").unwrap();
        self.write_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_bus() {
        let mut fake_bus = FakeBus::new();

        assert_eq!(fake_bus.read(0x1c), Ok(0));
        assert_eq!("read(0x1c)\n", fake_bus.log.take());

        assert_eq!(fake_bus.write(0x0, 0x3), Ok(()));
        assert_eq!("write(0x0, 0x3)\n", fake_bus.log.take());

        fake_bus.read_result = Err(BusError::LoadAccessFault);
        assert_eq!(fake_bus.read(0x18), Err(BusError::LoadAccessFault));
        assert_eq!("read(0x18)\n", fake_bus.log.take());

        fake_bus.write_result = Err(BusError::StoreAddrMisaligned);
        assert_eq!(fake_bus.write(0x131, 0x1), Err(BusError::StoreAddrMisaligned));
        assert_eq!("write(0x131, 0x1)\n", fake_bus.log.take());
    }

    #[test]
    fn test_queued_reads_are_per_offset() {
        let mut fake_bus = FakeBus::new();
        fake_bus.read_result = Ok(7);
        fake_bus.queue_reads(0x1c, [1, 2]);
        fake_bus.queue_reads(0x18, [0xffff_ffff]);

        assert_eq!(fake_bus.read(0x18), Ok(0xffff_ffff));
        assert_eq!(fake_bus.read(0x1c), Ok(1));
        assert_eq!(fake_bus.read(0x18), Ok(7));
        assert_eq!(fake_bus.read(0x1c), Ok(2));
        assert_eq!(fake_bus.read(0x1c), Ok(7));
    }
}
