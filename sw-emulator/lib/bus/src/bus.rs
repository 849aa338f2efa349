/*++

Licensed under the Apache-2.0 license.

File Name:

    bus.rs

Abstract:

    File contains definition of the Bus trait.

--*/

/// Byte offset of a register inside a peripheral window.
pub type RegAddr = u32;

/// Register data width.
pub type RegData = u32;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BusError {
    /// Load address misaligned
    LoadAddrMisaligned,

    /// Load access fault
    LoadAccessFault,

    /// Store address misaligned
    StoreAddrMisaligned,

    /// Store access fault
    StoreAccessFault,
}

/// Represents the register interface of an emulated peripheral. All accesses
/// are 32 bits wide.
///
/// Reads take `&mut self`: reading a status or counter register is how the
/// host observes time passing, so emulated peripherals advance their internal
/// state on reads.
pub trait Bus {
    /// Read the register at byte offset `addr`
    ///
    /// # Error
    ///
    /// * `BusError::LoadAccessFault` or `BusError::LoadAddrMisaligned`
    fn read(&mut self, addr: RegAddr) -> Result<RegData, BusError>;

    /// Write `val` to the register at byte offset `addr`
    ///
    /// # Error
    ///
    /// * `BusError::StoreAccessFault` or `BusError::StoreAddrMisaligned`
    fn write(&mut self, addr: RegAddr, val: RegData) -> Result<(), BusError>;
}

impl<T: Bus + ?Sized> Bus for &mut T {
    fn read(&mut self, addr: RegAddr) -> Result<RegData, BusError> {
        (**self).read(addr)
    }

    fn write(&mut self, addr: RegAddr, val: RegData) -> Result<(), BusError> {
        (**self).write(addr, val)
    }
}

impl<T: Bus + ?Sized> Bus for Box<T> {
    fn read(&mut self, addr: RegAddr) -> Result<RegData, BusError> {
        (**self).read(addr)
    }

    fn write(&mut self, addr: RegAddr, val: RegData) -> Result<(), BusError> {
        (**self).write(addr, val)
    }
}
