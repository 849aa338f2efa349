// Licensed under the Apache-2.0 license

use std::cell::{Ref, RefCell, RefMut};

use hsm_emu_bus::Bus;

/// 32-bit register access to one peripheral window. Offsets are in bytes
/// from the start of the window.
pub trait Mmio {
    fn read(&self, offset: u32) -> u32;
    fn write(&self, offset: u32, value: u32);
}

impl<T: Mmio + ?Sized> Mmio for &T {
    fn read(&self, offset: u32) -> u32 {
        (**self).read(offset)
    }

    fn write(&self, offset: u32, value: u32) {
        (**self).write(offset, value)
    }
}

impl<T: Mmio + ?Sized> Mmio for Box<T> {
    fn read(&self, offset: u32) -> u32 {
        (**self).read(offset)
    }

    fn write(&self, offset: u32, value: u32) {
        (**self).write(offset, value)
    }
}

/// An MMIO implementation that reads and writes to a `hsm_emu_bus::Bus`.
pub struct BusMmio<TBus: Bus> {
    bus: RefCell<TBus>,
}
impl<TBus: Bus> BusMmio<TBus> {
    pub fn new(bus: TBus) -> Self {
        Self {
            bus: RefCell::new(bus),
        }
    }

    /// Borrow the peripheral behind the window, e.g. to inspect its state
    /// from a test.
    pub fn bus(&self) -> Ref<'_, TBus> {
        self.bus.borrow()
    }

    pub fn bus_mut(&self) -> RefMut<'_, TBus> {
        self.bus.borrow_mut()
    }

    pub fn into_inner(self) -> TBus {
        self.bus.into_inner()
    }
}
impl<TBus: Bus> Mmio for BusMmio<TBus> {
    /// # Panics
    ///
    /// This function panics if the bus faults.
    fn read(&self, offset: u32) -> u32 {
        match self.bus.borrow_mut().read(offset) {
            Ok(val) => val,
            Err(err) => panic!("bus fault reading offset {offset:#x}: {err:?}"),
        }
    }

    /// # Panics
    ///
    /// This function panics if the bus faults.
    fn write(&self, offset: u32, value: u32) {
        if let Err(err) = self.bus.borrow_mut().write(offset, value) {
            panic!("bus fault writing {value:#x} to offset {offset:#x}: {err:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsm_emu_bus::{testing::FakeBus, Ram};

    #[test]
    fn test_bus_mmio() {
        let mmio = BusMmio::new(FakeBus::new());
        mmio.write(0x8, 0x55);
        mmio.bus().log.take();
        assert_eq!(mmio.read(0x8), 0);
        assert_eq!(mmio.into_inner().log.take(), "read(0x8)\n");
    }

    #[test]
    fn test_forwarding_impls() {
        let mmio = BusMmio::new(Ram::new(4));
        let by_ref: &BusMmio<Ram> = &mmio;
        Mmio::write(&by_ref, 4, 0x1234);
        let boxed: Box<dyn Mmio> = Box::new(mmio);
        assert_eq!(boxed.read(4), 0x1234);
    }

    #[test]
    #[should_panic(expected = "bus fault reading offset 0x10")]
    fn test_bus_fault_panics() {
        let mmio = BusMmio::new(Ram::new(4));
        mmio.read(0x10);
    }
}
