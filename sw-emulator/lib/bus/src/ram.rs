/*++

Licensed under the Apache-2.0 license.

File Name:

    ram.rs

Abstract:

    File contains implementation of a plain register file: every word reads
    back what was last written to it.

--*/

use crate::{Bus, BusError, RegAddr, RegData};

/// Word addressed read/write memory
pub struct Ram {
    data: Vec<RegData>,
}

impl Ram {
    /// Create new RAM holding `words` zero-initialized registers
    pub fn new(words: usize) -> Self {
        Self {
            data: vec![0; words],
        }
    }

    /// Size of the RAM in bytes
    pub fn mmap_size(&self) -> RegAddr {
        (self.data.len() * 4) as RegAddr
    }

    pub fn data(&self) -> &[RegData] {
        &self.data
    }

    fn index(&self, addr: RegAddr) -> Option<usize> {
        let idx = (addr / 4) as usize;
        (idx < self.data.len()).then_some(idx)
    }
}

impl Bus for Ram {
    fn read(&mut self, addr: RegAddr) -> Result<RegData, BusError> {
        if addr % 4 != 0 {
            return Err(BusError::LoadAddrMisaligned);
        }
        match self.index(addr) {
            Some(idx) => Ok(self.data[idx]),
            None => Err(BusError::LoadAccessFault),
        }
    }

    fn write(&mut self, addr: RegAddr, val: RegData) -> Result<(), BusError> {
        if addr % 4 != 0 {
            return Err(BusError::StoreAddrMisaligned);
        }
        match self.index(addr) {
            Some(idx) => {
                self.data[idx] = val;
                Ok(())
            }
            None => Err(BusError::StoreAccessFault),
        }
    }
}
