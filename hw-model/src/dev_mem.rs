/*++

Licensed under the Apache-2.0 license.

File Name:

    dev_mem.rs

Abstract:

    File contains the physical register window: a shared, uncached mapping
    of a peripheral's address range obtained through /dev/mem.

--*/

use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::ptr;

use crate::Mmio;

const DEV_MEM: &str = "/dev/mem";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MapStage {
    /// Opening /dev/mem failed (usually missing privileges).
    OpenDevice,
    /// The kernel refused the mapping.
    Map,
    /// Base address or length is unusable before any syscall is made.
    InvalidWindow,
}

#[derive(Debug)]
pub struct MapError {
    pub phys_addr: u64,
    pub len: usize,
    pub stage: MapStage,
    pub source: io::Error,
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.stage {
            MapStage::OpenDevice => "failed to open /dev/mem",
            MapStage::Map => "failed to map register window",
            MapStage::InvalidWindow => "invalid register window",
        };
        write!(
            f,
            "{what} at {:#010x} (+{:#x}): {}",
            self.phys_addr, self.len, self.source
        )
    }
}

impl std::error::Error for MapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// `page_size` is the raw `sysconf` result; -1 (or any non-positive value)
/// rejects the window.
fn window_is_valid(phys_addr: u64, len: usize, page_size: libc::c_long) -> bool {
    let Ok(page_size) = u64::try_from(page_size) else {
        return false;
    };
    len != 0 && page_size != 0 && phys_addr % page_size == 0 && len % 4 == 0
}

/// A mapped peripheral register window.
///
/// Every access is a single volatile 32-bit load or store. The mapping is
/// released by [`DevMemWindow::close`] or on drop, whichever comes first.
pub struct DevMemWindow {
    base: *mut u32,
    phys_addr: u64,
    len: usize,
}

impl DevMemWindow {
    /// Map `len` bytes of physical address space starting at `phys_addr`.
    pub fn open(phys_addr: u64, len: usize) -> Result<Self, MapError> {
        let err = |stage, source| MapError {
            phys_addr,
            len,
            stage,
            source,
        };

        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if !window_is_valid(phys_addr, len, page_size) {
            return Err(err(
                MapStage::InvalidWindow,
                io::Error::from(io::ErrorKind::InvalidInput),
            ));
        }
        let offset = libc::off_t::try_from(phys_addr).map_err(|_| {
            err(
                MapStage::InvalidWindow,
                io::Error::from(io::ErrorKind::InvalidInput),
            )
        })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(DEV_MEM)
            .map_err(|e| err(MapStage::OpenDevice, e))?;

        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                offset,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(err(MapStage::Map, io::Error::last_os_error()));
        }
        // The mapping stays valid after the descriptor is closed.
        drop(file);

        Ok(Self {
            base: base as *mut u32,
            phys_addr,
            len,
        })
    }

    pub fn phys_addr(&self) -> u64 {
        self.phys_addr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_open(&self) -> bool {
        !self.base.is_null()
    }

    /// Unmap the window. Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.base.is_null() {
            return;
        }
        unsafe { libc::munmap(self.base as *mut libc::c_void, self.len) };
        self.base = ptr::null_mut();
    }

    fn reg(&self, offset: u32) -> *mut u32 {
        assert!(self.is_open(), "register window {:#x} is closed", self.phys_addr);
        assert_eq!(offset % 4, 0, "unaligned register offset {offset:#x}");
        assert!(
            (offset as usize) + 4 <= self.len,
            "register offset {offset:#x} outside window of {:#x} bytes",
            self.len
        );
        unsafe { self.base.add(offset as usize / 4) }
    }
}

impl Mmio for DevMemWindow {
    fn read(&self, offset: u32) -> u32 {
        unsafe { self.reg(offset).read_volatile() }
    }

    fn write(&self, offset: u32, value: u32) {
        unsafe { self.reg(offset).write_volatile(value) }
    }
}

impl Drop for DevMemWindow {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unaligned_base() {
        let err = DevMemWindow::open(0x4000_0004, 0x1000).err().unwrap();
        assert_eq!(err.stage, MapStage::InvalidWindow);
        assert_eq!(err.phys_addr, 0x4000_0004);
    }

    #[test]
    fn test_rejects_empty_window() {
        let err = DevMemWindow::open(0x4000_0000, 0).err().unwrap();
        assert_eq!(err.stage, MapStage::InvalidWindow);
    }

    #[test]
    fn test_page_size_error_rejects_window() {
        assert!(window_is_valid(0x4000_0000, 0x1000, 4096));
        assert!(!window_is_valid(0x4000_0000, 0x1000, -1));
        assert!(!window_is_valid(0x4000_0000, 0x1000, 0));
        assert!(!window_is_valid(0x4000_0000, 0x1002, 4096));
    }

    #[test]
    fn test_display_names_address() {
        let err = MapError {
            phys_addr: 0x4000_1000,
            len: 0x1000,
            stage: MapStage::OpenDevice,
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("failed to open /dev/mem at 0x40001000 (+0x1000)"));
    }
}
