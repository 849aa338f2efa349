/*++

Licensed under the Apache-2.0 license.

File Name:

    log.rs

Abstract:

    File contains a shared text log for recording register traffic inside
    unit tests.

--*/
use std::{
    cell::{Ref, RefCell},
    fmt::Write,
    ops::Deref,
    rc::Rc,
};

/// A type for logging actions without needing &mut self. Useful for logging
/// register accesses made through "fake" Bus implementations that are owned
/// by the code under test.
///
/// When `Log` is cloned, the clones all share the same underlying buffer, so
/// a test can keep one clone and inspect what the driver did with the other.
///
/// * Example
///
/// ```
/// use hsm_emu_bus::testing::Log;
/// use std::fmt::Write;
///
/// let log = Log::new();
/// writeln!(log.w(), "write(0x0, 0x1)").unwrap();
/// writeln!(log.w(), "read(0x4)").unwrap();
/// assert_eq!("write(0x0, 0x1)\nread(0x4)\n", &*log.as_str());
/// assert_eq!(log.lines(), vec!["write(0x0, 0x1)", "read(0x4)"]);
/// assert_eq!("write(0x0, 0x1)\nread(0x4)\n", log.take());
/// assert_eq!("", log.take());
/// ```
#[derive(Clone, Default)]
pub struct Log {
    log: Rc<RefCell<String>>,
}
impl Log {
    /// Construct an empty `Log`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Access the contents of the log without modifying it.
    pub fn as_str(&self) -> impl Deref<Target = str> + '_ {
        Ref::map(self.log.borrow(), String::as_str)
    }

    /// Copy of the logged lines, without the trailing newlines.
    pub fn lines(&self) -> Vec<String> {
        self.log.borrow().lines().map(str::to_owned).collect()
    }

    /// Replaces the existing contents of the log with an empty string, and
    /// returns the previous contents.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    /// Returns a writer that can be used with write!() or writeln!().
    pub fn w(&self) -> impl Write + '_ {
        LogWriter { log: &self.log }
    }
}

struct LogWriter<'a> {
    log: &'a RefCell<String>,
}
impl Write for LogWriter<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.log.borrow_mut().write_str(s)
    }
}
