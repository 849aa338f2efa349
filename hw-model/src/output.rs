// Licensed under the Apache-2.0 license

use std::cell::{Cell, RefCell};
use std::fmt::{self, Display};
use std::io::{self, LineWriter, Write};
use std::rc::Rc;
use std::time::Instant;

struct OutputImpl {
    log_writer: RefCell<LineWriter<Box<dyn Write>>>,
    start: Instant,
    frozen_now: Cell<Option<u64>>,
    next_write_needs_time_prefix: Cell<bool>,
}

/// Formats a microsecond count right aligned with thousands separators.
pub struct PrettyU64(pub u64);
impl Display for PrettyU64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const RANKS: [u64; 7] = [
            1_000_000_000_000_000_000,
            1_000_000_000_000_000,
            1_000_000_000_000,
            1_000_000_000,
            1_000_000,
            1_000,
            1,
        ];
        // Groups below this rank are always printed (or padded).
        const ALIGNED_RANK: u64 = 1_000_000_000;

        let mut leading = true;
        for rank in RANKS {
            let group = (self.0 / rank) % 1000;
            let sep = if rank > 1 { "," } else { "" };
            if !leading {
                write!(f, "{group:03}{sep}")?;
            } else if self.0 >= rank || rank == 1 {
                if rank >= ALIGNED_RANK {
                    write!(f, "{group}{sep}")?;
                } else {
                    write!(f, "{group:>3}{sep}")?;
                }
                leading = false;
            } else if rank < ALIGNED_RANK {
                f.write_str("    ")?;
            }
        }
        Ok(())
    }
}

/// Line oriented diagnostic log shared by the drivers and the harness.
///
/// Each line gets the elapsed time in microseconds as a prefix. Clones share
/// the same writer and clock.
#[derive(Clone)]
pub struct Output(Rc<OutputImpl>);

impl Output {
    pub fn new(log_writer: impl Write + 'static) -> Self {
        Self(Rc::new(OutputImpl {
            log_writer: RefCell::new(LineWriter::new(Box::new(log_writer))),
            start: Instant::now(),
            frozen_now: Cell::new(None),
            next_write_needs_time_prefix: Cell::new(true),
        }))
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    /// An output that discards everything.
    pub fn sink() -> Self {
        Self::new(io::sink())
    }

    /// Microseconds since this output was created, unless frozen by
    /// [`Output::set_now`].
    pub fn now(&self) -> u64 {
        match self.0.frozen_now.get() {
            Some(now) => now,
            None => self.0.start.elapsed().as_micros() as u64,
        }
    }

    /// Freeze the timestamp prefix at `now`.
    pub fn set_now(&self, now: u64) {
        self.0.frozen_now.set(Some(now));
    }

    pub fn logger(&self) -> impl Write + '_ {
        self
    }

    /// Write one line; write errors are dropped.
    pub fn log(&self, args: fmt::Arguments<'_>) {
        let _ = writeln!(self.logger(), "{args}");
    }
}

impl Write for &Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let log_writer = &mut self.0.log_writer.borrow_mut();
        for line in buf.split_inclusive(|ch| *ch == b'\n') {
            if self.0.next_write_needs_time_prefix.get() {
                write!(log_writer, "{} ", PrettyU64(self.now()))?;
                self.0.next_write_needs_time_prefix.set(false);
            }
            log_writer.write_all(line)?;
            if line.ends_with(b"\n") {
                self.0.next_write_needs_time_prefix.set(true);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.log_writer.borrow_mut().flush()
    }
}

/// In-memory writer whose clones share one buffer; lets a test read back what
/// was logged through an [`Output`].
#[derive(Clone, Default)]
pub struct LogBuffer(Rc<RefCell<Vec<u8>>>);

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    /// Logged lines with the timestamp prefix stripped.
    pub fn messages(&self) -> Vec<String> {
        self.contents()
            .lines()
            .map(|line| match line.find(|c: char| c.is_ascii_digit()) {
                Some(pos) => match line[pos..].find(' ') {
                    Some(sp) => line[pos + sp + 1..].to_string(),
                    None => String::new(),
                },
                None => line.to_string(),
            })
            .collect()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pretty_u64() {
        assert_eq!(PrettyU64(0).to_string(), "          0");
        assert_eq!(PrettyU64(7).to_string(), "          7");
        assert_eq!(PrettyU64(1_000).to_string(), "      1,000");
        assert_eq!(PrettyU64(12_345).to_string(), "     12,345");
        assert_eq!(PrettyU64(1_000_001).to_string(), "  1,000,001");
        assert_eq!(PrettyU64(999_999_999).to_string(), "999,999,999");
        assert_eq!(PrettyU64(4_000_000_123).to_string(), "4,000,000,123");
    }

    #[test]
    fn test_time_prefix_per_line() {
        let buf = LogBuffer::new();
        let out = Output::new(buf.clone());
        out.set_now(1_500);

        let mut log = out.logger();
        log.write_all(b"key loaded\nencrypt ").unwrap();
        out.set_now(2_000);
        log.write_all(b"done\nshutdown\n").unwrap();
        log.flush().unwrap();

        assert_eq!(
            buf.contents(),
            "      1,500 key loaded\n      1,500 encrypt done\n      2,000 shutdown\n"
        );
        assert_eq!(buf.messages(), vec!["key loaded", "encrypt done", "shutdown"]);
    }

    #[test]
    fn test_clones_share_writer() {
        let buf = LogBuffer::new();
        let out = Output::new(buf.clone());
        out.set_now(3);
        let other = out.clone();
        out.log(format_args!("first"));
        other.log(format_args!("second {}", 2));
        assert_eq!(buf.messages(), vec!["first", "second 2"]);
    }

    #[test]
    fn test_sink_accepts_writes() {
        let out = Output::sink();
        out.log(format_args!("dropped"));
    }
}
