/*++

Licensed under the Apache-2.0 license.

File Name:

    stream.rs

Abstract:

    File contains the continuous TRNG sampling loop with optional periodic
    health checks.

--*/

use std::io::{self, Write};

use hsm_drivers::{HealthReport, Trng};
use hsm_error::{HsmError, HsmResult};
use hsm_hw_model::Mmio;

use crate::CancelToken;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputMode {
    /// One `0x%08x` line per sample.
    Hex,
    /// Four little-endian bytes per sample.
    Binary,
}

/// What to do when a periodic health check reports a failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HealthPolicy {
    /// Log the report and keep sampling.
    Warn,
    /// Stop the stream.
    Abort,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StreamConfig {
    pub mode: OutputMode,
    /// Stop after this many samples; `None` runs until cancelled.
    pub limit: Option<u64>,
    /// Check health after every N samples.
    pub health_every: Option<u64>,
    pub health_policy: HealthPolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::Hex,
            limit: None,
            health_every: None,
            health_policy: HealthPolicy::Warn,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StopReason {
    LimitReached,
    Cancelled,
    /// The reader of the sample output went away.
    OutputClosed,
    HealthDegraded(HealthReport),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StreamSummary {
    pub samples: u64,
    pub health_checks: u64,
    pub degraded_reports: u64,
    pub stop: StopReason,
}

impl StreamSummary {
    /// `HARNESS_HEALTH_DEGRADED` if the stream was aborted on a health
    /// failure.
    pub fn result(&self) -> HsmResult<()> {
        match self.stop {
            StopReason::HealthDegraded(_) => Err(HsmError::HARNESS_HEALTH_DEGRADED),
            _ => Ok(()),
        }
    }
}

fn write_sample(out: &mut impl Write, mode: OutputMode, sample: u32) -> io::Result<()> {
    match mode {
        OutputMode::Hex => writeln!(out, "0x{sample:08x}"),
        OutputMode::Binary => out.write_all(&sample.to_le_bytes()),
    }
}

/// Sample `trng` until the limit is reached, `cancel` fires or a handshake
/// fails, writing every sample to `out`.
///
/// Cancellation is checked before each handshake, never inside one.
///
/// # Errors
///
/// * `DRIVER_TRNG_SAMPLE_TIMEOUT` from the failing handshake
/// * `HARNESS_OUTPUT_WRITE_FAILED` if `out` rejects a write
pub fn run_stream<M: Mmio>(
    trng: &mut Trng<M>,
    config: &StreamConfig,
    cancel: &CancelToken,
    out: &mut impl Write,
) -> HsmResult<StreamSummary> {
    let output = trng.output().clone();
    let mut summary = StreamSummary {
        samples: 0,
        health_checks: 0,
        degraded_reports: 0,
        stop: StopReason::LimitReached,
    };

    trng.enable();
    output.log(format_args!("stream: initial health {}", trng.check_health()));

    let stop = loop {
        if config.limit.map_or(false, |limit| summary.samples >= limit) {
            break StopReason::LimitReached;
        }
        if cancel.is_cancelled() {
            break StopReason::Cancelled;
        }

        let sample = match trng.sample() {
            Ok(sample) => sample,
            Err(err) => {
                if let Err(e) = out.flush() {
                    output.log(format_args!("stream: output flush failed: {e}"));
                }
                output.log(format_args!(
                    "stream: stopped after {} samples: {err}",
                    summary.samples
                ));
                return Err(err);
            }
        };
        match write_sample(out, config.mode, sample) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => break StopReason::OutputClosed,
            Err(e) => {
                output.log(format_args!("stream: output write failed: {e}"));
                return Err(HsmError::HARNESS_OUTPUT_WRITE_FAILED);
            }
        }
        summary.samples += 1;

        let Some(every) = config.health_every.filter(|every| *every > 0) else {
            continue;
        };
        if summary.samples % every != 0 {
            continue;
        }
        let report = trng.check_health();
        summary.health_checks += 1;
        if report.is_degraded() {
            summary.degraded_reports += 1;
            output.log(format_args!(
                "stream: health degraded after {} samples: {report}",
                summary.samples
            ));
            if config.health_policy == HealthPolicy::Abort {
                break StopReason::HealthDegraded(report);
            }
        }
    };

    match out.flush() {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
        Err(e) => {
            output.log(format_args!("stream: output flush failed: {e}"));
            return Err(HsmError::HARNESS_OUTPUT_WRITE_FAILED);
        }
    }
    summary.stop = stop;
    output.log(format_args!(
        "stream: {} samples, {} health checks, {} degraded ({:?})",
        summary.samples, summary.health_checks, summary.degraded_reports, summary.stop
    ));
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsm_drivers::PollBudget;
    use hsm_emu_periph::{HsmArgs, HsmPeripheral};
    use hsm_hw_model::{BusMmio, LogBuffer, Output};

    fn trng(args: HsmArgs) -> Trng<BusMmio<HsmPeripheral>> {
        Trng::new(
            BusMmio::new(HsmPeripheral::new(args)),
            PollBudget::new(100),
            Output::sink(),
        )
    }

    #[test]
    fn test_hex_lines() {
        let mut trng = trng(HsmArgs::with_words([0x0000_0001, 0xffff_ffff, 0xabcd_0123]));
        let mut out = Vec::new();
        let config = StreamConfig {
            limit: Some(3),
            ..Default::default()
        };
        let summary = run_stream(&mut trng, &config, &CancelToken::new(), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "0x00000001\n0xffffffff\n0xabcd0123\n"
        );
        assert_eq!(summary.samples, 3);
        assert_eq!(summary.stop, StopReason::LimitReached);
    }

    #[test]
    fn test_binary_is_little_endian() {
        let mut trng = trng(HsmArgs::with_words([0x0403_0201, 0x0807_0605]));
        let mut out = Vec::new();
        let config = StreamConfig {
            mode: OutputMode::Binary,
            limit: Some(2),
            ..Default::default()
        };
        run_stream(&mut trng, &config, &CancelToken::new(), &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_cancelled_before_first_handshake() {
        let mut trng = trng(HsmArgs::with_words(0..));
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut out = Vec::new();
        let summary = run_stream(&mut trng, &StreamConfig::default(), &cancel, &mut out).unwrap();
        assert_eq!(summary.samples, 0);
        assert_eq!(summary.stop, StopReason::Cancelled);
        assert!(out.is_empty());
        assert_eq!(trng.mmio().bus().sample_triggers(), 0);
    }

    #[test]
    fn test_timeout_ends_stream() {
        let mut trng = trng(HsmArgs::with_words([5, 6]));
        let mut out = Vec::new();
        let err = run_stream(
            &mut trng,
            &StreamConfig::default(),
            &CancelToken::new(),
            &mut out,
        )
        .unwrap_err();
        assert_eq!(err, HsmError::DRIVER_TRNG_SAMPLE_TIMEOUT);
        assert_eq!(String::from_utf8(out).unwrap(), "0x00000005\n0x00000006\n");
    }

    #[test]
    fn test_health_warn_keeps_sampling() {
        let mut trng = trng(HsmArgs::with_words(std::iter::repeat(0)));
        let config = StreamConfig {
            limit: Some(16),
            health_every: Some(4),
            ..Default::default()
        };
        let summary = run_stream(&mut trng, &config, &CancelToken::new(), &mut io::sink()).unwrap();
        assert_eq!(summary.samples, 16);
        assert_eq!(summary.health_checks, 4);
        // 4 samples feed 32 nibbles, exactly the repetition cutoff.
        assert_eq!(summary.degraded_reports, 4);
        assert_eq!(summary.result(), Ok(()));
    }

    #[test]
    fn test_health_abort() {
        let mut trng = trng(HsmArgs::with_words(std::iter::repeat(0)));
        let config = StreamConfig {
            limit: Some(100),
            health_every: Some(8),
            health_policy: HealthPolicy::Abort,
            ..Default::default()
        };
        let summary = run_stream(&mut trng, &config, &CancelToken::new(), &mut io::sink()).unwrap();
        assert_eq!(summary.samples, 8);
        assert!(matches!(summary.stop, StopReason::HealthDegraded(r) if r.repetition_count_failed));
        assert_eq!(summary.result(), Err(HsmError::HARNESS_HEALTH_DEGRADED));
    }

    struct ClosedPipe;
    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }
        fn flush(&mut self) -> io::Result<()> {
            Err(io::ErrorKind::BrokenPipe.into())
        }
    }

    struct FlushFails(Vec<u8>);
    impl Write for FlushFails {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "device gone"))
        }
    }

    #[test]
    fn test_timeout_logs_flush_failure() {
        let buf = LogBuffer::new();
        let mut trng = Trng::new(
            BusMmio::new(HsmPeripheral::new(HsmArgs::with_words([5]))),
            PollBudget::new(100),
            Output::new(buf.clone()),
        );
        let mut out = FlushFails(Vec::new());
        assert_eq!(
            run_stream(&mut trng, &StreamConfig::default(), &CancelToken::new(), &mut out),
            Err(HsmError::DRIVER_TRNG_SAMPLE_TIMEOUT)
        );
        assert_eq!(out.0, b"0x00000005\n");
        let messages = buf.messages();
        assert!(messages.contains(&"stream: output flush failed: device gone".to_string()));
        assert!(messages
            .iter()
            .any(|m| m.starts_with("stream: stopped after 1 samples")));
    }

    struct FullDisk;
    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_output_errors() {
        let mut trng = trng(HsmArgs::with_words(0..));
        let summary =
            run_stream(&mut trng, &StreamConfig::default(), &CancelToken::new(), &mut ClosedPipe)
                .unwrap();
        assert_eq!(summary.stop, StopReason::OutputClosed);
        assert_eq!(summary.samples, 0);

        assert_eq!(
            run_stream(&mut trng, &StreamConfig::default(), &CancelToken::new(), &mut FullDisk),
            Err(HsmError::HARNESS_OUTPUT_WRITE_FAILED)
        );
    }
}
