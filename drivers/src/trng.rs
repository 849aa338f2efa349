/*++

Licensed under the Apache-2.0 license.

File Name:

    trng.rs

Abstract:

    File contains the HSM peripheral protocol: the edge triggered TRNG sample
    handshake, health monitor interpretation and the debug registers.

--*/

use std::fmt;

use hsm_error::{HsmError, HsmResult};
use hsm_hw_model::{Mmio, Output};
use hsm_registers::hsm::{self as regs, Ctrl, RawOsc, Status};
use tock_registers::LocalRegisterCopy;

use crate::wait::{self, PollBudget};

/// Snapshot of the health monitor flags in STATUS.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HealthReport {
    pub oscillator_running: bool,
    pub repetition_count_failed: bool,
    pub adaptive_proportion_failed: bool,
    pub health_failed: bool,
}

impl HealthReport {
    /// The aggregate health flag is clear.
    pub fn aggregate_passed(&self) -> bool {
        !self.health_failed
    }

    /// Any of the failure flags is latched.
    pub fn is_degraded(&self) -> bool {
        self.health_failed || self.repetition_count_failed || self.adaptive_proportion_failed
    }
}

fn pass_fail(failed: bool) -> &'static str {
    if failed {
        "FAIL"
    } else {
        "pass"
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "osc={} rct={} apt={} health={}",
            if self.oscillator_running { "running" } else { "stopped" },
            pass_fail(self.repetition_count_failed),
            pass_fail(self.adaptive_proportion_failed),
            pass_fail(self.health_failed)
        )
    }
}

/// A STATUS word as observed on the bus.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HsmStatus(u32);

impl HsmStatus {
    fn reg(&self) -> LocalRegisterCopy<u32, Status::Register> {
        LocalRegisterCopy::new(self.0)
    }

    pub fn oscillator_running(&self) -> bool {
        self.reg().is_set(Status::OSC_RUNNING)
    }

    /// Raw oscillator outputs mirrored in bits 7:4.
    pub fn raw_oscillator_bits(&self) -> u8 {
        self.reg().read(Status::RAW_OSC) as u8
    }

    pub fn health(&self) -> HealthReport {
        let reg = self.reg();
        HealthReport {
            oscillator_running: reg.is_set(Status::OSC_RUNNING),
            repetition_count_failed: reg.is_set(Status::RCT_FAIL),
            adaptive_proportion_failed: reg.is_set(Status::APT_FAIL),
            health_failed: reg.is_set(Status::HEALTH_FAIL),
        }
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Returns true once `count` has moved forward from `old`, allowing for the
/// 32-bit counter wrapping.
fn advanced(old: u32, count: u32) -> bool {
    let delta = count.wrapping_sub(old);
    delta != 0 && delta < 0x8000_0000
}

/// Owner of the HSM register window.
///
/// Taking over the window writes the all-disabled control word, so a
/// peripheral left enabled by a previous owner is stopped before first use.
/// Dropping the handle writes it again if the peripheral was used since.
pub struct Trng<M: Mmio> {
    mmio: M,
    budget: PollBudget,
    output: Output,
    shut_down: bool,
}

impl<M: Mmio> Trng<M> {
    pub fn new(mmio: M, budget: PollBudget, output: Output) -> Self {
        mmio.write(regs::CTRL, regs::CTRL_DISABLED);
        Self {
            mmio,
            budget,
            output,
            shut_down: true,
        }
    }

    pub fn budget(&self) -> PollBudget {
        self.budget
    }

    pub fn set_budget(&mut self, budget: PollBudget) {
        self.budget = budget;
    }

    pub fn mmio(&self) -> &M {
        &self.mmio
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    /// Start the oscillators.
    pub fn enable(&mut self) {
        self.shut_down = false;
        self.mmio.write(regs::CTRL, Ctrl::ENABLE::SET.value);
    }

    /// Reset the output word and the latched health flags, leaving the
    /// oscillators enabled.
    pub fn clear(&mut self) {
        self.shut_down = false;
        self.mmio
            .write(regs::CTRL, (Ctrl::ENABLE::SET + Ctrl::CLEAR::SET).value);
        self.mmio.write(regs::CTRL, Ctrl::ENABLE::SET.value);
    }

    /// Take one 32-bit sample.
    ///
    /// Every call produces a fresh 0 -> 1 edge on the sample bit and waits
    /// for SAMPLE_CNT to move past the value read before the edge. Any word,
    /// `0xffff_ffff` included, is a valid sample.
    ///
    /// # Errors
    ///
    /// `DRIVER_TRNG_SAMPLE_TIMEOUT` if the counter does not advance within
    /// the poll budget. The handshake is not retried.
    pub fn sample(&mut self) -> HsmResult<u32> {
        self.shut_down = false;
        let old_count = self.sample_count();
        self.mmio.write(regs::CTRL, Ctrl::ENABLE::SET.value);
        self.mmio
            .write(regs::CTRL, (Ctrl::ENABLE::SET + Ctrl::SAMPLE::SET).value);

        let mmio = &self.mmio;
        let polls = wait::until(&self.budget, || {
            advanced(old_count, mmio.read(regs::SAMPLE_CNT))
        });
        if polls.is_none() {
            let err = HsmError::DRIVER_TRNG_SAMPLE_TIMEOUT;
            self.output.log(format_args!(
                "hsm: {err}: SAMPLE_CNT stuck at {old_count} after {} polls",
                self.budget.max_attempts
            ));
            return Err(err);
        }
        Ok(self.mmio.read(regs::TRNG_OUT))
    }

    /// Read the health monitor flags. Has no side effects on the peripheral.
    pub fn check_health(&self) -> HealthReport {
        self.status().health()
    }

    pub fn status(&self) -> HsmStatus {
        HsmStatus(self.mmio.read(regs::STATUS))
    }

    pub fn sample_count(&self) -> u32 {
        self.mmio.read(regs::SAMPLE_CNT)
    }

    pub fn raw_oscillator_bits(&self) -> u8 {
        let raw = LocalRegisterCopy::<u32, RawOsc::Register>::new(self.mmio.read(regs::RAW_OSC));
        raw.read(RawOsc::BITS) as u8
    }

    pub fn free_running_counter(&self) -> u32 {
        self.mmio.read(regs::COUNTER)
    }

    /// Write `value` to the scratch register and check it reads back.
    pub fn scratch_round_trip(&mut self, value: u32) -> HsmResult<()> {
        self.mmio.write(regs::DATA_IN, value);
        let got = self.mmio.read(regs::DATA_IN);
        if got != value {
            self.output.log(format_args!(
                "hsm: scratch wrote {value:#010x}, read back {got:#010x}"
            ));
            return Err(HsmError::DRIVER_HSM_SCRATCH_MISMATCH);
        }
        Ok(())
    }

    /// Draw `repeats + 1` samples and fail if they are all identical.
    ///
    /// `repeats` is raised to 1 when 0 is passed.
    pub fn check_not_frozen(&mut self, repeats: u32) -> HsmResult<()> {
        let first = self.sample()?;
        for _ in 0..repeats.max(1) {
            if self.sample()? != first {
                return Ok(());
            }
        }
        self.output.log(format_args!(
            "hsm: output frozen at {first:#010x} for {} samples",
            repeats.max(1) + 1
        ));
        Err(HsmError::DRIVER_TRNG_OUTPUT_FROZEN)
    }

    /// Write the all-disabled control word. Calling it again is a no-op
    /// until the peripheral is used again.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.mmio.write(regs::CTRL, regs::CTRL_DISABLED);
        self.shut_down = true;
        self.output.log(format_args!("hsm: disabled"));
    }
}

impl<M: Mmio> Drop for Trng<M> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsm_emu_bus::{testing::FakeBus, Bus};
    use hsm_emu_periph::{HsmArgs, HsmPeripheral};
    use hsm_hw_model::{BusMmio, LogBuffer};

    fn emulated(args: HsmArgs, max_attempts: u32) -> Trng<BusMmio<HsmPeripheral>> {
        Trng::new(
            BusMmio::new(HsmPeripheral::new(args)),
            PollBudget::new(max_attempts),
            Output::sink(),
        )
    }

    #[test]
    fn test_sample_register_sequence() {
        let mut fake = FakeBus::new();
        fake.queue_reads(regs::SAMPLE_CNT, [5, 5, 6]);
        fake.queue_reads(regs::TRNG_OUT, [0xdead_beef]);
        let mmio = BusMmio::new(fake);
        {
            let mut trng = Trng::new(&mmio, PollBudget::new(10), Output::sink());
            assert_eq!(trng.sample(), Ok(0xdead_beef));
            assert_eq!(
                trng.mmio().bus().log.lines(),
                vec![
                    "write(0x0, 0x0)",
                    "read(0x1c)",
                    "write(0x0, 0x1)",
                    "write(0x0, 0x3)",
                    "read(0x1c)",
                    "read(0x1c)",
                    "read(0x18)",
                ]
            );
            trng.mmio().bus().log.take();
        }
        assert_eq!(mmio.bus().log.take(), "write(0x0, 0x0)\n");
    }

    #[test]
    fn test_all_ones_is_a_sample() {
        let mut trng = emulated(HsmArgs::with_words([0xffff_ffff, 0]), 100);
        assert_eq!(trng.sample(), Ok(0xffff_ffff));
        assert_eq!(trng.sample(), Ok(0));
    }

    #[test]
    fn test_sample_counter_strictly_increases() {
        let mut trng = emulated(HsmArgs::with_words(1..), 100);
        let mut last = trng.sample_count();
        for expected in 1..=20 {
            assert_eq!(trng.sample(), Ok(expected));
            let count = trng.sample_count();
            assert!(count > last);
            last = count;
        }
    }

    #[test]
    fn test_sample_timeout_then_retry() {
        let buf = LogBuffer::new();
        let mmio = BusMmio::new(HsmPeripheral::new(HsmArgs::with_words([77])));
        let mut trng = Trng::new(&mmio, PollBudget::new(8), Output::new(buf.clone()));

        trng.mmio().bus_mut().set_stall_sampler(true);
        assert_eq!(trng.sample(), Err(HsmError::DRIVER_TRNG_SAMPLE_TIMEOUT));
        assert!(buf.messages()[0].starts_with("hsm: TRNG sample:"));

        trng.mmio().bus_mut().set_stall_sampler(false);
        assert_eq!(trng.sample(), Ok(77));
    }

    #[test]
    fn test_exhausted_entropy_times_out() {
        let mut trng = emulated(HsmArgs::with_words(std::iter::empty()), 16);
        assert_eq!(trng.sample(), Err(HsmError::DRIVER_TRNG_SAMPLE_TIMEOUT));
    }

    #[test]
    fn test_counter_wrap_is_an_advance() {
        assert!(advanced(u32::MAX, 0));
        assert!(advanced(7, 8));
        assert!(!advanced(8, 8));
        assert!(!advanced(8, 7));

        let mut trng = emulated(
            HsmArgs {
                initial_sample_count: u32::MAX,
                ..HsmArgs::with_words([0x1234])
            },
            100,
        );
        assert_eq!(trng.sample(), Ok(0x1234));
        assert_eq!(trng.sample_count(), 0);
    }

    #[test]
    fn test_check_health_is_pure() {
        let mut trng = emulated(HsmArgs::default(), 100);
        trng.enable();
        let first = trng.check_health();
        let triggers = trng.mmio().bus().sample_triggers();
        for _ in 0..10 {
            assert_eq!(trng.check_health(), first);
        }
        assert_eq!(trng.mmio().bus().sample_triggers(), triggers);
        assert!(first.oscillator_running);
        assert!(first.aggregate_passed());
    }

    #[test]
    fn test_stuck_source_degrades_health() {
        let mut trng = emulated(HsmArgs::with_words(std::iter::repeat(0)), 100);
        for _ in 0..8 {
            trng.sample().unwrap();
        }
        let report = trng.check_health();
        assert!(report.repetition_count_failed);
        assert!(report.is_degraded());
        assert!(!report.aggregate_passed());
        assert_eq!(report.to_string(), "osc=running rct=FAIL apt=pass health=FAIL");

        trng.clear();
        assert!(!trng.check_health().is_degraded());
    }

    #[test]
    fn test_status_decoding() {
        let status = HsmStatus(0x7a1);
        assert!(status.oscillator_running());
        assert_eq!(status.raw_oscillator_bits(), 0xa);
        assert_eq!(
            status.health(),
            HealthReport {
                oscillator_running: true,
                repetition_count_failed: true,
                adaptive_proportion_failed: true,
                health_failed: true,
            }
        );
    }

    #[test]
    fn test_scratch_round_trip() {
        let mut trng = emulated(HsmArgs::default(), 100);
        trng.scratch_round_trip(0x5a5a_a5a5).unwrap();
        trng.scratch_round_trip(0xffff_ffff).unwrap();

        let mut fake = FakeBus::new();
        fake.read_result = Ok(0);
        let mut broken = Trng::new(BusMmio::new(fake), PollBudget::new(1), Output::sink());
        assert_eq!(
            broken.scratch_round_trip(1),
            Err(HsmError::DRIVER_HSM_SCRATCH_MISMATCH)
        );
    }

    #[test]
    fn test_check_not_frozen() {
        let mut trng = emulated(HsmArgs::with_words([3, 3, 3, 4]), 100);
        trng.check_not_frozen(4).unwrap();

        let mut trng = emulated(HsmArgs::with_words(std::iter::repeat(9)), 100);
        assert_eq!(
            trng.check_not_frozen(4),
            Err(HsmError::DRIVER_TRNG_OUTPUT_FROZEN)
        );
    }

    #[test]
    fn test_debug_registers() {
        let mut trng = emulated(HsmArgs::default(), 100);
        assert_eq!(trng.raw_oscillator_bits(), 0);
        trng.enable();
        assert!(trng.raw_oscillator_bits() <= 0xf);
        let c0 = trng.free_running_counter();
        assert!(trng.free_running_counter() > c0);
    }

    #[test]
    fn test_drop_disables_peripheral() {
        let mut periph = HsmPeripheral::new(HsmArgs::with_words([1, 2]));
        {
            let mut trng = Trng::new(
                BusMmio::new(&mut periph),
                PollBudget::new(100),
                Output::sink(),
            );
            trng.sample().unwrap();
        }
        assert_eq!(periph.ctrl(), 0);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let buf = LogBuffer::new();
        let mmio = BusMmio::new(FakeBus::new());
        {
            let mut trng = Trng::new(&mmio, PollBudget::new(1), Output::new(buf.clone()));
            trng.enable();
            trng.shutdown();
            trng.shutdown();
        }
        assert_eq!(
            mmio.bus().log.take(),
            "write(0x0, 0x0)\nwrite(0x0, 0x1)\nwrite(0x0, 0x0)\n"
        );
        assert_eq!(buf.messages(), vec!["hsm: disabled"]);
    }

    #[test]
    fn test_new_disables_leftover_session() {
        let mut periph = HsmPeripheral::new(HsmArgs::with_words([1]));
        periph.write(regs::CTRL, Ctrl::ENABLE::SET.value).unwrap();
        periph
            .write(regs::CTRL, (Ctrl::ENABLE::SET + Ctrl::SAMPLE::SET).value)
            .unwrap();
        assert_eq!(periph.ctrl(), 0x3);

        let mmio = BusMmio::new(periph);
        let trng = Trng::new(&mmio, PollBudget::new(10), Output::sink());
        assert_eq!(mmio.bus().ctrl(), 0);
        assert_eq!(trng.sample_count(), 0);
        drop(trng);
        assert_eq!(mmio.bus().ctrl(), 0);
    }
}
