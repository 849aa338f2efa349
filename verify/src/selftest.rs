// Licensed under the Apache-2.0 license

use std::fmt;

use hsm_drivers::{HealthReport, Trng};
use hsm_error::HsmResult;
use hsm_hw_model::Mmio;

/// Word written to the scratch register.
pub const SCRATCH_PATTERN: u32 = 0xdead_beef;

/// Outcome of every HSM self-test step. All steps run even if an earlier one
/// fails.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SelftestReport {
    pub scratch: HsmResult<()>,
    /// COUNTER moved between two consecutive reads.
    pub counter_running: bool,
    pub oscillator_running: bool,
    pub health: HealthReport,
    pub not_frozen: HsmResult<()>,
}

impl SelftestReport {
    pub fn passed(&self) -> bool {
        self.scratch.is_ok()
            && self.counter_running
            && self.oscillator_running
            && !self.health.is_degraded()
            && self.not_frozen.is_ok()
    }
}

fn verdict(res: &HsmResult<()>) -> String {
    match res {
        Ok(()) => "PASS".into(),
        Err(err) => format!("FAIL ({err})"),
    }
}

impl fmt::Display for SelftestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "scratch register: {}", verdict(&self.scratch))?;
        writeln!(
            f,
            "counter:          {}",
            if self.counter_running { "running" } else { "STOPPED" }
        )?;
        writeln!(
            f,
            "oscillator:       {}",
            if self.oscillator_running { "running" } else { "STOPPED" }
        )?;
        writeln!(f, "health monitor:   {}", self.health)?;
        write!(f, "output changes:   {}", verdict(&self.not_frozen))
    }
}

/// Scratch round trip, free-running counter check, oscillator check, health
/// report and a frozen-output check over `repeats + 1` samples.
pub fn run_selftest<M: Mmio>(trng: &mut Trng<M>, repeats: u32) -> SelftestReport {
    let scratch = trng.scratch_round_trip(SCRATCH_PATTERN);
    let first = trng.free_running_counter();
    let counter_running = trng.free_running_counter() != first;
    trng.enable();
    let status = trng.status();
    let not_frozen = trng.check_not_frozen(repeats);
    SelftestReport {
        scratch,
        counter_running,
        oscillator_running: status.oscillator_running(),
        health: trng.check_health(),
        not_frozen,
    }
}
