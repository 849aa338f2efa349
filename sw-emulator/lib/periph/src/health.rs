/*++

Licensed under the Apache-2.0 license.

File Name:

    health.rs

Abstract:

    File contains the continuous health tests run on the raw ring oscillator
    nibbles of the emulated HSM peripheral.

--*/

/// The oscillator bank produces four independent lanes per sample.
pub const LANES: usize = 4;

/// Adaptive proportion windows are non-overlapping and this many bits long.
pub const APT_WINDOW_BITS: u32 = 2048;

/// Consecutive identical bits on one lane that trip the repetition count test.
pub const DEFAULT_RCT_CUTOFF: u32 = 32;

/// Minimum number of ones expected in one APT window.
pub const DEFAULT_APT_LO: u32 = 870;

/// Maximum number of ones expected in one APT window.
pub const DEFAULT_APT_HI: u32 = 1178;

/// Runs both tests over every nibble it is fed and latches failures until
/// [`HealthTester::reset`] is called.
pub struct HealthTester {
    pub rct: RepetitionCountTester,
    pub apt: AdaptiveProportionTester,
}

impl Default for HealthTester {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTester {
    pub fn new() -> Self {
        Self {
            rct: RepetitionCountTester::new(DEFAULT_RCT_CUTOFF),
            apt: AdaptiveProportionTester::new(DEFAULT_APT_LO, DEFAULT_APT_HI),
        }
    }

    pub fn feed(&mut self, nibble: u8) {
        self.rct.feed(nibble);
        self.apt.feed(nibble);
    }

    pub fn rct_failed(&self) -> bool {
        self.rct.failures() > 0
    }

    pub fn apt_failed(&self) -> bool {
        self.apt.lo_failures() + self.apt.hi_failures() > 0
    }

    pub fn failed(&self) -> bool {
        self.rct_failed() || self.apt_failed()
    }

    /// Drop latched failures and restart both tests.
    pub fn reset(&mut self) {
        self.rct = RepetitionCountTester::new(self.rct.cutoff);
        self.apt = AdaptiveProportionTester::new(self.apt.lo, self.apt.hi);
    }
}

/// Counts runs of the same bit on each oscillator lane independently.
pub struct RepetitionCountTester {
    cutoff: u32,
    last: [Option<bool>; LANES],
    run: [u32; LANES],
    failures: u32,
}

impl RepetitionCountTester {
    pub fn new(cutoff: u32) -> Self {
        Self {
            cutoff,
            last: [None; LANES],
            run: [0; LANES],
            failures: 0,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn feed(&mut self, nibble: u8) {
        for lane in 0..LANES {
            let bit = (nibble >> lane) & 1 == 1;
            if self.last[lane] == Some(bit) {
                self.run[lane] += 1;
                if self.run[lane] >= self.cutoff {
                    self.failures += 1;
                }
            } else {
                self.last[lane] = Some(bit);
                self.run[lane] = 1;
            }
        }
    }
}

/// Counts ones over fixed windows of [`APT_WINDOW_BITS`] bits.
pub struct AdaptiveProportionTester {
    lo: u32,
    hi: u32,
    ones: u32,
    bits: u32,
    lo_failures: u32,
    hi_failures: u32,
}

impl AdaptiveProportionTester {
    pub fn new(lo: u32, hi: u32) -> Self {
        Self {
            lo,
            hi,
            ones: 0,
            bits: 0,
            lo_failures: 0,
            hi_failures: 0,
        }
    }

    pub fn lo_failures(&self) -> u32 {
        self.lo_failures
    }

    pub fn hi_failures(&self) -> u32 {
        self.hi_failures
    }

    pub fn feed(&mut self, nibble: u8) {
        let nibble = nibble & 0xf;
        self.ones += nibble.count_ones();
        self.bits += LANES as u32;
        if self.bits < APT_WINDOW_BITS {
            return;
        }
        if self.ones < self.lo {
            self.lo_failures += 1;
        }
        if self.ones > self.hi {
            self.hi_failures += 1;
        }
        self.ones = 0;
        self.bits = 0;
    }
}
