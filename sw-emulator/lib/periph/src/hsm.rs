/*++

Licensed under the Apache-2.0 license.

File Name:

    hsm.rs

Abstract:

    File contains the register level model of the HSM peripheral: a ring
    oscillator TRNG with a sample counter handshake and latched health
    monitors.

--*/

use crate::health::HealthTester;
use hsm_emu_bus::{Bus, BusError, RegAddr, RegData};
use hsm_registers::hsm::{self as regs, Ctrl, Status};
use tock_registers::LocalRegisterCopy;

pub struct HsmArgs {
    /// Number of SAMPLE_CNT reads after a sample edge until the count advances.
    pub sample_latency: u32,

    /// Source of sampled words. Once it runs dry, samples never complete.
    pub entropy: Box<dyn Iterator<Item = u32>>,

    /// SAMPLE_CNT value out of reset.
    pub initial_sample_count: u32,
}

impl Default for HsmArgs {
    fn default() -> Self {
        Self {
            sample_latency: 2,
            entropy: Box::new(std::iter::repeat_with(rand::random::<u32>)),
            initial_sample_count: 0,
        }
    }
}

impl HsmArgs {
    /// Entropy source that yields `words` in order and then stops.
    pub fn with_words(words: impl IntoIterator<Item = u32> + 'static) -> Self {
        Self {
            entropy: Box::new(words.into_iter()),
            ..Default::default()
        }
    }
}

pub struct HsmPeripheral {
    ctrl: LocalRegisterCopy<u32, Ctrl::Register>,
    data_in: u32,
    counter: u32,
    trng_out: u32,
    sample_count: u32,
    pending: Option<u32>,
    stall_sampler: bool,
    sample_triggers: u32,
    sample_latency: u32,
    entropy: Box<dyn Iterator<Item = u32>>,
    health: HealthTester,
}

impl Default for HsmPeripheral {
    fn default() -> Self {
        Self::new(HsmArgs::default())
    }
}

impl HsmPeripheral {
    pub fn new(args: HsmArgs) -> Self {
        Self {
            ctrl: LocalRegisterCopy::new(regs::CTRL_DISABLED),
            data_in: 0,
            counter: 0,
            trng_out: 0,
            sample_count: args.initial_sample_count,
            pending: None,
            stall_sampler: false,
            sample_triggers: 0,
            sample_latency: args.sample_latency.max(1),
            entropy: args.entropy,
            health: HealthTester::new(),
        }
    }

    /// Last value written to CTRL.
    pub fn ctrl(&self) -> u32 {
        self.ctrl.get()
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Number of SAMPLE rising edges accepted while enabled.
    pub fn sample_triggers(&self) -> u32 {
        self.sample_triggers
    }

    /// Pending samples never complete while set.
    pub fn set_stall_sampler(&mut self, stall: bool) {
        self.stall_sampler = stall;
    }

    pub fn health(&self) -> &HealthTester {
        &self.health
    }

    fn enabled(&self) -> bool {
        self.ctrl.is_set(Ctrl::ENABLE)
    }

    fn raw_nibble(&self) -> u32 {
        if !self.enabled() {
            return 0;
        }
        let shift = (self.counter % 8) * 4;
        (self.trng_out.rotate_right(shift) ^ self.counter) & 0xf
    }

    fn status(&self) -> u32 {
        let mut status = LocalRegisterCopy::<u32, Status::Register>::new(0);
        status.modify(
            Status::OSC_RUNNING.val(u32::from(self.enabled()))
                + Status::RAW_OSC.val(self.raw_nibble())
                + Status::HEALTH_FAIL.val(u32::from(self.health.failed()))
                + Status::RCT_FAIL.val(u32::from(self.health.rct_failed()))
                + Status::APT_FAIL.val(u32::from(self.health.apt_failed())),
        );
        status.get()
    }

    fn write_ctrl(&mut self, val: RegData) {
        let prev = self.ctrl.get();
        let rising = LocalRegisterCopy::<u32, Ctrl::Register>::new(val & !prev);
        self.ctrl.set(val);

        if !self.enabled() {
            self.pending = None;
        }
        if rising.is_set(Ctrl::CLEAR) {
            self.trng_out = 0;
            self.health.reset();
        }
        if rising.is_set(Ctrl::SAMPLE) && self.enabled() {
            self.sample_triggers += 1;
            self.pending = Some(self.sample_latency);
        }
    }

    fn step_sampler(&mut self) {
        let Some(polls_left) = self.pending else {
            return;
        };
        if self.stall_sampler {
            return;
        }
        if polls_left > 1 {
            self.pending = Some(polls_left - 1);
            return;
        }
        let Some(word) = self.entropy.next() else {
            return;
        };
        self.trng_out = word;
        self.sample_count = self.sample_count.wrapping_add(1);
        self.pending = None;
        for i in 0..8 {
            self.health.feed(((word >> (i * 4)) & 0xf) as u8);
        }
    }
}

impl Bus for HsmPeripheral {
    fn read(&mut self, addr: RegAddr) -> Result<RegData, BusError> {
        if addr % 4 != 0 {
            return Err(BusError::LoadAddrMisaligned);
        }
        if addr as usize >= regs::SIZE {
            return Err(BusError::LoadAccessFault);
        }
        self.counter = self.counter.wrapping_add(1);
        let val = match addr {
            regs::CTRL => self.ctrl.get(),
            regs::STATUS => self.status(),
            regs::DATA_IN => self.data_in,
            regs::RAW_OSC => self.raw_nibble(),
            regs::COUNTER => self.counter,
            regs::TRNG_OUT => self.trng_out,
            regs::SAMPLE_CNT => {
                self.step_sampler();
                self.sample_count
            }
            _ => 0,
        };
        Ok(val)
    }

    fn write(&mut self, addr: RegAddr, val: RegData) -> Result<(), BusError> {
        if addr % 4 != 0 {
            return Err(BusError::StoreAddrMisaligned);
        }
        if addr as usize >= regs::SIZE {
            return Err(BusError::StoreAccessFault);
        }
        self.counter = self.counter.wrapping_add(1);
        match addr {
            regs::CTRL => self.write_ctrl(val),
            regs::DATA_IN => self.data_in = val,
            _ => {}
        }
        Ok(())
    }
}
