/*++

Licensed under the Apache-2.0 license.

File Name:

    aes.rs

Abstract:

    File contains the AES-256 accelerator protocol: key-load handshake,
    single block encrypt handshake and the done-clear strobe.

--*/

use hsm_error::{HsmError, HsmResult};
use hsm_hw_model::{Mmio, Output};
use hsm_registers::aes::{self as regs, Ctrl, Status};
use tock_registers::LocalRegisterCopy;

use crate::wait::{self, PollBudget};
use crate::{AesBlock, AesKey};

/// Where the accelerator is in the key-load / encrypt sequence, as last
/// driven by this handle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AesState {
    Uninitialized,
    /// A key-load strobe was issued and `ready` has not been observed yet.
    KeyLoading,
    Ready,
    /// An encrypt strobe was issued and `done` has not been observed yet.
    Encrypting,
    /// `done` was observed; the ciphertext is being read out.
    ResultReady,
}

/// A STATUS word as observed on the bus.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AesStatus(u32);

impl AesStatus {
    fn reg(&self) -> LocalRegisterCopy<u32, Status::Register> {
        LocalRegisterCopy::new(self.0)
    }

    pub fn ready(&self) -> bool {
        self.reg().is_set(Status::READY)
    }

    pub fn busy(&self) -> bool {
        self.reg().is_set(Status::BUSY)
    }

    pub fn done(&self) -> bool {
        self.reg().is_set(Status::DONE)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for AesStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:#010x} (ready={} busy={} done={})",
            self.0,
            u8::from(self.ready()),
            u8::from(self.busy()),
            u8::from(self.done())
        )
    }
}

pub struct Aes<M: Mmio> {
    mmio: M,
    budget: PollBudget,
    output: Output,
    state: AesState,
}

impl<M: Mmio> Aes<M> {
    pub fn new(mmio: M, budget: PollBudget, output: Output) -> Self {
        Self {
            mmio,
            budget,
            output,
            state: AesState::Uninitialized,
        }
    }

    pub fn state(&self) -> AesState {
        self.state
    }

    pub fn status(&self) -> AesStatus {
        AesStatus(self.mmio.read(regs::STATUS))
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

    pub fn into_inner(self) -> M {
        self.mmio
    }

    /// Load a 256-bit key and wait for key expansion to finish.
    ///
    /// # Arguments
    ///
    /// * `key` - Key words, most significant first
    ///
    /// # Errors
    ///
    /// `DRIVER_AES_KEY_EXPANSION_TIMEOUT` if `ready` is not observed within
    /// the poll budget. The state is left at [`AesState::KeyLoading`] and the
    /// whole key load may be retried.
    pub fn load_key(&mut self, key: &AesKey) -> HsmResult<()> {
        key.write_to(&self.mmio, regs::KEY_W0);
        self.state = AesState::KeyLoading;
        self.strobe(Ctrl::KEY_LOAD::SET.value);

        match wait::until(&self.budget, || self.status().ready()) {
            Some(polls) => {
                self.state = AesState::Ready;
                self.output
                    .log(format_args!("aes: key loaded after {polls} polls"));
                Ok(())
            }
            None => {
                let err = HsmError::DRIVER_AES_KEY_EXPANSION_TIMEOUT;
                self.output.log(format_args!(
                    "aes: {err} after {} polls, status {}",
                    self.budget.max_attempts,
                    self.status()
                ));
                Err(err)
            }
        }
    }

    /// Encrypt one block with the loaded key.
    ///
    /// A `done` latch left over from an earlier timed out block is cleared
    /// before the plaintext is written. On success the ciphertext has been
    /// read out and the `done` latch cleared, so the accelerator is ready for
    /// the next block.
    ///
    /// # Errors
    ///
    /// * `DRIVER_AES_KEY_NOT_LOADED` unless the state is [`AesState::Ready`]
    /// * `DRIVER_AES_ENCRYPTION_TIMEOUT` if `done` is not observed within the
    ///   poll budget; the state stays [`AesState::Encrypting`] until the next
    ///   key load
    pub fn encrypt(&mut self, plaintext: &AesBlock) -> HsmResult<AesBlock> {
        if self.state != AesState::Ready {
            return Err(HsmError::DRIVER_AES_KEY_NOT_LOADED);
        }

        // A slow block that timed out may have latched `done` since.
        if self.status().done() {
            self.strobe(Ctrl::CLEAR::SET.value);
        }

        plaintext.write_to(&self.mmio, regs::PTEXT_W0);
        self.state = AesState::Encrypting;
        self.strobe(Ctrl::ENCRYPT::SET.value);

        let Some(polls) = wait::until(&self.budget, || self.status().done()) else {
            let err = HsmError::DRIVER_AES_ENCRYPTION_TIMEOUT;
            self.output.log(format_args!(
                "aes: {err} after {} polls, status {}",
                self.budget.max_attempts,
                self.status()
            ));
            return Err(err);
        };
        self.state = AesState::ResultReady;

        let ciphertext = AesBlock::read_from(&self.mmio, regs::CTEXT_W0);
        self.strobe(Ctrl::CLEAR::SET.value);
        self.state = AesState::Ready;
        self.output
            .log(format_args!("aes: block encrypted after {polls} polls"));
        Ok(ciphertext)
    }

    /// Pulse a control bit: low, high, low.
    fn strobe(&self, bit: u32) {
        self.mmio.write(regs::CTRL, 0);
        self.mmio.write(regs::CTRL, bit);
        self.mmio.write(regs::CTRL, 0);
    }
}
