// Licensed under the Apache-2.0 license

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes256;
use hsm_emu_bus::{Bus, BusError, RegAddr, RegData};
use hsm_registers::aes::{self as regs, Ctrl, Status, BLOCK_WORDS, KEY_WORDS};
use tock_registers::LocalRegisterCopy;

/// Timing and fault-injection knobs for [`AesPeripheral`].
#[derive(Clone, Debug)]
pub struct AesArgs {
    /// Number of STATUS reads after a key-load edge until `ready` is reported.
    pub key_expansion_latency: u32,

    /// Number of STATUS reads after an encrypt edge until `done` is reported.
    pub encrypt_latency: u32,

    /// Key expansion never completes while set.
    pub stall_key_expansion: bool,

    /// Encryption never completes while set.
    pub stall_encryption: bool,
}

impl Default for AesArgs {
    fn default() -> Self {
        Self {
            key_expansion_latency: 3,
            encrypt_latency: 5,
            stall_key_expansion: false,
            stall_encryption: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Pending {
    KeyExpansion { polls_left: u32 },
    Encryption { polls_left: u32 },
}

/// Register level model of the AES-256 accelerator.
///
/// Control bits act on their rising edge. `done` is a latch: it is only
/// dropped by a clear strobe, never by starting another encryption.
pub struct AesPeripheral {
    ctrl: LocalRegisterCopy<u32, Ctrl::Register>,
    status: LocalRegisterCopy<u32, Status::Register>,
    key: [u32; KEY_WORDS],
    ptext: [u32; BLOCK_WORDS],
    ctext: [u32; BLOCK_WORDS],
    cipher: Option<Aes256>,
    pending: Option<Pending>,
    args: AesArgs,
    key_loads: u32,
    encryptions: u32,
    clears: u32,
}

impl Default for AesPeripheral {
    fn default() -> Self {
        Self::new(AesArgs::default())
    }
}

impl AesPeripheral {
    pub fn new(args: AesArgs) -> Self {
        Self {
            ctrl: LocalRegisterCopy::new(0),
            status: LocalRegisterCopy::new(0),
            key: [0; KEY_WORDS],
            ptext: [0; BLOCK_WORDS],
            ctext: [0; BLOCK_WORDS],
            cipher: None,
            pending: None,
            args,
            key_loads: 0,
            encryptions: 0,
            clears: 0,
        }
    }

    pub fn set_stall_key_expansion(&mut self, stall: bool) {
        self.args.stall_key_expansion = stall;
    }

    pub fn set_stall_encryption(&mut self, stall: bool) {
        self.args.stall_encryption = stall;
    }

    /// Last value written to CTRL.
    pub fn ctrl(&self) -> u32 {
        self.ctrl.get()
    }

    /// Number of key-load rising edges seen.
    pub fn key_loads(&self) -> u32 {
        self.key_loads
    }

    /// Number of encrypt rising edges seen.
    pub fn encryptions(&self) -> u32 {
        self.encryptions
    }

    /// Number of clear rising edges seen.
    pub fn clears(&self) -> u32 {
        self.clears
    }

    pub fn is_done(&self) -> bool {
        self.status.is_set(Status::DONE)
    }

    fn key_bytes(&self) -> [u8; 32] {
        let mut key = [0u8; 32];
        for (chunk, word) in key.chunks_exact_mut(4).zip(self.key.iter()) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        key
    }

    fn write_ctrl(&mut self, val: RegData) {
        let prev = self.ctrl.get();
        let rising = LocalRegisterCopy::<u32, Ctrl::Register>::new(val & !prev);
        self.ctrl.set(val);

        if rising.is_set(Ctrl::KEY_LOAD) {
            self.key_loads += 1;
            self.cipher = None;
            self.status.modify(Status::READY::CLEAR + Status::BUSY::SET);
            self.pending = Some(Pending::KeyExpansion {
                polls_left: self.args.key_expansion_latency,
            });
        }
        if rising.is_set(Ctrl::ENCRYPT) {
            self.encryptions += 1;
            self.status.modify(Status::BUSY::SET);
            self.pending = Some(Pending::Encryption {
                polls_left: self.args.encrypt_latency,
            });
        }
        if rising.is_set(Ctrl::CLEAR) {
            self.clears += 1;
            self.status.modify(Status::DONE::CLEAR);
        }
    }

    fn step(&mut self) {
        let Some(pending) = self.pending else {
            return;
        };
        match pending {
            Pending::KeyExpansion { polls_left } => {
                if self.args.stall_key_expansion {
                    return;
                }
                if polls_left > 1 {
                    self.pending = Some(Pending::KeyExpansion {
                        polls_left: polls_left - 1,
                    });
                    return;
                }
                self.cipher = Some(Aes256::new(&GenericArray::from(self.key_bytes())));
                self.status.modify(Status::READY::SET + Status::BUSY::CLEAR);
                self.pending = None;
            }
            Pending::Encryption { polls_left } => {
                // Without an expanded key the core never leaves busy.
                if self.args.stall_encryption || self.cipher.is_none() {
                    return;
                }
                if polls_left > 1 {
                    self.pending = Some(Pending::Encryption {
                        polls_left: polls_left - 1,
                    });
                    return;
                }
                self.encrypt_block();
                self.status.modify(Status::DONE::SET + Status::BUSY::CLEAR);
                self.pending = None;
            }
        }
    }

    fn encrypt_block(&mut self) {
        let Some(cipher) = &self.cipher else {
            return;
        };
        let mut block = GenericArray::from([0u8; 16]);
        for (chunk, word) in block.chunks_exact_mut(4).zip(self.ptext.iter()) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        cipher.encrypt_block(&mut block);
        for (word, chunk) in self.ctext.iter_mut().zip(block.chunks_exact(4)) {
            *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
    }
}

fn word_index(addr: RegAddr, base: RegAddr, len: usize) -> Option<usize> {
    let idx = (addr.checked_sub(base)? / 4) as usize;
    (idx < len).then_some(idx)
}

impl Bus for AesPeripheral {
    fn read(&mut self, addr: RegAddr) -> Result<RegData, BusError> {
        if addr % 4 != 0 {
            return Err(BusError::LoadAddrMisaligned);
        }
        if addr as usize >= regs::SIZE {
            return Err(BusError::LoadAccessFault);
        }
        match addr {
            regs::CTRL => Ok(self.ctrl.get()),
            regs::STATUS => {
                self.step();
                Ok(self.status.get())
            }
            _ => match word_index(addr, regs::CTEXT_W0, BLOCK_WORDS) {
                Some(idx) => Ok(self.ctext[idx]),
                // Write-only and unmapped registers read as zero.
                None => Ok(0),
            },
        }
    }

    fn write(&mut self, addr: RegAddr, val: RegData) -> Result<(), BusError> {
        if addr % 4 != 0 {
            return Err(BusError::StoreAddrMisaligned);
        }
        if addr as usize >= regs::SIZE {
            return Err(BusError::StoreAccessFault);
        }
        if addr == regs::CTRL {
            self.write_ctrl(val);
        } else if let Some(idx) = word_index(addr, regs::KEY_W0, KEY_WORDS) {
            self.key[idx] = val;
        } else if let Some(idx) = word_index(addr, regs::PTEXT_W0, BLOCK_WORDS) {
            self.ptext[idx] = val;
        }
        Ok(())
    }
}
