// Licensed under the Apache-2.0 license.

//! AES-256 accelerator (aes_axi_wrapper).

use tock_registers::register_bitfields;

/// Physical base address as assigned in the FPGA address editor.
pub const BASE_ADDR: u64 = 0x4000_1000;
/// Length of the register window in bytes.
pub const SIZE: usize = 0x1000;

/// Control register (write).
pub const CTRL: u32 = 0x00;
/// Status register (read).
pub const STATUS: u32 = 0x04;
/// Key word 0, bits [255:224]. Words 1..7 follow at 4 byte strides.
pub const KEY_W0: u32 = 0x10;
/// Plaintext word 0, bits [127:96].
pub const PTEXT_W0: u32 = 0x30;
/// Ciphertext word 0, bits [127:96].
pub const CTEXT_W0: u32 = 0x40;

pub const KEY_WORDS: usize = 8;
pub const BLOCK_WORDS: usize = 4;

/// Offset of key word `idx`, most-significant word first.
pub const fn key_word(idx: usize) -> u32 {
    KEY_W0 + (idx as u32) * crate::REG_SIZE
}

/// Offset of plaintext word `idx`, most-significant word first.
pub const fn ptext_word(idx: usize) -> u32 {
    PTEXT_W0 + (idx as u32) * crate::REG_SIZE
}

/// Offset of ciphertext word `idx`, most-significant word first.
pub const fn ctext_word(idx: usize) -> u32 {
    CTEXT_W0 + (idx as u32) * crate::REG_SIZE
}

register_bitfields! [
    u32,
    pub Ctrl [
        KEY_LOAD OFFSET(0) NUMBITS(1) [],
        ENCRYPT OFFSET(1) NUMBITS(1) [],
        CLEAR OFFSET(2) NUMBITS(1) [],
    ],
    pub Status [
        READY OFFSET(0) NUMBITS(1) [],
        BUSY OFFSET(1) NUMBITS(1) [],
        DONE OFFSET(2) NUMBITS(1) [],
    ],
];
