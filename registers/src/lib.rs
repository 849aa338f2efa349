// Licensed under the Apache-2.0 license
//
// Register map of the FPGA peripherals driven from the host.
//
// Every register is 32 bits wide and word aligned. Offsets are byte offsets
// from the peripheral base address.
#![no_std]

pub mod aes;
pub mod hsm;

/// Size in bytes of one register.
pub const REG_SIZE: u32 = 4;
