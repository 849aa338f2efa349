// Licensed under the Apache-2.0 license.

//! HSM peripheral: ring-oscillator TRNG with health monitors.

use tock_registers::register_bitfields;

/// Physical base address as assigned in the FPGA address editor.
pub const BASE_ADDR: u64 = 0x4000_0000;
/// Length of the register window in bytes.
pub const SIZE: usize = 0x1000;

/// Control register; reads back the last written value. The SAMPLE bit is
/// edge triggered: hardware takes a sample on its 0 -> 1 transition only.
pub const CTRL: u32 = 0x00;
/// Status register (read).
pub const STATUS: u32 = 0x04;
/// Scratch data register, read-back capable.
pub const DATA_IN: u32 = 0x08;
/// Reserved data output.
pub const DATA_OUT: u32 = 0x0c;
/// Raw oscillator outputs in bits [3:0] (debug).
pub const RAW_OSC: u32 = 0x10;
/// Free running counter (debug).
pub const COUNTER: u32 = 0x14;
/// Latest random word.
pub const TRNG_OUT: u32 = 0x18;
/// Number of samples taken since reset.
pub const SAMPLE_CNT: u32 = 0x1c;

/// Value of CTRL with every control bit cleared.
pub const CTRL_DISABLED: u32 = 0;

register_bitfields! [
    u32,
    pub Ctrl [
        ENABLE OFFSET(0) NUMBITS(1) [],
        SAMPLE OFFSET(1) NUMBITS(1) [],
        CLEAR OFFSET(2) NUMBITS(1) [],
    ],
    pub Status [
        OSC_RUNNING OFFSET(0) NUMBITS(1) [],
        RAW_OSC OFFSET(4) NUMBITS(4) [],
        HEALTH_FAIL OFFSET(8) NUMBITS(1) [],
        RCT_FAIL OFFSET(9) NUMBITS(1) [],
        APT_FAIL OFFSET(10) NUMBITS(1) [],
    ],
    pub RawOsc [
        BITS OFFSET(0) NUMBITS(4) [],
    ],
];
