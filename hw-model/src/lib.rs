// Licensed under the Apache-2.0 license

//! Access to the AES accelerator and HSM register windows, either on the FPGA
//! through `/dev/mem` or against the in-process emulated peripherals.

use std::error::Error;

mod dev_mem;
mod mmio;
mod model_emulated;
mod model_fpga;
mod output;

pub use dev_mem::{DevMemWindow, MapError, MapStage};
pub use mmio::{BusMmio, Mmio};
pub use model_emulated::ModelEmulated;
pub use model_fpga::{parse_phys_addr, AddrVarError, ModelFpga, AES_BASE_VAR, HSM_BASE_VAR};
pub use output::{LogBuffer, Output, PrettyU64};

pub use hsm_emu_periph::{AesArgs, HsmArgs};

/// Source of peripheral register windows.
///
/// Each window is opened independently so a tool that only talks to one
/// peripheral never maps the other.
pub trait HwModel {
    type AesWindow: Mmio;
    type HsmWindow: Mmio;

    /// Open the AES accelerator window.
    fn open_aes(&mut self) -> Result<Self::AesWindow, Box<dyn Error + Send + Sync>>;

    /// Open the HSM/TRNG window.
    fn open_hsm(&mut self) -> Result<Self::HsmWindow, Box<dyn Error + Send + Sync>>;

    /// Short name used in log lines.
    fn name(&self) -> &'static str;
}
