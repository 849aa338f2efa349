// Licensed under the Apache-2.0 license

use std::error::Error;

use hsm_emu_periph::{AesArgs, AesPeripheral, HsmArgs, HsmPeripheral};

use crate::{BusMmio, HwModel};

/// Hands out register windows backed by emulated peripherals.
#[derive(Default)]
pub struct ModelEmulated {
    aes_args: Option<AesArgs>,
    hsm_args: Option<HsmArgs>,
}

impl ModelEmulated {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aes_args(mut self, args: AesArgs) -> Self {
        self.aes_args = Some(args);
        self
    }

    pub fn with_hsm_args(mut self, args: HsmArgs) -> Self {
        self.hsm_args = Some(args);
        self
    }
}

impl HwModel for ModelEmulated {
    type AesWindow = BusMmio<AesPeripheral>;
    type HsmWindow = BusMmio<HsmPeripheral>;

    fn open_aes(&mut self) -> Result<Self::AesWindow, Box<dyn Error + Send + Sync>> {
        let args = self.aes_args.take().unwrap_or_default();
        Ok(BusMmio::new(AesPeripheral::new(args)))
    }

    fn open_hsm(&mut self) -> Result<Self::HsmWindow, Box<dyn Error + Send + Sync>> {
        let args = self.hsm_args.take().unwrap_or_default();
        Ok(BusMmio::new(HsmPeripheral::new(args)))
    }

    fn name(&self) -> &'static str {
        "emulated"
    }
}
