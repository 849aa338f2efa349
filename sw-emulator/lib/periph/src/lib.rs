/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the HSM Emulator Peripheral library: register
    level models of the AES-256 accelerator and the HSM/TRNG peripheral.

--*/
mod aes;
mod health;
mod hsm;

pub use crate::aes::{AesArgs, AesPeripheral};
pub use crate::health::{AdaptiveProportionTester, HealthTester, RepetitionCountTester};
pub use crate::hsm::{HsmArgs, HsmPeripheral};
