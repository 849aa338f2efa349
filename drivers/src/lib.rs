/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the HSM driver library: the AES-256 accelerator
    and HSM/TRNG register protocols.

--*/

mod aes;
mod array;
mod trng;
pub mod wait;

pub use aes::{Aes, AesState, AesStatus};
pub use array::{AesBlock, AesKey, Array4x4, Array4x8};
pub use hsm_error::{HsmError, HsmResult};
pub use trng::{HealthReport, HsmStatus, Trng};
pub use wait::PollBudget;
