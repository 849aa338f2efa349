/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the HSM Known Answer Tests.

--*/

mod aes256_kat;

pub use aes256_kat::{Aes256Kat, AesVector, KatOutcome, KatSummary, AES256_VECTORS};
pub use hsm_error::{HsmError, HsmResult};
