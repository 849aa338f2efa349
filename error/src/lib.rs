/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the error type shared by the peripheral drivers, the
    known-answer tests and the verification harness.

--*/
#![cfg_attr(not(feature = "std"), no_std)]
use core::convert::From;
use core::fmt;
use core::num::{NonZeroU32, TryFromIntError};

/// HSM Error Type
///
/// The upper 16 bits select the component, the lower 16 bits the failure.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HsmError(pub NonZeroU32);

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code, plus a lookup of the
/// description used by the `Display` impl.
#[macro_export]
macro_rules! define_error_constants {
    ($(($name:ident, $value:literal, $doc:literal)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: HsmError = HsmError::new_const($value);
        )*

        /// Returns the human readable description of a known error code.
        pub fn description(&self) -> Option<&'static str> {
            match self.0.get() {
                $(
                    $value => Some($doc),
                )*
                _ => None,
            }
        }

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(&'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl HsmError {
    const COMPONENT_AES: u32 = 0x0001;
    const COMPONENT_TRNG: u32 = 0x0002;

    /// Create an error; intended to only be used from const contexts, as we don't want
    /// runtime panics if val is zero. The preferred way to get an HsmError from a u32 is to
    /// use `HsmError::try_from()` from the `TryFrom` trait impl.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("HsmError cannot be 0"),
        }
    }

    define_error_constants![
        (
            DRIVER_AES_KEY_EXPANSION_TIMEOUT,
            0x0001_0001,
            "AES key load: key expansion did not complete within the poll budget"
        ),
        (
            DRIVER_AES_ENCRYPTION_TIMEOUT,
            0x0001_0002,
            "AES encrypt: done flag was not observed within the poll budget"
        ),
        (
            DRIVER_AES_KEY_NOT_LOADED,
            0x0001_0003,
            "AES encrypt: no key loaded since the last reset or timeout"
        ),
        (
            DRIVER_TRNG_SAMPLE_TIMEOUT,
            0x0002_0001,
            "TRNG sample: sample counter did not advance within the poll budget"
        ),
        (
            DRIVER_TRNG_OUTPUT_FROZEN,
            0x0002_0002,
            "TRNG sample: output did not change across consecutive samples"
        ),
        (
            DRIVER_HSM_SCRATCH_MISMATCH,
            0x0002_0003,
            "HSM scratch register did not read back the written value"
        ),
        (
            KAT_AES_CIPHERTEXT_MISMATCH,
            0x0003_0001,
            "AES known-answer test: ciphertext mismatch"
        ),
        (
            HARNESS_HEALTH_DEGRADED,
            0x0004_0001,
            "TRNG health monitor reported a failure"
        ),
        (
            HARNESS_OUTPUT_WRITE_FAILED,
            0x0004_0002,
            "Failed to write sample output"
        ),
    ];

    /// Returns true for the bounded-wait failures a caller may retry with a
    /// fresh handshake.
    pub fn is_timeout(&self) -> bool {
        *self == Self::DRIVER_AES_KEY_EXPANSION_TIMEOUT
            || *self == Self::DRIVER_AES_ENCRYPTION_TIMEOUT
            || *self == Self::DRIVER_TRNG_SAMPLE_TIMEOUT
    }

    /// Component selector from the upper half of the code.
    pub fn component(&self) -> u32 {
        self.0.get() >> 16
    }

    pub fn is_aes(&self) -> bool {
        self.component() == Self::COMPONENT_AES
    }

    pub fn is_trng(&self) -> bool {
        self.component() == Self::COMPONENT_TRNG
    }
}

impl fmt::Display for HsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(desc) => write!(f, "{desc} (0x{:08x})", self.0.get()),
            None => write!(f, "unknown error 0x{:08x}", self.0.get()),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HsmError {}

impl From<core::num::NonZeroU32> for crate::HsmError {
    fn from(val: core::num::NonZeroU32) -> Self {
        crate::HsmError(val)
    }
}

impl From<HsmError> for core::num::NonZeroU32 {
    fn from(val: HsmError) -> Self {
        val.0
    }
}

impl From<HsmError> for u32 {
    fn from(val: HsmError) -> Self {
        core::num::NonZeroU32::from(val).get()
    }
}

impl TryFrom<u32> for HsmError {
    type Error = TryFromIntError;
    fn try_from(val: u32) -> Result<Self, TryFromIntError> {
        match NonZeroU32::try_from(val) {
            Ok(val) => Ok(HsmError(val)),
            Err(err) => Err(err),
        }
    }
}

pub type HsmResult<T> = Result<T, HsmError>;
