// Licensed under the Apache-2.0 license

use std::env;
use std::error::Error;
use std::fmt;
use std::num::ParseIntError;

use hsm_registers::{aes, hsm};

use crate::{DevMemWindow, HwModel};

/// Overrides the AES accelerator base address.
pub const AES_BASE_VAR: &str = "HSM_AES_BASE";
/// Overrides the HSM peripheral base address.
pub const HSM_BASE_VAR: &str = "HSM_TRNG_BASE";

/// Parse a hexadecimal physical address; the `0x` prefix is optional.
pub fn parse_phys_addr(s: &str) -> Result<u64, ParseIntError> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(&digits.replace('_', ""), 16)
}

#[derive(Debug)]
pub struct AddrVarError {
    pub var: &'static str,
    pub value: String,
    pub source: ParseIntError,
}

impl fmt::Display for AddrVarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={:?} is not a hex address: {}",
            self.var, self.value, self.source
        )
    }
}

impl Error for AddrVarError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Register windows on the FPGA, mapped from physical memory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ModelFpga {
    pub aes_base: u64,
    pub hsm_base: u64,
}

impl Default for ModelFpga {
    fn default() -> Self {
        Self {
            aes_base: aes::BASE_ADDR,
            hsm_base: hsm::BASE_ADDR,
        }
    }
}

impl ModelFpga {
    /// Default base addresses, overridden by `HSM_AES_BASE` / `HSM_TRNG_BASE`
    /// when set.
    pub fn from_env() -> Result<Self, AddrVarError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AddrVarError> {
        let mut model = Self::default();
        for (var, slot) in [
            (AES_BASE_VAR, &mut model.aes_base),
            (HSM_BASE_VAR, &mut model.hsm_base),
        ] {
            if let Some(value) = lookup(var) {
                *slot = parse_phys_addr(&value).map_err(|source| AddrVarError {
                    var,
                    value,
                    source,
                })?;
            }
        }
        Ok(model)
    }
}

impl HwModel for ModelFpga {
    type AesWindow = DevMemWindow;
    type HsmWindow = DevMemWindow;

    fn open_aes(&mut self) -> Result<Self::AesWindow, Box<dyn Error + Send + Sync>> {
        Ok(DevMemWindow::open(self.aes_base, aes::SIZE)?)
    }

    fn open_hsm(&mut self) -> Result<Self::HsmWindow, Box<dyn Error + Send + Sync>> {
        Ok(DevMemWindow::open(self.hsm_base, hsm::SIZE)?)
    }

    fn name(&self) -> &'static str {
        "fpga"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_phys_addr() {
        assert_eq!(parse_phys_addr("0x40001000"), Ok(0x4000_1000));
        assert_eq!(parse_phys_addr("40000000"), Ok(0x4000_0000));
        assert_eq!(parse_phys_addr(" 0X4000_2000 "), Ok(0x4000_2000));
        assert!(parse_phys_addr("0xfoo").is_err());
        assert!(parse_phys_addr("").is_err());
    }

    #[test]
    fn test_from_lookup() {
        let model = ModelFpga::from_lookup(|_| None).unwrap();
        assert_eq!(model, ModelFpga::default());
        assert_eq!(model.aes_base, 0x4000_1000);
        assert_eq!(model.hsm_base, 0x4000_0000);

        let model = ModelFpga::from_lookup(|var| {
            (var == HSM_BASE_VAR).then(|| "0x43c00000".to_string())
        })
        .unwrap();
        assert_eq!(model.hsm_base, 0x43c0_0000);
        assert_eq!(model.aes_base, 0x4000_1000);

        let err = ModelFpga::from_lookup(|var| {
            (var == AES_BASE_VAR).then(|| "zzz".to_string())
        })
        .unwrap_err();
        assert_eq!(err.var, AES_BASE_VAR);
        assert_eq!(err.value, "zzz");
    }
}
