/*++

Licensed under the Apache-2.0 license.

File Name:

    aes256_kat.rs

Abstract:

    File contains the Known Answer Tests (KAT) for single block AES-256
    encryption on the accelerator.

--*/

use std::fmt;

use hsm_drivers::{Aes, AesBlock, AesKey};
use hsm_error::{HsmError, HsmResult};
use hsm_hw_model::{Mmio, Output};

/// One known-answer vector.
#[derive(Clone, Copy, Debug)]
pub struct AesVector {
    pub name: &'static str,
    pub key: [u8; 32],
    pub plaintext: [u8; 16],
    pub ciphertext: [u8; 16],
}

// Every expected ciphertext was checked with Python:
// >>> from cryptography.hazmat.primitives.ciphers import Cipher, algorithms, modes
// >>> enc = Cipher(algorithms.AES(key), modes.ECB()).encryptor()
// >>> (enc.update(pt) + enc.finalize()).hex()
pub const AES256_VECTORS: [AesVector; 4] = [
    // FIPS-197 appendix C.3
    AesVector {
        name: "FIPS-197 C.3",
        key: [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
            0x0e, 0x0f, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x1b,
            0x1c, 0x1d, 0x1e, 0x1f,
        ],
        plaintext: [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ],
        ciphertext: [
            0x8e, 0xa2, 0xb7, 0xca, 0x51, 0x67, 0x45, 0xbf, 0xea, 0xfc, 0x49, 0x90, 0x4b, 0x49,
            0x60, 0x89,
        ],
    },
    AesVector {
        name: "all-zero",
        key: [0x00; 32],
        plaintext: [0x00; 16],
        ciphertext: [
            0xdc, 0x95, 0xc0, 0x78, 0xa2, 0x40, 0x89, 0x89, 0xad, 0x48, 0xa2, 0x14, 0x92, 0x84,
            0x20, 0x87,
        ],
    },
    AesVector {
        name: "all-ones",
        key: [0xff; 32],
        plaintext: [0xff; 16],
        ciphertext: [
            0xd5, 0xf9, 0x3d, 0x6d, 0x33, 0x11, 0xcb, 0x30, 0x9f, 0x23, 0x62, 0x1b, 0x02, 0xfb,
            0xd5, 0xe2,
        ],
    },
    // NIST SP 800-38A F.1.5 (ECB-AES256.Encrypt), block 1
    AesVector {
        name: "SP 800-38A F.1.5",
        key: [
            0x60, 0x3d, 0xeb, 0x10, 0x15, 0xca, 0x71, 0xbe, 0x2b, 0x73, 0xae, 0xf0, 0x85, 0x7d,
            0x77, 0x81, 0x1f, 0x35, 0x2c, 0x07, 0x3b, 0x61, 0x08, 0xd7, 0x2d, 0x98, 0x10, 0xa3,
            0x09, 0x14, 0xdf, 0xf4,
        ],
        plaintext: [
            0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93,
            0x17, 0x2a,
        ],
        ciphertext: [
            0xf3, 0xee, 0xd1, 0xbd, 0xb5, 0xd2, 0xa0, 0x3c, 0x06, 0x4b, 0x5a, 0x7e, 0x3d, 0xb1,
            0x81, 0xf8,
        ],
    },
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KatOutcome {
    Passed,
    Mismatch { got: AesBlock },
    /// The accelerator did not complete a handshake.
    Failed(HsmError),
}

impl KatOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, KatOutcome::Passed)
    }

    /// The error this outcome maps to, if any.
    pub fn error(&self) -> Option<HsmError> {
        match self {
            KatOutcome::Passed => None,
            KatOutcome::Mismatch { .. } => Some(HsmError::KAT_AES_CIPHERTEXT_MISMATCH),
            KatOutcome::Failed(err) => Some(*err),
        }
    }
}

impl fmt::Display for KatOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KatOutcome::Passed => f.write_str("PASS"),
            KatOutcome::Mismatch { got } => write!(f, "FAIL (got {got})"),
            KatOutcome::Failed(err) => write!(f, "FAIL ({err})"),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct KatSummary {
    pub results: Vec<(&'static str, KatOutcome)>,
}

impl KatSummary {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|(_, o)| o.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    /// `Ok` if every vector passed, otherwise the first failure.
    pub fn result(&self) -> HsmResult<()> {
        match self.results.iter().find_map(|(_, o)| o.error()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub struct Aes256Kat<'a> {
    vectors: &'a [AesVector],
    output: Output,
}

impl Aes256Kat<'static> {
    pub fn new(output: Output) -> Self {
        Self::with_vectors(&AES256_VECTORS, output)
    }
}

impl<'a> Aes256Kat<'a> {
    pub fn with_vectors(vectors: &'a [AesVector], output: Output) -> Self {
        Self { vectors, output }
    }

    /// This function executes the Known Answer Tests (aka KAT) for AES-256.
    ///
    /// A vector that fails does not stop the run; each outcome is recorded
    /// in the returned summary.
    ///
    /// # Arguments
    ///
    /// * `aes` - AES driver
    pub fn execute<M: Mmio>(&self, aes: &mut Aes<M>) -> KatSummary {
        self.output
            .log(format_args!("kat: initial aes status {}", aes.status()));

        let mut summary = KatSummary::default();
        for vector in self.vectors {
            let outcome = Self::run_vector(aes, vector);
            self.output
                .log(format_args!("kat: {}: {outcome}", vector.name));
            summary.results.push((vector.name, outcome));
        }
        self.output.log(format_args!(
            "kat: {}/{} vectors passed",
            summary.passed(),
            summary.results.len()
        ));
        summary
    }

    fn run_vector<M: Mmio>(aes: &mut Aes<M>, vector: &AesVector) -> KatOutcome {
        if let Err(err) = aes.load_key(&AesKey::from(&vector.key)) {
            return KatOutcome::Failed(err);
        }
        match aes.encrypt(&AesBlock::from(&vector.plaintext)) {
            Ok(got) if got.to_bytes() == vector.ciphertext => KatOutcome::Passed,
            Ok(got) => KatOutcome::Mismatch { got },
            Err(err) => KatOutcome::Failed(err),
        }
    }
}
