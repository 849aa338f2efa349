/*++

Licensed under the Apache-2.0 license.

File Name:

    array.rs

Abstract:

    File contains the fixed width word arrays used for AES keys and blocks.
    Word 0 always holds the most significant 32 bits.

--*/

use std::fmt;

use hsm_hw_model::Mmio;

macro_rules! array4 {
    ($dim: literal) => {
        paste::paste! {
            pub const [<ARRAY_4X $dim _BYTE_SIZE>]: usize = $dim * core::mem::size_of::<u32>();
            pub const [<ARRAY_4X $dim _WORD_SIZE>]: usize = $dim;

            #[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
            pub struct [<Array4x $dim>](pub [u32; [<ARRAY_4X $dim _WORD_SIZE>]]);

            impl [<Array4x $dim>] {
                /// Big-endian byte representation.
                pub fn to_bytes(&self) -> [u8; [<ARRAY_4X $dim _BYTE_SIZE>]] {
                    (*self).into()
                }

                /// Read consecutive registers starting at `offset`.
                pub fn read_from(mmio: &impl Mmio, offset: u32) -> Self {
                    let mut result = Self::default();
                    for (i, word) in result.0.iter_mut().enumerate() {
                        *word = mmio.read(offset + (i as u32) * 4);
                    }
                    result
                }

                /// Write consecutive registers starting at `offset`.
                pub fn write_to(&self, mmio: &impl Mmio, offset: u32) {
                    for (i, word) in self.0.iter().enumerate() {
                        mmio.write(offset + (i as u32) * 4, *word);
                    }
                }
            }

            impl From<[u8; [<ARRAY_4X $dim _BYTE_SIZE>]]> for [<Array4x $dim>] {
                fn from(value: [u8; [<ARRAY_4X $dim _BYTE_SIZE>]]) -> Self {
                    Self::from(&value)
                }
            }

            impl<'a> From<&'a [u8; [<ARRAY_4X $dim _BYTE_SIZE>]]> for [<Array4x $dim>] {
                fn from(value: &'a [u8; [<ARRAY_4X $dim _BYTE_SIZE>]]) -> Self {
                    let mut result = Self::default();
                    for (word, chunk) in result.0.iter_mut().zip(value.chunks_exact(4)) {
                        *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                    }
                    result
                }
            }

            impl From<[<Array4x $dim>]> for [u8; [<ARRAY_4X $dim _BYTE_SIZE>]] {
                fn from(value: [<Array4x $dim>]) -> Self {
                    let mut result = [0u8; [<ARRAY_4X $dim _BYTE_SIZE>]];
                    for (chunk, word) in result.chunks_exact_mut(4).zip(value.0.iter()) {
                        chunk.copy_from_slice(&word.to_be_bytes());
                    }
                    result
                }
            }

            impl From<[u32; [<ARRAY_4X $dim _WORD_SIZE>]]> for [<Array4x $dim>] {
                fn from(value: [u32; [<ARRAY_4X $dim _WORD_SIZE>]]) -> Self {
                    Self(value)
                }
            }

            impl From<[<Array4x $dim>]> for [u32; [<ARRAY_4X $dim _WORD_SIZE>]] {
                fn from(value: [<Array4x $dim>]) -> Self {
                    value.0
                }
            }

            /// Hex dump, most significant word first.
            impl fmt::Display for [<Array4x $dim>] {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    for word in self.0.iter() {
                        write!(f, "{word:08x}")?;
                    }
                    Ok(())
                }
            }
        }
    };
}

array4!(4);
array4!(8);

/// One 128-bit AES block.
pub type AesBlock = Array4x4;

/// A 256-bit AES key.
pub type AesKey = Array4x8;
