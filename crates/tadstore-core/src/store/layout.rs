//! On-disk layout constants and the superblock.
//!
//! A store file is `superblock | data region | directory`. The superblock is
//! a fixed 32-byte block at offset 0:
//!
//! | bytes  | content                           |
//! |--------|-----------------------------------|
//! | 0..4   | magic `TAD3`                      |
//! | 4..6   | format version (u16, little-endian) |
//! | 6..8   | reserved (zero)                   |
//! | 8..16  | directory offset (u64)            |
//! | 16..24 | directory length (u64)            |
//! | 24..28 | directory CRC32 (u32)             |
//! | 28..32 | reserved (zero)                   |
//!
//! Appends start right after the committed directory, so the committed bytes
//! are never touched while uncommitted rows are being written. Each commit
//! writes the new directory after the rows it covers, then updates the
//! pointer in place; the previous directory becomes dead space.

use super::error::StoreError;

/// Magic bytes identifying a model store file.
pub const STORE_MAGIC: [u8; 4] = *b"TAD3";

/// The store format version this build reads and writes.
pub const FORMAT_VERSION: u16 = 1;

/// Size of the fixed superblock at the start of the file.
pub const SUPERBLOCK_LEN: u64 = 32;

/// Default bead slots per coordinate row, matching the maximum bead count
/// the upstream modelling pipeline emits per model.
pub const DEFAULT_SLOT_WIDTH: u32 = 1000;

/// Bytes per coordinate row at a given slot width (3 `f32` cells per slot).
pub fn row_bytes(slot_width: u32) -> u64 {
    slot_width as u64 * 3 * 4
}

/// The mutable head of a store file: where the committed directory lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub directory_offset: u64,
    pub directory_len: u64,
    pub directory_crc: u32,
}

impl Superblock {
    pub fn encode(&self) -> [u8; SUPERBLOCK_LEN as usize] {
        let mut bytes = [0u8; SUPERBLOCK_LEN as usize];
        bytes[0..4].copy_from_slice(&STORE_MAGIC);
        bytes[4..6].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.directory_offset.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.directory_len.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.directory_crc.to_le_bytes());
        bytes
    }

    pub fn decode(bytes: &[u8; SUPERBLOCK_LEN as usize]) -> Result<Self, StoreError> {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != STORE_MAGIC {
            return Err(StoreError::InvalidMagic { found: magic });
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: version,
                supported: FORMAT_VERSION,
            });
        }

        let directory_offset = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let directory_len = u64::from_le_bytes(bytes[16..24].try_into().unwrap());
        let directory_crc = u32::from_le_bytes(bytes[24..28].try_into().unwrap());

        if directory_offset < SUPERBLOCK_LEN {
            return Err(StoreError::Corrupt(format!(
                "directory offset {directory_offset} points inside the superblock"
            )));
        }

        Ok(Self {
            directory_offset,
            directory_len,
            directory_crc,
        })
    }
}
