//! TON Cell and Bag of Cells (BoC) Library
//!
//! This crate provides the data structures a compressed-NFT claim is made of:
//!
//! - **Cell**: immutable node holding up to 1023 bits and up to 4 references
//! - **CellBuilder**: accumulator that packs typed values into a new cell
//! - **CellSlice**: cursor for reading typed values back out of a cell
//! - **BagOfCells**: canonical byte serialization of a cell DAG
//! - **Address**: workchain + 256-bit account id, raw and user-friendly forms
//!
//! # Overview
//!
//! Cells reference each other to form a DAG. Identical subtrees hash
//! identically (the hash of a cell covers its data and the hashes of its
//! children), so a serialized bag stores every distinct subtree once.
//!
//! # Example
//!
//! ```
//! use ton_cell::{BagOfCells, CellBuilder};
//!
//! let mut builder = CellBuilder::new();
//! builder.store_u32(0x12345678).unwrap();
//! builder.store_uint(1, 256).unwrap();
//! let cell = builder.build().unwrap();
//!
//! let bytes = BagOfCells::from_root(cell.clone()).serialize().unwrap();
//! let decoded = BagOfCells::deserialize(&bytes).unwrap();
//! assert_eq!(decoded.single_root().unwrap().hash(), cell.hash());
//! ```

use sha2::{Digest, Sha256};
use thiserror::Error;

mod address;
mod boc;
mod builder;
mod cell;
mod level_mask;
mod slice;

pub use address::{Address, FriendlyAddress};
pub use boc::BagOfCells;
pub use builder::CellBuilder;
pub use cell::{Cell, LevelInfo, DEPTH_BYTES, HASH_BYTES};
pub use level_mask::{LevelMask, MAX_LEVEL};
pub use slice::CellSlice;

/// Errors that can occur during Cell/BoC/Address operations.
///
/// Every failure is a local validation error; nothing here is retriable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CellError {
    /// Appending would push the cell past 1023 data bits.
    #[error("Cell capacity exceeded: {0} bits (max 1023)")]
    CapacityExceeded(usize),

    /// The value cannot be represented in the requested number of bits.
    #[error("Value does not fit in {bits} bits")]
    ValueOutOfRange { bits: usize },

    /// The cell would have more than 4 references.
    #[error("Too many cell references: {0} (max 4)")]
    TooManyRefs(usize),

    /// The cell would sit more than 1024 references above its deepest leaf.
    #[error("Cell depth exceeded: {0} (max 1024)")]
    DepthExceeded(u16),

    /// A read asked for more bits or references than remain.
    #[error("Read out of bounds: need {need}, have {have}")]
    OutOfBounds { need: usize, have: usize },

    /// The byte buffer is not a valid bag of cells.
    #[error("Malformed BoC: {0}")]
    MalformedBoc(String),

    /// A textual or structural input is not in the expected format.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Result type for Cell/BoC operations.
pub type CellResult<T> = Result<T, CellError>;

/// Maximum number of bits in a cell's data.
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum number of references a cell can have.
pub const MAX_CELL_REFS: usize = 4;

/// Maximum depth of a cell tree.
/// Reference: ton-blockchain/ton/crypto/vm/cells/CellTraits.h max_depth = 1024
pub const MAX_CELL_DEPTH: u16 = 1024;

/// BoC magic number for generic BoC.
pub const BOC_GENERIC_MAGIC: u32 = 0xb5ee9c72;

/// BoC magic number for indexed BoC.
pub const BOC_INDEXED_MAGIC: u32 = 0x68ff65f3;

/// BoC magic number for indexed CRC32 BoC.
pub const BOC_INDEXED_CRC32_MAGIC: u32 = 0xacc3a728;

/// Cell type indicator.
///
/// Exotic cells carry their type in the first data byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CellType {
    /// Ordinary data cell.
    Ordinary = 0,
    /// Pruned branch (for Merkle proofs).
    PrunedBranch = 1,
    /// Library reference.
    Library = 2,
    /// Merkle proof cell.
    MerkleProof = 3,
    /// Merkle update cell.
    MerkleUpdate = 4,
}

impl CellType {
    /// Check if this is an exotic (non-ordinary) cell type.
    pub fn is_exotic(&self) -> bool {
        *self != CellType::Ordinary
    }

    /// Merkle cells hash their children one level up.
    pub fn is_merkle(&self) -> bool {
        matches!(self, CellType::MerkleProof | CellType::MerkleUpdate)
    }

    /// Map the leading data byte of an exotic cell to its type.
    pub fn from_exotic_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(CellType::PrunedBranch),
            2 => Some(CellType::Library),
            3 => Some(CellType::MerkleProof),
            4 => Some(CellType::MerkleUpdate),
            _ => None,
        }
    }
}

/// Compute SHA256 hash of the input data.
fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Compute CRC32-C checksum (Castagnoli polynomial).
fn crc32c(data: &[u8]) -> u32 {
    const CRC32C: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISCSI);
    CRC32C.checksum(data)
}
