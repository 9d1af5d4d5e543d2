//! Claim message body for compressed NFT collections.
//!
//! The collection contract mints an item when it receives a claim carrying a
//! Merkle proof that the item belongs to the committed tree.

use std::sync::Arc;

use num_bigint::BigUint;
use ton_cell::{Cell, CellBuilder, CellSlice};
use tracing::debug;

use crate::error::{CnftError, CnftResult};

/// Operation codes understood by the collection contract.
pub mod opcodes {
    /// Claim an item by proving its membership (op::claim).
    pub const OP_CLAIM: u32 = 0x013a3ca6;
}

pub use opcodes::*;

/// Width of the item index field.
pub const ITEM_INDEX_BITS: usize = 256;

/// Decoded claim body.
///
/// # Message Format (TL-B)
///
/// ```text
/// claim#013a3ca6
///   query_id:uint64
///   item_index:uint256
///   proof:^Cell
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimBody {
    pub query_id: u64,
    pub item_index: BigUint,
    /// Merkle proof cell, passed through untouched.
    pub proof: Arc<Cell>,
}

impl ClaimBody {
    pub fn new(query_id: u64, item_index: impl Into<BigUint>, proof: impl Into<Arc<Cell>>) -> Self {
        Self {
            query_id,
            item_index: item_index.into(),
            proof: proof.into(),
        }
    }

    /// Pack the body into a cell.
    ///
    /// Fails with `ValueOutOfRange` if the item index needs more than 256
    /// bits.
    pub fn to_cell(&self) -> CnftResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(OP_CLAIM)?;
        builder.store_u64(self.query_id)?;
        builder.store_biguint(&self.item_index, ITEM_INDEX_BITS)?;
        builder.store_ref(self.proof.clone())?;
        let cell = builder.build()?;

        debug!(
            query_id = self.query_id,
            item_index = %self.item_index,
            "built claim body"
        );
        Ok(cell)
    }

    /// Read a claim body back, rejecting other operations.
    pub fn from_cell(cell: &Cell) -> CnftResult<Self> {
        let mut slice = CellSlice::new(cell);

        let op = slice.load_u32()?;
        if op != OP_CLAIM {
            return Err(CnftError::InvalidOpcode {
                expected: OP_CLAIM,
                actual: op,
            });
        }

        let query_id = slice.load_u64()?;
        let item_index = slice.load_biguint(ITEM_INDEX_BITS)?;
        let proof = slice.load_ref()?.clone();

        Ok(Self {
            query_id,
            item_index,
            proof,
        })
    }
}

/// Build the claim message body cell.
///
/// The proof's shape is not checked; the contract verifies it.
pub fn build_claim_body(query_id: u64, item_index: &BigUint, proof: Arc<Cell>) -> CnftResult<Cell> {
    ClaimBody {
        query_id,
        item_index: item_index.clone(),
        proof,
    }
    .to_cell()
}

/// Random query id for correlating the claim with its transaction.
///
/// Not a nonce and not a security mechanism: collisions are harmless.
pub fn random_query_id() -> u64 {
    rand::random()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ton_cell::CellError;

    fn proof_stub() -> Arc<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u16(0xBEEF).unwrap();
        Arc::new(builder.build().unwrap())
    }

    #[test]
    fn test_opcode_value() {
        assert_eq!(OP_CLAIM, 0x13a3ca6);
    }

    #[test]
    fn test_claim_body_layout() {
        let proof = proof_stub();
        let cell = build_claim_body(7, &BigUint::from(3u8), proof.clone()).unwrap();

        assert_eq!(cell.bit_len(), 32 + 64 + 256);
        assert_eq!(cell.reference_count(), 1);
        assert_eq!(cell.references()[0].hash(), proof.hash());

        let mut slice = CellSlice::new(&cell);
        assert_eq!(slice.load_u32().unwrap(), 0x013a3ca6);
        assert_eq!(slice.load_u64().unwrap(), 7);
        slice.skip_bits(248).unwrap();
        assert_eq!(slice.load_u8().unwrap(), 3);
    }

    #[test]
    fn test_claim_body_roundtrip() {
        let item_index = BigUint::from(u64::MAX) << 100u32;
        let body = ClaimBody::new(u64::MAX, item_index, proof_stub());
        let decoded = ClaimBody::from_cell(&body.to_cell().unwrap()).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn test_item_index_too_wide() {
        let too_wide = BigUint::from(1u8) << 256u32;
        match build_claim_body(0, &too_wide, proof_stub()) {
            Err(CnftError::Cell(CellError::ValueOutOfRange { bits: 256 })) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_from_cell_rejects_other_opcode() {
        let mut builder = CellBuilder::new();
        builder.store_u32(0x5fcc3d14).unwrap();
        builder.store_u64(1).unwrap();
        let cell = builder.build().unwrap();

        match ClaimBody::from_cell(&cell) {
            Err(CnftError::InvalidOpcode { expected, actual }) => {
                assert_eq!(expected, OP_CLAIM);
                assert_eq!(actual, 0x5fcc3d14);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_from_cell_needs_proof_ref() {
        let mut builder = CellBuilder::new();
        builder.store_u32(OP_CLAIM).unwrap();
        builder.store_u64(1).unwrap();
        builder.store_uint(1, 256).unwrap();
        let cell = builder.build().unwrap();

        assert!(matches!(
            ClaimBody::from_cell(&cell),
            Err(CnftError::Cell(CellError::OutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_random_query_ids_vary() {
        let ids: Vec<u64> = (0..8).map(|_| random_query_id()).collect();
        assert!(ids.iter().any(|&id| id != ids[0]));
    }
}
