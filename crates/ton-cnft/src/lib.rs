//! # ton-cnft
//!
//! Claiming items of compressed NFT collections on TON.
//!
//! A compressed collection commits to all of its items with a single Merkle
//! root. Nothing is minted until a holder claims an item: they send the
//! collection contract a message carrying the item's index and a Merkle
//! proof fetched from the collection's index service.
//!
//! ## Flow
//!
//! 1. `GET {index}/state` gives the collection address ([`CollectionState`])
//! 2. `GET {index}/items/{n}` gives the item proof as a BoC ([`ItemProof`])
//! 3. [`build_claim_body`] packs `claim#013a3ca6` with the proof as a reference
//! 4. [`build_transfer_link`] wraps it in a `ton://transfer` link a wallet can
//!    open
//!
//! [`prepare_claim`] runs steps 3 and 4 on already-fetched documents.
//!
//! ## Example
//!
//! ```rust
//! use num_bigint::BigUint;
//! use ton_cnft::{prepare_claim, ClaimConfig, CollectionState, ItemProof};
//!
//! let state = CollectionState::from_json(
//!     r#"{"address":"0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8"}"#,
//! ).unwrap();
//! let item = ItemProof::from_json(r#"{"proof_cell":"te6cckEBAQEAAgAAAEysuc0="}"#).unwrap();
//!
//! let claim = prepare_claim(&state, &item, &BigUint::from(1u8), 42, &ClaimConfig::default()).unwrap();
//! assert!(claim.link.to_uri().starts_with("ton://transfer/EQCD39VS"));
//! ```

use num_bigint::BigUint;
use ton_cell::Cell;
use tracing::debug;

pub mod claim;
pub mod config;
pub mod error;
pub mod index;
pub mod link;

pub use claim::{build_claim_body, random_query_id, ClaimBody, ITEM_INDEX_BITS, OP_CLAIM};
pub use config::{ClaimConfig, IndexEndpoints, DEFAULT_INDEX_URL, INDEX_URL_ENV};
pub use error::{CnftError, CnftResult};
pub use index::{CollectionState, ItemProof};
pub use link::{build_transfer_link, TransferLink, CLAIM_AMOUNT_NANOTONS};

/// A claim ready to be sent.
#[derive(Debug, Clone)]
pub struct PreparedClaim {
    /// The claim message body.
    pub body: Cell,
    /// Link that sends `body` to the collection.
    pub link: TransferLink,
}

/// Assemble the claim for `item_index` from the index service documents.
pub fn prepare_claim(
    state: &CollectionState,
    item: &ItemProof,
    item_index: &BigUint,
    query_id: u64,
    config: &ClaimConfig,
) -> CnftResult<PreparedClaim> {
    let collection = state.collection_address()?;
    debug!(collection = %collection, "resolved collection address");

    let proof = item.proof()?;
    debug!(
        proof_hash = %hex::encode(proof.hash()),
        proof_depth = proof.depth(),
        "decoded item proof"
    );

    let body = build_claim_body(query_id, item_index, proof)?;
    let link = TransferLink::with_config(&collection, &body, config)?;
    debug!(amount = link.amount(), bytes = link.bin().len(), "built transfer link");

    Ok(PreparedClaim { body, link })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATE: &str =
        r#"{"address":"0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8"}"#;

    #[test]
    fn test_prepare_claim() {
        let state = CollectionState::from_json(STATE).unwrap();
        let item = ItemProof::from_json(r#"{"proof_cell":"te6cckEBAQEAAgAAAEysuc0="}"#).unwrap();

        let claim = prepare_claim(&state, &item, &BigUint::from(1u8), 42, &ClaimConfig::default()).unwrap();
        let decoded = ClaimBody::from_cell(&claim.body).unwrap();
        assert_eq!(decoded.query_id, 42);
        assert_eq!(decoded.item_index, BigUint::from(1u8));
        assert_eq!(claim.link.payload().unwrap().hash(), claim.body.hash());
        assert_eq!(claim.link.amount(), CLAIM_AMOUNT_NANOTONS);
    }

    #[test]
    fn test_prepare_claim_rejects_multi_root_proof() {
        let state = CollectionState::from_json(STATE).unwrap();
        let two_roots = ton_cell::BagOfCells::new(vec![
            std::sync::Arc::new(Cell::empty()),
            std::sync::Arc::new(Cell::empty()),
        ])
        .serialize_to_base64()
        .unwrap();
        let item = ItemProof { proof_cell: two_roots };

        assert!(matches!(
            prepare_claim(&state, &item, &BigUint::from(1u8), 0, &ClaimConfig::default()),
            Err(CnftError::Cell(ton_cell::CellError::MalformedBoc(_)))
        ));
    }
}
