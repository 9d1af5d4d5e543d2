//! Documents served by the compressed NFT index service.
//!
//! The service answers `GET /state` with the collection address and
//! `GET /items/{index}` with the item's Merkle proof as a base64 BoC. This
//! module only decodes already-fetched bodies.

use std::sync::Arc;

use serde::Deserialize;
use ton_cell::{Address, BagOfCells, Cell};
use tracing::warn;

use crate::error::{CnftError, CnftResult};

/// Body of `GET /state`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CollectionState {
    /// Collection contract address in raw form.
    pub address: String,
}

/// Body of `GET /items/{index}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemProof {
    /// Standard base64 BoC holding the proof cell.
    pub proof_cell: String,
}

fn parse_json<'de, T: Deserialize<'de>>(what: &str, json: &'de str) -> CnftResult<T> {
    serde_json::from_str(json).map_err(|e| {
        warn!(document = what, error = %e, "rejected index service response");
        CnftError::InvalidResponse(format!("{}: {}", what, e))
    })
}

impl CollectionState {
    pub fn from_json(json: &str) -> CnftResult<Self> {
        parse_json("collection state", json)
    }

    /// The collection address; the friendly form is accepted too.
    pub fn collection_address(&self) -> CnftResult<Address> {
        Ok(self.address.parse::<Address>()?)
    }
}

impl ItemProof {
    pub fn from_json(json: &str) -> CnftResult<Self> {
        parse_json("item proof", json)
    }

    /// Decode the proof BoC; it must hold exactly one root.
    pub fn proof(&self) -> CnftResult<Arc<Cell>> {
        let boc = BagOfCells::deserialize_from_base64(&self.proof_cell)?;
        Ok(boc.into_single_root()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ton_cell::CellError;

    #[test]
    fn test_collection_state() {
        let state = CollectionState::from_json(
            r#"{"address":"0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8","extra":1}"#,
        )
        .unwrap();
        let address = state.collection_address().unwrap();
        assert_eq!(address.workchain, 0);
        assert_eq!(address.hash[31], 0xa8);
    }

    #[test]
    fn test_bad_state_documents() {
        assert!(matches!(
            CollectionState::from_json("{}"),
            Err(CnftError::InvalidResponse(_))
        ));
        assert!(matches!(
            CollectionState::from_json("not json"),
            Err(CnftError::InvalidResponse(_))
        ));

        let state = CollectionState {
            address: "0:xyz".to_string(),
        };
        assert!(matches!(
            state.collection_address(),
            Err(CnftError::Cell(CellError::InvalidFormat(_)))
        ));
    }

    #[test]
    fn test_item_proof() {
        let item = ItemProof::from_json(r#"{"proof_cell":"te6cckEBAQEAAgAAAEysuc0="}"#).unwrap();
        let proof = item.proof().unwrap();
        assert_eq!(proof.bit_len(), 0);
        assert_eq!(proof.reference_count(), 0);
    }

    #[test]
    fn test_item_proof_must_be_a_boc() {
        let item = ItemProof {
            proof_cell: "AAAA".to_string(),
        };
        assert!(matches!(
            item.proof(),
            Err(CnftError::Cell(CellError::MalformedBoc(_)))
        ));
    }
}
