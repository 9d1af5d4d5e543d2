//! `ton://transfer` deep links.
//!
//! A wallet opening the link sends `amount` nanotons to the destination with
//! the BoC in `bin` as the message body:
//!
//! ```text
//! ton://transfer/<friendly address>?amount=<nanotons>&bin=<base64url BoC>
//! ```

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ton_cell::{Address, BagOfCells, Cell, FriendlyAddress};

use crate::config::ClaimConfig;
use crate::error::{CnftError, CnftResult};

/// Minimum value the collection contract accepts with a claim (0.085 TON).
pub const CLAIM_AMOUNT_NANOTONS: u128 = 85_000_000;

const TRANSFER_PREFIX: &str = "ton://transfer/";

/// A transfer deep link with its payload already serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferLink {
    destination: FriendlyAddress,
    destination_text: String,
    amount: u128,
    bin: Vec<u8>,
}

impl TransferLink {
    /// Build a link to `destination` rendered with the given flags.
    pub fn new(
        destination: FriendlyAddress,
        amount: u128,
        payload: &Cell,
        with_crc: bool,
    ) -> CnftResult<Self> {
        let destination_text = destination
            .address
            .to_friendly(destination.bounceable, destination.testnet)?;
        let bin = BagOfCells::from_root(payload.clone()).serialize_with_options(with_crc, false)?;
        Ok(Self {
            destination,
            destination_text,
            amount,
            bin,
        })
    }

    /// Build a link following `config`.
    pub fn with_config(destination: &Address, payload: &Cell, config: &ClaimConfig) -> CnftResult<Self> {
        let destination = FriendlyAddress {
            address: *destination,
            bounceable: config.bounceable,
            testnet: config.testnet,
        };
        Self::new(destination, config.amount, payload, config.boc_crc)
    }

    /// Parse a link produced by [`TransferLink::to_uri`].
    ///
    /// Unknown query parameters are ignored; `amount` and `bin` are required
    /// and `bin` must hold exactly one root cell.
    pub fn parse(uri: &str) -> CnftResult<Self> {
        let rest = uri
            .trim()
            .strip_prefix(TRANSFER_PREFIX)
            .ok_or_else(|| CnftError::InvalidLink(format!("expected {} prefix", TRANSFER_PREFIX)))?;
        let (destination_text, query) = rest
            .split_once('?')
            .ok_or_else(|| CnftError::InvalidLink("missing query string".to_string()))?;

        let destination = Address::parse_friendly(destination_text)
            .map_err(|e| CnftError::InvalidLink(format!("destination: {}", e)))?;

        let mut amount = None;
        let mut bin = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("amount", value)) => {
                    let parsed = value
                        .parse::<u128>()
                        .map_err(|_| CnftError::InvalidLink(format!("invalid amount {:?}", value)))?;
                    amount = Some(parsed);
                }
                Some(("bin", value)) => {
                    let bytes = URL_SAFE_NO_PAD
                        .decode(value.trim_end_matches('='))
                        .map_err(|e| CnftError::InvalidLink(format!("invalid bin: {}", e)))?;
                    bin = Some(bytes);
                }
                _ => {}
            }
        }

        let amount = amount.ok_or_else(|| CnftError::InvalidLink("missing amount".to_string()))?;
        let bin = bin.ok_or_else(|| CnftError::InvalidLink("missing bin".to_string()))?;
        BagOfCells::deserialize(&bin)?.single_root()?;

        Ok(Self {
            destination,
            destination_text: destination_text.to_string(),
            amount,
            bin,
        })
    }

    pub fn destination(&self) -> &FriendlyAddress {
        &self.destination
    }

    pub fn amount(&self) -> u128 {
        self.amount
    }

    /// Serialized payload BoC.
    pub fn bin(&self) -> &[u8] {
        &self.bin
    }

    /// Decode the payload cell.
    pub fn payload(&self) -> CnftResult<Arc<Cell>> {
        Ok(BagOfCells::deserialize(&self.bin)?.into_single_root()?)
    }

    pub fn to_uri(&self) -> String {
        format!(
            "{}{}?amount={}&bin={}",
            TRANSFER_PREFIX,
            self.destination_text,
            self.amount,
            URL_SAFE_NO_PAD.encode(&self.bin)
        )
    }
}

impl fmt::Display for TransferLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

/// Link sending `amount` to `destination` (bounceable, mainnet) with
/// `payload` as the body, serialized with a CRC trailer.
pub fn build_transfer_link(destination: &Address, amount: u128, payload: &Cell) -> CnftResult<TransferLink> {
    TransferLink::with_config(destination, payload, &ClaimConfig::default().with_amount(amount))
}
