//! Claim and index-service configuration.

use std::fmt::Display;

use crate::link::CLAIM_AMOUNT_NANOTONS;

/// Default base URL of the compressed NFT index service.
pub const DEFAULT_INDEX_URL: &str = "http://localhost:8081/v1";

/// Environment variable overriding the index base URL.
pub const INDEX_URL_ENV: &str = "CNFT_INDEX_URL";

/// Claims go to the collection as bounceable messages by default.
pub const DEFAULT_BOUNCEABLE: bool = true;

pub const DEFAULT_TESTNET: bool = false;

/// Whether the payload BoC carries a CRC32-C trailer.
pub const DEFAULT_BOC_CRC: bool = true;

/// How the transfer link is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimConfig {
    /// Attached value in nanotons.
    pub amount: u128,
    /// Render the destination with the bounceable flag.
    pub bounceable: bool,
    /// Render the destination with the testnet flag.
    pub testnet: bool,
    /// Append CRC32-C to the payload BoC.
    pub boc_crc: bool,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            amount: CLAIM_AMOUNT_NANOTONS,
            bounceable: DEFAULT_BOUNCEABLE,
            testnet: DEFAULT_TESTNET,
            boc_crc: DEFAULT_BOC_CRC,
        }
    }
}

impl ClaimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_amount(mut self, amount: u128) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_bounceable(mut self, bounceable: bool) -> Self {
        self.bounceable = bounceable;
        self
    }

    pub fn with_testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    pub fn with_boc_crc(mut self, boc_crc: bool) -> Self {
        self.boc_crc = boc_crc;
        self
    }
}

/// Where the two input documents of a claim come from.
///
/// Only URLs are produced here; fetching is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEndpoints {
    base_url: String,
}

impl Default for IndexEndpoints {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_URL)
    }
}

impl IndexEndpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Explicit URL if given, else `CNFT_INDEX_URL`, else the default.
    pub fn resolve(explicit: Option<String>) -> Self {
        explicit
            .or_else(|| std::env::var(INDEX_URL_ENV).ok())
            .filter(|url| !url.trim().is_empty())
            .map(Self::new)
            .unwrap_or_default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET` target returning the collection state (`{"address": ...}`).
    pub fn state_url(&self) -> String {
        format!("{}/state", self.base_url)
    }

    /// `GET` target returning an item's proof (`{"proof_cell": ...}`).
    pub fn item_url(&self, index: impl Display) -> String {
        format!("{}/items/{}", self.base_url, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    #[test]
    fn test_claim_config_defaults() {
        let config = ClaimConfig::default();
        assert_eq!(config.amount, 85_000_000);
        assert!(config.bounceable);
        assert!(!config.testnet);
        assert!(config.boc_crc);
    }

    #[test]
    fn test_claim_config_builders() {
        let config = ClaimConfig::new()
            .with_amount(1)
            .with_bounceable(false)
            .with_testnet(true)
            .with_boc_crc(false);
        assert_eq!(
            config,
            ClaimConfig {
                amount: 1,
                bounceable: false,
                testnet: true,
                boc_crc: false,
            }
        );
    }

    #[test]
    fn test_endpoint_urls() {
        let endpoints = IndexEndpoints::default();
        assert_eq!(endpoints.state_url(), "http://localhost:8081/v1/state");
        assert_eq!(endpoints.item_url(1), "http://localhost:8081/v1/items/1");

        let endpoints = IndexEndpoints::new("https://index.example/api/");
        assert_eq!(endpoints.base_url(), "https://index.example/api");
        let big = BigUint::from(u128::MAX);
        assert_eq!(
            endpoints.item_url(&big),
            format!("https://index.example/api/items/{}", u128::MAX)
        );
    }

    #[test]
    fn test_explicit_url_wins() {
        let endpoints = IndexEndpoints::resolve(Some("http://other:9000/v2".to_string()));
        assert_eq!(endpoints.state_url(), "http://other:9000/v2/state");
    }
}
