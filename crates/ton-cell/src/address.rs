//! TON account addresses.
//!
//! An address is a workchain id plus the 256-bit hash of the account's
//! initial state. Two textual forms exist:
//!
//! - Raw: `workchain:hex64`, e.g. `0:83df...`
//! - User-friendly: 36 bytes (flags, workchain, hash, CRC16) in base64url,
//!   always 48 characters. The flags carry the bounceable and testnet bits.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;

use crate::{CellError, CellResult};

const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const TAG_TESTNET: u8 = 0x80;

const FRIENDLY_BYTES: usize = 36;
const FRIENDLY_CHARS: usize = 48;

/// A standard internal address.
///
/// # Example
///
/// ```
/// use ton_cell::Address;
///
/// let raw = "0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8";
/// let addr: Address = raw.parse().unwrap();
/// assert_eq!(addr.workchain, 0);
/// assert_eq!(addr.to_string(), raw);
///
/// let friendly = addr.to_friendly(true, false).unwrap();
/// assert_eq!(friendly.parse::<Address>().unwrap(), addr);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    /// Workchain ID (-1 for masterchain, 0 for basechain).
    pub workchain: i32,
    /// 256-bit account id.
    pub hash: [u8; 32],
}

/// An address decoded from its user-friendly form, with its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FriendlyAddress {
    pub address: Address,
    pub bounceable: bool,
    pub testnet: bool,
}

impl Address {
    pub fn new(workchain: i32, hash: [u8; 32]) -> Self {
        Address { workchain, hash }
    }

    /// Parse the raw `workchain:hex64` form.
    pub fn parse_raw(s: &str) -> CellResult<Self> {
        let (workchain_str, hash_str) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| CellError::InvalidFormat(format!("missing ':' in address {:?}", s)))?;

        let workchain: i32 = workchain_str.parse().map_err(|_| {
            CellError::InvalidFormat(format!("invalid workchain: {:?}", workchain_str))
        })?;

        if hash_str.len() != 64 {
            return Err(CellError::InvalidFormat(format!(
                "address hash must be 64 hex characters, got {}",
                hash_str.len()
            )));
        }
        let mut hash = [0u8; 32];
        hex::decode_to_slice(hash_str, &mut hash)
            .map_err(|e| CellError::InvalidFormat(format!("invalid address hash: {}", e)))?;

        Ok(Address { workchain, hash })
    }

    /// Raw form with lowercase hex.
    pub fn to_raw_string(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash))
    }

    /// User-friendly base64url form.
    ///
    /// Fails with `InvalidFormat` when the workchain does not fit in one
    /// signed byte.
    pub fn to_friendly(&self, bounceable: bool, testnet: bool) -> CellResult<String> {
        let workchain = i8::try_from(self.workchain).map_err(|_| {
            CellError::InvalidFormat(format!(
                "workchain {} has no user-friendly form",
                self.workchain
            ))
        })?;

        let mut tag = if bounceable {
            TAG_BOUNCEABLE
        } else {
            TAG_NON_BOUNCEABLE
        };
        if testnet {
            tag |= TAG_TESTNET;
        }

        let mut data = Vec::with_capacity(FRIENDLY_BYTES);
        data.push(tag);
        data.push(workchain as u8);
        data.extend_from_slice(&self.hash);
        data.extend_from_slice(&crc16_xmodem(&data).to_be_bytes());

        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&data))
    }

    /// Parse a user-friendly address, standard or URL-safe alphabet.
    pub fn parse_friendly(s: &str) -> CellResult<FriendlyAddress> {
        let s = s.trim();
        if s.len() != FRIENDLY_CHARS {
            return Err(CellError::InvalidFormat(format!(
                "user-friendly address must be {} characters, got {}",
                FRIENDLY_CHARS,
                s.len()
            )));
        }

        let engine = if s.contains(['-', '_']) { &URL_SAFE } else { &STANDARD };
        let bytes = engine
            .decode(s)
            .map_err(|e| CellError::InvalidFormat(format!("invalid base64 address: {}", e)))?;
        if bytes.len() != FRIENDLY_BYTES {
            return Err(CellError::InvalidFormat(format!(
                "user-friendly address must decode to {} bytes, got {}",
                FRIENDLY_BYTES,
                bytes.len()
            )));
        }

        let expected = u16::from_be_bytes([bytes[34], bytes[35]]);
        let actual = crc16_xmodem(&bytes[..34]);
        if expected != actual {
            return Err(CellError::InvalidFormat(format!(
                "address checksum mismatch: stored {:04x}, computed {:04x}",
                expected, actual
            )));
        }

        let testnet = bytes[0] & TAG_TESTNET != 0;
        let bounceable = match bytes[0] & !TAG_TESTNET {
            TAG_BOUNCEABLE => true,
            TAG_NON_BOUNCEABLE => false,
            other => {
                return Err(CellError::InvalidFormat(format!(
                    "unknown address tag {:02x}",
                    other
                )));
            }
        };

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..34]);

        Ok(FriendlyAddress {
            address: Address {
                workchain: bytes[1] as i8 as i32,
                hash,
            },
            bounceable,
            testnet,
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.workchain, hex::encode(self.hash))
    }
}

/// Accepts either the raw or the user-friendly form.
impl FromStr for Address {
    type Err = CellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains(':') {
            Self::parse_raw(s)
        } else {
            Self::parse_friendly(s).map(|f| f.address)
        }
    }
}

fn crc16_xmodem(data: &[u8]) -> u16 {
    const CRC16: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_XMODEM);
    CRC16.checksum(data)
}
