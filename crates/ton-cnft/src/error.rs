//! Error types for claim operations.

use thiserror::Error;

/// Errors that can occur while preparing a claim.
#[derive(Debug, Error)]
pub enum CnftError {
    /// Cell, BoC or address failure from `ton-cell`.
    #[error("Cell error: {0}")]
    Cell(#[from] ton_cell::CellError),

    /// A message body carries a different operation.
    #[error("Invalid opcode: expected 0x{expected:08x}, got 0x{actual:08x}")]
    InvalidOpcode { expected: u32, actual: u32 },

    /// A document from the index service could not be used.
    #[error("Invalid index service response: {0}")]
    InvalidResponse(String),

    /// A `ton://transfer` link could not be parsed.
    #[error("Invalid transfer link: {0}")]
    InvalidLink(String),
}

/// Result type for claim operations.
pub type CnftResult<T> = Result<T, CnftError>;
