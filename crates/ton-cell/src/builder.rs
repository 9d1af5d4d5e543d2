//! CellBuilder for constructing TON cells.
//!
//! The builder stores bits, integers, bytes, and references, then `build()`
//! consumes it and returns the immutable Cell. Every store checks capacity
//! and value range before touching the buffer, so a failed store leaves the
//! builder exactly as it was.

use std::sync::Arc;

use num_bigint::BigUint;

use crate::cell::check_exotic_layout;
use crate::{
    Cell, CellError, CellResult, CellSlice, CellType, MAX_CELL_BITS, MAX_CELL_DEPTH, MAX_CELL_REFS,
};

/// Builder for constructing TON cells.
///
/// # Example
///
/// ```
/// use ton_cell::CellBuilder;
///
/// let mut builder = CellBuilder::new();
/// builder.store_u32(0x12345678).unwrap();
/// builder.store_bytes(&[1, 2, 3, 4]).unwrap();
/// let cell = builder.build().unwrap();
/// assert_eq!(cell.bit_len(), 64);
/// ```
#[derive(Debug, Clone)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<Arc<Cell>>,
    cell_type: CellType,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::with_type(CellType::Ordinary)
    }

    /// Create a builder for an exotic cell.
    ///
    /// The caller stores the full exotic layout, type byte included;
    /// `build()` checks it.
    pub fn with_type(cell_type: CellType) -> Self {
        CellBuilder {
            data: Vec::with_capacity(128),
            bit_len: 0,
            references: Vec::new(),
            cell_type,
        }
    }

    fn ensure_bits(&self, count: usize) -> CellResult<()> {
        match self.bit_len.checked_add(count) {
            Some(total) if total <= MAX_CELL_BITS => Ok(()),
            Some(total) => Err(CellError::CapacityExceeded(total)),
            None => Err(CellError::CapacityExceeded(usize::MAX)),
        }
    }

    /// Append one bit; capacity must already be checked.
    fn push_bit(&mut self, bit: bool) {
        let byte_index = self.bit_len / 8;
        if byte_index >= self.data.len() {
            self.data.push(0);
        }
        if bit {
            self.data[byte_index] |= 1 << (7 - self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    /// Store a single bit.
    pub fn store_bit(&mut self, bit: bool) -> CellResult<&mut Self> {
        self.ensure_bits(1)?;
        self.push_bit(bit);
        Ok(self)
    }

    /// Store multiple bits.
    pub fn store_bits(&mut self, bits: &[bool]) -> CellResult<&mut Self> {
        self.ensure_bits(bits.len())?;
        for &bit in bits {
            self.push_bit(bit);
        }
        Ok(self)
    }

    pub fn store_u8(&mut self, value: u8) -> CellResult<&mut Self> {
        self.store_uint(value as u64, 8)
    }

    pub fn store_u16(&mut self, value: u16) -> CellResult<&mut Self> {
        self.store_uint(value as u64, 16)
    }

    pub fn store_u32(&mut self, value: u32) -> CellResult<&mut Self> {
        self.store_uint(value as u64, 32)
    }

    pub fn store_u64(&mut self, value: u64) -> CellResult<&mut Self> {
        self.store_uint(value, 64)
    }

    pub fn store_i8(&mut self, value: i8) -> CellResult<&mut Self> {
        self.store_int(value as i64, 8)
    }

    pub fn store_i16(&mut self, value: i16) -> CellResult<&mut Self> {
        self.store_int(value as i64, 16)
    }

    pub fn store_i32(&mut self, value: i32) -> CellResult<&mut Self> {
        self.store_int(value as i64, 32)
    }

    pub fn store_i64(&mut self, value: i64) -> CellResult<&mut Self> {
        self.store_int(value, 64)
    }

    /// Store an unsigned integer in `bits` bits, most significant bit first.
    ///
    /// `bits` may exceed 64; the value is then zero-extended on the left.
    /// Fails with `ValueOutOfRange` when `value >= 2^bits`.
    pub fn store_uint(&mut self, value: u64, bits: usize) -> CellResult<&mut Self> {
        if bits < 64 && value >> bits != 0 {
            return Err(CellError::ValueOutOfRange { bits });
        }
        self.ensure_bits(bits)?;

        for i in (0..bits).rev() {
            self.push_bit(i < 64 && (value >> i) & 1 == 1);
        }
        Ok(self)
    }

    /// Store an arbitrary-precision unsigned integer in `bits` bits.
    ///
    /// Used for 256-bit values such as item indices and account ids.
    pub fn store_biguint(&mut self, value: &BigUint, bits: usize) -> CellResult<&mut Self> {
        if value.bits() > bits as u64 {
            return Err(CellError::ValueOutOfRange { bits });
        }
        self.ensure_bits(bits)?;

        for i in (0..bits).rev() {
            self.push_bit(value.bit(i as u64));
        }
        Ok(self)
    }

    /// Store a signed integer in `bits` bits (two's complement).
    pub fn store_int(&mut self, value: i64, bits: usize) -> CellResult<&mut Self> {
        let fits = match bits {
            0 => value == 0,
            1..=63 => {
                let bound = 1i64 << (bits - 1);
                (-bound..bound).contains(&value)
            }
            _ => true,
        };
        if !fits {
            return Err(CellError::ValueOutOfRange { bits });
        }
        self.ensure_bits(bits)?;

        for i in (0..bits).rev() {
            let bit = if i >= 64 { value < 0 } else { (value >> i) & 1 == 1 };
            self.push_bit(bit);
        }
        Ok(self)
    }

    /// Store a byte array.
    pub fn store_bytes(&mut self, bytes: &[u8]) -> CellResult<&mut Self> {
        self.ensure_bits(bytes.len().saturating_mul(8))?;
        for &byte in bytes {
            for i in (0..8).rev() {
                self.push_bit((byte >> i) & 1 == 1);
            }
        }
        Ok(self)
    }

    /// Store the unread bits and references of a CellSlice.
    pub fn store_slice(&mut self, slice: &CellSlice) -> CellResult<&mut Self> {
        let bits_left = slice.bits_left();
        let refs_left = slice.refs_left();
        self.ensure_bits(bits_left)?;
        if self.references.len() + refs_left > MAX_CELL_REFS {
            return Err(CellError::TooManyRefs(self.references.len() + refs_left));
        }

        for i in 0..bits_left {
            self.push_bit(slice.get_bit_at(slice.bit_offset() + i));
        }
        let cell = slice.cell();
        self.references
            .extend(cell.references()[slice.ref_offset()..].iter().cloned());
        Ok(self)
    }

    /// Store a reference to an already built cell.
    pub fn store_ref(&mut self, cell: impl Into<Arc<Cell>>) -> CellResult<&mut Self> {
        if self.references.len() >= MAX_CELL_REFS {
            return Err(CellError::TooManyRefs(self.references.len() + 1));
        }
        self.references.push(cell.into());
        Ok(self)
    }

    pub fn bits_left(&self) -> usize {
        MAX_CELL_BITS - self.bit_len
    }

    pub fn refs_left(&self) -> usize {
        MAX_CELL_REFS - self.references.len()
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn ref_count(&self) -> usize {
        self.references.len()
    }

    /// Finish the cell.
    ///
    /// Consumes the builder: a finished builder cannot be appended to, and a
    /// new builder is needed for every cell. Exotic cells are checked for
    /// their fixed layout here, and no cell may be deeper than
    /// `MAX_CELL_DEPTH`, the limit a bag of cells can be decoded with.
    pub fn build(self) -> CellResult<Cell> {
        if self.cell_type.is_exotic() {
            check_exotic_layout(
                self.cell_type,
                &self.data,
                self.bit_len,
                self.references.len(),
            )?;
        }
        let cell = Cell::new(self.data, self.bit_len, self.references, self.cell_type);
        if cell.depth() > MAX_CELL_DEPTH {
            return Err(CellError::DepthExceeded(cell.depth()));
        }
        Ok(cell)
    }
}

impl Default for CellBuilder {
    fn default() -> Self {
        Self::new()
    }
}
