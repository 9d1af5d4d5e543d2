//! CellSlice for reading data from TON cells.
//!
//! A CellSlice keeps a bit cursor and a reference cursor over a borrowed
//! cell. Reads past the end fail with `OutOfBounds` and do not move the
//! cursor.

use std::sync::Arc;

use num_bigint::BigUint;

use crate::{Cell, CellError, CellResult};

/// A read cursor over a Cell.
///
/// # Example
///
/// ```
/// use ton_cell::{CellBuilder, CellSlice};
///
/// let mut builder = CellBuilder::new();
/// builder.store_u32(0x12345678).unwrap();
/// let cell = builder.build().unwrap();
///
/// let mut slice = CellSlice::new(&cell);
/// assert_eq!(slice.load_u32().unwrap(), 0x12345678);
/// ```
#[derive(Debug, Clone)]
pub struct CellSlice<'a> {
    cell: &'a Cell,
    bit_offset: usize,
    ref_offset: usize,
}

impl<'a> CellSlice<'a> {
    pub fn new(cell: &'a Cell) -> Self {
        CellSlice {
            cell,
            bit_offset: 0,
            ref_offset: 0,
        }
    }

    fn ensure_bits(&self, count: usize) -> CellResult<()> {
        let have = self.bits_left();
        if count > have {
            return Err(CellError::OutOfBounds { need: count, have });
        }
        Ok(())
    }

    /// Read one bit; bounds must already be checked.
    fn take_bit(&mut self) -> bool {
        let bit = self.get_bit_at(self.bit_offset);
        self.bit_offset += 1;
        bit
    }

    pub fn load_bit(&mut self) -> CellResult<bool> {
        self.ensure_bits(1)?;
        Ok(self.take_bit())
    }

    pub fn load_bits(&mut self, count: usize) -> CellResult<Vec<bool>> {
        self.ensure_bits(count)?;
        Ok((0..count).map(|_| self.take_bit()).collect())
    }

    pub fn load_u8(&mut self) -> CellResult<u8> {
        self.load_uint(8).map(|v| v as u8)
    }

    pub fn load_u16(&mut self) -> CellResult<u16> {
        self.load_uint(16).map(|v| v as u16)
    }

    pub fn load_u32(&mut self) -> CellResult<u32> {
        self.load_uint(32).map(|v| v as u32)
    }

    pub fn load_u64(&mut self) -> CellResult<u64> {
        self.load_uint(64)
    }

    pub fn load_i8(&mut self) -> CellResult<i8> {
        self.load_int(8).map(|v| v as i8)
    }

    pub fn load_i16(&mut self) -> CellResult<i16> {
        self.load_int(16).map(|v| v as i16)
    }

    pub fn load_i32(&mut self) -> CellResult<i32> {
        self.load_int(32).map(|v| v as i32)
    }

    pub fn load_i64(&mut self) -> CellResult<i64> {
        self.load_int(64)
    }

    /// Load an unsigned integer of up to 64 bits, most significant bit first.
    ///
    /// Wider values go through [`CellSlice::load_biguint`].
    pub fn load_uint(&mut self, bits: usize) -> CellResult<u64> {
        if bits > 64 {
            return Err(CellError::ValueOutOfRange { bits });
        }
        self.ensure_bits(bits)?;

        let mut result: u64 = 0;
        for _ in 0..bits {
            result = (result << 1) | self.take_bit() as u64;
        }
        Ok(result)
    }

    /// Load an unsigned integer of any width.
    pub fn load_biguint(&mut self, bits: usize) -> CellResult<BigUint> {
        self.ensure_bits(bits)?;

        let mut bytes = vec![0u8; bits.div_ceil(8)];
        let pad = bytes.len() * 8 - bits;
        for i in 0..bits {
            if self.take_bit() {
                let position = pad + i;
                bytes[position / 8] |= 1 << (7 - position % 8);
            }
        }
        Ok(BigUint::from_bytes_be(&bytes))
    }

    /// Load a signed integer of up to 64 bits (two's complement).
    pub fn load_int(&mut self, bits: usize) -> CellResult<i64> {
        let unsigned = self.load_uint(bits)?;
        if bits == 0 || bits == 64 {
            return Ok(unsigned as i64);
        }
        let sign_bit = 1u64 << (bits - 1);
        if unsigned & sign_bit != 0 {
            Ok((unsigned | !((1u64 << bits) - 1)) as i64)
        } else {
            Ok(unsigned as i64)
        }
    }

    pub fn load_bytes(&mut self, count: usize) -> CellResult<Vec<u8>> {
        self.ensure_bits(count * 8)?;
        Ok((0..count)
            .map(|_| (0..8).fold(0u8, |byte, _| (byte << 1) | self.take_bit() as u8))
            .collect())
    }

    /// Load the next reference in order.
    pub fn load_ref(&mut self) -> CellResult<&'a Arc<Cell>> {
        let reference = self.ref_at(self.ref_offset)?;
        self.ref_offset += 1;
        Ok(reference)
    }

    /// Get the reference at `index` without moving the cursor.
    pub fn ref_at(&self, index: usize) -> CellResult<&'a Arc<Cell>> {
        self.cell
            .reference(index)
            .ok_or(CellError::OutOfBounds {
                need: index + 1,
                have: self.cell.reference_count(),
            })
    }

    pub fn bits_left(&self) -> usize {
        self.cell.bit_len() - self.bit_offset
    }

    pub fn refs_left(&self) -> usize {
        self.cell.reference_count() - self.ref_offset
    }

    pub fn skip_bits(&mut self, count: usize) -> CellResult<()> {
        self.ensure_bits(count)?;
        self.bit_offset += count;
        Ok(())
    }

    pub fn skip_refs(&mut self, count: usize) -> CellResult<()> {
        let have = self.refs_left();
        if count > have {
            return Err(CellError::OutOfBounds { need: count, have });
        }
        self.ref_offset += count;
        Ok(())
    }

    /// True when no bits and no references are left.
    pub fn is_empty(&self) -> bool {
        self.bits_left() == 0 && self.refs_left() == 0
    }

    pub(crate) fn get_bit_at(&self, index: usize) -> bool {
        self.cell.get_bit(index).unwrap_or(false)
    }

    pub fn cell(&self) -> &'a Cell {
        self.cell
    }

    pub fn bit_offset(&self) -> usize {
        self.bit_offset
    }

    pub fn ref_offset(&self) -> usize {
        self.ref_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CellBuilder;

    #[test]
    fn test_load_bits_until_exhausted() {
        let mut builder = CellBuilder::new();
        builder.store_bits(&[true, false, true]).unwrap();
        let cell = builder.build().unwrap();

        let mut slice = CellSlice::new(&cell);
        assert!(slice.load_bit().unwrap());
        assert_eq!(slice.load_bits(2).unwrap(), vec![false, true]);
        assert_eq!(
            slice.load_bit().unwrap_err(),
            CellError::OutOfBounds { need: 1, have: 0 }
        );
    }

    #[test]
    fn test_typed_roundtrip() {
        let mut builder = CellBuilder::new();
        builder.store_u8(0xFF).unwrap();
        builder.store_u16(0xABCD).unwrap();
        builder.store_u64(0xDEADBEEFCAFEBABE).unwrap();
        builder.store_i16(-1000).unwrap();
        builder.store_int(-15, 6).unwrap();
        builder.store_bytes(&[1, 2, 3]).unwrap();
        let cell = builder.build().unwrap();

        let mut slice = CellSlice::new(&cell);
        assert_eq!(slice.load_u8().unwrap(), 0xFF);
        assert_eq!(slice.load_u16().unwrap(), 0xABCD);
        assert_eq!(slice.load_u64().unwrap(), 0xDEADBEEFCAFEBABE);
        assert_eq!(slice.load_i16().unwrap(), -1000);
        assert_eq!(slice.load_int(6).unwrap(), -15);
        assert_eq!(slice.load_bytes(3).unwrap(), vec![1, 2, 3]);
        assert!(slice.is_empty());
    }

    #[test]
    fn test_short_read_does_not_advance() {
        let mut builder = CellBuilder::new();
        builder.store_u16(0x1234).unwrap();
        let cell = builder.build().unwrap();

        let mut slice = CellSlice::new(&cell);
        slice.skip_bits(4).unwrap();
        assert_eq!(
            slice.load_u16().unwrap_err(),
            CellError::OutOfBounds { need: 16, have: 12 }
        );
        assert_eq!(slice.bit_offset(), 4);
        assert_eq!(slice.load_uint(12).unwrap(), 0x234);
    }

    #[test]
    fn test_load_uint_wider_than_64_rejected() {
        let mut builder = CellBuilder::new();
        builder.store_uint(5, 256).unwrap();
        let cell = builder.build().unwrap();

        let mut slice = CellSlice::new(&cell);
        assert_eq!(
            slice.load_uint(65).unwrap_err(),
            CellError::ValueOutOfRange { bits: 65 }
        );
        assert_eq!(slice.load_biguint(256).unwrap(), BigUint::from(5u8));
    }

    #[test]
    fn test_load_biguint_unaligned() {
        let mut builder = CellBuilder::new();
        builder.store_bit(true).unwrap();
        builder.store_uint(0b101, 11).unwrap();
        let cell = builder.build().unwrap();

        let mut slice = CellSlice::new(&cell);
        slice.skip_bits(1).unwrap();
        assert_eq!(slice.load_biguint(11).unwrap(), BigUint::from(5u8));
    }

    #[test]
    fn test_refs_by_index_and_in_order() {
        let a = Arc::new(CellBuilder::new().build().unwrap());
        let mut b = CellBuilder::new();
        b.store_u8(1).unwrap();
        let b = Arc::new(b.build().unwrap());

        let mut builder = CellBuilder::new();
        builder.store_ref(a.clone()).unwrap();
        builder.store_ref(b.clone()).unwrap();
        let cell = builder.build().unwrap();

        let mut slice = CellSlice::new(&cell);
        assert_eq!(slice.ref_at(1).unwrap().hash(), b.hash());
        assert_eq!(
            slice.ref_at(2).unwrap_err(),
            CellError::OutOfBounds { need: 3, have: 2 }
        );
        assert_eq!(slice.load_ref().unwrap().hash(), a.hash());
        assert_eq!(slice.refs_left(), 1);
        slice.skip_refs(1).unwrap();
        assert!(slice.load_ref().is_err());
        assert!(slice.skip_refs(1).is_err());
    }
}
