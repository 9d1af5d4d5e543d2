//! Bag of Cells (BoC) serialization format.
//!
//! BoC is the standard byte encoding of a cell DAG. Every distinct subtree is
//! written once and referenced by index. Parents come before their children,
//! so every reference points to a strictly greater index.
//!
//! Layout:
//!
//! ```text
//! magic:u32 flags:u8 off_bytes:u8
//! cells:size roots:size absent:size tot_cells_size:off
//! root_index:size * roots
//! [cell_end_offset:off * cells]          (flags & 0x80)
//! cell_data * cells
//! [crc32c:u32 little-endian]             (flags & 0x40)
//! ```
//!
//! Reference: ton-blockchain/ton/crypto/vm/boc.cpp

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use tracing::{debug, trace};

use crate::cell::check_exotic_layout;
use crate::{
    crc32c, Cell, CellError, CellResult, CellType, LevelMask, BOC_GENERIC_MAGIC,
    BOC_INDEXED_CRC32_MAGIC, BOC_INDEXED_MAGIC, HASH_BYTES, DEPTH_BYTES, MAX_CELL_DEPTH,
    MAX_CELL_REFS,
};

const FLAG_HAS_INDEX: u8 = 0x80;
const FLAG_HAS_CRC: u8 = 0x40;
const FLAG_HAS_CACHE_BITS: u8 = 0x20;
const FLAG_SIZE_MASK: u8 = 0x07;

/// d1 bit marking a cell that carries its hashes inline.
const D1_WITH_HASHES: u8 = 0x10;

/// Bag of Cells - a collection of root cells and everything below them.
///
/// Serialization is deterministic: the same roots in the same order always
/// produce the same bytes, however the DAG was assembled in memory.
#[derive(Debug, Clone)]
pub struct BagOfCells {
    roots: Vec<Arc<Cell>>,
}

/// A cell as read from the wire, before its children are resolved.
struct RawCell {
    cell_type: CellType,
    data: Vec<u8>,
    bit_len: usize,
    level_mask: LevelMask,
    references: Vec<usize>,
}

impl BagOfCells {
    /// Create a new BoC with the given root cells.
    pub fn new(roots: Vec<Arc<Cell>>) -> Self {
        BagOfCells { roots }
    }

    /// Create a BoC with a single root cell.
    pub fn from_root(root: impl Into<Arc<Cell>>) -> Self {
        BagOfCells {
            roots: vec![root.into()],
        }
    }

    pub fn roots(&self) -> &[Arc<Cell>] {
        &self.roots
    }

    /// The only root; `MalformedBoc` when there is not exactly one.
    pub fn single_root(&self) -> CellResult<&Arc<Cell>> {
        match self.roots.as_slice() {
            [root] => Ok(root),
            roots => Err(CellError::MalformedBoc(format!(
                "expected a single root, found {}",
                roots.len()
            ))),
        }
    }

    /// Consume the bag and return its only root.
    pub fn into_single_root(self) -> CellResult<Arc<Cell>> {
        self.single_root()?;
        self.roots
            .into_iter()
            .next()
            .ok_or_else(|| CellError::MalformedBoc("expected a single root, found 0".to_string()))
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Serialize with a CRC32-C trailer and no index.
    pub fn serialize(&self) -> CellResult<Vec<u8>> {
        self.serialize_with_options(true, false)
    }

    /// Serialize with options.
    ///
    /// # Arguments
    /// * `with_crc` - Append a CRC32-C of everything before it
    /// * `with_index` - Write the per-cell end offset table
    pub fn serialize_with_options(&self, with_crc: bool, with_index: bool) -> CellResult<Vec<u8>> {
        if self.roots.is_empty() {
            return Err(CellError::MalformedBoc("no root cells".to_string()));
        }

        let cells = self.collect_cells();
        let index_of: HashMap<[u8; HASH_BYTES], usize> = cells
            .iter()
            .enumerate()
            .map(|(i, c)| (c.repr_hash(), i))
            .collect();

        let size_bytes = bytes_needed(cells.len());
        if size_bytes > 4 {
            return Err(CellError::MalformedBoc(format!(
                "too many cells: {}",
                cells.len()
            )));
        }

        let mut cell_data: Vec<Vec<u8>> = Vec::with_capacity(cells.len());
        for cell in &cells {
            cell_data.push(serialize_cell(cell, &index_of, size_bytes)?);
        }
        let total_cells_size: usize = cell_data.iter().map(Vec::len).sum();
        let off_bytes = bytes_needed(total_cells_size);

        let mut result = Vec::with_capacity(32 + total_cells_size);
        result.extend_from_slice(&BOC_GENERIC_MAGIC.to_be_bytes());

        let mut flags = size_bytes as u8;
        if with_index {
            flags |= FLAG_HAS_INDEX;
        }
        if with_crc {
            flags |= FLAG_HAS_CRC;
        }
        result.push(flags);
        result.push(off_bytes as u8);

        write_uint(&mut result, cells.len() as u64, size_bytes);
        write_uint(&mut result, self.roots.len() as u64, size_bytes);
        write_uint(&mut result, 0, size_bytes);
        write_uint(&mut result, total_cells_size as u64, off_bytes);

        for root in &self.roots {
            let index = index_of.get(&root.repr_hash()).copied().ok_or_else(|| {
                CellError::MalformedBoc("root missing from cell list".to_string())
            })?;
            write_uint(&mut result, index as u64, size_bytes);
        }

        if with_index {
            let mut end = 0usize;
            for data in &cell_data {
                end += data.len();
                write_uint(&mut result, end as u64, off_bytes);
            }
        }

        for data in &cell_data {
            result.extend_from_slice(data);
        }

        if with_crc {
            let crc = crc32c(&result);
            result.extend_from_slice(&crc.to_le_bytes());
        }

        debug!(
            cells = cells.len(),
            roots = self.roots.len(),
            bytes = result.len(),
            "serialized bag of cells"
        );
        Ok(result)
    }

    /// Serialize (with CRC) to standard padded base64.
    pub fn serialize_to_base64(&self) -> CellResult<String> {
        let bytes = self.serialize()?;
        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    /// Serialize (with CRC) to URL-safe base64 without padding.
    pub fn serialize_to_base64_url(&self) -> CellResult<String> {
        let bytes = self.serialize()?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Deserialize from bytes.
    ///
    /// Supports all three BoC formats:
    /// - `0xb5ee9c72` - Generic BoC (serialized_boc)
    /// - `0x68ff65f3` - Indexed BoC (serialized_boc_idx)
    /// - `0xacc3a728` - Indexed BoC with CRC32C (serialized_boc_idx_crc32c)
    ///
    /// Any structural problem yields `MalformedBoc`; the decoder never
    /// panics on untrusted input.
    pub fn deserialize(data: &[u8]) -> CellResult<Self> {
        let mut reader = ByteReader::new(data);

        let magic = reader.read_uint(4)? as u32;
        let (has_index, has_crc, size_bytes) = match magic {
            BOC_GENERIC_MAGIC => {
                let flags = reader.read_u8()?;
                if flags & FLAG_HAS_CACHE_BITS != 0 && flags & FLAG_HAS_INDEX == 0 {
                    return Err(malformed("cache bits set without an index"));
                }
                (
                    flags & FLAG_HAS_INDEX != 0,
                    flags & FLAG_HAS_CRC != 0,
                    (flags & FLAG_SIZE_MASK) as usize,
                )
            }
            BOC_INDEXED_MAGIC => (true, false, reader.read_u8()? as usize),
            BOC_INDEXED_CRC32_MAGIC => (true, true, reader.read_u8()? as usize),
            other => return Err(malformed(format!("unknown magic {:08x}", other))),
        };

        if !(1..=4).contains(&size_bytes) {
            return Err(malformed(format!("invalid size_bytes {}", size_bytes)));
        }
        let off_bytes = reader.read_u8()? as usize;
        if !(1..=8).contains(&off_bytes) {
            return Err(malformed(format!("invalid off_bytes {}", off_bytes)));
        }

        let cell_count = reader.read_uint(size_bytes)? as usize;
        let root_count = reader.read_uint(size_bytes)? as usize;
        let absent_count = reader.read_uint(size_bytes)? as usize;
        let total_cells_size = reader.read_uint(off_bytes)?;

        if root_count == 0 {
            return Err(malformed("no root cells"));
        }
        if absent_count != 0 {
            return Err(malformed("absent cells are not supported"));
        }
        // Every cell takes at least its two descriptor bytes.
        if total_cells_size > data.len() as u64 || (cell_count as u64) * 2 > total_cells_size {
            return Err(malformed(format!(
                "{} cells cannot fit in {} bytes of cell data",
                cell_count, total_cells_size
            )));
        }
        let total_cells_size = total_cells_size as usize;

        // The same cell may be listed as a root more than once.
        let mut root_indices = Vec::new();
        for _ in 0..root_count {
            let index = reader.read_uint(size_bytes)? as usize;
            if index >= cell_count {
                return Err(malformed(format!(
                    "root index {} out of range ({} cells)",
                    index, cell_count
                )));
            }
            root_indices.push(index);
        }

        if has_index {
            reader.skip(cell_count * off_bytes)?;
        }

        let body_end = if has_crc {
            let end = data
                .len()
                .checked_sub(4)
                .ok_or_else(|| malformed("missing CRC32-C trailer"))?;
            let expected = u32::from_le_bytes([data[end], data[end + 1], data[end + 2], data[end + 3]]);
            let actual = crc32c(&data[..end]);
            if expected != actual {
                return Err(malformed(format!(
                    "CRC32-C mismatch: stored {:08x}, computed {:08x}",
                    expected, actual
                )));
            }
            end
        } else {
            data.len()
        };

        let cells_start = reader.position();
        if cells_start.checked_add(total_cells_size) != Some(body_end) {
            return Err(malformed(format!(
                "declared cell data size {} does not match the {} bytes available",
                total_cells_size,
                body_end.saturating_sub(cells_start)
            )));
        }

        let raw_cells = parse_cells(
            &data[cells_start..body_end],
            cell_count,
            size_bytes,
        )?;
        let cells = build_cells(raw_cells)?;

        let roots = root_indices
            .into_iter()
            .map(|i| cells[i].clone())
            .collect();

        debug!(
            cells = cell_count,
            roots = root_count,
            bytes = data.len(),
            "deserialized bag of cells"
        );
        Ok(BagOfCells { roots })
    }

    /// Deserialize from base64, standard or URL-safe, padded or not.
    pub fn deserialize_from_base64(base64_str: &str) -> CellResult<Self> {
        let trimmed = base64_str.trim().trim_end_matches('=');
        let engine = if trimmed.contains(['-', '_']) {
            &URL_SAFE_NO_PAD
        } else {
            &STANDARD_NO_PAD
        };
        let bytes = engine
            .decode(trimmed)
            .map_err(|e| CellError::InvalidFormat(format!("invalid base64: {}", e)))?;
        Self::deserialize(&bytes)
    }

    /// Deserialize from a hex string.
    pub fn deserialize_from_hex(hex_str: &str) -> CellResult<Self> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| CellError::InvalidFormat(format!("invalid hex: {}", e)))?;
        Self::deserialize(&bytes)
    }

    /// All distinct cells, parents before children, first root at index 0.
    ///
    /// This is the reverse of a post-order walk that visits roots and
    /// references last-to-first.
    fn collect_cells(&self) -> Vec<Arc<Cell>> {
        let mut visited = HashSet::new();
        let mut post_order = Vec::new();
        for root in self.roots.iter().rev() {
            visit(root, &mut visited, &mut post_order);
        }
        post_order.reverse();
        post_order
    }
}

fn visit(cell: &Arc<Cell>, visited: &mut HashSet<[u8; HASH_BYTES]>, out: &mut Vec<Arc<Cell>>) {
    if !visited.insert(cell.repr_hash()) {
        return;
    }
    for reference in cell.references().iter().rev() {
        visit(reference, visited, out);
    }
    out.push(cell.clone());
}

fn serialize_cell(
    cell: &Cell,
    index_of: &HashMap<[u8; HASH_BYTES], usize>,
    size_bytes: usize,
) -> CellResult<Vec<u8>> {
    let (d1, d2) = cell.descriptors();
    let data = cell.data_with_completion_tag();

    let mut result = Vec::with_capacity(2 + data.len() + cell.reference_count() * size_bytes);
    result.push(d1);
    result.push(d2);
    result.extend_from_slice(&data);

    for reference in cell.references() {
        let index = index_of.get(&reference.repr_hash()).copied().ok_or_else(|| {
            CellError::MalformedBoc("reference missing from cell list".to_string())
        })?;
        write_uint(&mut result, index as u64, size_bytes);
    }
    Ok(result)
}

/// Parse the cell data region into unresolved cells.
fn parse_cells(region: &[u8], cell_count: usize, size_bytes: usize) -> CellResult<Vec<RawCell>> {
    let mut reader = ByteReader::new(region);
    let mut cells = Vec::with_capacity(cell_count);

    for index in 0..cell_count {
        let d1 = reader.read_u8()?;
        let d2 = reader.read_u8()?;

        let ref_count = (d1 & 0x07) as usize;
        if ref_count > MAX_CELL_REFS {
            return Err(malformed(format!(
                "cell {} declares {} references",
                index, ref_count
            )));
        }
        let is_exotic = d1 & 0x08 != 0;
        let level_mask = LevelMask::new(d1 >> 5);

        if d1 & D1_WITH_HASHES != 0 {
            reader.skip(level_mask.hash_count() * (HASH_BYTES + DEPTH_BYTES))?;
        }

        let byte_len = (d2 as usize).div_ceil(2);
        let raw = reader.read_bytes(byte_len)?;
        let (data, bit_len) = if d2 % 2 == 0 {
            (raw.to_vec(), byte_len * 8)
        } else {
            strip_completion_tag(raw).ok_or_else(|| {
                malformed(format!("cell {} is missing its completion tag", index))
            })?
        };

        let cell_type = if is_exotic {
            data.first()
                .copied()
                .and_then(CellType::from_exotic_tag)
                .ok_or_else(|| malformed(format!("cell {} has an unknown exotic type", index)))?
        } else {
            CellType::Ordinary
        };

        let mut references = Vec::with_capacity(ref_count);
        for _ in 0..ref_count {
            let target = reader.read_uint(size_bytes)? as usize;
            if target <= index {
                return Err(malformed(format!(
                    "cell {} references earlier cell {}",
                    index, target
                )));
            }
            if target >= cell_count {
                return Err(malformed(format!(
                    "cell {} references index {} out of range ({} cells)",
                    index, target, cell_count
                )));
            }
            references.push(target);
        }

        trace!(index, bits = bit_len, refs = ref_count, ?cell_type, "parsed cell");
        cells.push(RawCell {
            cell_type,
            data,
            bit_len,
            level_mask,
            references,
        });
    }

    if reader.remaining() != 0 {
        return Err(malformed(format!(
            "{} trailing bytes after the last cell",
            reader.remaining()
        )));
    }
    Ok(cells)
}

/// Build cells from the last index to the first so children exist first.
fn build_cells(raw_cells: Vec<RawCell>) -> CellResult<Vec<Arc<Cell>>> {
    let count = raw_cells.len();
    let mut built: Vec<Option<Arc<Cell>>> = vec![None; count];

    for (index, raw) in raw_cells.into_iter().enumerate().rev() {
        let references = raw
            .references
            .iter()
            .map(|&r| {
                built[r]
                    .clone()
                    .ok_or_else(|| malformed(format!("cell {} is not built yet", r)))
            })
            .collect::<CellResult<Vec<_>>>()?;

        check_exotic_layout(raw.cell_type, &raw.data, raw.bit_len, references.len())
            .map_err(|e| malformed(format!("cell {}: {}", index, e)))?;

        let cell = Cell::new(raw.data, raw.bit_len, references, raw.cell_type);
        if cell.level_mask() != raw.level_mask {
            return Err(malformed(format!(
                "cell {} declares level mask {} but has {}",
                index,
                raw.level_mask.mask(),
                cell.level_mask().mask()
            )));
        }
        if cell.depth() > MAX_CELL_DEPTH {
            return Err(malformed(format!(
                "cell {} exceeds the maximum depth {}",
                index, MAX_CELL_DEPTH
            )));
        }
        built[index] = Some(Arc::new(cell));
    }

    built
        .into_iter()
        .enumerate()
        .map(|(i, c)| c.ok_or_else(|| malformed(format!("cell {} was never built", i))))
        .collect()
}

/// Split a tagged last byte into clean data and bit length.
///
/// The tag is the lowest set bit of the last byte. `None` if the byte holds
/// no tag or nothing but the tag.
fn strip_completion_tag(raw: &[u8]) -> Option<(Vec<u8>, usize)> {
    let last = *raw.last()?;
    // A tag in the top bit would leave the byte without data bits.
    if last == 0 || last == 0x80 {
        return None;
    }
    let trailing = last.trailing_zeros() as usize;
    let bit_len = raw.len() * 8 - trailing - 1;

    let mut data = raw.to_vec();
    if let Some(byte) = data.last_mut() {
        // Clear the tag and everything after it.
        *byte &= !((1u16 << (trailing + 1)) - 1) as u8;
    }
    Some((data, bit_len))
}

fn malformed(message: impl Into<String>) -> CellError {
    CellError::MalformedBoc(message.into())
}

/// Minimal number of bytes to hold `n` (at least one).
fn bytes_needed(n: usize) -> usize {
    if n == 0 {
        1
    } else {
        ((64 - (n as u64).leading_zeros()) as usize).div_ceil(8)
    }
}

fn write_uint(buf: &mut Vec<u8>, value: u64, bytes: usize) {
    for i in (0..bytes).rev() {
        buf.push((value >> (i * 8)) as u8);
    }
}

/// Bounds-checked big-endian reader; running off the end is `MalformedBoc`.
struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        ByteReader { data, offset: 0 }
    }

    fn read_bytes(&mut self, count: usize) -> CellResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(count)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                malformed(format!(
                    "unexpected end of data: need {} bytes at offset {}, have {}",
                    count,
                    self.offset,
                    self.remaining()
                ))
            })?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> CellResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_uint(&mut self, bytes: usize) -> CellResult<u64> {
        Ok(self
            .read_bytes(bytes)?
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }

    fn skip(&mut self, count: usize) -> CellResult<()> {
        self.read_bytes(count).map(|_| ())
    }

    fn position(&self) -> usize {
        self.offset
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }
}
