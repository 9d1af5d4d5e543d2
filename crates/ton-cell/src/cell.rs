//! Cell implementation for TON.
//!
//! A Cell holds up to 1023 bits of data and up to 4 references to other
//! cells. Cells are immutable: hashes and depths are computed once, when the
//! cell is created, from the cell's own data and its children's hashes.
//!
//! ## Multi-level Hashing
//!
//! A cell under a pruned branch has one hash per significant level of its
//! LevelMask. Level 0 is the hash a Merkle proof commits to; a pruned branch
//! shares it with the subtree it replaces. The top level is the
//! representation hash, which tells those two apart and identifies a cell
//! inside a bag.
//!
//! Reference: ton-blockchain/ton/crypto/vm/cells/DataCell.cpp

use std::sync::Arc;

use crate::{
    sha256, CellError, CellResult, CellType, LevelMask, MAX_CELL_BITS, MAX_CELL_REFS, MAX_LEVEL,
};

/// Hash size in bytes (SHA256).
pub const HASH_BYTES: usize = 32;

/// Depth size in bytes.
pub const DEPTH_BYTES: usize = 2;

/// Hash and depth of a cell at one significant level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelInfo {
    pub hash: [u8; HASH_BYTES],
    pub depth: u16,
}

/// A TON Cell - the basic unit of data storage.
///
/// Children are shared through `Arc`, so one subtree may hang under several
/// parents. Equality and `Hash` go through the representation hash: two
/// cells are equal exactly when their whole subtrees are.
#[derive(Debug, Clone)]
pub struct Cell {
    /// Data bytes; bits past `bit_len` in the last byte are zero.
    pub(crate) data: Vec<u8>,
    pub(crate) bit_len: usize,
    pub(crate) references: Vec<Arc<Cell>>,
    pub(crate) cell_type: CellType,
    pub(crate) level_mask: LevelMask,
    /// For pruned branches only the top level is computed; lower levels are
    /// stored in the data.
    pub(crate) level_info: Vec<LevelInfo>,
}

impl Cell {
    /// Create a cell from already validated parts.
    ///
    /// Called by `CellBuilder::build()` and the BoC decoder, which enforce
    /// the bit/ref limits and the exotic layouts beforehand.
    pub(crate) fn new(
        data: Vec<u8>,
        bit_len: usize,
        references: Vec<Arc<Cell>>,
        cell_type: CellType,
    ) -> Self {
        debug_assert!(bit_len <= MAX_CELL_BITS);
        debug_assert!(references.len() <= MAX_CELL_REFS);
        debug_assert_eq!(data.len(), bit_len.div_ceil(8));

        let mut cell = Cell {
            data,
            bit_len,
            references,
            cell_type,
            level_mask: LevelMask::default(),
            level_info: Vec::new(),
        };
        cell.level_mask = cell.compute_level_mask();
        cell.level_info = cell.compute_level_info();
        cell
    }

    /// Create an empty ordinary cell.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0, Vec::new(), CellType::Ordinary)
    }

    fn compute_level_mask(&self) -> LevelMask {
        match self.cell_type {
            CellType::Ordinary => self
                .references
                .iter()
                .fold(LevelMask::default(), |acc, r| acc.union(r.level_mask)),
            // data[0] = type tag, data[1] = level mask
            CellType::PrunedBranch => LevelMask::new(self.data.get(1).copied().unwrap_or(0)),
            CellType::Library => LevelMask::default(),
            CellType::MerkleProof | CellType::MerkleUpdate => self
                .references
                .iter()
                .fold(LevelMask::default(), |acc, r| acc.union(r.level_mask))
                .shift_right(),
        }
    }

    fn compute_level_info(&self) -> Vec<LevelInfo> {
        let mask = self.level_mask;
        // Pruned branches only compute their top hash.
        let first_computed = if self.cell_type == CellType::PrunedBranch {
            mask.hash_index()
        } else {
            0
        };

        let mut infos: Vec<LevelInfo> = Vec::with_capacity(mask.hash_count() - first_computed);
        let mut hash_index = 0usize;
        for level in 0..=mask.level() {
            if !mask.is_significant(level) {
                continue;
            }
            if hash_index < first_computed {
                hash_index += 1;
                continue;
            }

            let child_level = if self.cell_type.is_merkle() { level + 1 } else { level };
            let mut repr =
                Vec::with_capacity(2 + 128 + self.references.len() * (DEPTH_BYTES + HASH_BYTES));

            let (d1, d2) = self.descriptors_at_level(level);
            repr.push(d1);
            repr.push(d2);

            match infos.last() {
                Some(previous) => repr.extend_from_slice(&previous.hash),
                None => repr.extend_from_slice(&self.data_with_completion_tag()),
            }

            let mut depth = 0u16;
            for reference in &self.references {
                let child_depth = reference.get_depth(child_level);
                depth = depth.max(child_depth.saturating_add(1));
                repr.extend_from_slice(&child_depth.to_be_bytes());
            }
            for reference in &self.references {
                repr.extend_from_slice(&reference.get_hash(child_level));
            }

            infos.push(LevelInfo {
                hash: sha256(&repr),
                depth,
            });
            hash_index += 1;
        }
        infos
    }

    /// Hash stored inside pruned branch data for a lower level.
    ///
    /// Layout: type:8 mask:8 hashes:(n * 256) depths:(n * 16)
    fn pruned_hash(&self, hash_index: usize) -> [u8; HASH_BYTES] {
        let offset = 2 + hash_index * HASH_BYTES;
        let mut hash = [0u8; HASH_BYTES];
        if let Some(bytes) = self.data.get(offset..offset + HASH_BYTES) {
            hash.copy_from_slice(bytes);
        }
        hash
    }

    fn pruned_depth(&self, hash_index: usize) -> u16 {
        let offset = 2 + self.level_mask.hash_index() * HASH_BYTES + hash_index * DEPTH_BYTES;
        match self.data.get(offset..offset + DEPTH_BYTES) {
            Some(bytes) => u16::from_be_bytes([bytes[0], bytes[1]]),
            None => 0,
        }
    }

    /// Resolve a level to (is stored in pruned data, index).
    fn level_slot(&self, level: u8) -> (bool, usize) {
        let hash_index = self.level_mask.apply(level.min(MAX_LEVEL)).hash_index();
        if self.cell_type == CellType::PrunedBranch {
            let top = self.level_mask.hash_index();
            if hash_index < top {
                return (true, hash_index);
            }
            return (false, 0);
        }
        (false, hash_index)
    }

    /// The level-0 hash, the one Merkle proofs commit to.
    pub fn hash(&self) -> [u8; HASH_BYTES] {
        self.get_hash(0)
    }

    /// The representation hash: the hash at the cell's own level.
    ///
    /// Equal to `hash()` for level-0 cells. A pruned branch and the subtree it
    /// stands for differ here.
    pub fn repr_hash(&self) -> [u8; HASH_BYTES] {
        self.get_hash(MAX_LEVEL)
    }

    /// Get the hash at a specific level.
    ///
    /// For cells of level 0 every level returns the same hash.
    pub fn get_hash(&self, level: u8) -> [u8; HASH_BYTES] {
        match self.level_slot(level) {
            (true, index) => self.pruned_hash(index),
            (false, index) => self.level_info.get(index).map(|i| i.hash).unwrap_or_default(),
        }
    }

    /// Get the depth at a specific level.
    pub fn get_depth(&self, level: u8) -> u16 {
        match self.level_slot(level) {
            (true, index) => self.pruned_depth(index),
            (false, index) => self.level_info.get(index).map(|i| i.depth).unwrap_or_default(),
        }
    }

    /// Depth of the tree below this cell: 0 without references, otherwise
    /// 1 + the deepest child.
    pub fn depth(&self) -> u16 {
        self.get_depth(0)
    }

    /// Descriptor bytes as written into a BoC.
    ///
    /// d1 = refs_count + 8 * is_exotic + 32 * level_mask
    /// d2 = ceil(bit_len / 8) + floor(bit_len / 8)
    pub fn descriptors(&self) -> (u8, u8) {
        self.descriptors_with_mask(self.level_mask)
    }

    /// Descriptor bytes used when hashing at `level`.
    pub fn descriptors_at_level(&self, level: u8) -> (u8, u8) {
        self.descriptors_with_mask(self.level_mask.apply(level))
    }

    fn descriptors_with_mask(&self, mask: LevelMask) -> (u8, u8) {
        let exotic = if self.cell_type.is_exotic() { 8 } else { 0 };
        let d1 = self.references.len() as u8 + exotic + (mask.mask() << 5);
        let d2 = (self.bit_len.div_ceil(8) + self.bit_len / 8) as u8;
        (d1, d2)
    }

    /// Data padded to a byte boundary with a completion tag.
    ///
    /// When `bit_len` is not a multiple of 8, a single `1` bit follows the
    /// data and the rest of the byte stays zero.
    pub fn data_with_completion_tag(&self) -> Vec<u8> {
        let mut result = self.data.clone();
        let remainder = self.bit_len % 8;
        if remainder != 0 {
            if let Some(last) = result.last_mut() {
                *last |= 1 << (7 - remainder);
            }
        }
        result
    }

    pub fn level(&self) -> u8 {
        self.level_mask.level()
    }

    pub fn level_mask(&self) -> LevelMask {
        self.level_mask
    }

    /// Raw data bytes, MSB-first, without completion tag.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn references(&self) -> &[Arc<Cell>] {
        &self.references
    }

    /// Get a reference by index.
    pub fn reference(&self, index: usize) -> Option<&Arc<Cell>> {
        self.references.get(index)
    }

    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn is_exotic(&self) -> bool {
        self.cell_type.is_exotic()
    }

    /// Get a specific bit; `None` past the end of the data.
    pub fn get_bit(&self, index: usize) -> Option<bool> {
        if index >= self.bit_len {
            return None;
        }
        Some((self.data[index / 8] >> (7 - index % 8)) & 1 == 1)
    }
}

/// Check the fixed layout of an exotic cell.
///
/// Only the shape is checked (type tag, bit length, reference count). Proof
/// contents are left to whoever verifies the proof.
pub(crate) fn check_exotic_layout(
    cell_type: CellType,
    data: &[u8],
    bit_len: usize,
    ref_count: usize,
) -> CellResult<()> {
    if cell_type == CellType::Ordinary {
        return Ok(());
    }
    let tag = data.first().copied();
    if bit_len < 8 || tag != Some(cell_type as u8) {
        return Err(CellError::InvalidFormat(format!(
            "{:?} cell must start with type byte {}",
            cell_type, cell_type as u8
        )));
    }

    let (expected_bits, expected_refs) = match cell_type {
        CellType::Ordinary => (bit_len, ref_count),
        CellType::PrunedBranch => {
            let mask = LevelMask::new(data.get(1).copied().unwrap_or(0));
            if mask.level() == 0 {
                return Err(CellError::InvalidFormat(
                    "pruned branch must have a non-zero level mask".to_string(),
                ));
            }
            let levels = mask.hash_index();
            (16 + levels * (HASH_BYTES + DEPTH_BYTES) * 8, 0)
        }
        CellType::Library => (8 + HASH_BYTES * 8, 0),
        CellType::MerkleProof => (8 + HASH_BYTES * 8 + DEPTH_BYTES * 8, 1),
        CellType::MerkleUpdate => (8 + 2 * (HASH_BYTES + DEPTH_BYTES) * 8, 2),
    };

    if bit_len != expected_bits || ref_count != expected_refs {
        return Err(CellError::InvalidFormat(format!(
            "{:?} cell must have {} bits and {} refs, got {} bits and {} refs",
            cell_type, expected_bits, expected_refs, bit_len, ref_count
        )));
    }
    Ok(())
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.repr_hash() == other.repr_hash()
    }
}

impl Eq for Cell {}

impl std::hash::Hash for Cell {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::hash::Hash::hash(&self.repr_hash(), state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pruned(level_mask: u8, hash_byte: u8, depth: u16) -> Cell {
        let mut data = vec![CellType::PrunedBranch as u8, level_mask];
        data.extend_from_slice(&[hash_byte; HASH_BYTES]);
        data.extend_from_slice(&depth.to_be_bytes());
        let bit_len = data.len() * 8;
        Cell::new(data, bit_len, vec![], CellType::PrunedBranch)
    }

    #[test]
    fn test_empty_cell() {
        let cell = Cell::empty();
        assert_eq!(cell.bit_len(), 0);
        assert_eq!(cell.reference_count(), 0);
        assert_eq!(cell.depth(), 0);
        assert_eq!(cell.level(), 0);
        assert_eq!(cell.descriptors(), (0, 0));
        assert!(!cell.is_exotic());
    }

    #[test]
    fn test_descriptors_count_partial_bytes() {
        let cell = Cell::new(vec![0xFF], 8, vec![], CellType::Ordinary);
        assert_eq!(cell.descriptors(), (0, 2));

        let cell = Cell::new(vec![0b11111000], 5, vec![], CellType::Ordinary);
        assert_eq!(cell.descriptors(), (0, 1));

        let child = Arc::new(Cell::empty());
        let cell = Cell::new(vec![], 0, vec![child.clone(), child], CellType::Ordinary);
        assert_eq!(cell.descriptors(), (2, 0));
    }

    #[test]
    fn test_data_with_completion_tag() {
        let cell = Cell::new(vec![0xFF], 8, vec![], CellType::Ordinary);
        assert_eq!(cell.data_with_completion_tag(), vec![0xFF]);

        // 11111 + tag 1 + 00
        let cell = Cell::new(vec![0b11111000], 5, vec![], CellType::Ordinary);
        assert_eq!(cell.data_with_completion_tag(), vec![0b11111100]);
    }

    #[test]
    fn test_depth_follows_deepest_child() {
        let leaf = Arc::new(Cell::empty());
        let one = Arc::new(Cell::new(vec![], 0, vec![leaf.clone()], CellType::Ordinary));
        let two = Cell::new(vec![], 0, vec![leaf, one], CellType::Ordinary);
        assert_eq!(two.depth(), 2);
    }

    #[test]
    fn test_hash_covers_children() {
        let a = Arc::new(Cell::new(vec![0x01], 8, vec![], CellType::Ordinary));
        let b = Arc::new(Cell::new(vec![0x02], 8, vec![], CellType::Ordinary));
        let left = Cell::new(vec![], 0, vec![a.clone()], CellType::Ordinary);
        let right = Cell::new(vec![], 0, vec![b], CellType::Ordinary);
        let again = Cell::new(vec![], 0, vec![a], CellType::Ordinary);
        assert_ne!(left.hash(), right.hash());
        assert_eq!(left, again);
    }

    #[test]
    fn test_pruned_branch_levels() {
        let cell = pruned(1, 0xAB, 7);
        assert_eq!(cell.level(), 1);
        assert_eq!(cell.descriptors(), (8 + 32, 2 * 36));
        // Level 0 comes from the stored data, level 1 is computed.
        assert_eq!(cell.get_hash(0), [0xAB; HASH_BYTES]);
        assert_eq!(cell.get_depth(0), 7);
        assert_ne!(cell.get_hash(1), [0xAB; HASH_BYTES]);
        assert_eq!(cell.get_depth(1), 0);
        assert_eq!(cell.get_hash(3), cell.get_hash(1));
    }

    #[test]
    fn test_ordinary_parent_inherits_level() {
        let child = Arc::new(pruned(1, 0x11, 3));
        let parent = Cell::new(vec![], 0, vec![child], CellType::Ordinary);
        assert_eq!(parent.level(), 1);
        assert_eq!(parent.get_depth(0), 4);
        assert_ne!(parent.get_hash(0), parent.get_hash(1));
    }

    #[test]
    fn test_merkle_proof_lowers_level() {
        let child = Arc::new(pruned(1, 0x22, 5));
        let mut data = vec![CellType::MerkleProof as u8];
        data.extend_from_slice(&child.get_hash(0));
        data.extend_from_slice(&child.get_depth(0).to_be_bytes());
        let bit_len = data.len() * 8;
        check_exotic_layout(CellType::MerkleProof, &data, bit_len, 1).unwrap();

        let proof = Cell::new(data, bit_len, vec![child.clone()], CellType::MerkleProof);
        assert_eq!(proof.level(), 0);
        assert_eq!(proof.descriptors().0, 1 + 8);
        // Merkle cells hash children one level up.
        assert_eq!(proof.get_depth(0), child.get_depth(1) + 1);
    }

    #[test]
    fn test_check_exotic_layout_rejects_bad_shapes() {
        assert!(check_exotic_layout(CellType::PrunedBranch, &[1, 0], 16, 0).is_err());
        assert!(check_exotic_layout(CellType::MerkleProof, &[4], 8, 1).is_err());
        assert!(check_exotic_layout(CellType::Library, &[2; 33], 264, 1).is_err());
        assert!(check_exotic_layout(CellType::Library, &[], 0, 0).is_err());
        let mut library = vec![2u8];
        library.extend_from_slice(&[0; 32]);
        assert!(check_exotic_layout(CellType::Library, &library, 264, 0).is_ok());
    }

    #[test]
    fn test_pruned_branch_differs_from_its_subtree() {
        let secret = Cell::new(vec![0xC0, 0xDE], 16, vec![], CellType::Ordinary);
        let stand_in = pruned(1, 0, secret.depth());
        let mut data = stand_in.data.clone();
        data[2..2 + HASH_BYTES].copy_from_slice(&secret.hash());
        let stand_in = Cell::new(data, stand_in.bit_len, vec![], CellType::PrunedBranch);

        assert_eq!(stand_in.hash(), secret.hash());
        assert_eq!(secret.repr_hash(), secret.hash());
        assert_ne!(stand_in.repr_hash(), secret.repr_hash());
        assert_ne!(stand_in, secret);
    }

    #[test]
    fn test_get_bit() {
        let cell = Cell::new(vec![0b1010_0000], 3, vec![], CellType::Ordinary);
        assert_eq!(cell.get_bit(0), Some(true));
        assert_eq!(cell.get_bit(1), Some(false));
        assert_eq!(cell.get_bit(2), Some(true));
        assert_eq!(cell.get_bit(3), None);
    }
}
