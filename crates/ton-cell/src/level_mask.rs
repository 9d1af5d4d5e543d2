//! Level masks of TON cells.
//!
//! A cell below a pruned branch has more than one meaningful hash: one per
//! significant level. The level mask records which levels are significant.
//! Ordinary cells inherit the union of their children's masks; Merkle cells
//! shift it down by one level.
//!
//! Reference: ton-blockchain/ton/crypto/vm/cells/LevelMask.h

/// Maximum cell level (0-3).
pub const MAX_LEVEL: u8 = 3;

/// Three-bit mask; bit `n - 1` set means level `n` is significant.
/// Level 0 is always significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LevelMask(u8);

impl LevelMask {
    /// Create a mask, keeping only the three level bits.
    #[inline]
    pub fn new(mask: u8) -> Self {
        Self(mask & 0x07)
    }

    /// Raw mask value (0..=7).
    #[inline]
    pub fn mask(&self) -> u8 {
        self.0
    }

    /// Highest significant level.
    #[inline]
    pub fn level(&self) -> u8 {
        8 - self.0.leading_zeros() as u8
    }

    /// Number of significant levels above 0.
    ///
    /// Also the position of the top-level hash in a cell's hash list.
    #[inline]
    pub fn hash_index(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Number of hashes a cell with this mask carries.
    #[inline]
    pub fn hash_count(&self) -> usize {
        self.hash_index() + 1
    }

    /// Keep only the levels strictly below and including `level`.
    ///
    /// `mask.apply(level).hash_index()` is where the hash for `level` lives.
    #[inline]
    pub fn apply(&self, level: u8) -> Self {
        let level = level.min(MAX_LEVEL);
        Self::new(self.0 & ((1u8 << level) - 1))
    }

    /// Union of two masks.
    #[inline]
    pub fn union(&self, other: LevelMask) -> Self {
        Self::new(self.0 | other.0)
    }

    /// Mask of a Merkle cell over a child with this mask.
    #[inline]
    pub fn shift_right(&self) -> Self {
        Self::new(self.0 >> 1)
    }

    #[inline]
    pub fn is_significant(&self, level: u8) -> bool {
        level == 0 || (level <= MAX_LEVEL && (self.0 >> (level - 1)) & 1 != 0)
    }
}

impl From<u8> for LevelMask {
    fn from(mask: u8) -> Self {
        Self::new(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_truncates() {
        assert_eq!(LevelMask::new(0b101).mask(), 0b101);
        assert_eq!(LevelMask::new(0xFF).mask(), 0x07);
    }

    #[test]
    fn test_level() {
        assert_eq!(LevelMask::new(0b000).level(), 0);
        assert_eq!(LevelMask::new(0b001).level(), 1);
        assert_eq!(LevelMask::new(0b011).level(), 2);
        assert_eq!(LevelMask::new(0b100).level(), 3);
        assert_eq!(LevelMask::new(0b111).level(), 3);
    }

    #[test]
    fn test_hash_index_of_sparse_mask() {
        // Levels 0 and 2 significant: the level-2 hash is the second one.
        let mask = LevelMask::new(0b010);
        assert_eq!(mask.hash_count(), 2);
        assert_eq!(mask.apply(0).hash_index(), 0);
        assert_eq!(mask.apply(1).hash_index(), 0);
        assert_eq!(mask.apply(2).hash_index(), 1);
        assert_eq!(mask.apply(3).hash_index(), 1);
    }

    #[test]
    fn test_apply() {
        let mask = LevelMask::new(0b111);
        assert_eq!(mask.apply(0).mask(), 0b000);
        assert_eq!(mask.apply(1).mask(), 0b001);
        assert_eq!(mask.apply(2).mask(), 0b011);
        assert_eq!(mask.apply(3).mask(), 0b111);
        assert_eq!(mask.apply(9).mask(), 0b111);
    }

    #[test]
    fn test_union_and_shift() {
        assert_eq!(LevelMask::new(0b101).union(LevelMask::new(0b011)).mask(), 0b111);
        assert_eq!(LevelMask::new(0b110).shift_right().mask(), 0b011);
        assert_eq!(LevelMask::new(0b001).shift_right().mask(), 0b000);
    }

    #[test]
    fn test_is_significant() {
        let mask = LevelMask::new(0b101);
        assert!(mask.is_significant(0));
        assert!(mask.is_significant(1));
        assert!(!mask.is_significant(2));
        assert!(mask.is_significant(3));
        assert!(!mask.is_significant(4));
    }
}
