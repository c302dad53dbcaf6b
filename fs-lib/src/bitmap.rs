//! Bit operations over one bitmap block.
//!
//! Bit `n` lives in byte `n / 8`, bit position `n % 8`, matching the
//! little-endian word layout the Minix tools use.

use bit_field::BitField;

use super::{ BlockData, BITS_PER_BLOCK };

/// Index of the first clear bit, or `None` if the block is full.
pub fn find_first_zero(map: &BlockData) -> Option<usize> {
    map.iter()
        .position(|&byte| byte != 0xff)
        .map(|i| i * 8 + (!map[i]).trailing_zeros() as usize)
}

pub fn test_bit(map: &BlockData, nr: usize) -> bool {
    debug_assert!(nr < BITS_PER_BLOCK);
    map[nr / 8].get_bit(nr % 8)
}

/// Set bit `nr`, returning its previous value.
pub fn set_bit(map: &mut BlockData, nr: usize) -> bool {
    let old = test_bit(map, nr);
    map[nr / 8].set_bit(nr % 8, true);
    old
}

/// Clear bit `nr`, returning its previous value.
pub fn clear_bit(map: &mut BlockData, nr: usize) -> bool {
    let old = test_bit(map, nr);
    map[nr / 8].set_bit(nr % 8, false);
    old
}
