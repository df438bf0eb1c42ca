//! Connected-texture tile selection.
//!
//! A face's 8 in-plane neighbours are reduced to a bitmask of "same block
//! type" flags and matched against a fixed decision list of 48 rows, one per
//! tile. Each row is a pattern over the neighbours: `1` must be the same
//! type, `0` must differ, `.` is ignored. Rows overlap and the first match
//! wins, so a general row placed after its specific variants only catches
//! what they leave over. Diagonals only matter next to two connected edges,
//! with one exception: a block connected by diagonals alone gets its own
//! tile, 47, distinct from the fully isolated tile 0.

/// Bit for each neighbour in a connected-texture mask.
pub mod bits {
    /// +v.
    pub const N: u8 = 1 << 0;
    /// +u.
    pub const E: u8 = 1 << 1;
    /// −v.
    pub const S: u8 = 1 << 2;
    /// −u.
    pub const W: u8 = 1 << 3;
    /// +u +v.
    pub const NE: u8 = 1 << 4;
    /// +u −v.
    pub const SE: u8 = 1 << 5;
    /// −u −v.
    pub const SW: u8 = 1 << 6;
    /// −u +v.
    pub const NW: u8 = 1 << 7;
}

/// Number of rules (and tile slots) in a connected-texture sheet.
pub const CONNECTED_TILE_COUNT: usize = 48;

#[derive(Clone, Copy, Debug)]
struct Rule {
    must_set: u8,
    must_clear: u8,
    tile: u8,
}

impl Rule {
    fn matches(&self, mask: u8) -> bool {
        mask & self.must_set == self.must_set && mask & self.must_clear == 0
    }
}

/// Parses a pattern in bit order `N E S W NE SE SW NW`.
const fn row(pattern: &[u8; 8], tile: u8) -> Rule {
    let mut must_set = 0u8;
    let mut must_clear = 0u8;
    let mut i = 0;
    while i < 8 {
        let bit = 1u8 << i;
        match pattern[i] {
            b'1' => must_set |= bit,
            b'0' => must_clear |= bit,
            _ => {}
        }
        i += 1;
    }
    Rule {
        must_set,
        must_clear,
        tile,
    }
}

#[rustfmt::skip]
const RULES: [Rule; CONNECTED_TILE_COUNT] = [
    //    NESW diag
    row(b"00000000", 0),
    row(b"0000....", 47),
    // one edge
    row(b"1000....", 1),
    row(b"0100....", 2),
    row(b"0010....", 3),
    row(b"0001....", 4),
    // two edges
    row(b"11001...", 6),
    row(b"1100....", 5),
    row(b"1010....", 7),
    row(b"0110.1..", 9),
    row(b"0110....", 8),
    row(b"1001...1", 11),
    row(b"1001....", 10),
    row(b"0101....", 12),
    row(b"0011..1.", 14),
    row(b"0011....", 13),
    // three edges
    row(b"111011..", 18),
    row(b"11101...", 16),
    row(b"1110.1..", 17),
    row(b"1110....", 15),
    row(b"11011..1", 22),
    row(b"11011...", 20),
    row(b"1101...1", 21),
    row(b"1101....", 19),
    row(b"1011..11", 26),
    row(b"1011..1.", 24),
    row(b"1011...1", 25),
    row(b"1011....", 23),
    row(b"0111.11.", 30),
    row(b"0111.1..", 28),
    row(b"0111..1.", 29),
    row(b"0111....", 27),
    // four edges
    row(b"11111111", 46),
    row(b"11111110", 42),
    row(b"11111101", 43),
    row(b"11111011", 44),
    row(b"11110111", 45),
    row(b"11111100", 36),
    row(b"11111010", 37),
    row(b"11110110", 38),
    row(b"11111001", 39),
    row(b"11110101", 40),
    row(b"11110011", 41),
    row(b"11111000", 32),
    row(b"11110100", 33),
    row(b"11110010", 34),
    row(b"11110001", 35),
    row(b"1111....", 31),
];

/// Packs an 8-neighbour same-type ring (see [`crate::ambient_occlusion::ring`])
/// into a mask.
pub fn neighbor_mask(same: [bool; 8]) -> u8 {
    same.iter()
        .enumerate()
        .fold(0, |m, (i, &s)| if s { m | (1 << i) } else { m })
}

/// Tile index (`0..48`) for a neighbour mask. First matching rule wins.
pub fn connected_tile(mask: u8) -> usize {
    RULES
        .iter()
        .find(|r| r.matches(mask))
        .map_or(0, |r| r.tile as usize)
}

#[cfg(test)]
mod tests {
    use super::bits::*;
    use super::*;

    #[test]
    fn test_every_mask_selects_a_tile_in_range() {
        for mask in 0..=255u8 {
            assert!(connected_tile(mask) < CONNECTED_TILE_COUNT, "mask {mask:08b}");
        }
    }

    #[test]
    fn test_every_mask_is_matched_by_some_row() {
        for mask in 0..=255u8 {
            assert!(RULES.iter().any(|r| r.matches(mask)), "mask {mask:08b} fell through");
        }
    }

    #[test]
    fn test_all_false_selects_zero() {
        assert_eq!(connected_tile(0), 0);
        assert_eq!(connected_tile(neighbor_mask([false; 8])), 0);
    }

    #[test]
    fn test_all_true_selects_full_tile() {
        assert_eq!(connected_tile(0xFF), 46);
    }

    #[test]
    fn test_every_tile_is_reachable() {
        let mut seen = [false; CONNECTED_TILE_COUNT];
        for mask in 0..=255u8 {
            seen[connected_tile(mask)] = true;
        }
        let missing: Vec<usize> = (0..CONNECTED_TILE_COUNT).filter(|&t| !seen[t]).collect();
        assert!(missing.is_empty(), "unreachable tiles {missing:?}");
    }

    #[test]
    fn test_every_row_wins_for_some_mask() {
        for (i, rule) in RULES.iter().enumerate() {
            let wins = (0..=255u8).any(|mask| {
                rule.matches(mask) && !RULES[..i].iter().any(|earlier| earlier.matches(mask))
            });
            assert!(wins, "row {i} (tile {}) is shadowed by earlier rows", rule.tile);
        }
    }

    #[test]
    fn test_tiles_are_distinct_per_rule() {
        let mut seen = [false; CONNECTED_TILE_COUNT];
        for r in &RULES {
            assert!(!seen[r.tile as usize], "tile {} reused", r.tile);
            seen[r.tile as usize] = true;
        }
    }

    #[test]
    fn test_overlapping_rows_first_match_wins() {
        // Both N|E rows match; the diagonal variant is listed first.
        assert_eq!(connected_tile(N | E | NE), 6);
        assert_eq!(connected_tile(N | E | SW), 5);
        assert_eq!(connected_tile(N | E | S | W | NE | SE), 36);
        assert_eq!(connected_tile(N | E | S | W), 31);
    }

    #[test]
    fn test_diagonals_without_edges_select_corner_tile() {
        assert_eq!(connected_tile(NE), 47);
        assert_eq!(connected_tile(NE | SE | SW | NW), 47);
        // NE with only N set behaves like N.
        assert_eq!(connected_tile(N | NE), connected_tile(N));
        // NE with N and E set changes the tile.
        assert_ne!(connected_tile(N | E | NE), connected_tile(N | E));
    }

    #[test]
    fn test_neighbor_mask_bit_order() {
        let mut same = [false; 8];
        same[0] = true;
        same[7] = true;
        assert_eq!(neighbor_mask(same), N | NW);
    }
}
