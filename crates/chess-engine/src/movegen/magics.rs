//! Magic bitboard lookup for sliding pieces.
//!
//! The multipliers below were found for a board numbered a1 = 0. Our squares
//! are numbered from a8, so each lookup mirrors the occupancy vertically
//! before hashing and the stored attack sets are kept in our own numbering.

use std::sync::OnceLock;

use crate::Bitboard;
use chess_core::Square;

#[derive(Clone, Copy, Default)]
struct Magic {
    /// Relevant blockers, mirrored into a1 numbering.
    mask: u64,
    magic: u64,
    shift: u8,
    offset: usize,
}

impl Magic {
    #[inline]
    fn index(&self, occupied: Bitboard) -> usize {
        let relevant = occupied.flip_vertical().0 & self.mask;
        self.offset + (relevant.wrapping_mul(self.magic) >> self.shift) as usize
    }
}

struct SliderTable {
    magics: [Magic; 64],
    attacks: Vec<Bitboard>,
}

#[derive(Clone, Copy)]
enum Slider {
    Bishop,
    Rook,
}

impl Slider {
    fn directions(self) -> [(i8, i8); 4] {
        match self {
            Slider::Bishop => [(1, 1), (1, -1), (-1, 1), (-1, -1)],
            Slider::Rook => [(1, 0), (-1, 0), (0, 1), (0, -1)],
        }
    }

    fn constants(self) -> (&'static [u64; 64], &'static [u8; 64]) {
        match self {
            Slider::Bishop => (&BISHOP_MAGICS, &BISHOP_BITS),
            Slider::Rook => (&ROOK_MAGICS, &ROOK_BITS),
        }
    }
}

static BISHOP_TABLE: OnceLock<SliderTable> = OnceLock::new();
static ROOK_TABLE: OnceLock<SliderTable> = OnceLock::new();

#[inline]
pub fn bishop_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    let table = BISHOP_TABLE.get_or_init(|| SliderTable::build(Slider::Bishop));
    table.attacks[table.magics[sq.index() as usize].index(occupied)]
}

#[inline]
pub fn rook_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    let table = ROOK_TABLE.get_or_init(|| SliderTable::build(Slider::Rook));
    table.attacks[table.magics[sq.index() as usize].index(occupied)]
}

#[inline]
pub fn queen_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    bishop_attacks(sq, occupied) | rook_attacks(sq, occupied)
}

// Magic multipliers and index widths, keyed by a1 = 0 square numbering.
const BISHOP_MAGICS: [u64; 64] = [
    0x89a1121896040240,
    0x2004844802002010,
    0x2068080051921000,
    0x62880a0220200808,
    0x0004042004000000,
    0x0100822020200011,
    0xc00444222012000a,
    0x0028808801216001,
    0x0400492088408100,
    0x0201c401040c0084,
    0x00840800910a0010,
    0x0000082080240060,
    0x2000840504006000,
    0x30010c4108405004,
    0x1008005410080802,
    0x8144042209100900,
    0x0208081020014400,
    0x004800201208ca00,
    0x0f18140408012008,
    0x1004002802102001,
    0x0841000820080811,
    0x0040200200a42008,
    0x0000800054042000,
    0x88010400410c9000,
    0x0520040470104290,
    0x1004040051500081,
    0x2002081833080021,
    0x000400c00c010142,
    0x941408200c002000,
    0x0658810000806011,
    0x0188071040440a00,
    0x4800404002011c00,
    0x0104442040404200,
    0x4103a81801200248,
    0x0004022401120400,
    0x80c0040400080120,
    0x8040010040820802,
    0x0480810700020090,
    0x0102008e00040242,
    0x0809005202050100,
    0x8002024220104080,
    0x0431008804142000,
    0x0019001802081400,
    0x0200014208040080,
    0x3308082008200100,
    0x041010500040c020,
    0x4012020c04210308,
    0x208220a202004080,
    0x0111040120082000,
    0x6803040141280a00,
    0x2101004202410000,
    0x8200000041108022,
    0x0000021082088000,
    0x0002410204010040,
    0x0040100400809000,
    0x0822088220820214,
    0x0040808090012004,
    0x00910224040218c9,
    0x0402814422015008,
    0x0090014004842410,
    0x0001000042304105,
    0x0010008830412a00,
    0x2520081090008908,
    0x40102000a0a60140,
];

const ROOK_MAGICS: [u64; 64] = [
    0x0a8002c000108020,
    0x06c00049b0002001,
    0x0100200010090040,
    0x2480041000800801,
    0x0280028004000800,
    0x0900410008040022,
    0x0280020001001080,
    0x2880002041000080,
    0xa000800080400034,
    0x0004808020004000,
    0x2290802004801000,
    0x0411000d00100020,
    0x0402800800040080,
    0x000b000401004208,
    0x2409000100040200,
    0x0001002100004082,
    0x0022878001e24000,
    0x1090810021004010,
    0x0801030040200012,
    0x0500808008001000,
    0x0a08018014000880,
    0x8000808004000200,
    0x0201008080010200,
    0x0801020000441091,
    0x0000800080204005,
    0x1040200040100048,
    0x0000120200402082,
    0x0d14880480100080,
    0x0012040280080080,
    0x0100040080020080,
    0x9020010080800200,
    0x0813241200148449,
    0x0491604001800080,
    0x0100401000402001,
    0x4820010021001040,
    0x0400402202000812,
    0x0209009005000802,
    0x0810800601800400,
    0x4301083214000150,
    0x204026458e001401,
    0x0040204000808000,
    0x8001008040010020,
    0x8410820820420010,
    0x1003001000090020,
    0x0804040008008080,
    0x0012000810020004,
    0x1000100200040208,
    0x430000a044020001,
    0x0280009023410300,
    0x00e0100040002240,
    0x0000200100401700,
    0x2244100408008080,
    0x0008000400801980,
    0x0002000810040200,
    0x8010100228810400,
    0x2000009044210200,
    0x4080008040102101,
    0x0040002080411d01,
    0x2005524060000901,
    0x0502001008400422,
    0x489a000810200402,
    0x0001004400080a13,
    0x4000011008020084,
    0x0026002114058042,
];

const BISHOP_BITS: [u8; 64] = [
    6, 5, 5, 5, 5, 5, 5, 6,
    5, 5, 5, 5, 5, 5, 5, 5,
    5, 5, 7, 7, 7, 7, 5, 5,
    5, 5, 7, 9, 9, 7, 5, 5,
    5, 5, 7, 9, 9, 7, 5, 5,
    5, 5, 7, 7, 7, 7, 5, 5,
    5, 5, 5, 5, 5, 5, 5, 5,
    6, 5, 5, 5, 5, 5, 5, 6,
];

const ROOK_BITS: [u8; 64] = [
    12, 11, 11, 11, 11, 11, 11, 12,
    11, 10, 10, 10, 10, 10, 10, 11,
    11, 10, 10, 10, 10, 10, 10, 11,
    11, 10, 10, 10, 10, 10, 10, 11,
    11, 10, 10, 10, 10, 10, 10, 11,
    11, 10, 10, 10, 10, 10, 10, 11,
    11, 10, 10, 10, 10, 10, 10, 11,
    12, 11, 11, 11, 11, 11, 11, 12,
];

impl SliderTable {
    fn build(slider: Slider) -> Self {
        let (multipliers, bits) = slider.constants();
        let mut magics = [Magic::default(); 64];
        let mut attacks = Vec::new();

        for sq in 0..64u8 {
            let mirrored = (sq ^ 56) as usize;
            let mask = relevant_mask(slider, sq);
            let offset = attacks.len();
            magics[sq as usize] = Magic {
                mask: mask.flip_vertical().0,
                magic: multipliers[mirrored],
                shift: 64 - bits[mirrored],
                offset,
            };
            attacks.resize(offset + (1usize << bits[mirrored]), Bitboard::EMPTY);

            // Carry-rippler walk over every subset of the mask.
            let mut blockers = Bitboard::EMPTY;
            loop {
                let index = magics[sq as usize].index(blockers);
                let computed = slow_attacks(slider, sq, blockers);
                debug_assert!(
                    attacks[index].is_empty() || attacks[index] == computed,
                    "magic for square {sq} maps two attack sets to one slot"
                );
                attacks[index] = computed;
                blockers = Bitboard(blockers.0.wrapping_sub(mask.0) & mask.0);
                if blockers.is_empty() {
                    break;
                }
            }
        }

        SliderTable { magics, attacks }
    }
}

/// Blocker squares that matter for `sq`, excluding the board edge at the end of each ray.
fn relevant_mask(slider: Slider, sq: u8) -> Bitboard {
    let (row, file) = ((sq / 8) as i8, (sq % 8) as i8);
    let mut mask = 0u64;
    for (dr, df) in slider.directions() {
        let (mut r, mut f) = (row + dr, file + df);
        while (0..8).contains(&(r + dr)) && (0..8).contains(&(f + df)) {
            mask |= 1u64 << (r * 8 + f);
            r += dr;
            f += df;
        }
    }
    Bitboard(mask)
}

fn slow_attacks(slider: Slider, sq: u8, blockers: Bitboard) -> Bitboard {
    let (row, file) = ((sq / 8) as i8, (sq % 8) as i8);
    let mut attacks = 0u64;
    for (dr, df) in slider.directions() {
        let (mut r, mut f) = (row + dr, file + df);
        while (0..8).contains(&r) && (0..8).contains(&f) {
            let bit = 1u64 << (r * 8 + f);
            attacks |= bit;
            if blockers.0 & bit != 0 {
                break;
            }
            r += dr;
            f += df;
        }
    }
    Bitboard(attacks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    #[test]
    fn empty_board_counts() {
        assert_eq!(bishop_attacks(sq("d4"), Bitboard::EMPTY).count(), 13);
        assert_eq!(rook_attacks(sq("d4"), Bitboard::EMPTY).count(), 14);
        assert_eq!(queen_attacks(sq("d4"), Bitboard::EMPTY).count(), 27);
        assert_eq!(bishop_attacks(Square::A1, Bitboard::EMPTY).count(), 7);
        assert_eq!(rook_attacks(Square::H8, Bitboard::EMPTY).count(), 14);
    }

    #[test]
    fn blockers_stop_rays() {
        let blockers = Bitboard::from(sq("e5")) | Bitboard::from(sq("c3"));
        let attacks = bishop_attacks(sq("d4"), blockers);
        assert!(attacks.contains(sq("e5")));
        assert!(attacks.contains(sq("c3")));
        assert!(!attacks.contains(sq("f6")));
        assert!(!attacks.contains(sq("b2")));

        let attacks = rook_attacks(sq("d4"), Bitboard::from(sq("d6")));
        assert!(attacks.contains(sq("d6")));
        assert!(!attacks.contains(sq("d7")));
        assert!(attacks.contains(sq("d1")));
    }

    #[test]
    fn lookup_matches_ray_walk_for_every_blocker_subset() {
        for slider in [Slider::Bishop, Slider::Rook] {
            for index in 0u8..64 {
                let square = Square::from_index(index).unwrap();
                let mask = relevant_mask(slider, index);
                let mut blockers = Bitboard::EMPTY;
                loop {
                    let expected = slow_attacks(slider, index, blockers);
                    let actual = match slider {
                        Slider::Bishop => bishop_attacks(square, blockers),
                        Slider::Rook => rook_attacks(square, blockers),
                    };
                    assert_eq!(actual, expected, "square {index}, blockers {:#x}", blockers.0);
                    blockers = Bitboard(blockers.0.wrapping_sub(mask.0) & mask.0);
                    if blockers.is_empty() {
                        break;
                    }
                }
            }
        }
    }

    #[test]
    fn sparse_blocker_on_long_diagonal() {
        // b5 bishop, lone blocker on d7.
        let attacks = bishop_attacks(sq("b5"), Bitboard::from(sq("d7")));
        assert!(attacks.contains(sq("c6")));
        assert!(attacks.contains(sq("d7")));
        assert!(!attacks.contains(sq("e8")));
        assert!(attacks.contains(sq("e2")));
        assert_eq!(attacks.count(), 8);
    }

    proptest! {
        #[test]
        fn lookup_ignores_irrelevant_squares(index in 0u8..64, occupancy in any::<u64>()) {
            let square = Square::from_index(index).unwrap();
            let occupied = Bitboard(occupancy);
            prop_assert_eq!(bishop_attacks(square, occupied), slow_attacks(Slider::Bishop, index, occupied));
            prop_assert_eq!(rook_attacks(square, occupied), slow_attacks(Slider::Rook, index, occupied));
        }
    }
}
