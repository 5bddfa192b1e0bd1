//! Difficulty ordinals and the per-song difficulty bitmask
//!
//! A song exposes up to five difficulties under each characteristic. Which of
//! them survived filtering is stored as a single `u8` with one bit per
//! ordinal, so a filtered pool of thousands of songs carries no per-song
//! allocation for its difficulty list.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use crate::Error;

/// Difficulty ordinal, ordered easiest → hardest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Difficulty {
    Easy = 0,
    Normal = 1,
    Hard = 2,
    Expert = 3,
    ExpertPlus = 4,
}

impl Difficulty {
    /// All ordinals, indexed by their numeric value
    pub const ALL: [Difficulty; 5] = [
        Difficulty::Easy,
        Difficulty::Normal,
        Difficulty::Hard,
        Difficulty::Expert,
        Difficulty::ExpertPlus,
    ];

    /// Number of ordinals (and therefore bits used in [`DiffMask`])
    pub const COUNT: usize = Self::ALL.len();

    /// Hardest ordinal
    pub const HARDEST: Difficulty = Difficulty::ExpertPlus;

    /// Numeric ordinal (0 = Easy)
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Look up a difficulty by its numeric ordinal
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(ordinal as usize).copied()
    }

    /// Canonical name, as used in chat commands and level metadata
    pub const fn name(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
            Difficulty::Expert => "Expert",
            Difficulty::ExpertPlus => "ExpertPlus",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    /// Case-insensitive parse ("hard", "ExpertPlus", "expertPlus")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidInput(format!("unknown difficulty: {}", s)))
    }
}

impl TryFrom<String> for Difficulty {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Bitmask with one bit per [`Difficulty`] ordinal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiffMask(u8);

impl DiffMask {
    pub const EMPTY: DiffMask = DiffMask(0);
    pub const EASY: DiffMask = DiffMask(1 << Difficulty::Easy as u8);
    pub const NORMAL: DiffMask = DiffMask(1 << Difficulty::Normal as u8);
    pub const HARD: DiffMask = DiffMask(1 << Difficulty::Hard as u8);
    pub const EXPERT: DiffMask = DiffMask(1 << Difficulty::Expert as u8);
    pub const EXPERT_PLUS: DiffMask = DiffMask(1 << Difficulty::ExpertPlus as u8);
    pub const ALL: DiffMask = DiffMask((1 << Difficulty::COUNT) - 1);

    /// Build a mask from raw bits; bits above the hardest ordinal are dropped
    pub const fn from_bits(bits: u8) -> Self {
        DiffMask(bits & Self::ALL.0)
    }

    /// Raw bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Mask with only `difficulty` set
    pub const fn of(difficulty: Difficulty) -> Self {
        DiffMask(1 << difficulty as u8)
    }

    pub const fn contains(self, difficulty: Difficulty) -> bool {
        self.0 & (1 << difficulty as u8) != 0
    }

    pub fn insert(&mut self, difficulty: Difficulty) {
        self.0 |= 1 << difficulty.ordinal();
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of set bits
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// Set difficulties, easiest first
    pub fn iter(self) -> impl Iterator<Item = Difficulty> {
        Difficulty::ALL.into_iter().filter(move |d| self.contains(*d))
    }

    /// Hardest set difficulty
    pub fn hardest(self) -> Option<Difficulty> {
        Difficulty::ALL.into_iter().rev().find(|d| self.contains(*d))
    }

    /// Pick one set difficulty.
    ///
    /// With `prefer_top` the hardest set ordinal wins. Otherwise a start
    /// ordinal is drawn uniformly from `[0, ExpertPlus)` and the ordinals are
    /// scanned downward from just below `start`, wrapping through zero back up
    /// to `start`. An empty mask yields `Easy`.
    pub fn pick<R: Rng + ?Sized>(self, prefer_top: bool, rng: &mut R) -> Difficulty {
        let start = if prefer_top {
            0
        } else {
            rng.gen_range(0..Difficulty::HARDEST.ordinal() as usize)
        };
        self.scan_from(start)
    }

    fn scan_from(self, start: usize) -> Difficulty {
        let m = Difficulty::COUNT;
        for i in (0..m).rev() {
            let x = (start + i) % m;
            if self.0 & (1 << x) != 0 {
                return Difficulty::ALL[x];
            }
        }
        Difficulty::Easy
    }
}

impl From<Difficulty> for DiffMask {
    fn from(difficulty: Difficulty) -> Self {
        DiffMask::of(difficulty)
    }
}

impl FromIterator<Difficulty> for DiffMask {
    fn from_iter<I: IntoIterator<Item = Difficulty>>(iter: I) -> Self {
        let mut mask = DiffMask::EMPTY;
        for d in iter {
            mask.insert(d);
        }
        mask
    }
}

impl BitOr for DiffMask {
    type Output = DiffMask;

    fn bitor(self, rhs: DiffMask) -> DiffMask {
        DiffMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for DiffMask {
    fn bitor_assign(&mut self, rhs: DiffMask) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_difficulty_parse_case_insensitive() {
        assert_eq!("hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!("EXPERTPLUS".parse::<Difficulty>().unwrap(), Difficulty::ExpertPlus);
        assert_eq!("expertPlus".parse::<Difficulty>().unwrap(), Difficulty::ExpertPlus);
        assert!("Insane".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_difficulty_ordinals() {
        assert_eq!(Difficulty::Easy.ordinal(), 0);
        assert_eq!(Difficulty::ExpertPlus.ordinal(), 4);
        assert_eq!(Difficulty::from_ordinal(2), Some(Difficulty::Hard));
        assert_eq!(Difficulty::from_ordinal(5), None);
        assert!(Difficulty::Easy < Difficulty::ExpertPlus);
    }

    #[test]
    fn test_difficulty_deserializes_from_any_case() {
        let d: Difficulty = serde_json::from_str("\"expertPlus\"").unwrap();
        assert_eq!(d, Difficulty::ExpertPlus);
        assert_eq!(serde_json::to_string(&Difficulty::Hard).unwrap(), "\"Hard\"");
    }

    #[test]
    fn test_mask_insert_and_contains() {
        let mut mask = DiffMask::EMPTY;
        assert!(mask.is_empty());

        mask.insert(Difficulty::Hard);
        mask.insert(Difficulty::ExpertPlus);

        assert!(mask.contains(Difficulty::Hard));
        assert!(mask.contains(Difficulty::ExpertPlus));
        assert!(!mask.contains(Difficulty::Easy));
        assert_eq!(mask.len(), 2);
        assert_eq!(mask, DiffMask::HARD | DiffMask::EXPERT_PLUS);
        assert_eq!(mask.bits(), 0b1_0100);
    }

    #[test]
    fn test_mask_from_bits_drops_unknown_bits() {
        assert_eq!(DiffMask::from_bits(0xFF), DiffMask::ALL);
    }

    #[test]
    fn test_single_bit_always_returned() {
        for d in Difficulty::ALL {
            let mask = DiffMask::of(d);
            for seed in 0..50 {
                let mut rng = StdRng::seed_from_u64(seed);
                assert_eq!(mask.pick(false, &mut rng), d);
                assert_eq!(mask.pick(true, &mut rng), d);
            }
        }
    }

    #[test]
    fn test_prefer_top_returns_highest() {
        let mut rng = StdRng::seed_from_u64(7);
        let mask = DiffMask::EASY | DiffMask::HARD | DiffMask::EXPERT;
        for _ in 0..20 {
            assert_eq!(mask.pick(true, &mut rng), Difficulty::Expert);
        }
        assert_eq!(mask.hardest(), Some(Difficulty::Expert));
    }

    #[test]
    fn test_scan_wraps_downward_from_start() {
        let mask = DiffMask::EASY | DiffMask::HARD;
        // start 0: 4, 3, 2 -> Hard
        assert_eq!(mask.scan_from(0), Difficulty::Hard);
        // start 1: 0 -> Easy
        assert_eq!(mask.scan_from(1), Difficulty::Easy);
        // start 2: 1, 0 -> Easy
        assert_eq!(mask.scan_from(2), Difficulty::Easy);
        // start 3: 2 -> Hard
        assert_eq!(mask.scan_from(3), Difficulty::Hard);
    }

    #[test]
    fn test_random_pick_only_returns_set_bits() {
        let mask = DiffMask::EASY | DiffMask::EXPERT_PLUS;
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = DiffMask::EMPTY;
        for _ in 0..200 {
            let d = mask.pick(false, &mut rng);
            assert!(mask.contains(d));
            seen.insert(d);
        }
        assert_eq!(seen, mask);
    }

    #[test]
    fn test_empty_mask_falls_back_to_easy() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(DiffMask::EMPTY.pick(false, &mut rng), Difficulty::Easy);
        assert_eq!(DiffMask::EMPTY.pick(true, &mut rng), Difficulty::Easy);
        assert_eq!(DiffMask::EMPTY.hardest(), None);
    }
}
