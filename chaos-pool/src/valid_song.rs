//! A library item that survived filtering, with its valid difficulties

use chaos_common::{DiffMask, Difficulty};
use rand::Rng;
use std::sync::Arc;

use crate::library::LibraryItem;

/// Filtered pool entry
///
/// Only ever constructed with at least one valid difficulty.
#[derive(Debug, Clone)]
pub struct ValidSong {
    item: Arc<LibraryItem>,
    valid_diffs: DiffMask,
}

impl ValidSong {
    /// `None` when `valid_diffs` is empty
    pub fn new(item: Arc<LibraryItem>, valid_diffs: DiffMask) -> Option<Self> {
        if valid_diffs.is_empty() {
            None
        } else {
            Some(Self { item, valid_diffs })
        }
    }

    pub fn item(&self) -> &Arc<LibraryItem> {
        &self.item
    }

    pub fn level_id(&self) -> &str {
        &self.item.level_id
    }

    pub fn valid_diffs(&self) -> DiffMask {
        self.valid_diffs
    }

    pub fn is_diff_valid(&self, difficulty: Difficulty) -> bool {
        self.valid_diffs.contains(difficulty)
    }

    pub fn set_diff_valid(&mut self, difficulty: Difficulty) {
        self.valid_diffs.insert(difficulty);
    }

    /// Pick a difficulty for a request that did not name one
    pub fn random_valid_diff<R: Rng + ?Sized>(&self, prefer_top: bool, rng: &mut R) -> Difficulty {
        self.valid_diffs.pick(prefer_top, rng)
    }
}
