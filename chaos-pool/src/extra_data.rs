//! Per-difficulty extra metadata of installed custom levels
//!
//! Mods a difficulty needs are declared in the level's `Info.dat`:
//!
//! ```json
//! {"_difficultyBeatmapSets": [{
//!     "_beatmapCharacteristicName": "Standard",
//!     "_difficultyBeatmaps": [{
//!         "_difficulty": "Expert",
//!         "_customData": {"_requirements": ["Noodle Extensions"]}
//!     }]
//! }]}
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use chaos_common::Difficulty;

/// Extra data of one difficulty
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtraDifficulty {
    pub characteristic: String,
    /// Difficulty name as written in the level
    pub difficulty: String,
    /// Mods required to play this difficulty
    pub requirements: Vec<String>,
}

impl ExtraDifficulty {
    pub fn key(&self) -> String {
        extra_key(&self.characteristic, &self.difficulty)
    }
}

/// Lookup key `"{characteristic}_{difficulty}"`
pub fn extra_key(characteristic: &str, difficulty: &str) -> String {
    format!("{}_{}", characteristic, difficulty)
}

/// Requirement flags keyed by [`extra_key`]; the first entry for a key wins
#[derive(Debug, Clone, Default)]
pub struct ExtraDataLookup {
    requirements: HashMap<String, Vec<String>>,
}

impl ExtraDataLookup {
    pub fn new(difficulties: Vec<ExtraDifficulty>) -> Self {
        let mut requirements = HashMap::with_capacity(difficulties.len());
        for difficulty in difficulties {
            requirements
                .entry(difficulty.key())
                .or_insert(difficulty.requirements);
        }
        Self { requirements }
    }

    /// Requirements declared for a difficulty; `None` if the level does not
    /// list it at all
    pub fn requirements(&self, characteristic: &str, difficulty: Difficulty) -> Option<&[String]> {
        self.requirements
            .get(&extra_key(characteristic, difficulty.name()))
            .map(Vec::as_slice)
    }
}

/// Source of extra metadata for installed levels
pub trait ExtraDataResolver: Send + Sync {
    /// Extra data for the level with `hash` installed at `local_path`
    fn resolve(&self, hash: &str, local_path: &Path) -> Option<Vec<ExtraDifficulty>>;
}

/// Reads `Info.dat` from the level folder
#[derive(Debug, Clone, Default)]
pub struct InfoDatResolver;

#[derive(Debug, Deserialize)]
struct InfoDat {
    #[serde(rename = "_difficultyBeatmapSets", default)]
    difficulty_beatmap_sets: Vec<BeatmapSet>,
}

#[derive(Debug, Deserialize)]
struct BeatmapSet {
    #[serde(rename = "_beatmapCharacteristicName")]
    characteristic: String,
    #[serde(rename = "_difficultyBeatmaps", default)]
    difficulty_beatmaps: Vec<DifficultyBeatmap>,
}

#[derive(Debug, Deserialize)]
struct DifficultyBeatmap {
    #[serde(rename = "_difficulty")]
    difficulty: String,
    #[serde(rename = "_customData", default)]
    custom_data: Option<CustomData>,
}

#[derive(Debug, Deserialize, Default)]
struct CustomData {
    #[serde(rename = "_requirements", default)]
    requirements: Vec<String>,
}

impl InfoDatResolver {
    pub fn new() -> Self {
        Self
    }

    fn info_path(local_path: &Path) -> Option<std::path::PathBuf> {
        ["Info.dat", "info.dat"]
            .iter()
            .map(|name| local_path.join(name))
            .find(|path| path.is_file())
    }
}

impl ExtraDataResolver for InfoDatResolver {
    fn resolve(&self, hash: &str, local_path: &Path) -> Option<Vec<ExtraDifficulty>> {
        let path = Self::info_path(local_path)?;

        let content = match std::fs::read(&path) {
            Ok(content) => content,
            Err(e) => {
                debug!(hash = %hash, "Cannot read {}: {}", path.display(), e);
                return None;
            }
        };

        let info: InfoDat = match serde_json::from_slice(&content) {
            Ok(info) => info,
            Err(e) => {
                debug!(hash = %hash, "Cannot parse {}: {}", path.display(), e);
                return None;
            }
        };

        Some(
            info.difficulty_beatmap_sets
                .into_iter()
                .flat_map(|set| {
                    let characteristic = set.characteristic;
                    set.difficulty_beatmaps
                        .into_iter()
                        .map(move |beatmap| ExtraDifficulty {
                            characteristic: characteristic.clone(),
                            difficulty: beatmap.difficulty,
                            requirements: beatmap
                                .custom_data
                                .map(|c| c.requirements)
                                .unwrap_or_default(),
                        })
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const INFO: &str = r#"{
        "_songName": "Test",
        "_difficultyBeatmapSets": [
            {
                "_beatmapCharacteristicName": "Standard",
                "_difficultyBeatmaps": [
                    {"_difficulty": "Hard", "_beatmapFilename": "Hard.dat"},
                    {"_difficulty": "Expert", "_customData": {"_requirements": ["Noodle Extensions"]}},
                    {"_difficulty": "ExpertPlus", "_customData": {"_difficultyLabel": "Chaos"}}
                ]
            },
            {
                "_beatmapCharacteristicName": "Lawless",
                "_difficultyBeatmaps": [{"_difficulty": "Expert"}]
            }
        ]
    }"#;

    #[test]
    fn test_resolve_reads_requirements() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("Info.dat"), INFO).unwrap();

        let extra = InfoDatResolver::new()
            .resolve("HASH", temp_dir.path())
            .unwrap();
        assert_eq!(extra.len(), 4);

        let lookup = ExtraDataLookup::new(extra);
        assert_eq!(lookup.requirements("Standard", Difficulty::Hard), Some(&[][..]));
        assert_eq!(
            lookup.requirements("Standard", Difficulty::Expert).unwrap(),
            &["Noodle Extensions".to_string()]
        );
        assert!(lookup
            .requirements("Standard", Difficulty::ExpertPlus)
            .unwrap()
            .is_empty());
        assert!(lookup.requirements("Standard", Difficulty::Easy).is_none());
        assert!(lookup.requirements("Lawless", Difficulty::Expert).is_some());
    }

    #[test]
    fn test_missing_or_broken_info_is_unresolvable() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = InfoDatResolver::new();
        assert!(resolver.resolve("HASH", temp_dir.path()).is_none());

        std::fs::write(temp_dir.path().join("Info.dat"), "{ broken").unwrap();
        assert!(resolver.resolve("HASH", temp_dir.path()).is_none());
    }

    #[test]
    fn test_first_entry_wins_on_duplicate_key() {
        let lookup = ExtraDataLookup::new(vec![
            ExtraDifficulty {
                characteristic: "Standard".to_string(),
                difficulty: "Hard".to_string(),
                requirements: Vec::new(),
            },
            ExtraDifficulty {
                characteristic: "Standard".to_string(),
                difficulty: "Hard".to_string(),
                requirements: vec!["Mapping Extensions".to_string()],
            },
        ]);
        assert!(lookup
            .requirements("Standard", Difficulty::Hard)
            .unwrap()
            .is_empty());
    }
}
