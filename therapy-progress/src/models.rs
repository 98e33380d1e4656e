use chrono::{DateTime, Utc};
use error_common::ErrorContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::TherapyError;

pub type TrialId = Uuid;

/// Therapy track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleType {
    Articulation,
    ExpressiveLanguage,
    ReceptiveLanguage,
    Fluency,
}

impl ModuleType {
    pub const ALL: [ModuleType; 4] = [
        ModuleType::Articulation,
        ModuleType::ExpressiveLanguage,
        ModuleType::ReceptiveLanguage,
        ModuleType::Fluency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleType::Articulation => "articulation",
            ModuleType::ExpressiveLanguage => "expressive-language",
            ModuleType::ReceptiveLanguage => "receptive-language",
            ModuleType::Fluency => "fluency",
        }
    }

    /// Only articulation is split by sub-mode (the target sound)
    pub fn requires_sub_mode(&self) -> bool {
        matches!(self, ModuleType::Articulation)
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleType {
    type Err = TherapyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "articulation" => Ok(ModuleType::Articulation),
            "expressive-language" | "expressive" => Ok(ModuleType::ExpressiveLanguage),
            "receptive-language" | "receptive" => Ok(ModuleType::ReceptiveLanguage),
            "fluency" => Ok(ModuleType::Fluency),
            other => Err(TherapyError::invalid_input(
                format!("unknown module type '{other}'"),
                ErrorContext::new("parse_module_type"),
            )),
        }
    }
}

/// Identifies one progress document for a user
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleKey {
    pub module_type: ModuleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_mode: Option<String>,
}

impl ModuleKey {
    /// Validating constructor used at the request boundary.
    ///
    /// Sub-modes are trimmed and lower-cased. Articulation must name a sound;
    /// the other modules must not carry a sub-mode.
    pub fn new(module_type: ModuleType, sub_mode: Option<&str>) -> Result<Self, TherapyError> {
        let sub_mode = sub_mode
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty());

        match (module_type.requires_sub_mode(), sub_mode) {
            (true, None) => Err(TherapyError::invalid_input(
                "articulation requires a target sound",
                ErrorContext::new("module_key").with_module(module_type.as_str()),
            )),
            (false, Some(extra)) => Err(TherapyError::invalid_input(
                format!("{module_type} does not take a sub-mode (got '{extra}')"),
                ErrorContext::new("module_key").with_module(module_type.as_str()),
            )),
            (_, sub_mode) => Ok(Self { module_type, sub_mode }),
        }
    }

    pub fn articulation(sound: impl Into<String>) -> Self {
        Self {
            module_type: ModuleType::Articulation,
            sub_mode: Some(sound.into().to_ascii_lowercase()),
        }
    }

    pub fn expressive() -> Self {
        Self { module_type: ModuleType::ExpressiveLanguage, sub_mode: None }
    }

    pub fn receptive() -> Self {
        Self { module_type: ModuleType::ReceptiveLanguage, sub_mode: None }
    }

    pub fn fluency() -> Self {
        Self { module_type: ModuleType::Fluency, sub_mode: None }
    }

    /// Stable string form, e.g. `articulation:s` or `fluency`
    pub fn storage_key(&self) -> String {
        match &self.sub_mode {
            Some(sub_mode) => format!("{}:{}", self.module_type, sub_mode),
            None => self.module_type.as_str().to_string(),
        }
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// `(moduleType, soundOrMode, level, itemIndex)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExerciseRef {
    #[serde(flatten)]
    pub module: ModuleKey,
    pub level: u32,
    pub item_index: u32,
}

impl ExerciseRef {
    pub fn new(module: ModuleKey, level: u32, item_index: u32) -> Self {
        Self { module, level, item_index }
    }
}

/// One recorded attempt. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub trial_id: TrialId,
    pub user_id: String,
    #[serde(flatten)]
    pub exercise: ExerciseRef,
    pub sub_scores: BTreeMap<String, f64>,
    pub composite_score: f64,
    pub transcription: String,
    /// Scored with the placeholder because no provider was configured
    pub fallback: bool,
    pub timestamp: DateTime<Utc>,
}

impl Trial {
    pub fn module(&self) -> &ModuleKey {
        &self.exercise.module
    }

    pub fn detail(&self) -> TrialDetail {
        TrialDetail {
            trial_id: self.trial_id,
            composite_score: self.composite_score,
            transcription: self.transcription.clone(),
            fallback: self.fallback,
            recorded_at: self.timestamp,
        }
    }
}

/// Trial summary kept inside the progress document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialDetail {
    pub trial_id: TrialId,
    pub composite_score: f64,
    pub transcription: String,
    pub fallback: bool,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemState {
    pub completed: bool,
    pub average_score: f64,
    pub trial_details: Vec<TrialDetail>,
    pub last_attempt: DateTime<Utc>,
}

impl ItemState {
    pub fn new(last_attempt: DateTime<Utc>) -> Self {
        Self {
            completed: false,
            average_score: 0.0,
            trial_details: Vec::new(),
            last_attempt,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelState {
    pub items: BTreeMap<u32, ItemState>,
    pub completed_item_count: u32,
    pub is_complete: bool,
}

impl LevelState {
    /// Derive the count and completion flag from `items`.
    pub fn recompute(&mut self, required_item_count: u32) {
        let completed = self.items.values().filter(|item| item.completed).count();
        self.completed_item_count = u32::try_from(completed).unwrap_or(u32::MAX);
        self.is_complete = self.completed_item_count >= required_item_count;
    }
}

/// Per-user, per-module progress document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: String,
    pub module: ModuleKey,
    pub levels: BTreeMap<u32, LevelState>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    pub fn new(user_id: impl Into<String>, module: ModuleKey) -> Self {
        Self {
            user_id: user_id.into(),
            module,
            levels: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn level(&self, level: u32) -> Option<&LevelState> {
        self.levels.get(&level)
    }

    pub fn item(&self, level: u32, item_index: u32) -> Option<&ItemState> {
        self.level(level).and_then(|l| l.items.get(&item_index))
    }

    /// Missing levels count as zero completed items
    pub fn completed_item_count(&self, level: u32) -> u32 {
        self.level(level).map_or(0, |l| l.completed_item_count)
    }

    pub fn is_level_complete(&self, level: u32) -> bool {
        self.level(level).is_some_and(|l| l.is_complete)
    }
}

/// Where a user should continue within a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "PositionView")]
pub enum Position {
    At { level: u32, item_index: u32 },
    /// Every level is complete. Reported as level `total_levels + 1`, item 0.
    ModuleComplete { total_levels: u32 },
}

impl Position {
    pub fn level(&self) -> u32 {
        match self {
            Position::At { level, .. } => *level,
            Position::ModuleComplete { total_levels } => total_levels.saturating_add(1),
        }
    }

    pub fn item_index(&self) -> u32 {
        match self {
            Position::At { item_index, .. } => *item_index,
            Position::ModuleComplete { .. } => 0,
        }
    }

    pub fn is_module_complete(&self) -> bool {
        matches!(self, Position::ModuleComplete { .. })
    }
}

/// Wire form of [`Position`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionView {
    pub level: u32,
    pub item_index: u32,
    pub module_complete: bool,
}

impl From<Position> for PositionView {
    fn from(position: Position) -> Self {
        Self {
            level: position.level(),
            item_index: position.item_index(),
            module_complete: position.is_module_complete(),
        }
    }
}

/// Read model returned by `get_progress`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressView {
    pub user_id: String,
    #[serde(flatten)]
    pub module: ModuleKey,
    pub current_level: u32,
    pub current_item: u32,
    pub module_complete: bool,
    pub total_levels: u32,
    pub levels: BTreeMap<u32, LevelState>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProgressView {
    pub fn new(user_id: &str, module: ModuleKey, record: Option<ProgressRecord>, position: Position, total_levels: u32) -> Self {
        let (levels, updated_at) = match record {
            Some(record) => (record.levels, Some(record.updated_at)),
            None => (BTreeMap::new(), None),
        };
        Self {
            user_id: user_id.to_string(),
            module,
            current_level: position.level(),
            current_item: position.item_index(),
            module_complete: position.is_module_complete(),
            total_levels,
            levels,
            updated_at,
        }
    }
}
