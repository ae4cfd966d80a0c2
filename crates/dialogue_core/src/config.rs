use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dialogue::{MemberBinding, NodePath, ZERO_ALPHA_COLOR_MARKER};

pub const DEFAULT_CHARACTER_LAYER: &str = "Character";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_STATS_LOG_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_LOG_TEXT_MAX_CHARS: usize = 100;

const OVERHEAD_CANVAS: &str =
    "Interaction/Root Interaction Character Canvas/Interaction Character Canvas";

/// Ordered candidate paths per lookup target, relative to a character root.
///
/// New host layouts are supported by appending candidates, never by code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupTable {
    pub interaction: Vec<NodePath>,
    pub talk: Vec<NodePath>,
    pub quest: Vec<NodePath>,
    pub emoji: Vec<NodePath>,
}

impl Default for LookupTable {
    fn default() -> Self {
        Self {
            interaction: vec![NodePath::parse(&format!(
                "{OVERHEAD_CANVAS}/InteractionList(Clone)"
            ))],
            talk: vec![
                NodePath::parse("Character Canvas/TalkWord_black(Clone)"),
                NodePath::parse("Charcter Canvas/TalkWord_black(Clone)"),
                NodePath::parse(&format!("{OVERHEAD_CANVAS}/TalkWord_black(Clone)")),
            ],
            quest: vec![NodePath::parse(&format!(
                "{OVERHEAD_CANVAS}/OverheadAnimator(Clone)/questAnimation"
            ))],
            emoji: vec![NodePath::parse(&format!(
                "{OVERHEAD_CANVAS}/OverheadAnimator(Clone)/emojiRootPos/emojiRoot/emoji"
            ))],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub character_layer: String,
    pub typing_marker: String,
    pub lookup: LookupTable,
    pub quest_binding: MemberBinding,
    pub emoji_binding: MemberBinding,
    pub log_text_max_chars: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            character_layer: DEFAULT_CHARACTER_LAYER.to_string(),
            typing_marker: ZERO_ALPHA_COLOR_MARKER.to_string(),
            lookup: LookupTable::default(),
            quest_binding: MemberBinding::new("Widget_Animator", ["showName"]),
            emoji_binding: MemberBinding::new(
                "UIImageAnimator",
                ["currentAnimation", "animationName"],
            ),
            log_text_max_chars: DEFAULT_LOG_TEXT_MAX_CHARS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub stats_log_interval_ms: u64,
    /// Opt-in: an unchanged state is advanced again once this much time has
    /// passed. `0` (the default) never advances an unchanged state twice.
    pub rearm_after_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            stats_log_interval_ms: DEFAULT_STATS_LOG_INTERVAL.as_millis() as u64,
            rearm_after_ms: 0,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        normalize_non_zero_duration(Duration::from_millis(self.interval_ms), DEFAULT_POLL_INTERVAL)
    }

    pub fn stats_log_interval(&self) -> Duration {
        normalize_non_zero_duration(
            Duration::from_millis(self.stats_log_interval_ms),
            DEFAULT_STATS_LOG_INTERVAL,
        )
    }

    pub fn rearm_after(&self) -> Option<Duration> {
        (self.rearm_after_ms > 0).then(|| Duration::from_millis(self.rearm_after_ms))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    pub scan: ScanConfig,
    pub poll: PollConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path} at {location}: {message}")]
    Parse {
        path: PathBuf,
        location: String,
        message: String,
    },
}

impl DialogueConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &raw)
    }

    pub fn parse(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize::<_, DialogueConfig>(&mut deserializer).map_err(|error| {
            let location = error.path().to_string();
            ConfigError::Parse {
                path: path.to_path_buf(),
                location,
                message: error.into_inner().to_string(),
            }
        })
    }
}

pub(crate) fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
