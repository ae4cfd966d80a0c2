pub mod config;
pub mod control;
pub mod dialogue;
pub mod poll;
pub mod scene;

pub use config::{
    ConfigError, DialogueConfig, LookupTable, PollConfig, ScanConfig, DEFAULT_CHARACTER_LAYER,
    DEFAULT_LOG_TEXT_MAX_CHARS, DEFAULT_POLL_INTERVAL, DEFAULT_STATS_LOG_INTERVAL,
};
pub use control::{
    tokenize_line, CommandSpec, ControlCommand, ControlCommandRegistry, ControlOutcome,
    ControlParseError, ControlProcessor, ParsedControl,
};
pub use dialogue::{
    aggregate_character, collect_text, collect_visible_texts, describe_character,
    find_character_nodes, is_character_name, is_typing, is_visible, log_scan_report, probe_emoji,
    probe_quest, resolve_first, resolve_first_matching, resolve_path, scan_characters, shorten,
    AggregateError, CharacterHandle, CharacterInfo, CollectedText, EmojiIndicator,
    InteractionEntry, MemberBinding, NodePath, QuestIndicator, ResolvedPath, ScanResult, Signal,
    TalkEntry, TypingStrategy, ZERO_ALPHA_COLOR_MARKER,
};
pub use poll::{
    decide, AdvanceError, AdvanceInput, AdvanceReason, AdvanceStatus, Advancer, CycleOutcome,
    Decision, PollState, PollStatsSnapshot, PollTotals, PollingDecisionLoop,
};
pub use scene::{
    CharacterCounts, HostError, MemberValue, NodeId, NodeSpec, ProbeError, SceneDocument,
    SceneGraph, SceneTree, SceneTreeError, TextComponentView, TextKind, TextSpec, Vec2,
};
