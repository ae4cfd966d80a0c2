mod aggregate;
mod index;
mod indicators;
mod paths;
mod report;
mod text;
mod typing;
mod visibility;

pub use aggregate::{
    aggregate_character, scan_characters, AggregateError, CharacterInfo, InteractionEntry,
    ScanResult, Signal, TalkEntry,
};
pub use index::{find_character_nodes, is_character_name, CharacterHandle};
pub use indicators::{probe_emoji, probe_quest, EmojiIndicator, MemberBinding, QuestIndicator};
pub use paths::{resolve_first, resolve_first_matching, resolve_path, NodePath, ResolvedPath};
pub use report::{describe_character, log_scan_report, shorten};
pub use text::{collect_text, collect_visible_texts, CollectedText};
pub use typing::{
    counts_still_revealing, has_reveal_marker, is_typing, TypingStrategy,
    ZERO_ALPHA_COLOR_MARKER,
};
pub use visibility::is_visible;
