use tracing::debug;

use crate::scene::{CharacterCounts, SceneGraph};

use super::text::CollectedText;

/// Color directive the reveal effect uses to paint unrevealed characters.
pub const ZERO_ALPHA_COLOR_MARKER: &str = "<color=#00000000>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingStrategy {
    Markup,
    VisibleCount,
}

impl TypingStrategy {
    pub fn for_entry(entry: &CollectedText) -> Self {
        if entry.kind.supports_visible_count() {
            TypingStrategy::VisibleCount
        } else {
            TypingStrategy::Markup
        }
    }
}

pub fn has_reveal_marker(text: &str, marker: &str) -> bool {
    !marker.is_empty() && text.contains(marker)
}

pub fn counts_still_revealing(counts: CharacterCounts) -> bool {
    counts.total > 0 && counts.max_visible < counts.total
}

/// Whether `entry` is still mid-reveal.
///
/// The markup marker wins regardless of counts. Count probe failures read as
/// "not typing".
pub fn is_typing(graph: &dyn SceneGraph, entry: &CollectedText, marker: &str) -> bool {
    if has_reveal_marker(&entry.text, marker) {
        return true;
    }
    match TypingStrategy::for_entry(entry) {
        TypingStrategy::Markup => false,
        TypingStrategy::VisibleCount => match graph.character_counts(entry.node) {
            Ok(counts) => counts_still_revealing(counts),
            Err(error) => {
                debug!(node = entry.node.0, error = %error, "typing_probe_unavailable");
                false
            }
        },
    }
}
