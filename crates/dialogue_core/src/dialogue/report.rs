use tracing::info;

use super::aggregate::{CharacterInfo, ScanResult};

const ELLIPSIS: char = '…';

/// Cuts `text` to `max_chars` characters, marking the cut with an ellipsis.
pub fn shorten(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut short = text[..cut].to_string();
            short.push(ELLIPSIS);
            short
        }
        None => text.to_string(),
    }
}

/// One-line summary of a character for diagnostic output.
pub fn describe_character(info: &CharacterInfo, max_chars: usize) -> String {
    let mut parts = Vec::new();
    if !info.interactions.is_empty() {
        let options = info
            .interactions
            .iter()
            .map(|entry| shorten(&entry.text, max_chars))
            .collect::<Vec<_>>()
            .join(" | ");
        parts.push(format!("interactions=[{options}]"));
    }
    for talk in &info.talks {
        let state = if talk.is_typing { "typing" } else { "shown" };
        parts.push(format!("talk({state})=\"{}\"", shorten(&talk.text, max_chars)));
    }
    if let Some(quest) = &info.quest {
        parts.push(format!("quest={}", quest.show_name()));
    }
    if let Some(emoji) = &info.emoji {
        parts.push(format!("emoji={}", emoji.animation_name()));
    }
    format!("{}: {}", info.name, parts.join(" "))
}

/// Emits one `character_report` event per character with data.
pub fn log_scan_report(result: &ScanResult, max_chars: usize) {
    for info in result.iter() {
        info!(
            character = %info.name,
            waiting_interaction = info.waiting_interaction(),
            can_continue = info.can_continue(),
            typing = info.is_typing(),
            summary = %describe_character(info, max_chars),
            "character_report"
        );
    }
}
