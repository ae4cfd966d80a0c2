use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ScanConfig;
use crate::scene::{HostError, NodeId, SceneGraph};

use super::index::{find_character_nodes, CharacterHandle};
use super::indicators::{probe_emoji, probe_quest, EmojiIndicator, QuestIndicator};
use super::paths::{resolve_first, resolve_first_matching};
use super::text::{collect_visible_texts, CollectedText};
use super::typing::is_typing;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionEntry {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TalkEntry {
    pub text: String,
    pub is_typing: bool,
}

/// Everything one character shows this scan. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterInfo {
    pub name: String,
    #[serde(skip)]
    pub node: NodeId,
    pub interactions: Vec<InteractionEntry>,
    pub talks: Vec<TalkEntry>,
    pub quest: Option<QuestIndicator>,
    pub emoji: Option<EmojiIndicator>,
}

impl CharacterInfo {
    pub fn can_continue(&self) -> bool {
        !self.talks.is_empty() || self.quest.is_some() || self.emoji.is_some()
    }

    pub fn waiting_interaction(&self) -> bool {
        !self.interactions.is_empty()
    }

    pub fn has_data(&self) -> bool {
        self.can_continue() || self.waiting_interaction()
    }

    pub fn is_typing(&self) -> bool {
        self.talks.iter().any(|talk| talk.is_typing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Interaction,
    Talk,
    Quest,
    Emoji,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Signal::Interaction => "interaction",
            Signal::Talk => "talk",
            Signal::Quest => "quest",
            Signal::Emoji => "emoji",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to resolve {signal} for character '{character}': {source}")]
pub struct AggregateError {
    pub character: String,
    pub signal: Signal,
    #[source]
    pub source: HostError,
}

/// Builds one character's record from its four lookup targets.
pub fn aggregate_character(
    graph: &dyn SceneGraph,
    handle: &CharacterHandle,
    config: &ScanConfig,
) -> Result<CharacterInfo, AggregateError> {
    let failed = |signal: Signal, source: HostError| AggregateError {
        character: handle.name.clone(),
        signal,
        source,
    };

    let interactions = collect_interactions(graph, handle.node, config)
        .map_err(|source| failed(Signal::Interaction, source))?;
    let talks = collect_talks(graph, handle.node, config)
        .map_err(|source| failed(Signal::Talk, source))?;
    let quest =
        find_quest(graph, handle, config).map_err(|source| failed(Signal::Quest, source))?;
    let emoji =
        find_emoji(graph, handle, config).map_err(|source| failed(Signal::Emoji, source))?;

    Ok(CharacterInfo {
        name: handle.name.clone(),
        node: handle.node,
        interactions,
        talks,
        quest,
        emoji,
    })
}

fn collect_interactions(
    graph: &dyn SceneGraph,
    character: NodeId,
    config: &ScanConfig,
) -> Result<Vec<InteractionEntry>, HostError> {
    let Some(list) = resolve_first(graph, character, &config.lookup.interaction)? else {
        return Ok(Vec::new());
    };
    Ok(collect_visible_texts(graph, list.node)?
        .into_iter()
        .map(|entry| InteractionEntry { text: entry.text })
        .collect())
}

fn collect_talks(
    graph: &dyn SceneGraph,
    character: NodeId,
    config: &ScanConfig,
) -> Result<Vec<TalkEntry>, HostError> {
    // The bubble lives in one of several mutually exclusive places; the first
    // candidate that actually shows text wins.
    let mut shown: Vec<CollectedText> = Vec::new();
    resolve_first_matching(graph, character, &config.lookup.talk, |node| {
        shown = collect_visible_texts(graph, node)?;
        Ok(!shown.is_empty())
    })?;

    Ok(shown
        .into_iter()
        .map(|entry| TalkEntry {
            is_typing: is_typing(graph, &entry, &config.typing_marker),
            text: entry.text,
        })
        .collect())
}

fn find_quest(
    graph: &dyn SceneGraph,
    handle: &CharacterHandle,
    config: &ScanConfig,
) -> Result<Option<QuestIndicator>, HostError> {
    let Some(resolved) = resolve_first_matching(graph, handle.node, &config.lookup.quest, |node| {
        graph.is_active_in_hierarchy(node)
    })?
    else {
        return Ok(None);
    };
    match probe_quest(graph, resolved.node, &config.quest_binding) {
        Ok(quest) => Ok(Some(quest)),
        Err(error) => {
            debug!(character = %handle.name, error = %error, "quest_probe_failed");
            Ok(None)
        }
    }
}

fn find_emoji(
    graph: &dyn SceneGraph,
    handle: &CharacterHandle,
    config: &ScanConfig,
) -> Result<Option<EmojiIndicator>, HostError> {
    let Some(resolved) = resolve_first_matching(graph, handle.node, &config.lookup.emoji, |node| {
        graph.is_active_in_hierarchy(node)
    })?
    else {
        return Ok(None);
    };
    match probe_emoji(graph, resolved.node, &config.emoji_binding) {
        Ok(emoji) => Ok(Some(emoji)),
        Err(error) => {
            debug!(character = %handle.name, error = %error, "emoji_probe_failed");
            Ok(None)
        }
    }
}

/// Characters with data from one scan, keyed by name, in enumeration order.
///
/// A repeated name keeps its first position but takes the later record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    characters: Vec<CharacterInfo>,
    index_by_name: HashMap<String, usize>,
    pub scanned: usize,
    pub failures: Vec<AggregateError>,
    pub elapsed: Duration,
}

impl ScanResult {
    fn insert(&mut self, info: CharacterInfo) {
        match self.index_by_name.get(&info.name) {
            Some(index) => self.characters[*index] = info,
            None => {
                self.index_by_name
                    .insert(info.name.clone(), self.characters.len());
                self.characters.push(info);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&CharacterInfo> {
        let index = self.index_by_name.get(name)?;
        self.characters.get(*index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CharacterInfo> {
        self.characters.iter()
    }

    pub fn characters(&self) -> &[CharacterInfo] {
        &self.characters
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

/// Finds every character and keeps those with at least one signal.
///
/// One character's host error drops only that character for this scan.
pub fn scan_characters(graph: &dyn SceneGraph, config: &ScanConfig) -> ScanResult {
    let started = Instant::now();
    let handles = find_character_nodes(graph, &config.character_layer);
    let mut result = ScanResult {
        scanned: handles.len(),
        ..ScanResult::default()
    };

    for handle in &handles {
        match aggregate_character(graph, handle, config) {
            Ok(info) if info.has_data() => result.insert(info),
            Ok(_) => {}
            Err(error) => {
                warn!(
                    character = %error.character,
                    signal = %error.signal,
                    error = %error.source,
                    "character_aggregation_failed"
                );
                result.failures.push(error);
            }
        }
    }

    result.elapsed = started.elapsed();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{FlakyHost, NodeSpec, SceneDocument, SceneTree, TextSpec};
    use serde_json::json;

    const OVERHEAD: [&str; 3] = [
        "Interaction",
        "Root Interaction Character Canvas",
        "Interaction Character Canvas",
    ];

    fn character(name: &str) -> NodeSpec {
        NodeSpec::new(name).on_layer("Character")
    }

    fn interaction_list(options: &[&str]) -> NodeSpec {
        NodeSpec::chain(
            &OVERHEAD,
            NodeSpec::new("InteractionList(Clone)").with_children(
                options
                    .iter()
                    .map(|text| NodeSpec::new("Item").with_text(TextSpec::legacy(*text))),
            ),
        )
    }

    fn talk_bubble(canvas: &str, text: TextSpec) -> NodeSpec {
        NodeSpec::new(canvas).with_child(
            NodeSpec::new("TalkWord_black(Clone)")
                .with_child(NodeSpec::new("Text").with_text(text)),
        )
    }

    fn overhead_talk_bubble(text: TextSpec) -> NodeSpec {
        NodeSpec::chain(
            &OVERHEAD,
            NodeSpec::new("TalkWord_black(Clone)")
                .with_child(NodeSpec::new("Text").with_text(text)),
        )
    }

    fn overhead_animator(quest: Option<&str>, emoji: Option<&str>) -> NodeSpec {
        let mut animator = NodeSpec::new("OverheadAnimator(Clone)");
        let mut quest_node = NodeSpec::new("questAnimation").inactive();
        if let Some(show_name) = quest {
            quest_node = NodeSpec::new("questAnimation")
                .with_component("Widget_Animator", json!({ "showName": show_name }));
        }
        animator = animator.with_child(quest_node);

        let mut emoji_node = NodeSpec::new("emoji").inactive();
        if let Some(animation_name) = emoji {
            emoji_node = NodeSpec::new("emoji").with_component(
                "UIImageAnimator",
                json!({ "currentAnimation": { "animationName": animation_name } }),
            );
        }
        animator.with_child(NodeSpec::chain(&["emojiRootPos", "emojiRoot"], emoji_node))
    }

    fn scan(roots: Vec<NodeSpec>) -> ScanResult {
        let tree = SceneTree::from_document(SceneDocument { roots });
        scan_characters(&tree, &ScanConfig::default())
    }

    #[test]
    fn character_without_signals_is_dropped() {
        let result = scan(vec![character("11_Old_Sam").with_child(interaction_list(&[]))]);

        assert_eq!(result.scanned, 1);
        assert!(result.is_empty());
    }

    #[test]
    fn interaction_only_character_is_kept() {
        let result = scan(vec![
            character("11_Old_Sam").with_child(interaction_list(&["Trade", "Talk"]))
        ]);

        let sam = result.get("11_Old_Sam").expect("sam");
        assert!(sam.waiting_interaction());
        assert!(!sam.can_continue());
        assert!(sam.has_data());
        assert_eq!(
            sam.interactions
                .iter()
                .map(|entry| entry.text.as_str())
                .collect::<Vec<_>>(),
            vec!["Talk", "Trade"]
        );
    }

    #[test]
    fn talk_prefers_character_canvas_bubble() {
        let result = scan(vec![character("11_Old_Sam")
            .with_child(talk_bubble("Character Canvas", TextSpec::legacy("front")))
            .with_child(overhead_talk_bubble(TextSpec::legacy("overhead")))]);

        let sam = result.get("11_Old_Sam").expect("sam");
        assert_eq!(sam.talks.len(), 1);
        assert_eq!(sam.talks[0].text, "front");
        assert!(sam.can_continue());
    }

    #[test]
    fn talk_falls_back_when_first_bubble_shows_nothing() {
        let result = scan(vec![character("11_Old_Sam")
            .with_child(talk_bubble(
                "Character Canvas",
                TextSpec::legacy("faded").with_alpha(0.0),
            ))
            .with_child(overhead_talk_bubble(TextSpec::legacy("overhead")))]);

        let sam = result.get("11_Old_Sam").expect("sam");
        assert_eq!(sam.talks[0].text, "overhead");
    }

    #[test]
    fn talk_accepts_misspelled_canvas_variant() {
        let result = scan(vec![character("11_Old_Sam").with_child(talk_bubble(
            "Charcter Canvas",
            TextSpec::legacy("Hello<color=#00000000>there</color>"),
        ))]);

        let sam = result.get("11_Old_Sam").expect("sam");
        assert!(sam.is_typing());
        assert_eq!(sam.talks[0].text, "Hello<color=#00000000>there</color>");
    }

    #[test]
    fn active_indicators_are_reported() {
        let result = scan(vec![character("11_Old_Sam").with_child(NodeSpec::chain(
            &OVERHEAD,
            overhead_animator(Some("question"), Some("sweat")),
        ))]);

        let sam = result.get("11_Old_Sam").expect("sam");
        assert_eq!(sam.quest.as_ref().map(QuestIndicator::show_name), Some("question"));
        assert_eq!(
            sam.emoji.as_ref().map(EmojiIndicator::animation_name),
            Some("sweat")
        );
        assert!(sam.can_continue());
        assert!(!sam.is_typing());
    }

    #[test]
    fn inactive_indicators_are_absent() {
        let result = scan(vec![character("11_Old_Sam").with_child(NodeSpec::chain(
            &OVERHEAD,
            overhead_animator(None, None),
        ))]);

        assert!(result.get("11_Old_Sam").is_none());
    }

    #[test]
    fn indicator_without_readable_member_is_absent() {
        let result = scan(vec![character("11_Old_Sam").with_child(NodeSpec::chain(
            &OVERHEAD,
            NodeSpec::new("OverheadAnimator(Clone)").with_child(NodeSpec::new("questAnimation")),
        ))]);

        assert!(result.get("11_Old_Sam").is_none());
        assert!(result.failures.is_empty());
    }

    #[test]
    fn duplicate_names_keep_later_record() {
        let said = |name: &str, text: &str| {
            character(name).with_child(talk_bubble("Character Canvas", TextSpec::legacy(text)))
        };
        let result = scan(vec![
            said("11_Old_Sam", "first"),
            said("12_Young_Ann", "ann"),
            said("11_Old_Sam", "second"),
        ]);

        assert_eq!(result.len(), 2);
        assert_eq!(result.characters()[0].name, "11_Old_Sam");
        assert_eq!(result.characters()[0].talks[0].text, "second");
        assert_eq!(result.characters()[1].name, "12_Young_Ann");
    }

    #[test]
    fn serializes_report_without_node_handles() {
        let result = scan(vec![character("11_Old_Sam")
            .with_child(talk_bubble("Character Canvas", TextSpec::legacy("hi")))]);
        let encoded = serde_json::to_value(result.get("11_Old_Sam").expect("sam")).expect("json");

        assert_eq!(
            encoded,
            json!({
                "name": "11_Old_Sam",
                "interactions": [],
                "talks": [{ "text": "hi", "is_typing": false }],
                "quest": null,
                "emoji": null
            })
        );
    }

    #[test]
    fn host_error_drops_only_the_failing_character() {
        let tree = SceneTree::from_document(SceneDocument {
            roots: vec![
                character("11_Old_Sam").with_child(interaction_list(&["Talk"])),
                character("12_Young_Ann")
                    .with_child(talk_bubble("Character Canvas", TextSpec::legacy("hello"))),
            ],
        });
        let broken = tree
            .find_path("11_Old_Sam/Interaction")
            .expect("interaction root");
        let host = FlakyHost {
            inner: tree,
            broken,
        };

        let result = scan_characters(&host, &ScanConfig::default());

        assert_eq!(result.scanned, 2);
        assert_eq!(result.len(), 1);
        assert!(result.get("12_Young_Ann").is_some());
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].character, "11_Old_Sam");
        assert_eq!(result.failures[0].signal, Signal::Interaction);
    }
}
