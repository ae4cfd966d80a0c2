use std::fmt;

use crate::dialogue::{CharacterInfo, ScanResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceReason {
    Typing,
    CanContinue,
}

impl fmt::Display for AdvanceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvanceReason::Typing => f.write_str("typing"),
            AdvanceReason::CanContinue => f.write_str("can_continue"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No character needs anything this cycle.
    Idle,
    /// A character shows interaction options; the player has to choose.
    WaitForPlayer { character: String },
    Advance {
        character: String,
        reason: AdvanceReason,
    },
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Idle => "idle",
            Decision::WaitForPlayer { .. } => "wait_for_player",
            Decision::Advance { .. } => "advance",
        }
    }

    pub fn character(&self) -> Option<&str> {
        match self {
            Decision::Idle => None,
            Decision::WaitForPlayer { character } | Decision::Advance { character, .. } => {
                Some(character)
            }
        }
    }
}

/// First character with something to act on decides the whole cycle.
///
/// An open interaction list blocks everything, including other characters
/// that could be advanced.
pub fn decide(result: &ScanResult) -> Decision {
    result
        .iter()
        .find_map(decide_character)
        .unwrap_or(Decision::Idle)
}

fn decide_character(info: &CharacterInfo) -> Option<Decision> {
    if info.waiting_interaction() {
        return Some(Decision::WaitForPlayer {
            character: info.name.clone(),
        });
    }
    let reason = if info.is_typing() {
        AdvanceReason::Typing
    } else if info.can_continue() {
        AdvanceReason::CanContinue
    } else {
        return None;
    };
    Some(Decision::Advance {
        character: info.name.clone(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::dialogue::scan_characters;
    use crate::scene::{NodeSpec, SceneDocument, SceneTree, TextSpec};

    fn talking(name: &str, text: &str) -> NodeSpec {
        NodeSpec::new(name).on_layer("Character").with_child(NodeSpec::chain(
            &["Character Canvas", "TalkWord_black(Clone)"],
            NodeSpec::new("Text").with_text(TextSpec::legacy(text)),
        ))
    }

    fn choosing(name: &str, options: &[&str]) -> NodeSpec {
        NodeSpec::new(name).on_layer("Character").with_child(NodeSpec::chain(
            &[
                "Interaction",
                "Root Interaction Character Canvas",
                "Interaction Character Canvas",
            ],
            NodeSpec::new("InteractionList(Clone)").with_children(
                options
                    .iter()
                    .map(|text| NodeSpec::new("Item").with_text(TextSpec::legacy(*text))),
            ),
        ))
    }

    fn decide_for(roots: Vec<NodeSpec>) -> Decision {
        let tree = SceneTree::from_document(SceneDocument { roots });
        decide(&scan_characters(&tree, &ScanConfig::default()))
    }

    #[test]
    fn empty_scan_is_idle() {
        assert_eq!(decide_for(Vec::new()), Decision::Idle);
    }

    #[test]
    fn typing_character_advances_with_typing_reason() {
        assert_eq!(
            decide_for(vec![talking(
                "11_Old_Sam",
                "Hello<color=#00000000>there</color>"
            )]),
            Decision::Advance {
                character: "11_Old_Sam".to_string(),
                reason: AdvanceReason::Typing,
            }
        );
    }

    #[test]
    fn finished_talk_advances_with_continue_reason() {
        assert_eq!(
            decide_for(vec![talking("11_Old_Sam", "Hello there")]),
            Decision::Advance {
                character: "11_Old_Sam".to_string(),
                reason: AdvanceReason::CanContinue,
            }
        );
    }

    #[test]
    fn interaction_blocks_even_with_talk_present() {
        let sam = choosing("11_Old_Sam", &["Talk", "Trade"]).with_child(NodeSpec::chain(
            &["Character Canvas", "TalkWord_black(Clone)"],
            NodeSpec::new("Text").with_text(TextSpec::legacy("Hello")),
        ));
        assert_eq!(
            decide_for(vec![sam]),
            Decision::WaitForPlayer {
                character: "11_Old_Sam".to_string()
            }
        );
    }

    #[test]
    fn first_waiting_character_stops_the_cycle() {
        let decision = decide_for(vec![
            choosing("11_Old_Sam", &["Talk"]),
            talking("12_Young_Ann", "Hello there"),
        ]);
        assert_eq!(decision.label(), "wait_for_player");
        assert_eq!(decision.character(), Some("11_Old_Sam"));
    }

    #[test]
    fn first_encountered_ready_character_wins() {
        let decision = decide_for(vec![
            talking("12_Young_Ann", "Hello there"),
            choosing("11_Old_Sam", &["Talk"]),
        ]);
        assert_eq!(decision.character(), Some("12_Young_Ann"));
        assert_eq!(decision.label(), "advance");
    }
}
