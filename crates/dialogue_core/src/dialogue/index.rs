use serde::Serialize;
use tracing::debug;

use crate::scene::{HostError, NodeId, SceneGraph};

/// One character-bearing root found during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterHandle {
    pub node: NodeId,
    pub name: String,
}

/// Active nodes on `layer` whose name looks like `<digits>_<word>_<word>`.
pub fn find_character_nodes(graph: &dyn SceneGraph, layer: &str) -> Vec<CharacterHandle> {
    let mut handles = Vec::new();
    for node in graph.all_nodes() {
        match character_handle(graph, node, layer) {
            Ok(Some(handle)) => handles.push(handle),
            Ok(None) => {}
            Err(error) => {
                debug!(node = node.0, error = %error, "character_index_skipped_node");
            }
        }
    }
    handles
}

fn character_handle(
    graph: &dyn SceneGraph,
    node: NodeId,
    layer: &str,
) -> Result<Option<CharacterHandle>, HostError> {
    if graph.layer_name(node)? != Some(layer) {
        return Ok(None);
    }
    if !graph.is_active_in_hierarchy(node)? {
        return Ok(None);
    }
    let name = graph.node_name(node)?;
    if !is_character_name(name) {
        return Ok(None);
    }
    Ok(Some(CharacterHandle {
        node,
        name: name.to_string(),
    }))
}

/// Matches `^\d+_\w+_\w+$` where `\d` is an ASCII digit and `\w` is a
/// Unicode letter, digit or `_`.
pub fn is_character_name(name: &str) -> bool {
    let digits_len = name
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map(|(index, _)| index)
        .unwrap_or(name.len());
    if digits_len == 0 {
        return false;
    }
    let Some(rest) = name[digits_len..].strip_prefix('_') else {
        return false;
    };

    let chars = rest.chars().collect::<Vec<_>>();
    if !chars.iter().all(|ch| is_word_char(*ch)) {
        return false;
    }
    // Both `\w+` segments need at least one char around some inner underscore.
    chars
        .iter()
        .enumerate()
        .any(|(index, ch)| *ch == '_' && index >= 1 && index + 1 < chars.len())
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{NodeSpec, SceneDocument, SceneTree};

    #[test]
    fn accepts_id_followed_by_two_word_segments() {
        assert!(is_character_name("11_驴子_山姆"));
        assert!(is_character_name("3_Old_Sam"));
        assert!(is_character_name("42_a_b_c"));
        assert!(is_character_name("7_a__b"));
    }

    #[test]
    fn rejects_names_missing_segments() {
        assert!(!is_character_name("11_Sam"));
        assert!(!is_character_name("Sam_Old_Guard"));
        assert!(!is_character_name("11__Sam"));
        assert!(!is_character_name("11_Sam_"));
        assert!(!is_character_name("11_Old Sam_x"));
        assert!(!is_character_name("11Sam_a_b"));
        assert!(!is_character_name("²_Old_Sam"));
        assert!(!is_character_name("Ⅳ_Old_Sam"));
        assert!(!is_character_name(""));
    }

    #[test]
    fn filters_by_layer_activity_and_pattern() {
        let tree = SceneTree::from_document(SceneDocument {
            roots: vec![
                NodeSpec::new("World")
                    .with_child(NodeSpec::new("11_Old_Sam").on_layer("Character"))
                    .with_child(NodeSpec::new("12_Young_Ann").on_layer("Character").inactive())
                    .with_child(NodeSpec::new("ShadowHelper").on_layer("Character"))
                    .with_child(NodeSpec::new("13_Cat").on_layer("Character"))
                    .with_child(NodeSpec::new("14_Tall_Tom").on_layer("Default")),
                NodeSpec::new("Hidden")
                    .inactive()
                    .with_child(NodeSpec::new("15_Lost_Kid").on_layer("Character")),
            ],
        });

        let names = find_character_nodes(&tree, "Character")
            .into_iter()
            .map(|handle| handle.name)
            .collect::<Vec<_>>();

        assert_eq!(names, vec!["11_Old_Sam".to_string()]);
    }
}
