use crate::scene::{HostError, NodeId, SceneGraph, TextKind};

use super::visibility::is_visible;

/// A visible, non-empty text found under a lookup root.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedText {
    pub node: NodeId,
    pub kind: TextKind,
    pub text: String,
}

/// Visible texts under `root` (inclusive), oldest first.
///
/// The host keeps the most recent entry first among siblings, so the
/// depth-first order is reversed before returning.
pub fn collect_visible_texts(
    graph: &dyn SceneGraph,
    root: NodeId,
) -> Result<Vec<CollectedText>, HostError> {
    let mut found = Vec::new();
    let mut pending = vec![root];
    while let Some(node) = pending.pop() {
        if let Some(component) = graph.text_component(node)? {
            if !component.text.is_empty() && is_visible(graph, node, &component)? {
                found.push(CollectedText {
                    node,
                    kind: component.kind,
                    text: component.text,
                });
            }
        }
        // Inactive children are walked too; visibility decides per component.
        let children = graph.children(node)?;
        pending.extend(children.into_iter().rev());
    }
    found.reverse();
    Ok(found)
}

pub fn collect_text(graph: &dyn SceneGraph, root: NodeId) -> Result<Vec<String>, HostError> {
    Ok(collect_visible_texts(graph, root)?
        .into_iter()
        .map(|entry| entry.text)
        .collect())
}
