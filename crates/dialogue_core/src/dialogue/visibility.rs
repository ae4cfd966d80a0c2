use crate::scene::{HostError, NodeId, SceneGraph, TextComponentView};

/// Whether a text component on `node` is currently drawn to the player.
///
/// Checks run cheapest first and stop at the first failure: node activity,
/// component enabled flag, nearest group alpha, tint alpha, then rect scale.
pub fn is_visible(
    graph: &dyn SceneGraph,
    node: NodeId,
    component: &TextComponentView,
) -> Result<bool, HostError> {
    if !graph.is_active_in_hierarchy(node)? {
        return Ok(false);
    }
    if !component.enabled {
        return Ok(false);
    }
    if let Some(group_alpha) = graph.group_alpha_in_parents(node)? {
        if group_alpha <= 0.0 {
            return Ok(false);
        }
    }
    if component.color_alpha <= 0.0 {
        return Ok(false);
    }
    if let Some(scale) = graph.rect_scale(node)? {
        if scale.x <= 0.0 || scale.y <= 0.0 {
            return Ok(false);
        }
    }
    Ok(true)
}
