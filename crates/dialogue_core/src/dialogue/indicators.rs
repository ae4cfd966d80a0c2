use serde::{Deserialize, Serialize};

use crate::scene::{MemberValue, NodeId, ProbeError, SceneGraph};

/// Where a string value lives on a component known only by type name:
/// `component.path[0].path[1]...`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberBinding {
    pub component: String,
    pub path: Vec<String>,
}

impl MemberBinding {
    pub fn new<I, S>(component: impl Into<String>, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            component: component.into(),
            path: path.into_iter().map(Into::into).collect(),
        }
    }

    /// Reads the bound member and renders it as a string.
    pub fn read_string(
        &self,
        graph: &dyn SceneGraph,
        node: NodeId,
    ) -> Result<String, ProbeError> {
        let (first, rest) = self
            .path
            .split_first()
            .ok_or_else(|| ProbeError::Failed("member binding has an empty path".to_string()))?;
        let root = graph.read_member(node, &self.component, first)?;
        let mut current: &MemberValue = &root;
        for member in rest {
            current = current
                .field(member)
                .ok_or_else(|| ProbeError::MissingMember {
                    component: self.component.clone(),
                    member: member.clone(),
                })?;
        }
        current.to_display_string().ok_or_else(|| {
            ProbeError::Failed(format!(
                "member '{}' on '{}' is not a scalar",
                self.path.join("."),
                self.component
            ))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestIndicator {
    show_name: String,
}

impl QuestIndicator {
    pub fn new(show_name: impl Into<String>) -> Self {
        Self {
            show_name: show_name.into(),
        }
    }

    pub fn show_name(&self) -> &str {
        &self.show_name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmojiIndicator {
    animation_name: String,
}

impl EmojiIndicator {
    pub fn new(animation_name: impl Into<String>) -> Self {
        Self {
            animation_name: animation_name.into(),
        }
    }

    pub fn animation_name(&self) -> &str {
        &self.animation_name
    }
}

pub fn probe_quest(
    graph: &dyn SceneGraph,
    node: NodeId,
    binding: &MemberBinding,
) -> Result<QuestIndicator, ProbeError> {
    binding.read_string(graph, node).map(QuestIndicator::new)
}

pub fn probe_emoji(
    graph: &dyn SceneGraph,
    node: NodeId,
    binding: &MemberBinding,
) -> Result<EmojiIndicator, ProbeError> {
    binding.read_string(graph, node).map(EmojiIndicator::new)
}
