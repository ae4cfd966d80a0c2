mod tree;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use tree::{NodeSpec, SceneDocument, SceneTree, SceneTreeError, TextSpec};

/// Handle to one host node. Only meaningful for the scan that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    /// Plain UI text. Reveal effects are done with inline color markup.
    Legacy,
    /// Mesh text. Exposes authored character count and a visible clamp.
    Mesh,
}

impl TextKind {
    pub fn supports_visible_count(self) -> bool {
        matches!(self, TextKind::Mesh)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextComponentView {
    pub kind: TextKind,
    pub text: String,
    pub enabled: bool,
    pub color_alpha: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterCounts {
    pub total: u32,
    pub max_visible: u32,
}

/// Value of a component member read by name.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Object(BTreeMap<String, MemberValue>),
}

impl MemberValue {
    pub fn field(&self, name: &str) -> Option<&MemberValue> {
        match self {
            MemberValue::Object(fields) => fields.get(name),
            _ => None,
        }
    }

    /// Display form of a scalar, matching how the host stringifies members.
    pub fn to_display_string(&self) -> Option<String> {
        match self {
            MemberValue::Text(text) => Some(text.clone()),
            MemberValue::Number(value) => Some(value.to_string()),
            MemberValue::Bool(value) => Some(if *value { "True" } else { "False" }.to_string()),
            MemberValue::Null | MemberValue::Object(_) => None,
        }
    }
}

impl From<serde_json::Value> for MemberValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => MemberValue::Null,
            serde_json::Value::Bool(flag) => MemberValue::Bool(flag),
            serde_json::Value::Number(number) => {
                MemberValue::Number(number.as_f64().unwrap_or_default())
            }
            serde_json::Value::String(text) => MemberValue::Text(text),
            serde_json::Value::Array(items) => MemberValue::Object(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| (index.to_string(), MemberValue::from(item)))
                    .collect(),
            ),
            serde_json::Value::Object(fields) => MemberValue::Object(
                fields
                    .into_iter()
                    .map(|(name, item)| (name, MemberValue::from(item)))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    #[error("node {0:?} is no longer part of the scene")]
    StaleNode(NodeId),
    #[error("host query failed: {0}")]
    Query(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbeError {
    #[error("component '{component}' not attached")]
    MissingComponent { component: String },
    #[error("member '{member}' not found on component '{component}'")]
    MissingMember { component: String, member: String },
    #[error("capability '{0}' not supported by this component")]
    Unsupported(&'static str),
    #[error("probe failed: {0}")]
    Failed(String),
}

/// Read-only query surface over the host scene graph.
pub trait SceneGraph {
    fn all_nodes(&self) -> Vec<NodeId>;
    fn node_name(&self, node: NodeId) -> Result<&str, HostError>;
    fn is_active_in_hierarchy(&self, node: NodeId) -> Result<bool, HostError>;
    fn layer_name(&self, node: NodeId) -> Result<Option<&str>, HostError>;
    fn children(&self, node: NodeId) -> Result<Vec<NodeId>, HostError>;
    fn text_component(&self, node: NodeId) -> Result<Option<TextComponentView>, HostError>;
    fn rect_scale(&self, node: NodeId) -> Result<Option<Vec2>, HostError>;
    /// Alpha of the nearest group control on `node` or its ancestors.
    fn group_alpha_in_parents(&self, node: NodeId) -> Result<Option<f32>, HostError>;
    fn character_counts(&self, node: NodeId) -> Result<CharacterCounts, ProbeError>;
    fn read_member(
        &self,
        node: NodeId,
        component: &str,
        member: &str,
    ) -> Result<MemberValue, ProbeError>;

    fn find_child(&self, node: NodeId, name: &str) -> Result<Option<NodeId>, HostError> {
        for child in self.children(node)? {
            if self.node_name(child)? == name {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }
}

/// Host that reports one node as stale and answers everything else from a tree.
#[cfg(test)]
pub(crate) struct FlakyHost {
    pub(crate) inner: SceneTree,
    pub(crate) broken: NodeId,
}

#[cfg(test)]
impl SceneGraph for FlakyHost {
    fn all_nodes(&self) -> Vec<NodeId> {
        self.inner.all_nodes()
    }
    fn node_name(&self, node: NodeId) -> Result<&str, HostError> {
        self.inner.node_name(node)
    }
    fn is_active_in_hierarchy(&self, node: NodeId) -> Result<bool, HostError> {
        self.inner.is_active_in_hierarchy(node)
    }
    fn layer_name(&self, node: NodeId) -> Result<Option<&str>, HostError> {
        self.inner.layer_name(node)
    }
    fn children(&self, node: NodeId) -> Result<Vec<NodeId>, HostError> {
        if node == self.broken {
            return Err(HostError::StaleNode(node));
        }
        self.inner.children(node)
    }
    fn text_component(&self, node: NodeId) -> Result<Option<TextComponentView>, HostError> {
        self.inner.text_component(node)
    }
    fn rect_scale(&self, node: NodeId) -> Result<Option<Vec2>, HostError> {
        self.inner.rect_scale(node)
    }
    fn group_alpha_in_parents(&self, node: NodeId) -> Result<Option<f32>, HostError> {
        self.inner.group_alpha_in_parents(node)
    }
    fn character_counts(&self, node: NodeId) -> Result<CharacterCounts, ProbeError> {
        self.inner.character_counts(node)
    }
    fn read_member(
        &self,
        node: NodeId,
        component: &str,
        member: &str,
    ) -> Result<MemberValue, ProbeError> {
        self.inner.read_member(node, component, member)
    }
}
