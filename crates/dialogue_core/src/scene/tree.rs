use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    CharacterCounts, HostError, MemberValue, NodeId, ProbeError, SceneGraph, TextComponentView,
    TextKind, Vec2,
};

/// Serialized form of a whole host tree: a forest of nested node specs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDocument {
    pub roots: Vec<NodeSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_alpha: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpec {
    #[serde(default = "default_text_kind")]
    pub kind: TextKind,
    pub text: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_alpha")]
    pub color_alpha: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<CharacterCounts>,
}

fn default_true() -> bool {
    true
}

fn default_alpha() -> f32 {
    1.0
}

fn default_text_kind() -> TextKind {
    TextKind::Legacy
}

impl NodeSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: true,
            layer: None,
            scale: None,
            group_alpha: None,
            text: None,
            components: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn on_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn with_scale(mut self, x: f32, y: f32) -> Self {
        self.scale = Some(Vec2 { x, y });
        self
    }

    pub fn with_group_alpha(mut self, alpha: f32) -> Self {
        self.group_alpha = Some(alpha);
        self
    }

    pub fn with_text(mut self, text: TextSpec) -> Self {
        self.text = Some(text);
        self
    }

    pub fn with_component(
        mut self,
        type_name: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.components.insert(type_name.into(), value);
        self
    }

    pub fn with_child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = NodeSpec>) -> Self {
        self.children.extend(children);
        self
    }

    /// Builds `segments[0]/segments[1]/.../leaf` as a chain of plain nodes.
    pub fn chain(segments: &[&str], leaf: NodeSpec) -> NodeSpec {
        segments
            .iter()
            .rev()
            .fold(leaf, |child, segment| NodeSpec::new(*segment).with_child(child))
    }
}

impl TextSpec {
    pub fn legacy(text: impl Into<String>) -> Self {
        Self {
            kind: TextKind::Legacy,
            text: text.into(),
            enabled: true,
            color_alpha: 1.0,
            counts: None,
        }
    }

    pub fn mesh(text: impl Into<String>, total: u32, max_visible: u32) -> Self {
        Self {
            kind: TextKind::Mesh,
            text: text.into(),
            enabled: true,
            color_alpha: 1.0,
            counts: Some(CharacterCounts { total, max_visible }),
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.color_alpha = alpha;
        self
    }

    pub fn without_counts(mut self) -> Self {
        self.counts = None;
        self
    }
}

#[derive(Debug, Error)]
pub enum SceneTreeError {
    #[error("failed to read scene document {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scene document at {location}: {message}")]
    Parse { location: String, message: String },
}

#[derive(Debug, Clone)]
struct NodeRecord {
    name: String,
    active_self: bool,
    layer: Option<String>,
    scale: Option<Vec2>,
    group_alpha: Option<f32>,
    text: Option<TextSpec>,
    components: BTreeMap<String, MemberValue>,
    parent: Option<usize>,
    children: Vec<usize>,
    removed: bool,
}

/// In-memory host tree. Node ids are assigned in depth-first order.
#[derive(Debug, Clone, Default)]
pub struct SceneTree {
    nodes: Vec<NodeRecord>,
    roots: Vec<usize>,
}

impl SceneTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(document: SceneDocument) -> Self {
        let mut tree = Self::new();
        for root in document.roots {
            tree.add_root(root);
        }
        tree
    }

    pub fn from_json_str(raw: &str) -> Result<Self, SceneTreeError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let document = serde_path_to_error::deserialize::<_, SceneDocument>(&mut deserializer)
            .map_err(|error| {
                let location = error.path().to_string();
                SceneTreeError::Parse {
                    location,
                    message: error.into_inner().to_string(),
                }
            })?;
        Ok(Self::from_document(document))
    }

    pub fn load(path: &Path) -> Result<Self, SceneTreeError> {
        let raw = fs::read_to_string(path).map_err(|source| SceneTreeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn add_root(&mut self, spec: NodeSpec) -> NodeId {
        let index = self.insert(spec, None);
        self.roots.push(index);
        NodeId(index as u64)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|node| !node.removed).count()
    }

    /// Looks up `root/child/...` by exact names, starting from the forest roots.
    pub fn find_path(&self, path: &str) -> Option<NodeId> {
        let mut segments = path.split('/');
        let first = segments.next()?;
        let mut current = *self
            .roots
            .iter()
            .find(|index| self.nodes[**index].name == first)?;
        for segment in segments {
            current = *self.nodes[current]
                .children
                .iter()
                .find(|index| self.nodes[**index].name == segment)?;
        }
        Some(NodeId(current as u64))
    }

    pub fn set_active(&mut self, node: NodeId, active: bool) -> Result<(), HostError> {
        self.record_mut(node)?.active_self = active;
        Ok(())
    }

    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) -> Result<(), HostError> {
        let record = self.record_mut(node)?;
        match record.text.as_mut() {
            Some(spec) => {
                spec.text = text.into();
                Ok(())
            }
            None => Err(HostError::Query(format!(
                "node '{}' has no text component",
                record.name
            ))),
        }
    }

    /// Detaches `node` and its subtree; existing handles become stale.
    pub fn remove_subtree(&mut self, node: NodeId) -> Result<(), HostError> {
        let index = self.index_of(node)?;
        match self.nodes[index].parent {
            Some(parent) => self.nodes[parent].children.retain(|child| *child != index),
            None => self.roots.retain(|root| *root != index),
        }
        let mut pending = vec![index];
        while let Some(current) = pending.pop() {
            self.nodes[current].removed = true;
            pending.extend(self.nodes[current].children.iter().copied());
        }
        Ok(())
    }

    fn insert(&mut self, spec: NodeSpec, parent: Option<usize>) -> usize {
        let index = self.nodes.len();
        self.nodes.push(NodeRecord {
            name: spec.name,
            active_self: spec.active,
            layer: spec.layer,
            scale: spec.scale,
            group_alpha: spec.group_alpha,
            text: spec.text,
            components: spec
                .components
                .into_iter()
                .map(|(name, value)| (name, MemberValue::from(value)))
                .collect(),
            parent,
            children: Vec::new(),
            removed: false,
        });
        for child in spec.children {
            let child_index = self.insert(child, Some(index));
            self.nodes[index].children.push(child_index);
        }
        index
    }

    fn index_of(&self, node: NodeId) -> Result<usize, HostError> {
        let index = usize::try_from(node.0).map_err(|_| HostError::StaleNode(node))?;
        match self.nodes.get(index) {
            Some(record) if !record.removed => Ok(index),
            _ => Err(HostError::StaleNode(node)),
        }
    }

    fn record(&self, node: NodeId) -> Result<&NodeRecord, HostError> {
        let index = self.index_of(node)?;
        Ok(&self.nodes[index])
    }

    fn record_mut(&mut self, node: NodeId) -> Result<&mut NodeRecord, HostError> {
        let index = self.index_of(node)?;
        Ok(&mut self.nodes[index])
    }

    fn probe_record(&self, node: NodeId) -> Result<&NodeRecord, ProbeError> {
        self.record(node)
            .map_err(|error| ProbeError::Failed(error.to_string()))
    }
}

impl SceneGraph for SceneTree {
    fn all_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, record)| !record.removed)
            .map(|(index, _)| NodeId(index as u64))
            .collect()
    }

    fn node_name(&self, node: NodeId) -> Result<&str, HostError> {
        Ok(self.record(node)?.name.as_str())
    }

    fn is_active_in_hierarchy(&self, node: NodeId) -> Result<bool, HostError> {
        let mut current = Some(self.index_of(node)?);
        while let Some(index) = current {
            let record = &self.nodes[index];
            if !record.active_self {
                return Ok(false);
            }
            current = record.parent;
        }
        Ok(true)
    }

    fn layer_name(&self, node: NodeId) -> Result<Option<&str>, HostError> {
        Ok(self.record(node)?.layer.as_deref())
    }

    fn children(&self, node: NodeId) -> Result<Vec<NodeId>, HostError> {
        Ok(self
            .record(node)?
            .children
            .iter()
            .map(|index| NodeId(*index as u64))
            .collect())
    }

    fn text_component(&self, node: NodeId) -> Result<Option<TextComponentView>, HostError> {
        Ok(self
            .record(node)?
            .text
            .as_ref()
            .map(|spec| TextComponentView {
                kind: spec.kind,
                text: spec.text.clone(),
                enabled: spec.enabled,
                color_alpha: spec.color_alpha,
            }))
    }

    fn rect_scale(&self, node: NodeId) -> Result<Option<Vec2>, HostError> {
        Ok(self.record(node)?.scale)
    }

    fn group_alpha_in_parents(&self, node: NodeId) -> Result<Option<f32>, HostError> {
        let mut current = Some(self.index_of(node)?);
        while let Some(index) = current {
            let record = &self.nodes[index];
            if let Some(alpha) = record.group_alpha {
                return Ok(Some(alpha));
            }
            current = record.parent;
        }
        Ok(None)
    }

    fn character_counts(&self, node: NodeId) -> Result<CharacterCounts, ProbeError> {
        let record = self.probe_record(node)?;
        let text = record.text.as_ref().ok_or_else(|| ProbeError::MissingComponent {
            component: "text".to_string(),
        })?;
        if !text.kind.supports_visible_count() {
            return Err(ProbeError::Unsupported("character_counts"));
        }
        text.counts
            .ok_or_else(|| ProbeError::Failed("text info has not been generated".to_string()))
    }

    fn read_member(
        &self,
        node: NodeId,
        component: &str,
        member: &str,
    ) -> Result<MemberValue, ProbeError> {
        let record = self.probe_record(node)?;
        let value = record
            .components
            .get(component)
            .ok_or_else(|| ProbeError::MissingComponent {
                component: component.to_string(),
            })?;
        let MemberValue::Object(fields) = value else {
            return Err(ProbeError::Failed(format!(
                "component '{component}' has no readable members"
            )));
        };

        let backing_field = format!("<{member}>k__BackingField");
        fields
            .get(member)
            .or_else(|| {
                fields
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(member))
                    .map(|(_, value)| value)
            })
            .or_else(|| fields.get(&backing_field))
            .cloned()
            .ok_or_else(|| ProbeError::MissingMember {
                component: component.to_string(),
                member: member.to_string(),
            })
    }
}
