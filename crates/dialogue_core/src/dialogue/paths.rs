use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scene::{HostError, NodeId, SceneGraph};

/// Relative child-name path, written `a/b/c` in config files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split('/').filter(|segment| !segment.is_empty()))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }
}

impl From<String> for NodePath {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for NodePath {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.to_string()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// A candidate that resolved, with its position in the candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPath {
    pub node: NodeId,
    pub candidate_index: usize,
}

/// Walks `path` from `root` by exact child names. `None` on the first miss.
pub fn resolve_path(
    graph: &dyn SceneGraph,
    root: NodeId,
    path: &NodePath,
) -> Result<Option<NodeId>, HostError> {
    let mut current = root;
    for segment in path.segments() {
        match graph.find_child(current, segment)? {
            Some(child) => current = child,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// First candidate that resolves, tried in list order.
pub fn resolve_first(
    graph: &dyn SceneGraph,
    root: NodeId,
    candidates: &[NodePath],
) -> Result<Option<ResolvedPath>, HostError> {
    resolve_first_matching(graph, root, candidates, |_| Ok(true))
}

/// First candidate that resolves and satisfies `accept`.
pub fn resolve_first_matching<F>(
    graph: &dyn SceneGraph,
    root: NodeId,
    candidates: &[NodePath],
    mut accept: F,
) -> Result<Option<ResolvedPath>, HostError>
where
    F: FnMut(NodeId) -> Result<bool, HostError>,
{
    for (candidate_index, path) in candidates.iter().enumerate() {
        let Some(node) = resolve_path(graph, root, path)? else {
            continue;
        };
        if accept(node)? {
            return Ok(Some(ResolvedPath {
                node,
                candidate_index,
            }));
        }
    }
    Ok(None)
}
