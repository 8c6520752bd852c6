use std::fmt;
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::assets::ModelData;

/// Handle to a node stored in a [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position, Euler rotation (radians, XYZ order) and per-axis scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// Built-in shapes that exist without any asset loading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Shape {
    Sphere { radius: f32 },
    Ring { inner: f32, outer: f32 },
    Plane { width: f32, height: f32 },
}

/// What a node draws. Loaded geometry is shared between clones.
#[derive(Debug, Clone, Default)]
pub enum Visual {
    #[default]
    Empty,
    Model(Arc<ModelData>),
    Procedural(Shape),
}

/// Looped playback of every clip a model ships with.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipPlayback {
    pub clips: Vec<String>,
    pub time: f32,
}

/// Node of the scene: a named visual object with its own transform.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub visual: Visual,
    pub playback: Option<ClipPlayback>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, transform: Transform, visual: Visual) -> Self {
        Self {
            name: name.into(),
            transform,
            visual,
            playback: None,
        }
    }

    /// Starts looping every clip of the attached model, if it has any.
    pub fn play_all_clips(&mut self) {
        if let Visual::Model(model) = &self.visual {
            if !model.clips.is_empty() {
                self.playback = Some(ClipPlayback {
                    clips: model.clips.clone(),
                    time: 0.0,
                });
            }
        }
    }
}

/// Flat arena of scene nodes.
///
/// Nodes are never removed during play, so a [`NodeId`] stays valid for the
/// lifetime of the graph.
#[derive(Debug, Default, Clone)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Creates an independent instance of `source` that shares its geometry.
    pub fn instantiate(&mut self, source: NodeId, name: impl Into<String>) -> Option<NodeId> {
        let original = self.nodes.get(source.0)?;
        let mut node = SceneNode::new(name, original.transform, original.visual.clone());
        if original.playback.is_some() {
            node.play_all_clips();
        }
        Some(self.insert(node))
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.name == name)
            .map(NodeId)
    }

    pub fn transform(&self, id: NodeId) -> Option<Transform> {
        self.get(id).map(|node| node.transform)
    }

    /// World position of a node. The graph is flat, so this is the local position.
    pub fn world_position(&self, id: NodeId) -> Option<Vec3> {
        self.get(id).map(|node| node.transform.position)
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Transform) -> bool {
        match self.get_mut(id) {
            Some(node) => {
                node.transform = transform;
                true
            }
            None => false,
        }
    }

    pub fn advance_clips(&mut self, delta: f32) {
        for playback in self.nodes.iter_mut().filter_map(|n| n.playback.as_mut()) {
            playback.time += delta;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
