// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Scene state as seen by the router
//!
//! The external 3D engine is reached only through [`SceneContextProvider`].
//! A snapshot is taken once per request and flattened into expression
//! variables (`current_mode`, `width`, `min_dim`, ...).

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::domain::expression::EvaluationContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshCounts {
    pub selected_verts: u64,
    pub selected_edges: u64,
    pub selected_faces: u64,
    pub total_verts: u64,
    pub total_edges: u64,
    pub total_faces: u64,
}

/// Point-in-time view of the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub mode: String,
    pub has_selection: bool,
    pub object_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<MeshCounts>,
    /// Bounding dimensions of the active object as `[x, y, z]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<[f64; 3]>,
}

impl Default for SceneSnapshot {
    fn default() -> Self {
        Self {
            mode: "OBJECT".to_string(),
            has_selection: false,
            object_count: 0,
            active_object: None,
            mesh: None,
            dimensions: None,
        }
    }
}

impl SceneSnapshot {
    pub fn with_dimensions(mut self, x: f64, y: f64, z: f64) -> Self {
        self.dimensions = Some([x, y, z]);
        self
    }

    /// Flatten into expression variables
    ///
    /// `width`, `depth` and `height` alias the x, y and z dimensions.
    /// Mesh counts and dimensions are only present when known.
    pub fn to_context(&self) -> EvaluationContext {
        let mut context = EvaluationContext::new()
            .with("current_mode", self.mode.as_str())
            .with("has_selection", self.has_selection)
            .with("object_count", self.object_count as f64)
            .with("active_object", self.active_object.clone().unwrap_or_default());

        if let Some(mesh) = &self.mesh {
            context.set("selected_verts", mesh.selected_verts as f64);
            context.set("selected_edges", mesh.selected_edges as f64);
            context.set("selected_faces", mesh.selected_faces as f64);
            context.set("total_verts", mesh.total_verts as f64);
            context.set("total_edges", mesh.total_edges as f64);
            context.set("total_faces", mesh.total_faces as f64);
        }

        if let Some([x, y, z]) = self.dimensions {
            context.set("dim_x", x);
            context.set("dim_y", y);
            context.set("dim_z", z);
            context.set("width", x);
            context.set("depth", y);
            context.set("height", z);
            context.set("min_dim", x.min(y).min(z));
            context.set("max_dim", x.max(y).max(z));
        }

        context
    }
}

/// Source of scene state
#[async_trait]
pub trait SceneContextProvider: Send + Sync {
    async fn snapshot(&self) -> Result<SceneSnapshot>;
}

/// Provider returning a fixed, replaceable snapshot
#[derive(Debug, Default)]
pub struct StaticSceneProvider {
    snapshot: RwLock<SceneSnapshot>,
}

impl StaticSceneProvider {
    pub fn new(snapshot: SceneSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    pub fn update(&self, snapshot: SceneSnapshot) {
        *self.snapshot.write() = snapshot;
    }
}

#[async_trait]
impl SceneContextProvider for StaticSceneProvider {
    async fn snapshot(&self) -> Result<SceneSnapshot> {
        Ok(self.snapshot.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::expression::Value;

    #[test]
    fn test_context_variables() {
        let snapshot = SceneSnapshot {
            mode: "EDIT".to_string(),
            has_selection: true,
            object_count: 2,
            active_object: Some("Cube".to_string()),
            mesh: Some(MeshCounts {
                selected_verts: 4,
                total_verts: 8,
                ..Default::default()
            }),
            dimensions: None,
        }
        .with_dimensions(2.0, 1.0, 0.5);

        let context = snapshot.to_context();
        assert_eq!(context.get("current_mode"), Some(&Value::from("EDIT")));
        assert_eq!(context.get("has_selection"), Some(&Value::Bool(true)));
        assert_eq!(context.get("active_object"), Some(&Value::from("Cube")));
        assert_eq!(context.get("selected_verts"), Some(&Value::Number(4.0)));
        assert_eq!(context.get("width"), Some(&Value::Number(2.0)));
        assert_eq!(context.get("height"), Some(&Value::Number(0.5)));
        assert_eq!(context.get("min_dim"), Some(&Value::Number(0.5)));
        assert_eq!(context.get("max_dim"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn test_missing_optional_data_is_absent() {
        let context = SceneSnapshot::default().to_context();
        assert!(!context.contains("width"));
        assert!(!context.contains("total_faces"));
        assert_eq!(context.get("active_object"), Some(&Value::from("")));
    }

    #[tokio::test]
    async fn test_static_provider_update() {
        let provider = StaticSceneProvider::new(SceneSnapshot::default());
        provider.update(SceneSnapshot::default().with_dimensions(1.0, 1.0, 1.0));
        let snapshot = provider.snapshot().await.unwrap();
        assert_eq!(snapshot.dimensions, Some([1.0, 1.0, 1.0]));
    }
}
