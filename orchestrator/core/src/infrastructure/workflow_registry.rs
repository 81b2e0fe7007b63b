// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Workflow Registry
//!
//! In-memory home of the loaded workflow definitions. Reads hand out an
//! `Arc<WorkflowCatalog>` snapshot; writes build a new catalog and swap it
//! in, so a match that started before a reload finishes on the catalog it
//! started with.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::repository::{WorkflowCatalog, WorkflowRepository};
use crate::domain::workflow::{WorkflowDefinition, WorkflowError};
use crate::infrastructure::workflow_parser::WorkflowParser;

const DEFINITION_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// A definition file that was skipped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of loading a directory of definitions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Names of the definitions loaded, in file order
    pub loaded: Vec<String>,
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    catalog: RwLock<Arc<WorkflowCatalog>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-filled from a directory
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<(Self, LoadReport)> {
        let registry = Self::new();
        let report = registry.reload_directory(dir)?;
        Ok((registry, report))
    }

    /// Add or replace one definition
    pub fn register(&self, definition: WorkflowDefinition) -> Result<(), WorkflowError> {
        definition.validate()?;
        let name = definition.name.clone();

        let mut guard = self.catalog.write();
        let mut next = WorkflowCatalog::clone(&guard);
        let replaced = next.insert(definition).is_some();
        *guard = Arc::new(next);

        info!(workflow = %name, replaced, "Registered workflow");
        Ok(())
    }

    /// Load a directory on top of the current definitions
    pub fn load_directory(&self, dir: impl AsRef<Path>) -> Result<LoadReport> {
        let (loaded, report) = Self::read_directory(dir.as_ref())?;

        let mut guard = self.catalog.write();
        let mut next = WorkflowCatalog::clone(&guard);
        for definition in loaded.iter() {
            next.insert(WorkflowDefinition::clone(definition));
        }
        *guard = Arc::new(next);

        Ok(report)
    }

    /// Replace every definition with the directory's contents
    pub fn reload_directory(&self, dir: impl AsRef<Path>) -> Result<LoadReport> {
        let (loaded, report) = Self::read_directory(dir.as_ref())?;
        *self.catalog.write() = Arc::new(loaded);
        Ok(report)
    }

    fn read_directory(dir: &Path) -> Result<(WorkflowCatalog, LoadReport)> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read workflow directory {:?}", dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_definition_extension(path))
            .collect();
        paths.sort();

        let mut catalog = WorkflowCatalog::new();
        let mut report = LoadReport::default();
        let mut seen = BTreeSet::new();

        for path in paths {
            match WorkflowParser::parse_file(&path) {
                Ok(definition) if !seen.insert(definition.name.clone()) => {
                    warn!(workflow = %definition.name, path = ?path, "Duplicate workflow name, skipping");
                    report.failures.push(LoadFailure {
                        reason: format!("duplicate workflow name '{}'", definition.name),
                        path,
                    });
                }
                Ok(definition) => {
                    report.loaded.push(definition.name.clone());
                    catalog.insert(definition);
                }
                Err(e) => {
                    warn!(path = ?path, error = %e, "Skipping invalid workflow definition");
                    report.failures.push(LoadFailure {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            dir = ?dir,
            loaded = report.loaded.len(),
            failed = report.failures.len(),
            "Loaded workflow definitions"
        );
        Ok((catalog, report))
    }
}

fn has_definition_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| DEFINITION_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

impl WorkflowRepository for WorkflowRegistry {
    fn snapshot(&self) -> Arc<WorkflowCatalog> {
        Arc::clone(&self.catalog.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::WorkflowStep;

    fn write(dir: &Path, file: &str, content: &str) {
        std::fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn test_load_directory_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a_table.yaml", "name: table\nsteps:\n  - tool: mesh_create_primitive\n");
        write(dir.path(), "b_chair.json", r#"{"name": "chair", "steps": [{"tool": "noop"}]}"#);
        write(dir.path(), "c_broken.yml", "name: [oops");
        write(dir.path(), "d_duplicate.yaml", "name: table\nsteps:\n  - tool: other\n");
        write(dir.path(), "notes.txt", "ignored");

        let registry = WorkflowRegistry::new();
        let report = registry.load_directory(dir.path()).unwrap();

        assert_eq!(report.loaded, vec!["table".to_string(), "chair".to_string()]);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures[1].reason.contains("duplicate"));
        assert_eq!(
            registry.get("table").unwrap().steps[0].operation,
            "mesh_create_primitive"
        );
    }

    #[test]
    fn test_reload_swaps_catalog_and_keeps_old_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "table.yaml", "name: table\nsteps:\n  - tool: noop\n");

        let (registry, _) = WorkflowRegistry::from_directory(dir.path()).unwrap();
        let before = registry.snapshot();

        std::fs::remove_file(dir.path().join("table.yaml")).unwrap();
        write(dir.path(), "lamp.yaml", "name: lamp\nsteps:\n  - tool: noop\n");
        registry.reload_directory(dir.path()).unwrap();

        assert!(before.contains("table"));
        let after = registry.snapshot();
        assert!(!after.contains("table"));
        assert!(after.contains("lamp"));
    }

    #[test]
    fn test_register_validates_and_replaces() {
        let registry = WorkflowRegistry::new();
        assert!(registry.register(WorkflowDefinition::new("empty")).is_err());

        registry
            .register(WorkflowDefinition::new("table").with_step(WorkflowStep::new("a")))
            .unwrap();
        registry
            .register(WorkflowDefinition::new("table").with_step(WorkflowStep::new("b")))
            .unwrap();
        assert_eq!(registry.snapshot().len(), 1);
        assert_eq!(registry.get("table").unwrap().steps[0].operation, "b");
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let registry = WorkflowRegistry::new();
        assert!(registry.load_directory("/nonexistent/scenecraft/workflows").is_err());
    }
}
