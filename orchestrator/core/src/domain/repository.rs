// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Read contract for the workflow definitions the router matches against,
//! implemented by `crate::infrastructure::workflow_registry::WorkflowRegistry`.
//!
//! Readers always work on an immutable [`WorkflowCatalog`] snapshot. A reload
//! swaps in a new catalog; anyone still holding the old `Arc` keeps a
//! consistent view until they drop it.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::workflow::WorkflowDefinition;

/// Immutable, name-ordered set of workflow definitions
#[derive(Debug, Clone, Default)]
pub struct WorkflowCatalog {
    workflows: BTreeMap<String, Arc<WorkflowDefinition>>,
}

impl WorkflowCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a definition, returning the one it replaced
    pub fn insert(&mut self, definition: WorkflowDefinition) -> Option<Arc<WorkflowDefinition>> {
        self.workflows
            .insert(definition.name.clone(), Arc::new(definition))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<WorkflowDefinition>> {
        self.workflows.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.workflows.contains_key(name)
    }

    /// Definitions in name order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<WorkflowDefinition>> {
        self.workflows.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.workflows.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}

impl FromIterator<WorkflowDefinition> for WorkflowCatalog {
    fn from_iter<I: IntoIterator<Item = WorkflowDefinition>>(iter: I) -> Self {
        let mut catalog = WorkflowCatalog::new();
        for definition in iter {
            catalog.insert(definition);
        }
        catalog
    }
}

/// Source of workflow catalog snapshots
pub trait WorkflowRepository: Send + Sync {
    fn snapshot(&self) -> Arc<WorkflowCatalog>;

    fn get(&self, name: &str) -> Option<Arc<WorkflowDefinition>> {
        WorkflowCatalog::get(&self.snapshot(), name).cloned()
    }
}

/// Fixed catalog, handy for wiring matchers without a registry
impl WorkflowRepository for Arc<WorkflowCatalog> {
    fn snapshot(&self) -> Arc<WorkflowCatalog> {
        Arc::clone(self)
    }
}
