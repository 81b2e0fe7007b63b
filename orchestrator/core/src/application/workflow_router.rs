// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Workflow Router Application Service
//!
//! Entry point for turning a natural-language goal into an ordered list of
//! engine calls.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Route goal → match → adapt → expand
//! - **Dependencies:** Domain (WorkflowRepository, SceneContextProvider), Infrastructure (Registry, EventBus, Telemetry), Cortex (EmbeddingProvider, VectorStore)
//!
//! # Request Flow
//!
//! ```text
//! route(goal, context)
//!   ├─ scene snapshot (taken once)
//!   ├─ EnsembleMatcher      → EnsembleResult
//!   ├─ WorkflowAdapter      → kept steps + AdaptationResult
//!   └─ StepExpander         → Vec<PlannedCall>
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use scenecraft_cortex::{EmbeddingProvider, VectorStore};

use crate::application::ensemble_aggregator::EnsembleAggregator;
use crate::application::ensemble_matcher::EnsembleMatcher;
use crate::application::matchers::{KeywordMatcher, PatternMatcher, SemanticMatcher};
use crate::application::modifier_extractor::ModifierExtractor;
use crate::application::step_expander::{ExpansionError, PlannedCall, StepExpander};
use crate::application::workflow_adapter::{AdaptationResult, WorkflowAdapter};
use crate::domain::events::{RoutingEvent, RoutingRequestId};
use crate::domain::matching::{EnsembleResult, MatchContext, Matcher};
use crate::domain::repository::WorkflowRepository;
use crate::domain::router_config::RouterConfigSpec;
use crate::domain::scene::{SceneContextProvider, SceneSnapshot};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::telemetry::MatchTelemetry;
use crate::infrastructure::workflow_registry::{LoadReport, WorkflowRegistry};

/// Everything the engine needs to carry out a goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedPlan {
    pub request_id: RoutingRequestId,
    pub ensemble: EnsembleResult,
    /// Absent when nothing matched
    pub adaptation: Option<AdaptationResult>,
    pub calls: Vec<PlannedCall>,
    /// Steps whose condition evaluated to false
    pub skipped_steps: Vec<String>,
}

impl RoutedPlan {
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Workflow '{0}' disappeared from the registry during routing")]
    WorkflowNotFound(String),

    #[error(transparent)]
    Expansion(#[from] ExpansionError),
}

pub struct WorkflowRouter {
    registry: Arc<WorkflowRegistry>,
    ensemble: EnsembleMatcher,
    semantic: Option<Arc<SemanticMatcher>>,
    adapter: WorkflowAdapter,
    expander: StepExpander,
    scene: Arc<dyn SceneContextProvider>,
    event_bus: EventBus,
    telemetry: Option<Arc<MatchTelemetry>>,
}

impl WorkflowRouter {
    /// Wire the enabled matchers (keyword, semantic, pattern, in that order)
    /// and the adaptation pipeline from configuration
    pub fn from_config(
        config: &RouterConfigSpec,
        registry: Arc<WorkflowRegistry>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        scene: Arc<dyn SceneContextProvider>,
    ) -> Self {
        let repository: Arc<dyn WorkflowRepository> = registry.clone();
        let event_bus = EventBus::new(config.telemetry.event_bus_capacity);
        let matchers_config = &config.matchers;

        let mut matchers: Vec<Arc<dyn Matcher>> = Vec::new();
        if matchers_config.keyword.enabled {
            matchers.push(Arc::new(KeywordMatcher::new(
                repository.clone(),
                matchers_config.keyword.weight,
            )));
        }
        let semantic = if matchers_config.semantic.enabled {
            let semantic = Arc::new(SemanticMatcher::new(
                embedder.clone(),
                store,
                matchers_config.semantic.weight,
                matchers_config.semantic.min_similarity,
                matchers_config.semantic.top_k,
            ));
            matchers.push(semantic.clone());
            Some(semantic)
        } else {
            None
        };
        if matchers_config.pattern.enabled {
            matchers.push(Arc::new(PatternMatcher::new(
                repository.clone(),
                matchers_config.pattern.weight,
                matchers_config.pattern.confidence,
            )));
        }

        let aggregator = EnsembleAggregator::new(
            config.ensemble.clone(),
            ModifierExtractor::new(repository),
        );
        let mut ensemble = EnsembleMatcher::new(
            matchers,
            aggregator,
            config.execution.strategy,
            config.execution.matcher_timeout,
        )
        .with_event_bus(event_bus.clone());

        let telemetry = config
            .telemetry
            .enabled
            .then(|| Arc::new(MatchTelemetry::new(config.telemetry.capacity)));
        if let Some(telemetry) = &telemetry {
            ensemble = ensemble.with_telemetry(telemetry.clone());
        }

        Self {
            registry,
            ensemble,
            semantic,
            adapter: WorkflowAdapter::new(embedder, config.adaptation.semantic_threshold),
            expander: StepExpander::new().with_event_bus(event_bus.clone()),
            scene,
            event_bus,
            telemetry,
        }
    }

    /// Index the current catalog for semantic matching
    pub async fn initialize(&self) -> Result<usize> {
        match &self.semantic {
            Some(semantic) => semantic
                .initialize(&self.registry.snapshot())
                .await
                .context("Failed to initialize semantic matcher"),
            None => Ok(0),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn telemetry(&self) -> Option<&Arc<MatchTelemetry>> {
        self.telemetry.as_ref()
    }

    pub fn registry(&self) -> &Arc<WorkflowRegistry> {
        &self.registry
    }

    pub async fn route(
        &self,
        goal: &str,
        context: Option<MatchContext>,
    ) -> Result<RoutedPlan, RouterError> {
        let mut context = context.unwrap_or_default();
        let scene = match context.scene.take() {
            Some(scene) => scene,
            None => self.snapshot_scene().await,
        };
        context.scene = Some(scene.clone());

        let report = self.ensemble.match_with_report(goal, Some(&context)).await;
        let request_id = report.request_id;
        let ensemble = report.result;

        let Some(workflow_name) = ensemble.workflow_name.clone().filter(|_| ensemble.is_match())
        else {
            info!(request_id = %request_id, goal, "No workflow matched");
            return Ok(RoutedPlan {
                request_id,
                ensemble,
                adaptation: None,
                calls: Vec::new(),
                skipped_steps: Vec::new(),
            });
        };

        let definition = self
            .registry
            .get(&workflow_name)
            .ok_or_else(|| RouterError::WorkflowNotFound(workflow_name.clone()))?;

        let (steps, adaptation) = self
            .adapter
            .adapt(&definition, ensemble.confidence_level, goal)
            .await;

        let base = StepExpander::base_context(&definition, &scene, &ensemble.modifiers);
        let explicit = StepExpander::explicit_overrides(&definition, &ensemble.modifier_keywords);
        let expansion = self.expander.expand(&definition, &steps, base, &explicit)?;

        info!(
            request_id = %request_id,
            workflow = %workflow_name,
            confidence = %ensemble.confidence_level,
            kept_steps = adaptation.kept_count(),
            calls = expansion.calls.len(),
            "Routed goal"
        );

        Ok(RoutedPlan {
            request_id,
            ensemble,
            adaptation: Some(adaptation),
            calls: expansion.calls,
            skipped_steps: expansion.skipped_steps,
        })
    }

    /// Replace all definitions from a directory and re-index them
    pub async fn reload_workflows(&self, dir: impl AsRef<Path>) -> Result<LoadReport> {
        let report = self.registry.reload_directory(dir)?;
        self.initialize().await?;

        self.event_bus.publish(RoutingEvent::WorkflowsReloaded {
            loaded: report.loaded.len(),
            failed: report.failures.len(),
            reloaded_at: Utc::now(),
        });
        Ok(report)
    }

    async fn snapshot_scene(&self) -> SceneSnapshot {
        match self.scene.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Scene snapshot unavailable, using an empty scene");
                SceneSnapshot::default()
            }
        }
    }
}
