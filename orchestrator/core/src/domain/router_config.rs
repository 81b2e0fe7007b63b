// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Router Configuration Types
//
// Defines the configuration schema for the SceneCraft workflow router:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Matcher weights and thresholds
// - Ensemble scoring and confidence bands
// - Adaptation, execution strategy and telemetry settings
// - Observability (logging) settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::matching::ExecutionStrategy;

pub const API_VERSION: &str = "scenecraft.io/v1";
pub const KIND: &str = "RouterConfig";

/// Top-level Kubernetes-style router configuration manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfigManifest {
    /// API version (must be "scenecraft.io/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "RouterConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: RouterConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Router configuration specification (content under spec:)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterConfigSpec {
    #[serde(default)]
    pub matchers: MatchersConfig,

    #[serde(default)]
    pub ensemble: EnsembleConfig,

    #[serde(default)]
    pub adaptation: AdaptationConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Directory of workflow definition files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflows_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchersConfig {
    #[serde(default)]
    pub keyword: KeywordMatcherConfig,

    #[serde(default)]
    pub semantic: SemanticMatcherConfig,

    #[serde(default)]
    pub pattern: PatternMatcherConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordMatcherConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_keyword_weight")]
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticMatcherConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_semantic_weight")]
    pub weight: f64,

    /// Hits below this cosine similarity are ignored
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,

    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatcherConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_pattern_weight")]
    pub weight: f64,

    /// Confidence reported when a detected pattern maps to a workflow
    #[serde(default = "default_pattern_confidence")]
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Multiplier applied to a workflow's score when the pattern matcher backed it
    #[serde(default = "default_pattern_boost")]
    pub pattern_boost: f64,

    /// Top-two score gap below which the runner-up is composed in
    #[serde(default = "default_composition_threshold")]
    pub composition_threshold: f64,

    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,

    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,

    /// Goal substrings that force LOW confidence (user asked for a minimal result)
    #[serde(default = "default_wants_simple_keywords")]
    pub wants_simple_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationConfig {
    /// Minimum goal/step-description similarity to keep an optional step at MEDIUM
    #[serde(default = "default_adaptation_threshold")]
    pub semantic_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub strategy: ExecutionStrategy,

    #[serde(default = "default_matcher_timeout", with = "humantime_serde")]
    pub matcher_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Number of match records kept in the ring buffer
    #[serde(default = "default_telemetry_capacity")]
    pub capacity: usize,

    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "compact")
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_keyword_weight() -> f64 {
    0.40
}

fn default_semantic_weight() -> f64 {
    0.40
}

fn default_pattern_weight() -> f64 {
    0.15
}

fn default_min_similarity() -> f64 {
    0.5
}

fn default_top_k() -> usize {
    5
}

fn default_pattern_confidence() -> f64 {
    0.95
}

fn default_pattern_boost() -> f64 {
    1.3
}

fn default_composition_threshold() -> f64 {
    0.15
}

fn default_high_threshold() -> f64 {
    0.70
}

fn default_medium_threshold() -> f64 {
    0.50
}

fn default_wants_simple_keywords() -> Vec<String> {
    [
        "simple",
        "basic",
        "minimal",
        "prosty",
        "prosta",
        "proste",
        "podstawowy",
        "minimalny",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_adaptation_threshold() -> f64 {
    0.6
}

fn default_matcher_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_telemetry_capacity() -> usize {
    1000
}

fn default_event_bus_capacity() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for KeywordMatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: default_keyword_weight(),
        }
    }
}

impl Default for SemanticMatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: default_semantic_weight(),
            min_similarity: default_min_similarity(),
            top_k: default_top_k(),
        }
    }
}

impl Default for PatternMatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: default_pattern_weight(),
            confidence: default_pattern_confidence(),
        }
    }
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            pattern_boost: default_pattern_boost(),
            composition_threshold: default_composition_threshold(),
            high_threshold: default_high_threshold(),
            medium_threshold: default_medium_threshold(),
            wants_simple_keywords: default_wants_simple_keywords(),
        }
    }
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            semantic_threshold: default_adaptation_threshold(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            strategy: ExecutionStrategy::default(),
            matcher_timeout: default_matcher_timeout(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_telemetry_capacity(),
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for RouterConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "scenecraft-router".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: RouterConfigSpec::default(),
        }
    }
}

impl RouterConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. SCENECRAFT_CONFIG_PATH environment variable
    /// 2. ./scenecraft-config.yaml (working directory)
    /// 3. ~/.scenecraft/config.yaml (user home)
    /// 4. /etc/scenecraft/config.yaml (system, Unix) or C:\ProgramData\SceneCraft\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SCENECRAFT_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./scenecraft-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".scenecraft").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/scenecraft/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\SceneCraft\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(explicit_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = explicit_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SCENECRAFT_MATCH_STRATEGY") {
            match val.parse::<ExecutionStrategy>() {
                Ok(strategy) => {
                    tracing::info!("Environment override: SCENECRAFT_MATCH_STRATEGY={}", strategy);
                    self.spec.execution.strategy = strategy;
                }
                Err(e) => {
                    tracing::warn!(
                        "Invalid value for SCENECRAFT_MATCH_STRATEGY: {}. Expected sequential/concurrent. Ignoring.",
                        e
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("SCENECRAFT_MATCHER_TIMEOUT") {
            match humantime_serde::re::humantime::parse_duration(&val) {
                Ok(timeout) => {
                    tracing::info!("Environment override: SCENECRAFT_MATCHER_TIMEOUT={}", val);
                    self.spec.execution.matcher_timeout = timeout;
                }
                Err(e) => {
                    tracing::warn!(
                        "Invalid value for SCENECRAFT_MATCHER_TIMEOUT: '{}' ({}). Ignoring.",
                        val,
                        e
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("SCENECRAFT_WORKFLOWS_DIR") {
            tracing::info!("Environment override: SCENECRAFT_WORKFLOWS_DIR={}", val);
            self.spec.workflows_dir = Some(PathBuf::from(val));
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let matchers = &self.spec.matchers;
        for (name, weight) in [
            ("keyword", matchers.keyword.weight),
            ("semantic", matchers.semantic.weight),
            ("pattern", matchers.pattern.weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                anyhow::bail!("Matcher weight for '{}' must be a non-negative number", name);
            }
        }

        if !(matchers.keyword.enabled || matchers.semantic.enabled || matchers.pattern.enabled) {
            anyhow::bail!("At least one matcher must be enabled");
        }

        check_unit_interval("matchers.semantic.min_similarity", matchers.semantic.min_similarity)?;
        check_unit_interval("matchers.pattern.confidence", matchers.pattern.confidence)?;

        if matchers.semantic.top_k == 0 {
            anyhow::bail!("matchers.semantic.top_k must be at least 1");
        }

        let ensemble = &self.spec.ensemble;
        if !ensemble.pattern_boost.is_finite() || ensemble.pattern_boost < 1.0 {
            anyhow::bail!("ensemble.pattern_boost must be >= 1.0");
        }
        check_unit_interval("ensemble.composition_threshold", ensemble.composition_threshold)?;
        check_unit_interval("ensemble.high_threshold", ensemble.high_threshold)?;
        check_unit_interval("ensemble.medium_threshold", ensemble.medium_threshold)?;
        if ensemble.medium_threshold > ensemble.high_threshold {
            anyhow::bail!("ensemble.medium_threshold cannot exceed ensemble.high_threshold");
        }

        check_unit_interval("adaptation.semantic_threshold", self.spec.adaptation.semantic_threshold)?;

        if self.spec.execution.matcher_timeout.is_zero() {
            anyhow::bail!("execution.matcher_timeout must be greater than zero");
        }

        if self.spec.telemetry.enabled && self.spec.telemetry.capacity == 0 {
            anyhow::bail!("telemetry.capacity must be at least 1 when telemetry is enabled");
        }

        Ok(())
    }
}

fn check_unit_interval(field: &str, value: f64) -> anyhow::Result<()> {
    if !(0.0..=1.0).contains(&value) {
        anyhow::bail!("{} must be within [0.0, 1.0], got {}", field, value);
    }
    Ok(())
}
