// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! SceneCraft Router Core
//!
//! Matches a natural-language modeling goal to a workflow definition, trims
//! the workflow to the confidence of the match and expands its steps into
//! concrete engine calls.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Domain:** workflow model, matching value objects, expression engine, configuration
//! - **Application:** matchers, ensemble, adapter, step expander, router
//! - **Infrastructure:** registry, parser, event bus, telemetry, logging

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
