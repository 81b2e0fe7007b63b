// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Workflow definitions, matching value objects, the expression engine and
//! router configuration. Nothing in here performs I/O beyond config file
//! loading.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure routing model shared by application and infrastructure

pub mod events;
pub mod expression;
pub mod matching;
pub mod repository;
pub mod router_config;
pub mod scene;
pub mod workflow;
