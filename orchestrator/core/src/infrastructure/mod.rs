// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod logging;
pub mod telemetry;
pub mod workflow_parser;
pub mod workflow_registry;

pub use event_bus::{EventBus, EventBusError, EventReceiver, RequestEventReceiver};
pub use telemetry::{MatchRecord, MatchTelemetry};
pub use workflow_parser::{WorkflowParseError, WorkflowParser};
pub use workflow_registry::{LoadFailure, LoadReport, WorkflowRegistry};
