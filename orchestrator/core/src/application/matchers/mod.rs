// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Signal sources feeding the ensemble
//!
//! Each matcher reads the current workflow catalog snapshot and votes for at
//! most one workflow. None of them ever fails on "no match".

pub mod keyword;
pub mod pattern;
pub mod semantic;

pub use keyword::KeywordMatcher;
pub use pattern::PatternMatcher;
pub use semantic::SemanticMatcher;
