// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Value types, port traits and invariants of the rollout status model.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer

pub mod node;
pub mod configuration;
pub mod status;
pub mod fleet;
pub mod probe;
pub mod repository;
pub mod reconciler_config;
