// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for confgov CLI

pub mod config;
pub mod reconcile;

pub use self::config::ConfigCommand;
pub use self::reconcile::ReconcileCommand;
