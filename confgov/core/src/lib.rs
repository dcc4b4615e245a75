// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # confgov core
//!
//! Reconciles the rollout status of a versioned configuration file across a
//! fleet of managed hosts. Three independent questions are answered per host:
//!
//! - **used**: is a supervised process holding the file?
//! - **synced**: did the host acknowledge the target version in the
//!   coordination store?
//! - **take effect**: does the running process report the target version?
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - `domain` holds value types, port traits and the config manifest,
//!   `application` holds the probes and the `Reconciler`, `infrastructure`
//!   holds the HTTP, etcd gateway and repository adapters.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
