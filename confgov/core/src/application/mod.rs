// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod used_status_probe;
pub mod sync_status_probe;
pub mod take_effect_probe;
pub mod reconciler;

pub use used_status_probe::UsedStatusProbe;
pub use sync_status_probe::SyncStatusProbe;
pub use take_effect_probe::{HostFailure, TakeEffectProbe, TakeEffectReport};
pub use reconciler::{IssueSource, ReconcileError, ReconcileIssue, ReconcileOutcome, ReconcileRequest, Reconciler};
