// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod host_client;
pub mod etcd_gateway;
pub mod db;
pub mod repositories;

pub use etcd_gateway::EtcdGatewayStore;
pub use host_client::HttpHostClient;
