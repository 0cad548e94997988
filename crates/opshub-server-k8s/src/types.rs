// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::time::Duration;

pub use k8s_openapi::api::core::v1::{Namespace, ServiceAccount};
pub use k8s_openapi::api::rbac::v1::{ClusterRole, PolicyRule, Role};

/// Timeouts applied to every client built from a kubeconfig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
	pub connect_timeout: Duration,
	pub read_timeout: Duration,
}

impl Default for ConnectOptions {
	fn default() -> Self {
		Self {
			connect_timeout: Duration::from_secs(5),
			read_timeout: Duration::from_secs(30),
		}
	}
}
