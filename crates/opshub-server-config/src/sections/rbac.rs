// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! RBAC engine configuration.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_SERVICE_ACCOUNT_PREFIX: &str = "opshub";
const DEFAULT_CREDENTIAL_NAMESPACE: &str = "default";
const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RbacConfig {
	/// Service accounts managed by the platform are named `<prefix>-<username>`.
	pub service_account_prefix: String,
	/// Namespace scanned for platform service accounts.
	pub credential_namespace: String,
	pub operation_timeout_secs: u64,
}

impl RbacConfig {
	pub fn operation_timeout(&self) -> Option<Duration> {
		(self.operation_timeout_secs > 0).then(|| Duration::from_secs(self.operation_timeout_secs))
	}
}

impl Default for RbacConfig {
	fn default() -> Self {
		RbacConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RbacConfigLayer {
	#[serde(default)]
	pub service_account_prefix: Option<String>,
	#[serde(default)]
	pub credential_namespace: Option<String>,
	#[serde(default)]
	pub operation_timeout_secs: Option<u64>,
}

impl RbacConfigLayer {
	pub fn merge(&mut self, other: RbacConfigLayer) {
		if other.service_account_prefix.is_some() {
			self.service_account_prefix = other.service_account_prefix;
		}
		if other.credential_namespace.is_some() {
			self.credential_namespace = other.credential_namespace;
		}
		if other.operation_timeout_secs.is_some() {
			self.operation_timeout_secs = other.operation_timeout_secs;
		}
	}

	pub fn finalize(self) -> RbacConfig {
		RbacConfig {
			service_account_prefix: self
				.service_account_prefix
				.unwrap_or_else(|| DEFAULT_SERVICE_ACCOUNT_PREFIX.to_string()),
			credential_namespace: self
				.credential_namespace
				.unwrap_or_else(|| DEFAULT_CREDENTIAL_NAMESPACE.to_string()),
			operation_timeout_secs: self
				.operation_timeout_secs
				.unwrap_or(DEFAULT_OPERATION_TIMEOUT_SECS),
		}
	}
}
