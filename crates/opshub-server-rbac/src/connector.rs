// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Turning stored cluster connection parameters into a live client.

use std::sync::Arc;

use async_trait::async_trait;
use opshub_server_config::ClusterCacheConfig;
use opshub_server_db::ClusterRecord;
use opshub_server_k8s::{ConnectOptions, K8sClient, K8sError, KubeClient};

/// Builds an API client for one cluster. The cache calls this at most once
/// per cluster at a time.
#[async_trait]
pub trait ClientFactory: Send + Sync {
	async fn connect(&self, cluster: &ClusterRecord) -> Result<Arc<dyn K8sClient>, K8sError>;
}

/// Builds [`KubeClient`]s from the kubeconfig stored with each cluster.
#[derive(Debug, Clone, Default)]
pub struct KubeClientFactory {
	options: ConnectOptions,
}

impl KubeClientFactory {
	pub fn new(options: ConnectOptions) -> Self {
		Self { options }
	}

	pub fn from_config(config: &ClusterCacheConfig) -> Self {
		Self::new(ConnectOptions {
			connect_timeout: config.connect_timeout(),
			read_timeout: config.read_timeout(),
		})
	}
}

#[async_trait]
impl ClientFactory for KubeClientFactory {
	async fn connect(&self, cluster: &ClusterRecord) -> Result<Arc<dyn K8sClient>, K8sError> {
		let client = KubeClient::from_kubeconfig(&cluster.kubeconfig, &self.options).await?;
		Ok(Arc::new(client))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use opshub_server_db::ClusterId;
	use std::time::Duration;

	#[test]
	fn timeouts_come_from_config() {
		let config = ClusterCacheConfig {
			connect_timeout_secs: 2,
			read_timeout_secs: 9,
			..Default::default()
		};
		let factory = KubeClientFactory::from_config(&config);
		assert_eq!(factory.options.connect_timeout, Duration::from_secs(2));
		assert_eq!(factory.options.read_timeout, Duration::from_secs(9));
	}

	#[tokio::test]
	async fn garbage_kubeconfig_is_a_config_error() {
		let cluster = ClusterRecord {
			id: ClusterId(1),
			name: "broken".to_string(),
			endpoint: None,
			kubeconfig: "not: [valid".into(),
			created_at: Utc::now(),
			updated_at: Utc::now(),
		};
		let err = KubeClientFactory::default()
			.connect(&cluster)
			.await
			.err()
			.unwrap();
		assert!(matches!(err, K8sError::Config { .. }));
		assert!(!err.is_connection_failure());
	}
}
