// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{
	api::{Api, DeleteParams, ListParams},
	config::{KubeConfigOptions, Kubeconfig},
	Client, Config,
};
use opshub_common_secret::SecretString;
use tracing::{debug, instrument};

use crate::client::K8sClient;
use crate::error::K8sError;
use crate::types::{ClusterRole, ConnectOptions, Namespace, Role, ServiceAccount};

/// Production K8s client implementation using the kube crate.
#[derive(Clone)]
pub struct KubeClient {
	client: Client,
}

impl KubeClient {
	/// Wrap an already-configured kube client.
	pub fn new(client: Client) -> Self {
		Self { client }
	}

	/// Build a client for a managed cluster from its stored kubeconfig document.
	///
	/// Uses the kubeconfig's current context. Connect and read timeouts from
	/// `options` override whatever the document specifies.
	#[instrument(skip(kubeconfig))]
	pub async fn from_kubeconfig(
		kubeconfig: &SecretString,
		options: &ConnectOptions,
	) -> Result<Self, K8sError> {
		let kubeconfig = Kubeconfig::from_yaml(kubeconfig.expose()).map_err(|e| K8sError::Config {
			message: format!("failed to parse kubeconfig: {e}"),
		})?;

		let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
			.await
			.map_err(|e| K8sError::Config {
				message: format!("failed to load kubeconfig: {e}"),
			})?;
		config.connect_timeout = Some(options.connect_timeout);
		config.read_timeout = Some(options.read_timeout);

		let cluster_url = config.cluster_url.to_string();
		let client = Client::try_from(config).map_err(|e| K8sError::Config {
			message: format!("failed to create client: {e}"),
		})?;

		debug!(cluster_url = %cluster_url, "K8s client initialized");
		Ok(Self { client })
	}
}

fn not_found_or(kind: &'static str, name: &str, err: kube::Error) -> K8sError {
	match err {
		kube::Error::Api(ref resp) if resp.code == 404 => K8sError::NotFound {
			kind,
			name: name.into(),
		},
		other => other.into(),
	}
}

#[async_trait]
impl K8sClient for KubeClient {
	async fn probe(&self) -> Result<(), K8sError> {
		let namespaces: Api<Namespace> = Api::all(self.client.clone());
		namespaces.list(&ListParams::default().limit(1)).await?;
		Ok(())
	}

	async fn list_cluster_roles(&self) -> Result<Vec<ClusterRole>, K8sError> {
		let roles: Api<ClusterRole> = Api::all(self.client.clone());
		let list = roles.list(&ListParams::default()).await?;
		Ok(list.items)
	}

	async fn get_cluster_role(&self, name: &str) -> Result<ClusterRole, K8sError> {
		let roles: Api<ClusterRole> = Api::all(self.client.clone());
		roles
			.get(name)
			.await
			.map_err(|e| not_found_or("ClusterRole", name, e))
	}

	async fn delete_cluster_role(&self, name: &str) -> Result<(), K8sError> {
		let roles: Api<ClusterRole> = Api::all(self.client.clone());
		roles
			.delete(name, &DeleteParams::default())
			.await
			.map_err(|e| not_found_or("ClusterRole", name, e))?;
		Ok(())
	}

	async fn list_roles(&self, namespace: &str) -> Result<Vec<Role>, K8sError> {
		let roles: Api<Role> = Api::namespaced(self.client.clone(), namespace);
		let list = roles.list(&ListParams::default()).await?;
		Ok(list.items)
	}

	async fn get_role(&self, namespace: &str, name: &str) -> Result<Role, K8sError> {
		let roles: Api<Role> = Api::namespaced(self.client.clone(), namespace);
		roles
			.get(name)
			.await
			.map_err(|e| not_found_or("Role", name, e))
	}

	async fn delete_role(&self, namespace: &str, name: &str) -> Result<(), K8sError> {
		let roles: Api<Role> = Api::namespaced(self.client.clone(), namespace);
		roles
			.delete(name, &DeleteParams::default())
			.await
			.map_err(|e| not_found_or("Role", name, e))?;
		Ok(())
	}

	async fn list_namespaces(&self) -> Result<Vec<Namespace>, K8sError> {
		let namespaces: Api<Namespace> = Api::all(self.client.clone());
		let list = namespaces.list(&ListParams::default()).await?;
		Ok(list.items)
	}

	async fn count_pods(&self, namespace: &str) -> Result<usize, K8sError> {
		let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
		let list = pods.list_metadata(&ListParams::default()).await?;
		Ok(list.items.len())
	}

	async fn list_service_accounts(&self, namespace: &str) -> Result<Vec<ServiceAccount>, K8sError> {
		let accounts: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
		let list = accounts.list(&ListParams::default()).await?;
		Ok(list.items)
	}
}
