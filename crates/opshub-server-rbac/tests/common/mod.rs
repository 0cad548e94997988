// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared setup for engine integration tests: an in-memory database and a
//! client factory that hands out one mock cluster per cluster id.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use opshub_common_secret::SecretString;
use opshub_server_db::{
	testing::create_test_pool, ClusterId, ClusterRecord, ClusterRepository, CredentialRepository,
	PlatformUser, RoleBindingRepository, RoleBindingStore, UserRepository,
};
use opshub_server_k8s::{K8sClient, K8sError, MockK8sClient};
use opshub_server_rbac::{
	CacheSettings, ClientFactory, ClusterClientCache, IdentityMapper, RbacEngine,
};
use sqlx::SqlitePool;

#[derive(Default)]
pub struct MockFactory {
	connects: AtomicUsize,
	delay: Option<Duration>,
	clusters: Mutex<HashMap<ClusterId, MockK8sClient>>,
}

impl MockFactory {
	pub fn with_delay(delay: Duration) -> Self {
		Self {
			delay: Some(delay),
			..Default::default()
		}
	}

	pub fn cluster(&self, id: ClusterId) -> MockK8sClient {
		self
			.clusters
			.lock()
			.unwrap()
			.entry(id)
			.or_default()
			.clone()
	}

	pub fn connects(&self) -> usize {
		self.connects.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl ClientFactory for MockFactory {
	async fn connect(&self, cluster: &ClusterRecord) -> Result<Arc<dyn K8sClient>, K8sError> {
		self.connects.fetch_add(1, Ordering::SeqCst);
		if let Some(delay) = self.delay {
			tokio::time::sleep(delay).await;
		}
		Ok(Arc::new(self.cluster(cluster.id)))
	}
}

pub fn test_settings() -> CacheSettings {
	CacheSettings {
		max_entries: 8,
		idle_ttl: Some(Duration::from_secs(600)),
		failure_threshold: 2,
		probe_timeout: Duration::from_secs(5),
	}
}

pub struct TestEnv {
	pub pool: SqlitePool,
	pub engine: RbacEngine,
	pub factory: Arc<MockFactory>,
	pub users: UserRepository,
	pub clusters: ClusterRepository,
	pub credentials: CredentialRepository,
	pub cluster_id: ClusterId,
}

impl TestEnv {
	pub async fn new() -> Self {
		Self::build(MockFactory::default(), None).await
	}

	pub async fn with_factory(factory: MockFactory) -> Self {
		Self::build(factory, None).await
	}

	/// Route binding writes and reads through `wrap` applied to the real
	/// repository.
	pub async fn with_bindings<F>(wrap: F) -> Self
	where
		F: FnOnce(RoleBindingRepository) -> Arc<dyn RoleBindingStore> + 'static,
	{
		Self::build(MockFactory::default(), Some(Box::new(wrap))).await
	}

	#[allow(clippy::type_complexity)]
	async fn build(
		factory: MockFactory,
		wrap: Option<Box<dyn FnOnce(RoleBindingRepository) -> Arc<dyn RoleBindingStore>>>,
	) -> Self {
		let pool = create_test_pool().await.unwrap();
		let users = UserRepository::new(pool.clone());
		let clusters = ClusterRepository::new(pool.clone());
		let credentials = CredentialRepository::new(pool.clone());

		let cluster = clusters
			.register_cluster("prod", None, &SecretString::from("apiVersion: v1"))
			.await
			.unwrap();

		let factory = Arc::new(factory);
		let cache = Arc::new(ClusterClientCache::new(
			Arc::new(clusters.clone()),
			factory.clone(),
			test_settings(),
		));

		let bindings_repo = RoleBindingRepository::new(pool.clone());
		let bindings: Arc<dyn RoleBindingStore> = match wrap {
			Some(wrap) => wrap(bindings_repo),
			None => Arc::new(bindings_repo),
		};

		let engine = RbacEngine::new(
			cache,
			bindings,
			Arc::new(credentials.clone()),
			Arc::new(users.clone()),
			IdentityMapper::default(),
			"default",
		);

		Self {
			pool,
			engine,
			factory,
			users,
			clusters,
			credentials,
			cluster_id: cluster.id,
		}
	}

	/// The mock behind the default cluster.
	pub fn cluster(&self) -> MockK8sClient {
		self.factory.cluster(self.cluster_id)
	}

	pub async fn add_user(&self, username: &str) -> PlatformUser {
		self
			.users
			.create_user(username, &format!("{username} user"), None)
			.await
			.unwrap()
	}

	pub async fn binding_rows(&self) -> i64 {
		sqlx::query_scalar("SELECT COUNT(*) FROM k8s_user_role_bindings")
			.fetch_one(&self.pool)
			.await
			.unwrap()
	}
}
