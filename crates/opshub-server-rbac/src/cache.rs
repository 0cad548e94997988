// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared cache of live cluster API clients.
//!
//! At most one client per cluster is built at a time: concurrent callers for
//! an uncached cluster wait on the same build and share its outcome, failures
//! included. A client is probed once before it is cached and never again;
//! after that it is trusted until one of:
//!
//! - [`ClusterClientCache::invalidate`] is called (credentials changed)
//! - `failure_threshold` consecutive connection failures are reported for it
//! - it sits unused for longer than the idle TTL
//! - it is the least recently used entry when room is needed for another

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use opshub_server_config::ClusterCacheConfig;
use opshub_server_db::{ClusterId, ClusterStore};
use opshub_server_k8s::{K8sClient, K8sError};
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::connector::ClientFactory;
use crate::error::RbacError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
	pub max_entries: usize,
	pub idle_ttl: Option<Duration>,
	pub failure_threshold: u32,
	pub probe_timeout: Duration,
}

impl Default for CacheSettings {
	fn default() -> Self {
		Self::from(&ClusterCacheConfig::default())
	}
}

impl From<&ClusterCacheConfig> for CacheSettings {
	fn from(config: &ClusterCacheConfig) -> Self {
		Self {
			max_entries: config.max_entries,
			idle_ttl: config.idle_ttl(),
			failure_threshold: config.failure_threshold,
			probe_timeout: config.probe_timeout(),
		}
	}
}

/// A client borrowed from the cache for one logical operation.
///
/// The generation ties failure reports to the exact client that produced
/// them, so a report about a replaced client cannot evict its successor.
#[derive(Clone)]
pub struct ClusterLease {
	cluster_id: ClusterId,
	generation: u64,
	client: Arc<dyn K8sClient>,
}

impl ClusterLease {
	pub fn cluster_id(&self) -> ClusterId {
		self.cluster_id
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn client(&self) -> &dyn K8sClient {
		self.client.as_ref()
	}
}

impl fmt::Debug for ClusterLease {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ClusterLease")
			.field("cluster_id", &self.cluster_id)
			.field("generation", &self.generation)
			.finish_non_exhaustive()
	}
}

struct CachedClient {
	client: Arc<dyn K8sClient>,
	generation: u64,
	consecutive_failures: u32,
	last_used: Instant,
}

#[derive(Default)]
struct CacheState {
	entries: HashMap<ClusterId, CachedClient>,
	/// Bumped by every invalidation. A build that started under an older
	/// epoch hands its client to its waiters but does not cache it.
	epochs: HashMap<ClusterId, u64>,
}

type BuildCell = Arc<OnceCell<Result<ClusterLease, RbacError>>>;

pub struct ClusterClientCache {
	clusters: Arc<dyn ClusterStore>,
	factory: Arc<dyn ClientFactory>,
	settings: CacheSettings,
	state: Mutex<CacheState>,
	/// Never held across an await, so a caller dropped mid-acquire cannot
	/// leave its finished build behind.
	inflight: StdMutex<HashMap<ClusterId, BuildCell>>,
	next_generation: AtomicU64,
}

impl ClusterClientCache {
	pub fn new(
		clusters: Arc<dyn ClusterStore>,
		factory: Arc<dyn ClientFactory>,
		settings: CacheSettings,
	) -> Self {
		let settings = CacheSettings {
			max_entries: settings.max_entries.max(1),
			failure_threshold: settings.failure_threshold.max(1),
			..settings
		};
		info!(
			max_entries = settings.max_entries,
			failure_threshold = settings.failure_threshold,
			idle_ttl_secs = settings.idle_ttl.map(|ttl| ttl.as_secs()),
			"Created cluster client cache"
		);
		Self {
			clusters,
			factory,
			settings,
			state: Mutex::new(CacheState::default()),
			inflight: StdMutex::new(HashMap::new()),
			next_generation: AtomicU64::new(0),
		}
	}

	pub fn settings(&self) -> &CacheSettings {
		&self.settings
	}

	/// Get the live client for a cluster, building and probing one if needed.
	///
	/// # Errors
	/// `ConnectionFailed` if the cluster is unknown, its kubeconfig is
	/// unusable or the liveness probe fails; `Storage` if the cluster lookup
	/// itself fails. Nothing is cached on error.
	#[instrument(skip(self), fields(cluster_id = %cluster_id))]
	pub async fn acquire(&self, cluster_id: ClusterId) -> Result<ClusterLease, RbacError> {
		if let Some(lease) = self.cached(cluster_id).await {
			return Ok(lease);
		}

		let cell = {
			let mut inflight = self.inflight();
			let cell = inflight
				.entry(cluster_id)
				.or_insert_with(|| Arc::new(OnceCell::new()));
			// A finished build is an answer for its own waiters only.
			if cell.initialized() {
				*cell = Arc::new(OnceCell::new());
			}
			Arc::clone(cell)
		};

		let result = cell
			.get_or_init(|| async {
				// Another build may have finished between the miss and now.
				if let Some(lease) = self.cached(cluster_id).await {
					return Ok(lease);
				}
				self.build(cluster_id).await
			})
			.await
			.clone();

		let mut inflight = self.inflight();
		if inflight
			.get(&cluster_id)
			.is_some_and(|current| Arc::ptr_eq(current, &cell))
		{
			inflight.remove(&cluster_id);
		}

		result
	}

	fn inflight(&self) -> MutexGuard<'_, HashMap<ClusterId, BuildCell>> {
		self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
	}

	async fn cached(&self, cluster_id: ClusterId) -> Option<ClusterLease> {
		let now = Instant::now();
		let mut state = self.state.lock().await;

		let idle = self.is_idle(state.entries.get(&cluster_id)?, now);
		if idle {
			state.entries.remove(&cluster_id);
			debug!(cluster_id = %cluster_id, "Dropped idle cluster client");
			return None;
		}

		let entry = state.entries.get_mut(&cluster_id)?;
		entry.last_used = now;
		Some(ClusterLease {
			cluster_id,
			generation: entry.generation,
			client: Arc::clone(&entry.client),
		})
	}

	async fn build(&self, cluster_id: ClusterId) -> Result<ClusterLease, RbacError> {
		let epoch = self.epoch(cluster_id).await;

		let cluster = self
			.clusters
			.get_cluster(cluster_id)
			.await
			.map_err(|e| RbacError::storage("acquireClient", e))?
			.ok_or_else(|| RbacError::connection_failed(cluster_id, "cluster is not registered"))?;

		let client = self.factory.connect(&cluster).await.map_err(|e| {
			warn!(cluster_id = %cluster_id, error = %e, "Failed to build cluster client");
			RbacError::connection_failed(cluster_id, e.to_string())
		})?;

		match tokio::time::timeout(self.settings.probe_timeout, client.probe()).await {
			Ok(Ok(())) => {}
			Ok(Err(e)) => {
				warn!(cluster_id = %cluster_id, error = %e, "Cluster liveness probe failed");
				return Err(RbacError::connection_failed(
					cluster_id,
					format!("liveness probe failed: {e}"),
				));
			}
			Err(_) => {
				warn!(cluster_id = %cluster_id, "Cluster liveness probe timed out");
				return Err(RbacError::connection_failed(
					cluster_id,
					"liveness probe timed out",
				));
			}
		}

		let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
		let lease = ClusterLease {
			cluster_id,
			generation,
			client: Arc::clone(&client),
		};

		let mut state = self.state.lock().await;
		if state.epochs.get(&cluster_id).copied().unwrap_or(0) != epoch {
			debug!(cluster_id = %cluster_id, "Cluster invalidated during build, not caching client");
			return Ok(lease);
		}

		if !state.entries.contains_key(&cluster_id) && state.entries.len() >= self.settings.max_entries
		{
			let oldest = state
				.entries
				.iter()
				.min_by_key(|(_, entry)| entry.last_used)
				.map(|(id, _)| *id);
			if let Some(oldest) = oldest {
				state.entries.remove(&oldest);
				info!(evicted_cluster_id = %oldest, "Evicted least recently used cluster client");
			}
		}

		state.entries.insert(
			cluster_id,
			CachedClient {
				client,
				generation,
				consecutive_failures: 0,
				last_used: Instant::now(),
			},
		);
		info!(cluster_id = %cluster_id, cluster = %cluster.name, generation, "Cached cluster client");
		Ok(lease)
	}

	async fn epoch(&self, cluster_id: ClusterId) -> u64 {
		let state = self.state.lock().await;
		state.epochs.get(&cluster_id).copied().unwrap_or(0)
	}

	fn is_idle(&self, entry: &CachedClient, now: Instant) -> bool {
		self
			.settings
			.idle_ttl
			.is_some_and(|ttl| now.saturating_duration_since(entry.last_used) >= ttl)
	}

	/// Feed the outcome of a call made through `lease` back into the cache.
	///
	/// Only connection failures count toward invalidation; an API server that
	/// answers with 403 or 404 is healthy.
	pub async fn record_outcome<T>(&self, lease: &ClusterLease, result: &Result<T, K8sError>) {
		match result {
			Err(e) if e.is_connection_failure() => {
				self.record_failure(lease, e).await;
			}
			_ => self.record_success(lease).await,
		}
	}

	pub async fn record_success(&self, lease: &ClusterLease) {
		let mut state = self.state.lock().await;
		if let Some(entry) = state.entries.get_mut(&lease.cluster_id) {
			if entry.generation == lease.generation {
				entry.consecutive_failures = 0;
			}
		}
	}

	/// Count a connection failure. Returns `true` if this failure evicted
	/// the client.
	pub async fn record_failure(&self, lease: &ClusterLease, err: &K8sError) -> bool {
		let mut state = self.state.lock().await;
		let Some(entry) = state.entries.get_mut(&lease.cluster_id) else {
			return false;
		};
		if entry.generation != lease.generation {
			return false;
		}

		entry.consecutive_failures += 1;
		let failures = entry.consecutive_failures;
		if failures < self.settings.failure_threshold {
			debug!(cluster_id = %lease.cluster_id, failures, error = %err, "Cluster call failed");
			return false;
		}

		state.entries.remove(&lease.cluster_id);
		warn!(
			cluster_id = %lease.cluster_id,
			failures,
			error = %err,
			"Evicted cluster client after consecutive failures"
		);
		true
	}

	/// Drop the cached client for a cluster so the next acquire rebuilds it.
	/// A build already in flight still answers its waiters but is not cached.
	///
	/// Returns whether a cached client was removed.
	#[instrument(skip(self), fields(cluster_id = %cluster_id))]
	pub async fn invalidate(&self, cluster_id: ClusterId) -> bool {
		let removed = {
			let mut state = self.state.lock().await;
			*state.epochs.entry(cluster_id).or_insert(0) += 1;
			state.entries.remove(&cluster_id).is_some()
		};
		self.inflight().remove(&cluster_id);
		info!(removed, "Invalidated cluster client");
		removed
	}

	/// Remove every client idle for longer than the TTL. Returns how many
	/// were removed.
	pub async fn evict_idle(&self) -> usize {
		if self.settings.idle_ttl.is_none() {
			return 0;
		}
		let now = Instant::now();
		let mut state = self.state.lock().await;
		let before = state.entries.len();
		state.entries.retain(|_, entry| !self.is_idle(entry, now));
		before - state.entries.len()
	}

	pub async fn len(&self) -> usize {
		self.state.lock().await.entries.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}

	pub async fn contains(&self, cluster_id: ClusterId) -> bool {
		self.state.lock().await.entries.contains_key(&cluster_id)
	}
}

/// Periodically evict idle clients until `shutdown` fires.
pub async fn run_eviction_task(
	cache: Arc<ClusterClientCache>,
	interval: Duration,
	shutdown: CancellationToken,
) {
	info!(interval_secs = interval.as_secs(), "Starting cluster client eviction task");

	loop {
		tokio::select! {
			_ = shutdown.cancelled() => {
				info!("Stopping cluster client eviction task");
				return;
			}
			_ = tokio::time::sleep(interval) => {}
		}

		let count = cache.evict_idle().await;
		if count > 0 {
			info!(count, "Eviction completed, dropped idle cluster clients");
		} else {
			debug!("Eviction completed, no idle cluster clients");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use chrono::Utc;
	use opshub_server_db::{ClusterRecord, DbError};
	use opshub_server_k8s::MockK8sClient;
	use std::sync::atomic::AtomicUsize;

	#[derive(Default)]
	struct StaticClusters;

	#[async_trait]
	impl ClusterStore for StaticClusters {
		async fn get_cluster(&self, id: ClusterId) -> Result<Option<ClusterRecord>, DbError> {
			if id.0 >= 100 {
				return Ok(None);
			}
			Ok(Some(ClusterRecord {
				id,
				name: format!("cluster-{id}"),
				endpoint: None,
				kubeconfig: "apiVersion: v1".into(),
				created_at: Utc::now(),
				updated_at: Utc::now(),
			}))
		}
	}

	#[derive(Default)]
	struct CountingFactory {
		connects: AtomicUsize,
		delay: Option<Duration>,
		clusters: StdMutex<HashMap<ClusterId, MockK8sClient>>,
	}

	impl CountingFactory {
		fn with_delay(delay: Duration) -> Self {
			Self {
				delay: Some(delay),
				..Default::default()
			}
		}

		fn cluster(&self, id: i64) -> MockK8sClient {
			self
				.clusters
				.lock()
				.unwrap()
				.entry(ClusterId(id))
				.or_default()
				.clone()
		}

		fn connects(&self) -> usize {
			self.connects.load(Ordering::SeqCst)
		}
	}

	#[async_trait]
	impl ClientFactory for CountingFactory {
		async fn connect(&self, cluster: &ClusterRecord) -> Result<Arc<dyn K8sClient>, K8sError> {
			self.connects.fetch_add(1, Ordering::SeqCst);
			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}
			Ok(Arc::new(self.cluster(cluster.id.0)))
		}
	}

	fn make_cache(factory: Arc<CountingFactory>, settings: CacheSettings) -> ClusterClientCache {
		ClusterClientCache::new(Arc::new(StaticClusters), factory, settings)
	}

	fn settings() -> CacheSettings {
		CacheSettings {
			max_entries: 4,
			idle_ttl: Some(Duration::from_secs(60)),
			failure_threshold: 2,
			probe_timeout: Duration::from_secs(1),
		}
	}

	fn transport() -> K8sError {
		K8sError::Transport {
			message: "connection reset".to_string(),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn concurrent_acquires_build_once() {
		let factory = Arc::new(CountingFactory::with_delay(Duration::from_millis(50)));
		let cache = make_cache(factory.clone(), settings());

		let results =
			futures::future::join_all((0..16).map(|_| cache.acquire(ClusterId(1)))).await;

		assert!(results.iter().all(Result::is_ok));
		assert_eq!(factory.connects(), 1);
		assert_eq!(factory.cluster(1).probe_count(), 1);
		let generations: Vec<_> = results
			.iter()
			.map(|r| r.as_ref().unwrap().generation())
			.collect();
		assert!(generations.windows(2).all(|w| w[0] == w[1]));
	}

	#[tokio::test]
	async fn cached_client_is_not_reprobed() {
		let factory = Arc::new(CountingFactory::default());
		let cache = make_cache(factory.clone(), settings());

		cache.acquire(ClusterId(1)).await.unwrap();
		cache.acquire(ClusterId(1)).await.unwrap();
		cache.acquire(ClusterId(2)).await.unwrap();

		assert_eq!(factory.connects(), 2);
		assert_eq!(factory.cluster(1).probe_count(), 1);
		assert_eq!(cache.len().await, 2);
	}

	#[tokio::test(start_paused = true)]
	async fn concurrent_waiters_share_a_failed_build() {
		let factory = Arc::new(CountingFactory::with_delay(Duration::from_millis(50)));
		factory.cluster(1).set_unreachable(true);
		let cache = make_cache(factory.clone(), settings());

		let results =
			futures::future::join_all((0..4).map(|_| cache.acquire(ClusterId(1)))).await;

		assert_eq!(factory.connects(), 1);
		assert!(results
			.iter()
			.all(|r| matches!(r, Err(RbacError::ConnectionFailed { .. }))));
		assert!(cache.is_empty().await);
	}

	#[tokio::test]
	async fn failed_probe_caches_nothing() {
		let factory = Arc::new(CountingFactory::default());
		factory.cluster(1).fail_next(K8sError::ApiError {
			code: 401,
			message: "Unauthorized".to_string(),
		});
		let cache = make_cache(factory.clone(), settings());

		let err = cache.acquire(ClusterId(1)).await.unwrap_err();
		assert!(matches!(err, RbacError::ConnectionFailed { .. }));
		assert!(err.to_string().contains("Unauthorized"));
		assert!(!cache.contains(ClusterId(1)).await);

		cache.acquire(ClusterId(1)).await.unwrap();
		assert_eq!(factory.connects(), 2);
	}

	#[tokio::test]
	async fn unknown_cluster_is_connection_failure() {
		let factory = Arc::new(CountingFactory::default());
		let cache = make_cache(factory.clone(), settings());

		let err = cache.acquire(ClusterId(404)).await.unwrap_err();
		assert!(matches!(
			err,
			RbacError::ConnectionFailed {
				cluster_id: ClusterId(404),
				..
			}
		));
		assert_eq!(factory.connects(), 0);
	}

	#[tokio::test]
	async fn invalidate_forces_rebuild() {
		let factory = Arc::new(CountingFactory::default());
		let cache = make_cache(factory.clone(), settings());

		let first = cache.acquire(ClusterId(1)).await.unwrap();
		assert!(cache.invalidate(ClusterId(1)).await);
		let second = cache.acquire(ClusterId(1)).await.unwrap();

		assert_eq!(factory.connects(), 2);
		assert_ne!(first.generation(), second.generation());
		assert!(!cache.invalidate(ClusterId(7)).await);
	}

	#[tokio::test(start_paused = true)]
	async fn invalidation_during_build_is_not_cached() {
		let factory = Arc::new(CountingFactory::with_delay(Duration::from_millis(100)));
		let cache = make_cache(factory.clone(), settings());

		let (lease, _) = tokio::join!(cache.acquire(ClusterId(1)), async {
			tokio::time::sleep(Duration::from_millis(10)).await;
			cache.invalidate(ClusterId(1)).await
		});

		assert!(lease.is_ok());
		assert!(!cache.contains(ClusterId(1)).await);
		cache.acquire(ClusterId(1)).await.unwrap();
		assert_eq!(factory.connects(), 2);
	}

	#[tokio::test]
	async fn consecutive_connection_failures_evict() {
		let factory = Arc::new(CountingFactory::default());
		let cache = make_cache(factory.clone(), settings());
		let lease = cache.acquire(ClusterId(1)).await.unwrap();

		assert!(!cache.record_failure(&lease, &transport()).await);
		cache.record_success(&lease).await;
		assert!(!cache.record_failure(&lease, &transport()).await);
		assert!(cache.contains(ClusterId(1)).await);

		assert!(cache.record_failure(&lease, &transport()).await);
		assert!(!cache.contains(ClusterId(1)).await);
	}

	#[tokio::test]
	async fn api_errors_do_not_count_as_failures() {
		let factory = Arc::new(CountingFactory::default());
		let cache = make_cache(factory.clone(), settings());
		let lease = cache.acquire(ClusterId(1)).await.unwrap();

		let forbidden: Result<(), K8sError> = Err(K8sError::ApiError {
			code: 403,
			message: "forbidden".to_string(),
		});
		for _ in 0..5 {
			cache.record_outcome(&lease, &forbidden).await;
		}
		assert!(cache.contains(ClusterId(1)).await);

		let broken: Result<(), K8sError> = Err(K8sError::Timeout);
		cache.record_outcome(&lease, &broken).await;
		cache.record_outcome(&lease, &broken).await;
		assert!(!cache.contains(ClusterId(1)).await);
	}

	#[tokio::test]
	async fn stale_lease_cannot_evict_successor() {
		let factory = Arc::new(CountingFactory::default());
		let cache = make_cache(factory.clone(), settings());

		let stale = cache.acquire(ClusterId(1)).await.unwrap();
		cache.invalidate(ClusterId(1)).await;
		cache.acquire(ClusterId(1)).await.unwrap();

		for _ in 0..3 {
			assert!(!cache.record_failure(&stale, &transport()).await);
		}
		assert!(cache.contains(ClusterId(1)).await);
	}

	#[tokio::test(start_paused = true)]
	async fn idle_clients_expire() {
		let factory = Arc::new(CountingFactory::default());
		let cache = make_cache(factory.clone(), settings());

		cache.acquire(ClusterId(1)).await.unwrap();
		cache.acquire(ClusterId(2)).await.unwrap();
		tokio::time::advance(Duration::from_secs(30)).await;
		cache.acquire(ClusterId(2)).await.unwrap();
		tokio::time::advance(Duration::from_secs(31)).await;

		assert_eq!(cache.evict_idle().await, 1);
		assert!(cache.contains(ClusterId(2)).await);

		tokio::time::advance(Duration::from_secs(61)).await;
		cache.acquire(ClusterId(2)).await.unwrap();
		assert_eq!(factory.connects(), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn least_recently_used_is_evicted_when_full() {
		let factory = Arc::new(CountingFactory::default());
		let cache = make_cache(
			factory.clone(),
			CacheSettings {
				max_entries: 2,
				..settings()
			},
		);

		cache.acquire(ClusterId(1)).await.unwrap();
		tokio::time::advance(Duration::from_secs(1)).await;
		cache.acquire(ClusterId(2)).await.unwrap();
		tokio::time::advance(Duration::from_secs(1)).await;
		cache.acquire(ClusterId(1)).await.unwrap();
		tokio::time::advance(Duration::from_secs(1)).await;
		cache.acquire(ClusterId(3)).await.unwrap();

		assert_eq!(cache.len().await, 2);
		assert!(cache.contains(ClusterId(1)).await);
		assert!(!cache.contains(ClusterId(2)).await);
	}

	#[tokio::test(start_paused = true)]
	async fn eviction_task_stops_on_shutdown() {
		let factory = Arc::new(CountingFactory::default());
		let cache = Arc::new(make_cache(factory, settings()));
		cache.acquire(ClusterId(1)).await.unwrap();

		let shutdown = CancellationToken::new();
		let task = tokio::spawn(run_eviction_task(
			cache.clone(),
			Duration::from_secs(10),
			shutdown.clone(),
		));

		tokio::time::sleep(Duration::from_secs(75)).await;
		assert!(cache.is_empty().await);

		shutdown.cancel();
		task.await.unwrap();
	}

	#[tokio::test]
	async fn finished_build_left_in_flight_is_not_reused() {
		let factory = Arc::new(CountingFactory::default());
		let cache = make_cache(factory.clone(), settings());
		let stale: BuildCell = Arc::new(OnceCell::new_with(Some(Err(
			RbacError::connection_failed(ClusterId(1), "liveness probe failed: blip"),
		))));
		cache.inflight().insert(ClusterId(1), stale);

		let lease = cache.acquire(ClusterId(1)).await;

		assert!(lease.is_ok(), "got {lease:?}");
		assert_eq!(factory.connects(), 1);
		assert!(cache.inflight().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn timed_out_waiter_leaves_no_build_behind() {
		let factory = Arc::new(CountingFactory::with_delay(Duration::from_millis(50)));
		factory.cluster(1).fail_next(transport());
		let cache = make_cache(factory.clone(), settings());

		let (abandoned, failed) = tokio::join!(
			tokio::time::timeout(Duration::from_millis(30), cache.acquire(ClusterId(1))),
			cache.acquire(ClusterId(1)),
		);
		assert!(abandoned.is_err());
		assert!(matches!(failed, Err(RbacError::ConnectionFailed { .. })));
		assert!(cache.inflight().is_empty());

		// The cluster has recovered; the failure must not be replayed.
		cache.acquire(ClusterId(1)).await.unwrap();
		assert!(cache.contains(ClusterId(1)).await);
	}
}
