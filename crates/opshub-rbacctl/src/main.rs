// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Administrative CLI for the OpsHub RBAC core.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use opshub_server_config::OpsHubConfig;
use opshub_server_db::{
	ClusterRepository, CredentialRepository, RoleBindingRepository, UserRepository,
};
use opshub_server_rbac::{
	run_eviction_task, CacheSettings, ClusterClientCache, IdentityMapper, KubeClientFactory,
	OperationContext, RbacEngine,
};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod version;

use commands::EngineCommand;

/// opshub-rbacctl - manage Kubernetes RBAC for platform users across clusters.
#[derive(Parser, Debug)]
#[command(
	name = "opshub-rbacctl",
	about = "Multi-cluster Kubernetes RBAC administration",
	version
)]
struct Args {
	/// Config file to read instead of /etc/opshub/rbac.toml
	#[arg(long, global = true, env = "OPSHUB_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
	/// Apply database migrations
	Migrate,
	#[command(flatten)]
	Engine(EngineCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Command::Version = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => opshub_server_config::load_config_with_file(path.clone())?,
		None => opshub_server_config::load_config()?,
	};

	// Logs go to stderr; stdout carries command output only.
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	let pool = opshub_server_db::create_pool(&config.database.url).await?;
	opshub_server_db::run_migrations(&pool).await?;

	let command = match args.command {
		Command::Migrate => {
			tracing::info!(database = %config.database.url, "migrations applied");
			return Ok(());
		}
		Command::Engine(command) => command,
		Command::Version => return Ok(()),
	};

	let clusters = ClusterRepository::new(pool.clone());
	let engine = build_engine(&config, pool, clusters.clone())?;

	let shutdown = CancellationToken::new();
	let eviction_stop = shutdown.child_token();
	let eviction = spawn_eviction(&engine, &config, eviction_stop.clone());

	let mut ctx = OperationContext::background().with_cancellation(shutdown.clone());
	if let Some(timeout) = config.rbac.operation_timeout() {
		ctx = ctx.with_timeout(timeout);
	}
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			tracing::warn!("interrupted, cancelling operation");
			shutdown.cancel();
		}
	});

	let output = commands::run(command, &engine, &clusters, &ctx).await;

	eviction_stop.cancel();
	if let Err(e) = eviction.await {
		tracing::warn!(error = %e, "eviction task did not stop cleanly");
	}

	println!("{}", serde_json::to_string_pretty(&output?)?);
	Ok(())
}

/// Run idle-client eviction for the engine's cache until `stop` fires.
fn spawn_eviction(
	engine: &RbacEngine,
	config: &OpsHubConfig,
	stop: CancellationToken,
) -> JoinHandle<()> {
	tokio::spawn(run_eviction_task(
		Arc::clone(engine.cache()),
		config.cluster_cache.eviction_interval(),
		stop,
	))
}

fn build_engine(
	config: &OpsHubConfig,
	pool: SqlitePool,
	clusters: ClusterRepository,
) -> anyhow::Result<RbacEngine> {
	let cache = Arc::new(ClusterClientCache::new(
		Arc::new(clusters),
		Arc::new(KubeClientFactory::from_config(&config.cluster_cache)),
		CacheSettings::from(&config.cluster_cache),
	));
	let identity = IdentityMapper::new(config.rbac.service_account_prefix.clone())?;

	Ok(RbacEngine::new(
		cache,
		Arc::new(RoleBindingRepository::new(pool.clone())),
		Arc::new(CredentialRepository::new(pool.clone())),
		Arc::new(UserRepository::new(pool)),
		identity,
		config.rbac.credential_namespace.clone(),
	))
}
