// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Engine subcommands. Each prints its result to stdout as JSON.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Subcommand, ValueEnum};
use opshub_common_secret::SecretString;
use opshub_server_db::{ClusterId, ClusterRepository, NewRoleBinding, RoleType, UserId};
use opshub_server_rbac::{OperationContext, RbacEngine};
use serde_json::Value;

#[derive(Subcommand, Debug)]
pub enum EngineCommand {
	/// Store (or replace) a cluster's kubeconfig
	RegisterCluster {
		name: String,
		/// Path to the kubeconfig document
		#[arg(long)]
		kubeconfig: PathBuf,
		#[arg(long)]
		endpoint: Option<String>,
	},
	/// List ClusterRoles in a cluster
	ClusterRoles { cluster: i64 },
	/// List namespaces with phase and pod count
	Namespaces { cluster: i64 },
	/// List Roles in one namespace
	NamespaceRoles { cluster: i64, namespace: String },
	/// Show a role; omit --namespace for a ClusterRole
	GetRole {
		cluster: i64,
		name: String,
		#[arg(long)]
		namespace: Option<String>,
	},
	/// Delete a role from the cluster; omit --namespace for a ClusterRole
	DeleteRole {
		cluster: i64,
		name: String,
		#[arg(long)]
		namespace: Option<String>,
	},
	/// Record that a user should hold a role
	Bind {
		cluster: i64,
		user: i64,
		role: String,
		#[arg(long, value_enum)]
		role_type: RoleTypeArg,
		#[arg(long, default_value = "")]
		namespace: String,
		/// Platform user recorded as the author of the binding
		#[arg(long)]
		bound_by: i64,
	},
	/// Remove a recorded binding
	Unbind {
		cluster: i64,
		user: i64,
		role: String,
		#[arg(long, default_value = "")]
		namespace: String,
	},
	/// List users bound to a role
	RoleUsers {
		cluster: i64,
		role: String,
		#[arg(long, default_value = "")]
		namespace: String,
	},
	/// List a user's bindings in a cluster
	UserRoles { cluster: i64, user: i64 },
	/// List every binding in a cluster
	Bindings { cluster: i64 },
	/// List platform users that have a service account in the cluster
	CredentialUsers {
		cluster: i64,
		/// Platform user making the request
		#[arg(long, default_value_t = 0)]
		caller: i64,
	},
	/// Search bindable platform users
	AvailableUsers {
		#[arg(long)]
		keyword: Option<String>,
		#[arg(long, default_value_t = 1)]
		page: u32,
		#[arg(long, default_value_t = 20)]
		page_size: u32,
	},
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum RoleTypeArg {
	#[value(name = "ClusterRole")]
	ClusterRole,
	#[value(name = "Role")]
	Role,
}

impl From<RoleTypeArg> for RoleType {
	fn from(arg: RoleTypeArg) -> Self {
		match arg {
			RoleTypeArg::ClusterRole => RoleType::ClusterRole,
			RoleTypeArg::Role => RoleType::Role,
		}
	}
}

pub async fn run(
	command: EngineCommand,
	engine: &RbacEngine,
	clusters: &ClusterRepository,
	ctx: &OperationContext,
) -> anyhow::Result<Value> {
	let value = match command {
		EngineCommand::RegisterCluster {
			name,
			kubeconfig,
			endpoint,
		} => {
			let document = tokio::fs::read_to_string(&kubeconfig)
				.await
				.with_context(|| format!("reading {}", kubeconfig.display()))?;
			let cluster = clusters
				.register_cluster(&name, endpoint.as_deref(), &SecretString::new(document))
				.await?;
			engine.cluster_credentials_changed(cluster.id).await;
			serde_json::to_value(cluster)?
		}
		EngineCommand::ClusterRoles { cluster } => {
			serde_json::to_value(engine.list_cluster_roles(ctx, ClusterId(cluster)).await?)?
		}
		EngineCommand::Namespaces { cluster } => {
			serde_json::to_value(engine.list_namespaces(ctx, ClusterId(cluster)).await?)?
		}
		EngineCommand::NamespaceRoles { cluster, namespace } => serde_json::to_value(
			engine
				.list_namespace_roles(ctx, ClusterId(cluster), &namespace)
				.await?,
		)?,
		EngineCommand::GetRole {
			cluster,
			name,
			namespace,
		} => serde_json::to_value(
			engine
				.get_role(ctx, ClusterId(cluster), namespace.as_deref(), &name)
				.await?,
		)?,
		EngineCommand::DeleteRole {
			cluster,
			name,
			namespace,
		} => {
			engine
				.delete_role(ctx, ClusterId(cluster), namespace.as_deref(), &name)
				.await?;
			serde_json::json!({ "deleted": name })
		}
		EngineCommand::Bind {
			cluster,
			user,
			role,
			role_type,
			namespace,
			bound_by,
		} => {
			let binding = NewRoleBinding {
				cluster_id: ClusterId(cluster),
				user_id: UserId(user),
				role_name: role,
				role_namespace: namespace,
				role_type: role_type.into(),
				bound_by: UserId(bound_by),
			};
			serde_json::to_value(engine.bind_user_role(ctx, binding).await?)?
		}
		EngineCommand::Unbind {
			cluster,
			user,
			role,
			namespace,
		} => {
			engine
				.unbind_user_role(ctx, ClusterId(cluster), UserId(user), &role, &namespace)
				.await?;
			serde_json::json!({ "unbound": role, "namespace": namespace })
		}
		EngineCommand::RoleUsers {
			cluster,
			role,
			namespace,
		} => serde_json::to_value(
			engine
				.list_role_bound_users(ctx, ClusterId(cluster), &role, &namespace)
				.await?,
		)?,
		EngineCommand::UserRoles { cluster, user } => serde_json::to_value(
			engine
				.list_user_roles_in_cluster(ctx, ClusterId(cluster), UserId(user))
				.await?,
		)?,
		EngineCommand::Bindings { cluster } => {
			serde_json::to_value(engine.list_cluster_bindings(ctx, ClusterId(cluster)).await?)?
		}
		EngineCommand::CredentialUsers { cluster, caller } => serde_json::to_value(
			engine
				.list_cluster_credential_users(ctx, ClusterId(cluster), UserId(caller))
				.await?,
		)?,
		EngineCommand::AvailableUsers {
			keyword,
			page,
			page_size,
		} => serde_json::to_value(
			engine
				.list_available_users(ctx, keyword.as_deref(), page, page_size)
				.await?,
		)?,
	};
	Ok(value)
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::Parser;

	#[derive(Parser)]
	struct Cli {
		#[command(subcommand)]
		command: EngineCommand,
	}

	#[test]
	fn bind_parses_role_type_and_namespace() {
		let cli = Cli::try_parse_from([
			"rbacctl",
			"bind",
			"1",
			"7",
			"editor",
			"--role-type",
			"Role",
			"--namespace",
			"dev",
			"--bound-by",
			"2",
		])
		.unwrap();
		match cli.command {
			EngineCommand::Bind {
				role_type,
				namespace,
				..
			} => {
				assert!(matches!(RoleType::from(role_type), RoleType::Role));
				assert_eq!(namespace, "dev");
			}
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn get_role_namespace_is_optional() {
		let cli = Cli::try_parse_from(["rbacctl", "get-role", "1", "view"]).unwrap();
		assert!(matches!(
			cli.command,
			EngineCommand::GetRole {
				namespace: None,
				..
			}
		));
	}

	#[test]
	fn available_users_defaults_to_first_page() {
		let cli = Cli::try_parse_from(["rbacctl", "available-users"]).unwrap();
		assert!(matches!(
			cli.command,
			EngineCommand::AvailableUsers {
				page: 1,
				page_size: 20,
				keyword: None
			}
		));
	}
}
