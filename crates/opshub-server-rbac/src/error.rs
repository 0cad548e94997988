// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use opshub_server_db::{ClusterId, DbError};
use opshub_server_k8s::K8sError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RbacError>;

/// Errors returned by RBAC engine operations.
///
/// Every variant carries enough context (cluster, operation) to diagnose a
/// failure without retrying. The error is `Clone` so that one failed client
/// build can be handed to every caller that waited on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RbacError {
	#[error("cluster {cluster_id} is unreachable: {message}")]
	ConnectionFailed { cluster_id: ClusterId, message: String },

	#[error("{operation} failed on cluster {cluster_id}: {message}")]
	ClusterApi {
		cluster_id: ClusterId,
		operation: &'static str,
		code: Option<u16>,
		message: String,
	},

	#[error("role {role} is already bound to user {user_id} in cluster {cluster_id}")]
	AlreadyBound {
		cluster_id: ClusterId,
		user_id: i64,
		role: String,
	},

	#[error("role {role} is not bound to user {user_id} in cluster {cluster_id}")]
	NotBound {
		cluster_id: ClusterId,
		user_id: i64,
		role: String,
	},

	#[error("invalid role descriptor: {0}")]
	InvalidRoleDescriptor(String),

	#[error("storage error during {operation}: {message}")]
	Storage {
		operation: &'static str,
		message: String,
	},

	#[error("{operation} was cancelled")]
	Cancelled { operation: &'static str },

	#[error("{operation} exceeded its deadline")]
	DeadlineExceeded { operation: &'static str },

	#[error("invalid configuration: {0}")]
	InvalidConfig(String),
}

impl RbacError {
	pub(crate) fn cluster_api(cluster_id: ClusterId, operation: &'static str, err: K8sError) -> Self {
		let code = match &err {
			K8sError::ApiError { code, .. } => Some(*code),
			K8sError::NotFound { .. } => Some(404),
			_ => None,
		};
		let message = match err {
			K8sError::ApiError { message, .. } => message,
			other => other.to_string(),
		};
		RbacError::ClusterApi {
			cluster_id,
			operation,
			code,
			message,
		}
	}

	pub(crate) fn connection_failed(cluster_id: ClusterId, message: impl Into<String>) -> Self {
		RbacError::ConnectionFailed {
			cluster_id,
			message: message.into(),
		}
	}

	pub(crate) fn storage(operation: &'static str, err: DbError) -> Self {
		RbacError::Storage {
			operation,
			message: err.to_string(),
		}
	}

	/// Expected outcomes of a well-formed request, as opposed to failures.
	pub fn is_user_facing(&self) -> bool {
		matches!(
			self,
			RbacError::AlreadyBound { .. }
				| RbacError::NotBound { .. }
				| RbacError::InvalidRoleDescriptor(_)
		)
	}

	/// Whether the cluster reported the object as missing.
	pub fn is_not_found(&self) -> bool {
		matches!(self, RbacError::ClusterApi { code: Some(404), .. })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn api_errors_keep_server_message_verbatim() {
		let err = RbacError::cluster_api(
			ClusterId(3),
			"deleteRole",
			K8sError::ApiError {
				code: 403,
				message: "roles.rbac.authorization.k8s.io \"x\" is forbidden".to_string(),
			},
		);
		match &err {
			RbacError::ClusterApi { code, message, .. } => {
				assert_eq!(*code, Some(403));
				assert_eq!(message, "roles.rbac.authorization.k8s.io \"x\" is forbidden");
			}
			other => panic!("unexpected {other:?}"),
		}
		assert!(err.to_string().contains("deleteRole failed on cluster 3"));
	}

	#[test]
	fn not_found_is_flagged() {
		let err = RbacError::cluster_api(
			ClusterId(1),
			"getRole",
			K8sError::NotFound {
				kind: "Role",
				name: "ghost".to_string(),
			},
		);
		assert!(err.is_not_found());
		assert!(!err.is_user_facing());
	}

	#[test]
	fn binding_outcomes_are_user_facing() {
		let bound = RbacError::AlreadyBound {
			cluster_id: ClusterId(1),
			user_id: 2,
			role: "view".to_string(),
		};
		assert!(bound.is_user_facing());
		assert!(RbacError::InvalidRoleDescriptor("x".into()).is_user_facing());
		assert!(!RbacError::connection_failed(ClusterId(1), "refused").is_user_facing());
		assert!(!RbacError::storage("bindUserRole", DbError::Internal("disk".into())).is_user_facing());
	}
}
