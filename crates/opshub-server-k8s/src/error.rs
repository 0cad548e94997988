// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

/// Result type alias for K8s operations.
pub type K8sResult<T> = Result<T, K8sError>;

/// Errors that can occur during K8s operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum K8sError {
	#[error("K8s API error ({code}): {message}")]
	ApiError { code: u16, message: String },

	#[error("{kind} not found: {name}")]
	NotFound { kind: &'static str, name: String },

	#[error("K8s transport error: {message}")]
	Transport { message: String },

	#[error("Operation timed out")]
	Timeout,

	#[error("Invalid cluster configuration: {message}")]
	Config { message: String },

	/// The request could not be built or the response could not be read.
	/// The server was reached, so the connection is not at fault.
	#[error("Malformed K8s request or response: {message}")]
	Malformed { message: String },
}

impl K8sError {
	/// Whether this error suggests the connection itself is broken, as opposed
	/// to a healthy API server answering with an error status.
	///
	/// 401 is included: a revoked or rotated credential looks exactly like a
	/// broken connection from the cache's point of view.
	pub fn is_connection_failure(&self) -> bool {
		match self {
			K8sError::Transport { .. } | K8sError::Timeout => true,
			K8sError::ApiError { code, .. } => *code == 401,
			K8sError::NotFound { .. } | K8sError::Config { .. } | K8sError::Malformed { .. } => false,
		}
	}
}

impl From<kube::Error> for K8sError {
	fn from(err: kube::Error) -> Self {
		match err {
			kube::Error::Api(response) => K8sError::ApiError {
				code: response.code,
				message: response.message,
			},
			kube::Error::Service(source) if timed_out(source.as_ref()) => K8sError::Timeout,
			kube::Error::HyperError(_)
			| kube::Error::Service(_)
			| kube::Error::ReadEvents(_)
			| kube::Error::Auth(_) => {
				if timed_out(&err) {
					K8sError::Timeout
				} else {
					K8sError::Transport {
						message: err.to_string(),
					}
				}
			}
			other => K8sError::Malformed {
				message: other.to_string(),
			},
		}
	}
}

fn timed_out(err: &(dyn StdError + 'static)) -> bool {
	let mut current = Some(err);
	while let Some(e) = current {
		if e
			.downcast_ref::<io::Error>()
			.is_some_and(|io| io.kind() == io::ErrorKind::TimedOut)
		{
			return true;
		}
		current = e.source();
	}
	false
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transport_and_timeout_are_connection_failures() {
		assert!(K8sError::Transport {
			message: "connection refused".to_string()
		}
		.is_connection_failure());
		assert!(K8sError::Timeout.is_connection_failure());
	}

	#[test]
	fn unauthorized_is_a_connection_failure() {
		let err = K8sError::ApiError {
			code: 401,
			message: "Unauthorized".to_string(),
		};
		assert!(err.is_connection_failure());
	}

	#[test]
	fn api_status_errors_are_not_connection_failures() {
		for code in [403, 404, 409, 422] {
			let err = K8sError::ApiError {
				code,
				message: "denied".to_string(),
			};
			assert!(!err.is_connection_failure(), "code {code}");
		}
		assert!(!K8sError::NotFound {
			kind: "Role",
			name: "viewer".to_string()
		}
		.is_connection_failure());
	}

	#[test]
	fn kube_api_error_keeps_server_message() {
		let kube_err = kube::Error::Api(kube::error::ErrorResponse {
			status: "Failure".to_string(),
			message: "clusterroles.rbac.authorization.k8s.io \"x\" is forbidden".to_string(),
			reason: "Forbidden".to_string(),
			code: 403,
		});
		let err = K8sError::from(kube_err);
		assert_eq!(
			err,
			K8sError::ApiError {
				code: 403,
				message: "clusterroles.rbac.authorization.k8s.io \"x\" is forbidden".to_string(),
			}
		);
	}

	#[test]
	fn undecodable_response_is_not_a_connection_failure() {
		let decode = serde_json::from_str::<i32>("not json").unwrap_err();
		let err = K8sError::from(kube::Error::SerdeError(decode));
		assert!(matches!(err, K8sError::Malformed { .. }), "got {err:?}");
		assert!(!err.is_connection_failure());
	}

	#[test]
	fn service_timeout_maps_to_timeout() {
		let io_err = io::Error::new(io::ErrorKind::TimedOut, "deadline has elapsed");
		let err = K8sError::from(kube::Error::Service(Box::new(io_err)));
		assert_eq!(err, K8sError::Timeout);
		assert!(err.is_connection_failure());
	}

	#[test]
	fn refused_connection_maps_to_transport() {
		let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
		let err = K8sError::from(kube::Error::Service(Box::new(io_err)));
		assert!(matches!(err, K8sError::Transport { .. }), "got {err:?}");
		assert!(err.is_connection_failure());
	}
}
