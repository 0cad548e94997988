// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Per-call cancellation and deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::RbacError;

/// Carries the caller's cancellation signal and deadline into an engine
/// operation.
///
/// When the token fires or the deadline passes, the operation's future is
/// dropped at its current suspension point. Store writes are single
/// statements, so a dropped bind leaves either no row or a committed one.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
	cancellation: CancellationToken,
	deadline: Option<Instant>,
}

impl OperationContext {
	/// No deadline and a token nobody else holds.
	pub fn background() -> Self {
		Self::default()
	}

	/// Tie the context to an externally owned token.
	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.cancellation = token;
		self
	}

	/// Tighten the deadline to at most `timeout` from now.
	pub fn with_timeout(self, timeout: Duration) -> Self {
		self.with_deadline(Instant::now() + timeout)
	}

	pub fn with_deadline(mut self, deadline: Instant) -> Self {
		self.deadline = Some(match self.deadline {
			Some(existing) => existing.min(deadline),
			None => deadline,
		});
		self
	}

	pub fn cancellation_token(&self) -> &CancellationToken {
		&self.cancellation
	}

	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancellation.is_cancelled()
	}

	/// Drive `fut` to completion unless the context is cancelled or expires
	/// first. Cancellation wins a tie with completion.
	pub async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T, RbacError>
	where
		F: Future<Output = Result<T, RbacError>>,
	{
		if self.cancellation.is_cancelled() {
			return Err(RbacError::Cancelled { operation });
		}

		let bounded = async {
			match self.deadline {
				Some(deadline) => tokio::time::timeout_at(deadline, fut)
					.await
					.map_err(|_| RbacError::DeadlineExceeded { operation })?,
				None => fut.await,
			}
		};

		tokio::select! {
			biased;
			_ = self.cancellation.cancelled() => {
				tracing::debug!(operation, "operation cancelled");
				Err(RbacError::Cancelled { operation })
			}
			result = bounded => result,
		}
	}
}
