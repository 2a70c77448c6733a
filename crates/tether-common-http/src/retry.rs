// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Retry logic with exponential backoff for transient failures.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Classification of whether a failed operation is worth retrying.
///
/// Implemented by error types whose failures can be transient (network
/// errors, timeouts, rate limits, 5xx responses).
pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		if self.is_timeout() || self.is_connect() {
			return true;
		}
		match self.status() {
			Some(status) => status.is_server_error() || status.as_u16() == 429,
			None => false,
		}
	}
}

/// Configuration for [`retry`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
	/// Maximum number of retries after the initial attempt.
	pub max_retries: u32,
	/// Backoff before the first retry.
	pub initial_backoff: Duration,
	/// Upper bound on any single backoff.
	pub max_backoff: Duration,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_retries: 3,
			initial_backoff: Duration::from_millis(500),
			max_backoff: Duration::from_secs(10),
		}
	}
}

impl RetryConfig {
	/// A configuration that never retries.
	pub fn none() -> Self {
		Self {
			max_retries: 0,
			..Self::default()
		}
	}

	/// Backoff for the given retry attempt (0-based), with full jitter.
	fn backoff_for(&self, attempt: u32) -> Duration {
		let exp = self
			.initial_backoff
			.saturating_mul(2u32.saturating_pow(attempt))
			.min(self.max_backoff);
		exp.mul_f64(fastrand::f64())
	}
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// retries are exhausted.
pub async fn retry<T, E, F, Fut>(
	config: &RetryConfig,
	operation_name: &str,
	mut operation: F,
) -> Result<T, E>
where
	E: RetryableError + std::fmt::Display,
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
{
	let mut attempt = 0u32;
	loop {
		match operation().await {
			Ok(value) => return Ok(value),
			Err(e) if e.is_retryable() && attempt < config.max_retries => {
				let backoff = config.backoff_for(attempt);
				debug!(
					operation = operation_name,
					attempt = attempt + 1,
					backoff_ms = backoff.as_millis() as u64,
					error = %e,
					"retrying after transient failure"
				);
				tokio::time::sleep(backoff).await;
				attempt += 1;
			}
			Err(e) => {
				if attempt > 0 {
					warn!(
						operation = operation_name,
						attempts = attempt + 1,
						error = %e,
						"giving up after retries"
					);
				}
				return Err(e);
			}
		}
	}
}
