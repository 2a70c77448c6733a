// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

use crate::types::IntegrationKind;

pub type Result<T> = std::result::Result<T, IntegrationError>;

/// Errors surfaced by the integration lifecycle and reconciliation code.
///
/// A hook veto is not an exception: it arrives as [`IntegrationError::Rejected`]
/// with the status code a router would serialize, and is expected,
/// caller-visible behavior.
#[derive(Debug, Error)]
pub enum IntegrationError {
	/// An operation was rejected, either by a lifecycle hook veto or a
	/// guard such as the cross-tenant installation-ownership check.
	#[error("{error}")]
	Rejected { status_code: u16, error: String },

	/// The integration id did not resolve.
	#[error("integration not found")]
	NotFound,

	/// The record's kind has no registered hook implementation.
	#[error("unsupported integration kind: {0}")]
	UnsupportedKind(IntegrationKind),

	/// A hook registration was invalid (unknown kind, duplicate).
	#[error("invalid hook registration: {0}")]
	Registration(String),

	/// A non-binary access-check failure (rate-limited, token exchange
	/// failed, ...). Distinct from `Rejected` so routers can serialize the
	/// `{code, reason, context}` shape.
	#[error(transparent)]
	AccessCheck(#[from] AccessCheckError),

	#[error("database error: {0}")]
	Db(#[from] tether_server_db::DbError),
}

impl IntegrationError {
	/// Shorthand for a rejection with the given HTTP-shaped status code.
	pub fn rejected(status_code: u16, error: impl Into<String>) -> Self {
		Self::Rejected {
			status_code,
			error: error.into(),
		}
	}

	/// The status code a router would serialize this error with.
	pub fn status_code(&self) -> u16 {
		match self {
			IntegrationError::Rejected { status_code, .. } => *status_code,
			IntegrationError::NotFound => 404,
			IntegrationError::UnsupportedKind(_) | IntegrationError::Registration(_) => 400,
			IntegrationError::AccessCheck(_) => 502,
			IntegrationError::Db(_) => 500,
		}
	}
}

/// Descriptor for an access check that failed for reasons other than a
/// clean yes/no answer.
#[derive(Debug, Clone, Error, serde::Serialize)]
#[error("{code}: {reason}")]
pub struct AccessCheckError {
	/// Stable machine-readable tag, e.g. `token_exchange_failed`.
	pub code: String,
	/// Human-readable explanation.
	pub reason: String,
	/// Optional structured detail (installation id, repository name, ...).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub context: Option<serde_json::Value>,
}

impl AccessCheckError {
	pub fn new(code: impl Into<String>, reason: impl Into<String>) -> Self {
		Self {
			code: code.into(),
			reason: reason.into(),
			context: None,
		}
	}

	pub fn with_context(mut self, context: serde_json::Value) -> Self {
		self.context = Some(context);
		self
	}
}
