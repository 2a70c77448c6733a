// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of integration kinds. The kind decides which lifecycle hooks
/// apply to a record.
///
/// `Unknown` exists so a row with an unrecognized tag can still be read
/// (and eventually swept); it can never be registered with hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationKind {
	Github,
	StaticFile,
	Unknown,
}

impl IntegrationKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			IntegrationKind::Github => "github",
			IntegrationKind::StaticFile => "static_file",
			IntegrationKind::Unknown => "unknown",
		}
	}

	/// Parse a stored tag, falling back to `Unknown` for anything
	/// unrecognized so reads stay total.
	pub fn parse_lossy(s: &str) -> Self {
		s.parse().unwrap_or(IntegrationKind::Unknown)
	}
}

impl std::str::FromStr for IntegrationKind {
	type Err = ();
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"github" => Ok(IntegrationKind::Github),
			"static_file" => Ok(IntegrationKind::StaticFile),
			"unknown" => Ok(IntegrationKind::Unknown),
			_ => Err(()),
		}
	}
}

impl std::fmt::Display for IntegrationKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Lifecycle status of an integration. Transitions are driven by hooks and
/// the healing sweep, never by the orchestrator directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
	Active,
	NeedsRepoAccess,
	Error,
	PendingInstallation,
}

impl IntegrationStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			IntegrationStatus::Active => "active",
			IntegrationStatus::NeedsRepoAccess => "needs_repo_access",
			IntegrationStatus::Error => "error",
			IntegrationStatus::PendingInstallation => "pending_installation",
		}
	}
}

impl std::str::FromStr for IntegrationStatus {
	type Err = ();
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"active" => Ok(IntegrationStatus::Active),
			"needs_repo_access" => Ok(IntegrationStatus::NeedsRepoAccess),
			"error" => Ok(IntegrationStatus::Error),
			"pending_installation" => Ok(IntegrationStatus::PendingInstallation),
			_ => Err(()),
		}
	}
}

/// Whether an installation's granting account is an organization or a
/// user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
	Org,
	User,
}

impl ContainerType {
	pub fn as_str(&self) -> &'static str {
		match self {
			ContainerType::Org => "org",
			ContainerType::User => "user",
		}
	}
}

impl std::str::FromStr for ContainerType {
	type Err = ();
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"org" => Ok(ContainerType::Org),
			"user" => Ok(ContainerType::User),
			_ => Err(()),
		}
	}
}

/// A workspace's connection to one external resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
	pub id: i64,
	pub kind: IntegrationKind,
	pub name: String,
	pub status: IntegrationStatus,
	/// Opaque per-kind bag. The orchestrator never interprets it; only the
	/// kind's own hooks do.
	pub metadata: serde_json::Value,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Integration {
	/// Typed view over the metadata bag for github integrations.
	pub fn github_metadata(&self) -> GithubMetadata {
		GithubMetadata::from_value(&self.metadata)
	}

	/// Whether the metadata carries a recorded access error, independent of
	/// kind. The healing sweep keys on this.
	pub fn has_access_error(&self) -> bool {
		self
			.metadata
			.get("access_error")
			.map(|v| !v.is_null())
			.unwrap_or(false)
	}
}

/// Candidate for a new integration row. `pre_create` hooks may adjust
/// `status` and `metadata` before insertion.
#[derive(Debug, Clone)]
pub struct NewIntegration {
	pub kind: IntegrationKind,
	pub name: String,
	pub status: IntegrationStatus,
	pub metadata: serde_json::Value,
}

impl NewIntegration {
	pub fn new(kind: IntegrationKind, name: impl Into<String>, metadata: serde_json::Value) -> Self {
		Self {
			kind,
			name: name.into(),
			status: IntegrationStatus::Active,
			metadata,
		}
	}
}

/// Field changes for an integration update; `None` keeps the field.
#[derive(Debug, Clone, Default)]
pub struct IntegrationPatch {
	pub name: Option<String>,
	pub status: Option<IntegrationStatus>,
	pub metadata: Option<serde_json::Value>,
}

/// Outcome of a kind's access check: a clean yes/no plus the status the
/// integration should carry.
#[derive(Debug, Clone, Serialize)]
pub struct AccessCheckOutcome {
	pub has_access: bool,
	pub status: IntegrationStatus,
}

/// Local mirror of one remote App installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installation {
	pub id: i64,
	/// Account login of the granting organization or user. Unique.
	pub name: String,
	pub container_type: ContainerType,
	/// Remote-assigned installation id, stable across syncs. Unique.
	pub installation_id: i64,
	/// Cached repository full names. Fully replaced on every sync.
	pub repos: Vec<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Fields for a new installation row.
#[derive(Debug, Clone)]
pub struct NewInstallation {
	pub name: String,
	pub container_type: ContainerType,
	pub installation_id: i64,
	pub repos: Vec<String>,
}

/// The mutable fields an installation refresh overwrites.
#[derive(Debug, Clone)]
pub struct InstallationChanges {
	pub container_type: ContainerType,
	pub installation_id: i64,
	pub repos: Vec<String>,
}

/// Typed view over a github integration's metadata bag.
///
/// Lenient on purpose: unknown fields are preserved nowhere, absent fields
/// are `None`, and [`GithubMetadata::from_value`] never fails - a corrupt
/// bag reads as empty, which downstream code treats as "nothing known".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GithubMetadata {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub repo_full_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub branch: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub app_id: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub installation_id: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_access_check_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub access_error: Option<String>,
}

impl GithubMetadata {
	pub fn from_value(value: &serde_json::Value) -> Self {
		serde_json::from_value(value.clone()).unwrap_or_default()
	}

	pub fn to_value(&self) -> serde_json::Value {
		serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
	}
}
