// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Orphan cleanup and access healing.
//!
//! Both passes are idempotent and safe to run on any schedule. Per-record
//! failures are logged and skipped; a failure to list state aborts the
//! whole invocation, so no deletion ever runs against partial data.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{IntegrationError, Result};
use crate::service::IntegrationService;
use crate::store::InstallationStore;
use crate::sync::sync_all_installations;
use crate::types::{Installation, Integration, IntegrationKind, IntegrationStatus};

/// Delete github integrations whose backing installation is gone.
///
/// An integration is orphaned when:
/// - its metadata names an `installation_id` absent from the local
///   installation set, or
/// - it has no `installation_id` at all and sits in `needs_repo_access` or
///   `error` - a failed onboarding attempt with nothing to anchor it.
///
/// A record with no installation id in `pending_installation` is awaiting
/// a human and is never touched; one in `active` may be a legitimate
/// legacy record and is also kept.
///
/// Deletion goes through the orchestrator, so pre/post-delete hooks still
/// run. Returns the number deleted.
#[instrument(skip_all)]
pub async fn cleanup_orphaned_github_integrations(
	service: &IntegrationService,
	installations: &[Installation],
	integrations: &[Integration],
) -> u64 {
	let valid: HashSet<i64> = installations.iter().map(|i| i.installation_id).collect();

	let mut deleted = 0u64;
	for integration in integrations {
		if integration.kind != IntegrationKind::Github {
			continue;
		}

		let orphaned = match integration.github_metadata().installation_id {
			Some(installation_id) => !valid.contains(&installation_id),
			None => matches!(
				integration.status,
				IntegrationStatus::NeedsRepoAccess | IntegrationStatus::Error
			),
		};
		if !orphaned {
			continue;
		}

		match service.delete_integration(integration.id).await {
			Ok(_) => {
				info!(
					integration_id = integration.id,
					name = %integration.name,
					"deleted orphaned integration"
				);
				deleted += 1;
			}
			Err(e) => {
				warn!(
					integration_id = integration.id,
					error = %e,
					"failed to delete orphaned integration"
				);
			}
		}
	}

	deleted
}

/// Re-check every integration carrying a recorded access error.
///
/// Counts the ones that now report access. Status correction belongs to
/// the kind's access-check hook; this pass only asks the question. A
/// failing check is logged per record and simply does not count as healed.
#[instrument(skip_all)]
pub async fn heal_broken_integrations(
	service: &IntegrationService,
	integrations: &[Integration],
) -> u64 {
	let mut healed = 0u64;
	for integration in integrations {
		if !integration.has_access_error() {
			continue;
		}

		match service.check_access(integration.id).await {
			Ok(outcome) if outcome.has_access => {
				info!(
					integration_id = integration.id,
					name = %integration.name,
					"integration healed"
				);
				healed += 1;
			}
			Ok(_) => {
				debug!(integration_id = integration.id, "still no access");
			}
			Err(e) => {
				warn!(
					integration_id = integration.id,
					error = %e,
					"access re-check failed"
				);
			}
		}
	}

	healed
}

/// Cross-tenant ownership guard.
///
/// A repository-enable operation for installation X is only allowed when
/// THIS tenant's store already mirrors X (via onboarding or its own
/// sweep). Without this check, any tenant could attach to any other
/// tenant's installation purely because both share the underlying App.
pub async fn ensure_installation_connected(
	store: &dyn InstallationStore,
	installation_id: i64,
) -> Result<Installation> {
	store
		.get_by_installation_id(installation_id)
		.await?
		.ok_or_else(|| {
			IntegrationError::rejected(
				403,
				"this installation is not connected to your organization",
			)
		})
}

/// Counts reported by one reconciliation sweep.
///
/// The sweep is best-effort by design: per-record failures are absorbed
/// and the caller gets counts of what actually happened, not an
/// all-or-nothing verdict.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
	pub synced: u64,
	pub deleted_integrations: u64,
	pub healed_count: u64,
}

/// One full reconciliation cycle: refresh installations, delete orphans,
/// heal what recovered.
///
/// Errors only when listing state fails - that aborts the invocation
/// rather than risking decisions on partial data.
#[instrument(skip_all)]
pub async fn run_reconciliation_sweep(service: &IntegrationService) -> Result<SweepReport> {
	let touched = sync_all_installations(service.api(), service.installations()).await?;

	let installations = service.installations().list_installations().await?;
	let integrations = service.list_integrations().await?;
	let deleted = cleanup_orphaned_github_integrations(service, &installations, &integrations).await;

	// Re-list so the healing pass never re-checks a record the orphan pass
	// just removed.
	let integrations = service.list_integrations().await?;
	let healed = heal_broken_integrations(service, &integrations).await;

	let report = SweepReport {
		synced: touched.len() as u64,
		deleted_integrations: deleted,
		healed_count: healed,
	};
	info!(
		synced = report.synced,
		deleted = report.deleted_integrations,
		healed = report.healed_count,
		"reconciliation sweep finished"
	);
	Ok(report)
}
