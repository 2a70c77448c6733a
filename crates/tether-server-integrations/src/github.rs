// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Lifecycle hooks for github integrations.
//!
//! This is where the opaque metadata bag gets interpreted: repository full
//! name, installation id, access-check bookkeeping. The orchestrator knows
//! none of this.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{AccessCheckError, Result};
use crate::hooks::{HookDecision, HookOutcome, IntegrationContext, IntegrationHooks};
use crate::store::InstallationStore;
use crate::sweep::ensure_installation_connected;
use crate::types::{
	AccessCheckOutcome, GithubMetadata, Integration, IntegrationKind, IntegrationPatch,
	IntegrationStatus, NewIntegration,
};

pub struct GithubHooks;

impl GithubHooks {
	/// Verify the repository named in `meta` is visible to the
	/// installation, mutating status/metadata on the candidate view.
	///
	/// Remote failures degrade the candidate to `needs_repo_access` rather
	/// than blocking creation: the record exists, carries its error, and
	/// the healing sweep re-checks it later.
	async fn verify_repo_access(
		ctx: &IntegrationContext<'_>,
		installation_id: i64,
		repo_full_name: &str,
	) -> (IntegrationStatus, Option<String>) {
		let Some(token) = ctx.api().mint_installation_token(installation_id).await else {
			return (
				IntegrationStatus::NeedsRepoAccess,
				Some("token_exchange_failed".to_string()),
			);
		};

		let Some(repos) = ctx.api().list_repositories(&token).await else {
			return (
				IntegrationStatus::NeedsRepoAccess,
				Some("repo_listing_failed".to_string()),
			);
		};

		if repos.iter().any(|r| r.full_name == repo_full_name) {
			(IntegrationStatus::Active, None)
		} else {
			(
				IntegrationStatus::NeedsRepoAccess,
				Some("repo_not_visible".to_string()),
			)
		}
	}
}

#[async_trait]
impl IntegrationHooks for GithubHooks {
	async fn pre_create(
		&self,
		ctx: &IntegrationContext<'_>,
		candidate: &mut NewIntegration,
	) -> Result<HookDecision> {
		let mut meta = GithubMetadata::from_value(&candidate.metadata);

		let Some(installation_id) = meta.installation_id else {
			// No installation yet: the record waits for the onboarding
			// callback to attach one.
			candidate.status = IntegrationStatus::PendingInstallation;
			return Ok(HookDecision::Proceed);
		};

		// Ownership guard: the installation must already be mirrored in
		// THIS tenant's store. Rejecting here is what keeps tenant A from
		// attaching to tenant B's installation on the shared App.
		ensure_installation_connected(ctx.installations(), installation_id).await?;

		let Some(repo_full_name) = meta.repo_full_name.clone() else {
			warn!(installation_id, "github integration candidate without repository");
			return Ok(HookDecision::Veto);
		};

		let (status, access_error) =
			Self::verify_repo_access(ctx, installation_id, &repo_full_name).await;

		meta.app_id = Some(ctx.api().app_id());
		meta.last_access_check_at = Some(Utc::now());
		meta.access_error = access_error;
		candidate.status = status;
		candidate.metadata = meta.to_value();

		Ok(HookDecision::Proceed)
	}

	async fn post_delete(
		&self,
		ctx: &IntegrationContext<'_>,
		deleted: &Integration,
	) -> HookOutcome {
		let meta = deleted.github_metadata();
		let Some(installation_id) = meta.installation_id else {
			return HookOutcome::Ok;
		};

		// Uninstall remotely only when nothing else references the
		// installation; other integrations may still be using it.
		let remaining = match ctx.service().list_integrations().await {
			Ok(integrations) => integrations,
			Err(e) => {
				return HookOutcome::failed(format!("could not list integrations: {e}"));
			}
		};
		let still_referenced = remaining.iter().any(|i| {
			i.id != deleted.id
				&& i.kind == IntegrationKind::Github
				&& i.github_metadata().installation_id == Some(installation_id)
		});
		if still_referenced {
			debug!(
				installation_id,
				"installation still referenced, keeping it"
			);
			return HookOutcome::Ok;
		}

		if !ctx.api().delete_installation(installation_id).await {
			return HookOutcome::failed(format!(
				"remote uninstall of installation {installation_id} failed"
			));
		}

		match ctx
			.installations()
			.get_by_installation_id(installation_id)
			.await
		{
			Ok(Some(row)) => {
				if let Err(e) = ctx.installations().delete_installation(row.id).await {
					return HookOutcome::failed(format!("could not delete installation row: {e}"));
				}
				info!(installation_id, "installation uninstalled and unmirrored");
			}
			Ok(None) => {}
			Err(e) => {
				return HookOutcome::failed(format!("could not look up installation row: {e}"));
			}
		}

		HookOutcome::Ok
	}

	async fn handle_access_check(
		&self,
		ctx: &IntegrationContext<'_>,
		integration: &Integration,
	) -> std::result::Result<AccessCheckOutcome, AccessCheckError> {
		let mut meta = integration.github_metadata();

		let Some(installation_id) = meta.installation_id else {
			// Nothing to check against; the record is still waiting for an
			// installation.
			return Ok(AccessCheckOutcome {
				has_access: false,
				status: integration.status,
			});
		};

		let Some(repo_full_name) = meta.repo_full_name.clone() else {
			return Err(
				AccessCheckError::new(
					"invalid_metadata",
					"github integration has no repository recorded",
				)
				.with_context(serde_json::json!({"integration_id": integration.id})),
			);
		};

		let Some(token) = ctx.api().mint_installation_token(installation_id).await else {
			return Err(
				AccessCheckError::new("token_exchange_failed", "could not act as this installation")
					.with_context(serde_json::json!({"installation_id": installation_id})),
			);
		};

		let Some(repos) = ctx.api().list_repositories(&token).await else {
			return Err(
				AccessCheckError::new(
					"repo_listing_failed",
					"could not list the installation's repositories",
				)
				.with_context(serde_json::json!({"installation_id": installation_id})),
			);
		};

		let has_access = repos.iter().any(|r| r.full_name == repo_full_name);
		let status = if has_access {
			IntegrationStatus::Active
		} else {
			IntegrationStatus::NeedsRepoAccess
		};

		// Status correction is this hook's job, not the caller's. Write the
		// new status and bookkeeping through the orchestrator so the normal
		// update pipeline applies; a failed write does not invalidate the
		// answer we already have.
		meta.last_access_check_at = Some(Utc::now());
		meta.access_error = if has_access {
			None
		} else {
			Some("repo_not_visible".to_string())
		};
		let changed = status != integration.status || meta != integration.github_metadata();
		if changed {
			let patch = IntegrationPatch {
				status: Some(status),
				metadata: Some(meta.to_value()),
				..Default::default()
			};
			if let Err(e) = ctx.service().update_integration(integration.id, patch).await {
				warn!(
					integration_id = integration.id,
					error = %e,
					"failed to persist access-check result"
				);
			}
		}

		Ok(AccessCheckOutcome { has_access, status })
	}
}
