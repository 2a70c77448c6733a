// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Installation synchronization.
//!
//! [`sync_all_installations`] refreshes the local installation mirror from
//! the remote App state. It deliberately never creates rows: net-new
//! installations only enter through [`handle_installation_callback`], at
//! the moment a human authorizes one. The sweep refreshing existing rows
//! unattended while onboarding stays explicit is the load-bearing
//! asymmetry of the whole reconciliation design.

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::error::{IntegrationError, Result};
use crate::store::InstallationStore;
use crate::types::{ContainerType, Installation, InstallationChanges, NewInstallation};
use tether_server_github_app::{InstallationApi, RemoteInstallation};

/// Refresh every locally-known installation from remote state.
///
/// Fail-closed on every edge:
/// - no local rows: return empty without a single remote call (a stale
///   token must never mass-install)
/// - remote listing fails: return empty, touch nothing
/// - token mint or repository listing fails for one installation: skip it
/// - no local row for a remote account: skip it (no silent onboarding)
///
/// Installations are processed sequentially to keep rate-limit consumption
/// predictable. Returns the installations actually touched.
#[instrument(skip_all)]
pub async fn sync_all_installations(
	api: &dyn InstallationApi,
	store: &dyn InstallationStore,
) -> Result<Vec<Installation>> {
	let local = store.list_installations().await?;
	if local.is_empty() {
		debug!("no local installations, skipping sync");
		return Ok(Vec::new());
	}

	let Some(remote) = api.list_installations().await else {
		warn!("could not list remote installations, leaving local state untouched");
		return Ok(Vec::new());
	};

	let mut touched = Vec::new();
	for installation in remote {
		let container_type = container_type_for(&installation);

		let Some(token) = api.mint_installation_token(installation.id).await else {
			warn!(
				installation_id = installation.id,
				account = %installation.account.login,
				"could not mint installation token, skipping"
			);
			continue;
		};

		let Some(repos) = api.list_repositories(&token).await else {
			warn!(
				installation_id = installation.id,
				account = %installation.account.login,
				"could not list repositories, skipping"
			);
			continue;
		};

		// Case-sensitive exact match on the account login.
		let Some(existing) = store.get_by_name(&installation.account.login).await? else {
			debug!(
				installation_id = installation.id,
				account = %installation.account.login,
				"no local row for remote installation, skipping"
			);
			continue;
		};

		let repo_names: Vec<String> = repos.into_iter().map(|r| r.full_name).collect();
		let updated = store
			.update_installation(
				existing.id,
				&InstallationChanges {
					container_type,
					installation_id: installation.id,
					repos: repo_names,
				},
			)
			.await?;

		info!(
			installation_id = updated.installation_id,
			account = %updated.name,
			repo_count = updated.repos.len(),
			"installation refreshed"
		);
		touched.push(updated);
	}

	Ok(touched)
}

/// Create or refresh the local row for one remote account.
///
/// Lookup is by account name; a hit updates all mutable fields in place
/// (preserving row identity and `created_at`), a miss creates. Used by
/// both the onboarding callback and the sync pass, with identical
/// semantics from either entry.
#[instrument(skip(store, repo_names), fields(account = %login, installation_id))]
pub async fn upsert_installation_container(
	store: &dyn InstallationStore,
	login: &str,
	container_type: ContainerType,
	installation_id: i64,
	repo_names: Vec<String>,
) -> Result<Installation> {
	match store.get_by_name(login).await? {
		Some(existing) => {
			store
				.update_installation(
					existing.id,
					&InstallationChanges {
						container_type,
						installation_id,
						repos: repo_names,
					},
				)
				.await
		}
		None => {
			store
				.create_installation(&NewInstallation {
					name: login.to_string(),
					container_type,
					installation_id,
					repos: repo_names,
				})
				.await
		}
	}
}

/// Errors from the onboarding path, one tag per step so the human-facing
/// flow can say exactly which step failed.
#[derive(Debug, Error)]
pub enum OnboardingError {
	#[error("failed to list the App's installations")]
	FailedToListInstallations,

	#[error("installation {0} is not part of this App")]
	InstallationNotFound(i64),

	#[error("failed to mint a token for installation {0}")]
	FailedToMintToken(i64),

	#[error("failed to list repositories for installation {0}")]
	FailedToListRepositories(i64),

	#[error("failed to persist the installation: {0}")]
	FailedToPersist(#[from] IntegrationError),
}

impl OnboardingError {
	/// Stable machine-readable tag for the failed step.
	pub fn code(&self) -> &'static str {
		match self {
			OnboardingError::FailedToListInstallations => "failed_to_list_installations",
			OnboardingError::InstallationNotFound(_) => "installation_not_found",
			OnboardingError::FailedToMintToken(_) => "failed_to_mint_token",
			OnboardingError::FailedToListRepositories(_) => "failed_to_list_repositories",
			OnboardingError::FailedToPersist(_) => "failed_to_persist",
		}
	}
}

/// The explicit onboarding path: a human just authorized `installation_id`
/// on the remote side and the callback landed here. This is the ONLY path
/// that creates installation rows.
#[instrument(skip(api, store))]
pub async fn handle_installation_callback(
	api: &dyn InstallationApi,
	store: &dyn InstallationStore,
	installation_id: i64,
) -> std::result::Result<Installation, OnboardingError> {
	let installations = api
		.list_installations()
		.await
		.ok_or(OnboardingError::FailedToListInstallations)?;

	let remote = installations
		.into_iter()
		.find(|i| i.id == installation_id)
		.ok_or(OnboardingError::InstallationNotFound(installation_id))?;

	let token = api
		.mint_installation_token(installation_id)
		.await
		.ok_or(OnboardingError::FailedToMintToken(installation_id))?;

	let repos = api
		.list_repositories(&token)
		.await
		.ok_or(OnboardingError::FailedToListRepositories(installation_id))?;

	let repo_names: Vec<String> = repos.into_iter().map(|r| r.full_name).collect();
	let installation = upsert_installation_container(
		store,
		&remote.account.login,
		container_type_for(&remote),
		installation_id,
		repo_names,
	)
	.await?;

	info!(
		installation_id,
		account = %installation.name,
		"installation onboarded"
	);
	Ok(installation)
}

/// Container kind for a remote installation: the installation's explicit
/// target type wins, the account's own type is the fallback.
fn container_type_for(installation: &RemoteInstallation) -> ContainerType {
	let tag = installation
		.target_type
		.as_deref()
		.or(installation.account.kind.as_deref());
	match tag {
		Some(t) if t.eq_ignore_ascii_case("organization") => ContainerType::Org,
		_ => ContainerType::User,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{FakeInstallationApi, FakeInstallationStore};
	use tether_server_github_app::RemoteAccount;

	fn remote(id: i64, login: &str, target_type: Option<&str>, kind: Option<&str>) -> RemoteInstallation {
		RemoteInstallation {
			id,
			account: RemoteAccount {
				login: login.to_string(),
				kind: kind.map(str::to_string),
			},
			target_type: target_type.map(str::to_string),
		}
	}

	#[test]
	fn container_type_prefers_target_type() {
		assert_eq!(
			container_type_for(&remote(1, "a", Some("Organization"), Some("User"))),
			ContainerType::Org
		);
		assert_eq!(
			container_type_for(&remote(1, "a", Some("User"), Some("Organization"))),
			ContainerType::User
		);
		assert_eq!(
			container_type_for(&remote(1, "a", None, Some("Organization"))),
			ContainerType::Org
		);
		assert_eq!(container_type_for(&remote(1, "a", None, None)), ContainerType::User);
	}

	#[tokio::test]
	async fn fresh_sync_with_no_local_rows_makes_no_remote_calls() {
		let api = FakeInstallationApi::new().with_installation(100, "acme", "Organization");
		let store = FakeInstallationStore::new();

		let touched = sync_all_installations(&api, &store).await.unwrap();

		assert!(touched.is_empty());
		assert_eq!(api.list_installations_calls(), 0);
		assert_eq!(store.create_calls(), 0);
	}

	#[tokio::test]
	async fn failed_remote_listing_touches_nothing() {
		let api = FakeInstallationApi::new().fail_listing();
		let store = FakeInstallationStore::new();
		store.seed("acme", ContainerType::Org, 100, &["acme/old"]);

		let touched = sync_all_installations(&api, &store).await.unwrap();

		assert!(touched.is_empty());
		assert_eq!(store.update_calls(), 0);
		assert_eq!(store.delete_calls(), 0);
	}

	#[tokio::test]
	async fn sync_replaces_repos_in_place() {
		let api = FakeInstallationApi::new()
			.with_installation(100, "acme", "Organization")
			.with_repos(100, &["acme/new"]);
		let store = FakeInstallationStore::new();
		store.seed("acme", ContainerType::Org, 100, &["acme/old"]);

		let touched = sync_all_installations(&api, &store).await.unwrap();

		assert_eq!(touched.len(), 1);
		assert_eq!(touched[0].repos, vec!["acme/new".to_string()]);

		// Fully replaced, not merged.
		let row = store.get_by_name("acme").await.unwrap().unwrap();
		assert_eq!(row.repos, vec!["acme/new".to_string()]);
	}

	#[tokio::test]
	async fn sync_is_idempotent() {
		let api = FakeInstallationApi::new()
			.with_installation(100, "acme", "Organization")
			.with_repos(100, &["acme/site"]);
		let store = FakeInstallationStore::new();
		store.seed("acme", ContainerType::Org, 100, &["acme/site"]);

		let first = sync_all_installations(&api, &store).await.unwrap();
		let second = sync_all_installations(&api, &store).await.unwrap();

		assert_eq!(first.len(), 1);
		assert_eq!(second.len(), 1);
		assert_eq!(first[0].repos, second[0].repos);
		assert_eq!(store.len(), 1);
		assert_eq!(store.create_calls(), 0);
	}

	#[tokio::test]
	async fn sync_never_creates_rows_for_unknown_accounts() {
		let api = FakeInstallationApi::new()
			.with_installation(100, "acme", "Organization")
			.with_repos(100, &["acme/site"])
			.with_installation(200, "newcorp", "Organization")
			.with_repos(200, &["newcorp/app"]);
		let store = FakeInstallationStore::new();
		store.seed("acme", ContainerType::Org, 100, &["acme/site"]);

		let touched = sync_all_installations(&api, &store).await.unwrap();

		assert_eq!(touched.len(), 1);
		assert_eq!(touched[0].name, "acme");
		assert_eq!(store.create_calls(), 0);
		assert!(store.get_by_name("newcorp").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn sync_lookup_is_case_sensitive() {
		let api = FakeInstallationApi::new()
			.with_installation(100, "Acme", "Organization")
			.with_repos(100, &["Acme/site"]);
		let store = FakeInstallationStore::new();
		store.seed("acme", ContainerType::Org, 100, &["acme/old"]);

		let touched = sync_all_installations(&api, &store).await.unwrap();

		// "Acme" != "acme": nothing matches, nothing is touched.
		assert!(touched.is_empty());
		let row = store.get_by_name("acme").await.unwrap().unwrap();
		assert_eq!(row.repos, vec!["acme/old".to_string()]);
	}

	#[tokio::test]
	async fn sync_skips_installation_when_token_mint_fails() {
		let api = FakeInstallationApi::new()
			.with_installation(100, "acme", "Organization")
			.with_repos(100, &["acme/site"])
			.deny_tokens();
		let store = FakeInstallationStore::new();
		store.seed("acme", ContainerType::Org, 100, &["acme/old"]);

		let touched = sync_all_installations(&api, &store).await.unwrap();

		assert!(touched.is_empty());
		let row = store.get_by_name("acme").await.unwrap().unwrap();
		assert_eq!(row.repos, vec!["acme/old".to_string()]);
	}

	#[tokio::test]
	async fn sync_skips_installation_when_repo_listing_fails() {
		// Token mints but the repository listing comes back absent (transient
		// failure or the App was just uninstalled; the sync cannot tell).
		let api = FakeInstallationApi::new().with_installation(100, "acme", "Organization");
		let store = FakeInstallationStore::new();
		store.seed("acme", ContainerType::Org, 100, &["acme/old"]);

		let touched = sync_all_installations(&api, &store).await.unwrap();

		assert!(touched.is_empty());
		let row = store.get_by_name("acme").await.unwrap().unwrap();
		assert_eq!(row.repos, vec!["acme/old".to_string()]);
	}

	#[tokio::test]
	async fn sync_updates_moved_installation_id() {
		// The account reinstalled the App: same login, new installation id.
		let api = FakeInstallationApi::new()
			.with_installation(300, "acme", "Organization")
			.with_repos(300, &["acme/site"]);
		let store = FakeInstallationStore::new();
		store.seed("acme", ContainerType::Org, 100, &["acme/site"]);

		let touched = sync_all_installations(&api, &store).await.unwrap();

		assert_eq!(touched.len(), 1);
		assert_eq!(touched[0].installation_id, 300);
	}

	#[tokio::test]
	async fn upsert_creates_then_updates() {
		let store = FakeInstallationStore::new();

		let created = upsert_installation_container(
			&store,
			"acme",
			ContainerType::Org,
			100,
			vec!["acme/site".to_string()],
		)
		.await
		.unwrap();
		assert_eq!(store.create_calls(), 1);

		let updated = upsert_installation_container(
			&store,
			"acme",
			ContainerType::User,
			200,
			vec!["acme/new".to_string()],
		)
		.await
		.unwrap();

		// Same row, refreshed fields.
		assert_eq!(updated.id, created.id);
		assert_eq!(updated.created_at, created.created_at);
		assert_eq!(updated.installation_id, 200);
		assert_eq!(updated.container_type, ContainerType::User);
		assert_eq!(updated.repos, vec!["acme/new".to_string()]);
		assert_eq!(store.create_calls(), 1);
		assert_eq!(store.len(), 1);
	}

	#[tokio::test]
	async fn callback_onboards_new_installation() {
		let api = FakeInstallationApi::new()
			.with_installation(100, "acme", "Organization")
			.with_repos(100, &["acme/site"]);
		let store = FakeInstallationStore::new();

		let installation = handle_installation_callback(&api, &store, 100)
			.await
			.unwrap();

		assert_eq!(installation.name, "acme");
		assert_eq!(installation.installation_id, 100);
		assert_eq!(installation.container_type, ContainerType::Org);
		assert_eq!(installation.repos, vec!["acme/site".to_string()]);
		assert_eq!(store.create_calls(), 1);
	}

	#[tokio::test]
	async fn callback_reports_which_step_failed() {
		let store = FakeInstallationStore::new();

		let api = FakeInstallationApi::new().fail_listing();
		let err = handle_installation_callback(&api, &store, 100)
			.await
			.unwrap_err();
		assert_eq!(err.code(), "failed_to_list_installations");

		let api = FakeInstallationApi::new().with_installation(100, "acme", "Organization");
		let err = handle_installation_callback(&api, &store, 999)
			.await
			.unwrap_err();
		assert_eq!(err.code(), "installation_not_found");

		let api = FakeInstallationApi::new()
			.with_installation(100, "acme", "Organization")
			.deny_tokens();
		let err = handle_installation_callback(&api, &store, 100)
			.await
			.unwrap_err();
		assert_eq!(err.code(), "failed_to_mint_token");

		let api = FakeInstallationApi::new().with_installation(100, "acme", "Organization");
		let err = handle_installation_callback(&api, &store, 100)
			.await
			.unwrap_err();
		assert_eq!(err.code(), "failed_to_list_repositories");

		assert_eq!(store.create_calls(), 0);
	}
}
