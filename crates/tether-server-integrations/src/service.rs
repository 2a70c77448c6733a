// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The integration lifecycle orchestrator.
//!
//! All mutation of integration rows goes through [`IntegrationService`],
//! which runs the kind's hooks at fixed points around each operation:
//!
//! - create:  `pre_create` → insert
//! - update:  `pre_update` → begin tx → `pre_update_transactional` → write
//!   → commit → `post_update`
//! - delete:  `pre_delete` → delete → `post_delete`
//! - access:  delegate to `handle_access_check` verbatim
//!
//! Post hooks are best-effort: their failures are logged and swallowed,
//! never rolled back - by the time they run the mutation is already
//! durable.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::error::{IntegrationError, Result};
use crate::hooks::{HookOutcome, HookRegistry, IntegrationContext, IntegrationHooks};
use crate::store::{InstallationStore, IntegrationStore};
use crate::types::{
	AccessCheckOutcome, Integration, IntegrationKind, IntegrationPatch, NewIntegration,
};
use tether_server_github_app::InstallationApi;

pub struct IntegrationService {
	integrations: Arc<dyn IntegrationStore>,
	installations: Arc<dyn InstallationStore>,
	api: Arc<dyn InstallationApi>,
	registry: HookRegistry,
}

impl IntegrationService {
	pub fn new(
		integrations: Arc<dyn IntegrationStore>,
		installations: Arc<dyn InstallationStore>,
		api: Arc<dyn InstallationApi>,
		registry: HookRegistry,
	) -> Self {
		Self {
			integrations,
			installations,
			api,
			registry,
		}
	}

	pub fn installations(&self) -> &dyn InstallationStore {
		self.installations.as_ref()
	}

	pub fn api(&self) -> &dyn InstallationApi {
		self.api.as_ref()
	}

	#[cfg(test)]
	pub(crate) fn integrations_store(&self) -> &dyn IntegrationStore {
		self.integrations.as_ref()
	}

	fn context(&self) -> IntegrationContext<'_> {
		IntegrationContext::new(self)
	}

	fn hooks_for(&self, kind: IntegrationKind) -> Result<&Arc<dyn IntegrationHooks>> {
		self
			.registry
			.get(kind)
			.ok_or(IntegrationError::UnsupportedKind(kind))
	}

	pub async fn list_integrations(&self) -> Result<Vec<Integration>> {
		self.integrations.list().await
	}

	pub async fn get_integration(&self, id: i64) -> Result<Option<Integration>> {
		self.integrations.get_by_id(id).await
	}

	/// Create a new integration.
	///
	/// The kind's `pre_create` hook sees the candidate first and may adjust
	/// its status and metadata; a veto means the store is never touched.
	#[instrument(skip(self, candidate), fields(kind = %candidate.kind, name = %candidate.name))]
	pub async fn create_integration(&self, mut candidate: NewIntegration) -> Result<Integration> {
		let hooks = self.hooks_for(candidate.kind)?;
		let ctx = self.context();

		if hooks.pre_create(&ctx, &mut candidate).await?.is_veto() {
			return Err(IntegrationError::rejected(
				400,
				"integration creation rejected",
			));
		}

		let created = self.integrations.insert(&candidate).await?;
		info!(integration_id = created.id, "integration created");
		Ok(created)
	}

	/// Update an integration.
	///
	/// The non-transactional pre-update hook runs first; only once it
	/// allows the update does a transaction open, inside which the
	/// transactional hook gets its atomic look before the column write.
	/// An error from the transactional hook or the write itself rolls the
	/// transaction back (dropping the unit of work without commit).
	#[instrument(skip(self, patch), fields(integration_id = id))]
	pub async fn update_integration(&self, id: i64, patch: IntegrationPatch) -> Result<Integration> {
		let existing = self
			.integrations
			.get_by_id(id)
			.await?
			.ok_or(IntegrationError::NotFound)?;
		let hooks = self.hooks_for(existing.kind)?;
		let ctx = self.context();

		if hooks.pre_update(&ctx, &existing, &patch).await?.is_veto() {
			return Err(IntegrationError::rejected(
				400,
				"integration update rejected",
			));
		}

		let mut uow = self.integrations.begin().await?;
		if hooks
			.pre_update_transactional(&ctx, &mut uow, &existing, &patch)
			.await?
			.is_veto()
		{
			uow.rollback().await.map_err(IntegrationError::Db)?;
			return Err(IntegrationError::rejected(
				400,
				"integration update rejected",
			));
		}

		let updated = self.integrations.update_in_uow(&mut uow, id, &patch).await?;
		uow.commit().await.map_err(IntegrationError::Db)?;

		if let HookOutcome::Failed(reason) = hooks.post_update(&ctx, &updated).await {
			warn!(integration_id = id, reason = %reason, "post-update hook failed");
		}

		Ok(updated)
	}

	/// Delete an integration.
	#[instrument(skip(self), fields(integration_id = id))]
	pub async fn delete_integration(&self, id: i64) -> Result<Integration> {
		let existing = self
			.integrations
			.get_by_id(id)
			.await?
			.ok_or(IntegrationError::NotFound)?;
		let hooks = self.hooks_for(existing.kind)?;
		let ctx = self.context();

		if hooks.pre_delete(&ctx, &existing).await?.is_veto() {
			return Err(IntegrationError::rejected(
				400,
				"integration deletion rejected",
			));
		}

		self.integrations.delete(id).await?;
		info!(integration_id = id, "integration deleted");

		if let HookOutcome::Failed(reason) = hooks.post_delete(&ctx, &existing).await {
			warn!(integration_id = id, reason = %reason, "post-delete hook failed");
		}

		Ok(existing)
	}

	/// Run the kind's access check and return its result verbatim. The
	/// orchestrator itself mutates nothing here; any status correction is
	/// the hook's own doing.
	#[instrument(skip(self), fields(integration_id = id))]
	pub async fn check_access(&self, id: i64) -> Result<AccessCheckOutcome> {
		let integration = self
			.integrations
			.get_by_id(id)
			.await?
			.ok_or(IntegrationError::NotFound)?;
		let hooks = self.hooks_for(integration.kind)?;
		let ctx = self.context();

		hooks
			.handle_access_check(&ctx, &integration)
			.await
			.map_err(IntegrationError::AccessCheck)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{
		noop_api, service_with_hooks, RecordingHooks, VetoPoint,
	};
	use crate::types::{IntegrationStatus, NewIntegration};
	use std::sync::Arc;

	fn github_candidate(name: &str) -> NewIntegration {
		NewIntegration::new(IntegrationKind::Github, name, serde_json::json!({}))
	}

	#[tokio::test]
	async fn create_runs_pre_create_and_inserts() {
		let hooks = Arc::new(RecordingHooks::new());
		let service = service_with_hooks(hooks.clone(), noop_api()).await;

		let created = service
			.create_integration(github_candidate("docs"))
			.await
			.unwrap();
		assert!(created.id > 0);
		assert_eq!(hooks.calls("pre_create"), 1);
	}

	#[tokio::test]
	async fn create_veto_short_circuits_insert() {
		let hooks = Arc::new(RecordingHooks::new().veto_at(VetoPoint::PreCreate));
		let service = service_with_hooks(hooks.clone(), noop_api()).await;

		let result = service.create_integration(github_candidate("vetoed")).await;
		match result {
			Err(IntegrationError::Rejected { status_code, .. }) => assert_eq!(status_code, 400),
			other => panic!("unexpected result: {other:?}"),
		}

		// The store was never touched.
		assert!(service.list_integrations().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn create_hook_may_mutate_candidate() {
		let hooks = Arc::new(
			RecordingHooks::new().set_status_on_create(IntegrationStatus::PendingInstallation),
		);
		let service = service_with_hooks(hooks, noop_api()).await;

		let created = service
			.create_integration(github_candidate("pending"))
			.await
			.unwrap();
		assert_eq!(created.status, IntegrationStatus::PendingInstallation);
	}

	#[tokio::test]
	async fn unsupported_kind_is_rejected() {
		let hooks = Arc::new(RecordingHooks::new());
		let service = service_with_hooks(hooks, noop_api()).await;

		let result = service
			.create_integration(NewIntegration::new(
				IntegrationKind::StaticFile,
				"nope",
				serde_json::json!({}),
			))
			.await;
		// Only github hooks are registered by service_with_hooks.
		assert!(matches!(
			result,
			Err(IntegrationError::UnsupportedKind(IntegrationKind::StaticFile))
		));
	}

	#[tokio::test]
	async fn update_missing_integration_is_not_found() {
		let hooks = Arc::new(RecordingHooks::new());
		let service = service_with_hooks(hooks, noop_api()).await;

		let result = service
			.update_integration(404, IntegrationPatch::default())
			.await;
		assert!(matches!(result, Err(IntegrationError::NotFound)));
	}

	#[tokio::test]
	async fn update_runs_hooks_in_order_and_commits() {
		let hooks = Arc::new(RecordingHooks::new());
		let service = service_with_hooks(hooks.clone(), noop_api()).await;

		let created = service
			.create_integration(github_candidate("updateme"))
			.await
			.unwrap();

		let updated = service
			.update_integration(
				created.id,
				IntegrationPatch {
					status: Some(IntegrationStatus::Error),
					..Default::default()
				},
			)
			.await
			.unwrap();
		assert_eq!(updated.status, IntegrationStatus::Error);

		assert_eq!(hooks.calls("pre_update"), 1);
		assert_eq!(hooks.calls("pre_update_transactional"), 1);
		assert_eq!(hooks.calls("post_update"), 1);

		let fetched = service.get_integration(created.id).await.unwrap().unwrap();
		assert_eq!(fetched.status, IntegrationStatus::Error);
	}

	#[tokio::test]
	async fn update_veto_outside_transaction_skips_everything() {
		let hooks = Arc::new(RecordingHooks::new().veto_at(VetoPoint::PreUpdate));
		let service = service_with_hooks(hooks.clone(), noop_api()).await;

		let created = service
			.create_integration(github_candidate("keepme"))
			.await
			.unwrap();

		let result = service
			.update_integration(
				created.id,
				IntegrationPatch {
					status: Some(IntegrationStatus::Error),
					..Default::default()
				},
			)
			.await;
		assert!(matches!(result, Err(IntegrationError::Rejected { .. })));

		// The transactional hook never ran; nothing was written.
		assert_eq!(hooks.calls("pre_update_transactional"), 0);
		let fetched = service.get_integration(created.id).await.unwrap().unwrap();
		assert_eq!(fetched.status, IntegrationStatus::Active);
	}

	#[tokio::test]
	async fn transactional_veto_rolls_back() {
		let hooks = Arc::new(RecordingHooks::new().veto_at(VetoPoint::PreUpdateTransactional));
		let service = service_with_hooks(hooks.clone(), noop_api()).await;

		let created = service
			.create_integration(github_candidate("rollback"))
			.await
			.unwrap();

		let result = service
			.update_integration(
				created.id,
				IntegrationPatch {
					status: Some(IntegrationStatus::Error),
					..Default::default()
				},
			)
			.await;
		assert!(matches!(result, Err(IntegrationError::Rejected { .. })));

		// Persisted values are unchanged after the rollback.
		let fetched = service.get_integration(created.id).await.unwrap().unwrap();
		assert_eq!(fetched.status, IntegrationStatus::Active);
		assert_eq!(hooks.calls("post_update"), 0);
	}

	#[tokio::test]
	async fn post_update_failure_does_not_fail_the_update() {
		let hooks = Arc::new(RecordingHooks::new().fail_post_update());
		let service = service_with_hooks(hooks, noop_api()).await;

		let created = service
			.create_integration(github_candidate("besteffort"))
			.await
			.unwrap();

		let updated = service
			.update_integration(
				created.id,
				IntegrationPatch {
					status: Some(IntegrationStatus::NeedsRepoAccess),
					..Default::default()
				},
			)
			.await
			.unwrap();
		assert_eq!(updated.status, IntegrationStatus::NeedsRepoAccess);
	}

	#[tokio::test]
	async fn delete_runs_hooks_and_removes_row() {
		let hooks = Arc::new(RecordingHooks::new());
		let service = service_with_hooks(hooks.clone(), noop_api()).await;

		let created = service
			.create_integration(github_candidate("deleteme"))
			.await
			.unwrap();

		let deleted = service.delete_integration(created.id).await.unwrap();
		assert_eq!(deleted.id, created.id);
		assert_eq!(hooks.calls("pre_delete"), 1);
		assert_eq!(hooks.calls("post_delete"), 1);
		assert!(service.get_integration(created.id).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn delete_veto_keeps_row() {
		let hooks = Arc::new(RecordingHooks::new().veto_at(VetoPoint::PreDelete));
		let service = service_with_hooks(hooks.clone(), noop_api()).await;

		let created = service
			.create_integration(github_candidate("survivor"))
			.await
			.unwrap();

		let result = service.delete_integration(created.id).await;
		assert!(matches!(result, Err(IntegrationError::Rejected { .. })));
		assert!(service.get_integration(created.id).await.unwrap().is_some());
		assert_eq!(hooks.calls("post_delete"), 0);
	}

	#[tokio::test]
	async fn check_access_delegates_verbatim() {
		let hooks = Arc::new(RecordingHooks::new());
		let service = service_with_hooks(hooks.clone(), noop_api()).await;

		let created = service
			.create_integration(github_candidate("checkme"))
			.await
			.unwrap();

		let outcome = service.check_access(created.id).await.unwrap();
		assert!(outcome.has_access);
		assert_eq!(hooks.calls("handle_access_check"), 1);

		// No status mutation by the orchestrator itself.
		let fetched = service.get_integration(created.id).await.unwrap().unwrap();
		assert_eq!(fetched.status, IntegrationStatus::Active);
	}
}
