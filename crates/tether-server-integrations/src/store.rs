// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Store traits over the record-level repositories, converting db records
//! to domain types. Reconciliation and lifecycle code only ever sees these
//! narrow contracts.

use async_trait::async_trait;
use tether_server_db::{
	InstallationRecord, InstallationRepository, InstallationRowChanges, IntegrationRecord,
	IntegrationRepository, IntegrationRowChanges, NewInstallationRecord, NewIntegrationRecord,
	UnitOfWork,
};

use crate::error::{IntegrationError, Result};
use crate::types::{
	ContainerType, Installation, InstallationChanges, Integration, IntegrationKind,
	IntegrationPatch, IntegrationStatus, NewInstallation, NewIntegration,
};

/// Persistence contract for integration rows.
///
/// `begin`/`update_in_uow` exist so the orchestrator can make the
/// transactional pre-update hook and the column write atomic; nothing else
/// should open transactions.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
	async fn list(&self) -> Result<Vec<Integration>>;
	async fn get_by_id(&self, id: i64) -> Result<Option<Integration>>;
	async fn insert(&self, candidate: &NewIntegration) -> Result<Integration>;
	async fn begin(&self) -> Result<UnitOfWork>;
	async fn update_in_uow(
		&self,
		uow: &mut UnitOfWork,
		id: i64,
		patch: &IntegrationPatch,
	) -> Result<Integration>;
	async fn delete(&self, id: i64) -> Result<()>;
}

/// Persistence contract for the local installation mirror.
#[async_trait]
pub trait InstallationStore: Send + Sync {
	async fn list_installations(&self) -> Result<Vec<Installation>>;
	async fn get_by_name(&self, name: &str) -> Result<Option<Installation>>;
	async fn get_by_installation_id(&self, installation_id: i64) -> Result<Option<Installation>>;
	async fn create_installation(&self, new: &NewInstallation) -> Result<Installation>;
	async fn update_installation(
		&self,
		id: i64,
		changes: &InstallationChanges,
	) -> Result<Installation>;
	async fn delete_installation(&self, id: i64) -> Result<()>;
}

pub struct SqliteIntegrationStore {
	db: IntegrationRepository,
}

impl SqliteIntegrationStore {
	pub fn new(db: IntegrationRepository) -> Self {
		Self { db }
	}

	fn record_to_integration(record: IntegrationRecord) -> Result<Integration> {
		Ok(Integration {
			id: record.id,
			// Lossy on purpose: an unrecognized tag reads as Unknown instead
			// of making the whole row unreadable.
			kind: IntegrationKind::parse_lossy(&record.kind),
			name: record.name,
			status: record.status.parse::<IntegrationStatus>().map_err(|_| {
				IntegrationError::Db(tether_server_db::DbError::Internal(format!(
					"invalid status: {}",
					record.status
				)))
			})?,
			metadata: record.metadata,
			created_at: record.created_at,
			updated_at: record.updated_at,
		})
	}

	fn candidate_to_record(candidate: &NewIntegration) -> NewIntegrationRecord {
		NewIntegrationRecord {
			kind: candidate.kind.as_str().to_string(),
			name: candidate.name.clone(),
			status: candidate.status.as_str().to_string(),
			metadata: candidate.metadata.clone(),
		}
	}

	fn patch_to_changes(patch: &IntegrationPatch) -> IntegrationRowChanges {
		IntegrationRowChanges {
			name: patch.name.clone(),
			status: patch.status.map(|s| s.as_str().to_string()),
			metadata: patch.metadata.clone(),
		}
	}
}

#[async_trait]
impl IntegrationStore for SqliteIntegrationStore {
	async fn list(&self) -> Result<Vec<Integration>> {
		let records = self.db.list_integrations().await.map_err(db_err)?;
		records
			.into_iter()
			.map(Self::record_to_integration)
			.collect()
	}

	async fn get_by_id(&self, id: i64) -> Result<Option<Integration>> {
		let record = self.db.get_integration_by_id(id).await.map_err(db_err)?;
		record.map(Self::record_to_integration).transpose()
	}

	async fn insert(&self, candidate: &NewIntegration) -> Result<Integration> {
		let record = Self::candidate_to_record(candidate);
		let created = self.db.create_integration(&record).await.map_err(db_err)?;
		Self::record_to_integration(created)
	}

	async fn begin(&self) -> Result<UnitOfWork> {
		self.db.begin().await.map_err(db_err)
	}

	async fn update_in_uow(
		&self,
		uow: &mut UnitOfWork,
		id: i64,
		patch: &IntegrationPatch,
	) -> Result<Integration> {
		let changes = Self::patch_to_changes(patch);
		let updated = self
			.db
			.update_integration_in_uow(uow, id, &changes)
			.await
			.map_err(db_err)?;
		Self::record_to_integration(updated)
	}

	async fn delete(&self, id: i64) -> Result<()> {
		self.db.delete_integration(id).await.map_err(db_err)
	}
}

pub struct SqliteInstallationStore {
	db: InstallationRepository,
}

impl SqliteInstallationStore {
	pub fn new(db: InstallationRepository) -> Self {
		Self { db }
	}

	fn record_to_installation(record: InstallationRecord) -> Result<Installation> {
		Ok(Installation {
			id: record.id,
			name: record.name,
			container_type: record.container_type.parse::<ContainerType>().map_err(|_| {
				IntegrationError::Db(tether_server_db::DbError::Internal(format!(
					"invalid container_type: {}",
					record.container_type
				)))
			})?,
			installation_id: record.installation_id,
			repos: record.repos,
			created_at: record.created_at,
			updated_at: record.updated_at,
		})
	}
}

#[async_trait]
impl InstallationStore for SqliteInstallationStore {
	async fn list_installations(&self) -> Result<Vec<Installation>> {
		let records = self.db.list_installations().await.map_err(db_err)?;
		records
			.into_iter()
			.map(Self::record_to_installation)
			.collect()
	}

	async fn get_by_name(&self, name: &str) -> Result<Option<Installation>> {
		let record = self
			.db
			.get_installation_by_name(name)
			.await
			.map_err(db_err)?;
		record.map(Self::record_to_installation).transpose()
	}

	async fn get_by_installation_id(&self, installation_id: i64) -> Result<Option<Installation>> {
		let record = self
			.db
			.get_installation_by_installation_id(installation_id)
			.await
			.map_err(db_err)?;
		record.map(Self::record_to_installation).transpose()
	}

	async fn create_installation(&self, new: &NewInstallation) -> Result<Installation> {
		let record = NewInstallationRecord {
			name: new.name.clone(),
			container_type: new.container_type.as_str().to_string(),
			installation_id: new.installation_id,
			repos: new.repos.clone(),
		};
		let created = self.db.create_installation(&record).await.map_err(db_err)?;
		Self::record_to_installation(created)
	}

	async fn update_installation(
		&self,
		id: i64,
		changes: &InstallationChanges,
	) -> Result<Installation> {
		let row_changes = InstallationRowChanges {
			container_type: changes.container_type.as_str().to_string(),
			installation_id: changes.installation_id,
			repos: changes.repos.clone(),
		};
		let updated = self
			.db
			.update_installation(id, &row_changes)
			.await
			.map_err(db_err)?;
		Self::record_to_installation(updated)
	}

	async fn delete_installation(&self, id: i64) -> Result<()> {
		self.db.delete_installation(id).await.map_err(db_err)
	}
}

fn db_err(e: tether_server_db::DbError) -> IntegrationError {
	match e {
		tether_server_db::DbError::NotFound(_) => IntegrationError::NotFound,
		tether_server_db::DbError::Conflict(message) => IntegrationError::Rejected {
			status_code: 409,
			error: message,
		},
		other => IntegrationError::Db(other),
	}
}
