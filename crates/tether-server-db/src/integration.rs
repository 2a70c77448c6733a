// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::uow::UnitOfWork;

/// Record-level access to the `integrations` table.
#[derive(Clone)]
pub struct IntegrationRepository {
	pool: SqlitePool,
}

impl IntegrationRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, record), fields(kind = %record.kind, name = %record.name))]
	pub async fn create_integration(
		&self,
		record: &NewIntegrationRecord,
	) -> Result<IntegrationRecord, DbError> {
		let metadata_json = serde_json::to_string(&record.metadata)?;
		let now = Utc::now().to_rfc3339();

		let result = sqlx::query(
			r#"
			INSERT INTO integrations (kind, name, status, metadata, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&record.kind)
		.bind(&record.name)
		.bind(&record.status)
		.bind(&metadata_json)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
				DbError::Conflict("Integration with this kind and name already exists".to_string())
			}
			_ => DbError::Sqlx(e),
		})?;

		let id = result.last_insert_rowid();
		self
			.get_integration_by_id(id)
			.await?
			.ok_or_else(|| DbError::Internal("inserted integration row not found".to_string()))
	}

	#[tracing::instrument(skip(self), fields(integration_id = id))]
	pub async fn get_integration_by_id(&self, id: i64) -> Result<Option<IntegrationRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, kind, name, status, metadata, created_at, updated_at
			FROM integrations
			WHERE id = ?
			"#,
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_integration(&r)).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_integrations(&self) -> Result<Vec<IntegrationRecord>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, kind, name, status, metadata, created_at, updated_at
			FROM integrations
			ORDER BY id ASC
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_integration).collect()
	}

	/// Open the transaction the update path runs inside.
	pub async fn begin(&self) -> Result<UnitOfWork, DbError> {
		Ok(UnitOfWork::new(self.pool.begin().await?))
	}

	/// Apply column changes to one integration inside an open transaction.
	///
	/// Absent fields on `changes` leave the column untouched. The write is
	/// not visible outside the transaction until the caller commits.
	#[tracing::instrument(skip(self, uow, changes), fields(integration_id = id))]
	pub async fn update_integration_in_uow(
		&self,
		uow: &mut UnitOfWork,
		id: i64,
		changes: &IntegrationRowChanges,
	) -> Result<IntegrationRecord, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, kind, name, status, metadata, created_at, updated_at
			FROM integrations
			WHERE id = ?
			"#,
		)
		.bind(id)
		.fetch_optional(uow.connection())
		.await?;

		let existing = row
			.map(|r| row_to_integration(&r))
			.transpose()?
			.ok_or_else(|| DbError::NotFound("Integration not found".to_string()))?;

		let name = changes.name.clone().unwrap_or(existing.name);
		let status = changes.status.clone().unwrap_or(existing.status);
		let metadata = changes
			.metadata
			.clone()
			.unwrap_or(existing.metadata);
		let metadata_json = serde_json::to_string(&metadata)?;
		let updated_at = Utc::now();

		sqlx::query(
			r#"
			UPDATE integrations
			SET name = ?, status = ?, metadata = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(&name)
		.bind(&status)
		.bind(&metadata_json)
		.bind(updated_at.to_rfc3339())
		.bind(id)
		.execute(uow.connection())
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
				DbError::Conflict("Integration with this kind and name already exists".to_string())
			}
			_ => DbError::Sqlx(e),
		})?;

		Ok(IntegrationRecord {
			id,
			kind: existing.kind,
			name,
			status,
			metadata,
			created_at: existing.created_at,
			updated_at,
		})
	}

	#[tracing::instrument(skip(self), fields(integration_id = id))]
	pub async fn delete_integration(&self, id: i64) -> Result<(), DbError> {
		let result = sqlx::query(r#"DELETE FROM integrations WHERE id = ?"#)
			.bind(id)
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound("Integration not found".to_string()));
		}

		Ok(())
	}
}

// =========================================================================
// Record Types (plain data structs, no domain logic)
// =========================================================================

#[derive(Debug, Clone)]
pub struct IntegrationRecord {
	pub id: i64,
	pub kind: String,
	pub name: String,
	pub status: String,
	pub metadata: serde_json::Value,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewIntegrationRecord {
	pub kind: String,
	pub name: String,
	pub status: String,
	pub metadata: serde_json::Value,
}

/// Column changes applied by the update path; `None` keeps the column.
#[derive(Debug, Clone, Default)]
pub struct IntegrationRowChanges {
	pub name: Option<String>,
	pub status: Option<String>,
	pub metadata: Option<serde_json::Value>,
}

fn row_to_integration(row: &sqlx::sqlite::SqliteRow) -> Result<IntegrationRecord, DbError> {
	let metadata_str: String = row.get("metadata");
	let created_at_str: String = row.get("created_at");
	let updated_at_str: String = row.get("updated_at");

	Ok(IntegrationRecord {
		id: row.get("id"),
		kind: row.get("kind"),
		name: row.get("name"),
		status: row.get("status"),
		metadata: serde_json::from_str(&metadata_str)?,
		created_at: DateTime::parse_from_rfc3339(&created_at_str)
			.map(|d| d.with_timezone(&Utc))
			.map_err(|e| DbError::Internal(e.to_string()))?,
		updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
			.map(|d| d.with_timezone(&Utc))
			.map_err(|e| DbError::Internal(e.to_string()))?,
	})
}
