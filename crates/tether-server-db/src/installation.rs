// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;

/// Record-level access to the `installations` table - the local mirror of
/// remote App installations, one row per granting account.
#[derive(Clone)]
pub struct InstallationRepository {
	pool: SqlitePool,
}

impl InstallationRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, record), fields(name = %record.name, installation_id = record.installation_id))]
	pub async fn create_installation(
		&self,
		record: &NewInstallationRecord,
	) -> Result<InstallationRecord, DbError> {
		let repos_json = serde_json::to_string(&record.repos)?;
		let now = Utc::now().to_rfc3339();

		let result = sqlx::query(
			r#"
			INSERT INTO installations (name, container_type, installation_id, repos, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&record.name)
		.bind(&record.container_type)
		.bind(record.installation_id)
		.bind(&repos_json)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
				DbError::Conflict("Installation already exists".to_string())
			}
			_ => DbError::Sqlx(e),
		})?;

		let id = result.last_insert_rowid();
		self
			.get_installation_by_id(id)
			.await?
			.ok_or_else(|| DbError::Internal("inserted installation row not found".to_string()))
	}

	#[tracing::instrument(skip(self), fields(row_id = id))]
	pub async fn get_installation_by_id(
		&self,
		id: i64,
	) -> Result<Option<InstallationRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, container_type, installation_id, repos, created_at, updated_at
			FROM installations
			WHERE id = ?
			"#,
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_installation(&r)).transpose()
	}

	/// Look up by account login. SQLite `=` on TEXT is case-sensitive, which
	/// is the required matching rule for account names.
	#[tracing::instrument(skip(self), fields(name = %name))]
	pub async fn get_installation_by_name(
		&self,
		name: &str,
	) -> Result<Option<InstallationRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, container_type, installation_id, repos, created_at, updated_at
			FROM installations
			WHERE name = ?
			"#,
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_installation(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(installation_id = installation_id))]
	pub async fn get_installation_by_installation_id(
		&self,
		installation_id: i64,
	) -> Result<Option<InstallationRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, container_type, installation_id, repos, created_at, updated_at
			FROM installations
			WHERE installation_id = ?
			"#,
		)
		.bind(installation_id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_installation(&r)).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_installations(&self) -> Result<Vec<InstallationRecord>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, name, container_type, installation_id, repos, created_at, updated_at
			FROM installations
			ORDER BY name ASC
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_installation).collect()
	}

	/// Overwrite the mutable fields of one installation row.
	///
	/// `name`, row id and `created_at` are identity and never change here;
	/// `repos` is fully replaced, not merged.
	#[tracing::instrument(skip(self, changes), fields(row_id = id))]
	pub async fn update_installation(
		&self,
		id: i64,
		changes: &InstallationRowChanges,
	) -> Result<InstallationRecord, DbError> {
		let repos_json = serde_json::to_string(&changes.repos)?;
		let updated_at = Utc::now().to_rfc3339();

		let result = sqlx::query(
			r#"
			UPDATE installations
			SET container_type = ?, installation_id = ?, repos = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(&changes.container_type)
		.bind(changes.installation_id)
		.bind(&repos_json)
		.bind(&updated_at)
		.bind(id)
		.execute(&self.pool)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
				DbError::Conflict("Installation id already in use".to_string())
			}
			_ => DbError::Sqlx(e),
		})?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound("Installation not found".to_string()));
		}

		self
			.get_installation_by_id(id)
			.await?
			.ok_or_else(|| DbError::Internal("updated installation row not found".to_string()))
	}

	#[tracing::instrument(skip(self), fields(row_id = id))]
	pub async fn delete_installation(&self, id: i64) -> Result<(), DbError> {
		let result = sqlx::query(r#"DELETE FROM installations WHERE id = ?"#)
			.bind(id)
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound("Installation not found".to_string()));
		}

		Ok(())
	}
}

// =========================================================================
// Record Types (plain data structs, no domain logic)
// =========================================================================

#[derive(Debug, Clone)]
pub struct InstallationRecord {
	pub id: i64,
	pub name: String,
	pub container_type: String,
	pub installation_id: i64,
	pub repos: Vec<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInstallationRecord {
	pub name: String,
	pub container_type: String,
	pub installation_id: i64,
	pub repos: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct InstallationRowChanges {
	pub container_type: String,
	pub installation_id: i64,
	pub repos: Vec<String>,
}

fn row_to_installation(row: &sqlx::sqlite::SqliteRow) -> Result<InstallationRecord, DbError> {
	let repos_str: String = row.get("repos");
	let created_at_str: String = row.get("created_at");
	let updated_at_str: String = row.get("updated_at");

	Ok(InstallationRecord {
		id: row.get("id"),
		name: row.get("name"),
		container_type: row.get("container_type"),
		installation_id: row.get("installation_id"),
		repos: serde_json::from_str(&repos_str)?,
		created_at: DateTime::parse_from_rfc3339(&created_at_str)
			.map(|d| d.with_timezone(&Utc))
			.map_err(|e| DbError::Internal(e.to_string()))?,
		updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
			.map(|d| d.with_timezone(&Utc))
			.map_err(|e| DbError::Internal(e.to_string()))?,
	})
}
