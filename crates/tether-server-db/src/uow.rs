// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::error::DbError;

/// An open database transaction handed to code that is allowed to write
/// inside it.
///
/// Only the transactional pre-update hook and the integration column write
/// ever receive one; every other hook point runs outside any transaction
/// and cannot acquire one. Dropping a `UnitOfWork` without calling
/// [`UnitOfWork::commit`] rolls the transaction back.
pub struct UnitOfWork {
	tx: sqlx::Transaction<'static, sqlx::Sqlite>,
}

impl UnitOfWork {
	pub(crate) fn new(tx: sqlx::Transaction<'static, sqlx::Sqlite>) -> Self {
		Self { tx }
	}

	/// The transaction's connection, for queries that must be atomic with
	/// the pending write.
	pub fn connection(&mut self) -> &mut sqlx::SqliteConnection {
		&mut self.tx
	}

	/// Commit the pending writes.
	pub async fn commit(self) -> Result<(), DbError> {
		self.tx.commit().await.map_err(DbError::Sqlx)
	}

	/// Discard the pending writes.
	pub async fn rollback(self) -> Result<(), DbError> {
		self.tx.rollback().await.map_err(DbError::Sqlx)
	}
}

impl std::fmt::Debug for UnitOfWork {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("UnitOfWork").finish_non_exhaustive()
	}
}
