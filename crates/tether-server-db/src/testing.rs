// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::SqlitePool;

pub async fn create_test_pool() -> SqlitePool {
	SqlitePool::connect(":memory:").await.unwrap()
}

pub async fn create_integrations_table(pool: &SqlitePool) {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS integrations (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			kind TEXT NOT NULL CHECK (kind IN ('github', 'static_file', 'unknown')),
			name TEXT NOT NULL,
			status TEXT NOT NULL CHECK (status IN ('active', 'needs_repo_access', 'error', 'pending_installation')),
			metadata TEXT NOT NULL DEFAULT '{}',
			created_at TEXT NOT NULL,
			updated_at TEXT NOT NULL,
			UNIQUE (kind, name)
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();
}

pub async fn create_installations_table(pool: &SqlitePool) {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS installations (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			name TEXT NOT NULL UNIQUE,
			container_type TEXT NOT NULL CHECK (container_type IN ('org', 'user')),
			installation_id INTEGER NOT NULL UNIQUE,
			repos TEXT NOT NULL DEFAULT '[]',
			created_at TEXT NOT NULL,
			updated_at TEXT NOT NULL
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();
}

pub async fn create_integration_test_pool() -> SqlitePool {
	let pool = create_test_pool().await;
	create_integrations_table(&pool).await;
	create_installations_table(&pool).await;
	pool
}
