// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Database layer for the Tether server.
//!
//! Plain record-level repositories over SQLite. No reconciliation or
//! lifecycle logic lives here - that belongs to
//! `tether-server-integrations`, which layers domain types and hooks on
//! top of these rows.

pub mod error;
pub mod installation;
pub mod integration;
pub mod pool;
pub mod testing;
pub mod uow;

pub use error::{DbError, Result};
pub use installation::{
	InstallationRecord, InstallationRepository, InstallationRowChanges, NewInstallationRecord,
};
pub use integration::{
	IntegrationRecord, IntegrationRepository, IntegrationRowChanges, NewIntegrationRecord,
};
pub use pool::create_pool;
pub use uow::UnitOfWork;
