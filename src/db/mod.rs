//! Database module for the SQLite entity store.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - Repository layer: get-or-create/put entity access, event journal,
//!   undo history and rollback

pub mod migrations;
pub mod repo;

pub use migrations::{init_db, schema_version, SCHEMA_VERSION};
pub use repo::{
    sql_position, Entity, EntityTable, EntityTx, JournalStatus, Repository, RollbackSummary,
    StoreError,
};
