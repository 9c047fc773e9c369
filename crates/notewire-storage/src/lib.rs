// Postgres storage layer with sqlx
//
// This crate provides database implementations for the core seams this
// subsystem owns rows for:
// - DbSubscriptionStore: implements SubscriptionStore
// - DbNotificationStore: implements NotificationStore
// - DbEventLog: implements EventLog
//
// The host application's entities (documents, collections, groups, users)
// are NOT here; they stay behind EntityStore/PermissionOracle adapters on
// the host side. Schema lives in migrations/, applied via
// Database::migrate.

pub mod event_log;
pub mod models;
pub mod notification_store;
pub mod repositories;
pub mod subscription_store;

pub use event_log::DbEventLog;
pub use models::*;
pub use notification_store::DbNotificationStore;
pub use repositories::Database;
pub use subscription_store::DbSubscriptionStore;
