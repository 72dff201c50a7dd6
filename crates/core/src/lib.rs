//! Shared error taxonomy, ID newtypes, configuration, and the `Services`
//! context used across the wiscdb workspace.

pub mod config;
mod deadline;
mod error;
mod ids;
mod services;

pub use config::ServerConfig;
pub use deadline::Deadline;
pub use error::{Error, Result, StorageErrorKind};
pub use ids::{ColumnId, ConnectionId, DatabaseId, IndexId, RowId, TableId};
pub use services::{MetricEvent, Services};
