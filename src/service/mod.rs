//! Store-facing operations. Every function takes the store handle explicitly;
//! handlers in `routes` only resolve the caller and shape the response.

use chrono::{DateTime, SecondsFormat, Utc};
use log::{error, warn};
use sea_orm::{DbErr, TransactionError};
use serde::Deserialize;

use crate::error::{is_store_busy, is_unique_violation, AppError};

pub mod comment;
pub mod follow;
pub mod like;
pub mod post;
pub mod profile;

/// How a relation write treats the current row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationOp {
    /// Insert; an existing row is a failure.
    Add,
    /// Delete; an absent row is fine.
    Remove,
    /// Delete when present, insert when absent.
    Toggle,
}

impl Default for RelationOp {
    fn default() -> Self {
        Self::Toggle
    }
}

pub(crate) fn map_tx_error(err: TransactionError<AppError>) -> AppError {
    match err {
        TransactionError::Connection(e) if is_store_busy(&e) => {
            warn!("transaction hit a locked store: {}", e);
            AppError::fail(BUSY_MSG)
        }
        TransactionError::Connection(e) => {
            error!("transaction failed: {}", e);
            AppError::system_exception()
        }
        TransactionError::Transaction(app) => app,
    }
}

const BUSY_MSG: &str = "store is busy, please retry";

/// Maps a failed like/follow write. Losing a race to another writer of the
/// same pair is an operation failure, not a system fault.
pub(crate) fn relation_write_error(action: &str, err: DbErr) -> AppError {
    if is_unique_violation(&err) {
        return AppError::relation_exists();
    }
    if is_store_busy(&err) {
        warn!("{} hit a locked store: {}", action, err);
        return AppError::fail(BUSY_MSG);
    }
    error!("{} failed: {}", action, err);
    AppError::system_exception()
}

pub(crate) fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_op_parses_wire_names() {
        let op: RelationOp = serde_json::from_str("\"ADD\"").unwrap();
        assert_eq!(op, RelationOp::Add);
        let op: RelationOp = serde_json::from_str("\"REMOVE\"").unwrap();
        assert_eq!(op, RelationOp::Remove);
        let op: RelationOp = serde_json::from_str("\"TOGGLE\"").unwrap();
        assert_eq!(op, RelationOp::Toggle);
        assert!(serde_json::from_str::<RelationOp>("\"FLIP\"").is_err());
        assert_eq!(RelationOp::default(), RelationOp::Toggle);
    }

    #[test]
    fn relation_write_errors_are_classified() {
        let dup = DbErr::Custom("UNIQUE constraint failed: t_like.user_id, t_like.post_id".to_string());
        assert_eq!(relation_write_error("like insert", dup).msg(), "relation already exists");

        let busy = DbErr::Custom("(code: 5) database is locked".to_string());
        assert_eq!(relation_write_error("like insert", busy).code(), crate::error::CODE_FAIL);

        let other = DbErr::Custom("disk I/O error".to_string());
        assert_eq!(relation_write_error("like insert", other).code(), crate::error::CODE_SYSTEM_EXCEPTION);
    }
}
