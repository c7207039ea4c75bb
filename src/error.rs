use actix_web::{http::StatusCode, ResponseError};
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

use crate::response::response_from_error;

pub const CODE_PARAM_ERROR: i32 = 1;
pub const CODE_FAIL: i32 = 2;
pub const CODE_NEED_LOGIN: i32 = 3;
pub const CODE_NOT_FOUND: i32 = 4;
pub const CODE_SYSTEM_EXCEPTION: i32 = 99;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{msg}")]
    Biz { code: i32, msg: String },
}

impl AppError {
    pub fn param_error(msg: impl Into<String>) -> Self {
        Self::Biz { code: CODE_PARAM_ERROR, msg: msg.into() }
    }

    pub fn fail(msg: impl Into<String>) -> Self {
        Self::Biz { code: CODE_FAIL, msg: msg.into() }
    }

    pub fn need_login() -> Self {
        Self::Biz { code: CODE_NEED_LOGIN, msg: "please login first".to_string() }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::Biz { code: CODE_NOT_FOUND, msg: msg.into() }
    }

    pub fn relation_exists() -> Self {
        Self::fail("relation already exists")
    }

    pub fn system_exception() -> Self {
        Self::Biz { code: CODE_SYSTEM_EXCEPTION, msg: "system_exception".to_string() }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Biz { code, .. } => *code,
        }
    }

    pub fn msg(&self) -> &str {
        match self {
            Self::Biz { msg, .. } => msg,
        }
    }

    pub fn is_need_login(&self) -> bool {
        self.code() == CODE_NEED_LOGIN
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::OK
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        response_from_error(self)
    }
}

/// True when the store refused a row because a unique key already holds it.
pub fn is_unique_violation(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    let msg = err.to_string();
    msg.contains("Duplicate") || msg.contains("UNIQUE")
}

/// True when the store gave up waiting for a lock held by another writer.
pub fn is_store_busy(err: &DbErr) -> bool {
    let msg = err.to_string();
    msg.contains("database is locked")
        || msg.contains("database table is locked")
        || msg.contains("Deadlock found")
        || msg.contains("Lock wait timeout")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(AppError::param_error("x").code(), 1);
        assert_eq!(AppError::fail("x").code(), 2);
        assert_eq!(AppError::need_login().code(), 3);
        assert_eq!(AppError::not_found("x").code(), 4);
        assert_eq!(AppError::system_exception().code(), 99);
    }

    #[test]
    fn relation_exists_is_an_operation_failure() {
        let err = AppError::relation_exists();
        assert_eq!(err.code(), CODE_FAIL);
        assert_eq!(err.msg(), "relation already exists");
        assert!(!err.is_need_login());
    }

    #[test]
    fn unique_violation_is_detected_from_message() {
        let err = DbErr::Custom("UNIQUE constraint failed: t_like.user_id, t_like.post_id".to_string());
        assert!(is_unique_violation(&err));
        assert!(!is_unique_violation(&DbErr::Custom("disk I/O error".to_string())));
    }

    #[test]
    fn lock_contention_is_detected_from_message() {
        let busy = DbErr::Custom("error returned from database: (code: 5) database is locked".to_string());
        assert!(is_store_busy(&busy));
        assert!(!is_unique_violation(&busy));
        assert!(!is_store_busy(&DbErr::Custom("UNIQUE constraint failed: t_follow.follower_id".to_string())));
    }
}
