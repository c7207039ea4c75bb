use chrono::Utc;
use log::{debug, error};
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};

use crate::entity::{comment, post};
use crate::error::AppError;

/// Stores a comment by `author_id` on `post_id` and returns its id.
pub async fn add_comment<C: ConnectionTrait>(
    db: &C,
    author_id: i32,
    post_id: i32,
    content: &str,
) -> Result<i32, AppError> {
    if content.trim().is_empty() {
        return Err(AppError::param_error("comment content cannot be empty"));
    }

    let target = post::Entity::find_by_id(post_id)
        .one(db)
        .await
        .map_err(|e| {
            error!("comment target lookup failed: {}", e);
            AppError::system_exception()
        })?;
    if target.is_none() {
        return Err(AppError::not_found("post not found"));
    }

    let inserted = comment::ActiveModel {
        post_id: Set(post_id),
        author_id: Set(author_id),
        content: Set(content.to_string()),
        created: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| {
        error!("comment insert failed: {}", e);
        AppError::system_exception()
    })?;

    debug!("comment saved id={} post={}", inserted.id, post_id);
    Ok(inserted.id)
}
