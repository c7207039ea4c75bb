use chrono::Utc;
use log::{debug, error};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, Set, TransactionTrait,
};

use super::{map_tx_error, relation_write_error, RelationOp};
use crate::entity::{like, post};
use crate::error::AppError;

pub async fn toggle_like(db: &DatabaseConnection, user_id: i32, post_id: i32) -> Result<(), AppError> {
    apply(db, user_id, post_id, RelationOp::Toggle).await
}

/// Writes the (user, post) like row according to `op` in one transaction.
/// Liking one's own post is allowed.
///
/// Every branch opens with a write so the transaction holds the store's
/// write lock before it decides anything; a concurrent duplicate then waits
/// and lands on the unique key.
pub async fn apply(
    db: &DatabaseConnection,
    user_id: i32,
    post_id: i32,
    op: RelationOp,
) -> Result<(), AppError> {
    let target = post::Entity::find_by_id(post_id)
        .one(db)
        .await
        .map_err(|e| {
            error!("like target lookup failed: {}", e);
            AppError::system_exception()
        })?;
    if target.is_none() {
        return Err(AppError::not_found("post not found"));
    }

    db.transaction::<_, (), AppError>(|txn| {
        Box::pin(async move {
            match op {
                RelationOp::Add => insert_like(txn, user_id, post_id).await,
                RelationOp::Remove => delete_like(txn, user_id, post_id).await.map(|_| ()),
                RelationOp::Toggle => {
                    if delete_like(txn, user_id, post_id).await? == 0 {
                        insert_like(txn, user_id, post_id).await?;
                    }
                    Ok(())
                }
            }
        })
    })
    .await
    .map_err(map_tx_error)?;

    debug!("like {:?} applied user={} post={}", op, user_id, post_id);
    Ok(())
}

async fn find_like<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    post_id: i32,
) -> Result<Option<like::Model>, DbErr> {
    like::Entity::find()
        .filter(like::Column::UserId.eq(user_id))
        .filter(like::Column::PostId.eq(post_id))
        .one(db)
        .await
}

async fn insert_like(txn: &DatabaseTransaction, user_id: i32, post_id: i32) -> Result<(), AppError> {
    let row = like::ActiveModel {
        user_id: Set(user_id),
        post_id: Set(post_id),
        created: Set(Some(Utc::now())),
        ..Default::default()
    };
    row.insert(txn)
        .await
        .map_err(|e| relation_write_error("like insert", e))?;
    Ok(())
}

/// Returns how many rows went away: 0 or 1.
async fn delete_like(txn: &DatabaseTransaction, user_id: i32, post_id: i32) -> Result<u64, AppError> {
    let res = like::Entity::delete_many()
        .filter(like::Column::UserId.eq(user_id))
        .filter(like::Column::PostId.eq(post_id))
        .exec(txn)
        .await
        .map_err(|e| relation_write_error("like delete", e))?;
    Ok(res.rows_affected)
}

pub async fn has_liked<C: ConnectionTrait>(db: &C, user_id: i32, post_id: i32) -> Result<bool, AppError> {
    find_like(db, user_id, post_id)
        .await
        .map(|row| row.is_some())
        .map_err(|e| {
            error!("check like status failed: {}", e);
            AppError::system_exception()
        })
}

pub async fn count_likes<C: ConnectionTrait>(db: &C, post_id: i32) -> Result<u64, AppError> {
    like::Entity::find()
        .filter(like::Column::PostId.eq(post_id))
        .count(db)
        .await
        .map_err(|e| {
            error!("count likes failed: {}", e);
            AppError::system_exception()
        })
}
