use chrono::Utc;
use log::{debug, error};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, Set,
    TransactionTrait,
};

use super::{map_tx_error, relation_write_error, RelationOp};
use crate::entity::{follow, user};
use crate::error::AppError;

pub async fn toggle_follow(
    db: &DatabaseConnection,
    follower_id: i32,
    following_id: i32,
) -> Result<(), AppError> {
    apply(db, follower_id, following_id, RelationOp::Toggle).await
}

/// Writes the follower -> following row according to `op` in one transaction.
/// Each branch starts with a write, so concurrent calls on one pair queue on
/// the store's write lock.
pub async fn apply(
    db: &DatabaseConnection,
    follower_id: i32,
    following_id: i32,
    op: RelationOp,
) -> Result<(), AppError> {
    if follower_id == following_id {
        return Err(AppError::param_error("you cannot follow yourself"));
    }

    let target = user::Entity::find_by_id(following_id)
        .one(db)
        .await
        .map_err(|e| {
            error!("follow target lookup failed: {}", e);
            AppError::system_exception()
        })?;
    if target.is_none() {
        return Err(AppError::not_found("user not found"));
    }

    db.transaction::<_, (), AppError>(|txn| {
        Box::pin(async move {
            match op {
                RelationOp::Add => insert_follow(txn, follower_id, following_id).await,
                RelationOp::Remove => delete_follow(txn, follower_id, following_id).await.map(|_| ()),
                RelationOp::Toggle => {
                    if delete_follow(txn, follower_id, following_id).await? == 0 {
                        insert_follow(txn, follower_id, following_id).await?;
                    }
                    Ok(())
                }
            }
        })
    })
    .await
    .map_err(map_tx_error)?;

    debug!("follow {:?} applied {} -> {}", op, follower_id, following_id);
    Ok(())
}

async fn insert_follow(
    txn: &DatabaseTransaction,
    follower_id: i32,
    following_id: i32,
) -> Result<(), AppError> {
    let row = follow::ActiveModel {
        follower_id: Set(follower_id),
        following_id: Set(following_id),
        created: Set(Some(Utc::now())),
    };
    row.insert(txn)
        .await
        .map_err(|e| relation_write_error("follow insert", e))?;
    Ok(())
}

async fn delete_follow(
    txn: &DatabaseTransaction,
    follower_id: i32,
    following_id: i32,
) -> Result<u64, AppError> {
    let res = follow::Entity::delete_by_id((follower_id, following_id))
        .exec(txn)
        .await
        .map_err(|e| relation_write_error("follow delete", e))?;
    Ok(res.rows_affected)
}

/// Whether `viewer` follows `user_id`. No viewer, or a failed read, is "not following".
pub async fn is_following<C: ConnectionTrait>(db: &C, viewer: Option<i32>, user_id: i32) -> bool {
    let Some(viewer) = viewer else {
        return false;
    };
    match follow::Entity::find_by_id((viewer, user_id)).one(db).await {
        Ok(row) => row.is_some(),
        Err(e) => {
            error!("check follow status failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ColumnTrait, PaginatorTrait, QueryFilter};

    use crate::error::CODE_FAIL;
    use crate::test_support::{seed_user, setup_db, setup_file_db};

    async fn follow_rows(db: &DatabaseConnection) -> u64 {
        follow::Entity::find().count(db).await.unwrap()
    }

    #[actix_rt::test]
    async fn toggle_twice_restores_original_state() {
        let db = setup_db().await;
        let a = seed_user(&db, "ada").await;
        let b = seed_user(&db, "bob").await;

        assert!(!is_following(&db, Some(a.id), b.id).await);
        toggle_follow(&db, a.id, b.id).await.unwrap();
        assert!(is_following(&db, Some(a.id), b.id).await);
        assert!(!is_following(&db, Some(b.id), a.id).await);
        toggle_follow(&db, a.id, b.id).await.unwrap();
        assert!(!is_following(&db, Some(a.id), b.id).await);
        assert_eq!(follow_rows(&db).await, 0);
    }

    #[actix_rt::test]
    async fn self_follow_is_rejected() {
        let db = setup_db().await;
        let a = seed_user(&db, "ada").await;

        let err = toggle_follow(&db, a.id, a.id).await.unwrap_err();
        assert_eq!(err.code(), crate::error::CODE_PARAM_ERROR);
        assert_eq!(follow_rows(&db).await, 0);
    }

    #[actix_rt::test]
    async fn unknown_target_is_rejected() {
        let db = setup_db().await;
        let a = seed_user(&db, "ada").await;

        let err = toggle_follow(&db, a.id, a.id + 100).await.unwrap_err();
        assert_eq!(err.code(), crate::error::CODE_NOT_FOUND);
    }

    #[actix_rt::test]
    async fn add_and_remove_are_explicit() {
        let db = setup_db().await;
        let a = seed_user(&db, "ada").await;
        let b = seed_user(&db, "bob").await;

        apply(&db, a.id, b.id, RelationOp::Add).await.unwrap();
        let err = apply(&db, a.id, b.id, RelationOp::Add).await.unwrap_err();
        assert_eq!(err.msg(), "relation already exists");
        assert_eq!(follow_rows(&db).await, 1);

        apply(&db, a.id, b.id, RelationOp::Remove).await.unwrap();
        apply(&db, a.id, b.id, RelationOp::Remove).await.unwrap();
        assert_eq!(follow_rows(&db).await, 0);
    }

    #[actix_rt::test]
    async fn store_rejects_duplicate_pair() {
        let db = setup_db().await;
        let a = seed_user(&db, "ada").await;
        let b = seed_user(&db, "bob").await;

        let txn = db.begin().await.unwrap();
        insert_follow(&txn, a.id, b.id).await.unwrap();
        let err = insert_follow(&txn, a.id, b.id).await.unwrap_err();
        assert_eq!(err.msg(), "relation already exists");
        txn.commit().await.unwrap();
        assert_eq!(follow_rows(&db).await, 1);
    }

    #[actix_rt::test]
    async fn anonymous_viewer_is_not_following() {
        let db = setup_db().await;
        let b = seed_user(&db, "bob").await;
        assert!(!is_following(&db, None, b.id).await);
    }

    #[actix_rt::test]
    async fn concurrent_follow_stores_one_row_and_reports_duplicates() {
        let store = setup_file_db(8).await;
        let db = &store.db;
        let fan = seed_user(db, "fan").await;

        for round in 0..10 {
            let star = seed_user(db, &format!("star{}", round)).await;
            let (a, b, c, d) = tokio::join!(
                apply(db, fan.id, star.id, RelationOp::Add),
                apply(db, fan.id, star.id, RelationOp::Add),
                apply(db, fan.id, star.id, RelationOp::Add),
                apply(db, fan.id, star.id, RelationOp::Add),
            );
            let results = [a, b, c, d];

            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1, "round {}", round);
            for err in results.iter().filter_map(|r| r.as_ref().err()) {
                assert_eq!(err.code(), CODE_FAIL, "round {}: {}", round, err.msg());
                assert_eq!(err.msg(), "relation already exists");
            }
            let rows = follow::Entity::find()
                .filter(follow::Column::FollowingId.eq(star.id))
                .count(db)
                .await
                .unwrap();
            assert_eq!(rows, 1);
            assert!(is_following(db, Some(fan.id), star.id).await);
        }
    }
}
