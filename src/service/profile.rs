use chrono::Utc;
use log::{error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set, Statement,
};
use serde::{Deserialize, Serialize};

use super::to_rfc3339;
use crate::auth::IdentityClaims;
use crate::entity::user;
use crate::error::{is_unique_violation, AppError};

static HANDLE_INVALID_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.\-]").unwrap());

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileCounts {
    pub posts: i64,
    /// Likes this user has given.
    pub likes: i64,
    pub followers: i64,
    pub following: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: i32,
    pub username: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub image: Option<String>,
    pub created: Option<String>,
    pub counts: ProfileCounts,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
}

/// `Ok(None)` when no user holds `username`.
pub async fn get_profile<C: ConnectionTrait>(db: &C, username: &str) -> Result<Option<ProfileView>, AppError> {
    let found = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await
        .map_err(|e| {
            error!("get profile {} failed: {}", username, e);
            AppError::system_exception()
        })?;
    let Some(model) = found else {
        return Ok(None);
    };

    let counts = load_counts(db, model.id).await.map_err(|e| {
        error!("count profile {} failed: {}", username, e);
        AppError::system_exception()
    })?;

    Ok(Some(ProfileView {
        id: model.id,
        username: model.username,
        name: model.name,
        email: model.email,
        bio: model.bio,
        location: model.location,
        website: model.website,
        image: model.image,
        created: model.created.map(to_rfc3339),
        counts,
    }))
}

async fn load_counts<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<ProfileCounts, DbErr> {
    let backend = db.get_database_backend();
    let sql = "SELECT \
        (SELECT COUNT(*) FROM t_post WHERE author_id = ?) AS posts, \
        (SELECT COUNT(*) FROM t_like WHERE user_id = ?) AS likes, \
        (SELECT COUNT(*) FROM t_follow WHERE following_id = ?) AS followers, \
        (SELECT COUNT(*) FROM t_follow WHERE follower_id = ?) AS following";
    let stmt = Statement::from_sql_and_values(
        backend,
        sql,
        vec![user_id.into(), user_id.into(), user_id.into(), user_id.into()],
    );
    let Some(row) = db.query_one(stmt).await? else {
        return Ok(ProfileCounts::default());
    };
    Ok(ProfileCounts {
        posts: row.try_get("", "posts")?,
        likes: row.try_get("", "likes")?,
        followers: row.try_get("", "followers")?,
        following: row.try_get("", "following")?,
    })
}

pub async fn find_user<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Option<user::Model>, AppError> {
    user::Entity::find_by_id(user_id).one(db).await.map_err(|e| {
        error!("find user {} failed: {}", user_id, e);
        AppError::system_exception()
    })
}

/// Applies the present fields; a blank value clears the field.
pub async fn update_profile<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    update: ProfileUpdate,
) -> Result<user::Model, AppError> {
    let mut active = user::ActiveModel {
        id: Set(user_id),
        ..Default::default()
    };
    active.updated = Set(Some(Utc::now()));

    if let Some(v) = update.name {
        active.name = Set(non_blank(v));
    }
    if let Some(v) = update.bio {
        active.bio = Set(non_blank(v));
    }
    if let Some(v) = update.location {
        active.location = Set(non_blank(v));
    }
    if let Some(v) = update.website {
        active.website = Set(non_blank(v));
    }

    active.update(db).await.map_err(|e| match e {
        DbErr::RecordNotUpdated => AppError::not_found("user not found"),
        e => {
            error!("update profile {} failed: {}", user_id, e);
            AppError::fail("failed to update profile")
        }
    })
}

/// Returns the local user for a provider identity, creating it on first sight.
pub async fn sync_user<C: ConnectionTrait>(db: &C, identity: &IdentityClaims) -> Result<user::Model, AppError> {
    if let Some(existing) = find_by_external_id(db, &identity.sub).await? {
        return Ok(existing);
    }

    let username = derive_username(identity)
        .ok_or_else(|| AppError::param_error("identity carries neither a username nor an email"))?;
    let now = Utc::now();
    let row = user::ActiveModel {
        external_id: Set(identity.sub.clone()),
        username: Set(username.clone()),
        email: Set(identity.email.clone()),
        name: Set(identity.name.clone()),
        image: Set(identity.image.clone()),
        created: Set(Some(now)),
        updated: Set(Some(now)),
        ..Default::default()
    };

    match row.insert(db).await {
        Ok(inserted) => {
            info!("user {} synced as {}", inserted.external_id, inserted.username);
            Ok(inserted)
        }
        Err(e) if is_unique_violation(&e) => {
            // a concurrent sync of the same identity wins the insert
            if let Some(existing) = find_by_external_id(db, &identity.sub).await? {
                return Ok(existing);
            }
            Err(AppError::fail(format!("username {} is already taken", username)))
        }
        Err(e) => {
            error!("sync user {} failed: {}", identity.sub, e);
            Err(AppError::system_exception())
        }
    }
}

async fn find_by_external_id<C: ConnectionTrait>(db: &C, external_id: &str) -> Result<Option<user::Model>, AppError> {
    user::Entity::find()
        .filter(user::Column::ExternalId.eq(external_id))
        .one(db)
        .await
        .map_err(|e| {
            error!("find user by external id {} failed: {}", external_id, e);
            AppError::system_exception()
        })
}

/// The provider username, else the local part of the email.
fn derive_username(identity: &IdentityClaims) -> Option<String> {
    let raw = identity
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .or_else(|| {
            identity
                .email
                .as_deref()
                .and_then(|e| e.split('@').next())
                .map(str::trim)
                .filter(|u| !u.is_empty())
        })?;
    Some(HANDLE_INVALID_CHARS.replace_all(raw, "_").into_owned())
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::service::{follow::toggle_follow, like::toggle_like};
    use crate::test_support::{seed_post, seed_user, setup_db};

    fn identity(sub: &str, username: Option<&str>, email: Option<&str>) -> IdentityClaims {
        IdentityClaims {
            sub: sub.to_string(),
            username: username.map(str::to_string),
            email: email.map(str::to_string),
            name: Some("Ada Lovelace".to_string()),
            image: None,
            exp: 0,
        }
    }

    #[test]
    fn username_falls_back_to_email_local_part() {
        assert_eq!(derive_username(&identity("s", Some("ada"), None)).as_deref(), Some("ada"));
        assert_eq!(
            derive_username(&identity("s", Some(" "), Some("ada.l+x@example.com"))).as_deref(),
            Some("ada.l_x")
        );
        assert_eq!(derive_username(&identity("s", None, None)), None);
    }

    #[actix_rt::test]
    async fn missing_handle_is_not_found_not_an_error() {
        let db = setup_db().await;
        assert!(get_profile(&db, "nobody").await.unwrap().is_none());
    }

    #[actix_rt::test]
    async fn profile_carries_aggregate_counts() {
        let db = setup_db().await;
        let ada = seed_user(&db, "ada").await;
        let bob = seed_user(&db, "bob").await;
        let eve = seed_user(&db, "eve").await;
        let p1 = seed_post(&db, ada.id, "one").await;
        seed_post(&db, ada.id, "two").await;
        let bp = seed_post(&db, bob.id, "bob's").await;

        toggle_like(&db, ada.id, bp.id).await.unwrap();
        toggle_like(&db, ada.id, p1.id).await.unwrap();
        toggle_like(&db, bob.id, p1.id).await.unwrap();
        toggle_follow(&db, bob.id, ada.id).await.unwrap();
        toggle_follow(&db, eve.id, ada.id).await.unwrap();
        toggle_follow(&db, ada.id, eve.id).await.unwrap();

        let profile = get_profile(&db, "ada").await.unwrap().unwrap();
        assert_eq!(profile.id, ada.id);
        assert_eq!(
            profile.counts,
            ProfileCounts {
                posts: 2,
                likes: 2,
                followers: 2,
                following: 1,
            }
        );
    }

    #[actix_rt::test]
    async fn update_only_touches_present_fields() {
        let db = setup_db().await;
        let ada = seed_user(&db, "ada").await;

        update_profile(
            &db,
            ada.id,
            ProfileUpdate {
                bio: Some("analyst".to_string()),
                location: Some("London".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let updated = update_profile(
            &db,
            ada.id,
            ProfileUpdate {
                location: Some("  ".to_string()),
                website: Some("ada.dev".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.bio.as_deref(), Some("analyst"));
        assert_eq!(updated.location, None);
        assert_eq!(updated.website.as_deref(), Some("ada.dev"));
        assert_eq!(updated.username, "ada");
    }

    #[actix_rt::test]
    async fn update_of_missing_user_is_not_found() {
        let db = setup_db().await;
        let err = update_profile(&db, 404, ProfileUpdate::default()).await.unwrap_err();
        assert_eq!(err.code(), crate::error::CODE_NOT_FOUND);
    }

    #[actix_rt::test]
    async fn sync_user_is_idempotent() {
        let db = setup_db().await;
        let claims = identity("ext_1", None, Some("ada@example.com"));

        let first = sync_user(&db, &claims).await.unwrap();
        let second = sync_user(&db, &claims).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.username, "ada");
        assert_eq!(first.name.as_deref(), Some("Ada Lovelace"));
    }

    #[actix_rt::test]
    async fn sync_user_rejects_taken_handle() {
        let db = setup_db().await;
        sync_user(&db, &identity("ext_1", Some("ada"), None)).await.unwrap();

        let err = sync_user(&db, &identity("ext_2", Some("ada"), None)).await.unwrap_err();
        assert_eq!(err.code(), crate::error::CODE_FAIL);
    }
}
