use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::auth::{AuthUser, OptionalAuthUser};
use crate::error::AppError;
use crate::response::{ok, ok_empty};
use crate::service::{follow, RelationOp};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/relation").route(web::post().to(relation)))
        .service(web::resource("/status").route(web::post().to(status)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowRelationRequest {
    user_id: i32,
    #[serde(default)]
    operate_type: RelationOp,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowStatusRequest {
    user_id: i32,
}

async fn relation(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<FollowRelationRequest>,
) -> Result<HttpResponse, AppError> {
    follow::apply(db.get_ref(), auth.user_id, payload.user_id, payload.operate_type).await?;
    Ok(ok_empty())
}

async fn status(
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    payload: web::Json<FollowStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let following = follow::is_following(db.get_ref(), auth.user_id(), payload.user_id).await;
    Ok(ok(following))
}
