use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::response::ok;
use crate::service::comment::add_comment;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/add").route(web::post().to(add)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddCommentRequest {
    post_id: i32,
    #[serde(default)]
    content: String,
}

async fn add(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<AddCommentRequest>,
) -> Result<HttpResponse, AppError> {
    let id = add_comment(db.get_ref(), auth.user_id, payload.post_id, &payload.content).await?;
    Ok(ok(id))
}
