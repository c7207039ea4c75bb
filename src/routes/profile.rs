use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;

use crate::error::AppError;
use crate::response::ok;
use crate::service::profile::get_profile;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/{username}").route(web::get().to(profile)));
}

async fn profile(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let username = path.into_inner();
    let view = get_profile(db.get_ref(), username.trim())
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    Ok(ok(view))
}
