use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::auth::{AuthUser, Identity, OptionalAuthUser};
use crate::entity::user;
use crate::error::AppError;
use crate::response::ok;
use crate::service::profile::{self, ProfileUpdate};
use crate::service::to_rfc3339;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/sync").route(web::post().to(sync_user)))
        .service(web::resource("/update").route(web::post().to(update_user)))
        .service(web::resource("/current").route(web::post().to(current_user)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    name: Option<String>,
    bio: Option<String>,
    location: Option<String>,
    website: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDto {
    id: i32,
    username: String,
    email: Option<String>,
    name: Option<String>,
    bio: Option<String>,
    location: Option<String>,
    website: Option<String>,
    image: Option<String>,
    created: Option<String>,
    updated: Option<String>,
}

impl From<user::Model> for UserDto {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            name: model.name,
            bio: model.bio,
            location: model.location,
            website: model.website,
            image: model.image,
            created: model.created.map(to_rfc3339),
            updated: model.updated.map(to_rfc3339),
        }
    }
}

async fn sync_user(
    db: web::Data<DatabaseConnection>,
    identity: Identity,
) -> Result<HttpResponse, AppError> {
    let model = profile::sync_user(db.get_ref(), &identity.0).await?;
    Ok(ok(UserDto::from(model)))
}

async fn update_user(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, AppError> {
    let payload = payload.into_inner();
    let update = ProfileUpdate {
        name: payload.name,
        bio: payload.bio,
        location: payload.location,
        website: payload.website,
    };
    let model = profile::update_profile(db.get_ref(), auth.user_id, update).await?;
    Ok(ok(UserDto::from(model)))
}

/// The signed-in user, or `null` data for an anonymous caller.
async fn current_user(
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
) -> Result<HttpResponse, AppError> {
    let Some(user_id) = auth.user_id() else {
        return Ok(ok(Option::<UserDto>::None));
    };
    let model = profile::find_user(db.get_ref(), user_id).await?;
    Ok(ok(model.map(UserDto::from)))
}
