use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::auth::{AuthUser, OptionalAuthUser};
use crate::error::AppError;
use crate::response::{ok, ok_empty};
use crate::service::post::{self, PostView};
use crate::service::{like, RelationOp};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/save").route(web::post().to(save)))
        .service(web::resource("/remove").route(web::post().to(remove)))
        .service(web::resource("/feed").route(web::post().to(feed)))
        .service(web::resource("/byAuthor").route(web::post().to(by_author)))
        .service(web::resource("/likedBy").route(web::post().to(liked_by)))
        .service(web::resource("/relation").route(web::post().to(relation)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SavePostRequest {
    content: Option<String>,
    image: Option<String>,
}

#[derive(Deserialize)]
struct RemoveQuery {
    id: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserPostsRequest {
    user_id: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LikeRelationRequest {
    post_id: i32,
    #[serde(default)]
    operate_type: RelationOp,
}

/// A post as seen by the caller.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostDto {
    #[serde(flatten)]
    post: PostView,
    liked: bool,
}

fn for_viewer(posts: Vec<PostView>, viewer: Option<i32>) -> Vec<PostDto> {
    posts
        .into_iter()
        .map(|post| {
            let liked = viewer.map(|id| post.liked_by(id)).unwrap_or(false);
            PostDto { post, liked }
        })
        .collect()
}

async fn save(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<SavePostRequest>,
) -> Result<HttpResponse, AppError> {
    let id = post::create_post(
        db.get_ref(),
        auth.user_id,
        payload.content.as_deref(),
        payload.image.as_deref(),
    )
    .await?;
    Ok(ok(id))
}

async fn remove(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    query: web::Query<RemoveQuery>,
) -> Result<HttpResponse, AppError> {
    post::delete_post(db.get_ref(), auth.user_id, query.id).await?;
    Ok(ok_empty())
}

async fn feed(
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
) -> Result<HttpResponse, AppError> {
    let posts = post::get_feed(db.get_ref()).await?;
    Ok(ok(for_viewer(posts, auth.user_id())))
}

async fn by_author(
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    payload: web::Json<UserPostsRequest>,
) -> Result<HttpResponse, AppError> {
    let posts = post::get_posts_by_author(db.get_ref(), payload.user_id).await?;
    Ok(ok(for_viewer(posts, auth.user_id())))
}

async fn liked_by(
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    payload: web::Json<UserPostsRequest>,
) -> Result<HttpResponse, AppError> {
    let posts = post::get_liked_posts(db.get_ref(), payload.user_id).await?;
    Ok(ok(for_viewer(posts, auth.user_id())))
}

async fn relation(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<LikeRelationRequest>,
) -> Result<HttpResponse, AppError> {
    like::apply(db.get_ref(), auth.user_id, payload.post_id, payload.operate_type).await?;
    Ok(ok_empty())
}
