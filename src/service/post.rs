use std::collections::HashMap;

use chrono::Utc;
use log::{debug, error, warn};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use serde::Serialize;

use super::{map_tx_error, to_rfc3339};
use crate::entity::{comment, like, post, user};
use crate::error::AppError;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorView {
    pub id: i32,
    pub name: Option<String>,
    pub username: String,
    pub image: Option<String>,
}

impl From<user::Model> for AuthorView {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            username: model.username,
            image: model.image,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i32,
    pub content: String,
    pub created: Option<String>,
    pub author: AuthorView,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeView {
    pub user_id: i32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCounts {
    pub likes: usize,
    pub comments: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: i32,
    pub content: Option<String>,
    pub image: Option<String>,
    pub created: Option<String>,
    pub author: AuthorView,
    /// Oldest first.
    pub comments: Vec<CommentView>,
    pub likes: Vec<LikeView>,
    pub counts: PostCounts,
}

impl PostView {
    pub fn liked_by(&self, user_id: i32) -> bool {
        self.likes.iter().any(|l| l.user_id == user_id)
    }
}

pub async fn create_post<C: ConnectionTrait>(
    db: &C,
    author_id: i32,
    content: Option<&str>,
    image: Option<&str>,
) -> Result<i32, AppError> {
    let content = content.map(str::trim).filter(|c| !c.is_empty());
    let image = image.map(str::trim).filter(|i| !i.is_empty());
    if content.is_none() && image.is_none() {
        return Err(AppError::param_error("post content and image are both empty"));
    }

    let now = Utc::now();
    let inserted = post::ActiveModel {
        author_id: Set(author_id),
        content: Set(content.map(str::to_string)),
        image: Set(image.map(str::to_string)),
        created: Set(Some(now)),
        updated: Set(Some(now)),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| {
        error!("post insert failed: {}", e);
        AppError::system_exception()
    })?;

    debug!("post saved id={}", inserted.id);
    Ok(inserted.id)
}

/// Owner-only. Likes and comments go with the post.
pub async fn delete_post(db: &DatabaseConnection, actor_id: i32, post_id: i32) -> Result<(), AppError> {
    let item = post::Entity::find_by_id(post_id)
        .one(db)
        .await
        .map_err(|e| {
            error!("post lookup failed: {}", e);
            AppError::system_exception()
        })?
        .ok_or_else(|| AppError::not_found("post not found"))?;
    if item.author_id != actor_id {
        return Err(AppError::fail("only the author can delete this post"));
    }

    db.transaction::<_, (), AppError>(|txn| {
        Box::pin(async move {
            like::Entity::delete_many()
                .filter(like::Column::PostId.eq(post_id))
                .exec(txn)
                .await
                .map_err(|e| {
                    error!("delete likes of post {} failed: {}", post_id, e);
                    AppError::system_exception()
                })?;
            comment::Entity::delete_many()
                .filter(comment::Column::PostId.eq(post_id))
                .exec(txn)
                .await
                .map_err(|e| {
                    error!("delete comments of post {} failed: {}", post_id, e);
                    AppError::system_exception()
                })?;
            post::Entity::delete_by_id(post_id)
                .exec(txn)
                .await
                .map_err(|e| {
                    error!("delete post {} failed: {}", post_id, e);
                    AppError::system_exception()
                })?;
            Ok(())
        })
    })
    .await
    .map_err(map_tx_error)?;

    debug!("post removed id={}", post_id);
    Ok(())
}

pub async fn get_feed<C: ConnectionTrait>(db: &C) -> Result<Vec<PostView>, AppError> {
    load_views(db, newest_first(post::Entity::find()))
        .await
        .map_err(|e| {
            error!("load feed failed: {}", e);
            AppError::system_exception()
        })
}

pub async fn get_posts_by_author<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Vec<PostView>, AppError> {
    let select = post::Entity::find().filter(post::Column::AuthorId.eq(user_id));
    load_views(db, newest_first(select)).await.map_err(|e| {
        error!("load posts of user {} failed: {}", user_id, e);
        AppError::system_exception()
    })
}

pub async fn get_liked_posts<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Vec<PostView>, AppError> {
    let select = post::Entity::find()
        .inner_join(like::Entity)
        .filter(like::Column::UserId.eq(user_id));
    load_views(db, newest_first(select)).await.map_err(|e| {
        error!("load liked posts of user {} failed: {}", user_id, e);
        AppError::system_exception()
    })
}

fn newest_first(select: Select<post::Entity>) -> Select<post::Entity> {
    select
        .order_by_desc(post::Column::Created)
        .order_by_desc(post::Column::Id)
}

/// Runs `select` and attaches authors, comments and likes with one query each.
async fn load_views<C: ConnectionTrait>(
    db: &C,
    select: Select<post::Entity>,
) -> Result<Vec<PostView>, DbErr> {
    let posts = select.all(db).await?;
    if posts.is_empty() {
        return Ok(Vec::new());
    }
    let post_ids: Vec<i32> = posts.iter().map(|p| p.id).collect();

    let comments = comment::Entity::find()
        .filter(comment::Column::PostId.is_in(post_ids.clone()))
        .order_by_asc(comment::Column::Created)
        .order_by_asc(comment::Column::Id)
        .all(db)
        .await?;

    let like_rows: Vec<(i32, i32)> = like::Entity::find()
        .select_only()
        .column(like::Column::PostId)
        .column(like::Column::UserId)
        .filter(like::Column::PostId.is_in(post_ids))
        .order_by_asc(like::Column::Id)
        .into_tuple()
        .all(db)
        .await?;

    let mut user_ids: Vec<i32> = posts
        .iter()
        .map(|p| p.author_id)
        .chain(comments.iter().map(|c| c.author_id))
        .collect();
    user_ids.sort_unstable();
    user_ids.dedup();

    let authors: HashMap<i32, AuthorView> = user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, AuthorView::from(u)))
        .collect();

    let mut comments_by_post: HashMap<i32, Vec<CommentView>> = HashMap::new();
    for c in comments {
        let Some(author) = authors.get(&c.author_id) else {
            warn!("comment {} has no author row", c.id);
            continue;
        };
        comments_by_post.entry(c.post_id).or_default().push(CommentView {
            id: c.id,
            content: c.content,
            created: c.created.map(to_rfc3339),
            author: author.clone(),
        });
    }

    let mut likes_by_post: HashMap<i32, Vec<LikeView>> = HashMap::new();
    for (post_id, user_id) in like_rows {
        likes_by_post.entry(post_id).or_default().push(LikeView { user_id });
    }

    let mut views = Vec::with_capacity(posts.len());
    for p in posts {
        let Some(author) = authors.get(&p.author_id) else {
            warn!("post {} has no author row", p.id);
            continue;
        };
        let comments = comments_by_post.remove(&p.id).unwrap_or_default();
        let likes = likes_by_post.remove(&p.id).unwrap_or_default();
        views.push(PostView {
            id: p.id,
            content: p.content,
            image: p.image,
            created: p.created.map(to_rfc3339),
            author: author.clone(),
            counts: PostCounts {
                likes: likes.len(),
                comments: comments.len(),
            },
            comments,
            likes,
        });
    }
    Ok(views)
}
