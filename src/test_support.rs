use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};

use crate::auth::IdentityClaims;
use crate::config::AppConfig;
use crate::db::init_schema;
use crate::entity::{post, user};

/// A fresh in-memory store. One pooled connection keeps the database alive
/// for the whole test.
pub async fn setup_db() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:".to_owned());
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    init_schema(&db).await.unwrap();
    db
}

static FILE_DB_SEQ: AtomicUsize = AtomicUsize::new(0);

/// A SQLite file under the temp dir with a real pool, for tests where calls
/// must overlap. The files go away on drop.
pub struct FileDb {
    pub db: DatabaseConnection,
    path: PathBuf,
}

impl Drop for FileDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let _ = std::fs::remove_file(format!("{}{}", self.path.display(), suffix));
        }
    }
}

pub async fn setup_file_db(max_connections: u32) -> FileDb {
    let seq = FILE_DB_SEQ.fetch_add(1, Ordering::SeqCst);
    let ts = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let path = std::env::temp_dir().join(format!("socially-test-{}-{}-{}.sqlite", std::process::id(), seq, ts));

    let mut opt = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
    opt.max_connections(max_connections).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    init_schema(&db).await.unwrap();
    FileDb { db, path }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        server_port: 0,
        sqlite_path: ":memory:".to_string(),
        database_url: Some("sqlite::memory:".to_string()),
        jwt_secret: "test-secret".to_string(),
        token_header: "authorization".to_string(),
    }
}

pub fn issue_token(config: &AppConfig, claims: &IdentityClaims) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .unwrap()
}

pub async fn seed_user(db: &DatabaseConnection, username: &str) -> user::Model {
    user::ActiveModel {
        external_id: Set(format!("ext_{}", username)),
        username: Set(username.to_string()),
        name: Set(Some(username.to_uppercase())),
        created: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_post(db: &DatabaseConnection, author_id: i32, content: &str) -> post::Model {
    post::ActiveModel {
        author_id: Set(author_id),
        content: Set(Some(content.to_string())),
        created: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}
