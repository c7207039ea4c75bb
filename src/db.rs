use log::{info, warn};
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, Statement};
use std::fs;
use std::path::Path;

use crate::config::AppConfig;

pub async fn connect_db(config: &AppConfig) -> Result<DatabaseConnection, DbErr> {
    let url = config.database_url();
    ensure_sqlite_dir(&url);
    let db = Database::connect(&url).await?;
    init_schema(&db).await?;
    Ok(db)
}

fn ensure_sqlite_dir(url: &str) {
    let Some(rest) = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
    else {
        return;
    };
    if rest.starts_with(":memory:") {
        return;
    }
    let path = rest.split('?').next().unwrap_or(rest);
    if let Some(parent) = Path::new(path).parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("create sqlite dir {} failed: {}", parent.display(), e);
        }
    }
}

/// Creates the tables on a fresh SQLite store. Other backends are expected
/// to be migrated out of band.
pub async fn init_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    if backend != DatabaseBackend::Sqlite {
        info!("skip schema bootstrap for {:?}", backend);
        return Ok(());
    }

    let exists_stmt = Statement::from_string(
        backend,
        "SELECT name FROM sqlite_master WHERE type='table' AND name='t_user' LIMIT 1",
    );
    if db.query_one(exists_stmt).await?.is_some() {
        return Ok(());
    }

    let sql = include_str!("../schema-sqlite.sql");
    for stmt in split_sql(sql) {
        db.execute(Statement::from_string(backend, stmt)).await?;
    }
    info!("sqlite schema created");
    Ok(())
}

fn split_sql(input: &str) -> Vec<String> {
    let mut buf = String::new();
    for line in input.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }
        buf.push_str(line);
        buf.push('\n');
    }
    buf.split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_sql_drops_comments_and_blank_statements() {
        let sql = "-- users\nCREATE TABLE a (id INTEGER);\n\n-- posts\nCREATE TABLE b (id INTEGER);\n;";
        let stmts = split_sql(sql);
        assert_eq!(stmts, vec!["CREATE TABLE a (id INTEGER)", "CREATE TABLE b (id INTEGER)"]);
    }

    #[test]
    fn bundled_schema_has_every_table() {
        let stmts = split_sql(include_str!("../schema-sqlite.sql"));
        for table in ["t_user", "t_post", "t_comment", "t_like", "t_follow"] {
            assert!(
                stmts.iter().any(|s| s.starts_with("CREATE TABLE") && s.contains(table)),
                "missing {}",
                table
            );
        }
    }

    #[actix_rt::test]
    async fn init_schema_is_idempotent() {
        let db = crate::test_support::setup_db().await;
        init_schema(&db).await.unwrap();
    }
}
