#![allow(dead_code)]

use axum::http::{header, Method, StatusCode};
use reqwest::Client;
use rusqlite::params;
use tempfile::TempDir;

use threadline::auth::session::{create_session, upsert_user};
use threadline::auth::Role;
use threadline::config::Config;
use threadline::db;
use threadline::response::Envelope;
use threadline::routes;
use threadline::state::{AppState, DbPool};

pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub state: AppState,
    pub alice: String,
    pub bob: String,
    pub admin: String,
    _temp: TempDir,
}

/// Fresh migrated database with users alice, bob (plain) and admin.
pub fn test_pool() -> (DbPool, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let pool = db::create_pool(&temp_dir.path().join("test.db")).unwrap();
    db::run_migrations(&pool).unwrap();

    upsert_user(&pool, "alice", Some("Alice"), "alice@example.com", Role::User).unwrap();
    upsert_user(&pool, "bob", Some("Bob"), "bob@example.com", Role::User).unwrap();
    upsert_user(&pool, "admin", Some("Ada"), "ada@example.com", Role::Admin).unwrap();

    (pool, temp_dir)
}

/// Serve the app on an ephemeral port over `test_pool`, with blog 5.
pub async fn spawn_app() -> TestApp {
    let (pool, temp) = test_pool();
    insert_blog(&pool, 5);

    let alice = create_session(&pool, "alice", 1).unwrap();
    let bob = create_session(&pool, "bob", 1).unwrap();
    let admin = create_session(&pool, "admin", 1).unwrap();

    let state = AppState::new(pool, Config::default());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let address = format!("http://{}", listener.local_addr().unwrap());
    let app = routes::app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        client: Client::builder().no_proxy().build().unwrap(),
        state,
        alice,
        bob,
        admin,
        _temp: temp,
    }
}

pub fn insert_blog(pool: &DbPool, id: i64) {
    let conn = pool.get().unwrap();
    conn.execute(
        "INSERT INTO blogs (id, title, published, author_id) VALUES (?1, ?2, 1, 'owner')",
        params![id, format!("Blog {}", id)],
    )
    .unwrap();
}

/// Insert a comment with a fixed timestamp offset (seconds after a base time).
pub fn insert_comment(
    pool: &DbPool,
    id: i64,
    blog: i64,
    parent: Option<i64>,
    seconds: i64,
    pinned: bool,
) {
    let conn = pool.get().unwrap();
    conn.execute(
        "INSERT INTO comments (id, blog_id, parent_id, author_id, content, created_at, pinned)
         VALUES (?1, ?2, ?3, 'alice', ?4, datetime('2025-01-15 12:00:00', ?5), ?6)",
        params![
            id,
            blog,
            parent,
            format!("comment {}", id),
            format!("+{} seconds", seconds),
            pinned
        ],
    )
    .unwrap();
}

pub fn pinned_ids(pool: &DbPool, blog: i64) -> Vec<i64> {
    let conn = pool.get().unwrap();
    let mut stmt = conn
        .prepare("SELECT id FROM comments WHERE blog_id = ?1 AND pinned = 1 ORDER BY id")
        .unwrap();
    stmt.query_map(params![blog], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<i64>, _>>()
        .unwrap()
}

pub fn count(pool: &DbPool, sql: &str) -> i64 {
    let conn = pool.get().unwrap();
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

impl TestApp {
    pub fn pool(&self) -> &DbPool {
        &self.state.db
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        session: Option<&str>,
        json: Option<serde_json::Value>,
    ) -> (StatusCode, Envelope) {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.address, uri));
        if let Some(token) = session {
            request = request.header(header::COOKIE, format!("threadline_session={}", token));
        }
        if let Some(value) = json {
            request = request.json(&value);
        }

        let response = request.send().await.expect("Failed to send request");
        let status = response.status();
        let bytes = response.bytes().await.unwrap();
        let envelope: Envelope = serde_json::from_slice(&bytes)
            .unwrap_or_else(|e| panic!("not an envelope ({}): {:?}", e, bytes));
        (status, envelope)
    }

    pub async fn thread(&self, blog: i64) -> serde_json::Value {
        let (status, envelope) = self
            .request(Method::GET, &format!("/api/blogs/{}/comments", blog), None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_str(envelope.data.as_deref().unwrap()).unwrap()
    }
}

/// (root id, [reply ids]) pairs of a serialized thread view.
pub fn shape(view: &serde_json::Value) -> Vec<(i64, Vec<i64>)> {
    view.as_array()
        .unwrap()
        .iter()
        .map(|group| {
            let root = group["root"]["id"].as_i64().unwrap();
            let replies = group["replies"]
                .as_array()
                .unwrap()
                .iter()
                .map(|r| r["id"].as_i64().unwrap())
                .collect();
            (root, replies)
        })
        .collect()
}
