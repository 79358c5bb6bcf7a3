use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::auth::Role;
use crate::error::AppResult;
use crate::state::DbPool;

/// The user a live session token resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: String,
    pub name: Option<String>,
    pub role: Role,
}

/// Create a new session for a user. Returns the session token.
pub fn create_session(pool: &DbPool, user_id: &str, hours: u64) -> AppResult<String> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Look up an unexpired session. Unknown roles count as no session.
pub fn resolve_session(pool: &DbPool, token: &str) -> AppResult<Option<SessionUser>> {
    let conn = pool.get()?;

    let row: Option<(String, Option<String>, String)> = conn
        .query_row(
            "SELECT u.id, u.name, u.role FROM sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.token = ?1 AND s.expires_at > datetime('now')",
            params![token],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    Ok(row.and_then(|(id, name, role)| {
        let role = role.parse::<Role>().ok()?;
        Some(SessionUser { id, name, role })
    }))
}

/// Mirror a user from the identity provider into the local table.
pub fn upsert_user(
    pool: &DbPool,
    id: &str,
    name: Option<&str>,
    email: &str,
    role: Role,
) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO users (id, name, email, role) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           email = excluded.email,
           role = excluded.role",
        params![id, name, email, role.as_str()],
    )?;
    Ok(())
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
