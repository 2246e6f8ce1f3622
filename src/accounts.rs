//! Accounts — user records and password credentials.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use libsql::{Connection, params};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::debug;

use crate::error::{DatabaseError, TodoError};
use crate::store::parse_datetime;

/// A registered user. The password digest never leaves this module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Account queries over a borrowed connection.
pub struct AccountStore<'c> {
    conn: &'c Connection,
}

impl<'c> AccountStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Insert a new account. A taken username surfaces as a UNIQUE
    /// constraint error.
    pub async fn create(&self, username: &str, digest: &str) -> Result<Account, DatabaseError> {
        let now = Utc::now();
        self.conn
            .execute(
                "INSERT INTO accounts (username, password_digest, created_at) VALUES (?1, ?2, ?3)",
                params![username, digest, now.to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("create_account", e))?;

        let id = self.conn.last_insert_rowid();
        debug!(account_id = id, username, "Account created");
        Ok(Account {
            id,
            username: username.to_string(),
            created_at: now,
        })
    }

    /// Look up an account and its password digest by exact username.
    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<(Account, String)>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, username, created_at, password_digest FROM accounts WHERE username = ?1",
                params![username],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("find_account", e))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let read = |e: libsql::Error| DatabaseError::Query(format!("account row: {e}"));
                let account = Account {
                    id: row.get(0).map_err(read)?,
                    username: row.get(1).map_err(read)?,
                    created_at: parse_datetime(&row.get::<String>(2).unwrap_or_default()),
                };
                let digest: String = row.get(3).map_err(read)?;
                Ok(Some((account, digest)))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_account row: {e}"))),
        }
    }
}

/// Hash a password into an argon2 PHC string with a fresh random salt.
pub fn hash_password(password: &SecretString) -> Result<String, TodoError> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| TodoError::Credential(e.to_string()))
}

/// Check a password against a stored PHC string. A malformed digest never
/// verifies.
pub fn verify_password(password: &SecretString, digest: &str) -> bool {
    match PasswordHash::new(digest) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.expose_secret().as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Insert a bare account row for tests that only need a valid owner id.
#[cfg(test)]
pub(crate) async fn seed_account(conn: &Connection, username: &str) -> i64 {
    AccountStore::new(conn)
        .create(username, "not-a-real-digest")
        .await
        .unwrap()
        .id
}
