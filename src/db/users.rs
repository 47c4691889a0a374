//! User accounts and bearer-token sessions.

use super::{Database, now_ms};
use crate::error::ApiError;
use crate::types::{ProfilePatch, RegisterInput, Session, User};
use anyhow::{Result, anyhow};
use argon2::Argon2;
use argon2::password_hash::{PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

/// Hash a password with Argon2id, producing a PHC-format string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {}", e))?
        .to_string();
    Ok(hash)
}

/// Verify a password against a stored PHC hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match argon2::PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate an opaque session token: 32 random bytes, base64url.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        created_at: row.get("created_at")?,
    })
}

fn validate_registration(input: &RegisterInput) -> Result<()> {
    if input.username.trim().is_empty() {
        return Err(ApiError::missing_field("username").into());
    }
    if !input.email.contains('@') {
        return Err(ApiError::invalid_value("email", "Enter a valid email address").into());
    }
    if input.password.len() < 8 {
        return Err(ApiError::invalid_value(
            "password",
            "Password must be at least 8 characters",
        )
        .into());
    }
    if input.password != input.confirm_password {
        return Err(ApiError::invalid_value("confirm_password", "Passwords do not match").into());
    }
    Ok(())
}

fn username_taken(conn: &Connection, username: &str) -> Result<bool> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        params![username],
        |row| row.get(0),
    )?;
    Ok(taken)
}

fn email_taken(conn: &Connection, email: &str, exclude_user: Option<&str>) -> Result<bool> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1 AND id != COALESCE(?2, ''))",
        params![email, exclude_user],
        |row| row.get(0),
    )?;
    Ok(taken)
}

impl Database {
    /// Register a new user. The password is hashed before it is stored.
    pub fn create_user(&self, input: RegisterInput) -> Result<User> {
        validate_registration(&input)?;

        let id = Uuid::now_v7().to_string();
        let now = now_ms();
        let password_hash = hash_password(&input.password)?;

        self.with_conn(|conn| {
            if username_taken(conn, &input.username)? {
                return Err(ApiError::already_exists(
                    "username",
                    "A user with this username already exists",
                )
                .into());
            }
            if email_taken(conn, &input.email, None)? {
                return Err(ApiError::already_exists(
                    "email",
                    "A user with this email already exists",
                )
                .into());
            }

            conn.execute(
                "INSERT INTO users (id, username, email, password_hash, first_name, last_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    &id,
                    &input.username,
                    &input.email,
                    &password_hash,
                    &input.first_name,
                    &input.last_name,
                    now,
                ],
            )?;

            Ok(User {
                id: id.clone(),
                username: input.username.clone(),
                email: input.email.clone(),
                first_name: input.first_name.clone(),
                last_name: input.last_name.clone(),
                created_at: now,
            })
        })
    }

    /// Check credentials. The failure is deliberately identical for an
    /// unknown username and a wrong password.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT * FROM users WHERE username = ?1",
                params![username],
                |row| {
                    let hash: String = row.get("password_hash")?;
                    let user = parse_user_row(row)?;
                    Ok((user, hash))
                },
            );

            match result {
                Ok((user, hash)) if verify_password(password, &hash) => Ok(user),
                Ok(_) | Err(rusqlite::Error::QueryReturnedNoRows) => {
                    Err(ApiError::invalid_credentials().into())
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Open a new session for a user.
    pub fn create_session(&self, user_id: &str, ttl_ms: i64) -> Result<Session> {
        let token = generate_token();
        let now = now_ms();
        let expires_at = now + ttl_ms;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (token, user_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![&token, user_id, now, expires_at],
            )?;
            Ok(Session {
                token: token.clone(),
                user_id: user_id.to_string(),
                created_at: now,
                expires_at,
            })
        })
    }

    /// Resolve a bearer token to its user. Expired or unknown tokens yield None.
    pub fn session_user(&self, token: &str, now: i64) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT u.* FROM users u
                 INNER JOIN sessions s ON s.user_id = u.id
                 WHERE s.token = ?1 AND s.expires_at > ?2",
                params![token, now],
                parse_user_row,
            );

            match result {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Delete a session. Returns whether a session existed.
    pub fn delete_session(&self, token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
            Ok(deleted > 0)
        })
    }

    /// Get a user by id.
    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT * FROM users WHERE id = ?1",
                params![user_id],
                parse_user_row,
            );

            match result {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Partially update profile fields of a user.
    pub fn update_profile(&self, user_id: &str, patch: ProfilePatch) -> Result<User> {
        self.with_conn(|conn| {
            let current = conn
                .query_row(
                    "SELECT * FROM users WHERE id = ?1",
                    params![user_id],
                    parse_user_row,
                )
                .map_err(|_| anyhow::Error::new(ApiError::unauthorized()))?;

            let email = patch.email.unwrap_or(current.email);
            if !email.contains('@') {
                return Err(ApiError::invalid_value("email", "Enter a valid email address").into());
            }
            if email_taken(conn, &email, Some(user_id))? {
                return Err(ApiError::already_exists(
                    "email",
                    "A user with this email already exists",
                )
                .into());
            }
            let first_name = patch.first_name.unwrap_or(current.first_name);
            let last_name = patch.last_name.unwrap_or(current.last_name);

            conn.execute(
                "UPDATE users SET email = ?1, first_name = ?2, last_name = ?3 WHERE id = ?4",
                params![&email, &first_name, &last_name, user_id],
            )?;

            Ok(User {
                email,
                first_name,
                last_name,
                ..current
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_and_verify() {
        let password = "test_password_123";
        let hash = hash_password(password).expect("Failed to hash");

        assert!(verify_password(password, &hash));
        assert!(!verify_password("wrong_password", &hash));
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(generate_token(), generate_token());
    }
}
