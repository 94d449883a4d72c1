use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::internal_error::{InternalError, InternalResult};

use super::data::*;

pub fn hash_password(password: &str) -> InternalResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| InternalError::Internal(format!("Could not hash password: {}", e)))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// Both fields must be present and non-blank.
pub fn validate_credentials(request: CredentialsRequest) -> InternalResult<(String, String)> {
    let username = request.username.map(|u| u.trim().to_string());
    let password = request.password;

    match (username, password) {
        (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
            Ok((username, password))
        }
        _ => Err(InternalError::bad_request("Username and password required")),
    }
}

pub fn get_user_by_username(
    username: &str,
    db_connection: &Connection,
) -> InternalResult<Option<StoredUser>> {
    let user = db_connection
        .query_row(
            "SELECT rowid, username, password_hash FROM users WHERE username = (?1)",
            params![username],
            |row| {
                Ok(StoredUser {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                })
            },
        )
        .optional()?;

    Ok(user)
}

pub fn add_user_to_db(
    username: &str,
    password_hash: &str,
    db_connection: &Connection,
) -> InternalResult<UserID> {
    db_connection.execute(
        "INSERT INTO users VALUES (?1, ?2, ?3)",
        params![username, password_hash, Utc::now()],
    )?;

    Ok(db_connection.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::init_database;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn blank_credentials_are_rejected() {
        let request = CredentialsRequest {
            username: Some(String::from("  ")),
            password: Some(String::from("pw")),
        };
        assert!(validate_credentials(request).is_err());

        let request = CredentialsRequest {
            username: Some(String::from("marie")),
            password: None,
        };
        assert!(validate_credentials(request).is_err());
    }

    #[test]
    fn users_are_found_by_name() {
        let connection = Connection::open_in_memory().unwrap();
        init_database(&connection).unwrap();

        let id = add_user_to_db("marie", "hash", &connection).unwrap();
        let user = get_user_by_username("marie", &connection).unwrap().unwrap();

        assert_eq!(user.id, id);
        assert_eq!(user.password_hash, "hash");
        assert!(get_user_by_username("paul", &connection).unwrap().is_none());
    }
}
