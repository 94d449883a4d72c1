use serde::{Deserialize, Serialize};

pub type UserID = i64;

#[derive(Deserialize, Debug)]
pub struct CredentialsRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug)]
pub struct StoredUser {
    pub id: UserID,
    pub username: String,
    pub password_hash: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> MessageResponse {
        MessageResponse {
            message: message.into(),
        }
    }
}
